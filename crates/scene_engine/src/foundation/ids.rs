//! Monotonic id allocation
//!
//! Every object, material, geometry and texture carries a numeric id drawn
//! from an [`IdAllocator`]. Allocators are cheap to clone and clones share
//! their counters, so a loader thread can build assets with a clone of the
//! render thread's allocator without id collisions.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier of a scene node
    ObjectId
);
id_type!(
    /// Unique identifier for materials
    MaterialId
);
id_type!(
    /// Unique identifier for geometries
    GeometryId
);
id_type!(
    /// Unique identifier for textures
    TextureId
);

#[derive(Debug, Default)]
struct Counters {
    objects: AtomicU32,
    materials: AtomicU32,
    geometries: AtomicU32,
    textures: AtomicU32,
}

/// Shared source of monotonically increasing ids
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: Arc<Counters>,
}

impl IdAllocator {
    /// Create an allocator whose counters all start at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Next object id
    pub fn next_object(&self) -> ObjectId {
        ObjectId(self.counters.objects.fetch_add(1, Ordering::Relaxed))
    }

    /// Next material id
    pub fn next_material(&self) -> MaterialId {
        MaterialId(self.counters.materials.fetch_add(1, Ordering::Relaxed))
    }

    /// Next geometry id
    pub fn next_geometry(&self) -> GeometryId {
        GeometryId(self.counters.geometries.fetch_add(1, Ordering::Relaxed))
    }

    /// Next texture id
    pub fn next_texture(&self) -> TextureId {
        TextureId(self.counters.textures.fetch_add(1, Ordering::Relaxed))
    }
}
