//! # Render Lists
//!
//! Per-frame collection of everything a camera will draw, split into an
//! opaque and a transparent bucket and sorted for submission.
//!
//! ## Ordering
//!
//! - **Opaque**: group order, render order, material, then front to back so
//!   early depth rejection discards hidden fragments.
//! - **Transparent**: group order, render order, then back to front so alpha
//!   blending composites correctly.
//!
//! Ties fall back to object id, and both sorts are stable.
//!
//! ## Pooling
//!
//! Items live in a pool that is reused frame after frame. [`RenderList::init`]
//! only rewinds a cursor; the pool grows when a frame needs more items than
//! any frame before it and never shrinks.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::ids::ObjectId;
use crate::render::geometry::{BufferGeometry, GeometryGroup};
use crate::render::material::{Material, ProgramId};
use crate::scene::graph::NodeKey;
use crate::scene::object::Object3D;

/// Comparison used to order one bucket
pub type SortFn = fn(&RenderItem, &RenderItem) -> Ordering;

/// One pending draw
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Id of the drawn object
    pub id: ObjectId,
    /// Drawn object
    pub object: NodeKey,
    /// Vertex data
    pub geometry: Arc<BufferGeometry>,
    /// Material
    pub material: Arc<Material>,
    /// Shader variant of `material`
    pub program: ProgramId,
    /// Render order of the nearest enclosing group
    pub group_order: i32,
    /// Render order of the object
    pub render_order: i32,
    /// Normalized device depth, 0 when sorting is disabled
    pub z: f32,
    /// Geometry group for multi-material objects
    pub group: Option<GeometryGroup>,
}

/// Default opaque order: state changes first, then front to back
pub fn painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then_with(|| a.render_order.cmp(&b.render_order))
        .then_with(|| a.material.id().cmp(&b.material.id()))
        .then_with(|| a.z.total_cmp(&b.z))
        .then_with(|| a.id.cmp(&b.id))
}

/// Default transparent order: same state keys as opaque, then back to front
pub fn reverse_painter_sort_stable(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then_with(|| a.render_order.cmp(&b.render_order))
        .then_with(|| a.material.id().cmp(&b.material.id()))
        .then_with(|| b.z.total_cmp(&a.z))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorted draw list for one (scene, camera) pair
#[derive(Debug, Default)]
pub struct RenderList {
    pool: Vec<RenderItem>,
    cursor: usize,
    opaque: Vec<usize>,
    transparent: Vec<usize>,
}

impl RenderList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty list with room for `capacity` items
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: Vec::with_capacity(capacity),
            cursor: 0,
            opaque: Vec::with_capacity(capacity),
            transparent: Vec::with_capacity(capacity / 4),
        }
    }

    /// Start a new frame, keeping pooled items
    pub fn init(&mut self) {
        self.cursor = 0;
        self.opaque.clear();
        self.transparent.clear();
    }

    #[allow(clippy::too_many_arguments)]
    fn next_item(
        &mut self,
        key: NodeKey,
        object: &Object3D,
        geometry: &Arc<BufferGeometry>,
        material: &Arc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) -> usize {
        if !material.visible {
            log::warn!("Pushing object {} with invisible material {}", object.id(), material.id());
        }

        let index = self.cursor;
        let program = material.program_id();
        if let Some(item) = self.pool.get_mut(index) {
            item.id = object.id();
            item.object = key;
            item.geometry = Arc::clone(geometry);
            item.material = Arc::clone(material);
            item.program = program;
            item.group_order = group_order;
            item.render_order = object.render_order;
            item.z = z;
            item.group = group;
        } else {
            self.pool.push(RenderItem {
                id: object.id(),
                object: key,
                geometry: Arc::clone(geometry),
                material: Arc::clone(material),
                program,
                group_order,
                render_order: object.render_order,
                z,
                group,
            });
        }
        self.cursor += 1;
        index
    }

    /// Append an item to the bucket chosen by `material.transparent`
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        key: NodeKey,
        object: &Object3D,
        geometry: &Arc<BufferGeometry>,
        material: &Arc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        let index = self.next_item(key, object, geometry, material, group_order, z, group);
        if material.transparent {
            self.transparent.push(index);
        } else {
            self.opaque.push(index);
        }
    }

    /// Like [`push`](Self::push); the item also goes to the end of its bucket
    ///
    /// Front insertion only matters for unsorted lists, and callers that need
    /// a particular order sort anyway.
    #[allow(clippy::too_many_arguments)]
    pub fn unshift(
        &mut self,
        key: NodeKey,
        object: &Object3D,
        geometry: &Arc<BufferGeometry>,
        material: &Arc<Material>,
        group_order: i32,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        self.push(key, object, geometry, material, group_order, z, group);
    }

    /// Sort both buckets with the default orders
    pub fn sort(&mut self) {
        self.sort_with(painter_sort_stable, reverse_painter_sort_stable);
    }

    /// Sort both buckets with custom comparisons
    pub fn sort_with(&mut self, opaque: SortFn, transparent: SortFn) {
        let Self { pool, opaque: opaque_bucket, transparent: transparent_bucket, .. } = self;
        if opaque_bucket.len() > 1 {
            opaque_bucket.sort_by(|&a, &b| opaque(&pool[a], &pool[b]));
        }
        if transparent_bucket.len() > 1 {
            transparent_bucket.sort_by(|&a, &b| transparent(&pool[a], &pool[b]));
        }
    }

    /// Opaque items in draw order
    pub fn opaque(&self) -> impl ExactSizeIterator<Item = &RenderItem> + '_ {
        self.opaque.iter().map(|&i| &self.pool[i])
    }

    /// Transparent items in draw order
    pub fn transparent(&self) -> impl ExactSizeIterator<Item = &RenderItem> + '_ {
        self.transparent.iter().map(|&i| &self.pool[i])
    }

    /// Items pushed this frame
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True when nothing was pushed this frame
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Items ever allocated
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Drop every pooled item, releasing the geometries and materials they share
    pub fn dispose(&mut self) {
        self.init();
        self.pool.clear();
    }
}

/// Render lists keyed by (scene id, camera id)
#[derive(Debug, Default)]
pub struct RenderLists {
    lists: HashMap<(ObjectId, ObjectId), RenderList>,
    capacity: usize,
}

impl RenderLists {
    /// Empty set whose lists start with room for `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self { lists: HashMap::new(), capacity }
    }

    /// List for a scene/camera pair, created on first use
    pub fn get(&mut self, scene: ObjectId, camera: ObjectId) -> &mut RenderList {
        let capacity = self.capacity;
        self.lists.entry((scene, camera)).or_insert_with(|| {
            log::debug!("Creating render list for scene {scene}, camera {camera}");
            RenderList::with_capacity(capacity)
        })
    }

    /// Existing list for a scene/camera pair
    pub fn find(&self, scene: ObjectId, camera: ObjectId) -> Option<&RenderList> {
        self.lists.get(&(scene, camera))
    }

    /// Drop every list rendered for `scene`
    pub fn dispose_scene(&mut self, scene: ObjectId) {
        self.lists.retain(|&(s, _), _| s != scene);
    }

    /// Drop every list
    pub fn dispose(&mut self) {
        self.lists.clear();
    }

    /// Number of live lists
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// True when there are no lists
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::color::Color;
    use crate::foundation::ids::IdAllocator;
    use crate::scene::graph::{NodeKind, SceneGraph};

    struct Fixture {
        ids: IdAllocator,
        graph: SceneGraph,
        geometry: Arc<BufferGeometry>,
    }

    impl Fixture {
        fn new() -> Self {
            let ids = IdAllocator::new();
            let geometry = Arc::new(BufferGeometry::new(&ids));
            Self { graph: SceneGraph::new(ids.clone()), ids, geometry }
        }

        fn node(&mut self, render_order: i32) -> NodeKey {
            let key = self.graph.create(NodeKind::Empty);
            self.graph.object_mut(key).unwrap().render_order = render_order;
            key
        }

        fn material(&self, transparent: bool) -> Arc<Material> {
            let mut material = Material::basic(&self.ids, Color::WHITE);
            material.transparent = transparent;
            Arc::new(material)
        }

        fn push(&self, list: &mut RenderList, key: NodeKey, material: &Arc<Material>, group_order: i32, z: f32) {
            let object = self.graph.object(key).unwrap();
            list.push(key, object, &self.geometry, material, group_order, z, None);
        }
    }

    fn ids_of<'a>(items: impl Iterator<Item = &'a RenderItem>) -> Vec<ObjectId> {
        items.map(|item| item.id).collect()
    }

    #[test]
    fn test_buckets_follow_material_transparency() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        let glass = f.material(true);
        let (a, b) = (f.node(0), f.node(0));
        let mut list = RenderList::new();

        f.push(&mut list, a, &opaque, 0, 0.5);
        f.push(&mut list, b, &glass, 0, 0.5);

        assert_eq!(list.len(), 2);
        assert_eq!(list.opaque().len(), 1);
        assert_eq!(list.transparent().len(), 1);
        assert_eq!(list.transparent().next().unwrap().object, b);
    }

    #[test]
    fn test_opaque_sorts_front_to_back_after_state_keys() {
        let mut f = Fixture::new();
        let first = f.material(false);
        let second = f.material(false);
        let (near, far, late, grouped) = (f.node(0), f.node(0), f.node(1), f.node(0));
        let mut list = RenderList::new();

        f.push(&mut list, grouped, &first, 1, 0.0);
        f.push(&mut list, late, &first, 0, 0.0);
        f.push(&mut list, far, &first, 0, 0.9);
        f.push(&mut list, near, &second, 0, 0.1);
        list.sort();

        let id = |key| f.graph.object(key).unwrap().id();
        // Material id outranks depth
        assert_eq!(ids_of(list.opaque()), vec![id(far), id(near), id(late), id(grouped)]);

        let items: Vec<_> = list.opaque().collect();
        for pair in items.windows(2) {
            assert_ne!(painter_sort_stable(pair[0], pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_transparent_sorts_back_to_front() {
        let mut f = Fixture::new();
        let glass = f.material(true);
        let keys: Vec<_> = (0..4).map(|_| f.node(0)).collect();
        let mut list = RenderList::new();

        for (key, z) in keys.iter().zip([0.2, 0.8, -0.5, 0.8]) {
            f.push(&mut list, *key, &glass, 0, z);
        }
        list.sort();

        let depths: Vec<f32> = list.transparent().map(|item| item.z).collect();
        assert_eq!(depths, vec![0.8, 0.8, 0.2, -0.5]);
        // Equal depth falls back to id
        let sorted = ids_of(list.transparent());
        assert!(sorted[0] < sorted[1]);
    }

    #[test]
    fn test_transparent_material_id_outranks_depth() {
        let mut f = Fixture::new();
        let first = f.material(true);
        let second = f.material(true);
        let (a, b, c) = (f.node(0), f.node(0), f.node(0));
        let mut list = RenderList::new();

        f.push(&mut list, a, &first, 0, 0.1);
        f.push(&mut list, b, &second, 0, 0.9);
        f.push(&mut list, c, &first, 0, 0.5);
        list.sort();

        let order: Vec<_> = list.transparent().map(|item| (item.material.id(), item.z)).collect();
        assert_eq!(order, vec![(first.id(), 0.5), (first.id(), 0.1), (second.id(), 0.9)]);
    }

    #[test]
    fn test_nan_depth_has_a_defined_position() {
        let mut f = Fixture::new();
        let material = f.material(false);
        let (a, b) = (f.node(0), f.node(0));
        let mut list = RenderList::new();

        f.push(&mut list, a, &material, 0, f32::NAN);
        f.push(&mut list, b, &material, 0, 0.5);
        list.sort();

        assert_eq!(list.opaque().next().unwrap().object, b);
    }

    #[test]
    fn test_init_reuses_pool() {
        let mut f = Fixture::new();
        let material = f.material(false);
        let keys: Vec<_> = (0..3).map(|_| f.node(0)).collect();
        let mut list = RenderList::new();

        for &key in &keys {
            f.push(&mut list, key, &material, 0, 0.0);
        }
        list.init();
        assert!(list.is_empty());
        assert_eq!(list.opaque().len(), 0);

        f.push(&mut list, keys[2], &material, 0, 0.0);
        assert_eq!(list.pool_size(), 3);
        assert_eq!(list.opaque().next().unwrap().object, keys[2]);

        list.dispose();
        assert_eq!(list.pool_size(), 0);
    }

    #[test]
    fn test_unshift_appends() {
        let mut f = Fixture::new();
        let material = f.material(false);
        let (a, b) = (f.node(0), f.node(0));
        let mut list = RenderList::new();

        f.push(&mut list, a, &material, 0, 0.0);
        let object = f.graph.object(b).unwrap();
        list.unshift(b, object, &f.geometry, &material, 0, 0.0, None);

        let order: Vec<_> = list.opaque().map(|item| item.object).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn test_lists_keyed_by_scene_and_camera() {
        let mut lists = RenderLists::new(8);
        lists.get(ObjectId(1), ObjectId(10));
        lists.get(ObjectId(1), ObjectId(11));
        lists.get(ObjectId(2), ObjectId(10));
        assert_eq!(lists.len(), 3);

        lists.dispose_scene(ObjectId(1));
        assert_eq!(lists.len(), 1);
        assert!(lists.find(ObjectId(2), ObjectId(10)).is_some());

        lists.dispose();
        assert!(lists.is_empty());
    }
}
