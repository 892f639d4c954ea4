//! Arena-backed transform hierarchy
//!
//! Nodes live in a [`SlotMap`] and refer to each other through [`NodeKey`]
//! handles. A node owns its children (removing a subtree frees it) while the
//! parent link is a plain key, so the structure has no reference cycles.
//!
//! World matrices are maintained top-down:
//!
//! ```text
//! world(root)  = local(root)
//! world(child) = world(parent) * local(child)
//! ```
//!
//! Cycles are rejected when a node is attached, which keeps every traversal
//! in this module finite.

use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::foundation::ids::{IdAllocator, ObjectId};
use crate::foundation::math::{Mat4, Mat4Ext, Point3, Quat, Rotation3, Transform, Vec3};
use crate::render::geometry::BufferGeometry;
use crate::render::material::Material;
use crate::scene::camera::Camera;
use crate::scene::light::Light;
use crate::scene::object::Object3D;

new_key_type! {
    /// Handle of a node in a [`SceneGraph`]
    pub struct NodeKey;
}

/// Scene graph errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// Attaching would make a node its own ancestor
    #[error("Attaching object {child} under object {parent} would create a cycle")]
    CyclicHierarchy {
        /// Node that was to become the parent
        parent: ObjectId,
        /// Node that was to be attached
        child: ObjectId,
    },

    /// Key does not refer to a live node of this graph
    #[error("Node {0:?} does not exist in this scene graph")]
    MissingNode(NodeKey),

    /// Node exists but is of another kind
    #[error("Node {key:?} is a {found}, expected a {expected}")]
    WrongKind {
        /// Node that was queried
        key: NodeKey,
        /// Kind the caller asked for
        expected: &'static str,
        /// Kind the node actually has
        found: &'static str,
    },

    /// A world matrix needed inverting but has no inverse
    #[error("World matrix of object {0} is not invertible")]
    SingularTransform(ObjectId),
}

/// Geometry plus the material(s) drawing it
#[derive(Debug, Clone)]
pub struct Renderable {
    /// Shared vertex data
    pub geometry: Arc<BufferGeometry>,
    /// One material, or one per geometry group
    pub materials: Vec<Arc<Material>>,
}

impl Renderable {
    /// Single-material renderable
    pub fn new(geometry: Arc<BufferGeometry>, material: Arc<Material>) -> Self {
        Self { geometry, materials: vec![material] }
    }

    /// Multi-material renderable; materials are indexed by geometry group
    pub fn with_materials(geometry: Arc<BufferGeometry>, materials: Vec<Arc<Material>>) -> Self {
        Self { geometry, materials }
    }

    /// First material
    pub fn material(&self) -> Option<&Arc<Material>> {
        self.materials.first()
    }

    /// True when materials are selected per geometry group
    pub fn is_multi_material(&self) -> bool {
        self.materials.len() > 1
    }
}

/// What a node is, beyond its transform
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Plain transform node
    Empty,
    /// Transform node whose render order groups its renderable descendants
    Group,
    /// Triangle mesh
    Mesh(Renderable),
    /// Line strip
    Line(Renderable),
    /// Point cloud
    Points(Renderable),
    /// Camera-facing quad
    Sprite(Renderable),
    /// Light source
    Light(Light),
    /// Camera
    Camera(Camera),
}

impl NodeKind {
    /// Short kind name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Group => "group",
            Self::Mesh(_) => "mesh",
            Self::Line(_) => "line",
            Self::Points(_) => "points",
            Self::Sprite(_) => "sprite",
            Self::Light(_) => "light",
            Self::Camera(_) => "camera",
        }
    }

    /// Geometry and materials of drawable kinds
    pub fn renderable(&self) -> Option<&Renderable> {
        match self {
            Self::Mesh(r) | Self::Line(r) | Self::Points(r) | Self::Sprite(r) => Some(r),
            _ => None,
        }
    }

    /// Camera state, for camera nodes
    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            Self::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// Light state, for light nodes
    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Self::Light(light) => Some(light),
            _ => None,
        }
    }

    // Cameras and lights look down -Z; everything else points +Z at its target
    fn looks_down_negative_z(&self) -> bool {
        matches!(self, Self::Camera(_) | Self::Light(_))
    }
}

/// One node of the hierarchy
#[derive(Debug, Clone)]
pub struct Node {
    /// Transform and flags
    pub object: Object3D,
    /// Kind-specific data
    pub kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl Node {
    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// Detached copy of a subtree, in pre-order with parent indices
type Snapshot = Vec<(Object3D, NodeKind, Option<usize>)>;

/// Owner of every node and of their parent/child links
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, Node>,
    ids: IdAllocator,
}

impl SceneGraph {
    /// Create an empty graph drawing object ids from `ids`
    pub fn new(ids: IdAllocator) -> Self {
        Self { nodes: SlotMap::with_key(), ids }
    }

    /// Allocator shared with objects created for this graph
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a detached node
    pub fn insert(&mut self, object: Object3D, kind: NodeKind) -> NodeKey {
        self.nodes.insert(Node { object, kind, parent: None, children: Vec::new() })
    }

    /// Insert a detached node with a fresh default object
    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        let object = Object3D::new(&self.ids);
        self.insert(object, kind)
    }

    /// True when `key` refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Node by key
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Mutable node by key; links stay private so the hierarchy cannot be corrupted
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    fn node(&self, key: NodeKey) -> Result<&Node, SceneError> {
        self.nodes.get(key).ok_or(SceneError::MissingNode(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(key).ok_or(SceneError::MissingNode(key))
    }

    /// Object state of a node
    pub fn object(&self, key: NodeKey) -> Result<&Object3D, SceneError> {
        Ok(&self.node(key)?.object)
    }

    /// Mutable object state of a node
    pub fn object_mut(&mut self, key: NodeKey) -> Result<&mut Object3D, SceneError> {
        Ok(&mut self.node_mut(key)?.object)
    }

    /// Camera state of a camera node
    pub fn camera(&self, key: NodeKey) -> Result<&Camera, SceneError> {
        let node = self.node(key)?;
        node.kind.as_camera().ok_or(SceneError::WrongKind {
            key,
            expected: "camera",
            found: node.kind.name(),
        })
    }

    /// Mutable camera state of a camera node
    pub fn camera_mut(&mut self, key: NodeKey) -> Result<&mut Camera, SceneError> {
        let node = self.node_mut(key)?;
        match &mut node.kind {
            NodeKind::Camera(camera) => Ok(camera),
            other => Err(SceneError::WrongKind { key, expected: "camera", found: other.name() }),
        }
    }

    /// Mutable light state of a light node
    pub fn light_mut(&mut self, key: NodeKey) -> Result<&mut Light, SceneError> {
        let node = self.node_mut(key)?;
        match &mut node.kind {
            NodeKind::Light(light) => Ok(light),
            other => Err(SceneError::WrongKind { key, expected: "light", found: other.name() }),
        }
    }

    /// Parent of a node
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|node| node.parent)
    }

    /// Children of a node; empty for unknown keys
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map_or(&[][..], |node| node.children.as_slice())
    }

    /// Nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().filter(|(_, node)| node.parent.is_none()).map(|(key, _)| key)
    }

    /// True when `ancestor` is `key` itself or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.parent(k);
        }
        false
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Attach `child` under `parent`, detaching it from its previous parent
    ///
    /// Fails without touching the tree if `child` is `parent` or one of its
    /// ancestors.
    pub fn add(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        let parent_id = self.node(parent)?.object.id();
        let child_id = self.node(child)?.object.id();

        if self.is_ancestor_or_self(child, parent) {
            log::warn!("Rejected cyclic attach of object {child_id} under object {parent_id}");
            return Err(SceneError::CyclicHierarchy { parent: parent_id, child: child_id });
        }

        self.detach(child);
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// Returns `false`, changing nothing, when `child` is not a child of
    /// `parent`. The detached subtree keeps its matrices.
    pub fn remove(&mut self, parent: NodeKey, child: NodeKey) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child)
    }

    /// Detach a node from whatever parent it has
    pub fn detach(&mut self, child: NodeKey) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|&k| k != child);
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = None;
        }
        true
    }

    /// Detach a node and free it together with all of its descendants
    ///
    /// Returns the number of nodes freed.
    pub fn remove_subtree(&mut self, key: NodeKey) -> Result<usize, SceneError> {
        self.node(key)?;
        self.detach(key);

        let mut freed = 0;
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.remove(k) {
                stack.extend(node.children);
                freed += 1;
            }
        }
        log::debug!("Released {freed} scene node(s)");
        Ok(freed)
    }

    /// Attach `child` under `parent` while keeping its world transform
    pub fn attach(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        let parent_id = self.node(parent)?.object.id();
        let child_id = self.node(child)?.object.id();
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CyclicHierarchy { parent: parent_id, child: child_id });
        }

        self.update_world_matrix(parent, true, false)?;
        let mut m = self
            .node(parent)?
            .object
            .matrix_world()
            .try_inverse()
            .ok_or(SceneError::SingularTransform(parent_id))?;

        if let Some(old_parent) = self.parent(child) {
            self.update_world_matrix(old_parent, true, false)?;
            m *= self.node(old_parent)?.object.matrix_world();
        }

        self.node_mut(child)?.object.apply_matrix(&m);
        self.add(parent, child)?;
        self.update_world_matrix(child, false, true)
    }

    // ------------------------------------------------------------------
    // Matrices
    // ------------------------------------------------------------------

    /// Recompose a node's local matrix from its position/quaternion/scale
    pub fn update_matrix(&mut self, key: NodeKey) -> Result<(), SceneError> {
        self.node_mut(key)?.object.update_matrix();
        Ok(())
    }

    /// Bring world matrices of `key` and its subtree up to date
    ///
    /// Local matrices are recomposed where automatic updates apply. A node's
    /// world matrix is recomputed when it is flagged or `force` is set, and
    /// recomputing it forces the whole subtree below. Camera nodes refresh
    /// their world inverse.
    pub fn update_matrix_world(&mut self, key: NodeKey, force: bool) -> Result<(), SceneError> {
        self.node(key)?;

        let mut stack = vec![(key, force)];
        while let Some((k, force)) = stack.pop() {
            let parent_world = self.parent(k).map(|p| *self.nodes[p].object.matrix_world());
            let node = &mut self.nodes[k];

            node.object.auto_update_matrix();

            let mut force_children = force;
            if node.object.matrix_world_needs_update || force {
                let world = match parent_world {
                    Some(parent_world) => parent_world * node.object.matrix(),
                    None => *node.object.matrix(),
                };
                node.object.set_matrix_world(world);
                node.object.matrix_world_needs_update = false;
                force_children = true;
            }

            if let NodeKind::Camera(camera) = &mut node.kind {
                camera.update_matrix_world_inverse(node.object.matrix_world());
            }

            stack.extend(node.children.iter().rev().map(|&child| (child, force_children)));
        }
        Ok(())
    }

    /// Recompute a node's world matrix unconditionally, optionally walking
    /// up through its ancestors first and/or down through its descendants
    pub fn update_world_matrix(
        &mut self,
        key: NodeKey,
        update_parents: bool,
        update_children: bool,
    ) -> Result<(), SceneError> {
        self.node(key)?;

        if update_parents {
            let mut chain = Vec::new();
            let mut current = self.parent(key);
            while let Some(k) = current {
                chain.push(k);
                current = self.parent(k);
            }
            for &ancestor in chain.iter().rev() {
                self.refresh_world(ancestor);
            }
        }

        self.refresh_world(key);

        if update_children {
            let mut stack: Vec<NodeKey> = self.children(key).iter().rev().copied().collect();
            while let Some(k) = stack.pop() {
                self.refresh_world(k);
                stack.extend(self.children(k).iter().rev().copied());
            }
        }
        Ok(())
    }

    fn refresh_world(&mut self, key: NodeKey) {
        let parent_world = self.parent(key).map(|p| *self.nodes[p].object.matrix_world());
        let node = &mut self.nodes[key];
        node.object.auto_update_matrix();
        let world = match parent_world {
            Some(parent_world) => parent_world * node.object.matrix(),
            None => *node.object.matrix(),
        };
        node.object.set_matrix_world(world);
        if let NodeKind::Camera(camera) = &mut node.kind {
            camera.update_matrix_world_inverse(&world);
        }
    }

    // ------------------------------------------------------------------
    // Traversal and lookup
    // ------------------------------------------------------------------

    /// Visit `key` and its descendants depth-first, parents before children
    pub fn traverse(&self, key: NodeKey, mut visitor: impl FnMut(NodeKey, &Node)) {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(k) {
                visitor(k, node);
                stack.extend(node.children.iter().rev());
            }
        }
    }

    /// Like [`traverse`](Self::traverse) but with mutable access to each visited object
    pub fn traverse_mut(&mut self, key: NodeKey, mut visitor: impl FnMut(NodeKey, &mut Object3D)) {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(k) {
                visitor(k, &mut node.object);
                stack.extend(node.children.iter().rev());
            }
        }
    }

    /// Like [`traverse`](Self::traverse) but skipping invisible nodes and their subtrees
    pub fn traverse_visible(&self, key: NodeKey, mut visitor: impl FnMut(NodeKey, &Node)) {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(k) {
                if !node.object.visible {
                    continue;
                }
                visitor(k, node);
                stack.extend(node.children.iter().rev());
            }
        }
    }

    /// Visit every ancestor of `key`, nearest first
    pub fn traverse_ancestors(&self, key: NodeKey, mut visitor: impl FnMut(NodeKey, &Node)) {
        let mut current = self.parent(key);
        while let Some(k) = current {
            let node = &self.nodes[k];
            visitor(k, node);
            current = node.parent;
        }
    }

    /// First node in pre-order under `key` (inclusive) matching `predicate`
    pub fn find(&self, key: NodeKey, mut predicate: impl FnMut(&Node) -> bool) -> Option<NodeKey> {
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(k) {
                if predicate(node) {
                    return Some(k);
                }
                stack.extend(node.children.iter().rev());
            }
        }
        None
    }

    /// Node with the given object id under `key`
    pub fn get_object_by_id(&self, key: NodeKey, id: ObjectId) -> Option<NodeKey> {
        self.find(key, |node| node.object.id() == id)
    }

    /// First node with the given name under `key`
    pub fn get_object_by_name(&self, key: NodeKey, name: &str) -> Option<NodeKey> {
        self.find(key, |node| node.object.name == name)
    }

    // ------------------------------------------------------------------
    // Spatial helpers
    // ------------------------------------------------------------------

    /// Transform a point from the node's local space to world space
    ///
    /// Uses the world matrix as of the last update.
    pub fn local_to_world(&self, key: NodeKey, point: &Vec3) -> Result<Vec3, SceneError> {
        let world = self.node(key)?.object.matrix_world();
        Ok(world.transform_point(&Point3::from(*point)).coords)
    }

    /// Transform a point from world space to the node's local space
    pub fn world_to_local(&self, key: NodeKey, point: &Vec3) -> Result<Vec3, SceneError> {
        let object = &self.node(key)?.object;
        let inverse = object
            .matrix_world()
            .try_inverse()
            .ok_or(SceneError::SingularTransform(object.id()))?;
        Ok(inverse.transform_point(&Point3::from(*point)).coords)
    }

    /// Rotate a node to face a world-space point
    ///
    /// Cameras and lights point their -Z axis at the target, other nodes
    /// their +Z axis. The parent's rotation is compensated; non-uniformly
    /// scaled parents are not supported.
    pub fn look_at(&mut self, key: NodeKey, target: &Vec3) -> Result<(), SceneError> {
        self.update_world_matrix(key, true, false)?;

        let node = self.node(key)?;
        let position = node.object.matrix_world().translation_part();
        let basis = if node.kind.looks_down_negative_z() {
            Mat4::look_at_rotation(&position, target, &node.object.up)
        } else {
            Mat4::look_at_rotation(target, &position, &node.object.up)
        };
        let parent_rotation = node
            .parent
            .map(|p| self.nodes[p].object.matrix_world().extract_rotation());

        let object = &mut self.node_mut(key)?.object;
        object.set_rotation_from_basis(&basis);
        if let Some(parent_rotation) = parent_rotation {
            let q_parent = Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(parent_rotation));
            object.quaternion = q_parent.inverse() * object.quaternion;
        }
        Ok(())
    }

    fn world_transform(&mut self, key: NodeKey) -> Result<Transform, SceneError> {
        self.update_world_matrix(key, true, false)?;
        Ok(Transform::from_matrix(self.node(key)?.object.matrix_world()))
    }

    /// World-space position, refreshing the ancestor chain first
    pub fn world_position(&mut self, key: NodeKey) -> Result<Vec3, SceneError> {
        self.update_world_matrix(key, true, false)?;
        Ok(self.node(key)?.object.matrix_world().translation_part())
    }

    /// World-space rotation, refreshing the ancestor chain first
    pub fn world_quaternion(&mut self, key: NodeKey) -> Result<Quat, SceneError> {
        Ok(self.world_transform(key)?.rotation)
    }

    /// World-space scale, refreshing the ancestor chain first
    pub fn world_scale(&mut self, key: NodeKey) -> Result<Vec3, SceneError> {
        Ok(self.world_transform(key)?.scale)
    }

    /// Direction the node faces in world space
    ///
    /// +Z for ordinary nodes, -Z for cameras (their viewing direction).
    pub fn world_direction(&mut self, key: NodeKey) -> Result<Vec3, SceneError> {
        self.update_world_matrix(key, true, false)?;
        let node = self.node(key)?;
        let world = node.object.matrix_world();
        let z = Vec3::new(world[(0, 2)], world[(1, 2)], world[(2, 2)]);
        let direction = z.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);
        Ok(if matches!(node.kind, NodeKind::Camera(_)) { -direction } else { direction })
    }

    // ------------------------------------------------------------------
    // Cloning and adoption
    // ------------------------------------------------------------------

    fn snapshot(&self, key: NodeKey, recursive: bool, ids: &IdAllocator) -> Result<Snapshot, SceneError> {
        let root = self.node(key)?;
        let mut snapshot: Snapshot = vec![(root.object.clone_with_id(ids), root.kind.clone(), None)];
        if !recursive {
            return Ok(snapshot);
        }

        let mut stack: Vec<(NodeKey, usize)> =
            root.children.iter().rev().map(|&child| (child, 0)).collect();
        while let Some((k, parent_index)) = stack.pop() {
            let node = &self.nodes[k];
            snapshot.push((node.object.clone_with_id(ids), node.kind.clone(), Some(parent_index)));
            let index = snapshot.len() - 1;
            stack.extend(node.children.iter().rev().map(|&child| (child, index)));
        }
        Ok(snapshot)
    }

    fn insert_snapshot(&mut self, snapshot: Snapshot) -> Option<NodeKey> {
        let mut keys: Vec<NodeKey> = Vec::with_capacity(snapshot.len());
        for (object, kind, parent_index) in snapshot {
            let key = self.insert(object, kind);
            if let Some(parent) = parent_index.and_then(|i| keys.get(i).copied()) {
                self.nodes[key].parent = Some(parent);
                self.nodes[parent].children.push(key);
            }
            keys.push(key);
        }
        keys.first().copied()
    }

    /// Copy a node (and with `recursive`, its descendants) under fresh ids
    ///
    /// The copy is a detached root. Geometries and materials are shared.
    pub fn clone_subtree(&mut self, key: NodeKey, recursive: bool) -> Result<NodeKey, SceneError> {
        let snapshot = self.snapshot(key, recursive, &self.ids.clone())?;
        self.insert_snapshot(snapshot).ok_or(SceneError::MissingNode(key))
    }

    /// Copy a subtree of this graph into another graph
    pub fn clone_into(&self, key: NodeKey, target: &mut SceneGraph, recursive: bool) -> Result<NodeKey, SceneError> {
        let snapshot = self.snapshot(key, recursive, &target.ids)?;
        target.insert_snapshot(snapshot).ok_or(SceneError::MissingNode(key))
    }

    /// Overwrite `target`'s object state and kind with `source`'s
    ///
    /// With `recursive`, clones of `source`'s children are appended to
    /// `target`'s children.
    pub fn copy(&mut self, target: NodeKey, source: NodeKey, recursive: bool) -> Result<(), SceneError> {
        let source_node = self.node(source)?.clone();
        self.node(target)?;

        {
            let node = self.node_mut(target)?;
            node.object.copy_from(&source_node.object);
            node.kind = source_node.kind;
        }

        if recursive {
            for child in source_node.children {
                let copy = self.clone_subtree(child, true)?;
                self.add(target, copy)?;
            }
        }
        Ok(())
    }

    /// Move a subtree built in another graph (for example by a loader thread)
    /// into this one, returning its new root key
    ///
    /// Nodes keep their object ids, so both graphs should share an allocator.
    pub fn adopt(&mut self, mut other: SceneGraph, root: NodeKey) -> Result<NodeKey, SceneError> {
        other.node(root)?;
        other.detach(root);

        let mut new_root = None;
        let mut stack: Vec<(NodeKey, Option<NodeKey>)> = vec![(root, None)];
        while let Some((old_key, new_parent)) = stack.pop() {
            let Some(node) = other.nodes.remove(old_key) else {
                continue;
            };
            let new_key = self.insert(node.object, node.kind);
            if let Some(parent) = new_parent {
                self.nodes[new_key].parent = Some(parent);
                self.nodes[parent].children.push(new_key);
            } else {
                new_root = Some(new_key);
            }
            stack.extend(node.children.iter().rev().map(|&child| (child, Some(new_key))));
        }

        log::debug!("Adopted subtree into scene graph, now {} node(s)", self.len());
        new_root.ok_or(SceneError::MissingNode(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::ids::IdAllocator;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn graph() -> SceneGraph {
        SceneGraph::new(IdAllocator::new())
    }

    fn node_at(graph: &mut SceneGraph, position: Vec3) -> NodeKey {
        let key = graph.create(NodeKind::Empty);
        graph.object_mut(key).unwrap().position = position;
        key
    }

    fn chain(graph: &mut SceneGraph) -> (NodeKey, NodeKey, NodeKey) {
        let a = node_at(graph, Vec3::new(1.0, 0.0, 0.0));
        let b = node_at(graph, Vec3::new(0.0, 2.0, 0.0));
        let c = node_at(graph, Vec3::new(0.0, 0.0, 3.0));
        graph.add(a, b).unwrap();
        graph.add(b, c).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_three_level_chain_world_matrices() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.object_mut(b).unwrap().rotate_z(FRAC_PI_2);

        g.update_matrix_world(a, false).unwrap();

        let expected = g.object(a).unwrap().matrix() * g.object(b).unwrap().matrix() * g.object(c).unwrap().matrix();
        assert_relative_eq!(*g.object(c).unwrap().matrix_world(), expected, epsilon = EPSILON);
        assert_relative_eq!(
            g.object(c).unwrap().matrix_world().translation_part(),
            Vec3::new(1.0, 2.0, 3.0),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_cyclic_attach_is_rejected_and_tree_unchanged() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);

        let result = g.add(c, a);
        assert!(matches!(result, Err(SceneError::CyclicHierarchy { .. })));
        assert!(matches!(g.add(b, b), Err(SceneError::CyclicHierarchy { .. })));

        assert_eq!(g.parent(a), None);
        assert_eq!(g.parent(b), Some(a));
        assert_eq!(g.parent(c), Some(b));
        assert_eq!(g.children(c), &[] as &[NodeKey]);
        assert_eq!(g.children(a), &[b]);
    }

    #[test]
    fn test_add_reparents_and_remove_detaches() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.update_matrix_world(a, false).unwrap();
        let world_before = *g.object(c).unwrap().matrix_world();

        g.add(a, c).unwrap();
        assert_eq!(g.children(b), &[] as &[NodeKey]);
        assert_eq!(g.children(a), &[b, c]);

        assert!(g.remove(a, c));
        assert!(!g.remove(a, c));
        assert_eq!(g.parent(c), None);
        assert_eq!(*g.object(c).unwrap().matrix_world(), world_before);
        assert!(g.contains(c));
    }

    #[test]
    fn test_update_matrix_world_is_idempotent() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.object_mut(b).unwrap().scale = Vec3::new(1.0, 3.0, 1.0);

        g.update_matrix_world(a, false).unwrap();
        let first = *g.object(c).unwrap().matrix_world();
        g.update_matrix_world(a, false).unwrap();
        let second = *g.object(c).unwrap().matrix_world();

        assert_eq!(first, second);
    }

    #[test]
    fn test_pinned_matrix_persists_until_explicit_update() {
        let mut g = graph();
        let key = g.create(NodeKind::Empty);
        let injected = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        {
            let object = g.object_mut(key).unwrap();
            object.matrix_auto_update = false;
            object.set_matrix(injected);
            object.matrix_auto_update = true;
        }

        g.update_matrix_world(key, false).unwrap();
        assert_eq!(*g.object(key).unwrap().matrix_world(), injected);

        g.update_matrix(key).unwrap();
        g.update_matrix_world(key, false).unwrap();
        assert_eq!(*g.object(key).unwrap().matrix_world(), Mat4::identity());
    }

    #[test]
    fn test_camera_world_inverse_follows_world_pass() {
        let mut g = graph();
        let camera = g.create(NodeKind::Camera(Camera::perspective(50.0, 1.0, 0.1, 100.0).unwrap()));
        g.object_mut(camera).unwrap().position = Vec3::new(0.0, 0.0, 5.0);

        g.update_matrix_world(camera, false).unwrap();

        let world = *g.object(camera).unwrap().matrix_world();
        let inverse = g.camera(camera).unwrap().matrix_world_inverse();
        assert_relative_eq!(inverse * world, Mat4::identity(), epsilon = EPSILON);
        let group = g.create(NodeKind::Group);
        assert!(matches!(g.camera(group), Err(SceneError::WrongKind { expected: "camera", .. })));
    }

    #[test]
    fn test_clone_is_equal_by_value_and_independent() {
        let mut g = graph();
        let root = node_at(&mut g, Vec3::new(1.0, 1.0, 1.0));
        let child = node_at(&mut g, Vec3::new(0.0, 4.0, 0.0));
        g.add(root, child).unwrap();

        let copy = g.clone_subtree(root, true).unwrap();

        assert_ne!(copy, root);
        assert_ne!(g.object(copy).unwrap().id(), g.object(root).unwrap().id());
        assert_eq!(g.object(copy).unwrap().position, g.object(root).unwrap().position);
        assert_eq!(g.object(copy).unwrap().quaternion, g.object(root).unwrap().quaternion);
        assert_eq!(g.object(copy).unwrap().scale, g.object(root).unwrap().scale);
        assert_eq!(g.children(copy).len(), g.children(root).len());

        let copied_child = g.children(copy)[0];
        g.object_mut(copied_child).unwrap().position.x = 99.0;
        assert_relative_eq!(g.object(child).unwrap().position.x, 0.0);
        assert_eq!(g.parent(copy), None);
    }

    #[test]
    fn test_copy_appends_cloned_children() {
        let mut g = graph();
        let source = node_at(&mut g, Vec3::new(2.0, 0.0, 0.0));
        let source_child = g.create(NodeKind::Group);
        g.add(source, source_child).unwrap();
        let target = g.create(NodeKind::Empty);
        let target_id = g.object(target).unwrap().id();

        g.copy(target, source, true).unwrap();

        assert_eq!(g.object(target).unwrap().id(), target_id);
        assert_eq!(g.object(target).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(g.children(target).len(), 1);
        assert_ne!(g.children(target)[0], source_child);
    }

    #[test]
    fn test_attach_keeps_world_transform() {
        let mut g = graph();
        let parent = node_at(&mut g, Vec3::new(10.0, 0.0, 0.0));
        g.object_mut(parent).unwrap().scale = Vec3::new(2.0, 2.0, 2.0);
        let child = node_at(&mut g, Vec3::new(1.0, 1.0, 1.0));

        g.attach(parent, child).unwrap();
        g.update_matrix_world(parent, false).unwrap();

        assert_relative_eq!(g.world_position(child).unwrap(), Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(g.object(child).unwrap().scale, Vec3::new(0.5, 0.5, 0.5), epsilon = EPSILON);
    }

    #[test]
    fn test_attach_refreshes_world_matrix_immediately() {
        let mut g = graph();
        let old_parent = node_at(&mut g, Vec3::new(0.0, 5.0, 0.0));
        let parent = node_at(&mut g, Vec3::new(10.0, 0.0, 0.0));
        g.object_mut(parent).unwrap().scale = Vec3::new(2.0, 2.0, 2.0);
        let child = node_at(&mut g, Vec3::new(1.0, 1.0, 1.0));
        let grandchild = node_at(&mut g, Vec3::new(0.0, 0.0, 1.0));
        g.add(child, grandchild).unwrap();

        g.attach(parent, child).unwrap();
        assert_relative_eq!(
            g.object(child).unwrap().matrix_world().translation_part(),
            Vec3::new(1.0, 1.0, 1.0),
            epsilon = EPSILON
        );
        assert_relative_eq!(
            g.object(grandchild).unwrap().matrix_world().translation_part(),
            Vec3::new(1.0, 1.0, 2.0),
            epsilon = EPSILON
        );

        g.attach(old_parent, child).unwrap();
        assert_relative_eq!(
            g.object(child).unwrap().matrix_world().translation_part(),
            Vec3::new(1.0, 1.0, 1.0),
            epsilon = EPSILON
        );
        assert_eq!(g.parent(child), Some(old_parent));
    }

    #[test]
    fn test_remove_subtree_frees_descendants() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);

        assert_eq!(g.remove_subtree(b).unwrap(), 2);
        assert!(!g.contains(b));
        assert!(!g.contains(c));
        assert_eq!(g.children(a), &[] as &[NodeKey]);
        assert!(matches!(g.remove_subtree(b), Err(SceneError::MissingNode(_))));
    }

    #[test]
    fn test_traversal_order_and_visibility() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        let d = g.create(NodeKind::Empty);
        g.add(a, d).unwrap();

        let mut order = Vec::new();
        g.traverse(a, |key, _| order.push(key));
        assert_eq!(order, vec![a, b, c, d]);

        g.object_mut(b).unwrap().visible = false;
        let mut visible = Vec::new();
        g.traverse_visible(a, |key, _| visible.push(key));
        assert_eq!(visible, vec![a, d]);

        let mut ancestors = Vec::new();
        g.traverse_ancestors(c, |key, _| ancestors.push(key));
        assert_eq!(ancestors, vec![b, a]);

        g.traverse_mut(a, |_, object| object.render_order = 3);
        assert_eq!(g.object(c).unwrap().render_order, 3);
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let mut g = graph();
        let (a, _, c) = chain(&mut g);
        g.object_mut(c).unwrap().name = "leaf".to_string();
        let id = g.object(c).unwrap().id();

        assert_eq!(g.get_object_by_id(a, id), Some(c));
        assert_eq!(g.get_object_by_name(a, "leaf"), Some(c));
        assert_eq!(g.get_object_by_name(a, "missing"), None);
    }

    #[test]
    fn test_local_world_conversions() {
        let mut g = graph();
        let (a, _, c) = chain(&mut g);
        g.update_matrix_world(a, false).unwrap();

        let world = g.local_to_world(c, &Vec3::new(0.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(world, Vec3::new(1.0, 2.0, 4.0), epsilon = EPSILON);
        assert_relative_eq!(g.world_to_local(c, &world).unwrap(), Vec3::new(0.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_directions() {
        let mut g = graph();
        let target = Vec3::new(10.0, 0.0, 0.0);

        let mesh = g.create(NodeKind::Empty);
        g.look_at(mesh, &target).unwrap();
        assert_relative_eq!(g.world_direction(mesh).unwrap(), Vec3::x(), epsilon = EPSILON);

        let camera = g.create(NodeKind::Camera(Camera::perspective(50.0, 1.0, 0.1, 100.0).unwrap()));
        g.look_at(camera, &target).unwrap();
        assert_relative_eq!(g.world_direction(camera).unwrap(), Vec3::x(), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_compensates_parent_rotation() {
        let mut g = graph();
        let parent = g.create(NodeKind::Group);
        g.object_mut(parent).unwrap().rotate_y(FRAC_PI_2);
        let child = g.create(NodeKind::Empty);
        g.add(parent, child).unwrap();

        g.look_at(child, &Vec3::new(0.0, 0.0, -10.0)).unwrap();
        assert_relative_eq!(g.world_direction(child).unwrap(), -Vec3::z(), epsilon = EPSILON);
    }

    #[test]
    fn test_world_getters_refresh_ancestors() {
        let mut g = graph();
        let (a, b, c) = chain(&mut g);
        g.object_mut(b).unwrap().scale = Vec3::new(2.0, 2.0, 2.0);

        assert_relative_eq!(g.world_position(c).unwrap(), Vec3::new(1.0, 2.0, 6.0), epsilon = EPSILON);
        assert_relative_eq!(g.world_scale(c).unwrap(), Vec3::new(2.0, 2.0, 2.0), epsilon = EPSILON);
        assert_relative_eq!(
            g.world_quaternion(a).unwrap().angle(),
            0.0,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_adopt_moves_loader_subtree() {
        let ids = IdAllocator::new();
        let mut main = SceneGraph::new(ids.clone());
        let scene_root = main.create(NodeKind::Empty);

        let mut loaded = SceneGraph::new(ids);
        let (a, _, c) = chain(&mut loaded);
        loaded.object_mut(c).unwrap().name = "leaf".to_string();

        let adopted = main.adopt(loaded, a).unwrap();
        main.add(scene_root, adopted).unwrap();

        assert_eq!(main.len(), 4);
        assert!(main.get_object_by_name(scene_root, "leaf").is_some());
        assert_eq!(main.roots().count(), 1);
    }

    #[test]
    fn test_clone_into_other_graph_uses_target_ids() {
        let mut source = graph();
        let (a, _, _) = chain(&mut source);
        let mut target = graph();

        let copy = source.clone_into(a, &mut target, true).unwrap();
        assert_eq!(target.len(), 3);
        assert_eq!(target.object(copy).unwrap().id(), ObjectId(0));
        assert_eq!(source.len(), 3);
    }
}
