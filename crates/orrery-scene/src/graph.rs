//! Arena-backed scene hierarchy.
//!
//! Nodes live in a slot vector and refer to each other by [`NodeId`]. A
//! node's world transform is its parent's world transform composed with its
//! own local transform, so rotating a pivot carries every descendant along.

use crate::camera::Camera;
use crate::layer::Layer;
use crate::material::MeshDesc;
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Handle to a node in a [`Scene`]. Ids are never reused after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Local transform relative to the parent node.
///
/// `rotation` holds Euler angles in radians applied in X, then Y, then Z
/// order about the node's own axes. Angles are unbounded and accumulate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.position)
    }
}

/// What a node is, beyond its place in the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Grouping node with no visual of its own.
    Pivot,
    Mesh(MeshDesc),
    Camera(Camera),
    AmbientLight { color: Vec3, intensity: f32 },
    PointLight {
        color: Vec3,
        intensity: f32,
        cast_shadows: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    layer: Layer,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: impl Into<String>, kind: NodeKind, layer: Layer) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            cast_shadows: false,
            receive_shadows: false,
            layer,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn pivot(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Pivot, Layer::Base)
    }

    pub fn mesh(name: impl Into<String>, layer: Layer, mesh: MeshDesc) -> Self {
        Self::new(name, NodeKind::Mesh(mesh), layer)
    }

    pub fn camera(name: impl Into<String>, camera: Camera) -> Self {
        Self::new(name, NodeKind::Camera(camera), Layer::Base)
    }

    pub fn ambient_light(name: impl Into<String>, color: Vec3, intensity: f32) -> Self {
        Self::new(name, NodeKind::AmbientLight { color, intensity }, Layer::Base)
    }

    pub fn point_light(name: impl Into<String>, color: Vec3, intensity: f32) -> Self {
        Self::new(
            name,
            NodeKind::PointLight {
                color,
                intensity,
                cast_shadows: false,
            },
            Layer::Base,
        )
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadows = cast;
        self.receive_shadows = receive;
        if let NodeKind::PointLight { cast_shadows, .. } = &mut self.kind {
            *cast_shadows = cast;
        }
        self
    }

    /// Render layer, fixed at creation.
    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn mesh_desc(&self) -> Option<&MeshDesc> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// The node hierarchy. Roots and children are kept in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node as a new root and return its id.
    pub fn add(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = None;
        node.children.clear();
        self.nodes.push(Some(node));
        self.roots.push(id);
        id
    }

    /// Insert a node directly under `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.add(node);
        self.attach(parent, id);
        id
    }

    /// Move `child` (with its subtree) under `parent`, appending it last.
    ///
    /// # Panics
    ///
    /// Panics if either id is not live, or if the move would make a node its
    /// own ancestor.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        assert!(self.contains(parent), "attach: parent {parent:?} is not in the scene");
        assert!(self.contains(child), "attach: child {child:?} is not in the scene");
        assert!(
            parent != child && !self.is_ancestor(child, parent),
            "attach: {child:?} under {parent:?} would create a cycle"
        );

        self.detach(child);
        self.node_mut_unchecked(child).parent = Some(parent);
        self.node_mut_unchecked(parent).children.push(child);
    }

    /// Remove `id` and its whole subtree. Returns the number of nodes removed.
    pub fn remove(&mut self, id: NodeId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        self.detach(id);

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes[next.0].take() {
                stack.extend(node.children);
                removed += 1;
            }
        }
        removed
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(Option::is_some)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.node_mut(id).map(|node| &mut node.transform)
    }

    pub fn camera(&self, id: NodeId) -> Option<&Camera> {
        match &self.node(id)?.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self, id: NodeId) -> Option<&mut Camera> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    /// First node (in traversal order) with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.node(*id).is_some_and(|node| node.name == name))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first, pre-order walk in insertion order.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.visit(|id, _, _| order.push(id));
        order
    }

    /// Walk the scene depth-first, handing each node its world matrix.
    pub fn visit(&self, mut f: impl FnMut(NodeId, &Node, Mat4)) {
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            let world = parent_world * node.transform.local_matrix();
            f(id, node, world);
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }

    /// Composed transform of `id` and all its ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.node(id)?;
        let mut world = node.transform.local_matrix();
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
            world = node.transform.local_matrix() * world;
        }
        Some(world)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|world| world.transform_point3(Vec3::ZERO))
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        while let Some(parent) = self.node(id).and_then(|node| node.parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        match self.node(id).and_then(|node| node.parent) {
            Some(parent) => {
                if let Some(parent) = self.node_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    fn node_mut_unchecked(&mut self, id: NodeId) -> &mut Node {
        match self.node_mut(id) {
            Some(node) => node,
            None => unreachable!("node {id:?} checked live by caller"),
        }
    }
}
