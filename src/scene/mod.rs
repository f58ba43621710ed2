//! Scene graph
//!
//! Nodes live in an arena owned by [`SceneGraph`] and are addressed by
//! [`NodeId`]. Every node except the root has exactly one parent, and a node
//! can only be attached once, so the graph is always a tree.

pub mod arrow;
pub mod camera;
pub mod light;
pub mod transform;

pub use arrow::{ArrowControlPoints, ArrowController};
pub use camera::Camera;
pub use light::{GpuLightData, Light};
pub use transform::Transform;

use glam::Mat4;
use thiserror::Error;

use crate::pipeline::PipelineKind;
use crate::resources::{GpuMesh, Material};

/// Scene graph invariant violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("Node {0:?} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("The root node cannot be attached")]
    RootAttached,
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

/// Index of a node in its [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Selects the uniform layout a node is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Default,
    /// Bent along the arrow control points at draw time
    Arrow,
}

/// Renderable content of a node
#[derive(Debug, Clone)]
pub struct Entity {
    pub mesh: Option<GpuMesh>,
    pub material: Material,
    /// Pipeline to draw with instead of the default lit pipeline
    pub pipeline: Option<PipelineKind>,
}

impl Entity {
    pub fn new(mesh: GpuMesh, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            material,
            pipeline: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineKind) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
}

/// A named element of the scene graph
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub entity: Option<Entity>,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            entity: None,
            kind: NodeKind::Default,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Tree of nodes rooted at [`SceneGraph::root`]
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("root")],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Insert a detached node. Attach it with [`Self::add_child`].
    pub fn create_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            ..node
        });
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `child` to the children of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if self.node(parent).is_none() {
            return Err(SceneError::UnknownNode(parent));
        }
        let child_node = self.node(child).ok_or(SceneError::UnknownNode(child))?;
        if child == self.root() {
            return Err(SceneError::RootAttached);
        }
        if child_node.parent.is_some() {
            return Err(SceneError::AlreadyAttached(child));
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// `id` followed by its parent, grandparent and so on up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |n| self.node(*n).and_then(|node| node.parent))
    }

    /// Local transforms of `id` and its ancestors composed root to leaf.
    pub fn world_transform(&self, id: NodeId) -> Mat4 {
        self.ancestors(id)
            .filter_map(|n| self.node(n))
            .fold(Mat4::IDENTITY, |acc, node| node.transform.matrix() * acc)
    }

    /// Direct children of the root in insertion order.
    pub fn root_children(&self) -> &[NodeId] {
        &self.nodes[0].children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn graph_with_chain() -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node(Node::new("parent").with_transform(
            Transform::from_position_rotation(
                Vec3::new(1.0, 2.0, 3.0),
                Quat::from_rotation_y(0.7),
            ),
        ));
        let child = graph.create_node(
            Node::new("child")
                .with_transform(Transform::from_position(Vec3::new(0.0, 0.0, -2.0)).with_scale(Vec3::splat(0.5))),
        );
        let root = graph.root();
        graph.add_child(root, parent).unwrap();
        graph.add_child(parent, child).unwrap();
        (graph, parent, child)
    }

    #[test]
    fn world_transform_composes_root_to_leaf() {
        let (graph, parent, child) = graph_with_chain();
        let expected = graph.world_transform(parent) * graph.node(child).unwrap().transform.matrix();
        assert!(graph.world_transform(child).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn root_children_keep_insertion_order() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Node::new("a"));
        let b = graph.create_node(Node::new("b"));
        let root = graph.root();
        graph.add_child(root, b).unwrap();
        graph.add_child(root, a).unwrap();
        assert_eq!(graph.root_children(), &[b, a]);
    }

    #[test]
    fn rejects_second_parent() {
        let (mut graph, _, child) = graph_with_chain();
        let root = graph.root();
        assert_eq!(graph.add_child(root, child), Err(SceneError::AlreadyAttached(child)));
    }

    #[test]
    fn rejects_cycles_and_root() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node(Node::new("a"));
        let b = graph.create_node(Node::new("b"));
        graph.add_child(a, b).unwrap();
        assert_eq!(graph.add_child(b, a), Err(SceneError::Cycle { parent: b, child: a }));
        assert_eq!(graph.add_child(a, graph.root()), Err(SceneError::RootAttached));
    }

    #[test]
    fn unknown_nodes_are_reported() {
        let mut graph = SceneGraph::new();
        let bogus = NodeId(42);
        assert_eq!(graph.add_child(graph.root(), bogus), Err(SceneError::UnknownNode(bogus)));
    }
}
