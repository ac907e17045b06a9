/// Hierarchical transform tree for the orrery
///
/// Nodes live in a `hecs::World` arena and reference each other through
/// `Entity` handles, so a reparent can be checked for cycles before it is
/// applied. World matrices are derived top-down from local matrices.

use glam::Mat4;
use hecs::{Entity, World};

use crate::error::SceneError;
use crate::material::DrawRecord;

/// Handle of a node in the scene graph
pub type NodeId = Entity;

/// Transform relative to the parent node
#[derive(Debug, Clone, Copy)]
pub struct LocalTransform(pub Mat4);

/// Transform relative to the scene root, overwritten on every update
#[derive(Debug, Clone, Copy)]
pub struct WorldTransform(pub Mat4);

/// Non-owning back reference to the parent node
#[derive(Debug, Clone, Copy)]
pub struct Parent(pub Entity);

/// Ordered list of child nodes
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<Entity>);

#[derive(Debug, Clone)]
pub struct Name(pub String);

/// Role of a node in the solar system hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Pivot that revolves its children around its parent
    Orbit,
    /// Visible celestial body that spins in place
    Body,
}

/// Rotation about the local Y axis applied per animation step (radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularRate(pub f32);

/// Scene graph managing the transform tree
pub struct SceneGraph {
    world: World,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    /// Add a detached node with the given local transform
    pub fn spawn(&mut self, name: &str, kind: NodeKind, local: Mat4) -> NodeId {
        self.world.spawn((
            Name(name.to_string()),
            kind,
            LocalTransform(local),
            WorldTransform(Mat4::IDENTITY),
            Children::default(),
        ))
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.world.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.world.contains(node)
    }

    /// Attach `node` under `parent`, or detach it when `parent` is `None`.
    ///
    /// The node is first removed from its current parent's child list (no-op
    /// if it is not found there) and then appended to the new parent's list,
    /// so repeating the same call leaves exactly one entry.
    pub fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.world.contains(node) {
            return Err(SceneError::UnknownNode(node));
        }
        if let Some(new_parent) = parent {
            if !self.world.contains(new_parent) {
                return Err(SceneError::UnknownNode(new_parent));
            }
            if new_parent == node || self.is_ancestor(node, new_parent) {
                return Err(SceneError::Cycle { child: node, parent: new_parent });
            }
        }

        if let Some(old_parent) = self.parent(node) {
            if let Ok(mut children) = self.world.get::<&mut Children>(old_parent) {
                if let Some(index) = children.0.iter().position(|&c| c == node) {
                    children.0.remove(index);
                }
            }
        }

        match parent {
            Some(new_parent) => {
                if let Ok(mut children) = self.world.get::<&mut Children>(new_parent) {
                    children.0.push(node);
                }
                let _ = self.world.insert_one(node, Parent(new_parent));
            }
            None => {
                let _ = self.world.remove_one::<Parent>(node);
            }
        }

        Ok(())
    }

    /// True if `ancestor` appears on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        // Bounded by node count
        let mut remaining = self.len();
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            if remaining == 0 {
                return false;
            }
            remaining -= 1;
            current = self.parent(p);
        }
        false
    }

    /// Recompute world matrices for `root` and everything below it.
    ///
    /// Depth-first, parent before children, siblings in child-list order.
    /// `root` is treated as a scene root: its world matrix equals its local
    /// matrix regardless of any parent it may have.
    pub fn update_world_matrices(&mut self, root: NodeId) {
        self.update_recursive(root, None);
    }

    /// Recompute world matrices starting from every parentless node
    pub fn update_all(&mut self) {
        for root in self.roots() {
            self.update_recursive(root, None);
        }
    }

    fn update_recursive(&mut self, node: NodeId, parent_world: Option<Mat4>) {
        let local = self.local(node);
        let world = match parent_world {
            Some(parent_mat) => parent_mat * local,
            None => local,
        };

        if let Ok(mut w) = self.world.get::<&mut WorldTransform>(node) {
            w.0 = world;
        }

        // Collect children first so the world borrow is released
        let children = self.children(node);
        for child in children {
            self.update_recursive(child, Some(world));
        }
    }

    /// Parentless nodes
    pub fn roots(&self) -> Vec<NodeId> {
        self.world
            .query::<&Name>()
            .without::<&Parent>()
            .iter()
            .map(|(entity, _)| entity)
            .collect()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.world.get::<&Parent>(node).ok().map(|p| p.0)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.world
            .get::<&Children>(node)
            .map(|c| c.0.clone())
            .unwrap_or_default()
    }

    /// All nodes below `node`, depth-first
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut descendants = Vec::new();
        for child in self.children(node) {
            descendants.push(child);
            descendants.extend(self.descendants(child));
        }
        descendants
    }

    pub fn local(&self, node: NodeId) -> Mat4 {
        self.world
            .get::<&LocalTransform>(node)
            .map(|l| l.0)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn set_local(&mut self, node: NodeId, local: Mat4) {
        if let Ok(mut l) = self.world.get::<&mut LocalTransform>(node) {
            l.0 = local;
        }
    }

    pub fn world_matrix(&self, node: NodeId) -> Mat4 {
        self.world
            .get::<&WorldTransform>(node)
            .map(|w| w.0)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn name(&self, node: NodeId) -> Option<String> {
        self.world.get::<&Name>(node).ok().map(|n| n.0.clone())
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.world.get::<&NodeKind>(node).ok().map(|k| *k)
    }

    /// Look a node up by name (first match)
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.world
            .query::<&Name>()
            .iter()
            .find(|(_, n)| n.0 == name)
            .map(|(entity, _)| entity)
    }

    pub fn set_angular_rate(&mut self, node: NodeId, rate: f32) {
        let _ = self.world.insert_one(node, AngularRate(rate));
    }

    pub fn angular_rate(&self, node: NodeId) -> Option<f32> {
        self.world.get::<&AngularRate>(node).ok().map(|r| r.0)
    }

    pub fn attach_draw_record(&mut self, node: NodeId, record: DrawRecord) {
        let _ = self.world.insert_one(node, record);
    }

    pub fn draw_record(&self, node: NodeId) -> Option<DrawRecord> {
        self.world.get::<&DrawRecord>(node).ok().map(|r| (*r).clone())
    }

    /// Nodes that carry a draw record
    pub fn drawables(&self) -> Vec<NodeId> {
        self.world
            .query::<&DrawRecord>()
            .iter()
            .map(|(entity, _)| entity)
            .collect()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn node(graph: &mut SceneGraph, name: &str) -> NodeId {
        graph.spawn(name, NodeKind::Orbit, Mat4::IDENTITY)
    }

    #[test]
    fn test_spawned_node_is_root() {
        let mut graph = SceneGraph::new();
        let a = node(&mut graph, "a");
        assert_eq!(graph.parent(a), None);
        assert_eq!(graph.roots(), vec![a]);
        assert!(graph.children(a).is_empty());
    }

    #[test]
    fn test_set_parent_is_idempotent() {
        let mut graph = SceneGraph::new();
        let p = node(&mut graph, "p");
        let n = node(&mut graph, "n");

        graph.set_parent(n, Some(p)).unwrap();
        graph.set_parent(n, Some(p)).unwrap();

        assert_eq!(graph.children(p), vec![n]);
        assert_eq!(graph.parent(n), Some(p));
    }

    #[test]
    fn test_detach_removes_from_parent() {
        let mut graph = SceneGraph::new();
        let p = node(&mut graph, "p");
        let n = node(&mut graph, "n");
        graph.set_parent(n, Some(p)).unwrap();

        graph.set_parent(n, None).unwrap();

        assert!(graph.children(p).is_empty());
        assert_eq!(graph.parent(n), None);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut graph = SceneGraph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        graph.set_parent(b, Some(a)).unwrap();
        graph.set_parent(c, Some(b)).unwrap();

        assert_eq!(
            graph.set_parent(a, Some(c)),
            Err(SceneError::Cycle { child: a, parent: c })
        );
        assert_eq!(
            graph.set_parent(a, Some(a)),
            Err(SceneError::Cycle { child: a, parent: a })
        );
        assert_eq!(graph.parent(a), None);
        assert!(graph.children(c).is_empty());
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let mut graph = SceneGraph::new();
        let a = node(&mut graph, "a");
        let gone = node(&mut graph, "gone");
        graph.world.despawn(gone).unwrap();

        assert_eq!(graph.set_parent(a, Some(gone)), Err(SceneError::UnknownNode(gone)));
    }

    #[test]
    fn test_world_matrix_chains_locals() {
        let mut graph = SceneGraph::new();
        let root = graph.spawn("root", NodeKind::Root, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let child = graph.spawn("child", NodeKind::Orbit, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        let leaf = graph.spawn("leaf", NodeKind::Body, Mat4::from_scale(Vec3::splat(3.0)));
        graph.set_parent(child, Some(root)).unwrap();
        graph.set_parent(leaf, Some(child)).unwrap();

        graph.update_world_matrices(root);

        assert_eq!(graph.world_matrix(root), graph.local(root));
        assert_eq!(graph.world_matrix(child), graph.world_matrix(root) * graph.local(child));
        assert_eq!(graph.world_matrix(leaf), graph.world_matrix(child) * graph.local(leaf));
        let origin = graph.world_matrix(leaf).transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut graph = SceneGraph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let c = node(&mut graph, "c");
        let d = node(&mut graph, "d");
        graph.set_parent(b, Some(a)).unwrap();
        graph.set_parent(c, Some(b)).unwrap();
        graph.set_parent(d, Some(a)).unwrap();

        assert_eq!(graph.descendants(a), vec![b, c, d]);
        assert_eq!(graph.find("c"), Some(c));
    }
}
