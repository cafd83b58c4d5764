use strata_geom::Vec3;

use crate::collab::{NodeId, RenderableId, SceneGraph};

#[derive(Clone, Debug)]
struct Node {
    parent: Option<NodeId>,
    offset: Vec3,
    children: Vec<NodeId>,
    attached: Vec<RenderableId>,
    dirty: bool,
}

/// Minimal translation-only scene graph backed by a slot arena.
#[derive(Debug)]
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    root: NodeId,
}

impl SceneTree {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            offset: Vec3::ZERO,
            children: Vec::new(),
            attached: Vec::new(),
            dirty: false,
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn attached(&self, node: NodeId) -> &[RenderableId] {
        self.get(node).map(|n| n.attached.as_slice()).unwrap_or(&[])
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.get(node).map(|n| n.dirty).unwrap_or(false)
    }

    /// Clears all dirty flags, returning how many were set.
    pub fn flush_dirty(&mut self) -> usize {
        let mut n = 0;
        for node in self.nodes.iter_mut().flatten() {
            if node.dirty {
                node.dirty = false;
                n += 1;
            }
        }
        n
    }

    pub fn set_offset(&mut self, node: NodeId, offset: Vec3) {
        if let Some(n) = self.get_mut(node) {
            n.offset = offset;
            n.dirty = true;
        }
    }

    fn get(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.0 as usize).and_then(|n| n.as_ref())
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node.0 as usize).and_then(|n| n.as_mut())
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for SceneTree {
    fn create_child(&mut self, parent: NodeId, offset: Vec3) -> NodeId {
        let node = Node {
            parent: Some(parent),
            offset,
            children: Vec::new(),
            attached: Vec::new(),
            dirty: true,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId((self.nodes.len() - 1) as u32)
            }
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    fn destroy_node(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        let Some(removed) = self.nodes.get_mut(node.0 as usize).and_then(|n| n.take()) else {
            return;
        };
        if let Some(parent) = removed.parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != node);
        }
        self.free.push(node.0);
        let mut stack = removed.children;
        while let Some(child) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(child.0 as usize).and_then(|n| n.take()) {
                stack.extend(n.children);
                self.free.push(child.0);
            }
        }
    }

    fn detach_all(&mut self, node: NodeId) {
        if let Some(n) = self.get_mut(node) {
            if !n.attached.is_empty() {
                n.attached.clear();
                n.dirty = true;
            }
        }
    }

    fn attach(&mut self, node: NodeId, renderable: RenderableId) {
        if let Some(n) = self.get_mut(node) {
            if !n.attached.contains(&renderable) {
                n.attached.push(renderable);
                n.dirty = true;
            }
        }
    }

    fn detach(&mut self, node: NodeId, renderable: RenderableId) {
        if let Some(n) = self.get_mut(node) {
            let before = n.attached.len();
            n.attached.retain(|r| *r != renderable);
            if n.attached.len() != before {
                n.dirty = true;
            }
        }
    }

    fn world_position(&self, node: NodeId) -> Option<Vec3> {
        let mut cur = self.get(node)?;
        let mut pos = cur.offset;
        while let Some(parent) = cur.parent {
            cur = self.get(parent)?;
            pos += cur.offset;
        }
        Some(pos)
    }

    fn mark_dirty(&mut self, node: NodeId) {
        if let Some(n) = self.get_mut(node) {
            n.dirty = true;
        }
    }
}
