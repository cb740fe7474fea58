//! Tree operations: create, insert, detach, remove, clone, walk.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeId};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Node storage backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that removal is O(subtree size) and lookup is O(1).
/// A node without a parent is detached; it stays alive until removed.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
}

impl Dom {
    /// Create an empty DOM.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
        }
    }

    /// Insert a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        id
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Whether `node` may be placed under `parent` without creating a cycle.
    fn can_adopt(&self, parent: NodeId, node: NodeId) -> bool {
        self.contains(parent)
            && self.contains(node)
            && parent != node
            && !self.ancestors(parent).contains(&node)
    }

    /// Move `node` to the end of `parent`'s children. Returns false if either
    /// node is missing or `node` is an ancestor of `parent`.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> bool {
        let len = self.children(parent).len();
        self.insert_at(parent, node, len)
    }

    /// Move `node` to the front of `parent`'s children.
    pub fn prepend_child(&mut self, parent: NodeId, node: NodeId) -> bool {
        self.insert_at(parent, node, 0)
    }

    /// Move `node` directly before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        if !self.can_adopt(parent, node) || node == reference {
            return false;
        }
        self.detach(node);
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.link(parent, node, index);
        true
    }

    /// Move `node` directly after `reference` under the same parent.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        if !self.can_adopt(parent, node) || node == reference {
            return false;
        }
        self.detach(node);
        let index = self.index_in_parent(reference).map_or(0, |i| i + 1);
        self.link(parent, node, index);
        true
    }

    fn insert_at(&mut self, parent: NodeId, node: NodeId, index: usize) -> bool {
        if !self.can_adopt(parent, node) {
            return false;
        }
        self.detach(node);
        self.link(parent, node, index);
        true
    }

    fn link(&mut self, parent: NodeId, node: NodeId, index: usize) {
        self.parent.insert(node, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, node);
        }
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Unlink `node` from its parent, keeping its subtree alive.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent.remove(node) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&child| child != node);
            }
        }
    }

    /// Remove a node and all its descendants.
    ///
    /// Returns every removed id in pre-order, or an empty vec if `id` did not
    /// exist.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }
        self.detach(id);
        let removed = self.walk_depth_first(id);
        for &current in &removed {
            self.children.remove(current);
            self.parent.remove(current);
            self.nodes.remove(current);
        }
        removed
    }

    /// Remove every child subtree of `id`. Returns the removed ids.
    pub fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let kids = self.children(id).to_vec();
        kids.into_iter().flat_map(|child| self.remove(child)).collect()
    }

    // -----------------------------------------------------------------------
    // Cloning
    // -----------------------------------------------------------------------

    /// Deep-copy the subtree rooted at `id` into a new detached subtree.
    pub fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let data = self.nodes.get(id)?.clone();
        let copy = self.create(data);
        for child in self.children(id).to_vec() {
            if let Some(child_copy) = self.clone_subtree(child) {
                self.link(copy, child_copy, usize::MAX);
            }
        }
        Some(copy)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no
    /// children or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Position of `id` among its siblings.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Walk from `id` up to the top, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Nearest of `id` or its ancestors matching `predicate`.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&NodeData) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.nodes.get(n).is_some_and(&predicate))
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// Number of nodes in the DOM, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the DOM is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Pre-order depth-first traversal starting from `start` (inclusive).
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Breadth-first traversal starting from `start` (inclusive).
    pub fn walk_breadth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            for &child in self.children(current) {
                queue.push_back(child);
            }
        }
        result
    }

    /// Descendants of `start` in tree order, excluding `start`.
    pub fn descendants(&self, start: NodeId) -> Vec<NodeId> {
        let mut all = self.walk_depth_first(start);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
