//! DOM queries: by id, class, tag, attribute; generic predicate matching.
//!
//! Every query is scoped to the subtree under `root` (inclusive) and returns
//! matches in tree order.

use super::node::{NodeData, NodeId};
use super::tree::Dom;

impl Dom {
    /// First element in the subtree whose id matches.
    pub fn query_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.query_first(root, |data| data.id.as_deref() == Some(id))
    }

    /// All elements in the subtree carrying the given class.
    pub fn query_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.query_all(root, |data| data.has_class(class))
    }

    /// All elements in the subtree with the given tag name.
    pub fn query_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.query_all(root, |data| data.is_element() && data.tag == tag)
    }

    /// All elements in the subtree that have the named attribute.
    pub fn query_by_attribute(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.query_all(root, |data| data.is_element() && data.has_attribute(name))
    }

    /// All nodes in the subtree matching an arbitrary predicate.
    pub fn query_all(&self, root: NodeId, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.iter_subtree(root)
            .filter(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
            .collect()
    }

    /// First node in the subtree matching a predicate.
    pub fn query_first(
        &self,
        root: NodeId,
        predicate: impl Fn(&NodeData) -> bool,
    ) -> Option<NodeId> {
        self.iter_subtree(root)
            .find(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
    }

    fn iter_subtree(&self, root: NodeId) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.walk_depth_first(root)
            .into_iter()
            .filter_map(move |id| self.get(id).map(|data| (id, data)))
    }
}
