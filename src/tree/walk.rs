//! Restartable depth-first walks over the tree.
//!
//! Each walk owns an explicit stack, so calling `walk_groups` twice yields
//! two independent iterators over the same tree.

use super::{KindFilter, NodeRef, NodeTree};
use crate::translation::TranslationMap;
use crate::types::NodeId;

/// Depth-first walk yielding nodes that match a filter, parents first
pub struct NodeWalk<'a> {
    tree: &'a NodeTree,
    names: &'a TranslationMap,
    stack: Vec<NodeId>,
    filter: KindFilter,
}

impl<'a> NodeWalk<'a> {
    pub(crate) fn new(
        tree: &'a NodeTree,
        names: &'a TranslationMap,
        start: NodeId,
        filter: KindFilter,
    ) -> Self {
        Self {
            tree,
            names,
            stack: vec![start],
            filter,
        }
    }
}

impl<'a> Iterator for NodeWalk<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            self.stack
                .extend(self.tree.children(id).iter().rev().map(|(_, child)| *child));
            let node = NodeRef::new(self.tree, self.names, id);
            if self.filter.matches(node.class()) {
                return Some(node);
            }
        }
        None
    }
}

/// Depth-first walk over groups only
pub struct GroupWalk<'a>(NodeWalk<'a>);

impl<'a> GroupWalk<'a> {
    pub(crate) fn new(tree: &'a NodeTree, names: &'a TranslationMap, start: NodeId) -> Self {
        GroupWalk(NodeWalk::new(tree, names, start, KindFilter::Group))
    }
}

impl<'a> Iterator for GroupWalk<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}
