//! Node Tree
//!
//! Hierarchical namespace of groups and leaves held as an arena keyed by
//! [`NodeId`]. Groups own their children through an insertion-ordered id
//! list; the parent link on each node is a lookup key only. Paths are never
//! stored, they are recomputed from parent links, so a rename is visible in
//! every descendant path immediately.
//!
//! All names handled here are stored names; display translation happens in
//! [`NodeRef`] and the session.

pub mod node;
pub mod walk;

pub use node::{GroupNode, KindFilter, Node, NodeClass, NodeKind};
pub use walk::{GroupWalk, NodeWalk};

use crate::catalog::Catalog;
use crate::error::{StorageError, TreeError};
use crate::translation::TranslationMap;
use crate::types::NodeId;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Check that `name` is usable as a path segment: non-empty and `/`-free
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() {
        return Err(TreeError::InvalidName("names must not be empty".to_string()));
    }
    if name.contains('/') {
        return Err(TreeError::InvalidName(format!(
            "'{}' contains a path separator",
            name
        )));
    }
    Ok(())
}

/// Split an absolute path into its segments; `/` yields no segments
pub fn split_path(path: &str) -> Result<Vec<&str>, TreeError> {
    if !path.starts_with('/') {
        return Err(TreeError::InvalidName(format!(
            "path must be absolute: '{}'",
            path
        )));
    }
    Ok(path.split('/').filter(|s| !s.is_empty()).collect())
}

/// Join a parent path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Arena of nodes rooted at one group
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Tree holding only the root group
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                name: String::new(),
                parent: None,
                title: String::new(),
                kind: NodeKind::Group(GroupNode::default()),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    /// Rebuild a tree from a persisted catalog, checking its structure
    pub fn from_catalog(catalog: Catalog) -> Result<Self, StorageError> {
        let corrupt = |msg: String| StorageError::Corrupt(format!("catalog: {}", msg));

        let nodes: HashMap<NodeId, Node> = catalog.nodes.into_iter().map(|n| (n.id, n)).collect();
        let root = nodes
            .get(&catalog.root)
            .ok_or_else(|| corrupt(format!("root {} missing", catalog.root)))?;
        if root.as_group().is_none() || root.parent.is_some() {
            return Err(corrupt("root is not a parentless group".to_string()));
        }

        let mut reached = HashSet::new();
        let mut stack = vec![catalog.root];
        while let Some(id) = stack.pop() {
            if !reached.insert(id) {
                return Err(corrupt(format!("node {} reachable twice", id)));
            }
            if id.0 >= catalog.next_id {
                return Err(corrupt(format!("node {} beyond id counter", id)));
            }
            let node = &nodes[&id];
            if let Some(group) = node.as_group() {
                for (name, child_id) in &group.children {
                    let child = nodes
                        .get(child_id)
                        .ok_or_else(|| corrupt(format!("child {} missing", child_id)))?;
                    if child.parent != Some(id) || &child.name != name {
                        return Err(corrupt(format!("child {} has inconsistent links", child_id)));
                    }
                    stack.push(*child_id);
                }
            }
        }
        if reached.len() != nodes.len() {
            return Err(corrupt(format!(
                "{} unreachable nodes",
                nodes.len() - reached.len()
            )));
        }

        Ok(Self {
            nodes,
            root: catalog.root,
            next_id: catalog.next_id,
        })
    }

    /// Snapshot for persistence, nodes ordered by id
    pub fn to_catalog(&self) -> Catalog {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        Catalog {
            root: self.root,
            next_id: self.next_id,
            nodes,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))
    }

    /// Children of a group in insertion order; empty for leaves
    pub fn children(&self, id: NodeId) -> &[(String, NodeId)] {
        self.nodes
            .get(&id)
            .and_then(Node::as_group)
            .map(|g| g.children.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a stored path segment by segment
    pub fn resolve(&self, path: &str) -> Result<NodeId, TreeError> {
        let mut current = self.root;
        for segment in split_path(path)? {
            current = self
                .nodes
                .get(&current)
                .and_then(Node::as_group)
                .and_then(|g| g.child(segment))
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Stored names from the root down to `id`, root excluded
    pub fn segments_of(&self, id: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            if node.parent.is_none() {
                break;
            }
            segments.push(node.name.as_str());
            current = node.parent.and_then(|p| self.nodes.get(&p));
        }
        segments.reverse();
        segments
    }

    /// Stored path of a node
    pub fn path_of(&self, id: NodeId) -> String {
        format!("/{}", self.segments_of(id).join("/"))
    }

    /// Add a new child under `parent`
    pub fn insert(
        &mut self,
        parent: NodeId,
        name: &str,
        title: &str,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        validate_name(name)?;
        let parent_path = self.path_of(parent);
        let group = match &self.node(parent)?.kind {
            NodeKind::Group(group) => group,
            _ => return Err(TreeError::NotAGroup(parent_path)),
        };
        if group.child(name).is_some() {
            return Err(TreeError::NameConflict {
                parent: parent_path,
                name: name.to_string(),
            });
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                name: name.to_string(),
                parent: Some(parent),
                title: title.to_string(),
                kind,
            },
        );
        if let NodeKind::Group(group) = &mut self.node_mut(parent)?.kind {
            group.children.push((name.to_string(), id));
        }
        Ok(id)
    }

    /// Rename a node in place; it keeps its id and position among siblings
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        validate_name(new_name)?;
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| TreeError::InvalidName("the root group cannot be renamed".to_string()))?;
        if self.node(id)?.name == new_name {
            return Ok(());
        }
        let parent_path = self.path_of(parent);
        if let NodeKind::Group(group) = &mut self.node_mut(parent)?.kind {
            if group.child(new_name).is_some() {
                return Err(TreeError::NameConflict {
                    parent: parent_path,
                    name: new_name.to_string(),
                });
            }
            for (name, child) in group.children.iter_mut() {
                if *child == id {
                    *name = new_name.to_string();
                }
            }
        }
        self.node_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    /// Unlink a subtree and return its nodes, descendants before ancestors.
    ///
    /// A non-empty group is only detached when `recursive` is set; on error
    /// the tree is untouched.
    pub fn detach(&mut self, id: NodeId, recursive: bool) -> Result<Vec<Node>, TreeError> {
        let node = self.node(id)?;
        let parent = node
            .parent
            .ok_or_else(|| TreeError::InvalidName("the root group cannot be removed".to_string()))?;
        if let Some(group) = node.as_group() {
            if !group.children.is_empty() && !recursive {
                return Err(TreeError::NotEmpty(self.path_of(id)));
            }
        }

        let mut order: Vec<NodeId> = self.preorder(id).collect();
        order.reverse();

        if let NodeKind::Group(group) = &mut self.node_mut(parent)?.kind {
            group.children.retain(|(_, child)| *child != id);
        }
        Ok(order
            .into_iter()
            .filter_map(|nid| self.nodes.remove(&nid))
            .collect())
    }

    /// Depth-first ids under `start` (included), parents before children
    pub fn preorder(&self, start: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![start];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev().map(|(_, child)| *child));
            Some(id)
        })
    }
}

/// Borrowed view of one node, presenting display names
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a NodeTree,
    names: &'a TranslationMap,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(tree: &'a NodeTree, names: &'a TranslationMap, id: NodeId) -> Self {
        Self { tree, names, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn node(&self) -> &'a Node {
        &self.tree.nodes[&self.id]
    }

    /// Display name; empty for the root
    pub fn name(&self) -> &'a str {
        self.names.to_display(&self.node().name)
    }

    /// Display path
    pub fn path(&self) -> String {
        let segments: Vec<&str> = self
            .tree
            .segments_of(self.id)
            .into_iter()
            .map(|s| self.names.to_display(s))
            .collect();
        format!("/{}", segments.join("/"))
    }

    pub fn class(&self) -> NodeClass {
        self.node().class()
    }

    pub fn title(&self) -> &'a str {
        &self.node().title
    }

    pub fn is_group(&self) -> bool {
        self.class() == NodeClass::Group
    }

    pub fn is_leaf(&self) -> bool {
        self.class().is_leaf()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node()
            .parent
            .map(|p| NodeRef::new(self.tree, self.names, p))
    }

    /// Direct children in insertion order; empty for leaves
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        self.tree
            .children(self.id)
            .iter()
            .map(|(_, id)| NodeRef::new(self.tree, self.names, *id))
            .collect()
    }

    /// Child by display name. A name that is only a stored token of the
    /// translation map names no child.
    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        let stored = self.names.to_stored_checked(name).ok()?;
        self.node()
            .as_group()
            .and_then(|g| g.child(stored))
            .map(|id| NodeRef::new(self.tree, self.names, id))
    }

    fn class_detail(&self) -> String {
        let node = self.node();
        match &node.kind {
            NodeKind::Group(_) => "Group".to_string(),
            NodeKind::Table(table) => format!("Table({},)", table.nrows()),
            NodeKind::Array(array) => {
                let dims: Vec<String> = array.shape().iter().map(|d| d.to_string()).collect();
                if dims.len() == 1 {
                    format!("Array({},)", dims[0])
                } else {
                    format!("Array({})", dims.join(", "))
                }
            }
        }
    }

    /// Summary of the node for machine consumption
    pub fn to_json(&self) -> serde_json::Value {
        let node = self.node();
        let mut value = json!({
            "path": self.path(),
            "name": self.name(),
            "class": self.class().as_str(),
            "title": node.title,
        });
        match &node.kind {
            NodeKind::Group(group) => {
                value["children"] = json!(group.children.len());
            }
            NodeKind::Table(table) => {
                value["nrows"] = json!(table.nrows());
                value["colnames"] = json!(table.schema().colnames());
                value["byteorder"] = json!(table.byteorder().to_string());
            }
            NodeKind::Array(array) => {
                value["shape"] = json!(array.shape());
                value["dtype"] = json!(array.dtype().to_string());
                value["byteorder"] = json!(array.byteorder().to_string());
            }
        }
        value
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("path", &self.path())
            .field("class", &self.class())
            .finish()
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) '{}'", self.path(), self.class_detail(), self.title())
    }
}
