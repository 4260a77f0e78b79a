//! Tree node types

use crate::array::ArrayNode;
use crate::table::Table;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Group,
    Table,
    Array,
}

impl NodeClass {
    pub fn is_leaf(&self) -> bool {
        !matches!(self, NodeClass::Group)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeClass::Group => "Group",
            NodeClass::Table => "Table",
            NodeClass::Array => "Array",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects nodes by class in listings and walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    Any,
    Group,
    /// Tables and arrays
    Leaf,
    Table,
    Array,
}

impl KindFilter {
    pub fn matches(&self, class: NodeClass) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Group => class == NodeClass::Group,
            KindFilter::Leaf => class.is_leaf(),
            KindFilter::Table => class == NodeClass::Table,
            KindFilter::Array => class == NodeClass::Array,
        }
    }
}

/// Group payload: children in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupNode {
    pub children: Vec<(String, NodeId)>, // (stored name, node_id)
}

impl GroupNode {
    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, id)| *id)
    }
}

/// Node payload by class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    Group(GroupNode),
    Table(Table),
    Array(ArrayNode),
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        match self {
            NodeKind::Group(_) => NodeClass::Group,
            NodeKind::Table(_) => NodeClass::Table,
            NodeKind::Array(_) => NodeClass::Array,
        }
    }
}

/// One entry of the node arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Stored (untranslated) name; empty for the root
    pub name: String,
    pub parent: Option<NodeId>,
    pub title: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn class(&self) -> NodeClass {
        self.kind.class()
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.kind {
            NodeKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match &self.kind {
            NodeKind::Array(array) => Some(array),
            _ => None,
        }
    }
}
