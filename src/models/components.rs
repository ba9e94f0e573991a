/// Models exchanged between the analysis and the conversion passes
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Joins a parent path and a member name with `.`; the root path is empty.
pub fn join_path(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}.{child}"),
    }
}

pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Name carried by the root node of every component tree.
pub const ROOT_NAME: &str = "root";

/// One node of the component hierarchy. The root is named [`ROOT_NAME`];
/// every other node is named after the member that holds it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ComponentNode {
    pub name: String,
    pub class_name: String,
    #[serde(default)]
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            children: Vec::new(),
        }
    }

    pub fn root(class_name: &str) -> Self {
        Self::new(ROOT_NAME, class_name)
    }

    pub fn child(&self, name: &str) -> Option<&ComponentNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Dot path of this node when its parent sits at `parent_path`. The
    /// root, with no parent, is the empty path.
    pub fn get_path(&self, parent_path: &str) -> String {
        if parent_path.is_empty() && self.name == ROOT_NAME {
            return String::new();
        }
        join_path(parent_path, &self.name)
    }

    /// Node at `path` relative to this one. The empty path is this node.
    pub fn find(&self, path: &str) -> Option<&ComponentNode> {
        split_path(path).try_fold(self, |node, segment| node.child(segment))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    pub fn class_at(&self, path: &str) -> Option<&str> {
        self.find(path).map(|node| node.class_name.as_str())
    }

    /// Pre-order walk yielding each node with its path from this node.
    pub fn walk(&self) -> Vec<(String, &ComponentNode)> {
        let mut visited = Vec::new();
        let mut stack = vec![(String::new(), self)];
        while let Some((path, node)) = stack.pop() {
            for child in node.children.iter().rev() {
                stack.push((join_path(&path, &child.name), child));
            }
            visited.push((path, node));
        }
        visited
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ComponentNode::node_count).sum::<usize>()
    }
}

/// A producer-to-consumer connection for one interface.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEdge {
    pub origin_path: String,
    pub destination_path: String,
    pub interface: String,
    #[serde(default)]
    pub unresolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ResolvedEdge {
    pub fn resolved(origin: impl Into<String>, destination: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            origin_path: origin.into(),
            destination_path: destination.into(),
            interface: interface.into(),
            unresolved: false,
            diagnostic: None,
        }
    }

    pub fn unresolved(
        origin: impl Into<String>,
        destination: impl Into<String>,
        interface: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            unresolved: true,
            diagnostic: Some(diagnostic.into()),
            ..Self::resolved(origin, destination, interface)
        }
    }

    /// Identity used for de-duplication.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.origin_path, &self.destination_path, &self.interface)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ClassLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impl_path: Option<PathBuf>,
    #[serde(default)]
    pub base_types: Vec<String>,
}

/// Analysis result as written by `analyze --export-json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AnalysisExport {
    pub root_class: String,
    pub component_tree: ComponentNode,
    pub connections: Vec<ResolvedEdge>,
    #[serde(default)]
    pub classes: IndexMap<String, ClassLocation>,
}

impl AnalysisExport {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
