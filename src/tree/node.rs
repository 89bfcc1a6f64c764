use std::fmt;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::container::MetadataContainer;

/// Kind of a tree node; also the segment name used in structural paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Survey,
    Station,
    Run,
    Channel,
    Filter,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Survey => "survey",
            NodeKind::Station => "station",
            NodeKind::Run => "run",
            NodeKind::Channel => "channel",
            NodeKind::Filter => "filter",
        }
    }

    /// Path segment parser; the survey is the root and has no segment.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "station" => Some(NodeKind::Station),
            "run" => Some(NodeKind::Run),
            "channel" => Some(NodeKind::Channel),
            "filter" => Some(NodeKind::Filter),
            _ => None,
        }
    }

    pub fn for_category(category: Category) -> Result<Self> {
        match category {
            Category::Survey => Ok(NodeKind::Survey),
            Category::Station => Ok(NodeKind::Station),
            Category::Run => Ok(NodeKind::Run),
            Category::Electric | Category::Magnetic | Category::Auxiliary => Ok(NodeKind::Channel),
            Category::Filter => Ok(NodeKind::Filter),
            Category::DataLogger => Err(MetadataError::InvalidState(
                "A data logger belongs to a run, not to its own node".to_string(),
            )),
        }
    }

    pub fn can_hold(&self, child: NodeKind) -> bool {
        matches!(
            (self, child),
            (NodeKind::Survey, NodeKind::Station)
                | (NodeKind::Survey, NodeKind::Filter)
                | (NodeKind::Station, NodeKind::Run)
                | (NodeKind::Run, NodeKind::Channel)
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the archive tree. Children are kept in insertion order.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) id: String,
    pub(crate) path: String,
    pub(crate) container: MetadataContainer,
    pub(crate) children: Vec<Node>,
    pub(crate) data_logger: Option<MetadataContainer>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, id: String, path: String, container: MetadataContainer) -> Self {
        Self {
            kind,
            id,
            path,
            container,
            children: Vec::new(),
            data_logger: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Structural path, `""` for the survey root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &MetadataContainer {
        &self.container
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |child| child.kind == kind)
    }

    pub fn child(&self, kind: NodeKind, id: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|child| child.kind == kind && child.id == id)
    }

    pub(crate) fn child_mut(&mut self, kind: NodeKind, id: &str) -> Option<&mut Node> {
        self.children
            .iter_mut()
            .find(|child| child.kind == kind && child.id == id)
    }

    pub fn data_logger(&self) -> Option<&MetadataContainer> {
        self.data_logger.as_ref()
    }

    /// Number of nodes in this subtree, this one included.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_size).sum::<usize>()
    }

    /// Depth-first walk over this subtree.
    pub fn walk(&self) -> Vec<&Node> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }

    pub(crate) fn detach_all(&mut self) {
        self.container.mark_detached();
        if let Some(logger) = self.data_logger.as_mut() {
            logger.mark_detached();
        }
        for child in &mut self.children {
            child.detach_all();
        }
    }
}
