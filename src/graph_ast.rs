use crate::model::{ArrowKind, Direction, NodeKind};

/// One recognised flowchart statement.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowToken {
    Header { direction: Option<Direction> },
    SubgraphStart { id: String, label: String },
    SubgraphEnd,
    Statement(FlowStatement),
    Style { id: String, attrs: Vec<(String, String)> },
}

/// `A --> B & C -.-> D`: node groups joined by links, so
/// `links.len() + 1 == groups.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStatement {
    pub groups: Vec<Vec<NodeRef>>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub id: String,
    pub shape: Option<(NodeKind, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub arrow: ArrowKind,
    pub label: Option<String>,
}
