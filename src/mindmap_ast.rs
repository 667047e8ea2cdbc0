use crate::model::NodeKind;

#[derive(Debug, Clone, PartialEq)]
pub enum MindmapToken {
    Header,
    Node(MindmapNode),
    /// A standalone `:::class` line applying to the previous node.
    Class(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MindmapNode {
    /// Leading whitespace width; deeper indentation means a child.
    pub indent: usize,
    pub id: Option<String>,
    pub kind: NodeKind,
    pub label: String,
    pub class: Option<String>,
}
