use crate::model::{ErAttribute, Relation};

#[derive(Debug, Clone, PartialEq)]
pub enum ErToken {
    Header,
    /// `NAME {` opening an attribute block.
    BlockStart(String),
    /// `NAME { }` or a bare `NAME` line.
    Entity(String),
    Attribute(ErAttribute),
    BlockEnd,
    Relationship(Relationship),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub relation: Relation,
    pub label: Option<String>,
}
