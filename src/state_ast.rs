use crate::model::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum StateToken {
    Header,
    Direction(Direction),
    /// `state "Label" as ID`, `state ID` or a bare `ID`.
    Declare { id: String, label: Option<String> },
    /// `state ID {` or `state "Label" as ID {`.
    CompositeStart { id: String, label: Option<String> },
    CompositeEnd,
    /// `ID : text`
    Description { id: String, text: String },
    Transition(Transition),
}

/// `[*]` or a named state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateRef {
    Pseudo,
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: StateRef,
    pub to: StateRef,
    pub label: Option<String>,
}
