use crate::model::{ArrowKind, NotePosition};

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceToken {
    Header,
    Participant(ParticipantDecl),
    Message(Message),
    Note(Note),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantDecl {
    pub id: String,
    pub alias: Option<String>,
    pub actor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub arrow: ArrowKind,
    pub text: String,
    pub activate_target: bool,
    pub deactivate_source: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub position: NotePosition,
    pub participants: Vec<String>,
    pub text: String,
}
