use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{Caseless, space0, space1, till_line_ending};
use winnow::combinator::{alt, eof, opt, preceded, separated};
use winnow::token::take_while;

use crate::label::decode_label;
use crate::model::{ArrowKind, NotePosition};
use crate::sequence_ast::*;

/// Tokenize a sequence diagram line by line. Block keywords (`loop`, `alt`,
/// `end`, ...) and other unrecognized lines are skipped.
pub fn tokenize(input: &str) -> Vec<SequenceToken> {
    let mut tokens = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        match statement.parse(line) {
            Ok(token) => tokens.push(token),
            Err(_) => trace!(line = index + 1, text = line, "skipping sequence line"),
        }
    }
    tokens
}

fn statement(input: &mut &str) -> winnow::Result<SequenceToken> {
    alt((
        ("sequenceDiagram", space0, eof).value(SequenceToken::Header),
        participant_decl.map(SequenceToken::Participant),
        note_stmt.map(SequenceToken::Note),
        message.map(SequenceToken::Message),
    ))
    .parse_next(input)
}

fn participant_decl(input: &mut &str) -> winnow::Result<ParticipantDecl> {
    let actor = alt(("participant".value(false), "actor".value(true))).parse_next(input)?;
    space1.parse_next(input)?;
    let id = identifier.parse_next(input)?;
    let alias = opt(preceded((space1, "as", space1), till_line_ending)).parse_next(input)?;
    space0.parse_next(input)?;

    Ok(ParticipantDecl {
        id: id.to_string(),
        alias: alias.map(decode_label).filter(|a| !a.is_empty()),
        actor,
    })
}

fn note_stmt(input: &mut &str) -> winnow::Result<Note> {
    Caseless("note").parse_next(input)?;
    space1.parse_next(input)?;

    let position = alt((
        ("right of", space1).value(NotePosition::RightOf),
        ("left of", space1).value(NotePosition::LeftOf),
        ("over", space1).value(NotePosition::Over),
    ))
    .parse_next(input)?;
    let participants: Vec<&str> =
        separated(1..=2, identifier, (space0, ',', space0)).parse_next(input)?;

    space0.parse_next(input)?;
    ':'.parse_next(input)?;
    let text = till_line_ending.parse_next(input)?;

    Ok(Note {
        position,
        participants: participants.into_iter().map(str::to_string).collect(),
        text: decode_label(text),
    })
}

fn message(input: &mut &str) -> winnow::Result<Message> {
    let from = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    let arrow = arrow.parse_next(input)?;

    let modifier = opt(alt(('+', '-'))).parse_next(input)?;
    space0.parse_next(input)?;
    let to = identifier.parse_next(input)?;
    let text = opt(preceded((space0, ':'), till_line_ending)).parse_next(input)?;

    Ok(Message {
        from: from.to_string(),
        to: to.to_string(),
        arrow,
        text: text.map(decode_label).unwrap_or_default(),
        activate_target: modifier == Some('+'),
        deactivate_source: modifier == Some('-'),
    })
}

fn arrow(input: &mut &str) -> winnow::Result<ArrowKind> {
    let dotted = alt(("--".value(true), "-".value(false))).parse_next(input)?;
    let kind = alt((
        ">>".value((ArrowKind::SequenceSync, ArrowKind::SequenceSyncDotted)),
        ">".value((ArrowKind::SequenceLine, ArrowKind::SequenceLineDotted)),
        "x".value((ArrowKind::SequenceCross, ArrowKind::SequenceCrossDotted)),
        ")".value((ArrowKind::SequenceAsync, ArrowKind::SequenceAsyncDotted)),
    ))
    .parse_next(input)?;
    Ok(if dotted { kind.1 } else { kind.0 })
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}
