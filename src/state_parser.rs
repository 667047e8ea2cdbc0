use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{space0, space1, till_line_ending};
use winnow::combinator::{alt, delimited, eof, opt, preceded, terminated};
use winnow::token::{take_till, take_while};

use crate::label::decode_label;
use crate::model::Direction;
use crate::state_ast::*;

pub fn tokenize(input: &str) -> Vec<StateToken> {
    let mut tokens = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        match state_line.parse(line) {
            Ok(token) => tokens.push(token),
            Err(_) => trace!(line = index + 1, text = line, "skipping state line"),
        }
    }
    tokens
}

fn state_line(input: &mut &str) -> winnow::Result<StateToken> {
    alt((
        (alt(("stateDiagram-v2", "stateDiagram")), space0, eof).value(StateToken::Header),
        preceded(("direction", space1), direction).map(StateToken::Direction),
        ('}', space0, eof).value(StateToken::CompositeEnd),
        state_keyword_line,
        transition.map(StateToken::Transition),
        description,
        terminated(identifier, space0).map(|id| StateToken::Declare {
            id: id.to_string(),
            label: None,
        }),
    ))
    .parse_next(input)
}

fn direction(input: &mut &str) -> winnow::Result<Direction> {
    terminated(alt(("TD", "TB", "BT", "LR", "RL")), space0)
        .verify_map(Direction::from_token)
        .parse_next(input)
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn quoted(input: &mut &str) -> winnow::Result<String> {
    delimited('"', take_till(0.., '"'), '"')
        .map(decode_label)
        .parse_next(input)
}

/// Lines opening with the `state` keyword.
fn state_keyword_line(input: &mut &str) -> winnow::Result<StateToken> {
    "state".parse_next(input)?;
    space1.parse_next(input)?;
    let (label, id) = alt((
        (quoted, space1, "as", space1, identifier).map(|(label, _, _, _, id)| (Some(label), id)),
        identifier.map(|id| (None, id)),
    ))
    .parse_next(input)?;
    space0.parse_next(input)?;
    let opens = opt('{').parse_next(input)?.is_some();
    space0.parse_next(input)?;

    let id = id.to_string();
    Ok(if opens {
        StateToken::CompositeStart { id, label }
    } else {
        StateToken::Declare { id, label }
    })
}

fn state_ref(input: &mut &str) -> winnow::Result<StateRef> {
    alt((
        "[*]".value(StateRef::Pseudo),
        identifier.map(|id| StateRef::Named(id.to_string())),
    ))
    .parse_next(input)
}

fn transition(input: &mut &str) -> winnow::Result<Transition> {
    let from = state_ref.parse_next(input)?;
    space0.parse_next(input)?;
    "-->".parse_next(input)?;
    space0.parse_next(input)?;
    let to = state_ref.parse_next(input)?;
    let label = opt(preceded((space0, ':'), till_line_ending)).parse_next(input)?;
    Ok(Transition {
        from,
        to,
        label: label.map(decode_label).filter(|l| !l.is_empty()),
    })
}

fn description(input: &mut &str) -> winnow::Result<StateToken> {
    let id = identifier.parse_next(input)?;
    space0.parse_next(input)?;
    ':'.parse_next(input)?;
    let text = till_line_ending.parse_next(input)?;
    Ok(StateToken::Description {
        id: id.to_string(),
        text: decode_label(text),
    })
}
