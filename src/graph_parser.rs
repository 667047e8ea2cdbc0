use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{space0, space1, till_line_ending};
use winnow::combinator::{alt, delimited, eof, opt, preceded, repeat, separated, terminated};
use winnow::token::{take_till, take_until, take_while};

use crate::graph_ast::*;
use crate::label::{decode_label, is_identifier, slugify};
use crate::model::{ArrowKind, Direction, NodeKind};

/// Tokenize flowchart text line by line. Comment lines and lines that match
/// no statement form are skipped.
pub fn tokenize(input: &str) -> Vec<FlowToken> {
    let mut tokens = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        for piece in split_statements(line) {
            match flow_line.parse(piece) {
                Ok(token) => tokens.push(token),
                Err(_) => trace!(line = index + 1, text = piece, "skipping flowchart line"),
            }
        }
    }
    tokens
}

/// Split on `;` outside quotes and shape brackets.
fn split_statements(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '[' | '(' | '{' if !quoted => depth += 1,
            ']' | ')' | '}' if !quoted => depth = depth.saturating_sub(1),
            ';' if !quoted && depth == 0 => {
                pieces.push(line[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(line[start..].trim());
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn flow_line(input: &mut &str) -> winnow::Result<FlowToken> {
    alt((
        header,
        subgraph_start,
        terminated("end", eof).value(FlowToken::SubgraphEnd),
        style_line,
        statement.map(FlowToken::Statement),
    ))
    .parse_next(input)
}

fn header(input: &mut &str) -> winnow::Result<FlowToken> {
    alt(("graph", "flowchart")).parse_next(input)?;
    let direction = opt(preceded(space1, direction)).parse_next(input)?;
    space0.parse_next(input)?;
    eof.parse_next(input)?;
    Ok(FlowToken::Header { direction })
}

fn direction(input: &mut &str) -> winnow::Result<Direction> {
    alt(("TD", "TB", "BT", "LR", "RL"))
        .verify_map(Direction::from_token)
        .parse_next(input)
}

fn subgraph_start(input: &mut &str) -> winnow::Result<FlowToken> {
    "subgraph".parse_next(input)?;
    space1.parse_next(input)?;
    let rest = till_line_ending.parse_next(input)?;
    Ok(subgraph_header(rest.trim()))
}

/// `ID`, `ID [Label]`, `ID["Label"]` or free text.
fn subgraph_header(text: &str) -> FlowToken {
    let titled = (identifier, space0, delimited('[', label_until("]"), ']'), space0).parse(text);
    if let Ok((id, _, label, _)) = titled {
        return FlowToken::SubgraphStart {
            id: id.to_string(),
            label,
        };
    }
    if is_identifier(text) {
        return FlowToken::SubgraphStart {
            id: text.to_string(),
            label: text.to_string(),
        };
    }
    let label = decode_label(text.trim_matches('"'));
    FlowToken::SubgraphStart {
        id: slugify(&label),
        label,
    }
}

fn style_line(input: &mut &str) -> winnow::Result<FlowToken> {
    "style".parse_next(input)?;
    space1.parse_next(input)?;
    let id = identifier.parse_next(input)?;
    space1.parse_next(input)?;
    let attrs: Vec<(String, String)> = separated(1.., style_attr, ',').parse_next(input)?;
    space0.parse_next(input)?;
    eof.parse_next(input)?;
    Ok(FlowToken::Style {
        id: id.to_string(),
        attrs,
    })
}

fn style_attr(input: &mut &str) -> winnow::Result<(String, String)> {
    space0.parse_next(input)?;
    let key = take_while(1.., |c: char| c.is_alphanumeric() || c == '-').parse_next(input)?;
    space0.parse_next(input)?;
    ':'.parse_next(input)?;
    let value = take_till(1.., ',').parse_next(input)?;
    Ok((key.to_string(), value.trim().to_string()))
}

fn statement(input: &mut &str) -> winnow::Result<FlowStatement> {
    let first = node_group.parse_next(input)?;
    let rest: Vec<(Link, Vec<NodeRef>)> =
        repeat(0.., (delimited(space0, link, space0), node_group)).parse_next(input)?;
    space0.parse_next(input)?;

    let mut groups = vec![first];
    let mut links = Vec::with_capacity(rest.len());
    for (link, group) in rest {
        links.push(link);
        groups.push(group);
    }
    Ok(FlowStatement { groups, links })
}

fn node_group(input: &mut &str) -> winnow::Result<Vec<NodeRef>> {
    separated(1.., node_ref, (space0, '&', space0)).parse_next(input)
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn node_ref(input: &mut &str) -> winnow::Result<NodeRef> {
    let id = identifier.parse_next(input)?;
    let shape = opt(shape).parse_next(input)?;
    // classes are not modelled for flowcharts
    let _class = opt(preceded(":::", identifier)).parse_next(input)?;
    Ok(NodeRef {
        id: id.to_string(),
        shape,
    })
}

fn shape(input: &mut &str) -> winnow::Result<(NodeKind, String)> {
    alt((
        delimited("[(", label_until(")]"), ")]").map(|l| (NodeKind::Cylinder, l)),
        delimited("((", label_until("))"), "))").map(|l| (NodeKind::Circle, l)),
        delimited('(', label_until(")"), ')').map(|l| (NodeKind::Rounded, l)),
        delimited('{', label_until("}"), '}').map(|l| (NodeKind::Diamond, l)),
        delimited('[', label_until("]"), ']').map(|l| (NodeKind::Rectangle, l)),
    ))
    .parse_next(input)
}

/// Quoted text, or raw text up to `closer`.
fn label_until(closer: &'static str) -> impl FnMut(&mut &str) -> winnow::Result<String> {
    move |input: &mut &str| {
        let raw = alt((
            delimited('"', take_till(0.., '"'), '"'),
            take_until(1.., closer),
        ))
        .parse_next(input)?;
        Ok(decode_label(raw))
    }
}

fn plain_arrow(input: &mut &str) -> winnow::Result<ArrowKind> {
    alt((
        "-.->".value(ArrowKind::Dotted),
        "-.-".value(ArrowKind::DottedOpen),
        "==>".value(ArrowKind::Thick),
        "===".value(ArrowKind::ThickOpen),
        "-->".value(ArrowKind::Solid),
        "---".value(ArrowKind::Open),
    ))
    .parse_next(input)
}

/// `|text|` or `|"text"|`; quoted text may contain `|`.
fn pipe_label(input: &mut &str) -> winnow::Result<String> {
    let raw = alt((
        delimited(('|', space0, '"'), take_till(0.., '"'), ('"', space0, '|')),
        delimited('|', take_till(0.., '|'), '|'),
    ))
    .parse_next(input)?;
    Ok(decode_label(raw))
}

/// `-- text -->`, `-. text .->`, `== text ==>` and their open variants.
fn inline_label_link(input: &mut &str) -> winnow::Result<Link> {
    alt((
        (
            terminated("--", space1),
            take_until(1.., "--"),
            alt(("-->".value(ArrowKind::Solid), "---".value(ArrowKind::Open))),
        ),
        (
            terminated("-.", space1),
            take_until(1.., ".-"),
            alt((".->".value(ArrowKind::Dotted), ".-".value(ArrowKind::DottedOpen))),
        ),
        (
            terminated("==", space1),
            take_until(1.., "=="),
            alt(("==>".value(ArrowKind::Thick), "===".value(ArrowKind::ThickOpen))),
        ),
    ))
    .map(|(_, text, arrow): (&str, &str, ArrowKind)| Link {
        arrow,
        label: Some(decode_label(text.trim_matches('"'))).filter(|l| !l.is_empty()),
    })
    .parse_next(input)
}

fn link(input: &mut &str) -> winnow::Result<Link> {
    alt((
        (plain_arrow, opt(preceded(space0, pipe_label))).map(|(arrow, label)| Link {
            arrow,
            label: label.filter(|l| !l.is_empty()),
        }),
        inline_label_link,
    ))
    .parse_next(input)
}
