use tracing::trace;
use winnow::prelude::*;
use winnow::ascii::{space0, till_line_ending};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::token::{take_till, take_until, take_while};

use crate::label::decode_label;
use crate::mindmap_ast::*;
use crate::model::NodeKind;

const CLASS_MARKER: &str = ":::";

pub fn tokenize(input: &str) -> Vec<MindmapToken> {
    let mut tokens = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        if line == "mindmap" {
            tokens.push(MindmapToken::Header);
            continue;
        }
        if line.starts_with("::icon") {
            trace!(line = index + 1, "skipping mindmap icon");
            continue;
        }
        if let Some(class) = line.strip_prefix(CLASS_MARKER) {
            tokens.push(MindmapToken::Class(class.trim().to_string()));
            continue;
        }

        let indent = raw.len() - raw.trim_start().len();
        let node = shaped_node
            .parse(line)
            .ok()
            .or_else(|| bare_node(line))
            .map(|(id, kind, label, class)| MindmapNode {
                indent,
                id,
                kind,
                label,
                class,
            });
        match node {
            Some(node) => tokens.push(MindmapToken::Node(node)),
            None => trace!(line = index + 1, text = line, "skipping mindmap line"),
        }
    }
    tokens
}

type NodeParts = (Option<String>, NodeKind, String, Option<String>);

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn shaped_node(input: &mut &str) -> winnow::Result<NodeParts> {
    let id = opt(identifier).parse_next(input)?;
    let (kind, label) = shape.parse_next(input)?;
    let class = opt(preceded(CLASS_MARKER, till_line_ending)).parse_next(input)?;
    space0.parse_next(input)?;
    Ok((
        id.map(str::to_string),
        kind,
        label,
        class.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
    ))
}

fn shape(input: &mut &str) -> winnow::Result<(NodeKind, String)> {
    alt((
        delimited("((", label_until("))"), "))").map(|l| (NodeKind::Circle, l)),
        delimited('(', label_until(")"), ')').map(|l| (NodeKind::Rounded, l)),
        delimited('[', label_until("]"), ']').map(|l| (NodeKind::Rectangle, l)),
    ))
    .parse_next(input)
}

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

/// Plain text node with an optional trailing class.
fn bare_node(line: &str) -> Option<NodeParts> {
    let (text, class) = match line.split_once(CLASS_MARKER) {
        Some((text, class)) => (text, Some(class.trim().to_string()).filter(|c| !c.is_empty())),
        None => (line, None),
    };
    let label = decode_label(text);
    if label.is_empty() {
        return None;
    }
    Some((None, NodeKind::Rectangle, label, class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nodes(tokens: &[MindmapToken]) -> Vec<&MindmapNode> {
        tokens
            .iter()
            .filter_map(|t| match t {
                MindmapToken::Node(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parse_shapes_and_indentation() {
        let tokens = tokenize("mindmap\n  root((Central))\n    a(Soft)\n    b[Box]\n      Plain text");
        assert_eq!(tokens[0], MindmapToken::Header);
        let nodes = nodes(&tokens);
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].id.as_deref(), Some("root"));
        assert_eq!(nodes[0].kind, NodeKind::Circle);
        assert_eq!(nodes[0].indent, 2);
        assert_eq!(nodes[1].kind, NodeKind::Rounded);
        assert_eq!(nodes[2].label, "Box");
        assert_eq!(nodes[3].id, None);
        assert_eq!(nodes[3].label, "Plain text");
        assert_eq!(nodes[3].indent, 6);
    }

    #[test]
    fn parse_classes() {
        let tokens = tokenize("mindmap\n  root((A)):::big\n    child ::: urgent\n    :::late");
        let parsed = nodes(&tokens);
        assert_eq!(parsed[0].class.as_deref(), Some("big"));
        assert_eq!(parsed[1].label, "child");
        assert_eq!(parsed[1].class.as_deref(), Some("urgent"));
        assert_eq!(tokens.last(), Some(&MindmapToken::Class("late".into())));
    }

    #[test]
    fn parse_shape_without_id() {
        let tokens = tokenize("mindmap\n  ((Only label))");
        let parsed = nodes(&tokens);
        assert_eq!(parsed[0].id, None);
        assert_eq!(parsed[0].label, "Only label");
    }
}
