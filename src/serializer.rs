use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::debug;

use crate::label::{encode_label, is_identifier, needs_quotes};
use crate::model::{
    ArrowKind, Cardinality, Dialect, DialectPayload, Direction, Edge, ErAttribute, Graph, Node, NodeKind,
    NotePosition, Relation, StateMarker, StrokeStyle,
};
use crate::sidecar::Sidecar;
use crate::style;

const INDENT: &str = "    ";

/// Line buffer with block indentation.
struct Writer {
    lines: Vec<String>,
}

impl Writer {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        self.lines.push(format!("{}{}", INDENT.repeat(depth), text.as_ref()));
    }

    fn finish(mut self, sidecar: Vec<String>) -> String {
        self.lines.extend(sidecar);
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

pub fn serialize(graph: &Graph) -> String {
    let mut w = Writer::new();
    match graph.dialect {
        Dialect::Flowchart => flowchart(graph, &mut w),
        Dialect::Sequence => sequence(graph, &mut w),
        Dialect::Er => er(graph, &mut w),
        Dialect::State => state(graph, &mut w),
        Dialect::Pie => pie(graph, &mut w),
        Dialect::Mindmap => mindmap(graph, &mut w),
        Dialect::Unsupported => {
            return unsupported(graph);
        }
    }
    let marker = graph.dialect.comment_marker();
    w.finish(Sidecar::from_graph(graph).to_lines(marker))
}

/// Label text safe inside shape brackets.
fn bracket_label(label: &str) -> String {
    let encoded = encode_label(label);
    if needs_quotes(&encoded) {
        format!("\"{encoded}\"")
    } else {
        encoded
    }
}

// --- flowchart ---

fn flow_shape(node: &Node) -> String {
    if node.kind == NodeKind::Rectangle && node.label == node.id && is_identifier(&node.id) {
        return node.id.clone();
    }
    let label = bracket_label(&node.label);
    let (open, close) = match node.kind {
        NodeKind::Rounded => ("(", ")"),
        NodeKind::Circle => ("((", "))"),
        NodeKind::Diamond => ("{", "}"),
        NodeKind::Cylinder => ("[(", ")]"),
        _ => ("[", "]"),
    };
    format!("{}{open}{label}{close}", node.id)
}

fn flow_block(graph: &Graph, parent: Option<&str>, depth: usize, seen: &mut HashSet<String>, w: &mut Writer) {
    for node in graph.children_of(parent) {
        if node.is_derived() || !seen.insert(node.id.clone()) {
            continue;
        }
        if node.kind == NodeKind::Group {
            if node.label == node.id {
                w.line(depth, format!("subgraph {}", node.id));
            } else {
                w.line(depth, format!("subgraph {} [{}]", node.id, bracket_label(&node.label)));
            }
            flow_block(graph, Some(&node.id), depth + 1, seen, w);
            w.line(depth, "end");
        } else {
            w.line(depth, flow_shape(node));
        }
    }
}

fn flow_edge(edge: &Edge) -> String {
    let arrow = edge.arrow.flow_token();
    match edge.label.as_deref().filter(|l| !l.is_empty()) {
        Some(label) => format!("{} {arrow}|{}| {}", edge.source, bracket_label(label), edge.target),
        None => format!("{} {arrow} {}", edge.source, edge.target),
    }
}

/// `style` line for the attributes flowcharts express natively.
fn flow_style(graph: &Graph, node: &Node) -> Option<String> {
    let diff = style::node_override(graph.dialect, node);
    let mut attrs: Vec<String> = Vec::new();
    if let Some(fill) = &diff.fill {
        attrs.push(format!("fill:{fill}"));
    }
    if let Some(stroke) = &diff.stroke_color {
        attrs.push(format!("stroke:{stroke}"));
    }
    if let Some(width) = diff.stroke_width {
        attrs.push(format!("stroke-width:{width}px"));
    }
    match diff.stroke_style {
        Some(StrokeStyle::Dashed) => attrs.push("stroke-dasharray: 5 5".to_string()),
        Some(StrokeStyle::Dotted) => attrs.push("stroke-dasharray: 2 2".to_string()),
        Some(StrokeStyle::Solid) | None => {}
    }
    if let Some(color) = &diff.text_color {
        attrs.push(format!("color:{color}"));
    }
    (!attrs.is_empty()).then(|| format!("style {} {}", node.id, attrs.join(",")))
}

fn flowchart(graph: &Graph, w: &mut Writer) {
    w.line(0, format!("graph {}", graph.direction.as_token()));
    let mut seen = HashSet::new();
    flow_block(graph, None, 1, &mut seen, w);
    // nodes whose parent chain never reaches the top level
    for node in &graph.nodes {
        if !node.is_derived() && seen.insert(node.id.clone()) {
            debug!(id = %node.id, "emitting unreachable node at top level");
            w.line(1, flow_shape(node));
        }
    }
    for edge in &graph.edges {
        w.line(1, flow_edge(edge));
    }
    for node in graph.nodes.iter().filter(|n| !n.is_derived()) {
        if let Some(line) = flow_style(graph, node) {
            w.line(1, line);
        }
    }
}

// --- sequence ---

fn participant_of<'a>(graph: &'a Graph, endpoint: &'a str) -> &'a str {
    graph
        .node(endpoint)
        .and_then(Node::sequence)
        .map_or(endpoint, |d| d.participant_id.as_str())
}

enum Event<'a> {
    Message(&'a Edge),
    Note(&'a Node),
}

fn sequence(graph: &Graph, w: &mut Writer) {
    w.line(0, "sequenceDiagram");

    let mut participants: Vec<(usize, &Node)> = graph
        .nodes
        .iter()
        .filter_map(|n| {
            let data = n.sequence()?;
            (!data.is_note && data.anchor.is_none()).then_some((data.order, n))
        })
        .collect();
    participants.sort_by_key(|(order, _)| *order);
    for (_, node) in participants {
        let keyword = if node.sequence().is_some_and(|d| d.actor) {
            "actor"
        } else {
            "participant"
        };
        if node.label == node.id || node.label.is_empty() {
            w.line(1, format!("{keyword} {}", node.id));
        } else {
            w.line(1, format!("{keyword} {} as {}", node.id, encode_label(&node.label)));
        }
    }

    let mut events: Vec<(usize, Event)> = Vec::new();
    for edge in graph.edges.iter().filter(|e| !e.data.is_lifeline) {
        events.push((edge.data.order.unwrap_or(usize::MAX), Event::Message(edge)));
    }
    for node in &graph.nodes {
        if let Some(data) = node.sequence().filter(|d| d.is_note) {
            events.push((data.order, Event::Note(node)));
        }
    }
    events.sort_by_key(|(order, _)| *order);

    for (_, event) in events {
        match event {
            Event::Message(edge) => {
                let (from, to) = match edge.data.participants.as_slice() {
                    [from, to] => (from.as_str(), to.as_str()),
                    _ => (participant_of(graph, &edge.source), participant_of(graph, &edge.target)),
                };
                let mut line = format!("{from}{}", edge.arrow.sequence_token());
                if edge.data.activate_target {
                    line.push('+');
                } else if edge.data.deactivate_source {
                    line.push('-');
                }
                line.push_str(to);
                if let Some(text) = edge.label.as_deref().filter(|t| !t.is_empty()) {
                    let _ = write!(line, ": {}", encode_label(text));
                }
                w.line(1, line);
            }
            Event::Note(node) => {
                let Some(data) = node.sequence() else {
                    continue;
                };
                let position = data.note_position.unwrap_or(NotePosition::RightOf);
                let over = if data.note_participants.is_empty() {
                    data.participant_id.clone()
                } else {
                    data.note_participants.join(",")
                };
                w.line(
                    1,
                    format!("Note {} {over}: {}", position.as_token(), encode_label(&node.label)),
                );
            }
        }
    }
}

// --- entity relation ---

fn er_label(label: &str) -> String {
    let encoded = encode_label(label);
    if is_identifier(&encoded) {
        encoded
    } else {
        format!("\"{encoded}\"")
    }
}

fn er(graph: &Graph, w: &mut Writer) {
    w.line(0, "erDiagram");
    let related: HashSet<&str> = graph
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    for node in &graph.nodes {
        let attributes: &[ErAttribute] = match &node.data {
            DialectPayload::Entity { attributes } => attributes.as_slice(),
            _ => &[],
        };
        if attributes.is_empty() {
            if !related.contains(node.id.as_str()) {
                w.line(1, &node.id);
            }
            continue;
        }
        w.line(1, format!("{} {{", node.id));
        for attribute in attributes {
            let mut line = format!("{} {}", attribute.attr_type, attribute.name);
            if let Some(constraint) = &attribute.constraint {
                let _ = write!(line, " {constraint}");
            }
            w.line(2, line);
        }
        w.line(1, "}");
    }

    for edge in &graph.edges {
        let relation = edge.data.relation.unwrap_or(Relation {
            left: Cardinality::ExactlyOne,
            right: Cardinality::ZeroOrMany,
            identifying: edge.arrow != ArrowKind::DottedOpen,
        });
        let line = if relation.identifying { "--" } else { ".." };
        let mut text = format!(
            "{} {}{line}{} {}",
            edge.source,
            relation.left.left_token(),
            relation.right.right_token(),
            edge.target
        );
        if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
            let _ = write!(text, " : {}", er_label(label));
        }
        w.line(1, text);
    }
}

// --- state ---

fn state_block(graph: &Graph, parent: Option<&str>, depth: usize, seen: &mut HashSet<String>, w: &mut Writer) {
    for node in graph.children_of(parent) {
        if node.state_marker() != StateMarker::Normal || !seen.insert(node.id.clone()) {
            continue;
        }
        let head = if node.label == node.id {
            format!("state {}", node.id)
        } else {
            format!("state \"{}\" as {}", encode_label(&node.label), node.id)
        };
        if node.kind == NodeKind::Group {
            w.line(depth, format!("{head} {{"));
            state_block(graph, Some(&node.id), depth + 1, seen, w);
            state_transitions(graph, Some(&node.id), depth + 1, w);
            w.line(depth, "}");
        } else if node.label == node.id {
            w.line(depth, &node.id);
        } else {
            w.line(depth, head);
        }
    }
}

fn state_ref(graph: &Graph, id: &str) -> String {
    match graph.node(id).map(Node::state_marker) {
        Some(StateMarker::Start | StateMarker::End) => "[*]".to_string(),
        _ => id.to_string(),
    }
}

/// Parent chain of a node, innermost first.
fn ancestors<'a>(graph: &'a Graph, id: &str) -> Vec<&'a str> {
    let mut chain = Vec::new();
    let mut cursor = graph.node(id).and_then(|n| n.parent.as_deref());
    while let Some(parent) = cursor {
        if chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        cursor = graph.node(parent).and_then(|n| n.parent.as_deref());
    }
    chain
}

/// Block a transition is written in: the scope of its pseudo-state, else the
/// innermost group holding both endpoints, else the top level.
fn transition_scope<'a>(graph: &'a Graph, edge: &Edge) -> Option<&'a str> {
    let marker = [&edge.source, &edge.target]
        .into_iter()
        .filter_map(|id| graph.node(id))
        .find(|n| n.state_marker() != StateMarker::Normal);
    if let Some(marker) = marker {
        return marker.parent.as_deref();
    }
    let around_target = ancestors(graph, &edge.target);
    ancestors(graph, &edge.source)
        .into_iter()
        .find(|scope| around_target.contains(scope))
}

fn state_transitions(graph: &Graph, scope: Option<&str>, depth: usize, w: &mut Writer) {
    for edge in graph.edges.iter().filter(|e| transition_scope(graph, e) == scope) {
        let mut line = format!("{} --> {}", state_ref(graph, &edge.source), state_ref(graph, &edge.target));
        if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
            let _ = write!(line, " : {}", encode_label(label));
        }
        w.line(depth, line);
    }
}

fn state(graph: &Graph, w: &mut Writer) {
    w.line(0, "stateDiagram-v2");
    if graph.direction != Direction::TopDown {
        w.line(1, format!("direction {}", graph.direction.as_token()));
    }
    let mut seen = HashSet::new();
    state_block(graph, None, 1, &mut seen, w);
    state_transitions(graph, None, 1, w);
}

// --- pie ---

fn pie(graph: &Graph, w: &mut Writer) {
    w.line(0, if graph.show_data { "pie showData" } else { "pie" });
    if let Some(title) = &graph.title {
        w.line(1, format!("title {}", encode_label(title)));
    }
    for node in &graph.nodes {
        let DialectPayload::PieSlice { value } = node.data else {
            continue;
        };
        w.line(1, format!("\"{}\" : {value}", encode_label(&node.label)));
    }
}

// --- mindmap ---

fn mindmap_node(node: &Node) -> String {
    let mut text = if node.kind == NodeKind::Rectangle && node.label == node.id && is_identifier(&node.id) {
        node.id.clone()
    } else {
        let label = bracket_label(&node.label);
        match node.kind {
            NodeKind::Circle => format!("{}(({label}))", node.id),
            NodeKind::Rounded => format!("{}({label})", node.id),
            _ => format!("{}[{label}]", node.id),
        }
    };
    if let DialectPayload::Mindmap { class: Some(class) } = &node.data {
        let _ = write!(text, ":::{class}");
    }
    text
}

fn mindmap_branch<'a>(graph: &'a Graph, node: &'a Node, depth: usize, seen: &mut HashSet<&'a str>, w: &mut Writer) {
    if !seen.insert(&node.id) {
        return;
    }
    w.line(0, format!("{}{}", "  ".repeat(depth), mindmap_node(node)));
    for edge in graph.edges.iter().filter(|e| e.source == node.id) {
        if let Some(child) = graph.node(&edge.target) {
            mindmap_branch(graph, child, depth + 1, seen, w);
        }
    }
}

fn mindmap(graph: &Graph, w: &mut Writer) {
    w.line(0, "mindmap");
    let targets: HashSet<&str> = graph.edges.iter().map(|e| e.target.as_str()).collect();
    let mut seen = HashSet::new();
    for root in graph.nodes.iter().filter(|n| !targets.contains(n.id.as_str())) {
        mindmap_branch(graph, root, 1, &mut seen, w);
    }
    for node in &graph.nodes {
        mindmap_branch(graph, node, 1, &mut seen, w);
    }
}

// --- unsupported ---

fn unsupported(graph: &Graph) -> String {
    let source = graph.nodes.iter().find_map(|n| match &n.data {
        DialectPayload::Unsupported { source, .. } => Some(source.as_str()),
        _ => None,
    });
    let mut out = source.unwrap_or_default().to_string();
    out.push('\n');
    out
}
