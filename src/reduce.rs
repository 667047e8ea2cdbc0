use tracing::{debug, trace};

use crate::builder::GraphBuilder;
use crate::dialect;
use crate::er_ast::ErToken;
use crate::graph_ast::FlowToken;
use crate::label::slugify;
use crate::mindmap_ast::MindmapToken;
use crate::model::{
    AnchorRole, ArrowKind, Dialect, DialectPayload, Direction, Edge, Graph, Node, NodeKind,
    SequenceData, Size, StateMarker, StrokeStyle, StyleOverride,
};
use crate::pie_ast::PieToken;
use crate::sequence_ast::SequenceToken;
use crate::sidecar::is_sidecar_line;
use crate::state_ast::{StateRef, StateToken};
use crate::{er_parser, graph_parser, mindmap_parser, pie_parser, sequence_parser, state_parser};

pub const UNSUPPORTED_NODE_ID: &str = "unsupported";
pub const START_SUFFIX: &str = "__start__";
pub const END_SUFFIX: &str = "__end__";

pub fn reduce(dialect: Dialect, text: &str) -> Graph {
    match dialect {
        Dialect::Flowchart => flowchart(graph_parser::tokenize(text)),
        Dialect::Sequence => sequence(sequence_parser::tokenize(text)),
        Dialect::Er => er(er_parser::tokenize(text)),
        Dialect::State => state(state_parser::tokenize(text)),
        Dialect::Pie => pie(pie_parser::tokenize(text)),
        Dialect::Mindmap => mindmap(mindmap_parser::tokenize(text)),
        Dialect::Unsupported => unsupported(text),
    }
}

/// Parent `id` under the innermost open group unless it already has one.
fn adopt(builder: &mut GraphBuilder, id: &str, open: &[String]) {
    let Some(group) = open.last() else {
        return;
    };
    let orphan = builder.node(id).is_some_and(|n| n.parent.is_none());
    if orphan && group != id {
        builder.set_parent(id, group);
    }
}

fn unique_id(builder: &GraphBuilder, base: &str) -> String {
    if !builder.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !builder.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

// --- flowchart ---

fn flowchart(tokens: Vec<FlowToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::Flowchart);
    let mut open: Vec<String> = Vec::new();
    let mut styles: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for token in tokens {
        match token {
            FlowToken::Header { direction } => {
                if let Some(direction) = direction {
                    builder.graph_mut().direction = direction;
                }
            }
            FlowToken::SubgraphStart { id, label } => {
                builder.declare(&id, NodeKind::Group, label);
                adopt(&mut builder, &id, &open);
                open.push(id);
            }
            FlowToken::SubgraphEnd => {
                if open.pop().is_none() {
                    trace!("ignoring unmatched end");
                }
            }
            FlowToken::Statement(statement) => {
                for node in statement.groups.iter().flatten() {
                    match &node.shape {
                        Some((kind, label)) => {
                            builder.declare(&node.id, *kind, label.clone());
                        }
                        None => {
                            builder.ensure(&node.id);
                        }
                    }
                    adopt(&mut builder, &node.id, &open);
                }
                for (i, link) in statement.links.iter().enumerate() {
                    for source in &statement.groups[i] {
                        for target in &statement.groups[i + 1] {
                            builder.connect(&source.id, &target.id, link.arrow, link.label.clone());
                        }
                    }
                }
            }
            FlowToken::Style { id, attrs } => styles.push((id, attrs)),
        }
    }

    for (id, attrs) in styles {
        match builder.node_mut(&id) {
            Some(node) => apply_flow_style(&mut node.style, &attrs),
            None => debug!(id, "dropping style for unknown node"),
        }
    }
    builder.finish()
}

fn apply_flow_style(style: &mut StyleOverride, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        match key.as_str() {
            "fill" => style.fill = Some(value.clone()),
            "stroke" => style.stroke_color = Some(value.clone()),
            "color" => style.text_color = Some(value.clone()),
            "stroke-width" => match value.trim_end_matches("px").trim().parse::<f64>() {
                Ok(width) => style.stroke_width = Some(width),
                Err(_) => trace!(value, "ignoring stroke-width"),
            },
            "stroke-dasharray" => style.stroke_style = Some(dash_style(value)),
            _ => trace!(key, "ignoring style attribute"),
        }
    }
}

/// Classify a dash array by its first segment length.
pub(crate) fn dash_style(value: &str) -> StrokeStyle {
    let first = value
        .split([' ', ','])
        .find_map(|t| t.trim_end_matches("px").parse::<f64>().ok());
    match first {
        Some(len) if len > 2.0 => StrokeStyle::Dashed,
        Some(len) if len > 0.0 => StrokeStyle::Dotted,
        _ => StrokeStyle::Solid,
    }
}

// --- sequence ---

fn anchor_node(id: String, participant: &str, order: usize, role: AnchorRole) -> Node {
    let mut node = Node::new(id, NodeKind::Anchor, "");
    node.size = Some(Size::new(0.0, 0.0));
    node.data = DialectPayload::Sequence(SequenceData {
        participant_id: participant.to_string(),
        order,
        anchor: Some(role),
        ..Default::default()
    });
    node
}

pub fn message_anchor_ids(from: &str, to: &str, order: usize) -> (String, String) {
    let source = format!("{from}@{order}");
    let target = if from == to {
        format!("{to}@{order}/self")
    } else {
        format!("{to}@{order}")
    };
    (source, target)
}

pub fn terminal_anchor_id(participant: &str) -> String {
    format!("{participant}@end")
}

pub fn note_id(order: usize) -> String {
    format!("note@{order}")
}

fn participant<'a>(
    builder: &'a mut GraphBuilder,
    lanes: &mut Vec<(String, Vec<String>)>,
    id: &str,
) -> &'a mut Node {
    if !lanes.iter().any(|(p, _)| p == id) {
        lanes.push((id.to_string(), Vec::new()));
        let order = lanes.len() - 1;
        let node = builder.ensure(id);
        node.data = DialectPayload::Sequence(SequenceData {
            participant_id: id.to_string(),
            order,
            ..Default::default()
        });
    }
    builder.ensure(id)
}

fn sequence(tokens: Vec<SequenceToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::Sequence);
    // participant id with its anchors in event order
    let mut lanes: Vec<(String, Vec<String>)> = Vec::new();
    let mut order = 0;

    for token in tokens {
        match token {
            SequenceToken::Header => {}
            SequenceToken::Participant(decl) => {
                let node = participant(&mut builder, &mut lanes, &decl.id);
                node.label = decl.alias.unwrap_or(decl.id);
                if let DialectPayload::Sequence(data) = &mut node.data {
                    data.actor = decl.actor;
                }
            }
            SequenceToken::Message(message) => {
                participant(&mut builder, &mut lanes, &message.from);
                participant(&mut builder, &mut lanes, &message.to);

                let (source, target) = message_anchor_ids(&message.from, &message.to, order);
                for (anchor, owner) in [(&source, &message.from), (&target, &message.to)] {
                    builder.push_node(anchor_node(anchor.clone(), owner, order, AnchorRole::Message));
                    if let Some((_, anchors)) = lanes.iter_mut().find(|(p, _)| p == owner) {
                        anchors.push(anchor.clone());
                    }
                }

                let mut edge = Edge::new(format!("msg:{order}"), &source, &target, message.arrow);
                edge.label = Some(message.text).filter(|t| !t.is_empty());
                edge.data.order = Some(order);
                edge.data.participants = vec![message.from, message.to];
                edge.data.activate_target = message.activate_target;
                edge.data.deactivate_source = message.deactivate_source;
                builder.add_edge(edge);
                order += 1;
            }
            SequenceToken::Note(note) => {
                for p in &note.participants {
                    participant(&mut builder, &mut lanes, p);
                }
                let mut node = Node::new(note_id(order), NodeKind::Rectangle, note.text);
                node.data = DialectPayload::Sequence(SequenceData {
                    participant_id: note.participants.first().cloned().unwrap_or_default(),
                    is_note: true,
                    note_position: Some(note.position),
                    note_participants: note.participants,
                    order,
                    ..Default::default()
                });
                builder.push_node(node);
                order += 1;
            }
        }
    }

    for (p, anchors) in &lanes {
        let terminal = terminal_anchor_id(p);
        builder.push_node(anchor_node(terminal.clone(), p, order, AnchorRole::Terminal));

        let chain: Vec<&String> = std::iter::once(p).chain(anchors).chain([&terminal]).collect();
        for (k, pair) in chain.windows(2).enumerate() {
            let mut edge = Edge::new(format!("lifeline:{p}:{k}"), pair[0], pair[1], ArrowKind::SequenceLineDotted);
            edge.data.is_lifeline = true;
            edge.data.participants = vec![p.clone()];
            builder.add_edge(edge);
        }
    }
    builder.finish()
}

// --- entity relation ---

fn entity<'a>(builder: &'a mut GraphBuilder, name: &str) -> &'a mut Node {
    let node = builder.ensure(name);
    node.kind = NodeKind::Entity;
    if !matches!(node.data, DialectPayload::Entity { .. }) {
        node.data = DialectPayload::Entity {
            attributes: Vec::new(),
        };
    }
    node
}

fn er(tokens: Vec<ErToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::Er);
    let mut current: Option<String> = None;

    for token in tokens {
        match token {
            ErToken::Header => {}
            ErToken::Entity(name) => {
                entity(&mut builder, &name);
            }
            ErToken::BlockStart(name) => {
                entity(&mut builder, &name);
                current = Some(name);
            }
            ErToken::BlockEnd => current = None,
            ErToken::Attribute(attribute) => {
                let Some(name) = current.as_deref() else {
                    continue;
                };
                if let DialectPayload::Entity { attributes } = &mut entity(&mut builder, name).data {
                    attributes.push(attribute);
                }
            }
            ErToken::Relationship(rel) => {
                entity(&mut builder, &rel.from);
                entity(&mut builder, &rel.to);
                let arrow = if rel.relation.identifying {
                    ArrowKind::Open
                } else {
                    ArrowKind::DottedOpen
                };
                if let Some(edge) = builder.connect(&rel.from, &rel.to, arrow, rel.label) {
                    edge.data.relation = Some(rel.relation);
                }
            }
        }
    }
    builder.finish()
}

// --- state ---

fn marker_id(open: &[String], marker: StateMarker) -> String {
    let suffix = if marker == StateMarker::Start {
        START_SUFFIX
    } else {
        END_SUFFIX
    };
    match open.last() {
        Some(scope) => format!("{scope}{suffix}"),
        None => suffix.to_string(),
    }
}

fn state_node(builder: &mut GraphBuilder, id: &str, open: &[String]) {
    if !builder.contains(id) {
        let node = builder.declare(id, NodeKind::Rounded, id);
        node.data = DialectPayload::State {
            marker: StateMarker::Normal,
        };
    }
    adopt(builder, id, open);
}

fn resolve_state(builder: &mut GraphBuilder, state: &StateRef, open: &[String], marker: StateMarker) -> String {
    match state {
        StateRef::Named(id) => {
            state_node(builder, id, open);
            id.clone()
        }
        StateRef::Pseudo => {
            let id = marker_id(open, marker);
            if !builder.contains(&id) {
                let node = builder.declare(&id, NodeKind::Circle, "");
                node.data = DialectPayload::State { marker };
            }
            adopt(builder, &id, open);
            id
        }
    }
}

fn state(tokens: Vec<StateToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::State);
    let mut open: Vec<String> = Vec::new();

    for token in tokens {
        match token {
            StateToken::Header => {}
            StateToken::Direction(direction) => {
                if open.is_empty() {
                    builder.graph_mut().direction = direction;
                }
            }
            StateToken::Declare { id, label } => {
                state_node(&mut builder, &id, &open);
                if let (Some(label), Some(node)) = (label, builder.node_mut(&id)) {
                    node.label = label;
                }
            }
            StateToken::CompositeStart { id, label } => {
                let label = label
                    .or_else(|| builder.node(&id).map(|n| n.label.clone()))
                    .unwrap_or_else(|| id.clone());
                let node = builder.declare(&id, NodeKind::Group, label);
                node.data = DialectPayload::State {
                    marker: StateMarker::Normal,
                };
                adopt(&mut builder, &id, &open);
                open.push(id);
            }
            StateToken::CompositeEnd => {
                if open.pop().is_none() {
                    trace!("ignoring unmatched closing brace");
                }
            }
            StateToken::Description { id, text } => {
                state_node(&mut builder, &id, &open);
                if let Some(node) = builder.node_mut(&id) {
                    if node.label == node.id {
                        node.label = text;
                    } else {
                        node.label = format!("{}\n{text}", node.label);
                    }
                }
            }
            StateToken::Transition(transition) => {
                let from = resolve_state(&mut builder, &transition.from, &open, StateMarker::Start);
                let to = resolve_state(&mut builder, &transition.to, &open, StateMarker::End);
                builder.connect(&from, &to, ArrowKind::Solid, transition.label);
            }
        }
    }
    builder.finish()
}

// --- pie ---

fn pie(tokens: Vec<PieToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::Pie);
    for token in tokens {
        match token {
            PieToken::Header { show_data, title } => {
                let graph = builder.graph_mut();
                graph.show_data |= show_data;
                if title.is_some() {
                    graph.title = title;
                }
            }
            PieToken::ShowData => builder.graph_mut().show_data = true,
            PieToken::Title(title) => builder.graph_mut().title = Some(title),
            PieToken::Slice { label, value } => {
                let id = unique_id(&builder, &slugify(&label));
                let mut node = Node::new(id, NodeKind::Circle, label);
                node.data = DialectPayload::PieSlice { value };
                builder.push_node(node);
            }
        }
    }
    builder.finish()
}

// --- mindmap ---

fn mindmap(tokens: Vec<MindmapToken>) -> Graph {
    let mut builder = GraphBuilder::new(Dialect::Mindmap);
    builder.graph_mut().direction = Direction::LeftRight;
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut last: Option<String> = None;

    for token in tokens {
        match token {
            MindmapToken::Header => {}
            MindmapToken::Class(class) => {
                let Some(node) = last.as_deref().and_then(|id| builder.node_mut(id)) else {
                    trace!(class, "class line before any node");
                    continue;
                };
                node.data = DialectPayload::Mindmap { class: Some(class) };
            }
            MindmapToken::Node(parsed) => {
                let base = parsed.id.unwrap_or_else(|| slugify(&parsed.label));
                let id = unique_id(&builder, &base);
                let mut node = Node::new(id.clone(), parsed.kind, parsed.label);
                node.data = DialectPayload::Mindmap { class: parsed.class };
                builder.push_node(node);

                while stack.last().is_some_and(|(indent, _)| *indent >= parsed.indent) {
                    stack.pop();
                }
                if let Some((_, parent)) = stack.last() {
                    let parent = parent.clone();
                    builder.connect(&parent, &id, ArrowKind::Open, None);
                }
                stack.push((parsed.indent, id.clone()));
                last = Some(id);
            }
        }
    }
    builder.finish()
}

// --- unsupported ---

fn unsupported(text: &str) -> Graph {
    let keyword = dialect::header_keyword(text).unwrap_or_default().to_string();
    let source = text
        .lines()
        .filter(|line| !is_sidecar_line(line))
        .collect::<Vec<_>>()
        .join("\n");

    let mut graph = Graph::new(Dialect::Unsupported);
    let mut node = Node::new(UNSUPPORTED_NODE_ID, NodeKind::Rectangle, format!("{keyword} (unsupported)"));
    node.data = DialectPayload::Unsupported {
        dialect: keyword,
        source: source.trim_end().to_string(),
    };
    graph.nodes.push(node);
    graph
}
