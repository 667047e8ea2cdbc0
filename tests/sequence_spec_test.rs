use madraw::model::{AnchorRole, ArrowKind, NodeKind, NotePosition};
use madraw::reduce::terminal_anchor_id;
use pretty_assertions::assert_eq;

fn participants(graph: &madraw::Graph) -> Vec<&str> {
    let mut found: Vec<(usize, &str)> = graph
        .nodes
        .iter()
        .filter_map(|n| {
            let data = n.sequence()?;
            (!data.is_note && data.anchor.is_none()).then_some((data.order, n.id.as_str()))
        })
        .collect();
    found.sort();
    found.into_iter().map(|(_, id)| id).collect()
}

#[test]
fn spec_sequence_single_message() {
    let input = "sequenceDiagram\n    participant UI\n    participant API\n    UI->>API: Request\n";
    let graph = madraw::parse(input);

    assert_eq!(participants(&graph), vec!["UI", "API"]);

    let anchors: Vec<&str> = graph
        .nodes
        .iter()
        .filter(|n| n.sequence().and_then(|d| d.anchor) == Some(AnchorRole::Message))
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(anchors.len(), 2);
    assert!(graph.nodes.iter().filter(|n| n.kind == NodeKind::Anchor).all(|n| {
        n.size.is_some_and(|s| s.width == 0.0 && s.height == 0.0)
    }));

    let messages: Vec<_> = graph.edges.iter().filter(|e| !e.data.is_lifeline).collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].arrow, ArrowKind::SequenceSync);
    assert_eq!(messages[0].label.as_deref(), Some("Request"));
    let source = graph.node(&messages[0].source).unwrap().position;
    let target = graph.node(&messages[0].target).unwrap().position;
    assert_eq!(source.y, target.y, "message edge is horizontal");

    for p in ["UI", "API"] {
        let lane: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .filter(|e| e.data.is_lifeline && e.data.participants == [p.to_string()])
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(lane.len(), 2, "{p}: {lane:?}");
        assert_eq!(lane[0].0, p);
        assert_eq!(lane[1].1, terminal_anchor_id(p));
        assert_eq!(lane[0].1, lane[1].0, "lifeline runs through the anchor");
    }
}

#[test]
fn spec_sequence_implicit_participants_in_first_seen_order() {
    let graph = madraw::parse("sequenceDiagram\n    C->>A: one\n    A->>B: two\n");
    assert_eq!(participants(&graph), vec!["C", "A", "B"]);
}

#[test]
fn spec_sequence_participant_without_messages_gets_lifeline() {
    let graph = madraw::parse("sequenceDiagram\n    participant Idle\n    A->>B: hi\n");
    let terminal = terminal_anchor_id("Idle");
    assert!(graph.node(&terminal).is_some());
    assert!(graph
        .edges
        .iter()
        .any(|e| e.data.is_lifeline && e.source == "Idle" && e.target == terminal));
}

#[test]
fn spec_sequence_alias_and_actor() {
    let graph = madraw::parse("sequenceDiagram\n    actor U as End User\n    U->>S: go\n");
    let user = graph.node("U").unwrap();
    assert_eq!(user.label, "End User");
    assert!(user.sequence().is_some_and(|d| d.actor));
    assert_eq!(graph.node("S").unwrap().label, "S");
}

#[test]
fn spec_sequence_notes_consume_order() {
    let graph = madraw::parse(
        "sequenceDiagram\n    A->>B: hi\n    Note right of B: thinking\n    B-->>A: ok\n",
    );
    let note = graph.node("note@1").unwrap();
    let data = note.sequence().unwrap();
    assert!(data.is_note);
    assert_eq!(data.note_position, Some(NotePosition::RightOf));
    assert_eq!(note.label, "thinking");

    let reply = graph.edges.iter().find(|e| e.label.as_deref() == Some("ok")).unwrap();
    assert_eq!(reply.data.order, Some(2));
    let first = graph.node("A@0").unwrap().position.y;
    let second = graph.node("A@2").unwrap().position.y;
    assert!(second > first);
}

#[test]
fn spec_sequence_round_trip_is_stable() {
    let input = "sequenceDiagram\n    participant UI\n    participant API\n    UI->>API: Request\n    API--)UI: Event\n";
    let first = madraw::serialize(&madraw::parse(input));
    let second = madraw::serialize(&madraw::parse(&first));
    assert_eq!(first, second);
    assert!(!first.contains("@"), "anchors are never persisted: {first}");
}

#[test]
fn spec_sequence_saved_participant_position() {
    let input = "sequenceDiagram\n    A->>B: hi\n%% layout: {\"v\":1,\"data\":{\"A\":{\"x\":0,\"y\":0},\"B\":{\"x\":600,\"y\":0}}}\n";
    let graph = madraw::parse(input);
    assert_eq!(graph.node("B").unwrap().position.x, 600.0);
    let b_anchor = graph.node("B@0").unwrap().position.x;
    assert!(b_anchor > 600.0);
}
