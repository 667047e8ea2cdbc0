use madraw::model::{ArrowKind, Direction, NodeKind, StrokeStyle};
use pretty_assertions::assert_eq;

fn node_ids(graph: &madraw::Graph) -> Vec<&str> {
    graph.nodes.iter().map(|n| n.id.as_str()).collect()
}

// =============================================================================
// Declarations and edges
// =============================================================================

#[test]
fn spec_flowchart_shapes_and_edges() {
    let input = "graph TD\n    A[Start] --> B{Check}\n    B -- Yes --> C[Done]";
    let graph = madraw::parse(input);

    assert_eq!(node_ids(&graph), vec!["A", "B", "C"]);
    let kinds: Vec<(NodeKind, &str)> = graph.nodes.iter().map(|n| (n.kind, n.label.as_str())).collect();
    assert_eq!(
        kinds,
        vec![
            (NodeKind::Rectangle, "Start"),
            (NodeKind::Diamond, "Check"),
            (NodeKind::Rectangle, "Done"),
        ]
    );
    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.edges[1].label.as_deref(), Some("Yes"));

    let text = madraw::serialize(&graph);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(&lines[..4], &["graph TD", "    A[Start]", "    B{Check}", "    C[Done]"]);
    assert!(lines.iter().any(|l| l.starts_with("%% layout: ")), "{text}");
}

#[test]
fn spec_flowchart_undeclared_target_defaults() {
    let graph = madraw::parse("graph LR\n    A --> Z\n");
    let z = graph.node("Z").unwrap();
    assert_eq!(z.kind, NodeKind::Rectangle);
    assert_eq!(z.label, "Z");
    assert_eq!(graph.direction, Direction::LeftRight);
}

#[test]
fn spec_flowchart_keyword_same_as_graph() {
    let graph = madraw::parse("graph TD\n    A --> B\n");
    let flowchart = madraw::parse("flowchart TD\n    A --> B\n");
    assert_eq!(graph, flowchart);
}

#[test]
fn spec_flowchart_arrow_kinds() {
    let graph = madraw::parse("graph TD\n    A -.-> B\n    B ==> C\n    C --- D\n    D -. maybe .-> E\n");
    let arrows: Vec<ArrowKind> = graph.edges.iter().map(|e| e.arrow).collect();
    assert_eq!(
        arrows,
        vec![ArrowKind::Dotted, ArrowKind::Thick, ArrowKind::Open, ArrowKind::Dotted]
    );
    assert_eq!(graph.edges[3].label.as_deref(), Some("maybe"));
}

#[test]
fn spec_flowchart_repeated_edge_counted_once() {
    let graph = madraw::parse("graph TD\n    A --> B\n    A --> B\n    A -->|again| B\n");
    assert_eq!(graph.edges.len(), 2);
}

#[test]
fn spec_flowchart_unknown_lines_are_skipped() {
    let graph = madraw::parse("graph TD\n    A --> B\n    click A callback\n    ???\n");
    assert_eq!(node_ids(&graph), vec!["A", "B"]);
}

// =============================================================================
// Groups
// =============================================================================

#[test]
fn spec_flowchart_subgraph_children_are_relative() {
    let input = "graph TD\n    subgraph G [Backend]\n        A --> B\n    end\n    C --> A\n";
    let graph = madraw::parse(input);
    let group = graph.node("G").unwrap();
    assert_eq!(group.kind, NodeKind::Group);
    assert_eq!(group.label, "Backend");

    let size = group.size.unwrap();
    for id in ["A", "B"] {
        let child = graph.node(id).unwrap();
        assert_eq!(child.parent.as_deref(), Some("G"));
        let child_size = child.size.unwrap();
        assert!(child.position.x >= 0.0 && child.position.y >= 0.0);
        assert!(child.position.x + child_size.width <= size.width);
        assert!(child.position.y + child_size.height <= size.height);
    }
    assert_eq!(graph.node("C").unwrap().parent, None);
}

#[test]
fn spec_flowchart_self_named_subgraph_is_not_its_own_parent() {
    let graph = madraw::parse("graph TD\n    subgraph A\n        A --> B\n    end\n");
    assert_eq!(graph.node("A").unwrap().parent, None);
    assert_eq!(graph.node("B").unwrap().parent.as_deref(), Some("A"));
    assert!(graph.invariant_violations().is_empty());
}

// =============================================================================
// Styles and sidecar
// =============================================================================

#[test]
fn spec_flowchart_style_line_and_sidecar_merge() {
    let input = "graph TD\n    A --> B\n    style A fill:#ff0000\n%% styles: {\"A\":{\"strokeColor\":\"#00ff00\"}}\n";
    let graph = madraw::parse(input);
    let a = graph.node("A").unwrap();
    assert_eq!(a.style.fill.as_deref(), Some("#ff0000"));
    assert_eq!(a.style.stroke_color.as_deref(), Some("#00ff00"));
}

#[test]
fn spec_flowchart_dsl_style_wins_over_sidecar() {
    let input = "graph TD\n    A\n    style A fill:#ff0000\n%% styles: {\"v\":1,\"data\":{\"A\":{\"fill\":\"#0000ff\"}}}\n";
    let graph = madraw::parse(input);
    assert_eq!(graph.node("A").unwrap().style.fill.as_deref(), Some("#ff0000"));
}

#[test]
fn spec_flowchart_dasharray_maps_to_stroke_style() {
    let graph = madraw::parse("graph TD\n    A\n    style A stroke-dasharray: 5 5,stroke-width:3px\n");
    let a = graph.node("A").unwrap();
    assert_eq!(a.style.stroke_style, Some(StrokeStyle::Dashed));
    assert_eq!(a.style.stroke_width, Some(3.0));
}

#[test]
fn spec_flowchart_malformed_sidecar_degrades() {
    let input = "graph TD\n    A --> B\n%% layout: {not json\n%% styles: {\"A\":{\"labelBg\":\"#eeeeee\"}}\n";
    let graph = madraw::parse(input);
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.node("A").unwrap().style.label_bg.as_deref(), Some("#eeeeee"));
}

#[test]
fn spec_flowchart_saved_positions_survive() {
    let input = "graph TD\n    A --> B\n%% layout: {\"v\":1,\"data\":{\"A\":{\"x\":300,\"y\":40},\"B\":{\"x\":12.6,\"y\":500}}}\n";
    let graph = madraw::parse(input);
    let a = graph.node("A").unwrap().position;
    let b = graph.node("B").unwrap().position;
    assert_eq!((a.x, a.y), (300.0, 40.0));
    assert_eq!((b.x, b.y), (13.0, 500.0));
}

#[test]
fn spec_flowchart_edge_handles_from_sidecar() {
    let input = "graph TD\n    A -->|go| B\n%% edges: {\"v\":1,\"data\":[{\"source\":\"A\",\"target\":\"B\",\"label\":\"go\",\"sourceHandle\":\"right\"}]}\n";
    let graph = madraw::parse(input);
    assert_eq!(graph.edges[0].source_handle.as_deref(), Some("right"));

    let text = madraw::serialize(&graph);
    assert!(text.contains("\"sourceHandle\":\"right\""), "{text}");
}

#[test]
fn spec_flowchart_parallel_edge_handles_survive_round_trip() {
    let mut graph = madraw::parse("graph TD\n    A --> B\n    A -.-> B\n");
    assert_eq!(graph.edges.len(), 2);
    graph.edges[0].source_handle = Some("left".into());
    graph.edges[1].source_handle = Some("right".into());

    let again = madraw::parse(&madraw::serialize(&graph));
    let handles: Vec<(ArrowKind, Option<&str>)> = again
        .edges
        .iter()
        .map(|e| (e.arrow, e.source_handle.as_deref()))
        .collect();
    assert_eq!(
        handles,
        vec![(ArrowKind::Solid, Some("left")), (ArrowKind::Dotted, Some("right"))]
    );
}

#[test]
fn spec_flowchart_edge_label_with_pipe_survives_round_trip() {
    let mut graph = madraw::parse("graph TD\n    A --> B\n");
    graph.edges[0].label = Some("yes|no".into());

    let text = madraw::serialize(&graph);
    let again = madraw::parse(&text);
    assert_eq!(again.edges.len(), 1, "{text}");
    assert_eq!(again.edges[0].label.as_deref(), Some("yes|no"));
    assert_eq!(madraw::serialize(&again), text);
}
