use madraw::model::{Dialect, DialectPayload, NodeKind, Point, StateMarker};
use pretty_assertions::assert_eq;

fn assert_idempotent(input: &str) -> String {
    let first = madraw::serialize(&madraw::parse(input));
    let second = madraw::serialize(&madraw::parse(&first));
    assert_eq!(first, second, "serialization is not a fixed point for:\n{input}");
    first
}

#[test]
fn idempotent_flowchart() {
    let text = assert_idempotent(
        "graph LR\n    A[\"Start: here\"] --> B((Hub))\n    subgraph S [Side work]\n        C[(Store)] -.->|sync| D(Soft)\n    end\n    B ==> C\n    style D fill:#ffcc00,stroke-width:2px\n",
    );
    assert!(text.contains("style D fill:#ffcc00,stroke-width:2px"), "{text}");
    assert!(text.contains("subgraph S [Side work]"), "{text}");
}

#[test]
fn idempotent_nested_subgraphs() {
    assert_idempotent("graph TD\n    subgraph Outer\n        subgraph Inner\n            A\n        end\n        B\n    end\n    A --> B\n    B --> C\n");
}

#[test]
fn idempotent_state() {
    let text = assert_idempotent(
        "stateDiagram-v2\n    direction LR\n    [*] --> Idle\n    state \"Working hard\" as Busy\n    Idle --> Busy : start\n    state Busy {\n        [*] --> Step\n        Step --> [*]\n    }\n    Busy --> [*]\n",
    );
    assert!(text.contains("direction LR"), "{text}");
}

#[test]
fn idempotent_pie() {
    assert_idempotent("pie showData\n    title Key elements\n    \"Calcium\" : 42.96\n    \"Potassium\" : 50.05\n    \"Calcium\" : 1\n");
}

#[test]
fn idempotent_mindmap() {
    assert_idempotent("mindmap\n  root((Ideas))\n    Tools\n      pen[Pen and paper]\n    Origins:::old\n      Long history\n");
}

#[test]
fn unsupported_source_is_echoed() {
    let input = "classDiagram\n    class Animal\n    Animal <|-- Duck\n";
    let graph = madraw::parse(input);
    assert_eq!(graph.dialect, Dialect::Unsupported);
    match &graph.nodes[0].data {
        DialectPayload::Unsupported { dialect, .. } => assert_eq!(dialect, "classDiagram"),
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(madraw::serialize(&graph), input);
}

#[test]
fn positions_survive_to_the_nearest_integer() {
    let mut graph = madraw::parse("graph TD\n    A --> B\n    B --> C\n");
    let wanted = [("A", 10.4, 900.6), ("B", -35.5, 7.0), ("C", 250.0, 250.49)];
    for (id, x, y) in wanted {
        graph.node_mut(id).unwrap().position = Point::new(x, y);
    }
    let again = madraw::parse(&madraw::serialize(&graph));
    for (id, x, y) in wanted {
        let position = again.node(id).unwrap().position;
        assert_eq!((position.x, position.y), (x.round(), y.round()), "{id}");
    }
}

#[test]
fn state_pseudo_states_and_composites() {
    let graph = madraw::parse("stateDiagram\n    [*] --> A\n    state A {\n        [*] --> Inner\n    }\n    A --> [*]\n");
    assert_eq!(graph.node("A").unwrap().kind, NodeKind::Group);
    let scoped = graph.node("A__start__").unwrap();
    assert_eq!(scoped.parent.as_deref(), Some("A"));
    assert_eq!(scoped.state_marker(), StateMarker::Start);
    assert_eq!(graph.node("__end__").unwrap().state_marker(), StateMarker::End);
    assert_eq!(graph.node("Inner").unwrap().parent.as_deref(), Some("A"));
}

#[test]
fn pie_slices_keep_values() {
    let graph = madraw::parse("pie title Pets\n    \"Dogs\" : 386\n    \"Cats\" : 85.5\n");
    assert_eq!(graph.title.as_deref(), Some("Pets"));
    let values: Vec<f64> = graph
        .nodes
        .iter()
        .filter_map(|n| match n.data {
            DialectPayload::PieSlice { value } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![386.0, 85.5]);
}

#[test]
fn mindmap_tree_runs_left_to_right() {
    let graph = madraw::parse("mindmap\n  root\n    a\n    b\n");
    let root = graph.node("root").unwrap().position;
    let a = graph.node("a").unwrap().position;
    assert!(root.x < a.x);
    assert_eq!(graph.edges.len(), 2);
}

#[test]
fn escaped_labels_survive_reparse() {
    let mut graph = madraw::parse("graph TD\n    A --> B\n");
    graph.node_mut("A").unwrap().label = "say \"hi\" | C# <br> x:::y; a & b".into();
    graph.edges[0].label = Some("yes|no\nmaybe".into());

    let text = madraw::serialize(&graph);
    let again = madraw::parse(&text);
    assert_eq!(again.node("A").unwrap().label, "say \"hi\" | C# <br> x:::y; a & b");
    assert_eq!(again.edges.len(), 1, "{text}");
    assert_eq!(again.edges[0].label.as_deref(), Some("yes|no\nmaybe"));
    assert_eq!(madraw::serialize(&again), text);
}
