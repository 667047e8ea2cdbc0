use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::label::measure;
use crate::model::{Dialect, DialectPayload, Graph, Node, NodeId, NodeKind, Point, Size};
use crate::{graph_layout, sequence_layout, tree_layout};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Point,
    pub size: Size,
}

pub type Placements = HashMap<NodeId, Placement>;

const PAD_X: f64 = 40.0;
const PAD_Y: f64 = 24.0;
const MIN_WIDTH: f64 = 100.0;
const MIN_HEIGHT: f64 = 44.0;
const ATTRIBUTE_ROW: f64 = 24.0;

/// Size a node takes when nothing else decides it.
pub fn default_size(node: &Node) -> Size {
    let (w, h) = measure(&node.label);
    match node.kind {
        NodeKind::Anchor => Size::new(0.0, 0.0),
        NodeKind::Circle => {
            let d = (w.max(h) + PAD_X).max(60.0);
            Size::new(d, d)
        }
        NodeKind::Diamond => Size::new((w + 60.0).max(80.0), (h + 60.0).max(80.0)),
        NodeKind::Cylinder => Size::new((w + PAD_X).max(MIN_WIDTH), (h + PAD_X).max(60.0)),
        NodeKind::Entity => {
            let rows: Vec<String> = match &node.data {
                DialectPayload::Entity { attributes } => attributes
                    .iter()
                    .map(|a| format!("{} {} {}", a.attr_type, a.name, a.constraint.as_deref().unwrap_or("")))
                    .collect(),
                _ => Vec::new(),
            };
            let widest = rows.iter().map(|r| measure(r.trim_end()).0).fold(w, f64::max);
            #[allow(clippy::cast_precision_loss)]
            let height = h + PAD_Y + rows.len() as f64 * ATTRIBUTE_ROW;
            Size::new((widest + PAD_X).max(MIN_WIDTH * 1.2), height.max(MIN_HEIGHT))
        }
        NodeKind::Rectangle | NodeKind::Rounded | NodeKind::Group => {
            Size::new((w + PAD_X).max(MIN_WIDTH), (h + PAD_Y).max(MIN_HEIGHT))
        }
    }
}

/// Lay out `graph`. `positioned` holds the ids whose position came from the
/// sidecar.
pub fn apply_layout(graph: &mut Graph, positioned: &HashSet<NodeId>, config: &LayoutConfig) {
    let relevant = graph.nodes.iter().filter(|n| !n.is_derived()).count();
    if relevant == 0 {
        return;
    }
    let saved = graph
        .nodes
        .iter()
        .filter(|n| !n.is_derived() && positioned.contains(&n.id))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let coverage = saved as f64 / relevant as f64;
    let keep_saved = saved > 0 && coverage >= config.position_coverage_threshold;
    debug!(dialect = graph.dialect.as_str(), coverage, keep_saved, "layout");

    if graph.dialect == Dialect::Sequence {
        sequence_layout::layout(graph, positioned, keep_saved, config);
        return;
    }

    let placements = match graph.dialect {
        Dialect::Mindmap => tree_layout::layout(graph, config),
        _ => graph_layout::layout(graph, config),
    };
    for node in &mut graph.nodes {
        let Some(placement) = placements.get(&node.id) else {
            continue;
        };
        node.size = Some(placement.size);
        if !keep_saved || !positioned.contains(&node.id) {
            node.position = placement.position;
        }
    }
    if keep_saved {
        fit_groups(graph, config);
    }
}

fn depth(graph: &Graph, node: &Node) -> usize {
    let mut depth = 0;
    let mut cursor = node.parent.as_deref();
    while let Some(id) = cursor {
        depth += 1;
        if depth > graph.nodes.len() {
            break;
        }
        cursor = graph.node(id).and_then(|n| n.parent.as_deref());
    }
    depth
}

/// Grow groups, deepest first, until they enclose their children.
fn fit_groups(graph: &mut Graph, config: &LayoutConfig) {
    let mut groups: Vec<(usize, NodeId)> = graph
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Group)
        .map(|n| (depth(graph, n), n.id.clone()))
        .collect();
    groups.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, id) in groups {
        let (right, bottom) = graph
            .children_of(Some(&id))
            .map(|c| {
                let size = c.size.unwrap_or_default();
                (c.position.x + size.width, c.position.y + size.height)
            })
            .fold((0.0_f64, 0.0_f64), |acc, (r, b)| (acc.0.max(r), acc.1.max(b)));
        if let Some(group) = graph.node_mut(&id) {
            let size = group.size.unwrap_or_default();
            group.size = Some(Size::new(
                size.width.max(right + config.group_padding),
                size.height.max(bottom + config.group_padding),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Edge;
    use crate::model::ArrowKind;
    use pretty_assertions::assert_eq;

    fn chain(ids: &[&str]) -> Graph {
        let mut graph = Graph::new(Dialect::Flowchart);
        for id in ids {
            graph.nodes.push(Node::new(*id, NodeKind::Rectangle, *id));
        }
        for pair in ids.windows(2) {
            graph
                .edges
                .push(Edge::new(format!("{}->{}", pair[0], pair[1]), pair[0], pair[1], ArrowKind::Solid));
        }
        graph
    }

    #[test]
    fn low_coverage_recomputes_everything() {
        let mut graph = chain(&["A", "B", "C"]);
        graph.nodes[0].position = Point::new(999.0, 999.0);
        let positioned: HashSet<NodeId> = ["A".to_string()].into();
        apply_layout(&mut graph, &positioned, &LayoutConfig::default());
        assert_ne!(graph.nodes[0].position, Point::new(999.0, 999.0));
    }

    #[test]
    fn high_coverage_keeps_saved_positions() {
        let mut graph = chain(&["A", "B", "C"]);
        graph.nodes[0].position = Point::new(999.0, 999.0);
        graph.nodes[1].position = Point::new(5.0, 5.0);
        let positioned: HashSet<NodeId> = ["A".to_string(), "B".to_string()].into();
        apply_layout(&mut graph, &positioned, &LayoutConfig::default());
        assert_eq!(graph.nodes[0].position, Point::new(999.0, 999.0));
        assert_eq!(graph.nodes[1].position, Point::new(5.0, 5.0));
        assert!(graph.nodes[2].size.is_some());
    }

    #[test]
    fn entity_size_grows_with_attributes() {
        let mut entity = Node::new("E", NodeKind::Entity, "E");
        let bare = default_size(&entity);
        entity.data = DialectPayload::Entity {
            attributes: vec![crate::model::ErAttribute {
                attr_type: "string".into(),
                name: "name".into(),
                constraint: None,
            }],
        };
        assert!(default_size(&entity).height > bare.height);
    }

    #[test]
    fn fit_groups_encloses_saved_children() {
        let mut graph = Graph::new(Dialect::Flowchart);
        let mut group = Node::new("G", NodeKind::Group, "G");
        group.size = Some(Size::new(10.0, 10.0));
        let mut child = Node::new("A", NodeKind::Rectangle, "A");
        child.parent = Some("G".into());
        child.position = Point::new(300.0, 200.0);
        child.size = Some(Size::new(100.0, 50.0));
        graph.nodes.extend([group, child]);
        fit_groups(&mut graph, &LayoutConfig::default());
        let size = graph.nodes[0].size.unwrap();
        assert!(size.width >= 400.0 && size.height >= 250.0, "{size:?}");
    }
}
