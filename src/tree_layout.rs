use std::collections::{HashMap, HashSet};

use crate::config::LayoutConfig;
use crate::layout::{Placement, Placements, default_size};
use crate::model::{Graph, Point};

struct TreeWalk<'a> {
    children: HashMap<&'a str, Vec<&'a str>>,
    visited: HashSet<&'a str>,
    centres: Vec<(&'a str, usize, f64)>,
    next_row: f64,
    row_spacing: f64,
}

impl<'a> TreeWalk<'a> {
    /// Place `id` and its subtree; returns the centre line of `id`.
    fn place(&mut self, id: &'a str, depth: usize) -> f64 {
        self.visited.insert(id);
        let kids: Vec<&'a str> = self
            .children
            .get(id)
            .map(|k| k.iter().copied().filter(|c| !self.visited.contains(c)).collect())
            .unwrap_or_default();

        let centre = if kids.is_empty() {
            let row = self.next_row;
            self.next_row += self.row_spacing;
            row
        } else {
            let lines: Vec<f64> = kids.into_iter().map(|k| self.place(k, depth + 1)).collect();
            let first = lines.first().copied().unwrap_or_default();
            let last = lines.last().copied().unwrap_or_default();
            (first + last) / 2.0
        };
        self.centres.push((id, depth, centre));
        centre
    }
}

pub fn layout(graph: &Graph, config: &LayoutConfig) -> Placements {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        children.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        has_parent.insert(edge.target.as_str());
    }

    let mut walk = TreeWalk {
        children,
        visited: HashSet::new(),
        centres: Vec::new(),
        next_row: 0.0,
        row_spacing: config.tree_row_spacing,
    };
    for node in graph.nodes.iter().filter(|n| !has_parent.contains(n.id.as_str())) {
        if !walk.visited.contains(node.id.as_str()) {
            walk.place(&node.id, 0);
        }
    }
    // nodes only reachable through a cycle
    for node in &graph.nodes {
        if !walk.visited.contains(node.id.as_str()) {
            walk.place(&node.id, 0);
        }
    }

    let mut out = Placements::new();
    for (id, depth, centre) in walk.centres {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let size = default_size(node);
        #[allow(clippy::cast_precision_loss)]
        let x = depth as f64 * config.tree_column_spacing;
        out.insert(
            id.to_string(),
            Placement {
                position: Point::new(x, centre - size.height / 2.0),
                size,
            },
        );
    }

    let top = out.values().map(|p| p.position.y).fold(0.0, f64::min);
    for placement in out.values_mut() {
        placement.position.y -= top;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArrowKind, Dialect, Edge, Node, NodeKind};
    use pretty_assertions::assert_eq;

    fn tree(edges: &[(&str, &str)], ids: &[&str]) -> Graph {
        let mut graph = Graph::new(Dialect::Mindmap);
        for id in ids {
            graph.nodes.push(Node::new(*id, NodeKind::Rectangle, *id));
        }
        for (s, t) in edges {
            graph.edges.push(Edge::new(format!("{s}->{t}"), s, t, ArrowKind::Open));
        }
        graph
    }

    fn centre(p: &Placements, id: &str) -> f64 {
        p[id].position.y + p[id].size.height / 2.0
    }

    #[test]
    fn layout_root_left_children_right() {
        let g = tree(&[("root", "a"), ("root", "b")], &["root", "a", "b"]);
        let p = layout(&g, &LayoutConfig::default());
        assert!(p["root"].position.x < p["a"].position.x);
        assert_eq!(p["a"].position.x, p["b"].position.x);
        assert!(centre(&p, "a") < centre(&p, "b"));
    }

    #[test]
    fn layout_parent_centred_on_children() {
        let g = tree(&[("root", "a"), ("root", "b"), ("root", "c")], &["root", "a", "b", "c"]);
        let p = layout(&g, &LayoutConfig::default());
        assert_eq!(centre(&p, "root"), centre(&p, "b"));
    }

    #[test]
    fn layout_places_every_node_once() {
        let g = tree(&[("a", "b"), ("b", "a")], &["a", "b", "lonely"]);
        let p = layout(&g, &LayoutConfig::default());
        assert_eq!(p.len(), 3);
        assert!(p.values().all(|pl| pl.position.y >= 0.0));
    }
}
