use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::model::{ArrowKind, Dialect, Edge, Graph, Node, NodeId, NodeKind};

type EdgeKey = (NodeId, NodeId, Option<String>, ArrowKind);

/// Node ids stay unique, parent links point at existing groups without a
/// cycle, and an edge is added at most once per (source, target, label, arrow).
pub struct GraphBuilder {
    graph: Graph,
    index: HashMap<NodeId, usize>,
    edge_keys: HashSet<EdgeKey>,
    edge_ids: HashSet<String>,
}

impl GraphBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            graph: Graph::new(dialect),
            index: HashMap::new(),
            edge_keys: HashSet::new(),
            edge_ids: HashSet::new(),
        }
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.graph.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).map(|&i| &mut self.graph.nodes[i])
    }

    /// Reference a node by id. An unknown id becomes a Rectangle labelled
    /// with the id itself.
    pub fn ensure(&mut self, id: &str) -> &mut Node {
        let index = match self.index.get(id) {
            Some(&i) => i,
            None => {
                trace!(id, "materializing referenced node");
                self.insert(Node::new(id, NodeKind::Rectangle, id))
            }
        };
        &mut self.graph.nodes[index]
    }

    /// Declare a node with an explicit shape and label. A later declaration
    /// refines the earlier one, except that a group stays a group.
    pub fn declare(&mut self, id: &str, kind: NodeKind, label: impl Into<String>) -> &mut Node {
        let node = self.ensure(id);
        if node.kind != NodeKind::Group {
            node.kind = kind;
        }
        node.label = label.into();
        node
    }

    /// Add a fully built node. Returns false when the id is taken.
    pub fn push_node(&mut self, node: Node) -> bool {
        if self.index.contains_key(&node.id) {
            trace!(id = %node.id, "duplicate node ignored");
            return false;
        }
        self.insert(node);
        true
    }

    fn insert(&mut self, node: Node) -> usize {
        let index = self.graph.nodes.len();
        self.index.insert(node.id.clone(), index);
        self.graph.nodes.push(node);
        index
    }

    /// Link `child` under `parent`. Refused when the parent is missing, is
    /// not a group, is the child itself, or already sits below the child.
    pub fn set_parent(&mut self, child: &str, parent: &str) -> bool {
        if child == parent {
            warn!(child, "refusing to parent a node to itself");
            return false;
        }
        match self.node(parent) {
            Some(p) if p.kind == NodeKind::Group => {}
            Some(_) => {
                warn!(child, parent, "refusing non-group parent");
                return false;
            }
            None => {
                warn!(child, parent, "refusing missing parent");
                return false;
            }
        }
        if !self.contains(child) {
            return false;
        }

        let mut cursor = Some(parent.to_string());
        let mut hops = 0;
        while let Some(id) = cursor {
            if id == child || hops > self.graph.nodes.len() {
                warn!(child, parent, "refusing cyclic parent link");
                return false;
            }
            cursor = self.node(&id).and_then(|n| n.parent.clone());
            hops += 1;
        }

        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent.to_string());
        }
        true
    }

    /// Edge id derived from its endpoints, made unique with a numeric suffix.
    pub fn next_edge_id(&self, source: &str, target: &str) -> String {
        let base = format!("{source}->{target}");
        if !self.edge_ids.contains(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{base}#{n}"))
            .find(|candidate| !self.edge_ids.contains(candidate))
            .unwrap_or(base)
    }

    /// Add an edge between existing nodes. Duplicates and edges with a
    /// missing endpoint are dropped and `None` is returned.
    pub fn add_edge(&mut self, edge: Edge) -> Option<&mut Edge> {
        if !self.contains(&edge.source) || !self.contains(&edge.target) {
            warn!(source = %edge.source, target = %edge.target, "dropping edge with missing endpoint");
            return None;
        }
        let key = (edge.source.clone(), edge.target.clone(), edge.label.clone(), edge.arrow);
        if !self.edge_keys.insert(key) {
            trace!(source = %edge.source, target = %edge.target, "duplicate edge ignored");
            return None;
        }
        self.edge_ids.insert(edge.id.clone());
        self.graph.edges.push(edge);
        self.graph.edges.last_mut()
    }

    /// Connect two ids, materializing either endpoint when unknown.
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        arrow: ArrowKind,
        label: Option<String>,
    ) -> Option<&mut Edge> {
        self.ensure(source);
        self.ensure(target);
        let mut edge = Edge::new(self.next_edge_id(source, target), source, target, arrow);
        edge.label = label.filter(|l| !l.is_empty());
        self.add_edge(edge)
    }

    pub fn finish(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ensure_materializes_rectangle_labelled_with_id() {
        let mut builder = GraphBuilder::new(Dialect::Flowchart);
        builder.ensure("Z");
        let graph = builder.finish();
        assert_eq!(graph.nodes[0].kind, NodeKind::Rectangle);
        assert_eq!(graph.nodes[0].label, "Z");
    }

    #[test]
    fn declare_refines_forward_reference() {
        let mut builder = GraphBuilder::new(Dialect::Flowchart);
        builder.ensure("A");
        builder.declare("A", NodeKind::Diamond, "Check");
        let graph = builder.finish();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].kind, NodeKind::Diamond);
        assert_eq!(graph.nodes[0].label, "Check");
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut builder = GraphBuilder::new(Dialect::Flowchart);
        assert!(builder.connect("A", "B", ArrowKind::Solid, None).is_some());
        assert!(builder.connect("A", "B", ArrowKind::Solid, None).is_none());
        assert!(builder.connect("A", "B", ArrowKind::Solid, Some("x".into())).is_some());
        let graph = builder.finish();
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[1].id, "A->B#1");
    }

    #[test]
    fn parent_links_are_validated() {
        let mut builder = GraphBuilder::new(Dialect::Flowchart);
        builder.declare("G", NodeKind::Group, "G");
        builder.declare("H", NodeKind::Group, "H");
        builder.ensure("A");
        assert!(!builder.set_parent("G", "G"));
        assert!(!builder.set_parent("G", "A"));
        assert!(!builder.set_parent("A", "missing"));
        assert!(builder.set_parent("H", "G"));
        assert!(!builder.set_parent("G", "H"));
        assert!(builder.set_parent("A", "H"));
        assert!(builder.finish().invariant_violations().is_empty());
    }

    #[test]
    fn group_kind_survives_redeclaration() {
        let mut builder = GraphBuilder::new(Dialect::Flowchart);
        builder.declare("G", NodeKind::Group, "G");
        builder.declare("G", NodeKind::Rectangle, "Renamed");
        let graph = builder.finish();
        assert_eq!(graph.nodes[0].kind, NodeKind::Group);
        assert_eq!(graph.nodes[0].label, "Renamed");
    }
}
