//! Metadata sidecar carried in DSL comment lines.
//!
//! ```text
//! %% layout: {"v":1,"data":{"A":{"x":40,"y":120}}}
//! %% styles: {"v":1,"data":{"A":{"labelBg":"#ffffff"}}}
//! %% edges: {"v":1,"data":[{"source":"A","target":"B","arrow":"solid","sourceHandle":"right"}]}
//! ```
//!
//! Lines may appear anywhere and in any order. Payloads without the
//! `{"v":..,"data":..}` envelope are read as version 1. A channel whose
//! payload cannot be decoded is treated as empty; the rest of the text is
//! unaffected. When an id repeats inside one payload the first entry wins.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MadrawError, Result};
use crate::model::{ArrowKind, Dialect, Edge, Graph, NodeId, Point, StyleOverride};
use crate::style;

pub const LAYOUT_TAG: &str = "layout:";
pub const STYLES_TAG: &str = "styles:";
pub const EDGES_TAG: &str = "edges:";
pub const SIDECAR_VERSION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    #[serde(deserialize_with = "rounded")]
    pub x: i64,
    #[serde(deserialize_with = "rounded")]
    pub y: i64,
}

impl SavedPosition {
    pub fn from_point(point: Point) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let saved = Self {
            x: point.x.round() as i64,
            y: point.y.round() as i64,
        };
        saved
    }

    pub fn to_point(self) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let point = Point::new(self.x as f64, self.y as f64);
        point
    }
}

fn rounded<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(de::Error::custom("coordinate must be finite"));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(value.round() as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeOverride {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow: Option<ArrowKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOverride>,
}

impl EdgeOverride {
    fn key(&self) -> (&str, &str, Option<ArrowKind>, Option<&str>) {
        (&self.source, &self.target, self.arrow, self.label.as_deref())
    }

    /// Entries without an arrow match any arrow between the same endpoints.
    fn matches(&self, edge: &Edge) -> bool {
        !edge.data.is_lifeline
            && edge.source == self.source
            && edge.target == self.target
            && self.arrow.is_none_or(|arrow| arrow == edge.arrow)
            && edge.label == self.label
    }
}

/// The three sidecar channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidecar {
    pub positions: BTreeMap<NodeId, SavedPosition>,
    pub styles: BTreeMap<NodeId, StyleOverride>,
    pub edges: Vec<EdgeOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Layout,
    Styles,
    Edges,
}

impl Channel {
    fn name(self) -> &'static str {
        match self {
            Channel::Layout => "layout",
            Channel::Styles => "styles",
            Channel::Edges => "edges",
        }
    }
}

/// Map that keeps the first value seen for a repeated key.
struct FirstWins<T>(BTreeMap<String, T>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FirstWins<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FirstWinsVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for FirstWinsVisitor<T> {
            type Value = FirstWins<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object keyed by node id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    map.entry(key).or_insert(value);
                }
                Ok(FirstWins(map))
            }
        }

        deserializer.deserialize_map(FirstWinsVisitor(PhantomData))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire<T> {
    Versioned { v: u64, data: T },
    Legacy(T),
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    v: u64,
    data: &'a T,
}

fn decode<T: for<'de> Deserialize<'de>>(channel: Channel, payload: &str) -> Result<T> {
    let wire: Wire<T> = serde_json::from_str(payload).map_err(|e| MadrawError::Sidecar {
        channel: channel.name(),
        message: e.to_string(),
    })?;
    match wire {
        Wire::Versioned { v, data } if v <= SIDECAR_VERSION => Ok(data),
        Wire::Versioned { v, .. } => Err(MadrawError::SidecarVersion {
            channel: channel.name(),
            version: v,
        }),
        Wire::Legacy(data) => Ok(data),
    }
}

fn tagged_payload<'a>(line: &'a str, marker: &str) -> Option<(Channel, &'a str)> {
    let body = line.trim().strip_prefix(marker)?.trim_start();
    [
        (LAYOUT_TAG, Channel::Layout),
        (STYLES_TAG, Channel::Styles),
        (EDGES_TAG, Channel::Edges),
    ]
    .into_iter()
    .find_map(|(tag, channel)| body.strip_prefix(tag).map(|rest| (channel, rest.trim())))
}

/// Whether a line carries a sidecar channel and so is not diagram content.
pub fn is_sidecar_line(line: &str) -> bool {
    tagged_payload(line, "%%").is_some()
}

impl Sidecar {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.styles.is_empty() && self.edges.is_empty()
    }

    /// Collect the channels present in `text`. Only the first line of each
    /// channel is read.
    pub fn extract(text: &str, marker: &str) -> Self {
        let mut sidecar = Sidecar::default();
        let mut seen: Vec<Channel> = Vec::new();

        for line in text.lines() {
            let Some((channel, payload)) = tagged_payload(line, marker) else {
                continue;
            };
            if seen.contains(&channel) {
                debug!(channel = channel.name(), "ignoring repeated sidecar line");
                continue;
            }
            seen.push(channel);

            let outcome = match channel {
                Channel::Layout => decode::<FirstWins<SavedPosition>>(channel, payload)
                    .map(|m| sidecar.positions = m.0),
                Channel::Styles => decode::<FirstWins<StyleOverride>>(channel, payload)
                    .map(|m| sidecar.styles = m.0),
                Channel::Edges => decode::<Vec<EdgeOverride>>(channel, payload)
                    .map(|list| sidecar.edges = dedup_edge_overrides(list)),
            };
            if let Err(e) = outcome {
                warn!(error = %e, "sidecar channel dropped");
            }
        }
        sidecar
    }

    /// Capture what the DSL body of `graph` cannot express.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut sidecar = Sidecar::default();
        if graph.dialect == Dialect::Unsupported {
            return sidecar;
        }

        for node in graph.nodes.iter().filter(|n| !n.is_derived()) {
            sidecar
                .positions
                .entry(node.id.clone())
                .or_insert_with(|| SavedPosition::from_point(node.position));

            let mut diff = style::node_override(graph.dialect, node);
            if graph.dialect == Dialect::Flowchart {
                strip_native_flow_style(&mut diff);
            }
            if !diff.is_empty() {
                sidecar.styles.entry(node.id.clone()).or_insert(diff);
            }
        }

        for edge in graph.edges.iter().filter(|e| !e.data.is_lifeline) {
            let diff = style::edge_override(graph.dialect, edge.arrow, &edge.style);
            if edge.source_handle.is_none() && edge.target_handle.is_none() && diff.is_empty() {
                continue;
            }
            sidecar.edges.push(EdgeOverride {
                source: edge.source.clone(),
                target: edge.target.clone(),
                arrow: Some(edge.arrow),
                label: edge.label.clone(),
                source_handle: edge.source_handle.clone(),
                target_handle: edge.target_handle.clone(),
                style: (!diff.is_empty()).then_some(diff),
            });
        }
        sidecar
    }

    /// Render the non-empty channels as comment lines.
    pub fn to_lines(&self, marker: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.positions.is_empty() {
            push_line(&mut lines, marker, LAYOUT_TAG, &self.positions);
        }
        if !self.styles.is_empty() {
            push_line(&mut lines, marker, STYLES_TAG, &self.styles);
        }
        if !self.edges.is_empty() {
            push_line(&mut lines, marker, EDGES_TAG, &self.edges);
        }
        lines
    }

    /// Fill positions, styles and handles of the structural graph. Entries
    /// for ids the graph does not contain are dropped. Returns the ids that
    /// received a saved position.
    pub fn apply(&self, graph: &mut Graph) -> HashSet<NodeId> {
        let mut positioned = HashSet::new();

        for node in graph.nodes.iter_mut().filter(|n| !n.is_derived()) {
            if let Some(saved) = self.positions.get(&node.id) {
                node.position = saved.to_point();
                positioned.insert(node.id.clone());
            }
            if let Some(saved) = self.styles.get(&node.id) {
                node.style.fill_missing(saved);
            }
        }
        let stale = self.positions.len() - positioned.len();
        if stale > 0 {
            debug!(stale, "dropped sidecar positions for unknown nodes");
        }

        let mut claimed: HashSet<usize> = HashSet::new();
        for entry in &self.edges {
            let found = graph
                .edges
                .iter()
                .enumerate()
                .position(|(i, e)| !claimed.contains(&i) && entry.matches(e));
            let Some(index) = found else {
                debug!(source = %entry.source, target = %entry.target, "dropped stale edge override");
                continue;
            };
            claimed.insert(index);
            let edge = &mut graph.edges[index];
            if edge.source_handle.is_none() {
                edge.source_handle.clone_from(&entry.source_handle);
            }
            if edge.target_handle.is_none() {
                edge.target_handle.clone_from(&entry.target_handle);
            }
            if let Some(style) = &entry.style {
                edge.style.fill_missing(style);
            }
        }

        positioned
    }
}

fn push_line<T: Serialize>(lines: &mut Vec<String>, marker: &str, tag: &str, data: &T) {
    let envelope = Envelope {
        v: SIDECAR_VERSION,
        data,
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => lines.push(format!("{marker} {tag} {json}")),
        Err(e) => warn!(error = %e, tag, "failed to encode sidecar channel"),
    }
}

fn dedup_edge_overrides(list: Vec<EdgeOverride>) -> Vec<EdgeOverride> {
    let mut kept: Vec<EdgeOverride> = Vec::with_capacity(list.len());
    for entry in list {
        if !kept.iter().any(|k| k.key() == entry.key()) {
            kept.push(entry);
        }
    }
    kept
}

/// Flowchart `style` lines already carry these attributes.
pub(crate) fn strip_native_flow_style(style: &mut StyleOverride) {
    style.fill = None;
    style.stroke_color = None;
    style.stroke_style = None;
    style.stroke_width = None;
    style.text_color = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArrowKind, Edge, Node, NodeKind};
    use pretty_assertions::assert_eq;

    fn graph_with(ids: &[&str]) -> Graph {
        let mut graph = Graph::new(Dialect::Flowchart);
        for id in ids {
            graph.nodes.push(Node::new(*id, NodeKind::Rectangle, *id));
        }
        graph
    }

    #[test]
    fn extract_reads_versioned_and_legacy_payloads() {
        let text = "graph TD\n%% layout: {\"v\":1,\"data\":{\"A\":{\"x\":10.4,\"y\":20.6}}}\n%% styles: {\"A\":{\"strokeColor\":\"#00ff00\"}}\n";
        let sidecar = Sidecar::extract(text, "%%");
        assert_eq!(sidecar.positions["A"], SavedPosition { x: 10, y: 21 });
        assert_eq!(sidecar.styles["A"].stroke_color.as_deref(), Some("#00ff00"));
    }

    #[test]
    fn malformed_channel_degrades_alone() {
        let text = "%% layout: {broken\n%% styles: {\"A\":{\"fill\":\"#fff000\"}}";
        let sidecar = Sidecar::extract(text, "%%");
        assert!(sidecar.positions.is_empty());
        assert_eq!(sidecar.styles.len(), 1);
    }

    #[test]
    fn newer_version_is_ignored() {
        let text = "%% layout: {\"v\":9,\"data\":{\"A\":{\"x\":1,\"y\":2}}}";
        assert!(Sidecar::extract(text, "%%").positions.is_empty());
    }

    #[test]
    fn repeated_ids_keep_first_entry() {
        let text = "%% layout: {\"A\":{\"x\":1,\"y\":1},\"A\":{\"x\":9,\"y\":9}}";
        let sidecar = Sidecar::extract(text, "%%");
        assert_eq!(sidecar.positions["A"], SavedPosition { x: 1, y: 1 });
    }

    #[test]
    fn repeated_edge_keys_keep_first_entry() {
        let text = "%% edges: [{\"source\":\"A\",\"target\":\"B\",\"sourceHandle\":\"left\"},{\"source\":\"A\",\"target\":\"B\",\"sourceHandle\":\"right\"}]";
        let sidecar = Sidecar::extract(text, "%%");
        assert_eq!(sidecar.edges.len(), 1);
        assert_eq!(sidecar.edges[0].source_handle.as_deref(), Some("left"));
    }

    #[test]
    fn unrelated_comments_are_ignored() {
        let text = "%% just a note\n%%layout:{\"A\":{\"x\":3,\"y\":4}}";
        let sidecar = Sidecar::extract(text, "%%");
        assert_eq!(sidecar.positions["A"], SavedPosition { x: 3, y: 4 });
    }

    #[test]
    fn apply_drops_stale_entries() {
        let mut graph = graph_with(&["A"]);
        let text = "%% layout: {\"A\":{\"x\":5,\"y\":6},\"Gone\":{\"x\":1,\"y\":1}}";
        let positioned = Sidecar::extract(text, "%%").apply(&mut graph);
        assert_eq!(positioned.len(), 1);
        assert_eq!(graph.nodes[0].position, Point::new(5.0, 6.0));
    }

    #[test]
    fn apply_fills_edge_handles() {
        let mut graph = graph_with(&["A", "B"]);
        graph.edges.push(Edge::new("A->B", "A", "B", ArrowKind::Solid));
        let text = "%% edges: [{\"source\":\"A\",\"target\":\"B\",\"targetHandle\":\"top\"}]";
        Sidecar::extract(text, "%%").apply(&mut graph);
        assert_eq!(graph.edges[0].target_handle.as_deref(), Some("top"));
    }

    #[test]
    fn parallel_edges_keep_their_own_handles() {
        let mut graph = graph_with(&["A", "B"]);
        let mut solid = Edge::new("A->B", "A", "B", ArrowKind::Solid);
        solid.source_handle = Some("left".into());
        let mut dotted = Edge::new("A->B#1", "A", "B", ArrowKind::Dotted);
        dotted.source_handle = Some("right".into());
        graph.edges.extend([solid, dotted]);

        let text = Sidecar::from_graph(&graph).to_lines("%%").join("\n");
        let sidecar = Sidecar::extract(&text, "%%");
        assert_eq!(sidecar.edges.len(), 2);

        for edge in &mut graph.edges {
            edge.source_handle = None;
        }
        sidecar.apply(&mut graph);
        let handles: Vec<Option<&str>> = graph.edges.iter().map(|e| e.source_handle.as_deref()).collect();
        assert_eq!(handles, vec![Some("left"), Some("right")]);
    }

    #[test]
    fn entry_without_arrow_matches_any_arrow() {
        let mut graph = graph_with(&["A", "B"]);
        graph.edges.push(Edge::new("A->B", "A", "B", ArrowKind::Thick));
        let text = "%% edges: [{\"source\":\"A\",\"target\":\"B\",\"sourceHandle\":\"bottom\"}]";
        Sidecar::extract(text, "%%").apply(&mut graph);
        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("bottom"));
    }

    #[test]
    fn lines_round_trip_through_extract() {
        let mut graph = graph_with(&["A", "B"]);
        graph.nodes[0].position = Point::new(12.2, 40.0);
        graph.nodes[1].style.label_bg = Some("#ffffff".into());
        let mut edge = Edge::new("A->B", "A", "B", ArrowKind::Solid);
        edge.source_handle = Some("right".into());
        graph.edges.push(edge);

        let sidecar = Sidecar::from_graph(&graph);
        let text = sidecar.to_lines("%%").join("\n");
        assert!(text.starts_with("%% layout: {\"v\":1,"), "got: {text}");
        assert_eq!(Sidecar::extract(&text, "%%"), sidecar);
    }

    #[test]
    fn native_flow_styles_stay_out_of_the_sidecar() {
        let mut graph = graph_with(&["A"]);
        graph.nodes[0].style.fill = Some("#ff0000".into());
        assert!(Sidecar::from_graph(&graph).styles.is_empty());
    }
}
