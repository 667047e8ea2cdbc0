use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Flowchart,
    Sequence,
    Er,
    State,
    Pie,
    Mindmap,
    Unsupported,
}

impl Dialect {
    /// Line prefix that the dialect ignores, used to carry sidecar data.
    pub fn comment_marker(self) -> &'static str {
        "%%"
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Flowchart => "flowchart",
            Dialect::Sequence => "sequence",
            Dialect::Er => "er",
            Dialect::State => "state",
            Dialect::Pie => "pie",
            Dialect::Mindmap => "mindmap",
            Dialect::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    TopDown,
    BottomTop,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Direction::TopDown),
            "BT" => Some(Direction::BottomTop),
            "LR" => Some(Direction::LeftRight),
            "RL" => Some(Direction::RightLeft),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Direction::TopDown => "TD",
            Direction::BottomTop => "BT",
            Direction::LeftRight => "LR",
            Direction::RightLeft => "RL",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftRight | Direction::RightLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Rectangle,
    Rounded,
    Circle,
    Diamond,
    Cylinder,
    Entity,
    Group,
    /// Invisible zero-size point on a sequence lifeline.
    Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    Solid,
    Dashed,
    Dotted,
}

/// Per-node or per-edge style. `None` means "use the dialect default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_style: Option<StrokeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<Size>,
}

impl StyleOverride {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none()
            && self.stroke_color.is_none()
            && self.stroke_style.is_none()
            && self.stroke_width.is_none()
            && self.text_color.is_none()
            && self.label_bg.is_none()
            && self.image_ref.is_none()
            && self.image_size.is_none()
    }

    /// Copy every attribute of `other` that `self` does not set yet.
    pub fn fill_missing(&mut self, other: &StyleOverride) {
        fn take<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        take(&mut self.fill, &other.fill);
        take(&mut self.stroke_color, &other.stroke_color);
        take(&mut self.stroke_style, &other.stroke_style);
        take(&mut self.stroke_width, &other.stroke_width);
        take(&mut self.text_color, &other.text_color);
        take(&mut self.label_bg, &other.label_bg);
        take(&mut self.image_ref, &other.image_ref);
        take(&mut self.image_size, &other.image_size);
    }

    /// Drop every attribute equal to the matching attribute of `defaults`.
    #[must_use]
    pub fn without_defaults(&self, defaults: &StyleOverride) -> StyleOverride {
        fn keep<T: Clone + PartialEq>(value: &Option<T>, default: &Option<T>) -> Option<T> {
            match (value, default) {
                (Some(v), Some(d)) if v == d => None,
                _ => value.clone(),
            }
        }
        StyleOverride {
            fill: keep(&self.fill, &defaults.fill),
            stroke_color: keep(&self.stroke_color, &defaults.stroke_color),
            stroke_style: keep(&self.stroke_style, &defaults.stroke_style),
            stroke_width: keep(&self.stroke_width, &defaults.stroke_width),
            text_color: keep(&self.text_color, &defaults.text_color),
            label_bg: keep(&self.label_bg, &defaults.label_bg),
            image_ref: keep(&self.image_ref, &defaults.image_ref),
            image_size: keep(&self.image_size, &defaults.image_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErAttribute {
    #[serde(rename = "type")]
    pub attr_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePosition {
    LeftOf,
    RightOf,
    Over,
}

impl NotePosition {
    pub fn as_token(self) -> &'static str {
        match self {
            NotePosition::LeftOf => "left of",
            NotePosition::RightOf => "right of",
            NotePosition::Over => "over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorRole {
    /// Endpoint of one message.
    Message,
    /// Bottom end of a participant's lifeline.
    Terminal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceData {
    pub participant_id: String,
    #[serde(default)]
    pub is_note: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_position: Option<NotePosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note_participants: Vec<String>,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub actor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMarker {
    Normal,
    Start,
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialectPayload {
    #[default]
    None,
    Entity {
        attributes: Vec<ErAttribute>,
    },
    Sequence(SequenceData),
    State {
        marker: StateMarker,
    },
    PieSlice {
        value: f64,
    },
    Mindmap {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
    },
    Unsupported {
        dialect: String,
        source: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    pub label: String,
    #[serde(default, skip_serializing_if = "StyleOverride::is_empty")]
    pub style: StyleOverride,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub data: DialectPayload,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Point::default(),
            size: None,
            label: label.into(),
            style: StyleOverride::default(),
            parent: None,
            data: DialectPayload::None,
        }
    }

    pub fn sequence(&self) -> Option<&SequenceData> {
        match &self.data {
            DialectPayload::Sequence(data) => Some(data),
            _ => None,
        }
    }

    /// Anchors are derived from the message list and never persisted.
    pub fn is_derived(&self) -> bool {
        self.kind == NodeKind::Anchor
    }

    pub fn state_marker(&self) -> StateMarker {
        match self.data {
            DialectPayload::State { marker } => marker,
            _ => StateMarker::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowKind {
    /// `-->`
    Solid,
    /// `---`
    Open,
    /// `-.->`
    Dotted,
    /// `-.-`
    DottedOpen,
    /// `==>`
    Thick,
    /// `===`
    ThickOpen,
    /// `->>`
    SequenceSync,
    /// `-->>`
    SequenceSyncDotted,
    /// `->`
    SequenceLine,
    /// `-->`
    SequenceLineDotted,
    /// `-x`
    SequenceCross,
    /// `--x`
    SequenceCrossDotted,
    /// `-)`
    SequenceAsync,
    /// `--)`
    SequenceAsyncDotted,
}

impl ArrowKind {
    pub fn flow_token(self) -> &'static str {
        match self {
            ArrowKind::Solid | ArrowKind::SequenceSync | ArrowKind::SequenceLine => "-->",
            ArrowKind::Open => "---",
            ArrowKind::Dotted
            | ArrowKind::SequenceSyncDotted
            | ArrowKind::SequenceLineDotted
            | ArrowKind::SequenceAsyncDotted
            | ArrowKind::SequenceCrossDotted => "-.->",
            ArrowKind::DottedOpen => "-.-",
            ArrowKind::Thick => "==>",
            ArrowKind::ThickOpen => "===",
            ArrowKind::SequenceCross | ArrowKind::SequenceAsync => "-->",
        }
    }

    pub fn sequence_token(self) -> &'static str {
        match self {
            ArrowKind::SequenceSync | ArrowKind::Solid | ArrowKind::Thick => "->>",
            ArrowKind::SequenceSyncDotted | ArrowKind::Dotted => "-->>",
            ArrowKind::SequenceLine | ArrowKind::Open | ArrowKind::ThickOpen => "->",
            ArrowKind::SequenceLineDotted | ArrowKind::DottedOpen => "-->",
            ArrowKind::SequenceCross => "-x",
            ArrowKind::SequenceCrossDotted => "--x",
            ArrowKind::SequenceAsync => "-)",
            ArrowKind::SequenceAsyncDotted => "--)",
        }
    }

    /// Stroke pattern the arrow marker implies.
    pub fn implied_stroke(self) -> StrokeStyle {
        match self {
            ArrowKind::Dotted
            | ArrowKind::DottedOpen
            | ArrowKind::SequenceSyncDotted
            | ArrowKind::SequenceLineDotted
            | ArrowKind::SequenceCrossDotted
            | ArrowKind::SequenceAsyncDotted => StrokeStyle::Dotted,
            _ => StrokeStyle::Solid,
        }
    }

    pub fn is_thick(self) -> bool {
        matches!(self, ArrowKind::Thick | ArrowKind::ThickOpen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ExactlyOne,
    ZeroOrOne,
    OneOrMany,
    ZeroOrMany,
}

impl Cardinality {
    /// Marker written on the left of the relationship line.
    pub fn left_token(self) -> &'static str {
        match self {
            Cardinality::ExactlyOne => "||",
            Cardinality::ZeroOrOne => "|o",
            Cardinality::OneOrMany => "}|",
            Cardinality::ZeroOrMany => "}o",
        }
    }

    /// Marker written on the right of the relationship line.
    pub fn right_token(self) -> &'static str {
        match self {
            Cardinality::ExactlyOne => "||",
            Cardinality::ZeroOrOne => "o|",
            Cardinality::OneOrMany => "|{",
            Cardinality::ZeroOrMany => "o{",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub left: Cardinality,
    pub right: Cardinality,
    pub identifying: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default)]
    pub is_lifeline: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    #[serde(default)]
    pub activate_target: bool,
    #[serde(default)]
    pub deactivate_source: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub arrow: ArrowKind,
    #[serde(default, skip_serializing_if = "StyleOverride::is_empty")]
    pub style: StyleOverride,
    #[serde(default)]
    pub data: EdgeData,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: &str, target: &str, arrow: ArrowKind) -> Self {
        Self {
            id: id.into(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
            label: None,
            arrow,
            style: StyleOverride::default(),
            data: EdgeData::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub dialect: Dialect,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub show_data: bool,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            direction: Direction::default(),
            title: None,
            show_data: false,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Direct children of a group, in node order. `None` yields top-level nodes.
    pub fn children_of<'a>(&'a self, parent: Option<&'a str>) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| n.parent.as_deref() == parent)
    }

    /// Describe every broken model invariant; empty when the graph is sound.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let by_id: HashMap<&str, &Node> = self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        if by_id.len() != self.nodes.len() {
            problems.push("duplicate node ids".to_string());
        }

        for node in &self.nodes {
            let Some(parent) = node.parent.as_deref() else {
                continue;
            };
            match by_id.get(parent) {
                None => problems.push(format!("node '{}' has missing parent '{parent}'", node.id)),
                Some(p) if p.kind != NodeKind::Group => {
                    problems.push(format!("node '{}' has non-group parent '{parent}'", node.id));
                }
                Some(_) => {}
            }
            let mut seen: HashSet<&str> = HashSet::new();
            let mut cursor = Some(node.id.as_str());
            while let Some(id) = cursor {
                if !seen.insert(id) {
                    problems.push(format!("parent chain of '{}' is cyclic", node.id));
                    break;
                }
                cursor = by_id.get(id).and_then(|n| n.parent.as_deref());
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !by_id.contains_key(endpoint.as_str()) {
                    problems.push(format!("edge '{}' references missing node '{endpoint}'", edge.id));
                }
            }
        }
        problems
    }
}
