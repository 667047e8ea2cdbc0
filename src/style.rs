use crate::model::{
    ArrowKind, Dialect, DialectPayload, Node, NodeKind, StateMarker, StrokeStyle, StyleOverride,
};

const TEXT: &str = "#333333";
const LINE: &str = "#333333";

fn base(fill: &str, stroke: &str) -> StyleOverride {
    StyleOverride {
        fill: Some(fill.to_string()),
        stroke_color: Some(stroke.to_string()),
        stroke_style: Some(StrokeStyle::Solid),
        stroke_width: Some(1.0),
        text_color: Some(TEXT.to_string()),
        ..Default::default()
    }
}

/// Style a node gets when it carries no override.
pub fn node_default(dialect: Dialect, node: &Node) -> StyleOverride {
    if node.kind == NodeKind::Anchor {
        return StyleOverride::default();
    }
    if node.kind == NodeKind::Group {
        return base("#ffffde", "#aaaa33");
    }
    match (dialect, &node.data) {
        (Dialect::Sequence, DialectPayload::Sequence(data)) if data.is_note => base("#fff5ad", "#aaaa33"),
        (Dialect::Sequence, _) => base("#eaeaea", "#666666"),
        (Dialect::State, DialectPayload::State { marker }) if *marker != StateMarker::Normal => {
            base(LINE, LINE)
        }
        (Dialect::Mindmap, _) => base("#cde498", "#13540c"),
        (Dialect::Pie, _) => StyleOverride {
            stroke_color: Some("#000000".to_string()),
            stroke_width: Some(2.0),
            text_color: Some(TEXT.to_string()),
            ..Default::default()
        },
        _ => base("#ececff", "#9370db"),
    }
}

/// Style an edge gets when it carries no override; the arrow marker decides
/// the stroke pattern and weight.
pub fn edge_default(dialect: Dialect, arrow: ArrowKind) -> StyleOverride {
    let width = if arrow.is_thick() { 3.0 } else { 1.0 };
    let color = match dialect {
        Dialect::Er => "#9370db",
        _ => LINE,
    };
    StyleOverride {
        stroke_color: Some(color.to_string()),
        stroke_style: Some(arrow.implied_stroke()),
        stroke_width: Some(width),
        text_color: Some(TEXT.to_string()),
        ..Default::default()
    }
}

/// Strip every attribute of a node style equal to its default.
pub fn node_override(dialect: Dialect, node: &Node) -> StyleOverride {
    node.style.without_defaults(&node_default(dialect, node))
}

pub fn edge_override(dialect: Dialect, arrow: ArrowKind, style: &StyleOverride) -> StyleOverride {
    style.without_defaults(&edge_default(dialect, arrow))
}
