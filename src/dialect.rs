use crate::model::Dialect;

/// Header keywords that are recognised but not converted; they become a
/// single placeholder node.
pub const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "classDiagram",
    "classDiagram-v2",
    "gitGraph",
    "journey",
    "gantt",
    "timeline",
    "quadrantChart",
    "requirementDiagram",
    "C4Context",
    "C4Container",
    "C4Component",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
];

/// First line that is neither blank nor a `%%` comment.
pub fn first_significant_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
}

/// Leading keyword of the first significant line.
pub fn header_keyword(text: &str) -> Option<&str> {
    first_significant_line(text).and_then(|line| line.split_whitespace().next())
}

pub fn detect(text: &str) -> Dialect {
    let Some(keyword) = header_keyword(text) else {
        return Dialect::Flowchart;
    };
    match keyword {
        "pie" => Dialect::Pie,
        "mindmap" => Dialect::Mindmap,
        "erDiagram" => Dialect::Er,
        "sequenceDiagram" => Dialect::Sequence,
        "stateDiagram" | "stateDiagram-v2" => Dialect::State,
        k if UNSUPPORTED_KEYWORDS.contains(&k) => Dialect::Unsupported,
        _ => Dialect::Flowchart,
    }
}
