use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::model::{AnchorRole, Graph, NodeId, NotePosition, Point, SequenceData, Size};

/// Gap between a note and the lifeline it is attached to.
const NOTE_GAP: f64 = 10.0;

/// An event with order `k` sits at `participant_height + (k + 1) * message_step`.
pub fn layout(graph: &mut Graph, positioned: &HashSet<NodeId>, keep_saved: bool, config: &LayoutConfig) {
    let seq = &config.sequence;
    let keep = |id: &str| keep_saved && positioned.contains(id);

    // Participants first: their final position decides every column.
    let mut columns: HashMap<String, (f64, f64)> = HashMap::new();
    for node in &mut graph.nodes {
        let Some(data) = node.sequence() else {
            continue;
        };
        if data.is_note || data.anchor.is_some() {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let slot = data.order as f64 * seq.slot_width;
        node.size = Some(Size::new(seq.participant_width, seq.participant_height));
        if !keep(&node.id) {
            node.position = Point::new(slot + (seq.slot_width - seq.participant_width) / 2.0, 0.0);
        }
        columns.insert(
            node.id.clone(),
            (node.position.x + seq.participant_width / 2.0, node.position.y),
        );
    }

    let row = |order: usize| {
        #[allow(clippy::cast_precision_loss)]
        let steps = (order + 1) as f64;
        seq.participant_height + steps * seq.message_step
    };

    for node in &mut graph.nodes {
        let Some(data) = node.sequence().cloned() else {
            continue;
        };
        let SequenceData {
            participant_id,
            order,
            anchor,
            ..
        } = &data;
        let Some(&(centre, top)) = columns.get(participant_id) else {
            debug!(id = %node.id, participant = %participant_id, "no column for sequence node");
            continue;
        };

        match anchor {
            Some(role) => {
                let mut y = top + row(*order);
                if *role == AnchorRole::Message && node.id.ends_with("/self") {
                    y += seq.message_step / 2.0;
                }
                node.size = Some(Size::new(0.0, 0.0));
                node.position = Point::new(centre, y);
            }
            None if data.is_note => {
                let (x, width) = note_extent(&data, &columns, centre, config);
                node.size = Some(Size::new(width, seq.note_height));
                if !keep(&node.id) {
                    node.position = Point::new(x, top + row(*order) - seq.note_height / 2.0);
                }
            }
            None => {}
        }
    }
}

/// Left edge and width of a note.
fn note_extent(
    data: &SequenceData,
    columns: &HashMap<String, (f64, f64)>,
    centre: f64,
    config: &LayoutConfig,
) -> (f64, f64) {
    let width = config.sequence.note_width;
    match data.note_position.unwrap_or(NotePosition::RightOf) {
        NotePosition::LeftOf => (centre - width - NOTE_GAP, width),
        NotePosition::RightOf => (centre + NOTE_GAP, width),
        NotePosition::Over => {
            let centres = data
                .note_participants
                .iter()
                .filter_map(|p| columns.get(p).map(|c| c.0));
            let (low, high) = centres.fold((centre, centre), |(lo, hi), c| (lo.min(c), hi.max(c)));
            (low - width / 2.0, high - low + width)
        }
    }
}
