use serde::{Deserialize, Serialize};

use crate::error::{MadrawError, Result};

pub const DEFAULT_POSITION_COVERAGE: f64 = 0.5;
pub const DEFAULT_CROSSING_SWEEPS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Fraction of nodes that must carry a saved position before saved
    /// positions are trusted instead of recomputing the whole layout.
    pub position_coverage_threshold: f64,
    /// Gap between consecutive ranks.
    pub rank_spacing: f64,
    /// Gap between neighbouring cells of one rank.
    pub node_spacing: f64,
    /// Inner padding of group boxes.
    pub group_padding: f64,
    /// Extra space reserved at the top of a group for its label.
    pub group_label_height: f64,
    /// Upper bound on barycenter sweep rounds.
    pub crossing_sweeps: usize,
    /// Horizontal distance between mindmap depth columns.
    pub tree_column_spacing: f64,
    /// Vertical distance between mindmap leaves.
    pub tree_row_spacing: f64,
    pub sequence: SequenceLayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SequenceLayoutConfig {
    /// Horizontal slot width assigned to each participant.
    pub slot_width: f64,
    pub participant_width: f64,
    pub participant_height: f64,
    /// Vertical cursor advance per message or note.
    pub message_step: f64,
    pub note_width: f64,
    pub note_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            position_coverage_threshold: DEFAULT_POSITION_COVERAGE,
            rank_spacing: 80.0,
            node_spacing: 60.0,
            group_padding: 24.0,
            group_label_height: 32.0,
            crossing_sweeps: DEFAULT_CROSSING_SWEEPS,
            tree_column_spacing: 220.0,
            tree_row_spacing: 70.0,
            sequence: SequenceLayoutConfig::default(),
        }
    }
}

impl Default for SequenceLayoutConfig {
    fn default() -> Self {
        Self {
            slot_width: 200.0,
            participant_width: 120.0,
            participant_height: 40.0,
            message_step: 50.0,
            note_width: 140.0,
            note_height: 40.0,
        }
    }
}

impl LayoutConfig {
    /// Parse a JSON document, filling unspecified fields with defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.position_coverage_threshold) {
            return Err(MadrawError::Config(format!(
                "positionCoverageThreshold must be within 0..=1, got {}",
                self.position_coverage_threshold
            )));
        }
        let spacings = [
            ("rankSpacing", self.rank_spacing),
            ("nodeSpacing", self.node_spacing),
            ("groupPadding", self.group_padding),
            ("sequence.slotWidth", self.sequence.slot_width),
            ("sequence.messageStep", self.sequence.message_step),
        ];
        for (name, value) in spacings {
            if !value.is_finite() || value < 0.0 {
                return Err(MadrawError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
