//! Assessment-to-assessment delta computation
//!
//! Compares a student's new assessment against a prior one.
//!
//! Global invariants enforced:
//! - Deltas are relative to the earlier assessment (before → after)
//! - Trend is driven by risk level, then by composite score
//! - Factor changes are reported by code, in category order

use crate::assessment::RiskAssessment;
use crate::factors::RiskFactor;
use crate::record::PredictionRecord;
use crate::risk::RiskLevel;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Direction of change between two assessments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Risk level moved up
    Escalated,
    /// Risk level moved down
    Improved,
    /// Same level, but the composite or at least one sub-score moved
    Unchanged,
    /// Identical composite and sub-scores
    Stable,
}

/// Level transition information
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelTransition {
    pub from: RiskLevel,
    pub to: RiskLevel,
}

/// Signed score changes (after - before)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScoreDelta {
    pub attendance_score: i16,
    pub income_score: i16,
    pub parent_status_score: i16,
    pub overall_risk_score: i16,
}

/// Change between two assessments of the same student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AssessmentDelta {
    pub trend: Trend,
    pub delta: ScoreDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_transition: Option<LevelTransition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub factors_gained: Vec<RiskFactor>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub factors_resolved: Vec<RiskFactor>,
}

fn diff(before: u8, after: u8) -> i16 {
    i16::from(after) - i16::from(before)
}

impl AssessmentDelta {
    /// Compute delta from `before` to `after`
    pub fn between(before: &RiskAssessment, after: &RiskAssessment) -> Self {
        let delta = ScoreDelta {
            attendance_score: diff(before.attendance_score(), after.attendance_score()),
            income_score: diff(before.income_score(), after.income_score()),
            parent_status_score: diff(before.parent_status_score(), after.parent_status_score()),
            overall_risk_score: diff(before.overall_risk_score(), after.overall_risk_score()),
        };

        let (from, to) = (before.risk_level(), after.risk_level());
        let level_transition = (from != to).then_some(LevelTransition { from, to });

        let trend = if to > from {
            Trend::Escalated
        } else if to < from {
            Trend::Improved
        } else if before.sub_scores() == after.sub_scores() && delta.overall_risk_score == 0 {
            Trend::Stable
        } else {
            Trend::Unchanged
        };

        let factors_gained = after
            .factor_codes()
            .iter()
            .filter(|f| !before.factor_codes().contains(*f))
            .copied()
            .collect();
        let factors_resolved = before
            .factor_codes()
            .iter()
            .filter(|f| !after.factor_codes().contains(*f))
            .copied()
            .collect();

        AssessmentDelta {
            trend,
            delta,
            level_transition,
            factors_gained,
            factors_resolved,
        }
    }

    /// Compute delta between two records of the same student
    pub fn between_records(
        before: &PredictionRecord,
        after: &PredictionRecord,
    ) -> anyhow::Result<Self> {
        if before.student_id != after.student_id {
            anyhow::bail!(
                "cannot compare predictions of different students: {} vs {}",
                before.student_id,
                after.student_id
            );
        }
        if after.version <= before.version {
            anyhow::bail!(
                "prediction version {} is not newer than version {}",
                after.version,
                before.version
            );
        }
        Ok(Self::between(&before.assessment, &after.assessment))
    }

    /// Serialize delta to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize delta to JSON")
    }
}
