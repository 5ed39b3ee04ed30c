//! Prediction records and intervention events
//!
//! Wraps assessments in immutable, versioned records owned by the calling
//! workflow.
//!
//! Global invariants enforced:
//! - Records are immutable; re-assessment appends a new version
//! - Interventions are separate events referencing one prediction version
//! - Byte-for-byte deterministic serialization

use crate::assessment::RiskAssessment;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for prediction records
pub const PREDICTION_SCHEMA_VERSION: u32 = 1;

/// One persisted scoring run for a student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PredictionRecord {
    pub schema_version: u32,
    pub student_id: String,
    /// Per-student sequence number, starting at 1
    pub version: u32,
    pub assessment: RiskAssessment,
}

impl PredictionRecord {
    pub fn new(student_id: impl Into<String>, version: u32, assessment: RiskAssessment) -> Self {
        PredictionRecord {
            schema_version: PREDICTION_SCHEMA_VERSION,
            student_id: student_id.into(),
            version,
            assessment,
        }
    }

    /// Serialize record to JSON string (deterministic ordering)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize prediction record to JSON")
    }

    /// Deserialize record from JSON string; the stored assessment must reproduce from its inputs
    pub fn from_json(json: &str) -> Result<Self> {
        let record: PredictionRecord = serde_json::from_str(json)
            .context("failed to deserialize prediction record from JSON")?;

        if record.schema_version != PREDICTION_SCHEMA_VERSION {
            anyhow::bail!(
                "schema version mismatch: expected {}, got {}",
                PREDICTION_SCHEMA_VERSION,
                record.schema_version
            );
        }

        record.assessment.verify().with_context(|| {
            format!(
                "prediction version {} of student {} failed audit",
                record.version, record.student_id
            )
        })?;

        Ok(record)
    }
}

/// An intervention decision recorded against a specific prediction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InterventionEvent {
    pub student_id: String,
    pub prediction_version: u32,
    pub intervention_taken: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
