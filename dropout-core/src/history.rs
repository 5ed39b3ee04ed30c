//! Per-student prediction history
//!
//! Append-only ledger of prediction records and the intervention events
//! recorded against them.
//!
//! Global invariants enforced:
//! - Versions are assigned sequentially starting at 1
//! - `calculated_at` never decreases across versions
//! - Interventions reference an existing version; records are never mutated

use crate::assessment::RiskAssessment;
use crate::record::{InterventionEvent, PredictionRecord, PREDICTION_SCHEMA_VERSION};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Rejected history operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error(
        "assessment calculated at {given} precedes latest prediction (version {version}) at {latest}"
    )]
    OutOfOrder {
        version: u32,
        latest: DateTime<Utc>,
        given: DateTime<Utc>,
    },

    #[error("no prediction version {version} for student {student_id}")]
    UnknownVersion { student_id: String, version: u32 },
}

/// Prediction ledger for one student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PredictionHistory {
    schema_version: u32,
    student_id: String,
    records: Vec<PredictionRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    interventions: Vec<InterventionEvent>,
}

impl PredictionHistory {
    pub fn new(student_id: impl Into<String>) -> Self {
        PredictionHistory {
            schema_version: PREDICTION_SCHEMA_VERSION,
            student_id: student_id.into(),
            records: Vec::new(),
            interventions: Vec::new(),
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn interventions(&self) -> &[InterventionEvent] {
        &self.interventions
    }

    pub fn latest(&self) -> Option<&PredictionRecord> {
        self.records.last()
    }

    pub fn get(&self, version: u32) -> Option<&PredictionRecord> {
        // Versions are dense and 1-based
        let index = usize::try_from(version).ok()?.checked_sub(1)?;
        self.records.get(index)
    }

    /// Append an assessment as the next version
    pub fn record(&mut self, assessment: RiskAssessment) -> Result<&PredictionRecord, HistoryError> {
        if let Some(latest) = self.records.last() {
            let latest_at = latest.assessment.calculated_at();
            if assessment.calculated_at() < latest_at {
                return Err(HistoryError::OutOfOrder {
                    version: latest.version,
                    latest: latest_at,
                    given: assessment.calculated_at(),
                });
            }
        }

        let version = self.next_version();
        tracing::debug!(
            student_id = %self.student_id,
            version,
            risk_level = %assessment.risk_level(),
            overall = assessment.overall_risk_score(),
            "recorded prediction"
        );
        self.records
            .push(PredictionRecord::new(self.student_id.clone(), version, assessment));
        Ok(&self.records[self.records.len() - 1])
    }

    /// Record an intervention decision against a specific prediction
    pub fn mark_intervention(
        &mut self,
        version: u32,
        intervention_taken: bool,
        notes: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Result<&InterventionEvent, HistoryError> {
        if self.get(version).is_none() {
            return Err(HistoryError::UnknownVersion {
                student_id: self.student_id.clone(),
                version,
            });
        }

        tracing::debug!(
            student_id = %self.student_id,
            version,
            intervention_taken,
            "recorded intervention"
        );
        self.interventions.push(InterventionEvent {
            student_id: self.student_id.clone(),
            prediction_version: version,
            intervention_taken,
            notes,
            recorded_at,
        });
        Ok(&self.interventions[self.interventions.len() - 1])
    }

    /// Intervention events for one version, in recording order
    pub fn interventions_for(&self, version: u32) -> impl Iterator<Item = &InterventionEvent> {
        self.interventions
            .iter()
            .filter(move |e| e.prediction_version == version)
    }

    /// Latest intervention decision for a version, if any
    pub fn intervention_taken(&self, version: u32) -> Option<bool> {
        self.interventions_for(version)
            .last()
            .map(|e| e.intervention_taken)
    }

    fn next_version(&self) -> u32 {
        self.records.last().map_or(1, |r| r.version + 1)
    }

    /// Serialize history to JSON string (deterministic ordering)
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize prediction history to JSON")
    }

    /// Deserialize history from JSON string, checking ledger invariants
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let history: PredictionHistory = serde_json::from_str(json)
            .context("failed to deserialize prediction history from JSON")?;

        if history.schema_version != PREDICTION_SCHEMA_VERSION {
            anyhow::bail!(
                "schema version mismatch: expected {}, got {}",
                PREDICTION_SCHEMA_VERSION,
                history.schema_version
            );
        }

        let mut previous: Option<DateTime<Utc>> = None;
        for (expected, record) in (1u32..).zip(&history.records) {
            if record.version != expected {
                anyhow::bail!(
                    "prediction versions must be sequential: expected {}, got {}",
                    expected,
                    record.version
                );
            }
            if record.student_id != history.student_id {
                anyhow::bail!(
                    "prediction version {} belongs to student {}, not {}",
                    record.version,
                    record.student_id,
                    history.student_id
                );
            }
            record
                .assessment
                .verify()
                .with_context(|| format!("prediction version {} failed audit", record.version))?;
            let at = record.assessment.calculated_at();
            if previous.is_some_and(|p| at < p) {
                anyhow::bail!("prediction version {} is out of order", record.version);
            }
            previous = Some(at);
        }

        for event in &history.interventions {
            if event.student_id != history.student_id {
                anyhow::bail!(
                    "intervention on version {} belongs to student {}, not {}",
                    event.prediction_version,
                    event.student_id,
                    history.student_id
                );
            }
            if history.get(event.prediction_version).is_none() {
                anyhow::bail!(
                    "intervention references unknown prediction version {}",
                    event.prediction_version
                );
            }
        }

        Ok(history)
    }

    /// Load a student's history from file, or start an empty one if the file doesn't exist
    pub fn load_or_new(path: &Path, student_id: &str) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new(student_id));
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read history file: {}", path.display()))?;
        let history = Self::from_json(&json)
            .with_context(|| format!("invalid history file: {}", path.display()))?;
        if history.student_id != student_id {
            anyhow::bail!(
                "history file {} belongs to student {}, not {}",
                path.display(),
                history.student_id,
                student_id
            );
        }
        Ok(history)
    }

    /// Write history to file atomically using temp file + rename
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use std::io::Write;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path)
            .with_context(|| format!("failed to create temp file: {}", temp_path.display()))?;
        file.write_all(self.to_json()?.as_bytes())
            .with_context(|| format!("failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync temp file: {}", temp_path.display()))?;
        drop(file);

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("failed to rename temp file to: {}", path.display()))?;
        Ok(())
    }
}
