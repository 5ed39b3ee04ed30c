//! Dropout core library - student dropout risk scoring and prediction records

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Scoring is strictly per-student and pure
// - No global mutable state
// - No randomness; the clock is read only by `assess` and callers may supply it
// - All inputs are validated before any scoring
// - Identical input yields byte-for-byte identical output

pub mod assessment;
pub mod batch;
pub mod config;
pub mod delta;
pub mod error;
pub mod factors;
pub mod history;
pub mod record;
pub mod risk;
pub mod signals;

pub use assessment::{assess, render_explain, render_json, render_text, RiskAssessment, RiskScorer};
pub use config::ResolvedConfig;
pub use error::ValidationError;
pub use factors::RiskFactor;
pub use history::{HistoryError, PredictionHistory};
pub use record::{InterventionEvent, PredictionRecord};
pub use risk::{IncomeBands, RiskLevel, SubScores};
pub use signals::{RawSignals, StudentSignals};
