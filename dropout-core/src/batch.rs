//! Roster scoring
//!
//! Scores many students in parallel. Rows are independent: one malformed
//! or invalid row never aborts the others, and outcomes keep input order.

use crate::assessment::{RiskAssessment, RiskScorer};
use crate::error::ValidationError;
use crate::signals::RawSignals;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One roster row: a student id plus raw signal fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub student_id: String,
    #[serde(flatten)]
    pub signals: RawSignals,
}

/// Why a roster row produced no assessment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("malformed row: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result for one roster row
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    /// 1-based line number in the roster input
    pub line: usize,
    pub student_id: Option<String>,
    pub result: Result<RiskAssessment, RowError>,
}

/// Parse a JSONL roster; blank lines are skipped
pub fn parse_roster(input: &str) -> Vec<(usize, Result<RosterEntry, RowError>)> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let entry = serde_json::from_str::<RosterEntry>(line)
                .map_err(|e| RowError::Parse(e.to_string()));
            (index + 1, entry)
        })
        .collect()
}

/// Score parsed roster rows in parallel, stamping every row with `calculated_at`
pub fn assess_rows(
    scorer: &RiskScorer,
    rows: Vec<(usize, Result<RosterEntry, RowError>)>,
    calculated_at: DateTime<Utc>,
) -> Vec<RowOutcome> {
    let outcomes: Vec<RowOutcome> = rows
        .into_par_iter()
        .map(|(line, entry)| match entry {
            Ok(entry) => {
                let result = entry
                    .signals
                    .validate()
                    .and_then(|signals| scorer.assess_at(signals, calculated_at))
                    .map_err(RowError::from);
                RowOutcome {
                    line,
                    student_id: Some(entry.student_id),
                    result,
                }
            }
            Err(e) => RowOutcome {
                line,
                student_id: None,
                result: Err(e),
            },
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::debug!(rows = outcomes.len(), failed, "scored roster");
    outcomes
}

/// Parse and score a JSONL roster
pub fn assess_roster(
    scorer: &RiskScorer,
    input: &str,
    calculated_at: DateTime<Utc>,
) -> Vec<RowOutcome> {
    assess_rows(scorer, parse_roster(input), calculated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_roster_keeps_order_and_isolates_errors() {
        let input = r#"{"student_id": "a", "attendance_rate": 90, "family_monthly_income": 25000, "father_alive": true, "mother_alive": true}
{"student_id": "b", "attendance_rate": -5, "family_monthly_income": 1000, "father_alive": true, "mother_alive": true}

not json
{"student_id": "c", "attendance_rate": 40, "family_monthly_income": 8000, "father_alive": false, "mother_alive": false}
{"student_id": "d", "attendance_rate": 80, "family_monthly_income": 8000, "father_alive": false}"#;

        let outcomes = assess_roster(&RiskScorer::default(), input, at());
        assert_eq!(outcomes.len(), 5);

        assert_eq!(outcomes[0].line, 1);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap().risk_level(),
            RiskLevel::Low
        );

        assert_eq!(outcomes[1].student_id.as_deref(), Some("b"));
        match &outcomes[1].result {
            Err(RowError::Validation(e)) => assert_eq!(e.field(), "attendance_rate"),
            other => panic!("expected validation error, got {:?}", other),
        }

        assert_eq!(outcomes[2].line, 4);
        assert!(matches!(outcomes[2].result, Err(RowError::Parse(_))));

        assert_eq!(outcomes[3].student_id.as_deref(), Some("c"));
        assert_eq!(
            outcomes[3].result.as_ref().unwrap().risk_level(),
            RiskLevel::High
        );

        match &outcomes[4].result {
            Err(RowError::Validation(e)) => assert_eq!(e.field(), "mother_alive"),
            other => panic!("expected missing field, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_matches_single_assessment() {
        let input = r#"{"student_id": "x", "attendance_rate": 60, "family_monthly_income": 15000, "father_alive": false, "mother_alive": true}"#;
        let outcomes = assess_roster(&RiskScorer::default(), input, at());
        let batch = outcomes[0].result.as_ref().unwrap();

        let single = RiskScorer::default()
            .assess_at(
                crate::signals::StudentSignals::new(60.0, 15000.0, false, true, None).unwrap(),
                at(),
            )
            .unwrap();
        assert_eq!(batch, &single);
    }
}
