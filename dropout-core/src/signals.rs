//! Student input signals
//!
//! Signals are supplied by the caller (attendance aggregation and stored
//! demographic fields). The engine never fetches them.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

pub const ATTENDANCE_MIN: f64 = 0.0;
pub const ATTENDANCE_MAX: f64 = 100.0;

/// Validated inputs to one scoring run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct StudentSignals {
    /// Percentage of days present over the observation window, in [0, 100]
    pub attendance_rate: f64,
    /// Local currency units per month, non-negative
    pub family_monthly_income: f64,
    pub father_alive: bool,
    pub mother_alive: bool,
    /// Opaque to scoring
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub intervention_notes: Option<String>,
}

impl StudentSignals {
    /// Build and validate signals in one step
    pub fn new(
        attendance_rate: f64,
        family_monthly_income: f64,
        father_alive: bool,
        mother_alive: bool,
        intervention_notes: Option<String>,
    ) -> Result<Self, ValidationError> {
        let signals = StudentSignals {
            attendance_rate,
            family_monthly_income,
            father_alive,
            mother_alive,
            intervention_notes,
        };
        signals.validate()?;
        Ok(signals)
    }

    /// Check numeric ranges. Fields are checked in declaration order and the
    /// first violation is returned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_attendance(self.attendance_rate)?;
        validate_income(self.family_monthly_income)?;
        Ok(())
    }
}

fn validate_attendance(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "attendance_rate",
        });
    }
    if !(ATTENDANCE_MIN..=ATTENDANCE_MAX).contains(&rate) {
        return Err(ValidationError::OutOfRange {
            field: "attendance_rate",
            value: rate,
            min: ATTENDANCE_MIN,
            max: ATTENDANCE_MAX,
        });
    }
    Ok(())
}

fn validate_income(income: f64) -> Result<(), ValidationError> {
    if !income.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "family_monthly_income",
        });
    }
    if income < 0.0 {
        return Err(ValidationError::Negative {
            field: "family_monthly_income",
            value: income,
        });
    }
    Ok(())
}

/// Signals as they arrive over the wire, before presence checks
///
/// Every field is optional so a missing boolean surfaces as a
/// `ValidationError` naming it instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RawSignals {
    #[serde(default)]
    pub attendance_rate: Option<f64>,
    #[serde(default)]
    pub family_monthly_income: Option<f64>,
    #[serde(default)]
    pub father_alive: Option<bool>,
    #[serde(default)]
    pub mother_alive: Option<bool>,
    #[serde(default)]
    pub intervention_notes: Option<String>,
}

impl RawSignals {
    /// Require every field and validate ranges
    pub fn validate(self) -> Result<StudentSignals, ValidationError> {
        let attendance_rate = self.attendance_rate.ok_or(ValidationError::Missing {
            field: "attendance_rate",
        })?;
        let family_monthly_income = self.family_monthly_income.ok_or(ValidationError::Missing {
            field: "family_monthly_income",
        })?;
        let father_alive = self.father_alive.ok_or(ValidationError::Missing {
            field: "father_alive",
        })?;
        let mother_alive = self.mother_alive.ok_or(ValidationError::Missing {
            field: "mother_alive",
        })?;

        StudentSignals::new(
            attendance_rate,
            family_monthly_income,
            father_alive,
            mother_alive,
            self.intervention_notes,
        )
    }
}
