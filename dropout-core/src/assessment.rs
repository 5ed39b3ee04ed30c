//! Risk assessment: the immutable output of one scoring run
//!
//! Global invariants enforced:
//! - All inputs are validated before any scoring; no partial assessment
//! - An assessment stores its inputs, so it can always be recomputed for audit
//! - Identical signals and timestamp yield byte-for-byte identical output

use crate::error::ValidationError;
use crate::factors::{derive_risk_factors, RiskFactor};
use crate::risk::{
    attendance_regime, calculate_overall, income_regime, parent_status_score, IncomeBands,
    RiskLevel, SubScores,
};
use crate::signals::StudentSignals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the scorer derives from signals, without a timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub sub_scores: SubScores,
    pub attendance_regime: &'static str,
    pub income_regime: &'static str,
    pub overall_risk_score: u8,
    pub risk_level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

/// Immutable result of a scoring run
///
/// Re-assessment creates a new value; nothing here is mutated after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RiskAssessment {
    signals: StudentSignals,
    income_bands: IncomeBands,
    sub_scores: SubScores,
    overall_risk_score: u8,
    risk_level: RiskLevel,
    risk_factors: Vec<String>,
    factor_codes: Vec<RiskFactor>,
    calculated_at: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn signals(&self) -> &StudentSignals {
        &self.signals
    }

    pub fn income_bands(&self) -> &IncomeBands {
        &self.income_bands
    }

    pub fn sub_scores(&self) -> &SubScores {
        &self.sub_scores
    }

    pub fn attendance_score(&self) -> u8 {
        self.sub_scores.attendance_score
    }

    pub fn income_score(&self) -> u8 {
        self.sub_scores.income_score
    }

    pub fn parent_status_score(&self) -> u8 {
        self.sub_scores.parent_status_score
    }

    pub fn overall_risk_score(&self) -> u8 {
        self.overall_risk_score
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Ordered factor labels: attendance, income, parental
    pub fn risk_factors(&self) -> &[String] {
        &self.risk_factors
    }

    pub fn factor_codes(&self) -> &[RiskFactor] {
        &self.factor_codes
    }

    pub fn calculated_at(&self) -> DateTime<Utc> {
        self.calculated_at
    }

    /// Recompute from the stored signals and bands and compare
    ///
    /// Fails if a stored score, level, or factor list disagrees with what the
    /// scorer produces today.
    pub fn verify(&self) -> anyhow::Result<()> {
        let scorer = RiskScorer::with_bands(self.income_bands)?;
        let recomputed = scorer
            .assess_at(self.signals.clone(), self.calculated_at)
            .map_err(|e| anyhow::anyhow!("stored signals no longer validate: {}", e))?;

        if recomputed.sub_scores != self.sub_scores {
            anyhow::bail!(
                "sub-score drift: stored {:?}, recomputed {:?}",
                self.sub_scores,
                recomputed.sub_scores
            );
        }
        if recomputed.overall_risk_score != self.overall_risk_score {
            anyhow::bail!(
                "overall_risk_score drift: stored {}, recomputed {}",
                self.overall_risk_score,
                recomputed.overall_risk_score
            );
        }
        if recomputed.risk_level != self.risk_level {
            anyhow::bail!(
                "risk_level drift: stored {}, recomputed {}",
                self.risk_level,
                recomputed.risk_level
            );
        }
        if recomputed.factor_codes != self.factor_codes
            || recomputed.risk_factors != self.risk_factors
        {
            anyhow::bail!(
                "risk_factors drift: stored {:?}, recomputed {:?}",
                self.risk_factors,
                recomputed.risk_factors
            );
        }
        Ok(())
    }
}

/// Stateless dropout risk scorer
///
/// Holds only the currency bands. Safe to share across threads and call
/// concurrently without synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskScorer {
    bands: IncomeBands,
}

impl RiskScorer {
    /// Scorer with custom currency bands
    pub fn with_bands(bands: IncomeBands) -> anyhow::Result<Self> {
        bands.validate()?;
        Ok(RiskScorer { bands })
    }

    pub fn bands(&self) -> &IncomeBands {
        &self.bands
    }

    /// Pure scoring of already-validated signals
    pub fn score(&self, signals: &StudentSignals) -> ScoreBreakdown {
        let attendance = attendance_regime(signals.attendance_rate);
        let income = income_regime(signals.family_monthly_income, &self.bands);
        let sub_scores = SubScores {
            attendance_score: attendance.score,
            income_score: income.score,
            parent_status_score: parent_status_score(signals.father_alive, signals.mother_alive),
        };
        let overall_risk_score = calculate_overall(&sub_scores);

        ScoreBreakdown {
            sub_scores,
            attendance_regime: attendance.regime,
            income_regime: income.regime,
            overall_risk_score,
            risk_level: RiskLevel::from_score(overall_risk_score),
            factors: derive_risk_factors(&sub_scores),
        }
    }

    /// Validate and score, stamping the given time
    pub fn assess_at(
        &self,
        signals: StudentSignals,
        calculated_at: DateTime<Utc>,
    ) -> Result<RiskAssessment, ValidationError> {
        signals.validate()?;
        let breakdown = self.score(&signals);
        let risk_factors = breakdown
            .factors
            .iter()
            .map(|f| f.describe(&self.bands))
            .collect();

        Ok(RiskAssessment {
            signals,
            income_bands: self.bands,
            sub_scores: breakdown.sub_scores,
            overall_risk_score: breakdown.overall_risk_score,
            risk_level: breakdown.risk_level,
            risk_factors,
            factor_codes: breakdown.factors,
            calculated_at,
        })
    }

    /// Validate and score, stamping the current time
    pub fn assess(&self, signals: StudentSignals) -> Result<RiskAssessment, ValidationError> {
        self.assess_at(signals, Utc::now())
    }
}

/// Assess one student with default currency bands
pub fn assess(
    attendance_rate: f64,
    family_monthly_income: f64,
    father_alive: bool,
    mother_alive: bool,
    intervention_notes: Option<String>,
) -> Result<RiskAssessment, ValidationError> {
    let signals = StudentSignals::new(
        attendance_rate,
        family_monthly_income,
        father_alive,
        mother_alive,
        intervention_notes,
    )?;
    RiskScorer::default().assess(signals)
}

/// Render an assessment as text output
pub fn render_text(assessment: &RiskAssessment) -> String {
    let mut output = String::new();
    let sub = assessment.sub_scores();

    output.push_str(&format!(
        "{:<10} {:<8} {:<11} {:<8} {}\n",
        "LEVEL", "OVERALL", "ATTENDANCE", "INCOME", "PARENTS"
    ));
    output.push_str(&format!(
        "{:<10} {:<8} {:<11} {:<8} {}\n",
        assessment.risk_level().as_str(),
        assessment.overall_risk_score(),
        sub.attendance_score,
        sub.income_score,
        sub.parent_status_score,
    ));

    if assessment.risk_factors().is_empty() {
        output.push_str("Risk factors: none\n");
    } else {
        output.push_str("Risk factors:\n");
        for factor in assessment.risk_factors() {
            output.push_str(&format!("  - {}\n", factor));
        }
    }

    output
}

/// Explain how each sub-score was reached
pub fn render_explain(scorer: &RiskScorer, signals: &StudentSignals) -> String {
    let b = scorer.score(signals);
    let mut output = String::new();
    output.push_str(&format!(
        "attendance_rate={} -> regime {} -> attendance_score={}\n",
        signals.attendance_rate, b.attendance_regime, b.sub_scores.attendance_score
    ));
    output.push_str(&format!(
        "family_monthly_income={} -> regime {} -> income_score={}\n",
        signals.family_monthly_income, b.income_regime, b.sub_scores.income_score
    ));
    output.push_str(&format!(
        "father_alive={} mother_alive={} -> parent_status_score={}\n",
        signals.father_alive, signals.mother_alive, b.sub_scores.parent_status_score
    ));
    output.push_str(&format!(
        "overall = round(0.45*{} + 0.35*{} + 0.20*{}) = {} -> {}\n",
        b.sub_scores.attendance_score,
        b.sub_scores.income_score,
        b.sub_scores.parent_status_score,
        b.overall_risk_score,
        b.risk_level
    ));
    output
}

/// Render an assessment as JSON output
pub fn render_json(assessment: &RiskAssessment) -> String {
    serde_json::to_string_pretty(assessment).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn assess_signals(
        attendance: f64,
        income: f64,
        father: bool,
        mother: bool,
    ) -> RiskAssessment {
        let signals = StudentSignals {
            attendance_rate: attendance,
            family_monthly_income: income,
            father_alive: father,
            mother_alive: mother,
            intervention_notes: None,
        };
        RiskScorer::default().assess_at(signals, at()).unwrap()
    }

    #[test]
    fn test_good_standing_student() {
        let a = assess_signals(90.0, 25000.0, true, true);
        assert_eq!(a.attendance_score(), 10);
        assert_eq!(a.income_score(), 21);
        assert_eq!(a.parent_status_score(), 0);
        // 4.5 + 7.35 + 0 = 11.85
        assert_eq!(a.overall_risk_score(), 12);
        assert_eq!(a.risk_level(), RiskLevel::Low);
        assert!(a.risk_factors().is_empty());
    }

    #[test]
    fn test_orphan_with_poor_attendance_and_income() {
        let a = assess_signals(40.0, 8000.0, false, false);
        assert_eq!(a.attendance_score(), 61);
        assert_eq!(a.income_score(), 51);
        assert_eq!(a.parent_status_score(), 100);
        // 27.45 + 17.85 + 20 = 65.3
        assert_eq!(a.overall_risk_score(), 65);
        assert_eq!(a.risk_level(), RiskLevel::High);
        assert_eq!(
            a.risk_factors(),
            [
                "Chronic absenteeism (<50% attendance)",
                "Extreme poverty (<12000/month)",
                "Orphan - both parents deceased",
            ]
        );
    }

    #[test]
    fn test_mid_band_single_parent() {
        let a = assess_signals(60.0, 15000.0, false, true);
        assert_eq!(a.attendance_score(), 40);
        assert_eq!(a.income_score(), 41);
        assert_eq!(a.parent_status_score(), 60);
        assert_eq!(a.overall_risk_score(), 44);
        assert_eq!(a.risk_level(), RiskLevel::Medium);
        assert_eq!(
            a.factor_codes(),
            [
                RiskFactor::LowAttendance,
                RiskFactor::LowFamilyIncome,
                RiskFactor::SingleParentHousehold
            ]
        );
    }

    #[test]
    fn test_factor_independent_of_level() {
        // Chronic absenteeism alone does not lift the composite out of MEDIUM
        let a = assess_signals(10.0, 30000.0, true, true);
        assert_eq!(a.attendance_score(), 90);
        assert_eq!(a.risk_level(), RiskLevel::Medium);
        assert_eq!(a.factor_codes(), [RiskFactor::ChronicAbsenteeism]);
    }

    #[test]
    fn test_negative_attendance_rejected() {
        let err = assess(-5.0, 10000.0, true, true, None).unwrap_err();
        assert_eq!(err.field(), "attendance_rate");
    }

    #[test]
    fn test_assess_at_rejects_unvalidated_signals() {
        let signals = StudentSignals {
            attendance_rate: 80.0,
            family_monthly_income: -100.0,
            father_alive: true,
            mother_alive: true,
            intervention_notes: None,
        };
        let err = RiskScorer::default().assess_at(signals, at()).unwrap_err();
        assert_eq!(err.field(), "family_monthly_income");
    }

    #[test]
    fn test_notes_are_carried_but_not_scored() {
        let with_notes = RiskScorer::default()
            .assess_at(
                StudentSignals::new(60.0, 15000.0, false, true, Some("tutoring".into())).unwrap(),
                at(),
            )
            .unwrap();
        let without = assess_signals(60.0, 15000.0, false, true);
        assert_eq!(with_notes.sub_scores(), without.sub_scores());
        assert_eq!(
            with_notes.signals().intervention_notes.as_deref(),
            Some("tutoring")
        );
    }

    #[test]
    fn test_verify_detects_tampering() {
        let a = assess_signals(60.0, 15000.0, false, true);
        a.verify().unwrap();

        let mut json: serde_json::Value = serde_json::to_value(&a).unwrap();
        json["overall_risk_score"] = serde_json::json!(90);
        let tampered: RiskAssessment = serde_json::from_value(json).unwrap();
        let err = tampered.verify().unwrap_err();
        assert!(err.to_string().contains("overall_risk_score drift"));
    }

    #[test]
    fn test_custom_bands_relabel_income_factors() {
        let bands = IncomeBands {
            extreme_floor: 50.0,
            low_floor: 120.0,
            mid_floor: 200.0,
            cap: 500.0,
        };
        let scorer = RiskScorer::with_bands(bands).unwrap();
        let a = scorer
            .assess_at(
                StudentSignals::new(90.0, 150.0, true, true, None).unwrap(),
                at(),
            )
            .unwrap();
        assert_eq!(a.risk_factors(), ["Low family income (120-200/month)"]);
        a.verify().unwrap();
    }

    #[test]
    fn test_render_text() {
        let a = assess_signals(60.0, 15000.0, false, true);
        let text = render_text(&a);
        assert!(text.contains("MEDIUM"));
        assert!(text.contains("  - Single parent household"));
    }

    #[test]
    fn test_render_explain_names_regimes() {
        let signals = StudentSignals::new(75.0, 20000.0, true, true, None).unwrap();
        let text = render_explain(&RiskScorer::default(), &signals);
        assert!(text.contains("regime A -> attendance_score=25"));
        assert!(text.contains("regime A -> income_score=25"));
    }
}
