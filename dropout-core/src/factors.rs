//! Risk factor derivation
//!
//! Factors are triggered by each sub-score against its own thresholds,
//! never by the composite score or the risk level. At most one factor is
//! emitted per category; categories are independent.

use crate::risk::{IncomeBands, SubScores};
use serde::{Deserialize, Serialize};

/// Sub-score at or above which the severe factor of a category fires
pub const SEVERE_THRESHOLD: u8 = 51;
/// Sub-score at or above which the moderate factor of a category fires
pub const MODERATE_THRESHOLD: u8 = 26;
/// Parental sub-score for both parents deceased
pub const ORPHAN_SCORE: u8 = 100;
/// Parental sub-score at or above which one parent is missing
pub const SINGLE_PARENT_THRESHOLD: u8 = 40;

/// A human-readable reason driving intervention messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    ChronicAbsenteeism,
    LowAttendance,
    ExtremePoverty,
    LowFamilyIncome,
    Orphan,
    SingleParentHousehold,
}

impl RiskFactor {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RiskFactor::ChronicAbsenteeism => "chronic_absenteeism",
            RiskFactor::LowAttendance => "low_attendance",
            RiskFactor::ExtremePoverty => "extreme_poverty",
            RiskFactor::LowFamilyIncome => "low_family_income",
            RiskFactor::Orphan => "orphan",
            RiskFactor::SingleParentHousehold => "single_parent_household",
        }
    }

    /// Display label; income labels quote the active currency bands
    pub fn describe(&self, bands: &IncomeBands) -> String {
        match self {
            RiskFactor::ChronicAbsenteeism => "Chronic absenteeism (<50% attendance)".to_string(),
            RiskFactor::LowAttendance => "Low attendance (50-75%)".to_string(),
            RiskFactor::ExtremePoverty => {
                format!("Extreme poverty (<{}/month)", bands.low_floor)
            }
            RiskFactor::LowFamilyIncome => format!(
                "Low family income ({}-{}/month)",
                bands.low_floor, bands.mid_floor
            ),
            RiskFactor::Orphan => "Orphan - both parents deceased".to_string(),
            RiskFactor::SingleParentHousehold => "Single parent household".to_string(),
        }
    }
}

/// Derive factors in category order: attendance, income, parental
pub fn derive_risk_factors(sub: &SubScores) -> Vec<RiskFactor> {
    let mut factors = Vec::with_capacity(3);

    if sub.attendance_score >= SEVERE_THRESHOLD {
        factors.push(RiskFactor::ChronicAbsenteeism);
    } else if sub.attendance_score >= MODERATE_THRESHOLD {
        factors.push(RiskFactor::LowAttendance);
    }

    if sub.income_score >= SEVERE_THRESHOLD {
        factors.push(RiskFactor::ExtremePoverty);
    } else if sub.income_score >= MODERATE_THRESHOLD {
        factors.push(RiskFactor::LowFamilyIncome);
    }

    if sub.parent_status_score == ORPHAN_SCORE {
        factors.push(RiskFactor::Orphan);
    } else if sub.parent_status_score >= SINGLE_PARENT_THRESHOLD {
        factors.push(RiskFactor::SingleParentHousehold);
    }

    factors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(attendance: u8, income: u8, parent: u8) -> SubScores {
        SubScores {
            attendance_score: attendance,
            income_score: income,
            parent_status_score: parent,
        }
    }

    #[test]
    fn test_no_factors_for_low_scores() {
        assert!(derive_risk_factors(&sub(10, 21, 0)).is_empty());
        assert!(derive_risk_factors(&sub(25, 25, 0)).is_empty());
    }

    #[test]
    fn test_severe_factors_shadow_moderate() {
        let factors = derive_risk_factors(&sub(61, 51, 100));
        assert_eq!(
            factors,
            vec![
                RiskFactor::ChronicAbsenteeism,
                RiskFactor::ExtremePoverty,
                RiskFactor::Orphan
            ]
        );
    }

    #[test]
    fn test_moderate_thresholds() {
        let factors = derive_risk_factors(&sub(26, 50, 40));
        assert_eq!(
            factors,
            vec![
                RiskFactor::LowAttendance,
                RiskFactor::LowFamilyIncome,
                RiskFactor::SingleParentHousehold
            ]
        );
    }

    #[test]
    fn test_categories_are_independent() {
        assert_eq!(
            derive_risk_factors(&sub(80, 0, 0)),
            vec![RiskFactor::ChronicAbsenteeism]
        );
        assert_eq!(
            derive_risk_factors(&sub(0, 0, 60)),
            vec![RiskFactor::SingleParentHousehold]
        );
    }

    #[test]
    fn test_default_labels() {
        let bands = IncomeBands::default();
        assert_eq!(
            RiskFactor::ExtremePoverty.describe(&bands),
            "Extreme poverty (<12000/month)"
        );
        assert_eq!(
            RiskFactor::LowFamilyIncome.describe(&bands),
            "Low family income (12000-20000/month)"
        );
        assert_eq!(
            RiskFactor::Orphan.describe(&bands),
            "Orphan - both parents deceased"
        );
    }

    #[test]
    fn test_code_matches_serialized_name() {
        for factor in [
            RiskFactor::ChronicAbsenteeism,
            RiskFactor::LowAttendance,
            RiskFactor::ExtremePoverty,
            RiskFactor::LowFamilyIncome,
            RiskFactor::Orphan,
            RiskFactor::SingleParentHousehold,
        ] {
            assert_eq!(
                serde_json::to_value(factor).unwrap(),
                serde_json::json!(factor.code())
            );
        }
    }
}
