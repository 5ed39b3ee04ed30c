//! Dropout risk sub-scores, composite score, and risk level
//!
//! Global invariants enforced:
//! - Deterministic sub-scores (pure functions of a single input)
//! - Monotonic transforms (lower attendance or income never lowers a score)
//! - Regime boundaries belong to the safer regime (`>=` on the lower edge)
//! - Composite is always reproducible from the sub-scores and fixed weights

use serde::{Deserialize, Serialize};

/// Maximum value of any score
pub const MAX_SCORE: u8 = 100;

/// One piecewise range of a sub-score: a predicate and the formula applied
/// when it holds. Tables are evaluated top-down; the first match wins.
pub struct Regime<P> {
    pub name: &'static str,
    pub applies: fn(f64, &P) -> bool,
    pub formula: fn(f64, &P) -> f64,
}

/// Which regime produced a sub-score, and the rounded score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeHit {
    pub regime: &'static str,
    pub score: u8,
}

fn evaluate<P>(regimes: &[Regime<P>], value: f64, params: &P) -> RegimeHit {
    // Tables are total over validated input; anything else scores as worst case
    regimes
        .iter()
        .find(|r| (r.applies)(value, params))
        .map_or(
            RegimeHit {
                regime: "unmatched",
                score: MAX_SCORE,
            },
            |r| RegimeHit {
                regime: r.name,
                score: to_score((r.formula)(value, params)),
            },
        )
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

// Attendance regimes

/// Attendance sub-score regimes, safest first
///
/// - A: rate >= 75 → round(100 - rate)
/// - B: 50 <= rate < 75 → round(26 + (74 - rate))
/// - C: rate < 50 → round(51 + clamp((50 - rate) / 50, 0, 1) * 49)
pub const ATTENDANCE_REGIMES: &[Regime<()>] = &[
    Regime {
        name: "A",
        applies: attendance_a_applies,
        formula: attendance_a,
    },
    Regime {
        name: "B",
        applies: attendance_b_applies,
        formula: attendance_b,
    },
    Regime {
        name: "C",
        applies: attendance_c_applies,
        formula: attendance_c,
    },
];

fn attendance_a_applies(rate: f64, _: &()) -> bool {
    rate >= 75.0
}

fn attendance_a(rate: f64, _: &()) -> f64 {
    100.0 - rate
}

fn attendance_b_applies(rate: f64, _: &()) -> bool {
    (50.0..75.0).contains(&rate)
}

fn attendance_b(rate: f64, _: &()) -> f64 {
    26.0 + (74.0 - rate)
}

fn attendance_c_applies(rate: f64, _: &()) -> bool {
    rate < 50.0
}

fn attendance_c(rate: f64, _: &()) -> f64 {
    let normalized = ((50.0 - rate) / 50.0).clamp(0.0, 1.0);
    51.0 + normalized * 49.0
}

/// Attendance sub-score with the regime that produced it
pub fn attendance_regime(attendance_rate: f64) -> RegimeHit {
    evaluate(ATTENDANCE_REGIMES, attendance_rate, &())
}

/// Attendance sub-score in [0, 100]; higher means worse attendance
pub fn attendance_score(attendance_rate: f64) -> u8 {
    attendance_regime(attendance_rate).score
}

// Income regimes

/// Currency thresholds for the income sub-score, in local units per month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IncomeBands {
    /// Income at or above which the extreme-poverty regime bottoms out at 51
    pub extreme_floor: f64,
    /// Lower edge of the low-income regime
    pub low_floor: f64,
    /// Lower edge of the adequate-income regime
    pub mid_floor: f64,
    /// Normalization cap; incomes above score the floor (0)
    pub cap: f64,
}

impl Default for IncomeBands {
    fn default() -> Self {
        IncomeBands {
            extreme_floor: 5000.0,
            low_floor: 12000.0,
            mid_floor: 20000.0,
            cap: 50000.0,
        }
    }
}

impl IncomeBands {
    /// Check bands are positive and strictly ordered
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, val) in [
            ("extreme_floor", self.extreme_floor),
            ("low_floor", self.low_floor),
            ("mid_floor", self.mid_floor),
            ("cap", self.cap),
        ] {
            if !val.is_finite() || val <= 0.0 {
                anyhow::bail!("income_bands.{} must be positive (got {})", name, val);
            }
        }
        if self.extreme_floor > self.low_floor {
            anyhow::bail!(
                "income_bands.extreme_floor ({}) must not exceed income_bands.low_floor ({})",
                self.extreme_floor,
                self.low_floor
            );
        }
        if self.low_floor >= self.mid_floor {
            anyhow::bail!(
                "income_bands.low_floor ({}) must be less than income_bands.mid_floor ({})",
                self.low_floor,
                self.mid_floor
            );
        }
        if self.mid_floor >= self.cap {
            anyhow::bail!(
                "income_bands.mid_floor ({}) must be less than income_bands.cap ({})",
                self.mid_floor,
                self.cap
            );
        }
        Ok(())
    }
}

/// Income sub-score regimes, safest first
///
/// With default bands:
/// - A: income >= 20000 → round(25 * (1 - (min(income, 50000) - 20000) / 30000))
/// - B: 12000 <= income < 20000 → round(50 - (income - 12000) / 8000 * 24)
/// - C: income < 12000 → round(100 - clamp(max(income, 0) / 5000, 0, 1) * 49)
pub const INCOME_REGIMES: &[Regime<IncomeBands>] = &[
    Regime {
        name: "A",
        applies: income_a_applies,
        formula: income_a,
    },
    Regime {
        name: "B",
        applies: income_b_applies,
        formula: income_b,
    },
    Regime {
        name: "C",
        applies: income_c_applies,
        formula: income_c,
    },
];

fn income_a_applies(income: f64, bands: &IncomeBands) -> bool {
    income >= bands.mid_floor
}

fn income_a(income: f64, bands: &IncomeBands) -> f64 {
    let capped = income.min(bands.cap);
    let normalized = (capped - bands.mid_floor) / (bands.cap - bands.mid_floor);
    25.0 * (1.0 - normalized)
}

fn income_b_applies(income: f64, bands: &IncomeBands) -> bool {
    income >= bands.low_floor && income < bands.mid_floor
}

fn income_b(income: f64, bands: &IncomeBands) -> f64 {
    50.0 - ((income - bands.low_floor) / (bands.mid_floor - bands.low_floor) * 24.0)
}

fn income_c_applies(income: f64, bands: &IncomeBands) -> bool {
    income < bands.low_floor
}

fn income_c(income: f64, bands: &IncomeBands) -> f64 {
    let normalized = (income.max(0.0) / bands.extreme_floor).clamp(0.0, 1.0);
    100.0 - normalized * 49.0
}

/// Income sub-score with the regime that produced it
pub fn income_regime(family_monthly_income: f64, bands: &IncomeBands) -> RegimeHit {
    evaluate(INCOME_REGIMES, family_monthly_income, bands)
}

/// Income sub-score in [0, 100] with default bands; higher means poorer
pub fn income_score(family_monthly_income: f64) -> u8 {
    income_regime(family_monthly_income, &IncomeBands::default()).score
}

// Parental status

/// Parental-status sub-score lookup
///
/// Father's absence scores above mother's absence. Preserved as given.
pub fn parent_status_score(father_alive: bool, mother_alive: bool) -> u8 {
    match (father_alive, mother_alive) {
        (true, true) => 0,
        (false, false) => 100,
        (false, true) => 60,
        (true, false) => 40,
    }
}

/// The three independently computed sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SubScores {
    pub attendance_score: u8,
    pub income_score: u8,
    pub parent_status_score: u8,
}

/// Fixed composite weights; they sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
    pub attendance: f64,
    pub income: f64,
    pub parent_status: f64,
}

pub const WEIGHTS: RiskWeights = RiskWeights {
    attendance: 0.45,
    income: 0.35,
    parent_status: 0.20,
};

/// Composite risk score
///
/// Formula:
/// overall = round(0.45 * attendance + 0.35 * income + 0.20 * parent_status)
pub fn calculate_overall(sub: &SubScores) -> u8 {
    to_score(
        f64::from(sub.attendance_score) * WEIGHTS.attendance
            + f64::from(sub.income_score) * WEIGHTS.income
            + f64::from(sub.parent_status_score) * WEIGHTS.parent_status,
    )
}

/// Risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,      // < 30
    Medium,   // 30-49
    High,     // 50-69
    Critical, // >= 70
}

/// Lower edges of the risk levels above LOW
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskThresholds {
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

pub const THRESHOLDS: RiskThresholds = RiskThresholds {
    medium: 30,
    high: 50,
    critical: 70,
};

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Classify a composite score, highest threshold first
    pub fn from_score(overall_risk_score: u8) -> Self {
        if overall_risk_score >= THRESHOLDS.critical {
            RiskLevel::Critical
        } else if overall_risk_score >= THRESHOLDS.high {
            RiskLevel::High
        } else if overall_risk_score >= THRESHOLDS.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown risk level: {}", s))
    }
}
