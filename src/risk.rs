// 🌊 Risk Scoring - pure functions from factors to index and level
//
// index = (exposure + susceptibility) / resilience, rounded to 2 decimals
// level thresholds are inclusive lower bounds: >= 3.5 high, >= 2.0 medium

use crate::entities::WardRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub const HIGH_THRESHOLD: f64 = 3.5;
pub const MEDIUM_THRESHOLD: f64 = 2.0;

/// Substituted when a source resilience value is absent or zero
pub const DEFAULT_RESILIENCE: f64 = 1.0;

// ============================================================================
// RISK LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn from_index(index: f64) -> Self {
        if index >= HIGH_THRESHOLD {
            RiskLevel::High
        } else if index >= MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    /// Presentation color for maps and reports
    pub fn color_token(&self) -> &'static str {
        match self {
            RiskLevel::High => "red",
            RiskLevel::Medium => "orange",
            RiskLevel::Low => "green",
        }
    }

    /// Level from a canonical risk-category token
    pub fn from_token(token: &str) -> Option<Self> {
        RiskLevel::ALL.into_iter().find(|level| level.as_str() == token)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FACTORS & SCORE
// ============================================================================

/// Inputs of the scoring function
///
/// Preconditions: every factor is finite, `exposure` and `susceptibility`
/// are at least 0 and `resilience` is greater than 0. Build factors through
/// [`resilience_or_default`] when the source value may be absent or zero.
/// Violating inputs are not detected here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub exposure: f64,
    pub susceptibility: f64,
    pub resilience: f64,
}

impl RiskFactors {
    pub fn new(exposure: f64, susceptibility: f64, resilience: f64) -> Self {
        RiskFactors {
            exposure,
            susceptibility,
            resilience,
        }
    }

    /// Derive the factors of a ward from its source fields
    pub fn for_ward(ward: &WardRecord) -> Self {
        RiskFactors {
            exposure: exposure_for(ward.population_density, ward.rainfall_mm),
            susceptibility: susceptibility_for(ward.low_elevation_ratio, ward.urban_land_ratio),
            resilience: resilience_or_default(ward.drainage_capacity),
        }
    }

    pub fn score(&self) -> RiskScore {
        score(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub index: f64,
    pub level: RiskLevel,
}

/// Score a set of factors
pub fn score(factors: &RiskFactors) -> RiskScore {
    let raw = (factors.exposure + factors.susceptibility) / factors.resilience;
    let index = round2(raw);

    RiskScore {
        index,
        level: RiskLevel::from_index(index),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ward exposure: density per thousand residents plus rainfall per 200 mm
pub fn exposure_for(population_density: f64, rainfall_mm: f64) -> f64 {
    population_density / 1000.0 + rainfall_mm / 200.0
}

pub fn susceptibility_for(low_elevation_ratio: f64, urban_land_ratio: f64) -> f64 {
    low_elevation_ratio + urban_land_ratio
}

/// Absent or zero resilience scores as [`DEFAULT_RESILIENCE`]
pub fn resilience_or_default(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v != 0.0 => v,
        _ => DEFAULT_RESILIENCE,
    }
}

// ============================================================================
// WARD RANKING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardRisk {
    pub ward_name: String,
    pub district: Option<String>,
    pub factors: RiskFactors,
    pub score: RiskScore,
}

impl WardRisk {
    pub fn for_ward(ward: &WardRecord) -> Self {
        let factors = RiskFactors::for_ward(ward);
        WardRisk {
            ward_name: ward.ward_name.clone(),
            district: ward.district.clone(),
            factors,
            score: factors.score(),
        }
    }
}

/// Score every ward, highest index first (ties by name)
pub fn rank_wards(wards: &[WardRecord]) -> Vec<WardRisk> {
    let mut ranked: Vec<WardRisk> = wards.iter().map(WardRisk::for_ward).collect();

    ranked.sort_by(|a, b| {
        b.score
            .index
            .partial_cmp(&a.score.index)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ward_name.cmp(&b.ward_name))
    });

    ranked
}

/// Ward counts per level, used for filter buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RiskDistribution {
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = &'a RiskScore>) -> Self {
        let mut distribution = RiskDistribution::default();
        for score in scores {
            match score.level {
                RiskLevel::High => distribution.high += 1,
                RiskLevel::Medium => distribution.medium += 1,
                RiskLevel::Low => distribution.low += 1,
            }
        }
        distribution
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

// ============================================================================
// TESTS
// ============================================================================
