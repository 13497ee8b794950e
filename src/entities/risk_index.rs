// Risk Index Record - an assessor's exposure/susceptibility/resilience entry
//
// Scored from its own fields, independently of the ward-derived factors.
// A declared category is kept as submitted; it may disagree with the score.

use crate::error::FieldError;
use crate::risk::{resilience_or_default, RiskFactors, RiskLevel, RiskScore};
use crate::schema::ValidatedFields;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskIndexRecord {
    pub ward_name: String,
    pub assessed_on: NaiveDate,
    pub exposure: f64,
    pub susceptibility: f64,
    /// Already substituted: never 0
    pub resilience: f64,
    pub declared_category: Option<RiskLevel>,
}

impl RiskIndexRecord {
    pub fn from_fields(fields: &ValidatedFields) -> Result<Self, FieldError> {
        let factors = RiskFactors::new(
            fields.require_number("exposure")?,
            fields.require_number("susceptibility")?,
            resilience_or_default(fields.number("resilience")),
        );

        Ok(RiskIndexRecord {
            ward_name: fields.require_text("ward_name")?,
            assessed_on: fields.require_date("assessed_on")?,
            exposure: factors.exposure,
            susceptibility: factors.susceptibility,
            resilience: factors.resilience,
            declared_category: fields.token("risk_category").and_then(RiskLevel::from_token),
        })
    }

    pub fn factors(&self) -> RiskFactors {
        RiskFactors::new(self.exposure, self.susceptibility, self.resilience)
    }

    /// Index and level, recomputed from the stored factors on every call
    pub fn score(&self) -> RiskScore {
        self.factors().score()
    }

    /// True when the assessor's category differs from the computed level
    pub fn category_disagrees(&self) -> bool {
        let level = self.score().level;
        self.declared_category
            .map_or(false, |declared| declared != level)
    }
}
