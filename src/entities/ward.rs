// Ward - administrative area with the source fields of its risk factors

use super::Coordinates;
use crate::error::FieldError;
use crate::risk::{RiskFactors, RiskScore};
use crate::schema::ValidatedFields;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardRecord {
    pub ward_name: String,
    pub district: Option<String>,
    pub area_km2: f64,
    pub population: f64,
    pub population_density: f64,
    pub coordinates: Coordinates,
    pub rainfall_mm: f64,
    pub low_elevation_ratio: f64,
    pub urban_land_ratio: f64,
    pub drainage_capacity: Option<f64>,
}

impl WardRecord {
    pub fn from_fields(fields: &ValidatedFields) -> Result<Self, FieldError> {
        Ok(WardRecord {
            ward_name: fields.require_text("ward_name")?,
            district: fields.text("district"),
            area_km2: fields.require_number("area_km2")?,
            population: fields.number("population").unwrap_or(0.0),
            population_density: fields.require_number("population_density")?,
            coordinates: fields.require_coordinates("coordinates")?,
            rainfall_mm: fields.number("rainfall_mm").unwrap_or(0.0),
            low_elevation_ratio: fields.number("low_elevation_ratio").unwrap_or(0.0),
            urban_land_ratio: fields.number("urban_land_ratio").unwrap_or(0.0),
            drainage_capacity: fields.number("drainage_capacity"),
        })
    }

    /// Factors are recomputed on every call, never cached on the record
    pub fn risk_factors(&self) -> RiskFactors {
        RiskFactors::for_ward(self)
    }

    pub fn risk_score(&self) -> RiskScore {
        self.risk_factors().score()
    }
}
