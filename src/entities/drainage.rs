// Drainage Asset - pipes, canals, culverts, pump stations, ponds

use super::{Coordinates, OperationalStatus};
use crate::error::FieldError;
use crate::schema::ValidatedFields;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainageAssetType {
    Pipe,
    Canal,
    Culvert,
    PumpStation,
    RetentionPond,
}

impl DrainageAssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainageAssetType::Pipe => "pipe",
            DrainageAssetType::Canal => "canal",
            DrainageAssetType::Culvert => "culvert",
            DrainageAssetType::PumpStation => "pump_station",
            DrainageAssetType::RetentionPond => "retention_pond",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "pipe" => Some(DrainageAssetType::Pipe),
            "canal" => Some(DrainageAssetType::Canal),
            "culvert" => Some(DrainageAssetType::Culvert),
            "pump_station" => Some(DrainageAssetType::PumpStation),
            "retention_pond" => Some(DrainageAssetType::RetentionPond),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainageAssetRecord {
    pub asset_code: String,
    pub ward_name: String,
    pub asset_type: DrainageAssetType,
    pub length_m: f64,
    pub diameter_mm: Option<f64>,
    pub capacity_m3s: Option<f64>,
    pub status: OperationalStatus,
    pub coordinates: Option<Coordinates>,
}

impl DrainageAssetRecord {
    pub fn from_fields(fields: &ValidatedFields) -> Result<Self, FieldError> {
        let asset_type = fields.require_token("asset_type")?;
        let status = fields.require_token("status")?;

        Ok(DrainageAssetRecord {
            asset_code: fields.require_text("asset_code")?,
            ward_name: fields.require_text("ward_name")?,
            asset_type: DrainageAssetType::from_token(asset_type)
                .ok_or_else(|| FieldError::new("asset_type", format!("unknown token '{}'", asset_type)))?,
            length_m: fields.require_number("length_m")?,
            diameter_mm: fields.number("diameter_mm"),
            capacity_m3s: fields.number("capacity_m3s"),
            status: OperationalStatus::from_token(status)
                .ok_or_else(|| FieldError::new("status", format!("unknown token '{}'", status)))?,
            coordinates: fields.coordinates("coordinates"),
        })
    }
}
