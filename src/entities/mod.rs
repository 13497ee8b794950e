// Entity Models - one module per importable kind
//
// Each kind has:
// - A declared rule table (see attributes.rs)
// - A typed, normalized record built from validated fields
// - A natural key used for duplicate detection

pub mod ward;
pub mod weather;
pub mod drainage;
pub mod structure;
pub mod risk_index;

pub use ward::WardRecord;
pub use weather::WeatherRecord;
pub use drainage::{DrainageAssetRecord, DrainageAssetType};
pub use structure::{StructureRecord, StructureType};
pub use risk_index::RiskIndexRecord;

use crate::attributes::{FieldDefinition, FieldRegistry};
use crate::error::FieldError;
use crate::schema::ValidatedFields;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ward,
    #[serde(rename = "weather")]
    WeatherObservation,
    #[serde(rename = "drainage")]
    DrainageAsset,
    #[serde(rename = "structure")]
    RoadBridgeStructure,
    #[serde(rename = "risk_index")]
    RiskIndexRecord,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Ward,
        EntityKind::WeatherObservation,
        EntityKind::DrainageAsset,
        EntityKind::RoadBridgeStructure,
        EntityKind::RiskIndexRecord,
    ];

    /// Short token used on the command line and in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ward => "ward",
            EntityKind::WeatherObservation => "weather",
            EntityKind::DrainageAsset => "drainage",
            EntityKind::RoadBridgeStructure => "structure",
            EntityKind::RiskIndexRecord => "risk_index",
        }
    }

    /// Human-readable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Ward => "Ward",
            EntityKind::WeatherObservation => "Weather observation",
            EntityKind::DrainageAsset => "Drainage asset",
            EntityKind::RoadBridgeStructure => "Road/bridge structure",
            EntityKind::RiskIndexRecord => "Risk index record",
        }
    }

    /// Declared fields, in column order
    pub fn fields(&self) -> &'static [FieldDefinition] {
        FieldRegistry::global().fields(*self)
    }

    /// Header line of an import template for this kind
    pub fn template_header(&self) -> String {
        self.fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown entity kind '{}', expected one of {}", s, known.join(", "))
            })
    }
}

// ============================================================================
// SHARED VALUE TYPES
// ============================================================================

/// Geographic point parsed from `"lat,lng"`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Operational state of drainage assets and road/bridge structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    InService,
    UnderMaintenance,
    Decommissioned,
    UnderConstruction,
}

impl OperationalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::InService => "in_service",
            OperationalStatus::UnderMaintenance => "under_maintenance",
            OperationalStatus::Decommissioned => "decommissioned",
            OperationalStatus::UnderConstruction => "under_construction",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "in_service" => Some(OperationalStatus::InService),
            "under_maintenance" => Some(OperationalStatus::UnderMaintenance),
            "decommissioned" => Some(OperationalStatus::Decommissioned),
            "under_construction" => Some(OperationalStatus::UnderConstruction),
            _ => None,
        }
    }
}

// ============================================================================
// NORMALIZED RECORD
// ============================================================================

/// A row that passed every rule of its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Ward(WardRecord),
    WeatherObservation(WeatherRecord),
    DrainageAsset(DrainageAssetRecord),
    RoadBridgeStructure(StructureRecord),
    RiskIndexRecord(RiskIndexRecord),
}

impl NormalizedRecord {
    /// Build the typed record of a kind from validated fields
    pub fn from_fields(kind: EntityKind, fields: &ValidatedFields) -> Result<Self, FieldError> {
        Ok(match kind {
            EntityKind::Ward => NormalizedRecord::Ward(WardRecord::from_fields(fields)?),
            EntityKind::WeatherObservation => {
                NormalizedRecord::WeatherObservation(WeatherRecord::from_fields(fields)?)
            }
            EntityKind::DrainageAsset => {
                NormalizedRecord::DrainageAsset(DrainageAssetRecord::from_fields(fields)?)
            }
            EntityKind::RoadBridgeStructure => {
                NormalizedRecord::RoadBridgeStructure(StructureRecord::from_fields(fields)?)
            }
            EntityKind::RiskIndexRecord => {
                NormalizedRecord::RiskIndexRecord(RiskIndexRecord::from_fields(fields)?)
            }
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            NormalizedRecord::Ward(_) => EntityKind::Ward,
            NormalizedRecord::WeatherObservation(_) => EntityKind::WeatherObservation,
            NormalizedRecord::DrainageAsset(_) => EntityKind::DrainageAsset,
            NormalizedRecord::RoadBridgeStructure(_) => EntityKind::RoadBridgeStructure,
            NormalizedRecord::RiskIndexRecord(_) => EntityKind::RiskIndexRecord,
        }
    }

    /// Natural key used for duplicate detection
    pub fn natural_key(&self) -> String {
        match self {
            NormalizedRecord::Ward(r) => compose_key(&[&r.ward_name]),
            NormalizedRecord::WeatherObservation(r) => {
                compose_key(&[&r.ward_name, &r.observed_on.to_string()])
            }
            NormalizedRecord::DrainageAsset(r) => compose_key(&[&r.asset_code]),
            NormalizedRecord::RoadBridgeStructure(r) => compose_key(&[&r.structure_name]),
            NormalizedRecord::RiskIndexRecord(r) => {
                compose_key(&[&r.ward_name, &r.assessed_on.to_string()])
            }
        }
    }

    pub fn as_ward(&self) -> Option<&WardRecord> {
        match self {
            NormalizedRecord::Ward(ward) => Some(ward),
            _ => None,
        }
    }
}

/// Join key parts with `|` after trimming, collapsing whitespace and lower-casing
pub fn compose_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| {
            part.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("|")
}

// ============================================================================
// TESTS
// ============================================================================
