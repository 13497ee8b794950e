// 🏛️ Field Registry - Rule tables per entity kind
// Each kind is declared as data: field name → type, presence, range, vocabulary.
// Adding a field or a synonym is a table edit, not new validation code.

use crate::entities::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// FIELD TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Number,
    /// Number without a fractional part
    Integer,
    /// `YYYY-MM-DD` or `DD/MM/YYYY`
    Date,
    /// `"<lat>,<lng>"`
    Coordinates,
    Enumeration(Vocabulary),
}

/// Numeric domain checks, all bounds inclusive unless stated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValidationRule {
    /// Strictly greater than zero
    Positive,
    NonNegative,
    Range { min: f64, max: f64 },
}

impl ValidationRule {
    /// Message for a violating value, `None` when the value is accepted
    pub fn check(&self, value: f64) -> Option<String> {
        match *self {
            ValidationRule::Positive if value <= 0.0 => {
                Some(format!("must be greater than 0, got {}", value))
            }
            ValidationRule::NonNegative if value < 0.0 => {
                Some(format!("must be at least 0, got {}", value))
            }
            ValidationRule::Range { min, max } if value < min || value > max => {
                Some(format!("must be between {} and {}, got {}", min, max, value))
            }
            _ => None,
        }
    }
}

// ============================================================================
// VOCABULARIES (enumerated fields + synonym tables)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vocabulary {
    OperationalStatus,
    DrainageAssetType,
    StructureType,
    RiskCategory,
}

type SynonymTable = &'static [(&'static str, &'static [&'static str])];

const OPERATIONAL_STATUS: SynonymTable = &[
    (
        "in_service",
        &["in service", "active", "operational", "working", "đang hoạt động", "hoạt động", "đang sử dụng"],
    ),
    (
        "under_maintenance",
        &["under maintenance", "maintenance", "under repair", "đang bảo trì", "bảo trì", "đang sửa chữa"],
    ),
    (
        "decommissioned",
        &["decommissioned", "inactive", "retired", "out of service", "ngừng hoạt động", "ngưng hoạt động", "đã ngừng"],
    ),
    (
        "under_construction",
        &["under construction", "construction", "đang xây dựng", "đang thi công"],
    ),
];

const DRAINAGE_ASSET_TYPE: SynonymTable = &[
    ("pipe", &["pipe", "ống", "ống thoát nước"]),
    ("canal", &["canal", "channel", "kênh", "kênh rạch", "rạch"]),
    ("culvert", &["culvert", "cống", "cống hộp"]),
    ("pump_station", &["pump station", "pumping station", "trạm bơm"]),
    ("retention_pond", &["retention pond", "pond", "hồ điều tiết"]),
];

const STRUCTURE_TYPE: SynonymTable = &[
    ("road", &["road", "street", "đường"]),
    ("bridge", &["bridge", "cầu"]),
    ("tunnel", &["tunnel", "hầm"]),
    ("overpass", &["overpass", "flyover", "cầu vượt"]),
];

const RISK_CATEGORY: SynonymTable = &[
    ("high", &["high", "cao", "nguy cơ cao"]),
    ("medium", &["medium", "moderate", "trung bình"]),
    ("low", &["low", "thấp", "nguy cơ thấp"]),
];

impl Vocabulary {
    fn table(&self) -> SynonymTable {
        match self {
            Vocabulary::OperationalStatus => OPERATIONAL_STATUS,
            Vocabulary::DrainageAssetType => DRAINAGE_ASSET_TYPE,
            Vocabulary::StructureType => STRUCTURE_TYPE,
            Vocabulary::RiskCategory => RISK_CATEGORY,
        }
    }

    /// Canonical tokens in declaration order
    pub fn tokens(&self) -> Vec<&'static str> {
        self.table().iter().map(|(token, _)| *token).collect()
    }

    /// Map a raw label (canonical token or synonym) to its canonical token
    ///
    /// Case-insensitive; `_` and `-` count as spaces and runs of whitespace
    /// collapse, so "IN_SERVICE", "In  service" and "in-service" all match.
    pub fn resolve(&self, raw: &str) -> Option<&'static str> {
        let wanted = normalize_label(raw);
        if wanted.is_empty() {
            return None;
        }

        self.table()
            .iter()
            .find(|(token, synonyms)| {
                normalize_label(token) == wanted
                    || synonyms.iter().any(|s| normalize_label(s) == wanted)
            })
            .map(|(token, _)| *token)
    }
}

/// NFC first: decomposed input (common in macOS exports) must match composed synonyms
fn normalize_label(raw: &str) -> String {
    raw.nfc()
        .collect::<String>()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// FIELD DEFINITION
// ============================================================================

/// FieldDefinition - One column of one entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Header name in the submitted CSV
    pub name: String,

    pub type_: FieldType,

    /// Required fields must be non-empty after trimming
    pub required: bool,

    /// Numeric domain checks (ignored for non-numeric types)
    pub validation_rules: Vec<ValidationRule>,

    pub description: String,

    /// Example value, used when rendering import templates
    pub example: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_: FieldType) -> Self {
        FieldDefinition {
            name: name.into(),
            type_,
            required: false,
            validation_rules: Vec::new(),
            description: String::new(),
            example: None,
        }
    }

    /// Builder: mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: add validation rule
    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: add example
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

// ============================================================================
// FIELD REGISTRY
// ============================================================================

/// FieldRegistry - Declared fields of every entity kind, in column order
pub struct FieldRegistry {
    kinds: HashMap<EntityKind, Vec<FieldDefinition>>,
}

impl FieldRegistry {
    /// Create a registry holding the rule tables of all five kinds
    pub fn new() -> Self {
        let mut registry = FieldRegistry {
            kinds: HashMap::new(),
        };

        registry.register_ward_fields();
        registry.register_weather_fields();
        registry.register_drainage_fields();
        registry.register_structure_fields();
        registry.register_risk_index_fields();
        registry
    }

    /// Shared registry, built on first use
    pub fn global() -> &'static FieldRegistry {
        static REGISTRY: OnceLock<FieldRegistry> = OnceLock::new();
        REGISTRY.get_or_init(FieldRegistry::new)
    }

    fn register_ward_fields(&mut self) {
        use FieldType::*;
        use ValidationRule::*;

        self.register(
            EntityKind::Ward,
            vec![
                FieldDefinition::new("ward_name", Text)
                    .required()
                    .with_description("Ward name, unique per ward")
                    .with_example("Ward 1"),
                FieldDefinition::new("district", Text)
                    .with_description("Parent district")
                    .with_example("District 1"),
                FieldDefinition::new("area_km2", Number)
                    .required()
                    .with_validation(Positive)
                    .with_description("Area in square kilometres")
                    .with_example("5.0"),
                FieldDefinition::new("population", Number)
                    .with_validation(NonNegative)
                    .with_description("Resident population, 0 when absent")
                    .with_example("45000"),
                FieldDefinition::new("population_density", Number)
                    .required()
                    .with_validation(NonNegative)
                    .with_description("Residents per square kilometre")
                    .with_example("9000"),
                FieldDefinition::new("coordinates", Coordinates)
                    .required()
                    .with_description("Centroid as \"lat,lng\"")
                    .with_example("\"10.77,106.70\""),
                FieldDefinition::new("rainfall_mm", Number)
                    .with_validation(NonNegative)
                    .with_description("Reference rainfall in millimetres, 0 when absent")
                    .with_example("250"),
                FieldDefinition::new("low_elevation_ratio", Number)
                    .with_validation(Range { min: 0.0, max: 1.0 })
                    .with_description("Fraction of area at low elevation, 0 when absent")
                    .with_example("0.4"),
                FieldDefinition::new("urban_land_ratio", Number)
                    .with_validation(Range { min: 0.0, max: 1.0 })
                    .with_description("Fraction of area that is urban land, 0 when absent")
                    .with_example("0.8"),
                FieldDefinition::new("drainage_capacity", Number)
                    .with_validation(NonNegative)
                    .with_description("Drainage capacity, used as resilience (absent or 0 scores as 1.0)")
                    .with_example("1.5"),
            ],
        );
    }

    fn register_weather_fields(&mut self) {
        use FieldType::*;
        use ValidationRule::*;

        self.register(
            EntityKind::WeatherObservation,
            vec![
                FieldDefinition::new("ward_name", Text)
                    .required()
                    .with_example("Ward 1"),
                FieldDefinition::new("observed_on", Date)
                    .required()
                    .with_description("Observation date")
                    .with_example("2024-09-15"),
                FieldDefinition::new("rainfall_mm", Number)
                    .required()
                    .with_validation(NonNegative)
                    .with_example("85.5"),
                FieldDefinition::new("temperature_c", Number)
                    .required()
                    .with_validation(Range { min: -50.0, max: 60.0 })
                    .with_example("31.2"),
                FieldDefinition::new("humidity_pct", Number)
                    .required()
                    .with_validation(Range { min: 0.0, max: 100.0 })
                    .with_example("78"),
                FieldDefinition::new("wind_speed_kmh", Number)
                    .with_validation(NonNegative)
                    .with_example("12"),
                FieldDefinition::new("water_level_m", Number)
                    .with_description("Water level relative to datum, may be negative")
                    .with_example("1.3"),
            ],
        );
    }

    fn register_drainage_fields(&mut self) {
        use FieldType::*;
        use ValidationRule::*;

        self.register(
            EntityKind::DrainageAsset,
            vec![
                FieldDefinition::new("asset_code", Text)
                    .required()
                    .with_description("Asset identifier, unique per asset")
                    .with_example("DR-001"),
                FieldDefinition::new("ward_name", Text)
                    .required()
                    .with_example("Ward 1"),
                FieldDefinition::new("asset_type", Enumeration(Vocabulary::DrainageAssetType))
                    .required()
                    .with_example("culvert"),
                FieldDefinition::new("length_m", Number)
                    .required()
                    .with_validation(Positive)
                    .with_example("120"),
                FieldDefinition::new("diameter_mm", Number)
                    .with_validation(Positive)
                    .with_example("800"),
                FieldDefinition::new("capacity_m3s", Number)
                    .with_validation(NonNegative)
                    .with_example("2.5"),
                FieldDefinition::new("status", Enumeration(Vocabulary::OperationalStatus))
                    .required()
                    .with_example("in_service"),
                FieldDefinition::new("coordinates", Coordinates)
                    .with_example("\"10.77,106.70\""),
            ],
        );
    }

    fn register_structure_fields(&mut self) {
        use FieldType::*;
        use ValidationRule::*;

        self.register(
            EntityKind::RoadBridgeStructure,
            vec![
                FieldDefinition::new("structure_name", Text)
                    .required()
                    .with_description("Structure name, unique per structure")
                    .with_example("Cau Ong Lanh"),
                FieldDefinition::new("ward_name", Text)
                    .required()
                    .with_example("Ward 1"),
                FieldDefinition::new("structure_type", Enumeration(Vocabulary::StructureType))
                    .required()
                    .with_example("bridge"),
                FieldDefinition::new("length_m", Number)
                    .required()
                    .with_validation(Positive)
                    .with_example("150"),
                FieldDefinition::new("width_m", Number)
                    .required()
                    .with_validation(Positive)
                    .with_example("12"),
                FieldDefinition::new("built_year", Integer)
                    .with_validation(Range { min: 1800.0, max: 2100.0 })
                    .with_example("1995"),
                FieldDefinition::new("status", Enumeration(Vocabulary::OperationalStatus))
                    .required()
                    .with_example("in_service"),
                FieldDefinition::new("coordinates", Coordinates)
                    .required()
                    .with_example("\"10.76,106.69\""),
            ],
        );
    }

    fn register_risk_index_fields(&mut self) {
        use FieldType::*;
        use ValidationRule::*;

        self.register(
            EntityKind::RiskIndexRecord,
            vec![
                FieldDefinition::new("ward_name", Text)
                    .required()
                    .with_example("Ward 1"),
                FieldDefinition::new("assessed_on", Date)
                    .required()
                    .with_example("2024-09-15"),
                FieldDefinition::new("exposure", Number)
                    .required()
                    .with_validation(NonNegative)
                    .with_example("2.0"),
                FieldDefinition::new("susceptibility", Number)
                    .required()
                    .with_validation(NonNegative)
                    .with_example("1.2"),
                FieldDefinition::new("resilience", Number)
                    .with_validation(NonNegative)
                    .with_description("Absent or 0 scores as 1.0")
                    .with_example("1.0"),
                FieldDefinition::new("risk_category", Enumeration(Vocabulary::RiskCategory))
                    .with_description("Category declared by the assessor, kept as submitted")
                    .with_example("medium"),
            ],
        );
    }

    /// Register (or replace) the field list of a kind
    pub fn register(&mut self, kind: EntityKind, fields: Vec<FieldDefinition>) {
        self.kinds.insert(kind, fields);
    }

    /// Declared fields of a kind, in column order
    pub fn fields(&self, kind: EntityKind) -> &[FieldDefinition] {
        self.kinds.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up one field of a kind by header name
    pub fn get(&self, kind: EntityKind, name: &str) -> Option<&FieldDefinition> {
        self.fields(kind).iter().find(|f| f.name == name)
    }

    /// Names of the required fields of a kind
    pub fn required_fields(&self, kind: EntityKind) -> Vec<&str> {
        self.fields(kind)
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Count total kinds
    pub fn count(&self) -> usize {
        self.kinds.len()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
