// Flood Risk Core - Library
// CSV ingestion, validation and bulk import for flood-risk records,
// plus the risk scoring used by maps and reports

pub mod error;
pub mod parser;
pub mod attributes;     // Rule tables per entity kind
pub mod schema;         // Row validation
pub mod entities;       // Normalized records
pub mod risk;           // Risk scoring
pub mod db;             // Record store
pub mod import;         // Bulk import coordinator
pub mod config;

// Re-export commonly used types
pub use error::{
    ConfigError, FieldError, ImportError, InsertError, ParseError, StoreError, StoreErrorKind,
};
pub use parser::{parse, CsvParser, RawRow};
pub use attributes::{FieldDefinition, FieldRegistry, FieldType, ValidationRule, Vocabulary};
pub use schema::{validate, SchemaValidator, ValidatedFields, ValidationOutcome};
pub use entities::{
    Coordinates, DrainageAssetRecord, DrainageAssetType, EntityKind, NormalizedRecord,
    OperationalStatus, RiskIndexRecord, StructureRecord, StructureType, WardRecord,
    WeatherRecord,
};
pub use risk::{
    rank_wards, score, RiskDistribution, RiskFactors, RiskLevel, RiskScore, WardRisk,
};
pub use db::{Event, RecordId, RecordStore, SqliteStore, StoredRecord};
pub use import::{
    bulk_import, BulkImporter, DuplicateReason, DuplicateRow, FailedRow, FailureReason,
    ImportAbort, ImportOutcome, ImportResult, ImportSummary, ImportedRow,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
