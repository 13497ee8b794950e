// 📐 Shape Layer - Row Validation
// Checks raw rows against the rule table of their kind and builds normalized records

use crate::attributes::{FieldDefinition, FieldRegistry, FieldType, ValidationRule, Vocabulary};
use crate::entities::{Coordinates, EntityKind, NormalizedRecord};
use crate::error::FieldError;
use crate::parser::RawRow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Accepted date layouts, tried in order
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

// ============================================================================
// VALIDATION OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValidationOutcome {
    Valid {
        row_number: usize,
        record: NormalizedRecord,
    },
    /// Every violation found on the row, in field declaration order
    Invalid {
        row_number: usize,
        errors: Vec<FieldError>,
    },
}

impl ValidationOutcome {
    pub fn row_number(&self) -> usize {
        match self {
            ValidationOutcome::Valid { row_number, .. } => *row_number,
            ValidationOutcome::Invalid { row_number, .. } => *row_number,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }

    /// Human-readable messages, empty for valid rows
    pub fn messages(&self) -> Vec<String> {
        match self {
            ValidationOutcome::Valid { .. } => Vec::new(),
            ValidationOutcome::Invalid { errors, .. } => {
                errors.iter().map(|e| e.to_string()).collect()
            }
        }
    }
}

// ============================================================================
// VALIDATED FIELDS
// ============================================================================

/// Typed value of one field that passed its rules
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    Coordinates(Coordinates),
    /// Canonical vocabulary token
    Token(&'static str),
}

/// Field values of one row after validation; empty optional fields are absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedFields {
    values: HashMap<String, FieldValue>,
}

impl ValidatedFields {
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(FieldValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(FieldValue::Number(n)) => Some(*n),
            Some(FieldValue::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn coordinates(&self, name: &str) -> Option<Coordinates> {
        match self.values.get(name) {
            Some(FieldValue::Coordinates(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn token(&self, name: &str) -> Option<&'static str> {
        match self.values.get(name) {
            Some(FieldValue::Token(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn require_text(&self, name: &str) -> Result<String, FieldError> {
        self.text(name).ok_or_else(|| missing(name))
    }

    pub fn require_number(&self, name: &str) -> Result<f64, FieldError> {
        self.number(name).ok_or_else(|| missing(name))
    }

    pub fn require_date(&self, name: &str) -> Result<NaiveDate, FieldError> {
        self.date(name).ok_or_else(|| missing(name))
    }

    pub fn require_coordinates(&self, name: &str) -> Result<Coordinates, FieldError> {
        self.coordinates(name).ok_or_else(|| missing(name))
    }

    pub fn require_token(&self, name: &str) -> Result<&'static str, FieldError> {
        self.token(name).ok_or_else(|| missing(name))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn missing(name: &str) -> FieldError {
    FieldError::new(name, "is required")
}

// ============================================================================
// SCHEMA VALIDATOR
// ============================================================================

pub struct SchemaValidator<'a> {
    registry: &'a FieldRegistry,
}

impl SchemaValidator<'static> {
    pub fn new() -> Self {
        SchemaValidator {
            registry: FieldRegistry::global(),
        }
    }
}

impl<'a> SchemaValidator<'a> {
    /// Validate against a custom set of rule tables
    pub fn with_registry(registry: &'a FieldRegistry) -> Self {
        SchemaValidator { registry }
    }

    /// One outcome per row, in input order
    pub fn validate(&self, kind: EntityKind, rows: &[RawRow]) -> Vec<ValidationOutcome> {
        rows.iter().map(|row| self.validate_row(kind, row)).collect()
    }

    /// Validate a single row, collecting every violation
    pub fn validate_row(&self, kind: EntityKind, row: &RawRow) -> ValidationOutcome {
        let row_number = row.row_number;

        let fields = match self.validate_fields(kind, row) {
            Ok(fields) => fields,
            Err(errors) => return ValidationOutcome::Invalid { row_number, errors },
        };

        match NormalizedRecord::from_fields(kind, &fields) {
            Ok(record) => ValidationOutcome::Valid { row_number, record },
            Err(error) => ValidationOutcome::Invalid {
                row_number,
                errors: vec![error],
            },
        }
    }

    /// Field-level checks only: presence, type, range, vocabulary
    pub fn validate_fields(
        &self,
        kind: EntityKind,
        row: &RawRow,
    ) -> Result<ValidatedFields, Vec<FieldError>> {
        let mut fields = ValidatedFields::default();
        let mut errors = Vec::new();

        for definition in self.registry.fields(kind) {
            match check_field(definition, row.value(&definition.name)) {
                Ok(Some(value)) => fields.insert(definition.name.clone(), value),
                Ok(None) => {}
                Err(message) => errors.push(FieldError::new(definition.name.clone(), message)),
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(errors)
        }
    }
}

impl Default for SchemaValidator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate rows against the built-in rule tables
pub fn validate(kind: EntityKind, rows: &[RawRow]) -> Vec<ValidationOutcome> {
    SchemaValidator::new().validate(kind, rows)
}

// ============================================================================
// FIELD CHECKS
// ============================================================================

/// `Ok(None)` for an empty optional field, `Err(message)` on the first violation
fn check_field(definition: &FieldDefinition, raw: &str) -> Result<Option<FieldValue>, String> {
    let raw = raw.trim();

    if raw.is_empty() {
        return if definition.required {
            Err("is required".to_string())
        } else {
            Ok(None)
        };
    }

    let value = match definition.type_ {
        FieldType::Text => FieldValue::Text(raw.to_string()),
        FieldType::Number => {
            let number = parse_number(raw)?;
            check_rules(number, &definition.validation_rules)?;
            FieldValue::Number(number)
        }
        FieldType::Integer => {
            let number = parse_number(raw)?;
            if number.fract() != 0.0 {
                return Err(format!("must be a whole number, got '{}'", raw));
            }
            check_rules(number, &definition.validation_rules)?;
            FieldValue::Integer(number as i64)
        }
        FieldType::Date => FieldValue::Date(parse_date(raw)?),
        FieldType::Coordinates => FieldValue::Coordinates(parse_coordinates(raw)?),
        FieldType::Enumeration(vocabulary) => FieldValue::Token(resolve_token(vocabulary, raw)?),
    };

    Ok(Some(value))
}

fn parse_number(raw: &str) -> Result<f64, String> {
    let number: f64 = raw
        .parse()
        .map_err(|_| format!("must be a number, got '{}'", raw))?;

    if !number.is_finite() {
        return Err(format!("must be a finite number, got '{}'", raw));
    }

    Ok(number)
}

fn check_rules(value: f64, rules: &[ValidationRule]) -> Result<(), String> {
    match rules.iter().find_map(|rule| rule.check(value)) {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .ok_or_else(|| format!("must be a date (YYYY-MM-DD or DD/MM/YYYY), got '{}'", raw))
}

fn parse_coordinates(raw: &str) -> Result<Coordinates, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("expected \"lat,lng\", got '{}'", raw));
    }

    let lat = parts[0].parse::<f64>().ok().filter(|v| v.is_finite());
    let lng = parts[1].parse::<f64>().ok().filter(|v| v.is_finite());

    let (lat, lng) = match (lat, lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => return Err(format!("expected two numbers as \"lat,lng\", got '{}'", raw)),
    };

    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude must be between -90 and 90, got {}", lat));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(format!("longitude must be between -180 and 180, got {}", lng));
    }

    Ok(Coordinates { lat, lng })
}

fn resolve_token(vocabulary: Vocabulary, raw: &str) -> Result<&'static str, String> {
    vocabulary.resolve(raw).ok_or_else(|| {
        format!(
            "must be one of {}, got '{}'",
            vocabulary.tokens().join(", "),
            raw
        )
    })
}

// ============================================================================
// TESTS
// ============================================================================
