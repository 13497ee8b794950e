// Road/Bridge Structure

use super::{Coordinates, OperationalStatus};
use crate::error::FieldError;
use crate::schema::ValidatedFields;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Road,
    Bridge,
    Tunnel,
    Overpass,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Road => "road",
            StructureType::Bridge => "bridge",
            StructureType::Tunnel => "tunnel",
            StructureType::Overpass => "overpass",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "road" => Some(StructureType::Road),
            "bridge" => Some(StructureType::Bridge),
            "tunnel" => Some(StructureType::Tunnel),
            "overpass" => Some(StructureType::Overpass),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub structure_name: String,
    pub ward_name: String,
    pub structure_type: StructureType,
    pub length_m: f64,
    pub width_m: f64,
    pub built_year: Option<i32>,
    pub status: OperationalStatus,
    pub coordinates: Coordinates,
}

impl StructureRecord {
    pub fn from_fields(fields: &ValidatedFields) -> Result<Self, FieldError> {
        let structure_type = fields.require_token("structure_type")?;
        let status = fields.require_token("status")?;

        Ok(StructureRecord {
            structure_name: fields.require_text("structure_name")?,
            ward_name: fields.require_text("ward_name")?,
            structure_type: StructureType::from_token(structure_type).ok_or_else(|| {
                FieldError::new("structure_type", format!("unknown token '{}'", structure_type))
            })?,
            length_m: fields.require_number("length_m")?,
            width_m: fields.require_number("width_m")?,
            built_year: fields.integer("built_year").map(|year| year as i32),
            status: OperationalStatus::from_token(status)
                .ok_or_else(|| FieldError::new("status", format!("unknown token '{}'", status)))?,
            coordinates: fields.require_coordinates("coordinates")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Vocabulary;
    use crate::schema::FieldValue;

    #[test]
    fn test_every_vocabulary_token_has_a_variant() {
        for token in Vocabulary::StructureType.tokens() {
            let structure_type = StructureType::from_token(token);
            assert_eq!(structure_type.map(|t| t.as_str()), Some(token));
        }
    }

    #[test]
    fn test_from_fields() {
        let mut fields = ValidatedFields::default();
        fields.insert("structure_name", FieldValue::Text("Cau Ong Lanh".to_string()));
        fields.insert("ward_name", FieldValue::Text("Ward 1".to_string()));
        fields.insert("structure_type", FieldValue::Token("bridge"));
        fields.insert("length_m", FieldValue::Number(150.0));
        fields.insert("width_m", FieldValue::Number(12.0));
        fields.insert("built_year", FieldValue::Integer(1995));
        fields.insert("status", FieldValue::Token("in_service"));
        fields.insert(
            "coordinates",
            FieldValue::Coordinates(Coordinates { lat: 10.76, lng: 106.69 }),
        );

        let record = StructureRecord::from_fields(&fields).unwrap();
        assert_eq!(record.structure_type, StructureType::Bridge);
        assert_eq!(record.built_year, Some(1995));
        assert_eq!(record.length_m, 150.0);
    }
}
