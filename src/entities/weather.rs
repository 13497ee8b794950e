// Weather Observation - one reading per ward per day

use crate::error::FieldError;
use crate::schema::ValidatedFields;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub ward_name: String,
    pub observed_on: NaiveDate,
    pub rainfall_mm: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: Option<f64>,
    /// Relative to datum, may be negative
    pub water_level_m: Option<f64>,
}

impl WeatherRecord {
    pub fn from_fields(fields: &ValidatedFields) -> Result<Self, FieldError> {
        Ok(WeatherRecord {
            ward_name: fields.require_text("ward_name")?,
            observed_on: fields.require_date("observed_on")?,
            rainfall_mm: fields.require_number("rainfall_mm")?,
            temperature_c: fields.require_number("temperature_c")?,
            humidity_pct: fields.require_number("humidity_pct")?,
            wind_speed_kmh: fields.number("wind_speed_kmh"),
            water_level_m: fields.number("water_level_m"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldValue;

    #[test]
    fn test_from_fields() {
        let mut fields = ValidatedFields::default();
        fields.insert("ward_name", FieldValue::Text("Ward 3".to_string()));
        fields.insert(
            "observed_on",
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 9, 15).unwrap()),
        );
        fields.insert("rainfall_mm", FieldValue::Number(85.5));
        fields.insert("temperature_c", FieldValue::Number(31.2));
        fields.insert("humidity_pct", FieldValue::Number(78.0));
        fields.insert("water_level_m", FieldValue::Number(-0.4));

        let record = WeatherRecord::from_fields(&fields).unwrap();
        assert_eq!(record.observed_on.to_string(), "2024-09-15");
        assert_eq!(record.wind_speed_kmh, None);
        assert_eq!(record.water_level_m, Some(-0.4));
    }

    #[test]
    fn test_serializes_date_as_iso() {
        let record = WeatherRecord {
            ward_name: "Ward 3".to_string(),
            observed_on: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            rainfall_mm: 0.0,
            temperature_c: 28.0,
            humidity_pct: 60.0,
            wind_speed_kmh: None,
            water_level_m: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["observed_on"], "2024-09-01");
    }
}
