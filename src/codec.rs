//! Reading payload validation and normalization.
//!
//! Accepts the dashboard's submission format: unknown fields are ignored,
//! and a missing field, an explicit null, and an empty string all mean
//! "not measured". Number inputs may arrive as JSON numbers or as the
//! decimal strings browser forms produce.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::{ChargerStatus, NewReading};

/// Payload validation error types.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("reading payload must be a JSON object")]
    NotAnObject,
    #[error("{0} must be an integer")]
    NotAnInteger(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
    #[error("{0} must be a boolean")]
    NotABoolean(&'static str),
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
    #[error("unknown charger status: {0}")]
    UnknownChargerStatus(String),
}

/// Validate and normalize a submitted payload into a [`NewReading`].
///
/// Pure transform; nothing is clamped and nothing is stored.
pub fn decode_reading(payload: &Value) -> Result<NewReading, ValidationError> {
    let obj = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    Ok(NewReading {
        allpowers_battery: percent_field(obj, "allpowers_battery")?,
        allpowers_watts: watts_field(obj, "allpowers_watts")?,
        allpowers_voltage: voltage_field(obj, "allpowers_voltage")?,
        allpowers_240v_input: bool_field(obj, "allpowers_240v_input")?,
        ecoflow_battery: percent_field(obj, "ecoflow_battery")?,
        ecoflow_watts: watts_field(obj, "ecoflow_watts")?,
        ecoflow_voltage: voltage_field(obj, "ecoflow_voltage")?,
        lifepo4_battery: percent_field(obj, "lifepo4_battery")?,
        lifepo4_voltage: voltage_field(obj, "lifepo4_voltage")?,
        solar_watts: watts_field(obj, "solar_watts")?,
        solar_voltage: voltage_field(obj, "solar_voltage")?,
        system_load_watts: watts_field(obj, "system_load_watts")?,
        charger_status: status_field(obj)?,
    })
}

/// State-of-charge percent, 0..=100.
fn percent_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<i64>, ValidationError> {
    let value = int_field(obj, key)?;
    if let Some(pct) = value {
        if !(0..=100).contains(&pct) {
            return Err(ValidationError::OutOfRange(key));
        }
    }
    Ok(value)
}

/// Non-negative integer wattage.
fn watts_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<i64>, ValidationError> {
    let value = int_field(obj, key)?;
    if let Some(watts) = value {
        if watts < 0 {
            return Err(ValidationError::OutOfRange(key));
        }
    }
    Ok(value)
}

/// Non-negative voltage.
fn voltage_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<f64>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => {
            let volts: f64 = s.parse().map_err(|_| ValidationError::NotANumber(key))?;
            if !volts.is_finite() || volts < 0.0 {
                return Err(ValidationError::OutOfRange(key));
            }
            Ok(Some(volts))
        }
        Some(Value::Number(n)) => {
            let volts = n.as_f64().ok_or(ValidationError::NotANumber(key))?;
            if !volts.is_finite() || volts < 0.0 {
                return Err(ValidationError::OutOfRange(key));
            }
            Ok(Some(volts))
        }
        Some(_) => Err(ValidationError::NotANumber(key)),
    }
}

fn int_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<i64>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ValidationError::NotAnInteger(key)),
        // as_i64 rejects fractional numbers, which stay errors rather
        // than being truncated.
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or(ValidationError::NotAnInteger(key)),
        Some(_) => Err(ValidationError::NotAnInteger(key)),
    }
}

fn bool_field(obj: &Map<String, Value>, key: &'static str) -> Result<Option<bool>, ValidationError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ValidationError::NotABoolean(key)),
    }
}

fn status_field(obj: &Map<String, Value>) -> Result<Option<ChargerStatus>, ValidationError> {
    match obj.get("charger_status") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .parse::<ChargerStatus>()
            .map(Some)
            .map_err(|_| ValidationError::UnknownChargerStatus(s.clone())),
        Some(other) => Err(ValidationError::UnknownChargerStatus(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_payload() {
        let payload = json!({
            "allpowers_battery": 80,
            "allpowers_watts": 120,
            "allpowers_voltage": 13.4,
            "allpowers_240v_input": true,
            "ecoflow_battery": 65,
            "ecoflow_watts": 0,
            "ecoflow_voltage": 12.9,
            "lifepo4_battery": 90,
            "lifepo4_voltage": 13.2,
            "solar_watts": 340,
            "solar_voltage": 18.1,
            "system_load_watts": 210,
            "charger_status": "charging",
        });

        let reading = decode_reading(&payload).unwrap();
        assert_eq!(reading.allpowers_battery, Some(80));
        assert_eq!(reading.allpowers_240v_input, Some(true));
        assert_eq!(reading.ecoflow_watts, Some(0));
        assert_eq!(reading.solar_voltage, Some(18.1));
        assert_eq!(reading.charger_status, Some(ChargerStatus::Charging));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let payload = json!({
            "allpowers_battery": 50,
            "firmware_rev": "2.1.0",
            "nested": {"anything": 1},
        });

        let reading = decode_reading(&payload).unwrap();
        assert_eq!(reading.allpowers_battery, Some(50));
    }

    #[test]
    fn test_absent_null_and_empty_string_all_mean_missing() {
        let payload = json!({
            "allpowers_battery": null,
            "ecoflow_voltage": "",
            "charger_status": "",
        });

        let reading = decode_reading(&payload).unwrap();
        assert_eq!(reading, NewReading::default());
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let payload = json!({
            "allpowers_battery": "80",
            "solar_voltage": "18.1",
            "solar_watts": "340",
        });

        let reading = decode_reading(&payload).unwrap();
        assert_eq!(reading.allpowers_battery, Some(80));
        assert_eq!(reading.solar_voltage, Some(18.1));
        assert_eq!(reading.solar_watts, Some(340));
    }

    #[test]
    fn test_fractional_integer_rejected() {
        let payload = json!({"allpowers_battery": 80.5});
        assert_eq!(
            decode_reading(&payload),
            Err(ValidationError::NotAnInteger("allpowers_battery"))
        );

        let payload = json!({"solar_watts": "12.5"});
        assert_eq!(
            decode_reading(&payload),
            Err(ValidationError::NotAnInteger("solar_watts"))
        );
    }

    #[test]
    fn test_range_checks() {
        assert_eq!(
            decode_reading(&json!({"allpowers_battery": 101})),
            Err(ValidationError::OutOfRange("allpowers_battery"))
        );
        assert_eq!(
            decode_reading(&json!({"lifepo4_battery": -1})),
            Err(ValidationError::OutOfRange("lifepo4_battery"))
        );
        assert_eq!(
            decode_reading(&json!({"solar_watts": -5})),
            Err(ValidationError::OutOfRange("solar_watts"))
        );
        assert_eq!(
            decode_reading(&json!({"ecoflow_voltage": -0.1})),
            Err(ValidationError::OutOfRange("ecoflow_voltage"))
        );

        // Boundaries are inclusive.
        let reading = decode_reading(&json!({"allpowers_battery": 0, "ecoflow_battery": 100})).unwrap();
        assert_eq!(reading.allpowers_battery, Some(0));
        assert_eq!(reading.ecoflow_battery, Some(100));
    }

    #[test]
    fn test_bool_must_be_json_boolean() {
        assert_eq!(
            decode_reading(&json!({"allpowers_240v_input": "true"})),
            Err(ValidationError::NotABoolean("allpowers_240v_input"))
        );
        assert_eq!(
            decode_reading(&json!({"allpowers_240v_input": 1})),
            Err(ValidationError::NotABoolean("allpowers_240v_input"))
        );

        let reading = decode_reading(&json!({"allpowers_240v_input": false})).unwrap();
        assert_eq!(reading.allpowers_240v_input, Some(false));
    }

    #[test]
    fn test_charger_status_closed_set() {
        for (raw, status) in [
            ("idle", ChargerStatus::Idle),
            ("charging", ChargerStatus::Charging),
            ("discharging", ChargerStatus::Discharging),
            ("error", ChargerStatus::Error),
        ] {
            let reading = decode_reading(&json!({"charger_status": raw})).unwrap();
            assert_eq!(reading.charger_status, Some(status));
        }

        assert_eq!(
            decode_reading(&json!({"charger_status": "turbo"})),
            Err(ValidationError::UnknownChargerStatus("turbo".to_string()))
        );
    }

    #[test]
    fn test_non_object_payload_rejected() {
        assert_eq!(decode_reading(&json!([1, 2, 3])), Err(ValidationError::NotAnObject));
        assert_eq!(decode_reading(&json!("reading")), Err(ValidationError::NotAnObject));
        assert_eq!(decode_reading(&json!(null)), Err(ValidationError::NotAnObject));
    }
}
