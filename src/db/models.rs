//! Reading row and aggregate model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Charger operating state reported with a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargerStatus {
    Idle,
    Charging,
    Discharging,
    Error,
}

impl ChargerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargerStatus::Idle => "idle",
            ChargerStatus::Charging => "charging",
            ChargerStatus::Discharging => "discharging",
            ChargerStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for ChargerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(ChargerStatus::Idle),
            "charging" => Ok(ChargerStatus::Charging),
            "discharging" => Ok(ChargerStatus::Discharging),
            "error" => Ok(ChargerStatus::Error),
            _ => Err(()),
        }
    }
}

/// A stored power-system reading. Every measurement is independently
/// optional; a NULL field means "not measured", which is distinct from 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub allpowers_battery: Option<i64>,
    pub allpowers_watts: Option<i64>,
    pub allpowers_voltage: Option<f64>,
    pub allpowers_240v_input: Option<bool>,
    pub ecoflow_battery: Option<i64>,
    pub ecoflow_watts: Option<i64>,
    pub ecoflow_voltage: Option<f64>,
    pub lifepo4_battery: Option<i64>,
    pub lifepo4_voltage: Option<f64>,
    pub solar_watts: Option<i64>,
    pub solar_voltage: Option<f64>,
    pub system_load_watts: Option<i64>,
    pub charger_status: Option<ChargerStatus>,
}

/// A validated reading ready for insertion (id and timestamp are assigned
/// by the store).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReading {
    pub allpowers_battery: Option<i64>,
    pub allpowers_watts: Option<i64>,
    pub allpowers_voltage: Option<f64>,
    pub allpowers_240v_input: Option<bool>,
    pub ecoflow_battery: Option<i64>,
    pub ecoflow_watts: Option<i64>,
    pub ecoflow_voltage: Option<f64>,
    pub lifepo4_battery: Option<i64>,
    pub lifepo4_voltage: Option<f64>,
    pub solar_watts: Option<i64>,
    pub solar_voltage: Option<f64>,
    pub system_load_watts: Option<i64>,
    pub charger_status: Option<ChargerStatus>,
}

/// Aggregate statistics over a trailing window. Averages ignore NULL
/// fields; a field with no non-null observations in the window is None.
#[derive(Debug, Clone, Serialize)]
pub struct WindowStats {
    pub count: i64,
    pub avg_allpowers_battery: Option<f64>,
    pub avg_allpowers_watts: Option<f64>,
    pub avg_allpowers_voltage: Option<f64>,
    pub avg_ecoflow_battery: Option<f64>,
    pub avg_ecoflow_watts: Option<f64>,
    pub avg_ecoflow_voltage: Option<f64>,
    pub avg_lifepo4_battery: Option<f64>,
    pub avg_lifepo4_voltage: Option<f64>,
    pub avg_solar_watts: Option<f64>,
    pub avg_solar_voltage: Option<f64>,
    pub avg_system_load_watts: Option<f64>,
    pub max_allpowers_watts: Option<i64>,
    pub max_ecoflow_watts: Option<i64>,
    pub max_solar_watts: Option<i64>,
}
