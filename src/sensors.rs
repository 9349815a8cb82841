//! Read-only display fields over a [`SnowReport`], keyed by the report's
//! field names.

use crate::parser::Unit;
use crate::SnowReport;
use chrono::NaiveDate;
use std::fmt;

/// Value of one display field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorValue {
    Length(f64),
    Date(NaiveDate),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Length(v) => write!(f, "{v}"),
            SensorValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Static description of one display field.
#[derive(Clone, Copy)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<Unit>,
    pub icon: &'static str,
    pub value: fn(&SnowReport) -> Option<SensorValue>,
}

impl SensorDescription {
    /// Value with its unit, e.g. `"120 cm"`, or `None` when absent.
    pub fn render(&self, report: &SnowReport) -> Option<String> {
        let value = (self.value)(report)?;
        Some(match self.unit {
            Some(unit) => format!("{value} {}", unit.token()),
            None => value.to_string(),
        })
    }
}

impl fmt::Debug for SensorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorDescription")
            .field("key", &self.key)
            .field("unit", &self.unit)
            .finish()
    }
}

pub static SENSORS: [SensorDescription; 8] = [
    SensorDescription {
        key: "snow_altitude_cm",
        name: "Snow in altitude",
        unit: Some(Unit::Centimetres),
        icon: "mdi:snowflake",
        value: |r| r.snow_altitude_cm.map(SensorValue::Length),
    },
    SensorDescription {
        key: "snow_village_cm",
        name: "Snow in the village",
        unit: Some(Unit::Centimetres),
        icon: "mdi:snowflake",
        value: |r| r.snow_village_cm.map(SensorValue::Length),
    },
    SensorDescription {
        key: "last_snowfall_date",
        name: "Last snowfall",
        unit: None,
        icon: "mdi:calendar-snowflake",
        value: |r| r.last_snowfall_date.map(SensorValue::Date),
    },
    SensorDescription {
        key: "last_snowfall_amount_cm",
        name: "Last snowfall amount",
        unit: Some(Unit::Centimetres),
        icon: "mdi:snowflake-alert",
        value: |r| r.last_snowfall_amount_cm.map(SensorValue::Length),
    },
    SensorDescription {
        key: "fresh_snow_cm",
        name: "Fresh snow",
        unit: Some(Unit::Centimetres),
        icon: "mdi:snowflake-variant",
        value: |r| r.fresh_snow_cm.map(SensorValue::Length),
    },
    SensorDescription {
        key: "cross_country_skiing_km",
        name: "Cross-country skiing",
        unit: Some(Unit::Kilometres),
        icon: "mdi:ski-cross-country",
        value: |r| r.cross_country_skiing_km.map(SensorValue::Length),
    },
    SensorDescription {
        key: "alpine_skiing_km",
        name: "Alpine skiing",
        unit: Some(Unit::Kilometres),
        icon: "mdi:ski",
        value: |r| r.alpine_skiing_km.map(SensorValue::Length),
    },
    SensorDescription {
        key: "winter_trail_km",
        name: "Winter trail",
        unit: Some(Unit::Kilometres),
        icon: "mdi:walk",
        value: |r| r.winter_trail_km.map(SensorValue::Length),
    },
];

/// Look a display field up by key.
pub fn sensor(key: &str) -> Option<&'static SensorDescription> {
    SENSORS.iter().find(|s| s.key == key)
}
