// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record to payload transformation.
//!
//! ```text
//! Record --> unit conversion --> field selection --> renaming --> Payload
//! ```
//!
//! The payload always carries every selected field. An observation missing
//! from the record is written as JSON `null` so the receiving schema does not
//! change from packet to packet.

use crate::record::Record;
use crate::units::{self, UnitGroupTable, UnitSystem};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Payload key holding the millisecond timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Wire-ready representation of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Millisecond epoch timestamp.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.0.get(TIMESTAMP_FIELD).and_then(Value::as_i64)
    }

    /// Value stored under a payload key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a key is present (even if its value is null).
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Payload keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of keys, timestamp included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the payload has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Immutable transformation settings.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Unit system of the payload values.
    pub target: UnitSystem,
    /// Observations to forward, in payload order.
    pub selected: Vec<String>,
    /// Observation name to payload key.
    pub field_map: BTreeMap<String, String>,
    /// Observation name to unit group, used for conversion.
    pub unit_groups: UnitGroupTable,
}

impl TransformConfig {
    /// Create a config using the built-in unit-group table.
    pub fn new(
        target: UnitSystem,
        selected: Vec<String>,
        field_map: BTreeMap<String, String>,
    ) -> Self {
        Self {
            target,
            selected,
            field_map,
            unit_groups: units::default_unit_groups(),
        }
    }
}

/// Applies a [`TransformConfig`] to records.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    config: TransformConfig,
}

impl RecordTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Transform one record.
    pub fn transform(&self, record: &Record) -> Payload {
        transform(
            record,
            self.config.target,
            &self.config.field_map,
            &self.config.selected,
            &self.config.unit_groups,
        )
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
}

/// Pure record transformation.
///
/// - values are converted from the record's unit system to `target` when the
///   observation has a known unit group
/// - only `selected` observations are kept; absent ones become `null`
/// - keys are renamed through `field_map`, unmapped names are kept
/// - the second timestamp becomes a millisecond `timestamp` key
pub fn transform(
    record: &Record,
    target: UnitSystem,
    field_map: &BTreeMap<String, String>,
    selected: &[String],
    unit_groups: &UnitGroupTable,
) -> Payload {
    let mut out = Map::with_capacity(selected.len() + 1);

    for name in selected {
        let value = match record.get(name) {
            Some(raw) => {
                let converted = match unit_groups.get(name) {
                    Some(group) => units::convert(raw, *group, record.unit_system, target),
                    None => raw,
                };
                serde_json::Number::from_f64(converted)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            None => Value::Null,
        };
        let key = field_map.get(name).unwrap_or(name);
        out.insert(key.clone(), value);
    }

    out.insert(
        TIMESTAMP_FIELD.to_string(),
        Value::from(record.timestamp.saturating_mul(1000)),
    );

    Payload(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_transformer() -> RecordTransformer {
        let field_map: BTreeMap<String, String> = [
            ("outTemp", "outside_temperature"),
            ("windSpeed", "wind_speed"),
            ("dayRain", "day_rain"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RecordTransformer::new(TransformConfig::new(
            UnitSystem::MetricWx,
            vec![
                "outTemp".to_string(),
                "windSpeed".to_string(),
                "dayRain".to_string(),
                "windDir".to_string(),
            ],
            field_map,
        ))
    }

    #[test]
    fn test_transform_converts_and_renames() {
        let record = Record::new(1_455_000_000, UnitSystem::Us)
            .with("outTemp", 50.0)
            .with("windSpeed", 0.0)
            .with("dayRain", 2.0)
            .with("windDir", 180.0)
            .with("inTemp", 70.0);

        let payload = weather_transformer().transform(&record);

        assert_eq!(payload.get("outside_temperature"), Some(&json!(10.0)));
        assert_eq!(payload.get("wind_speed"), Some(&json!(0.0)));
        assert_eq!(payload.get("day_rain"), Some(&json!(50.8)));
        // no mapping entry: original name kept
        assert_eq!(payload.get("windDir"), Some(&json!(180.0)));
        // not selected
        assert!(!payload.contains_key("inTemp"));
        assert!(!payload.contains_key("outTemp"));
    }

    #[test]
    fn test_missing_observation_serializes_as_null() {
        let record = Record::new(10, UnitSystem::MetricWx).with("outTemp", 3.5);

        let payload = weather_transformer().transform(&record);

        assert_eq!(payload.len(), 5);
        assert_eq!(payload.get("wind_speed"), Some(&Value::Null));
        assert_eq!(payload.get("day_rain"), Some(&Value::Null));
        assert_eq!(payload.get("windDir"), Some(&Value::Null));
        assert_eq!(
            payload.to_value().to_string(),
            r#"{"outside_temperature":3.5,"wind_speed":null,"day_rain":null,"windDir":null,"timestamp":10000}"#
        );
    }

    #[test]
    fn test_timestamp_rebased_to_milliseconds() {
        for ts in [0_i64, 1, 1_455_000_000, 4_102_444_800] {
            let payload = weather_transformer().transform(&Record::new(ts, UnitSystem::Us));
            assert_eq!(payload.timestamp_ms(), Some(ts * 1000));
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let transformer = weather_transformer();
        let record = Record::new(1_000, UnitSystem::Metric)
            .with("outTemp", 21.3)
            .with("windSpeed", 18.0);

        let first = transformer.transform(&record);
        let second = transformer.transform(&record);
        assert_eq!(first, second);
        assert_eq!(first.get("wind_speed"), Some(&json!(5.0)));
    }

    #[test]
    fn test_unknown_group_is_not_converted() {
        let record = Record::new(1, UnitSystem::Us).with("radiation", 420.0);
        let payload = transform(
            &record,
            UnitSystem::MetricWx,
            &BTreeMap::new(),
            &["radiation".to_string()],
            &units::default_unit_groups(),
        );
        assert_eq!(payload.get("radiation"), Some(&json!(420.0)));
    }

    #[test]
    fn test_non_finite_value_becomes_null() {
        let record = Record::new(1, UnitSystem::MetricWx).with("outTemp", f64::NAN);
        let payload = weather_transformer().transform(&record);
        assert_eq!(payload.get("outside_temperature"), Some(&Value::Null));
    }
}
