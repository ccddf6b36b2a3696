// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Unit systems and conversions for weather observations.
//!
//! Every observation belongs to a [`UnitGroup`]; each group has one unit per
//! [`UnitSystem`]:
//!
//! ```text
//! group        US        METRIC    METRICWX
//! temperature  degF      degC      degC
//! pressure     inHg      mbar      mbar
//! speed        mph       km/h      m/s
//! rain         in        cm        mm
//! rain rate    in/h      cm/h      mm/h
//! altitude     ft        m         m
//! percent      %         %         %
//! direction    deg       deg       deg
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unit system a record's values are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSystem {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "METRIC")]
    Metric,
    #[serde(rename = "METRICWX")]
    MetricWx,
}

impl UnitSystem {
    /// Map a station packet's `usUnits` code to a unit system.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0x01 => Some(Self::Us),
            0x10 => Some(Self::Metric),
            0x11 => Some(Self::MetricWx),
            _ => None,
        }
    }

    /// The station packet code for this unit system.
    pub fn code(self) -> i64 {
        match self {
            Self::Us => 0x01,
            Self::Metric => 0x10,
            Self::MetricWx => 0x11,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Us => write!(f, "US"),
            Self::Metric => write!(f, "METRIC"),
            Self::MetricWx => write!(f, "METRICWX"),
        }
    }
}

/// Physical quantity an observation measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitGroup {
    Temperature,
    Pressure,
    Speed,
    Rain,
    RainRate,
    Altitude,
    Percent,
    Direction,
}

/// Concrete unit of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    DegreeF,
    DegreeC,
    InchHg,
    Mbar,
    MilePerHour,
    KmPerHour,
    MeterPerSecond,
    Inch,
    Cm,
    Mm,
    InchPerHour,
    CmPerHour,
    MmPerHour,
    Foot,
    Meter,
    Percent,
    Degree,
}

impl Unit {
    /// Unit used for `group` in `system`.
    pub fn of(group: UnitGroup, system: UnitSystem) -> Self {
        use UnitSystem::*;
        match (group, system) {
            (UnitGroup::Temperature, Us) => Unit::DegreeF,
            (UnitGroup::Temperature, Metric | MetricWx) => Unit::DegreeC,
            (UnitGroup::Pressure, Us) => Unit::InchHg,
            (UnitGroup::Pressure, Metric | MetricWx) => Unit::Mbar,
            (UnitGroup::Speed, Us) => Unit::MilePerHour,
            (UnitGroup::Speed, Metric) => Unit::KmPerHour,
            (UnitGroup::Speed, MetricWx) => Unit::MeterPerSecond,
            (UnitGroup::Rain, Us) => Unit::Inch,
            (UnitGroup::Rain, Metric) => Unit::Cm,
            (UnitGroup::Rain, MetricWx) => Unit::Mm,
            (UnitGroup::RainRate, Us) => Unit::InchPerHour,
            (UnitGroup::RainRate, Metric) => Unit::CmPerHour,
            (UnitGroup::RainRate, MetricWx) => Unit::MmPerHour,
            (UnitGroup::Altitude, Us) => Unit::Foot,
            (UnitGroup::Altitude, Metric | MetricWx) => Unit::Meter,
            (UnitGroup::Percent, _) => Unit::Percent,
            (UnitGroup::Direction, _) => Unit::Degree,
        }
    }

    /// Express `value` in the group's base unit (degC, mbar, m/s, mm, mm/h, m).
    fn to_base(self, value: f64) -> f64 {
        match self {
            Unit::DegreeF => (value - 32.0) * 5.0 / 9.0,
            Unit::InchHg => value * 33.863_886_666_7,
            Unit::MilePerHour => value * 0.447_04,
            Unit::KmPerHour => value / 3.6,
            Unit::Inch | Unit::InchPerHour => value * 25.4,
            Unit::Cm | Unit::CmPerHour => value * 10.0,
            Unit::Foot => value * 0.3048,
            Unit::DegreeC
            | Unit::Mbar
            | Unit::MeterPerSecond
            | Unit::Mm
            | Unit::MmPerHour
            | Unit::Meter
            | Unit::Percent
            | Unit::Degree => value,
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Unit::DegreeF => value * 9.0 / 5.0 + 32.0,
            Unit::InchHg => value / 33.863_886_666_7,
            Unit::MilePerHour => value / 0.447_04,
            Unit::KmPerHour => value * 3.6,
            Unit::Inch | Unit::InchPerHour => value / 25.4,
            Unit::Cm | Unit::CmPerHour => value / 10.0,
            Unit::Foot => value / 0.3048,
            Unit::DegreeC
            | Unit::Mbar
            | Unit::MeterPerSecond
            | Unit::Mm
            | Unit::MmPerHour
            | Unit::Meter
            | Unit::Percent
            | Unit::Degree => value,
        }
    }
}

/// Convert `value` of `group` from one unit system to another.
pub fn convert(value: f64, group: UnitGroup, from: UnitSystem, to: UnitSystem) -> f64 {
    if from == to {
        return value;
    }
    let from_unit = Unit::of(group, from);
    let to_unit = Unit::of(group, to);
    if from_unit == to_unit {
        return value;
    }
    to_unit.from_base(from_unit.to_base(value))
}

/// Observation name to unit group lookup.
pub type UnitGroupTable = BTreeMap<String, UnitGroup>;

/// Built-in table for the common weather-station observations.
pub fn default_unit_groups() -> UnitGroupTable {
    let entries: &[(&str, UnitGroup)] = &[
        ("outTemp", UnitGroup::Temperature),
        ("inTemp", UnitGroup::Temperature),
        ("dewpoint", UnitGroup::Temperature),
        ("windchill", UnitGroup::Temperature),
        ("heatindex", UnitGroup::Temperature),
        ("appTemp", UnitGroup::Temperature),
        ("extraTemp1", UnitGroup::Temperature),
        ("extraTemp2", UnitGroup::Temperature),
        ("barometer", UnitGroup::Pressure),
        ("pressure", UnitGroup::Pressure),
        ("altimeter", UnitGroup::Pressure),
        ("windSpeed", UnitGroup::Speed),
        ("windGust", UnitGroup::Speed),
        ("windDir", UnitGroup::Direction),
        ("windGustDir", UnitGroup::Direction),
        ("rain", UnitGroup::Rain),
        ("hourRain", UnitGroup::Rain),
        ("dayRain", UnitGroup::Rain),
        ("rain24", UnitGroup::Rain),
        ("monthRain", UnitGroup::Rain),
        ("yearRain", UnitGroup::Rain),
        ("stormRain", UnitGroup::Rain),
        ("rainRate", UnitGroup::RainRate),
        ("outHumidity", UnitGroup::Percent),
        ("inHumidity", UnitGroup::Percent),
        ("altitude", UnitGroup::Altitude),
    ];
    entries
        .iter()
        .map(|(name, group)| (name.to_string(), *group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_unit_system_codes() {
        assert_eq!(UnitSystem::from_code(1), Some(UnitSystem::Us));
        assert_eq!(UnitSystem::from_code(16), Some(UnitSystem::Metric));
        assert_eq!(UnitSystem::from_code(17), Some(UnitSystem::MetricWx));
        assert_eq!(UnitSystem::from_code(2), None);
        assert_eq!(UnitSystem::MetricWx.code(), 17);
    }

    #[test]
    fn test_temperature_conversion() {
        let c = convert(212.0, UnitGroup::Temperature, UnitSystem::Us, UnitSystem::MetricWx);
        assert!(close(c, 100.0));
        let f = convert(-40.0, UnitGroup::Temperature, UnitSystem::Metric, UnitSystem::Us);
        assert!(close(f, -40.0));
    }

    #[test]
    fn test_speed_conversion_between_metric_flavors() {
        let ms = convert(36.0, UnitGroup::Speed, UnitSystem::Metric, UnitSystem::MetricWx);
        assert!(close(ms, 10.0));
        let mph = convert(10.0, UnitGroup::Speed, UnitSystem::MetricWx, UnitSystem::Us);
        assert!(close(mph, 22.369_362_920_544));
    }

    #[test]
    fn test_rain_and_pressure_conversion() {
        let mm = convert(1.0, UnitGroup::Rain, UnitSystem::Us, UnitSystem::MetricWx);
        assert!(close(mm, 25.4));
        let cm = convert(25.4, UnitGroup::Rain, UnitSystem::MetricWx, UnitSystem::Metric);
        assert!(close(cm, 2.54));
        let mbar = convert(30.0, UnitGroup::Pressure, UnitSystem::Us, UnitSystem::Metric);
        assert!(close(mbar, 1015.916_6));
    }

    #[test]
    fn test_unitless_groups_pass_through() {
        assert_eq!(
            convert(270.0, UnitGroup::Direction, UnitSystem::Us, UnitSystem::MetricWx),
            270.0
        );
        assert_eq!(
            convert(55.0, UnitGroup::Percent, UnitSystem::Metric, UnitSystem::Us),
            55.0
        );
    }

    #[test]
    fn test_default_table_covers_forwarded_observations() {
        let table = default_unit_groups();
        assert_eq!(table.get("outTemp"), Some(&UnitGroup::Temperature));
        assert_eq!(table.get("barometer"), Some(&UnitGroup::Pressure));
        assert_eq!(table.get("dayRain"), Some(&UnitGroup::Rain));
        assert_eq!(table.get("windDir"), Some(&UnitGroup::Direction));
        assert!(table.get("radiation").is_none());
    }
}
