// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Measurement records produced by the host.

use crate::units::UnitSystem;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors building a record from a station packet.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("packet is not a JSON object")]
    NotAnObject,

    #[error("packet has no integer 'dateTime'")]
    MissingTimestamp,

    #[error("packet has no 'usUnits'")]
    MissingUnitSystem,

    #[error("unknown unit system code {0}")]
    UnknownUnitSystem(i64),
}

/// A timestamped set of observations in one unit system.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Unit system of `values`.
    pub unit_system: UnitSystem,
    /// Observation name to value. Absent observations have no entry.
    pub values: BTreeMap<String, f64>,
}

impl Record {
    /// Create an empty record.
    pub fn new(timestamp: i64, unit_system: UnitSystem) -> Self {
        Self {
            timestamp,
            unit_system,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style observation setter.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Look up an observation.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Build a record from a station packet such as
    /// `{"dateTime": 1455000000, "usUnits": 1, "outTemp": 41.2, "rain": null}`.
    ///
    /// Numeric members other than `dateTime`/`usUnits` become observations.
    /// `null` members count as absent; non-numeric members are ignored.
    pub fn from_packet_json(packet: &serde_json::Value) -> Result<Self, RecordError> {
        let object = packet.as_object().ok_or(RecordError::NotAnObject)?;

        let timestamp = object
            .get("dateTime")
            .and_then(|v| v.as_i64())
            .ok_or(RecordError::MissingTimestamp)?;

        let code = object
            .get("usUnits")
            .and_then(|v| v.as_i64())
            .ok_or(RecordError::MissingUnitSystem)?;
        let unit_system =
            UnitSystem::from_code(code).ok_or(RecordError::UnknownUnitSystem(code))?;

        let values = object
            .iter()
            .filter(|(k, _)| k.as_str() != "dateTime" && k.as_str() != "usUnits")
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect();

        Ok(Self {
            timestamp,
            unit_system,
            values,
        })
    }
}
