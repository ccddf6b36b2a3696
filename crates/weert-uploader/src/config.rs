// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Uploader configuration.
//!
//! Loaded from YAML. Every field has a default, so a file naming only the
//! destination stream is a complete configuration:
//!
//! ```yaml
//! stream_name: backyard
//! server_url: http://weert.local:3000
//! ```

use crate::publisher::PublishPolicy;
use crate::resolver::StreamMetadata;
use crate::transform::{TransformConfig, TIMESTAMP_FIELD};
use crate::units::{self, UnitGroup, UnitSystem};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where packets should go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// A stream the server already knows by identifier.
    Id(String),
    /// A logical stream name, looked up (or created) on the server.
    Name(String),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Id(id) => write!(f, "stream id '{}'", id),
            Destination::Name(name) => write!(f, "stream name '{}'", name),
        }
    }
}

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Identifier of an existing stream.
    #[serde(default)]
    pub stream_id: Option<String>,

    /// Stream name to look up or create.
    #[serde(default)]
    pub stream_name: Option<String>,

    /// Base URL of the server API.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path of the stream collection below `server_url`.
    #[serde(default = "default_streams_path")]
    pub streams_path: String,

    /// Observations to forward, in payload order.
    #[serde(default = "default_obs_types")]
    pub obs_types: Vec<String>,

    /// Observation name to payload key.
    #[serde(default = "default_field_map")]
    pub field_map: BTreeMap<String, String>,

    /// Extra observation to unit-group entries, merged over the built-in table.
    #[serde(default)]
    pub unit_groups: BTreeMap<String, UnitGroup>,

    /// Unit system of the uploaded values.
    #[serde(default = "default_target_units")]
    pub target_units: UnitSystem,

    /// Maximum number of queued records.
    #[serde(default = "default_max_backlog")]
    pub max_backlog: usize,

    /// Records older than this many seconds are dropped. `null` disables.
    #[serde(default = "default_stale")]
    pub stale: Option<u64>,

    #[serde(default = "default_true")]
    pub log_success: bool,

    #[serde(default = "default_true")]
    pub log_failure: bool,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Publish attempts per record.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Pause between attempts (seconds).
    #[serde(default = "default_retry_wait")]
    pub retry_wait: u64,

    /// HTTP status meaning "accepted".
    #[serde(default = "default_success_code")]
    pub success_code: u16,

    /// Body line prefix marking a logical rejection.
    #[serde(default = "default_error_marker")]
    pub error_marker: String,

    /// Wrap payloads as `{ <envelope>: payload }`.
    #[serde(default)]
    pub envelope: Option<String>,

    /// Description sent when a stream is created.
    #[serde(default = "default_stream_description")]
    pub stream_description: String,

    /// Unit group sent when a stream is created.
    #[serde(default = "default_unit_group")]
    pub unit_group: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_streams_path() -> String {
    "api/v1/streams".to_string()
}

const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("outTemp", "outside_temperature"),
    ("dewpoint", "dewpoint_temperature"),
    ("inTemp", "inside_temperature"),
    ("outHumidity", "outside_humidity"),
    ("barometer", "barometer_pressure"),
    ("windSpeed", "wind_speed"),
    ("windDir", "wind_direction"),
    ("dayRain", "day_rain"),
];

fn default_obs_types() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|(obs, _)| obs.to_string()).collect()
}

fn default_field_map() -> BTreeMap<String, String> {
    DEFAULT_FIELDS
        .iter()
        .map(|(obs, key)| (obs.to_string(), key.to_string()))
        .collect()
}

fn default_target_units() -> UnitSystem {
    UnitSystem::MetricWx
}

fn default_max_backlog() -> usize {
    1000
}

fn default_stale() -> Option<u64> {
    Some(60)
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    5
}

fn default_max_tries() -> u32 {
    1
}

fn default_retry_wait() -> u64 {
    5
}

fn default_success_code() -> u16 {
    201
}

fn default_error_marker() -> String {
    "Error".to_string()
}

fn default_stream_description() -> String {
    "Stream for weewx".to_string()
}

fn default_unit_group() -> String {
    "METRICWX".to_string()
}

fn default_user_agent() -> String {
    format!("weert-uploader/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            stream_id: None,
            stream_name: None,
            server_url: default_server_url(),
            streams_path: default_streams_path(),
            obs_types: default_obs_types(),
            field_map: default_field_map(),
            unit_groups: BTreeMap::new(),
            target_units: default_target_units(),
            max_backlog: default_max_backlog(),
            stale: default_stale(),
            log_success: true,
            log_failure: true,
            timeout: default_timeout(),
            max_tries: default_max_tries(),
            retry_wait: default_retry_wait(),
            success_code: default_success_code(),
            error_marker: default_error_marker(),
            envelope: None,
            stream_description: default_stream_description(),
            unit_group: default_unit_group(),
            user_agent: default_user_agent(),
        }
    }
}

impl UploaderConfig {
    /// Configuration for a named stream on `server_url`.
    pub fn for_stream_name(server_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            stream_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Configuration for a known stream identifier on `server_url`.
    pub fn for_stream_id(server_url: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            stream_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Parse a YAML document. Does not validate.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a YAML file without validating it, so callers can layer
    /// overrides first.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load and validate a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination().is_none() {
            return Err(ConfigError::Invalid(
                "Either stream_id or stream_name must be set".into(),
            ));
        }
        if self.max_tries == 0 {
            return Err(ConfigError::Invalid("max_tries must be at least 1".into()));
        }
        if self.max_backlog == 0 {
            return Err(ConfigError::Invalid("max_backlog must be at least 1".into()));
        }
        if self.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".into()));
        }
        self.streams_url()?;

        let mut seen_obs = HashSet::new();
        let mut seen_keys: BTreeMap<&str, &str> = BTreeMap::new();
        for obs in &self.obs_types {
            if !seen_obs.insert(obs.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Observation '{}' is listed twice in obs_types",
                    obs
                )));
            }
            let key = self.field_map.get(obs).map(String::as_str).unwrap_or(obs);
            if key == TIMESTAMP_FIELD {
                return Err(ConfigError::Invalid(format!(
                    "Observation '{}' maps to the reserved key '{}'",
                    obs, TIMESTAMP_FIELD
                )));
            }
            if let Some(previous) = seen_keys.insert(key, obs) {
                return Err(ConfigError::Invalid(format!(
                    "Observations '{}' and '{}' both map to payload key '{}'",
                    previous, obs, key
                )));
            }
        }

        Ok(())
    }

    /// Resolution key. A stream id takes precedence over a stream name.
    ///
    /// Blank values count as absent; others are used exactly as given.
    pub fn destination(&self) -> Option<Destination> {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        non_empty(&self.stream_id)
            .map(Destination::Id)
            .or_else(|| non_empty(&self.stream_name).map(Destination::Name))
    }

    /// URL of the stream collection.
    pub fn streams_url(&self) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.streams_path.trim_matches('/')
        );
        Url::parse(&raw)
            .map_err(|e| ConfigError::Invalid(format!("Invalid server_url '{}': {}", raw, e)))
    }

    /// Staleness limit, if enabled.
    pub fn stale_limit(&self) -> Option<Duration> {
        self.stale.map(Duration::from_secs)
    }

    pub fn transform_config(&self) -> TransformConfig {
        let mut unit_groups = units::default_unit_groups();
        unit_groups.extend(self.unit_groups.iter().map(|(k, v)| (k.clone(), *v)));
        TransformConfig {
            target: self.target_units,
            selected: self.obs_types.clone(),
            field_map: self.field_map.clone(),
            unit_groups,
        }
    }

    pub fn publish_policy(&self) -> PublishPolicy {
        PublishPolicy {
            timeout: Duration::from_secs(self.timeout),
            max_tries: self.max_tries,
            retry_wait: Duration::from_secs(self.retry_wait),
            success_code: self.success_code,
            error_marker: self.error_marker.clone(),
            envelope: self.envelope.clone(),
            log_success: self.log_success,
            log_failure: self.log_failure,
        }
    }

    pub fn stream_metadata(&self) -> StreamMetadata {
        StreamMetadata {
            description: self.stream_description.clone(),
            unit_group: self.unit_group.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = UploaderConfig::from_yaml("stream_name: wx-1\n").expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.destination(), Some(Destination::Name("wx-1".into())));
        assert_eq!(config.server_url, "http://localhost:3000");
        assert_eq!(config.max_backlog, 1000);
        assert_eq!(config.stale, Some(60));
        assert_eq!(config.max_tries, 1);
        assert_eq!(config.success_code, 201);
        assert_eq!(config.target_units, UnitSystem::MetricWx);
        assert_eq!(config.obs_types.len(), 8);
        assert_eq!(
            config.field_map.get("outTemp").map(String::as_str),
            Some("outside_temperature")
        );
        assert!(config.user_agent.starts_with("weert-uploader/"));
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
stream_id: abc123
server_url: "http://weert.example:8080/"
streams_path: /api/v2/streams/
obs_types: [outTemp, rainRate]
field_map:
  outTemp: temperature
unit_groups:
  leafTemp1: temperature
target_units: US
max_backlog: 10
stale: null
timeout: 2
max_tries: 3
retry_wait: 1
success_code: 200
envelope: packet
"#;
        let config = UploaderConfig::from_yaml(yaml).expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.destination(), Some(Destination::Id("abc123".into())));
        assert_eq!(config.stale, None);
        assert_eq!(config.stale_limit(), None);
        assert_eq!(config.target_units, UnitSystem::Us);
        assert_eq!(
            config.streams_url().expect("url").as_str(),
            "http://weert.example:8080/api/v2/streams"
        );

        let policy = config.publish_policy();
        assert_eq!(policy.max_tries, 3);
        assert_eq!(policy.retry_wait, Duration::from_secs(1));
        assert_eq!(policy.success_code, 200);
        assert_eq!(policy.envelope.as_deref(), Some("packet"));

        let transform = config.transform_config();
        assert_eq!(transform.selected, vec!["outTemp", "rainRate"]);
        assert_eq!(
            transform.unit_groups.get("leafTemp1"),
            Some(&UnitGroup::Temperature)
        );
        assert!(transform.unit_groups.contains_key("outTemp"));
    }

    #[test]
    fn test_id_takes_precedence_over_name() {
        let mut config = UploaderConfig::for_stream_name("http://localhost:3000", "wx-1");
        config.stream_id = Some("s42".into());
        assert_eq!(config.destination(), Some(Destination::Id("s42".into())));
    }

    #[test]
    fn test_destination_is_not_trimmed() {
        let config = UploaderConfig::for_stream_name("http://localhost:3000", " wx-1");
        assert_eq!(config.destination(), Some(Destination::Name(" wx-1".into())));

        let config = UploaderConfig::for_stream_id("http://localhost:3000", "s1 ");
        assert_eq!(config.destination(), Some(Destination::Id("s1 ".into())));
    }

    #[test]
    fn test_load_file_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "server_url: http://weert.local:3000\nmax_tries: 2").expect("write");

        let config = UploaderConfig::load_file(file.path()).expect("load");
        assert_eq!(config.max_tries, 2);
        assert!(config.destination().is_none());
        assert!(UploaderConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_blank_destination_is_rejected() {
        let mut config = UploaderConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.stream_name = Some("   ".into());
        assert!(config.destination().is_none());
        assert!(config.validate().is_err());

        config.stream_id = Some("s1".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_numeric_limits_are_validated() {
        let base = UploaderConfig::for_stream_id("http://localhost:3000", "s1");

        let config = UploaderConfig {
            max_tries: 0,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = UploaderConfig {
            max_backlog: 0,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = UploaderConfig {
            timeout: 0,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = UploaderConfig {
            server_url: "not a url".into(),
            ..base
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payload_key_collisions_are_rejected() {
        let base = UploaderConfig::for_stream_id("http://localhost:3000", "s1");

        let config = UploaderConfig {
            obs_types: vec!["outTemp".into(), "outTemp".into()],
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let mut field_map = BTreeMap::new();
        field_map.insert("outTemp".to_string(), "temperature".to_string());
        field_map.insert("inTemp".to_string(), "temperature".to_string());
        let config = UploaderConfig {
            obs_types: vec!["outTemp".into(), "inTemp".into()],
            field_map,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let mut field_map = BTreeMap::new();
        field_map.insert("outTemp".to_string(), "timestamp".to_string());
        let config = UploaderConfig {
            obs_types: vec!["outTemp".into()],
            field_map,
            ..base
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_unit_system_fails_to_parse() {
        let result = UploaderConfig::from_yaml("stream_id: s1\ntarget_units: IMPERIAL\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "stream_name: backyard\nmax_backlog: 5").expect("write");
        let config = UploaderConfig::from_file(file.path()).expect("load");
        assert_eq!(config.max_backlog, 5);

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "max_backlog: 5").expect("write");
        assert!(matches!(
            UploaderConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            UploaderConfig::from_file("/nonexistent/weert.yaml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip_keeps_settings() {
        let config = UploaderConfig::for_stream_name("http://localhost:3000", "wx-1");
        let yaml = config.to_yaml().expect("serialize");
        let parsed = UploaderConfig::from_yaml(&yaml).expect("parse");
        assert_eq!(parsed.destination(), config.destination());
        assert_eq!(parsed.obs_types, config.obs_types);
        assert_eq!(parsed.stale, config.stale);
    }
}
