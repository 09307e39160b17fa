//! Configuration loading using Figment
//!
//! Instruments and their local-holder parameters can be declared in TOML.
//! Configuration is loaded from:
//! 1. `config/daq_params.toml` (base configuration)
//! 2. Environment variables (prefixed with `DAQ_PARAMS_`, nested keys
//!    separated by `__`)
//!
//! # Example
//! ```no_run
//! use daq_params::config::DaqParamsConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DaqParamsConfig::load()?;
//! config.validate()?;
//! for instrument in config.build_instruments()? {
//!     println!("{}: {} parameters", instrument.name(), instrument.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ```toml
//! [application]
//! name = "bench"
//! log_level = "info"
//!
//! [[instruments]]
//! name = "dummy_holder"
//!
//! [[instruments.parameters]]
//! name = "mode"
//! initial_value = "foo"
//! validator = { type = "enum", values = ["foo", "bar"] }
//!
//! [[instruments.parameters]]
//! name = "gate"
//! val_mapping = [{ value = "foo", raw = "something" }, { raw = "nothing" }]
//! ```
//!
//! A mapping entry without `value` maps logical None (`null`).

use chrono::Duration;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ParamResult, ParameterError};
use crate::instrument::Instrument;
use crate::parameter::{Parameter, ParameterBuilder};
use crate::parsers::ParserKind;
use crate::pipeline::ValueMapping;
use crate::validators::{Enum, Ints, Numbers, Strings};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaqParamsConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Instrument definitions
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// One instrument and its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Unique instrument name
    pub name: String,
    /// Parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

/// Declarative parameter definition
///
/// Parameters built from configuration have no device hooks; they are local
/// value holders whose cache is the device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Name, unique within the instrument
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: Option<String>,
    /// Physical unit
    #[serde(default)]
    pub unit: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Value seeded into the cache at build time
    #[serde(default)]
    pub initial_value: Option<Value>,
    /// Validator to apply to user values
    #[serde(default)]
    pub validator: Option<ValidatorConfig>,
    /// Value mapping entries
    #[serde(default)]
    pub val_mapping: Vec<MappingEntry>,
    /// Conversion applied before the device
    #[serde(default)]
    pub set_parser: Option<ParserKind>,
    /// Conversion applied after the device
    #[serde(default)]
    pub get_parser: Option<ParserKind>,
    /// Build with `settable` disabled
    #[serde(default)]
    pub read_only: bool,
    /// Cached values older than this many seconds are re-read
    #[serde(default)]
    pub max_val_age_secs: Option<f64>,
}

/// One row of a value mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// User-facing value; omitted means `null`
    #[serde(default)]
    pub value: Value,
    /// Raw device value
    pub raw: Value,
}

/// Validator selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorConfig {
    /// Membership in `values`
    Enum {
        /// Allowed values
        values: Vec<Value>,
    },
    /// Real numbers in `[min, max]`
    Numbers {
        /// Lower bound, unbounded if omitted
        #[serde(default)]
        min: Option<f64>,
        /// Upper bound, unbounded if omitted
        #[serde(default)]
        max: Option<f64>,
    },
    /// Integers in `[min, max]`
    Ints {
        /// Lower bound, unbounded if omitted
        #[serde(default)]
        min: Option<i64>,
        /// Upper bound, unbounded if omitted
        #[serde(default)]
        max: Option<i64>,
    },
    /// Strings with length in `[min_length, max_length]`
    Strings {
        /// Minimum length, 0 if omitted
        #[serde(default)]
        min_length: Option<usize>,
        /// Maximum length, unbounded if omitted
        #[serde(default)]
        max_length: Option<usize>,
    },
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaqParamsConfig {
    /// Load configuration from config/daq_params.toml and environment variables
    ///
    /// Environment variables override the file with prefix DAQ_PARAMS_.
    /// Example: DAQ_PARAMS_APPLICATION__LOG_LEVEL=debug
    pub fn load() -> ParamResult<Self> {
        Self::load_from("config/daq_params.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> ParamResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DAQ_PARAMS_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> ParamResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ParameterError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        let mut names = HashSet::new();
        for instrument in &self.instruments {
            if !names.insert(&instrument.name) {
                return Err(ParameterError::Configuration(format!(
                    "Duplicate instrument name: {}",
                    instrument.name
                )));
            }
            instrument.validate()?;
        }

        Ok(())
    }

    /// Build every configured instrument
    pub fn build_instruments(&self) -> ParamResult<Vec<Instrument>> {
        self.instruments.iter().map(InstrumentConfig::build).collect()
    }
}

impl InstrumentConfig {
    /// Check parameter names and definitions
    pub fn validate(&self) -> ParamResult<()> {
        let mut names = HashSet::new();
        for param in &self.parameters {
            if !names.insert(&param.name) {
                return Err(ParameterError::Configuration(format!(
                    "Duplicate parameter '{}' on instrument '{}'",
                    param.name, self.name
                )));
            }
            param.validate().map_err(|msg| {
                ParameterError::Configuration(format!("{}_{}: {}", self.name, param.name, msg))
            })?;
        }
        Ok(())
    }

    /// Create the instrument with all of its parameters
    pub fn build(&self) -> ParamResult<Instrument> {
        self.validate()?;
        let mut instrument = Instrument::new(self.name.clone());
        for param in &self.parameters {
            instrument.add_parameter(param.builder())?;
        }
        Ok(instrument)
    }
}

fn age_from_secs(secs: f64) -> Option<Duration> {
    let millis = secs * 1000.0;
    if !millis.is_finite() || millis < 0.0 || millis >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

impl ParameterConfig {
    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("parameter name cannot be empty".to_string());
        }

        let mut keys = Vec::new();
        for entry in &self.val_mapping {
            if keys.contains(&&entry.value) {
                return Err(format!("duplicate val_mapping value {}", entry.value));
            }
            keys.push(&entry.value);
        }

        if let Some(secs) = self.max_val_age_secs {
            if age_from_secs(secs).is_none() {
                return Err(format!(
                    "max_val_age_secs must be a non-negative duration, got {}",
                    secs
                ));
            }
        }

        match &self.validator {
            Some(ValidatorConfig::Enum { values }) if values.is_empty() => {
                Err("enum validator needs at least one value".to_string())
            }
            Some(ValidatorConfig::Numbers {
                min: Some(min),
                max: Some(max),
            }) if min > max => Err(format!("numbers validator min {} > max {}", min, max)),
            Some(ValidatorConfig::Ints {
                min: Some(min),
                max: Some(max),
            }) if min > max => Err(format!("ints validator min {} > max {}", min, max)),
            Some(ValidatorConfig::Strings {
                min_length: Some(min),
                max_length: Some(max),
            }) if min > max => Err(format!(
                "strings validator min_length {} > max_length {}",
                min, max
            )),
            _ => Ok(()),
        }
    }

    /// Translate into a parameter builder
    pub fn builder(&self) -> ParameterBuilder {
        let mut builder = Parameter::builder(self.name.clone());

        if let Some(label) = &self.label {
            builder = builder.label(label.clone());
        }
        if let Some(unit) = &self.unit {
            builder = builder.unit(unit.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }

        builder = match &self.validator {
            Some(ValidatorConfig::Enum { values }) => builder.validator(Enum::new(values.clone())),
            Some(ValidatorConfig::Numbers { min, max }) => builder.validator(Numbers::new(
                min.unwrap_or(f64::MIN),
                max.unwrap_or(f64::MAX),
            )),
            Some(ValidatorConfig::Ints { min, max }) => builder.validator(Ints::new(
                min.unwrap_or(i64::MIN),
                max.unwrap_or(i64::MAX),
            )),
            Some(ValidatorConfig::Strings {
                min_length,
                max_length,
            }) => builder.validator(Strings::new(
                min_length.unwrap_or(0),
                max_length.unwrap_or(usize::MAX),
            )),
            None => builder,
        };

        if !self.val_mapping.is_empty() {
            builder = builder.val_mapping(ValueMapping::new(
                self.val_mapping
                    .iter()
                    .map(|entry| (entry.value.clone(), entry.raw.clone())),
            ));
        }
        if let Some(kind) = self.set_parser {
            builder = builder.set_parser(kind.parser());
        }
        if let Some(kind) = self.get_parser {
            builder = builder.get_parser(kind.parser());
        }
        // Out-of-range ages are rejected by `validate`.
        if let Some(age) = self.max_val_age_secs.and_then(age_from_secs) {
            builder = builder.max_val_age(age);
        }
        if let Some(value) = &self.initial_value {
            builder = builder.initial_value(value.clone());
        }
        if self.read_only {
            builder = builder.read_only();
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config() -> DaqParamsConfig {
        DaqParamsConfig {
            application: ApplicationConfig {
                name: "Test".to_string(),
                log_level: "info".to_string(),
            },
            instruments: vec![],
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = base_config();
        config.application.log_level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level 'loud'"));
    }

    #[test]
    fn test_duplicate_instrument_names() {
        let mut config = base_config();
        for _ in 0..2 {
            config.instruments.push(InstrumentConfig {
                name: "dmm".to_string(),
                parameters: vec![],
            });
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let mut config = base_config();
        config.instruments.push(InstrumentConfig {
            name: "dmm".to_string(),
            parameters: vec![
                ParameterConfig {
                    name: "volt".to_string(),
                    ..Default::default()
                },
                ParameterConfig {
                    name: "volt".to_string(),
                    ..Default::default()
                },
            ],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate parameter 'volt'"));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let param = ParameterConfig {
            name: "v".to_string(),
            validator: Some(ValidatorConfig::Numbers {
                min: Some(10.0),
                max: Some(0.0),
            }),
            ..Default::default()
        };
        assert!(param.validate().is_err());

        let param = ParameterConfig {
            name: "mode".to_string(),
            validator: Some(ValidatorConfig::Enum { values: vec![] }),
            ..Default::default()
        };
        assert!(param.validate().is_err());
    }

    #[test]
    fn test_max_val_age_range() {
        assert_eq!(age_from_secs(1.5), Some(Duration::milliseconds(1500)));
        assert_eq!(age_from_secs(-1.0), None);
        assert_eq!(age_from_secs(f64::NAN), None);
        assert_eq!(age_from_secs(1e300), None);

        let param = ParameterConfig {
            name: "averages".to_string(),
            max_val_age_secs: Some(-1e300),
            ..Default::default()
        };
        assert!(param.validate().is_err());
        assert_eq!(param.builder().build().unwrap().cache().max_val_age(), None);
    }

    #[test]
    fn test_duplicate_mapping_keys_rejected() {
        let param = ParameterConfig {
            name: "gate".to_string(),
            val_mapping: vec![
                MappingEntry {
                    value: Value::Null,
                    raw: json!("nothing"),
                },
                MappingEntry {
                    value: Value::Null,
                    raw: json!("none"),
                },
            ],
            ..Default::default()
        };
        assert!(param.validate().is_err());
    }

    #[test]
    fn test_builder_from_config() {
        let param = ParameterConfig {
            name: "gate".to_string(),
            unit: Some("V".to_string()),
            initial_value: Some(json!("foo")),
            val_mapping: vec![
                MappingEntry {
                    value: json!("foo"),
                    raw: json!("something"),
                },
                MappingEntry {
                    value: Value::Null,
                    raw: json!("nothing"),
                },
            ],
            ..Default::default()
        }
        .builder()
        .build()
        .unwrap();

        assert_eq!(param.unit(), Some("V"));
        assert_eq!(param.get_latest(), json!("foo"));
        assert_eq!(param.cache().raw_value(), json!("something"));
    }

    #[test]
    fn test_validator_config_serde_tag() {
        let parsed: ValidatorConfig =
            serde_json::from_value(json!({"type": "ints", "min": 0, "max": 3})).unwrap();
        assert_eq!(
            parsed,
            ValidatorConfig::Ints {
                min: Some(0),
                max: Some(3)
            }
        );
    }
}
