//! Error types for parameter access.
//!
//! Every fallible operation in this crate returns [`ParameterError`]. Using
//! the `thiserror` crate, it gives a single, consistent error surface for the
//! value pipeline, the device hooks and the instrument container.
//!
//! ## Error Hierarchy
//!
//! - **`NotSettable` / `NotGettable`**: capability errors. A `set` was issued while
//!   the parameter is read-only or frozen by a `set_to` scope, or a `get` was
//!   issued on a write-only parameter.
//! - **`Validation`**: the configured validator rejected a user-facing value.
//! - **`Mapping`**: a value (or raw value) is missing from the parameter's
//!   bidirectional value mapping.
//! - **`NotCaptured`**: a device parameter without a get hook was read before its
//!   first successful `set`, so there is nothing to return.
//! - **`Parse`**: a set or get parser refused its input.
//! - **`Device`**: a device hook failed. The hook's `anyhow::Error` is kept as the
//!   source.
//! - **`UnknownParameter` / `DuplicateParameter`**: instrument lookup errors.
//! - **`Config` / `Configuration`**: configuration loading and semantic validation.
//!
//! Errors are never retried by this crate. Retry policy, if any, belongs to the
//! device hook.

use serde_json::Value;
use thiserror::Error;

/// Convenience alias for results using the parameter error type.
pub type ParamResult<T> = std::result::Result<T, ParameterError>;

/// Direction of a failed value-mapping lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingDirection {
    /// User value to raw value.
    ToRaw,
    /// Raw value back to user value.
    FromRaw,
}

impl std::fmt::Display for MappingDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MappingDirection::ToRaw => "value",
            MappingDirection::FromRaw => "raw value",
        };
        write!(f, "{}", label)
    }
}

/// Coarse classification of a [`ParameterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation not permitted by the parameter's current capabilities.
    Capability,
    /// Value rejected by a validator.
    Validation,
    /// Value missing from a value mapping.
    Mapping,
    /// Nothing captured yet and no way to read the device.
    NotCaptured,
    /// Parser failure.
    Parse,
    /// Device hook failure.
    Device,
    /// Instrument lookup failure.
    Lookup,
    /// Configuration loading or validation failure.
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Capability => "capability",
            ErrorKind::Validation => "validation",
            ErrorKind::Mapping => "mapping",
            ErrorKind::NotCaptured => "not_captured",
            ErrorKind::Parse => "parse",
            ErrorKind::Device => "device",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", label)
    }
}

/// Primary error type for parameter access.
#[derive(Error, Debug)]
pub enum ParameterError {
    /// `set` on a read-only or frozen parameter.
    #[error("Parameter '{name}' is not settable")]
    NotSettable {
        /// Full parameter name.
        name: String,
    },

    /// `get` on a write-only parameter.
    #[error("Parameter '{name}' is not gettable")]
    NotGettable {
        /// Full parameter name.
        name: String,
    },

    /// The validator rejected a user value.
    #[error("Invalid value for parameter '{name}': {message}")]
    Validation {
        /// Full parameter name.
        name: String,
        /// Validator's reason.
        message: String,
    },

    /// No value-mapping entry for the value.
    #[error("Parameter '{name}': {direction} {value} is not in the value mapping")]
    Mapping {
        /// Full parameter name.
        name: String,
        /// The value that was looked up.
        value: Value,
        /// Which side of the mapping was searched.
        direction: MappingDirection,
    },

    /// Read before capture with no get hook.
    #[error("Parameter '{name}' has no get hook and has never been set")]
    NotCaptured {
        /// Full parameter name.
        name: String,
    },

    /// A set or get parser refused its input.
    #[error("Parameter '{name}': parser failed: {message}")]
    Parse {
        /// Full parameter name.
        name: String,
        /// Parser's reason.
        message: String,
    },

    /// A device hook returned an error.
    #[error("Device hook for parameter '{name}' failed: {source}")]
    Device {
        /// Full parameter name.
        name: String,
        /// Error returned by the hook.
        #[source]
        source: anyhow::Error,
    },

    /// Lookup of a name the instrument does not have.
    #[error("Instrument '{instrument}' has no parameter '{name}'")]
    UnknownParameter {
        /// Instrument name.
        instrument: String,
        /// Requested parameter name.
        name: String,
    },

    /// A second parameter with an existing name.
    #[error("Instrument '{instrument}' already has a parameter '{name}'")]
    DuplicateParameter {
        /// Instrument name.
        instrument: String,
        /// Conflicting parameter name.
        name: String,
    },

    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl ParameterError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParameterError::NotSettable { .. } | ParameterError::NotGettable { .. } => {
                ErrorKind::Capability
            }
            ParameterError::Validation { .. } => ErrorKind::Validation,
            ParameterError::Mapping { .. } => ErrorKind::Mapping,
            ParameterError::NotCaptured { .. } => ErrorKind::NotCaptured,
            ParameterError::Parse { .. } => ErrorKind::Parse,
            ParameterError::Device { .. } => ErrorKind::Device,
            ParameterError::UnknownParameter { .. }
            | ParameterError::DuplicateParameter { .. } => ErrorKind::Lookup,
            ParameterError::Config(_) | ParameterError::Configuration(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// True if the device may have been touched before this error surfaced.
    pub fn reached_device(&self) -> bool {
        matches!(self, ParameterError::Device { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_capability_errors() {
        let err = ParameterError::NotSettable { name: "a".into() };
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(err.to_string(), "Parameter 'a' is not settable");
    }

    #[test]
    fn mapping_error_names_direction() {
        let err = ParameterError::Mapping {
            name: "p".into(),
            value: json!("baz"),
            direction: MappingDirection::ToRaw,
        };
        assert_eq!(err.kind(), ErrorKind::Mapping);
        assert!(err.to_string().contains("value \"baz\""));

        let err = ParameterError::Mapping {
            name: "p".into(),
            value: json!(7),
            direction: MappingDirection::FromRaw,
        };
        assert!(err.to_string().contains("raw value 7"));
    }

    #[test]
    fn device_error_keeps_source() {
        let err = ParameterError::Device {
            name: "volt".into(),
            source: anyhow::anyhow!("serial timeout"),
        };
        assert!(err.reached_device());
        assert!(err.to_string().contains("serial timeout"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
