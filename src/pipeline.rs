//! Conversion between user-facing values and raw device values.
//!
//! ```text
//! set(value)                                    get()
//!    │                                            ▲
//!    ▼                                            │
//! validate(value)                           from_raw(raw)
//!    │                                        get_parser, else
//!    ▼                                        reverse mapping, else identity
//! to_raw(value)                                   ▲
//!   mapping, else set_parser, else identity       │
//!    │                                            │
//!    ▼                                            │
//! set hook(raw) ──────────── device ────────── get hook()
//! ```

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{MappingDirection, ParamResult, ParameterError};
use crate::parsers::Parser;
use crate::validators::Validator;

/// Bidirectional table between user values and raw values.
///
/// Keys and raw values are arbitrary JSON values, so a logical `None`
/// (`Value::Null`) can be mapped onto a concrete raw sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMapping {
    entries: Vec<(Value, Value)>,
}

impl ValueMapping {
    /// Build from `(value, raw)` pairs. A later pair with an existing key
    /// replaces the earlier one.
    pub fn new<I, K, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<Value>,
        R: Into<Value>,
    {
        let mut mapping = Self::default();
        for (value, raw) in pairs {
            mapping.insert(value.into(), raw.into());
        }
        mapping
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, value: Value, raw: Value) {
        match self.entries.iter_mut().find(|(key, _)| *key == value) {
            Some(entry) => entry.1 = raw,
            None => self.entries.push((value, raw)),
        }
    }

    /// Raw value for a user value.
    pub fn to_raw(&self, value: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == value)
            .map(|(_, raw)| raw)
    }

    /// User value for a raw value. The first matching entry wins when several
    /// keys share a raw value.
    pub fn from_raw(&self, raw: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(_, mapped)| mapped == raw)
            .map(|(key, _)| key)
    }

    /// All `(value, raw)` pairs.
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validator, value mapping and parsers of one parameter.
#[derive(Clone, Default)]
pub struct ValuePipeline {
    validator: Option<Arc<dyn Validator>>,
    val_mapping: Option<ValueMapping>,
    set_parser: Option<Parser>,
    get_parser: Option<Parser>,
}

impl Debug for ValuePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValuePipeline")
            .field("validator", &self.validator)
            .field("val_mapping", &self.val_mapping)
            .field("set_parser", &self.set_parser.as_ref().map(|_| "<function>"))
            .field("get_parser", &self.get_parser.as_ref().map(|_| "<function>"))
            .finish()
    }
}

impl ValuePipeline {
    /// Identity pipeline without validation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the value mapping.
    pub fn with_val_mapping(mut self, mapping: ValueMapping) -> Self {
        self.val_mapping = Some(mapping);
        self
    }

    /// Set the user-to-raw parser.
    pub fn with_set_parser(mut self, parser: Parser) -> Self {
        self.set_parser = Some(parser);
        self
    }

    /// Set the raw-to-user parser.
    pub fn with_get_parser(mut self, parser: Parser) -> Self {
        self.get_parser = Some(parser);
        self
    }

    /// Configured validator, if any.
    pub fn validator(&self) -> Option<&Arc<dyn Validator>> {
        self.validator.as_ref()
    }

    /// Configured value mapping, if any.
    pub fn val_mapping(&self) -> Option<&ValueMapping> {
        self.val_mapping.as_ref()
    }

    /// Reject `value` unless the validator (if any) accepts it.
    pub fn validate(&self, name: &str, value: &Value) -> ParamResult<()> {
        match &self.validator {
            Some(validator) => {
                validator
                    .validate(value)
                    .map_err(|message| ParameterError::Validation {
                        name: name.to_string(),
                        message,
                    })
            }
            None => Ok(()),
        }
    }

    /// Translate a user value into its raw form.
    pub fn to_raw(&self, name: &str, value: &Value) -> ParamResult<Value> {
        if let Some(mapping) = &self.val_mapping {
            return mapping
                .to_raw(value)
                .cloned()
                .ok_or_else(|| ParameterError::Mapping {
                    name: name.to_string(),
                    value: value.clone(),
                    direction: MappingDirection::ToRaw,
                });
        }
        if let Some(parser) = &self.set_parser {
            return parser(value).map_err(|message| ParameterError::Parse {
                name: name.to_string(),
                message,
            });
        }
        Ok(value.clone())
    }

    /// Translate a raw value back into its user form.
    pub fn from_raw(&self, name: &str, raw: &Value) -> ParamResult<Value> {
        if let Some(parser) = &self.get_parser {
            return parser(raw).map_err(|message| ParameterError::Parse {
                name: name.to_string(),
                message,
            });
        }
        if let Some(mapping) = &self.val_mapping {
            return mapping
                .from_raw(raw)
                .cloned()
                .ok_or_else(|| ParameterError::Mapping {
                    name: name.to_string(),
                    value: raw.clone(),
                    direction: MappingDirection::FromRaw,
                });
        }
        Ok(raw.clone())
    }
}
