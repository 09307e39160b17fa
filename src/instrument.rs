//! Name-keyed container of parameters.
//!
//! An [`Instrument`] owns its parameters and dispatches lookups by name. It
//! does not take part in value semantics; every get and set goes straight to
//! the [`Parameter`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ParamResult, ParameterError};
use crate::parameter::{Parameter, ParameterBuilder, ParameterSnapshot};

/// Serialisable view of an instrument and all of its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    /// Instrument name.
    pub name: String,
    /// Parameter snapshots keyed by short name.
    pub parameters: BTreeMap<String, ParameterSnapshot>,
}

/// Named collection of parameters.
#[derive(Debug)]
pub struct Instrument {
    name: String,
    parameters: BTreeMap<String, Arc<Parameter>>,
}

impl Instrument {
    /// Create an empty instrument.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Instrument name, used as the prefix of every full parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build `builder` as a parameter owned by this instrument.
    ///
    /// Fails if a parameter with the same name already exists.
    pub fn add_parameter(&mut self, builder: ParameterBuilder) -> ParamResult<Arc<Parameter>> {
        if self.parameters.contains_key(builder.name()) {
            return Err(ParameterError::DuplicateParameter {
                instrument: self.name.clone(),
                name: builder.name().to_string(),
            });
        }

        let param = Arc::new(builder.instrument(self.name.clone()).build()?);
        debug!(instrument = %self.name, parameter = %param.name(), "parameter added");
        self.parameters
            .insert(param.name().to_string(), Arc::clone(&param));
        Ok(param)
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> ParamResult<&Arc<Parameter>> {
        self.parameters
            .get(name)
            .ok_or_else(|| ParameterError::UnknownParameter {
                instrument: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Parameter names in sorted order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Iterate over all parameters in name order.
    pub fn parameters(&self) -> impl Iterator<Item = &Arc<Parameter>> {
        self.parameters.values()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// True if no parameter has been added.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Snapshot every parameter from its cache; no device is touched.
    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            name: self.name.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, param)| (name.clone(), param.snapshot()))
                .collect(),
        }
    }
}

/// Panics if the instrument has no parameter called `name`. Use
/// [`Instrument::parameter`] for a fallible lookup.
impl Index<&str> for Instrument {
    type Output = Parameter;

    fn index(&self, name: &str) -> &Self::Output {
        match self.parameters.get(name) {
            Some(param) => param.as_ref(),
            None => panic!("instrument '{}' has no parameter '{}'", self.name, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn add_and_lookup() {
        let mut instrument = Instrument::new("dummy_holder");
        let a = instrument.add_parameter(Parameter::builder("a")).unwrap();
        instrument
            .add_parameter(Parameter::builder("b").unit("V"))
            .unwrap();

        assert_eq!(a.full_name(), "dummy_holder_a");
        assert_eq!(instrument.len(), 2);
        assert_eq!(
            instrument.parameter_names().collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        a.set(2).unwrap();
        assert_eq!(instrument["a"].get_latest(), json!(2));
        assert_eq!(instrument.parameter("b").unwrap().unit(), Some("V"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut instrument = Instrument::new("dmm");
        instrument.add_parameter(Parameter::builder("volt")).unwrap();
        let err = instrument
            .add_parameter(Parameter::builder("volt"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn unknown_parameter_is_an_error() {
        let instrument = Instrument::new("dmm");
        let err = instrument.parameter("curr").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Instrument 'dmm' has no parameter 'curr'"
        );
    }

    #[test]
    #[should_panic(expected = "has no parameter 'missing'")]
    fn index_panics_on_unknown_name() {
        let instrument = Instrument::new("dmm");
        let _ = &instrument["missing"];
    }

    #[test]
    fn snapshot_reads_caches_only() {
        let mut instrument = Instrument::new("laser");
        instrument
            .add_parameter(Parameter::builder("power").unit("mW").initial_value(1.5))
            .unwrap();
        instrument
            .add_parameter(Parameter::builder("wavelength").unit("nm"))
            .unwrap();

        let snap = instrument.snapshot();
        assert_eq!(snap.name, "laser");
        assert_eq!(snap.parameters["power"].value, json!(1.5));
        assert_eq!(snap.parameters["wavelength"].ts, None);
    }
}
