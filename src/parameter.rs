//! Parameter - a named, validated handle to one instrument setting
//!
//! A [`Parameter`] composes a [`Cache`] and a [`ValuePipeline`] with two
//! optional device hooks. The hooks are plain closures: the parameter never
//! knows how the instrument is actually talked to.
//!
//! # Example
//!
//! ```rust,ignore
//! use daq_params::parameter::Parameter;
//! use daq_params::validators::Numbers;
//!
//! let voltage = Parameter::builder("voltage")
//!     .unit("V")
//!     .validator(Numbers::new(-10.0, 10.0))
//!     .set_hook(move |raw| supply.write_voltage(raw))
//!     .get_hook(move || supply.read_voltage())
//!     .build()?;
//!
//! voltage.set(2.5)?;                 // validate, convert, write, cache
//! let now = voltage.get()?;          // read, convert, cache
//! let last = voltage.get_latest();   // cache only
//!
//! {
//!     let _guard = voltage.set_to_frozen(0.0)?;
//!     // voltage is 0.0 and cannot be changed here
//! }
//! // voltage is back to 2.5
//! ```
//!
//! # Data Flow
//!
//! ```text
//! param.set(value)
//!         │
//!         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ 1. Capability check (settable)                    │
//! └───────────────────────────────────────────────────┘
//!         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ 2. Validate user value (BEFORE any conversion)    │
//! └───────────────────────────────────────────────────┘
//!         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ 3. to_raw: mapping, else set_parser, else identity│
//! └───────────────────────────────────────────────────┘
//!         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ 4. Set hook (if connected)                        │
//! └───────────────────────────────────────────────────┘
//!         ▼
//! ┌───────────────────────────────────────────────────┐
//! │ 5. Cache update (raw, value, now)                 │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! `set` never compares against the cached value: every call runs the whole
//! pipeline and writes the device.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::context::SetToGuard;
use crate::error::{ParamResult, ParameterError};
use crate::parsers::Parser;
use crate::pipeline::{ValueMapping, ValuePipeline};
use crate::validators::Validator;

/// Device write function.
pub type SetHook = Arc<dyn Fn(Value) -> anyhow::Result<()> + Send + Sync>;

/// Device read function.
pub type GetHook = Arc<dyn Fn() -> anyhow::Result<Value> + Send + Sync>;

/// Serialisable view of a parameter and its cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    /// Short name.
    pub name: String,
    /// Name qualified with the owning instrument.
    pub full_name: String,
    /// Display label.
    pub label: String,
    /// Unit string, empty if unitless.
    pub unit: String,
    /// Last mapped value.
    pub value: Value,
    /// Last raw value.
    pub raw_value: Value,
    /// Time of last capture.
    pub ts: Option<DateTime<Utc>>,
    /// Settable at the time of the snapshot.
    pub settable: bool,
    /// Gettable at the time of the snapshot.
    pub gettable: bool,
    /// Validator description, if any.
    pub vals: Option<String>,
}

/// Validated, cached handle to one external quantity.
///
/// All methods take `&self`; the cache and the settable flag use interior
/// mutability so an [`Instrument`](crate::instrument::Instrument) can share
/// parameters as `Arc<Parameter>`. Access is expected to be single-writer;
/// nothing here serialises concurrent `set_to` scopes.
pub struct Parameter {
    /// Parameter name (unique within its instrument)
    name: String,

    /// Owning instrument name, used to build the full name
    instrument: Option<String>,

    /// Human readable label, defaults to the name
    label: Option<String>,

    /// Unit of measurement (e.g., "V", "mW", "nm")
    unit: Option<String>,

    /// Free-form description
    description: Option<String>,

    pipeline: ValuePipeline,

    /// Device write function. Without one, the cache is the device.
    set_hook: Option<SetHook>,

    /// Device read function.
    get_hook: Option<GetHook>,

    gettable: bool,

    /// Current settable capability, toggled by frozen `set_to` scopes
    settable: AtomicBool,

    cache: Cache,
}

impl Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.full_name())
            .field("unit", &self.unit)
            .field("pipeline", &self.pipeline)
            .field("set_hook", &self.set_hook.is_some())
            .field("get_hook", &self.get_hook.is_some())
            .field("gettable", &self.gettable)
            .field("settable", &self.settable())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Parameter {
    /// Start building a parameter called `name`.
    pub fn builder(name: impl Into<String>) -> ParameterBuilder {
        ParameterBuilder::new(name)
    }

    /// Short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<instrument>_<name>` when owned by an instrument, else the name.
    pub fn full_name(&self) -> String {
        match &self.instrument {
            Some(instrument) => format!("{}_{}", instrument, self.name),
            None => self.name.clone(),
        }
    }

    /// Owning instrument name.
    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    /// Display label (falls back to the name).
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Physical unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Free-form description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Value pipeline used by `get` and `set`.
    pub fn pipeline(&self) -> &ValuePipeline {
        &self.pipeline
    }

    /// The parameter's cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Whether `set` is currently permitted.
    pub fn settable(&self) -> bool {
        self.settable.load(Ordering::SeqCst)
    }

    /// Whether `get` is permitted.
    pub fn gettable(&self) -> bool {
        self.gettable
    }

    /// Toggle the settable capability, returning the previous state.
    pub(crate) fn set_settable(&self, settable: bool) -> bool {
        self.settable.swap(settable, Ordering::SeqCst)
    }

    /// Read the current value.
    ///
    /// With a get hook the device is asked. Without one, a pure local value
    /// holder (no set hook either) reads its own cache, which is `Null` before
    /// the first set. A write-only device parameter that was never set fails
    /// with [`ParameterError::NotCaptured`].
    ///
    /// Always refreshes the cache timestamp, even when the value is unchanged.
    pub fn get(&self) -> ParamResult<Value> {
        if !self.gettable {
            return Err(ParameterError::NotGettable {
                name: self.full_name(),
            });
        }

        let raw = match (&self.get_hook, &self.set_hook) {
            (Some(hook), _) => hook().map_err(|source| ParameterError::Device {
                name: self.full_name(),
                source,
            })?,
            (None, None) => self.cache.raw_value(),
            (None, Some(_)) => {
                if !self.cache.is_captured() {
                    return Err(ParameterError::NotCaptured {
                        name: self.full_name(),
                    });
                }
                self.cache.raw_value()
            }
        };

        let value = self.pipeline.from_raw(&self.full_name(), &raw)?;
        trace!(parameter = %self.full_name(), raw = %raw, value = %value, "get");
        self.cache.update(raw, value.clone());
        Ok(value)
    }

    /// Validate, convert and write `value`, then record it in the cache.
    ///
    /// Fails with [`ParameterError::NotSettable`] while the parameter is
    /// read-only or frozen. The cache is only updated after the set hook
    /// succeeds.
    pub fn set(&self, value: impl Into<Value>) -> ParamResult<()> {
        let value = value.into();
        if !self.settable() {
            return Err(ParameterError::NotSettable {
                name: self.full_name(),
            });
        }

        let name = self.full_name();
        self.pipeline.validate(&name, &value)?;
        let raw = self.pipeline.to_raw(&name, &value)?;

        if let Some(hook) = &self.set_hook {
            hook(raw.clone()).map_err(|source| ParameterError::Device {
                name: name.clone(),
                source,
            })?;
        }

        debug!(parameter = %name, raw = %raw, value = %value, "set");
        self.cache.update(raw, value);
        Ok(())
    }

    /// Last cached value, without touching the device.
    pub fn get_latest(&self) -> Value {
        self.cache.value()
    }

    /// Time of the last successful get or set, `None` while uncaptured.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.cache.timestamp()
    }

    /// Cached value if it is still valid, otherwise a fresh [`Parameter::get`].
    pub fn cached_or_get(&self) -> ParamResult<Value> {
        if self.cache.is_valid() {
            Ok(self.cache.value())
        } else {
            self.get()
        }
    }

    /// Set `value` for the lifetime of the returned guard.
    ///
    /// The value held before entry is restored when the guard is dropped or
    /// [`SetToGuard::exit`] is called. See [`SetToGuard`] for the exact
    /// protocol.
    pub fn set_to(&self, value: impl Into<Value>) -> ParamResult<SetToGuard<'_>> {
        SetToGuard::enter(self, value.into(), false)
    }

    /// Like [`Parameter::set_to`], and additionally make the parameter
    /// non-settable until the guard exits.
    pub fn set_to_frozen(&self, value: impl Into<Value>) -> ParamResult<SetToGuard<'_>> {
        SetToGuard::enter(self, value.into(), true)
    }

    /// Serialisable view of the parameter.
    pub fn snapshot(&self) -> ParameterSnapshot {
        let cache = self.cache.snapshot();
        ParameterSnapshot {
            name: self.name.clone(),
            full_name: self.full_name(),
            label: self.label().to_string(),
            unit: self.unit.clone().unwrap_or_default(),
            value: cache.value,
            raw_value: cache.raw_value,
            ts: cache.timestamp,
            settable: self.settable(),
            gettable: self.gettable,
            vals: self.pipeline.validator().map(|v| v.describe()),
        }
    }
}

// =============================================================================
// Parameter Builder (Fluent API)
// =============================================================================

/// Builder for creating parameters with fluent API
pub struct ParameterBuilder {
    name: String,
    instrument: Option<String>,
    label: Option<String>,
    unit: Option<String>,
    description: Option<String>,
    pipeline: ValuePipeline,
    set_hook: Option<SetHook>,
    get_hook: Option<GetHook>,
    initial_value: Option<Value>,
    max_val_age: Option<Duration>,
    read_only: bool,
    write_only: bool,
}

impl ParameterBuilder {
    /// Start a builder for a parameter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instrument: None,
            label: None,
            unit: None,
            description: None,
            pipeline: ValuePipeline::new(),
            set_hook: None,
            get_hook: None,
            initial_value: None,
            max_val_age: None,
            read_only: false,
            write_only: false,
        }
    }

    /// Name being built.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Physical unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Free-form description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Record the owning instrument. [`Instrument::add_parameter`] calls this.
    ///
    /// [`Instrument::add_parameter`]: crate::instrument::Instrument::add_parameter
    pub fn instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }

    /// Validate user values with `validator`.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.pipeline = self.pipeline.with_validator(Arc::new(validator));
        self
    }

    /// Translate values through a bidirectional table.
    pub fn val_mapping(mut self, mapping: ValueMapping) -> Self {
        self.pipeline = self.pipeline.with_val_mapping(mapping);
        self
    }

    /// Convert user values before they reach the device.
    pub fn set_parser(mut self, parser: Parser) -> Self {
        self.pipeline = self.pipeline.with_set_parser(parser);
        self
    }

    /// Convert device values before they reach the caller.
    pub fn get_parser(mut self, parser: Parser) -> Self {
        self.pipeline = self.pipeline.with_get_parser(parser);
        self
    }

    /// Connect the device write function.
    pub fn set_hook(
        mut self,
        hook: impl Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.set_hook = Some(Arc::new(hook));
        self
    }

    /// Connect the device read function.
    pub fn get_hook(
        mut self,
        hook: impl Fn() -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.get_hook = Some(Arc::new(hook));
        self
    }

    /// Seed the cache with `value`.
    ///
    /// The value is validated and converted at build time, but no hook is
    /// called.
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Treat cached values older than `max_age` as stale.
    pub fn max_val_age(mut self, max_age: Duration) -> Self {
        self.max_val_age = Some(max_age);
        self
    }

    /// Build with `settable` disabled.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Build with `gettable` disabled.
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// Finish the parameter, validating and caching `initial_value` if set.
    pub fn build(self) -> ParamResult<Parameter> {
        let param = Parameter {
            name: self.name,
            instrument: self.instrument,
            label: self.label,
            unit: self.unit,
            description: self.description,
            pipeline: self.pipeline,
            set_hook: self.set_hook,
            get_hook: self.get_hook,
            gettable: !self.write_only,
            settable: AtomicBool::new(!self.read_only),
            cache: Cache::new(self.max_val_age),
        };

        if let Some(value) = self.initial_value {
            let name = param.full_name();
            param.pipeline.validate(&name, &value)?;
            let raw = param.pipeline.to_raw(&name, &value)?;
            param.cache.update(raw, value);
        }

        Ok(param)
    }
}

// =============================================================================
// Tests
// =============================================================================
