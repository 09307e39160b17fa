//! # DAQ Parameters
//!
//! Named, validated, cached handles to instrument settings, plus scoped
//! temporary values that are guaranteed to be undone.
//!
//! ## Crate Structure
//!
//! - **`cache`**: last-known value, raw value and timestamp of a parameter.
//! - **`validators`**: the `Validator` capability and its `Enum`, `Numbers`, `Ints`,
//!   `Strings`, `Anything` and `Custom` variants.
//! - **`parsers`**: set/get parser functions (`int`, `float`, `string`, `boolean`).
//! - **`pipeline`**: `ValuePipeline` and `ValueMapping`, translating between user values
//!   and raw device values.
//! - **`parameter`**: `Parameter` and its builder; device hooks, `get`, `set`, `get_latest`.
//! - **`context`**: `SetToGuard`, the RAII guard behind `Parameter::set_to`.
//! - **`instrument`**: `Instrument`, a name-keyed container of parameters.
//! - **`config`**: Figment-based loading of instrument and parameter definitions.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`error`**: the `ParameterError` enum shared by everything above.
//!
//! ## Example
//!
//! ```
//! use daq_params::{Instrument, Parameter};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), daq_params::ParameterError> {
//! let mut dmm = Instrument::new("dmm");
//! let range = dmm.add_parameter(Parameter::builder("range").unit("V"))?;
//! range.set(10)?;
//!
//! {
//!     let _guard = range.set_to_frozen(1)?;
//!     assert_eq!(dmm["range"].get()?, json!(1));
//!     assert!(dmm["range"].set(100).is_err());
//! }
//!
//! assert_eq!(range.get()?, json!(10));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod parameter;
pub mod parsers;
pub mod pipeline;
pub mod validators;

pub use cache::{Cache, CacheSnapshot};
pub use context::SetToGuard;
pub use error::{ErrorKind, ParamResult, ParameterError};
pub use instrument::Instrument;
pub use parameter::{Parameter, ParameterBuilder};
pub use pipeline::{ValueMapping, ValuePipeline};
pub use serde_json::Value;
