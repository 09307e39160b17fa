//! Scoped temporary values for parameters.
//!
//! [`Parameter::set_to`] and [`Parameter::set_to_frozen`] return a
//! [`SetToGuard`]. Entering sets the parameter to a target value; dropping the
//! guard (or calling [`SetToGuard::exit`]) puts the previous value back,
//! whether the scope ends normally, returns early through `?`, or unwinds.
//!
//! ```text
//! enter                                   exit
//!   restore = cached_or_get()               re-enable settable (if frozen)
//!   if target != restore: set(target)       if latest != restore: set(restore)
//!   disable settable (if frozen)
//! ```
//!
//! Writes are elided only by comparing against the parameter's own cache.
//! A change made inside the scope through the parameter updates the cache and
//! is therefore always undone on exit. Numbers compare by value, so `2` and
//! `2.0` count as the same setting.

use serde_json::Value;
use std::ops::Deref;
use tracing::{debug, warn};

use crate::error::ParamResult;
use crate::parameter::Parameter;

/// RAII guard holding a parameter at a temporary value.
///
/// Valid for exactly one enter/exit cycle: [`SetToGuard::exit`] consumes the
/// guard, and `Drop` only runs the exit step if it has not happened yet.
/// The guard dereferences to the bound [`Parameter`].
#[must_use = "the previous value is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SetToGuard<'a> {
    param: &'a Parameter,
    value: Value,
    restore: Value,
    /// Settable state before freezing, `None` when not frozen
    frozen_from: Option<bool>,
    exited: bool,
}

impl<'a> SetToGuard<'a> {
    pub(crate) fn enter(param: &'a Parameter, value: Value, freeze: bool) -> ParamResult<Self> {
        let restore = param.cached_or_get()?;

        if !same_value(&value, &restore) {
            if let Err(err) = param.set(value.clone()) {
                if err.reached_device() {
                    // The device may hold a partial write; put it back before reporting.
                    if let Err(rollback) = param.set(restore.clone()) {
                        warn!(
                            parameter = %param.full_name(),
                            error = %rollback,
                            "set_to rollback after failed entry did not succeed"
                        );
                    }
                }
                return Err(err);
            }
        }

        let frozen_from = freeze.then(|| param.set_settable(false));

        debug!(
            parameter = %param.full_name(),
            value = %value,
            restore = %restore,
            freeze,
            "set_to enter"
        );

        Ok(Self {
            param,
            value,
            restore,
            frozen_from,
            exited: false,
        })
    }

    /// Target value applied on entry.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value that will be restored on exit.
    pub fn restore_value(&self) -> &Value {
        &self.restore
    }

    /// True if the parameter is frozen by this guard.
    pub fn is_frozen(&self) -> bool {
        self.frozen_from.is_some()
    }

    /// The bound parameter.
    pub fn parameter(&self) -> &'a Parameter {
        self.param
    }

    /// Leave the scope now and report whether restoration succeeded.
    ///
    /// Dropping the guard does the same work but can only log a failure.
    pub fn exit(mut self) -> ParamResult<()> {
        self.exited = true;
        self.restore()
    }

    fn restore(&mut self) -> ParamResult<()> {
        if let Some(settable) = self.frozen_from.take() {
            self.param.set_settable(settable);
        }

        let latest = self.param.get_latest();
        debug!(
            parameter = %self.param.full_name(),
            latest = %latest,
            restore = %self.restore,
            "set_to exit"
        );
        if !same_value(&latest, &self.restore) {
            self.param.set(self.restore.clone())?;
        }
        Ok(())
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
            x.as_f64() == y.as_f64()
        }
        _ => a == b,
    }
}

impl Deref for SetToGuard<'_> {
    type Target = Parameter;

    fn deref(&self) -> &Self::Target {
        self.param
    }
}

impl Drop for SetToGuard<'_> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        if let Err(err) = self.restore() {
            warn!(
                parameter = %self.param.full_name(),
                restore = %self.restore,
                error = %err,
                "failed to restore parameter on set_to exit"
            );
        }
    }
}
