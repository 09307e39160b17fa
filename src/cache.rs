//! Last-known-value memo owned by a [`Parameter`](crate::parameter::Parameter).
//!
//! The cache never validates or converts anything. It stores the result of the
//! last successful pipeline run: the user-facing value, the raw device value and
//! the instant they were recorded. A cache whose timestamp is `None` is
//! *uncaptured*; readers that need a fresh value must go through
//! [`Parameter::get`](crate::parameter::Parameter::get) instead.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-in-time copy of a [`Cache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Last mapped (user-facing) value.
    pub value: Value,
    /// Last raw (device-facing) value.
    pub raw_value: Value,
    /// When the values were recorded, `None` before the first capture.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct CacheState {
    value: Value,
    raw_value: Value,
    timestamp: Option<DateTime<Utc>>,
    marked_invalid: bool,
}

/// Thread-safe memo of the last get/set result.
///
/// The lock is only held for the duration of a single read or update, so a
/// device hook may freely read the cache of the parameter it belongs to.
#[derive(Debug)]
pub struct Cache {
    state: Mutex<CacheState>,
    max_val_age: Option<Duration>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Cache {
    /// Create an uncaptured cache.
    ///
    /// With `max_val_age` set, a captured value older than the given age is
    /// reported as invalid by [`Cache::is_valid`].
    pub fn new(max_val_age: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                value: Value::Null,
                raw_value: Value::Null,
                timestamp: None,
                marked_invalid: false,
            }),
            max_val_age,
        }
    }

    /// Record a pipeline result stamped with the current time.
    pub fn update(&self, raw_value: Value, value: Value) {
        self.update_at(raw_value, value, Utc::now());
    }

    /// Record a pipeline result with an explicit timestamp.
    pub fn update_at(&self, raw_value: Value, value: Value, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.raw_value = raw_value;
        state.value = value;
        state.timestamp = Some(timestamp);
        state.marked_invalid = false;
    }

    /// Last mapped value (`Null` if never captured).
    pub fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    /// Last raw value (`Null` if never captured).
    pub fn raw_value(&self) -> Value {
        self.state.lock().raw_value.clone()
    }

    /// Instant of the last update.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.lock().timestamp
    }

    /// Consistent copy of value, raw value and timestamp.
    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.lock();
        CacheSnapshot {
            value: state.value.clone(),
            raw_value: state.raw_value.clone(),
            timestamp: state.timestamp,
        }
    }

    /// True once any get or set has succeeded. Never reverts.
    pub fn is_captured(&self) -> bool {
        self.state.lock().timestamp.is_some()
    }

    /// Maximum age before a captured value counts as stale.
    pub fn max_val_age(&self) -> Option<Duration> {
        self.max_val_age
    }

    /// Mark the stored values as untrustworthy.
    ///
    /// The values and timestamp are kept; only [`Cache::is_valid`] changes,
    /// until the next update.
    pub fn invalidate(&self) {
        self.state.lock().marked_invalid = true;
    }

    /// True if the cache can stand in for a device read right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock();
        let Some(timestamp) = state.timestamp else {
            return false;
        };
        if state.marked_invalid {
            return false;
        }
        match self.max_val_age {
            Some(max_age) => now - timestamp <= max_age,
            None => true,
        }
    }
}
