//! Pluggable value validators.
//!
//! A [`Validator`] checks a user-facing value before it enters the value
//! pipeline. Validators are selected when a parameter is built and invoked
//! uniformly afterwards, so call sites never branch on the validator kind.

use serde_json::Value;
use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Capability to accept or reject a value.
pub trait Validator: Send + Sync + Debug {
    /// Return `Ok(())` if `value` is acceptable, otherwise a human readable
    /// reason.
    fn validate(&self, value: &Value) -> Result<(), String>;

    /// Short description used in snapshots and error messages.
    fn describe(&self) -> String;

    /// Boolean form of [`Validator::validate`].
    fn accepts(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }
}

/// Membership in a fixed set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    values: Vec<Value>,
}

impl Enum {
    /// Build from any iterator of values.
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Allowed values, in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl Validator for Enum {
    fn validate(&self, value: &Value) -> Result<(), String> {
        if self.values.iter().any(|allowed| allowed == value) {
            Ok(())
        } else {
            Err(format!("{} is not in {}", value, self.describe()))
        }
    }

    fn describe(&self) -> String {
        let listed = self
            .values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{}}}", listed)
    }
}

/// Any real number inside an inclusive range.
#[derive(Debug, Clone, PartialEq)]
pub struct Numbers {
    range: RangeInclusive<f64>,
}

impl Numbers {
    /// Inclusive range `min..=max`.
    pub fn new(min: f64, max: f64) -> Self {
        Self { range: min..=max }
    }

    /// Any finite number.
    pub fn unbounded() -> Self {
        Self::new(f64::MIN, f64::MAX)
    }
}

impl Validator for Numbers {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let number = value
            .as_f64()
            .ok_or_else(|| format!("{} is not a number", value))?;
        if !number.is_finite() {
            return Err(format!("{} is not finite", number));
        }
        is_in_range(number, self.range.clone()).map_err(|e| format!("{}; {}", e, self.describe()))
    }

    fn describe(&self) -> String {
        format!("Numbers {}<=v<={}", self.range.start(), self.range.end())
    }
}

/// Integers inside an inclusive range.
///
/// Floats with no fractional part are accepted, so `3.0` passes where `3`
/// would.
#[derive(Debug, Clone, PartialEq)]
pub struct Ints {
    range: RangeInclusive<i64>,
}

impl Ints {
    /// Inclusive range `min..=max`.
    pub fn new(min: i64, max: i64) -> Self {
        Self { range: min..=max }
    }
}

impl Validator for Ints {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let integer = as_integer(value).ok_or_else(|| format!("{} is not an integer", value))?;
        is_in_range(integer, self.range.clone()).map_err(|e| format!("{}; {}", e, self.describe()))
    }

    fn describe(&self) -> String {
        format!("Ints {}<=v<={}", self.range.start(), self.range.end())
    }
}

/// Strings whose character count lies in an inclusive range.
#[derive(Debug, Clone, PartialEq)]
pub struct Strings {
    length: RangeInclusive<usize>,
}

impl Strings {
    /// Length bounds `min_length..=max_length`.
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            length: min_length..=max_length,
        }
    }

    /// Non-empty strings of any length.
    pub fn non_empty() -> Self {
        Self::new(1, usize::MAX)
    }
}

impl Validator for Strings {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("{} is not a string", value))?;
        if *self.length.start() > 0 {
            is_not_empty(text)?;
        }
        is_in_range(text.chars().count(), self.length.clone())
            .map_err(|e| format!("{}; {}", e, self.describe()))
    }

    fn describe(&self) -> String {
        format!(
            "Strings {}<=len<={}",
            self.length.start(),
            self.length.end()
        )
    }
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anything;

impl Validator for Anything {
    fn validate(&self, _value: &Value) -> Result<(), String> {
        Ok(())
    }

    fn describe(&self) -> String {
        "Anything".to_string()
    }
}

/// User-supplied validation function.
#[derive(Clone)]
pub struct Custom {
    description: String,
    check: Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>,
}

impl Custom {
    /// Wrap `check`, described as `description` in messages.
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }
}

impl Debug for Custom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Custom({}, <function>)", self.description)
    }
}

impl Validator for Custom {
    fn validate(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Validates if a given value is within a specified range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), String> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range".to_string())
    }
}

/// Validates if a given string is not empty.
pub fn is_not_empty(value: &str) -> Result<(), String> {
    if !value.is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty".to_string())
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(integer) = value.as_i64() {
        return Some(integer);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_membership() {
        let vals = Enum::new(["foo", "bar"]);
        assert!(vals.accepts(&json!("foo")));
        assert!(vals.accepts(&json!("bar")));

        let err = vals.validate(&json!("baz")).unwrap_err();
        assert!(err.contains("\"baz\" is not in"));
        assert_eq!(vals.describe(), "{\"foo\", \"bar\"}");
    }

    #[test]
    fn enum_can_hold_null() {
        let vals = Enum::new([Value::Null, json!(1)]);
        assert!(vals.accepts(&Value::Null));
        assert!(!vals.accepts(&json!(2)));
    }

    #[test]
    fn numbers_range() {
        let vals = Numbers::new(0.0, 10.0);
        assert!(vals.accepts(&json!(0)));
        assert!(vals.accepts(&json!(9.5)));
        assert!(!vals.accepts(&json!(10.5)));
        assert!(!vals.accepts(&json!("5")));
        assert!(Numbers::unbounded().accepts(&json!(-1e300)));
    }

    #[test]
    fn ints_accept_integral_floats() {
        let vals = Ints::new(-5, 5);
        assert!(vals.accepts(&json!(3)));
        assert!(vals.accepts(&json!(3.0)));
        assert!(!vals.accepts(&json!(3.5)));
        assert!(!vals.accepts(&json!(6)));
        assert!(!vals.accepts(&json!(true)));
    }

    #[test]
    fn strings_length() {
        let vals = Strings::new(1, 3);
        assert!(vals.accepts(&json!("abc")));
        assert!(!vals.accepts(&json!("")));
        assert!(!vals.accepts(&json!("abcd")));
        assert!(!vals.accepts(&json!(1)));
        assert!(Strings::non_empty().accepts(&json!("long enough")));
    }

    #[test]
    fn custom_validator() {
        let even = Custom::new("even integers", |v| match v.as_i64() {
            Some(n) if n % 2 == 0 => Ok(()),
            _ => Err(format!("{} is not even", v)),
        });
        assert!(even.accepts(&json!(4)));
        assert_eq!(even.validate(&json!(3)).unwrap_err(), "3 is not even");
        assert_eq!(even.describe(), "even integers");
    }

    #[test]
    fn anything_goes() {
        assert!(Anything.accepts(&Value::Null));
        assert!(Anything.accepts(&json!({"a": [1, 2]})));
    }

    #[test]
    fn range_helpers() {
        assert!(is_in_range(5, 1..=10).is_ok());
        assert!(is_in_range(11, 1..=10).is_err());
        assert!(is_not_empty("hello").is_ok());
        assert!(is_not_empty("").is_err());
    }
}
