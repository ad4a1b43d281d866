//! Dynamic values stored inside observed objects.

use std::fmt;
use std::sync::Arc;

use super::object::{RawObject, MAX_ARRAY_LENGTH};
use super::proxy::Observed;

/// A value held by a property, array slot or ref.
///
/// Objects and proxies compare by identity. Numbers compare by IEEE
/// equality, so `NaN != NaN` under `==`; use [`has_changed`] for change
/// detection.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(RawObject),
    Proxy(Observed),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `true` for raw objects and proxies alike.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Proxy(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Self::Object(raw) => Some(raw),
            _ => None,
        }
    }

    /// The proxy, if this value is one.
    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Self::Proxy(observed) => Some(observed),
            _ => None,
        }
    }

    /// Unwrap into a proxy, if this value is one.
    pub fn into_observed(self) -> Option<Observed> {
        match self {
            Self::Proxy(observed) => Some(observed),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(raw) if raw.is_array() => "array",
            Self::Object(_) => "object",
            Self::Proxy(_) => "proxy",
        }
    }

    /// A number usable as an array length, up to [`MAX_ARRAY_LENGTH`].
    pub(crate) fn as_length(&self) -> Option<usize> {
        let n = self.as_f64()?;
        (n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH as f64).then_some(n as usize)
    }

    /// Strict equality: identity for objects and proxies.
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Proxy(a), Self::Proxy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Change detection: strict inequality, except that `NaN` never "changes"
/// into `NaN`.
pub fn has_changed(value: &Value, old: &Value) -> bool {
    let both_nan = matches!(
        (value, old),
        (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan()
    );
    !value.strict_eq(old) && !both_nan
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(raw) => raw.fmt(f),
            Self::Proxy(observed) => observed.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Self::String(s)
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Self::Object(raw)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Self::Proxy(observed)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Build a value tree from a JSON literal. Nested objects and arrays become
/// fresh raw objects.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => {
                Self::Object(RawObject::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(props) => Self::Object(RawObject::from_entries(
                props.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_is_unchanged_from_nan() {
        let nan = Value::from(f64::NAN);
        assert_ne!(nan, nan.clone());
        assert!(!has_changed(&nan, &Value::from(f64::NAN)));
        assert!(has_changed(&Value::from(1), &Value::from(2)));
        assert!(!has_changed(&Value::from("a"), &Value::from("a")));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::from(RawObject::object());
        let b = Value::from(RawObject::object());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(has_changed(&a, &b));
    }

    #[test]
    fn json_builds_nested_objects() {
        let value = Value::from(json!({"a": {"b": 1}, "list": [1, 2]}));
        let raw = value.as_object().unwrap();
        let nested = raw.get("a").unwrap();
        assert_eq!(nested.type_name(), "object");
        assert_eq!(nested.as_object().unwrap().get("b"), Some(Value::from(1)));
        assert_eq!(raw.get("list").unwrap().type_name(), "array");
    }

    #[test]
    fn lengths_must_be_whole() {
        assert_eq!(Value::from(3).as_length(), Some(3));
        assert_eq!(Value::from(1.5).as_length(), None);
        assert_eq!(Value::from(-1).as_length(), None);
        assert_eq!(Value::from("3").as_length(), None);
        assert_eq!(Value::from(MAX_ARRAY_LENGTH).as_length(), Some(MAX_ARRAY_LENGTH));
        assert_eq!(Value::from(1e10).as_length(), None);
    }
}
