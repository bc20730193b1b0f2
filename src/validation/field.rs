//! Field paths and structured field errors.
//!
//! Errors mirror the Kubernetes `field.Error` vocabulary so that API clients
//! can render them the way `kubectl` renders API server rejections.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Dotted path to a field, e.g. `spec.provider.workers[0].maximum`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(String);

impl Path {
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            return Self::new(name);
        }
        Self(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}[{}]", self.0, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Required,
    Invalid,
    Forbidden,
    NotSupported,
    Duplicate,
    TooLong,
}

impl ErrorType {
    /// Machine-readable reason as carried in API `StatusCause`s.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorType::Required => "FieldValueRequired",
            ErrorType::Invalid => "FieldValueInvalid",
            ErrorType::Forbidden => "FieldValueForbidden",
            ErrorType::NotSupported => "FieldValueNotSupported",
            ErrorType::Duplicate => "FieldValueDuplicate",
            ErrorType::TooLong => "FieldValueTooLong",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Required => write!(f, "Required value"),
            ErrorType::Invalid => write!(f, "Invalid value"),
            ErrorType::Forbidden => write!(f, "Forbidden"),
            ErrorType::NotSupported => write!(f, "Unsupported value"),
            ErrorType::Duplicate => write!(f, "Duplicate value"),
            ErrorType::TooLong => write!(f, "Too long"),
        }
    }
}

/// A single violation at a field path.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    pub error_type: ErrorType,
    pub field: Path,
    /// Offending value echoed back, when one is meaningful.
    pub bad_value: Option<Value>,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error_type)?;
        if let Some(value) = &self.bad_value {
            write!(f, ": {}", value)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl FieldError {
    pub fn required(field: Path, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Required,
            field,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn invalid<T: Serialize + ?Sized>(field: Path, value: &T, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Invalid,
            field,
            bad_value: Some(to_value(value)),
            detail: detail.into(),
        }
    }

    pub fn forbidden(field: Path, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Forbidden,
            field,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn not_supported<T: Serialize + ?Sized>(field: Path, value: &T, valid: &[&str]) -> Self {
        let quoted: Vec<String> = valid.iter().map(|v| format!("\"{}\"", v)).collect();
        Self {
            error_type: ErrorType::NotSupported,
            field,
            bad_value: Some(to_value(value)),
            detail: format!("supported values: {}", quoted.join(", ")),
        }
    }

    pub fn duplicate<T: Serialize + ?Sized>(field: Path, value: &T) -> Self {
        Self {
            error_type: ErrorType::Duplicate,
            field,
            bad_value: Some(to_value(value)),
            detail: String::new(),
        }
    }

    pub fn too_long<T: Serialize + ?Sized>(field: Path, value: &T, max_length: usize) -> Self {
        Self {
            error_type: ErrorType::TooLong,
            field,
            bad_value: Some(to_value(value)),
            detail: format!("must have at most {} characters", max_length),
        }
    }
}

/// Ordered collection of violations; empty means valid.
pub type ErrorList = Vec<FieldError>;

pub const FIELD_IMMUTABLE_ERROR_MSG: &str = "field is immutable";

/// Rejects any change between the old and the new value.
pub fn validate_immutable_field<T>(new: &T, old: &T, path: &Path) -> ErrorList
where
    T: PartialEq + Serialize + ?Sized,
{
    if new == old {
        return ErrorList::new();
    }
    vec![FieldError::invalid(path.clone(), new, FIELD_IMMUTABLE_ERROR_MSG)]
}

/// Renders the leaf-level differences between two serializable values.
///
/// Used to tell users which parts of a spec they tried to change.
pub fn diff<T: Serialize>(new: &T, old: &T) -> Vec<String> {
    let mut out = Vec::new();
    diff_values(&to_value(old), &to_value(new), "", &mut out);
    out
}

fn diff_values(old: &Value, new: &Value, at: &str, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let nested = if at.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", at, key)
                };
                diff_values(
                    a.get(key).unwrap_or(&Value::Null),
                    b.get(key).unwrap_or(&Value::Null),
                    &nested,
                    out,
                );
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                diff_values(x, y, &format!("{}[{}]", at, i), out);
            }
        }
        (a, b) if a != b => out.push(format!("{}: {} != {}", at, a, b)),
        _ => {}
    }
}
