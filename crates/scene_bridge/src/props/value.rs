//! Values carried by property statements

use std::fmt;

/// A single value in a property statement
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f32),
    /// String (serialized quoted)
    Str(String),
}

impl PropValue {
    /// Numeric view of the value (integers and booleans are widened)
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropValue::Float(v) => Some(*v),
            PropValue::Int(v) => Some(*v as f32),
            PropValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            PropValue::Str(s) => s.parse().ok(),
        }
    }

    /// Integer view of the value (floats are truncated)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::Float(v) => Some(*v as i64),
            PropValue::Bool(v) => Some(i64::from(*v)),
            PropValue::Str(s) => s.parse().ok(),
        }
    }

    /// Boolean view of the value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(v) => Some(*v),
            PropValue::Int(v) => Some(*v != 0),
            PropValue::Float(v) => Some(*v != 0.0),
            PropValue::Str(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }

    /// String view of the value; only `Str` values qualify
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            // Debug keeps the fractional part ("0.0"), so floats parse back as floats
            PropValue::Float(v) => write!(f, "{v:?}"),
            PropValue::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<usize> for PropValue {
    fn from(v: usize) -> Self {
        PropValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f32> for PropValue {
    fn from(v: f32) -> Self {
        PropValue::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

impl From<&String> for PropValue {
    fn from(v: &String) -> Self {
        PropValue::Str(v.clone())
    }
}

/// Conversion into the value list of a property statement
pub trait IntoPropValues {
    /// Convert into a list of values
    fn into_values(self) -> Vec<PropValue>;
}

macro_rules! impl_scalar_values {
    ($($ty:ty),*) => {
        $(
            impl IntoPropValues for $ty {
                fn into_values(self) -> Vec<PropValue> {
                    vec![PropValue::from(self)]
                }
            }
        )*
    };
}

impl_scalar_values!(bool, i64, i32, u32, usize, f32, &str, String, &String, PropValue);

impl IntoPropValues for Vec<PropValue> {
    fn into_values(self) -> Vec<PropValue> {
        self
    }
}

impl<const N: usize> IntoPropValues for [f32; N] {
    fn into_values(self) -> Vec<PropValue> {
        self.iter().copied().map(PropValue::Float).collect()
    }
}

impl IntoPropValues for &[f32] {
    fn into_values(self) -> Vec<PropValue> {
        self.iter().copied().map(PropValue::Float).collect()
    }
}

impl IntoPropValues for &[u32] {
    fn into_values(self) -> Vec<PropValue> {
        self.iter().map(|v| PropValue::Int(i64::from(*v))).collect()
    }
}
