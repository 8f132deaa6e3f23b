//! Property statement model
//!
//! The engine is configured exclusively through ordered, hierarchical
//! `dotted.key = value, value...` statements. [`Properties`] is the in-memory
//! form of such a statement set: keys keep their first insertion position,
//! and re-setting a key replaces its values (last writer wins), which is what
//! incremental export relies on to patch single fields.

mod text;
mod value;

pub use text::{qualified_name, sanitize_name, LIBRARY_SEPARATOR, NODE_SEPARATOR};
pub use value::{IntoPropValues, PropValue};

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Property parsing errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// A line could not be parsed as a statement
    #[error("Syntax error on line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
}

/// One `key = values` statement
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Fully qualified dotted key
    pub key: String,
    /// Value list (may hold a single value)
    pub values: Vec<PropValue>,
}

impl Property {
    /// Create a property from a key and values
    pub fn new(key: impl Into<String>, values: impl IntoPropValues) -> Self {
        Self {
            key: key.into(),
            values: values.into_values(),
        }
    }

    /// First value, if any
    pub fn first(&self) -> Option<&PropValue> {
        self.values.first()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.key)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Ordered set of property statements
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<Property>,
    index: HashMap<String, usize>,
}

impl PartialEq for Properties {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Properties {
    /// Create an empty statement set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `<prefix>.<field>`; an empty prefix sets `field` verbatim
    pub fn set(&mut self, prefix: &str, field: &str, values: impl IntoPropValues) -> &mut Self {
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        self.set_key(key, values)
    }

    /// Set a fully qualified key
    pub fn set_key(&mut self, key: impl Into<String>, values: impl IntoPropValues) -> &mut Self {
        self.insert(Property {
            key: key.into(),
            values: values.into_values(),
        });
        self
    }

    /// Insert a whole property with last-writer-wins semantics
    pub fn insert(&mut self, property: Property) {
        match self.index.get(&property.key) {
            Some(&slot) => self.entries[slot].values = property.values,
            None => {
                self.index.insert(property.key.clone(), self.entries.len());
                self.entries.push(property);
            }
        }
    }

    /// Apply every statement of `other`, in order, on top of this set
    pub fn merge(&mut self, other: &Properties) -> &mut Self {
        for property in &other.entries {
            self.insert(property.clone());
        }
        self
    }

    /// All statements whose key is `prefix` or lies below `prefix.`
    pub fn get_all_under(&self, prefix: &str) -> Properties {
        let mut out = Properties::new();
        for property in self.entries.iter().filter(|p| key_is_under(&p.key, prefix)) {
            out.insert(property.clone());
        }
        out
    }

    /// Distinct immediate child identifiers below `prefix`, in first-seen order
    ///
    /// For `scene.objects.a.shape` and `scene.objects.b.material`,
    /// `get_unique_sub_names("scene.objects")` yields `["a", "b"]`.
    pub fn get_unique_sub_names(&self, prefix: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let dotted = format!("{prefix}.");
        for property in &self.entries {
            let Some(rest) = property.key.strip_prefix(&dotted) else {
                continue;
            };
            let child = rest.split('.').next().unwrap_or(rest);
            if !child.is_empty() && seen.insert(child.to_string()) {
                names.push(child.to_string());
            }
        }
        names
    }

    /// Look up a statement by its full key
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// First value of `key` as a float, or `default`
    pub fn get_f32(&self, key: &str, default: f32) -> f32 {
        self.first_value(key).and_then(PropValue::as_f32).unwrap_or(default)
    }

    /// First value of `key` as an integer, or `default`
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.first_value(key).and_then(PropValue::as_i64).unwrap_or(default)
    }

    /// First value of `key` as a boolean, or `default`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.first_value(key).and_then(PropValue::as_bool).unwrap_or(default)
    }

    /// First value of `key` as a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.first_value(key).and_then(PropValue::as_str)
    }

    fn first_value(&self, key: &str) -> Option<&PropValue> {
        self.get(key).and_then(Property::first)
    }

    /// Number of statements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate statements in order
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    /// Serialize to the text form, one statement per line
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Parse the text form
    pub fn parse(input: &str) -> Result<Self, PropertyError> {
        text::parse(input)
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for property in &self.entries {
            writeln!(f, "{property}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn key_is_under(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len() && key.starts_with(prefix) && key.as_bytes()[prefix.len()] == b'.')
}
