//! Text form of property statements and identifier sanitizing

use super::{Properties, PropertyError, PropValue};

/// Joins a library name to a graph name in [`qualified_name`]
pub const LIBRARY_SEPARATOR: &str = "_l_";

/// Joins a graph name to a node name in [`qualified_name`]
pub const NODE_SEPARATOR: &str = "_n_";

/// Turn an arbitrary editor name into an engine-legal identifier.
///
/// Dots are key separators in the property language, so the output only uses
/// `[A-Za-z0-9_]`. The mapping is one-to-one: `_` is doubled and every other
/// character outside `[A-Za-z0-9]` (or a leading digit) becomes `_<hex>_`.
/// `"My Cube"` and `"My.Cube"` therefore stay distinct entities.
///
/// After a single `_` the output only ever continues with `_` or a lowercase
/// hex digit. Names that break this rule (such as `__default_material`)
/// are free for reserved entities and separators.
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return "_unnamed".to_string();
    }

    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        match c {
            '_' => out.push_str("__"),
            c if c.is_ascii_alphabetic() || (c.is_ascii_digit() && i > 0) => out.push(c),
            c => out.push_str(&format!("_{:x}_", u32::from(c))),
        }
    }
    out
}

/// Sanitize each part and join them with `separator`
///
/// Only meant for [`LIBRARY_SEPARATOR`] and [`NODE_SEPARATOR`], which
/// [`sanitize_name`] never produces, so different part lists never share a
/// name.
pub fn qualified_name(parts: &[(&str, &str)], last: &str) -> String {
    let mut out = String::new();
    for (part, separator) in parts {
        out.push_str(&sanitize_name(part));
        out.push_str(separator);
    }
    out.push_str(&sanitize_name(last));
    out
}

pub(super) fn parse(input: &str) -> Result<Properties, PropertyError> {
    let mut props = Properties::new();

    for (number, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let syntax = |message: &str| PropertyError::Syntax {
            line: number + 1,
            message: message.to_string(),
        };

        let (key, rhs) = line.split_once('=').ok_or_else(|| syntax("missing '='"))?;
        let key = key.trim();
        if key.is_empty() || key.starts_with('.') || key.ends_with('.') || key.contains("..") {
            return Err(syntax("malformed key"));
        }

        let values = split_values(rhs.trim()).map_err(|message| syntax(&message))?;
        props.set_key(key, values);
    }

    Ok(props)
}

fn split_values(rhs: &str) -> Result<Vec<PropValue>, String> {
    let mut values = Vec::new();
    let mut chars = rhs.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        if first == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some(escaped) => s.push(escaped),
                        None => return Err("dangling escape".to_string()),
                    },
                    other => s.push(other),
                }
            }
            if !closed {
                return Err("unterminated string".to_string());
            }
            values.push(PropValue::Str(s));
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                token.push(c);
                chars.next();
            }
            values.push(parse_scalar(token.trim())?);
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(other) => return Err(format!("unexpected '{other}'")),
        }
    }

    Ok(values)
}

fn parse_scalar(token: &str) -> Result<PropValue, String> {
    match token {
        "" => Err("empty value".to_string()),
        "true" => Ok(PropValue::Bool(true)),
        "false" => Ok(PropValue::Bool(false)),
        _ => {
            if let Ok(int) = token.parse::<i64>() {
                Ok(PropValue::Int(int))
            } else if let Ok(float) = token.parse::<f32>() {
                Ok(PropValue::Float(float))
            } else {
                // Bare words are accepted as strings, as the engine does
                Ok(PropValue::Str(token.to_string()))
            }
        }
    }
}
