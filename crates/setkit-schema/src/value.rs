//! Typed setting values and their GVariant-style text form.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a key. Displays as its GVariant type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "b")]
    Boolean,
    #[serde(rename = "i")]
    Int,
    #[serde(rename = "u")]
    UInt,
    #[serde(rename = "d")]
    Double,
    #[serde(rename = "s")]
    String,
    #[serde(rename = "as")]
    StringList,
}

impl KeyType {
    pub fn signature(self) -> &'static str {
        match self {
            KeyType::Boolean => "b",
            KeyType::Int => "i",
            KeyType::UInt => "u",
            KeyType::Double => "d",
            KeyType::String => "s",
            KeyType::StringList => "as",
        }
    }

    /// Map a GVariant type signature back to a key type. Signatures outside
    /// the supported set return `None`.
    pub fn from_signature(sig: &str) -> Option<Self> {
        match sig {
            "b" => Some(KeyType::Boolean),
            "i" => Some(KeyType::Int),
            "u" => Some(KeyType::UInt),
            "d" => Some(KeyType::Double),
            "s" => Some(KeyType::String),
            "as" => Some(KeyType::StringList),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Int(i32),
    UInt(u32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
}

impl SettingValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            SettingValue::Boolean(_) => KeyType::Boolean,
            SettingValue::Int(_) => KeyType::Int,
            SettingValue::UInt(_) => KeyType::UInt,
            SettingValue::Double(_) => KeyType::Double,
            SettingValue::String(_) => KeyType::String,
            SettingValue::StringList(_) => KeyType::StringList,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            SettingValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            SettingValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view used for range checks. `None` for non-integer values.
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(i64::from(*v)),
            SettingValue::UInt(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Boolean(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v)
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::UInt(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Double(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_owned())
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(v: Vec<String>) -> Self {
        SettingValue::StringList(v)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Same text form `gsettings get` prints.
impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(v) => write!(f, "{v}"),
            SettingValue::Int(v) => write!(f, "{v}"),
            SettingValue::UInt(v) => write!(f, "uint32 {v}"),
            SettingValue::Double(v) => write!(f, "{v:?}"),
            SettingValue::String(v) => f.write_str(&quote(v)),
            SettingValue::StringList(items) if items.is_empty() => f.write_str("@as []"),
            SettingValue::StringList(items) => {
                let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
                write!(f, "[{}]", quoted.join(", "))
            }
        }
    }
}

/// Parse command-line text into a value of type `ty`.
///
/// Accepts the text form produced by `Display`, so output of `get` can be fed
/// back into `set`. String lists also accept a JSON array.
pub fn parse_value(ty: KeyType, raw: &str) -> Result<SettingValue, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidValue {
        ty,
        input: raw.to_owned(),
        reason,
    };
    let trimmed = raw.trim();
    match ty {
        KeyType::Boolean => match trimmed {
            "true" => Ok(SettingValue::Boolean(true)),
            "false" => Ok(SettingValue::Boolean(false)),
            _ => Err(invalid("expected 'true' or 'false'".to_owned())),
        },
        KeyType::Int => trimmed
            .parse::<i32>()
            .map(SettingValue::Int)
            .map_err(|e| invalid(e.to_string())),
        KeyType::UInt => trimmed
            .strip_prefix("uint32")
            .map_or(trimmed, str::trim_start)
            .parse::<u32>()
            .map(SettingValue::UInt)
            .map_err(|e| invalid(e.to_string())),
        KeyType::Double => trimmed
            .parse::<f64>()
            .map(SettingValue::Double)
            .map_err(|e| invalid(e.to_string())),
        KeyType::String => {
            if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
                if let Ok(mut items) = parse_quoted_items(trimmed) {
                    if items.len() == 1 {
                        return Ok(SettingValue::String(items.remove(0)));
                    }
                }
            }
            Ok(SettingValue::String(raw.to_owned()))
        }
        KeyType::StringList => {
            let body = trimmed.strip_prefix("@as").map_or(trimmed, str::trim_start);
            if let Ok(list) = serde_json::from_str::<Vec<String>>(body) {
                return Ok(SettingValue::StringList(list));
            }
            let inner = body
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| invalid("expected a bracketed list".to_owned()))?;
            parse_quoted_items(inner)
                .map(SettingValue::StringList)
                .map_err(invalid)
        }
    }
}

/// Split `'a', "b", 'c\'d'` into its unquoted items.
fn parse_quoted_items(input: &str) -> Result<Vec<String>, String> {
    let mut items = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let quote = match chars.next() {
            None => break,
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(format!("unexpected character '{c}'")),
        };
        let mut item = String::new();
        loop {
            match chars.next() {
                None => return Err("unterminated string".to_owned()),
                Some('\\') => match chars.next() {
                    Some(c) => item.push(c),
                    None => return Err("dangling escape".to_owned()),
                },
                Some(c) if c == quote => break,
                Some(c) => item.push(c),
            }
        }
        items.push(item);
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(c) => return Err(format!("expected ',' but found '{c}'")),
        }
    }
    Ok(items)
}
