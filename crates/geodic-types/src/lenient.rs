//! Tolerant field decoders for manifest JSON.
//!
//! The catalog server is not strict about scalar types: counters and ids show
//! up as numbers or as numeric strings, optional text as `null`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value).ok_or_else(|| D::Error::custom(format!("expected an integer, got {value}")))
}

pub(crate) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_i64(&value).map(|n| n.max(0) as u64).unwrap_or(0))
}

pub(crate) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub(crate) fn opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let s = string(deserializer)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

pub(crate) fn string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect(),
        other => vec![other.to_string()],
    })
}

/// Two coordinate pairs; anything that is not a 2x2 numeric array decodes to
/// the zero box.
pub(crate) fn box2<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[[f64; 2]; 2], D::Error> {
    let value = Value::deserialize(deserializer)?;
    let pair = |v: &Value| -> Option<[f64; 2]> {
        let items = v.as_array()?;
        if items.len() != 2 {
            return None;
        }
        Some([value_to_f64(&items[0])?, value_to_f64(&items[1])?])
    };
    let parsed = value.as_array().and_then(|outer| {
        if outer.len() != 2 {
            return None;
        }
        Some([pair(&outer[0])?, pair(&outer[1])?])
    });
    Ok(parsed.unwrap_or_default())
}
