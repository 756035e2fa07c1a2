// src/config/overrides.rs

//! `--override OPTION.SUB=VALUE` support.
//!
//! Overrides are applied to the raw value tree before it is deserialized,
//! so the typed model sees them exactly like file contents.

use serde_yaml::{Mapping, Value};

use crate::errors::{BorgkeeperError, Result};

/// A single parsed override.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub keys: Vec<String>,
    pub value: Value,
}

/// Parse `a.b.c=value`. The value is read as YAML so `3`, `true` and
/// `[x, y]` arrive typed.
pub fn parse_override(raw: &str) -> Result<Override> {
    let (key_part, value_part) = raw.split_once('=').ok_or_else(|| {
        BorgkeeperError::InvalidArguments(format!(
            "invalid override '{raw}': expected OPTION.SUBOPTION=VALUE"
        ))
    })?;

    let keys: Vec<String> = key_part.trim().split('.').map(str::to_string).collect();
    if keys.iter().any(String::is_empty) {
        return Err(BorgkeeperError::InvalidArguments(format!(
            "invalid override '{raw}': empty option name"
        )));
    }

    let value = serde_yaml::from_str(value_part.trim())?;
    Ok(Override { keys, value })
}

/// Apply overrides in order, creating intermediate maps as needed.
pub fn apply_overrides(root: &mut Value, overrides: &[Override]) -> Result<()> {
    for ov in overrides {
        let mut node = &mut *root;
        for (index, key) in ov.keys.iter().enumerate() {
            if node.is_null() {
                *node = Value::Mapping(Mapping::new());
            }
            let Value::Mapping(map) = node else {
                return Err(BorgkeeperError::ConfigError(format!(
                    "cannot override '{}': '{}' is not a mapping",
                    ov.keys.join("."),
                    ov.keys[..index].join(".")
                )));
            };
            let key = Value::String(key.clone());
            if index == ov.keys.len() - 1 {
                map.insert(key, ov.value.clone());
                break;
            }
            node = map.entry(key).or_insert(Value::Null);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_values_are_typed() {
        let ov = parse_override("retries=3").unwrap();
        assert_eq!(ov.keys, vec!["retries"]);
        assert_eq!(ov.value, Value::Number(3.into()));

        let ov = parse_override("source_directories=[/home, /etc]").unwrap();
        assert!(ov.value.is_sequence());
    }

    #[test]
    fn nested_override_creates_maps() {
        let mut root: Value = serde_yaml::from_str("retries: 1").unwrap();
        let ov = parse_override("hooks.before_backup=[echo hi]").unwrap();
        apply_overrides(&mut root, &[ov]).unwrap();

        let hooks = root.get("hooks").and_then(|h| h.get("before_backup")).unwrap();
        assert_eq!(hooks[0], Value::String("echo hi".into()));
        assert_eq!(root.get("retries"), Some(&Value::Number(1.into())));
    }

    #[test]
    fn override_without_equals_is_rejected() {
        assert!(matches!(
            parse_override("retries"),
            Err(BorgkeeperError::InvalidArguments(_))
        ));
    }

    #[test]
    fn override_through_scalar_is_rejected() {
        let mut root: Value = serde_yaml::from_str("retries: 1").unwrap();
        let ov = parse_override("retries.count=2").unwrap();
        assert!(apply_overrides(&mut root, &[ov]).is_err());
    }
}
