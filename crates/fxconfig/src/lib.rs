//! Flat key/value configuration for window transition effects.
//!
//! Values live under stable `plugin:hfx:<name>` keys. Every key that the
//! engine reads is registered up front with a typed default; user values
//! loaded from TOML are coerced to the type of that default. Reads never fail:
//! a missing or mistyped user value falls back to the registered default.

mod color;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

pub use color::{parse_color, Color};

/// Prefix shared by every key the effect engine reads.
pub const KEY_PREFIX: &str = "plugin:hfx:";

pub const OPEN_EFFECT_KEY: &str = "plugin:hfx:open_effect";
pub const CLOSE_EFFECT_KEY: &str = "plugin:hfx:close_effect";
pub const DURATION_KEY: &str = "plugin:hfx:duration";
pub const STRICT_SHADERS_KEY: &str = "plugin:hfx:strict_shaders";

pub const DEFAULT_EFFECT: &str = "fire";
pub const DEFAULT_DURATION_SECS: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Str(String),
    Float(f64),
    Int(i64),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Str(_) => ValueKind::Str,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::Int(_) => ValueKind::Int,
        }
    }

    /// Packs a color literal, for use as an effect default.
    ///
    /// Invalid literals are a programming error in a built-in default and
    /// degrade to fully transparent black.
    pub fn color(literal: &str) -> Self {
        ConfigValue::Int(i64::from(parse_color(literal).unwrap_or(0)))
    }

    /// Converts `self` into the type of `like`, if a sensible conversion exists.
    fn coerce_to(&self, like: ValueKind) -> Option<ConfigValue> {
        match (self, like) {
            (value, kind) if value.kind() == kind => Some(value.clone()),
            (ConfigValue::Int(value), ValueKind::Float) => Some(ConfigValue::Float(*value as f64)),
            (ConfigValue::Float(value), ValueKind::Int) if value.fract() == 0.0 => {
                Some(ConfigValue::Int(*value as i64))
            }
            (ConfigValue::Str(raw), ValueKind::Float) => parse_seconds(raw).map(ConfigValue::Float),
            (ConfigValue::Str(raw), ValueKind::Int) => parse_int_like(raw).map(ConfigValue::Int),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(value) => write!(f, "\"{value}\""),
            ConfigValue::Float(value) => write!(f, "{value}"),
            ConfigValue::Int(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Float,
    Int,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Str => f.write_str("string"),
            ValueKind::Float => f.write_str("float"),
            ValueKind::Int => f.write_str("int"),
        }
    }
}

/// Read access to configuration values by key.
///
/// Only [`value`](ConfigSource::value) is required; the typed getters return
/// `None` when the key is absent or holds an incompatible type, leaving the
/// caller to apply its documented default.
pub trait ConfigSource {
    fn value(&self, key: &str) -> Option<&ConfigValue>;

    fn get_str(&self, key: &str) -> Option<&str> {
        match self.value(key)? {
            ConfigValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        match self.value(key)? {
            ConfigValue::Float(value) => Some(*value),
            ConfigValue::Int(value) => Some(*value as f64),
            ConfigValue::Str(_) => None,
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.value(key)? {
            ConfigValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_int(key).map(|value| value != 0)
    }

    /// Reads a packed `0xAARRGGBB` value and unpacks it.
    fn get_color(&self, key: &str) -> Option<Color> {
        let packed = self.get_int(key)?;
        u32::try_from(packed).ok().map(Color::from_argb)
    }
}

/// Registered defaults plus user overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    defaults: BTreeMap<String, ConfigValue>,
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the engine's core keys.
    pub fn with_core_defaults() -> Self {
        let mut store = Self::new();
        store.register_core_defaults();
        store
    }

    /// Declares the engine's core keys, converting values already set for them.
    pub fn register_core_defaults(&mut self) {
        self.register_default(OPEN_EFFECT_KEY, ConfigValue::Str(DEFAULT_EFFECT.into()));
        self.register_default(CLOSE_EFFECT_KEY, ConfigValue::Str(DEFAULT_EFFECT.into()));
        self.register_default(DURATION_KEY, ConfigValue::Float(DEFAULT_DURATION_SECS));
        self.register_default(STRICT_SHADERS_KEY, ConfigValue::Int(0));
    }

    /// Declares a key and its typed default.
    ///
    /// A user value set before the default was known is re-coerced to the new
    /// default's type.
    pub fn register_default(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        if let Some(existing) = self.values.get_mut(&key) {
            if let Some(coerced) = existing.coerce_to(value.kind()) {
                *existing = coerced;
            }
        }
        self.defaults.insert(key, value);
    }

    /// Sets a user value, coercing it to the registered default's type when possible.
    ///
    /// Values that cannot be coerced are kept verbatim so `validate` can report
    /// them, but reads keep returning the default.
    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        let value = match self.defaults.get(&key) {
            Some(default) => value.coerce_to(default.kind()).unwrap_or(value),
            None => value,
        };
        self.values.insert(key, value);
    }

    pub fn default_value(&self, key: &str) -> Option<&ConfigValue> {
        self.defaults.get(key)
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.defaults.contains_key(key)
    }

    /// Parses TOML text into a fresh store without registered defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut store = Self::new();
        store.merge_toml_str(input)?;
        Ok(store)
    }

    /// Merges TOML text into this store.
    ///
    /// Nested tables are flattened with `:`, so `[plugin.hfx] duration = 2`
    /// lands under `plugin:hfx:duration`.
    pub fn merge_toml_str(&mut self, input: &str) -> Result<(), ConfigError> {
        let table: toml::Table = input.parse()?;
        let mut flattened = Vec::new();
        flatten_table("", &table, &mut flattened)?;
        for (key, value) in flattened {
            self.set(key, value);
        }
        Ok(())
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.merge_toml_str(&input)?;
        tracing::debug!(path = %path.display(), "merged configuration file");
        Ok(())
    }

    /// Checks every user value against the registered defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in &self.values {
            let Some(default) = self.defaults.get(key) else {
                return Err(ConfigError::Invalid(format!("unknown key '{key}'")));
            };
            if value.kind() != default.kind() {
                return Err(ConfigError::Invalid(format!(
                    "key '{key}' expects a {} value, got {value}",
                    default.kind()
                )));
            }
        }
        Ok(())
    }

    /// Effective value of every registered or user-set key, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        let mut keys: Vec<&String> = self.defaults.keys().chain(self.values.keys()).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter()
            .filter_map(|key| self.value(key).map(|value| (key.as_str(), value)))
    }
}

impl ConfigSource for ConfigStore {
    fn value(&self, key: &str) -> Option<&ConfigValue> {
        let default = self.defaults.get(key);
        match (self.values.get(key), default) {
            (Some(value), Some(default)) if value.kind() != default.kind() => Some(default),
            (Some(value), _) => Some(value),
            (None, default) => default,
        }
    }
}

fn flatten_table(
    prefix: &str,
    table: &toml::Table,
    out: &mut Vec<(String, ConfigValue)>,
) -> Result<(), ConfigError> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}:{name}")
        };
        match value {
            toml::Value::Table(inner) => flatten_table(&key, inner, out)?,
            toml::Value::String(value) => out.push((key, ConfigValue::Str(value.clone()))),
            toml::Value::Integer(value) => out.push((key, ConfigValue::Int(*value))),
            toml::Value::Float(value) => out.push((key, ConfigValue::Float(*value))),
            toml::Value::Boolean(value) => out.push((key, ConfigValue::Int(i64::from(*value)))),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "key '{key}' has unsupported {} value",
                    other.type_str()
                )))
            }
        }
    }
    Ok(())
}

/// Seconds as a number, or a human-readable duration such as `"800ms"`.
fn parse_seconds(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value);
    }
    humantime::parse_duration(trimmed)
        .ok()
        .map(|duration| duration.as_secs_f64())
}

/// Booleans, plain integers, and color literals.
fn parse_int_like(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => return Some(1),
        "false" | "no" | "off" => return Some(0),
        _ => {}
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    parse_color(trimmed).ok().map(i64::from)
}
