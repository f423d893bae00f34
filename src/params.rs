//! # Parameters
//!
//! Species and breeders are configured from a hierarchical key/value source.
//! Keys are dotted paths such as `pop.subpop.0.species.min-gene.3`; every
//! lookup names a primary key and, optionally, a default key consulted when
//! the primary one is absent.
//!
//! Typed getters return `Ok(None)` for absent keys and a
//! [`GeneticError::Configuration`] naming the key for malformed values. The
//! `require_*` variants additionally fail on absent keys.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::params::{Parameter, ParameterDatabase, ParameterSource};
//!
//! let params = ParameterDatabase::parse(
//!     "# species defaults\n\
//!      vector.species.min-gene = 0.0\n\
//!      pop.subpop.0.species.min-gene = -1.5\n",
//! )
//! .unwrap();
//!
//! let base = Parameter::new("pop.subpop.0.species");
//! let def = Parameter::new("vector.species");
//! let min = params
//!     .get_double(&base.push("min-gene"), Some(&def.push("min-gene")))
//!     .unwrap();
//! assert_eq!(min, Some(-1.5));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GeneticError, Result};

/// A dotted parameter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter(String);

impl Parameter {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns a new key with `segment` appended.
    pub fn push(&self, segment: impl fmt::Display) -> Parameter {
        if self.0.is_empty() {
            Parameter(segment.to_string())
        } else {
            Parameter(format!("{}.{}", self.0, segment))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::new(value)
    }
}

/// A source of raw parameter values.
///
/// Implementors only provide [`ParameterSource::get_raw`]; typed access is
/// layered on top.
pub trait ParameterSource {
    /// Returns the raw value stored under `key`, if any.
    fn get_raw(&self, key: &Parameter) -> Option<&str>;

    /// Resolves `key`, falling back to `default`, and reports which key matched.
    fn lookup<'a>(
        &'a self,
        key: &'a Parameter,
        default: Option<&'a Parameter>,
    ) -> Option<(&'a Parameter, &'a str)> {
        if let Some(value) = self.get_raw(key) {
            return Some((key, value));
        }
        default.and_then(|d| self.get_raw(d).map(|value| (d, value)))
    }

    fn exists(&self, key: &Parameter, default: Option<&Parameter>) -> bool {
        self.lookup(key, default).is_some()
    }

    fn get_string(&self, key: &Parameter, default: Option<&Parameter>) -> Option<String> {
        self.lookup(key, default).map(|(_, v)| v.trim().to_string())
    }

    fn get_int(&self, key: &Parameter, default: Option<&Parameter>) -> Result<Option<i64>> {
        parse_typed(self.lookup(key, default), "an integer")
    }

    fn get_double(&self, key: &Parameter, default: Option<&Parameter>) -> Result<Option<f64>> {
        parse_typed(self.lookup(key, default), "a number")
    }

    fn get_bool(&self, key: &Parameter, default: Option<&Parameter>) -> Result<Option<bool>> {
        match self.lookup(key, default) {
            None => Ok(None),
            Some((k, v)) => match v.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => Err(GeneticError::configuration(
                    k,
                    format!("expected true or false, found '{}'", other),
                )),
            },
        }
    }

    fn require_string(&self, key: &Parameter, default: Option<&Parameter>) -> Result<String> {
        self.get_string(key, default)
            .ok_or_else(|| missing(key, default))
    }

    fn require_int(&self, key: &Parameter, default: Option<&Parameter>) -> Result<i64> {
        self.get_int(key, default)?
            .ok_or_else(|| missing(key, default))
    }

    fn require_double(&self, key: &Parameter, default: Option<&Parameter>) -> Result<f64> {
        self.get_double(key, default)?
            .ok_or_else(|| missing(key, default))
    }
}

fn parse_typed<T: FromStr>(found: Option<(&Parameter, &str)>, what: &str) -> Result<Option<T>> {
    match found {
        None => Ok(None),
        Some((key, raw)) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            GeneticError::configuration(key, format!("expected {}, found '{}'", what, raw.trim()))
        }),
    }
}

fn missing(key: &Parameter, default: Option<&Parameter>) -> GeneticError {
    match default {
        Some(d) => GeneticError::configuration(key, format!("missing (default key '{}' also absent)", d)),
        None => GeneticError::configuration(key, "missing"),
    }
}

/// In-memory parameter store.
#[derive(Debug, Clone, Default)]
pub struct ParameterDatabase {
    values: HashMap<String, String>,
}

impl ParameterDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl fmt::Display) -> &mut Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Builder-style variant of [`ParameterDatabase::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Parses `key = value` lines. Blank lines and lines starting with `#`
    /// are ignored; later assignments override earlier ones.
    pub fn parse(text: &str) -> Result<Self> {
        let mut db = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                GeneticError::configuration(
                    format!("line {}", lineno + 1),
                    format!("expected 'key = value', found '{}'", line),
                )
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(GeneticError::configuration(
                    format!("line {}", lineno + 1),
                    "empty key",
                ));
            }
            db.set(key, value.trim());
        }
        Ok(db)
    }

    /// Loads and parses a parameter file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ParameterSource for ParameterDatabase {
    fn get_raw(&self, key: &Parameter) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_builds_dotted_keys() {
        let base = Parameter::new("pop.subpop.0.species");
        assert_eq!(base.push("min-gene").push(3).as_str(), "pop.subpop.0.species.min-gene.3");
        assert_eq!(Parameter::new("").push("f").as_str(), "f");
    }

    #[test]
    fn test_default_key_fallback() {
        let db = ParameterDatabase::new().with("vector.species.mutation-prob", 0.25);
        let key = Parameter::new("pop.subpop.0.species.mutation-prob");
        let def = Parameter::new("vector.species.mutation-prob");
        assert_eq!(db.get_double(&key, Some(&def)).unwrap(), Some(0.25));
        assert_eq!(db.get_double(&key, None).unwrap(), None);
    }

    #[test]
    fn test_malformed_value_names_key() {
        let db = ParameterDatabase::new().with("es.f", "fast");
        let err = db.get_double(&Parameter::new("es.f"), None).unwrap_err();
        match err {
            GeneticError::Configuration { key, .. } => assert_eq!(key, "es.f"),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_require_missing_fails() {
        let db = ParameterDatabase::new();
        assert!(db.require_int(&Parameter::new("genome-size"), None).is_err());
    }

    #[test]
    fn test_bool_parsing() {
        let db = ParameterDatabase::new()
            .with("a", "TRUE")
            .with("b", "false")
            .with("c", "yes");
        assert_eq!(db.get_bool(&"a".into(), None).unwrap(), Some(true));
        assert_eq!(db.get_bool(&"b".into(), None).unwrap(), Some(false));
        assert!(db.get_bool(&"c".into(), None).is_err());
    }

    #[test]
    fn test_parse_text() {
        let db = ParameterDatabase::parse(
            "# comment\n\n genome-size = 10 \nchunk-size=2\ngenome-size = 12\n",
        )
        .unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.get_int(&"genome-size".into(), None).unwrap(), Some(12));
        assert!(ParameterDatabase::parse("no equals sign").is_err());
    }
}
