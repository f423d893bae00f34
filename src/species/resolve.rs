//! Layered lookup of per-gene settings.
//!
//! Every per-gene value is resolved from three layers: the global key
//! (`min-gene`), the segment covering the gene (`segment.2.min-gene`) and the
//! gene itself (`min-gene.7`). Later layers override earlier ones. Raw text is
//! kept together with the key it came from so that validation errors can name
//! the exact key.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{GeneticError, Result};
use crate::params::{Parameter, ParameterSource};

/// One level of the override hierarchy.
pub(super) struct Layer {
    base: Parameter,
    def: Parameter,
    gene: Option<usize>,
}

impl Layer {
    pub(super) fn global(base: &Parameter, def: &Parameter) -> Self {
        Self {
            base: base.clone(),
            def: def.clone(),
            gene: None,
        }
    }

    pub(super) fn segment(base: &Parameter, def: &Parameter, segment: usize) -> Self {
        Self {
            base: base.push(super::P_SEGMENT).push(segment),
            def: def.push(super::P_SEGMENT).push(segment),
            gene: None,
        }
    }

    pub(super) fn gene(base: &Parameter, def: &Parameter, gene: usize) -> Self {
        Self {
            base: base.clone(),
            def: def.clone(),
            gene: Some(gene),
        }
    }

    pub(super) fn keys(&self, name: &str) -> (Parameter, Parameter) {
        match self.gene {
            Some(i) => (self.base.push(name).push(i), self.def.push(name).push(i)),
            None => (self.base.push(name), self.def.push(name)),
        }
    }
}

#[derive(Debug, Clone)]
struct Setting {
    key: Parameter,
    raw: String,
}

/// The raw, not yet validated settings of one gene.
#[derive(Debug, Clone, Default)]
pub(super) struct RawGene {
    settings: HashMap<&'static str, Setting>,
}

impl RawGene {
    /// Copies every setting present in `layer`, returning the names found.
    pub(super) fn absorb(
        &mut self,
        params: &dyn ParameterSource,
        layer: &Layer,
        names: &[&'static str],
    ) -> Vec<&'static str> {
        let mut found = Vec::new();
        for &name in names {
            let (key, def) = layer.keys(name);
            if let Some((matched, raw)) = params.lookup(&key, Some(&def)) {
                self.settings.insert(
                    name,
                    Setting {
                        key: matched.clone(),
                        raw: raw.trim().to_string(),
                    },
                );
                found.push(name);
            }
        }
        found
    }

    pub(super) fn key(&self, name: &str) -> Option<&Parameter> {
        self.settings.get(name).map(|s| &s.key)
    }

    pub(super) fn string(&self, name: &str) -> Option<(&str, &Parameter)> {
        self.settings.get(name).map(|s| (s.raw.as_str(), &s.key))
    }

    fn parsed<T: FromStr>(&self, name: &str, what: &str) -> Result<Option<(T, &Parameter)>> {
        match self.settings.get(name) {
            None => Ok(None),
            Some(s) => s.raw.parse::<T>().map(|v| Some((v, &s.key))).map_err(|_| {
                GeneticError::configuration(&s.key, format!("expected {}, found '{}'", what, s.raw))
            }),
        }
    }

    pub(super) fn int(&self, name: &str) -> Result<Option<(i64, &Parameter)>> {
        self.parsed(name, "an integer")
    }

    pub(super) fn double(&self, name: &str) -> Result<Option<(f64, &Parameter)>> {
        self.parsed(name, "a number")
    }

    pub(super) fn boolean(&self, name: &str) -> Result<Option<(bool, &Parameter)>> {
        match self.settings.get(name) {
            None => Ok(None),
            Some(s) => match s.raw.to_ascii_lowercase().as_str() {
                "true" => Ok(Some((true, &s.key))),
                "false" => Ok(Some((false, &s.key))),
                _ => Err(GeneticError::configuration(
                    &s.key,
                    format!("expected true or false, found '{}'", s.raw),
                )),
            },
        }
    }

    /// A probability in `[0, 1]`.
    pub(super) fn probability(&self, name: &str) -> Result<Option<f64>> {
        match self.double(name)? {
            None => Ok(None),
            Some((p, _)) if (0.0..=1.0).contains(&p) => Ok(Some(p)),
            Some((p, key)) => Err(GeneticError::configuration(
                key,
                format!("must be within [0, 1], found {}", p),
            )),
        }
    }

    /// A non-negative count.
    pub(super) fn count(&self, name: &str) -> Result<Option<usize>> {
        match self.int(name)? {
            None => Ok(None),
            Some((n, key)) => usize::try_from(n).map(Some).map_err(|_| {
                GeneticError::configuration(key, format!("must be >= 0, found {}", n))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterDatabase;

    #[test]
    fn test_later_layers_override() {
        let params = ParameterDatabase::new()
            .with("s.min-gene", 0)
            .with("s.segment.0.min-gene", 1)
            .with("s.min-gene.2", 2);
        let base = Parameter::new("s");
        let def = Parameter::new("vector.species");

        let mut raw = RawGene::default();
        raw.absorb(&params, &Layer::global(&base, &def), &["min-gene"]);
        assert_eq!(raw.int("min-gene").unwrap().unwrap().0, 0);
        raw.absorb(&params, &Layer::segment(&base, &def, 0), &["min-gene"]);
        assert_eq!(raw.int("min-gene").unwrap().unwrap().0, 1);
        let found = raw.absorb(&params, &Layer::gene(&base, &def, 2), &["min-gene", "max-gene"]);
        assert_eq!(found, vec!["min-gene"]);
        let (value, key) = raw.int("min-gene").unwrap().unwrap();
        assert_eq!(value, 2);
        assert_eq!(key.as_str(), "s.min-gene.2");
    }

    #[test]
    fn test_default_key_is_consulted() {
        let params = ParameterDatabase::new().with("vector.species.mutation-prob", 0.1);
        let mut raw = RawGene::default();
        raw.absorb(
            &params,
            &Layer::global(&Parameter::new("s"), &Parameter::new("vector.species")),
            &["mutation-prob"],
        );
        assert_eq!(raw.probability("mutation-prob").unwrap(), Some(0.1));
    }

    #[test]
    fn test_probability_out_of_range() {
        let params = ParameterDatabase::new().with("s.mutation-prob", 1.5);
        let mut raw = RawGene::default();
        raw.absorb(
            &params,
            &Layer::global(&Parameter::new("s"), &Parameter::new("d")),
            &["mutation-prob"],
        );
        assert!(raw.probability("mutation-prob").is_err());
    }
}
