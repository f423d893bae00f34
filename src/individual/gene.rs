//! # Gene Trait
//!
//! Gene vectors hold arbitrary gene objects behind the `Gene` trait. Each
//! gene knows how to reset and mutate itself, compare and hash itself against
//! other genes, and read and write its own genotype text and binary forms.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::individual::{Gene, RangeGene};
//! use vecgen::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(3);
//! let mut gene = RangeGene::new(-2, 2);
//! gene.reset(&mut rng);
//! assert!((-2..=2).contains(&gene.value()));
//!
//! let copy = gene.box_clone();
//! assert!(gene.gene_eq(copy.as_ref()));
//! ```

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::codec::{BinaryReader, BinaryWriter, TextDecoder, TextEncoder};
use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;

/// A single gene object stored in a gene vector.
pub trait Gene: fmt::Debug + Send + Sync {
    /// Re-initializes the gene at random.
    fn reset(&mut self, rng: &mut RandomNumberGenerator);

    /// Perturbs the gene. Defaults to [`Gene::reset`].
    fn mutate(&mut self, rng: &mut RandomNumberGenerator) {
        self.reset(rng);
    }

    /// Value equality against a gene of any concrete type.
    fn gene_eq(&self, other: &dyn Gene) -> bool;

    /// Hash consistent with [`Gene::gene_eq`].
    fn gene_hash(&self) -> u64;

    fn box_clone(&self) -> Box<dyn Gene>;

    fn encode_text(&self, out: &mut TextEncoder);

    fn decode_text(&mut self, input: &mut TextDecoder<'_>) -> Result<()>;

    fn write_binary(&self, out: &mut BinaryWriter);

    fn read_binary(&mut self, input: &mut BinaryReader<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Gene> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// An integer gene confined to an inclusive range.
///
/// Mutation takes a single ±1 step, bouncing off the range ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeGene {
    min: i64,
    max: i64,
    value: i64,
}

impl RangeGene {
    /// A gene over `[min, max]`, initially at `min`. Reversed bounds are swapped.
    pub fn new(min: i64, max: i64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { min, max, value: min }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Sets the value, failing when it falls outside the gene's range.
    pub fn set_value(&mut self, value: i64) -> Result<()> {
        if value < self.min || value > self.max {
            return Err(GeneticError::InvalidNumericValue(format!(
                "{} is outside [{}, {}]",
                value, self.min, self.max
            )));
        }
        self.value = value;
        Ok(())
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}

impl Gene for RangeGene {
    fn reset(&mut self, rng: &mut RandomNumberGenerator) {
        self.value = rng.closed_interval(self.min, self.max);
    }

    fn mutate(&mut self, rng: &mut RandomNumberGenerator) {
        if self.min == self.max {
            return;
        }
        let up = if self.value == self.min {
            true
        } else if self.value == self.max {
            false
        } else {
            rng.next_bool()
        };
        self.value = if up { self.value + 1 } else { self.value - 1 };
    }

    fn gene_eq(&self, other: &dyn Gene) -> bool {
        other
            .as_any()
            .downcast_ref::<RangeGene>()
            .map_or(false, |o| o == self)
    }

    fn gene_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn box_clone(&self) -> Box<dyn Gene> {
        Box::new(self.clone())
    }

    fn encode_text(&self, out: &mut TextEncoder) {
        out.write_long(self.value);
    }

    fn decode_text(&mut self, input: &mut TextDecoder<'_>) -> Result<()> {
        let position = input.position();
        let value = input.read_long()?;
        self.set_value(value)
            .map_err(|e| GeneticError::codec(position, e.to_string()))
    }

    fn write_binary(&self, out: &mut BinaryWriter) {
        out.write_i64(self.value);
    }

    fn read_binary(&mut self, input: &mut BinaryReader<'_>) -> Result<()> {
        let position = input.position();
        let value = input.read_i64()?;
        self.set_value(value)
            .map_err(|e| GeneticError::codec(position, e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
