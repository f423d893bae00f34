//! Closed sets of genome kinds, sizing rules and operator choices.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::GeneticError;

/// The element type stored in a vector genome.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenomeKind {
    Bit,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Gene,
}

impl GenomeKind {
    pub fn name(&self) -> &'static str {
        match self {
            GenomeKind::Bit => "bit",
            GenomeKind::Byte => "byte",
            GenomeKind::Short => "short",
            GenomeKind::Int => "int",
            GenomeKind::Long => "long",
            GenomeKind::Float => "float",
            GenomeKind::Double => "double",
            GenomeKind::Gene => "gene",
        }
    }

    /// Integer and floating kinds.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_integer(&self) -> bool {
        self.integer_range().is_some()
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, GenomeKind::Float | GenomeKind::Double)
    }

    /// Inclusive value range of integer kinds.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            GenomeKind::Byte => Some((i8::MIN as i64, i8::MAX as i64)),
            GenomeKind::Short => Some((i16::MIN as i64, i16::MAX as i64)),
            GenomeKind::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            GenomeKind::Long => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for GenomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GenomeKind {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bit" | "boolean" => Ok(GenomeKind::Bit),
            "byte" => Ok(GenomeKind::Byte),
            "short" => Ok(GenomeKind::Short),
            "int" | "integer" => Ok(GenomeKind::Int),
            "long" => Ok(GenomeKind::Long),
            "float" => Ok(GenomeKind::Float),
            "double" => Ok(GenomeKind::Double),
            "gene" => Ok(GenomeKind::Gene),
            other => Err(GeneticError::Other(format!("unknown genome kind '{}'", other))),
        }
    }
}

/// How many genes a new individual receives.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GenomeSize {
    Fixed(usize),
    /// Start at `min` and grow by one while a Bernoulli(`probability`) trial succeeds.
    Geometric { min: usize, probability: f64 },
    /// Uniform over `[min, max]`.
    Uniform { min: usize, max: usize },
}

impl GenomeSize {
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, GenomeSize::Fixed(_))
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossoverType {
    OnePoint,
    TwoPoint,
    AnyPoint,
    Line,
    Intermediate,
    SimulatedBinary,
}

impl CrossoverType {
    pub fn name(&self) -> &'static str {
        match self {
            CrossoverType::OnePoint => "one",
            CrossoverType::TwoPoint => "two",
            CrossoverType::AnyPoint => "any",
            CrossoverType::Line => "line",
            CrossoverType::Intermediate => "intermediate",
            CrossoverType::SimulatedBinary => "sbx",
        }
    }
}

impl FromStr for CrossoverType {
    type Err = GeneticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "one" => Ok(CrossoverType::OnePoint),
            "two" => Ok(CrossoverType::TwoPoint),
            "any" => Ok(CrossoverType::AnyPoint),
            "line" => Ok(CrossoverType::Line),
            "intermediate" => Ok(CrossoverType::Intermediate),
            "sbx" => Ok(CrossoverType::SimulatedBinary),
            other => Err(GeneticError::Other(format!("unknown crossover type '{}'", other))),
        }
    }
}

/// Per-gene settings shared by every genome kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenePolicy {
    pub mutation_probability: f64,
    /// Extra attempts when a mutation leaves the gene unchanged.
    pub duplicate_retries: usize,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitMutation {
    Flip,
    Reset,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegerMutation {
    Reset,
    /// ±1 steps, continuing while a Bernoulli(`probability`) trial succeeds.
    RandomWalk { probability: f64 },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegerPolicy {
    pub min: i64,
    pub max: i64,
    pub mutation: IntegerMutation,
    pub bounded: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatMutation {
    Reset,
    Gaussian { stdev: f64 },
    Polynomial { distribution_index: f64, alternative: bool },
    IntegerReset,
    IntegerRandomWalk { probability: f64 },
}

impl FloatMutation {
    /// Whether the gene is treated as holding integral content.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            FloatMutation::IntegerReset | FloatMutation::IntegerRandomWalk { .. }
        )
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatPolicy {
    pub min: f64,
    pub max: f64,
    pub mutation: FloatMutation,
    pub bounded: bool,
    /// Out-of-bounds redraws before giving up; `0` never gives up.
    pub out_of_bounds_retries: usize,
}
