//! # Error Types
//!
//! This module defines the error type shared by every part of the library.
//! Configuration problems are fatal: they surface from setup as
//! [`GeneticError::Configuration`] carrying the offending parameter key, and
//! the caller is expected to abort the run.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use vecgen::error::{GeneticError, Result};
//!
//! fn check_rate(rate: f64) -> Result<f64> {
//!     if !(0.0..=1.0).contains(&rate) {
//!         return Err(GeneticError::configuration("cr", "must be within [0, 1]"));
//!     }
//!     Ok(rate)
//! }
//!
//! assert!(check_rate(0.5).is_ok());
//! assert!(check_rate(1.5).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use vecgen::error::{GeneticError, OptionExt};
//!
//! fn first_index(values: &[usize]) -> vecgen::error::Result<usize> {
//!     values.first().cloned().ok_or_else_genetic(|| GeneticError::EmptyPopulation)
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur in the library.
#[derive(Error, Debug)]
pub enum GeneticError {
    /// A parameter is missing, malformed or outside its legal range.
    #[error("Configuration error at '{key}': {message}")]
    Configuration { key: String, message: String },

    /// Error that occurs when a breeding operation fails.
    #[error("Breeding error: {0}")]
    Breeding(String),

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// A subpopulation is too small for the requested operator.
    #[error("Subpopulation {subpop} has {size} individuals, at least {required} are required")]
    PopulationTooSmall {
        subpop: usize,
        size: usize,
        required: usize,
    },

    /// Two populations that must share a shape do not.
    #[error("Population mismatch: {0}")]
    PopulationMismatch(String),

    /// A genome of one kind met an operation or species of another.
    #[error("Genome kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Error that occurs when a maximum number of attempts is reached.
    #[error("Maximum attempts reached: {0}")]
    MaxAttemptsReached(String),

    /// Error that occurs when NaN or infinity values are encountered.
    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    /// A genotype could not be decoded.
    #[error("Codec error at position {position}: {message}")]
    Codec { position: usize, message: String },

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl GeneticError {
    /// Builds a [`GeneticError::Configuration`] for the given parameter key.
    pub fn configuration(key: impl fmt::Display, message: impl Into<String>) -> Self {
        GeneticError::Configuration {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn codec(position: usize, message: impl Into<String>) -> Self {
        GeneticError::Codec {
            position,
            message: message.into(),
        }
    }
}

/// A specialized Result type for library operations.
///
/// ## Examples
///
/// ```rust
/// use vecgen::error::Result;
///
/// fn may_fail() -> Result<i32> {
///     Ok(42)
/// }
/// ```
pub type Result<T> = std::result::Result<T, GeneticError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use vecgen::error::ResultExt;
/// use std::fs::File;
///
/// fn read_file(path: &str) -> vecgen::error::Result<()> {
///     File::open(path).context("Failed to open file")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Adds context to an error, converting it to a `GeneticError`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| GeneticError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an Option to a Result, generating the error lazily.
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_genetic<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> GeneticError,
    {
        self.ok_or_else(err_fn)
    }
}
