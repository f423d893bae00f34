use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scalar fitness where larger is better.
///
/// Unevaluated individuals carry `-inf`. `NaN` is never better than
/// anything, nor is anything better than `NaN`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fitness {
    pub value: f64,
}

impl Fitness {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    /// Strictly better than `other`.
    pub fn better_than(&self, other: &Fitness) -> bool {
        self.value > other.value
    }
}

impl Default for Fitness {
    fn default() -> Self {
        Self {
            value: f64::NEG_INFINITY,
        }
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<f64> for Fitness {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}
