//! Vector genomes for evolutionary computation.
//!
//! A [`VectorSpecies`] is read from a hierarchical parameter store and holds
//! per-gene bounds and operator settings. [`VectorIndividual`]s carry one of
//! several genome kinds and are reset, mutated, crossed over and serialized
//! through their species. [`DeBreeder`] and [`DeStatistics`] implement
//! Differential Evolution on float and double species.

pub mod breeding;
pub mod codec;
pub mod error;
pub mod evaluation;
pub mod fitness;
pub mod individual;
pub mod params;
pub mod population;
pub mod rng;
pub mod species;
pub mod warn_once;

// Re-export commonly used types for convenience
pub use breeding::{DeBreeder, DeStatistics, DeVariant, GenerationContext, RetryLimit};
pub use error::{GeneticError, OptionExt, Result, ResultExt};
pub use evaluation::{evaluate_population, Challenge};
pub use fitness::Fitness;
pub use individual::{Gene, Genome, RangeGene, VectorIndividual};
pub use params::{Parameter, ParameterDatabase, ParameterSource};
pub use population::{Population, Subpopulation};
pub use rng::{RandomNumberGenerator, RandomStreams};
pub use species::{GenomeKind, VectorSpecies};
