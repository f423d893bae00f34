//! # Evaluation
//!
//! A [`Challenge`] scores individuals; [`evaluate_population`] assigns those
//! scores as fitness to every unevaluated individual, in parallel once a
//! subpopulation is large enough.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vecgen::evaluation::{evaluate_population, Challenge};
//! use vecgen::individual::{Genome, VectorIndividual};
//! use vecgen::params::{Parameter, ParameterDatabase};
//! use vecgen::population::{Population, Subpopulation};
//! use vecgen::rng::RandomNumberGenerator;
//! use vecgen::species::{GenomeKind, VectorSpecies};
//!
//! struct NegatedSphere;
//!
//! impl Challenge for NegatedSphere {
//!     fn score(&self, individual: &VectorIndividual) -> f64 {
//!         match &individual.genome {
//!             Genome::Double(v) => -v.iter().map(|x| x * x).sum::<f64>(),
//!             _ => f64::NEG_INFINITY,
//!         }
//!     }
//! }
//!
//! let params = ParameterDatabase::new()
//!     .with("s.genome-size", 2)
//!     .with("s.min-gene", -1.0)
//!     .with("s.max-gene", 1.0)
//!     .with("s.mutation-prob", 0.5);
//! let species = Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Double).unwrap());
//! let mut subpop = Subpopulation::new(species);
//! subpop.populate(10, &mut RandomNumberGenerator::from_seed(1)).unwrap();
//! let mut population = Population::new(vec![subpop]);
//!
//! let evaluated = evaluate_population(&mut population, &NegatedSphere, 1000).unwrap();
//! assert_eq!(evaluated, 10);
//! ```

use rayon::prelude::*;
use tracing::debug;

use crate::error::{GeneticError, Result};
use crate::fitness::Fitness;
use crate::individual::VectorIndividual;
use crate::population::Population;

/// Scores an individual. Larger is better.
pub trait Challenge: Send + Sync {
    fn score(&self, individual: &VectorIndividual) -> f64;
}

fn score_checked<C: Challenge + ?Sized>(challenge: &C, individual: &VectorIndividual) -> Result<f64> {
    let score = challenge.score(individual);
    if score.is_finite() {
        Ok(score)
    } else {
        Err(GeneticError::InvalidNumericValue(format!(
            "challenge returned a non-finite score: {}",
            score
        )))
    }
}

/// Evaluates every individual whose `evaluated` flag is unset and returns how
/// many were scored. Subpopulations with at least `parallel_threshold`
/// individuals are scored with rayon.
///
/// # Errors
///
/// Returns [`GeneticError::InvalidNumericValue`] if the challenge produces a
/// NaN or infinite score. Individuals scored before the failure keep their
/// new fitness.
pub fn evaluate_population<C: Challenge + ?Sized>(
    population: &mut Population,
    challenge: &C,
    parallel_threshold: usize,
) -> Result<usize> {
    let mut evaluated = 0;
    for (index, subpop) in population.subpops.iter_mut().enumerate() {
        let pending = subpop.individuals.iter().filter(|i| !i.evaluated).count();
        if pending == 0 {
            continue;
        }

        let assign = |individual: &mut VectorIndividual| -> Result<()> {
            if !individual.evaluated {
                individual.fitness = Fitness::new(score_checked(challenge, individual)?);
                individual.evaluated = true;
            }
            Ok(())
        };

        if subpop.len() >= parallel_threshold {
            subpop.individuals.par_iter_mut().try_for_each(assign)?;
        } else {
            subpop.individuals.iter_mut().try_for_each(assign)?;
        }
        debug!(subpop = index, pending, "evaluated subpopulation");
        evaluated += pending;
    }
    Ok(evaluated)
}
