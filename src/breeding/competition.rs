//! One-to-one survivor selection for Differential Evolution.
//!
//! After the children bred by [`DeBreeder`](super::DeBreeder) are evaluated,
//! each child competes against the parent that occupied its slot. The parent
//! survives only when it is strictly fitter, so ties go to the child.

use tracing::debug;

use crate::breeding::de::GenerationContext;
use crate::error::{GeneticError, Result};
use crate::population::Population;

/// Observer run after the competition has settled the population.
pub trait StatisticsHook: Send {
    fn post_evaluation(&mut self, population: &Population);
}

impl<F> StatisticsHook for F
where
    F: FnMut(&Population) + Send,
{
    fn post_evaluation(&mut self, population: &Population) {
        self(population)
    }
}

/// Runs the parent/child competition, then forwards to any registered hooks.
#[derive(Default)]
pub struct DeStatistics {
    hooks: Vec<Box<dyn StatisticsHook>>,
}

impl std::fmt::Debug for DeStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeStatistics")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl DeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: impl StatisticsHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn add_hook(&mut self, hook: impl StatisticsHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Puts each retained parent back into its slot when it beats the child
    /// there, and returns how many parents survived.
    ///
    /// The retained population is consumed. Without one (the first
    /// generation) nothing is replaced and the hooks still run.
    ///
    /// # Errors
    ///
    /// [`GeneticError::PopulationMismatch`] when the retained population
    /// differs from `population` in subpopulation count or size.
    pub fn post_evaluation(
        &mut self,
        population: &mut Population,
        context: &mut GenerationContext,
    ) -> Result<usize> {
        let mut survivors = 0;
        if let Some(previous) = context.take_previous() {
            if previous.subpops.len() != population.subpops.len() {
                return Err(GeneticError::PopulationMismatch(format!(
                    "previous population has {} subpopulations, current has {}",
                    previous.subpops.len(),
                    population.subpops.len()
                )));
            }
            for (index, (old, new)) in previous.subpops.iter().zip(&population.subpops).enumerate() {
                if old.len() != new.len() {
                    return Err(GeneticError::PopulationMismatch(format!(
                        "subpopulation {} had {} individuals, now has {}",
                        index,
                        old.len(),
                        new.len()
                    )));
                }
            }

            for (index, (old, new)) in previous
                .subpops
                .into_iter()
                .zip(population.subpops.iter_mut())
                .enumerate()
            {
                let mut kept = 0;
                for (parent, slot) in old.individuals.into_iter().zip(new.individuals.iter_mut()) {
                    if parent.fitness.better_than(&slot.fitness) {
                        *slot = parent;
                        kept += 1;
                    }
                }
                debug!(subpop = index, kept, "parents surviving competition");
                survivors += kept;
            }
        }

        for hook in &mut self.hooks {
            hook.post_evaluation(population);
        }
        Ok(survivors)
    }
}
