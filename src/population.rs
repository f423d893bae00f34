//! # Populations
//!
//! A `Population` is a list of subpopulations, each pairing a shared
//! [`VectorSpecies`] with the individuals bred from it.

use std::sync::Arc;

use crate::error::Result;
use crate::individual::VectorIndividual;
use crate::rng::RandomNumberGenerator;
use crate::species::VectorSpecies;

#[derive(Debug, Clone)]
pub struct Subpopulation {
    pub species: Arc<VectorSpecies>,
    pub individuals: Vec<VectorIndividual>,
}

impl Subpopulation {
    /// An empty subpopulation of `species`.
    pub fn new(species: Arc<VectorSpecies>) -> Self {
        Self {
            species,
            individuals: Vec::new(),
        }
    }

    /// Fills the subpopulation with `size` fresh individuals.
    pub fn populate(&mut self, size: usize, rng: &mut RandomNumberGenerator) -> Result<()> {
        self.individuals = (0..size)
            .map(|_| self.species.new_individual(rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Same species, no individuals, room for as many as this one holds.
    pub fn empty_clone(&self) -> Self {
        Self {
            species: Arc::clone(&self.species),
            individuals: Vec::with_capacity(self.individuals.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Population {
    pub subpops: Vec<Subpopulation>,
}

impl Population {
    pub fn new(subpops: Vec<Subpopulation>) -> Self {
        Self { subpops }
    }

    /// A population with the same species layout and no individuals.
    pub fn empty_clone(&self) -> Self {
        Self {
            subpops: self.subpops.iter().map(Subpopulation::empty_clone).collect(),
        }
    }

    /// Total number of individuals.
    pub fn len(&self) -> usize {
        self.subpops.iter().map(Subpopulation::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Parameter, ParameterDatabase};
    use crate::species::GenomeKind;

    fn species() -> Arc<VectorSpecies> {
        let params = ParameterDatabase::new()
            .with("s.genome-size", 3)
            .with("s.min-gene", 0)
            .with("s.max-gene", 5)
            .with("s.mutation-prob", 0.2);
        Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Int).unwrap())
    }

    #[test]
    fn test_populate_and_empty_clone() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mut subpop = Subpopulation::new(species());
        subpop.populate(7, &mut rng).unwrap();
        let population = Population::new(vec![subpop]);
        assert_eq!(population.len(), 7);

        let empty = population.empty_clone();
        assert!(empty.is_empty());
        assert_eq!(empty.subpops.len(), 1);
        assert!(Arc::ptr_eq(&empty.subpops[0].species, &population.subpops[0].species));
    }
}
