//! # Differential Evolution Breeders
//!
//! A `DeBreeder` replaces every individual of a float or double
//! subpopulation with a child built from scaled differences between donor
//! individuals:
//!
//! - **rand/1/bin**: `d0 + F * (d1 - d2)` with three random donors, retried
//!   until the child lies within bounds, then binomially crossed with its
//!   target.
//! - **best/1/bin**: like rand/1/bin with `d0` fixed to the best individual of
//!   the subpopulation and `F` jittered per gene by `f_noise`. A bounded
//!   number of retries, after which the child is reset.
//! - **rand/1/either-or**: per gene, the rand/1 rule with probability `pf`,
//!   otherwise `d0 + (F + 1) / 2 * (d1 + d2 - 2 * d0)`. No crossover.
//!
//! State that lives for exactly one generation (the best index per
//! subpopulation and the population just replaced) is kept in a
//! [`GenerationContext`] owned by the caller.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vecgen::breeding::{DeBreeder, GenerationContext};
//! use vecgen::params::{Parameter, ParameterDatabase};
//! use vecgen::population::{Population, Subpopulation};
//! use vecgen::rng::{RandomNumberGenerator, RandomStreams};
//! use vecgen::species::{GenomeKind, VectorSpecies};
//!
//! let params = ParameterDatabase::new()
//!     .with("s.genome-size", 3)
//!     .with("s.min-gene", 0.0)
//!     .with("s.max-gene", 1.0)
//!     .with("s.mutation-prob", 0.0);
//! let species = Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Double).unwrap());
//! let mut subpop = Subpopulation::new(species);
//! subpop.populate(8, &mut RandomNumberGenerator::from_seed(1)).unwrap();
//! let population = Population::new(vec![subpop]);
//!
//! let breeder = DeBreeder::builder().f(0.5).cr(0.9).build().unwrap();
//! let mut context = GenerationContext::new();
//! let mut streams = RandomStreams::from_seed(7, 1);
//! let next = breeder.breed_population(&population, &mut context, &mut streams).unwrap();
//!
//! assert_eq!(next.len(), 8);
//! assert!(context.previous_population.is_some());
//! ```

use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{GeneticError, OptionExt, Result};
use crate::individual::genome::Numeric;
use crate::individual::{Genome, VectorIndividual};
use crate::params::{Parameter, ParameterSource};
use crate::population::{Population, Subpopulation};
use crate::rng::{RandomNumberGenerator, RandomStreams};
use crate::warn_once::WarnOnce;

/// Default base consulted when a key is missing under the breeder base.
pub const DEFAULT_BASE: &str = "de";

pub const P_F: &str = "f";
pub const P_CR: &str = "cr";
pub const P_F_NOISE: &str = "f-noise";
pub const P_PF: &str = "pf";
pub const P_VARIANT: &str = "variant";
pub const P_OUT_OF_BOUNDS_RETRIES: &str = "out-of-bounds-retries";
pub const P_VALIDITY_RETRIES: &str = "validity-retries";
pub const P_BREED_THREADS: &str = "breed-threads";

/// Donors plus the target slot.
pub const MIN_SUBPOPULATION_SIZE: usize = 4;

const DEFAULT_RETRIES: usize = 100;
const DEFAULT_F: f64 = 0.5;
const ASSUMED_CR: f64 = 0.5;

/// How often a failed attempt may be repeated.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryLimit {
    #[default]
    Unbounded,
    /// At least one retry. A count of `0` is spelled [`RetryLimit::Unbounded`],
    /// matching the `validity-retries` parameter.
    Limited(usize),
}

impl RetryLimit {
    /// `0` means unbounded.
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            RetryLimit::Unbounded
        } else {
            RetryLimit::Limited(count)
        }
    }

    fn exhausted(&self, failures: usize) -> bool {
        match self {
            RetryLimit::Unbounded => false,
            RetryLimit::Limited(cap) => failures > *cap,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeVariant {
    /// Gives up with [`GeneticError::MaxAttemptsReached`] once a limited
    /// validity budget is spent.
    RandOneBin { validity_retries: RetryLimit },
    /// Resets the child after `retries + 1` invalid attempts.
    BestOneBin { f_noise: f64, retries: usize },
    /// Resets the child after `retries + 1` invalid attempts.
    RandOneEitherOr { pf: f64, retries: usize },
}

impl DeVariant {
    pub fn name(&self) -> &'static str {
        match self {
            DeVariant::RandOneBin { .. } => "rand/1/bin",
            DeVariant::BestOneBin { .. } => "best/1/bin",
            DeVariant::RandOneEitherOr { .. } => "rand/1/either-or",
        }
    }
}

impl Default for DeVariant {
    fn default() -> Self {
        DeVariant::RandOneBin {
            validity_retries: RetryLimit::Unbounded,
        }
    }
}

/// Per-generation breeder state.
#[derive(Debug, Default)]
pub struct GenerationContext {
    /// Index of the fittest individual of each subpopulation, as of the last
    /// [`DeBreeder::prepare`].
    pub best_so_far: Vec<usize>,
    /// The population replaced by the last breeding call, until the
    /// competition step consumes it.
    pub previous_population: Option<Population>,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the retained population.
    pub fn take_previous(&mut self) -> Option<Population> {
        self.previous_population.take()
    }
}

#[derive(Debug, Clone)]
pub struct DeBreeder {
    f: f64,
    cr: Option<f64>,
    variant: DeVariant,
    breed_threads: usize,
    cr_warning: WarnOnce,
}

fn check_unit(key: impl std::fmt::Display, name: &str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GeneticError::configuration(
            key,
            format!("{} must be within [0, 1], found {}", name, value),
        ))
    }
}

impl DeBreeder {
    pub fn builder() -> DeBreederBuilder {
        DeBreederBuilder::default()
    }

    /// Reads the breeder from `params` under `base`, falling back to `de`.
    ///
    /// `variant` selects `rand/1/bin` (default), `best/1/bin` or
    /// `rand/1/either-or`.
    #[instrument(level = "debug", skip(params), fields(base = %base))]
    pub fn setup(params: &dyn ParameterSource, base: &Parameter) -> Result<Self> {
        let def = Parameter::new(DEFAULT_BASE);
        let key = |name: &str| (base.push(name), def.push(name));

        let (f_key, f_def) = key(P_F);
        let f = check_unit(&f_key, P_F, params.require_double(&f_key, Some(&f_def))?)?;

        let (cr_key, cr_def) = key(P_CR);
        let cr = params
            .get_double(&cr_key, Some(&cr_def))?
            .map(|cr| check_unit(&cr_key, P_CR, cr))
            .transpose()?;

        let count = |name: &str, default: usize| -> Result<usize> {
            let (k, d) = key(name);
            match params.get_int(&k, Some(&d))? {
                None => Ok(default),
                Some(n) => usize::try_from(n)
                    .map_err(|_| GeneticError::configuration(&k, format!("must be >= 0, found {}", n))),
            }
        };

        let (variant_key, variant_def) = key(P_VARIANT);
        let variant = match params.get_string(&variant_key, Some(&variant_def)).as_deref() {
            None | Some("rand/1/bin") => DeVariant::RandOneBin {
                validity_retries: RetryLimit::from_count(count(P_VALIDITY_RETRIES, 0)?),
            },
            Some("best/1/bin") => {
                let (k, d) = key(P_F_NOISE);
                let f_noise = params.require_double(&k, Some(&d))?;
                if !(f_noise.is_finite() && f_noise >= 0.0) {
                    return Err(GeneticError::configuration(
                        &k,
                        format!("must be a finite value >= 0, found {}", f_noise),
                    ));
                }
                DeVariant::BestOneBin {
                    f_noise,
                    retries: count(P_OUT_OF_BOUNDS_RETRIES, DEFAULT_RETRIES)?,
                }
            }
            Some("rand/1/either-or") => {
                let (k, d) = key(P_PF);
                DeVariant::RandOneEitherOr {
                    pf: check_unit(&k, P_PF, params.require_double(&k, Some(&d))?)?,
                    retries: count(P_OUT_OF_BOUNDS_RETRIES, DEFAULT_RETRIES)?,
                }
            }
            Some(other) => {
                return Err(GeneticError::configuration(
                    &variant_key,
                    format!(
                        "expected rand/1/bin, best/1/bin or rand/1/either-or, found '{}'",
                        other
                    ),
                ))
            }
        };

        let breed_threads = count(P_BREED_THREADS, 1)?;
        if breed_threads == 0 {
            let (k, _) = key(P_BREED_THREADS);
            return Err(GeneticError::configuration(k, "must be >= 1"));
        }

        Self::new(f, cr, variant, breed_threads)
    }

    fn new(f: f64, cr: Option<f64>, variant: DeVariant, breed_threads: usize) -> Result<Self> {
        if matches!(variant, DeVariant::RandOneEitherOr { .. }) && cr.is_some() {
            warn!("cr is set but rand/1/either-or applies no crossover; it will be ignored");
        }
        Ok(Self {
            f,
            cr,
            variant,
            breed_threads,
            cr_warning: WarnOnce::new(),
        })
    }

    pub fn f(&self) -> f64 {
        self.f
    }

    pub fn cr(&self) -> Option<f64> {
        self.cr
    }

    pub fn variant(&self) -> DeVariant {
        self.variant
    }

    pub fn breed_threads(&self) -> usize {
        self.breed_threads
    }

    /// Records the index of the fittest individual of every subpopulation.
    /// Ties keep the earliest index.
    pub fn prepare(&self, population: &Population, context: &mut GenerationContext) {
        context.best_so_far = population
            .subpops
            .iter()
            .map(|subpop| {
                let mut best = 0;
                for (i, individual) in subpop.individuals.iter().enumerate() {
                    if individual.fitness.better_than(&subpop.individuals[best].fitness) {
                        best = i;
                    }
                }
                best
            })
            .collect();
    }

    /// Breeds a full replacement population and retains `population` in the
    /// context for the competition step.
    ///
    /// With `breed_threads > 1`, each subpopulation is split into contiguous
    /// chunks bred in parallel, chunk `j` drawing from stream `j`. Otherwise
    /// stream 0 is used throughout.
    ///
    /// # Errors
    ///
    /// - [`GeneticError::EmptyPopulation`] for a population without
    ///   subpopulations.
    /// - [`GeneticError::PopulationTooSmall`] for a subpopulation of fewer
    ///   than four individuals.
    /// - [`GeneticError::KindMismatch`] for a species that is not float or
    ///   double.
    /// - [`GeneticError::MaxAttemptsReached`] when a limited rand/1/bin
    ///   validity budget runs out.
    #[instrument(level = "debug", skip_all, fields(variant = self.variant.name()))]
    pub fn breed_population(
        &self,
        population: &Population,
        context: &mut GenerationContext,
        streams: &mut RandomStreams,
    ) -> Result<Population> {
        if population.subpops.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        for (index, subpop) in population.subpops.iter().enumerate() {
            if subpop.len() < MIN_SUBPOPULATION_SIZE {
                return Err(GeneticError::PopulationTooSmall {
                    subpop: index,
                    size: subpop.len(),
                    required: MIN_SUBPOPULATION_SIZE,
                });
            }
            if !subpop.species.kind().is_floating() {
                return Err(GeneticError::KindMismatch {
                    expected: "float or double",
                    found: subpop.species.kind().name(),
                });
            }
        }

        if streams.is_empty() {
            return Err(GeneticError::Breeding("no random streams to breed with".to_string()));
        }

        self.prepare(population, context);

        let mut next = population.empty_clone();
        for (index, subpop) in population.subpops.iter().enumerate() {
            let best = context.best_so_far.get(index).copied().ok_or_else_genetic(|| {
                GeneticError::Breeding(format!("no best individual recorded for subpopulation {}", index))
            })?;
            let workers = self.breed_threads.min(streams.len()).min(subpop.len());
            let children = if workers <= 1 {
                let rng = streams.stream(0);
                (0..subpop.len())
                    .map(|slot| self.create_child(subpop, slot, best, rng))
                    .collect::<Result<Vec<_>>>()?
            } else {
                let chunk = subpop.len().div_ceil(workers);
                let chunks = streams
                    .streams_mut(workers)
                    .par_iter_mut()
                    .enumerate()
                    .map(|(j, rng)| {
                        let start = (j * chunk).min(subpop.len());
                        let end = (start + chunk).min(subpop.len());
                        (start..end)
                            .map(|slot| self.create_child(subpop, slot, best, rng))
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Vec<_>>();
                let mut children = Vec::with_capacity(subpop.len());
                for bred in chunks {
                    children.extend(bred?);
                }
                children
            };
            debug!(
                subpop = index,
                size = children.len(),
                best,
                workers = workers.max(1),
                "bred subpopulation"
            );
            next.subpops[index].individuals = children;
        }

        context.previous_population = Some(population.clone());
        Ok(next)
    }

    /// Builds the child for `slot`.
    fn create_child(
        &self,
        subpop: &Subpopulation,
        slot: usize,
        best: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<VectorIndividual> {
        let species = &subpop.species;
        let individuals = &subpop.individuals;
        let target = &individuals[slot];

        match self.variant {
            DeVariant::RandOneBin { validity_retries } => {
                let mut failures = 0;
                let mut child = loop {
                    let donors = pick_donors(individuals.len(), slot, None, rng);
                    let child = self.combine(individuals, slot, donors, rng, |f, a, b, c, _| a + f * (b - c))?;
                    if species.is_valid(&child.genome) {
                        break child;
                    }
                    failures += 1;
                    if validity_retries.exhausted(failures) {
                        return Err(GeneticError::MaxAttemptsReached(format!(
                            "no in-bounds rand/1/bin child for slot {} after {} attempts",
                            slot, failures
                        )));
                    }
                };
                self.binomial_crossover(&mut child, target, rng)?;
                Ok(child)
            }
            DeVariant::BestOneBin { f_noise, retries } => {
                let mut child = self.bounded_attempts(subpop, slot, retries, rng, |breeder, rng| {
                    let donors = pick_donors(individuals.len(), slot, Some(best), rng);
                    breeder.combine(individuals, slot, donors, rng, |f, a, b, c, rng| {
                        let f = f + rng.uniform() * f_noise - f_noise / 2.0;
                        a + f * (b - c)
                    })
                })?;
                self.binomial_crossover(&mut child, target, rng)?;
                Ok(child)
            }
            DeVariant::RandOneEitherOr { pf, retries } => {
                self.bounded_attempts(subpop, slot, retries, rng, |breeder, rng| {
                    let donors = pick_donors(individuals.len(), slot, None, rng);
                    breeder.combine(individuals, slot, donors, rng, |f, a, b, c, rng| {
                        if rng.next_bool_with(pf) {
                            a + f * (b - c)
                        } else {
                            a + 0.5 * (f + 1.0) * (b + c - 2.0 * a)
                        }
                    })
                })
            }
        }
    }

    /// Up to `retries + 1` attempts, then a freshly reset child.
    fn bounded_attempts(
        &self,
        subpop: &Subpopulation,
        slot: usize,
        retries: usize,
        rng: &mut RandomNumberGenerator,
        mut attempt: impl FnMut(&Self, &mut RandomNumberGenerator) -> Result<VectorIndividual>,
    ) -> Result<VectorIndividual> {
        for _ in 0..=retries {
            let child = attempt(self, rng)?;
            if subpop.species.is_valid(&child.genome) {
                return Ok(child);
            }
        }
        debug!(slot, retries, "no in-bounds child found, resetting");
        subpop.species.new_individual(rng)
    }

    /// Applies `rule(F, d0, d1, d2, rng)` gene by gene to a copy of the target.
    fn combine(
        &self,
        individuals: &[VectorIndividual],
        slot: usize,
        [r0, r1, r2]: [usize; 3],
        rng: &mut RandomNumberGenerator,
        mut rule: impl FnMut(f64, f64, f64, f64, &mut RandomNumberGenerator) -> f64,
    ) -> Result<VectorIndividual> {
        let mut genome = individuals[slot].genome.clone();
        let (d0, d1, d2) = (
            &individuals[r0].genome,
            &individuals[r1].genome,
            &individuals[r2].genome,
        );
        let f = self.f;
        match (&mut genome, d0, d1, d2) {
            (Genome::Double(c), Genome::Double(a), Genome::Double(b), Genome::Double(d)) => {
                apply_rule(c, a, b, d, |a, b, d| rule(f, a, b, d, rng))
            }
            (Genome::Float(c), Genome::Float(a), Genome::Float(b), Genome::Float(d)) => {
                apply_rule(c, a, b, d, |a, b, d| rule(f, a, b, d, rng))
            }
            (child, ..) => {
                return Err(GeneticError::KindMismatch {
                    expected: "float or double",
                    found: child.kind().name(),
                })
            }
        }
        Ok(VectorIndividual::new(genome))
    }

    /// Copies each target gene into the child with probability `cr`, except
    /// for one randomly protected position that keeps the child's value.
    fn binomial_crossover(
        &self,
        child: &mut VectorIndividual,
        target: &VectorIndividual,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let cr = self.cr.unwrap_or_else(|| {
            self.cr_warning.warn(|| {
                warn!("differential evolution parameter cr is unset, assuming cr = {}", ASSUMED_CR)
            });
            ASSUMED_CR
        });
        match (&mut child.genome, &target.genome) {
            (Genome::Double(c), Genome::Double(t)) => binomial(c, t, cr, rng),
            (Genome::Float(c), Genome::Float(t)) => binomial(c, t, cr, rng),
            (c, t) => {
                return Err(GeneticError::KindMismatch {
                    expected: t.kind().name(),
                    found: c.kind().name(),
                })
            }
        }
        Ok(())
    }
}

fn apply_rule<T: Numeric>(
    child: &mut [T],
    d0: &[T],
    d1: &[T],
    d2: &[T],
    mut rule: impl FnMut(f64, f64, f64) -> f64,
) {
    for (i, gene) in child.iter_mut().enumerate() {
        if let (Some(a), Some(b), Some(c)) = (d0.get(i), d1.get(i), d2.get(i)) {
            *gene = T::from_f64(rule(a.to_f64(), b.to_f64(), c.to_f64()));
        }
    }
}

pub(crate) fn binomial<T: Copy>(child: &mut [T], target: &[T], cr: f64, rng: &mut RandomNumberGenerator) {
    let len = child.len().min(target.len());
    if len == 0 {
        return;
    }
    let protected = rng.below(len);
    let kept = child[protected];
    for i in 0..len {
        if rng.next_bool_with(cr) {
            child[i] = target[i];
        }
    }
    child[protected] = kept;
}

/// Three donor indices: `r0` random (or `fixed`) and different from `slot`,
/// `r1` different from both, `r2` different from all three.
pub(crate) fn pick_donors(
    n: usize,
    slot: usize,
    fixed: Option<usize>,
    rng: &mut RandomNumberGenerator,
) -> [usize; 3] {
    let mut draw = |exclude: &[usize]| loop {
        let r = rng.below(n);
        if !exclude.contains(&r) {
            return r;
        }
    };
    let r0 = match fixed {
        Some(best) => best,
        None => draw(&[slot]),
    };
    let r1 = draw(&[slot, r0]);
    let r2 = draw(&[slot, r0, r1]);
    [r0, r1, r2]
}

/// Builder for [`DeBreeder`].
#[derive(Debug, Clone, Default)]
pub struct DeBreederBuilder {
    f: Option<f64>,
    cr: Option<f64>,
    variant: Option<DeVariant>,
    breed_threads: Option<usize>,
}

impl DeBreederBuilder {
    /// Sets the differential weight `F`.
    pub fn f(mut self, value: f64) -> Self {
        self.f = Some(value);
        self
    }

    /// Sets the binomial crossover probability.
    pub fn cr(mut self, value: f64) -> Self {
        self.cr = Some(value);
        self
    }

    pub fn variant(mut self, value: DeVariant) -> Self {
        self.variant = Some(value);
        self
    }

    /// Number of parallel workers per subpopulation.
    pub fn breed_threads(mut self, value: usize) -> Self {
        self.breed_threads = Some(value);
        self
    }

    /// Builds the breeder, validating every setting.
    pub fn build(self) -> Result<DeBreeder> {
        let f = check_unit(P_F, P_F, self.f.unwrap_or(DEFAULT_F))?;
        let cr = self.cr.map(|cr| check_unit(P_CR, P_CR, cr)).transpose()?;
        let variant = self.variant.unwrap_or_default();
        match variant {
            DeVariant::BestOneBin { f_noise, .. } if !(f_noise.is_finite() && f_noise >= 0.0) => {
                return Err(GeneticError::configuration(
                    P_F_NOISE,
                    format!("must be a finite value >= 0, found {}", f_noise),
                ))
            }
            DeVariant::RandOneEitherOr { pf, .. } => {
                check_unit(P_PF, P_PF, pf)?;
            }
            DeVariant::RandOneBin {
                validity_retries: RetryLimit::Limited(0),
            } => {
                return Err(GeneticError::configuration(
                    P_VALIDITY_RETRIES,
                    "a limited retry budget must be >= 1, use RetryLimit::Unbounded for no limit",
                ))
            }
            _ => {}
        }
        let breed_threads = self.breed_threads.unwrap_or(1);
        if breed_threads == 0 {
            return Err(GeneticError::configuration(P_BREED_THREADS, "must be >= 1"));
        }
        DeBreeder::new(f, cr, variant, breed_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::Fitness;
    use crate::params::ParameterDatabase;
    use crate::species::{GenomeKind, VectorSpecies};
    use std::sync::Arc;

    fn population(kind: GenomeKind, size: usize, seed: u64) -> Population {
        let params = ParameterDatabase::new()
            .with("s.genome-size", 6)
            .with("s.min-gene", -1.0)
            .with("s.max-gene", 1.0)
            .with("s.mutation-prob", 0.0);
        let species = Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), kind).unwrap());
        let mut subpop = Subpopulation::new(species);
        subpop.populate(size, &mut RandomNumberGenerator::from_seed(seed)).unwrap();
        for (i, ind) in subpop.individuals.iter_mut().enumerate() {
            ind.fitness = Fitness::new(i as f64);
            ind.evaluated = true;
        }
        Population::new(vec![subpop])
    }

    #[test]
    fn test_donors_are_distinct() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        for n in 4..10 {
            for slot in 0..n {
                for _ in 0..50 {
                    let [r0, r1, r2] = pick_donors(n, slot, None, &mut rng);
                    let all = [slot, r0, r1, r2];
                    for a in 0..4 {
                        for b in (a + 1)..4 {
                            assert_ne!(all[a], all[b]);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_fixed_donor_is_used() {
        let mut rng = RandomNumberGenerator::from_seed(2);
        for _ in 0..50 {
            let [r0, r1, r2] = pick_donors(5, 1, Some(3), &mut rng);
            assert_eq!(r0, 3);
            assert!(r1 != 1 && r1 != 3);
            assert!(r2 != 1 && r2 != 3 && r2 != r1);
        }
    }

    #[test]
    fn test_binomial_keeps_protected_gene_with_full_rate() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..50 {
            let mut child = vec![1.0; 5];
            binomial(&mut child, &[0.0; 5], 1.0, &mut rng);
            assert_eq!(child.iter().filter(|&&x| x == 1.0).count(), 1);
        }
        let mut empty: Vec<f64> = Vec::new();
        binomial(&mut empty, &[], 1.0, &mut rng);
    }

    #[test]
    fn test_prepare_finds_best() {
        let mut pop = population(GenomeKind::Double, 6, 4);
        pop.subpops[0].individuals[2].fitness = Fitness::new(100.0);
        let breeder = DeBreeder::builder().f(0.5).cr(0.5).build().unwrap();
        let mut context = GenerationContext::new();
        breeder.prepare(&pop, &mut context);
        assert_eq!(context.best_so_far, vec![2]);
    }

    #[test]
    fn test_too_small_subpopulation_is_fatal() {
        let pop = population(GenomeKind::Double, 3, 5);
        let breeder = DeBreeder::builder().f(0.5).cr(0.5).build().unwrap();
        let result = breeder.breed_population(&pop, &mut GenerationContext::new(), &mut RandomStreams::from_seed(1, 1));
        assert!(matches!(
            result,
            Err(GeneticError::PopulationTooSmall { subpop: 0, size: 3, required: 4 })
        ));
    }

    #[test]
    fn test_integer_species_rejected() {
        let params = ParameterDatabase::new()
            .with("s.genome-size", 2)
            .with("s.min-gene", 0)
            .with("s.max-gene", 3)
            .with("s.mutation-prob", 0.0);
        let species = Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Int).unwrap());
        let mut subpop = Subpopulation::new(species);
        subpop.populate(5, &mut RandomNumberGenerator::from_seed(1)).unwrap();
        let breeder = DeBreeder::builder().f(0.5).build().unwrap();
        let result = breeder.breed_population(
            &Population::new(vec![subpop]),
            &mut GenerationContext::new(),
            &mut RandomStreams::from_seed(1, 1),
        );
        assert!(matches!(result, Err(GeneticError::KindMismatch { .. })));
    }

    #[test]
    fn test_every_variant_produces_valid_children() {
        let variants = [
            DeVariant::default(),
            DeVariant::BestOneBin { f_noise: 0.2, retries: 10 },
            DeVariant::RandOneEitherOr { pf: 0.5, retries: 10 },
        ];
        for kind in [GenomeKind::Double, GenomeKind::Float] {
            for variant in variants {
                let pop = population(kind, 10, 6);
                let breeder = DeBreeder::builder().f(0.7).cr(0.3).variant(variant).build().unwrap();
                let mut context = GenerationContext::new();
                let next = breeder
                    .breed_population(&pop, &mut context, &mut RandomStreams::from_seed(2, 1))
                    .unwrap();
                let species = &next.subpops[0].species;
                assert_eq!(next.subpops[0].len(), 10);
                for child in &next.subpops[0].individuals {
                    assert!(child.is_in_range(species), "{} child out of range", variant.name());
                    assert!(!child.evaluated);
                }
                assert_eq!(context.previous_population.as_ref().map(Population::len), Some(10));
            }
        }
    }

    #[test]
    fn test_limited_validity_budget_errors() {
        let pop = population(GenomeKind::Double, 5, 7);
        let breeder = DeBreeder::builder()
            .f(1.0)
            .cr(0.5)
            .variant(DeVariant::RandOneBin {
                validity_retries: RetryLimit::Limited(1),
            })
            .build()
            .unwrap();
        let mut streams = RandomStreams::from_seed(3, 1);
        let mut saw_error = false;
        for _ in 0..200 {
            if let Err(e) = breeder.breed_population(&pop, &mut GenerationContext::new(), &mut streams) {
                assert!(matches!(e, GeneticError::MaxAttemptsReached(_)));
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn test_zero_retry_limit_rejected() {
        let result = DeBreeder::builder()
            .f(0.5)
            .variant(DeVariant::RandOneBin {
                validity_retries: RetryLimit::Limited(0),
            })
            .build();
        match result {
            Err(GeneticError::Configuration { key, .. }) => assert_eq!(key, P_VALIDITY_RETRIES),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
        assert_eq!(RetryLimit::from_count(0), RetryLimit::Unbounded);
        assert_eq!(RetryLimit::from_count(3), RetryLimit::Limited(3));
    }

    #[test]
    fn test_parallel_breeding_is_reproducible() {
        let pop = population(GenomeKind::Double, 40, 8);
        let breeder = DeBreeder::builder().f(0.5).cr(0.9).breed_threads(4).build().unwrap();
        let run = || {
            breeder
                .breed_population(&pop, &mut GenerationContext::new(), &mut RandomStreams::from_seed(9, 4))
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.subpops[0].individuals, b.subpops[0].individuals);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_setup_from_parameters() {
        let params = ParameterDatabase::new()
            .with("de.f", 0.6)
            .with("breed.variant", "best/1/bin")
            .with("breed.f-noise", 0.1)
            .with("breed.out-of-bounds-retries", 5);
        let breeder = DeBreeder::setup(&params, &Parameter::new("breed")).unwrap();
        assert_eq!(breeder.f(), 0.6);
        assert_eq!(breeder.cr(), None);
        assert_eq!(
            breeder.variant(),
            DeVariant::BestOneBin { f_noise: 0.1, retries: 5 }
        );

        let bad = params.clone().with("breed.f", 1.5);
        match DeBreeder::setup(&bad, &Parameter::new("breed")) {
            Err(GeneticError::Configuration { key, .. }) => assert_eq!(key, "breed.f"),
            other => panic!("Expected Configuration error, got {:?}", other),
        }

        let unknown = params.with("breed.variant", "current-to-best");
        assert!(DeBreeder::setup(&unknown, &Parameter::new("breed")).is_err());
    }

    #[test]
    fn test_unset_cr_warns_once() {
        let pop = population(GenomeKind::Double, 6, 10);
        let breeder = DeBreeder::builder().f(0.5).build().unwrap();
        breeder
            .breed_population(&pop, &mut GenerationContext::new(), &mut RandomStreams::from_seed(4, 1))
            .unwrap();
        assert!(breeder.cr_warning.fired());
    }
}
