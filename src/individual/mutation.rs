//! Reset and mutation operators for every genome kind.

use tracing::warn;

use crate::individual::genome::{Integral, Numeric};
use crate::individual::Genome;
use crate::rng::RandomNumberGenerator;
use crate::species::{
    BitMutation, FloatMutation, FloatPolicy, IntegerMutation, IntegerPolicy, SpeciesPolicy,
    VectorSpecies,
};

/// Draws every gene afresh within its bounds.
///
/// Callers guarantee that `genome` has the species' kind.
pub(crate) fn reset(species: &VectorSpecies, genome: &mut Genome, rng: &mut RandomNumberGenerator) {
    match (genome, species.policy()) {
        (Genome::Bit(v), _) => v.iter_mut().for_each(|b| *b = rng.next_bool()),
        (Genome::Byte(v), SpeciesPolicy::Integer(p)) => reset_integers(species, p, v, rng),
        (Genome::Short(v), SpeciesPolicy::Integer(p)) => reset_integers(species, p, v, rng),
        (Genome::Int(v), SpeciesPolicy::Integer(p)) => reset_integers(species, p, v, rng),
        (Genome::Long(v), SpeciesPolicy::Integer(p)) => reset_integers(species, p, v, rng),
        (Genome::Float(v), SpeciesPolicy::Float(p)) => reset_floats(species, p, v, rng),
        (Genome::Double(v), SpeciesPolicy::Float(p)) => reset_floats(species, p, v, rng),
        (Genome::Gene(v), _) => v.iter_mut().for_each(|g| g.reset(rng)),
        _ => {}
    }
}

fn reset_integers<T: Integral>(
    species: &VectorSpecies,
    policies: &[IntegerPolicy],
    genes: &mut [T],
    rng: &mut RandomNumberGenerator,
) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let p = &policies[species.gene_index(i)];
        *gene = T::from_i64(rng.closed_interval(p.min, p.max));
    }
}

fn reset_floats<T: Numeric>(
    species: &VectorSpecies,
    policies: &[FloatPolicy],
    genes: &mut [T],
    rng: &mut RandomNumberGenerator,
) {
    for (i, gene) in genes.iter_mut().enumerate() {
        *gene = T::from_f64(draw_float(&policies[species.gene_index(i)], rng));
    }
}

/// A fresh value for a float gene: uniform over the bounds, or a uniform
/// integer inside them for integral mutation types.
fn draw_float(p: &FloatPolicy, rng: &mut RandomNumberGenerator) -> f64 {
    if p.mutation.is_integral() {
        rng.closed_interval(p.min.ceil() as i64, p.max.floor() as i64) as f64
    } else {
        (p.min + rng.uniform() * (p.max - p.min)).clamp(p.min, p.max)
    }
}

/// Mutates each gene with its own probability.
pub(crate) fn mutate(species: &VectorSpecies, genome: &mut Genome, rng: &mut RandomNumberGenerator) {
    match (genome, species.policy()) {
        (Genome::Bit(v), SpeciesPolicy::Bit(types)) => mutate_bits(species, types, v, rng),
        (Genome::Byte(v), SpeciesPolicy::Integer(p)) => mutate_integers(species, p, v, rng),
        (Genome::Short(v), SpeciesPolicy::Integer(p)) => mutate_integers(species, p, v, rng),
        (Genome::Int(v), SpeciesPolicy::Integer(p)) => mutate_integers(species, p, v, rng),
        (Genome::Long(v), SpeciesPolicy::Integer(p)) => mutate_integers(species, p, v, rng),
        (Genome::Float(v), SpeciesPolicy::Float(p)) => mutate_floats(species, p, v, rng),
        (Genome::Double(v), SpeciesPolicy::Float(p)) => mutate_floats(species, p, v, rng),
        (Genome::Gene(v), _) => {
            for (i, gene) in v.iter_mut().enumerate() {
                let policy = species.gene_policy(i);
                if !rng.next_bool_with(policy.mutation_probability) {
                    continue;
                }
                if policy.duplicate_retries == 0 {
                    gene.mutate(rng);
                    continue;
                }
                let old = gene.clone();
                for attempt in 0..=policy.duplicate_retries {
                    if attempt > 0 {
                        *gene = old.clone();
                    }
                    gene.mutate(rng);
                    if !gene.gene_eq(old.as_ref()) {
                        break;
                    }
                }
            }
        }
        _ => {}
    }
}

/// Applies `attempt` until the gene differs from `old` or the duplicate
/// budget runs out.
fn with_duplicate_retries<T: PartialEq + Copy>(
    old: T,
    retries: usize,
    mut attempt: impl FnMut() -> T,
) -> T {
    let mut value = attempt();
    for _ in 0..retries {
        if value != old {
            break;
        }
        value = attempt();
    }
    value
}

fn mutate_bits(
    species: &VectorSpecies,
    types: &[BitMutation],
    genes: &mut [bool],
    rng: &mut RandomNumberGenerator,
) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let policy = species.gene_policy(i);
        if !rng.next_bool_with(policy.mutation_probability) {
            continue;
        }
        let old = *gene;
        *gene = match types[species.gene_index(i)] {
            BitMutation::Flip => !old,
            BitMutation::Reset => {
                with_duplicate_retries(old, policy.duplicate_retries, || rng.next_bool())
            }
        };
    }
}

fn mutate_integers<T: Integral>(
    species: &VectorSpecies,
    policies: &[IntegerPolicy],
    genes: &mut [T],
    rng: &mut RandomNumberGenerator,
) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let policy = species.gene_policy(i);
        if !rng.next_bool_with(policy.mutation_probability) {
            continue;
        }
        let p = &policies[species.gene_index(i)];
        let old = gene.to_i64();
        let value = with_duplicate_retries(old, policy.duplicate_retries, || match p.mutation {
            IntegerMutation::Reset => rng.closed_interval(p.min, p.max),
            IntegerMutation::RandomWalk { probability } => {
                let (lo, hi) = if p.bounded {
                    (p.min, p.max)
                } else {
                    (T::MIN_I64, T::MAX_I64)
                };
                random_walk(old, lo, hi, probability, rng)
            }
        });
        *gene = T::from_i64(value);
    }
}

/// ±1 steps while a Bernoulli(`probability`) trial succeeds. A step that
/// would leave `[lo, hi]` is taken in the opposite direction instead, or
/// skipped when that leaves the range too.
fn random_walk(start: i64, lo: i64, hi: i64, probability: f64, rng: &mut RandomNumberGenerator) -> i64 {
    let inside = |v: Option<i64>| v.filter(|v| *v >= lo && *v <= hi);
    let mut value = start;
    loop {
        let step: i64 = if rng.next_bool() { 1 } else { -1 };
        if let Some(next) =
            inside(value.checked_add(step)).or_else(|| inside(value.checked_sub(step)))
        {
            value = next;
        }
        if !rng.next_bool_with(probability) {
            return value;
        }
    }
}

fn mutate_floats<T: Numeric>(
    species: &VectorSpecies,
    policies: &[FloatPolicy],
    genes: &mut [T],
    rng: &mut RandomNumberGenerator,
) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let policy = species.gene_policy(i);
        if !rng.next_bool_with(policy.mutation_probability) {
            continue;
        }
        let p = &policies[species.gene_index(i)];
        let old = gene.to_f64();
        let value = with_duplicate_retries(old.to_bits(), policy.duplicate_retries, || {
            mutate_float(species, p, old, rng).to_bits()
        });
        *gene = T::from_f64(f64::from_bits(value));
    }
}

fn mutate_float(species: &VectorSpecies, p: &FloatPolicy, old: f64, rng: &mut RandomNumberGenerator) -> f64 {
    match p.mutation {
        FloatMutation::Reset | FloatMutation::IntegerReset => draw_float(p, rng),
        FloatMutation::Gaussian { stdev } => gaussian(species, p, old, stdev, rng),
        FloatMutation::Polynomial {
            distribution_index,
            alternative,
        } => polynomial(species, p, old, distribution_index, alternative, rng),
        FloatMutation::IntegerRandomWalk { probability } => {
            let (lo, hi) = if p.bounded {
                (p.min.ceil() as i64, p.max.floor() as i64)
            } else {
                (i64::MIN, i64::MAX)
            };
            let start = (old.round() as i64).clamp(lo, hi);
            random_walk(start, lo, hi, probability, rng) as f64
        }
    }
}

fn in_bounds(p: &FloatPolicy, value: f64) -> bool {
    value >= p.min && value <= p.max
}

/// Uniform resample after the out-of-bounds budget is spent.
fn give_up(species: &VectorSpecies, p: &FloatPolicy, rng: &mut RandomNumberGenerator) -> f64 {
    species.warnings().out_of_bounds_gave_up.warn(|| {
        warn!(
            retries = p.out_of_bounds_retries,
            "mutation kept leaving the gene bounds, resetting the gene uniformly instead; \
             consider raising out-of-bounds-retries or lowering the mutation strength"
        )
    });
    draw_float(p, rng)
}

fn gaussian(
    species: &VectorSpecies,
    p: &FloatPolicy,
    old: f64,
    stdev: f64,
    rng: &mut RandomNumberGenerator,
) -> f64 {
    let mut tries = 0usize;
    loop {
        let value = old + rng.gaussian() * stdev;
        if !p.bounded || in_bounds(p, value) {
            return value;
        }
        tries += 1;
        if p.out_of_bounds_retries != 0 && tries >= p.out_of_bounds_retries {
            return give_up(species, p, rng);
        }
    }
}

/// Polynomial mutation as used by NSGA-II.
fn polynomial(
    species: &VectorSpecies,
    p: &FloatPolicy,
    old: f64,
    eta: f64,
    alternative: bool,
    rng: &mut RandomNumberGenerator,
) -> f64 {
    let (yl, yu) = (p.min, p.max);
    if yu <= yl {
        return yl;
    }
    let delta1 = (old - yl) / (yu - yl);
    let delta2 = (yu - old) / (yu - yl);
    let mut_pow = 1.0 / (eta + 1.0);

    let mut tries = 0usize;
    loop {
        let rnd = rng.uniform();
        let deltaq = if rnd <= 0.5 {
            let xy = 1.0 - delta1;
            let extra = if alternative {
                (1.0 - 2.0 * rnd) * xy.powf(eta + 1.0)
            } else {
                0.0
            };
            (2.0 * rnd + extra).powf(mut_pow) - 1.0
        } else {
            let xy = 1.0 - delta2;
            let extra = if alternative {
                2.0 * (rnd - 0.5) * xy.powf(eta + 1.0)
            } else {
                0.0
            };
            1.0 - (2.0 * (1.0 - rnd) + extra).powf(mut_pow)
        };
        let value = old + deltaq * (yu - yl);
        if !p.bounded || in_bounds(p, value) {
            return value;
        }
        tries += 1;
        if p.out_of_bounds_retries != 0 && tries >= p.out_of_bounds_retries {
            return give_up(species, p, rng);
        }
    }
}

/// Pulls every numeric gene into its bounds.
pub(crate) fn clamp(species: &VectorSpecies, genome: &mut Genome) {
    match (genome, species.policy()) {
        (Genome::Byte(v), SpeciesPolicy::Integer(p)) => clamp_integers(species, p, v),
        (Genome::Short(v), SpeciesPolicy::Integer(p)) => clamp_integers(species, p, v),
        (Genome::Int(v), SpeciesPolicy::Integer(p)) => clamp_integers(species, p, v),
        (Genome::Long(v), SpeciesPolicy::Integer(p)) => clamp_integers(species, p, v),
        (Genome::Float(v), SpeciesPolicy::Float(p)) => clamp_floats(species, p, v),
        (Genome::Double(v), SpeciesPolicy::Float(p)) => clamp_floats(species, p, v),
        _ => {}
    }
}

fn clamp_integers<T: Integral>(species: &VectorSpecies, policies: &[IntegerPolicy], genes: &mut [T]) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let p = &policies[species.gene_index(i)];
        *gene = T::from_i64(gene.to_i64().clamp(p.min, p.max));
    }
}

fn clamp_floats<T: Numeric>(species: &VectorSpecies, policies: &[FloatPolicy], genes: &mut [T]) {
    for (i, gene) in genes.iter_mut().enumerate() {
        let p = &policies[species.gene_index(i)];
        let value = gene.to_f64();
        if value < p.min {
            *gene = T::from_f64(p.min);
        } else if value > p.max {
            *gene = T::from_f64(p.max);
        }
    }
}

/// True when every numeric gene lies within its bounds, regardless of
/// whether mutation is bounded. Bit and gene vectors are always in range.
pub(crate) fn is_in_range(species: &VectorSpecies, genome: &Genome) -> bool {
    match (genome, species.policy()) {
        (Genome::Byte(v), SpeciesPolicy::Integer(p)) => integers_in_range(species, p, v),
        (Genome::Short(v), SpeciesPolicy::Integer(p)) => integers_in_range(species, p, v),
        (Genome::Int(v), SpeciesPolicy::Integer(p)) => integers_in_range(species, p, v),
        (Genome::Long(v), SpeciesPolicy::Integer(p)) => integers_in_range(species, p, v),
        (Genome::Float(v), SpeciesPolicy::Float(p)) => floats_in_range(species, p, v),
        (Genome::Double(v), SpeciesPolicy::Float(p)) => floats_in_range(species, p, v),
        _ => true,
    }
}

fn integers_in_range<T: Integral>(species: &VectorSpecies, policies: &[IntegerPolicy], genes: &[T]) -> bool {
    genes.iter().enumerate().all(|(i, g)| {
        let p = &policies[species.gene_index(i)];
        (p.min..=p.max).contains(&g.to_i64())
    })
}

fn floats_in_range<T: Numeric>(species: &VectorSpecies, policies: &[FloatPolicy], genes: &[T]) -> bool {
    genes
        .iter()
        .enumerate()
        .all(|(i, g)| in_bounds(&policies[species.gene_index(i)], g.to_f64()))
}
