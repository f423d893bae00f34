//! Two-parent recombination operators.
//!
//! Every operator works in place on both parents and only touches the
//! positions both genomes share.

use tracing::warn;

use crate::error::{GeneticError, Result};
use crate::individual::genome::{join_variant, Numeric};
use crate::individual::Genome;
use crate::rng::RandomNumberGenerator;
use crate::species::{CrossoverType, VectorSpecies};

const SBX_EPSILON: f64 = 1e-14;

pub(crate) fn crossover(
    species: &VectorSpecies,
    a: &mut Genome,
    b: &mut Genome,
    rng: &mut RandomNumberGenerator,
) -> Result<()> {
    let mismatch = |found: &Genome| GeneticError::KindMismatch {
        expected: species.kind().name(),
        found: found.kind().name(),
    };
    if a.kind() != species.kind() {
        return Err(mismatch(a));
    }
    if b.kind() != species.kind() {
        return Err(mismatch(b));
    }

    match species.crossover_type() {
        CrossoverType::OnePoint | CrossoverType::TwoPoint | CrossoverType::AnyPoint => {
            join_variant!(a, b, x, y => point_crossover(species, x, y, rng), else {})
        }
        CrossoverType::Line | CrossoverType::Intermediate => match (a, b) {
            (Genome::Byte(x), Genome::Byte(y)) => recombine(species, x, y, rng),
            (Genome::Short(x), Genome::Short(y)) => recombine(species, x, y, rng),
            (Genome::Int(x), Genome::Int(y)) => recombine(species, x, y, rng),
            (Genome::Long(x), Genome::Long(y)) => recombine(species, x, y, rng),
            (Genome::Float(x), Genome::Float(y)) => recombine(species, x, y, rng),
            (Genome::Double(x), Genome::Double(y)) => recombine(species, x, y, rng),
            _ => {}
        },
        CrossoverType::SimulatedBinary => match (a, b) {
            (Genome::Float(x), Genome::Float(y)) => simulated_binary(species, x, y, rng),
            (Genome::Double(x), Genome::Double(y)) => simulated_binary(species, x, y, rng),
            _ => {}
        },
    }
    Ok(())
}

/// One-, two- and any-point crossover over `chunk_size` blocks.
fn point_crossover<T>(species: &VectorSpecies, x: &mut [T], y: &mut [T], rng: &mut RandomNumberGenerator) {
    let len = x.len().min(y.len());
    let chunk = species.chunk_size();
    let blocks = len / chunk;

    match species.crossover_type() {
        CrossoverType::OnePoint => {
            let end = rng.below(blocks + 1) * chunk;
            x[..end].swap_with_slice(&mut y[..end]);
        }
        CrossoverType::TwoPoint => {
            let mut start = rng.below(blocks + 1);
            let mut end = rng.below(blocks + 1);
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            let range = start * chunk..end * chunk;
            x[range.clone()].swap_with_slice(&mut y[range]);
        }
        _ => {
            for block in 0..blocks {
                if rng.next_bool_with(species.crossover_probability()) {
                    let range = block * chunk..(block + 1) * chunk;
                    x[range.clone()].swap_with_slice(&mut y[range]);
                }
            }
        }
    }
}

fn draw_line_weight(rng: &mut RandomNumberGenerator, extension: f64) -> f64 {
    rng.uniform() * (1.0 + 2.0 * extension) - extension
}

/// Line and intermediate recombination. Line draws its weights once per
/// genome; intermediate draws fresh weights for every attempt at every gene.
/// Integer kinds round to the nearest integer before the bounds check.
fn recombine<T: Numeric>(species: &VectorSpecies, x: &mut [T], y: &mut [T], rng: &mut RandomNumberGenerator) {
    let len = x.len().min(y.len());
    let extension = species.line_extension();
    let intermediate = species.crossover_type() == CrossoverType::Intermediate;

    let mut alpha = draw_line_weight(rng, extension);
    let mut beta = draw_line_weight(rng, extension);

    for i in 0..len {
        let (min, max) = (species.min_gene(i), species.max_gene(i));
        let (xi, yi) = (x[i].to_f64(), y[i].to_f64());
        let mut attempts = 0usize;
        loop {
            if intermediate {
                alpha = draw_line_weight(rng, extension);
                beta = draw_line_weight(rng, extension);
            }
            let t = T::from_f64(alpha * xi + (1.0 - alpha) * yi);
            let u = T::from_f64(beta * yi + (1.0 - beta) * xi);
            let inside = |v: T| v.to_f64() >= min && v.to_f64() <= max;
            if inside(t) && inside(u) {
                x[i] = t;
                y[i] = u;
                break;
            }
            if !intermediate {
                break;
            }
            attempts += 1;
            if species.intermediate_retries().map_or(false, |cap| attempts > cap) {
                species.warnings().intermediate_gave_up.warn(|| {
                    warn!(
                        gene = i,
                        retries = attempts - 1,
                        "intermediate recombination found no in-bounds pair, leaving the gene unchanged"
                    )
                });
                break;
            }
        }
    }
}

/// Simulated binary crossover with distribution index `eta`.
fn simulated_binary<T: Numeric>(
    species: &VectorSpecies,
    x: &mut [T],
    y: &mut [T],
    rng: &mut RandomNumberGenerator,
) {
    let eta = species.crossover_distribution_index();
    let len = x.len().min(y.len());

    let spread = |beta: f64, rand: f64| {
        let alpha = 2.0 - beta.powf(-(eta + 1.0));
        if rand <= 1.0 / alpha {
            (rand * alpha).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 - rand * alpha)).powf(1.0 / (eta + 1.0))
        }
    };

    for i in 0..len {
        if !rng.next_bool() {
            continue;
        }
        let (a, b) = (x[i].to_f64(), y[i].to_f64());
        if (a - b).abs() <= SBX_EPSILON {
            continue;
        }
        let (y1, y2) = if a < b { (a, b) } else { (b, a) };
        let (yl, yu) = (species.min_gene(i), species.max_gene(i));
        let rand = rng.uniform();

        let betaq = spread(1.0 + 2.0 * (y1 - yl) / (y2 - y1), rand);
        let c1 = (0.5 * ((y1 + y2) - betaq * (y2 - y1))).clamp(yl, yu);
        let betaq = spread(1.0 + 2.0 * (yu - y2) / (y2 - y1), rand);
        let c2 = (0.5 * ((y1 + y2) + betaq * (y2 - y1))).clamp(yl, yu);

        if rng.next_bool() {
            x[i] = T::from_f64(c2);
            y[i] = T::from_f64(c1);
        } else {
            x[i] = T::from_f64(c1);
            y[i] = T::from_f64(c2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Parameter, ParameterDatabase};
    use crate::species::GenomeKind;

    fn species(kind: GenomeKind, extra: &[(&str, &str)]) -> VectorSpecies {
        let mut params = ParameterDatabase::new()
            .with("s.genome-size", 8)
            .with("s.min-gene", 0)
            .with("s.max-gene", 10)
            .with("s.mutation-prob", 0.1);
        for (k, v) in extra {
            params.set(format!("s.{}", k), v);
        }
        VectorSpecies::setup(&params, &Parameter::new("s"), kind).unwrap()
    }

    fn multiset(a: &Genome, b: &Genome) -> Vec<i32> {
        let mut all = Vec::new();
        if let (Genome::Int(x), Genome::Int(y)) = (a, b) {
            all.extend(x);
            all.extend(y);
        }
        all.sort();
        all
    }

    #[test]
    fn test_point_crossovers_exchange_positions() {
        for kind in ["one", "two", "any"] {
            let species = species(
                GenomeKind::Int,
                &[("crossover-type", kind), ("crossover-prob", "0.5"), ("chunk-size", "2")],
            );
            let mut rng = RandomNumberGenerator::from_seed(11);
            for _ in 0..20 {
                let mut a = Genome::Int((0..8).collect());
                let mut b = Genome::Int((10..18).collect());
                let before = multiset(&a, &b);
                crossover(&species, &mut a, &mut b, &mut rng).unwrap();
                assert_eq!(multiset(&a, &b), before);
                if let (Genome::Int(x), Genome::Int(y)) = (&a, &b) {
                    for i in 0..8 {
                        assert!(x[i] == i as i32 || x[i] == 10 + i as i32);
                        assert_eq!(x[i] + y[i], 10 + 2 * i as i32);
                        if i % 2 == 1 {
                            assert_eq!(x[i] - x[i - 1], 1, "chunks move together");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_crossover_uses_shorter_length() {
        let species = species(GenomeKind::Int, &[("crossover-type", "two")]);
        let mut rng = RandomNumberGenerator::from_seed(12);
        let mut a = Genome::Int(vec![1; 8]);
        let mut b = Genome::Int(vec![2; 3]);
        for _ in 0..20 {
            crossover(&species, &mut a, &mut b, &mut rng).unwrap();
        }
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 3);
        if let Genome::Int(x) = &a {
            assert!(x[3..].iter().all(|&v| v == 1));
        }
    }

    #[test]
    fn test_line_recombination_stays_in_bounds() {
        let species = species(
            GenomeKind::Double,
            &[("crossover-type", "line"), ("line-extension", "0.5")],
        );
        let mut rng = RandomNumberGenerator::from_seed(13);
        let mut a = Genome::Double(vec![0.5; 8]);
        let mut b = Genome::Double(vec![9.5; 8]);
        for _ in 0..20 {
            crossover(&species, &mut a, &mut b, &mut rng).unwrap();
            assert!(crate::individual::mutation::is_in_range(&species, &a));
            assert!(crate::individual::mutation::is_in_range(&species, &b));
        }
    }

    #[test]
    fn test_intermediate_integers_round() {
        let species = species(
            GenomeKind::Short,
            &[("crossover-type", "intermediate"), ("line-extension", "0.25")],
        );
        let mut rng = RandomNumberGenerator::from_seed(14);
        let mut a = Genome::Short(vec![0; 8]);
        let mut b = Genome::Short(vec![10; 8]);
        crossover(&species, &mut a, &mut b, &mut rng).unwrap();
        assert!(crate::individual::mutation::is_in_range(&species, &a));
        assert!(crate::individual::mutation::is_in_range(&species, &b));
    }

    #[test]
    fn test_intermediate_draws_weights_per_gene() {
        let species = species(
            GenomeKind::Double,
            &[
                ("crossover-type", "intermediate"),
                ("line-extension", "0.25"),
                ("min-gene", "-1000"),
                ("max-gene", "1000"),
            ],
        );
        let mut rng = RandomNumberGenerator::from_seed(16);
        let mut a = Genome::Double(vec![0.0; 8]);
        let mut b = Genome::Double(vec![10.0; 8]);
        crossover(&species, &mut a, &mut b, &mut rng).unwrap();
        if let Genome::Double(x) = &a {
            assert!(x.iter().any(|&v| v != x[0]), "every gene reused one weight: {:?}", x);
        }
    }

    #[test]
    fn test_line_draws_weights_once() {
        let species = species(
            GenomeKind::Double,
            &[
                ("crossover-type", "line"),
                ("line-extension", "0.25"),
                ("min-gene", "-1000"),
                ("max-gene", "1000"),
            ],
        );
        let mut rng = RandomNumberGenerator::from_seed(16);
        let mut a = Genome::Double(vec![0.0; 8]);
        let mut b = Genome::Double(vec![10.0; 8]);
        crossover(&species, &mut a, &mut b, &mut rng).unwrap();
        if let Genome::Double(x) = &a {
            assert!(x.iter().all(|&v| v == x[0]));
        }
    }

    #[test]
    fn test_intermediate_cap_leaves_gene_and_warns() {
        let species = species(
            GenomeKind::Double,
            &[
                ("crossover-type", "intermediate"),
                ("line-extension", "1000"),
                ("intermediate-retries", "1"),
            ],
        );
        let mut rng = RandomNumberGenerator::from_seed(15);
        let mut a = Genome::Double(vec![0.0; 8]);
        let mut b = Genome::Double(vec![10.0; 8]);
        crossover(&species, &mut a, &mut b, &mut rng).unwrap();
        assert!(species.warnings().intermediate_gave_up.fired());
    }

    #[test]
    fn test_sbx_children_bounded() {
        let species = species(
            GenomeKind::Double,
            &[("crossover-type", "sbx"), ("crossover-distribution-index", "2")],
        );
        let mut rng = RandomNumberGenerator::from_seed(16);
        let mut a = Genome::Double(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let mut b = Genome::Double(vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0]);
        let original = a.clone();
        for _ in 0..20 {
            crossover(&species, &mut a, &mut b, &mut rng).unwrap();
            assert!(crate::individual::mutation::is_in_range(&species, &a));
            assert!(crate::individual::mutation::is_in_range(&species, &b));
        }
        assert_ne!(a, original);
    }

    #[test]
    fn test_kind_mismatch() {
        let species = species(GenomeKind::Double, &[]);
        let mut rng = RandomNumberGenerator::from_seed(17);
        let mut a = Genome::Double(vec![0.0; 8]);
        let mut b = Genome::Float(vec![0.0; 8]);
        assert!(matches!(
            crossover(&species, &mut a, &mut b, &mut rng),
            Err(GeneticError::KindMismatch { .. })
        ));
    }
}
