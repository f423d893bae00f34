use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{GeneticError, Result};
use crate::individual::Gene;
use crate::species::GenomeKind;

/// The gene values of one individual, one variant per genome kind.
#[derive(Debug, Clone)]
pub enum Genome {
    Bit(Vec<bool>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Gene(Vec<Box<dyn Gene>>),
}

/// Evaluates `$body` with `$v` bound to the inner vector of any variant.
macro_rules! each_variant {
    ($genome:expr, $v:ident => $body:expr) => {
        match $genome {
            Genome::Bit($v) => $body,
            Genome::Byte($v) => $body,
            Genome::Short($v) => $body,
            Genome::Int($v) => $body,
            Genome::Long($v) => $body,
            Genome::Float($v) => $body,
            Genome::Double($v) => $body,
            Genome::Gene($v) => $body,
        }
    };
}

/// Like `each_variant!`, additionally binding `$ctor` to the variant's
/// constructor so that `$body` can build genomes of the same kind.
macro_rules! map_same {
    ($genome:expr, $v:ident, $ctor:ident => $body:expr) => {
        match $genome {
            Genome::Bit($v) => {
                let $ctor = Genome::Bit;
                $body
            }
            Genome::Byte($v) => {
                let $ctor = Genome::Byte;
                $body
            }
            Genome::Short($v) => {
                let $ctor = Genome::Short;
                $body
            }
            Genome::Int($v) => {
                let $ctor = Genome::Int;
                $body
            }
            Genome::Long($v) => {
                let $ctor = Genome::Long;
                $body
            }
            Genome::Float($v) => {
                let $ctor = Genome::Float;
                $body
            }
            Genome::Double($v) => {
                let $ctor = Genome::Double;
                $body
            }
            Genome::Gene($v) => {
                let $ctor = Genome::Gene;
                $body
            }
        }
    };
}

/// Evaluates `$body` when both genomes share a variant, `$other` otherwise.
macro_rules! join_variant {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr, else $other:expr) => {
        match ($a, $b) {
            (Genome::Bit($x), Genome::Bit($y)) => $body,
            (Genome::Byte($x), Genome::Byte($y)) => $body,
            (Genome::Short($x), Genome::Short($y)) => $body,
            (Genome::Int($x), Genome::Int($y)) => $body,
            (Genome::Long($x), Genome::Long($y)) => $body,
            (Genome::Float($x), Genome::Float($y)) => $body,
            (Genome::Double($x), Genome::Double($y)) => $body,
            (Genome::Gene($x), Genome::Gene($y)) => $body,
            _ => $other,
        }
    };
}

pub(crate) use each_variant;
pub(crate) use join_variant;
pub(crate) use map_same;

/// Numeric element types, viewed through `f64`.
pub(crate) trait Numeric: Copy + PartialOrd + Send + Sync + 'static {
    fn to_f64(self) -> f64;

    /// Saturating conversion. Integer types round half up.
    fn from_f64(value: f64) -> Self;
}

/// Integer element types, viewed through `i64`.
pub(crate) trait Integral: Numeric {
    const MIN_I64: i64;
    const MAX_I64: i64;

    fn to_i64(self) -> i64;

    /// Saturating conversion.
    fn from_i64(value: i64) -> Self;
}

macro_rules! impl_integral {
    ($($t:ty),*) => {
        $(
            impl Numeric for $t {
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    (value + 0.5).floor() as $t
                }
            }

            impl Integral for $t {
                const MIN_I64: i64 = <$t>::MIN as i64;
                const MAX_I64: i64 = <$t>::MAX as i64;

                fn to_i64(self) -> i64 {
                    self as i64
                }

                fn from_i64(value: i64) -> Self {
                    value.clamp(Self::MIN_I64, Self::MAX_I64) as $t
                }
            }
        )*
    };
}

impl_integral!(i8, i16, i32, i64);

impl Numeric for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value.clamp(f32::MIN as f64, f32::MAX as f64) as f32
    }
}

impl Numeric for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

fn euclidean<T: Numeric>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x.to_f64() - y.to_f64();
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

impl Genome {
    /// A genome of `len` default genes. Gene vectors are filled with clones of
    /// `prototype`, and stay empty without one.
    pub fn new(kind: GenomeKind, len: usize, prototype: Option<&dyn Gene>) -> Self {
        match kind {
            GenomeKind::Bit => Genome::Bit(vec![false; len]),
            GenomeKind::Byte => Genome::Byte(vec![0; len]),
            GenomeKind::Short => Genome::Short(vec![0; len]),
            GenomeKind::Int => Genome::Int(vec![0; len]),
            GenomeKind::Long => Genome::Long(vec![0; len]),
            GenomeKind::Float => Genome::Float(vec![0.0; len]),
            GenomeKind::Double => Genome::Double(vec![0.0; len]),
            GenomeKind::Gene => Genome::Gene(
                prototype
                    .map(|p| (0..len).map(|_| p.box_clone()).collect())
                    .unwrap_or_default(),
            ),
        }
    }

    pub fn kind(&self) -> GenomeKind {
        match self {
            Genome::Bit(_) => GenomeKind::Bit,
            Genome::Byte(_) => GenomeKind::Byte,
            Genome::Short(_) => GenomeKind::Short,
            Genome::Int(_) => GenomeKind::Int,
            Genome::Long(_) => GenomeKind::Long,
            Genome::Float(_) => GenomeKind::Float,
            Genome::Double(_) => GenomeKind::Double,
            Genome::Gene(_) => GenomeKind::Gene,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gene `i` as a number, for numeric and bit kinds.
    pub fn numeric_value(&self, i: usize) -> Option<f64> {
        match self {
            Genome::Bit(v) => v.get(i).map(|&b| if b { 1.0 } else { 0.0 }),
            Genome::Byte(v) => v.get(i).map(|&x| x.to_f64()),
            Genome::Short(v) => v.get(i).map(|&x| x.to_f64()),
            Genome::Int(v) => v.get(i).map(|&x| x.to_f64()),
            Genome::Long(v) => v.get(i).map(|&x| x.to_f64()),
            Genome::Float(v) => v.get(i).map(|&x| x.to_f64()),
            Genome::Double(v) => v.get(i).copied(),
            Genome::Gene(_) => None,
        }
    }

    /// Truncates or pads to `len` genes. Padding uses default values, or
    /// clones of `prototype` for gene vectors.
    pub fn resize(&mut self, len: usize, prototype: Option<&dyn Gene>) -> Result<()> {
        match self {
            Genome::Bit(v) => v.resize(len, false),
            Genome::Byte(v) => v.resize(len, 0),
            Genome::Short(v) => v.resize(len, 0),
            Genome::Int(v) => v.resize(len, 0),
            Genome::Long(v) => v.resize(len, 0),
            Genome::Float(v) => v.resize(len, 0.0),
            Genome::Double(v) => v.resize(len, 0.0),
            Genome::Gene(v) => {
                if len <= v.len() {
                    v.truncate(len);
                } else {
                    let prototype = prototype.ok_or_else(|| {
                        GeneticError::Other("growing a gene vector requires a prototype gene".to_string())
                    })?;
                    v.extend((v.len()..len).map(|_| prototype.box_clone()));
                }
            }
        }
        Ok(())
    }

    /// Hamming distance for bit vectors, Euclidean distance for numeric
    /// genomes of equal kind and length. Anything else is `0` when equal and
    /// infinitely far otherwise.
    pub fn distance(&self, other: &Genome) -> f64 {
        if self.len() == other.len() {
            match (self, other) {
                (Genome::Bit(a), Genome::Bit(b)) => {
                    return a.iter().zip(b).filter(|(x, y)| x != y).count() as f64
                }
                (Genome::Byte(a), Genome::Byte(b)) => return euclidean(a, b),
                (Genome::Short(a), Genome::Short(b)) => return euclidean(a, b),
                (Genome::Int(a), Genome::Int(b)) => return euclidean(a, b),
                (Genome::Long(a), Genome::Long(b)) => return euclidean(a, b),
                (Genome::Float(a), Genome::Float(b)) => return euclidean(a, b),
                (Genome::Double(a), Genome::Double(b)) => return euclidean(a, b),
                _ => {}
            }
        }
        if self == other {
            0.0
        } else {
            f64::INFINITY
        }
    }

    /// Splits at the sorted cut `points` into `points.len() + 1` contiguous pieces.
    pub fn split(&self, points: &[usize]) -> Result<Vec<Genome>> {
        let len = self.len();
        if points.windows(2).any(|w| w[0] > w[1]) {
            return Err(GeneticError::Breeding(format!(
                "split points must be sorted, got {:?}",
                points
            )));
        }
        if let Some(&last) = points.last() {
            if last > len {
                return Err(GeneticError::Breeding(format!(
                    "split point {} exceeds genome length {}",
                    last, len
                )));
            }
        }

        let starts = std::iter::once(0).chain(points.iter().copied());
        let ends = points.iter().copied().chain(std::iter::once(len));
        let ranges: Vec<(usize, usize)> = starts.zip(ends).collect();

        Ok(map_same!(self, v, ctor => ranges
            .iter()
            .map(|&(start, end)| ctor(v[start..end].to_vec()))
            .collect()))
    }

    /// Replaces the genes with the concatenation of `pieces`, which must all
    /// be of this genome's kind.
    pub fn join(&mut self, pieces: &[Genome]) -> Result<()> {
        let mut joined = Genome::new(self.kind(), 0, None);
        for piece in pieces {
            join_variant!(&mut joined, piece, acc, part => acc.extend_from_slice(part), else {
                return Err(GeneticError::KindMismatch {
                    expected: self.kind().name(),
                    found: piece.kind().name(),
                });
            });
        }
        *self = joined;
        Ok(())
    }

    /// Hash of the kind and gene values, consistent with equality.
    pub fn genome_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.kind().hash(&mut hasher);
        self.len().hash(&mut hasher);
        match self {
            Genome::Bit(v) => v.hash(&mut hasher),
            Genome::Byte(v) => v.hash(&mut hasher),
            Genome::Short(v) => v.hash(&mut hasher),
            Genome::Int(v) => v.hash(&mut hasher),
            Genome::Long(v) => v.hash(&mut hasher),
            Genome::Float(v) => v.iter().for_each(|x| x.to_bits().hash(&mut hasher)),
            Genome::Double(v) => v.iter().for_each(|x| x.to_bits().hash(&mut hasher)),
            Genome::Gene(v) => v.iter().for_each(|g| g.gene_hash().hash(&mut hasher)),
        }
        hasher.finish()
    }
}

/// Floats compare by bit pattern, so `NaN` equals itself and `0.0` differs
/// from `-0.0`, matching [`Genome::genome_hash`].
impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Genome::Bit(a), Genome::Bit(b)) => a == b,
            (Genome::Byte(a), Genome::Byte(b)) => a == b,
            (Genome::Short(a), Genome::Short(b)) => a == b,
            (Genome::Int(a), Genome::Int(b)) => a == b,
            (Genome::Long(a), Genome::Long(b)) => a == b,
            (Genome::Float(a), Genome::Float(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Genome::Double(a), Genome::Double(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Genome::Gene(a), Genome::Gene(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.gene_eq(y.as_ref()))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance() {
        let a = Genome::Bit(vec![true, false, true, true]);
        let b = Genome::Bit(vec![false, false, true, false]);
        assert_eq!(a.distance(&b), 2.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Genome::Double(vec![0.0, 0.0]);
        let b = Genome::Double(vec![3.0, 4.0]);
        assert_eq!(a.distance(&b), 5.0);
        let c = Genome::Short(vec![1, 1]);
        let d = Genome::Short(vec![4, 5]);
        assert_eq!(c.distance(&d), 5.0);
    }

    #[test]
    fn test_distance_across_kinds_is_infinite() {
        let a = Genome::Double(vec![1.0]);
        let b = Genome::Float(vec![1.0]);
        assert!(a.distance(&b).is_infinite());
        let c = Genome::Double(vec![1.0, 2.0]);
        assert!(a.distance(&c).is_infinite());
    }

    #[test]
    fn test_split_and_join() {
        let genome = Genome::Int(vec![1, 2, 3, 4, 5]);
        let pieces = genome.split(&[1, 3]).unwrap();
        assert_eq!(
            pieces,
            vec![
                Genome::Int(vec![1]),
                Genome::Int(vec![2, 3]),
                Genome::Int(vec![4, 5])
            ]
        );

        let mut joined = Genome::Int(Vec::new());
        joined.join(&pieces).unwrap();
        assert_eq!(joined, genome);
    }

    #[test]
    fn test_split_edges() {
        let genome = Genome::Bit(vec![true, false]);
        let pieces = genome.split(&[0, 2]).unwrap();
        assert_eq!(pieces.len(), 3);
        assert!(pieces[0].is_empty());
        assert!(pieces[2].is_empty());
        assert!(genome.split(&[2, 1]).is_err());
        assert!(genome.split(&[3]).is_err());
    }

    #[test]
    fn test_join_rejects_mixed_kinds() {
        let mut genome = Genome::Int(Vec::new());
        let result = genome.join(&[Genome::Int(vec![1]), Genome::Long(vec![2])]);
        assert!(matches!(result, Err(GeneticError::KindMismatch { .. })));
    }

    #[test]
    fn test_resize_pads_with_defaults() {
        let mut genome = Genome::Double(vec![1.0]);
        genome.resize(3, None).unwrap();
        assert_eq!(genome, Genome::Double(vec![1.0, 0.0, 0.0]));
        genome.resize(1, None).unwrap();
        assert_eq!(genome.len(), 1);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Genome::Double(vec![f64::NAN]), Genome::Double(vec![f64::NAN]));
        assert_ne!(Genome::Double(vec![0.0]), Genome::Double(vec![-0.0]));
        assert_eq!(
            Genome::Double(vec![f64::NAN]).genome_hash(),
            Genome::Double(vec![f64::NAN]).genome_hash()
        );
    }

    #[test]
    fn test_integral_conversions_saturate() {
        assert_eq!(i8::from_i64(1000), i8::MAX);
        assert_eq!(i8::from_f64(-1000.0), i8::MIN);
        assert_eq!(i16::from_f64(2.5), 3);
        assert_eq!(i16::from_f64(-2.5), -2);
        assert_eq!(f32::from_f64(1e300), f32::MAX);
    }
}
