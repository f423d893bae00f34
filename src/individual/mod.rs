//! # Vector Individuals
//!
//! A `VectorIndividual` couples a [`Genome`] with its fitness and evaluation
//! flag. All genotype operators take the owning [`VectorSpecies`], which
//! supplies bounds and operator settings, and fail with
//! [`GeneticError::KindMismatch`] when the genome and species disagree on the
//! genome kind.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::params::{Parameter, ParameterDatabase};
//! use vecgen::rng::RandomNumberGenerator;
//! use vecgen::species::{GenomeKind, VectorSpecies};
//!
//! let params = ParameterDatabase::new()
//!     .with("s.genome-size", 16)
//!     .with("s.mutation-prob", 0.1)
//!     .with("s.crossover-type", "two");
//! let species = VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Bit).unwrap();
//!
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let mut a = species.new_individual(&mut rng).unwrap();
//! let mut b = species.new_individual(&mut rng).unwrap();
//! a.crossover(&mut b, &species, &mut rng).unwrap();
//! a.mutate(&species, &mut rng).unwrap();
//!
//! let text = a.print_genotype();
//! let mut c = species.new_individual(&mut rng).unwrap();
//! c.parse_genotype(&species, &text).unwrap();
//! assert_eq!(a, c);
//! ```

mod crossover;
mod gene;
pub(crate) mod genome;
pub(crate) mod mutation;

use crate::codec::{self, BinaryReader, BinaryWriter, TextDecoder, TextEncoder};
use crate::error::{GeneticError, Result};
use crate::fitness::Fitness;
use crate::rng::RandomNumberGenerator;
use crate::species::VectorSpecies;

pub use gene::{Gene, RangeGene};
pub use genome::Genome;

const EVALUATED_PREAMBLE: &str = "Evaluated:";
const FITNESS_PREAMBLE: &str = "Fitness:";

/// One candidate solution: a vector genome plus its fitness.
///
/// Equality compares genomes only.
#[derive(Debug, Clone)]
pub struct VectorIndividual {
    pub genome: Genome,
    pub fitness: Fitness,
    pub evaluated: bool,
}

impl VectorIndividual {
    /// An unevaluated individual holding `genome`.
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: Fitness::default(),
            evaluated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.genome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genome.is_empty()
    }

    fn check_kind(&self, species: &VectorSpecies) -> Result<()> {
        if self.genome.kind() == species.kind() {
            Ok(())
        } else {
            Err(GeneticError::KindMismatch {
                expected: species.kind().name(),
                found: self.genome.kind().name(),
            })
        }
    }

    /// Redraws every gene within its bounds.
    pub fn reset(&mut self, species: &VectorSpecies, rng: &mut RandomNumberGenerator) -> Result<()> {
        self.check_kind(species)?;
        mutation::reset(species, &mut self.genome, rng);
        self.evaluated = false;
        Ok(())
    }

    /// Applies the species' mutation to each gene with its mutation probability.
    pub fn mutate(&mut self, species: &VectorSpecies, rng: &mut RandomNumberGenerator) -> Result<()> {
        self.check_kind(species)?;
        mutation::mutate(species, &mut self.genome, rng);
        self.evaluated = false;
        Ok(())
    }

    /// Recombines with `other` in place using the species' crossover type.
    pub fn crossover(
        &mut self,
        other: &mut VectorIndividual,
        species: &VectorSpecies,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        crossover::crossover(species, &mut self.genome, &mut other.genome, rng)?;
        self.evaluated = false;
        other.evaluated = false;
        Ok(())
    }

    /// See [`Genome::distance`].
    pub fn distance_to(&self, other: &VectorIndividual) -> f64 {
        self.genome.distance(&other.genome)
    }

    /// See [`Genome::split`].
    pub fn split(&self, points: &[usize]) -> Result<Vec<Genome>> {
        self.genome.split(points)
    }

    /// See [`Genome::join`].
    pub fn join(&mut self, pieces: &[Genome]) -> Result<()> {
        self.genome.join(pieces)?;
        self.evaluated = false;
        Ok(())
    }

    /// Truncates or pads the genome. Gene vectors pad with clones of the
    /// species' prototype gene.
    pub fn set_genome_length(&mut self, len: usize, species: &VectorSpecies) -> Result<()> {
        self.check_kind(species)?;
        self.genome.resize(len, species.gene_prototype())?;
        self.evaluated = false;
        Ok(())
    }

    /// Pulls every numeric gene into its bounds.
    pub fn clamp(&mut self, species: &VectorSpecies) -> Result<()> {
        self.check_kind(species)?;
        mutation::clamp(species, &mut self.genome);
        Ok(())
    }

    /// Whether every numeric gene lies within its bounds.
    pub fn is_in_range(&self, species: &VectorSpecies) -> bool {
        self.genome.kind() == species.kind() && mutation::is_in_range(species, &self.genome)
    }

    pub fn genome_hash(&self) -> u64 {
        self.genome.genome_hash()
    }

    /// The text form of the genome.
    pub fn print_genotype(&self) -> String {
        let mut out = TextEncoder::new();
        codec::encode_genome_text(&self.genome, &mut out);
        out.into_string()
    }

    /// Replaces the genome with the one encoded in `text`.
    pub fn parse_genotype(&mut self, species: &VectorSpecies, text: &str) -> Result<()> {
        let mut input = TextDecoder::new(text);
        self.genome = codec::decode_genome_text(species.kind(), species.gene_prototype(), &mut input)?;
        self.evaluated = false;
        Ok(())
    }

    pub fn write_genotype(&self, out: &mut BinaryWriter) -> Result<()> {
        codec::write_genome_binary(&self.genome, out)
    }

    pub fn read_genotype(&mut self, species: &VectorSpecies, input: &mut BinaryReader<'_>) -> Result<()> {
        self.genome = codec::read_genome_binary(species.kind(), species.gene_prototype(), input)?;
        self.evaluated = false;
        Ok(())
    }

    /// The evaluation flag, fitness and genotype, one per line.
    pub fn print_individual(&self) -> String {
        let mut out = TextEncoder::new();
        out.write_raw(EVALUATED_PREAMBLE);
        out.write_raw(" ");
        out.write_bool(self.evaluated);
        out.write_raw("\n");
        out.write_raw(FITNESS_PREAMBLE);
        out.write_raw(" ");
        out.write_double(self.fitness.value);
        out.write_raw("\n");
        codec::encode_genome_text(&self.genome, &mut out);
        out.write_raw("\n");
        out.into_string()
    }

    /// Reads the form written by [`VectorIndividual::print_individual`].
    pub fn parse_individual(species: &VectorSpecies, text: &str) -> Result<Self> {
        let mut input = TextDecoder::new(text);
        input.expect(EVALUATED_PREAMBLE)?;
        let evaluated = input.read_bool()?;
        input.expect(FITNESS_PREAMBLE)?;
        let fitness = Fitness::new(input.read_double()?);
        let genome = codec::decode_genome_text(species.kind(), species.gene_prototype(), &mut input)?;
        if !input.is_at_end() {
            return Err(GeneticError::codec(input.position(), "trailing input after genome"));
        }
        Ok(Self {
            genome,
            fitness,
            evaluated,
        })
    }
}

impl PartialEq for VectorIndividual {
    fn eq(&self, other: &Self) -> bool {
        self.genome == other.genome
    }
}
