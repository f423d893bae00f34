//! # Species
//!
//! A `VectorSpecies` is the shared, immutable configuration behind every
//! individual of one subpopulation: genome kind and size policy, per-gene
//! bounds, mutation and crossover settings, and the factory producing new
//! individuals.
//!
//! Per-gene settings resolve with the precedence
//! per-gene (`min-gene.3`) > per-segment (`segment.0.min-gene`) > global
//! (`min-gene`). Every key is looked up under the species base first and under
//! the default base `vector.species` second.
//!
//! ## Example
//!
//! ```rust
//! use vecgen::params::{Parameter, ParameterDatabase};
//! use vecgen::rng::RandomNumberGenerator;
//! use vecgen::species::{GenomeKind, VectorSpecies};
//!
//! let params = ParameterDatabase::new()
//!     .with("vector.species.genome-size", 4)
//!     .with("vector.species.min-gene", -1.0)
//!     .with("vector.species.max-gene", 1.0)
//!     .with("vector.species.mutation-prob", 0.25)
//!     .with("vector.species.mutation-type", "gauss")
//!     .with("vector.species.mutation-stdev", 0.1)
//!     .with("vector.species.crossover-type", "sbx")
//!     .with("vector.species.crossover-distribution-index", 20);
//!
//! let base = Parameter::new("pop.subpop.0.species");
//! let species = VectorSpecies::setup(&params, &base, GenomeKind::Double).unwrap();
//!
//! let mut rng = RandomNumberGenerator::from_seed(1);
//! let individual = species.new_individual(&mut rng).unwrap();
//! assert_eq!(individual.len(), 4);
//! assert!(individual.is_in_range(&species));
//! ```

pub mod policy;
mod resolve;

use std::ops::Range;

use tracing::{instrument, warn};

use crate::error::{GeneticError, Result};
use crate::individual::{Gene, Genome, VectorIndividual};
use crate::params::{Parameter, ParameterSource};
use crate::rng::RandomNumberGenerator;
use crate::warn_once::WarnOnce;

pub use policy::{
    BitMutation, CrossoverType, FloatMutation, FloatPolicy, GenePolicy, GenomeKind, GenomeSize,
    IntegerMutation, IntegerPolicy,
};
use resolve::{Layer, RawGene};

/// Default base consulted when a key is missing under the species base.
pub const DEFAULT_BASE: &str = "vector.species";

pub const P_GENOME_SIZE: &str = "genome-size";
pub const P_MIN_INITIAL_SIZE: &str = "min-initial-size";
pub const P_MAX_INITIAL_SIZE: &str = "max-initial-size";
pub const P_GEOMETRIC_PROBABILITY: &str = "geometric-prob";
pub const P_CHUNK_SIZE: &str = "chunk-size";
pub const P_NUM_SEGMENTS: &str = "num-segments";
pub const P_SEGMENT_TYPE: &str = "segment-type";
pub const P_SEGMENT: &str = "segment";
pub const P_SEGMENT_START: &str = "start";
pub const P_SEGMENT_END: &str = "end";
pub const P_MIN_GENE: &str = "min-gene";
pub const P_MAX_GENE: &str = "max-gene";
pub const P_MUTATION_PROB: &str = "mutation-prob";
pub const P_DUPLICATE_RETRIES: &str = "duplicate-retries";
pub const P_MUTATION_TYPE: &str = "mutation-type";
pub const P_STDEV: &str = "mutation-stdev";
pub const P_MUTATION_DISTRIBUTION_INDEX: &str = "mutation-distribution-index";
pub const P_ALTERNATIVE_POLYNOMIAL: &str = "alternative-polynomial-version";
pub const P_OUT_OF_BOUNDS_RETRIES: &str = "out-of-bounds-retries";
pub const P_MUTATION_BOUNDED: &str = "mutation-bounded";
pub const P_RANDOM_WALK_PROBABILITY: &str = "random-walk-probability";
pub const P_CROSSOVER_TYPE: &str = "crossover-type";
pub const P_CROSSOVER_PROB: &str = "crossover-prob";
pub const P_CROSSOVER_DISTRIBUTION_INDEX: &str = "crossover-distribution-index";
pub const P_LINE_EXTENSION: &str = "line-extension";
pub const P_INTERMEDIATE_RETRIES: &str = "intermediate-retries";

const DEFAULT_OUT_OF_BOUNDS_RETRIES: usize = 100;

const COMMON_KEYS: &[&str] = &[P_MUTATION_PROB, P_DUPLICATE_RETRIES];
const BIT_KEYS: &[&str] = &[P_MUTATION_TYPE];
const INTEGER_KEYS: &[&str] = &[
    P_MIN_GENE,
    P_MAX_GENE,
    P_MUTATION_TYPE,
    P_RANDOM_WALK_PROBABILITY,
    P_MUTATION_BOUNDED,
];
const FLOAT_KEYS: &[&str] = &[
    P_MIN_GENE,
    P_MAX_GENE,
    P_MUTATION_TYPE,
    P_STDEV,
    P_MUTATION_DISTRIBUTION_INDEX,
    P_ALTERNATIVE_POLYNOMIAL,
    P_OUT_OF_BOUNDS_RETRIES,
    P_MUTATION_BOUNDED,
    P_RANDOM_WALK_PROBABILITY,
];

/// Kind-specific per-gene policy.
#[derive(Debug)]
pub enum SpeciesPolicy {
    Bit(Vec<BitMutation>),
    Integer(Vec<IntegerPolicy>),
    Float(Vec<FloatPolicy>),
    /// Gene vectors only carry the prototype new genes are cloned from.
    Gene(Box<dyn Gene>),
}

/// Warnings each species emits at most once.
#[derive(Debug, Default)]
pub struct SpeciesWarnings {
    pub clamped_gene_index: WarnOnce,
    pub out_of_bounds_gave_up: WarnOnce,
    pub intermediate_gave_up: WarnOnce,
    pub non_integral_bounds: WarnOnce,
}

/// Shared configuration and factory for vector individuals.
#[derive(Debug)]
pub struct VectorSpecies {
    kind: GenomeKind,
    genome_size: GenomeSize,
    chunk_size: usize,
    crossover_type: CrossoverType,
    crossover_probability: f64,
    line_extension: f64,
    crossover_distribution_index: f64,
    intermediate_retries: Option<usize>,
    genes: Vec<GenePolicy>,
    policy: SpeciesPolicy,
    warnings: SpeciesWarnings,
}

impl VectorSpecies {
    /// Builds a species of a numeric or bit kind from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::Configuration`] naming the offending key for any
    /// missing, malformed or out-of-range value, and when asked for
    /// [`GenomeKind::Gene`] (use [`VectorSpecies::setup_gene`]).
    #[instrument(level = "debug", skip(params), fields(base = %base))]
    pub fn setup(params: &dyn ParameterSource, base: &Parameter, kind: GenomeKind) -> Result<Self> {
        if kind == GenomeKind::Gene {
            return Err(GeneticError::configuration(
                base,
                "gene vectors need a prototype gene, use setup_gene",
            ));
        }
        Self::setup_inner(params, base, kind, None)
    }

    /// Builds a gene-vector species whose genes are clones of `prototype`.
    #[instrument(level = "debug", skip(params, prototype), fields(base = %base))]
    pub fn setup_gene(
        params: &dyn ParameterSource,
        base: &Parameter,
        prototype: Box<dyn Gene>,
    ) -> Result<Self> {
        Self::setup_inner(params, base, GenomeKind::Gene, Some(prototype))
    }

    fn setup_inner(
        params: &dyn ParameterSource,
        base: &Parameter,
        kind: GenomeKind,
        prototype: Option<Box<dyn Gene>>,
    ) -> Result<Self> {
        let def = Parameter::new(DEFAULT_BASE);

        let genome_size = read_genome_size(params, base, &def)?;
        let configured_len = match genome_size {
            GenomeSize::Fixed(n) => n,
            GenomeSize::Geometric { min, .. } => min.max(1),
            GenomeSize::Uniform { max, .. } => max.max(1),
        };

        let chunk_key = base.push(P_CHUNK_SIZE);
        let chunk_size = match params.get_int(&chunk_key, Some(&def.push(P_CHUNK_SIZE)))? {
            None => 1,
            Some(c) if c >= 1 => c as usize,
            Some(c) => {
                return Err(GeneticError::configuration(
                    &chunk_key,
                    format!("must be >= 1, found {}", c),
                ))
            }
        };
        if let GenomeSize::Fixed(n) = genome_size {
            if n % chunk_size != 0 {
                return Err(GeneticError::configuration(
                    &chunk_key,
                    format!("genome size {} is not a multiple of chunk size {}", n, chunk_size),
                ));
            }
        }

        let names: Vec<&'static str> = COMMON_KEYS
            .iter()
            .chain(match kind {
                GenomeKind::Bit => BIT_KEYS,
                GenomeKind::Float | GenomeKind::Double => FLOAT_KEYS,
                GenomeKind::Gene => &[],
                _ => INTEGER_KEYS,
            })
            .copied()
            .collect();

        let mut global = RawGene::default();
        global.absorb(params, &Layer::global(base, &def), &names);
        let mut raws = vec![global; configured_len];

        for (segment, range) in read_segments(params, base, &def, genome_size, configured_len)? {
            let layer = Layer::segment(base, &def, segment);
            let mut probe = RawGene::default();
            let found = probe.absorb(params, &layer, &names);
            if kind.is_numeric() {
                for required in [P_MIN_GENE, P_MAX_GENE] {
                    if !found.contains(&required) {
                        let (key, _) = layer.keys(required);
                        return Err(GeneticError::configuration(key, "missing for segment"));
                    }
                }
            }
            for raw in &mut raws[range] {
                raw.absorb(params, &layer, &names);
            }
        }

        for (i, raw) in raws.iter_mut().enumerate() {
            let found = raw.absorb(params, &Layer::gene(base, &def, i), &names);
            if kind.is_numeric() {
                let has_min = found.contains(&P_MIN_GENE);
                let has_max = found.contains(&P_MAX_GENE);
                if has_min != has_max {
                    let (present, absent) = if has_min {
                        (P_MIN_GENE, P_MAX_GENE)
                    } else {
                        (P_MAX_GENE, P_MIN_GENE)
                    };
                    warn!(
                        gene = i,
                        "{}.{} is set but {}.{} is not; {} falls back to the segment or global value",
                        present,
                        i,
                        absent,
                        i,
                        absent
                    );
                }
            }
        }

        let warnings = SpeciesWarnings::default();
        let genes = raws
            .iter()
            .map(|raw| finalize_gene_policy(raw, base))
            .collect::<Result<Vec<_>>>()?;

        let policy = match kind {
            GenomeKind::Bit => SpeciesPolicy::Bit(
                raws.iter()
                    .map(finalize_bit)
                    .collect::<Result<Vec<_>>>()?,
            ),
            GenomeKind::Float | GenomeKind::Double => SpeciesPolicy::Float(
                raws.iter()
                    .enumerate()
                    .map(|(i, raw)| finalize_float(raw, base, kind, i, &warnings))
                    .collect::<Result<Vec<_>>>()?,
            ),
            GenomeKind::Gene => match prototype {
                Some(p) => SpeciesPolicy::Gene(p),
                None => return Err(GeneticError::configuration(base, "missing prototype gene")),
            },
            _ => SpeciesPolicy::Integer(
                raws.iter()
                    .enumerate()
                    .map(|(i, raw)| finalize_integer(raw, base, kind, i))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };

        let species = Self::with_crossover(
            params,
            base,
            &def,
            kind,
            genome_size,
            chunk_size,
            genes,
            policy,
            warnings,
        )?;
        tracing::debug!(
            kind = %species.kind,
            genes = species.genes.len(),
            crossover = species.crossover_type.name(),
            "species configured"
        );
        Ok(species)
    }

    #[allow(clippy::too_many_arguments)]
    fn with_crossover(
        params: &dyn ParameterSource,
        base: &Parameter,
        def: &Parameter,
        kind: GenomeKind,
        genome_size: GenomeSize,
        chunk_size: usize,
        genes: Vec<GenePolicy>,
        policy: SpeciesPolicy,
        warnings: SpeciesWarnings,
    ) -> Result<Self> {
        let type_key = base.push(P_CROSSOVER_TYPE);
        let crossover_type = match params.get_string(&type_key, Some(&def.push(P_CROSSOVER_TYPE))) {
            None => {
                warn!(key = %type_key, "no crossover type given, assuming one-point crossover");
                CrossoverType::OnePoint
            }
            Some(s) => s.parse().map_err(|_| {
                GeneticError::configuration(
                    &type_key,
                    format!("expected one, two, any, line, intermediate or sbx, found '{}'", s),
                )
            })?,
        };
        match crossover_type {
            CrossoverType::Line | CrossoverType::Intermediate if !kind.is_numeric() => {
                return Err(GeneticError::configuration(
                    &type_key,
                    format!("{} recombination requires a numeric genome, not {}", crossover_type.name(), kind),
                ))
            }
            CrossoverType::SimulatedBinary if !kind.is_floating() => {
                return Err(GeneticError::configuration(
                    &type_key,
                    format!("simulated binary crossover requires a float or double genome, not {}", kind),
                ))
            }
            _ => {}
        }

        let prob_key = base.push(P_CROSSOVER_PROB);
        let prob = params.get_double(&prob_key, Some(&def.push(P_CROSSOVER_PROB)))?;
        let crossover_probability = match (crossover_type, prob) {
            (CrossoverType::AnyPoint, None) => {
                return Err(GeneticError::configuration(
                    &prob_key,
                    "any-point crossover requires a crossover probability",
                ))
            }
            (CrossoverType::AnyPoint, Some(p)) if !(0.0..=0.5).contains(&p) => {
                return Err(GeneticError::configuration(
                    &prob_key,
                    format!("must be within [0, 0.5] for any-point crossover, found {}", p),
                ))
            }
            (_, Some(p)) if !(0.0..=1.0).contains(&p) => {
                return Err(GeneticError::configuration(
                    &prob_key,
                    format!("must be within [0, 1], found {}", p),
                ))
            }
            (_, p) => p.unwrap_or(0.0),
        };

        let ext_key = base.push(P_LINE_EXTENSION);
        let line_extension = params
            .get_double(&ext_key, Some(&def.push(P_LINE_EXTENSION)))?
            .unwrap_or(0.0);
        if !(line_extension.is_finite() && line_extension >= 0.0) {
            return Err(GeneticError::configuration(
                &ext_key,
                format!("must be a finite value >= 0, found {}", line_extension),
            ));
        }

        let eta_key = base.push(P_CROSSOVER_DISTRIBUTION_INDEX);
        let eta = params.get_double(&eta_key, Some(&def.push(P_CROSSOVER_DISTRIBUTION_INDEX)))?;
        let crossover_distribution_index = match (crossover_type, eta) {
            (CrossoverType::SimulatedBinary, None) => {
                return Err(GeneticError::configuration(
                    &eta_key,
                    "simulated binary crossover requires a distribution index",
                ))
            }
            (_, Some(e)) if !(e.is_finite() && e >= 0.0) => {
                return Err(GeneticError::configuration(
                    &eta_key,
                    format!("must be a finite value >= 0, found {}", e),
                ))
            }
            (_, e) => e.unwrap_or(0.0),
        };

        let retries_key = base.push(P_INTERMEDIATE_RETRIES);
        let intermediate_retries =
            match params.get_int(&retries_key, Some(&def.push(P_INTERMEDIATE_RETRIES)))? {
                None | Some(0) => None,
                Some(n) if n > 0 => Some(n as usize),
                Some(n) => {
                    return Err(GeneticError::configuration(
                        &retries_key,
                        format!("must be >= 0, found {}", n),
                    ))
                }
            };

        Ok(Self {
            kind,
            genome_size,
            chunk_size,
            crossover_type,
            crossover_probability,
            line_extension,
            crossover_distribution_index,
            intermediate_retries,
            genes,
            policy,
            warnings,
        })
    }

    pub fn kind(&self) -> GenomeKind {
        self.kind
    }

    pub fn genome_size(&self) -> GenomeSize {
        self.genome_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn crossover_type(&self) -> CrossoverType {
        self.crossover_type
    }

    pub fn crossover_probability(&self) -> f64 {
        self.crossover_probability
    }

    pub fn line_extension(&self) -> f64 {
        self.line_extension
    }

    pub fn crossover_distribution_index(&self) -> f64 {
        self.crossover_distribution_index
    }

    /// Cap on intermediate-recombination redraws per gene; `None` retries forever.
    pub fn intermediate_retries(&self) -> Option<usize> {
        self.intermediate_retries
    }

    /// Number of genes with their own configured settings.
    pub fn configured_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn policy(&self) -> &SpeciesPolicy {
        &self.policy
    }

    pub fn warnings(&self) -> &SpeciesWarnings {
        &self.warnings
    }

    /// Maps a gene index onto the configured settings, clamping indices past
    /// the end (possible with dynamic genome sizes) to the last entry.
    pub(crate) fn gene_index(&self, i: usize) -> usize {
        let last = self.genes.len() - 1;
        if i > last {
            self.warnings.clamped_gene_index.warn(|| {
                warn!(
                    gene = i,
                    configured = self.genes.len(),
                    "gene index exceeds the configured settings, using the settings of gene {}",
                    last
                )
            });
            last
        } else {
            i
        }
    }

    pub fn gene_policy(&self, i: usize) -> &GenePolicy {
        &self.genes[self.gene_index(i)]
    }

    pub fn bit_mutation(&self, i: usize) -> Option<BitMutation> {
        match &self.policy {
            SpeciesPolicy::Bit(types) => Some(types[self.gene_index(i)]),
            _ => None,
        }
    }

    pub fn integer_policy(&self, i: usize) -> Option<&IntegerPolicy> {
        match &self.policy {
            SpeciesPolicy::Integer(policies) => Some(&policies[self.gene_index(i)]),
            _ => None,
        }
    }

    pub fn float_policy(&self, i: usize) -> Option<&FloatPolicy> {
        match &self.policy {
            SpeciesPolicy::Float(policies) => Some(&policies[self.gene_index(i)]),
            _ => None,
        }
    }

    pub fn gene_prototype(&self) -> Option<&dyn Gene> {
        match &self.policy {
            SpeciesPolicy::Gene(prototype) => Some(prototype.as_ref()),
            _ => None,
        }
    }

    /// Inclusive lower bound of gene `i`. Bit genes span `[0, 1]`, object
    /// genes are unbounded.
    pub fn min_gene(&self, i: usize) -> f64 {
        match &self.policy {
            SpeciesPolicy::Integer(p) => p[self.gene_index(i)].min as f64,
            SpeciesPolicy::Float(p) => p[self.gene_index(i)].min,
            SpeciesPolicy::Bit(_) => 0.0,
            SpeciesPolicy::Gene(_) => f64::NEG_INFINITY,
        }
    }

    /// Inclusive upper bound of gene `i`.
    pub fn max_gene(&self, i: usize) -> f64 {
        match &self.policy {
            SpeciesPolicy::Integer(p) => p[self.gene_index(i)].max as f64,
            SpeciesPolicy::Float(p) => p[self.gene_index(i)].max,
            SpeciesPolicy::Bit(_) => 1.0,
            SpeciesPolicy::Gene(_) => f64::INFINITY,
        }
    }

    /// Whether mutation of gene `i` must stay within its bounds.
    pub fn mutation_is_bounded(&self, i: usize) -> bool {
        match &self.policy {
            SpeciesPolicy::Integer(p) => p[self.gene_index(i)].bounded,
            SpeciesPolicy::Float(p) => p[self.gene_index(i)].bounded,
            _ => false,
        }
    }

    /// True when every bounded gene of `genome` lies within its bounds.
    ///
    /// Genes whose mutation is unbounded are always valid.
    pub fn is_valid(&self, genome: &Genome) -> bool {
        (0..genome.len()).all(|i| {
            if !self.mutation_is_bounded(i) {
                return true;
            }
            match genome.numeric_value(i) {
                Some(v) => v >= self.min_gene(i) && v <= self.max_gene(i),
                None => true,
            }
        })
    }

    /// Draws the length of a new genome according to the size policy.
    pub fn draw_genome_length(&self, rng: &mut RandomNumberGenerator) -> usize {
        match self.genome_size {
            GenomeSize::Fixed(n) => n,
            GenomeSize::Uniform { min, max } => rng.closed_interval(min as i64, max as i64) as usize,
            GenomeSize::Geometric { min, probability } => {
                let mut size = min;
                while rng.next_bool_with(probability) {
                    size += 1;
                }
                size
            }
        }
    }

    /// Creates a freshly reset individual of this species.
    pub fn new_individual(&self, rng: &mut RandomNumberGenerator) -> Result<VectorIndividual> {
        let len = self.draw_genome_length(rng);
        let mut individual = VectorIndividual::new(Genome::new(self.kind, len, self.gene_prototype()));
        individual.reset(self, rng)?;
        Ok(individual)
    }
}

fn read_genome_size(
    params: &dyn ParameterSource,
    base: &Parameter,
    def: &Parameter,
) -> Result<GenomeSize> {
    let key = base.push(P_GENOME_SIZE);
    let raw = params.require_string(&key, Some(&def.push(P_GENOME_SIZE)))?;
    let min_key = base.push(P_MIN_INITIAL_SIZE);
    let min_def = def.push(P_MIN_INITIAL_SIZE);

    match raw.as_str() {
        "geometric" => {
            let min = non_negative(params.require_int(&min_key, Some(&min_def))?, &min_key)?;
            let p_key = base.push(P_GEOMETRIC_PROBABILITY);
            let probability = params.require_double(&p_key, Some(&def.push(P_GEOMETRIC_PROBABILITY)))?;
            if !(0.0..1.0).contains(&probability) {
                return Err(GeneticError::configuration(
                    &p_key,
                    format!("must be within [0, 1), found {}", probability),
                ));
            }
            Ok(GenomeSize::Geometric { min, probability })
        }
        "uniform" => {
            let min = non_negative(params.require_int(&min_key, Some(&min_def))?, &min_key)?;
            let max_key = base.push(P_MAX_INITIAL_SIZE);
            let max = non_negative(
                params.require_int(&max_key, Some(&def.push(P_MAX_INITIAL_SIZE)))?,
                &max_key,
            )?;
            if max < min {
                return Err(GeneticError::configuration(
                    &max_key,
                    format!("must be >= {} ({}), found {}", P_MIN_INITIAL_SIZE, min, max),
                ));
            }
            Ok(GenomeSize::Uniform { min, max })
        }
        other => match other.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(GenomeSize::Fixed(n as usize)),
            _ => Err(GeneticError::configuration(
                &key,
                format!("expected an integer >= 1, 'geometric' or 'uniform', found '{}'", other),
            )),
        },
    }
}

fn non_negative(value: i64, key: &Parameter) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| GeneticError::configuration(key, format!("must be >= 0, found {}", value)))
}

/// Reads the segment table, returning each segment's gene range.
fn read_segments(
    params: &dyn ParameterSource,
    base: &Parameter,
    def: &Parameter,
    genome_size: GenomeSize,
    len: usize,
) -> Result<Vec<(usize, Range<usize>)>> {
    let num_key = base.push(P_NUM_SEGMENTS);
    let count = match params.get_int(&num_key, Some(&def.push(P_NUM_SEGMENTS)))? {
        None => return Ok(Vec::new()),
        Some(n) if n >= 1 => n as usize,
        Some(n) => {
            return Err(GeneticError::configuration(
                &num_key,
                format!("must be >= 1, found {}", n),
            ))
        }
    };
    if genome_size.is_dynamic() {
        return Err(GeneticError::configuration(
            &num_key,
            "segments require a fixed genome size",
        ));
    }
    if count > len {
        return Err(GeneticError::configuration(
            &num_key,
            format!("{} segments cannot partition {} genes", count, len),
        ));
    }

    let type_key = base.push(P_SEGMENT_TYPE);
    let by_end = match params
        .get_string(&type_key, Some(&def.push(P_SEGMENT_TYPE)))
        .as_deref()
    {
        None | Some(P_SEGMENT_START) => false,
        Some(P_SEGMENT_END) => true,
        Some(other) => {
            return Err(GeneticError::configuration(
                &type_key,
                format!("expected 'start' or 'end', found '{}'", other),
            ))
        }
    };
    let field = if by_end { P_SEGMENT_END } else { P_SEGMENT_START };

    let mut marks = Vec::with_capacity(count);
    for j in 0..count {
        let key = base.push(P_SEGMENT).push(j).push(field);
        let value = params.require_int(&key, Some(&def.push(P_SEGMENT).push(j).push(field)))?;
        if value < 0 || value as usize >= len {
            return Err(GeneticError::configuration(
                &key,
                format!("must be within [0, {}), found {}", len, value),
            ));
        }
        let value = value as usize;
        if let Some(&previous) = marks.last() {
            if value <= previous {
                return Err(GeneticError::configuration(
                    &key,
                    format!("segments must be strictly increasing, {} follows {}", value, previous),
                ));
            }
        }
        marks.push(value);
    }

    Ok(marks
        .iter()
        .enumerate()
        .map(|(j, &mark)| {
            let range = if by_end {
                let start = if j == 0 { 0 } else { marks[j - 1] + 1 };
                start..mark + 1
            } else {
                let end = marks.get(j + 1).copied().unwrap_or(len);
                mark..end
            };
            (j, range)
        })
        .collect())
}

fn missing(base: &Parameter, name: &str) -> GeneticError {
    GeneticError::configuration(base.push(name), "missing")
}

fn finalize_gene_policy(raw: &RawGene, base: &Parameter) -> Result<GenePolicy> {
    Ok(GenePolicy {
        mutation_probability: raw
            .probability(P_MUTATION_PROB)?
            .ok_or_else(|| missing(base, P_MUTATION_PROB))?,
        duplicate_retries: raw.count(P_DUPLICATE_RETRIES)?.unwrap_or(0),
    })
}

fn finalize_bit(raw: &RawGene) -> Result<BitMutation> {
    match raw.string(P_MUTATION_TYPE) {
        None | Some(("flip", _)) => Ok(BitMutation::Flip),
        Some(("reset", _)) => Ok(BitMutation::Reset),
        Some((other, key)) => Err(GeneticError::configuration(
            key,
            format!("expected 'flip' or 'reset', found '{}'", other),
        )),
    }
}

fn walk_probability(raw: &RawGene, base: &Parameter) -> Result<f64> {
    raw.probability(P_RANDOM_WALK_PROBABILITY)?
        .ok_or_else(|| missing(base, P_RANDOM_WALK_PROBABILITY))
}

fn finalize_integer(raw: &RawGene, base: &Parameter, kind: GenomeKind, i: usize) -> Result<IntegerPolicy> {
    let (lo, hi) = kind.integer_range().unwrap_or((i64::MIN, i64::MAX));
    let bound = |name: &str| -> Result<i64> {
        let (value, key) = raw.int(name)?.ok_or_else(|| missing(base, name))?;
        if value < lo || value > hi {
            return Err(GeneticError::configuration(
                key,
                format!("{} does not fit in a {} gene", value, kind),
            ));
        }
        Ok(value)
    };
    let min = bound(P_MIN_GENE)?;
    let max = bound(P_MAX_GENE)?;
    if max < min {
        let key = raw.key(P_MAX_GENE).cloned().unwrap_or_else(|| base.push(P_MAX_GENE));
        return Err(GeneticError::configuration(
            key,
            format!("max-gene {} is less than min-gene {} for gene {}", max, min, i),
        ));
    }

    let mutation = match raw.string(P_MUTATION_TYPE) {
        None | Some(("reset", _)) => IntegerMutation::Reset,
        Some(("random-walk", _)) => IntegerMutation::RandomWalk {
            probability: walk_probability(raw, base)?,
        },
        Some((other, key)) => {
            return Err(GeneticError::configuration(
                key,
                format!("expected 'reset' or 'random-walk', found '{}'", other),
            ))
        }
    };

    Ok(IntegerPolicy {
        min,
        max,
        mutation,
        bounded: raw.boolean(P_MUTATION_BOUNDED)?.map(|(b, _)| b).unwrap_or(true),
    })
}

fn finalize_float(
    raw: &RawGene,
    base: &Parameter,
    kind: GenomeKind,
    i: usize,
    warnings: &SpeciesWarnings,
) -> Result<FloatPolicy> {
    let bound = |name: &str| -> Result<f64> {
        let (value, key) = raw.double(name)?.ok_or_else(|| missing(base, name))?;
        if value.is_nan() {
            return Err(GeneticError::configuration(key, "must not be NaN"));
        }
        match kind {
            GenomeKind::Float => {
                if !(value.is_finite() && value.abs() <= f32::MAX as f64) {
                    return Err(GeneticError::configuration(
                        key,
                        format!("{} does not fit in a float gene", value),
                    ));
                }
                Ok(value as f32 as f64)
            }
            _ if !value.is_finite() => Err(GeneticError::configuration(
                key,
                format!("{} is not a finite bound", value),
            )),
            _ => Ok(value),
        }
    };
    let min = bound(P_MIN_GENE)?;
    let max = bound(P_MAX_GENE)?;
    if max < min {
        let key = raw.key(P_MAX_GENE).cloned().unwrap_or_else(|| base.push(P_MAX_GENE));
        return Err(GeneticError::configuration(
            key,
            format!("max-gene {} is less than min-gene {} for gene {}", max, min, i),
        ));
    }

    let mutation = match raw.string(P_MUTATION_TYPE) {
        None | Some(("reset", _)) => FloatMutation::Reset,
        Some(("gauss", _)) => {
            let (stdev, key) = raw.double(P_STDEV)?.ok_or_else(|| missing(base, P_STDEV))?;
            if !(stdev.is_finite() && stdev > 0.0) {
                return Err(GeneticError::configuration(
                    key,
                    format!("must be a finite value > 0, found {}", stdev),
                ));
            }
            FloatMutation::Gaussian { stdev }
        }
        Some(("polynomial", _)) => {
            let (eta, key) = raw
                .double(P_MUTATION_DISTRIBUTION_INDEX)?
                .ok_or_else(|| missing(base, P_MUTATION_DISTRIBUTION_INDEX))?;
            if !(eta.is_finite() && eta >= 0.0) {
                return Err(GeneticError::configuration(
                    key,
                    format!("must be a finite value >= 0, found {}", eta),
                ));
            }
            FloatMutation::Polynomial {
                distribution_index: eta,
                alternative: raw
                    .boolean(P_ALTERNATIVE_POLYNOMIAL)?
                    .map(|(b, _)| b)
                    .unwrap_or(true),
            }
        }
        Some(("integer-reset", _)) => FloatMutation::IntegerReset,
        Some(("integer-random-walk", _)) => FloatMutation::IntegerRandomWalk {
            probability: walk_probability(raw, base)?,
        },
        Some((other, key)) => {
            return Err(GeneticError::configuration(
                key,
                format!(
                    "expected reset, gauss, polynomial, integer-reset or integer-random-walk, found '{}'",
                    other
                ),
            ))
        }
    };

    if mutation.is_integral() {
        let key = raw.key(P_MIN_GENE).cloned().unwrap_or_else(|| base.push(P_MIN_GENE));
        if min < i64::MIN as f64 || max > i64::MAX as f64 {
            return Err(GeneticError::configuration(
                key,
                format!("integer mutation needs bounds within the 64-bit range, gene {}", i),
            ));
        }
        if min.ceil() > max.floor() {
            return Err(GeneticError::configuration(
                key,
                format!("no integer lies within [{}, {}] for gene {}", min, max, i),
            ));
        }
        if min.fract() != 0.0 || max.fract() != 0.0 {
            warnings.non_integral_bounds.warn(|| {
                warn!(
                    gene = i,
                    min, max, "integer mutation with non-integral bounds, values are kept to integers inside them"
                )
            });
        }
    }

    Ok(FloatPolicy {
        min,
        max,
        mutation,
        bounded: raw.boolean(P_MUTATION_BOUNDED)?.map(|(b, _)| b).unwrap_or(true),
        out_of_bounds_retries: raw
            .count(P_OUT_OF_BOUNDS_RETRIES)?
            .unwrap_or(DEFAULT_OUT_OF_BOUNDS_RETRIES),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterDatabase;

    fn base() -> Parameter {
        Parameter::new("pop.subpop.0.species")
    }

    fn double_params() -> ParameterDatabase {
        ParameterDatabase::new()
            .with("pop.subpop.0.species.genome-size", 6)
            .with("pop.subpop.0.species.min-gene", 0.0)
            .with("pop.subpop.0.species.max-gene", 1.0)
            .with("pop.subpop.0.species.mutation-prob", 0.5)
            .with("pop.subpop.0.species.crossover-type", "two")
    }

    fn expect_config_key(result: Result<VectorSpecies>, expected: &str) {
        match result {
            Err(GeneticError::Configuration { key, .. }) => assert_eq!(key, expected),
            Err(other) => panic!("Expected Configuration error, got {:?}", other),
            Ok(_) => panic!("Expected Configuration error, got a species"),
        }
    }

    #[test]
    fn test_global_bounds() {
        let species = VectorSpecies::setup(&double_params(), &base(), GenomeKind::Double).unwrap();
        assert_eq!(species.configured_genes(), 6);
        for i in 0..6 {
            assert_eq!(species.min_gene(i), 0.0);
            assert_eq!(species.max_gene(i), 1.0);
            assert_eq!(species.gene_policy(i).mutation_probability, 0.5);
        }
        assert_eq!(species.crossover_type(), CrossoverType::TwoPoint);
    }

    #[test]
    fn test_precedence_gene_over_segment_over_global() {
        let params = double_params()
            .with("pop.subpop.0.species.num-segments", 2)
            .with("pop.subpop.0.species.segment.0.start", 0)
            .with("pop.subpop.0.species.segment.0.min-gene", -5.0)
            .with("pop.subpop.0.species.segment.0.max-gene", 5.0)
            .with("pop.subpop.0.species.segment.1.start", 3)
            .with("pop.subpop.0.species.segment.1.min-gene", 10.0)
            .with("pop.subpop.0.species.segment.1.max-gene", 20.0)
            .with("pop.subpop.0.species.min-gene.4", 12.0)
            .with("pop.subpop.0.species.max-gene.4", 13.0);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Double).unwrap();
        assert_eq!(species.min_gene(0), -5.0);
        assert_eq!(species.max_gene(2), 5.0);
        assert_eq!(species.min_gene(3), 10.0);
        assert_eq!(species.min_gene(4), 12.0);
        assert_eq!(species.max_gene(4), 13.0);
        assert_eq!(species.max_gene(5), 20.0);
    }

    #[test]
    fn test_end_segments() {
        let params = ParameterDatabase::new()
            .with("pop.subpop.0.species.genome-size", 4)
            .with("pop.subpop.0.species.min-gene", 0)
            .with("pop.subpop.0.species.max-gene", 1)
            .with("pop.subpop.0.species.mutation-prob", 0.1)
            .with("pop.subpop.0.species.num-segments", 2)
            .with("pop.subpop.0.species.segment-type", "end")
            .with("pop.subpop.0.species.segment.0.end", 0)
            .with("pop.subpop.0.species.segment.0.min-gene", 5)
            .with("pop.subpop.0.species.segment.0.max-gene", 6)
            .with("pop.subpop.0.species.segment.1.end", 2)
            .with("pop.subpop.0.species.segment.1.min-gene", 7)
            .with("pop.subpop.0.species.segment.1.max-gene", 8);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Int).unwrap();
        assert_eq!(species.min_gene(0), 5.0);
        assert_eq!(species.min_gene(1), 7.0);
        assert_eq!(species.min_gene(2), 7.0);
        assert_eq!(species.min_gene(3), 0.0);
    }

    #[test]
    fn test_segment_without_bounds_is_fatal() {
        let params = double_params()
            .with("pop.subpop.0.species.num-segments", 1)
            .with("pop.subpop.0.species.segment.0.start", 0)
            .with("pop.subpop.0.species.segment.0.min-gene", 0.5);
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.segment.0.max-gene",
        );
    }

    #[test]
    fn test_max_below_min_is_fatal() {
        let params = double_params()
            .with("pop.subpop.0.species.min-gene.2", 0.8)
            .with("pop.subpop.0.species.max-gene.2", 0.2);
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.max-gene.2",
        );
    }

    #[test]
    fn test_nan_bound_is_fatal() {
        let params = double_params().with("pop.subpop.0.species.min-gene.1", "NaN");
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.min-gene.1",
        );
    }

    #[test]
    fn test_bounds_must_fit_element_type() {
        let params = ParameterDatabase::new()
            .with("pop.subpop.0.species.genome-size", 2)
            .with("pop.subpop.0.species.min-gene", -10)
            .with("pop.subpop.0.species.max-gene", 200)
            .with("pop.subpop.0.species.mutation-prob", 0.1);
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Byte),
            "pop.subpop.0.species.max-gene",
        );
        assert!(VectorSpecies::setup(&params, &base(), GenomeKind::Short).is_ok());
    }

    #[test]
    fn test_missing_mutation_prob() {
        let mut params = double_params();
        params.remove("pop.subpop.0.species.mutation-prob");
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.mutation-prob",
        );
    }

    #[test]
    fn test_chunk_size_must_divide_genome() {
        let params = double_params().with("pop.subpop.0.species.chunk-size", 4);
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.chunk-size",
        );
        let params = double_params().with("pop.subpop.0.species.chunk-size", 3);
        assert_eq!(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double)
                .unwrap()
                .chunk_size(),
            3
        );
    }

    #[test]
    fn test_crossover_kind_combinations() {
        let bit = ParameterDatabase::new()
            .with("pop.subpop.0.species.genome-size", 8)
            .with("pop.subpop.0.species.mutation-prob", 0.1)
            .with("pop.subpop.0.species.crossover-type", "line");
        expect_config_key(
            VectorSpecies::setup(&bit, &base(), GenomeKind::Bit),
            "pop.subpop.0.species.crossover-type",
        );

        let int_sbx = ParameterDatabase::new()
            .with("pop.subpop.0.species.genome-size", 8)
            .with("pop.subpop.0.species.min-gene", 0)
            .with("pop.subpop.0.species.max-gene", 9)
            .with("pop.subpop.0.species.mutation-prob", 0.1)
            .with("pop.subpop.0.species.crossover-type", "sbx")
            .with("pop.subpop.0.species.crossover-distribution-index", 20);
        expect_config_key(
            VectorSpecies::setup(&int_sbx, &base(), GenomeKind::Int),
            "pop.subpop.0.species.crossover-type",
        );

        let any = double_params().with("pop.subpop.0.species.crossover-type", "any");
        expect_config_key(
            VectorSpecies::setup(&any, &base(), GenomeKind::Double),
            "pop.subpop.0.species.crossover-prob",
        );
        let any = any.with("pop.subpop.0.species.crossover-prob", 0.7);
        expect_config_key(
            VectorSpecies::setup(&any, &base(), GenomeKind::Double),
            "pop.subpop.0.species.crossover-prob",
        );
        let any = any.with("pop.subpop.0.species.crossover-prob", 0.3);
        assert!(VectorSpecies::setup(&any, &base(), GenomeKind::Double).is_ok());
    }

    #[test]
    fn test_float_mutation_settings() {
        let params = double_params()
            .with("pop.subpop.0.species.mutation-type", "gauss")
            .with("pop.subpop.0.species.mutation-stdev", 0.2)
            .with("pop.subpop.0.species.out-of-bounds-retries", 7)
            .with("pop.subpop.0.species.mutation-type.5", "polynomial")
            .with("pop.subpop.0.species.mutation-distribution-index.5", 21)
            .with("pop.subpop.0.species.alternative-polynomial-version.5", false);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Double).unwrap();
        let p0 = species.float_policy(0).unwrap();
        assert_eq!(p0.mutation, FloatMutation::Gaussian { stdev: 0.2 });
        assert_eq!(p0.out_of_bounds_retries, 7);
        assert!(p0.bounded);
        assert_eq!(
            species.float_policy(5).unwrap().mutation,
            FloatMutation::Polynomial {
                distribution_index: 21.0,
                alternative: false
            }
        );
    }

    #[test]
    fn test_gauss_without_stdev_is_fatal() {
        let params = double_params().with("pop.subpop.0.species.mutation-type", "gauss");
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.mutation-stdev",
        );
    }

    #[test]
    fn test_dynamic_sizes() {
        let params = double_params()
            .with("pop.subpop.0.species.genome-size", "uniform")
            .with("pop.subpop.0.species.min-initial-size", 2)
            .with("pop.subpop.0.species.max-initial-size", 5);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Double).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(5);
        for _ in 0..100 {
            let len = species.draw_genome_length(&mut rng);
            assert!((2..=5).contains(&len));
        }

        let params = double_params()
            .with("pop.subpop.0.species.genome-size", "geometric")
            .with("pop.subpop.0.species.min-initial-size", 3)
            .with("pop.subpop.0.species.geometric-prob", 0.5);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Double).unwrap();
        for _ in 0..100 {
            assert!(species.draw_genome_length(&mut rng) >= 3);
        }

        let params = params.with("pop.subpop.0.species.geometric-prob", 1.0);
        expect_config_key(
            VectorSpecies::setup(&params, &base(), GenomeKind::Double),
            "pop.subpop.0.species.geometric-prob",
        );
    }

    #[test]
    fn test_index_past_configured_genes_clamps_and_warns_once() {
        let params = double_params()
            .with("pop.subpop.0.species.genome-size", "geometric")
            .with("pop.subpop.0.species.min-initial-size", 1)
            .with("pop.subpop.0.species.geometric-prob", 0.9)
            .with("pop.subpop.0.species.max-gene.0", 3.0);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Double).unwrap();
        assert!(!species.warnings().clamped_gene_index.fired());
        assert_eq!(species.max_gene(10), 3.0);
        assert!(species.warnings().clamped_gene_index.fired());
        assert_eq!(species.max_gene(11), 3.0);
    }

    #[test]
    fn test_gene_kind_requires_setup_gene() {
        assert!(VectorSpecies::setup(&double_params(), &base(), GenomeKind::Gene).is_err());
    }

    #[test]
    fn test_float_bounds_rounded_to_single_precision() {
        let params = double_params().with("pop.subpop.0.species.max-gene", 0.1);
        let species = VectorSpecies::setup(&params, &base(), GenomeKind::Float).unwrap();
        assert_eq!(species.max_gene(0), 0.1f32 as f64);
    }
}
