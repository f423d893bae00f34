use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vecgen::{
    breeding::{DeBreeder, DeVariant, GenerationContext},
    params::{Parameter, ParameterDatabase},
    population::{Population, Subpopulation},
    rng::{RandomNumberGenerator, RandomStreams},
    species::{GenomeKind, VectorSpecies},
};

fn population(size: usize) -> Population {
    let params = ParameterDatabase::new()
        .with("s.genome-size", 20)
        .with("s.min-gene", -5.0)
        .with("s.max-gene", 5.0)
        .with("s.mutation-prob", 0.0);
    let species = Arc::new(VectorSpecies::setup(&params, &Parameter::new("s"), GenomeKind::Double).unwrap());
    let mut subpop = Subpopulation::new(species);
    subpop.populate(size, &mut RandomNumberGenerator::from_seed(1)).unwrap();
    Population::new(vec![subpop])
}

fn bench_de(c: &mut Criterion) {
    let variants = [
        DeVariant::default(),
        DeVariant::BestOneBin { f_noise: 0.1, retries: 100 },
        DeVariant::RandOneEitherOr { pf: 0.5, retries: 100 },
    ];

    let mut group = c.benchmark_group("de_breeding");
    for size in [10, 100, 1000].iter() {
        let pop = population(*size);
        for variant in variants {
            let breeder = DeBreeder::builder().f(0.5).cr(0.9).variant(variant).build().unwrap();
            let mut streams = RandomStreams::from_seed(7, 1);
            group.bench_function(&format!("{}_{}", variant.name(), size), |b| {
                b.iter(|| {
                    let mut context = GenerationContext::new();
                    let result = breeder.breed_population(black_box(&pop), &mut context, &mut streams);
                    assert!(result.is_ok());
                })
            });
        }
    }
    group.finish();
}

fn bench_de_parallel(c: &mut Criterion) {
    let pop = population(10000);
    let mut group = c.benchmark_group("de_breeding_parallel");
    for threads in [1, 2, 4, 8].iter() {
        let breeder = DeBreeder::builder().f(0.5).cr(0.9).breed_threads(*threads).build().unwrap();
        let mut streams = RandomStreams::from_seed(7, *threads);
        group.bench_function(&format!("threads_{}", threads), |b| {
            b.iter(|| {
                let mut context = GenerationContext::new();
                let result = breeder.breed_population(black_box(&pop), &mut context, &mut streams);
                assert!(result.is_ok());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_de, bench_de_parallel);
criterion_main!(benches);
