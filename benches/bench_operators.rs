use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use epochx::{
    grammar::{lit, rule, Chromosome, DerivationMapper, Grammar, MapperConfig},
    operator::{Crossover, Initialiser, Mutation},
    population::{InitMethod, PopulationConfig},
    rng::RandomNumberGenerator,
    tree::{
        DataType, KozaCrossover, NodeKind, PointMutation, Syntax, TreeInitialiser, Value,
        Variable,
    },
};

fn syntax() -> Arc<Syntax> {
    let x = Variable::with_value("x", Value::Double(0.5));
    Arc::new(
        Syntax::new(vec![
            NodeKind::Add,
            NodeKind::Subtract,
            NodeKind::Multiply,
            NodeKind::ProtectedDivide,
            NodeKind::Sine,
            NodeKind::Literal(Value::Double(1.0)),
            NodeKind::Variable(x),
        ])
        .unwrap(),
    )
}

fn bench_tree_operators(c: &mut Criterion) {
    let mut rng = RandomNumberGenerator::from_seed(1);
    let syntax = syntax();
    let mut group = c.benchmark_group("tree_operators");

    for depth in [3, 6, 9].iter() {
        let initialiser = TreeInitialiser::new(
            Arc::clone(&syntax),
            PopulationConfig::new(2, true),
            InitMethod::Full { depth: *depth },
            DataType::Double,
        )
        .unwrap();
        let parents = initialiser.initialise(&mut rng).unwrap();
        let crossover = KozaCrossover::default();
        let mutation = PointMutation::new(Arc::clone(&syntax), 0.1).unwrap();

        group.bench_function(&format!("koza_crossover_depth_{}", depth), |b| {
            b.iter(|| {
                let crossed = crossover.crossover(
                    black_box(&parents[0]),
                    black_box(&parents[1]),
                    black_box(&mut rng),
                );
                assert!(crossed.is_some());
            })
        });
        group.bench_function(&format!("point_mutation_depth_{}", depth), |b| {
            b.iter(|| {
                let mutated = mutation.mutate(black_box(&parents[0]), black_box(&mut rng));
                assert!(mutated.is_ok());
            })
        });
        group.bench_function(&format!("evaluate_depth_{}", depth), |b| {
            b.iter(|| black_box(&parents[0]).evaluate())
        });
    }
    group.finish();
}

fn bench_mapping(c: &mut Criterion) {
    let grammar = Arc::new(
        Grammar::builder()
            .rule(
                "expr",
                vec![
                    vec![rule("expr"), rule("op"), rule("expr")],
                    vec![rule("var")],
                ],
            )
            .rule("op", vec![vec![lit("+")], vec![lit("-")], vec![lit("*")]])
            .rule("var", vec![vec![lit("x")], vec![lit("y")]])
            .build()
            .unwrap(),
    );
    let mapper = DerivationMapper::new(grammar, MapperConfig::builder().max_depth(12).build()).unwrap();
    let mut rng = RandomNumberGenerator::from_seed(2);

    let mut group = c.benchmark_group("derivation_mapping");
    for length in [10, 100, 1000].iter() {
        let chromosome = Chromosome::random(*length, 255, &mut rng);
        group.bench_function(&format!("depth_first_{}", length), |b| {
            b.iter(|| {
                let mut codons = chromosome.clone();
                mapper.map(black_box(&mut codons), black_box(&mut rng))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tree_operators, bench_mapping);
criterion_main!(benches);
