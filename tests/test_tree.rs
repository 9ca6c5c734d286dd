use std::sync::Arc;

use epochx::{
    error::EpochError,
    operator::{Crossover, Initialiser, Mutation},
    population::{score_population, Challenge, GrowthMethod, InitMethod, PopulationConfig},
    rng::RandomNumberGenerator,
    tree::{
        Bindings, DataType, KozaCrossover, Node, NodeKind, OnePointCrossover, PointMutation,
        Syntax, TreeGenerator, TreeInitialiser, Value, Variable,
    },
};
use proptest::prelude::*;

fn mixed_syntax(x: &Arc<Variable>) -> Arc<Syntax> {
    Arc::new(
        Syntax::new(vec![
            NodeKind::Add,
            NodeKind::Subtract,
            NodeKind::Multiply,
            NodeKind::ProtectedDivide,
            NodeKind::Max,
            NodeKind::Sine,
            NodeKind::Cosine,
            NodeKind::Abs,
            NodeKind::If,
            NodeKind::And,
            NodeKind::Or,
            NodeKind::Not,
            NodeKind::GreaterThan,
            NodeKind::LessThan,
            NodeKind::Literal(Value::Double(1.0)),
            NodeKind::Literal(Value::Integer(2)),
            NodeKind::Literal(Value::Boolean(true)),
            NodeKind::Variable(Arc::clone(x)),
        ])
        .unwrap(),
    )
}

fn random_tree(seed: u64, depth: usize) -> Node {
    let x = Variable::new("x", DataType::Double);
    let generator = TreeGenerator::new(mixed_syntax(&x), depth);
    let mut rng = RandomNumberGenerator::from_seed(seed);
    generator
        .generate(GrowthMethod::Grow, DataType::Double, depth, &mut rng)
        .unwrap()
}

proptest! {
    #[test]
    fn prop_set_nth_node_round_trip(seed in any::<u64>(), pick in any::<usize>()) {
        let tree = random_tree(seed, 4);
        let index = pick % tree.length();
        let mut copy = tree.clone();
        let subtree = copy.nth_node(index).unwrap().clone();
        let removed = copy.set_nth_node(index, subtree).unwrap();
        prop_assert_eq!(&copy, &tree);
        prop_assert_eq!(Some(&removed), tree.nth_node(index));
    }

    #[test]
    fn prop_clone_is_independent(seed in any::<u64>(), pick in any::<usize>()) {
        let tree = random_tree(seed, 4);
        let snapshot = tree.to_string();
        let mut copy = tree.clone();
        let index = pick % copy.length();
        copy.set_nth_node(index, Node::literal(Value::Double(42.0))).unwrap();
        prop_assert_eq!(tree.to_string(), snapshot);
    }

    #[test]
    fn prop_koza_replaces_exactly_the_exchanged_subtrees(seed in any::<u64>()) {
        let parent1 = random_tree(seed, 4);
        let parent2 = random_tree(seed.wrapping_add(1), 3);
        let mut rng = RandomNumberGenerator::from_seed(seed);
        let crossed = KozaCrossover::default().crossover(&parent1, &parent2, &mut rng).unwrap();
        let [removed1, removed2] = &crossed.report.subtrees;
        let [child1, child2] = &crossed.children;

        prop_assert_eq!(child1.length(), parent1.length() - removed1.length() + removed2.length());
        prop_assert_eq!(child2.length(), parent2.length() - removed2.length() + removed1.length());
        prop_assert_eq!(child1.nth_node(crossed.report.points[0]), Some(removed2));
        prop_assert_eq!(child2.nth_node(crossed.report.points[1]), Some(removed1));
    }

    #[test]
    fn prop_one_point_points_are_aligned(seed in any::<u64>()) {
        let parent1 = random_tree(seed, 4);
        let parent2 = random_tree(seed.wrapping_add(7), 4);
        let mut rng = RandomNumberGenerator::from_seed(seed);

        for strict in [false, true] {
            let crossover = if strict { OnePointCrossover::strict() } else { OnePointCrossover::new() };
            let candidates = crossover.common_points(&parent1, &parent2);
            prop_assert_eq!(candidates[0], (0, 0));

            let crossed = crossover.crossover(&parent1, &parent2, &mut rng).unwrap();
            let [p1, p2] = crossed.report.points;
            if (p1, p2) != (0, 0) {
                let a = parent1.nth_node(p1).unwrap();
                let b = parent2.nth_node(p2).unwrap();
                prop_assert_eq!(a.arity(), b.arity());
                if strict {
                    prop_assert!(a.kind().same_class(b.kind()));
                } else {
                    prop_assert_eq!(a.return_type(), b.return_type());
                }
            }
        }
    }

    #[test]
    fn prop_point_mutation_preserves_types(seed in any::<u64>()) {
        let x = Variable::new("x", DataType::Double);
        let syntax = mixed_syntax(&x);
        let generator = TreeGenerator::new(Arc::clone(&syntax), 4);
        let mut rng = RandomNumberGenerator::from_seed(seed);
        let parent = generator.generate(GrowthMethod::Full, DataType::Double, 4, &mut rng).unwrap();

        let mutated = PointMutation::new(syntax, 0.5).unwrap().mutate(&parent, &mut rng).unwrap().unwrap();
        let child = mutated.child;
        prop_assert_eq!(child.return_type(), parent.return_type());
        prop_assert_eq!(child.length(), parent.length());
        for node in child.iter() {
            prop_assert_eq!(node.arity(), node.kind().arity());
        }
    }
}

#[test]
fn test_and_short_circuits_before_unbound_variable() {
    let unbound = Variable::new("never", DataType::Boolean);
    let probe = Node::variable(&unbound);
    assert!(matches!(probe.evaluate(), Err(EpochError::Evaluation(_))));

    let and = Node::new(
        NodeKind::And,
        vec![Node::literal(Value::Boolean(false)), probe],
    )
    .unwrap();
    assert_eq!(and.evaluate().unwrap(), Value::Boolean(false));

    let and = Node::new(
        NodeKind::And,
        vec![
            Node::literal(Value::Boolean(true)),
            Node::literal(Value::Boolean(false)),
        ],
    )
    .unwrap();
    assert_eq!(and.evaluate().unwrap(), Value::Boolean(false));
}

#[test]
fn test_if_return_types() {
    use DataType::*;
    assert_eq!(NodeKind::If.return_type(&[Boolean, Integer, Integer]), Some(Integer));
    assert_eq!(NodeKind::If.return_type(&[Boolean, Integer, Boolean]), None);
}

#[test]
fn test_full_initialiser_builds_perfect_binary_trees() {
    let syntax = Arc::new(
        Syntax::new(vec![NodeKind::And, NodeKind::Literal(Value::Boolean(true))]).unwrap(),
    );
    let initialiser = TreeInitialiser::new(
        syntax,
        PopulationConfig::new(10, true),
        InitMethod::Full { depth: 2 },
        DataType::Boolean,
    )
    .unwrap();
    let mut rng = RandomNumberGenerator::from_seed(3);
    for tree in initialiser.initialise(&mut rng).unwrap() {
        assert_eq!(tree.length(), 7);
        assert_eq!(tree.depth(), 2);
        for index in 0..tree.length() {
            if tree.nth_node(index).unwrap().is_terminal() {
                assert_eq!(tree.nth_node_depth(index), Some(2));
            }
        }
    }
}

struct SquareRegression {
    x: Arc<Variable>,
    samples: Vec<f64>,
}

impl Challenge<Node> for SquareRegression {
    fn score(&self, tree: &Node) -> Option<f64> {
        let mut bindings = Bindings::new();
        let mut error = 0.0;
        for sample in &self.samples {
            bindings.bind(&self.x, Value::Double(*sample)).ok()?;
            let output = tree.evaluate_with(&bindings).ok()?.as_f64().ok()?;
            error += (output - sample * sample).abs();
        }
        Some(-error)
    }
}

#[test]
fn test_regression_scores_exact_solution_highest() {
    let x = Variable::new("x", DataType::Double);
    let challenge = SquareRegression {
        x: Arc::clone(&x),
        samples: vec![-2.0, -1.0, 0.0, 1.5, 3.0],
    };
    let exact = Node::new(NodeKind::Multiply, vec![Node::variable(&x), Node::variable(&x)]).unwrap();
    let close = Node::new(
        NodeKind::Add,
        vec![Node::variable(&x), Node::variable(&x)],
    )
    .unwrap();
    let orphan = Node::variable(&Variable::new("y", DataType::Double));

    let scores = score_population(
        &[exact, close, orphan],
        &challenge,
        &PopulationConfig::new(3, true),
    );
    assert_eq!(scores[0], 0.0);
    assert!(scores[1] < 0.0);
    // The unbound variable cannot be evaluated
    assert_eq!(scores[2], f64::NEG_INFINITY);
}

struct ConstantValue;

impl Challenge<Node> for ConstantValue {
    fn score(&self, tree: &Node) -> Option<f64> {
        tree.evaluate().ok()?.as_f64().ok()
    }

    fn worst_score(&self) -> f64 {
        -1.0e9
    }
}

#[test]
fn test_parallel_scoring_matches_serial() {
    let syntax = Arc::new(
        Syntax::new(vec![
            NodeKind::Add,
            NodeKind::Multiply,
            NodeKind::ProtectedDivide,
            NodeKind::Literal(Value::Integer(1)),
            NodeKind::Literal(Value::Integer(3)),
            NodeKind::Literal(Value::Double(0.0)),
        ])
        .unwrap(),
    );
    let initialiser = TreeInitialiser::new(
        syntax,
        PopulationConfig::new(200, true),
        InitMethod::RampedHalfAndHalf {
            start_depth: 1,
            end_depth: 5,
        },
        DataType::Double,
    )
    .unwrap();
    let mut rng = RandomNumberGenerator::from_seed(4);
    let population = initialiser.initialise(&mut rng).unwrap();

    let serial = PopulationConfig::builder().size(200).parallel_threshold(usize::MAX).build();
    let parallel = PopulationConfig::builder().size(200).parallel_threshold(1).build();
    assert_eq!(
        score_population(&population, &ConstantValue, &serial),
        score_population(&population, &ConstantValue, &parallel)
    );
}

#[test]
fn test_parallel_scoring_with_bound_variables() {
    let x = Variable::new("x", DataType::Double);
    let challenge = SquareRegression {
        x: Arc::clone(&x),
        samples: (0..200).map(|i| i as f64 * 0.05 - 5.0).collect(),
    };
    let exact = Node::new(NodeKind::Multiply, vec![Node::variable(&x), Node::variable(&x)]).unwrap();
    let linear = Node::new(NodeKind::Add, vec![Node::variable(&x), Node::variable(&x)]).unwrap();
    let population: Vec<Node> = (0..4000)
        .map(|i| if i % 2 == 0 { exact.clone() } else { linear.clone() })
        .collect();

    let serial = PopulationConfig::builder().size(4000).parallel_threshold(usize::MAX).build();
    let expected = score_population(&population, &challenge, &serial);
    assert!(expected.iter().step_by(2).all(|score| *score == 0.0));

    let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
    let parallel = pool.install(|| score_population(&population, &challenge, &PopulationConfig::new(4000, true)));
    assert_eq!(parallel, expected);
    // Scoring never touched the shared slot
    assert_eq!(x.value(), None);
}
