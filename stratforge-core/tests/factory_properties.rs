//! Property tests for the strategy factory.

use proptest::prelude::*;
use stratforge_core::domain::{param_range, StrategyType};
use stratforge_core::fingerprint::SpecFingerprint;
use stratforge_core::StrategyFactory;

fn symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn arb_types() -> impl Strategy<Value = Vec<StrategyType>> {
    proptest::sample::subsequence(StrategyType::ALL.to_vec(), 1..=StrategyType::ALL.len())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every generated spec validates and keeps its parameters in range.
    #[test]
    fn generated_specs_are_valid(seed in arb_seed(), types in arb_types()) {
        let mut factory = StrategyFactory::new(seed);
        let spec = factory.generate(&symbols(), &types).unwrap();
        prop_assert!(spec.validate().is_ok());
        prop_assert!(types.contains(&spec.strategy_type));
        prop_assert!(spec.indicator_set.contains(&spec.strategy_type.primary_indicator()));
        for (name, value) in &spec.parameters {
            let range = param_range(name).unwrap();
            prop_assert!(range.contains(*value), "{name}={value}");
        }
    }

    /// A mutation always differs from its parent in at least one parameter.
    #[test]
    fn mutation_is_never_a_copy(seed in arb_seed()) {
        let mut factory = StrategyFactory::new(seed);
        let parent = factory.generate(&symbols(), &StrategyType::ALL).unwrap();
        let child = factory.mutate(&parent).unwrap();
        prop_assert_ne!(&child.parameters, &parent.parameters);
        prop_assert_ne!(&child.id, &parent.id);
        prop_assert_eq!(child.lineage.clone(), vec![parent.id.clone()]);
        prop_assert_eq!(child.generation, parent.generation + 1);
        prop_assert_eq!(child.strategy_type, parent.strategy_type);
        prop_assert!(child.validate().is_ok());
    }

    /// Crossover names both parents and inherits shared values from one of them.
    #[test]
    fn crossover_records_both_parents(seed in arb_seed()) {
        let mut factory = StrategyFactory::new(seed);
        let a = factory.generate(&symbols(), &StrategyType::ALL).unwrap();
        let b = factory.generate(&symbols(), &StrategyType::ALL).unwrap();
        let child = factory.crossover(&a, &b).unwrap();

        prop_assert_eq!(child.lineage.clone(), vec![a.id.clone(), b.id.clone()]);
        prop_assert_eq!(child.generation, 1);
        prop_assert!(child.strategy_type == a.strategy_type || child.strategy_type == b.strategy_type);
        for (name, value) in &child.parameters {
            if let (Some(x), Some(y)) = (a.param(name), b.param(name)) {
                prop_assert!(*value == x || *value == y, "{name} not inherited");
            }
        }
    }
}

// ─── Scenario D ───

#[test]
fn hundred_mutations_of_one_parent_are_distinct_from_it() {
    // GIVEN a generated parent
    let mut factory = StrategyFactory::new(2024);
    let parent = factory.generate(&symbols(), &StrategyType::ALL).unwrap();
    let parent_print = SpecFingerprint::of(&parent);

    // WHEN mutated 100 times
    let children: Vec<_> = (0..100).map(|_| factory.mutate(&parent).unwrap()).collect();

    // THEN no child is parameter-identical to the parent
    let ids: std::collections::HashSet<_> = children.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids.len(), children.len());
    for child in &children {
        assert_ne!(SpecFingerprint::of(child), parent_print);
        assert_eq!(child.lineage, vec![parent.id.clone()]);
    }
}

#[test]
fn same_seed_same_call_sequence_gives_same_specs() {
    let run = |seed| {
        let mut factory = StrategyFactory::new(seed);
        let batch = factory.generate_batch(10, &symbols(), &StrategyType::ALL).unwrap();
        let child = factory.mutate(&batch[0]).unwrap();
        let hybrid = factory.crossover(&batch[1], &batch[2]).unwrap();
        serde_json::to_string(&(batch, child, hybrid)).unwrap()
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}

#[test]
fn empty_inputs_are_configuration_errors() {
    let mut factory = StrategyFactory::new(1);
    assert!(factory.generate(&[], &StrategyType::ALL).is_err());
    assert!(factory.generate(&symbols(), &[]).is_err());
}
