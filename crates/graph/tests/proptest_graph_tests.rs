//! Property tests: topological order respects every dependency edge.

use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tgrun_config::Evaluator;
use tgrun_core::{Action, RunContext, paths};
use tgrun_graph::{DiscoveryOptions, UnitGraph};

/// Random DAG: unit `i` may depend on any subset of units `j < i`, which
/// makes cycles impossible by construction.
fn arb_dag(max_units: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2..=max_units).prop_flat_map(|count| {
        let deps_per_unit: Vec<_> = (0..count)
            .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
            .collect();
        deps_per_unit
    })
}

fn materialize(root: &Path, dag: &[Vec<usize>]) {
    for (i, deps) in dag.iter().enumerate() {
        let dir = root.join(format!("unit{i}"));
        fs::create_dir_all(&dir).unwrap();
        let mut config = String::new();
        for dep in deps {
            config.push_str(&format!(
                "dependency \"unit{dep}\" {{\n  config_path = \"../unit{dep}\"\n  skip_outputs = true\n}}\n\n"
            ));
        }
        fs::write(dir.join(paths::CONFIG_FILENAME), config).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn topological_order_respects_every_edge(dag in arb_dag(8)) {
        let tmp = TempDir::new().unwrap();
        materialize(tmp.path(), &dag);

        let evaluator = Evaluator::new(RunContext::new(tmp.path(), Action::Plan));
        let graph = UnitGraph::build(&evaluator, &DiscoveryOptions::default()).unwrap();
        prop_assert_eq!(graph.len(), dag.len());

        let order = graph.topological_order();
        let position = |i: usize| {
            order
                .iter()
                .position(|p| p.ends_with(format!("unit{i}")))
                .unwrap()
        };
        for (i, deps) in dag.iter().enumerate() {
            for dep in deps {
                prop_assert!(position(*dep) < position(i), "unit{} must precede unit{}", dep, i);
            }
        }
    }

    #[test]
    fn parallel_levels_never_colocate_an_edge(dag in arb_dag(8)) {
        let tmp = TempDir::new().unwrap();
        materialize(tmp.path(), &dag);

        let evaluator = Evaluator::new(RunContext::new(tmp.path(), Action::Plan));
        let graph = UnitGraph::build(&evaluator, &DiscoveryOptions::default()).unwrap();
        let levels = graph.parallel_levels();

        let level_of = |i: usize| {
            levels
                .iter()
                .position(|level| level.iter().any(|p| p.ends_with(format!("unit{i}"))))
                .unwrap()
        };
        for (i, deps) in dag.iter().enumerate() {
            for dep in deps {
                prop_assert!(level_of(*dep) < level_of(i));
            }
        }
    }
}
