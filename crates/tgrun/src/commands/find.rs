//! `find`: list discovered units with their dependency relations.

use crate::cli::{FindArgs, GlobalArgs};
use crate::commands::{build_context, discovery_options};
use tgrun_config::Evaluator;
use tgrun_core::{Action, paths};
use tgrun_graph::UnitGraph;
use tokio_util::sync::CancellationToken;

/// List units under the working directory.
pub fn execute(
    global: &GlobalArgs,
    args: &FindArgs,
    token: CancellationToken,
) -> miette::Result<i32> {
    let run = build_context(
        global,
        Action::Other("find".to_string()),
        true,
        Vec::new(),
        token,
    )?;
    let root = paths::normalize(&run.working_dir);
    let evaluator = Evaluator::new(run);
    let graph = UnitGraph::build(&evaluator, &discovery_options(global))?;

    if args.json {
        let entries: Vec<serde_json::Value> = graph
            .units()
            .map(|node| {
                serde_json::json!({
                    "path": node.dir.strip_prefix(&root).unwrap_or(&node.dir),
                    "dependencies": graph
                        .dependencies_of(&node.dir)
                        .iter()
                        .map(|dep| dep.strip_prefix(&root).unwrap_or(dep).to_path_buf())
                        .collect::<Vec<_>>(),
                    "external": node.external,
                    "excluded": node.excluded,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
    } else {
        for dir in graph.topological_order() {
            let rel = dir.strip_prefix(&root).unwrap_or(&dir);
            let deps = graph.dependencies_of(&dir);
            if deps.is_empty() {
                println!("{}", rel.display());
            } else {
                let dep_list: Vec<String> = deps
                    .iter()
                    .map(|dep| {
                        dep.strip_prefix(&root)
                            .unwrap_or(dep)
                            .display()
                            .to_string()
                    })
                    .collect();
                println!("{} <- {}", rel.display(), dep_list.join(", "));
            }
        }
    }
    Ok(0)
}
