//! Dependency graph construction over discovered units.

use crate::discovery::{self, DiscoveryOptions, QueueFilter};
use crate::error::{Error, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tgrun_config::{Evaluator, PartialUnit};
use tgrun_core::paths;
use tgrun_core::strict::StrictControl;
use tgrun_core::{ExternalMode, RunContext};

/// A unit in the execution graph.
#[derive(Debug)]
pub struct UnitNode {
    /// Unit directory.
    pub dir: PathBuf,
    /// Pass-1 evaluation: dependencies and the exclude decision.
    pub partial: PartialUnit,
    /// Outside the discovered queue, pulled in as a dependency.
    pub external: bool,
    /// Excluded from execution (queue filter or `exclude` block).
    pub excluded: bool,
}

impl UnitNode {
    /// Whether the scheduler should actually invoke the downstream binary
    /// for this node under the given external-dependency mode.
    #[must_use]
    pub fn is_runnable(&self, mode: ExternalMode) -> bool {
        if self.excluded {
            return false;
        }
        !(self.external && mode != ExternalMode::Include)
    }
}

/// The dependency graph of one run. Edges point producer → consumer, so a
/// topological order lists producers first.
#[derive(Debug)]
pub struct UnitGraph {
    graph: DiGraph<UnitNode, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl UnitGraph {
    /// Discover units under the run's working directory, resolve their
    /// dependency relations, and return the validated graph.
    ///
    /// Fails fast on configuration errors, missing dependencies, and
    /// cycles; the cycle diagnostic enumerates the full cycle.
    pub fn build(evaluator: &Evaluator, options: &DiscoveryOptions) -> Result<Self> {
        let run = evaluator.run();
        let root = paths::normalize(&run.working_dir);
        let discovered = discovery::discover_units(&root)?;
        let discovered_set: HashSet<PathBuf> = discovered.iter().cloned().collect();
        let filter = QueueFilter::compile(&root, options)?;

        let queue: Vec<PathBuf> = discovered
            .iter()
            .filter(|dir| filter.included(dir) && !filter.excluded(dir))
            .cloned()
            .collect();
        tracing::debug!(
            discovered = discovered.len(),
            queued = queue.len(),
            "Built discovery queue"
        );

        let mut graph = DiGraph::new();
        let mut index: HashMap<PathBuf, NodeIndex> = HashMap::new();
        let mut pending: VecDeque<(PathBuf, bool)> =
            queue.iter().map(|dir| (dir.clone(), false)).collect();
        let mut enqueued: HashSet<PathBuf> = queue.iter().cloned().collect();
        let mut edges: Vec<(PathBuf, PathBuf)> = Vec::new();

        while let Some((dir, external)) = pending.pop_front() {
            let partial = evaluator.evaluate_partial(&dir)?;
            let dep_paths = partial.all_dependency_paths();

            for dep in &dep_paths {
                let dep = paths::normalize(dep);
                if enqueued.contains(&dep) {
                    edges.push((dep, dir.clone()));
                    continue;
                }

                let is_unit = dep.join(paths::CONFIG_FILENAME).is_file();
                if !is_unit {
                    return Err(Error::missing_dependency(&dir, &dep));
                }

                let in_discovered = discovered_set.contains(&dep);
                if in_discovered && filter.excluded(&dep) {
                    // Explicitly excluded by filter; keep it out but record
                    // nothing. The dependent still evaluates via outputs.
                    tracing::debug!(unit = %dep.display(), "Dependency rejected by exclude filter");
                    continue;
                }
                if in_discovered && !filter.included(&dep) && options.strict_include {
                    run.strict.check(
                        StrictControl::ExternalDependencySkip,
                        format!(
                            "{} requires {}, which strict include leaves out of the queue",
                            dir.display(),
                            dep.display()
                        ),
                    )?;
                    continue;
                }

                if in_discovered {
                    // Non-strict include: dependencies of included units are
                    // pulled into the queue.
                    pending.push_back((dep.clone(), false));
                    enqueued.insert(dep.clone());
                    edges.push((dep, dir.clone()));
                    continue;
                }

                // Outside the discovered tree entirely.
                match run.external_mode {
                    ExternalMode::Ignore => {
                        run.strict.check(
                            StrictControl::ExternalDependencySkip,
                            format!(
                                "{} depends on external unit {}, which is ignored",
                                dir.display(),
                                dep.display()
                            ),
                        )?;
                    }
                    ExternalMode::PlanOnly | ExternalMode::Include => {
                        pending.push_back((dep.clone(), true));
                        enqueued.insert(dep.clone());
                        edges.push((dep, dir.clone()));
                    }
                }
            }

            let node = UnitNode {
                dir: dir.clone(),
                partial,
                external,
                excluded: false,
            };
            let node_index = graph.add_node(node);
            index.insert(dir, node_index);
        }

        for (producer, consumer) in edges {
            let (Some(&from), Some(&to)) = (index.get(&producer), index.get(&consumer)) else {
                continue;
            };
            graph.update_edge(from, to, ());
        }

        let mut built = Self { graph, index };
        built.check_cycles()?;
        built.apply_excludes(run)?;
        Ok(built)
    }

    /// Mark nodes excluded per their `exclude` blocks under run-all
    /// semantics, propagating to dependencies where requested.
    fn apply_excludes(&mut self, run: &RunContext) -> Result<()> {
        let action = run.action.name().to_string();
        let mut to_exclude: Vec<NodeIndex> = Vec::new();
        let mut exclude_deps_of: Vec<NodeIndex> = Vec::new();

        for node_index in self.graph.node_indices() {
            let node = &self.graph[node_index];
            if let Some(exclude) = &node.partial.exclude {
                if exclude.excludes_in_run_all(&action) {
                    to_exclude.push(node_index);
                    if exclude.exclude_dependencies {
                        exclude_deps_of.push(node_index);
                    }
                    if exclude.no_run {
                        // Visible asymmetry with single-unit mode, where
                        // no_run would have produced an early exit instead.
                        run.strict.check(
                            StrictControl::ExcludeNoRunDivergence,
                            format!(
                                "{}: no_run is ignored under run-all; the unit is excluded outright",
                                node.dir.display()
                            ),
                        )?;
                    }
                }
            }
        }

        for node_index in to_exclude {
            self.graph[node_index].excluded = true;
        }

        // Transitive in-queue dependencies of excluding units.
        for start in exclude_deps_of {
            let mut stack = vec![start];
            let mut seen = HashSet::new();
            while let Some(current) = stack.pop() {
                for producer in self
                    .graph
                    .neighbors_directed(current, Direction::Incoming)
                    .collect::<Vec<_>>()
                {
                    if seen.insert(producer) && !self.graph[producer].external {
                        self.graph[producer].excluded = true;
                        stack.push(producer);
                    }
                }
            }
        }
        Ok(())
    }

    /// Colored depth-first search; a back-edge yields the full cycle.
    fn check_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut colors = vec![Color::White; self.graph.node_count()];
        let mut stack: Vec<NodeIndex> = Vec::new();

        fn visit(
            graph: &DiGraph<UnitNode, ()>,
            node: NodeIndex,
            colors: &mut [Color],
            stack: &mut Vec<NodeIndex>,
        ) -> Result<()> {
            colors[node.index()] = Color::Gray;
            stack.push(node);

            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                match colors[next.index()] {
                    Color::White => visit(graph, next, colors, stack)?,
                    Color::Gray => {
                        let start = stack.iter().position(|on| *on == next).unwrap_or(0);
                        let mut cycle: Vec<PathBuf> = stack[start..]
                            .iter()
                            .map(|idx| graph[*idx].dir.clone())
                            .collect();
                        cycle.push(graph[next].dir.clone());
                        return Err(Error::CyclicDependency { cycle });
                    }
                    Color::Black => {}
                }
            }

            stack.pop();
            colors[node.index()] = Color::Black;
            Ok(())
        }

        for node in self.graph.node_indices() {
            if colors[node.index()] == Color::White {
                visit(&self.graph, node, &mut colors, &mut stack)?;
            }
        }
        Ok(())
    }

    /// Number of units in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up a unit by directory.
    #[must_use]
    pub fn node(&self, dir: &Path) -> Option<&UnitNode> {
        self.index.get(dir).map(|&idx| &self.graph[idx])
    }

    /// Iterate all units.
    pub fn units(&self) -> impl Iterator<Item = &UnitNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Directories of the units this unit depends on.
    #[must_use]
    pub fn dependencies_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.neighbors(dir, Direction::Incoming)
    }

    /// Directories of the units depending on this unit.
    #[must_use]
    pub fn dependents_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.neighbors(dir, Direction::Outgoing)
    }

    fn neighbors(&self, dir: &Path, direction: Direction) -> Vec<PathBuf> {
        self.index.get(dir).map_or_else(Vec::new, |&idx| {
            self.graph
                .neighbors_directed(idx, direction)
                .map(|neighbor| self.graph[neighbor].dir.clone())
                .collect()
        })
    }

    /// Producers-first order. The graph was cycle-checked at build time, so
    /// this cannot fail afterwards.
    #[must_use]
    pub fn topological_order(&self) -> Vec<PathBuf> {
        petgraph::algo::toposort(&self.graph, None).map_or_else(
            |_| Vec::new(),
            |sorted| sorted.into_iter().map(|idx| self.graph[idx].dir.clone()).collect(),
        )
    }

    /// Group units into dependency levels: every unit in level N only
    /// depends on units in levels < N. Units within a level are independent.
    #[must_use]
    pub fn parallel_levels(&self) -> Vec<Vec<PathBuf>> {
        let mut levels: Vec<Vec<PathBuf>> = Vec::new();
        let mut level_of: HashMap<PathBuf, usize> = HashMap::new();

        for dir in self.topological_order() {
            let level = self
                .dependencies_of(&dir)
                .iter()
                .filter_map(|dep| level_of.get(dep))
                .map(|dep_level| dep_level + 1)
                .max()
                .unwrap_or(0);
            if level >= levels.len() {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(dir.clone());
            level_of.insert(dir, level);
        }
        levels
    }
}
