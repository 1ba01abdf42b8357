//! Experiment flags gating in-development subsystems.
//!
//! Enabled via `TG_EXPERIMENT=<name>[,<name>...]` or wholesale via
//! `TG_EXPERIMENT_MODE=true`. Unknown names warn and are ignored so old
//! environments keep working across releases.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Environment variable holding the comma-separated experiment list.
pub const EXPERIMENT_ENV: &str = "TG_EXPERIMENT";
/// Environment variable enabling every experiment at once.
pub const EXPERIMENT_MODE_ENV: &str = "TG_EXPERIMENT_MODE";

/// Known experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Experiment {
    /// Accept `azurerm` remote-state bootstrap.
    AzureBackend,
    /// Level-batched scheduler instead of the streaming worker pool.
    RunnerPool,
}

impl Experiment {
    /// All known experiments.
    pub const ALL: [Self; 2] = [Self::AzureBackend, Self::RunnerPool];

    /// The experiment's flag name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AzureBackend => "azure-backend",
            Self::RunnerPool => "runner-pool",
        }
    }
}

impl FromStr for Experiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|experiment| experiment.name() == s)
            .ok_or_else(|| format!("unknown experiment '{s}'"))
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of experiments enabled for this process.
#[derive(Debug, Clone, Default)]
pub struct Experiments {
    enabled: HashSet<Experiment>,
}

impl Experiments {
    /// No experiments enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Every known experiment enabled.
    #[must_use]
    pub fn all() -> Self {
        Self {
            enabled: Experiment::ALL.into_iter().collect(),
        }
    }

    /// Parse a comma-separated experiment list. Unknown names warn.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        let mut enabled = HashSet::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.parse::<Experiment>() {
                Ok(experiment) => {
                    enabled.insert(experiment);
                }
                Err(_) => {
                    tracing::warn!(experiment = name, "Ignoring unknown experiment flag");
                }
            }
        }
        Self { enabled }
    }

    /// Read the experiment set from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mode = std::env::var(EXPERIMENT_MODE_ENV)
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if mode {
            return Self::all();
        }
        std::env::var(EXPERIMENT_ENV)
            .map(|list| Self::parse(&list))
            .unwrap_or_default()
    }

    /// Whether an experiment is enabled.
    #[must_use]
    pub fn is_enabled(&self, experiment: Experiment) -> bool {
        self.enabled.contains(&experiment)
    }

    /// Enable one experiment.
    pub fn enable(&mut self, experiment: Experiment) {
        self.enabled.insert(experiment);
    }
}
