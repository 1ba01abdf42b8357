//! Strict controls: named toggles for deprecation-era behaviors.
//!
//! Each control can be `off`, `warn` (default), or `error`. `--strict-mode`
//! promotes every control to `error` at once.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Behavior of a single strict control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlLevel {
    /// Allow silently.
    Off,
    /// Allow, but log a warning.
    #[default]
    Warn,
    /// Reject with an error.
    Error,
}

/// The catalog of named controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrictControl {
    /// Use of `TERRAGRUNT_*` environment variables instead of `TG_*`.
    DeprecatedEnvVars,
    /// An exclude block whose effect diverges between single-unit and
    /// run-all invocations (`no_run` asymmetry).
    ExcludeNoRunDivergence,
    /// An external dependency silently skipped rather than planned or run.
    ExternalDependencySkip,
    /// Mock outputs substituting on a state-mutating action.
    MockOutputsOnApply,
}

impl StrictControl {
    /// All known controls, for `--strict-mode` and help output.
    pub const ALL: [Self; 4] = [
        Self::DeprecatedEnvVars,
        Self::ExcludeNoRunDivergence,
        Self::ExternalDependencySkip,
        Self::MockOutputsOnApply,
    ];

    /// The control's CLI-facing name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DeprecatedEnvVars => "deprecated-env-vars",
            Self::ExcludeNoRunDivergence => "exclude-no-run-divergence",
            Self::ExternalDependencySkip => "external-dependency-skip",
            Self::MockOutputsOnApply => "mock-outputs-on-apply",
        }
    }
}

impl FromStr for StrictControl {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|control| control.name() == s)
            .ok_or_else(|| {
                let known = Self::ALL
                    .into_iter()
                    .map(StrictControl::name)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("unknown strict control '{s}' (known controls: {known})")
            })
    }
}

impl fmt::Display for StrictControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-run strict-control settings. Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct StrictControls {
    levels: HashMap<StrictControl, ControlLevel>,
}

impl StrictControls {
    /// All controls at their default level (`warn`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All controls promoted to `error`, as `--strict-mode` demands.
    #[must_use]
    pub fn strict_mode() -> Self {
        let levels = StrictControl::ALL
            .into_iter()
            .map(|control| (control, ControlLevel::Error))
            .collect();
        Self { levels }
    }

    /// Set one control to a level.
    pub fn set(&mut self, control: StrictControl, level: ControlLevel) {
        self.levels.insert(control, level);
    }

    /// Current level of a control.
    #[must_use]
    pub fn level(&self, control: StrictControl) -> ControlLevel {
        self.levels.get(&control).copied().unwrap_or_default()
    }

    /// Apply a control to an observed behavior: no-op when off, a tracing
    /// warning when warning, an error when promoted.
    pub fn check(&self, control: StrictControl, message: impl fmt::Display) -> Result<()> {
        match self.level(control) {
            ControlLevel::Off => Ok(()),
            ControlLevel::Warn => {
                tracing::warn!(control = control.name(), "{message}");
                Ok(())
            }
            ControlLevel::Error => Err(Error::StrictControl {
                control: control.name().to_string(),
                message: message.to_string(),
            }),
        }
    }
}
