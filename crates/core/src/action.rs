//! Downstream actions and their scheduling properties.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A verb forwarded to the downstream IaC binary.
///
/// The well-known verbs carry scheduling semantics (ordering direction,
/// state mutation); anything else is passed through opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// `init` - backend/provider initialization.
    Init,
    /// `validate` - static validation, no state access.
    Validate,
    /// `plan` - speculative diff against state.
    Plan,
    /// `apply` - mutate infrastructure and state.
    Apply,
    /// `destroy` - tear down infrastructure, reverse dependency order.
    Destroy,
    /// `output` - read outputs from state.
    Output,
    /// `refresh` - reconcile state with reality.
    Refresh,
    /// Any other verb, passed through verbatim.
    Other(String),
}

impl Action {
    /// The verb as handed to the downstream binary.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Init => "init",
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
            Self::Output => "output",
            Self::Refresh => "refresh",
            Self::Other(verb) => verb,
        }
    }

    /// Destructive actions run the queue in reverse dependency order.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Destroy)
    }

    /// Whether a successful run of this action changes persisted state,
    /// requiring cached outputs of the unit to be invalidated.
    #[must_use]
    pub fn mutates_state(&self) -> bool {
        matches!(self, Self::Apply | Self::Destroy)
    }

    /// Whether `plan -detailed-exitcode` semantics apply: exit code 2 is a
    /// successful "changes pending" result rather than a failure.
    #[must_use]
    pub fn honors_detailed_exitcode(&self) -> bool {
        matches!(self, Self::Plan)
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "init" => Self::Init,
            "validate" => Self::Validate,
            "plan" => Self::Plan,
            "apply" => Self::Apply,
            "destroy" => Self::Destroy,
            "output" => Self::Output,
            "refresh" => Self::Refresh,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_well_known_verbs() {
        for verb in ["init", "validate", "plan", "apply", "destroy", "output"] {
            let action: Action = verb.parse().unwrap();
            assert_eq!(action.name(), verb);
        }
    }

    #[test]
    fn unknown_verbs_pass_through() {
        let action: Action = "state".parse().unwrap();
        assert_eq!(action, Action::Other("state".to_string()));
        assert_eq!(action.name(), "state");
    }

    #[test]
    fn only_destroy_reverses() {
        assert!(Action::Destroy.is_destructive());
        assert!(!Action::Apply.is_destructive());
    }

    #[test]
    fn apply_and_destroy_mutate_state() {
        assert!(Action::Apply.mutates_state());
        assert!(Action::Destroy.mutates_state());
        assert!(!Action::Plan.mutates_state());
        assert!(!Action::Output.mutates_state());
    }
}
