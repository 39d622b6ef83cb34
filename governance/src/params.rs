//! Tunable governance policy.

use serde::{Deserialize, Serialize};

/// Who may finalize a proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    /// Any participant may close any open proposal.
    #[default]
    Anyone,
    /// Only the participant who submitted the proposal may close it.
    ProposerOnly,
}

impl FinalizePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anyone => "anyone",
            Self::ProposerOnly => "proposer_only",
        }
    }
}

/// Policy knobs applied by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    #[serde(default)]
    pub finalize_policy: FinalizePolicy,

    /// Maximum statement length in bytes.
    #[serde(default = "default_max_statement_len")]
    pub max_statement_len: usize,
}

fn default_max_statement_len() -> usize {
    4096
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            finalize_policy: FinalizePolicy::default(),
            max_statement_len: default_max_statement_len(),
        }
    }
}
