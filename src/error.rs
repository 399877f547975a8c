use std::path::PathBuf;
use std::time::Duration;

use near_api::AccountId;

use crate::keys::{CredentialError, DuplicateKey};
use crate::network::NetworkError;
use crate::pipeline::Step;
use crate::readiness::Unreachable;

/// Failure of a single setup step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Unreachable(#[from] Unreachable),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKey),
    #[error("failed to read contract binary {path}: {source}")]
    Binary {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no contract is deployed to {0}")]
    NotDeployed(AccountId),
    #[error("contract on {0} is already initialized")]
    AlreadyInitialized(AccountId),
    #[error("exchange returned pool id {returned} for pool `{label}`, expected {expected}")]
    PoolIdMismatch {
        label: String,
        expected: u64,
        returned: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("setup step `{step}` failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: StepError,
    },
    #[error("setup step `{step}` ran before `{missing}`")]
    OutOfOrder { step: Step, missing: Step },
    #[error("setup step `{0}` ran twice")]
    Repeated(Step),
    #[error("setup did not finish within {0:?}")]
    Timeout(Duration),
    #[error("environment is already populated")]
    AlreadyPopulated,
}

impl SetupError {
    /// The step that failed, if the failure came from one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } | Self::OutOfOrder { step, .. } | Self::Repeated(step) => {
                Some(*step)
            }
            Self::Timeout(_) | Self::AlreadyPopulated => None,
        }
    }
}
