use std::collections::HashMap;
use std::path::Path;

use near_api::{AccountId, NearToken};
use serde_json::Value;
use tracing::info;

use crate::abi::INIT_METHOD;
use crate::error::StepError;
use crate::network::NetworkClient;
use crate::session::{AccountHandle, ContractHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractState {
    Deployed,
    Initialized,
}

/// Per-account contract lifecycle: `Deployed -> Initialized`, once.
#[derive(Debug, Default)]
pub struct ContractLedger {
    states: HashMap<AccountId, ContractState>,
}

impl ContractLedger {
    pub fn state(&self, account_id: &AccountId) -> Option<ContractState> {
        self.states.get(account_id).copied()
    }

    /// Redeploying over an initialized contract keeps it initialized, since its state survives.
    pub fn mark_deployed(&mut self, account_id: AccountId) {
        self.states
            .entry(account_id)
            .or_insert(ContractState::Deployed);
    }

    pub fn ensure_initializable(&self, account_id: &AccountId) -> Result<(), StepError> {
        match self.state(account_id) {
            None => Err(StepError::NotDeployed(account_id.clone())),
            Some(ContractState::Initialized) => {
                Err(StepError::AlreadyInitialized(account_id.clone()))
            }
            Some(ContractState::Deployed) => Ok(()),
        }
    }

    fn mark_initialized(&mut self, account_id: &AccountId) {
        self.states
            .insert(account_id.clone(), ContractState::Initialized);
    }
}

/// Uploads the binary at `path` to `account`.
pub async fn deploy<C: NetworkClient>(
    account: &AccountHandle<C>,
    path: &Path,
    ledger: &mut ContractLedger,
) -> Result<(), StepError> {
    let code = tokio::fs::read(path)
        .await
        .map_err(|source| StepError::Binary {
            path: path.to_path_buf(),
            source,
        })?;
    let size = code.len();
    account.deploy_contract(code).await?;
    ledger.mark_deployed(account.id().clone());
    info!(account_id = %account.id(), path = %path.display(), size, "contract deployed");
    Ok(())
}

/// Calls the contract's constructor. Refuses to run on an account without a deployed binary or
/// on one that was already initialized, without touching the network.
pub async fn initialize<C: NetworkClient>(
    contract: &ContractHandle<C>,
    args: Value,
    ledger: &mut ContractLedger,
) -> Result<(), StepError> {
    ledger.ensure_initializable(contract.target())?;
    contract
        .call(INIT_METHOD, args, NearToken::from_yoctonear(0))
        .await?;
    ledger.mark_initialized(contract.target());
    info!(contract = contract.abi().name, account_id = %contract.target(), "contract initialized");
    Ok(())
}
