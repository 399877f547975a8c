use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use near_api::AccountId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::abi::{self, ContractAbi};
use crate::config::AccountIds;
use crate::network::{NetworkClient, NetworkError};
use crate::session::{AccountHandle, ContractHandle, Session};
use crate::teardown::TeardownReport;
use crate::wiring::{PoolRef, PriceData};

/// Named accounts of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Usn,
    Usdt,
    Ref,
    Oracle,
    Alice,
    Bob,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Master,
        Role::Usn,
        Role::Usdt,
        Role::Ref,
        Role::Oracle,
        Role::Alice,
        Role::Bob,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Usn => "usn",
            Role::Usdt => "usdt",
            Role::Ref => "ref",
            Role::Oracle => "oracle",
            Role::Alice => "alice",
            Role::Bob => "bob",
        }
    }

    /// Position in [`Role::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn account_id(self, accounts: &AccountIds) -> &AccountId {
        match self {
            Role::Master => &accounts.master,
            Role::Usn => &accounts.usn,
            Role::Usdt => &accounts.usdt,
            Role::Ref => &accounts.exchange,
            Role::Oracle => &accounts.oracle,
            Role::Alice => &accounts.alice,
            Role::Bob => &accounts.bob,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("environment has not been set up")]
    NotPopulated,
    #[error("environment has been torn down")]
    TornDown,
    #[error("no handle named `{0}`")]
    UnknownName(String),
}

/// Live handles of a fully provisioned environment. Only built once every setup step has
/// succeeded, so it is never observable half-populated.
pub struct Environment<C> {
    session: Arc<Session<C>>,
    /// One handle per role, in [`Role::ALL`] order.
    accounts: [AccountHandle<C>; 7],
    contracts: BTreeMap<(Role, Role), ContractHandle<C>>,
    pools: Vec<PoolRef>,
    oracle_asset: String,
}

impl<C> fmt::Debug for Environment<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("accounts", &self.accounts)
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl<C: NetworkClient> Environment<C> {
    pub(crate) fn builder(
        session: Arc<Session<C>>,
        ids: &AccountIds,
        oracle_asset: String,
    ) -> EnvironmentBuilder<C> {
        let accounts = Role::ALL.map(|role| session.account(role.account_id(ids).clone()));
        EnvironmentBuilder {
            env: Environment {
                session,
                accounts,
                contracts: BTreeMap::new(),
                pools: Vec::new(),
                oracle_asset,
            },
        }
    }

    pub fn session(&self) -> &Arc<Session<C>> {
        &self.session
    }

    pub fn account(&self, role: Role) -> &AccountHandle<C> {
        &self.accounts[role.index()]
    }

    /// Handle calling `target`'s contract while signing as `acting`.
    pub fn contract_as(&self, acting: Role, target: Role) -> Option<&ContractHandle<C>> {
        self.contracts.get(&(acting, target))
    }

    /// The contract deployed on `role`, called by its own account.
    pub fn contract(&self, role: Role) -> Option<&ContractHandle<C>> {
        self.contract_as(role, role)
    }

    pub fn account_by_name(&self, name: &str) -> Result<&AccountHandle<C>, RegistryError> {
        Ok(self.account(name.parse()?))
    }

    pub fn contract_by_name(&self, name: &str) -> Result<&ContractHandle<C>, RegistryError> {
        self.contract(name.parse()?)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Pools in creation order; `pools()[n].index == n`.
    pub fn pools(&self) -> &[PoolRef] {
        &self.pools
    }

    pub fn pool(&self, label: &str) -> Option<&PoolRef> {
        self.pools.iter().find(|pool| pool.label == label)
    }

    /// Reads the oracle's current price data for the seeded asset.
    pub async fn price_data(&self) -> Result<PriceData, NetworkError> {
        let oracle = self.session.contract(
            self.account(Role::Master).id().clone(),
            self.account(Role::Oracle).id().clone(),
            abi::PRICE_ORACLE,
        );
        let value = oracle
            .view(
                "get_price_data",
                json!({ "asset_ids": [self.oracle_asset] }),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| NetworkError::Decode {
            method: "get_price_data".to_string(),
            reason: e.to_string(),
        })
    }

    pub(crate) fn into_parts(self) -> (Arc<Session<C>>, [AccountHandle<C>; 7]) {
        (self.session, self.accounts)
    }
}

pub(crate) struct EnvironmentBuilder<C> {
    env: Environment<C>,
}

impl<C: NetworkClient> EnvironmentBuilder<C> {
    pub fn contract(mut self, acting: Role, target: Role, handle: ContractHandle<C>) -> Self {
        self.env.contracts.insert((acting, target), handle);
        self
    }

    /// Adds a handle calling `target`'s contract while signing as `acting`.
    pub fn delegated(mut self, acting: Role, target: Role, abi: ContractAbi) -> Self {
        let handle = self.env.session.contract(
            self.env.account(acting).id().clone(),
            self.env.account(target).id().clone(),
            abi,
        );
        self.env.contracts.insert((acting, target), handle);
        self
    }

    pub fn pools(mut self, pools: Vec<PoolRef>) -> Self {
        self.env.pools = pools;
        self
    }

    pub fn build(self) -> Environment<C> {
        self.env
    }
}

/// Lifecycle of the environment as seen by a test harness.
pub enum EnvironmentSlot<C> {
    Uninitialized,
    Populated(Environment<C>),
    TornDown(TeardownReport),
}

impl<C> Default for EnvironmentSlot<C> {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl<C> fmt::Debug for EnvironmentSlot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("Uninitialized"),
            Self::Populated(env) => f.debug_tuple("Populated").field(env).finish(),
            Self::TornDown(report) => f.debug_tuple("TornDown").field(report).finish(),
        }
    }
}

impl<C> EnvironmentSlot<C> {
    pub fn get(&self) -> Result<&Environment<C>, RegistryError> {
        match self {
            Self::Uninitialized => Err(RegistryError::NotPopulated),
            Self::Populated(env) => Ok(env),
            Self::TornDown(_) => Err(RegistryError::TornDown),
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, Self::Populated(_))
    }

    /// Takes the environment out for teardown, leaving the slot uninitialized.
    pub fn take(&mut self) -> Result<Environment<C>, RegistryError> {
        match std::mem::take(self) {
            Self::Populated(env) => Ok(env),
            Self::Uninitialized => Err(RegistryError::NotPopulated),
            torn_down @ Self::TornDown(_) => {
                *self = torn_down;
                Err(RegistryError::TornDown)
            }
        }
    }
}
