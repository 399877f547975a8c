//! Cross-contract wiring: zero-balance token seeds, exchange registration, stable pool creation
//! and price-feed seeding. Each function is one step of the fixed choreography.

use near_api::{AccountId, NearToken};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::config::{AccountIds, EnvironmentConfig, StablePoolConfig};
use crate::error::StepError;
use crate::network::NetworkClient;
use crate::session::ContractHandle;

const NO_DEPOSIT: NearToken = NearToken::from_yoctonear(0);

/// Gives each account a zero-balance ledger entry so later transfers to it find a storage slot.
pub async fn seed_zero_balances<C: NetworkClient>(
    token: &ContractHandle<C>,
    accounts: &[AccountId],
) -> Result<(), StepError> {
    for account_id in accounts {
        token
            .call(
                "mint",
                json!({ "account_id": account_id, "amount": "0" }),
                NO_DEPOSIT,
            )
            .await?;
        info!(token = %token.target(), %account_id, "zero balance seeded");
    }
    Ok(())
}

/// Registers the handle's acting account as a depositor on the exchange.
pub async fn exchange_storage_deposit<C: NetworkClient>(
    exchange: &ContractHandle<C>,
    amount: NearToken,
) -> Result<(), StepError> {
    exchange
        .call(
            "storage_deposit",
            json!({ "account_id": exchange.acting() }),
            amount,
        )
        .await?;
    info!(depositor = %exchange.acting(), %amount, "exchange storage deposited");
    Ok(())
}

pub async fn register_tokens<C: NetworkClient>(
    exchange: &ContractHandle<C>,
    token_ids: &[AccountId],
    deposit: NearToken,
) -> Result<(), StepError> {
    exchange
        .call(
            "register_tokens",
            json!({ "token_ids": token_ids }),
            deposit,
        )
        .await?;
    info!(account_id = %exchange.acting(), tokens = ?token_ids, "tokens registered");
    Ok(())
}

/// Explicit identity of a created pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRef {
    pub index: u64,
    pub label: String,
}

/// Assigns pool indices in creation order, starting at 0.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: Vec<PoolRef>,
}

impl PoolRegistry {
    pub fn next_index(&self) -> u64 {
        self.pools.len() as u64
    }

    /// Records a created pool. When the exchange reported an id it must equal the next index.
    pub fn record(&mut self, label: &str, returned: Option<u64>) -> Result<PoolRef, StepError> {
        let expected = self.next_index();
        if let Some(returned) = returned.filter(|returned| *returned != expected) {
            return Err(StepError::PoolIdMismatch {
                label: label.to_string(),
                expected,
                returned,
            });
        }
        let pool = PoolRef {
            index: expected,
            label: label.to_string(),
        };
        self.pools.push(pool.clone());
        Ok(pool)
    }

    pub fn pools(&self) -> &[PoolRef] {
        &self.pools
    }

    pub fn into_pools(self) -> Vec<PoolRef> {
        self.pools
    }
}

pub async fn create_stable_pools<C: NetworkClient>(
    exchange: &ContractHandle<C>,
    pools: &[StablePoolConfig],
    accounts: &AccountIds,
    registry: &mut PoolRegistry,
) -> Result<(), StepError> {
    for pool in pools {
        let result = exchange
            .call("add_stable_swap_pool", pool.args(accounts), pool.deposit)
            .await?;
        let pool_ref = registry.record(&pool.label, returned_pool_id(&result))?;
        info!(label = %pool_ref.label, index = pool_ref.index, "stable pool created");
    }
    Ok(())
}

fn returned_pool_id(result: &Value) -> Option<u64> {
    match result {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub async fn add_price_reporter<C: NetworkClient>(
    owner: &ContractHandle<C>,
    config: &EnvironmentConfig,
) -> Result<(), StepError> {
    let reporter = config.account(config.oracle.reporter);
    owner
        .call(
            "add_oracle",
            json!({ "account_id": reporter }),
            config.oracle.add_oracle_deposit,
        )
        .await?;
    info!(%reporter, "price reporter authorized");
    Ok(())
}

pub async fn add_price_asset<C: NetworkClient>(
    owner: &ContractHandle<C>,
    config: &EnvironmentConfig,
) -> Result<(), StepError> {
    owner
        .call(
            "add_asset",
            json!({ "asset_id": config.oracle.asset_id }),
            config.oracle.add_asset_deposit,
        )
        .await?;
    info!(asset_id = %config.oracle.asset_id, "price asset registered");
    Ok(())
}

pub async fn report_price<C: NetworkClient>(
    reporter: &ContractHandle<C>,
    config: &EnvironmentConfig,
) -> Result<(), StepError> {
    reporter
        .call("report_prices", config.price_report_args(), NO_DEPOSIT)
        .await?;
    info!(
        asset_id = %config.oracle.asset_id,
        multiplier = %config.oracle.price.multiplier,
        decimals = config.oracle.price.decimals,
        "price reported"
    );
    Ok(())
}

/// A rational price: `multiplier / 10^decimals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub multiplier: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset_id: String,
    pub price: Option<Price>,
}

/// Oracle `get_price_data` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    /// Nanoseconds, as a decimal string.
    pub timestamp: String,
    pub recency_duration_sec: u32,
    pub prices: Vec<AssetPrice>,
}

impl PriceData {
    pub fn price(&self, asset_id: &str) -> Option<&Price> {
        self.prices
            .iter()
            .find(|p| p.asset_id == asset_id)
            .and_then(|p| p.price.as_ref())
    }

    /// Whether the data is no older than the recency window at `now_ns`.
    pub fn is_fresh(&self, now_ns: u64) -> bool {
        let Ok(timestamp) = self.timestamp.parse::<u64>() else {
            return false;
        };
        let window_ns = u64::from(self.recency_duration_sec) * 1_000_000_000;
        now_ns.saturating_sub(timestamp) <= window_ns
    }
}
