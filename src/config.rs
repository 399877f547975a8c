use std::path::{Path, PathBuf};
use std::time::Duration;

use near_api::{AccountId, NearToken};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::registry::Role;

/// Environment variable naming a JSON file that overrides [`EnvironmentConfig::default`].
pub const CONFIG_PATH_ENV: &str = "USN_SANDBOX_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How provisioned accounts obtain their signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Every provisioned account reuses the master keypair. Only sound for disposable sandboxes.
    #[default]
    SharedMaster,
    /// Each provisioned account gets a freshly generated ed25519 key.
    PerAccount,
}

/// Static description of the environment to provision. Immutable once loaded.
///
/// Account ids live only in `accounts`; every other field names accounts by [`Role`], so
/// renaming an account in a config file carries through the whole setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub network_id: String,
    pub node_url: Url,
    pub key_path: PathBuf,
    pub key_policy: KeyPolicy,
    pub accounts: AccountIds,
    pub binaries: BinaryPaths,
    /// Amount each provisioned account is funded with by the master account.
    pub funding_amount: NearToken,
    pub usn: UsnConfig,
    pub usdt: UsdtConfig,
    pub exchange: ExchangeConfig,
    pub oracle: OracleConfig,
    /// Accounts deleted by teardown. Residual balances go to the master account.
    pub teardown_accounts: Vec<Role>,
    #[serde(with = "duration_secs")]
    pub setup_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub teardown_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountIds {
    pub master: AccountId,
    pub usn: AccountId,
    pub usdt: AccountId,
    #[serde(rename = "ref")]
    pub exchange: AccountId,
    pub oracle: AccountId,
    pub alice: AccountId,
    pub bob: AccountId,
}

impl AccountIds {
    /// Accounts created under the master account, in creation order.
    pub fn provisioned(&self) -> Vec<AccountId> {
        vec![
            self.usn.clone(),
            self.usdt.clone(),
            self.exchange.clone(),
            self.oracle.clone(),
            self.alice.clone(),
            self.bob.clone(),
        ]
    }

    pub fn resolve(&self, roles: &[Role]) -> Vec<AccountId> {
        roles
            .iter()
            .map(|role| role.account_id(self).clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPaths {
    pub usn: PathBuf,
    pub usdt: PathBuf,
    #[serde(rename = "ref")]
    pub exchange: PathBuf,
    pub oracle: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsnConfig {
    /// Sent as `owner_id` alongside `init_args`.
    pub owner: Role,
    pub init_args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsdtConfig {
    pub init_args: Value,
    /// Accounts given a zero-balance ledger entry before any transfer can reach them.
    pub zero_balance_accounts: Vec<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Sent as `owner_id` alongside `init_args`.
    pub owner: Role,
    pub init_args: Value,
    /// Account that performs the storage deposit and token registration on the exchange.
    pub depositor: Role,
    pub storage_deposit: NearToken,
    pub registered_tokens: Vec<Role>,
    pub register_tokens_deposit: NearToken,
    /// Account that creates the stable pools; the exchange only lets its owner do so.
    pub pool_creator: Role,
    /// Stable pools created in order; the n-th entry receives pool index n.
    pub stable_pools: Vec<StablePoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StablePoolConfig {
    pub label: String,
    pub tokens: Vec<Role>,
    pub decimals: Vec<u8>,
    pub fee_bps: u32,
    pub amp_factor: u64,
    pub deposit: NearToken,
}

impl StablePoolConfig {
    fn usn_usdt(label: &str) -> Self {
        Self {
            label: label.to_string(),
            tokens: vec![Role::Usn, Role::Usdt],
            decimals: vec![18, 6],
            fee_bps: 25,
            amp_factor: 240,
            deposit: NearToken::from_millinear(50),
        }
    }

    pub fn args(&self, accounts: &AccountIds) -> Value {
        json!({
            "tokens": accounts.resolve(&self.tokens),
            "decimals": self.decimals,
            "fee": self.fee_bps,
            "amp_factor": self.amp_factor,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub recency_duration_sec: u32,
    pub near_claim_amount: NearToken,
    pub reporter: Role,
    pub add_oracle_deposit: NearToken,
    pub add_asset_deposit: NearToken,
    pub asset_id: String,
    pub price: PriceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceConfig {
    /// Decimal string, as the oracle stores it.
    pub multiplier: String,
    pub decimals: u8,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            network_id: "sandbox".to_string(),
            node_url: Url::parse("http://0.0.0.0:3030").expect("static url is valid"),
            key_path: PathBuf::from("/tmp/near-usn-test-sandbox/validator_key.json"),
            key_policy: KeyPolicy::default(),
            accounts: AccountIds::default(),
            binaries: BinaryPaths::default(),
            funding_amount: NearToken::from_near(300),
            usn: UsnConfig {
                owner: Role::Usn,
                init_args: json!({}),
            },
            usdt: UsdtConfig {
                init_args: json!({}),
                zero_balance_accounts: vec![Role::Ref, Role::Usn],
            },
            exchange: ExchangeConfig {
                owner: Role::Ref,
                init_args: json!({ "exchange_fee": 4, "referral_fee": 1 }),
                depositor: Role::Usn,
                storage_deposit: NearToken::from_millinear(30),
                registered_tokens: vec![Role::Usdt, Role::Usn],
                register_tokens_deposit: NearToken::from_yoctonear(1),
                pool_creator: Role::Ref,
                stable_pools: vec![
                    StablePoolConfig::usn_usdt("usn-usdt"),
                    // Structurally identical second pool, kept for multi-pool routing tests.
                    StablePoolConfig::usn_usdt("usn-usdt-routing"),
                ],
            },
            oracle: OracleConfig {
                recency_duration_sec: 360,
                near_claim_amount: NearToken::from_yoctonear(0),
                reporter: Role::Oracle,
                add_oracle_deposit: NearToken::from_yoctonear(1),
                add_asset_deposit: NearToken::from_yoctonear(1),
                asset_id: "wrap.test.near".to_string(),
                price: PriceConfig {
                    multiplier: "111439".to_string(),
                    decimals: 28,
                },
            },
            teardown_accounts: vec![Role::Bob, Role::Alice, Role::Usdt, Role::Usn],
            setup_timeout: Duration::from_secs(80),
            teardown_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for AccountIds {
    fn default() -> Self {
        let id = |s: &str| -> AccountId { s.parse().expect("static account id is valid") };
        Self {
            master: id("test.near"),
            usn: id("usn.test.near"),
            usdt: id("usdt.test.near"),
            exchange: id("ref.test.near"),
            oracle: id("priceoracle.test.near"),
            alice: id("alice.test.near"),
            bob: id("bob.test.near"),
        }
    }
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self {
            usn: PathBuf::from("target/wasm32-unknown-unknown/sandbox/usn.wasm"),
            usdt: PathBuf::from("tests/test_token.wasm"),
            exchange: PathBuf::from("tests/ref_exchange.wasm"),
            oracle: PathBuf::from("tests/price_oracle.wasm"),
        }
    }
}

fn with_owner(args: &Value, owner: &AccountId) -> Value {
    let mut args = args.as_object().cloned().unwrap_or_default();
    args.insert("owner_id".to_string(), json!(owner));
    Value::Object(args)
}

impl EnvironmentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the file named by [`CONFIG_PATH_ENV`] if it is set, otherwise the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn account(&self, role: Role) -> &AccountId {
        role.account_id(&self.accounts)
    }

    pub fn usn_init_args(&self) -> Value {
        with_owner(&self.usn.init_args, self.account(self.usn.owner))
    }

    pub fn exchange_init_args(&self) -> Value {
        with_owner(&self.exchange.init_args, self.account(self.exchange.owner))
    }

    pub fn oracle_init_args(&self) -> Value {
        json!({
            "recency_duration_sec": self.oracle.recency_duration_sec,
            "owner_id": self.accounts.oracle,
            "near_claim_amount": self.oracle.near_claim_amount.as_yoctonear().to_string(),
        })
    }

    pub fn price_report_args(&self) -> Value {
        json!({
            "prices": [{
                "asset_id": self.oracle.asset_id,
                "price": {
                    "multiplier": self.oracle.price.multiplier,
                    "decimals": self.oracle.price.decimals,
                },
            }],
        })
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
