// Test Helpers
use near_api::{AccountId, NearToken};
use near_api_types::PublicKey;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use url::Url;
use usn_sandbox::keys::SigningCredential;
use usn_sandbox::network::{FunctionCall, NetworkClient, NetworkError};
use usn_sandbox::{EnvironmentConfig, ReadinessProbe};

#[allow(dead_code)]
pub const MASTER_BALANCE: NearToken = NearToken::from_near(10_000);

static TRACING: Once = Once::new();

#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Every operation the mock received, in order.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateAccount {
        signer: AccountId,
        new_account: AccountId,
        amount: NearToken,
    },
    Deploy {
        account: AccountId,
    },
    Call {
        signer: AccountId,
        receiver: AccountId,
        method: String,
        args: Value,
        deposit: NearToken,
    },
    Delete {
        account: AccountId,
        beneficiary: AccountId,
    },
}

#[derive(Debug)]
struct MockAccount {
    balance: u128,
    public_key: PublicKey,
    code: Option<Vec<u8>>,
    initialized: bool,
    deleted: bool,
}

#[derive(Debug, Default)]
struct ContractState {
    token_balances: BTreeMap<String, u128>,
    storage_depositors: BTreeSet<String>,
    registered_tokens: BTreeMap<String, Vec<Value>>,
    pools: Vec<Value>,
    reporters: BTreeSet<String>,
    assets: BTreeSet<String>,
    prices: BTreeMap<String, Value>,
    price_timestamp_ns: u64,
    recency_duration_sec: u32,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: BTreeMap<AccountId, MockAccount>,
    contracts: BTreeMap<AccountId, ContractState>,
    ops: Vec<Op>,
    failing_methods: BTreeSet<String>,
    failing_creations: BTreeSet<AccountId>,
    failing_deletions: BTreeSet<AccountId>,
    deletion_delays: BTreeMap<AccountId, Duration>,
    return_pool_ids: bool,
}

/// In-memory NEAR network: accounts, balances, access keys, deployed code, constructor state
/// and just enough of the token, exchange and oracle contracts for the environment wiring.
/// Clones share state, so a test keeps a handle after moving one into `setup`.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<MockState>>,
}

fn execution(message: impl Into<String>) -> NetworkError {
    NetworkError::Execution(message.into())
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn new(master: &AccountId, master_key: &PublicKey) -> Self {
        let mut state = MockState {
            return_pool_ids: true,
            ..MockState::default()
        };
        state.accounts.insert(
            master.clone(),
            MockAccount {
                balance: MASTER_BALANCE.as_yoctonear(),
                public_key: master_key.clone(),
                code: None,
                initialized: false,
                deleted: false,
            },
        );
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn fail_method(&self, method: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_methods
            .insert(method.to_string());
    }

    /// Makes the creation of `account` fail after the request is recorded.
    pub fn fail_create(&self, account: &AccountId) {
        self.state
            .lock()
            .unwrap()
            .failing_creations
            .insert(account.clone());
    }

    /// Holds the deletion of `account` for `delay` before it is applied.
    pub fn delay_deletion(&self, account: &AccountId, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .deletion_delays
            .insert(account.clone(), delay);
    }

    pub fn fail_deletion(&self, account: &AccountId) {
        self.state
            .lock()
            .unwrap()
            .failing_deletions
            .insert(account.clone());
    }

    /// Makes `add_stable_swap_pool` return nothing, like exchanges that don't report pool ids.
    pub fn hide_pool_ids(&self) {
        self.state.lock().unwrap().return_pool_ids = false;
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn created_accounts(&self) -> Vec<AccountId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::CreateAccount { new_account, .. } => Some(new_account),
                _ => None,
            })
            .collect()
    }

    pub fn calls(&self) -> Vec<(AccountId, AccountId, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Call {
                    signer,
                    receiver,
                    method,
                    ..
                } => Some((signer, receiver, method)),
                _ => None,
            })
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Call { method: m, .. } if m == method))
            .collect()
    }

    pub fn exists(&self, account: &AccountId) -> bool {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(account)
            .is_some_and(|a| !a.deleted)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(account)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    pub fn has_code(&self, account: &AccountId) -> bool {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(account)
            .is_some_and(|a| a.code.is_some())
    }

    pub fn token_balance(&self, token: &AccountId, holder: &AccountId) -> Option<u128> {
        self.state
            .lock()
            .unwrap()
            .contracts
            .get(token)
            .and_then(|c| c.token_balances.get(holder.as_str()).copied())
    }

    pub fn pool_count(&self, exchange: &AccountId) -> usize {
        self.state
            .lock()
            .unwrap()
            .contracts
            .get(exchange)
            .map(|c| c.pools.len())
            .unwrap_or_default()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

impl MockState {
    fn live_account(&mut self, id: &AccountId) -> Result<&mut MockAccount, NetworkError> {
        match self.accounts.get_mut(id) {
            Some(account) if !account.deleted => Ok(account),
            _ => Err(execution(format!("AccountDoesNotExist: {id}"))),
        }
    }

    fn authorize(
        &mut self,
        id: &AccountId,
        credential: &SigningCredential,
    ) -> Result<(), NetworkError> {
        let account = self.live_account(id)?;
        if account.public_key != credential.public_key {
            return Err(execution(format!("InvalidAccessKey for {id}")));
        }
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), NetworkError> {
        let sender = self.live_account(from)?;
        if sender.balance < amount {
            return Err(execution(format!("NotEnoughBalance for {from}")));
        }
        sender.balance -= amount;
        self.live_account(to)?.balance += amount;
        Ok(())
    }

    fn dispatch(
        &mut self,
        signer: &AccountId,
        receiver: &AccountId,
        method: &str,
        args: &Value,
    ) -> Result<Value, NetworkError> {
        let return_pool_ids = self.return_pool_ids;
        let contract = self.contracts.entry(receiver.clone()).or_default();
        let arg = |name: &str| args[name].as_str().unwrap_or_default().to_string();
        match method {
            "mint" => {
                let amount = arg("amount").parse::<u128>().unwrap_or_default();
                *contract
                    .token_balances
                    .entry(arg("account_id"))
                    .or_default() += amount;
                Ok(Value::Null)
            }
            "storage_deposit" => {
                contract.storage_depositors.insert(arg("account_id"));
                Ok(json!({ "total": "0", "available": "0" }))
            }
            "register_tokens" => {
                if !contract.storage_depositors.contains(signer.as_str()) {
                    return Err(execution("E10: account not registered"));
                }
                let tokens = args["token_ids"].as_array().cloned().unwrap_or_default();
                contract
                    .registered_tokens
                    .insert(signer.to_string(), tokens);
                Ok(Value::Null)
            }
            "add_stable_swap_pool" => {
                let registered = contract
                    .registered_tokens
                    .values()
                    .flatten()
                    .collect::<Vec<_>>();
                let all_registered = args["tokens"]
                    .as_array()
                    .is_some_and(|tokens| tokens.iter().all(|t| registered.contains(&t)));
                if !all_registered {
                    return Err(execution("E12: token not whitelisted"));
                }
                contract.pools.push(args.clone());
                let id = contract.pools.len() as u64 - 1;
                Ok(if return_pool_ids { json!(id) } else { Value::Null })
            }
            "add_oracle" => {
                contract.reporters.insert(arg("account_id"));
                Ok(Value::Null)
            }
            "add_asset" => {
                contract.assets.insert(arg("asset_id"));
                Ok(Value::Null)
            }
            "report_prices" => {
                if !contract.reporters.contains(signer.as_str()) {
                    return Err(execution("Not an oracle"));
                }
                for report in args["prices"].as_array().cloned().unwrap_or_default() {
                    let asset_id = report["asset_id"].as_str().unwrap_or_default().to_string();
                    if !contract.assets.contains(&asset_id) {
                        return Err(execution(format!("Unknown asset {asset_id}")));
                    }
                    contract.prices.insert(asset_id, report["price"].clone());
                }
                contract.price_timestamp_ns = now_ns();
                Ok(Value::Null)
            }
            _ => Ok(Value::Null),
        }
    }
}

impl NetworkClient for MockNetwork {
    async fn create_account(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        new_account: &AccountId,
        public_key: &PublicKey,
        amount: NearToken,
    ) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::CreateAccount {
            signer: signer.clone(),
            new_account: new_account.clone(),
            amount,
        });
        state.authorize(signer, credential)?;
        if state.failing_creations.contains(new_account) {
            return Err(execution(format!("CreateAccountNotAllowed: {new_account}")));
        }
        if !new_account.as_str().ends_with(&format!(".{signer}")) {
            return Err(execution(format!("{signer} cannot create {new_account}")));
        }
        if state.accounts.contains_key(new_account) {
            return Err(execution(format!("AccountAlreadyExists: {new_account}")));
        }
        let funder = state.live_account(signer)?;
        if funder.balance < amount.as_yoctonear() {
            return Err(execution(format!("NotEnoughBalance for {signer}")));
        }
        funder.balance -= amount.as_yoctonear();
        state.accounts.insert(
            new_account.clone(),
            MockAccount {
                balance: amount.as_yoctonear(),
                public_key: public_key.clone(),
                code: None,
                initialized: false,
                deleted: false,
            },
        );
        Ok(())
    }

    async fn deploy_contract(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        code: Vec<u8>,
    ) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Deploy {
            account: account.clone(),
        });
        state.authorize(account, credential)?;
        if code.is_empty() {
            return Err(execution("CompilationError: empty binary"));
        }
        state.live_account(account)?.code = Some(code);
        Ok(())
    }

    async fn call(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        call: FunctionCall<'_>,
    ) -> Result<Value, NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Call {
            signer: signer.clone(),
            receiver: call.receiver.clone(),
            method: call.method.to_string(),
            args: call.args.clone(),
            deposit: call.deposit,
        });
        state.authorize(signer, credential)?;
        if state.failing_methods.contains(call.method) {
            return Err(execution(format!(
                "Smart contract panicked: {} rejected",
                call.method
            )));
        }

        let target = state.live_account(call.receiver)?;
        if target.code.is_none() {
            return Err(execution(format!("CodeDoesNotExist: {}", call.receiver)));
        }
        if call.method == "new" {
            if target.initialized {
                return Err(execution(
                    "Smart contract panicked: The contract has already been initialized",
                ));
            }
            target.initialized = true;
            if let Some(recency) = call.args["recency_duration_sec"].as_u64() {
                state
                    .contracts
                    .entry(call.receiver.clone())
                    .or_default()
                    .recency_duration_sec = recency as u32;
            }
        } else if !target.initialized {
            return Err(execution("Smart contract panicked: The contract is not initialized"));
        }

        state.transfer(signer, call.receiver, call.deposit.as_yoctonear())?;
        if call.method == "new" {
            return Ok(Value::Null);
        }
        state.dispatch(signer, call.receiver, call.method, &call.args)
    }

    async fn view(
        &self,
        contract: &AccountId,
        method: &str,
        args: Value,
    ) -> Result<Value, NetworkError> {
        let mut state = self.state.lock().unwrap();
        let contract = state.contracts.entry(contract.clone()).or_default();
        match method {
            "get_price_data" => {
                let asset_ids = args["asset_ids"].as_array().cloned().unwrap_or_default();
                let prices: Vec<Value> = asset_ids
                    .iter()
                    .map(|asset_id| {
                        let price = asset_id
                            .as_str()
                            .and_then(|id| contract.prices.get(id))
                            .cloned()
                            .unwrap_or(Value::Null);
                        json!({ "asset_id": asset_id, "price": price })
                    })
                    .collect();
                Ok(json!({
                    "timestamp": contract.price_timestamp_ns.to_string(),
                    "recency_duration_sec": contract.recency_duration_sec,
                    "prices": prices,
                }))
            }
            "get_number_of_pools" => Ok(json!(contract.pools.len())),
            "ft_balance_of" => {
                let holder = args["account_id"].as_str().unwrap_or_default();
                let balance = contract
                    .token_balances
                    .get(holder)
                    .copied()
                    .unwrap_or_default();
                Ok(json!(balance.to_string()))
            }
            _ => Ok(Value::Null),
        }
    }

    async fn delete_account(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        beneficiary: &AccountId,
    ) -> Result<(), NetworkError> {
        let delay = self
            .state
            .lock()
            .unwrap()
            .deletion_delays
            .get(account)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Delete {
            account: account.clone(),
            beneficiary: beneficiary.clone(),
        });
        state.authorize(account, credential)?;
        if state.failing_deletions.contains(account) {
            return Err(execution(format!("DeleteAccountWithLargeState: {account}")));
        }
        let remaining = state.live_account(account)?.balance;
        state.transfer(account, beneficiary, remaining)?;
        state.live_account(account)?.deleted = true;
        Ok(())
    }

    async fn balance(&self, account: &AccountId) -> Result<NearToken, NetworkError> {
        let mut state = self.state.lock().unwrap();
        let balance = state.live_account(account)?.balance;
        Ok(NearToken::from_yoctonear(balance))
    }
}

/// Readiness probe with a fixed answer.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl ReadinessProbe for StaticProbe {
    async fn is_reachable(&self, _url: &Url) -> bool {
        self.0
    }
}

/// A config whose key file and contract binaries live in a temporary directory, plus a mock
/// network that knows the master key.
#[allow(dead_code)]
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: EnvironmentConfig,
    pub credential: SigningCredential,
    pub network: MockNetwork,
}

#[allow(dead_code)]
pub fn fixture() -> Fixture {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EnvironmentConfig::default();
    let network_id = config.network_id.clone();
    let credential = SigningCredential::generate(network_id).unwrap();

    config.key_path = dir.path().join("validator_key.json");
    std::fs::write(
        &config.key_path,
        json!({
            "account_id": config.accounts.master,
            "public_key": credential.public_key.to_string(),
            "secret_key": credential.secret_key.to_string(),
        })
        .to_string(),
    )
    .unwrap();

    for (name, path) in [
        ("usn", &mut config.binaries.usn),
        ("usdt", &mut config.binaries.usdt),
        ("ref", &mut config.binaries.exchange),
        ("oracle", &mut config.binaries.oracle),
    ] {
        *path = dir.path().join(format!("{name}.wasm"));
        let wasm = format!("\0asm-{name}");
        std::fs::write(path.as_path(), wasm).unwrap();
    }

    let network = MockNetwork::new(&config.accounts.master, &credential.public_key);
    Fixture {
        dir,
        config,
        credential,
        network,
    }
}

#[allow(dead_code)]
pub fn id(s: &str) -> AccountId {
    s.parse().unwrap()
}
