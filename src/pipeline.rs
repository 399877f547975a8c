//! The provisioning pipeline: an ordered list of named steps, each declaring which steps must
//! have completed before it, executed once in order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::abi;
use crate::config::EnvironmentConfig;
use crate::deploy::{self, ContractLedger};
use crate::error::{SetupError, StepError};
use crate::keys::load_credential;
use crate::network::NetworkClient;
use crate::provision::provision_accounts;
use crate::readiness::{ReadinessProbe, ensure_reachable};
use crate::registry::{Environment, Role};
use crate::session::Session;
use crate::wiring::{self, PoolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CheckReadiness,
    LoadCredential,
    ConnectSession,
    ProvisionAccounts,
    DeployUsn,
    InitUsn,
    DeployUsdt,
    InitUsdt,
    SeedUsdtBalances,
    DeployExchange,
    InitExchange,
    ExchangeStorageDeposit,
    RegisterExchangeTokens,
    CreateStablePools,
    DeployOracle,
    InitOracle,
    AddPriceReporter,
    AddPriceAsset,
    ReportPrice,
    PopulateRegistry,
}

impl Step {
    /// Canonical execution order.
    pub const PLAN: [Step; 20] = [
        Step::CheckReadiness,
        Step::LoadCredential,
        Step::ConnectSession,
        Step::ProvisionAccounts,
        Step::DeployUsn,
        Step::InitUsn,
        Step::DeployUsdt,
        Step::InitUsdt,
        Step::SeedUsdtBalances,
        Step::DeployExchange,
        Step::InitExchange,
        Step::ExchangeStorageDeposit,
        Step::RegisterExchangeTokens,
        Step::CreateStablePools,
        Step::DeployOracle,
        Step::InitOracle,
        Step::AddPriceReporter,
        Step::AddPriceAsset,
        Step::ReportPrice,
        Step::PopulateRegistry,
    ];

    /// Steps that must have succeeded before this one runs.
    pub fn requires(self) -> &'static [Step] {
        use Step::*;
        match self {
            CheckReadiness => &[],
            LoadCredential => &[CheckReadiness],
            ConnectSession => &[LoadCredential],
            ProvisionAccounts => &[ConnectSession],
            DeployUsn | DeployUsdt | DeployExchange | DeployOracle => &[ProvisionAccounts],
            InitUsn => &[DeployUsn],
            InitUsdt => &[DeployUsdt],
            SeedUsdtBalances => &[InitUsdt],
            InitExchange => &[DeployExchange, SeedUsdtBalances],
            ExchangeStorageDeposit => &[InitExchange, InitUsn],
            RegisterExchangeTokens => &[ExchangeStorageDeposit, InitUsdt],
            CreateStablePools => &[RegisterExchangeTokens],
            InitOracle => &[DeployOracle],
            AddPriceReporter => &[InitOracle],
            AddPriceAsset => &[AddPriceReporter],
            ReportPrice => &[AddPriceAsset],
            PopulateRegistry => &[CreateStablePools, ReportPrice],
        }
    }

    /// State established once the step succeeds.
    pub fn describe(self) -> &'static str {
        use Step::*;
        match self {
            CheckReadiness => "sandbox endpoint accepts connections",
            LoadCredential => "master keypair loaded",
            ConnectSession => "session connected with the master key registered",
            ProvisionAccounts => "all accounts created, funded and key-registered",
            DeployUsn => "usn binary deployed",
            InitUsn => "usn initialized",
            DeployUsdt => "usdt binary deployed",
            InitUsdt => "usdt initialized",
            SeedUsdtBalances => "zero usdt balances registered",
            DeployExchange => "ref exchange binary deployed",
            InitExchange => "ref exchange initialized",
            ExchangeStorageDeposit => "depositor has exchange storage",
            RegisterExchangeTokens => "tokens registered for the depositor",
            CreateStablePools => "stable pools created with sequential indices",
            DeployOracle => "price oracle binary deployed",
            InitOracle => "price oracle initialized",
            AddPriceReporter => "price reporter authorized",
            AddPriceAsset => "price asset registered",
            ReportPrice => "first price reported",
            PopulateRegistry => "environment handles published",
        }
    }

    pub fn name(self) -> &'static str {
        use Step::*;
        match self {
            CheckReadiness => "check-readiness",
            LoadCredential => "load-credential",
            ConnectSession => "connect-session",
            ProvisionAccounts => "provision-accounts",
            DeployUsn => "deploy-usn",
            InitUsn => "init-usn",
            DeployUsdt => "deploy-usdt",
            InitUsdt => "init-usdt",
            SeedUsdtBalances => "seed-usdt-balances",
            DeployExchange => "deploy-ref",
            InitExchange => "init-ref",
            ExchangeStorageDeposit => "ref-storage-deposit",
            RegisterExchangeTokens => "ref-register-tokens",
            CreateStablePools => "create-stable-pools",
            DeployOracle => "deploy-oracle",
            InitOracle => "init-oracle",
            AddPriceReporter => "add-price-reporter",
            AddPriceAsset => "add-price-asset",
            ReportPrice => "report-price",
            PopulateRegistry => "populate-registry",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks that every step of `plan` runs after its requirements and appears once.
pub fn validate_plan(plan: &[Step]) -> Result<(), SetupError> {
    let mut seen = Vec::with_capacity(plan.len());
    for &step in plan {
        if seen.contains(&step) {
            return Err(SetupError::Repeated(step));
        }
        if let Some(&missing) = step.requires().iter().find(|req| !seen.contains(*req)) {
            return Err(SetupError::OutOfOrder { step, missing });
        }
        seen.push(step);
    }
    Ok(())
}

/// Runs steps one at a time, enforcing their declared requirements.
#[derive(Debug, Default)]
pub struct StepRunner {
    completed: Vec<Step>,
}

impl StepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> &[Step] {
        &self.completed
    }

    pub async fn run<T, E, F>(&mut self, step: Step, fut: F) -> Result<T, SetupError>
    where
        E: Into<StepError>,
        F: Future<Output = Result<T, E>>,
    {
        if self.completed.contains(&step) {
            return Err(SetupError::Repeated(step));
        }
        if let Some(&missing) = step
            .requires()
            .iter()
            .find(|req| !self.completed.contains(*req))
        {
            return Err(SetupError::OutOfOrder { step, missing });
        }

        info!(step = %step, "setup step started");
        match fut.await {
            Ok(value) => {
                info!(step = %step, established = step.describe(), "setup step finished");
                self.completed.push(step);
                Ok(value)
            }
            Err(err) => {
                let source: StepError = err.into();
                error!(step = %step, error = %source, "setup step failed");
                Err(SetupError::Step { step, source })
            }
        }
    }
}

/// Provisions the whole environment. On success every handle is live; on failure nothing is
/// returned and the error names the step that failed.
pub async fn setup<C, P>(
    config: &EnvironmentConfig,
    client: C,
    probe: &P,
) -> Result<Environment<C>, SetupError>
where
    C: NetworkClient,
    P: ReadinessProbe,
{
    let accounts = &config.accounts;
    let mut runner = StepRunner::new();

    runner
        .run(
            Step::CheckReadiness,
            ensure_reachable(probe, &config.node_url),
        )
        .await?;
    let credential = runner
        .run(Step::LoadCredential, async {
            load_credential(&config.key_path, &config.network_id)
        })
        .await?;
    let mut session = runner
        .run(Step::ConnectSession, async {
            Session::connect(
                client,
                config.network_id.clone(),
                accounts.master.clone(),
                credential.clone(),
            )
        })
        .await?;
    runner
        .run(
            Step::ProvisionAccounts,
            provision_accounts(
                &mut session,
                &accounts.provisioned(),
                config.funding_amount,
                config.key_policy,
                &credential,
            ),
        )
        .await?;

    // Key registry is complete; freeze the session.
    let session = Arc::new(session);
    let mut ledger = ContractLedger::default();

    let usn = session.contract(accounts.usn.clone(), accounts.usn.clone(), abi::USN);
    runner
        .run(
            Step::DeployUsn,
            deploy::deploy(
                &session.account(accounts.usn.clone()),
                &config.binaries.usn,
                &mut ledger,
            ),
        )
        .await?;
    runner
        .run(
            Step::InitUsn,
            deploy::initialize(&usn, config.usn_init_args(), &mut ledger),
        )
        .await?;

    let usdt = session.contract(accounts.usdt.clone(), accounts.usdt.clone(), abi::USDT);
    runner
        .run(
            Step::DeployUsdt,
            deploy::deploy(
                &session.account(accounts.usdt.clone()),
                &config.binaries.usdt,
                &mut ledger,
            ),
        )
        .await?;
    runner
        .run(
            Step::InitUsdt,
            deploy::initialize(&usdt, config.usdt.init_args.clone(), &mut ledger),
        )
        .await?;
    let zero_balance_accounts = accounts.resolve(&config.usdt.zero_balance_accounts);
    runner
        .run(
            Step::SeedUsdtBalances,
            wiring::seed_zero_balances(&usdt, &zero_balance_accounts),
        )
        .await?;

    let exchange = session.contract(
        accounts.exchange.clone(),
        accounts.exchange.clone(),
        abi::REF_EXCHANGE,
    );
    runner
        .run(
            Step::DeployExchange,
            deploy::deploy(
                &session.account(accounts.exchange.clone()),
                &config.binaries.exchange,
                &mut ledger,
            ),
        )
        .await?;
    runner
        .run(
            Step::InitExchange,
            deploy::initialize(&exchange, config.exchange_init_args(), &mut ledger),
        )
        .await?;

    // The depositor calls the exchange with its own identity.
    let depositor_on_exchange = session.contract(
        config.account(config.exchange.depositor).clone(),
        accounts.exchange.clone(),
        abi::REF_EXCHANGE,
    );
    runner
        .run(
            Step::ExchangeStorageDeposit,
            wiring::exchange_storage_deposit(
                &depositor_on_exchange,
                config.exchange.storage_deposit,
            ),
        )
        .await?;
    let registered_tokens = accounts.resolve(&config.exchange.registered_tokens);
    runner
        .run(
            Step::RegisterExchangeTokens,
            wiring::register_tokens(
                &depositor_on_exchange,
                &registered_tokens,
                config.exchange.register_tokens_deposit,
            ),
        )
        .await?;

    let pool_creator = session.contract(
        config.account(config.exchange.pool_creator).clone(),
        accounts.exchange.clone(),
        abi::REF_EXCHANGE,
    );
    let mut pools = PoolRegistry::default();
    runner
        .run(
            Step::CreateStablePools,
            wiring::create_stable_pools(
                &pool_creator,
                &config.exchange.stable_pools,
                accounts,
                &mut pools,
            ),
        )
        .await?;

    let oracle = session.contract(
        accounts.oracle.clone(),
        accounts.oracle.clone(),
        abi::PRICE_ORACLE,
    );
    runner
        .run(
            Step::DeployOracle,
            deploy::deploy(
                &session.account(accounts.oracle.clone()),
                &config.binaries.oracle,
                &mut ledger,
            ),
        )
        .await?;
    runner
        .run(
            Step::InitOracle,
            deploy::initialize(&oracle, config.oracle_init_args(), &mut ledger),
        )
        .await?;
    runner
        .run(
            Step::AddPriceReporter,
            wiring::add_price_reporter(&oracle, config),
        )
        .await?;
    runner
        .run(
            Step::AddPriceAsset,
            wiring::add_price_asset(&oracle, config),
        )
        .await?;
    let reporter = session.contract(
        config.account(config.oracle.reporter).clone(),
        accounts.oracle.clone(),
        abi::PRICE_ORACLE,
    );
    runner
        .run(Step::ReportPrice, wiring::report_price(&reporter, config))
        .await?;

    let session_for_env = Arc::clone(&session);
    runner
        .run(Step::PopulateRegistry, async move {
            let asset = config.oracle.asset_id.clone();
            let env = Environment::builder(session_for_env, accounts, asset)
                .contract(Role::Usn, Role::Usn, usn)
                .contract(Role::Usdt, Role::Usdt, usdt)
                .contract(Role::Ref, Role::Ref, exchange)
                .contract(Role::Oracle, Role::Oracle, oracle)
                .delegated(Role::Usn, Role::Ref, abi::REF_EXCHANGE)
                .delegated(Role::Alice, Role::Usn, abi::USN)
                .delegated(Role::Bob, Role::Usn, abi::USN)
                .delegated(Role::Alice, Role::Usdt, abi::USDT)
                .delegated(Role::Bob, Role::Usdt, abi::USDT)
                .pools(pools.into_pools())
                .build();
            Ok::<_, StepError>(env)
        })
        .await
}
