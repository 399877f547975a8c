//! # USN sandbox environment
//!
//! Provisions the multi-contract USN test environment on a NEAR sandbox node: creates and
//! funds the accounts, deploys and initializes the USN, USDT, Ref exchange and price oracle
//! contracts, wires them together (token registration, stable pools, price feed) and hands
//! the live handles to the test suite. Teardown deletes the disposable accounts and returns
//! their balances to the master account.
//!
//! ```no_run
//! use usn_sandbox::{EnvironmentConfig, NearRpcClient, SandboxHarness, TcpProbe};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EnvironmentConfig::load()?;
//! let client = NearRpcClient::connect(&config.network_id, &config.node_url);
//! let mut harness = SandboxHarness::new(config);
//! harness.before_all(client, &TcpProbe).await?;
//! let env = harness.env()?;
//! println!("pools: {:?}", env.pools());
//! harness.after_all().await?;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod config;
pub mod deploy;
pub mod error;
pub mod harness;
pub mod keys;
pub mod near_rpc;
pub mod network;
pub mod pipeline;
pub mod provision;
pub mod readiness;
pub mod registry;
pub mod session;
pub mod teardown;
pub mod wiring;

pub use config::{EnvironmentConfig, KeyPolicy};
pub use error::{SetupError, StepError};
pub use harness::SandboxHarness;
pub use near_rpc::NearRpcClient;
pub use network::{NetworkClient, NetworkError};
pub use pipeline::{Step, setup};
pub use readiness::{ReadinessProbe, TcpProbe};
pub use registry::{Environment, EnvironmentSlot, RegistryError, Role};
pub use teardown::{TeardownError, TeardownReport, plan_deletions, teardown};
pub use wiring::{PoolRef, PriceData};
