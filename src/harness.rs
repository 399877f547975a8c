use tokio::time::timeout;
use tracing::info;

use crate::config::EnvironmentConfig;
use crate::error::SetupError;
use crate::network::NetworkClient;
use crate::pipeline::setup;
use crate::readiness::ReadinessProbe;
use crate::registry::{Environment, EnvironmentSlot, RegistryError};
use crate::teardown::{TeardownError, TeardownReport, plan_deletions, teardown};

/// Entry points for a test suite: `before_all` once before any test, `after_all` once after
/// the last. Each phase runs under the configured timeout.
#[derive(Debug)]
pub struct SandboxHarness<C> {
    config: EnvironmentConfig,
    slot: EnvironmentSlot<C>,
}

impl<C: NetworkClient> SandboxHarness<C> {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            slot: EnvironmentSlot::Uninitialized,
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn slot(&self) -> &EnvironmentSlot<C> {
        &self.slot
    }

    pub async fn before_all<P: ReadinessProbe>(
        &mut self,
        client: C,
        probe: &P,
    ) -> Result<(), SetupError> {
        if !matches!(self.slot, EnvironmentSlot::Uninitialized) {
            return Err(SetupError::AlreadyPopulated);
        }
        let env = timeout(
            self.config.setup_timeout,
            setup(&self.config, client, probe),
        )
        .await
            .map_err(|_| SetupError::Timeout(self.config.setup_timeout))??;
        info!(pools = env.pools().len(), "sandbox environment ready");
        self.slot = EnvironmentSlot::Populated(env);
        Ok(())
    }

    pub fn env(&self) -> Result<&Environment<C>, RegistryError> {
        self.slot.get()
    }

    /// Deletes the configured accounts. Every deletion is attempted; failures are aggregated.
    /// A list naming the master account is rejected before anything is deleted, leaving the
    /// environment populated.
    pub async fn after_all(&mut self) -> Result<TeardownReport, TeardownError> {
        let accounts = self.config.accounts.resolve(&self.config.teardown_accounts);
        plan_deletions(&accounts, &self.config.accounts.master)?;

        let env = self.slot.take()?;
        let limit = self.config.teardown_timeout;
        let report = teardown(env, &accounts, limit).await?;
        self.slot = EnvironmentSlot::TornDown(report.clone());
        info!(
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            timed_out = report.timed_out.len(),
            "sandbox environment torn down"
        );
        report.clone().into_result().map(|_| report)
    }
}
