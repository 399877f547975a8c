use std::time::Duration;

use futures_util::future::join_all;
use near_api::AccountId;
use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};

use crate::network::{NetworkClient, NetworkError};
use crate::registry::Environment;

/// Outcome of every attempted deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub beneficiary: Option<AccountId>,
    pub deleted: Vec<AccountId>,
    pub failures: Vec<(AccountId, NetworkError)>,
    /// Deletions still in flight when the deadline passed.
    pub timed_out: Vec<AccountId>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.timed_out.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<AccountId>, TeardownError> {
        if !self.failures.is_empty() {
            Err(TeardownError::Deletions(self.failures))
        } else if !self.timed_out.is_empty() {
            Err(TeardownError::Timeout(self.timed_out))
        } else {
            Ok(self.deleted)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("{} account deletion(s) failed: {}", .0.len(), summarize(.0))]
    Deletions(Vec<(AccountId, NetworkError)>),
    #[error("teardown timed out before deleting {0:?}")]
    Timeout(Vec<AccountId>),
    #[error("refusing to delete the master account {0}")]
    MasterAccount(AccountId),
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
}

fn summarize(failures: &[(AccountId, NetworkError)]) -> String {
    failures
        .iter()
        .map(|(account_id, err)| format!("{account_id}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Removes repeated ids, keeping first occurrences in order. The master account receives the
/// residual balances and is never a deletion target.
pub fn plan_deletions(
    accounts: &[AccountId],
    master: &AccountId,
) -> Result<Vec<AccountId>, TeardownError> {
    let mut planned: Vec<AccountId> = Vec::with_capacity(accounts.len());
    for account_id in accounts {
        if account_id == master {
            return Err(TeardownError::MasterAccount(master.clone()));
        }
        if !planned.contains(account_id) {
            planned.push(account_id.clone());
        }
    }
    Ok(planned)
}

/// Deletes each listed account, sending its balance to the master account. Every deletion is
/// attempted regardless of the others; those unfinished after `limit` are reported as timed
/// out. The environment is consumed so no handle outlives it.
pub async fn teardown<C: NetworkClient>(
    env: Environment<C>,
    accounts: &[AccountId],
    limit: Duration,
) -> Result<TeardownReport, TeardownError> {
    let master = env.session().master().clone();
    let accounts = plan_deletions(accounts, &master)?;
    let (session, handles) = env.into_parts();
    let mut handles: Vec<_> = handles.into_iter().map(Some).collect();
    let deadline = Instant::now() + limit;

    let deletions: Vec<_> = accounts
        .iter()
        .map(|account_id| {
            let handle = handles
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|h| h.id() == account_id))
                .and_then(Option::take);
            let master = &master;
            let session = &session;
            async move {
                let deletion = async {
                    match handle {
                        Some(handle) => handle.delete_account(master).await,
                        // Not one of the environment's named accounts.
                        None => session.delete_account(account_id, master).await,
                    }
                };
                (account_id.clone(), timeout_at(deadline, deletion).await)
            }
        })
        .collect();

    let mut report = TeardownReport {
        beneficiary: Some(master.clone()),
        ..TeardownReport::default()
    };
    for (account_id, outcome) in join_all(deletions).await {
        match outcome {
            Ok(Ok(())) => {
                info!(%account_id, beneficiary = %master, "account deleted");
                report.deleted.push(account_id);
            }
            Ok(Err(err)) => {
                warn!(%account_id, error = %err, "account deletion failed");
                report.failures.push((account_id, err));
            }
            Err(_) => {
                warn!(%account_id, ?limit, "account deletion timed out");
                report.timed_out.push(account_id);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AccountId {
        s.parse().unwrap()
    }

    #[test]
    fn repeated_accounts_are_deleted_once() {
        let planned = plan_deletions(
            &[id("bob.test.near"), id("alice.test.near"), id("bob.test.near")],
            &id("test.near"),
        )
        .unwrap();
        assert_eq!(planned, [id("bob.test.near"), id("alice.test.near")]);
    }

    #[test]
    fn master_account_is_never_planned() {
        let err = plan_deletions(&[id("bob.test.near"), id("test.near")], &id("test.near"))
            .unwrap_err();
        assert!(matches!(err, TeardownError::MasterAccount(ref m) if m.as_str() == "test.near"));
    }

    #[test]
    fn timed_out_deletions_make_the_report_unclean() {
        let report = TeardownReport {
            deleted: vec![id("bob.test.near")],
            timed_out: vec![id("alice.test.near")],
            ..TeardownReport::default()
        };
        assert!(!report.is_clean());
        assert!(matches!(
            report.into_result(),
            Err(TeardownError::Timeout(pending)) if pending == [id("alice.test.near")]
        ));
    }
}
