use near_api::{AccountId, NearToken};
use tracing::info;

use crate::config::KeyPolicy;
use crate::error::StepError;
use crate::keys::SigningCredential;
use crate::network::NetworkClient;
use crate::session::Session;

/// Creates every account under the session's master account, funds it with `amount` and
/// registers its signing key. Stops at the first failure; already created accounts are left
/// for teardown.
pub async fn provision_accounts<C: NetworkClient>(
    session: &mut Session<C>,
    accounts: &[AccountId],
    amount: NearToken,
    policy: KeyPolicy,
    master_credential: &SigningCredential,
) -> Result<(), StepError> {
    let master = session.master().clone();
    for account_id in accounts {
        let credential = match policy {
            KeyPolicy::SharedMaster => master_credential.clone(),
            KeyPolicy::PerAccount => SigningCredential::generate(session.network_id())?,
        };
        session
            .create_account(&master, account_id, &credential.public_key, amount)
            .await?;
        session.register_key(account_id.clone(), credential)?;
        info!(%account_id, %amount, "account provisioned");
    }
    Ok(())
}
