use std::sync::Arc;

use near_api::{
    Account, AccountId, Contract, Data, NearToken, NetworkConfig, RPCEndpoint, Signer, Tokens,
};
use near_api_types::PublicKey;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::keys::SigningCredential;
use crate::network::{FunctionCall, NetworkClient, NetworkError};

/// [`NetworkClient`] backed by `near-api` against a single RPC endpoint.
#[derive(Debug, Clone)]
pub struct NearRpcClient {
    network_config: NetworkConfig,
}

impl NearRpcClient {
    pub fn connect(network_id: &str, node_url: &Url) -> Self {
        Self {
            network_config: NetworkConfig {
                network_name: network_id.to_string(),
                rpc_endpoints: vec![RPCEndpoint::new(node_url.clone())],
                ..NetworkConfig::testnet()
            },
        }
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }
}

fn signer_for(credential: &SigningCredential) -> Result<Arc<Signer>, NetworkError> {
    Signer::from_secret_key(credential.secret_key.clone())
        .map_err(|e| NetworkError::Transport(format!("invalid signer: {e:?}")))
}

fn transport<E: std::fmt::Debug>(e: E) -> NetworkError {
    NetworkError::Transport(format!("{e:?}"))
}

fn execution<E: std::fmt::Debug>(e: E) -> NetworkError {
    NetworkError::Execution(format!("{e:?}"))
}

impl NetworkClient for NearRpcClient {
    async fn create_account(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        new_account: &AccountId,
        public_key: &PublicKey,
        amount: NearToken,
    ) -> Result<(), NetworkError> {
        debug!(%signer, %new_account, %amount, "create_account");
        Account::create_account(new_account.clone())
            .fund_myself(signer.clone(), amount)
            .with_public_key(public_key.clone())
            .with_signer(signer_for(credential)?)
            .send_to(&self.network_config)
            .await
            .map_err(transport)?
            .into_result()
            .map_err(execution)?;
        Ok(())
    }

    async fn deploy_contract(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        code: Vec<u8>,
    ) -> Result<(), NetworkError> {
        debug!(%account, size = code.len(), "deploy_contract");
        Contract::deploy(account.clone())
            .use_code(code)
            .without_init_call()
            .with_signer(signer_for(credential)?)
            .send_to(&self.network_config)
            .await
            .map_err(transport)?
            .into_result()
            .map_err(execution)?;
        Ok(())
    }

    async fn call(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        call: FunctionCall<'_>,
    ) -> Result<Value, NetworkError> {
        debug!(
            %signer,
            receiver = %call.receiver,
            method = call.method,
            deposit = %call.deposit,
            "call"
        );
        let outcome = Contract(call.receiver.clone())
            .call_function(call.method, call.args)
            .transaction()
            .deposit(call.deposit)
            .with_signer(signer.clone(), signer_for(credential)?)
            .send_to(&self.network_config)
            .await
            .map_err(transport)?
            .into_result()
            .map_err(execution)?;

        let bytes = outcome.raw_bytes().map_err(|e| NetworkError::Decode {
            method: call.method.to_string(),
            reason: format!("{e:?}"),
        })?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::Decode {
            method: call.method.to_string(),
            reason: e.to_string(),
        })
    }

    async fn view(
        &self,
        contract: &AccountId,
        method: &str,
        args: Value,
    ) -> Result<Value, NetworkError> {
        let result: Data<Value> = Contract(contract.clone())
            .call_function(method, args)
            .read_only()
            .fetch_from(&self.network_config)
            .await
            .map_err(transport)?;
        Ok(result.data)
    }

    async fn delete_account(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        beneficiary: &AccountId,
    ) -> Result<(), NetworkError> {
        debug!(%account, %beneficiary, "delete_account");
        Account(account.clone())
            .delete_account_with_beneficiary(beneficiary.clone())
            .with_signer(signer_for(credential)?)
            .send_to(&self.network_config)
            .await
            .map_err(transport)?
            .into_result()
            .map_err(execution)?;
        Ok(())
    }

    async fn balance(&self, account: &AccountId) -> Result<NearToken, NetworkError> {
        let balance = Tokens::account(account.clone())
            .near_balance()
            .fetch_from(&self.network_config)
            .await
            .map_err(transport)?;
        Ok(balance.total)
    }
}
