//! The network client the orchestrator drives. [`crate::near_rpc::NearRpcClient`] talks to a
//! real node; tests substitute an in-memory implementation.

use near_api::{AccountId, NearToken};
use near_api_types::PublicKey;
use serde_json::Value;

use crate::keys::SigningCredential;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("transaction failed: {0}")]
    Execution(String),
    #[error("failed to decode result of `{method}`: {reason}")]
    Decode { method: String, reason: String },
    #[error("no signing key registered for {0}")]
    UnknownSigner(AccountId),
    #[error("`{method}` is not a {kind} method of the {contract} contract")]
    UnknownMethod {
        contract: &'static str,
        method: String,
        kind: &'static str,
    },
}

/// A signed function call. `args` is JSON, `deposit` is attached to the call.
#[derive(Debug, Clone)]
pub struct FunctionCall<'a> {
    pub receiver: &'a AccountId,
    pub method: &'a str,
    pub args: Value,
    pub deposit: NearToken,
}

/// Connected client for one network. Every mutating operation is signed by `signer` with the
/// given credential; the client does not keep keys of its own.
#[allow(async_fn_in_trait)]
pub trait NetworkClient {
    /// Creates `new_account` as a sub-account of `signer`, funded with `amount` and holding
    /// `public_key` as a full access key.
    async fn create_account(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        new_account: &AccountId,
        public_key: &PublicKey,
        amount: NearToken,
    ) -> Result<(), NetworkError>;

    /// Uploads `code` to `account`, replacing any previously deployed binary.
    async fn deploy_contract(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        code: Vec<u8>,
    ) -> Result<(), NetworkError>;

    /// Returns the call's JSON result, or `Value::Null` when the method returns nothing.
    async fn call(
        &self,
        signer: &AccountId,
        credential: &SigningCredential,
        call: FunctionCall<'_>,
    ) -> Result<Value, NetworkError>;

    async fn view(
        &self,
        contract: &AccountId,
        method: &str,
        args: Value,
    ) -> Result<Value, NetworkError>;

    /// Deletes `account`, sending its remaining balance to `beneficiary`.
    async fn delete_account(
        &self,
        account: &AccountId,
        credential: &SigningCredential,
        beneficiary: &AccountId,
    ) -> Result<(), NetworkError>;

    async fn balance(&self, account: &AccountId) -> Result<NearToken, NetworkError>;
}
