use std::fmt;
use std::sync::Arc;

use near_api::{AccountId, NearToken};
use near_api_types::PublicKey;
use serde_json::Value;

use crate::abi::ContractAbi;
use crate::keys::{DuplicateKey, KeyRegistry, SigningCredential};
use crate::network::{FunctionCall, NetworkClient, NetworkError};

/// A connected client bound to a key registry. Mutable only while accounts are being
/// provisioned; handles are derived from the frozen `Arc<Session>`.
pub struct Session<C> {
    client: C,
    network_id: String,
    master: AccountId,
    keys: KeyRegistry,
}

impl<C> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("network_id", &self.network_id)
            .field("master", &self.master)
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl<C: NetworkClient> Session<C> {
    pub fn connect(
        client: C,
        network_id: impl Into<String>,
        master: AccountId,
        master_credential: SigningCredential,
    ) -> Result<Self, DuplicateKey> {
        let mut keys = KeyRegistry::new();
        keys.insert(master.clone(), master_credential)?;
        Ok(Self {
            client,
            network_id: network_id.into(),
            master,
            keys,
        })
    }

    pub fn register_key(
        &mut self,
        account_id: AccountId,
        credential: SigningCredential,
    ) -> Result<(), DuplicateKey> {
        self.keys.insert(account_id, credential)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn master(&self) -> &AccountId {
        &self.master
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    fn credential(&self, account_id: &AccountId) -> Result<&SigningCredential, NetworkError> {
        self.keys
            .get(&self.network_id, account_id)
            .ok_or_else(|| NetworkError::UnknownSigner(account_id.clone()))
    }

    pub async fn create_account(
        &self,
        signer: &AccountId,
        new_account: &AccountId,
        public_key: &PublicKey,
        amount: NearToken,
    ) -> Result<(), NetworkError> {
        let credential = self.credential(signer)?;
        self.client
            .create_account(signer, credential, new_account, public_key, amount)
            .await
    }

    pub async fn deploy_contract(
        &self,
        account: &AccountId,
        code: Vec<u8>,
    ) -> Result<(), NetworkError> {
        let credential = self.credential(account)?;
        self.client.deploy_contract(account, credential, code).await
    }

    pub async fn call(
        &self,
        signer: &AccountId,
        call: FunctionCall<'_>,
    ) -> Result<Value, NetworkError> {
        let credential = self.credential(signer)?;
        self.client.call(signer, credential, call).await
    }

    pub async fn view(
        &self,
        contract: &AccountId,
        method: &str,
        args: Value,
    ) -> Result<Value, NetworkError> {
        self.client.view(contract, method, args).await
    }

    pub async fn delete_account(
        &self,
        account: &AccountId,
        beneficiary: &AccountId,
    ) -> Result<(), NetworkError> {
        let credential = self.credential(account)?;
        self.client
            .delete_account(account, credential, beneficiary)
            .await
    }

    pub async fn balance(&self, account: &AccountId) -> Result<NearToken, NetworkError> {
        self.client.balance(account).await
    }

    pub fn account(self: &Arc<Self>, id: AccountId) -> AccountHandle<C> {
        AccountHandle {
            id,
            session: Arc::clone(self),
        }
    }

    /// A handle that calls `target` while signing as `acting`. `acting` and `target` differ for
    /// delegated calls, e.g. a user account calling a token contract.
    pub fn contract(
        self: &Arc<Self>,
        acting: AccountId,
        target: AccountId,
        abi: ContractAbi,
    ) -> ContractHandle<C> {
        ContractHandle {
            acting: self.account(acting),
            target,
            abi,
        }
    }
}

/// A funded, named on-chain identity.
pub struct AccountHandle<C> {
    id: AccountId,
    session: Arc<Session<C>>,
}

impl<C> fmt::Debug for AccountHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountHandle").field(&self.id).finish()
    }
}

impl<C: NetworkClient> AccountHandle<C> {
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn session(&self) -> &Arc<Session<C>> {
        &self.session
    }

    pub async fn create_account(
        &self,
        new_account: &AccountId,
        public_key: &PublicKey,
        amount: NearToken,
    ) -> Result<(), NetworkError> {
        self.session
            .create_account(&self.id, new_account, public_key, amount)
            .await
    }

    pub async fn deploy_contract(&self, code: Vec<u8>) -> Result<(), NetworkError> {
        self.session.deploy_contract(&self.id, code).await
    }

    pub async fn balance(&self) -> Result<NearToken, NetworkError> {
        self.session.balance(&self.id).await
    }

    /// Deletes the account; the handle is consumed.
    pub async fn delete_account(self, beneficiary: &AccountId) -> Result<(), NetworkError> {
        self.session.delete_account(&self.id, beneficiary).await
    }
}

/// An account handle bound to a contract's ABI.
pub struct ContractHandle<C> {
    acting: AccountHandle<C>,
    target: AccountId,
    abi: ContractAbi,
}

impl<C> fmt::Debug for ContractHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("acting", &self.acting.id)
            .field("target", &self.target)
            .field("abi", &self.abi.name)
            .finish()
    }
}

impl<C: NetworkClient> ContractHandle<C> {
    pub fn acting(&self) -> &AccountId {
        self.acting.id()
    }

    pub fn target(&self) -> &AccountId {
        &self.target
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    pub async fn call(
        &self,
        method: &str,
        args: Value,
        deposit: NearToken,
    ) -> Result<Value, NetworkError> {
        if !self.abi.is_change(method) {
            return Err(NetworkError::UnknownMethod {
                contract: self.abi.name,
                method: method.to_string(),
                kind: "change",
            });
        }
        self.acting
            .session
            .call(
                self.acting.id(),
                FunctionCall {
                    receiver: &self.target,
                    method,
                    args,
                    deposit,
                },
            )
            .await
    }

    pub async fn view(&self, method: &str, args: Value) -> Result<Value, NetworkError> {
        if !self.abi.is_view(method) {
            return Err(NetworkError::UnknownMethod {
                contract: self.abi.name,
                method: method.to_string(),
                kind: "view",
            });
        }
        self.acting.session.view(&self.target, method, args).await
    }
}
