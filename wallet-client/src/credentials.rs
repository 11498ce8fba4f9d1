use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::errors::{WalletError, WalletResult};
use crate::models::{CredentialType, Wallet, WalletCredentials};
use crate::storage::CredentialsStorage;
use crate::validation::InputValidator;

const EVENT_CAPACITY: usize = 64;

/// Change notification for anything showing wallet names, PIN badges or hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsEvent {
    Updated(String),
    Removed(String),
    /// The whole collection was replaced or wiped; reload everything.
    Reset,
}

/// CRUD over locally held wallet credentials.
///
/// All mutations run under one lock, so a read-modify-write of one record can never lose a
/// concurrent update to the same record.
pub struct CredentialsManager {
    storage: Arc<dyn CredentialsStorage>,
    validator: InputValidator,
    write_lock: Mutex<()>,
    events: broadcast::Sender<CredentialsEvent>,
}

impl CredentialsManager {
    pub fn new(storage: Arc<dyn CredentialsStorage>) -> WalletResult<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            storage,
            validator: InputValidator::new()?,
            write_lock: Mutex::new(()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CredentialsEvent> {
        self.events.subscribe()
    }

    pub fn load_all_credentials(&self) -> WalletResult<Vec<WalletCredentials>> {
        self.storage.load_all()
    }

    /// Replace the stored collection with `credentials`; later entries win on duplicate ids.
    pub fn save_all_credentials(&self, credentials: &[WalletCredentials]) -> WalletResult<()> {
        let mut by_id = BTreeMap::new();
        for entry in credentials {
            by_id.insert(entry.id.clone(), entry.clone());
        }

        let _guard = self.write_lock.lock();
        for existing in self.storage.load_all()? {
            if !by_id.contains_key(&existing.id) {
                self.storage.remove(&existing.id)?;
            }
        }
        for entry in by_id.values() {
            self.storage.upsert(entry)?;
        }
        self.notify(CredentialsEvent::Reset);
        Ok(())
    }

    /// Credentials of one wallet; `NoWalletCredentialsFound` is the common, harmless case.
    pub fn load_credentials(&self, wallet_id: &str) -> WalletResult<WalletCredentials> {
        self.storage
            .load(wallet_id)?
            .ok_or(WalletError::NoWalletCredentialsFound)
    }

    /// Set (`Some`) or clear (`None`) one field, keeping the others.
    ///
    /// Setting creates the record when needed. Clearing requires an existing record and
    /// drops it once nothing is left in it. Returns the record as stored, if any.
    pub fn update_credential(
        &self,
        credential_type: CredentialType,
        new_value: Option<String>,
        wallet_id: &str,
    ) -> WalletResult<Option<WalletCredentials>> {
        if let Some(value) = &new_value {
            match credential_type {
                CredentialType::Name => self.validator.validate_wallet_name(value)?,
                CredentialType::Pin => self.validator.validate_pin(value)?,
            }
        }

        let _guard = self.write_lock.lock();
        let current = match (self.storage.load(wallet_id)?, &new_value) {
            (Some(current), _) => current,
            (None, Some(_)) => WalletCredentials::new(wallet_id),
            (None, None) => return Err(WalletError::NoWalletCredentialsFound),
        };
        self.store_or_drop(current.with_value(credential_type, new_value))
    }

    pub fn reset_credential(
        &self,
        credential_type: CredentialType,
        wallet_id: &str,
    ) -> WalletResult<Option<WalletCredentials>> {
        self.update_credential(credential_type, None, wallet_id)
    }

    /// Hide or show a wallet, creating its record when needed.
    pub fn set_hidden(
        &self,
        wallet_id: &str,
        is_hidden: bool,
    ) -> WalletResult<Option<WalletCredentials>> {
        let _guard = self.write_lock.lock();
        let current = self
            .storage
            .load(wallet_id)?
            .unwrap_or_else(|| WalletCredentials::new(wallet_id));
        self.store_or_drop(current.with_hidden(is_hidden))
    }

    pub fn remove_credentials(&self, wallet_id: &str) -> WalletResult<bool> {
        let _guard = self.write_lock.lock();
        let removed = self.storage.remove(wallet_id)?;
        if removed {
            self.notify(CredentialsEvent::Removed(wallet_id.to_string()));
        }
        Ok(removed)
    }

    pub fn remove_all_credentials(&self) -> WalletResult<()> {
        let _guard = self.write_lock.lock();
        self.storage.remove_all()?;
        self.notify(CredentialsEvent::Reset);
        Ok(())
    }

    /// Attach each wallet's own credentials, matched by id. A storage failure leaves the
    /// wallets without credentials rather than failing the fetch that called this.
    pub fn attach_credentials(&self, wallets: &mut [Wallet]) {
        let all = match self.storage.load_all() {
            Ok(all) => all,
            Err(e) => {
                log::warn!("Could not load wallet credentials: {}", e);
                return;
            }
        };
        for wallet in wallets.iter_mut() {
            wallet.credentials = all.iter().find(|c| c.id == wallet.id).cloned();
        }
    }

    /// Credentials for a single wallet, with the same tolerance as `attach_credentials`.
    pub fn credentials_for(&self, wallet_id: &str) -> Option<WalletCredentials> {
        match self.load_credentials(wallet_id) {
            Ok(credentials) => Some(credentials),
            Err(WalletError::NoWalletCredentialsFound) => None,
            Err(e) => {
                log::warn!("Could not load credentials of wallet {}: {}", wallet_id, e);
                None
            }
        }
    }

    fn store_or_drop(&self, updated: WalletCredentials) -> WalletResult<Option<WalletCredentials>> {
        if updated.is_empty() {
            self.storage.remove(&updated.id)?;
            self.notify(CredentialsEvent::Removed(updated.id));
            return Ok(None);
        }
        self.storage.upsert(&updated)?;
        self.notify(CredentialsEvent::Updated(updated.id.clone()));
        Ok(Some(updated))
    }

    fn notify(&self, event: CredentialsEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
