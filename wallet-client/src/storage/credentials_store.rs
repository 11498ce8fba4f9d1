use std::collections::BTreeMap;
use std::sync::Arc;

use super::SecureStorage;
use crate::errors::{WalletError, WalletResult};
use crate::models::WalletCredentials;

pub const CREDENTIALS_SERVICE: &str = "grapherexWallet.walletCredentials";
/// Where older app versions kept every wallet's credentials as one JSON list.
pub const LEGACY_CREDENTIALS_SERVICE: &str = "Wallet";
pub const LEGACY_CREDENTIALS_KEY: &str = "Credentials";

/// Keyed store of local wallet credentials, one record per wallet id.
pub trait CredentialsStorage: Send + Sync {
    fn load_all(&self) -> WalletResult<Vec<WalletCredentials>>;

    fn load(&self, wallet_id: &str) -> WalletResult<Option<WalletCredentials>>;

    fn upsert(&self, credentials: &WalletCredentials) -> WalletResult<()>;

    /// Returns whether a record was present.
    fn remove(&self, wallet_id: &str) -> WalletResult<bool>;

    fn remove_all(&self) -> WalletResult<()>;
}

pub struct KeychainCredentialsStorage {
    keychain: Arc<dyn SecureStorage>,
}

impl KeychainCredentialsStorage {
    pub fn new(keychain: Arc<dyn SecureStorage>) -> Self {
        Self { keychain }
    }

    pub fn has_legacy_list(&self) -> WalletResult<bool> {
        Ok(self
            .keychain
            .load(LEGACY_CREDENTIALS_SERVICE, LEGACY_CREDENTIALS_KEY)?
            .is_some())
    }

    /// Move the legacy single-list blob into keyed records and delete it.
    ///
    /// Records already present under the keyed service win over legacy entries; within the
    /// legacy list the last entry for an id wins. Returns the number of records imported.
    pub fn migrate_legacy_list(&self) -> WalletResult<usize> {
        let Some(blob) = self
            .keychain
            .load(LEGACY_CREDENTIALS_SERVICE, LEGACY_CREDENTIALS_KEY)?
        else {
            return Ok(0);
        };

        let legacy: Vec<WalletCredentials> = serde_json::from_slice(&blob).map_err(|e| {
            WalletError::StorageError(format!("Legacy credentials list is unreadable: {}", e))
        })?;

        let mut by_id = BTreeMap::new();
        for credentials in legacy {
            by_id.insert(credentials.id.clone(), credentials);
        }

        let mut imported = 0;
        for (id, credentials) in by_id {
            if credentials.is_empty() || self.load(&id)?.is_some() {
                continue;
            }
            self.upsert(&credentials)?;
            imported += 1;
        }

        self.keychain
            .remove(LEGACY_CREDENTIALS_SERVICE, LEGACY_CREDENTIALS_KEY)?;
        log::info!("Migrated {} legacy wallet credential records", imported);
        Ok(imported)
    }

    fn decode(&self, wallet_id: &str, bytes: &[u8]) -> WalletResult<WalletCredentials> {
        let credentials: WalletCredentials = serde_json::from_slice(bytes).map_err(|e| {
            WalletError::StorageError(format!(
                "Credentials record for {} is unreadable: {}",
                wallet_id, e
            ))
        })?;
        if credentials.id != wallet_id {
            return Err(WalletError::StorageError(format!(
                "Credentials record for {} carries id {}",
                wallet_id, credentials.id
            )));
        }
        Ok(credentials)
    }
}

impl CredentialsStorage for KeychainCredentialsStorage {
    fn load_all(&self) -> WalletResult<Vec<WalletCredentials>> {
        let mut all = Vec::new();
        for wallet_id in self.keychain.keys(CREDENTIALS_SERVICE)? {
            let Some(bytes) = self.keychain.load(CREDENTIALS_SERVICE, &wallet_id)? else {
                continue;
            };
            match self.decode(&wallet_id, &bytes) {
                Ok(credentials) => all.push(credentials),
                Err(e) => log::warn!("Skipping unreadable credentials record: {}", e),
            }
        }
        Ok(all)
    }

    fn load(&self, wallet_id: &str) -> WalletResult<Option<WalletCredentials>> {
        match self.keychain.load(CREDENTIALS_SERVICE, wallet_id)? {
            Some(bytes) => self.decode(wallet_id, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn upsert(&self, credentials: &WalletCredentials) -> WalletResult<()> {
        if credentials.id.is_empty() {
            return Err(WalletError::ValidationError(
                "Credentials need a wallet id".to_string(),
            ));
        }
        let encoded = zeroize::Zeroizing::new(serde_json::to_vec(credentials)?);
        self.keychain
            .store(CREDENTIALS_SERVICE, &credentials.id, &encoded)
    }

    fn remove(&self, wallet_id: &str) -> WalletResult<bool> {
        self.keychain.remove(CREDENTIALS_SERVICE, wallet_id)
    }

    fn remove_all(&self) -> WalletResult<()> {
        for wallet_id in self.keychain.keys(CREDENTIALS_SERVICE)? {
            self.keychain.remove(CREDENTIALS_SERVICE, &wallet_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CredentialType;
    use crate::storage::MemoryKeychain;

    fn storage() -> (Arc<dyn SecureStorage>, KeychainCredentialsStorage) {
        let keychain: Arc<dyn SecureStorage> = Arc::new(MemoryKeychain::new());
        (keychain.clone(), KeychainCredentialsStorage::new(keychain))
    }

    fn named(id: &str, name: &str) -> WalletCredentials {
        WalletCredentials::new(id).with_value(CredentialType::Name, Some(name.to_string()))
    }

    #[test]
    fn records_are_keyed_by_wallet_id() {
        let (keychain, storage) = storage();
        storage.upsert(&named("W2", "Two")).unwrap();
        storage.upsert(&named("W1", "One")).unwrap();
        storage.upsert(&named("W1", "Uno")).unwrap();

        assert_eq!(keychain.keys(CREDENTIALS_SERVICE).unwrap(), vec!["W1", "W2"]);
        let all = storage.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name.as_deref(), Some("Uno"));

        assert!(storage.remove("W1").unwrap());
        assert!(storage.load("W1").unwrap().is_none());
        storage.remove_all().unwrap();
        assert!(storage.load_all().unwrap().is_empty());
    }

    #[test]
    fn mismatched_record_is_skipped_in_bulk_load() {
        let (keychain, storage) = storage();
        storage.upsert(&named("W1", "One")).unwrap();
        keychain
            .store(CREDENTIALS_SERVICE, "W9", br#"{"id":"W1"}"#)
            .unwrap();

        assert_eq!(storage.load_all().unwrap().len(), 1);
        assert!(storage.load("W9").is_err());
    }

    #[test]
    fn undecodable_record_is_a_storage_error() {
        let (keychain, storage) = storage();
        storage.upsert(&named("W1", "One")).unwrap();
        keychain.store(CREDENTIALS_SERVICE, "W2", b"garbage").unwrap();

        assert!(matches!(storage.load("W2"), Err(WalletError::StorageError(_))));
        assert_eq!(storage.load_all().unwrap().len(), 1);
    }

    #[test]
    fn legacy_list_is_migrated_once() {
        let (keychain, storage) = storage();
        storage.upsert(&named("W1", "Keyed")).unwrap();
        let legacy = br#"[
            {"id":"W1","name":"Legacy","pin":null,"isHidden":false},
            {"id":"W2","name":"First","pin":null,"isHidden":false},
            {"id":"W2","name":"Second","pin":"1234","isHidden":false},
            {"id":"W3","name":null,"pin":null,"isHidden":false}
        ]"#;
        keychain
            .store(LEGACY_CREDENTIALS_SERVICE, LEGACY_CREDENTIALS_KEY, legacy)
            .unwrap();
        assert!(storage.has_legacy_list().unwrap());

        assert_eq!(storage.migrate_legacy_list().unwrap(), 1);
        assert!(!storage.has_legacy_list().unwrap());
        assert_eq!(
            storage.load("W1").unwrap().unwrap().name.as_deref(),
            Some("Keyed")
        );
        let w2 = storage.load("W2").unwrap().unwrap();
        assert_eq!(w2.name.as_deref(), Some("Second"));
        assert_eq!(w2.pin.as_deref(), Some("1234"));
        assert!(storage.load("W3").unwrap().is_none());

        assert_eq!(storage.migrate_legacy_list().unwrap(), 0);
    }

    #[test]
    fn unreadable_legacy_list_is_left_in_place() {
        let (keychain, storage) = storage();
        keychain
            .store(LEGACY_CREDENTIALS_SERVICE, LEGACY_CREDENTIALS_KEY, b"not json")
            .unwrap();
        assert!(matches!(
            storage.migrate_legacy_list(),
            Err(WalletError::StorageError(_))
        ));
        assert!(storage.has_legacy_list().unwrap());
    }
}
