use std::sync::Arc;

use super::SecureStorage;
use crate::errors::{WalletError, WalletResult};
use crate::models::AuthToken;

pub const AUTH_TOKEN_SERVICE: &str = "grapherexWallet.authToken";
const AUTH_TOKEN_KEY: &str = "token";

/// Durable home of the wallet bearer token.
pub trait AuthTokenStorage: Send + Sync {
    fn load_token(&self) -> WalletResult<Option<AuthToken>>;

    fn save_token(&self, token: &AuthToken) -> WalletResult<()>;

    fn remove_token(&self) -> WalletResult<()>;
}

pub struct KeychainAuthTokenStorage {
    keychain: Arc<dyn SecureStorage>,
}

impl KeychainAuthTokenStorage {
    pub fn new(keychain: Arc<dyn SecureStorage>) -> Self {
        Self { keychain }
    }
}

impl AuthTokenStorage for KeychainAuthTokenStorage {
    fn load_token(&self) -> WalletResult<Option<AuthToken>> {
        let Some(bytes) = self.keychain.load(AUTH_TOKEN_SERVICE, AUTH_TOKEN_KEY)? else {
            return Ok(None);
        };
        let value = std::str::from_utf8(&bytes).map_err(|_| {
            WalletError::StorageError("Stored auth token is not valid UTF-8".to_string())
        })?;
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(AuthToken::new(value)))
    }

    fn save_token(&self, token: &AuthToken) -> WalletResult<()> {
        self.keychain
            .store(AUTH_TOKEN_SERVICE, AUTH_TOKEN_KEY, token.as_str().as_bytes())
    }

    fn remove_token(&self) -> WalletResult<()> {
        self.keychain.remove(AUTH_TOKEN_SERVICE, AUTH_TOKEN_KEY)?;
        Ok(())
    }
}
