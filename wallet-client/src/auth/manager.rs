use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::service::AuthenticationService;
use crate::errors::WalletResult;
use crate::models::AuthToken;
use crate::storage::AuthTokenStorage;

/// Single owner of the wallet bearer token.
///
/// Reads are served from memory, then from storage, then from the auth service. Every path
/// that talks to the auth service runs under `refresh_lock`, so concurrent callers queue up
/// and at most one token request is in flight.
pub struct AuthenticationManager {
    service: Arc<dyn AuthenticationService>,
    storage: Arc<dyn AuthTokenStorage>,
    cached: RwLock<Option<AuthToken>>,
    refresh_lock: Mutex<()>,
}

impl AuthenticationManager {
    pub fn new(service: Arc<dyn AuthenticationService>, storage: Arc<dyn AuthTokenStorage>) -> Self {
        Self {
            service,
            storage,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn cached_token(&self) -> Option<AuthToken> {
        self.cached.read().clone()
    }

    /// Current token, fetching and persisting one only when none is known.
    pub async fn get_wallet_token(&self) -> WalletResult<AuthToken> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        if let Some(token) = self.storage.load_token()? {
            log::debug!("Loaded wallet token from storage");
            *self.cached.write() = Some(token.clone());
            return Ok(token);
        }

        self.fetch_and_store().await
    }

    /// Discard whatever is stored and always fetch a new token.
    pub async fn refresh_wallet_token(&self) -> WalletResult<AuthToken> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Refresh after the backend rejected `rejected`.
    ///
    /// When another caller already replaced that token while this one waited for the lock,
    /// the replacement is returned without another round-trip.
    pub async fn refresh_after_rejection(
        &self,
        rejected: Option<&AuthToken>,
    ) -> WalletResult<AuthToken> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.cached_token() {
            if Some(&current) != rejected {
                log::debug!("Wallet token was already refreshed by a concurrent call");
                return Ok(current);
            }
        }
        self.fetch_and_store().await
    }

    /// Forget the token everywhere (sign-out).
    pub fn invalidate(&self) -> WalletResult<()> {
        *self.cached.write() = None;
        self.storage.remove_token()
    }

    async fn fetch_and_store(&self) -> WalletResult<AuthToken> {
        *self.cached.write() = None;
        self.storage.remove_token()?;

        let token = self.service.get_token().await?;
        self.storage.save_token(&token)?;
        *self.cached.write() = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalletError;
    use crate::storage::{KeychainAuthTokenStorage, MemoryKeychain};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AuthenticationService for CountingService {
        async fn get_token(&self) -> WalletResult<AuthToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(WalletError::NetworkError("auth server down".into()));
            }
            Ok(AuthToken::new(format!("t{}", n)))
        }
    }

    fn manager(service: Arc<CountingService>) -> (Arc<KeychainAuthTokenStorage>, AuthenticationManager) {
        let storage = Arc::new(KeychainAuthTokenStorage::new(Arc::new(MemoryKeychain::new())));
        let manager = AuthenticationManager::new(service, storage.clone());
        (storage, manager)
    }

    #[tokio::test]
    async fn get_token_is_cached_after_first_fetch() {
        let service = Arc::new(CountingService::default());
        let (storage, manager) = manager(service.clone());

        assert_eq!(manager.get_wallet_token().await.unwrap().as_str(), "t1");
        assert_eq!(manager.get_wallet_token().await.unwrap().as_str(), "t1");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(storage.load_token().unwrap(), Some(AuthToken::new("t1")));
    }

    #[tokio::test]
    async fn persisted_token_is_used_before_network() {
        let service = Arc::new(CountingService::default());
        let (storage, manager) = manager(service.clone());
        storage.save_token(&AuthToken::new("stored")).unwrap();

        assert_eq!(manager.get_wallet_token().await.unwrap().as_str(), "stored");
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_always_hits_the_service() {
        let service = Arc::new(CountingService::default());
        let (storage, manager) = manager(service.clone());

        manager.get_wallet_token().await.unwrap();
        assert_eq!(manager.refresh_wallet_token().await.unwrap().as_str(), "t2");
        assert_eq!(manager.refresh_wallet_token().await.unwrap().as_str(), "t3");
        assert_eq!(storage.load_token().unwrap(), Some(AuthToken::new("t3")));
    }

    #[tokio::test]
    async fn concurrent_rejections_share_one_refresh() {
        let service = Arc::new(CountingService::default());
        let (_, manager) = manager(service.clone());
        let manager = Arc::new(manager);
        let stale = manager.get_wallet_token().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = manager.clone();
            let stale = stale.clone();
            handles.push(tokio::spawn(async move {
                manager.refresh_after_rejection(Some(&stale)).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().as_str(), "t2");
        }
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_surface_verbatim_and_leave_no_token() {
        let service = Arc::new(CountingService {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (storage, manager) = manager(service.clone());
        storage.save_token(&AuthToken::new("old")).unwrap();

        assert_eq!(
            manager.refresh_wallet_token().await,
            Err(WalletError::NetworkError("auth server down".into()))
        );
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(manager.cached_token().is_none());
        assert!(storage.load_token().unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_clears_memory_and_storage() {
        let service = Arc::new(CountingService::default());
        let (storage, manager) = manager(service.clone());
        manager.get_wallet_token().await.unwrap();

        manager.invalidate().unwrap();
        assert!(manager.cached_token().is_none());
        assert!(storage.load_token().unwrap().is_none());
        assert_eq!(manager.get_wallet_token().await.unwrap().as_str(), "t2");
    }
}
