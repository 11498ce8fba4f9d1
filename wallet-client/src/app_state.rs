use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiService;
use crate::auth::{AuthenticationManager, AuthenticationService, HttpAuthenticationService};
use crate::config_store::{ConfigStore, WalletConfig};
use crate::credentials::CredentialsManager;
use crate::errors::WalletResult;
use crate::network::{ConnectivityMonitor, HttpNetworkService, NetworkService, TcpReachability};
use crate::pin_lock::PinLockManager;
use crate::security::{Environment, SecurityConfig, KEY_AUTH_PASSWORD, KEY_KEYCHAIN_PASSPHRASE};
use crate::storage::{
    AuthTokenStorage, CredentialsStorage, FileKeychain, KdfParameters, KeychainAuthTokenStorage,
    KeychainCredentialsStorage, SecureStorage, WalletPaths,
};

const CONNECTIVITY_CHECK_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_KEYCHAIN_BACKUPS: usize = 5;

/// The replaceable parts of a context: transport, token source, stores, connectivity.
pub struct WalletServices {
    pub network: Arc<dyn NetworkService>,
    pub auth_service: Arc<dyn AuthenticationService>,
    pub token_storage: Arc<dyn AuthTokenStorage>,
    pub credentials_storage: Arc<dyn CredentialsStorage>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
}

/// Everything a front end needs, built once at startup.
pub struct WalletContext {
    paths: Option<WalletPaths>,
    config_store: Option<ConfigStore>,
    config: WalletConfig,
    credentials: Arc<CredentialsManager>,
    auth: Arc<AuthenticationManager>,
    api: ApiService,
    pin_lock: PinLockManager,
}

impl WalletContext {
    /// Open (or create) the on-disk state under `root_dir` and wire the live services.
    pub fn initialize(root_dir: impl AsRef<Path>, security: &SecurityConfig) -> WalletResult<Self> {
        security.validate_required_configs()?;

        let paths = WalletPaths::new(root_dir)?;
        paths.ensure_directories()?;
        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_or_init(security)?;

        let kdf = match security.environment() {
            Environment::Test => KdfParameters::light(),
            _ => KdfParameters::default(),
        };
        let passphrase = security.get_secret(KEY_KEYCHAIN_PASSPHRASE)?;
        let keychain: Arc<dyn SecureStorage> =
            Arc::new(FileKeychain::from_paths(&paths, &passphrase, kdf)?);

        let credentials_storage = Arc::new(KeychainCredentialsStorage::new(keychain.clone()));
        migrate_legacy_credentials(&paths, &credentials_storage);

        let network: Arc<dyn NetworkService> = Arc::new(HttpNetworkService::new(
            &config.network.api_server_url,
            config.network.request_timeout(),
        )?);
        let auth_service = Arc::new(HttpAuthenticationService::new(
            network.clone(),
            config.network.api_server_url.clone(),
            config.auth.username.clone(),
            security.get_secret(KEY_AUTH_PASSWORD)?,
        ));
        let connectivity = Arc::new(TcpReachability::from_url(
            &config.network.crypto_server_url,
            CONNECTIVITY_CHECK_TIMEOUT,
        )?);

        let services = WalletServices {
            network,
            auth_service,
            token_storage: Arc::new(KeychainAuthTokenStorage::new(keychain)),
            credentials_storage,
            connectivity,
        };
        let mut context = Self::with_services(config, services)?;
        context.paths = Some(paths);
        context.config_store = Some(config_store);
        log::info!(
            "Wallet context ready ({} environment)",
            security.environment().as_str()
        );
        Ok(context)
    }

    /// Assemble a context from injected parts; nothing touches the disk.
    pub fn with_services(config: WalletConfig, services: WalletServices) -> WalletResult<Self> {
        let credentials = Arc::new(CredentialsManager::new(services.credentials_storage)?);
        let auth = Arc::new(AuthenticationManager::new(
            services.auth_service,
            services.token_storage,
        ));
        let api = ApiService::new(
            &config.network,
            services.network,
            auth.clone(),
            credentials.clone(),
            services.connectivity,
        )?;
        let pin_lock = PinLockManager::new(credentials.clone(), &config.pin_lock);

        Ok(Self {
            paths: None,
            config_store: None,
            config,
            credentials,
            auth,
            api,
            pin_lock,
        })
    }

    pub fn api(&self) -> &ApiService {
        &self.api
    }

    pub fn credentials(&self) -> &Arc<CredentialsManager> {
        &self.credentials
    }

    pub fn auth(&self) -> &Arc<AuthenticationManager> {
        &self.auth
    }

    pub fn pin_lock(&self) -> &PinLockManager {
        &self.pin_lock
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn paths(&self) -> Option<&WalletPaths> {
        self.paths.as_ref()
    }

    pub fn config_store(&self) -> Option<&ConfigStore> {
        self.config_store.as_ref()
    }

    /// Full local wipe: credentials, the wallet token and every PIN session.
    pub fn reset(&self) -> WalletResult<()> {
        self.credentials.remove_all_credentials()?;
        self.auth.invalidate()?;
        self.pin_lock.lock_all();
        log::info!("Local wallet state reset");
        Ok(())
    }
}

/// Import the legacy credentials list once, after snapshotting the keychain.
///
/// Failures are logged and leave the legacy list in place for the next start.
fn migrate_legacy_credentials(paths: &WalletPaths, storage: &KeychainCredentialsStorage) {
    match storage.has_legacy_list() {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            log::warn!("Could not check for legacy wallet credentials: {}", e);
            return;
        }
    }

    match paths.create_keychain_backup() {
        Ok(backup) => log::info!("Keychain backed up to {}", backup.display()),
        Err(e) => {
            log::warn!("Keychain backup failed, postponing credentials migration: {}", e);
            return;
        }
    }
    if let Err(e) = paths.prune_old_backups(MAX_KEYCHAIN_BACKUPS) {
        log::warn!("Could not prune keychain backups: {}", e);
    }

    if let Err(e) = storage.migrate_legacy_list() {
        log::warn!("Legacy wallet credentials were not migrated: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CredentialType, WalletCredentials};
    use crate::storage::{LEGACY_CREDENTIALS_KEY, LEGACY_CREDENTIALS_SERVICE};
    use secrecy::SecretString;
    use tempfile::TempDir;

    fn test_security() -> SecurityConfig {
        SecurityConfig::new(Environment::Test)
    }

    fn seed_legacy_list(root: &Path, entries: &[WalletCredentials]) {
        let paths = WalletPaths::new(root).unwrap();
        paths.ensure_directories().unwrap();
        let passphrase: SecretString = test_security().get_secret(KEY_KEYCHAIN_PASSPHRASE).unwrap();
        let keychain = FileKeychain::from_paths(&paths, &passphrase, KdfParameters::light()).unwrap();
        keychain
            .store(
                LEGACY_CREDENTIALS_SERVICE,
                LEGACY_CREDENTIALS_KEY,
                &serde_json::to_vec(entries).unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn initialize_creates_config_and_keychain() {
        let dir = TempDir::new().unwrap();
        let context = WalletContext::initialize(dir.path(), &test_security()).unwrap();

        let paths = context.paths().unwrap();
        assert!(paths.config_file().exists());
        assert!(paths.keychain_salt_file().exists());
        assert_eq!(context.config().network.api_server_url, "http://127.0.0.1:18080");
        assert_eq!(context.config().pin_lock.max_failed_attempts, 3);
    }

    #[test]
    fn credentials_survive_a_restart() {
        let dir = TempDir::new().unwrap();
        {
            let context = WalletContext::initialize(dir.path(), &test_security()).unwrap();
            context
                .credentials()
                .update_credential(CredentialType::Name, Some("Savings".into()), "W1")
                .unwrap();
        }

        let context = WalletContext::initialize(dir.path(), &test_security()).unwrap();
        let stored = context.credentials().load_credentials("W1").unwrap();
        assert_eq!(stored.name.as_deref(), Some("Savings"));
    }

    #[test]
    fn legacy_list_is_migrated_with_a_backup() {
        let dir = TempDir::new().unwrap();
        let mut legacy = WalletCredentials::new("W1");
        legacy.pin = Some("1234".into());
        seed_legacy_list(dir.path(), &[legacy]);

        let context = WalletContext::initialize(dir.path(), &test_security()).unwrap();
        let migrated = context.credentials().load_credentials("W1").unwrap();
        assert_eq!(migrated.pin.as_deref(), Some("1234"));

        let paths = context.paths().unwrap();
        assert_eq!(paths.list_backups().unwrap().len(), 1);
        assert!(context.pin_lock().requires_pin("W1").unwrap());
    }

    #[test]
    fn reset_wipes_credentials_and_pin_sessions() {
        let dir = TempDir::new().unwrap();
        let context = WalletContext::initialize(dir.path(), &test_security()).unwrap();
        context
            .credentials()
            .update_credential(CredentialType::Pin, Some("1234".into()), "W1")
            .unwrap();
        context.pin_lock().unlock("W1", "1234").unwrap();

        context.reset().unwrap();
        assert!(context.credentials().load_all_credentials().unwrap().is_empty());
        assert!(context.auth().cached_token().is_none());
        assert!(context.pin_lock().is_unlocked("W1"));
    }
}
