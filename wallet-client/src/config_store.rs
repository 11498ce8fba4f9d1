use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::security::{
    SecurityConfig, DEFAULT_BASE_PATH, KEY_API_SERVER_URL, KEY_AUTH_USERNAME,
    KEY_CRYPTO_SERVER_BASE_PATH, KEY_CRYPTO_SERVER_URL, KEY_PIN_MAX_FAILED_ATTEMPTS,
    KEY_PIN_UNLOCK_MINUTES, KEY_REQUEST_TIMEOUT_SECS,
};
use crate::storage::WalletPaths;

const CONFIG_VERSION: u16 = 1;

/// Where the wallet talks to: the auth (API) server and the crypto backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub api_server_url: String,
    pub crypto_server_url: String,
    pub crypto_server_base_path: String,
    pub request_timeout_secs: u32,
}

impl NetworkConfig {
    /// Base path with exactly one trailing slash, ready for `{base}wallets` style joins.
    pub fn base_path(&self) -> String {
        let trimmed = self.crypto_server_base_path.trim_end_matches('/');
        format!("{}/", trimmed)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1) as u64)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_server_url: "http://localhost:8080".to_string(),
            crypto_server_url: "http://localhost:8081".to_string(),
            crypto_server_base_path: DEFAULT_BASE_PATH.to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Basic-auth identity used to obtain wallet tokens. The password lives in `SecurityConfig`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AuthConfig {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinLockConfig {
    pub max_failed_attempts: u32,
    pub unlock_minutes: u32,
}

impl Default for PinLockConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            unlock_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub pin_lock: PinLockConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl WalletConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            pin_lock: PinLockConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    /// Seed a configuration from environment defaults and overrides.
    pub fn from_security_config(security: &SecurityConfig) -> WalletResult<Self> {
        let mut config = Self::new(security.environment().as_str());
        config.network = NetworkConfig {
            api_server_url: security.get_required(KEY_API_SERVER_URL)?.clone(),
            crypto_server_url: security.get_required(KEY_CRYPTO_SERVER_URL)?.clone(),
            crypto_server_base_path: security
                .get_or_default(KEY_CRYPTO_SERVER_BASE_PATH, DEFAULT_BASE_PATH),
            request_timeout_secs: security.get_u32_with_default(KEY_REQUEST_TIMEOUT_SECS, 30)?,
        };
        config.auth = AuthConfig {
            username: security.get_required(KEY_AUTH_USERNAME)?.clone(),
        };
        config.pin_lock = PinLockConfig {
            max_failed_attempts: security.get_u32_with_default(KEY_PIN_MAX_FAILED_ATTEMPTS, 5)?,
            unlock_minutes: security.get_u32_with_default(KEY_PIN_UNLOCK_MINUTES, 5)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WalletResult<()> {
        for (label, url) in [
            ("api server", &self.network.api_server_url),
            ("crypto server", &self.network.crypto_server_url),
        ] {
            reqwest::Url::parse(url).map_err(|e| {
                WalletError::ValidationError(format!("Invalid {} URL '{}': {}", label, url, e))
            })?;
        }
        if self.auth.username.trim().is_empty() {
            return Err(WalletError::ValidationError(
                "Auth username cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: WalletConfig,
    modified_at_unix: i64,
}

/// Handles persistence of wallet configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the persisted configuration, seeding it from `security` on first run.
    pub fn load_or_init(&self, security: &SecurityConfig) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            let config = WalletConfig::from_security_config(security)?;
            self.save(&config)?;
            log::info!("Created wallet configuration at {}", self.path.display());
            return Ok(config);
        }

        self.load()
    }

    pub fn load(&self) -> WalletResult<WalletConfig> {
        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        let checksum = checksum(&envelope.payload)?;
        if checksum != envelope.checksum {
            return Err(WalletError::ValidationError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn update<F>(&self, security: &SecurityConfig, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_init(security)?;
        updater(&mut config)?;
        config.validate()?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &WalletConfig) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}
