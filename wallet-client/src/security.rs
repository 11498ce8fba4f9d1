use crate::errors::{WalletError, WalletResult};
use once_cell::sync::OnceCell;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const KEY_LOG_LEVEL: &str = "LOG_LEVEL";
pub const KEY_API_SERVER_URL: &str = "API_SERVER_URL";
pub const KEY_CRYPTO_SERVER_URL: &str = "CRYPTO_SERVER_URL";
pub const KEY_CRYPTO_SERVER_BASE_PATH: &str = "CRYPTO_SERVER_BASE_PATH";
pub const KEY_AUTH_USERNAME: &str = "AUTH_USERNAME";
pub const KEY_AUTH_PASSWORD: &str = "AUTH_PASSWORD";
pub const KEY_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const KEY_PIN_MAX_FAILED_ATTEMPTS: &str = "PIN_MAX_FAILED_ATTEMPTS";
pub const KEY_PIN_UNLOCK_MINUTES: &str = "PIN_UNLOCK_MINUTES";
pub const KEY_KEYCHAIN_PASSPHRASE: &str = "KEYCHAIN_PASSPHRASE";

pub const DEFAULT_BASE_PATH: &str = "/api/crypto-backend/v2/";
const DEVELOPMENT_PASSPHRASE: &str = "grapherex-development-keychain";

/// Environment types for different security configurations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Environment-driven settings, including the secrets that never go into the config file
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    environment: Environment,
    config_map: HashMap<String, String>,
}

impl SecurityConfig {
    /// Create a new security configuration
    pub fn new(environment: Environment) -> Self {
        let mut config = SecurityConfig {
            environment,
            config_map: HashMap::new(),
        };

        // Load default configuration based on environment
        config.load_defaults();
        config
    }

    /// Load configuration from environment variables
    pub fn from_env() -> WalletResult<Self> {
        let env_str =
            std::env::var("GRAPHEREX_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::from_environment(Environment::parse(&env_str))
    }

    /// Construct a configuration for the provided environment and apply overrides.
    pub fn from_environment(environment: Environment) -> WalletResult<Self> {
        let mut config = Self::new(environment);
        assert!(
            !config.config_map.is_empty(),
            "default security configuration must not be empty"
        );

        // Load environment-specific variables
        config.load_from_env_vars()?;

        Ok(config)
    }

    /// Get a configuration value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.config_map.get(key)
    }

    /// Get a configuration value or return default
    pub fn get_or_default(&self, key: &str, default: &str) -> String {
        self.config_map
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Get a required configuration value
    pub fn get_required(&self, key: &str) -> WalletResult<&String> {
        self.config_map.get(key).ok_or_else(|| {
            WalletError::ValidationError(format!("Required config key '{}' not found", key))
        })
    }

    /// Secret values are handed out wrapped so they cannot leak through `Debug`.
    pub fn get_secret(&self, key: &str) -> WalletResult<SecretString> {
        self.get_required(key)
            .map(|value| SecretString::from(value.clone()))
    }

    /// Retrieve an unsigned 32-bit value with a default fallback.
    pub fn get_u32_with_default(&self, key: &str, default: u32) -> WalletResult<u32> {
        assert!(!key.is_empty(), "configuration key must not be empty");
        match self.config_map.get(key) {
            Some(value) => parse_u32_value(value, key),
            None => Ok(default),
        }
    }

    /// Set a configuration value (for testing purposes)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config_map.insert(key.into(), value.into());
    }

    /// Check if we're in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if we're in development mode
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Get the current environment
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// `log` filter derived from `LOG_LEVEL`; unknown values fall back to `info`.
    pub fn log_level(&self) -> log::LevelFilter {
        self.get(KEY_LOG_LEVEL)
            .and_then(|level| level.parse().ok())
            .unwrap_or(log::LevelFilter::Info)
    }

    /// Validate that all required settings are present and sane for the environment
    pub fn validate_required_configs(&self) -> WalletResult<()> {
        let required_keys = [
            KEY_LOG_LEVEL,
            KEY_API_SERVER_URL,
            KEY_CRYPTO_SERVER_URL,
            KEY_CRYPTO_SERVER_BASE_PATH,
            KEY_AUTH_USERNAME,
            KEY_AUTH_PASSWORD,
            KEY_KEYCHAIN_PASSPHRASE,
        ];

        for key in required_keys {
            if !self.config_map.contains_key(key) {
                return Err(WalletError::ValidationError(format!(
                    "Required configuration key '{}' is missing for {} environment",
                    key,
                    self.environment.as_str()
                )));
            }
        }

        if self.is_production() {
            for key in [KEY_API_SERVER_URL, KEY_CRYPTO_SERVER_URL] {
                let url = self.get_required(key)?;
                if !url.starts_with("https://") {
                    return Err(WalletError::ValidationError(format!(
                        "Configuration key '{}' must use https in production",
                        key
                    )));
                }
            }
            if self.get_required(KEY_KEYCHAIN_PASSPHRASE)? == DEVELOPMENT_PASSPHRASE {
                return Err(WalletError::ValidationError(
                    "Production keychain passphrase must be overridden".to_string(),
                ));
            }
        }

        self.get_u32_with_default(KEY_REQUEST_TIMEOUT_SECS, 30)?;
        self.get_u32_with_default(KEY_PIN_MAX_FAILED_ATTEMPTS, 5)?;
        self.get_u32_with_default(KEY_PIN_UNLOCK_MINUTES, 5)?;

        Ok(())
    }

    /// Load default configuration values
    fn load_defaults(&mut self) {
        // Defaults shared across environments
        self.config_map.insert(
            KEY_CRYPTO_SERVER_BASE_PATH.to_string(),
            DEFAULT_BASE_PATH.to_string(),
        );
        self.config_map
            .insert(KEY_REQUEST_TIMEOUT_SECS.to_string(), "30".to_string());

        match self.environment {
            Environment::Production => {
                // Server endpoints and credentials must come from the environment.
                self.config_map
                    .insert(KEY_LOG_LEVEL.to_string(), "INFO".to_string());
                self.config_map
                    .insert(KEY_PIN_MAX_FAILED_ATTEMPTS.to_string(), "5".to_string());
                self.config_map
                    .insert(KEY_PIN_UNLOCK_MINUTES.to_string(), "5".to_string());
            }
            Environment::Development => {
                self.config_map
                    .insert(KEY_LOG_LEVEL.to_string(), "DEBUG".to_string());
                self.config_map
                    .insert(KEY_PIN_MAX_FAILED_ATTEMPTS.to_string(), "10".to_string());
                self.config_map
                    .insert(KEY_PIN_UNLOCK_MINUTES.to_string(), "30".to_string());
                self.config_map.insert(
                    KEY_API_SERVER_URL.to_string(),
                    "http://localhost:8080".to_string(),
                );
                self.config_map.insert(
                    KEY_CRYPTO_SERVER_URL.to_string(),
                    "http://localhost:8081".to_string(),
                );
                self.config_map
                    .insert(KEY_AUTH_USERNAME.to_string(), "wallet-dev".to_string());
                self.config_map
                    .insert(KEY_AUTH_PASSWORD.to_string(), "wallet-dev".to_string());
                self.config_map.insert(
                    KEY_KEYCHAIN_PASSPHRASE.to_string(),
                    DEVELOPMENT_PASSPHRASE.to_string(),
                );
            }
            Environment::Test => {
                self.config_map
                    .insert(KEY_LOG_LEVEL.to_string(), "WARN".to_string());
                self.config_map
                    .insert(KEY_PIN_MAX_FAILED_ATTEMPTS.to_string(), "3".to_string());
                self.config_map
                    .insert(KEY_PIN_UNLOCK_MINUTES.to_string(), "1".to_string());
                self.config_map.insert(
                    KEY_API_SERVER_URL.to_string(),
                    "http://127.0.0.1:18080".to_string(),
                );
                self.config_map.insert(
                    KEY_CRYPTO_SERVER_URL.to_string(),
                    "http://127.0.0.1:18081".to_string(),
                );
                self.config_map
                    .insert(KEY_AUTH_USERNAME.to_string(), "wallet-test".to_string());
                self.config_map
                    .insert(KEY_AUTH_PASSWORD.to_string(), "wallet-test".to_string());
                self.config_map.insert(
                    KEY_KEYCHAIN_PASSPHRASE.to_string(),
                    DEVELOPMENT_PASSPHRASE.to_string(),
                );
            }
        }
    }

    /// Load configuration from environment variables
    fn load_from_env_vars(&mut self) -> WalletResult<()> {
        // Define environment variable mappings
        let env_mappings = [
            ("GRAPHEREX_LOG_LEVEL", KEY_LOG_LEVEL),
            ("GRAPHEREX_API_SERVER_URL", KEY_API_SERVER_URL),
            ("GRAPHEREX_CRYPTO_SERVER_URL", KEY_CRYPTO_SERVER_URL),
            ("GRAPHEREX_CRYPTO_BASE_PATH", KEY_CRYPTO_SERVER_BASE_PATH),
            ("GRAPHEREX_AUTH_USERNAME", KEY_AUTH_USERNAME),
            ("GRAPHEREX_AUTH_PASSWORD", KEY_AUTH_PASSWORD),
            ("GRAPHEREX_REQUEST_TIMEOUT", KEY_REQUEST_TIMEOUT_SECS),
            ("GRAPHEREX_PIN_MAX_FAILED_ATTEMPTS", KEY_PIN_MAX_FAILED_ATTEMPTS),
            ("GRAPHEREX_PIN_UNLOCK_MINUTES", KEY_PIN_UNLOCK_MINUTES),
            ("GRAPHEREX_KEYCHAIN_PASSPHRASE", KEY_KEYCHAIN_PASSPHRASE),
        ];

        for (env_var, config_key) in &env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                // Validate that the value is not empty and doesn't contain suspicious content
                if value.trim().is_empty() {
                    log::warn!("Environment variable {} is empty", env_var);
                    continue;
                }

                // Basic security check - no newlines or control characters
                if value.chars().any(|c| c.is_control()) {
                    log::warn!(
                        "Environment variable {} contains control characters, ignoring",
                        env_var
                    );
                    continue;
                }

                self.config_map.insert(config_key.to_string(), value);
                log::debug!(
                    "Loaded configuration {} from environment variable {}",
                    config_key,
                    env_var
                );
            }
        }

        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new(Environment::Development)
    }
}

fn parse_u32_value(value: &str, key: &str) -> WalletResult<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalletError::ValidationError(format!(
            "Configuration key '{}' cannot be empty",
            key
        )));
    }

    trimmed.parse::<u32>().map_err(|_| {
        WalletError::ValidationError(format!(
            "Invalid numeric value '{}' for key '{}'",
            value, key
        ))
    })
}

/// Global security configuration instance
static SECURITY_CONFIG: OnceCell<SecurityConfig> = OnceCell::new();

fn init_security_config_internal(
    environment: Option<Environment>,
) -> WalletResult<&'static SecurityConfig> {
    SECURITY_CONFIG.get_or_try_init(|| {
        let config = match environment {
            Some(explicit) => SecurityConfig::from_environment(explicit)?,
            None => SecurityConfig::from_env()?,
        };

        config.validate_required_configs()?;
        log::info!(
            "Security configuration initialized for {:?} environment",
            config.environment
        );
        Ok(config)
    })
}

/// Initialize security configuration for a specific environment.
pub fn init_security_config(environment: Environment) -> WalletResult<&'static SecurityConfig> {
    init_security_config_internal(Some(environment))
}

/// Initialize security configuration using the environment selection logic.
pub fn init_security_config_from_env() -> WalletResult<&'static SecurityConfig> {
    init_security_config_internal(None)
}

/// Get global security configuration
pub fn get_security_config() -> WalletResult<&'static SecurityConfig> {
    SECURITY_CONFIG.get().ok_or(WalletError::NotInitialized)
}
