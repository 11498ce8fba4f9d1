// lib.rs - Grapherex wallet client library

pub mod amount;
pub mod api;
pub mod app_state;
pub mod auth;
pub mod config_store;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod network;
pub mod pin_lock;
pub mod security;
pub mod storage;
pub mod validation;

// Re-export common types
pub use amount::Amount;
pub use api::{ApiService, SendRequest, TransactionQuery};
pub use app_state::{WalletContext, WalletServices};
pub use auth::{AuthenticationManager, AuthenticationService, HttpAuthenticationService};
pub use config_store::{AuthConfig, ConfigStore, NetworkConfig, PinLockConfig, WalletConfig};
pub use credentials::{CredentialsEvent, CredentialsManager};
pub use errors::{WalletError, WalletResult};
pub use models::{
    AuthToken, CredentialType, Currency, Fee, FeeType, RecipientWallet, Transaction,
    TransactionDirection, Wallet, WalletCredentials, WalletResponse,
};
pub use network::{
    ConnectivityFlag, ConnectivityMonitor, HttpMethod, HttpNetworkService, NetworkRequest,
    NetworkService,
};
pub use pin_lock::PinLockManager;
pub use security::{Environment, SecurityConfig};
pub use validation::InputValidator;
