pub mod credentials_store;
pub mod keychain;
pub mod paths;
pub mod token_store;

pub use credentials_store::{
    CredentialsStorage, KeychainCredentialsStorage, CREDENTIALS_SERVICE,
    LEGACY_CREDENTIALS_KEY, LEGACY_CREDENTIALS_SERVICE,
};
pub use keychain::{FileKeychain, KdfParameters, MemoryKeychain, SecureStorage};
pub use paths::WalletPaths;
pub use token_store::{AuthTokenStorage, KeychainAuthTokenStorage, AUTH_TOKEN_SERVICE};
