use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Wallet backend errors
    NetworkConnection,
    UnableToProcessServerResponse,
    TokenExpired,
    RequestConstruction(String),
    ServerError { status: u16, message: Option<String> },

    // Transport errors
    NetworkError(String),
    ConnectionTimeout,

    // Local credentials
    NoWalletCredentialsFound,

    // Storage errors
    StorageError(String),
    FileNotFound(String),
    PermissionDenied(String),

    // Cryptographic errors
    CryptoError(String),

    // Validation errors
    ValidationError(String),
    InvalidAddress(String),
    InvalidAmount(String),

    // Application errors
    NotInitialized,
    NoWalletConfiguration,
    NotFound(String),

    // Generic errors
    Unknown(String),
}

impl WalletError {
    /// The backend rejected the bearer token (HTTP 401).
    pub fn is_token_expired(&self) -> bool {
        matches!(self, WalletError::TokenExpired)
    }

    /// Failures that mean the device could not talk to the backend at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            WalletError::NetworkConnection
                | WalletError::NetworkError(_)
                | WalletError::ConnectionTimeout
        )
    }

    /// Text suitable for an alert: the server's own message for business-rule failures,
    /// the generic description otherwise.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::ServerError {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::NetworkConnection => {
                write!(f, "Network error. Please check your Internet connection")
            }
            WalletError::UnableToProcessServerResponse => {
                write!(f, "Unable to process server response error")
            }
            WalletError::TokenExpired => write!(f, "Access token expired error"),
            WalletError::RequestConstruction(msg) => {
                write!(f, "Request construction error: {}", msg)
            }
            WalletError::ServerError { status, message } => match message {
                Some(message) => write!(f, "Server error {}: {}", status, message),
                None => write!(f, "Server error {}", status),
            },

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),

            WalletError::NoWalletCredentialsFound => write!(f, "Wallet credentials not found"),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            WalletError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),

            WalletError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),

            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::NotInitialized => write!(f, "Wallet not initialized"),
            WalletError::NoWalletConfiguration => write!(f, "No wallet configuration found"),
            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),

            WalletError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! wallet_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::WalletError::$variant($msg.to_string())
    };
    ($variant:ident) => {
        $crate::errors::WalletError::$variant
    };
}

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::FileNotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                WalletError::PermissionDenied(error.to_string())
            }
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::ValidationError(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            WalletError::ConnectionTimeout
        } else if error.is_builder() {
            WalletError::RequestConstruction(error.to_string())
        } else if error.is_decode() {
            WalletError::UnableToProcessServerResponse
        } else {
            WalletError::NetworkError(error.to_string())
        }
    }
}
