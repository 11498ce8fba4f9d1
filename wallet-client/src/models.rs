//! Domain entities handed out by the wallet façade.
//!
//! Everything here is rebuilt from fresh server data on each fetch; nothing is mutated in
//! place except the credentials attachment performed by the credentials manager.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub type WalletId = String;

/// Name the backend uses for the one currency with gas-based fees.
const ETHEREUM_NAME: &str = "ethereum";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub symbol: String,
    pub icon: String,
    /// Exchange rate, kept as the server's decimal string.
    pub rate: String,
    /// Path segment used in per-currency endpoints (e.g. `eth`, `btc`).
    pub path: String,
    pub rate_symbol: String,
    pub decimal_digits: u32,
    pub base_fee: String,
}

impl Currency {
    pub fn is_ethereum(&self) -> bool {
        self.name.eq_ignore_ascii_case(ETHEREUM_NAME)
    }
}

/// Locally held, never-sent-to-server customisation of a wallet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCredentials {
    pub id: WalletId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

impl WalletCredentials {
    pub fn new(id: impl Into<WalletId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            pin: None,
            is_hidden: false,
        }
    }

    /// Copy with one field replaced.
    pub fn with_value(&self, credential_type: CredentialType, value: Option<String>) -> Self {
        let mut updated = self.clone();
        match credential_type {
            CredentialType::Name => updated.name = value,
            CredentialType::Pin => updated.pin = value,
        }
        updated
    }

    pub fn with_hidden(&self, is_hidden: bool) -> Self {
        let mut updated = self.clone();
        updated.is_hidden = is_hidden;
        updated
    }

    /// No field carries information any more, so the record can be dropped.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.pin.is_none() && !self.is_hidden
    }
}

impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("is_hidden", &self.is_hidden)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    Name,
    Pin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    pub id: WalletId,
    pub currency: Currency,
    pub balance: String,
    pub fiat_balance: String,
    pub fiat_currency: String,
    pub address: String,
    pub need_password: bool,
    pub created_at: i64,
    pub credentials: Option<WalletCredentials>,
}

impl Wallet {
    /// Local name when the user set one, otherwise the currency name.
    pub fn display_name(&self) -> &str {
        self.credentials
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .unwrap_or(&self.currency.name)
    }

    pub fn is_hidden(&self) -> bool {
        self.credentials.as_ref().map(|c| c.is_hidden).unwrap_or(false)
    }

    pub fn has_pin(&self) -> bool {
        self.credentials
            .as_ref()
            .map(|c| c.pin.is_some())
            .unwrap_or(false)
    }

    pub fn balance_value(&self) -> f64 {
        parse_formatted(&self.balance)
    }

    pub fn fiat_balance_value(&self) -> f64 {
        parse_formatted(&self.fiat_balance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletResponse {
    pub fiat_total_balance: String,
    pub fiat_currency: String,
    pub wallets: Vec<Wallet>,
}

/// Another account's wallet that can receive a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientWallet {
    pub id: String,
    pub currency: Currency,
    pub address: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    In,
    Out,
}

impl TransactionDirection {
    pub const ALL: [TransactionDirection; 2] = [TransactionDirection::In, TransactionDirection::Out];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::In => "in",
            TransactionDirection::Out => "out",
        }
    }

    /// Exact wire-name lookup; anything else is rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: String,
    pub hash: String,
    pub currency: Currency,
    pub amount: String,
    pub direction: TransactionDirection,
    pub sender: String,
    pub recipient: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fee {
    pub formatted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeType {
    Personal,
    Default,
}

impl FeeType {
    pub fn info_message(&self) -> &'static str {
        match self {
            FeeType::Personal => {
                "Warning! Personal commission mode is only for experienced users!"
            }
            FeeType::Default => {
                "The miner fee applies to all transaction sent on the network, and is not paid to Grapherex"
            }
        }
    }
}

/// Opaque bearer token for the wallet backend. The server alone decides its validity.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

fn parse_formatted(value: &str) -> f64 {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn currency(name: &str) -> Currency {
        Currency {
            name: name.to_string(),
            symbol: "ETH".to_string(),
            icon: String::new(),
            rate: "1800.00".to_string(),
            path: "eth".to_string(),
            rate_symbol: "$".to_string(),
            decimal_digits: 18,
            base_fee: "0.0001".to_string(),
        }
    }

    #[test]
    fn ethereum_detection_ignores_case() {
        assert!(currency("Ethereum").is_ethereum());
        assert!(currency("ETHEREUM").is_ethereum());
        assert!(!currency("Bitcoin").is_ethereum());
    }

    #[test]
    fn direction_lookup_fails_closed() {
        assert_eq!(TransactionDirection::from_name("in"), Some(TransactionDirection::In));
        assert_eq!(TransactionDirection::from_name("out"), Some(TransactionDirection::Out));
        assert_eq!(TransactionDirection::from_name("IN"), None);
        assert_eq!(TransactionDirection::from_name("sideways"), None);
    }

    #[test]
    fn credentials_copy_on_write_preserves_other_fields() {
        let original = WalletCredentials {
            id: "W1".to_string(),
            name: Some("Savings".to_string()),
            pin: None,
            is_hidden: true,
        };
        let updated = original.with_value(CredentialType::Pin, Some("1234".to_string()));
        assert_eq!(updated.pin.as_deref(), Some("1234"));
        assert_eq!(updated.name.as_deref(), Some("Savings"));
        assert!(updated.is_hidden);
        assert_eq!(original.pin, None);
    }

    #[test]
    fn credentials_debug_redacts_pin() {
        let creds = WalletCredentials::new("W1").with_value(CredentialType::Pin, Some("9876".into()));
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("9876"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn credentials_json_uses_legacy_field_names() {
        let json = r#"{"id":"W1","name":null,"pin":"1111","isHidden":true}"#;
        let creds: WalletCredentials = serde_json::from_str(json).unwrap();
        assert!(creds.is_hidden);
        assert_eq!(creds.pin.as_deref(), Some("1111"));
    }

    #[test]
    fn wallet_accessors() {
        let wallet = Wallet {
            id: "W1".to_string(),
            currency: currency("Ethereum"),
            balance: "1,250.5".to_string(),
            fiat_balance: "n/a".to_string(),
            fiat_currency: "USD".to_string(),
            address: "0xabc".to_string(),
            need_password: false,
            created_at: 1_600_000_000,
            credentials: None,
        };
        assert_eq!(wallet.display_name(), "Ethereum");
        assert!(!wallet.is_hidden());
        assert_eq!(wallet.balance_value(), 1250.5);
        assert_eq!(wallet.fiat_balance_value(), 0.0);
    }

    #[test]
    fn auth_token_debug_is_redacted() {
        let token = AuthToken::new("secret-bearer");
        assert!(!format!("{:?}", token).contains("secret-bearer"));
        assert_eq!(token.as_str(), "secret-bearer");
    }
}
