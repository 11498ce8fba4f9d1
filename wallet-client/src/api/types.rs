//! Wire shapes of the wallet backend responses.
//!
//! Every field is optional so that a missing or renamed key never aborts deserialization;
//! what is actually required is decided in one place, `api::decode`. List payloads are kept
//! as raw values so one malformed row cannot take the rest of the list down with it.

use serde::Deserialize;
use serde_json::{Number, Value};

/// One row of `GET {base}currencies`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrencyRecord {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub icon: Option<String>,
    pub rate: Option<String>,
    /// Decimal precision, sent as a string.
    pub denominator: Option<String>,
    pub path: Option<String>,
    pub rate_symbol: Option<String>,
    pub base_fee: Option<String>,
}

/// Envelope of `GET {base}wallets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletListRecord {
    pub wallets: Option<Vec<Value>>,
    pub fiat_currency: Option<String>,
    pub fiat_total_balance_formatted: Option<String>,
}

/// One entry of `WalletListRecord::wallets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletRecord {
    pub id: Option<String>,
    pub currency: Option<String>,
    pub address: Option<String>,
    pub need_password: Option<bool>,
    pub created_at: Option<Number>,
    pub balance_formatted: Option<String>,
    pub fiat_balance_formatted: Option<String>,
    pub fiat_currency: Option<String>,
}

/// `GET {base}{path}/wallet/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletInfoRecord {
    pub need_password: Option<bool>,
    pub created_at: Option<Number>,
    pub balance_formatted: Option<String>,
    pub fiat_balance_formatted: Option<String>,
    pub fiat_currency: Option<String>,
}

/// `POST {base}{path}/wallet`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedWalletRecord {
    pub address: Option<String>,
}

/// `POST {base}{path}/wallet/{id}/send`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SentTransactionRecord {
    pub transaction_hash: Option<String>,
}

/// One row of `GET {base}wallets/{id}/transactions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRecord {
    pub id: Option<String>,
    pub hash: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<String>,
    pub direction: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub created_at: Option<Number>,
}

/// `GET {base}{path}/base_fee`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeeRecord {
    pub formatted: Option<String>,
}

/// Envelope of `GET {base}wallets/accounts/{accountId}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientListRecord {
    pub wallets: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientWalletRecord {
    pub id: Option<String>,
    pub currency: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<Number>,
}

/// `GET /v1/wallet/token`. No `Debug`: the token must not end up in logs.
#[derive(Clone, Default, Deserialize)]
pub struct TokenRecord {
    pub token: Option<String>,
}
