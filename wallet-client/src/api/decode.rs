//! The one place that decides what a usable backend record is.
//!
//! Policy: a record missing a required field, carrying a mistyped field, or referring to an
//! unknown currency is invalid. List endpoints drop invalid rows and keep the rest; single
//! entity endpoints fail the whole call with `UnableToProcessServerResponse`. Either way the
//! reason is logged at `debug`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use super::types::{
    CurrencyRecord, RecipientWalletRecord, TokenRecord, TransactionRecord, WalletInfoRecord,
    WalletRecord,
};
use crate::errors::{WalletError, WalletResult};
use crate::models::{
    AuthToken, Currency, RecipientWallet, Transaction, TransactionDirection, Wallet,
};

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub fn require<T>(value: Option<T>, field: &str) -> DecodeResult<T> {
    value.ok_or_else(|| DecodeError(format!("missing field `{}`", field)))
}

/// Seconds since the epoch; integral floats are accepted, fractional ones are not.
pub fn timestamp(value: Option<Number>, field: &str) -> DecodeResult<i64> {
    let number = require(value, field)?;
    if let Some(seconds) = number.as_i64() {
        return Ok(seconds);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(DecodeError(format!("field `{}` is not an integer", field))),
    }
}

/// Decimal precision from the string `denominator` field.
pub fn decimal_digits(value: Option<String>) -> DecodeResult<u32> {
    let raw = require(value, "denominator")?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| DecodeError(format!("denominator `{}` is not numeric", raw)))
}

pub fn find_currency(currencies: &[Currency], symbol: &str) -> DecodeResult<Currency> {
    currencies
        .iter()
        .find(|c| c.symbol == symbol)
        .cloned()
        .ok_or_else(|| DecodeError(format!("unknown currency `{}`", symbol)))
}

/// Deserialize a single-entity payload and convert it, failing the call on any problem.
pub fn decode_entity<R, T, F>(value: Value, what: &str, convert: F) -> WalletResult<T>
where
    R: DeserializeOwned,
    F: FnOnce(R) -> DecodeResult<T>,
{
    let result = serde_json::from_value::<R>(value)
        .map_err(|e| DecodeError(e.to_string()))
        .and_then(convert);
    result.map_err(|e| {
        log::debug!("Rejecting {} response: {}", what, e);
        WalletError::UnableToProcessServerResponse
    })
}

/// Deserialize and convert each row, dropping the ones that do not pass.
pub fn decode_rows<R, T, F>(rows: Vec<Value>, what: &str, mut convert: F) -> Vec<T>
where
    R: DeserializeOwned,
    F: FnMut(R) -> DecodeResult<T>,
{
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let result = serde_json::from_value::<R>(row)
                .map_err(|e| DecodeError(e.to_string()))
                .and_then(&mut convert);
            match result {
                Ok(item) => Some(item),
                Err(e) => {
                    log::debug!("Dropping {} row {}: {}", what, index, e);
                    None
                }
            }
        })
        .collect();
    if decoded.len() != total {
        log::debug!("Kept {} of {} {} rows", decoded.len(), total, what);
    }
    decoded
}

/// A payload that must be a JSON array at the top level.
pub fn expect_array(value: Value, what: &str) -> WalletResult<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        other => {
            log::debug!("Expected a list for {}, got {}", what, kind(&other));
            Err(WalletError::UnableToProcessServerResponse)
        }
    }
}

pub fn currency(record: CurrencyRecord) -> DecodeResult<Currency> {
    Ok(Currency {
        name: require(record.name, "name")?,
        symbol: require(record.symbol, "symbol")?,
        icon: require(record.icon, "icon")?,
        rate: require(record.rate, "rate")?,
        decimal_digits: decimal_digits(record.denominator)?,
        path: require(record.path, "path")?,
        rate_symbol: require(record.rate_symbol, "rate_symbol")?,
        base_fee: require(record.base_fee, "base_fee")?,
    })
}

/// A wallet list row. Credentials are attached afterwards, never taken from the server.
pub fn wallet(record: WalletRecord, currencies: &[Currency]) -> DecodeResult<Wallet> {
    let need_password = require(record.need_password, "need_password")?;
    let created_at = timestamp(record.created_at, "created_at")?;
    let id = require(record.id, "id")?;
    let currency = find_currency(currencies, &require(record.currency, "currency")?)?;
    Ok(Wallet {
        id,
        currency,
        address: require(record.address, "address")?,
        balance: require(record.balance_formatted, "balance_formatted")?,
        fiat_balance: require(record.fiat_balance_formatted, "fiat_balance_formatted")?,
        fiat_currency: require(record.fiat_currency, "fiat_currency")?,
        need_password,
        created_at,
        credentials: None,
    })
}

/// Refresh of a known wallet: currency and address come from `stale`, credentials are
/// attached afterwards.
pub fn wallet_info(record: WalletInfoRecord, stale: &Wallet) -> DecodeResult<Wallet> {
    Ok(Wallet {
        id: stale.id.clone(),
        currency: stale.currency.clone(),
        address: stale.address.clone(),
        created_at: timestamp(record.created_at, "created_at")?,
        need_password: require(record.need_password, "need_password")?,
        balance: require(record.balance_formatted, "balance_formatted")?,
        fiat_balance: require(record.fiat_balance_formatted, "fiat_balance_formatted")?,
        fiat_currency: require(record.fiat_currency, "fiat_currency")?,
        credentials: None,
    })
}

pub fn transaction(record: TransactionRecord, currencies: &[Currency]) -> DecodeResult<Transaction> {
    let direction_name = require(record.direction, "direction")?;
    let direction = TransactionDirection::from_name(&direction_name)
        .ok_or_else(|| DecodeError(format!("unknown direction `{}`", direction_name)))?;
    Ok(Transaction {
        id: require(record.id, "id")?,
        hash: require(record.hash, "hash")?,
        currency: find_currency(currencies, &require(record.currency, "currency")?)?,
        amount: require(record.amount, "amount")?,
        direction,
        sender: require(record.sender, "sender")?,
        recipient: require(record.recipient, "recipient")?,
        created_at: timestamp(record.created_at, "created_at")?,
    })
}

pub fn recipient_wallet(
    record: RecipientWalletRecord,
    currencies: &[Currency],
) -> DecodeResult<RecipientWallet> {
    Ok(RecipientWallet {
        id: require(record.id, "id")?,
        address: require(record.address, "address")?,
        currency: find_currency(currencies, &require(record.currency, "currency")?)?,
        created_at: timestamp(record.created_at, "created_at")?,
    })
}

pub fn token(record: TokenRecord) -> DecodeResult<AuthToken> {
    let token = require(record.token, "token")?;
    if token.is_empty() {
        return Err(DecodeError("field `token` is empty".to_string()));
    }
    Ok(AuthToken::new(token))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn btc() -> Currency {
        Currency {
            name: "Bitcoin".into(),
            symbol: "BTC".into(),
            icon: "https://cdn/btc.png".into(),
            rate: "27000.00".into(),
            path: "btc".into(),
            rate_symbol: "$".into(),
            decimal_digits: 8,
            base_fee: "0.0001".into(),
        }
    }

    fn currency_row(denominator: Value) -> Value {
        json!({
            "name": "Bitcoin", "symbol": "BTC", "icon": "i", "rate": "1",
            "denominator": denominator, "path": "btc", "rate_symbol": "$", "base_fee": "0.1"
        })
    }

    #[test]
    fn non_numeric_denominator_drops_currency() {
        let rows = vec![
            currency_row(json!("8")),
            currency_row(json!("eight")),
            currency_row(json!(8)),
            currency_row(json!("-2")),
        ];
        let currencies = decode_rows(rows, "currency", currency);
        assert_eq!(currencies.len(), 1);
        assert_eq!(currencies[0].decimal_digits, 8);
    }

    #[test]
    fn timestamps_accept_integral_numbers_only() {
        assert_eq!(timestamp(Some(Number::from(1_600_000_000)), "t"), Ok(1_600_000_000));
        assert_eq!(
            timestamp(Number::from_f64(1_600_000_000.0), "t"),
            Ok(1_600_000_000)
        );
        assert!(timestamp(Number::from_f64(1.5), "t").is_err());
        assert!(timestamp(None, "t").is_err());
    }

    #[test]
    fn wallet_rows_need_known_currency() {
        let row = json!({
            "id": "W1", "currency": "BTC", "address": "bc1q", "need_password": false,
            "created_at": 1, "balance_formatted": "0.5", "fiat_balance_formatted": "13500",
            "fiat_currency": "USD"
        });
        let mut unknown = row.clone();
        unknown["currency"] = json!("DOGE");
        let mut mistyped = row.clone();
        mistyped["need_password"] = json!("no");

        let wallets = decode_rows(vec![row, unknown, mistyped], "wallet", |r| {
            wallet(r, &[btc()])
        });
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].currency, btc());
        assert!(wallets[0].credentials.is_none());
    }

    #[test]
    fn unknown_direction_drops_transaction() {
        let row = |direction: &str| {
            json!({
                "id": "T1", "hash": "0xh", "currency": "BTC", "amount": "1",
                "direction": direction, "sender": "a", "recipient": "b", "created_at": 5
            })
        };
        let txs = decode_rows(vec![row("in"), row("sideways"), row("out")], "tx", |r| {
            transaction(r, &[btc()])
        });
        let directions: Vec<_> = txs.iter().map(|t| t.direction).collect();
        assert_eq!(
            directions,
            vec![TransactionDirection::In, TransactionDirection::Out]
        );
    }

    #[test]
    fn single_entity_failure_is_generic() {
        let result = decode_entity(json!({"token": 42}), "token", token);
        assert!(matches!(result, Err(WalletError::UnableToProcessServerResponse)));
        let result = decode_entity(json!({"token": ""}), "token", token);
        assert!(result.is_err());
        let ok = decode_entity(json!({"token": "abc"}), "token", token).unwrap();
        assert_eq!(ok.as_str(), "abc");
    }

    #[test]
    fn top_level_shape_is_checked() {
        assert!(expect_array(json!([1, 2]), "list").is_ok());
        assert!(matches!(
            expect_array(json!({"wallets": []}), "list"),
            Err(WalletError::UnableToProcessServerResponse)
        ));
    }
}
