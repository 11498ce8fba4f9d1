use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use super::decode;
use super::types::{
    CreatedWalletRecord, CurrencyRecord, FeeRecord, RecipientListRecord, RecipientWalletRecord,
    SentTransactionRecord, TransactionRecord, WalletInfoRecord, WalletListRecord, WalletRecord,
};
use crate::amount::Amount;
use crate::auth::AuthenticationManager;
use crate::config_store::NetworkConfig;
use crate::credentials::CredentialsManager;
use crate::errors::{WalletError, WalletResult};
use crate::models::{
    Currency, Fee, RecipientWallet, Transaction, TransactionDirection, Wallet, WalletResponse,
};
use crate::network::{ConnectivityMonitor, HttpMethod, NetworkRequest, NetworkService};
use crate::validation::InputValidator;

pub const DEFAULT_TRANSACTION_PAGE: u32 = 20;

/// Everything needed to move funds out of a wallet.
pub struct SendRequest {
    /// Server-side wallet password.
    pub password: SecretString,
    pub destination: String,
    pub amount: String,
    /// Flat fee; used for every currency except Ethereum.
    pub fee: Option<String>,
    /// Ethereum only; sent together with `custom_gas_limit` or not at all.
    pub custom_gas_price: Option<String>,
    pub custom_gas_limit: Option<u64>,
}

impl SendRequest {
    pub fn new(
        password: SecretString,
        destination: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            password,
            destination: destination.into(),
            amount: amount.into(),
            fee: None,
            custom_gas_price: None,
            custom_gas_limit: None,
        }
    }

    pub fn with_fee(mut self, fee: impl Into<String>) -> Self {
        self.fee = Some(fee.into());
        self
    }

    pub fn with_gas(mut self, price: impl Into<String>, limit: u64) -> Self {
        self.custom_gas_price = Some(price.into());
        self.custom_gas_limit = Some(limit);
        self
    }
}

/// One page of a wallet's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub limit: u32,
    pub offset: u32,
    pub direction: Option<TransactionDirection>,
    pub sort_by: Option<String>,
    pub ascending: bool,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TRANSACTION_PAGE,
            offset: 0,
            direction: None,
            sort_by: None,
            ascending: false,
        }
    }
}

/// The wallet backend as the rest of the app sees it.
///
/// Each operation builds one request and hands it to `execute`, which attaches the token,
/// retries exactly once after a token rejection, and turns failures into "offline" when the
/// backend cannot be reached.
pub struct ApiService {
    network: Arc<dyn NetworkService>,
    auth: Arc<AuthenticationManager>,
    credentials: Arc<CredentialsManager>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    validator: InputValidator,
    base_path: String,
    crypto_host: String,
}

impl ApiService {
    pub fn new(
        config: &NetworkConfig,
        network: Arc<dyn NetworkService>,
        auth: Arc<AuthenticationManager>,
        credentials: Arc<CredentialsManager>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> WalletResult<Self> {
        Ok(Self {
            network,
            auth,
            credentials,
            connectivity,
            validator: InputValidator::new()?,
            base_path: config.base_path(),
            crypto_host: config.crypto_server_url.clone(),
        })
    }

    /// Currencies first, then the wallets joined against them.
    pub async fn init_wallets(&self) -> WalletResult<(WalletResponse, Vec<Currency>)> {
        let currencies = self.get_currencies().await?;
        let wallets = self.get_wallets(&currencies).await?;
        Ok((wallets, currencies))
    }

    pub async fn get_currencies(&self) -> WalletResult<Vec<Currency>> {
        let request = self.request(format!("{}currencies", self.base_path), HttpMethod::Get);
        let response = self.execute(request).await?;
        let rows = decode::expect_array(response, "currencies")?;
        Ok(decode::decode_rows::<CurrencyRecord, _, _>(
            rows,
            "currency",
            decode::currency,
        ))
    }

    pub async fn get_wallets(&self, currencies: &[Currency]) -> WalletResult<WalletResponse> {
        let request = self.request(format!("{}wallets", self.base_path), HttpMethod::Get);
        let response = self.execute(request).await?;
        let (rows, fiat_currency, fiat_total_balance) =
            decode::decode_entity::<WalletListRecord, _, _>(response, "wallets", |record| {
                Ok((
                    decode::require(record.wallets, "wallets")?,
                    decode::require(record.fiat_currency, "fiat_currency")?,
                    decode::require(
                        record.fiat_total_balance_formatted,
                        "fiat_total_balance_formatted",
                    )?,
                ))
            })?;

        let mut wallets = decode::decode_rows::<WalletRecord, _, _>(rows, "wallet", |record| {
            decode::wallet(record, currencies)
        });
        self.credentials.attach_credentials(&mut wallets);

        Ok(WalletResponse {
            fiat_total_balance,
            fiat_currency,
            wallets,
        })
    }

    /// Fresh balances for `wallet`; its currency and address are kept as they are.
    pub async fn get_wallet_info(&self, wallet: &Wallet) -> WalletResult<Wallet> {
        self.validator.validate_wallet_id(&wallet.id)?;
        let request = self.request(
            format!("{}{}/wallet/{}", self.base_path, wallet.currency.path, wallet.id),
            HttpMethod::Get,
        );
        let response = self.execute(request).await?;
        let mut refreshed = decode::decode_entity::<WalletInfoRecord, _, _>(
            response,
            "wallet info",
            |record| decode::wallet_info(record, wallet),
        )?;
        refreshed.credentials = self.credentials.credentials_for(&refreshed.id);
        Ok(refreshed)
    }

    /// Returns the new wallet's address.
    pub async fn create_wallet(
        &self,
        currency: &Currency,
        password: &SecretString,
    ) -> WalletResult<String> {
        self.validator.validate_password(password.expose_secret())?;
        let request = self
            .request(
                format!("{}{}/wallet", self.base_path, currency.path),
                HttpMethod::Post,
            )
            .with_parameter("password", password.expose_secret());
        let response = self.execute(request).await?;
        decode::decode_entity::<CreatedWalletRecord, _, _>(response, "created wallet", |record| {
            decode::require(record.address, "address")
        })
    }

    /// Returns the transaction hash.
    pub async fn send_currency(&self, wallet: &Wallet, send: &SendRequest) -> WalletResult<String> {
        self.validator.validate_wallet_id(&wallet.id)?;
        let parameters = self.send_parameters(&wallet.currency, send)?;
        let request = self
            .request(
                format!(
                    "{}{}/wallet/{}/send",
                    self.base_path, wallet.currency.path, wallet.id
                ),
                HttpMethod::Post,
            )
            .with_parameters(parameters);
        let response = self.execute(request).await?;
        let hash = decode::decode_entity::<SentTransactionRecord, _, _>(
            response,
            "send",
            |record| decode::require(record.transaction_hash, "transaction_hash"),
        )?;
        log::info!("Sent {} {} from wallet {}", send.amount, wallet.currency.symbol, wallet.id);
        Ok(hash)
    }

    pub async fn get_transactions(
        &self,
        wallet: &Wallet,
        currencies: &[Currency],
        query: &TransactionQuery,
    ) -> WalletResult<Vec<Transaction>> {
        self.validator.validate_wallet_id(&wallet.id)?;
        let mut request = self
            .request(
                format!("{}wallets/{}/transactions", self.base_path, wallet.id),
                HttpMethod::Get,
            )
            .with_parameter("limit", query.limit)
            .with_parameter("offset", query.offset)
            .with_parameter("ascending", query.ascending);
        if let Some(sort_by) = &query.sort_by {
            request = request.with_parameter("sort_by", sort_by.as_str());
        }
        if let Some(direction) = query.direction {
            request = request.with_parameter("tx_direction", direction.as_str());
        }

        let response = self.execute(request).await?;
        let rows = decode::expect_array(response, "transactions")?;
        Ok(decode::decode_rows::<TransactionRecord, _, _>(
            rows,
            "transaction",
            |record| decode::transaction(record, currencies),
        ))
    }

    pub async fn set_first_password(
        &self,
        wallet: &Wallet,
        password: &SecretString,
    ) -> WalletResult<()> {
        self.validator.validate_wallet_id(&wallet.id)?;
        self.validator.validate_password(password.expose_secret())?;
        let request = self
            .request(
                format!(
                    "{}{}/wallet/{}/password/first",
                    self.base_path, wallet.currency.path, wallet.id
                ),
                HttpMethod::Patch,
            )
            .with_parameter("new_password", password.expose_secret());
        self.execute(request).await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        wallet: &Wallet,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<()> {
        self.validator.validate_wallet_id(&wallet.id)?;
        self.validator.validate_password(new_password.expose_secret())?;
        let request = self
            .request(
                format!(
                    "{}{}/wallet/{}/password",
                    self.base_path, wallet.currency.path, wallet.id
                ),
                HttpMethod::Patch,
            )
            .with_parameter("password", old_password.expose_secret())
            .with_parameter("new_password", new_password.expose_secret());
        self.execute(request).await?;
        Ok(())
    }

    pub async fn get_base_fee(&self, currency: &Currency) -> WalletResult<Fee> {
        let request = self.request(
            format!("{}{}/base_fee", self.base_path, currency.path),
            HttpMethod::Get,
        );
        let response = self.execute(request).await?;
        decode::decode_entity::<FeeRecord, _, _>(response, "base fee", |record| {
            Ok(Fee {
                formatted: decode::require(record.formatted, "formatted")?,
            })
        })
    }

    /// Wallets of another account that can receive a transfer.
    pub async fn get_recipient_wallets(
        &self,
        account_id: &str,
        currencies: &[Currency],
    ) -> WalletResult<Vec<RecipientWallet>> {
        self.validator.validate_account_id(account_id)?;
        let request = self.request(
            format!("{}wallets/accounts/{}", self.base_path, account_id),
            HttpMethod::Get,
        );
        let response = self.execute(request).await?;
        let rows = decode::decode_entity::<RecipientListRecord, _, _>(
            response,
            "recipient wallets",
            |record| decode::require(record.wallets, "wallets"),
        )?;
        Ok(decode::decode_rows::<RecipientWalletRecord, _, _>(
            rows,
            "recipient wallet",
            |record| decode::recipient_wallet(record, currencies),
        ))
    }

    /// Drop the wallet token (sign-out).
    pub fn invalidate_session(&self) -> WalletResult<()> {
        self.auth.invalidate()
    }

    fn request(&self, url_path: String, method: HttpMethod) -> NetworkRequest {
        NetworkRequest::new(url_path, method)
            .with_custom_host(self.crypto_host.clone())
            .requiring_auth()
    }

    fn send_parameters(
        &self,
        currency: &Currency,
        send: &SendRequest,
    ) -> WalletResult<Map<String, Value>> {
        self.validator.validate_password(send.password.expose_secret())?;
        self.validator.validate_address(&send.destination)?;
        let amount = Amount::parse_for_currency(&send.amount, currency)?;

        let mut parameters = Map::new();
        parameters.insert(
            "password".to_string(),
            Value::from(send.password.expose_secret()),
        );
        parameters.insert("destination".to_string(), Value::from(send.destination.as_str()));
        parameters.insert("amount".to_string(), Value::from(amount.as_string()));

        if currency.is_ethereum() {
            if let (Some(price), Some(limit)) = (&send.custom_gas_price, send.custom_gas_limit) {
                Amount::parse(price, currency.decimal_digits)?;
                parameters.insert("custom_gas_price".to_string(), Value::from(price.as_str()));
                parameters.insert("custom_gas_limit".to_string(), Value::from(limit));
            }
        } else if let Some(fee) = &send.fee {
            let fee = Amount::parse(fee, currency.decimal_digits)?;
            parameters.insert("custom_fee".to_string(), Value::from(fee.as_string()));
        }
        Ok(parameters)
    }

    /// Send with the current token; after a token rejection, refresh once and retry once.
    async fn execute(&self, request: NetworkRequest) -> WalletResult<Value> {
        let token = match self.auth.get_wallet_token().await {
            Ok(token) => token,
            Err(e) => return Err(self.classify(e).await),
        };

        let mut first = request.clone();
        first.set_auth_token(token.clone());
        match self.network.make_request(first).await {
            Ok(value) => Ok(value),
            Err(WalletError::TokenExpired) => {
                if !self.connectivity.is_reachable().await {
                    return Err(WalletError::NetworkConnection);
                }
                log::debug!("Token rejected for {}, refreshing", request.url_path());
                let fresh = match self.auth.refresh_after_rejection(Some(&token)).await {
                    Ok(fresh) => fresh,
                    Err(e) => return Err(self.classify(e).await),
                };
                let mut retry = request;
                retry.set_auth_token(fresh);
                self.network.make_request(retry).await
            }
            Err(e) => Err(self.classify(e).await),
        }
    }

    async fn classify(&self, error: WalletError) -> WalletError {
        if !self.connectivity.is_reachable().await {
            log::debug!("Backend unreachable, reporting offline instead of: {}", error);
            return WalletError::NetworkConnection;
        }
        error
    }
}
