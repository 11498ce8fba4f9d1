use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde_json::Value;

use super::request::{redact, HttpMethod, NetworkRequest};
use crate::errors::{WalletError, WalletResult};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Executes one HTTP call per request. No retries and no caching at this layer.
#[async_trait]
pub trait NetworkService: Send + Sync {
    async fn make_request(&self, request: NetworkRequest) -> WalletResult<Value>;
}

/// `NetworkService` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpNetworkService {
    client: Client,
    base_host: String,
}

impl HttpNetworkService {
    pub fn new(base_host: &str, timeout: Duration) -> WalletResult<Self> {
        Url::parse(base_host).map_err(|e| {
            WalletError::RequestConstruction(format!("Invalid host URL '{}': {}", base_host, e))
        })?;

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_host: base_host.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    /// Translate a `NetworkRequest` into a ready-to-send reqwest request.
    pub fn build_request(&self, request: &NetworkRequest) -> WalletResult<reqwest::Request> {
        if request.requires_auth() && !request.has_credentials() {
            return Err(WalletError::RequestConstruction(format!(
                "{} requires authorization but carries no credentials",
                request.url_path()
            )));
        }

        let mut url = self.resolve_url(request)?;
        if request.method() == HttpMethod::Get && !request.parameters().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query_pairs());
        }

        let mut builder = self.client.request(request.method().to_reqwest(), url);

        // Basic auth wins over the bearer token when both are set
        if let Some((username, password)) = request.basic_auth() {
            builder = builder.basic_auth(username, Some(password.expose_secret()));
        } else if let Some(token) = request.auth_token() {
            builder = builder.header(AUTHORIZATION, token.as_str());
        }

        if request.method() != HttpMethod::Get && !request.parameters().is_empty() {
            let body = serde_json::to_vec(request.parameters()).map_err(|e| {
                WalletError::RequestConstruction(format!("Failed to encode body: {}", e))
            })?;
            builder = builder
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .header(ACCEPT, JSON_CONTENT_TYPE)
                .body(body);
        }

        builder
            .build()
            .map_err(|e| WalletError::RequestConstruction(e.to_string()))
    }

    fn resolve_url(&self, request: &NetworkRequest) -> WalletResult<Url> {
        let host = request
            .custom_host()
            .map(|host| host.trim_end_matches('/'))
            .unwrap_or(&self.base_host);
        let path = request.url_path();
        let joined = if path.starts_with('/') {
            format!("{}{}", host, path)
        } else {
            format!("{}/{}", host, path)
        };
        Url::parse(&joined).map_err(|e| {
            WalletError::RequestConstruction(format!("Invalid request URL '{}': {}", joined, e))
        })
    }
}

#[async_trait]
impl NetworkService for HttpNetworkService {
    async fn make_request(&self, request: NetworkRequest) -> WalletResult<Value> {
        let http_request = self.build_request(&request)?;
        let url = http_request.url().clone();
        log::debug!(
            "API call {} {} parameters: {}",
            request.method(),
            url.path(),
            request.redacted_parameters()
        );

        let response = self.client.execute(http_request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        let result = interpret_response(status, &body);
        match &result {
            Ok(value) => log::debug!("API response {} {}: {}", status, url.path(), redact(value)),
            Err(e) => log::debug!("API failure {} {}: {}", status, url.path(), e),
        }
        result
    }
}

/// Map a status code and body to the transport's result.
pub fn interpret_response(status: u16, body: &[u8]) -> WalletResult<Value> {
    match status {
        401 => Err(WalletError::TokenExpired),
        200..=299 => {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            serde_json::from_slice(body).map_err(|_| WalletError::UnableToProcessServerResponse)
        }
        _ => Err(WalletError::ServerError {
            status,
            message: server_message(body),
        }),
    }
}

fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthToken;
    use secrecy::SecretString;
    use serde_json::json;

    fn service() -> HttpNetworkService {
        HttpNetworkService::new("https://api.example.org/", Duration::from_secs(5)).unwrap()
    }

    fn header<'a>(request: &'a reqwest::Request, name: reqwest::header::HeaderName) -> Option<&'a str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn get_parameters_become_query() {
        let request = NetworkRequest::get("/api/crypto-backend/v2/wallets/W1/transactions")
            .with_parameter("limit", 10)
            .with_parameter("tx_direction", "out");
        let built = service().build_request(&request).unwrap();

        assert_eq!(built.method(), reqwest::Method::GET);
        assert_eq!(
            built.url().path(),
            "/api/crypto-backend/v2/wallets/W1/transactions"
        );
        let query: Vec<(String, String)> = built.url().query_pairs().into_owned().collect();
        assert!(query.contains(&("limit".to_string(), "10".to_string())));
        assert!(query.contains(&("tx_direction".to_string(), "out".to_string())));
        assert!(built.body().is_none());
        assert!(header(&built, CONTENT_TYPE).is_none());
    }

    #[test]
    fn non_get_parameters_become_json_body() {
        let request = NetworkRequest::new("eth/wallet", HttpMethod::Post)
            .with_parameter("password", "pw")
            .with_custom_host("https://crypto.example.org/")
            .with_auth_token(AuthToken::new("tok"));
        let built = service().build_request(&request).unwrap();

        assert_eq!(built.url().as_str(), "https://crypto.example.org/eth/wallet");
        assert_eq!(header(&built, CONTENT_TYPE), Some(JSON_CONTENT_TYPE));
        assert_eq!(header(&built, ACCEPT), Some(JSON_CONTENT_TYPE));
        assert_eq!(header(&built, AUTHORIZATION), Some("tok"));
        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        let decoded: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(decoded, json!({"password": "pw"}));
    }

    #[test]
    fn empty_patch_has_no_body_headers() {
        let request = NetworkRequest::new("/x", HttpMethod::Patch);
        let built = service().build_request(&request).unwrap();
        assert!(built.body().is_none());
        assert!(header(&built, ACCEPT).is_none());
    }

    #[test]
    fn basic_auth_wins_over_token() {
        let request = NetworkRequest::get("/v1/wallet/token")
            .with_basic_auth("user", SecretString::from("pass".to_string()))
            .with_auth_token(AuthToken::new("tok"));
        let built = service().build_request(&request).unwrap();
        // base64("user:pass")
        assert_eq!(header(&built, AUTHORIZATION), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn auth_required_without_credentials_fails_early() {
        let request = NetworkRequest::get("/wallets").requiring_auth();
        assert!(matches!(
            service().build_request(&request),
            Err(WalletError::RequestConstruction(_))
        ));
    }

    #[test]
    fn invalid_hosts_are_rejected() {
        assert!(HttpNetworkService::new("not a host", Duration::from_secs(1)).is_err());
        let request = NetworkRequest::get("/x").with_custom_host("::bad::");
        assert!(matches!(
            service().build_request(&request),
            Err(WalletError::RequestConstruction(_))
        ));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(interpret_response(401, b"{}"), Err(WalletError::TokenExpired));
        assert_eq!(
            interpret_response(200, br#"{"token":"t"}"#),
            Ok(json!({"token": "t"}))
        );
        assert_eq!(interpret_response(204, b""), Ok(Value::Null));
        assert_eq!(
            interpret_response(200, b"<html>"),
            Err(WalletError::UnableToProcessServerResponse)
        );
        assert_eq!(
            interpret_response(422, br#"{"message":"Insufficient balance"}"#),
            Err(WalletError::ServerError {
                status: 422,
                message: Some("Insufficient balance".to_string())
            })
        );
        assert_eq!(
            interpret_response(500, b"oops"),
            Err(WalletError::ServerError {
                status: 500,
                message: None
            })
        );
    }
}
