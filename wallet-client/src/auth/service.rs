use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::api::decode;
use crate::api::types::TokenRecord;
use crate::errors::WalletResult;
use crate::models::AuthToken;
use crate::network::{NetworkRequest, NetworkService};

pub const TOKEN_PATH: &str = "/v1/wallet/token";

/// Issues wallet bearer tokens.
#[async_trait]
pub trait AuthenticationService: Send + Sync {
    async fn get_token(&self) -> WalletResult<AuthToken>;
}

/// Obtains tokens from the API server with HTTP basic auth.
pub struct HttpAuthenticationService {
    network: Arc<dyn NetworkService>,
    api_host: String,
    username: String,
    password: SecretString,
}

impl HttpAuthenticationService {
    pub fn new(
        network: Arc<dyn NetworkService>,
        api_host: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            network,
            api_host: api_host.into(),
            username: username.into(),
            password,
        }
    }
}

#[async_trait]
impl AuthenticationService for HttpAuthenticationService {
    async fn get_token(&self) -> WalletResult<AuthToken> {
        let request = NetworkRequest::get(TOKEN_PATH)
            .with_custom_host(self.api_host.clone())
            .with_basic_auth(self.username.clone(), self.password.clone())
            .requiring_auth();
        let response = self.network.make_request(request).await?;
        let token = decode::decode_entity::<TokenRecord, _, _>(response, "token", decode::token)?;
        log::info!("Obtained a new wallet token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalletError;
    use crate::network::HttpMethod;
    use parking_lot::Mutex;
    use secrecy::ExposeSecret;
    use serde_json::{json, Value};

    struct Recorder {
        response: WalletResult<Value>,
        seen: Mutex<Vec<NetworkRequest>>,
    }

    #[async_trait]
    impl NetworkService for Recorder {
        async fn make_request(&self, request: NetworkRequest) -> WalletResult<Value> {
            self.seen.lock().push(request);
            self.response.clone()
        }
    }

    fn service(response: WalletResult<Value>) -> (Arc<Recorder>, HttpAuthenticationService) {
        let recorder = Arc::new(Recorder {
            response,
            seen: Mutex::new(Vec::new()),
        });
        let service = HttpAuthenticationService::new(
            recorder.clone(),
            "https://api.example.org",
            "ios-client",
            SecretString::from("basic-pass".to_string()),
        );
        (recorder, service)
    }

    #[tokio::test]
    async fn token_request_uses_basic_auth() {
        let (recorder, service) = service(Ok(json!({"token": "fresh"})));
        let token = service.get_token().await.unwrap();
        assert_eq!(token.as_str(), "fresh");

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.url_path(), TOKEN_PATH);
        assert_eq!(request.method(), HttpMethod::Get);
        assert_eq!(request.custom_host(), Some("https://api.example.org"));
        let (user, pass) = request.basic_auth().unwrap();
        assert_eq!(user, "ios-client");
        assert_eq!(pass.expose_secret(), "basic-pass");
        assert!(request.auth_token().is_none());
    }

    #[tokio::test]
    async fn missing_token_field_is_unprocessable() {
        let (_, service) = service(Ok(json!({"access": "x"})));
        assert_eq!(
            service.get_token().await,
            Err(WalletError::UnableToProcessServerResponse)
        );
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let (_, service) = service(Err(WalletError::ServerError {
            status: 403,
            message: Some("Forbidden".into()),
        }));
        assert!(matches!(
            service.get_token().await,
            Err(WalletError::ServerError { status: 403, .. })
        ));
    }
}
