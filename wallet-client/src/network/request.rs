use std::fmt;

use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::models::AuthToken;

/// Parameter names whose values never reach a log line.
const SENSITIVE_KEYS: [&str; 4] = ["password", "new_password", "token", "pin"];
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one backend call, independent of the transport that executes it.
#[derive(Clone)]
pub struct NetworkRequest {
    url_path: String,
    method: HttpMethod,
    parameters: Map<String, Value>,
    custom_host: Option<String>,
    basic_auth: Option<(String, SecretString)>,
    auth_token: Option<AuthToken>,
    requires_auth: bool,
}

impl NetworkRequest {
    pub fn new(url_path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url_path: url_path.into(),
            method,
            parameters: Map::new(),
            custom_host: None,
            basic_auth: None,
            auth_token: None,
            requires_auth: false,
        }
    }

    pub fn get(url_path: impl Into<String>) -> Self {
        Self::new(url_path, HttpMethod::Get)
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Send to this host instead of the transport's default one.
    pub fn with_custom_host(mut self, host: impl Into<String>) -> Self {
        self.custom_host = Some(host.into());
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    pub fn with_auth_token(mut self, token: AuthToken) -> Self {
        self.auth_token = Some(token);
        self
    }

    /// Refuse to send the request without an `Authorization` header.
    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn set_auth_token(&mut self, token: AuthToken) {
        self.auth_token = Some(token);
    }

    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn custom_host(&self) -> Option<&str> {
        self.custom_host.as_deref()
    }

    pub fn basic_auth(&self) -> Option<(&str, &SecretString)> {
        self.basic_auth.as_ref().map(|(user, pass)| (user.as_str(), pass))
    }

    pub fn auth_token(&self) -> Option<&AuthToken> {
        self.auth_token.as_ref()
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn has_credentials(&self) -> bool {
        self.basic_auth.is_some() || self.auth_token.is_some()
    }

    /// Parameters in a form that is safe to log.
    pub fn redacted_parameters(&self) -> Value {
        redact(&Value::Object(self.parameters.clone()))
    }

    /// `GET` parameters as query pairs; `null` values are left out.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parameters
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), rendered))
            })
            .collect()
    }
}

impl fmt::Debug for NetworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRequest")
            .field("url_path", &self.url_path)
            .field("method", &self.method)
            .field("parameters", &self.redacted_parameters())
            .field("custom_host", &self.custom_host)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(user, _)| user))
            .field("auth_token", &self.auth_token)
            .field("requires_auth", &self.requires_auth)
            .finish()
    }
}

/// Copy of `value` with every sensitive object member replaced.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let lowered = key.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lowered.contains(s)) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_fields() {
        let request = NetworkRequest::new("/v2/eth/wallet", HttpMethod::Post)
            .with_parameter("password", "hunter2")
            .with_custom_host("https://crypto.example.org")
            .with_auth_token(AuthToken::new("t1"))
            .requiring_auth();

        assert_eq!(request.url_path(), "/v2/eth/wallet");
        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.custom_host(), Some("https://crypto.example.org"));
        assert!(request.requires_auth());
        assert!(request.has_credentials());
        assert_eq!(request.parameters()["password"], json!("hunter2"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let request = NetworkRequest::get("/v1/wallet/token")
            .with_basic_auth("ios", SecretString::from("basic-secret".to_string()))
            .with_auth_token(AuthToken::new("bearer-secret"))
            .with_parameter("new_password", "pw-secret");
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("basic-secret"));
        assert!(!rendered.contains("bearer-secret"));
        assert!(!rendered.contains("pw-secret"));
        assert!(rendered.contains("ios"));
    }

    #[test]
    fn redaction_is_recursive() {
        let value = json!({"wallets": [{"id": "W1", "token": "x"}], "amount": "1"});
        assert_eq!(
            redact(&value),
            json!({"wallets": [{"id": "W1", "token": "<redacted>"}], "amount": "1"})
        );
    }

    #[test]
    fn query_pairs_render_scalars() {
        let request = NetworkRequest::get("/tx")
            .with_parameter("limit", 20)
            .with_parameter("ascending", false)
            .with_parameter("tx_direction", "in")
            .with_parameter("sort_by", Value::Null);
        let mut pairs = request.query_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("ascending".to_string(), "false".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("tx_direction".to_string(), "in".to_string()),
            ]
        );
    }
}
