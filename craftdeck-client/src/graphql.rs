//! Raw GraphQL transport against the Spacelift API

use crate::auth::TokenCache;
use crate::error::{ClientError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TOKEN_EXCHANGE: &str = r#"
mutation GetSpaceliftToken($id: ID!, $secret: String!) {
  apiKeyUser(id: $id, secret: $secret) {
    jwt
  }
}"#;

/// Spacelift API key used for the credential exchange
#[derive(Clone)]
pub struct ApiKey {
    pub id: String,
    pub secret: String,
}

impl ApiKey {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

/// Issues queries and mutations with a cached bearer token attached.
///
/// No retries happen here; callers decide what to do with a failure.
#[derive(Clone)]
pub struct GraphqlClient {
    http: Client,
    endpoint: String,
    api_key: ApiKey,
    tokens: Arc<TokenCache>,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>, api_key: ApiKey, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
            tokens: Arc::new(TokenCache::default()),
        })
    }

    /// Share a token cache between clients (or inject one with a custom window)
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Return the cached bearer token, exchanging the API key for a new one
    /// when the cache is empty or expired.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }

        debug!(key_id = %self.api_key.id, "Exchanging Spacelift API key for a token");
        let variables = json!({
            "id": self.api_key.id,
            "secret": self.api_key.secret,
        });

        let data = self
            .post(TOKEN_EXCHANGE, &variables, None)
            .await
            .map_err(|e| ClientError::CredentialAcquisition(e.to_string()))?;

        let jwt = data
            .pointer("/apiKeyUser/jwt")
            .and_then(Value::as_str)
            .filter(|jwt| !jwt.is_empty())
            .ok_or_else(|| {
                ClientError::CredentialAcquisition("response did not contain a token".to_string())
            })?
            .to_string();

        self.tokens.set(jwt.clone());
        info!("Acquired Spacelift API token");

        Ok(jwt)
    }

    /// Run a query or mutation and return its `data` object
    pub async fn execute(&self, operation: &str, variables: Value) -> Result<Value> {
        let token = self.token().await?;
        self.post(operation, &variables, Some(&token)).await
    }

    async fn post(&self, operation: &str, variables: &Value, token: Option<&str>) -> Result<Value> {
        let mut request = self.http.post(&self.endpoint).json(&GraphqlRequest {
            query: operation,
            variables,
        });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Transport(format!(
                "Spacelift returned {status}: {body}"
            )));
        }

        let payload: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if let Some(first) = payload.errors.into_iter().next() {
            return Err(ClientError::Orchestrator(first.message));
        }

        payload.data.ok_or_else(|| {
            ClientError::InvalidResponse("response carried neither data nor errors".to_string())
        })
    }
}
