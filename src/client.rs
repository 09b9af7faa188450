//! HTTP client for the Ghostwriter GraphQL API.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for a single Ghostwriter instance.
#[derive(Debug, Clone)]
pub struct GhostwriterClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl GhostwriterClient {
    /// Build a client from resolved configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.tls_insecure)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// The GraphQL endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a query or mutation and decode its `data` member into `T`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ProviderError> {
        let request = GraphQlRequest {
            query,
            variables: &variables,
        };
        debug!(
            endpoint = %self.endpoint,
            body = %serde_json::to_string(&request)?,
            "Sending GraphQL request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body = %body, "Received GraphQL response");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::PermissionDenied(format!(
                    "Ghostwriter rejected the API key (HTTP {})",
                    status.as_u16()
                )));
            },
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::ResourceExhausted(
                    "Ghostwriter rate limit exceeded".to_string(),
                ));
            },
            s if s.is_server_error() => {
                return Err(ProviderError::Unavailable(format!(
                    "Ghostwriter returned HTTP {}: {}",
                    s.as_u16(),
                    body
                )));
            },
            s if !s.is_success() => {
                return Err(ProviderError::InvalidRequest(format!(
                    "Ghostwriter returned HTTP {}: {}",
                    s.as_u16(),
                    body
                )));
            },
            _ => {},
        }

        let parsed: GraphQlResponse<T> = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::GraphQl(message));
        }

        parsed
            .data
            .ok_or_else(|| ProviderError::InvalidResponse("No data in response".to_string()))
    }
}

/// Deserialize a nullable GraphQL column, mapping `null` to the type's default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Rows returned by an `insert_*`, `update_*` or `delete_*` mutation.
#[derive(Debug, Deserialize)]
pub struct Returning<T> {
    /// Affected rows.
    pub returning: Vec<T>,
}
