//! Provider configuration.
//!
//! Each setting can come from the provider block or from the environment. A
//! non-null value in the provider block always wins over the environment.

use crate::schema::{Attribute, Diagnostic, Schema};
use serde_json::Value;
use std::fmt;

/// Environment variable holding the GraphQL endpoint URL.
pub const ENV_ENDPOINT: &str = "GHOSTWRITER_ENDPOINT";

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "GHOSTWRITER_API_KEY";

/// Environment variable that disables certificate verification when truthy.
pub const ENV_TLS_INSECURE: &str = "GHOSTWRITER_TLS_INSECURE";

/// Resolved settings for talking to a Ghostwriter instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Full URL of the GraphQL endpoint, e.g. `https://ghostwriter.local/v1/graphql`.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Skip TLS certificate verification.
    pub tls_insecure: bool,
}

// Hand-written so the API key never reaches a log line.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("tls_insecure", &self.tls_insecure)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve configuration against the process environment.
    pub fn from_config(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve configuration, looking up fallbacks through `env`.
    ///
    /// Missing endpoint and API key are reported together.
    pub fn resolve<F>(config: &Value, env: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = config_string(config, "endpoint").or_else(|| env(ENV_ENDPOINT));
        let api_key = config_string(config, "api_key").or_else(|| env(ENV_API_KEY));
        let tls_insecure = config
            .get("tls_insecure")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| env(ENV_TLS_INSECURE).is_some_and(|v| is_truthy(&v)));

        let mut diagnostics = Vec::new();

        let endpoint = endpoint.filter(|e| !e.is_empty());
        if endpoint.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing Ghostwriter API Endpoint")
                    .with_detail(format!(
                        "The provider cannot create the Ghostwriter API client because the \
                         endpoint is missing or empty. Set the endpoint value in the provider \
                         configuration or use the {} environment variable.",
                        ENV_ENDPOINT
                    ))
                    .with_attribute("endpoint"),
            );
        }

        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing Ghostwriter API Key")
                    .with_detail(format!(
                        "The provider cannot create the Ghostwriter API client because the \
                         API key is missing or empty. Set the api_key value in the provider \
                         configuration or use the {} environment variable.",
                        ENV_API_KEY
                    ))
                    .with_attribute("api_key"),
            );
        }

        match (endpoint, api_key) {
            (Some(endpoint), Some(api_key)) => Ok(Self {
                endpoint,
                api_key,
                tls_insecure,
            }),
            _ => Err(diagnostics),
        }
    }

    /// Schema for the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Interact with the Ghostwriter GraphQL API.")
            .with_attribute(
                "endpoint",
                Attribute::optional_string().with_description(format!(
                    "URI for the Ghostwriter GraphQL API. May also be provided via the {} \
                     environment variable.",
                    ENV_ENDPOINT
                )),
            )
            .with_attribute(
                "api_key",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!(
                        "API key for the Ghostwriter GraphQL API. May also be provided via the \
                         {} environment variable.",
                        ENV_API_KEY
                    )),
            )
            .with_attribute(
                "tls_insecure",
                Attribute::optional_bool().with_description(format!(
                    "Skip TLS certificate verification. May also be provided via the {} \
                     environment variable.",
                    ENV_TLS_INSECURE
                )),
            )
    }
}

fn config_string(config: &Value, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(str::to_string)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
