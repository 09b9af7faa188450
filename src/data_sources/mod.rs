//! Read-only Ghostwriter lookups.
//!
//! Each data source resolves a human-readable name to exactly one row.

mod lookup;
mod project;

pub use lookup::{NamedLookup, ACTIVITY_TYPE, SERVER_PROVIDER, SERVER_ROLE};
pub use project::ProjectDataSource;

use crate::client::GhostwriterClient;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use serde_json::Value;

/// A data source backed by a Ghostwriter query.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Type name, e.g. `ghostwriter_project`.
    fn type_name(&self) -> &'static str;

    /// Schema describing the data source's attributes.
    fn schema(&self) -> Schema;

    /// Validate configuration against the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        crate::validation::validate(&self.schema(), config)
    }

    /// Run the lookup and return the resulting state.
    async fn read(&self, client: &GhostwriterClient, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source this provider serves.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(NamedLookup::new(&ACTIVITY_TYPE)),
        Box::new(NamedLookup::new(&SERVER_PROVIDER)),
        Box::new(NamedLookup::new(&SERVER_ROLE)),
        Box::new(ProjectDataSource),
    ]
}

/// Read a required string attribute from data source configuration.
pub(crate) fn required_str<'a>(config: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation(format!("Missing required attribute '{}'", key)))
}
