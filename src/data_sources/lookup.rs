//! Name-to-id lookups for activity types, server providers and server roles.

use super::{required_str, DataSource};
use crate::client::GhostwriterClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// The table and column a [`NamedLookup`] searches.
#[derive(Debug)]
pub struct LookupKind {
    type_name: &'static str,
    noun: &'static str,
    table: &'static str,
    query: &'static str,
}

/// `ghostwriter_activity_type`.
pub const ACTIVITY_TYPE: LookupKind = LookupKind {
    type_name: "ghostwriter_activity_type",
    noun: "activity type",
    table: "activityType",
    query: r#"query ActivityType ($name: String) {
    activityType(where: {activity: {_eq: $name}}) { id }
}"#,
};

/// `ghostwriter_server_provider`.
pub const SERVER_PROVIDER: LookupKind = LookupKind {
    type_name: "ghostwriter_server_provider",
    noun: "server provider",
    table: "serverProvider",
    query: r#"query ServerProvider ($name: String) {
    serverProvider(where: {serverProvider: {_eq: $name}}) { id }
}"#,
};

/// `ghostwriter_server_role`.
pub const SERVER_ROLE: LookupKind = LookupKind {
    type_name: "ghostwriter_server_role",
    noun: "server role",
    table: "serverRole",
    query: r#"query ServerRoles ($name: String) {
    serverRole(where: {serverRole: {_eq: $name}}) { id }
}"#,
};

/// Resolves a `name` to the `id` of the single matching row.
#[derive(Debug, Clone, Copy)]
pub struct NamedLookup {
    kind: &'static LookupKind,
}

impl NamedLookup {
    /// Create a lookup of the given kind.
    pub const fn new(kind: &'static LookupKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

#[async_trait::async_trait]
impl DataSource for NamedLookup {
    fn type_name(&self) -> &'static str {
        self.kind.type_name
    }

    fn schema(&self) -> Schema {
        let noun = self.kind.noun;
        Schema::v0()
            .with_description(format!("Search an existing {} in Ghostwriter.", noun))
            .with_attribute(
                "id",
                Attribute::computed_int64()
                    .with_description(format!("The identifier of the {}.", noun)),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description(format!("The name of the {} to be returned.", noun)),
            )
    }

    async fn read(&self, client: &GhostwriterClient, config: Value) -> Result<Value, ProviderError> {
        let name = required_str(&config, "name")?;
        debug!(data_source_type = self.kind.type_name, name, "Looking up {}", self.kind.noun);

        let mut data: HashMap<String, Vec<IdRow>> =
            client.execute(self.kind.query, json!({ "name": name })).await?;
        let rows = data.remove(self.kind.table).unwrap_or_default();

        match rows.as_slice() {
            [row] => Ok(json!({ "id": row.id, "name": name })),
            _ => Err(ProviderError::NotFound(format!(
                "{} '{}' not found or multiple found with the same name ({} matches)",
                self.kind.noun,
                name,
                rows.len()
            ))),
        }
    }
}
