//! `ghostwriter_static_server`: a long-lived server in the static server library.

use super::{
    decode_state, encode_state, exactly_one, id_attribute, ip_address_attribute, last_updated,
    last_updated_attribute, require_id, Resource,
};
use crate::client::{null_as_default, GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

const INSERT_SERVER: &str = r#"mutation InsertServer ($name: String, $server_provider_id: bigint, $server_status_id: bigint, $ip: inet, $note: String) {
    insert_staticServer(objects: {name: $name, serverProviderId: $server_provider_id, serverStatusId: $server_status_id, ipAddress: $ip, note: $note}) {
        returning { id, name, serverProviderId, serverStatusId, ipAddress, note }
    }
}"#;

const QUERY_SERVER: &str = r#"query StaticServer ($id: bigint) {
    staticServer(where: {id: {_eq: $id}}) {
        id, name, serverProviderId, serverStatusId, ipAddress, note
    }
}"#;

const UPDATE_SERVER: &str = r#"mutation UpdateServer ($id: bigint, $name: String, $server_provider_id: bigint, $server_status_id: bigint, $ip: inet, $note: String) {
    update_staticServer(where: {id: {_eq: $id}}, _set: {name: $name, serverProviderId: $server_provider_id, serverStatusId: $server_status_id, ipAddress: $ip, note: $note}) {
        returning { id, name, serverProviderId, serverStatusId, ipAddress, note }
    }
}"#;

const DELETE_SERVER: &str = r#"mutation DeleteServer ($id: bigint) {
    delete_staticServer(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#;

/// Registers a static server. Removing it from configuration always deletes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticServerResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct StaticServerState {
    id: Option<i64>,
    name: String,
    server_provider_id: i64,
    server_status_id: i64,
    ip_address: String,
    note: String,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticServerRow {
    id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    server_provider_id: i64,
    server_status_id: i64,
    ip_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    note: String,
}

#[derive(Debug, Deserialize)]
struct InsertServer {
    #[serde(rename = "insert_staticServer")]
    inserted: Returning<StaticServerRow>,
}

#[derive(Debug, Deserialize)]
struct QueryServer {
    #[serde(rename = "staticServer")]
    servers: Vec<StaticServerRow>,
}

#[derive(Debug, Deserialize)]
struct UpdateServer {
    #[serde(rename = "update_staticServer")]
    updated: Returning<StaticServerRow>,
}

#[derive(Debug, Deserialize)]
struct DeleteServer {
    #[serde(rename = "delete_staticServer")]
    deleted: Returning<Value>,
}

impl StaticServerState {
    fn variables(&self) -> Value {
        json!({
            "name": self.name,
            "server_provider_id": self.server_provider_id,
            "server_status_id": self.server_status_id,
            "ip": self.ip_address,
            "note": self.note,
        })
    }

    fn apply(&mut self, row: StaticServerRow) {
        self.id = Some(row.id);
        self.name = row.name;
        self.server_provider_id = row.server_provider_id;
        self.server_status_id = row.server_status_id;
        self.ip_address = row.ip_address;
        self.note = row.note;
    }
}

#[async_trait::async_trait]
impl Resource for StaticServerResource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_static_server"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Register a static server in Ghostwriter.")
            .with_attribute("id", id_attribute("Identifier of the static server."))
            .with_attribute("last_updated", last_updated_attribute("server"))
            .with_attribute(
                "name",
                Attribute::defaulted_string("")
                    .with_description("The name of the server, typically its hostname."),
            )
            .with_attribute(
                "server_provider_id",
                Attribute::required_int64()
                    .with_description("The identifier of the server hosting provider."),
            )
            .with_attribute(
                "server_status_id",
                Attribute::defaulted_int64(1)
                    .with_description("The identifier of the server status."),
            )
            .with_attribute("ip_address", ip_address_attribute())
            .with_attribute(
                "note",
                Attribute::defaulted_string("")
                    .with_description("Additional notes about the server.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: StaticServerState = decode_state(planned)?;
        debug!(ip_address = %state.ip_address, "Creating static server");

        let data: InsertServer = client.execute(INSERT_SERVER, state.variables()).await?;
        let row = exactly_one(data.inserted.returning, "Could not create static server")?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        info!(id = ?state.id, "Created static server");
        encode_state(&state)
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let mut state: StaticServerState = decode_state(current)?;
        let id = require_id(state.id, "static server")?;

        let data: QueryServer = client.execute(QUERY_SERVER, json!({ "id": id })).await?;
        let row = exactly_one(data.servers, &format!("static server {}", id))?;
        state.apply(row);

        encode_state(&state)
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: StaticServerState = decode_state(prior)?;
        let id = require_id(prior.id, "static server")?;
        let mut state: StaticServerState = decode_state(planned)?;

        let mut variables = state.variables();
        variables["id"] = json!(id);
        let data: UpdateServer = client.execute(UPDATE_SERVER, variables).await?;
        let row = exactly_one(
            data.updated.returning,
            &format!("Could not update static server ID {}", id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        encode_state(&state)
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let state: StaticServerState = decode_state(current)?;
        let id = require_id(state.id, "static server")?;

        let data: DeleteServer = client.execute(DELETE_SERVER, json!({ "id": id })).await?;
        debug!(id, deleted = data.deleted.returning.len(), "Deleted static server");
        Ok(())
    }
}
