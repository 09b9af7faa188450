//! `ghostwriter_cloud_server`: a transient VPS tied to a project.

use super::{
    decode_state, encode_state, exactly_one, force_delete_attribute, id_attribute,
    ip_address_attribute, last_updated, last_updated_attribute, require_id, Resource,
};
use crate::client::{null_as_default, GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, StringValidator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

const INSERT_CLOUD_SERVER: &str = r#"mutation InsertCloudServer ($name: String, $server_provider_id: bigint, $activity_type_id: bigint, $ip: inet, $aux_address: [inet!], $project_id: bigint, $note: String, $operator_id: bigint, $server_role_id: bigint) {
    insert_cloudServer(objects: {name: $name, serverProviderId: $server_provider_id, activityTypeId: $activity_type_id, ipAddress: $ip, auxAddress: $aux_address, projectId: $project_id, note: $note, operatorId: $operator_id, serverRoleId: $server_role_id}) {
        returning { id, name, serverProviderId, activityTypeId, ipAddress, auxAddress, projectId, note, operatorId, serverRoleId }
    }
}"#;

const QUERY_CLOUD_SERVER: &str = r#"query CloudServer ($id: bigint) {
    cloudServer(where: {id: {_eq: $id}}) {
        id, name, serverProviderId, activityTypeId, ipAddress, auxAddress, projectId, note, operatorId, serverRoleId
    }
}"#;

const UPDATE_CLOUD_SERVER: &str = r#"mutation UpdateCloudServer ($id: bigint, $name: String, $server_provider_id: bigint, $activity_type_id: bigint, $ip: inet, $aux_address: [inet!], $project_id: bigint, $note: String, $operator_id: bigint, $server_role_id: bigint) {
    update_cloudServer(where: {id: {_eq: $id}}, _set: {name: $name, serverProviderId: $server_provider_id, activityTypeId: $activity_type_id, ipAddress: $ip, auxAddress: $aux_address, projectId: $project_id, note: $note, operatorId: $operator_id, serverRoleId: $server_role_id}) {
        returning { id, name, serverProviderId, activityTypeId, ipAddress, auxAddress, projectId, note, operatorId, serverRoleId }
    }
}"#;

const DELETE_CLOUD_SERVER: &str = r#"mutation DeleteCloudServer ($id: bigint) {
    delete_cloudServer(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#;

/// Registers a cloud server against a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudServerResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CloudServerState {
    id: Option<i64>,
    name: String,
    server_provider_id: i64,
    activity_type_id: i64,
    ip_address: String,
    aux_address: Vec<String>,
    project_id: i64,
    note: String,
    operator_id: i64,
    server_role_id: i64,
    force_delete: bool,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudServerRow {
    id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    server_provider_id: i64,
    activity_type_id: i64,
    ip_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    aux_address: Vec<String>,
    project_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    note: String,
    operator_id: i64,
    server_role_id: i64,
}

#[derive(Debug, Deserialize)]
struct InsertCloudServer {
    #[serde(rename = "insert_cloudServer")]
    inserted: Returning<CloudServerRow>,
}

#[derive(Debug, Deserialize)]
struct QueryCloudServer {
    #[serde(rename = "cloudServer")]
    servers: Vec<CloudServerRow>,
}

#[derive(Debug, Deserialize)]
struct UpdateCloudServer {
    #[serde(rename = "update_cloudServer")]
    updated: Returning<CloudServerRow>,
}

#[derive(Debug, Deserialize)]
struct DeleteCloudServer {
    #[serde(rename = "delete_cloudServer")]
    deleted: Returning<Value>,
}

impl CloudServerState {
    fn variables(&self) -> Value {
        json!({
            "name": self.name,
            "server_provider_id": self.server_provider_id,
            "activity_type_id": self.activity_type_id,
            "ip": self.ip_address,
            "aux_address": self.aux_address,
            "project_id": self.project_id,
            "note": self.note,
            "operator_id": self.operator_id,
            "server_role_id": self.server_role_id,
        })
    }

    fn apply(&mut self, row: CloudServerRow) {
        self.id = Some(row.id);
        self.name = row.name;
        self.server_provider_id = row.server_provider_id;
        self.activity_type_id = row.activity_type_id;
        self.ip_address = row.ip_address;
        self.aux_address = row.aux_address;
        self.project_id = row.project_id;
        self.note = row.note;
        self.operator_id = row.operator_id;
        self.server_role_id = row.server_role_id;
    }
}

#[async_trait::async_trait]
impl Resource for CloudServerResource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_cloud_server"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Add a cloud server to Ghostwriter.")
            .with_attribute("id", id_attribute("Identifier of the cloud server."))
            .with_attribute("last_updated", last_updated_attribute("cloud server"))
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
                "activity_type_id",
                Attribute::required_int64().with_description("How this VPS will be used."),
            )
            .with_attribute("ip_address", ip_address_attribute())
            .with_attribute(
                "aux_address",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional_computed(),
                )
                .with_default(json!([]))
                .with_description("Any additional IP addresses associated with the server."),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64()
                    .with_description("The project this server is associated with."),
            )
            .with_attribute(
                "note",
                Attribute::defaulted_string("")
                    .with_description("Additional notes about the cloud server.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute(
                "operator_id",
                Attribute::required_int64()
                    .with_description("The operator responsible for this server."),
            )
            .with_attribute(
                "server_role_id",
                Attribute::required_int64().with_description("The role of the server."),
            )
            .with_attribute("force_delete", force_delete_attribute("cloud server"))
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: CloudServerState = decode_state(planned)?;
        debug!(ip_address = %state.ip_address, project_id = state.project_id, "Creating cloud server");

        let data: InsertCloudServer = client.execute(INSERT_CLOUD_SERVER, state.variables()).await?;
        let row = exactly_one(data.inserted.returning, "Could not create cloud server")?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        info!(id = ?state.id, "Created cloud server");
        encode_state(&state)
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let mut state: CloudServerState = decode_state(current)?;
        let id = require_id(state.id, "cloud server")?;

        let data: QueryCloudServer = client
            .execute(QUERY_CLOUD_SERVER, json!({ "id": id }))
            .await?;
        let row = exactly_one(data.servers, &format!("cloud server {}", id))?;
        state.apply(row);

        encode_state(&state)
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: CloudServerState = decode_state(prior)?;
        let id = require_id(prior.id, "cloud server")?;
        let mut state: CloudServerState = decode_state(planned)?;

        let mut variables = state.variables();
        variables["id"] = json!(id);
        let data: UpdateCloudServer = client.execute(UPDATE_CLOUD_SERVER, variables).await?;
        let row = exactly_one(
            data.updated.returning,
            &format!("Could not update cloud server ID {}", id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        encode_state(&state)
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let state: CloudServerState = decode_state(current)?;
        let id = require_id(state.id, "cloud server")?;

        if !state.force_delete {
            info!(
                id,
                "Cowardly refusing to delete cloud server. Cloud server expiration will be \
                 managed by Ghostwriter. Set force_delete to true to delete the cloud server."
            );
            return Ok(());
        }

        let data: DeleteCloudServer = client
            .execute(DELETE_CLOUD_SERVER, json!({ "id": id }))
            .await?;
        debug!(id, deleted = data.deleted.returning.len(), "Deleted cloud server");
        Ok(())
    }
}
