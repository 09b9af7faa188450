//! `ghostwriter_oplog`: an operation log attached to a project.

use super::{
    decode_state, encode_state, exactly_one, force_delete_attribute, id_attribute, last_updated,
    last_updated_attribute, require_id, Resource,
};
use crate::client::{GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

const INSERT_OPLOG: &str = r#"mutation InsertOplog ($name: String, $project_id: bigint) {
    insert_oplog(objects: {name: $name, projectId: $project_id}) {
        returning { id, name, projectId }
    }
}"#;

const QUERY_OPLOG: &str = r#"query QueryOplog ($id: bigint) {
    oplog(where: {id: {_eq: $id}}) {
        id, name, projectId
    }
}"#;

const UPDATE_OPLOG: &str = r#"mutation UpdateOplog ($id: bigint, $name: String, $project_id: bigint) {
    update_oplog(where: {id: {_eq: $id}}, _set: {name: $name, projectId: $project_id}) {
        returning { id, name, projectId }
    }
}"#;

const DELETE_OPLOG: &str = r#"mutation DeleteOplog ($id: bigint) {
    delete_oplog(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#;

/// Creates an operation log for a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct OplogResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct OplogState {
    id: Option<i64>,
    name: String,
    project_id: i64,
    force_delete: bool,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OplogRow {
    id: i64,
    name: String,
    project_id: i64,
}

#[derive(Debug, Deserialize)]
struct InsertOplog {
    insert_oplog: Returning<OplogRow>,
}

#[derive(Debug, Deserialize)]
struct QueryOplog {
    oplog: Vec<OplogRow>,
}

#[derive(Debug, Deserialize)]
struct UpdateOplog {
    update_oplog: Returning<OplogRow>,
}

#[derive(Debug, Deserialize)]
struct DeleteOplog {
    delete_oplog: Returning<Value>,
}

impl OplogState {
    fn apply(&mut self, row: OplogRow) {
        self.id = Some(row.id);
        self.name = row.name;
        self.project_id = row.project_id;
    }
}

#[async_trait::async_trait]
impl Resource for OplogResource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_oplog"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Create an operations log.")
            .with_attribute("id", id_attribute("Identifier of the oplog."))
            .with_attribute("last_updated", last_updated_attribute("oplog"))
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the operation log.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64().with_description(
                    "The unique identifier of the project the oplog should be created for.",
                ),
            )
            .with_attribute("force_delete", force_delete_attribute("oplog"))
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: OplogState = decode_state(planned)?;
        debug!(name = %state.name, project_id = state.project_id, "Creating oplog");

        let data: InsertOplog = client
            .execute(
                INSERT_OPLOG,
                json!({ "name": state.name, "project_id": state.project_id }),
            )
            .await?;
        let row = exactly_one(data.insert_oplog.returning, "Could not create oplog")?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        info!(id = ?state.id, "Created oplog");
        encode_state(&state)
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let mut state: OplogState = decode_state(current)?;
        let id = require_id(state.id, "oplog")?;

        let data: QueryOplog = client.execute(QUERY_OPLOG, json!({ "id": id })).await?;
        let row = exactly_one(data.oplog, &format!("oplog {}", id))?;
        state.apply(row);

        encode_state(&state)
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: OplogState = decode_state(prior)?;
        let id = require_id(prior.id, "oplog")?;
        let mut state: OplogState = decode_state(planned)?;

        let data: UpdateOplog = client
            .execute(
                UPDATE_OPLOG,
                json!({ "id": id, "name": state.name, "project_id": state.project_id }),
            )
            .await?;
        let row = exactly_one(
            data.update_oplog.returning,
            &format!("Could not update oplog ID {}", id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        encode_state(&state)
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let state: OplogState = decode_state(current)?;
        let id = require_id(state.id, "oplog")?;

        if !state.force_delete {
            info!(
                id,
                "Cowardly refusing to delete oplog. Oplog expiration will be managed by \
                 Ghostwriter. Set force_delete to true to delete the oplog."
            );
            return Ok(());
        }

        let data: DeleteOplog = client.execute(DELETE_OPLOG, json!({ "id": id })).await?;
        debug!(id, deleted = data.delete_oplog.returning.len(), "Deleted oplog");
        Ok(())
    }
}
