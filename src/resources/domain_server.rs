//! `ghostwriter_domain_server`: links a checked-out domain to a server.
//!
//! The server side is either a static server checkout or a cloud server,
//! never both. Ghostwriter stores the two as `staticServerId` and
//! `transientServerId`, one of which is always null.

use super::{
    decode_state, encode_state, exactly_one, force_delete_attribute, id_attribute, last_updated,
    last_updated_attribute, require_id, Resource,
};
use crate::client::{null_as_default, GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, StringValidator};
use crate::validation::as_int64;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

const INSERT_WITH_STATIC: &str = r#"mutation InsertDomainServerConnection ($domain_checkout_id: bigint, $project_id: bigint, $static_server_checkout_id: bigint, $subdomain: String, $endpoint: String) {
    insert_domainServerConnection(objects: {domainId: $domain_checkout_id, endpoint: $endpoint, projectId: $project_id, staticServerId: $static_server_checkout_id, subdomain: $subdomain}) {
        returning { domainId, endpoint, id, projectId, staticServerId, subdomain, transientServerId }
    }
}"#;

const INSERT_WITH_CLOUD: &str = r#"mutation InsertDomainServerConnection ($domain_checkout_id: bigint, $project_id: bigint, $cloud_server_id: bigint, $subdomain: String, $endpoint: String) {
    insert_domainServerConnection(objects: {domainId: $domain_checkout_id, endpoint: $endpoint, projectId: $project_id, transientServerId: $cloud_server_id, subdomain: $subdomain}) {
        returning { domainId, endpoint, id, projectId, staticServerId, subdomain, transientServerId }
    }
}"#;

const QUERY_DOMAIN_SERVER: &str = r#"query QueryDomainServerConnection ($id: bigint) {
    domainServerConnection(where: {id: {_eq: $id}}) {
        domainId, endpoint, id, projectId, staticServerId, subdomain, transientServerId
    }
}"#;

const UPDATE_WITH_STATIC: &str = r#"mutation UpdateDomainServerConnection ($id: bigint, $domain_checkout_id: bigint, $project_id: bigint, $static_server_checkout_id: bigint, $subdomain: String, $endpoint: String) {
    update_domainServerConnection(where: {id: {_eq: $id}}, _set: {domainId: $domain_checkout_id, endpoint: $endpoint, projectId: $project_id, staticServerId: $static_server_checkout_id, subdomain: $subdomain}) {
        returning { domainId, endpoint, id, projectId, staticServerId, subdomain, transientServerId }
    }
}"#;

const UPDATE_WITH_CLOUD: &str = r#"mutation UpdateDomainServerConnection ($id: bigint, $domain_checkout_id: bigint, $project_id: bigint, $cloud_server_id: bigint, $subdomain: String, $endpoint: String) {
    update_domainServerConnection(where: {id: {_eq: $id}}, _set: {domainId: $domain_checkout_id, endpoint: $endpoint, projectId: $project_id, subdomain: $subdomain, transientServerId: $cloud_server_id}) {
        returning { domainId, endpoint, id, projectId, staticServerId, subdomain, transientServerId }
    }
}"#;

const DELETE_DOMAIN_SERVER: &str = r#"mutation DeleteDomainServer ($id: bigint) {
    delete_domainServerConnection(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#;

/// Associates a domain checkout with a static or cloud server.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainServerResource;

/// Which kind of server the domain points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerLink {
    Static(i64),
    Cloud(i64),
}

impl ServerLink {
    /// Pick the link from the two ids, where 0 means unset.
    fn from_ids(static_server_checkout_id: i64, cloud_server_id: i64) -> Result<Self, ProviderError> {
        match (static_server_checkout_id, cloud_server_id) {
            (0, 0) => Err(ProviderError::Validation(
                "one of static_server_checkout_id or cloud_server_id must be set".to_string(),
            )),
            (id, _) if id != 0 => Ok(Self::Static(id)),
            (_, id) => Ok(Self::Cloud(id)),
        }
    }

    fn insert_mutation(self) -> &'static str {
        match self {
            Self::Static(_) => INSERT_WITH_STATIC,
            Self::Cloud(_) => INSERT_WITH_CLOUD,
        }
    }

    fn update_mutation(self) -> &'static str {
        match self {
            Self::Static(_) => UPDATE_WITH_STATIC,
            Self::Cloud(_) => UPDATE_WITH_CLOUD,
        }
    }

    fn variable(self) -> (&'static str, i64) {
        match self {
            Self::Static(id) => ("static_server_checkout_id", id),
            Self::Cloud(id) => ("cloud_server_id", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DomainServerState {
    id: Option<i64>,
    domain_checkout_id: i64,
    project_id: i64,
    static_server_checkout_id: i64,
    cloud_server_id: i64,
    subdomain: String,
    endpoint: String,
    force_delete: bool,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainServerRow {
    id: i64,
    domain_id: i64,
    project_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    static_server_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    transient_server_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    subdomain: String,
    #[serde(default, deserialize_with = "null_as_default")]
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct InsertDomainServer {
    #[serde(rename = "insert_domainServerConnection")]
    inserted: Returning<DomainServerRow>,
}

#[derive(Debug, Deserialize)]
struct QueryDomainServer {
    #[serde(rename = "domainServerConnection")]
    connections: Vec<DomainServerRow>,
}

#[derive(Debug, Deserialize)]
struct UpdateDomainServer {
    #[serde(rename = "update_domainServerConnection")]
    updated: Returning<DomainServerRow>,
}

#[derive(Debug, Deserialize)]
struct DeleteDomainServer {
    #[serde(rename = "delete_domainServerConnection")]
    deleted: Returning<Value>,
}

impl DomainServerState {
    fn link(&self) -> Result<ServerLink, ProviderError> {
        ServerLink::from_ids(self.static_server_checkout_id, self.cloud_server_id)
    }

    fn variables(&self, link: ServerLink) -> Value {
        let (name, server_id) = link.variable();
        let mut vars = json!({
            "domain_checkout_id": self.domain_checkout_id,
            "project_id": self.project_id,
            "subdomain": self.subdomain,
            "endpoint": self.endpoint,
        });
        vars[name] = json!(server_id);
        vars
    }

    fn apply(&mut self, row: DomainServerRow) {
        self.id = Some(row.id);
        self.domain_checkout_id = row.domain_id;
        self.project_id = row.project_id;
        self.static_server_checkout_id = row.static_server_id;
        self.cloud_server_id = row.transient_server_id;
        self.subdomain = row.subdomain;
        self.endpoint = row.endpoint;
    }
}

#[async_trait::async_trait]
impl Resource for DomainServerResource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_domain_server"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Associate a domain and a server in Ghostwriter.")
            .with_attribute("id", id_attribute("Identifier of the association."))
            .with_attribute("last_updated", last_updated_attribute("association"))
            .with_attribute(
                "domain_checkout_id",
                Attribute::required_int64()
                    .with_description("The identifier of the domain checkout resource."),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64().with_description(
                    "The unique identifier of the project the association is created for.",
                ),
            )
            .with_attribute(
                "static_server_checkout_id",
                Attribute::defaulted_int64(0)
                    .with_description("The identifier of the static server checkout.")
                    .conflicts_with("cloud_server_id"),
            )
            .with_attribute(
                "cloud_server_id",
                Attribute::defaulted_int64(0)
                    .with_description("The identifier of the cloud server.")
                    .conflicts_with("static_server_checkout_id"),
            )
            .with_attribute(
                "subdomain",
                Attribute::defaulted_string("*")
                    .with_description("The subdomain of the domain. Default is '*' for wildcard.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute(
                "endpoint",
                Attribute::defaulted_string("")
                    .with_description("The endpoint of the domain.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute("force_delete", force_delete_attribute("association"))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = crate::validation::validate(&self.schema(), config);
        if !config.is_object() {
            return diagnostics;
        }

        let server_id = |key: &str| config.get(key).and_then(as_int64).unwrap_or_default();
        if server_id("static_server_checkout_id") == 0 && server_id("cloud_server_id") == 0 {
            diagnostics.push(
                Diagnostic::error("Missing Server Attribute")
                    .with_detail(
                        "One of static_server_checkout_id or cloud_server_id must be set \
                         to a non-zero id.",
                    )
                    .with_attribute("static_server_checkout_id"),
            );
        }
        diagnostics
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: DomainServerState = decode_state(planned)?;
        let link = state.link()?;
        debug!(domain_checkout_id = state.domain_checkout_id, ?link, "Creating domain server association");

        let data: InsertDomainServer = client
            .execute(link.insert_mutation(), state.variables(link))
            .await?;
        let row = exactly_one(
            data.inserted.returning,
            "Could not create domain server association",
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        info!(id = ?state.id, "Created domain server association");
        encode_state(&state)
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let mut state: DomainServerState = decode_state(current)?;
        let id = require_id(state.id, "domain server association")?;

        let data: QueryDomainServer = client
            .execute(QUERY_DOMAIN_SERVER, json!({ "id": id }))
            .await?;
        let row = exactly_one(
            data.connections,
            &format!("domain server association {}", id),
        )?;
        state.apply(row);

        encode_state(&state)
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: DomainServerState = decode_state(prior)?;
        let id = require_id(prior.id, "domain server association")?;
        let mut state: DomainServerState = decode_state(planned)?;
        let link = state.link()?;

        let mut variables = state.variables(link);
        variables["id"] = json!(id);
        let data: UpdateDomainServer = client.execute(link.update_mutation(), variables).await?;
        let row = exactly_one(
            data.updated.returning,
            &format!("Could not update domain server association ID {}", id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        encode_state(&state)
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let state: DomainServerState = decode_state(current)?;
        let id = require_id(state.id, "domain server association")?;

        if !state.force_delete {
            info!(
                id,
                "Cowardly refusing to delete domain server association. Association expiration \
                 will be managed by Ghostwriter. Set force_delete to true to delete it."
            );
            return Ok(());
        }

        let data: DeleteDomainServer = client
            .execute(DELETE_DOMAIN_SERVER, json!({ "id": id }))
            .await?;
        debug!(id, deleted = data.deleted.returning.len(), "Deleted domain server association");
        Ok(())
    }
}
