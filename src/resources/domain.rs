//! `ghostwriter_domain`: a domain registered in Ghostwriter's domain library.

use super::{
    date_attribute, decode_state, encode_state, exactly_one, force_delete_attribute,
    id_attribute, last_updated, last_updated_attribute, require_id, Resource,
};
use crate::client::{null_as_default, GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

const INSERT_DOMAIN: &str = r#"mutation InsertDomain ($burned_explanation: String, $autoRenew: Boolean, $name: String, $registrar: String, $creation: date, $expiration: date, $note: String, $vtPermalink: String) {
    insert_domain(objects: {burned_explanation: $burned_explanation, autoRenew: $autoRenew, name: $name, registrar: $registrar, creation: $creation, expiration: $expiration, note: $note, vtPermalink: $vtPermalink}) {
        returning { id, burned_explanation, autoRenew, name, registrar, creation, expiration, note, vtPermalink }
    }
}"#;

const QUERY_DOMAIN: &str = r#"query QueryDomain ($id: bigint) {
    domain(where: {id: {_eq: $id}}) {
        id, burned_explanation, autoRenew, name, registrar, creation, expiration, note, vtPermalink
    }
}"#;

const UPDATE_DOMAIN: &str = r#"mutation UpdateDomain ($id: bigint, $burned_explanation: String, $autoRenew: Boolean, $name: String, $registrar: String, $creation: date, $expiration: date, $note: String, $vtPermalink: String) {
    update_domain(where: {id: {_eq: $id}}, _set: {burned_explanation: $burned_explanation, autoRenew: $autoRenew, name: $name, registrar: $registrar, creation: $creation, expiration: $expiration, note: $note, vtPermalink: $vtPermalink}) {
        returning { id, burned_explanation, autoRenew, name, registrar, creation, expiration, note, vtPermalink }
    }
}"#;

const DELETE_DOMAIN: &str = r#"mutation DeleteDomain ($id: bigint) {
    delete_domain(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#;

/// Registers a domain and keeps its registration details in sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct DomainState {
    id: Option<i64>,
    name: String,
    registrar: String,
    creation: String,
    expiration: String,
    auto_renew: bool,
    burned_explanation: String,
    note: String,
    vt_permalink: String,
    force_delete: bool,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainRow {
    id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    burned_explanation: String,
    #[serde(rename = "autoRenew", default, deserialize_with = "null_as_default")]
    auto_renew: bool,
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    registrar: String,
    #[serde(default, deserialize_with = "null_as_default")]
    creation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    expiration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    note: String,
    #[serde(rename = "vtPermalink", default, deserialize_with = "null_as_default")]
    vt_permalink: String,
}

#[derive(Debug, Deserialize)]
struct InsertDomain {
    insert_domain: Returning<DomainRow>,
}

#[derive(Debug, Deserialize)]
struct QueryDomain {
    domain: Vec<DomainRow>,
}

#[derive(Debug, Deserialize)]
struct UpdateDomain {
    update_domain: Returning<DomainRow>,
}

#[derive(Debug, Deserialize)]
struct DeleteDomain {
    delete_domain: Returning<Value>,
}

impl DomainState {
    fn variables(&self) -> Value {
        json!({
            "burned_explanation": self.burned_explanation,
            "autoRenew": self.auto_renew,
            "name": self.name,
            "registrar": self.registrar,
            "creation": self.creation,
            "expiration": self.expiration,
            "note": self.note,
            "vtPermalink": self.vt_permalink,
        })
    }

    fn apply(&mut self, row: DomainRow) {
        self.id = Some(row.id);
        self.burned_explanation = row.burned_explanation;
        self.auto_renew = row.auto_renew;
        self.name = row.name;
        self.registrar = row.registrar;
        self.creation = row.creation;
        self.expiration = row.expiration;
        self.note = row.note;
        self.vt_permalink = row.vt_permalink;
    }
}

#[async_trait::async_trait]
impl Resource for DomainResource {
    fn type_name(&self) -> &'static str {
        "ghostwriter_domain"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Register a domain in Ghostwriter.")
            .with_attribute("id", id_attribute("Identifier of the domain."))
            .with_attribute("last_updated", last_updated_attribute("domain"))
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The domain name. e.g. example.com")
                    .with_validator(StringValidator::length_between(1, 256))
                    .with_validator(StringValidator::regex(
                        r"^([a-zA-Z0-9-]+\.)*[a-zA-Z0-9-]+\.[a-zA-Z]{2,}$",
                        "Domain name must be a valid domain name. e.g. example.com",
                    )),
            )
            .with_attribute(
                "registrar",
                Attribute::defaulted_string("")
                    .with_description("The domain registrar. e.g. GoDaddy, Namecheap, etc.")
                    .with_validator(StringValidator::length_between(0, 255))
                    .with_validator(StringValidator::regex(
                        r"^[a-zA-Z0-9-]+$",
                        "Registrar must be a valid registrar name. e.g. GoDaddy",
                    )),
            )
            .with_attribute(
                "creation",
                date_attribute("The domain creation date. Format: YYYY-MM-DD."),
            )
            .with_attribute(
                "expiration",
                date_attribute("The domain expiration date. Format: YYYY-MM-DD."),
            )
            .with_attribute(
                "auto_renew",
                Attribute::defaulted_bool(false)
                    .with_description("Whether the domain is set to auto-renew."),
            )
            .with_attribute(
                "burned_explanation",
                Attribute::defaulted_string("")
                    .with_description("Explanation of why the domain was burned.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute(
                "note",
                Attribute::defaulted_string("")
                    .with_description("Additional notes about the domain.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute(
                "vt_permalink",
                Attribute::defaulted_string("")
                    .with_description("The VirusTotal permalink for the domain.")
                    .with_validator(StringValidator::length_between(0, 256)),
            )
            .with_attribute("force_delete", force_delete_attribute("domain"))
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: DomainState = decode_state(planned)?;
        debug!(name = %state.name, "Creating domain");

        let data: InsertDomain = client.execute(INSERT_DOMAIN, state.variables()).await?;
        let row = exactly_one(data.insert_domain.returning, "Could not create domain")?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        info!(id = ?state.id, name = %state.name, "Created domain");
        encode_state(&state)
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let mut state: DomainState = decode_state(current)?;
        let id = require_id(state.id, "domain")?;
        debug!(id, "Reading domain");

        let data: QueryDomain = client.execute(QUERY_DOMAIN, json!({ "id": id })).await?;
        let row = exactly_one(data.domain, &format!("domain {}", id))?;
        state.apply(row);

        encode_state(&state)
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: DomainState = decode_state(prior)?;
        let id = require_id(prior.id, "domain")?;
        let mut state: DomainState = decode_state(planned)?;
        debug!(id, "Updating domain");

        let mut variables = state.variables();
        variables["id"] = json!(id);
        let data: UpdateDomain = client.execute(UPDATE_DOMAIN, variables).await?;
        let row = exactly_one(
            data.update_domain.returning,
            &format!("Could not update domain ID {}", id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        encode_state(&state)
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let state: DomainState = decode_state(current)?;
        let id = require_id(state.id, "domain")?;

        if !state.force_delete {
            info!(
                id,
                "Cowardly refusing to delete domain. Domain expiration will be managed by \
                 Ghostwriter. Set force_delete to true to delete the domain."
            );
            return Ok(());
        }

        let data: DeleteDomain = client.execute(DELETE_DOMAIN, json!({ "id": id })).await?;
        debug!(id, deleted = data.delete_domain.returning.len(), "Deleted domain");
        Ok(())
    }
}
