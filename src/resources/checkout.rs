//! Checkouts of library items to a project.
//!
//! `ghostwriter_domain_checkout` and `ghostwriter_static_server_checkout`
//! share their lifecycle and differ only in table and column names, so one
//! [`CheckoutResource`] serves both, parameterised by a [`CheckoutKind`].
//!
//! Ghostwriter's checkout actions report no id, so create looks up the newest
//! checkout of the item afterwards. Delete always releases the item back to
//! the available pool; the checkout record itself is only removed with
//! `force_delete`.

use super::{
    date_attribute, exactly_one, force_delete_attribute, id_attribute, last_updated,
    last_updated_attribute, require_id, Resource,
};
use crate::client::{null_as_default, GhostwriterClient, Returning};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::as_int64;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Names and queries that differ between checkout flavours.
#[derive(Debug)]
pub struct CheckoutKind {
    type_name: &'static str,
    noun: &'static str,
    target_attr: &'static str,
    description: &'static str,
    checkout: &'static str,
    checkout_field: &'static str,
    query_latest: &'static str,
    query_by_id: &'static str,
    table: &'static str,
    update: &'static str,
    update_field: &'static str,
    delete: &'static str,
    delete_field: &'static str,
    release: &'static str,
    release_field: &'static str,
}

/// Domain checkouts.
pub const DOMAIN_CHECKOUT: CheckoutKind = CheckoutKind {
    type_name: "ghostwriter_domain_checkout",
    noun: "domain",
    target_attr: "domain_id",
    description: "Checkout an existing domain in Ghostwriter.",
    checkout: r#"mutation checkoutDomain ($activity_type_id: Int!, $domain_id: Int!, $project_id: Int!, $note: String, $start_date: date!, $end_date: date!) {
    checkoutDomain(activityTypeId: $activity_type_id, domainId: $domain_id, projectId: $project_id, note: $note, startDate: $start_date, endDate: $end_date) {
        result
    }
}"#,
    checkout_field: "checkoutDomain",
    query_latest: r#"query QueryDomainCheckout ($id: bigint) {
    domainCheckout(where: {domain: {id: {_eq: $id}}}, order_by: {id: desc}) {
        id, domainId, endDate, note, projectId, startDate, activityType { id }
    }
}"#,
    query_by_id: r#"query QueryDomainCheckout ($id: bigint) {
    domainCheckout(where: {id: {_eq: $id}}) {
        id, domainId, endDate, note, projectId, startDate, activityType { id }
    }
}"#,
    table: "domainCheckout",
    update: r#"mutation UpdateDomainCheckout ($id: bigint, $activity_type_id: bigint, $domain_id: bigint, $project_id: bigint, $note: String, $start_date: date!, $end_date: date!) {
    update_domainCheckout(where: {id: {_eq: $id}}, _set: {activityTypeId: $activity_type_id, domainId: $domain_id, endDate: $end_date, note: $note, projectId: $project_id, startDate: $start_date}) {
        returning { id, domainId, endDate, note, projectId, startDate, activityType { id } }
    }
}"#,
    update_field: "update_domainCheckout",
    delete: r#"mutation DeleteDomainCheckout ($id: bigint) {
    delete_domainCheckout(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#,
    delete_field: "delete_domainCheckout",
    release: r#"mutation ReleaseDomain ($id: bigint) {
    update_domain(where: {id: {_eq: $id}}, _set: {domainStatusId: 1}) {
        returning { id }
    }
}"#,
    release_field: "update_domain",
};

/// Static server checkouts.
pub const SERVER_CHECKOUT: CheckoutKind = CheckoutKind {
    type_name: "ghostwriter_static_server_checkout",
    noun: "server",
    target_attr: "server_id",
    description: "Checkout an existing static server in Ghostwriter.",
    checkout: r#"mutation checkoutServer ($activity_type_id: Int!, $server_id: Int!, $project_id: Int!, $note: String, $start_date: date!, $end_date: date!) {
    checkoutServer(activityTypeId: $activity_type_id, serverId: $server_id, projectId: $project_id, note: $note, startDate: $start_date, endDate: $end_date) {
        result
    }
}"#,
    checkout_field: "checkoutServer",
    query_latest: r#"query QueryServerCheckout ($id: bigint) {
    serverCheckout(where: {server: {id: {_eq: $id}}}, order_by: {id: desc}) {
        id, serverId, endDate, note, projectId, startDate, activityType { id }
    }
}"#,
    query_by_id: r#"query QueryServerCheckout ($id: bigint) {
    serverCheckout(where: {id: {_eq: $id}}) {
        id, serverId, endDate, note, projectId, startDate, activityType { id }
    }
}"#,
    table: "serverCheckout",
    update: r#"mutation UpdateServerCheckout ($id: bigint, $activity_type_id: bigint, $server_id: bigint, $project_id: bigint, $note: String, $start_date: date!, $end_date: date!) {
    update_serverCheckout(where: {id: {_eq: $id}}, _set: {activityTypeId: $activity_type_id, serverId: $server_id, endDate: $end_date, note: $note, projectId: $project_id, startDate: $start_date}) {
        returning { id, serverId, endDate, note, projectId, startDate, activityType { id } }
    }
}"#,
    update_field: "update_serverCheckout",
    delete: r#"mutation DeleteServerCheckout ($id: bigint) {
    delete_serverCheckout(where: {id: {_eq: $id}}) {
        returning { id }
    }
}"#,
    delete_field: "delete_serverCheckout",
    release: r#"mutation ReleaseServer ($id: bigint) {
    update_staticServer(where: {id: {_eq: $id}}, _set: {serverStatusId: 1}) {
        returning { id }
    }
}"#,
    release_field: "update_staticServer",
};

/// A checkout resource of the given kind.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutResource {
    kind: &'static CheckoutKind,
}

impl CheckoutResource {
    /// `ghostwriter_domain_checkout`.
    pub const fn domain() -> Self {
        Self {
            kind: &DOMAIN_CHECKOUT,
        }
    }

    /// `ghostwriter_static_server_checkout`.
    pub const fn static_server() -> Self {
        Self {
            kind: &SERVER_CHECKOUT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CheckoutState {
    id: Option<i64>,
    target_id: Option<i64>,
    project_id: Option<i64>,
    activity_type_id: Option<i64>,
    start_date: String,
    end_date: String,
    note: String,
    force_delete: bool,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CheckoutRow {
    id: i64,
    #[serde(rename = "domainId", alias = "serverId")]
    target_id: i64,
    #[serde(rename = "projectId")]
    project_id: i64,
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(rename = "endDate")]
    end_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    note: String,
    #[serde(rename = "activityType")]
    activity_type: IdRef,
}

impl CheckoutKind {
    fn decode(&self, value: Value) -> Result<CheckoutState, ProviderError> {
        let obj = match value {
            Value::Object(obj) => obj,
            _ => {
                return Err(ProviderError::InvalidRequest(format!(
                    "{} state is missing",
                    self.type_name
                )))
            },
        };
        let int = |key: &str| obj.get(key).and_then(as_int64);
        let string = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(CheckoutState {
            id: int("id"),
            target_id: int(self.target_attr),
            project_id: int("project_id"),
            activity_type_id: int("activity_type_id"),
            start_date: string("start_date"),
            end_date: string("end_date"),
            note: string("note"),
            force_delete: obj
                .get("force_delete")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            last_updated: obj
                .get("last_updated")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn encode(&self, state: &CheckoutState) -> Value {
        let mut obj = Map::new();
        obj.insert("id".to_string(), json!(state.id));
        obj.insert(self.target_attr.to_string(), json!(state.target_id));
        obj.insert("project_id".to_string(), json!(state.project_id));
        obj.insert("activity_type_id".to_string(), json!(state.activity_type_id));
        obj.insert("start_date".to_string(), json!(state.start_date));
        obj.insert("end_date".to_string(), json!(state.end_date));
        obj.insert("note".to_string(), json!(state.note));
        obj.insert("force_delete".to_string(), json!(state.force_delete));
        obj.insert("last_updated".to_string(), json!(state.last_updated));
        Value::Object(obj)
    }

    fn variables(&self, state: &CheckoutState) -> Result<Value, ProviderError> {
        let mut vars = json!({
            "activity_type_id": self.required(state.activity_type_id, "activity_type_id")?,
            "project_id": self.required(state.project_id, "project_id")?,
            "note": state.note,
            "start_date": state.start_date,
            "end_date": state.end_date,
        });
        vars[self.target_attr] = json!(self.target(state)?);
        Ok(vars)
    }

    fn target(&self, state: &CheckoutState) -> Result<i64, ProviderError> {
        self.required(state.target_id, self.target_attr)
    }

    /// An id the API call cannot go without. Never substitute 0 for it.
    fn required(&self, value: Option<i64>, attr: &str) -> Result<i64, ProviderError> {
        value.ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "{} state has no integer '{}'",
                self.type_name, attr
            ))
        })
    }

    async fn remove(&self, client: &GhostwriterClient, id: i64) -> Result<(), ProviderError> {
        let data: Value = client.execute(self.delete, json!({ "id": id })).await?;
        let deleted: Returning<IdRef> = field(data, self.delete_field)?;
        debug!(id, deleted = deleted.returning.len(), "Deleted {} checkout", self.noun);
        Ok(())
    }

    async fn release(&self, client: &GhostwriterClient, target_id: i64) -> Result<(), ProviderError> {
        let data: Value = client
            .execute(self.release, json!({ "id": target_id }))
            .await?;
        let released: Returning<IdRef> = field(data, self.release_field)?;
        debug!(
            target_id,
            released = released.returning.len(),
            "Released {} to the pool",
            self.noun
        );
        Ok(())
    }
}

impl CheckoutState {
    fn apply(&mut self, row: CheckoutRow) {
        self.id = Some(row.id);
        self.target_id = Some(row.target_id);
        self.project_id = Some(row.project_id);
        self.activity_type_id = Some(row.activity_type.id);
        self.start_date = row.start_date;
        self.end_date = row.end_date;
        self.note = row.note;
    }
}

/// Pull one top-level field out of a GraphQL `data` object.
fn field<T: DeserializeOwned>(mut data: Value, key: &str) -> Result<T, ProviderError> {
    let value = data
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("response has no '{}'", key)))?;
    Ok(serde_json::from_value(value)?)
}

#[async_trait::async_trait]
impl Resource for CheckoutResource {
    fn type_name(&self) -> &'static str {
        self.kind.type_name
    }

    fn schema(&self) -> Schema {
        let noun = self.kind.noun;
        Schema::v0()
            .with_description(self.kind.description)
            .with_attribute("id", id_attribute(&format!("Identifier of the {} checkout.", noun)))
            .with_attribute(
                "last_updated",
                last_updated_attribute(&format!("{} checkout", noun)),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64().with_description(format!(
                    "The unique identifier of the project the {} should be checked out to.",
                    noun
                )),
            )
            .with_attribute(
                self.kind.target_attr,
                Attribute::required_int64().with_description(format!(
                    "The unique identifier of the {} to be checked out.",
                    noun
                )),
            )
            .with_attribute(
                "start_date",
                date_attribute("The start date of the checkout. Format: YYYY-MM-DD."),
            )
            .with_attribute(
                "end_date",
                date_attribute("The end date of the checkout. Format: YYYY-MM-DD."),
            )
            .with_attribute(
                "activity_type_id",
                Attribute::required_int64()
                    .with_description("The unique identifier of the activity type being performed."),
            )
            .with_attribute(
                "note",
                Attribute::defaulted_string("").with_description(format!(
                    "Project-related notes, such as how the {} will be used.",
                    noun
                )),
            )
            .with_attribute(
                "force_delete",
                force_delete_attribute(&format!("{} checkout", noun)),
            )
    }

    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError> {
        let kind = self.kind;
        let mut state = kind.decode(planned)?;
        let variables = kind.variables(&state)?;
        let target_id = kind.target(&state)?;
        debug!(
            resource_type = kind.type_name,
            target_id,
            project_id = ?state.project_id,
            "Checking out {}",
            kind.noun
        );

        let result: Value = client.execute(kind.checkout, variables).await?;
        debug!(result = ?result.get(kind.checkout_field), "Checkout action finished");

        let data: Value = client
            .execute(kind.query_latest, json!({ "id": target_id }))
            .await?;
        let rows: Vec<CheckoutRow> = field(data, kind.table)?;
        let latest = rows.into_iter().next().ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Could not obtain any checkouts for the {} ID {}",
                kind.noun, target_id
            ))
        })?;
        state.apply(latest);
        state.last_updated = Some(last_updated());

        info!(resource_type = kind.type_name, id = ?state.id, "Checkout created");
        Ok(kind.encode(&state))
    }

    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError> {
        let kind = self.kind;
        let mut state = kind.decode(current)?;
        let id = require_id(state.id, kind.type_name)?;

        let data: Value = client.execute(kind.query_by_id, json!({ "id": id })).await?;
        let rows: Vec<CheckoutRow> = field(data, kind.table)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            ProviderError::NotFound(format!("{} checkout {}", kind.noun, id))
        })?;
        state.apply(row);

        Ok(kind.encode(&state))
    }

    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let kind = self.kind;
        let id = require_id(kind.decode(prior)?.id, kind.type_name)?;
        let mut state = kind.decode(planned)?;

        let mut variables = kind.variables(&state)?;
        variables["id"] = json!(id);
        let data: Value = client.execute(kind.update, variables).await?;
        let updated: Returning<CheckoutRow> = field(data, kind.update_field)?;
        let row = exactly_one(
            updated.returning,
            &format!("Could not update {} checkout ID {}", kind.noun, id),
        )?;
        state.apply(row);
        state.last_updated = Some(last_updated());

        Ok(kind.encode(&state))
    }

    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError> {
        let kind = self.kind;
        let state = kind.decode(current)?;
        let id = require_id(state.id, kind.type_name)?;
        let target_id = kind.target(&state)?;

        let removed = if state.force_delete {
            kind.remove(client, id).await
        } else {
            info!(
                id,
                "Cowardly refusing to delete {0} checkout. Releasing {0} to the Ghostwriter \
                 pool and the {0} checkout record will remain. Set force_delete to true to \
                 delete the {0} checkout record.",
                kind.noun
            );
            Ok(())
        };
        if let Err(e) = &removed {
            warn!(id, error = %e, "Deleting {} checkout failed, releasing anyway", kind.noun);
        }

        // The item goes back to the pool even when the record could not be deleted.
        let released = kind.release(client, target_id).await;
        removed.and(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn test_state_roundtrip_uses_target_attribute() {
        let kind = &SERVER_CHECKOUT;
        let state = kind
            .decode(json!({
                "id": 3,
                "server_id": 11,
                "project_id": 2,
                "activity_type_id": 1,
                "start_date": "2024-01-01",
                "end_date": "2024-02-01",
                "note": null,
                "force_delete": true,
                "last_updated": null
            }))
            .unwrap();

        assert_eq!(state.target_id, Some(11));
        assert_eq!(state.note, "");

        let encoded = kind.encode(&state);
        assert_eq!(encoded["server_id"], 11);
        assert!(encoded.get("domain_id").is_none());
        assert!(encoded["last_updated"].is_null());
    }

    #[test]
    fn test_variables_use_target_attribute() {
        let state = CheckoutState {
            target_id: Some(5),
            project_id: Some(2),
            activity_type_id: Some(1),
            ..Default::default()
        };
        let vars = DOMAIN_CHECKOUT.variables(&state).unwrap();
        assert_eq!(vars["domain_id"], 5);
        assert!(vars.get("server_id").is_none());
    }

    #[test]
    fn test_ids_are_never_defaulted_to_zero() {
        let state = DOMAIN_CHECKOUT
            .decode(json!({
                "project_id": 2.0,
                "domain_id": 12.0,
                "activity_type_id": 1.0,
                "start_date": "2024-01-01",
                "end_date": "2024-02-01"
            }))
            .unwrap();
        let vars = DOMAIN_CHECKOUT.variables(&state).unwrap();
        assert_eq!(vars["domain_id"], 12);
        assert_eq!(vars["project_id"], 2);
        assert_eq!(vars["activity_type_id"], 1);

        let state = DOMAIN_CHECKOUT
            .decode(json!({"project_id": 2, "domain_id": "12", "activity_type_id": 1}))
            .unwrap();
        let err = DOMAIN_CHECKOUT.variables(&state).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("domain_id"));
    }

    #[test]
    fn test_row_accepts_either_target_column() {
        let row: CheckoutRow = serde_json::from_value(json!({
            "id": 1, "serverId": 4, "projectId": 2, "startDate": "2024-01-01",
            "endDate": "2024-02-01", "note": "x", "activityType": {"id": 7}
        }))
        .unwrap();
        assert_eq!(row.target_id, 4);
        assert_eq!(row.activity_type.id, 7);
    }

    #[test]
    fn test_schema_requires_dates() {
        let schema = CheckoutResource::domain().schema();
        let diagnostics = validate(
            &schema,
            &json!({
                "project_id": 1,
                "domain_id": 2,
                "activity_type_id": 3,
                "start_date": "tomorrow",
                "end_date": "2024-02-01"
            }),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("start_date"));
    }

    #[test]
    fn test_server_checkout_mutation_binds_server_id() {
        assert!(SERVER_CHECKOUT.checkout.contains("serverId: $server_id"));
    }
}
