//! Managed Ghostwriter resources.
//!
//! Each resource owns its schema and maps between its state document and the
//! GraphQL rows Ghostwriter returns. [`GhostwriterProvider`](crate::GhostwriterProvider)
//! routes protocol calls to the matching [`Resource`] by type name.

mod checkout;
mod cloud_server;
mod domain;
mod domain_server;
mod oplog;
mod static_server;

pub use checkout::{CheckoutKind, CheckoutResource, DOMAIN_CHECKOUT, SERVER_CHECKOUT};
pub use cloud_server::CloudServerResource;
pub use domain::DomainResource;
pub use domain_server::DomainServerResource;
pub use oplog::OplogResource;
pub use static_server::StaticServerResource;

use crate::client::GhostwriterClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::as_int64;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A resource type managed through the Ghostwriter API.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `ghostwriter_domain`.
    fn type_name(&self) -> &'static str;

    /// Schema describing the resource's attributes.
    fn schema(&self) -> Schema;

    /// Validate configuration beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        crate::validation::validate(&self.schema(), config)
    }

    /// Create the object and return its state.
    async fn create(&self, client: &GhostwriterClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from Ghostwriter.
    async fn read(&self, client: &GhostwriterClient, current: Value) -> Result<Value, ProviderError>;

    /// Apply planned changes and return the new state.
    async fn update(
        &self,
        client: &GhostwriterClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Remove the object, or leave it to Ghostwriter when deletion is not forced.
    async fn delete(&self, client: &GhostwriterClient, current: Value) -> Result<(), ProviderError>;

    /// Bring an existing object under management by its numeric id.
    async fn import(&self, client: &GhostwriterClient, id: &str) -> Result<Value, ProviderError> {
        let id = parse_import_id(id)?;
        let mut state = serde_json::Map::new();
        state.insert("id".to_string(), Value::from(id));
        if self.schema().attribute("force_delete").is_some() {
            state.insert("force_delete".to_string(), Value::Bool(false));
        }
        self.read(client, Value::Object(state)).await
    }
}

/// Every resource this provider serves.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(DomainResource),
        Box::new(CheckoutResource::domain()),
        Box::new(StaticServerResource),
        Box::new(CheckoutResource::static_server()),
        Box::new(CloudServerResource),
        Box::new(DomainServerResource),
        Box::new(OplogResource),
    ]
}

/// Timestamp recorded in `last_updated`, formatted like `Monday, 02-Jan-06 15:04:05 UTC`.
pub fn last_updated() -> String {
    chrono::Utc::now()
        .format("%A, %d-%b-%y %H:%M:%S UTC")
        .to_string()
}

/// Parse an import id as a decimal integer.
pub fn parse_import_id(id: &str) -> Result<i64, ProviderError> {
    id.trim().parse::<i64>().map_err(|e| {
        ProviderError::InvalidRequest(format!(
            "Error Parsing Import ID: could not parse '{}': {}",
            id, e
        ))
    })
}

/// Decode a state document into a typed model.
///
/// Null attributes are dropped first so `#[serde(default)]` fills them in, and
/// integral floats become integers so `3.0` decodes into an `i64` field.
pub(crate) fn decode_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    let value = match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, integral_floats_as_ints(v)))
                .collect(),
        ),
        Value::Null => {
            return Err(ProviderError::InvalidRequest(
                "resource state is missing".to_string(),
            ))
        },
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

fn integral_floats_as_ints(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => {
            let number = Value::Number(n);
            as_int64(&number).map(Value::from).unwrap_or(number)
        },
        Value::Array(items) => Value::Array(items.into_iter().map(integral_floats_as_ints).collect()),
        other => other,
    }
}

/// Encode a typed model as a state document.
pub(crate) fn encode_state<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// The id of an existing object, required by read, update and delete.
pub(crate) fn require_id(id: Option<i64>, what: &str) -> Result<i64, ProviderError> {
    id.ok_or_else(|| ProviderError::InvalidRequest(format!("{} state has no id", what)))
}

/// Take the single row a mutation or lookup must produce.
pub(crate) fn exactly_one<T>(rows: Vec<T>, context: &str) -> Result<T, ProviderError> {
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), count) {
        (Some(row), 1) => Ok(row),
        (None, _) => Err(ProviderError::NotFound(context.to_string())),
        (Some(_), n) => Err(ProviderError::InvalidResponse(format!(
            "{}: expected exactly one row, got {}",
            context, n
        ))),
    }
}

/// `id` attribute shared by every resource.
pub(crate) fn id_attribute(description: &str) -> Attribute {
    Attribute::computed_int64().with_description(description)
}

/// `last_updated` attribute shared by every resource.
pub(crate) fn last_updated_attribute(what: &str) -> Attribute {
    Attribute::computed_string().with_description(format!(
        "Timestamp of the last update of the {} made by this provider.",
        what
    ))
}

/// `force_delete` attribute shared by soft-deleted resources.
pub(crate) fn force_delete_attribute(what: &str) -> Attribute {
    Attribute::defaulted_bool(false).with_description(format!(
        "If false, the {what} is left in Ghostwriter when it is removed from configuration. \
         If true, the {what} is hard-deleted from Ghostwriter. Default is false."
    ))
}

/// Date attribute validated as `YYYY-MM-DD`.
pub(crate) fn date_attribute(description: &str) -> Attribute {
    Attribute::required_string()
        .with_description(description)
        .with_validator(crate::schema::StringValidator::length_between(1, 256))
        .with_validator(crate::schema::StringValidator::regex(
            r"\d{4}-\d{2}-\d{2}",
            "Date must be in the format YYYY-MM-DD. e.g. 2022-01-01",
        ))
}

/// Required IP address attribute.
pub(crate) fn ip_address_attribute() -> Attribute {
    Attribute::required_string()
        .with_description("The server's IP address.")
        .with_validator(crate::schema::StringValidator::length_between(1, 256))
        .with_validator(crate::schema::StringValidator::regex(
            IP_ADDRESS_PATTERN,
            "Must be an IPv4 or IPv6 address.",
        ))
}

/// IPv4 or IPv6 address pattern.
pub(crate) const IP_ADDRESS_PATTERN: &str =
    r"^(\d{1,3}\.){3}\d{1,3}$|^([0-9a-fA-F]{0,4}:){7}[0-9a-fA-F]{0,4}$";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StringValidator;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Model {
        id: Option<i64>,
        note: String,
        force_delete: bool,
    }

    #[test]
    fn test_last_updated_format() {
        let stamp = last_updated();
        let parsed =
            chrono::NaiveDateTime::parse_from_str(&stamp, "%A, %d-%b-%y %H:%M:%S UTC");
        assert!(parsed.is_ok(), "unexpected timestamp: {}", stamp);
        assert!(stamp.ends_with(" UTC"));
    }

    #[test]
    fn test_parse_import_id() {
        assert_eq!(parse_import_id("42").unwrap(), 42);
        assert_eq!(parse_import_id(" 7 ").unwrap(), 7);

        let err = parse_import_id("abc").unwrap_err();
        assert!(err.to_string().contains("Error Parsing Import ID"));
    }

    #[test]
    fn test_decode_state_treats_null_as_default() {
        let model: Model =
            decode_state(json!({"id": null, "note": null, "force_delete": true})).unwrap();
        assert_eq!(model.id, None);
        assert_eq!(model.note, "");
        assert!(model.force_delete);

        assert!(decode_state::<Model>(Value::Null).is_err());
    }

    #[test]
    fn test_decode_state_accepts_integral_floats() {
        let model: Model = decode_state(json!({"id": 4.0, "note": "n"})).unwrap();
        assert_eq!(model.id, Some(4));

        assert!(decode_state::<Model>(json!({"id": 4.5})).is_err());
    }

    #[test]
    fn test_exactly_one() {
        assert_eq!(exactly_one(vec![1], "row").unwrap(), 1);
        assert!(exactly_one::<i32>(vec![], "row").unwrap_err().is_not_found());
        assert!(matches!(
            exactly_one(vec![1, 2], "row"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_ip_address_pattern() {
        let v = StringValidator::regex(IP_ADDRESS_PATTERN, "IP address must be valid");
        assert!(v.check("192.168.1.10").is_ok());
        assert!(v.check("2001:0db8:0000:0000:0000:ff00:0042:8329").is_ok());
        assert!(v.check("2001:db8:::::ff00:42:8329").is_ok());
        assert!(v.check("10.0.0").is_err());
        assert!(v.check("not-an-ip").is_err());
    }

    #[test]
    fn test_resource_type_names_are_unique() {
        let resources = all();
        let mut names: Vec<_> = resources.iter().map(|r| r.type_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 7);
        assert!(names.iter().all(|n| n.starts_with("ghostwriter_")));
    }
}
