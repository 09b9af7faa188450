//! Schema-driven planning.
//!
//! Every Ghostwriter resource plans the same way: configuration defaults fill
//! in null attributes, computed attributes carry over from the prior state,
//! and the difference between prior and planned state becomes a list of
//! [`AttributeChange`]s.

use crate::schema::{AttributeType, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::as_int64;
use serde_json::{Map, Value};

/// Compute the planned state for a resource.
///
/// `prior` is null when the resource is being created; `proposed` is null
/// when it is being destroyed.
pub fn plan(schema: &Schema, prior: &Value, proposed: &Value) -> PlanResult {
    let prior_obj = prior.as_object();

    let proposed_obj = match proposed.as_object() {
        Some(obj) => obj,
        None => {
            let changes = prior_obj
                .map(|obj| {
                    obj.iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            return PlanResult::with_changes(Value::Null, changes);
        },
    };

    let mut planned = Map::new();
    for (name, attr) in &schema.attributes {
        let configured = proposed_obj.get(name).filter(|v| !v.is_null());
        let value = match (configured, &attr.default) {
            (Some(v), _) => v.clone(),
            // A cleared attribute falls back to its default, not the prior value.
            (None, Some(default)) => default.clone(),
            (None, None) if attr.flags.computed => prior_obj
                .and_then(|p| p.get(name))
                .cloned()
                .unwrap_or(Value::Null),
            (None, None) => Value::Null,
        };
        planned.insert(name.clone(), normalize(&attr.attr_type, value));
    }

    let mut changes = Vec::new();
    for (name, attr) in &schema.attributes {
        let after = planned.get(name).filter(|v| !v.is_null());
        let before = prior_obj.and_then(|p| p.get(name)).filter(|v| !v.is_null());

        match (before, after) {
            (None, Some(after)) => {
                if prior_obj.is_none() && attr.flags.is_computed_only() {
                    continue;
                }
                changes.push(AttributeChange::added(name.clone(), after.clone()));
            },
            (Some(before), None) => {
                changes.push(AttributeChange::removed(name.clone(), before.clone()));
            },
            (Some(before), Some(after)) if before != after => {
                changes.push(AttributeChange::modified(
                    name.clone(),
                    before.clone(),
                    after.clone(),
                ));
            },
            _ => {},
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes)
}

/// Plan integral floats such as `3.0` as integers, the same values validation
/// accepted for int64 attributes.
fn normalize(attr_type: &AttributeType, value: Value) -> Value {
    match attr_type {
        AttributeType::Int64 => as_int64(&value).map(Value::from).unwrap_or(value),
        _ => value,
    }
}
