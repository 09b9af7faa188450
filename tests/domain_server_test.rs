mod common;

use common::{graphql, never, setup};
use ghostwriter_provider::testing::{assert_error_contains, TestError};
use ghostwriter_provider::ProviderError;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains};

const DOMAIN_SERVER: &str = "ghostwriter_domain_server";

fn connection_row(static_id: Value, transient_id: Value) -> Value {
    json!({
        "id": 30,
        "domainId": 7,
        "projectId": 2,
        "staticServerId": static_id,
        "transientServerId": transient_id,
        "subdomain": "*",
        "endpoint": ""
    })
}

#[tokio::test]
async fn test_create_with_cloud_server() {
    let (server, tester) = setup().await;

    graphql(
        "InsertDomainServerConnection",
        json!({"insert_domainServerConnection": {"returning": [connection_row(Value::Null, json!(21))]}}),
    )
    .and(body_string_contains("transientServerId: $cloud_server_id"))
    .and(body_partial_json(json!({
        "variables": {"domain_checkout_id": 7, "cloud_server_id": 21, "subdomain": "*"}
    })))
    .expect(1)
    .mount(&server)
    .await;

    let state = tester
        .lifecycle_create(
            DOMAIN_SERVER,
            json!({"domain_checkout_id": 7, "project_id": 2, "cloud_server_id": 21}),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], 30);
    assert_eq!(state["cloud_server_id"], 21);
    assert_eq!(state["static_server_checkout_id"], 0);
    assert_eq!(state["subdomain"], "*");
}

#[tokio::test]
async fn test_create_with_static_server() {
    let (server, tester) = setup().await;

    graphql(
        "InsertDomainServerConnection",
        json!({"insert_domainServerConnection": {"returning": [connection_row(json!(3), Value::Null)]}}),
    )
    .and(body_string_contains("staticServerId: $static_server_checkout_id"))
    .and(body_partial_json(json!({"variables": {"static_server_checkout_id": 3}})))
    .expect(1)
    .mount(&server)
    .await;

    let state = tester
        .lifecycle_create(
            DOMAIN_SERVER,
            json!({"domain_checkout_id": 7, "project_id": 2, "static_server_checkout_id": 3}),
        )
        .await
        .unwrap();

    assert_eq!(state["static_server_checkout_id"], 3);
    assert_eq!(state["cloud_server_id"], 0);
}

#[tokio::test]
async fn test_create_without_any_server_fails_before_calling_api() {
    let (server, tester) = setup().await;
    never("InsertDomainServerConnection").mount(&server).await;

    let err = tester
        .lifecycle_create(DOMAIN_SERVER, json!({"domain_checkout_id": 7, "project_id": 2}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));
}

#[tokio::test]
async fn test_missing_server_is_a_validation_error() {
    let (_server, tester) = setup().await;

    for config in [
        json!({"domain_checkout_id": 7, "project_id": 2}),
        json!({"domain_checkout_id": 7, "project_id": 2, "static_server_checkout_id": 0, "cloud_server_id": 0.0}),
    ] {
        match tester
            .validate_resource_config(DOMAIN_SERVER, config)
            .await
            .unwrap_err()
        {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "Missing Server Attribute")
            },
            other => panic!("expected diagnostics, got {}", other),
        }
    }

    tester
        .validate_resource_config(
            DOMAIN_SERVER,
            json!({"domain_checkout_id": 7, "project_id": 2, "cloud_server_id": 21.0}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_both_servers_conflict() {
    let (_server, tester) = setup().await;

    let err = tester
        .validate_resource_config(
            DOMAIN_SERVER,
            json!({
                "domain_checkout_id": 7,
                "project_id": 2,
                "static_server_checkout_id": 3,
                "cloud_server_id": 21
            }),
        )
        .await
        .unwrap_err();

    match err {
        TestError::Diagnostics(diagnostics) => {
            assert_error_contains(&diagnostics, "Invalid Attribute Combination")
        },
        other => panic!("expected diagnostics, got {}", other),
    }

    // An explicit zero is the default and does not conflict.
    tester
        .validate_resource_config(
            DOMAIN_SERVER,
            json!({
                "domain_checkout_id": 7,
                "project_id": 2,
                "static_server_checkout_id": 0,
                "cloud_server_id": 21
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_force_delete() {
    let (server, tester) = setup().await;

    graphql(
        "DeleteDomainServer",
        json!({"delete_domainServerConnection": {"returning": [{"id": 30}]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 30}})))
    .expect(1)
    .mount(&server)
    .await;

    tester
        .delete(
            DOMAIN_SERVER,
            json!({"id": 30, "domain_checkout_id": 7, "project_id": 2, "cloud_server_id": 21, "force_delete": true}),
        )
        .await
        .unwrap();
}
