mod common;

use common::{graphql, never, setup, GRAPHQL_PATH};
use ghostwriter_provider::ProviderError;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

const DOMAIN_CHECKOUT: &str = "ghostwriter_domain_checkout";
const SERVER_CHECKOUT: &str = "ghostwriter_static_server_checkout";

fn checkout_row(id: i64, target_key: &str, target_id: i64) -> Value {
    let mut row = json!({
        "id": id,
        "projectId": 2,
        "startDate": "2024-01-01",
        "endDate": "2024-02-01",
        "note": null,
        "activityType": {"id": 1}
    });
    row[target_key] = json!(target_id);
    row
}

fn checkout_config(target_attr: &str, target_id: i64) -> Value {
    let mut config = json!({
        "project_id": 2,
        "activity_type_id": 1,
        "start_date": "2024-01-01",
        "end_date": "2024-02-01"
    });
    config[target_attr] = json!(target_id);
    config
}

#[tokio::test]
async fn test_domain_checkout_create_takes_latest() {
    let (server, tester) = setup().await;

    graphql("checkoutDomain", json!({"checkoutDomain": {"result": "success"}}))
        .and(body_partial_json(json!({"variables": {"domain_id": 12, "project_id": 2, "note": ""}})))
        .expect(1)
        .mount(&server)
        .await;
    graphql(
        "order_by",
        json!({"domainCheckout": [checkout_row(7, "domainId", 12), checkout_row(5, "domainId", 12)]}),
    )
    .and(body_partial_json(json!({"variables": {"id": 12}})))
    .expect(1)
    .mount(&server)
    .await;

    let state = tester
        .lifecycle_create(DOMAIN_CHECKOUT, checkout_config("domain_id", 12))
        .await
        .unwrap();

    assert_eq!(state["id"], 7);
    assert_eq!(state["domain_id"], 12);
    assert_eq!(state["activity_type_id"], 1);
    assert_eq!(state["note"], "");
    assert_eq!(state["force_delete"], false);
    assert!(state.get("server_id").is_none());
}

#[tokio::test]
async fn test_domain_checkout_create_without_checkouts_fails() {
    let (server, tester) = setup().await;

    graphql("checkoutDomain", json!({"checkoutDomain": {"result": "success"}}))
        .mount(&server)
        .await;
    graphql("order_by", json!({"domainCheckout": []}))
        .mount(&server)
        .await;

    let err = tester
        .lifecycle_create(DOMAIN_CHECKOUT, checkout_config("domain_id", 12))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Could not obtain any checkouts"));
}

#[tokio::test]
async fn test_domain_checkout_soft_delete_releases_domain() {
    let (server, tester) = setup().await;

    never("DeleteDomainCheckout").mount(&server).await;
    graphql("ReleaseDomain", json!({"update_domain": {"returning": [{"id": 12}]}}))
        .and(body_partial_json(json!({"variables": {"id": 12}})))
        .and(body_string_contains("domainStatusId: 1"))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = checkout_config("domain_id", 12);
    state["id"] = json!(7);
    state["force_delete"] = json!(false);

    tester.delete(DOMAIN_CHECKOUT, state).await.unwrap();
}

#[tokio::test]
async fn test_domain_checkout_force_delete() {
    let (server, tester) = setup().await;

    graphql(
        "DeleteDomainCheckout",
        json!({"delete_domainCheckout": {"returning": [{"id": 7}]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 7}})))
    .expect(1)
    .mount(&server)
    .await;
    graphql("ReleaseDomain", json!({"update_domain": {"returning": [{"id": 12}]}}))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = checkout_config("domain_id", 12);
    state["id"] = json!(7);
    state["force_delete"] = json!(true);

    tester.delete(DOMAIN_CHECKOUT, state).await.unwrap();
}

#[tokio::test]
async fn test_server_checkout_passes_server_id() {
    let (server, tester) = setup().await;

    graphql("checkoutServer", json!({"checkoutServer": {"result": "success"}}))
        .and(body_string_contains("serverId: $server_id"))
        .and(body_partial_json(json!({"variables": {"server_id": 11}})))
        .expect(1)
        .mount(&server)
        .await;
    graphql("order_by", json!({"serverCheckout": [checkout_row(3, "serverId", 11)]}))
        .expect(1)
        .mount(&server)
        .await;

    let state = tester
        .lifecycle_create(SERVER_CHECKOUT, checkout_config("server_id", 11))
        .await
        .unwrap();
    assert_eq!(state["id"], 3);
    assert_eq!(state["server_id"], 11);
}

#[tokio::test]
async fn test_server_checkout_update() {
    let (server, tester) = setup().await;

    let mut row = checkout_row(3, "serverId", 11);
    row["note"] = json!("phishing");
    graphql(
        "UpdateServerCheckout",
        json!({"update_serverCheckout": {"returning": [row]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 3, "server_id": 11, "note": "phishing"}})))
    .expect(1)
    .mount(&server)
    .await;

    let mut prior = checkout_config("server_id", 11);
    prior["id"] = json!(3);
    prior["note"] = json!("");
    prior["force_delete"] = json!(false);
    let mut proposed = checkout_config("server_id", 11);
    proposed["note"] = json!("phishing");

    let state = tester
        .lifecycle_update(SERVER_CHECKOUT, prior, proposed)
        .await
        .unwrap();
    assert_eq!(state["id"], 3);
    assert_eq!(state["note"], "phishing");
}

#[tokio::test]
async fn test_domain_checkout_accepts_integral_float_ids() {
    let (server, tester) = setup().await;

    graphql("checkoutDomain", json!({"checkoutDomain": {"result": "success"}}))
        .and(body_partial_json(json!({
            "variables": {"domain_id": 12, "project_id": 2, "activity_type_id": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;
    graphql("order_by", json!({"domainCheckout": [checkout_row(7, "domainId", 12)]}))
        .and(body_partial_json(json!({"variables": {"id": 12}})))
        .expect(1)
        .mount(&server)
        .await;

    let config = json!({
        "project_id": 2.0,
        "domain_id": 12.0,
        "activity_type_id": 1.0,
        "start_date": "2024-01-01",
        "end_date": "2024-02-01"
    });
    tester
        .validate_resource_config(DOMAIN_CHECKOUT, config.clone())
        .await
        .unwrap();

    let state = tester
        .lifecycle_create(DOMAIN_CHECKOUT, config)
        .await
        .unwrap();
    assert_eq!(state["id"], 7);
    assert_eq!(state["domain_id"], 12);
}

#[tokio::test]
async fn test_domain_checkout_without_domain_id_calls_nothing() {
    let (server, tester) = setup().await;
    never("checkoutDomain").mount(&server).await;

    let mut planned = checkout_config("domain_id", 12);
    planned["domain_id"] = Value::Null;

    let err = tester.create(DOMAIN_CHECKOUT, planned).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_domain_released_when_forced_delete_fails() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("DeleteDomainCheckout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "Foreign key violation"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    graphql("ReleaseDomain", json!({"update_domain": {"returning": [{"id": 12}]}}))
        .and(body_partial_json(json!({"variables": {"id": 12}})))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = checkout_config("domain_id", 12);
    state["id"] = json!(7);
    state["force_delete"] = json!(true);

    let err = tester.delete(DOMAIN_CHECKOUT, state).await.unwrap_err();
    assert!(matches!(err, ProviderError::GraphQl(_)));
    assert!(err.to_string().contains("Foreign key violation"));
}

#[tokio::test]
async fn test_server_checkout_soft_delete_releases_server() {
    let (server, tester) = setup().await;

    never("DeleteServerCheckout").mount(&server).await;
    graphql(
        "ReleaseServer",
        json!({"update_staticServer": {"returning": [{"id": 11}]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 11}})))
    .and(body_string_contains("serverStatusId: 1"))
    .expect(1)
    .mount(&server)
    .await;

    let mut state = checkout_config("server_id", 11);
    state["id"] = json!(3);
    state["force_delete"] = json!(false);

    tester.delete(SERVER_CHECKOUT, state).await.unwrap();
}

#[tokio::test]
async fn test_server_checkout_force_delete() {
    let (server, tester) = setup().await;

    graphql(
        "DeleteServerCheckout",
        json!({"delete_serverCheckout": {"returning": [{"id": 3}]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 3}})))
    .expect(1)
    .mount(&server)
    .await;
    graphql(
        "ReleaseServer",
        json!({"update_staticServer": {"returning": [{"id": 11}]}}),
    )
    .and(body_partial_json(json!({"variables": {"id": 11}})))
    .and(body_string_contains("serverStatusId: 1"))
    .expect(1)
    .mount(&server)
    .await;

    let mut state = checkout_config("server_id", 11);
    state["id"] = json!(3);
    state["force_delete"] = json!(true);

    tester.delete(SERVER_CHECKOUT, state).await.unwrap();
}
