mod common;

use common::{graphql, never, setup};
use serde_json::{json, Value};
use wiremock::matchers::body_partial_json;

const STATIC_SERVER: &str = "ghostwriter_static_server";
const CLOUD_SERVER: &str = "ghostwriter_cloud_server";

fn static_row() -> Value {
    json!({
        "id": 11,
        "name": null,
        "serverProviderId": 2,
        "serverStatusId": 1,
        "ipAddress": "192.168.1.10",
        "note": null
    })
}

fn cloud_row(aux_address: Value) -> Value {
    json!({
        "id": 21,
        "name": "c2-redirector",
        "serverProviderId": 3,
        "activityTypeId": 1,
        "ipAddress": "10.0.0.2",
        "auxAddress": aux_address,
        "projectId": 4,
        "note": "",
        "operatorId": 1,
        "serverRoleId": 2
    })
}

fn cloud_config() -> Value {
    json!({
        "name": "c2-redirector",
        "server_provider_id": 3,
        "activity_type_id": 1,
        "ip_address": "10.0.0.2",
        "project_id": 4,
        "operator_id": 1,
        "server_role_id": 2
    })
}

#[tokio::test]
async fn test_static_server_create_defaults_status() {
    let (server, tester) = setup().await;

    graphql("InsertServer", json!({"insert_staticServer": {"returning": [static_row()]}}))
        .and(body_partial_json(json!({
            "variables": {"ip": "192.168.1.10", "server_status_id": 1, "name": ""}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = tester
        .lifecycle_create(
            STATIC_SERVER,
            json!({"server_provider_id": 2, "ip_address": "192.168.1.10"}),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], 11);
    assert_eq!(state["name"], "");
    assert_eq!(state["server_status_id"], 1);
    assert!(state.get("force_delete").is_none());
}

#[tokio::test]
async fn test_static_server_delete_is_always_hard() {
    let (server, tester) = setup().await;

    graphql("DeleteServer", json!({"delete_staticServer": {"returning": [{"id": 11}]}}))
        .and(body_partial_json(json!({"variables": {"id": 11}})))
        .expect(1)
        .mount(&server)
        .await;

    tester
        .delete(
            STATIC_SERVER,
            json!({"id": 11, "server_provider_id": 2, "ip_address": "192.168.1.10"}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_static_server_rejects_bad_ip() {
    let (_server, tester) = setup().await;

    let result = tester
        .validate_resource_config(
            STATIC_SERVER,
            json!({"server_provider_id": 2, "ip_address": "192.168.1"}),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cloud_server_create_sends_empty_aux_list() {
    let (server, tester) = setup().await;

    graphql(
        "InsertCloudServer",
        json!({"insert_cloudServer": {"returning": [cloud_row(Value::Null)]}}),
    )
    .and(body_partial_json(json!({"variables": {"aux_address": [], "ip": "10.0.0.2"}})))
    .expect(1)
    .mount(&server)
    .await;

    let state = tester
        .lifecycle_create(CLOUD_SERVER, cloud_config())
        .await
        .unwrap();

    assert_eq!(state["id"], 21);
    assert_eq!(state["aux_address"], json!([]));
    assert_eq!(state["force_delete"], false);
}

#[tokio::test]
async fn test_cloud_server_read_refreshes_aux_addresses() {
    let (server, tester) = setup().await;

    graphql(
        "query CloudServer",
        json!({"cloudServer": [cloud_row(json!(["10.0.0.3", "10.0.0.4"]))]}),
    )
    .expect(1)
    .mount(&server)
    .await;

    let mut state = cloud_config();
    state["id"] = json!(21);
    state["aux_address"] = json!([]);

    let read = tester.read(CLOUD_SERVER, state).await.unwrap();
    assert_eq!(read["aux_address"], json!(["10.0.0.3", "10.0.0.4"]));
}

#[tokio::test]
async fn test_cloud_server_soft_delete() {
    let (server, tester) = setup().await;
    never("DeleteCloudServer").mount(&server).await;

    let mut state = cloud_config();
    state["id"] = json!(21);

    tester.lifecycle_delete(CLOUD_SERVER, state).await.unwrap();
}

#[tokio::test]
async fn test_cloud_server_import_by_id() {
    let (server, tester) = setup().await;

    graphql("query CloudServer", json!({"cloudServer": [cloud_row(json!([]))]}))
        .and(body_partial_json(json!({"variables": {"id": 21}})))
        .expect(1)
        .mount(&server)
        .await;

    let imported = tester.import_resource(CLOUD_SERVER, "21").await.unwrap();
    assert_eq!(imported[0].state["ip_address"], "10.0.0.2");
    assert_eq!(imported[0].state["force_delete"], false);
}
