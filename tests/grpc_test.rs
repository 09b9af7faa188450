use ghostwriter_provider::proto::provider_client::ProviderClient;
use ghostwriter_provider::proto::{
    diagnostic::Severity, ConfigureRequest, GetMetadataRequest, GetSchemaRequest, PlanRequest,
    ReadDataSourceRequest, ReadRequest, StopRequest, ValidateResourceConfigRequest,
};
use ghostwriter_provider::{serve_with_shutdown, GhostwriterProvider, ServeOptions};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn test_grpc_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = serve_with_shutdown(
        GhostwriterProvider::new("test"),
        listener,
        async move {
            let _ = shutdown_rx.await;
        },
        ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5)),
    );

    let client = async move {
        let mut client = ProviderClient::connect(format!("http://{}", addr))
            .await
            .unwrap();

        let metadata = client
            .get_metadata(GetMetadataRequest {})
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata.resources.len(), 7);
        assert_eq!(metadata.data_sources.len(), 4);
        assert!(metadata.resources.contains(&"ghostwriter_oplog".to_string()));

        let schema = client
            .get_schema(GetSchemaRequest {})
            .await
            .unwrap()
            .into_inner();
        let domain = schema.resources["ghostwriter_domain"].block.clone().unwrap();
        let force_delete = domain
            .attributes
            .iter()
            .find(|a| a.name == "force_delete")
            .unwrap();
        assert!(force_delete.optional && force_delete.computed);
        assert_eq!(force_delete.default_value, b"false".to_vec());
        let api_key = schema
            .provider
            .unwrap()
            .block
            .unwrap()
            .attributes
            .into_iter()
            .find(|a| a.name == "api_key")
            .unwrap();
        assert!(api_key.sensitive);

        let configured = client
            .configure(ConfigureRequest {
                config: bytes(json!({"endpoint": "", "api_key": ""})),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(configured.diagnostics.len(), 2);
        assert!(configured
            .diagnostics
            .iter()
            .all(|d| d.severity == Severity::Error as i32));

        let validated = client
            .validate_resource_config(ValidateResourceConfigRequest {
                resource_type: "ghostwriter_domain".to_string(),
                config: bytes(json!({
                    "name": "not a domain",
                    "creation": "2024-01-01",
                    "expiration": "2025-01-01"
                })),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(validated.diagnostics.len(), 1);
        assert_eq!(validated.diagnostics[0].attribute, "name");

        let plan = client
            .plan(PlanRequest {
                resource_type: "ghostwriter_oplog".to_string(),
                prior_state: vec![],
                proposed_state: bytes(json!({"name": "op", "project_id": 1})),
                config: bytes(json!({"name": "op", "project_id": 1})),
            })
            .await
            .unwrap()
            .into_inner();
        assert!(plan.diagnostics.is_empty());
        assert!(!plan.requires_replace);
        let planned: Value = serde_json::from_slice(&plan.planned_state).unwrap();
        assert_eq!(planned["force_delete"], false);
        assert!(plan.changes.iter().any(|c| c.path == "name"));

        // Errors come back as diagnostics, not gRPC failures.
        let read = client
            .read(ReadRequest {
                resource_type: "ghostwriter_oplog".to_string(),
                current_state: bytes(json!({"id": 1})),
            })
            .await
            .unwrap()
            .into_inner();
        assert!(read.state.is_empty());
        assert!(read.diagnostics[0].summary.starts_with("Configuration error"));

        let unknown = client
            .read_data_source(ReadDataSourceRequest {
                data_source_type: "ghostwriter_client".to_string(),
                config: bytes(json!({})),
            })
            .await
            .unwrap()
            .into_inner();
        assert!(unknown.diagnostics[0].summary.starts_with("Unknown resource type"));

        let malformed = client
            .read(ReadRequest {
                resource_type: "ghostwriter_oplog".to_string(),
                current_state: b"{not json".to_vec(),
            })
            .await
            .unwrap()
            .into_inner();
        assert!(malformed.diagnostics[0].summary.starts_with("Serialization error"));

        let stopped = client.stop(StopRequest {}).await.unwrap().into_inner();
        assert!(stopped.error.is_empty());

        let _ = shutdown_tx.send(());
    };

    let (served, ()) = tokio::join!(server, client);
    assert!(served.is_ok());
}
