#![allow(dead_code)]

use ghostwriter_provider::testing::ProviderTester;
use ghostwriter_provider::GhostwriterProvider;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Match, Mock, MockBuilder, MockServer, ResponseTemplate};

pub const GRAPHQL_PATH: &str = "/v1/graphql";

/// A fake Ghostwriter plus a provider configured against it.
pub async fn setup() -> (MockServer, ProviderTester<GhostwriterProvider>) {
    let server = MockServer::start().await;
    let endpoint = format!("{}{}", server.uri(), GRAPHQL_PATH);
    let tester = ProviderTester::ghostwriter(&endpoint)
        .await
        .expect("provider should configure against the mock endpoint");
    (server, tester)
}

/// Answer any request whose body mentions `operation` with `{"data": data}`.
pub fn graphql(operation: &str, data: Value) -> GraphqlMock {
    GraphqlMock {
        builder: Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains(operation)),
        response: ResponseTemplate::new(200).set_body_json(json!({ "data": data })),
    }
}

/// A GraphQL mock that still accepts extra matchers before it is finalised.
pub struct GraphqlMock {
    builder: MockBuilder,
    response: ResponseTemplate,
}

impl GraphqlMock {
    pub fn and<M: 'static + Match>(self, matcher: M) -> Self {
        GraphqlMock {
            builder: self.builder.and(matcher),
            response: self.response,
        }
    }

    pub fn build(self) -> Mock {
        self.builder.respond_with(self.response)
    }

    pub fn expect<T: Into<wiremock::Times>>(self, times: T) -> Mock {
        self.build().expect(times)
    }

    pub async fn mount(self, server: &MockServer) {
        self.build().mount(server).await
    }
}

/// A mock that must never be hit.
pub fn never(operation: &str) -> Mock {
    graphql(operation, Value::Null).expect(0)
}
