//! wiremock stand-in for the generation service.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use genflow::core::catalog::ModelCatalog;
use genflow::core::http::{HttpTransport, ServiceEndpoint, Transport};
use genflow::core::pipeline::Orchestrator;
use genflow::test_utils::{SequentialIds, make_test_credit_response, make_test_envelope};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Replays responses in order; the last one repeats once the list runs out.
pub struct Sequenced {
    responses: Vec<ResponseTemplate>,
    next: AtomicUsize,
}

impl Sequenced {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty(), "Sequenced needs at least one response");
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }

    /// Success envelopes around each `data` payload.
    pub fn envelopes(data: Vec<Value>) -> Self {
        Self::new(data.into_iter().map(envelope).collect())
    }
}

impl Respond for Sequenced {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.responses[index.min(self.responses.len() - 1)].clone()
    }
}

/// 200 response carrying a success envelope.
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(make_test_envelope(data))
}

pub fn transport(server: &MockServer) -> Arc<dyn Transport> {
    Arc::new(
        HttpTransport::new(ServiceEndpoint {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            ..ServiceEndpoint::default()
        })
        .expect("transport"),
    )
}

/// Orchestrator with a short poll interval and deterministic identifiers.
pub fn orchestrator(server: &MockServer) -> Orchestrator {
    Orchestrator::new(transport(server), ModelCatalog::default(), POLL_INTERVAL)
        .with_id_source(Arc::new(SequentialIds::new()))
}

/// Mount a balance response for every credit query.
pub async fn mount_credit(server: &MockServer, gift: i64) {
    Mock::given(method("POST"))
        .and(path("/commerce/v1/benefits/user_credit"))
        .respond_with(envelope(make_test_credit_response(gift)))
        .mount(server)
        .await;
}

/// Mount `responder` for `verb path`, expecting exactly `calls` hits when set.
pub async fn mount(
    server: &MockServer,
    verb: &str,
    route: &str,
    responder: impl Respond + 'static,
    calls: Option<u64>,
) {
    let mock = Mock::given(method(verb))
        .and(path(route))
        .respond_with(responder);
    let mock = match calls {
        Some(n) => mock.expect(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// Number of requests the server saw for `route`.
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
