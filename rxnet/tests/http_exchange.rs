//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! End-to-end request submission against an in-process server.
//!
//! The client and server are joined by a memory channel factory, so every
//! request goes through the pool, the framed connection bridge, the accept
//! loop and the per-request correlator frame.

use async_trait::async_trait;
use parking_lot::Mutex;
use rxnet::connection::BoxError;
use rxnet::context::{
    self, ContextError, ContextsContainer, Frame, FrameCorrelator, JsonContextSerializer,
    RequestCorrelator,
};
use rxnet::http::{
    HttpClient, HttpClientConfig, HttpError, HttpMethod, HttpRequest, HttpServerResponse,
    HttpConnectionHandler, RequestHandler,
};
use rxnet::pool::{ConnectionPool, PoolConfig, PoolEvent};
use rxnet::serialization::JsonSerializer;
use rxnet::server::{Server, ServerConfig, ShutdownHandle};
use rxnet::transport::{
    ChannelFactory, Destination, MemoryChannelFactory, Transport, TransportError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq)]
struct Seen {
    method: HttpMethod,
    uri: String,
    request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tenant {
    name: String,
    tier: u8,
}

#[derive(Default)]
struct Routes {
    seen: Arc<Mutex<Vec<Seen>>>,
}

fn redirect(response: &mut HttpServerResponse, status: u16, location: &str) -> Result<(), BoxError> {
    response.set_status(status)?;
    response.set_header("Location", location)?;
    Ok(())
}

#[async_trait]
impl RequestHandler for Routes {
    async fn handle(
        &self,
        request: HttpRequest,
        response: &mut HttpServerResponse,
    ) -> Result<(), BoxError> {
        self.seen.lock().push(Seen {
            method: request.method,
            uri: request.uri.clone(),
            request_id: context::current_request_id(),
        });

        let path = request.uri.as_str();
        match path {
            "/ok" => response.write("ok"),
            "/echo-method" => response.write(request.method.as_str()),
            "/whoami" => response.write(context::current_request_id().unwrap_or_default()),
            "/tenant" => {
                let tenant = context::current_container()
                    .map(|container| container.get_context::<Tenant, _>("tenant", &JsonContextSerializer))
                    .transpose()?
                    .flatten();
                match tenant {
                    Some(tenant) => response.write(format!("{}/{}", tenant.name, tenant.tier)),
                    None => response.write("anonymous"),
                }
            }
            "/moved" => redirect(response, 301, "/ok")?,
            "/found" => redirect(response, 302, "/ok")?,
            "/see-other" => redirect(response, 303, "/echo-method")?,
            "/post-found" => redirect(response, 302, "/echo-method")?,
            "/absolute" => redirect(response, 302, "http://memory/ok")?,
            "/elsewhere" => redirect(response, 302, "http://other.example/ok")?,
            "/loop-a" => redirect(response, 302, "/loop-b")?,
            "/loop-b" => redirect(response, 302, "/loop-a")?,
            "/close" => {
                response.set_header("Connection", "close")?;
                response.write("bye");
            }
            "/fail" => return Err("boom".into()),
            "/fail-after-head" => {
                response.write("partial");
                response.flush().await?;
                return Err("late failure".into());
            }
            "/slow" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                response.write("slow");
            }
            _ => match path.strip_prefix("/chain/").and_then(|n| n.parse::<u32>().ok()) {
                Some(0) => response.write("end of chain"),
                Some(n) => redirect(response, 302, &format!("/chain/{}", n - 1))?,
                None => response.set_status(404)?,
            },
        }
        Ok(())
    }
}

struct Harness {
    client: HttpClient,
    factory: MemoryChannelFactory,
    seen: Arc<Mutex<Vec<Seen>>>,
    shutdown: ShutdownHandle,
    server: JoinHandle<Result<(), TransportError>>,
}

impl Harness {
    fn start(config: HttpClientConfig) -> Self {
        Self::start_with(config, |factory| Arc::new(factory) as Arc<dyn ChannelFactory>)
    }

    /// Starts with the client's channel factory wrapped by `wrap`.
    fn start_with(
        config: HttpClientConfig,
        wrap: impl FnOnce(MemoryChannelFactory) -> Arc<dyn ChannelFactory>,
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let (factory, listener) = MemoryChannelFactory::new();
        let routes = Routes::default();
        let seen = Arc::clone(&routes.seen);

        let server = Server::new(listener, ServerConfig::default());
        let shutdown = server.shutdown_handle();
        let handler = Arc::new(HttpConnectionHandler::new(routes));
        let server = tokio::spawn(async move {
            server.serve(JsonSerializer::default(), handler).await
        });

        let pool = ConnectionPool::new(
            Destination::new("memory", 80),
            wrap(factory.clone()),
            JsonSerializer::default(),
            PoolConfig::default(),
        );
        Self {
            client: HttpClient::new(pool, config),
            factory,
            seen,
            shutdown,
            server,
        }
    }

    fn uris(&self) -> Vec<String> {
        self.seen.lock().iter().map(|seen| seen.uri.clone()).collect()
    }

    async fn stop(self) {
        self.client.pool().shutdown();
        self.shutdown.shutdown();
        self.server.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_plain_get() {
    let harness = Harness::start(HttpClientConfig::default());

    let response = harness.client.submit(HttpRequest::get("/ok")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "ok");

    let stats = harness.client.pool().stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.in_use, 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_sequential_requests_share_one_connection() {
    let harness = Harness::start(HttpClientConfig::default());

    for _ in 0..3 {
        let response = harness.client.submit(HttpRequest::get("/ok")).await.unwrap();
        assert_eq!(response.text(), "ok");
    }

    assert_eq!(harness.factory.connect_count(), 1);
    let counters = harness.client.pool().stats().counters;
    assert_eq!(counters.creations, 1);
    assert_eq!(counters.reuses, 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_get_follows_redirects_by_default() {
    let harness = Harness::start(HttpClientConfig::default());

    for start in ["/moved", "/found", "/absolute"] {
        let response = harness.client.submit(HttpRequest::get(start)).await.unwrap();
        assert_eq!(response.status, 200, "redirect from {start}");
        assert_eq!(response.text(), "ok");
    }

    let response = harness.client.submit(HttpRequest::get("/chain/3")).await.unwrap();
    assert_eq!(response.text(), "end of chain");
    assert_eq!(
        harness.uris()[6..],
        ["/chain/3", "/chain/2", "/chain/1", "/chain/0"]
    );

    harness.stop().await;
}

#[tokio::test]
async fn test_post_redirect_not_followed_by_default() {
    let harness = Harness::start(HttpClientConfig::default());

    let response = harness
        .client
        .submit(HttpRequest::post("/post-found").with_body("payload"))
        .await
        .unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(response.location(), Some("/echo-method"));
    assert_eq!(harness.uris(), ["/post-found"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_post_redirect_becomes_get_when_enabled() {
    let harness = Harness::start(HttpClientConfig::default().with_follow_redirect(true));

    let response = harness
        .client
        .submit(HttpRequest::post("/post-found").with_body("payload"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "GET");

    let response = harness
        .client
        .submit(HttpRequest::post("/see-other"))
        .await
        .unwrap();
    assert_eq!(response.text(), "GET");

    harness.stop().await;
}

#[tokio::test]
async fn test_redirects_disabled() {
    let harness = Harness::start(HttpClientConfig::default().with_follow_redirect(false));

    let response = harness.client.submit(HttpRequest::get("/found")).await.unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(harness.uris(), ["/found"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_redirect_to_other_destination_is_returned() {
    let harness = Harness::start(HttpClientConfig::default());

    let response = harness.client.submit(HttpRequest::get("/elsewhere")).await.unwrap();
    assert_eq!(response.status, 302);
    assert_eq!(response.location(), Some("http://other.example/ok"));

    harness.stop().await;
}

#[tokio::test]
async fn test_too_many_redirects() {
    let harness = Harness::start(HttpClientConfig::default().with_max_redirects(2));

    let error = harness
        .client
        .submit(HttpRequest::get("/chain/10"))
        .await
        .unwrap_err();
    assert!(matches!(error, HttpError::TooManyRedirects { max: 2 }));
    // The original request plus two followed hops.
    assert_eq!(harness.uris().len(), 3);

    harness.stop().await;
}

#[tokio::test]
async fn test_redirect_loop_detected() {
    let harness = Harness::start(HttpClientConfig::default());

    let error = harness.client.submit(HttpRequest::get("/loop-a")).await.unwrap_err();
    match error {
        HttpError::RedirectLoop { method, uri } => {
            assert_eq!(method, "GET");
            assert_eq!(uri, "/loop-a");
        }
        other => panic!("expected a redirect loop, got {other:?}"),
    }
    assert_eq!(harness.uris(), ["/loop-a", "/loop-b"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_request_id_propagates_from_client_frame() {
    let harness = Harness::start(HttpClientConfig::default());

    let frame = Frame::new("req-7f3a", ContextsContainer::new()).unwrap();
    let response = context::bind(Some(frame), harness.client.submit(HttpRequest::get("/whoami")))
        .await
        .unwrap();
    assert_eq!(response.text(), "req-7f3a");
    assert_eq!(harness.seen.lock()[0].request_id.as_deref(), Some("req-7f3a"));

    harness.stop().await;
}

#[tokio::test]
async fn test_context_values_travel_with_the_request() {
    let harness = Harness::start(HttpClientConfig::default());

    let container = ContextsContainer::new();
    container
        .add_context(
            "tenant",
            Tenant {
                name: "acme".to_string(),
                tier: 3,
            },
            &JsonContextSerializer,
        )
        .unwrap();
    let frame = Frame::new("req-ctx", container).unwrap();
    let response = context::bind(Some(frame), harness.client.submit(HttpRequest::get("/tenant")))
        .await
        .unwrap();
    assert_eq!(response.text(), "acme/3");

    // Without a current request nothing is propagated.
    let response = harness.client.submit(HttpRequest::get("/tenant")).await.unwrap();
    assert_eq!(response.text(), "anonymous");

    harness.stop().await;
}

#[tokio::test]
async fn test_context_headers_disabled() {
    let harness =
        Harness::start(HttpClientConfig::default().with_context_header_prefix(None));

    let container = ContextsContainer::new();
    container.add_serialized_context("tenant", br#"{"name":"globex","tier":1}"#.to_vec());
    let frame = Frame::new("req-quiet", container).unwrap();
    let response = context::bind(Some(frame), harness.client.submit(HttpRequest::get("/tenant")))
        .await
        .unwrap();
    assert_eq!(response.text(), "anonymous");

    harness.stop().await;
}

/// Records the frame that is current while the pool opens a connection.
struct ObservingFactory {
    inner: MemoryChannelFactory,
    observed: Arc<Mutex<Vec<(Option<String>, usize)>>>,
}

#[async_trait]
impl ChannelFactory for ObservingFactory {
    async fn connect(&self, destination: &Destination) -> Result<Box<dyn Transport>, TransportError> {
        self.observed
            .lock()
            .push((context::current_request_id(), context::depth()));
        self.inner.connect(destination).await
    }
}

/// Counts correlator hooks on top of the frame stack.
#[derive(Default)]
struct CountingCorrelator {
    inner: FrameCorrelator,
    started: Mutex<Vec<String>>,
    ended: Mutex<Vec<String>>,
}

impl RequestCorrelator for CountingCorrelator {
    fn request_id_for_client_request(&self) -> Option<String> {
        self.inner.request_id_for_client_request()
    }

    fn context_for_client_request(&self, request_id: &str) -> Option<ContextsContainer> {
        self.inner.context_for_client_request(request_id)
    }

    fn on_new_server_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError> {
        self.inner.on_new_server_request(request_id, container)
    }

    fn before_new_client_request(
        &self,
        request_id: &str,
        container: ContextsContainer,
    ) -> Result<(), ContextError> {
        self.started.lock().push(request_id.to_string());
        self.inner.before_new_client_request(request_id, container)
    }

    fn on_server_processing_end(&self, request_id: &str) {
        self.inner.on_server_processing_end(request_id);
    }

    fn on_client_processing_end(&self, request_id: &str) {
        self.ended.lock().push(request_id.to_string());
        self.inner.on_client_processing_end(request_id);
    }
}

#[tokio::test]
async fn test_exchange_runs_inside_client_frame() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::start_with(HttpClientConfig::default(), |factory| {
        Arc::new(ObservingFactory {
            inner: factory,
            observed: Arc::clone(&observed),
        }) as Arc<dyn ChannelFactory>
    });
    let correlator = Arc::new(CountingCorrelator::default());
    let client = harness.client.clone().with_correlator(correlator.clone());

    let frame = Frame::new("req-outer", ContextsContainer::new()).unwrap();
    let depth_after = context::bind(Some(frame), async {
        for _ in 0..2 {
            let response = client.submit(HttpRequest::get("/whoami")).await.unwrap();
            assert_eq!(response.text(), "req-outer");
        }
        context::depth()
    })
    .await;

    // Only the first submission connects; it saw the client frame on top of
    // the caller's.
    assert_eq!(*observed.lock(), vec![(Some("req-outer".to_string()), 2)]);
    assert_eq!(depth_after, 1);
    assert_eq!(*correlator.started.lock(), ["req-outer", "req-outer"]);
    assert_eq!(*correlator.ended.lock(), ["req-outer", "req-outer"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_server_generates_request_id_without_header() {
    let harness = Harness::start(HttpClientConfig::default().with_request_id_header(None));

    let frame = Frame::new("not-sent", ContextsContainer::new()).unwrap();
    let response = context::bind(Some(frame), harness.client.submit(HttpRequest::get("/whoami")))
        .await
        .unwrap();
    let generated = response.text();
    assert_ne!(generated, "not-sent");
    assert_eq!(generated.len(), 36);

    harness.stop().await;
}

#[tokio::test]
async fn test_handler_error_becomes_500() {
    let harness = Harness::start(HttpClientConfig::default());

    let response = harness.client.submit(HttpRequest::get("/fail")).await.unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.text(), "Internal Server Error: boom");

    // The connection survives a handled failure.
    let response = harness.client.submit(HttpRequest::get("/ok")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(harness.factory.connect_count(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_failure_after_head_drops_connection() {
    let harness = Harness::start(HttpClientConfig::default());

    let error = harness
        .client
        .submit(HttpRequest::get("/fail-after-head"))
        .await
        .unwrap_err();
    assert!(error.poisons_connection(), "unexpected error {error:?}");

    let stats = harness.client.pool().stats();
    assert_eq!(stats.total, 0);

    let response = harness.client.submit(HttpRequest::get("/ok")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(harness.factory.connect_count(), 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_connection_close_response_is_not_pooled() {
    let harness = Harness::start(HttpClientConfig::default());
    let mut events = harness.client.pool().events();

    let response = harness.client.submit(HttpRequest::get("/close")).await.unwrap();
    assert_eq!(response.text(), "bye");
    assert_eq!(harness.client.pool().stats().total, 0);

    let mut discarded = false;
    while let Some(event) = events.try_next() {
        discarded |= matches!(event, PoolEvent::Discarded(_));
    }
    assert!(discarded);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_connection_obtained() {
    let harness = Harness::start(HttpClientConfig::default());
    harness.factory.set_connect_delay(Some(Duration::from_secs(10)));

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        harness.client.submit(HttpRequest::get("/ok")),
    )
    .await;
    assert!(outcome.is_err());

    let stats = harness.client.pool().stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.counters.creations, 0);
    assert_eq!(harness.factory.connect_count(), 0);

    harness.factory.set_connect_delay(None);
    let response = harness.client.submit(HttpRequest::get("/ok")).await.unwrap();
    assert_eq!(response.status, 200);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_connection_obtained() {
    let harness = Harness::start(HttpClientConfig::default());
    let mut events = harness.client.pool().events();

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        harness.client.submit(HttpRequest::get("/slow")),
    )
    .await;
    assert!(outcome.is_err());

    let stats = harness.client.pool().stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.counters.creations, 1);
    assert_eq!(stats.counters.release_succeeded, 0);

    let mut seen = Vec::new();
    while let Some(event) = events.try_next() {
        seen.push(event);
    }
    assert!(matches!(seen.last(), Some(PoolEvent::Discarded(_))), "{seen:?}");

    harness.stop().await;
}
