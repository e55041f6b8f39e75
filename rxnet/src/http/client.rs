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

//! HTTP client request submission over a connection pool.
//!
//! [`HttpClient::submit`] acquires a pooled connection, writes the request,
//! reads the streamed response and hands the connection back: released when
//! the exchange completed cleanly, discarded otherwise. Dropping the
//! submission future at any point discards whatever connection it holds.
//!
//! When the [`RequestCorrelator`] reports a current request, the exchange
//! runs inside a client frame for it, and the request carries the request id
//! and every context value of that request as headers.

use super::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpResponseFrame};
use crate::connection::InputStream;
use crate::context::{self, ContextsContainer, FrameCorrelator, ProcessingEnd, RequestCorrelator};
use crate::pool::{ConnectionPool, PooledConnection};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Default `User-Agent` sent when the request has none.
pub const DEFAULT_USER_AGENT: &str = concat!("rxnet/", env!("CARGO_PKG_VERSION"));

/// Default header carrying the request id between client and server.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Default prefix of the headers carrying context values. The context name
/// follows the prefix.
pub const DEFAULT_CONTEXT_HEADER_PREFIX: &str = "X-Rxnet-Context-";

/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Pool type used by [`HttpClient`].
pub type HttpConnectionPool = ConnectionPool<HttpResponseFrame, HttpRequest>;

/// Client behavior.
///
/// # Examples
///
/// ```rust
/// use rxnet::http::{HttpClientConfig, HttpMethod};
///
/// let config = HttpClientConfig::new().with_follow_redirect(false);
/// assert!(!config.should_follow_redirect(HttpMethod::Get));
///
/// let config = HttpClientConfig::default();
/// assert!(config.should_follow_redirect(HttpMethod::Head));
/// assert!(!config.should_follow_redirect(HttpMethod::Post));
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// `Some(true)` follows every redirect, `Some(false)` none. `None`
    /// follows redirects of `GET` and `HEAD` only.
    pub follow_redirect: Option<bool>,

    /// `User-Agent` added to requests that have none.
    pub user_agent: Option<String>,

    /// Redirect hop limit.
    pub max_redirects: usize,

    /// Header used to propagate the current request id, if any.
    pub request_id_header: Option<String>,

    /// Prefix of the headers propagating context values, if any.
    pub context_header_prefix: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            follow_redirect: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_id_header: Some(DEFAULT_REQUEST_ID_HEADER.to_string()),
            context_header_prefix: Some(DEFAULT_CONTEXT_HEADER_PREFIX.to_string()),
        }
    }
}

impl HttpClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces redirects to be always or never followed.
    pub fn with_follow_redirect(mut self, follow: bool) -> Self {
        self.follow_redirect = Some(follow);
        self
    }

    /// Sets or clears the default `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Sets the redirect hop limit.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Sets or clears the request id header.
    pub fn with_request_id_header(mut self, header: Option<String>) -> Self {
        self.request_id_header = header;
        self
    }

    /// Sets or clears the context header prefix.
    pub fn with_context_header_prefix(mut self, prefix: Option<String>) -> Self {
        self.context_header_prefix = prefix;
        self
    }

    /// Whether a response to a `method` request is followed when it is a
    /// redirect.
    pub fn should_follow_redirect(&self, method: HttpMethod) -> bool {
        match self.follow_redirect {
            Some(follow) => follow,
            None => matches!(method, HttpMethod::Get | HttpMethod::Head),
        }
    }
}

/// Submits requests to the destination of one connection pool.
#[derive(Clone)]
pub struct HttpClient {
    pool: HttpConnectionPool,
    config: HttpClientConfig,
    correlator: Arc<dyn RequestCorrelator>,
}

impl HttpClient {
    /// Creates a client over `pool` correlating through [`FrameCorrelator`].
    pub fn new(pool: HttpConnectionPool, config: HttpClientConfig) -> Self {
        Self {
            pool,
            config,
            correlator: Arc::new(FrameCorrelator),
        }
    }

    /// Replaces the correlator consulted for every submission.
    pub fn with_correlator(mut self, correlator: Arc<dyn RequestCorrelator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &HttpConnectionPool {
        &self.pool
    }

    /// The client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Submits `request` and returns the complete response, following
    /// redirects when [`HttpClientConfig::should_follow_redirect`] says so.
    pub async fn submit(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        if self.config.should_follow_redirect(request.method) {
            self.submit_following_redirects(request).await
        } else {
            self.submit_once(request).await
        }
    }

    async fn submit_following_redirects(
        &self,
        mut request: HttpRequest,
    ) -> Result<HttpResponse, HttpError> {
        let mut visited = HashSet::new();
        visited.insert((request.method, request.uri.clone()));

        for _ in 0..=self.config.max_redirects {
            let response = self.submit_once(request.clone()).await?;
            if !response.is_redirect() {
                return Ok(response);
            }
            let Some(target) = response.location().and_then(|l| self.same_destination(l)) else {
                return Ok(response);
            };

            // 303, and 301/302 after a POST, turn into a GET without a body.
            let becomes_get = response.status == 303
                || (matches!(response.status, 301 | 302) && request.method == HttpMethod::Post);
            if becomes_get && request.method != HttpMethod::Head {
                request.method = HttpMethod::Get;
                request.body.clear();
                request.headers.remove("content-length");
                request.headers.remove("content-type");
            }
            request.uri = target;

            #[cfg(feature = "observability")]
            debug!(
                status = response.status,
                method = %request.method,
                uri = %request.uri,
                "Following redirect"
            );

            if !visited.insert((request.method, request.uri.clone())) {
                return Err(HttpError::RedirectLoop {
                    method: request.method.to_string(),
                    uri: request.uri,
                });
            }
        }

        Err(HttpError::TooManyRedirects {
            max: self.config.max_redirects,
        })
    }

    /// Resolves `location` to a path on this client's destination, `None`
    /// when it points elsewhere.
    ///
    /// Pooled connections are plain text, so an `https` target is another
    /// destination even on the same authority. Scheme-relative locations
    /// (`//host/path`) keep `http`.
    fn same_destination(&self, location: &str) -> Option<String> {
        let rest = if let Some(rest) = location.strip_prefix("//") {
            rest
        } else if location.starts_with('/') {
            return Some(location.to_string());
        } else {
            let (scheme, rest) = location.split_once("://")?;
            if !scheme.eq_ignore_ascii_case("http") {
                return None;
            }
            rest
        };
        let (authority, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, "/"),
        };

        let destination = self.pool.destination();
        let matches = authority.eq_ignore_ascii_case(&destination.authority())
            || (destination.port() == 80 && authority.eq_ignore_ascii_case(destination.host()));
        matches.then(|| path.to_string())
    }

    /// Adds `Host` and a default `User-Agent`, then the request id and the
    /// context values of `outbound`.
    fn enrich(&self, request: &mut HttpRequest, outbound: Option<(&str, &ContextsContainer)>) {
        if !request.headers.contains("host") {
            request.headers.set("Host", self.pool.destination().authority());
        }
        if let Some(user_agent) = &self.config.user_agent {
            if !request.headers.contains("user-agent") {
                request.headers.set("User-Agent", user_agent.clone());
            }
        }

        let Some((request_id, container)) = outbound else {
            return;
        };
        if let Some(header) = &self.config.request_id_header {
            if !request.headers.contains(header) {
                request.headers.set(header.clone(), request_id);
            }
        }
        if let Some(prefix) = &self.config.context_header_prefix {
            for (name, bytes) in container.serialized_contexts() {
                match String::from_utf8(bytes) {
                    Ok(value) => request.headers.set(format!("{prefix}{name}"), value),
                    Err(_) => {
                        #[cfg(feature = "observability")]
                        warn!(request_id, context = %name, "Context is not UTF-8, not propagated");
                    }
                }
            }
        }
    }

    /// Submits `request` over one pooled connection without following
    /// redirects.
    ///
    /// With a current request the exchange runs between
    /// [`RequestCorrelator::before_new_client_request`] and
    /// [`RequestCorrelator::on_client_processing_end`], on a frame stack of
    /// its own so the two stay paired across threads and cancellation.
    pub async fn submit_once(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let Some(request_id) = self.correlator.request_id_for_client_request() else {
            return self.exchange_once(request, None).await;
        };
        let container = self
            .correlator
            .context_for_client_request(&request_id)
            .unwrap_or_default();

        context::bind_current(async {
            let _end = ProcessingEnd::client(self.correlator.as_ref(), &request_id, container.clone())?;
            self.exchange_once(request, Some((&request_id, &container))).await
        })
        .await
    }

    async fn exchange_once(
        &self,
        mut request: HttpRequest,
        outbound: Option<(&str, &ContextsContainer)>,
    ) -> Result<HttpResponse, HttpError> {
        self.enrich(&mut request, outbound);
        let connection = self.pool.acquire().await?;

        match exchange(&connection, request).await {
            Ok(response) if response.closes_connection() => {
                connection.discard();
                Ok(response)
            }
            Ok(response) => {
                connection.release();
                Ok(response)
            }
            Err(error) => {
                #[cfg(feature = "observability")]
                debug!(transport_id = %connection.id(), error = %error, "Exchange failed");

                connection.discard();
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn exchange(
    connection: &PooledConnection<HttpResponseFrame, HttpRequest>,
    request: HttpRequest,
) -> Result<HttpResponse, HttpError> {
    let mut input = connection.input()?;
    connection.write(request).await?;
    read_response(&mut input).await
}

async fn read_response(
    input: &mut InputStream<HttpResponseFrame>,
) -> Result<HttpResponse, HttpError> {
    let (status, headers) = match input.next().await {
        Some(Ok(HttpResponseFrame::Head { status, headers })) => (status, headers),
        Some(Ok(frame)) => {
            return Err(HttpError::Protocol(format!(
                "expected response head, got {frame:?}"
            )));
        }
        Some(Err(error)) => return Err(error.into()),
        None => return Err(HttpError::IncompleteResponse),
    };

    let mut body = Vec::new();
    loop {
        match input.next().await {
            Some(Ok(HttpResponseFrame::Body(chunk))) => body.extend_from_slice(&chunk),
            Some(Ok(HttpResponseFrame::End)) => break,
            Some(Ok(HttpResponseFrame::Head { .. })) => {
                return Err(HttpError::Protocol("second response head".to_string()));
            }
            Some(Err(error)) => return Err(error.into()),
            None => return Err(HttpError::IncompleteResponse),
        }
    }

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
