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

//! Server side of the HTTP exchange.

use super::client::{DEFAULT_CONTEXT_HEADER_PREFIX, DEFAULT_REQUEST_ID_HEADER};
use super::{HttpError, HttpHeaders, HttpRequest, HttpResponseFrame};
use crate::connection::{BoxError, Connection, ConnectionHandler};
use crate::context::{self, ContextsContainer, FrameCorrelator, ProcessingEnd, RequestCorrelator};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::error::Error;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Response under construction by a [`RequestHandler`].
///
/// Status and headers can change until the head is written, which happens
/// on the first [`flush`](Self::flush) or on [`finish`](Self::finish). After
/// that only body chunks can follow.
pub struct HttpServerResponse {
    connection: Connection<HttpRequest, HttpResponseFrame>,
    status: u16,
    headers: HttpHeaders,
    pending_body: Vec<u8>,
    header_written: bool,
    finished: bool,
}

impl HttpServerResponse {
    pub(crate) fn new(connection: Connection<HttpRequest, HttpResponseFrame>) -> Self {
        Self {
            connection,
            status: 200,
            headers: HttpHeaders::new(),
            pending_body: Vec::new(),
            header_written: false,
            finished: false,
        }
    }

    /// Current status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Headers as they stand.
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// Returns `true` once the head went out.
    pub fn is_header_written(&self) -> bool {
        self.header_written
    }

    /// Returns `true` once the response ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> Result<(), HttpError> {
        if self.header_written {
            return Err(HttpError::HeadAlreadySent);
        }
        self.status = status;
        Ok(())
    }

    /// Sets a header.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        if self.header_written {
            return Err(HttpError::HeadAlreadySent);
        }
        self.headers.set(name, value);
        Ok(())
    }

    /// Buffers a body chunk until the next flush.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.pending_body.extend_from_slice(chunk.as_ref());
    }

    /// Drops body bytes not flushed yet.
    pub fn clear_body(&mut self) {
        self.pending_body.clear();
    }

    /// Sends the head if needed, then any buffered body.
    pub async fn flush(&mut self) -> Result<(), HttpError> {
        if self.finished {
            return Ok(());
        }
        if !self.header_written {
            self.header_written = true;
            let head = HttpResponseFrame::Head {
                status: self.status,
                headers: self.headers.clone(),
            };
            self.connection.write(head).await?;
        }
        if !self.pending_body.is_empty() {
            let chunk = std::mem::take(&mut self.pending_body);
            self.connection.write(HttpResponseFrame::Body(chunk)).await?;
        }
        Ok(())
    }

    /// Flushes and ends the response. Idempotent.
    pub async fn finish(&mut self) -> Result<(), HttpError> {
        if self.finished {
            return Ok(());
        }
        self.flush().await?;
        self.finished = true;
        self.connection.write(HttpResponseFrame::End).await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpServerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("header_written", &self.header_written)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Application logic answering one request.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Populates `response` for `request`. The response is finished after
    /// this returns `Ok`.
    async fn handle(
        &self,
        request: HttpRequest,
        response: &mut HttpServerResponse,
    ) -> Result<(), BoxError>;
}

/// Turns a handler failure into a response, before the head was sent.
pub trait ErrorResponseGenerator: Send + Sync + 'static {
    /// Rewrites `response` to describe `error`.
    fn update_response(&self, response: &mut HttpServerResponse, error: &(dyn Error + Send + Sync));
}

/// Answers every failure with `500 Internal Server Error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorResponseGenerator;

impl ErrorResponseGenerator for DefaultErrorResponseGenerator {
    fn update_response(&self, response: &mut HttpServerResponse, error: &(dyn Error + Send + Sync)) {
        // Only called before the head is written, so these cannot fail.
        let _ = response.set_status(500);
        let _ = response.set_header("Content-Type", "text/plain; charset=utf-8");
        response.clear_body();
        response.write(format!("Internal Server Error: {error}"));
    }
}

/// [`ConnectionHandler`] serving HTTP requests one after another on a
/// connection.
///
/// Each request is announced to the [`RequestCorrelator`] before the
/// handler runs and closed after it finishes. The request id comes from the
/// request id header or is freshly generated; context values are rebuilt
/// from the headers under the context prefix. If the handler fails before
/// the head was sent, the error generator writes a fallback response; after
/// that the connection is closed.
pub struct HttpConnectionHandler<H> {
    handler: Arc<H>,
    error_generator: Arc<dyn ErrorResponseGenerator>,
    correlator: Arc<dyn RequestCorrelator>,
    request_id_header: String,
    context_header_prefix: Option<String>,
}

impl<H: RequestHandler> HttpConnectionHandler<H> {
    /// Wraps `handler` with the default error generator.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            error_generator: Arc::new(DefaultErrorResponseGenerator),
            correlator: Arc::new(FrameCorrelator),
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            context_header_prefix: Some(DEFAULT_CONTEXT_HEADER_PREFIX.to_string()),
        }
    }

    /// Replaces the correlator told about every request.
    pub fn with_correlator(mut self, correlator: Arc<dyn RequestCorrelator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// Sets or clears the prefix of headers read as context values.
    pub fn with_context_header_prefix(mut self, prefix: Option<String>) -> Self {
        self.context_header_prefix = prefix;
        self
    }

    /// Replaces the error generator.
    pub fn with_error_generator(mut self, generator: Arc<dyn ErrorResponseGenerator>) -> Self {
        self.error_generator = generator;
        self
    }

    /// Header read for incoming request ids.
    pub fn with_request_id_header(mut self, header: impl Into<String>) -> Self {
        self.request_id_header = header.into();
        self
    }

    fn incoming_contexts(&self, headers: &HttpHeaders) -> ContextsContainer {
        let container = ContextsContainer::new();
        let Some(prefix) = &self.context_header_prefix else {
            return container;
        };
        for (name, value) in headers.iter() {
            let Some(context) = name
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &name[prefix.len()..])
            else {
                continue;
            };
            if !context.is_empty() {
                container.add_serialized_context(context, value.as_bytes());
            }
        }
        container
    }

    async fn respond(
        &self,
        connection: &Connection<HttpRequest, HttpResponseFrame>,
        request: HttpRequest,
    ) -> Result<(), BoxError> {
        let mut response = HttpServerResponse::new(connection.clone());
        match self.handler.handle(request, &mut response).await {
            Ok(()) => {
                response.finish().await?;
                Ok(())
            }
            Err(error) if response.is_header_written() => {
                #[cfg(feature = "observability")]
                warn!(error = %error, "Handler failed after the response head was sent");

                Err(error)
            }
            Err(error) => {
                #[cfg(feature = "observability")]
                debug!(error = %error, "Handler failed, sending error response");

                self.error_generator.update_response(&mut response, &*error);
                response.finish().await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<H: RequestHandler> ConnectionHandler<HttpRequest, HttpResponseFrame>
    for HttpConnectionHandler<H>
{
    async fn handle(
        &self,
        connection: Connection<HttpRequest, HttpResponseFrame>,
    ) -> Result<(), BoxError> {
        let mut input = connection.input()?;
        while let Some(item) = input.next().await {
            let request = item?;
            let request_id = request
                .headers
                .get(&self.request_id_header)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(context::generate_request_id);
            let container = self.incoming_contexts(&request.headers);

            context::scope(async {
                let _end = ProcessingEnd::server(self.correlator.as_ref(), &request_id, container)?;
                self.respond(&connection, request).await
            })
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;
    use crate::transport::MemoryTransport;

    fn response_pair() -> (
        HttpServerResponse,
        Connection<HttpResponseFrame, HttpRequest>,
    ) {
        let (server, client) = MemoryTransport::pair_default();
        let server = Connection::new(server, JsonSerializer::default());
        let client = Connection::new(client, JsonSerializer::default());
        (HttpServerResponse::new(server), client)
    }

    #[tokio::test]
    async fn test_head_locks_after_flush() {
        let (mut response, client) = response_pair();
        let mut input = client.input().unwrap();

        response.set_status(201).unwrap();
        response.write("part");
        response.flush().await.unwrap();
        assert!(response.is_header_written());
        assert!(matches!(
            response.set_header("X-Late", "1"),
            Err(HttpError::HeadAlreadySent)
        ));

        response.finish().await.unwrap();
        response.finish().await.unwrap();

        assert!(matches!(
            input.next().await,
            Some(Ok(HttpResponseFrame::Head { status: 201, .. }))
        ));
        assert_eq!(
            input.next().await.unwrap().unwrap(),
            HttpResponseFrame::Body(b"part".to_vec())
        );
        assert_eq!(input.next().await.unwrap().unwrap(), HttpResponseFrame::End);
    }

    #[tokio::test]
    async fn test_default_error_response() {
        let (mut response, _client) = response_pair();
        response.write("partial");

        let error: BoxError = "database unavailable".into();
        DefaultErrorResponseGenerator.update_response(&mut response, &*error);

        assert_eq!(response.status(), 500);
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(
            response.pending_body,
            b"Internal Server Error: database unavailable".to_vec()
        );
    }

    struct Nothing;

    #[async_trait]
    impl RequestHandler for Nothing {
        async fn handle(
            &self,
            _request: HttpRequest,
            _response: &mut HttpServerResponse,
        ) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_contexts_rebuilt_from_prefixed_headers() {
        let mut headers = HttpHeaders::new();
        headers.set("X-Rxnet-Context-tenant", r#"{"name":"acme","tier":1}"#);
        headers.set("x-rxnet-context-locale", r#""en""#);
        headers.set("X-Rxnet-Context-", "nameless");
        headers.set("Accept", "*/*");

        let container = HttpConnectionHandler::new(Nothing).incoming_contexts(&headers);
        assert_eq!(container.names(), vec!["locale".to_string(), "tenant".to_string()]);
        assert_eq!(
            container.serialized_context("locale"),
            Some(br#""en""#.to_vec())
        );

        let disabled = HttpConnectionHandler::new(Nothing).with_context_header_prefix(None);
        assert!(disabled.incoming_contexts(&headers).is_empty());
    }
}
