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

//! Request/response exchanges on top of pooled connections.
//!
//! This is not an HTTP/1.1 implementation: requests and responses are
//! serialized with the connection's [`Serializer`](crate::serialization::Serializer)
//! like any other message. What it provides is the submission protocol
//! around them: pooled connection handling, redirect following, request id
//! and context propagation through the correlator, and error responses.

mod client;
mod error;
mod server;
mod types;

pub use client::{
    DEFAULT_CONTEXT_HEADER_PREFIX, DEFAULT_MAX_REDIRECTS, DEFAULT_REQUEST_ID_HEADER, DEFAULT_USER_AGENT, HttpClient,
    HttpClientConfig, HttpConnectionPool,
};
pub use error::HttpError;
pub use server::{
    DefaultErrorResponseGenerator, ErrorResponseGenerator, HttpConnectionHandler,
    HttpServerResponse, RequestHandler,
};
pub use types::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpResponseFrame};
