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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! - **[`transport`]**: byte streams (TCP, in-memory) and the factories and
//!   listeners producing them
//! - **[`serialization`]**: message encoding and length-prefixed framing
//! - **[`connection`]**: typed connections over a transport, with an input
//!   stream, a write path and exactly-once close
//! - **[`pool`]**: reusable outbound connections per destination
//! - **[`context`]**: request frames that follow work across tasks and threads
//! - **[`http`]**: request submission with redirect handling, and the
//!   matching server-side handler
//! - **[`server`]**: accept loop serving every inbound connection
//! - **[`observability`]**: metrics and structured logging
//!
//! ## Error Handling
//!
//! Each layer has its own error type ([`TransportError`], [`PoolError`],
//! [`ContextError`], [`HttpError`]); [`RxError`] composes them.
//!
//! ## Safety
//!
//! rxnet is written in 100% safe Rust with `#![deny(unsafe_code)]`.

pub mod connection;
pub mod context;
pub mod error;
pub mod http;
pub mod observability;
pub mod pool;
pub mod serialization;
pub mod server;
pub mod transport;

pub use connection::{BoxError, Connection, ConnectionHandler, ConnectionState};
pub use context::{ContextError, ContextsContainer, Frame, FrameCorrelator, RequestCorrelator};
pub use error::RxError;
pub use http::{HttpClient, HttpClientConfig, HttpError};
pub use observability::{ErrorMetrics, PoolMetrics, TransportMetrics, log_error};
pub use pool::{ConnectionPool, PoolConfig, PoolError, PooledConnection};
pub use server::{Server, ServerConfig};
pub use transport::{ChannelFactory, Destination, Transport, TransportError};
