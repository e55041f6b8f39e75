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

//! Pooling of outbound connections.
//!
//! A [`ConnectionPool`] serves one [`Destination`](crate::transport::Destination).
//! It hands out [`PooledConnection`]s, takes them back into an idle set on
//! release, and evicts idle connections once they outlive
//! [`PoolConfig::max_idle_time`].
//!
//! # Accounting
//!
//! Every connection the pool knows about is either idle or in use, and
//! creations in flight count as in use from the moment they start:
//!
//! ```text
//!              acquire (miss)                acquire (hit)
//!   factory ────────────────▶ in use ◀───────────────────── idle
//!                               │ ──────── release ────────▶ │
//!                               │                            │
//!                    discard / drop               expire / sweep / discard
//!                               ▼                            ▼
//!                            closed                       closed
//! ```
//!
//! Whether a miss may create a connection is decided by the configured
//! [`AdmissionStrategy`].

mod config;
mod error;
mod events;
#[allow(clippy::module_inception)]
mod pool;
mod pooled;
mod strategy;

pub use config::{DEFAULT_MAX_IDLE_TIME, PoolConfig};
pub use error::PoolError;
pub use events::{PoolEvent, PoolEvents, PoolStats};
pub use pool::ConnectionPool;
pub use pooled::PooledConnection;
pub use strategy::{AdmissionStrategy, MaxConnectionsStrategy, UnboundedStrategy};
