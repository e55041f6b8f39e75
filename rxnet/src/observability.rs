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

//! Metrics and structured logging.
//!
//! - [`TransportMetrics`]: connection lifecycle and bytes moved
//! - [`PoolMetrics`]: acquire/release/creation/reuse/eviction counters
//! - [`ErrorMetrics`]: errors by layer
//! - [`log_error`]: logs an [`RxError`] at a level matching its severity
//!
//! All counters are atomics and always available. With the `observability`
//! feature (on by default) every update is mirrored to the `metrics` crate
//! facade and the crate emits `tracing` events; install a recorder and a
//! subscriber to collect them:
//!
//! ```rust,ignore
//! use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(tracing_subscriber::EnvFilter::from_default_env())
//!     .init();
//! ```
//!
//! Exported metric names:
//!
//! - `rxnet.transport.connections.opened` / `.closed` / `.active`
//! - `rxnet.transport.bytes.sent` / `.received`
//! - `rxnet.pool.acquire.attempted` / `.succeeded` / `.failed`
//! - `rxnet.pool.release.attempted` / `.succeeded` / `.failed`
//! - `rxnet.pool.creations`, `rxnet.pool.reuses`, `rxnet.pool.evictions`
//! - `rxnet.errors.<layer>`

mod metrics;

pub use self::metrics::{PoolCounters, PoolMetrics, TransportCounters, TransportMetrics};

use crate::RxError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error counts by layer.
///
/// # Examples
///
/// ```rust
/// use rxnet::RxError;
/// use rxnet::observability::ErrorMetrics;
/// use rxnet::transport::TransportError;
///
/// let metrics = ErrorMetrics::new();
/// metrics.record_error(&RxError::Transport(TransportError::Closed));
/// assert_eq!(metrics.transport_errors(), 1);
/// assert_eq!(metrics.total_errors(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ErrorMetrics {
    transport_errors: AtomicU64,
    pool_errors: AtomicU64,
    context_errors: AtomicU64,
    http_errors: AtomicU64,
    application_errors: AtomicU64,
    recoverable_errors: AtomicU64,
}

impl ErrorMetrics {
    /// Creates a tracker with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `error` under its layer.
    pub fn record_error(&self, error: &RxError) {
        let (counter, _name) = match error {
            RxError::Transport(_) => (&self.transport_errors, "rxnet.errors.transport"),
            RxError::Pool(_) => (&self.pool_errors, "rxnet.errors.pool"),
            RxError::Context(_) => (&self.context_errors, "rxnet.errors.context"),
            RxError::Http(_) => (&self.http_errors, "rxnet.errors.http"),
            RxError::Application(_) => (&self.application_errors, "rxnet.errors.application"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if error.is_recoverable() {
            self.recoverable_errors.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "observability")]
        ::metrics::counter!(_name).increment(1);
    }

    /// Transport errors recorded.
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Pool errors recorded.
    pub fn pool_errors(&self) -> u64 {
        self.pool_errors.load(Ordering::Relaxed)
    }

    /// Context errors recorded.
    pub fn context_errors(&self) -> u64 {
        self.context_errors.load(Ordering::Relaxed)
    }

    /// HTTP errors recorded.
    pub fn http_errors(&self) -> u64 {
        self.http_errors.load(Ordering::Relaxed)
    }

    /// Application errors recorded.
    pub fn application_errors(&self) -> u64 {
        self.application_errors.load(Ordering::Relaxed)
    }

    /// Recorded errors that were recoverable.
    pub fn recoverable_errors(&self) -> u64 {
        self.recoverable_errors.load(Ordering::Relaxed)
    }

    /// All errors recorded.
    pub fn total_errors(&self) -> u64 {
        self.transport_errors()
            + self.pool_errors()
            + self.context_errors()
            + self.http_errors()
            + self.application_errors()
    }
}

/// Logs `error` with structured fields.
///
/// Errors that close a connection log at `ERROR`, recoverable pool and
/// transport errors at `WARN`, application errors at `INFO`.
#[cfg(feature = "observability")]
pub fn log_error(error: &RxError) {
    let recoverable = error.is_recoverable();
    let should_close_connection = error.should_close_connection();
    match error {
        RxError::Application(e) => {
            tracing::info!(error = %e, "Application error occurred");
        }
        _ if should_close_connection => {
            tracing::error!(
                error = %error,
                recoverable,
                should_close_connection,
                "Connection error occurred"
            );
        }
        RxError::Transport(_) | RxError::Pool(_) if recoverable => {
            tracing::warn!(error = %error, recoverable, "Recoverable error occurred");
        }
        _ => {
            tracing::error!(error = %error, recoverable, "Error occurred");
        }
    }
}

/// Logs `error` with structured fields (no-op without the `observability`
/// feature).
#[cfg(not(feature = "observability"))]
#[inline]
pub fn log_error(_error: &RxError) {}
