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

//! Counters for transports and connection pools.
//!
//! Every counter is an atomic so it can be bumped from any task without a
//! lock. With the `observability` feature enabled each update is mirrored to
//! the `metrics` crate facade as well. Counters only grow; read them through
//! the `snapshot` of their owner.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! recorder {
    ($(#[$doc:meta])* $method:ident, $field:ident, $name:literal) => {
        $(#[$doc])*
        pub fn $method(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "observability")]
            ::metrics::counter!($name).increment(1);
        }
    };
    ($(#[$doc:meta])* $method:ident($amount:ident), $field:ident, $name:literal) => {
        $(#[$doc])*
        pub fn $method(&self, $amount: u64) {
            self.$field.fetch_add($amount, Ordering::Relaxed);
            #[cfg(feature = "observability")]
            ::metrics::counter!($name).increment($amount);
        }
    };
}

/// Traffic and lifecycle counters shared by every connection of a pool or
/// a server.
///
/// # Examples
///
/// ```rust
/// use rxnet::observability::TransportMetrics;
///
/// let metrics = TransportMetrics::new();
/// metrics.record_connection_opened();
/// metrics.record_bytes_sent(68);
///
/// let counters = metrics.snapshot();
/// assert_eq!(counters.active(), 1);
/// assert_eq!(counters.bytes_sent, 68);
/// ```
#[derive(Debug, Default)]
pub struct TransportMetrics {
    opened: AtomicU64,
    closed: AtomicU64,
    sent: AtomicU64,
    received: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
}

impl TransportMetrics {
    /// Creates a tracker with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a bridge being installed on a transport.
    pub fn record_connection_opened(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            ::metrics::counter!("rxnet.transport.connections.opened").increment(1);
            ::metrics::gauge!("rxnet.transport.connections.active").increment(1.0);
        }
    }

    /// Records a bridge reaching its closed state.
    pub fn record_connection_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            ::metrics::counter!("rxnet.transport.connections.closed").increment(1);
            ::metrics::gauge!("rxnet.transport.connections.active").decrement(1.0);
        }
    }

    recorder!(
        /// Records frame bytes written, length prefix included.
        record_bytes_sent(bytes), sent, "rxnet.transport.bytes.sent"
    );
    recorder!(
        /// Records frame bytes read, length prefix included.
        record_bytes_received(bytes), received, "rxnet.transport.bytes.received"
    );
    recorder!(
        /// Records a failed read or an undecodable inbound frame.
        record_read_error, read_failures, "rxnet.transport.errors.read"
    );
    recorder!(
        /// Records a failed write.
        record_write_error, write_failures, "rxnet.transport.errors.write"
    );

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.snapshot().active()
    }

    /// Copies the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> TransportCounters {
        TransportCounters {
            connections_opened: self.opened.load(Ordering::Relaxed),
            connections_closed: self.closed.load(Ordering::Relaxed),
            bytes_sent: self.sent.load(Ordering::Relaxed),
            bytes_received: self.received.load(Ordering::Relaxed),
            read_errors: self.read_failures.load(Ordering::Relaxed),
            write_errors: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TransportMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCounters {
    /// Bridges installed.
    pub connections_opened: u64,
    /// Bridges that reached the closed state.
    pub connections_closed: u64,
    /// Frame bytes written.
    pub bytes_sent: u64,
    /// Frame bytes read.
    pub bytes_received: u64,
    /// Failed reads and undecodable frames.
    pub read_errors: u64,
    /// Failed writes.
    pub write_errors: u64,
}

impl TransportCounters {
    /// Connections opened and not yet closed.
    pub fn active(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}

/// Monotonic lifecycle counters of one connection pool.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    acquire_attempted: AtomicU64,
    acquire_succeeded: AtomicU64,
    acquire_failed: AtomicU64,
    release_attempted: AtomicU64,
    release_succeeded: AtomicU64,
    release_failed: AtomicU64,
    creations: AtomicU64,
    reuses: AtomicU64,
    evictions: AtomicU64,
}

impl PoolMetrics {
    /// Creates a tracker with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    recorder!(
        /// Records the start of an acquisition.
        record_acquire_attempted, acquire_attempted, "rxnet.pool.acquire.attempted"
    );
    recorder!(
        /// Records an acquisition that delivered a connection.
        record_acquire_succeeded, acquire_succeeded, "rxnet.pool.acquire.succeeded"
    );
    recorder!(
        /// Records an acquisition that delivered an error.
        record_acquire_failed, acquire_failed, "rxnet.pool.acquire.failed"
    );
    recorder!(
        /// Records the start of a release.
        record_release_attempted, release_attempted, "rxnet.pool.release.attempted"
    );
    recorder!(
        /// Records a release that returned the connection to the idle set.
        record_release_succeeded, release_succeeded, "rxnet.pool.release.succeeded"
    );
    recorder!(
        /// Records a release of a connection that was no longer usable.
        record_release_failed, release_failed, "rxnet.pool.release.failed"
    );
    recorder!(
        /// Records a connection created through the channel factory.
        record_creation, creations, "rxnet.pool.creations"
    );
    recorder!(
        /// Records an idle connection handed out again.
        record_reuse, reuses, "rxnet.pool.reuses"
    );
    recorder!(
        /// Records an idle connection removed from the pool.
        record_eviction, evictions, "rxnet.pool.evictions"
    );

    /// Copies the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> PoolCounters {
        PoolCounters {
            acquire_attempted: self.acquire_attempted.load(Ordering::Relaxed),
            acquire_succeeded: self.acquire_succeeded.load(Ordering::Relaxed),
            acquire_failed: self.acquire_failed.load(Ordering::Relaxed),
            release_attempted: self.release_attempted.load(Ordering::Relaxed),
            release_succeeded: self.release_succeeded.load(Ordering::Relaxed),
            release_failed: self.release_failed.load(Ordering::Relaxed),
            creations: self.creations.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PoolMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounters {
    /// Acquisitions started.
    pub acquire_attempted: u64,
    /// Acquisitions that delivered a connection.
    pub acquire_succeeded: u64,
    /// Acquisitions that delivered an error.
    pub acquire_failed: u64,
    /// Releases started.
    pub release_attempted: u64,
    /// Releases that moved a connection to the idle set.
    pub release_succeeded: u64,
    /// Releases of unusable connections.
    pub release_failed: u64,
    /// Connections created by the channel factory.
    pub creations: u64,
    /// Idle connections handed out again.
    pub reuses: u64,
    /// Idle connections removed by sweep or discard.
    pub evictions: u64,
}
