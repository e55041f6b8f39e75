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

use super::pool::PoolShared;
use crate::connection::Connection;
use crate::transport::TransportId;
use std::ops::Deref;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::Instant;

/// A connection tracked by the pool, with its idle bookkeeping.
pub(crate) struct PoolEntry<I, O> {
    pub(crate) connection: Connection<I, O>,
    pub(crate) last_returned_at: Option<Instant>,
    pub(crate) max_idle_time: Duration,
}

impl<I, O> PoolEntry<I, O> {
    pub(crate) fn new(connection: Connection<I, O>, max_idle_time: Duration) -> Self {
        Self {
            connection,
            last_returned_at: None,
            max_idle_time,
        }
    }

    pub(crate) fn id(&self) -> TransportId {
        self.connection.id()
    }

    /// Idle for longer than the configured budget at `now`.
    pub(crate) fn idle_expired(&self, now: Instant) -> bool {
        match self.last_returned_at {
            Some(returned_at) => now.saturating_duration_since(returned_at) > self.max_idle_time,
            None => false,
        }
    }

    /// Usable while sitting in the idle set.
    pub(crate) fn usable_idle(&self, now: Instant) -> bool {
        self.connection.is_open() && !self.idle_expired(now)
    }
}

/// A connection checked out of a [`ConnectionPool`](super::ConnectionPool).
///
/// The holder has exclusive use of the connection until it gives it back
/// with [`release`](Self::release) or gives it up with
/// [`discard`](Self::discard). Dropping a `PooledConnection` without either
/// discards it: a connection abandoned mid-exchange is never reused.
///
/// Dereferences to the underlying [`Connection`].
pub struct PooledConnection<I, O> {
    entry: Option<PoolEntry<I, O>>,
    pool: Weak<PoolShared<I, O>>,
}

impl<I, O> PooledConnection<I, O> {
    pub(crate) fn checked_out(entry: PoolEntry<I, O>, pool: Weak<PoolShared<I, O>>) -> Self {
        Self {
            entry: Some(entry),
            pool,
        }
    }

    fn entry(&self) -> &PoolEntry<I, O> {
        // Only `release`, `discard` and `drop` take the entry, and all of
        // them consume `self`.
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after hand-back"),
        }
    }

    /// Id of the underlying transport.
    pub fn id(&self) -> TransportId {
        self.entry().id()
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection<I, O> {
        &self.entry().connection
    }

    /// When this connection was last returned to the idle set, `None` if it
    /// was freshly created for this checkout.
    pub fn last_returned_at(&self) -> Option<Instant> {
        self.entry().last_returned_at
    }

    /// A checked-out connection is usable while it is open; idle time does
    /// not apply until it is released.
    pub fn usable(&self) -> bool {
        self.entry().connection.is_open()
    }

    /// Returns the connection to the pool's idle set. A connection that is
    /// no longer usable is closed instead.
    pub fn release(mut self) {
        if let Some(entry) = self.entry.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.release(entry),
                None => entry.connection.close(),
            }
        }
    }

    /// Removes the connection from the pool and closes it.
    pub fn discard(mut self) {
        self.discard_entry();
    }

    fn discard_entry(&mut self) {
        if let Some(entry) = self.entry.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.discard_checked_out(entry),
                None => entry.connection.close(),
            }
        }
    }
}

impl<I, O> Deref for PooledConnection<I, O> {
    type Target = Connection<I, O>;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl<I, O> Drop for PooledConnection<I, O> {
    fn drop(&mut self) {
        self.discard_entry();
    }
}

impl<I, O> std::fmt::Debug for PooledConnection<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.entry.as_ref().map(|e| &e.connection))
            .field(
                "last_returned_at",
                &self.entry.as_ref().and_then(|e| e.last_returned_at),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::JsonSerializer;
    use crate::transport::MemoryTransport;

    fn entry(max_idle: Duration) -> (PoolEntry<String, String>, MemoryTransport) {
        let (a, b) = MemoryTransport::pair_default();
        let connection = Connection::new(a, JsonSerializer::default());
        (PoolEntry::new(connection, max_idle), b)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_usability_follows_budget() {
        let (mut entry, _peer) = entry(Duration::from_secs(10));
        entry.last_returned_at = Some(Instant::now());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(entry.usable_idle(Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!entry.usable_idle(Instant::now()));
    }

    #[tokio::test]
    async fn test_closed_connection_not_usable() {
        let (entry, _peer) = entry(Duration::from_secs(10));
        assert!(entry.usable_idle(Instant::now()));
        entry.connection.close();
        assert!(!entry.usable_idle(Instant::now()));
    }

    #[tokio::test]
    async fn test_fresh_entry_never_expires() {
        let (entry, _peer) = entry(Duration::ZERO);
        assert!(!entry.idle_expired(Instant::now() + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_orphaned_checkout_closes_on_drop() {
        let (entry, _peer) = entry(Duration::from_secs(10));
        let connection = entry.connection.clone();
        let pooled = PooledConnection::checked_out(entry, Weak::new());
        assert!(pooled.usable());
        drop(pooled);
        connection.closed().await;
    }
}
