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

//! Pool lifecycle events and statistics.

use crate::observability::PoolCounters;
use crate::transport::TransportId;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A committed state transition of a connection pool.
///
/// Events are emitted while the pool lock is held, so subscribers observe
/// them in commit order. A subscriber only sees events committed after it
/// subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// An acquisition started.
    AcquireAttempted,
    /// An acquisition delivered a connection.
    AcquireSucceeded(TransportId),
    /// An acquisition failed; carries [`PoolError::kind`](super::PoolError::kind).
    AcquireFailed(&'static str),
    /// A release started.
    ReleaseAttempted(TransportId),
    /// A released connection joined the idle set.
    ReleaseSucceeded(TransportId),
    /// A released connection was unusable and was closed.
    ReleaseFailed(TransportId),
    /// The channel factory created a connection.
    Created(TransportId),
    /// An idle connection was handed out again.
    Reused(TransportId),
    /// An idle connection was removed and closed.
    Evicted(TransportId),
    /// An in-use connection was removed and closed.
    Discarded(TransportId),
    /// The pool was shut down.
    Shutdown,
}

/// Subscription to the events of one pool. Ends when the pool is dropped.
pub struct PoolEvents {
    pub(crate) receiver: mpsc::UnboundedReceiver<PoolEvent>,
}

impl Stream for PoolEvents {
    type Item = PoolEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl PoolEvents {
    /// Returns the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<PoolEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Snapshot of a pool's occupancy and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections waiting in the idle set.
    pub idle: usize,
    /// Connections checked out, including creations in flight.
    pub in_use: usize,
    /// Creations in flight (already included in `in_use`).
    pub pending: usize,
    /// `idle + in_use`.
    pub total: usize,
    /// Lifecycle counters.
    pub counters: PoolCounters,
}
