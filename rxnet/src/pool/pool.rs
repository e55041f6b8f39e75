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

//! Connection pool for one destination.
//!
//! All pool state lives behind one lock: the idle set, the in-use set, the
//! number of creations in flight and the event subscribers. Every state
//! transition and the event describing it are committed under that lock.
//! The total is counted on its own as connections are reserved, created and
//! removed, and equals `idle + in_use` whenever the lock is free.

use super::events::{PoolEvent, PoolEvents, PoolStats};
use super::pooled::{PoolEntry, PooledConnection};
use super::{PoolConfig, PoolError};
use crate::connection::Connection;
use crate::observability::{PoolMetrics, TransportMetrics};
use crate::serialization::Serializer;
use crate::transport::{ChannelFactory, Destination, Transport, TransportId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[cfg(feature = "observability")]
use tracing::{debug, warn};

type Pipeline<I, O> = Box<dyn Fn(Box<dyn Transport>) -> Connection<I, O> + Send + Sync>;

struct PoolState<I, O> {
    /// Oldest return at the front.
    idle: VecDeque<PoolEntry<I, O>>,
    in_use: HashMap<TransportId, Connection<I, O>>,
    reserved: usize,
    /// Reserved slots plus live connections.
    total: usize,
    shutdown: bool,
    subscribers: Vec<mpsc::UnboundedSender<PoolEvent>>,
}

impl<I, O> PoolState<I, O> {

    fn emit(&mut self, event: PoolEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

pub(crate) struct PoolShared<I, O> {
    destination: Destination,
    factory: Arc<dyn ChannelFactory>,
    pipeline: Pipeline<I, O>,
    config: PoolConfig,
    metrics: PoolMetrics,
    transport_metrics: Arc<TransportMetrics>,
    state: Mutex<PoolState<I, O>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<I, O> PoolShared<I, O> {
    fn fail(&self, state: &mut PoolState<I, O>, error: PoolError) -> PoolError {
        self.metrics.record_acquire_failed();
        state.emit(PoolEvent::AcquireFailed(error.kind()));

        #[cfg(feature = "observability")]
        debug!(destination = %self.destination, error = %error, "Acquire failed");

        error
    }

    fn evict(&self, state: &mut PoolState<I, O>, entry: PoolEntry<I, O>) {
        let id = entry.id();
        entry.connection.close();
        state.total -= 1;
        self.metrics.record_eviction();
        state.emit(PoolEvent::Evicted(id));

        #[cfg(feature = "observability")]
        debug!(destination = %self.destination, transport_id = %id, "Evicted idle connection");
    }

    fn check_out(
        self: &Arc<Self>,
        state: &mut PoolState<I, O>,
        entry: PoolEntry<I, O>,
    ) -> PooledConnection<I, O> {
        let id = entry.id();
        state.in_use.insert(id, entry.connection.clone());
        self.metrics.record_acquire_succeeded();
        state.emit(PoolEvent::AcquireSucceeded(id));
        PooledConnection::checked_out(entry, Arc::downgrade(self))
    }

    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<I, O>, PoolError> {
        let reservation = {
            let mut state = self.state.lock();
            self.metrics.record_acquire_attempted();
            state.emit(PoolEvent::AcquireAttempted);

            if state.shutdown {
                let error = PoolError::Shutdown {
                    destination: self.destination.clone(),
                };
                return Err(self.fail(&mut state, error));
            }

            let now = Instant::now();
            while let Some(entry) = state.idle.pop_back() {
                if entry.usable_idle(now) {
                    self.metrics.record_reuse();
                    state.emit(PoolEvent::Reused(entry.id()));
                    return Ok(self.check_out(&mut state, entry));
                }
                self.evict(&mut state, entry);
            }

            let open = state.total;
            if !self.config.admission_strategy.may_open(open) {
                let error = PoolError::Exhausted {
                    destination: self.destination.clone(),
                    open,
                };
                return Err(self.fail(&mut state, error));
            }

            state.reserved += 1;
            state.total += 1;
            Reservation {
                pool: self.as_ref(),
                armed: true,
            }
        };

        let connected = self.factory.connect(&self.destination).await;
        let connection = connected.map(|transport| (self.pipeline)(transport));

        let mut state = reservation.commit();
        match connection {
            Ok(connection) if state.shutdown => {
                connection.close();
                state.total -= 1;
                let error = PoolError::Shutdown {
                    destination: self.destination.clone(),
                };
                Err(self.fail(&mut state, error))
            }
            Ok(connection) => {
                let entry = PoolEntry::new(connection, self.config.max_idle_time);
                self.metrics.record_creation();
                state.emit(PoolEvent::Created(entry.id()));

                #[cfg(feature = "observability")]
                debug!(
                    destination = %self.destination,
                    transport_id = %entry.id(),
                    "Created pooled connection"
                );

                Ok(self.check_out(&mut state, entry))
            }
            Err(source) => {
                state.total -= 1;
                let error = PoolError::ConnectFailed {
                    destination: self.destination.clone(),
                    source,
                };
                Err(self.fail(&mut state, error))
            }
        }
    }

    pub(crate) fn release(&self, mut entry: PoolEntry<I, O>) {
        let id = entry.id();
        let mut state = self.state.lock();
        self.metrics.record_release_attempted();
        state.emit(PoolEvent::ReleaseAttempted(id));

        let tracked = state.in_use.remove(&id).is_some();
        if tracked && !state.shutdown && entry.connection.is_open() {
            entry.last_returned_at = Some(Instant::now());
            state.idle.push_back(entry);
            self.metrics.record_release_succeeded();
            state.emit(PoolEvent::ReleaseSucceeded(id));
        } else {
            entry.connection.close();
            if tracked {
                state.total -= 1;
            }
            self.metrics.record_release_failed();
            state.emit(PoolEvent::ReleaseFailed(id));

            #[cfg(feature = "observability")]
            debug!(
                destination = %self.destination,
                transport_id = %id,
                tracked,
                "Released connection was not reusable"
            );
        }
    }

    pub(crate) fn discard_checked_out(&self, entry: PoolEntry<I, O>) {
        let id = entry.id();
        entry.connection.close();
        let mut state = self.state.lock();
        if state.in_use.remove(&id).is_some() {
            state.total -= 1;
            state.emit(PoolEvent::Discarded(id));
        }
    }

    fn discard(&self, id: TransportId) -> bool {
        let mut state = self.state.lock();
        if let Some(position) = state.idle.iter().position(|entry| entry.id() == id) {
            if let Some(entry) = state.idle.remove(position) {
                self.evict(&mut state, entry);
                return true;
            }
        }
        match state.in_use.remove(&id) {
            Some(connection) => {
                connection.close();
                state.total -= 1;
                state.emit(PoolEvent::Discarded(id));
                true
            }
            None => false,
        }
    }

    fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let idle = std::mem::take(&mut state.idle);
        let mut evicted = 0;
        for entry in idle {
            if entry.usable_idle(now) {
                state.idle.push_back(entry);
            } else {
                self.evict(&mut state, entry);
                evicted += 1;
            }
        }
        evicted
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }

        let idle = std::mem::take(&mut state.idle);
        let in_use = std::mem::take(&mut state.in_use);
        let closed = idle.len() + in_use.len();
        state.total -= closed;
        for entry in idle {
            entry.connection.close();
        }
        for connection in in_use.into_values() {
            connection.close();
        }
        state.emit(PoolEvent::Shutdown);

        #[cfg(feature = "observability")]
        debug!(destination = %self.destination, closed, "Connection pool shut down");
        #[cfg(not(feature = "observability"))]
        let _ = closed;
    }
}

impl<I, O> Drop for PoolShared<I, O> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.abort();
        }
    }
}

/// A creation slot held while the channel factory runs.
///
/// Dropping an armed reservation (the acquire future was cancelled) gives
/// the slot back without creating anything.
struct Reservation<'a, I, O> {
    pool: &'a PoolShared<I, O>,
    armed: bool,
}

impl<'a, I, O> Reservation<'a, I, O> {
    /// Turns the slot into a real connection or a failure, returning the
    /// lock so the outcome commits atomically.
    fn commit(mut self) -> MutexGuard<'a, PoolState<I, O>> {
        self.armed = false;
        let mut state = self.pool.state.lock();
        state.reserved -= 1;
        state
    }
}

impl<I, O> Drop for Reservation<'_, I, O> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.pool.state.lock();
            state.reserved -= 1;
            state.total -= 1;
            drop(state);

            #[cfg(feature = "observability")]
            debug!(destination = %self.pool.destination, "Acquire cancelled during connect");
        }
    }
}

/// A pool of reusable outbound connections to one [`Destination`].
///
/// Connections are created on demand through a [`ChannelFactory`], reused
/// most-recently-returned first, and evicted once they sit idle longer than
/// [`PoolConfig::max_idle_time`]. Whether a new connection may be opened is
/// decided by the configured [`AdmissionStrategy`](super::AdmissionStrategy).
///
/// Cloning a pool is cheap; all clones share the same connections.
///
/// # Examples
///
/// ```rust
/// use rxnet::pool::{ConnectionPool, PoolConfig};
/// use rxnet::serialization::JsonSerializer;
/// use rxnet::transport::{Destination, MemoryChannelFactory};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (factory, _listener) = MemoryChannelFactory::new();
/// let pool: ConnectionPool<String, String> = ConnectionPool::new(
///     Destination::new("memory", 0),
///     Arc::new(factory),
///     JsonSerializer::default(),
///     PoolConfig::default(),
/// );
///
/// let connection = pool.acquire().await?;
/// connection.write("ping".to_string()).await?;
/// connection.release();
///
/// assert_eq!(pool.stats().idle, 1);
/// # Ok(())
/// # }
/// ```
pub struct ConnectionPool<I, O> {
    shared: Arc<PoolShared<I, O>>,
}

impl<I, O> Clone for ConnectionPool<I, O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I, O> ConnectionPool<I, O>
where
    I: serde::de::DeserializeOwned + Send + 'static,
    O: serde::Serialize + Send + 'static,
{
    /// Creates a pool for `destination`.
    ///
    /// When the configuration enables the idle sweep, the sweep task is
    /// spawned on the current Tokio runtime; outside a runtime the sweep is
    /// skipped and idle connections are only checked on acquire.
    pub fn new<S>(
        destination: Destination,
        factory: Arc<dyn ChannelFactory>,
        serializer: S,
        config: PoolConfig,
    ) -> Self
    where
        S: Serializer + Clone,
    {
        let transport_metrics = Arc::new(TransportMetrics::new());
        let pipeline_metrics = Arc::clone(&transport_metrics);
        let pipeline: Pipeline<I, O> = Box::new(move |transport| {
            Connection::with_metrics(transport, serializer.clone(), Arc::clone(&pipeline_metrics))
        });

        let sweep_interval = config.idle_sweep_interval;
        let shared = Arc::new(PoolShared {
            destination,
            factory,
            pipeline,
            config,
            metrics: PoolMetrics::new(),
            transport_metrics,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                in_use: HashMap::new(),
                reserved: 0,
                total: 0,
                shutdown: false,
                subscribers: Vec::new(),
            }),
            sweeper: Mutex::new(None),
        });

        if let Some(period) = sweep_interval {
            Self::start_sweeper(&shared, period);
        }

        #[cfg(feature = "observability")]
        debug!(
            destination = %shared.destination,
            strategy = shared.config.admission_strategy.name(),
            "Connection pool created"
        );

        Self { shared }
    }

    fn start_sweeper(shared: &Arc<PoolShared<I, O>>, period: Duration) {
        if period.is_zero() {
            #[cfg(feature = "observability")]
            warn!(destination = %shared.destination, "Ignoring zero idle sweep interval");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            #[cfg(feature = "observability")]
            warn!(destination = %shared.destination, "No runtime; idle sweep disabled");
            return;
        };

        let pool = Arc::downgrade(shared);
        let sweeper = runtime.spawn(sweep_loop(pool, period));
        *shared.sweeper.lock() = Some(sweeper);
    }
}

async fn sweep_loop<I, O>(pool: Weak<PoolShared<I, O>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(pool) = pool.upgrade() else {
            break;
        };
        let evicted = pool.sweep_idle();

        #[cfg(feature = "observability")]
        if evicted > 0 {
            debug!(destination = %pool.destination, evicted, "Idle sweep");
        }
        #[cfg(not(feature = "observability"))]
        let _ = evicted;
    }
}

impl<I, O> ConnectionPool<I, O> {
    /// Destination served by this pool.
    pub fn destination(&self) -> &Destination {
        &self.shared.destination
    }

    /// The pool's configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Hands out a connection, reusing an idle one when possible.
    ///
    /// Reuse and exhaustion resolve without suspending; only creating a
    /// connection waits on the channel factory. Dropping the returned future
    /// while it waits gives the creation slot back.
    pub async fn acquire(&self) -> Result<PooledConnection<I, O>, PoolError> {
        self.shared.acquire().await
    }

    /// Removes the connection with `id` from the pool and closes it.
    ///
    /// An idle connection counts as an eviction. Returns `false` if the pool
    /// does not track `id`.
    pub fn discard(&self, id: TransportId) -> bool {
        self.shared.discard(id)
    }

    /// Evicts every idle connection that is no longer usable and returns how
    /// many were evicted.
    pub fn sweep_idle(&self) -> usize {
        self.shared.sweep_idle()
    }

    /// Closes every connection and refuses further acquisitions. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Subscribes to events committed from now on.
    pub fn events(&self) -> PoolEvents {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.shared.state.lock().subscribers.push(sender);
        PoolEvents { receiver }
    }

    /// Snapshot of occupancy and counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        debug_assert_eq!(
            state.total,
            state.idle.len() + state.in_use.len() + state.reserved,
            "pool total drifted from its sets"
        );
        PoolStats {
            idle: state.idle.len(),
            in_use: state.in_use.len() + state.reserved,
            pending: state.reserved,
            total: state.total,
            counters: self.shared.metrics.snapshot(),
        }
    }

    /// Metrics shared by every connection this pool created.
    pub fn transport_metrics(&self) -> &Arc<TransportMetrics> {
        &self.shared.transport_metrics
    }
}

impl<I, O> std::fmt::Debug for ConnectionPool<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ConnectionPool")
            .field("destination", &self.shared.destination)
            .field("config", &self.shared.config)
            .field("idle", &state.idle.len())
            .field("in_use", &state.in_use.len())
            .field("reserved", &state.reserved)
            .field("total", &state.total)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}
