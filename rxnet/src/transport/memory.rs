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

//! In-process transports.
//!
//! [`MemoryTransport`] pairs move byte chunks over bounded Tokio channels.
//! [`MemoryChannelFactory`] and [`MemoryListener`] put that behind the same
//! connect/accept seams as TCP so pools and servers run without sockets.

use crate::transport::{
    ChannelFactory, Destination, Transport, TransportError, TransportId, TransportListener,
    TransportMetadata,
};
use parking_lot::Mutex;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::debug;

/// Chunks each direction may queue before writers wait.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// One end of an in-process byte pipe.
///
/// Every write is queued as a chunk for the peer. A read drains the chunk
/// being consumed before pulling the next one. Shutting down or dropping
/// one end is seen by the other as end of stream.
///
/// ```rust
/// use rxnet::transport::MemoryTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut left, mut right) = MemoryTransport::pair(16);
/// left.write_all(b"ping").await?;
///
/// let mut reply = [0u8; 4];
/// right.read_exact(&mut reply).await?;
/// assert_eq!(&reply, b"ping");
/// # Ok(())
/// # }
/// ```
pub struct MemoryTransport {
    metadata: TransportMetadata,
    inbound: mpsc::Receiver<Vec<u8>>,
    /// Unread tail of the last chunk received.
    pending: Vec<u8>,
    cursor: usize,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
}

impl MemoryTransport {
    fn end(inbound: mpsc::Receiver<Vec<u8>>, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            metadata: TransportMetadata::new(TransportId::next(), "memory"),
            inbound,
            pending: Vec::new(),
            cursor: 0,
            outbound: Some(outbound),
        }
    }

    /// Creates two connected ends, each able to queue `buffer_size` chunks.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel(buffer_size);
        let (right_tx, left_rx) = mpsc::channel(buffer_size);
        let left = Self::end(left_rx, left_tx);
        let right = Self::end(right_rx, right_tx);

        #[cfg(feature = "observability")]
        debug!(left = %left.metadata.id, right = %right.metadata.id, "memory pair created");

        (left, right)
    }

    /// [`pair`](Self::pair) with the default queue depth.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }

    fn copy_pending(&mut self, buf: &mut ReadBuf<'_>) {
        let available = &self.pending[self.cursor..];
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        self.cursor += n;
        if self.cursor == self.pending.len() {
            self.pending.clear();
            self.cursor = 0;
        }
    }

    fn broken_pipe(reason: &'static str) -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, reason)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn shutdown(
        &mut self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            if self.outbound.take().is_some() {
                #[cfg(feature = "observability")]
                debug!(transport_id = %self.metadata.id, "memory transport shut down");
            }
            Ok(())
        })
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pending.is_empty() {
            match this.inbound.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                // Peer gone: leave `buf` untouched to signal EOF.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Ready(Some(chunk)) => this.pending = chunk,
            }
        }
        this.copy_pending(buf);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        // An empty chunk would read as end of stream on the other side.
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let Some(outbound) = self.outbound.as_ref() else {
            return Poll::Ready(Err(Self::broken_pipe("memory transport shut down")));
        };
        match outbound.try_send(buf.to_vec()) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // No capacity notification without a permit; retry on the next poll.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Poll::Ready(Err(Self::broken_pipe("memory peer dropped")))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().outbound = None;
        Poll::Ready(Ok(()))
    }
}

/// A [`ChannelFactory`] that connects to a paired [`MemoryListener`].
///
/// Every `connect` creates a [`MemoryTransport`] pair, returns one side and
/// hands the other to the listener. The factory can be told to refuse
/// connections or to delay them, which makes connect failures and in-flight
/// cancellation reproducible in tests.
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::{
///     ChannelFactory, Destination, MemoryChannelFactory, Transport, TransportListener,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (factory, listener) = MemoryChannelFactory::new();
/// let client = factory.connect(&Destination::new("memory", 0)).await?;
/// let server = listener.accept().await?;
/// assert_ne!(client.metadata().id, server.metadata().id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryChannelFactory {
    inner: Arc<MemoryFactoryInner>,
}

struct MemoryFactoryInner {
    accepted: mpsc::UnboundedSender<MemoryTransport>,
    refusing: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    connects: AtomicU64,
    buffer_size: usize,
}

impl MemoryChannelFactory {
    /// Creates a connected factory/listener pair with the default buffer size.
    pub fn new() -> (Self, MemoryListener) {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a connected factory/listener pair.
    pub fn with_buffer_size(buffer_size: usize) -> (Self, MemoryListener) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let factory = Self {
            inner: Arc::new(MemoryFactoryInner {
                accepted,
                refusing: AtomicBool::new(false),
                connect_delay: Mutex::new(None),
                connects: AtomicU64::new(0),
                buffer_size,
            }),
        };
        let listener = MemoryListener {
            incoming: tokio::sync::Mutex::new(incoming),
        };
        (factory, listener)
    }

    /// Makes subsequent connects fail with `ConnectionRefused`.
    pub fn set_refusing(&self, refusing: bool) {
        self.inner.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Delays every subsequent connect by `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.inner.connect_delay.lock() = delay;
    }

    /// Number of transports this factory has successfully created.
    pub fn connect_count(&self) -> u64 {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChannelFactory for MemoryChannelFactory {
    async fn connect(&self, destination: &Destination) -> Result<Box<dyn Transport>, TransportError> {
        let delay = *self.inner.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed {
                address: destination.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }

        let (client, server) = MemoryTransport::pair(self.inner.buffer_size);
        self.inner
            .accepted
            .send(server)
            .map_err(|_| TransportError::ConnectionFailed {
                address: destination.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "listener dropped"),
            })?;
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(client))
    }
}

/// Accepting side of a [`MemoryChannelFactory`].
pub struct MemoryListener {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryTransport>>,
}

#[async_trait::async_trait]
impl TransportListener for MemoryListener {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        match self.incoming.lock().await.recv().await {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::Closed),
        }
    }

    fn local_addr(&self) -> Result<String, TransportError> {
        Ok("memory".to_string())
    }
}
