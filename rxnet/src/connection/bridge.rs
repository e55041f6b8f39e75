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

//! Typed connection over a byte transport.
//!
//! # Architecture
//!
//! Installing a [`Connection`] on a transport splits it and spawns two tasks:
//! - **Reader task**: frame → deserialize → input channel
//! - **Writer task**: write request → serialize → frame → flush → ack
//!
//! A third task waits for both and marks the connection closed. Either task
//! stopping (peer end-of-stream, I/O failure, local close) requests a close,
//! so the two halves always stop together.

use super::input::{InputItem, InputSlot, InputStream};
use crate::observability::TransportMetrics;
use crate::serialization::framing::{FRAME_HEADER_SIZE, read_frame, write_frame};
use crate::serialization::{DeserializationError, SerializationError, Serializer};
use crate::transport::{Transport, TransportError, TransportId, TransportMetadata};
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading and writing.
    Open,
    /// A close was requested; the reader and writer are stopping.
    Closing,
    /// Both halves stopped and the transport was shut down.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// State shared between the handles and the background tasks.
struct Lifecycle {
    state: watch::Sender<ConnectionState>,
}

impl Lifecycle {
    /// Moves `Open` to `Closing`. Returns `false` if a close already happened.
    fn request_close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        })
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolves once the state left `Open`.
    async fn closing(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s != ConnectionState::Open).await;
    }

    async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }
}

struct WriteRequest<O> {
    message: O,
    ack: oneshot::Sender<Result<(), TransportError>>,
}

struct Inner<I, O> {
    metadata: TransportMetadata,
    lifecycle: Arc<Lifecycle>,
    input: Arc<InputSlot<I>>,
    writes: mpsc::UnboundedSender<WriteRequest<O>>,
}

impl<I, O> Drop for Inner<I, O> {
    fn drop(&mut self) {
        self.lifecycle.request_close();
    }
}

/// A typed, bi-directional message connection.
///
/// `I` is the inbound message type, `O` the outbound one. Handles are cheap to
/// clone and all refer to the same connection; the connection closes when
/// [`close`](Self::close) is called, when the peer closes, on a transport
/// failure, or when the last handle is dropped.
///
/// # Examples
///
/// ```rust
/// use futures_util::StreamExt;
/// use rxnet::connection::Connection;
/// use rxnet::serialization::JsonSerializer;
/// use rxnet::transport::MemoryTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (a, b) = MemoryTransport::pair_default();
/// let client: Connection<String, String> = Connection::new(a, JsonSerializer::default());
/// let server: Connection<String, String> = Connection::new(b, JsonSerializer::default());
///
/// client.write("ping".to_string()).await?;
/// let mut input = server.input()?;
/// assert_eq!(input.next().await.transpose()?, Some("ping".to_string()));
///
/// client.close();
/// client.closed().await;
/// assert!(input.next().await.is_none());
/// # Ok(())
/// # }
/// ```
pub struct Connection<I, O> {
    inner: Arc<Inner<I, O>>,
}

impl<I, O> Clone for Connection<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, O> Connection<I, O>
where
    I: serde::de::DeserializeOwned + Send + 'static,
    O: serde::Serialize + Send + 'static,
{
    /// Installs a connection on `transport`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<T, S>(transport: T, serializer: S) -> Self
    where
        T: Transport,
        S: Serializer,
    {
        Self::with_metrics(transport, serializer, Arc::new(TransportMetrics::new()))
    }

    /// Installs a connection that reports into shared transport metrics.
    pub fn with_metrics<T, S>(transport: T, serializer: S, metrics: Arc<TransportMetrics>) -> Self
    where
        T: Transport,
        S: Serializer,
    {
        let metadata = transport.metadata().clone();
        let id = metadata.id;
        let (reader, writer) = tokio::io::split(transport);
        let serializer = Arc::new(serializer);
        let (state, _) = watch::channel(ConnectionState::Open);
        let lifecycle = Arc::new(Lifecycle { state });
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        metrics.record_connection_opened();

        #[cfg(feature = "observability")]
        debug!(
            transport_id = %id,
            transport_type = %metadata.transport_type,
            serializer = serializer.name(),
            "Connection opened"
        );

        let reader = tokio::spawn(read_loop(
            id,
            reader,
            Arc::clone(&serializer),
            input_tx,
            Arc::clone(&lifecycle),
            Arc::clone(&metrics),
        ));
        let writer = tokio::spawn(write_loop(
            id,
            writer,
            serializer,
            write_rx,
            Arc::clone(&lifecycle),
            Arc::clone(&metrics),
        ));

        let supervised = Arc::clone(&lifecycle);
        tokio::spawn(async move {
            let _ = reader.await;
            let _ = writer.await;
            supervised.state.send_replace(ConnectionState::Closed);
            metrics.record_connection_closed();

            #[cfg(feature = "observability")]
            debug!(transport_id = %id, "Connection closed");
        });

        Self {
            inner: Arc::new(Inner {
                metadata,
                lifecycle,
                input: Arc::new(InputSlot::new(input_rx)),
                writes: write_tx,
            }),
        }
    }
}

impl<I, O> Connection<I, O> {
    /// Returns the id of the underlying transport.
    pub fn id(&self) -> TransportId {
        self.inner.metadata.id
    }

    /// Returns the metadata of the underlying transport.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.inner.metadata
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.current()
    }

    /// Returns `true` until a close has been requested.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Subscribes to the inbound messages.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadySubscribed`] while another
    /// [`InputStream`] of this connection is alive.
    pub fn input(&self) -> Result<InputStream<I>, TransportError> {
        self.inner.input.subscribe()
    }

    /// Writes one message; resolves once the frame was flushed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the connection closed before the
    /// message was written, [`TransportError::Codec`] if the message could not
    /// be encoded, or [`TransportError::WriteFailed`] if the transport failed.
    /// A write failure also closes the connection.
    pub async fn write(&self, message: O) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let (ack, done) = oneshot::channel();
        self.inner
            .writes
            .send(WriteRequest { message, ack })
            .map_err(|_| TransportError::Closed)?;
        done.await.map_err(|_| TransportError::Closed)?
    }

    /// Requests the connection to close.
    ///
    /// Only the first request has an effect; later ones are no-ops. Use
    /// [`closed`](Self::closed) to wait until the transport was shut down.
    pub fn close(&self) {
        if self.inner.lifecycle.request_close() {
            #[cfg(feature = "observability")]
            debug!(transport_id = %self.id(), "Connection close requested");
        }
    }

    /// Resolves once the connection reached [`ConnectionState::Closed`].
    pub async fn closed(&self) {
        self.inner.lifecycle.closed().await
    }

    /// Returns `true` if both handles refer to the same connection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<I, O> fmt::Debug for Connection<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

fn read_error(error: DeserializationError) -> TransportError {
    match error.io_source() {
        Some(source) => TransportError::ReadFailed {
            source: io::Error::new(source.kind(), error.to_string()),
        },
        None => error.into(),
    }
}

fn write_error(error: SerializationError) -> TransportError {
    match error.io_source() {
        Some(source) => TransportError::WriteFailed {
            source: io::Error::new(source.kind(), error.to_string()),
        },
        None => error.into(),
    }
}

async fn read_loop<T, S, I>(
    #[cfg_attr(not(feature = "observability"), allow(unused_variables))] id: TransportId,
    mut reader: ReadHalf<T>,
    serializer: Arc<S>,
    input: mpsc::UnboundedSender<InputItem<I>>,
    lifecycle: Arc<Lifecycle>,
    metrics: Arc<TransportMetrics>,
) where
    T: Transport,
    S: Serializer,
    I: serde::de::DeserializeOwned + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            _ = lifecycle.closing() => break,
            frame = read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Some(payload)) => {
                metrics.record_bytes_received((payload.len() + FRAME_HEADER_SIZE) as u64);
                match serializer.deserialize::<I>(&payload) {
                    Ok(message) => {
                        let _ = input.send(Ok(message));
                    }
                    Err(error) => {
                        metrics.record_read_error();
                        #[cfg(feature = "observability")]
                        warn!(transport_id = %id, error = %error, "Failed to decode inbound frame");
                        let _ = input.send(Err(error.into()));
                        break;
                    }
                }
            }
            Ok(None) => {
                #[cfg(feature = "observability")]
                debug!(transport_id = %id, "Peer closed the connection");
                break;
            }
            Err(error) => {
                metrics.record_read_error();
                #[cfg(feature = "observability")]
                warn!(transport_id = %id, error = %error, "Failed to read inbound frame");
                let _ = input.send(Err(read_error(error)));
                break;
            }
        }
    }

    lifecycle.request_close();
}

async fn write_loop<T, S, O>(
    #[cfg_attr(not(feature = "observability"), allow(unused_variables))] id: TransportId,
    mut writer: WriteHalf<T>,
    serializer: Arc<S>,
    mut requests: mpsc::UnboundedReceiver<WriteRequest<O>>,
    lifecycle: Arc<Lifecycle>,
    metrics: Arc<TransportMetrics>,
) where
    T: Transport,
    S: Serializer,
    O: serde::Serialize + Send + 'static,
{
    loop {
        let request = tokio::select! {
            _ = lifecycle.closing() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let result = match serializer.serialize(&request.message) {
            Ok(payload) => match write_frame(&mut writer, &payload).await {
                Ok(()) => {
                    metrics.record_bytes_sent((payload.len() + FRAME_HEADER_SIZE) as u64);
                    Ok(())
                }
                Err(error) => {
                    if error.io_source().is_some() {
                        metrics.record_write_error();
                    }
                    Err(write_error(error))
                }
            },
            Err(error) => Err(error.into()),
        };

        let failed = matches!(result, Err(TransportError::WriteFailed { .. }));
        let _ = request.ack.send(result);
        if failed {
            #[cfg(feature = "observability")]
            warn!(transport_id = %id, "Write failed, closing connection");
            break;
        }
    }

    // Pending writes observe the dropped acks as `Closed`.
    requests.close();
    drop(requests);

    if let Err(_error) = writer.shutdown().await {
        #[cfg(feature = "observability")]
        debug!(transport_id = %id, error = %_error, "Transport shutdown failed");
    }
    lifecycle.request_close();
}
