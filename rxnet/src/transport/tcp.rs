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

//! TCP sockets as transports.
//!
//! [`TcpChannelFactory`] dials destinations for connection pools;
//! [`TcpTransportListener`] hands accepted sockets to a
//! [`Server`](crate::server::Server). Both produce [`TcpTransport`]s.

use crate::transport::{
    ChannelFactory, Destination, Transport, TransportError, TransportId, TransportListener,
    TransportMetadata,
};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

#[cfg(feature = "observability")]
use tracing::{debug, instrument, warn};

/// A connected TCP socket.
///
/// # Examples
///
/// ```rust,no_run
/// use rxnet::transport::{Transport, TcpTransport};
/// use tokio::io::AsyncWriteExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = tokio::net::TcpStream::connect("127.0.0.1:8080").await?;
/// let mut transport = TcpTransport::from_stream(stream)?;
/// println!("connected to {:?}", transport.metadata().peer_addr);
///
/// transport.write_all(b"ping").await?;
/// Transport::shutdown(&mut transport).await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Wraps a connected stream, recording both socket addresses.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let metadata = TransportMetadata::new(TransportId::next(), "tcp")
            .with_local_addr(stream.local_addr()?)
            .with_peer_addr(stream.peer_addr()?);
        Ok(Self { stream, metadata })
    }

    /// Remote address of the socket.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Enables or disables Nagle's algorithm.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.stream.set_nodelay(nodelay)
    }

    /// Whether Nagle's algorithm is disabled.
    pub fn nodelay(&self) -> io::Result<bool> {
        self.stream.nodelay()
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn shutdown(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            let outcome = self.stream.shutdown().await;

            #[cfg(feature = "observability")]
            if let Err(e) = &outcome {
                debug!(transport_id = %self.metadata.id, error = %e, "TCP shutdown failed");
            }

            outcome.map_err(TransportError::from)
        })
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Dials TCP connections for a connection pool.
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::TcpChannelFactory;
/// use std::time::Duration;
///
/// let factory = TcpChannelFactory::new()
///     .with_nodelay(false)
///     .with_connect_timeout(Duration::from_secs(5));
/// assert!(!factory.nodelay());
/// ```
#[derive(Debug, Clone)]
pub struct TcpChannelFactory {
    nodelay: bool,
    connect_timeout: Option<Duration>,
}

impl TcpChannelFactory {
    /// Creates a factory with `TCP_NODELAY` enabled and no connect timeout.
    pub fn new() -> Self {
        Self {
            nodelay: true,
            connect_timeout: None,
        }
    }

    /// Sets `TCP_NODELAY` for dialed sockets.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Fails a connect with [`TransportError::Timeout`] after `timeout`.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `TCP_NODELAY` setting for dialed sockets.
    pub fn nodelay(&self) -> bool {
        self.nodelay
    }

    async fn dial(&self, address: String) -> Result<TcpStream, TransportError> {
        let connecting = TcpStream::connect(address.clone());
        let connected = match self.connect_timeout {
            Some(duration) => tokio::time::timeout(duration, connecting)
                .await
                .map_err(|_| TransportError::Timeout { duration })?,
            None => connecting.await,
        };
        connected.map_err(|source| TransportError::ConnectionFailed { address, source })
    }
}

impl Default for TcpChannelFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChannelFactory for TcpChannelFactory {
    #[cfg_attr(
        feature = "observability",
        instrument(level = "debug", skip(self), fields(destination = %destination))
    )]
    async fn connect(&self, destination: &Destination) -> Result<Box<dyn Transport>, TransportError> {
        let stream = self.dial(destination.authority()).await?;
        stream.set_nodelay(self.nodelay)?;
        let transport = TcpTransport::from_stream(stream)?;

        #[cfg(feature = "observability")]
        debug!(transport_id = %transport.metadata.id, "TCP connection established");

        Ok(Box::new(transport))
    }
}

/// Accepts TCP connections for a [`Server`](crate::server::Server).
///
/// # Examples
///
/// ```rust,no_run
/// use rxnet::transport::{TcpTransportListener, TransportListener};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpTransportListener::bind("127.0.0.1:0").await?;
/// println!("listening on {}", listener.local_addr()?);
/// let transport = listener.accept().await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Binds `addr`; port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// [`TransportError::BindFailed`] when the address is unavailable.
    pub async fn bind(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();
        match TcpListener::bind(&address).await {
            Ok(listener) => Ok(Self { listener }),
            Err(source) => {
                #[cfg(feature = "observability")]
                warn!(address = %address, error = %source, "TCP bind failed");

                Err(TransportError::BindFailed { address, source })
            }
        }
    }

    /// Address the listener is bound to.
    pub fn socket_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpTransportListener {
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _peer) = self.listener.accept().await?;
        let transport = TcpTransport::from_stream(stream)?;

        #[cfg(feature = "observability")]
        debug!(transport_id = %transport.metadata.id, peer = %_peer, "Accepted TCP connection");

        Ok(Box::new(transport))
    }

    fn local_addr(&self) -> Result<String, TransportError> {
        Ok(self.socket_addr()?.to_string())
    }
}
