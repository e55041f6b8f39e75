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

use crate::transport::{Destination, TransportError, TransportMetadata};
use tokio::io::{AsyncRead, AsyncWrite};

/// Core transport abstraction for bi-directional byte streams.
///
/// The `Transport` trait combines Tokio's `AsyncRead` and `AsyncWrite` with
/// metadata and graceful shutdown. The bridge in [`crate::connection`] is the
/// only component that reads and writes a transport directly; everything above
/// it works with typed messages.
///
/// # Implementations
///
/// - [`TcpTransport`](crate::transport::TcpTransport): TCP/IP networking
/// - [`MemoryTransport`](crate::transport::MemoryTransport): in-process pairs
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::{MemoryTransport, Transport};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut client, mut server) = MemoryTransport::pair(16);
/// println!("client is {}", client.metadata().id);
///
/// client.write_all(b"ping").await?;
/// let mut buffer = [0u8; 4];
/// server.read_exact(&mut buffer).await?;
/// assert_eq!(&buffer, b"ping");
///
/// Transport::shutdown(&mut client).await?;
/// # Ok(())
/// # }
/// ```
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;

    /// Gracefully shuts down the transport.
    ///
    /// Flushes pending writes, signals the peer where the transport supports
    /// it, and closes the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or closing fails.
    fn shutdown(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), TransportError>> + Send + '_>>;
}

/// Establishes raw transports to a [`Destination`].
///
/// The connection pool calls its factory only on a cache miss, after the
/// admission strategy granted a slot. Factories must not retry on their own;
/// a failed connect is reported to the acquiring caller.
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::{ChannelFactory, Destination, TcpChannelFactory};
///
/// # async fn example() {
/// let factory = TcpChannelFactory::new();
/// let result = factory.connect(&Destination::new("127.0.0.1", 1)).await;
/// assert!(result.is_err());
/// # }
/// ```
#[async_trait::async_trait]
pub trait ChannelFactory: Send + Sync + 'static {
    /// Opens a new transport to `destination`.
    async fn connect(&self, destination: &Destination) -> Result<Box<dyn Transport>, TransportError>;
}

/// Trait for transport listeners (servers).
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync + 'static {
    /// Waits for and accepts the next incoming connection.
    async fn accept(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Returns the local address this listener is bound to.
    #[allow(clippy::result_large_err)]
    fn local_addr(&self) -> Result<String, TransportError>;
}

impl Transport for Box<dyn Transport> {
    fn metadata(&self) -> &TransportMetadata {
        (**self).metadata()
    }

    fn shutdown(
        &mut self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), TransportError>> + Send + '_>>
    {
        (**self).shutdown()
    }
}
