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

//! Transport layer abstractions for rxnet.
//!
//! The [`Transport`] trait is a bi-directional byte stream with metadata.
//! Two implementations ship with the crate:
//!
//! - [`TcpTransport`]: TCP/IP networking
//! - [`MemoryTransport`]: in-memory channels for tests and in-process use
//!
//! Connections are opened through a [`ChannelFactory`] (client side) or
//! accepted from a [`TransportListener`] (server side). Both hand back a
//! boxed transport that the [`connection`](crate::connection) bridge turns
//! into a typed message stream.
//!
//! # Examples
//!
//! ```rust
//! use rxnet::transport::MemoryTransport;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut client, mut server) = MemoryTransport::pair(1024);
//!
//! client.write_all(b"Hello").await?;
//!
//! let mut buffer = vec![0u8; 5];
//! server.read_exact(&mut buffer).await?;
//! assert_eq!(&buffer, b"Hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```rust
//! use rxnet::transport::{ChannelFactory, Destination, TcpChannelFactory, TransportError};
//!
//! # async fn example() {
//! let factory = TcpChannelFactory::new();
//! match factory.connect(&Destination::new("127.0.0.1", 1)).await {
//!     Ok(_) => println!("Connected"),
//!     Err(TransportError::ConnectionFailed { address, source }) => {
//!         eprintln!("Failed to connect to {}: {}", address, source);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```

mod error;
mod memory;
mod tcp;
mod traits;
mod types;

pub use self::error::TransportError;
pub use self::memory::{MemoryChannelFactory, MemoryListener, MemoryTransport};
pub use self::tcp::{TcpChannelFactory, TcpTransport, TcpTransportListener};
pub use self::traits::{ChannelFactory, Transport, TransportListener};
pub use self::types::{Destination, TransportId, TransportMetadata};
