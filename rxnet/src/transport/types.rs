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

//! Identity of transports and the destinations they lead to.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identity of one transport. Pools key their in-use
/// connections by it and pool events refer to connections through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Hands out a fresh id; ids grow monotonically.
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Facts about a transport fixed when it was created.
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    /// Identity of the transport
    pub id: TransportId,
    /// Our end of the socket, when there is one
    pub local_addr: Option<SocketAddr>,
    /// The other end of the socket, when there is one
    pub peer_addr: Option<SocketAddr>,
    /// Short kind label such as `tcp` or `memory`, used in logs
    pub transport_type: String,
    /// Creation time
    pub created_at: Instant,
}

impl TransportMetadata {
    /// Metadata without socket addresses.
    pub fn new(id: TransportId, transport_type: impl Into<String>) -> Self {
        Self {
            id,
            local_addr: None,
            peer_addr: None,
            transport_type: transport_type.into(),
            created_at: Instant::now(),
        }
    }

    /// Records our end of the socket.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Records the other end of the socket.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Where a pool's connections go: a host and a port.
///
/// Each [`ConnectionPool`](crate::pool::ConnectionPool) serves exactly one
/// destination; redirects that leave it are not followed.
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::Destination;
///
/// let destination = Destination::new("localhost", 8080);
/// assert_eq!(destination.to_string(), "localhost:8080");
///
/// let v6 = Destination::new("::1", 443);
/// assert_eq!(v6.authority(), "[::1]:443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    host: String,
    port: u16,
}

impl Destination {
    /// Destination for `host` (a name or an IP literal) and `port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, with IPv6 literals bracketed. Used for dialing and as
    /// the `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let first = TransportId::next();
        let second = TransportId::next();
        assert!(second > first);
        assert_eq!(TransportId::new(7).to_string(), "conn#7");
    }

    #[test]
    fn test_destination_from_socket_addr() {
        let v4: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let destination = Destination::from(v4);
        assert_eq!(destination.host(), "127.0.0.1");
        assert_eq!(destination.port(), 9000);
        assert_eq!(destination.authority(), "127.0.0.1:9000");

        let v6: SocketAddr = "[::1]:9000".parse().unwrap();
        let destination = Destination::from(v6);
        assert_eq!(destination.host(), "::1");
        assert_eq!(destination.authority(), v6.to_string());
    }
}
