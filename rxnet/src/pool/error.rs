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

//! Connection pool error types.
//!
//! Pool errors are always returned to the caller of
//! [`acquire`](crate::pool::ConnectionPool::acquire); the pool never retries
//! on its own.

use crate::transport::{Destination, TransportError};
use thiserror::Error;

/// Errors returned by a connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No idle connection was available and the admission strategy refused
    /// to open another one.
    #[error("connection pool for {destination} is exhausted ({open} connections open)")]
    Exhausted {
        /// Destination of the pool
        destination: Destination,
        /// Connections open at the time of the refusal
        open: usize,
    },

    /// The channel factory failed to establish a connection.
    #[error("failed to create a connection to {destination}: {source}")]
    ConnectFailed {
        /// Destination of the pool
        destination: Destination,
        /// The factory's error, unchanged
        #[source]
        source: TransportError,
    },

    /// The pool was shut down.
    #[error("connection pool for {destination} is shut down")]
    Shutdown {
        /// Destination of the pool
        destination: Destination,
    },
}

impl PoolError {
    /// Returns `true` if a later acquisition may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PoolError::Exhausted { .. } => true,
            PoolError::ConnectFailed { source, .. } => source.is_recoverable(),
            PoolError::Shutdown { .. } => false,
        }
    }

    /// Short label used in events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::Exhausted { .. } => "exhausted",
            PoolError::ConnectFailed { .. } => "connect_failed",
            PoolError::Shutdown { .. } => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_keeps_source() {
        let error = PoolError::ConnectFailed {
            destination: Destination::new("localhost", 80),
            source: TransportError::connection_failed("localhost:80"),
        };
        assert!(error.is_recoverable());
        assert!(std::error::Error::source(&error).is_some());
        assert_eq!(error.kind(), "connect_failed");
    }

    #[test]
    fn test_shutdown_not_recoverable() {
        let error = PoolError::Shutdown {
            destination: Destination::new("localhost", 80),
        };
        assert!(!error.is_recoverable());
        assert_eq!(
            error.to_string(),
            "connection pool for localhost:80 is shut down"
        );
    }
}
