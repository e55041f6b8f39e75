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

//! Errors of the byte transports underneath a connection.
//!
//! A [`TransportError`] is about one physical connection. How the layers
//! above react:
//!
//! - the connection bridge ends the input stream with the error and closes
//!   the connection
//! - the pool discards a connection that failed instead of making it idle
//! - a failed connect is handed to the acquiring caller as-is

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a transport, a transport factory or a listener.
///
/// # Examples
///
/// ```rust
/// use rxnet::transport::TransportError;
/// use std::io;
///
/// let error = TransportError::ConnectionFailed {
///     address: "127.0.0.1:8080".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
/// };
///
/// assert!(error.is_recoverable());
/// assert!(!error.should_close_transport());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// The factory could not reach the destination.
    #[error("could not connect to {address}: {source}")]
    ConnectionFailed {
        /// Destination that was dialed
        address: String,
        /// Cause reported by the operating system
        #[source]
        source: io::Error,
    },

    /// Reading from an established transport failed.
    #[error("transport read failed: {source}")]
    ReadFailed {
        /// Cause reported by the operating system
        #[source]
        source: io::Error,
    },

    /// Writing to an established transport failed.
    #[error("transport write failed: {source}")]
    WriteFailed {
        /// Cause reported by the operating system
        #[source]
        source: io::Error,
    },

    /// Bytes on the wire did not form a valid frame or message, or a message
    /// could not be encoded.
    #[error("frame codec failed: {reason}")]
    Codec {
        /// What the codec rejected
        reason: String,
    },

    /// A connect did not finish in time.
    #[error("gave up after {duration:?}")]
    Timeout {
        /// The limit that elapsed
        duration: Duration,
    },

    /// [`Connection::input`](crate::connection::Connection::input) was called
    /// while another subscriber holds the stream.
    #[error("input stream already has an active subscriber")]
    AlreadySubscribed,

    /// The connection or listener is closed.
    #[error("closed")]
    Closed,

    /// A listener could not bind its address.
    #[error("could not bind {address}: {source}")]
    BindFailed {
        /// Address that was requested
        address: String,
        /// Cause reported by the operating system
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure.
    #[error("transport I/O failed: {source}")]
    Io {
        /// Cause reported by the operating system
        #[source]
        source: io::Error,
    },
}

fn transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl TransportError {
    /// Returns `true` if trying again, possibly on a fresh connection, may
    /// succeed.
    ///
    /// ```rust
    /// use rxnet::transport::TransportError;
    ///
    /// assert!(!TransportError::Closed.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::ReadFailed { source } | Self::WriteFailed { source } | Self::Io { source } => {
                transient(source.kind())
            }
            Self::Codec { .. } | Self::AlreadySubscribed | Self::Closed | Self::BindFailed { .. } => {
                false
            }
        }
    }

    /// Returns `true` if the connection that produced this error can not be
    /// used any further. The pool discards such connections.
    ///
    /// ```rust
    /// use rxnet::transport::TransportError;
    ///
    /// assert!(TransportError::Closed.should_close_transport());
    /// assert!(!TransportError::AlreadySubscribed.should_close_transport());
    /// ```
    pub fn should_close_transport(&self) -> bool {
        match self {
            Self::Closed | Self::Codec { .. } | Self::Timeout { .. } => true,
            // No transport exists yet, or the transport itself is fine.
            Self::ConnectionFailed { .. } | Self::BindFailed { .. } | Self::AlreadySubscribed => {
                false
            }
            Self::ReadFailed { source } | Self::WriteFailed { source } | Self::Io { source } => {
                !matches!(
                    source.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                )
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn connection_failed(address: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<crate::serialization::SerializationError> for TransportError {
    fn from(error: crate::serialization::SerializationError) -> Self {
        Self::Codec {
            reason: error.to_string(),
        }
    }
}

impl From<crate::serialization::DeserializationError> for TransportError {
    fn from(error: crate::serialization::DeserializationError) -> Self {
        Self::Codec {
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_connect_is_retryable() {
        let error = TransportError::connection_failed("127.0.0.1:8080");
        assert!(error.is_recoverable());
        assert!(!error.should_close_transport());
    }

    #[test]
    fn test_bad_frame_poisons_transport() {
        let error = TransportError::Codec {
            reason: "truncated frame".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(error.should_close_transport());
    }

    #[test]
    fn test_io_kind_decides() {
        let interrupted = TransportError::ReadFailed {
            source: io::Error::new(io::ErrorKind::Interrupted, "interrupted"),
        };
        assert!(interrupted.is_recoverable());
        assert!(!interrupted.should_close_transport());

        let broken = TransportError::WriteFailed {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"),
        };
        assert!(!broken.is_recoverable());
        assert!(broken.should_close_transport());
    }

    #[test]
    fn test_second_subscriber_keeps_transport() {
        assert!(!TransportError::AlreadySubscribed.should_close_transport());
        assert_eq!(
            TransportError::AlreadySubscribed.to_string(),
            "input stream already has an active subscriber"
        );
    }
}
