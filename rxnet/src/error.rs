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

//! Top-level error type for rxnet.
//!
//! Each layer has its own error type; [`RxError`] composes them for code
//! that deals with more than one layer:
//!
//! - [`TransportError`]: the byte transport failed
//! - [`PoolError`]: no connection could be handed out
//! - [`ContextError`]: request context misuse
//! - [`HttpError`]: the request/response exchange failed
//! - Application: anything a handler returned
//!
//! # Examples
//!
//! ```rust
//! use rxnet::RxError;
//! use rxnet::transport::TransportError;
//!
//! let error: RxError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//! assert!(error.should_close_connection());
//! ```

use crate::context::ContextError;
use crate::http::HttpError;
use crate::pool::PoolError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type.
#[derive(Debug)]
pub enum RxError {
    /// A transport-layer error.
    ///
    /// ```rust
    /// use rxnet::RxError;
    /// use rxnet::transport::TransportError;
    ///
    /// let error = RxError::Transport(TransportError::Closed);
    /// assert!(!error.is_recoverable());
    /// ```
    Transport(TransportError),

    /// A connection pool error.
    Pool(PoolError),

    /// A request context error.
    Context(ContextError),

    /// An HTTP exchange error.
    Http(HttpError),

    /// An error raised by application code.
    ///
    /// ```rust
    /// use rxnet::RxError;
    ///
    /// let error = RxError::Application(std::io::Error::other("custom").into());
    /// assert!(error.is_application_error());
    /// assert!(!error.should_close_connection());
    /// ```
    Application(Box<dyn StdError + Send + Sync>),
}

impl RxError {
    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a pool error.
    #[must_use]
    pub const fn is_pool_error(&self) -> bool {
        matches!(self, Self::Pool(_))
    }

    /// Returns `true` if this is a context error.
    #[must_use]
    pub const fn is_context_error(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    /// Returns `true` if this is an HTTP error.
    #[must_use]
    pub const fn is_http_error(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Returns `true` if this is an application error.
    #[must_use]
    pub const fn is_application_error(&self) -> bool {
        matches!(self, Self::Application(_))
    }

    /// Returns `true` if retrying the operation may succeed.
    ///
    /// ```rust
    /// use rxnet::RxError;
    /// use rxnet::pool::PoolError;
    /// use rxnet::transport::Destination;
    ///
    /// let error = RxError::Pool(PoolError::Exhausted {
    ///     destination: Destination::new("localhost", 80),
    ///     open: 4,
    /// });
    /// assert!(error.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Pool(e) => e.is_recoverable(),
            Self::Http(HttpError::Pool(e)) => e.is_recoverable(),
            Self::Http(HttpError::Transport(e)) => e.is_recoverable(),
            Self::Http(_) | Self::Context(_) | Self::Application(_) => false,
        }
    }

    /// Returns `true` if the connection the error occurred on must be
    /// closed rather than reused.
    #[must_use]
    pub fn should_close_connection(&self) -> bool {
        match self {
            Self::Transport(e) => e.should_close_transport(),
            Self::Http(e) => e.poisons_connection(),
            Self::Pool(_) | Self::Context(_) | Self::Application(_) => false,
        }
    }
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Pool(e) => write!(f, "pool error: {}", e),
            Self::Context(e) => write!(f, "context error: {}", e),
            Self::Http(e) => write!(f, "http error: {}", e),
            Self::Application(e) => write!(f, "application error: {}", e),
        }
    }
}

impl StdError for RxError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Pool(e) => Some(e),
            Self::Context(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Application(e) => Some(e.as_ref()),
        }
    }
}

impl From<TransportError> for RxError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<PoolError> for RxError {
    fn from(error: PoolError) -> Self {
        Self::Pool(error)
    }
}

impl From<ContextError> for RxError {
    fn from(error: ContextError) -> Self {
        Self::Context(error)
    }
}

impl From<HttpError> for RxError {
    fn from(error: HttpError) -> Self {
        Self::Http(error)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for RxError {
    fn from(error: Box<dyn StdError + Send + Sync>) -> Self {
        Self::Application(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Destination;
    use std::io;

    #[test]
    fn test_classification() {
        let error = RxError::from(ContextError::InvalidArgument("empty"));
        assert!(error.is_context_error());
        assert!(!error.is_recoverable());
        assert!(!error.should_close_connection());

        let error = RxError::from(HttpError::IncompleteResponse);
        assert!(error.is_http_error());
        assert!(error.should_close_connection());
    }

    #[test]
    fn test_pool_error_through_http() {
        let error = RxError::from(HttpError::Pool(PoolError::Shutdown {
            destination: Destination::new("localhost", 80),
        }));
        assert!(!error.is_recoverable());

        let error = RxError::from(HttpError::Transport(TransportError::Timeout {
            duration: std::time::Duration::from_secs(1),
        }));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_display_and_source() {
        let error = RxError::from(TransportError::Io {
            source: io::Error::other("boom"),
        });
        assert!(error.to_string().starts_with("transport error:"));
        assert!(error.source().is_some());
    }
}
