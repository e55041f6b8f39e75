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

use crate::context::ContextError;
use crate::pool::PoolError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors of the HTTP client and server paths.
#[derive(Debug, Error)]
pub enum HttpError {
    /// No connection could be obtained.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The connection failed during the exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The correlator rejected the outbound request.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The peer closed the connection before the response ended.
    #[error("connection closed before the response was complete")]
    IncompleteResponse,

    /// The peer sent frames out of order.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// More redirects than allowed.
    #[error("too many redirects (limit {max})")]
    TooManyRedirects {
        /// Configured limit
        max: usize,
    },

    /// A redirect pointed back at a request already made.
    #[error("redirect loop at {method} {uri}")]
    RedirectLoop {
        /// Method of the repeated request
        method: String,
        /// URI of the repeated request
        uri: String,
    },

    /// The response head was already sent.
    #[error("response head already sent")]
    HeadAlreadySent,
}

impl HttpError {
    /// Returns `true` if the connection the error occurred on must not be
    /// reused.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            HttpError::Transport(_) | HttpError::IncompleteResponse | HttpError::Protocol(_)
        )
    }
}
