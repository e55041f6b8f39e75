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

//! Per-connection handler invocation with guaranteed close.

use super::Connection;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Error type returned by application handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Application logic for one connection.
///
/// The returned future represents "processing of this connection is done".
/// [`serve`] closes the connection exactly once when it resolves, fails,
/// panics, or is dropped.
///
/// # Examples
///
/// ```rust
/// use futures_util::StreamExt;
/// use rxnet::connection::{BoxError, Connection, ConnectionHandler};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl ConnectionHandler<String, String> for Echo {
///     async fn handle(&self, connection: Connection<String, String>) -> Result<(), BoxError> {
///         let mut input = connection.input()?;
///         while let Some(message) = input.next().await {
///             connection.write(message?).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ConnectionHandler<I, O>: Send + Sync + 'static
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Processes one connection.
    async fn handle(&self, connection: Connection<I, O>) -> Result<(), BoxError>;
}

/// Closes the connection when dropped, whatever the exit path.
struct CloseGuard<I, O>(Connection<I, O>);

impl<I, O> Drop for CloseGuard<I, O> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs `handler` on `connection` and closes the connection afterwards.
///
/// A panicking handler is reported as an error. Dropping the returned future
/// cancels the handler and still closes the connection.
pub async fn serve<I, O, H>(connection: Connection<I, O>, handler: &H) -> Result<(), BoxError>
where
    I: Send + 'static,
    O: Send + 'static,
    H: ConnectionHandler<I, O> + ?Sized,
{
    let guard = CloseGuard(connection.clone());
    #[cfg(feature = "observability")]
    let id = connection.id();

    let outcome = AssertUnwindSafe(handler.handle(connection))
        .catch_unwind()
        .await;
    drop(guard);

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => Err(format!("connection handler panicked: {}", panic_message(&*panic)).into()),
    };

    #[cfg(feature = "observability")]
    match &result {
        Ok(()) => debug!(transport_id = %id, "Connection handler completed"),
        Err(error) => warn!(transport_id = %id, error = %error, "Connection handler failed"),
    }

    result
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::serialization::JsonSerializer;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    struct Outcome(Option<&'static str>);

    #[async_trait::async_trait]
    impl ConnectionHandler<String, String> for Outcome {
        async fn handle(&self, connection: Connection<String, String>) -> Result<(), BoxError> {
            connection.write("hello".to_string()).await?;
            match self.0 {
                None => Ok(()),
                Some("panic") => panic!("handler exploded"),
                Some(message) => Err(message.into()),
            }
        }
    }

    struct Forever;

    #[async_trait::async_trait]
    impl ConnectionHandler<String, String> for Forever {
        async fn handle(&self, _connection: Connection<String, String>) -> Result<(), BoxError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn connection() -> (Connection<String, String>, MemoryTransport) {
        let (a, b) = MemoryTransport::pair_default();
        (Connection::new(a, JsonSerializer::default()), b)
    }

    #[tokio::test]
    async fn test_completion_closes() {
        let (connection, _peer) = connection();
        serve(connection.clone(), &Outcome(None)).await.unwrap();
        connection.closed().await;
    }

    #[tokio::test]
    async fn test_error_closes() {
        let (connection, _peer) = connection();
        let error = serve(connection.clone(), &Outcome(Some("boom")))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "boom");
        connection.closed().await;
    }

    #[tokio::test]
    async fn test_panic_closes() {
        let (connection, _peer) = connection();
        let error = serve(connection.clone(), &Outcome(Some("panic")))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("handler exploded"));
        connection.closed().await;
    }

    #[tokio::test]
    async fn test_cancellation_closes() {
        let (connection, _peer) = connection();
        let serving = serve(connection.clone(), &Forever);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), serving).await;
        assert!(timed_out.is_err());
        connection.closed().await;
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}
