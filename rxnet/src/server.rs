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

//! Accept loop installing a [`Connection`] and a handler on every inbound
//! transport.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rxnet::connection::{BoxError, Connection, ConnectionHandler};
//! use rxnet::serialization::JsonSerializer;
//! use rxnet::server::{Server, ServerConfig};
//! use futures_util::StreamExt;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ConnectionHandler<String, String> for Echo {
//!     async fn handle(&self, connection: Connection<String, String>) -> Result<(), BoxError> {
//!         let mut input = connection.input()?;
//!         while let Some(message) = input.next().await {
//!             connection.write(message?).await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::bind("127.0.0.1:0", ServerConfig::default()).await?;
//! let shutdown = server.shutdown_handle();
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     shutdown.shutdown();
//! });
//! server.serve(JsonSerializer::default(), Arc::new(Echo)).await?;
//! # Ok(())
//! # }
//! ```

use crate::RxError;
use crate::connection::{Connection, ConnectionHandler, serve};
use crate::context;
use crate::observability::{ErrorMetrics, TransportMetrics, log_error};
use crate::serialization::Serializer;
use crate::transport::{TcpTransportListener, TransportError, TransportListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Default time connections get to finish after shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Connections served at once; further connections are closed right
    /// after accept. `None` is unlimited.
    pub max_connections: Option<usize>,

    /// How long open connections get to finish once shutdown starts before
    /// their handlers are aborted.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits concurrently served connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stops accepting, closes open connections and lets
    /// [`Server::serve`] return.
    pub fn shutdown(&self) {
        self.signal.send_replace(true);
    }

    /// Returns `true` once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        *self.signal.borrow()
    }
}

/// Accepts transports from a listener and serves each with a
/// [`ConnectionHandler`].
pub struct Server {
    listener: Box<dyn TransportListener>,
    config: ServerConfig,
    signal: Arc<watch::Sender<bool>>,
    transport_metrics: Arc<TransportMetrics>,
    error_metrics: Arc<ErrorMetrics>,
}

impl Server {
    /// Creates a server over any listener.
    pub fn new(listener: impl TransportListener, config: ServerConfig) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            listener: Box::new(listener),
            config,
            signal: Arc::new(signal),
            transport_metrics: Arc::new(TransportMetrics::new()),
            error_metrics: Arc::new(ErrorMetrics::new()),
        }
    }

    /// Creates a server listening on a TCP address.
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, TransportError> {
        let listener = TcpTransportListener::bind(addr).await?;
        Ok(Self::new(listener, config))
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<String, TransportError> {
        self.listener.local_addr()
    }

    /// Handle for stopping the server from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Metrics of every connection this server accepted.
    pub fn transport_metrics(&self) -> &Arc<TransportMetrics> {
        &self.transport_metrics
    }

    /// Handler failures by layer.
    pub fn error_metrics(&self) -> &Arc<ErrorMetrics> {
        &self.error_metrics
    }

    /// Runs the accept loop until shutdown or until the listener closes.
    ///
    /// Every accepted transport becomes a [`Connection`] served by `handler`
    /// on its own task; the connection closes when the handler is done. On
    /// shutdown all open connections are closed and their handlers get
    /// [`ServerConfig::shutdown_timeout`] to return.
    pub async fn serve<I, O, S, H>(&self, serializer: S, handler: Arc<H>) -> Result<(), TransportError>
    where
        I: serde::de::DeserializeOwned + Send + 'static,
        O: serde::Serialize + Send + 'static,
        S: Serializer + Clone,
        H: ConnectionHandler<I, O>,
    {
        let mut shutdown = self.signal.subscribe();
        let mut connections: Vec<Connection<I, O>> = Vec::new();
        let mut tasks = JoinSet::new();

        #[cfg(feature = "observability")]
        info!(addr = ?self.listener.local_addr().ok(), "Server accepting connections");

        let outcome = loop {
            let accepted = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break Ok(()),
                accepted = self.listener.accept() => accepted,
            };
            while tasks.try_join_next().is_some() {}

            let transport = match accepted {
                Ok(transport) => transport,
                Err(TransportError::Closed) => break Ok(()),
                Err(error) if error.is_recoverable() => {
                    #[cfg(feature = "observability")]
                    warn!(error = %error, "Accept failed");

                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
                Err(error) => break Err(error),
            };

            connections.retain(Connection::is_open);
            if self
                .config
                .max_connections
                .is_some_and(|max| connections.len() >= max)
            {
                #[cfg(feature = "observability")]
                warn!(
                    open = connections.len(),
                    "Connection limit reached, closing accepted transport"
                );
                drop(transport);
                continue;
            }

            let connection =
                Connection::with_metrics(transport, serializer.clone(), Arc::clone(&self.transport_metrics));
            connections.push(connection.clone());

            let handler = Arc::clone(&handler);
            let errors = Arc::clone(&self.error_metrics);
            // Each connection task gets its own frame stack; without it a
            // handler's frames would land on whichever runtime thread polls it.
            tasks.spawn(context::scope(async move {
                if let Err(error) = serve(connection, &*handler).await {
                    let error = RxError::Application(error);
                    errors.record_error(&error);
                    log_error(&error);
                }
            }));
        };

        #[cfg(feature = "observability")]
        debug!(open = connections.len(), "Server stopping");

        for connection in &connections {
            connection.close();
        }
        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            #[cfg(feature = "observability")]
            warn!(remaining = tasks.len(), "Aborting handlers after shutdown timeout");

            tasks.shutdown().await;
        }

        outcome
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("config", &self.config)
            .field("shutdown", &*self.signal.borrow())
            .finish()
    }
}
