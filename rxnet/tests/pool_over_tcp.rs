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

//! Connection pool against a real TCP echo server.
//!
//! Verifies the pool's accounting under concurrent use: every connection is
//! either idle or in use, admission limits hold, and released connections
//! keep working when they are handed out again.

use futures_util::StreamExt;
use rxnet::connection::{BoxError, Connection, ConnectionHandler};
use rxnet::pool::{ConnectionPool, MaxConnectionsStrategy, PoolConfig, PoolError, PoolStats};
use rxnet::serialization::JsonSerializer;
use rxnet::server::{Server, ServerConfig, ShutdownHandle};
use rxnet::transport::{Destination, TcpChannelFactory, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Echo;

#[async_trait::async_trait]
impl ConnectionHandler<String, String> for Echo {
    async fn handle(&self, connection: Connection<String, String>) -> Result<(), BoxError> {
        let mut input = connection.input()?;
        while let Some(message) = input.next().await {
            connection.write(message?).await?;
        }
        Ok(())
    }
}

async fn start_echo_server() -> (Destination, ShutdownHandle, JoinHandle<Result<(), TransportError>>) {
    let server = Server::bind("127.0.0.1:0", ServerConfig::default())
        .await
        .unwrap();
    let addr: SocketAddr = server.local_addr().unwrap().parse().unwrap();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(async move { server.serve(JsonSerializer::default(), Arc::new(Echo)).await });
    (Destination::from(addr), shutdown, task)
}

fn assert_consistent(stats: &PoolStats) {
    assert_eq!(stats.total, stats.idle + stats.in_use, "{stats:?}");
    assert!(stats.pending <= stats.in_use, "{stats:?}");
}

async fn round_trip(pool: &ConnectionPool<String, String>, message: String) -> Result<String, BoxError> {
    let connection = pool.acquire().await?;
    let reply = {
        let mut input = connection.input()?;
        connection.write(message).await?;
        input.next().await.ok_or("connection closed")??
    };
    connection.release();
    Ok(reply)
}

#[tokio::test]
async fn test_echo_through_pool() {
    let (destination, shutdown, server) = start_echo_server().await;
    let pool: ConnectionPool<String, String> = ConnectionPool::new(
        destination,
        Arc::new(TcpChannelFactory::new()),
        JsonSerializer::default(),
        PoolConfig::default(),
    );

    for i in 0..5 {
        let reply = round_trip(&pool, format!("message {i}")).await.unwrap();
        assert_eq!(reply, format!("message {i}"));
    }

    let stats = pool.stats();
    assert_consistent(&stats);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.counters.creations, 1);
    assert_eq!(stats.counters.reuses, 4);
    assert_eq!(stats.counters.release_succeeded, 5);

    pool.shutdown();
    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_respect_limit() {
    let (destination, shutdown, server) = start_echo_server().await;
    let strategy = Arc::new(MaxConnectionsStrategy::new(3));
    let pool: ConnectionPool<String, String> = ConnectionPool::new(
        destination,
        Arc::new(TcpChannelFactory::new()),
        JsonSerializer::default(),
        PoolConfig::default().with_admission_strategy(strategy),
    );

    let mut workers = Vec::new();
    for worker in 0..12 {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            let mut delivered = 0u32;
            let mut exhausted = 0u32;
            for round in 0..20 {
                let message = format!("{worker}/{round}");
                match round_trip(&pool, message.clone()).await {
                    Ok(reply) => {
                        assert_eq!(reply, message);
                        delivered += 1;
                    }
                    Err(error) => {
                        assert!(
                            matches!(error.downcast_ref::<PoolError>(), Some(PoolError::Exhausted { .. })),
                            "unexpected error {error}"
                        );
                        exhausted += 1;
                        tokio::task::yield_now().await;
                    }
                }
                let stats = pool.stats();
                assert_consistent(&stats);
                assert!(stats.total <= 3, "{stats:?}");
            }
            (delivered, exhausted)
        }));
    }

    let mut delivered = 0;
    let mut exhausted = 0;
    for worker in workers {
        let (d, e) = worker.await.unwrap();
        delivered += d;
        exhausted += e;
    }
    assert_eq!(delivered + exhausted, 12 * 20);
    assert!(delivered > 0);

    let stats = pool.stats();
    assert_consistent(&stats);
    assert_eq!(stats.in_use, 0);
    assert!(stats.counters.creations <= 3);
    assert_eq!(
        stats.counters.acquire_attempted,
        stats.counters.acquire_succeeded + stats.counters.acquire_failed
    );
    assert_eq!(stats.counters.acquire_failed, u64::from(exhausted));
    assert_eq!(
        stats.counters.acquire_succeeded,
        stats.counters.creations + stats.counters.reuses
    );

    pool.shutdown();
    shutdown.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_gone_fails_acquire() {
    let (destination, shutdown, server) = start_echo_server().await;
    shutdown.shutdown();
    server.await.unwrap().unwrap();

    let pool: ConnectionPool<String, String> = ConnectionPool::new(
        destination,
        Arc::new(TcpChannelFactory::new().with_connect_timeout(Duration::from_secs(5))),
        JsonSerializer::default(),
        PoolConfig::default(),
    );

    let error = pool.acquire().await.unwrap_err();
    assert!(matches!(error, PoolError::ConnectFailed { .. }), "{error:?}");

    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.counters.acquire_failed, 1);
}

#[tokio::test]
async fn test_peer_close_evicts_idle_connection() {
    let (destination, shutdown, server) = start_echo_server().await;
    let pool: ConnectionPool<String, String> = ConnectionPool::new(
        destination,
        Arc::new(TcpChannelFactory::new()),
        JsonSerializer::default(),
        PoolConfig::default(),
    );

    let pooled = pool.acquire().await.unwrap();
    let connection = pooled.connection().clone();
    pooled.release();
    assert_eq!(pool.stats().idle, 1);

    // Stopping the server closes its side of every connection.
    shutdown.shutdown();
    server.await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(5), connection.closed())
        .await
        .unwrap();

    // The dead idle connection is evicted rather than handed out; the
    // replacement connect fails because nothing listens anymore.
    let error = pool.acquire().await.unwrap_err();
    assert!(matches!(error, PoolError::ConnectFailed { .. }), "{error:?}");

    let stats = pool.stats();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.counters.evictions, 1);
    assert_eq!(stats.counters.reuses, 0);
}
