//! TCP server: listener, accept loop, and the connection cap.
//!
//! The server owns the listening socket and shares one [`Store`] (and
//! one [`ConnectionStats`]) across every connection task it spawns.
//! Concurrent clients are capped by a semaphore sized
//! `max_connections`; when no permit is available a new socket is
//! closed immediately and existing clients are unaffected.
//!
//! Shutdown is driven from outside: the binary races [`Server::run`]
//! against its signal future and drops the server when a signal wins,
//! which closes the listener and every connection with it.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Store;
use crate::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on, on all interfaces.
    pub port: u16,
    /// Cap on concurrently served clients.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// A bound, ready-to-run server.
pub struct Server {
    listener: TcpListener,
    store: Arc<Store>,
    stats: Arc<ConnectionStats>,
    limit: Arc<Semaphore>,
}

impl Server {
    /// Binds the listening socket. Fails if the port is taken.
    pub async fn bind(config: ServerConfig, store: Arc<Store>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        info!(port = config.port, max_connections = config.max_connections, "listening");

        Ok(Self {
            listener,
            store,
            stats: Arc::new(ConnectionStats::new()),
            limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections forever. Run this under a `select!` against
    /// a shutdown signal.
    pub async fn run(self) {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };

            // At capacity: drop the newcomer, keep serving everyone else.
            let permit = match Arc::clone(&self.limit).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(client = %addr, "connection limit reached, rejecting");
                    drop(stream);
                    continue;
                }
            };

            let dispatcher = CommandHandler::new(Arc::clone(&self.store));
            let stats = Arc::clone(&self.stats);
            tokio::spawn(async move {
                handle_connection(stream, addr, dispatcher, stats).await;
                drop(permit);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start(config: ServerConfig) -> std::net::SocketAddr {
        let store = Arc::new(Store::new());
        let server = Server::bind(config, store).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    #[tokio::test]
    async fn serves_a_client_end_to_end() {
        let addr = start(ServerConfig {
            port: 0,
            max_connections: 4,
        })
        .await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"+OK\r\n");
    }

    #[tokio::test]
    async fn connection_cap_rejects_extra_clients() {
        let addr = start(ServerConfig {
            port: 0,
            max_connections: 1,
        })
        .await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 5];
        first.read_exact(&mut buf).await.unwrap();

        // Second client connects at the TCP level but is closed without
        // ever being served.
        let mut second = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        second
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .await
            .unwrap();
        let mut reply = Vec::new();
        let n = second.read_to_end(&mut reply).await.unwrap_or(0);
        assert_eq!(n, 0, "rejected client should see EOF, got {:?}", reply);

        // The first client is still being served.
        first
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .await
            .unwrap();
        first.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"$-1\r\n");
    }
}
