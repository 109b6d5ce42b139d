//! Per-client connection handling.
//!
//! Each accepted socket gets its own task running a
//! [`ConnectionHandler`]: read bytes into the input buffer, frame as
//! many complete RESP commands as the buffer holds, dispatch each one,
//! and write the replies back in arrival order. Because the parse loop
//! drains the buffer before the next read, pipelined requests arriving
//! in one segment produce their replies in order with no special
//! handling.
//!
//! A connection closes on: peer FIN, an unrecoverable I/O error, a
//! RESP framing error, an input buffer past 10 MiB, or 60 s without
//! any traffic. Command-level errors (unknown verb, bad arity) are
//! replies, not connection errors.

use crate::commands::CommandHandler;
use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Hard cap on buffered, unparsed input per connection (10 MiB).
pub const MAX_INPUT_BUFFER: usize = 10 * 1024 * 1024;

/// Read granularity: capacity reserved ahead of each socket read.
const READ_CHUNK: usize = 64 * 1024;

/// Initial input buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// A connection idle this long is closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total connections accepted over the server's lifetime.
    pub connections_accepted: AtomicU64,
    /// Connections currently being served.
    pub active_connections: AtomicU64,
    /// Commands dispatched.
    pub commands_processed: AtomicU64,
    /// Bytes read off sockets.
    pub bytes_read: AtomicU64,
    /// Bytes written to sockets.
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn add_bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Why a connection ended.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Peer closed the connection between commands.
    #[error("client disconnected")]
    Disconnected,

    /// Peer closed the connection mid-command.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("input buffer limit exceeded")]
    BufferFull,

    #[error("idle timeout")]
    IdleTimeout,
}

/// State for one client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    dispatcher: CommandHandler,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
    last_activity: Instant,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            parser: RespParser::new(),
            stats,
            last_activity: Instant::now(),
        }
    }

    /// Serves the connection until the peer leaves or an error closes it.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.serve().await;

        match &result {
            Ok(()) | Err(ConnectionError::Disconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::IdleTimeout) => {
                info!(client = %self.addr, "closing idle connection")
            }
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "closing connection"),
        }

        self.stats.connection_closed();
        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete command already buffered before
            // touching the socket again.
            while let Some(command) = self.frame_command()? {
                let reply = self.dispatcher.execute(command);
                self.stats.command_processed();
                self.write_reply(&reply).await?;
            }

            self.fill_buffer().await?;
        }
    }

    /// Frames one command off the head of the input buffer.
    ///
    /// `Ok(None)` means the buffer holds no complete command yet.
    fn frame_command(&mut self) -> Result<Option<RespValue>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((value, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(client = %self.addr, consumed, remaining = self.buffer.len(), "framed command");
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "protocol error");
                Err(ConnectionError::Parse(e))
            }
        }
    }

    /// One socket read into the input buffer, bounded by the idle
    /// timeout and the buffer cap.
    async fn fill_buffer(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_INPUT_BUFFER {
            warn!(client = %self.addr, size = self.buffer.len(), "input buffer over limit");
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(READ_CHUNK);
        }

        let read = tokio::time::timeout(
            IDLE_TIMEOUT.saturating_sub(self.last_activity.elapsed()),
            self.stream.get_mut().read_buf(&mut self.buffer),
        )
        .await;

        let n = match read {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::IdleTimeout),
        };

        if n == 0 {
            // Peer FIN. A non-empty buffer means it quit mid-command.
            return if self.buffer.is_empty() {
                Err(ConnectionError::Disconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.last_activity = Instant::now();
        self.stats.add_bytes_read(n);
        trace!(client = %self.addr, bytes = n, "read");
        Ok(())
    }

    async fn write_reply(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.last_activity = Instant::now();
        self.stats.add_bytes_written(bytes.len());
        Ok(())
    }
}

/// Runs a [`ConnectionHandler`] to completion, swallowing the routine
/// disconnect outcomes. This is what the server spawns per client.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, dispatcher, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::Disconnected | ConnectionError::IdleTimeout => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => debug!(client = %addr, error = %e, "connection ended with error"),
        }
    }
}
