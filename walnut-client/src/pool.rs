//! # Connection Pool
//!
//! Purpose: Bound and reuse TCP connections to the store so concurrent
//! callers share one handle without a handshake per command.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 3. **Bounded Waiting**: A caller finding every slot busy waits up to the
//!    pool timeout, then fails with `PoolTimeout`.
//! 4. **Cache-Friendly Buffers**: Each connection reuses its own buffers.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use crate::resp::{encode_command, read_response, RespValue};

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
}

struct PoolInner {
    config: DriverConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PoolInner {
    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.total = state.total.saturating_sub(1);
        self.available.notify_one();
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.state.lock();
        state.idle.push_back(conn);
        self.available.notify_one();
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked and ready for reuse.
    pub idle: usize,
    /// Connections open, idle or checked out.
    pub total: usize,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates an empty pool; connections are opened on demand.
    pub fn new(config: DriverConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.pool_size),
            total: 0,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
                available: Condvar::new(),
            }),
        }
    }

    /// Acquires a connection, waiting up to the pool timeout for a free slot.
    pub fn acquire(&self) -> DriverResult<PooledConnection> {
        let config = &self.inner.config;
        // A timeout too large for an Instant waits without a deadline.
        let deadline = Instant::now().checked_add(config.pool_timeout);

        let mut state = self.inner.state.lock();
        loop {
            if let Some(conn) = state.idle.pop_front() {
                return Ok(PooledConnection::new(self.inner.clone(), conn));
            }
            if state.total < config.pool_size {
                state.total += 1;
                break;
            }
            trace!(pool_size = config.pool_size, "waiting for a pooled connection");
            let timed_out = match deadline {
                Some(deadline) => self.inner.available.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.inner.available.wait(&mut state);
                    false
                }
            };
            if timed_out && state.idle.is_empty() && state.total >= config.pool_size {
                warn!(
                    pool_size = config.pool_size,
                    timeout_ms = config.pool_timeout.as_millis() as u64,
                    "pool timeout"
                );
                return Err(DriverError::PoolTimeout);
            }
        }
        drop(state);

        match Connection::open(config, config.read_timeout) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.inner.release_slot();
                Err(err)
            }
        }
    }

    /// Opens a connection that does not count against the pool.
    ///
    /// Used for subscriptions, which park a connection for their lifetime.
    pub fn open_dedicated(&self) -> DriverResult<Connection> {
        Connection::open(&self.inner.config, None)
    }

    /// Returns current pool occupancy.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            idle: state.idle.len(),
            total: state.total,
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes a RESP command and returns the parsed reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> DriverResult<RespValue> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(DriverError::NotConnected),
        };
        let response = conn.exec(args);
        if response.is_err() {
            // If IO/protocol fails, do not return this connection to the pool.
            self.valid = false;
        }
        response
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        if self.valid {
            self.pool.return_connection(conn);
        } else {
            self.pool.release_slot();
        }
    }
}

/// Single TCP connection with reusable buffers.
///
/// The buffers are stored on the connection to avoid per-call allocations.
pub struct Connection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
}

impl Connection {
    fn open(config: &DriverConfig, read_timeout: Option<Duration>) -> DriverResult<Self> {
        let stream = connect_stream(config)?;
        stream.set_read_timeout(read_timeout)?;
        if let Some(timeout) = config.write_timeout {
            stream.set_write_timeout(Some(timeout))?;
        }
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
        };
        conn.handshake(config)?;
        debug!(address = %config.address, database = config.database, "opened store connection");
        Ok(conn)
    }

    fn handshake(&mut self, config: &DriverConfig) -> DriverResult<()> {
        if !config.password.is_empty() {
            let reply = self.exec(&[b"AUTH", config.password.as_bytes()])?;
            expect_ok(reply)?;
        }
        if config.database != 0 {
            let database = config.database.to_string();
            let reply = self.exec(&[b"SELECT", database.as_bytes()])?;
            expect_ok(reply)?;
        }
        Ok(())
    }

    /// Sends one command and reads its reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> DriverResult<RespValue> {
        self.send(args)?;
        self.receive()
    }

    /// Writes one command without waiting for a reply.
    pub fn send(&mut self, args: &[&[u8]]) -> DriverResult<()> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Reads the next value the store sends on this connection.
    pub fn receive(&mut self) -> DriverResult<RespValue> {
        read_response(&mut self.reader, &mut self.line_buf)
    }

    /// Closes both halves of the socket.
    pub fn shutdown(&self) {
        // The peer may already be gone; nothing left to release then.
        let _ = self.reader.get_ref().shutdown(Shutdown::Both);
    }
}

fn expect_ok(reply: RespValue) -> DriverResult<()> {
    match reply {
        RespValue::Simple(_) => Ok(()),
        RespValue::Error(message) => Err(DriverError::server(message)),
        _ => Err(DriverError::UnexpectedResponse),
    }
}

fn connect_stream(config: &DriverConfig) -> DriverResult<TcpStream> {
    let addr: SocketAddr = config
        .address
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| DriverError::InvalidAddress(config.address.clone()))?;
    let stream = match config.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    Ok(stream)
}
