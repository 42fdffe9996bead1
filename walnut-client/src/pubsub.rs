//! # Publish/Subscribe
//!
//! Purpose: Send messages to named channels and deliver inbound messages of
//! one channel to application code, in order, until told to stop.
//!
//! ## Design Principles
//! 1. **Dedicated Connection**: A subscribed connection cannot serve other
//!    commands, so each subscription opens its own socket outside the pool.
//! 2. **Lazy Sequence**: `Subscription` is an iterator over inbound messages;
//!    `subscribe` is a blocking loop over it driven by a handler.
//! 3. **Release on Every Exit**: Dropping a `Subscription` unsubscribes and
//!    closes the socket, whether the loop ended by closure or by error.
//! 4. **No Reconnect**: A dropped connection ends the sequence.

use std::io;

use tracing::{debug, trace};

use crate::client::{integer_reply, RedisDriver};
use crate::error::{DriverError, DriverResult};
use crate::pool::Connection;
use crate::resp::RespValue;

/// Inbound notification on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

impl RedisDriver {
    /// Sends `message` to `channel`.
    ///
    /// Does not wait for subscribers; the message is lost when none listen.
    pub fn publish(&self, channel: &str, message: &str) -> DriverResult<()> {
        let mut conn = self.conn()?;
        let reply = conn.exec(&[b"PUBLISH", channel.as_bytes(), message.as_bytes()])?;
        let receivers = integer_reply(reply)?;
        trace!(channel, receivers, "published message");
        Ok(())
    }

    /// Subscribes to `channel` and returns the inbound message sequence.
    pub fn open_subscription(&self, channel: &str) -> DriverResult<Subscription> {
        let mut conn = self.pool()?.open_dedicated()?;
        conn.send(&[b"SUBSCRIBE", channel.as_bytes()])?;
        let confirmed = match conn.receive()? {
            RespValue::Array(items) => matches!(classify(items), Some(Push::Subscribed)),
            RespValue::Error(message) => return Err(DriverError::server(message)),
            _ => false,
        };
        if !confirmed {
            return Err(DriverError::UnexpectedResponse);
        }
        debug!(channel, "subscribed");
        Ok(Subscription {
            conn,
            channel: channel.to_string(),
            closed: false,
        })
    }

    /// Subscribes to `channel` and calls `handler` once per inbound message,
    /// blocking the calling thread.
    ///
    /// Messages are handled strictly in order; the next one is not read until
    /// the handler returns. Returns `Ok(())` when the store closes the
    /// connection and the handler's error when it fails. The subscription is
    /// released on every exit path.
    pub fn subscribe<F, E>(&self, channel: &str, mut handler: F) -> Result<(), E>
    where
        F: FnMut(Message) -> Result<(), E>,
        E: From<DriverError>,
    {
        let mut subscription = self.open_subscription(channel)?;
        for message in &mut subscription {
            if let Err(err) = handler(message?) {
                debug!(channel, "subscription handler failed, closing");
                return Err(err);
            }
        }
        debug!(channel, "subscription closed by store");
        Ok(())
    }
}

/// Active subscription to one channel.
///
/// Yields messages until the store closes the connection. Dropping it
/// unsubscribes and closes the socket.
pub struct Subscription {
    conn: Connection,
    channel: String,
    closed: bool,
}

impl Subscription {
    /// Channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Unsubscribes and closes the connection.
    pub fn close(self) {
        drop(self);
    }

    fn fail(&mut self, err: DriverError) -> Option<DriverResult<Message>> {
        self.closed = true;
        Some(Err(err))
    }
}

impl Iterator for Subscription {
    type Item = DriverResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        loop {
            match self.conn.receive() {
                Ok(RespValue::Array(items)) => match classify(items) {
                    Some(Push::Message(message)) => return Some(Ok(message)),
                    Some(Push::Subscribed) | Some(Push::Other) => continue,
                    None => return self.fail(DriverError::UnexpectedResponse),
                },
                Ok(RespValue::Error(message)) => return self.fail(DriverError::server(message)),
                Ok(_) => return self.fail(DriverError::UnexpectedResponse),
                Err(err) if is_teardown(&err) => {
                    self.closed = true;
                    return None;
                }
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort: the socket is closed right after either way.
            let _ = self.conn.send(&[b"UNSUBSCRIBE", self.channel.as_bytes()]);
        }
        self.conn.shutdown();
        debug!(channel = %self.channel, "subscription released");
    }
}

enum Push {
    Message(Message),
    Subscribed,
    Other,
}

fn classify(items: Vec<RespValue>) -> Option<Push> {
    let mut items = items.into_iter();
    let kind = match items.next()? {
        RespValue::Bulk(Some(kind)) | RespValue::Simple(kind) => kind,
        _ => return None,
    };
    match kind.as_slice() {
        b"message" => {
            let channel = lossy_text(items.next()?)?;
            let payload = lossy_text(items.next()?)?;
            Some(Push::Message(Message { channel, payload }))
        }
        b"subscribe" => Some(Push::Subscribed),
        _ => Some(Push::Other),
    }
}

/// Payloads come from arbitrary publishers; bytes that are not UTF-8 are
/// replaced rather than failing the subscription.
fn lossy_text(value: RespValue) -> Option<String> {
    match value {
        RespValue::Bulk(Some(data)) | RespValue::Simple(data) => Some(
            String::from_utf8(data)
                .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()),
        ),
        _ => None,
    }
}

fn is_teardown(err: &DriverError) -> bool {
    match err {
        DriverError::Closed => true,
        DriverError::Io(err) => matches!(
            err.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
