//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode driver commands and parse store replies, including the
//! nested arrays returned by HSCAN and pushed by subscriptions.
//!
//! ## Design Principles
//! 1. **Recursive Descent**: One reply is read per call; arrays recurse.
//! 2. **Line Buffer Reuse**: The caller owns the header line buffer.
//! 3. **Binary-Safe**: Bulk strings are treated as raw bytes.
//! 4. **Untrusted Lengths**: Headers never size an allocation up front, and
//!    bulk lengths beyond the store's maximum are a protocol error.

use std::fmt::Write as _;
use std::io::{BufRead, Read};

use bytes::{BufMut, BytesMut};

use crate::error::{DriverError, DriverResult};

/// RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// +OK or +PONG style replies.
    Simple(Vec<u8>),
    /// -ERR ... replies.
    Error(Vec<u8>),
    /// :123 replies.
    Integer(i64),
    /// $... bulk strings, with None for null.
    Bulk(Option<Vec<u8>>),
    /// *... arrays.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Converts a non-null bulk or simple string into UTF-8 text.
    pub fn into_text(self) -> DriverResult<String> {
        match self {
            RespValue::Bulk(Some(data)) | RespValue::Simple(data) => Ok(String::from_utf8(data)?),
            RespValue::Error(message) => Err(DriverError::server(message)),
            _ => Err(DriverError::UnexpectedResponse),
        }
    }
}

/// Largest bulk string the store will ever send.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

// Peer-announced lengths are only trusted up to this much preallocation;
// larger replies grow as their bytes actually arrive.
const PREALLOC_LIMIT: usize = 1024;

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut BytesMut) {
    put_header(out, b'*', args.len());
    for arg in args {
        put_header(out, b'$', arg.len());
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

fn put_header(out: &mut BytesMut, marker: u8, len: usize) {
    out.put_u8(marker);
    // BytesMut grows on demand, so formatting into it cannot fail.
    let _ = write!(out, "{}\r\n", len);
}

/// Reads one RESP value from the buffered reader.
///
/// A reader at end of stream yields `DriverError::Closed`; a length header
/// that is negative (other than nil) or too large yields `Protocol`.
pub fn read_response<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
) -> DriverResult<RespValue> {
    read_line(reader, line_buf)?;
    let (&marker, body) = line_buf.split_first().ok_or(DriverError::Protocol)?;

    match marker {
        b'+' => Ok(RespValue::Simple(body.to_vec())),
        b'-' => Ok(RespValue::Error(body.to_vec())),
        b':' => Ok(RespValue::Integer(parse_integer(body)?)),
        b'$' => match parse_length(body)? {
            Some(len) => read_bulk(reader, len).map(|data| RespValue::Bulk(Some(data))),
            None => Ok(RespValue::Bulk(None)),
        },
        b'*' => {
            let len = parse_length(body)?.unwrap_or(0);
            let mut items = Vec::with_capacity(len.min(PREALLOC_LIMIT));
            for _ in 0..len {
                items.push(read_response(reader, line_buf)?);
            }
            Ok(RespValue::Array(items))
        }
        _ => Err(DriverError::Protocol),
    }
}

/// Reads a bulk payload of `len` bytes followed by CRLF.
fn read_bulk<R: BufRead>(reader: &mut R, len: usize) -> DriverResult<Vec<u8>> {
    if len > MAX_BULK_LEN {
        return Err(DriverError::Protocol);
    }
    let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    reader.by_ref().take(len as u64 + 2).read_to_end(&mut data)?;
    if data.len() < len + 2 {
        return Err(DriverError::Closed);
    }
    if !data.ends_with(b"\r\n") {
        return Err(DriverError::Protocol);
    }
    data.truncate(len);
    Ok(data)
}

/// Reads one CRLF-terminated line into `buf`, without the terminator.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> DriverResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(DriverError::Closed);
    }
    if !buf.ends_with(b"\r\n") {
        return Err(DriverError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_integer(digits: &[u8]) -> DriverResult<i64> {
    std::str::from_utf8(digits)
        .ok()
        .filter(|text| !text.starts_with('+'))
        .and_then(|text| text.parse().ok())
        .ok_or(DriverError::Protocol)
}

/// Parses a bulk or array length; `-1` is the nil marker.
fn parse_length(digits: &[u8]) -> DriverResult<Option<usize>> {
    match parse_integer(digits)? {
        -1 => Ok(None),
        len => usize::try_from(len).map(Some).map_err(|_| DriverError::Protocol),
    }
}
