//! # Hash Scanning
//!
//! Purpose: Enumerate a hash page by page with the store's cursor protocol.
//!
//! A cursor of 0 both starts and ends a scan. Pages may be empty while the
//! cursor is still non-zero, so completion is decided by the cursor alone.
//! Fields changed during a scan may be seen zero, one or more times.

use crate::client::RedisDriver;
use crate::error::{DriverError, DriverResult};
use crate::resp::RespValue;

/// Continuation state for an incremental scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    /// Opaque position returned by the store; 0 starts a scan.
    pub position: u64,
    /// Store-native glob; empty matches everything.
    pub pattern: String,
    /// Page size hint; non-positive leaves it to the store.
    pub page_size: i64,
}

impl ScanCursor {
    /// Cursor positioned at the start of a scan.
    pub fn start(pattern: impl Into<String>, page_size: i64) -> Self {
        ScanCursor {
            position: 0,
            pattern: pattern.into(),
            page_size,
        }
    }
}

/// One page of an HSCAN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to continue from; 0 when the scan is complete.
    pub cursor: u64,
    /// Field/value pairs of this page.
    pub entries: Vec<(String, String)>,
}

impl ScanPage {
    /// True when no further page follows.
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

impl RedisDriver {
    /// Fetches one page of field/value pairs of the hash at `key`.
    ///
    /// `MATCH` is sent only for a non-empty `pattern`, `COUNT` only for a
    /// positive `count`.
    pub fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: i64,
    ) -> DriverResult<ScanPage> {
        let cursor_arg = cursor.to_string();
        let count_arg = count.to_string();
        let mut args: Vec<&[u8]> = vec![&b"HSCAN"[..], key.as_bytes(), cursor_arg.as_bytes()];
        if !pattern.is_empty() {
            args.push(b"MATCH");
            args.push(pattern.as_bytes());
        }
        if count > 0 {
            args.push(b"COUNT");
            args.push(count_arg.as_bytes());
        }

        let mut conn = self.conn()?;
        parse_scan_reply(conn.exec(&args)?)
    }

    /// Iterates every field/value pair of the hash at `key`, following
    /// continuation cursors until the store reports completion.
    pub fn hscan_iter(&self, key: &str, pattern: &str, count: i64) -> HashScan<'_> {
        HashScan {
            driver: self,
            key: key.to_string(),
            cursor: ScanCursor::start(pattern, count),
            buffered: Vec::new().into_iter(),
            finished: false,
        }
    }
}

/// Iterator over a whole hash, fetching pages lazily.
///
/// After an error the iterator yields nothing further.
pub struct HashScan<'a> {
    driver: &'a RedisDriver,
    key: String,
    cursor: ScanCursor,
    buffered: std::vec::IntoIter<(String, String)>,
    finished: bool,
}

impl HashScan<'_> {
    /// Current continuation state.
    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }
}

impl Iterator for HashScan<'_> {
    type Item = DriverResult<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffered.next() {
                return Some(Ok(entry));
            }
            if self.finished {
                return None;
            }

            let page = self.driver.hscan(
                &self.key,
                self.cursor.position,
                &self.cursor.pattern,
                self.cursor.page_size,
            );
            match page {
                Ok(page) => {
                    self.cursor.position = page.cursor;
                    self.finished = page.is_last();
                    self.buffered = page.entries.into_iter();
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn parse_scan_reply(reply: RespValue) -> DriverResult<ScanPage> {
    let items = match reply {
        RespValue::Array(items) => items,
        RespValue::Error(message) => return Err(DriverError::server(message)),
        _ => return Err(DriverError::UnexpectedResponse),
    };
    let mut items = items.into_iter();
    let (cursor, flat) = match (items.next(), items.next(), items.next()) {
        (Some(cursor), Some(RespValue::Array(flat)), None) => (cursor, flat),
        _ => return Err(DriverError::UnexpectedResponse),
    };

    let cursor = cursor
        .into_text()?
        .parse::<u64>()
        .map_err(|_| DriverError::Protocol)?;
    if flat.len() % 2 != 0 {
        return Err(DriverError::UnexpectedResponse);
    }

    let mut entries = Vec::with_capacity(flat.len() / 2);
    let mut flat = flat.into_iter();
    while let (Some(field), Some(value)) = (flat.next(), flat.next()) {
        entries.push((field.into_text()?, value.into_text()?));
    }
    Ok(ScanPage { cursor, entries })
}
