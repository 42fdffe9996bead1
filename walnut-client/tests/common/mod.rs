//! In-process RESP2 store used by the integration tests.
//!
//! Speaks just enough of the protocol for the driver: strings with expiry,
//! hashes, HSCAN with offset cursors, AUTH/SELECT and channel pub/sub.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use walnut_client::{DriverConfig, RedisDriver};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Entry {
    Str { value: String, expires_at: Option<Instant> },
    Hash(BTreeMap<String, String>),
}

#[derive(Default)]
struct Shared {
    password: Option<String>,
    data: Mutex<HashMap<(i64, String), Entry>>,
    subscribers: Mutex<HashMap<String, Vec<(u64, TcpStream)>>>,
    clients: Mutex<Vec<TcpStream>>,
    commands: Mutex<Vec<Vec<String>>>,
    accepted: AtomicUsize,
    next_conn: AtomicU64,
}

pub struct FakeStore {
    addr: String,
    shared: Arc<Shared>,
}

impl FakeStore {
    pub fn start() -> Self {
        Self::start_with(None)
    }

    pub fn with_password(password: &str) -> Self {
        Self::start_with(Some(password.to_string()))
    }

    fn start_with(password: Option<String>) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let shared = Arc::new(Shared {
            password,
            ..Default::default()
        });

        let accept_shared = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_shared.accepted.fetch_add(1, Ordering::SeqCst);
                let id = accept_shared.next_conn.fetch_add(1, Ordering::SeqCst);
                if let Ok(handle) = stream.try_clone() {
                    accept_shared.clients.lock().push(handle);
                }
                let shared = accept_shared.clone();
                thread::spawn(move || serve(id, stream, shared));
            }
        });

        FakeStore { addr, shared }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn driver(&self) -> RedisDriver {
        RedisDriver::with_config(self.config())
    }

    pub fn config(&self) -> DriverConfig {
        let mut config = DriverConfig::new(self.addr.clone(), "", 0);
        config.read_timeout = Some(Duration::from_secs(2));
        config.write_timeout = Some(Duration::from_secs(2));
        config.connect_timeout = Some(Duration::from_secs(2));
        config.pool_timeout = Duration::from_secs(2);
        config
    }

    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Every command received, as text.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.shared.commands.lock().clone()
    }

    pub fn saw_command(&self, expected: &[&str]) -> bool {
        self.commands().iter().any(|cmd| {
            cmd.len() == expected.len()
                && cmd.iter().zip(expected).all(|(a, b)| a.eq_ignore_ascii_case(b))
        })
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.shared
            .subscribers
            .lock()
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Polls until `channel` has exactly `count` subscribers.
    pub fn wait_for_subscribers(&self, channel: &str, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.subscriber_count(channel) == count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Closes every client socket accepted so far, as a store restart would.
    /// Stored data survives.
    pub fn drop_clients(&self) {
        for stream in self.shared.clients.lock().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Delivers raw payload bytes to the subscribers of `channel`.
    pub fn publish_raw(&self, channel: &str, payload: &[u8]) -> usize {
        deliver(&self.shared, channel, payload)
    }

    /// Drops every subscriber socket of `channel`, as a store restart would.
    pub fn close_subscribers(&self, channel: &str) {
        if let Some(subscribers) = self.shared.subscribers.lock().remove(channel) {
            for (_, stream) in subscribers {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}

struct Session {
    id: u64,
    db: i64,
    authed: bool,
}

fn serve(id: u64, stream: TcpStream, shared: Arc<Shared>) {
    let mut writer = stream.try_clone().expect("clone");
    let mut reader = BufReader::new(stream);
    let mut session = Session {
        id,
        db: 0,
        authed: shared.password.is_none(),
    };

    while let Ok(Some(args)) = read_command(&mut reader) {
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| String::from_utf8_lossy(&arg).into_owned())
            .collect();
        shared.commands.lock().push(args.clone());
        let reply = dispatch(&args, &mut session, &shared, &writer);
        if writer.write_all(&reply).and_then(|_| writer.flush()).is_err() {
            break;
        }
    }

    for subscribers in shared.subscribers.lock().values_mut() {
        subscribers.retain(|(conn, _)| *conn != id);
    }
}

fn dispatch(
    args: &[String],
    session: &mut Session,
    shared: &Shared,
    stream: &TcpStream,
) -> Vec<u8> {
    let Some(cmd) = args.first() else {
        return error("ERR empty command");
    };
    let cmd = cmd.to_ascii_uppercase();

    if cmd == "AUTH" {
        return match (&shared.password, args.get(1)) {
            (Some(expected), Some(given)) if expected == given => {
                session.authed = true;
                simple("OK")
            }
            (None, _) => error("ERR AUTH <password> called without any password configured"),
            _ => error("WRONGPASS invalid username-password pair"),
        };
    }
    if !session.authed {
        return error("NOAUTH Authentication required.");
    }

    let mut data = shared.data.lock();
    let db = session.db;
    let entry_key = |key: &String| (db, key.clone());

    match (cmd.as_str(), args.len()) {
        ("PING", _) => simple("PONG"),
        ("SELECT", 2) => match args[1].parse() {
            Ok(db) => {
                session.db = db;
                simple("OK")
            }
            Err(_) => error("ERR value is not an integer or out of range"),
        },
        ("SET", 3) | ("SET", 5) => {
            let expires_at = if args.len() == 5 {
                let Ok(amount) = args[4].parse::<u64>() else {
                    return error("ERR value is not an integer or out of range");
                };
                match args[3].to_ascii_uppercase().as_str() {
                    "EX" => Some(Instant::now() + Duration::from_secs(amount)),
                    "PX" => Some(Instant::now() + Duration::from_millis(amount)),
                    _ => return error("ERR syntax error"),
                }
            } else {
                None
            };
            data.insert(
                entry_key(&args[1]),
                Entry::Str {
                    value: args[2].clone(),
                    expires_at,
                },
            );
            simple("OK")
        }
        ("GET", 2) => {
            purge_expired(&mut data, entry_key(&args[1]));
            match data.get(&entry_key(&args[1])) {
                Some(Entry::Str { value, .. }) => bulk(value),
                Some(Entry::Hash(_)) => wrong_type(),
                None => null(),
            }
        }
        ("EXISTS", 2) => {
            purge_expired(&mut data, entry_key(&args[1]));
            integer(data.contains_key(&entry_key(&args[1])) as i64)
        }
        ("DEL", 2) => {
            purge_expired(&mut data, entry_key(&args[1]));
            integer(data.remove(&entry_key(&args[1])).is_some() as i64)
        }
        ("HSET", 4) => {
            let entry = data
                .entry(entry_key(&args[1]))
                .or_insert_with(|| Entry::Hash(BTreeMap::new()));
            match entry {
                Entry::Hash(fields) => {
                    let created = fields.insert(args[2].clone(), args[3].clone()).is_none();
                    integer(created as i64)
                }
                Entry::Str { .. } => wrong_type(),
            }
        }
        ("HGET", 3) => match data.get(&entry_key(&args[1])) {
            Some(Entry::Hash(fields)) => fields.get(&args[2]).map(|v| bulk(v)).unwrap_or_else(null),
            Some(Entry::Str { .. }) => wrong_type(),
            None => null(),
        },
        ("HEXISTS", 3) => match data.get(&entry_key(&args[1])) {
            Some(Entry::Hash(fields)) => integer(fields.contains_key(&args[2]) as i64),
            Some(Entry::Str { .. }) => wrong_type(),
            None => integer(0),
        },
        ("HDEL", 3) => {
            let key = entry_key(&args[1]);
            let (removed, now_empty) = match data.get_mut(&key) {
                Some(Entry::Hash(fields)) => (fields.remove(&args[2]).is_some(), fields.is_empty()),
                Some(Entry::Str { .. }) => return wrong_type(),
                None => (false, false),
            };
            if now_empty {
                data.remove(&key);
            }
            integer(removed as i64)
        }
        ("HLEN", 2) => match data.get(&entry_key(&args[1])) {
            Some(Entry::Hash(fields)) => integer(fields.len() as i64),
            Some(Entry::Str { .. }) => wrong_type(),
            None => integer(0),
        },
        ("HSCAN", n) if n >= 3 => hscan(&data, entry_key(&args[1]), &args[2..]),
        ("PUBLISH", 3) => {
            drop(data);
            integer(deliver(shared, &args[1], args[2].as_bytes()) as i64)
        }
        ("SUBSCRIBE", 2) => {
            drop(data);
            // Acknowledge under the lock so no message can overtake the ack.
            let mut subscribers = shared.subscribers.lock();
            let mut stream = stream.try_clone().expect("clone");
            let ack = push(&[bulk("subscribe"), bulk(&args[1]), integer(1)]);
            if stream.write_all(&ack).and_then(|_| stream.flush()).is_ok() {
                subscribers.entry(args[1].clone()).or_default().push((session.id, stream));
            }
            Vec::new()
        }
        ("UNSUBSCRIBE", 2) => {
            drop(data);
            if let Some(list) = shared.subscribers.lock().get_mut(&args[1]) {
                list.retain(|(conn, _)| *conn != session.id);
            }
            push(&[bulk("unsubscribe"), bulk(&args[1]), integer(0)])
        }
        _ => error(&format!("ERR unknown command '{}'", cmd)),
    }
}

fn purge_expired(data: &mut HashMap<(i64, String), Entry>, key: (i64, String)) {
    let expired = matches!(
        data.get(&key),
        Some(Entry::Str { expires_at: Some(at), .. }) if *at <= Instant::now()
    );
    if expired {
        data.remove(&key);
    }
}

fn hscan(data: &HashMap<(i64, String), Entry>, key: (i64, String), args: &[String]) -> Vec<u8> {
    let Ok(start) = args[0].parse::<usize>() else {
        return error("ERR invalid cursor");
    };
    let mut pattern = "*".to_string();
    let mut count = 10usize;
    for option in args[1..].chunks(2) {
        match (option[0].to_ascii_uppercase().as_str(), option.get(1)) {
            ("MATCH", Some(p)) => pattern = p.clone(),
            ("COUNT", Some(c)) => count = c.parse().unwrap_or(10),
            _ => return error("ERR syntax error"),
        }
    }

    let fields = match data.get(&key) {
        Some(Entry::Hash(fields)) => fields,
        Some(Entry::Str { .. }) => return wrong_type(),
        None => return push(&[bulk("0"), push(&[])]),
    };

    // Filtering after paging mirrors the real store: pages can come back
    // empty while the cursor is still live.
    let mut page = Vec::new();
    for (field, value) in fields.iter().skip(start).take(count) {
        if glob_match(pattern.as_bytes(), field.as_bytes()) {
            page.push(bulk(field));
            page.push(bulk(value));
        }
    }
    let next = start + count;
    let cursor = if next >= fields.len() { 0 } else { next };
    push(&[bulk(&cursor.to_string()), push(&page)])
}

fn deliver(shared: &Shared, channel: &str, payload: &[u8]) -> usize {
    let message = push(&[bulk("message"), bulk(channel), bulk_bytes(payload)]);
    let mut subscribers = shared.subscribers.lock();
    let mut delivered = 0;
    if let Some(list) = subscribers.get_mut(channel) {
        list.retain_mut(|(_, stream)| {
            let ok = stream.write_all(&message).and_then(|_| stream.flush()).is_ok();
            delivered += ok as usize;
            ok
        });
    }
    delivered
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text)
                || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "digit"))
}

fn simple(msg: &str) -> Vec<u8> {
    format!("+{}\r\n", msg).into_bytes()
}

fn error(msg: &str) -> Vec<u8> {
    format!("-{}\r\n", msg).into_bytes()
}

fn wrong_type() -> Vec<u8> {
    error("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn integer(value: i64) -> Vec<u8> {
    format!(":{}\r\n", value).into_bytes()
}

fn bulk(data: &str) -> Vec<u8> {
    bulk_bytes(data.as_bytes())
}

fn bulk_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

fn null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn push(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(item);
    }
    out
}
