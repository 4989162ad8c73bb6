//! A tiny RESP2 server running in a background thread, backed by the crate's
//! in-process store. Speaks just enough of the protocol for the client.

use bytes::BytesMut;
use kv_bridge::store::{
    resp::{encode, read_value, RespValue},
    Connector, KvStore, MemoryConnector, Target,
};
use std::{
    io::{BufReader, Write},
    net::{TcpListener, TcpStream},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

const DATABASES: u32 = 16;

#[derive(Clone, Default)]
struct State {
    store: MemoryConnector,
    password: Option<String>,
    connections: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

pub struct FakeServer {
    pub addr: String,
    state: State,
}

#[allow(dead_code)]
impl FakeServer {
    pub fn start() -> FakeServer {
        FakeServer::spawn(State::default())
    }

    pub fn with_password(password: &str) -> FakeServer {
        FakeServer::spawn(State {
            password: Some(password.to_owned()),
            ..State::default()
        })
    }

    fn spawn(state: State) -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                shared.connections.fetch_add(1, Ordering::SeqCst);
                let state = shared.clone();
                thread::spawn(move || serve(stream, state));
            }
        });

        FakeServer { addr, state }
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Every command received, in order, with its arguments.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.commands.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, state: State) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut authenticated = state.password.is_none();
    let mut db = 0;

    while let Ok(value) = read_value(&mut reader) {
        let RespValue::Array(Some(items)) = value else { break };
        let args: Vec<String> = items
            .iter()
            .filter_map(RespValue::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect();
        state.commands.lock().unwrap().push(args.clone());

        let reply = respond(&args, &state, &mut authenticated, &mut db);
        let mut buf = BytesMut::new();
        encode(&reply, &mut buf);
        if writer.write_all(&buf).is_err() {
            break;
        }
    }
}

fn ok() -> RespValue {
    RespValue::SimpleString("OK".into())
}

fn error(msg: &str) -> RespValue {
    RespValue::Error(msg.to_owned().into())
}

fn respond(args: &[String], state: &State, authenticated: &mut bool, db: &mut u32) -> RespValue {
    let Some(name) = args.first() else {
        return error("ERR empty command");
    };
    let name = name.to_uppercase();

    if name == "AUTH" {
        return match (&state.password, args.last()) {
            (Some(password), Some(given)) if args.len() > 1 && given == password => {
                *authenticated = true;
                ok()
            }
            (None, _) => error("ERR AUTH called without any password configured"),
            _ => error("WRONGPASS invalid username-password pair or user is disabled."),
        };
    }
    if !*authenticated {
        return error("NOAUTH Authentication required.");
    }

    let mut store = state
        .store
        .connect(&Target::new("fake").db(*db))
        .unwrap();
    match (name.as_str(), &args[1..]) {
        ("SELECT", [index]) => match index.parse::<u32>() {
            Ok(index) if index < DATABASES => {
                *db = index;
                ok()
            }
            _ => error("ERR DB index is out of range"),
        },
        ("GET", [key]) => match store.get(key).unwrap() {
            Some(value) => RespValue::bulk(value),
            None => RespValue::BulkString(None),
        },
        ("SET", [key, value]) => {
            store.set(key, value, None).unwrap();
            ok()
        }
        ("SET", [key, value, ex, seconds]) if ex.eq_ignore_ascii_case("EX") => {
            match seconds.parse::<u64>() {
                Ok(seconds) if seconds > 0 => {
                    store.set(key, value, Some(Duration::from_secs(seconds))).unwrap();
                    ok()
                }
                _ => error("ERR invalid expire time in 'set' command"),
            }
        }
        ("DEL", [key]) => RespValue::Integer(store.delete(key).unwrap()),
        ("EXISTS", [key]) => RespValue::Integer(store.exists(key).unwrap()),
        ("KEYS", [pattern]) => RespValue::Array(Some(
            store
                .keys(pattern)
                .unwrap()
                .into_iter()
                .map(RespValue::bulk)
                .collect(),
        )),
        _ => error(&format!("ERR unknown command '{name}'")),
    }
}

/// Answers every command with the same raw `reply` bytes.
pub fn canned_server(reply: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut writer = stream;
                while read_value(&mut reader).is_ok() {
                    if writer.write_all(reply).is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// Accepts connections and never answers.
pub fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    addr
}

/// An address nothing listens on.
pub fn closed_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}
