//! The store seam: connection traits, connection targets and the
//! implementations behind them.

use crate::Result;
use std::time::Duration;

mod memory;
mod redis;
pub mod resp;

pub use crate::store::memory::{MemoryConnector, MemoryStore};
pub use crate::store::redis::{RedisConnection, RedisConnector};

/// Port used when `addr` does not name one.
pub const DEFAULT_PORT: u16 = 6379;

/// Trait that describes one open connection to a key/value store.
pub trait KvStore {
    /// Get the value of `key`, `None` when the key does not exist.
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, expiring after `ttl` when given.
    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`, returning how many keys were removed.
    fn delete(&mut self, key: &str) -> Result<i64>;

    /// How many times `key` exists, 0 or 1.
    fn exists(&mut self, key: &str) -> Result<i64>;

    /// List keys matching a glob `pattern`, in store order.
    fn keys(&mut self, pattern: &str) -> Result<Vec<String>>;
}

/// Opens store connections. Each connection serves a single dispatch and is
/// closed when dropped.
pub trait Connector {
    /// Connection type handed out by this connector.
    type Store: KvStore;

    /// Open a connection, authenticate and select the database.
    fn connect(&self, target: &Target) -> Result<Self::Store>;
}

/// Address, credentials and database index of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `host:port` to connect to.
    pub addr: String,
    /// User to authenticate as, only with a password.
    pub username: Option<String>,
    /// Password to authenticate with.
    pub password: Option<String>,
    /// Database index to select after connecting.
    pub db: u32,
}

impl Target {
    /// Target at `addr`, adding [`DEFAULT_PORT`] when no port is given.
    pub fn new(addr: &str) -> Target {
        Target {
            addr: with_default_port(addr),
            username: None,
            password: None,
            db: 0,
        }
    }

    /// Credentials to authenticate with; an empty password means no auth.
    pub fn credentials(mut self, username: &str, password: &str) -> Target {
        if password.is_empty() {
            self.username = None;
            self.password = None;
        } else {
            self.username = (!username.is_empty()).then(|| username.to_owned());
            self.password = Some(password.to_owned());
        }
        self
    }

    /// Database index to select.
    pub fn db(mut self, db: u32) -> Target {
        self.db = db;
        self
    }
}

fn with_default_port(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        // bracketed IPv6, with or without a port
        return match rest.split_once(']') {
            Some((_, "")) => format!("{addr}:{DEFAULT_PORT}"),
            _ => addr.to_owned(),
        };
    }
    match addr.rsplit_once(':') {
        Some((host, _)) if host.contains(':') => format!("[{addr}]:{DEFAULT_PORT}"),
        Some(_) => addr.to_owned(),
        None => format!("{addr}:{DEFAULT_PORT}"),
    }
}
