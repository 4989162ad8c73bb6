use crate::{
    store::{Connector, KvStore, Target},
    Error, Result,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

type Databases = HashMap<u32, HashMap<String, Entry>>;

#[derive(Debug, Default)]
struct Shared {
    databases: Mutex<Databases>,
    connections: AtomicUsize,
    calls: AtomicUsize,
}

/// In-process connector. Every connection it opens sees the same data, so
/// state carries over between dispatches just like a real server.
///
/// # Examples
///
/// ```rust
/// use kv_bridge::store::{Connector, KvStore, MemoryConnector, Target};
///
/// let connector = MemoryConnector::new();
/// let mut store = connector.connect(&Target::new("localhost")).unwrap();
/// store.set("114", "514", None).unwrap();
///
/// assert_eq!(store.get("114").unwrap(), Some("514".to_owned()));
/// assert_eq!(connector.connections(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
    password: Option<String>,
}

impl MemoryConnector {
    /// Connector over a fresh, empty store.
    pub fn new() -> MemoryConnector {
        MemoryConnector::default()
    }

    /// Require `password` from every connection.
    pub fn with_password(mut self, password: impl Into<String>) -> MemoryConnector {
        self.password = Some(password.into());
        self
    }

    /// Number of connections opened so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of store operations issued so far, over all connections.
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, target: &Target) -> Result<MemoryStore> {
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        if let Some(required) = &self.password {
            if target.password.as_deref() != Some(required.as_str()) {
                return Err(Error::Store(
                    "WRONGPASS invalid username-password pair or user is disabled.".into(),
                ));
            }
        }
        Ok(MemoryStore {
            shared: Arc::clone(&self.shared),
            db: target.db,
        })
    }
}

/// A connection to a [`MemoryConnector`], bound to one database index.
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    db: u32,
}

impl MemoryStore {
    // live entries of the selected database
    fn with_db<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        let mut databases = lock(&self.shared.databases);
        let db = databases.entry(self.db).or_default();
        let now = Instant::now();
        db.retain(|_, entry| entry.is_live(now));
        f(db)
    }
}

// a poisoned lock only means another test thread panicked
fn lock(m: &Mutex<Databases>) -> MutexGuard<'_, Databases> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl KvStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.with_db(|db| db.get(key).map(|entry| entry.value.clone())))
    }

    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: value.to_owned(),
            // a deadline past what `Instant` can hold never comes
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.with_db(|db| db.insert(key.to_owned(), entry));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<i64> {
        Ok(self.with_db(|db| db.remove(key).map_or(0, |_| 1)))
    }

    fn exists(&mut self, key: &str) -> Result<i64> {
        Ok(self.with_db(|db| i64::from(db.contains_key(key))))
    }

    fn keys(&mut self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.with_db(|db| {
            db.keys()
                .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
                .cloned()
                .collect()
        }))
    }
}

/// Glob matching with the store's `KEYS` rules: `*`, `?`, `[abc]`, `[^a]`,
/// `[a-z]` and `\` escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // position after the last `*` and the text index it is retried from
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                star = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(b'?') => Some(p + 1),
            Some(b'[') => match_class(pattern, p + 1, text[t]),
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == text[t]).then_some(p + 2),
            Some(&c) => (c == text[t]).then_some(p + 1),
            None => None,
        };
        match (step, star) {
            (Some(next), _) => {
                p = next;
                t += 1;
            }
            (None, Some((after_star, from))) => {
                p = after_star;
                t = from + 1;
                star = Some((after_star, from + 1));
            }
            (None, None) => return false,
        }
    }
    pattern[p.min(pattern.len())..].iter().all(|&c| c == b'*')
}

// `start` is just past the `[`; returns the index past the closing `]` on a match
fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<usize> {
    let mut i = start;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }
    // an unterminated class runs to the end of the pattern
    let next = (i + 1).min(pattern.len());
    (matched != negate).then_some(next)
}
