//! Request Normalizer: turns loose text parameters into a typed request.

use crate::{common::Parameter, store::Target, Error, Result};
use std::{fmt, str::FromStr, time::Duration};

/// Pattern used by `list-keys` when no key is given.
pub const MATCH_ALL: &str = "*";

/// Operation selected by the `action` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read the value at a key.
    Get,
    /// Write a value at a key, optionally expiring.
    Set,
    /// Remove a key.
    Delete,
    /// Test whether a key exists.
    Exists,
    /// Enumerate keys matching a glob pattern.
    ListKeys,
}

impl Action {
    /// Canonical name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Set => "set",
            Action::Delete => "delete",
            Action::Exists => "exists",
            Action::ListKeys => "list-keys",
        }
    }

    // expects an already case-folded name
    fn lookup(name: &str) -> Option<Action> {
        match name {
            "get" => Some(Action::Get),
            "set" => Some(Action::Set),
            "delete" | "del" => Some(Action::Delete),
            "exists" => Some(Action::Exists),
            "list-keys" | "keys" => Some(Action::ListKeys),
            _ => None,
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Action> {
        let name = s.trim().to_lowercase();
        Action::lookup(&name).ok_or(Error::InvalidAction(name))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated request. Building one never touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// Store address, `host[:port]`.
    pub addr: String,
    /// Optional user name for `AUTH`.
    pub username: String,
    /// Password; empty means no authentication.
    pub password: String,
    /// Database index to select.
    pub db: u32,
    /// Operation to run.
    pub action: Action,
    /// Key, or the glob pattern for `list-keys`.
    pub key: String,
    /// Value written by `set`.
    pub value: String,
    /// Seconds until a `set` key expires, 0 for never.
    pub expiration: u64,
}

impl NormalizedRequest {
    /// Where and how to connect for this request.
    pub fn target(&self) -> Target {
        Target::new(&self.addr)
            .credentials(&self.username, &self.password)
            .db(self.db)
    }

    /// Time to live for `set`; `None` when no expiration was asked for.
    pub fn ttl(&self) -> Option<Duration> {
        (self.expiration > 0).then(|| Duration::from_secs(self.expiration))
    }

    /// Glob pattern for `list-keys`.
    pub fn pattern(&self) -> &str {
        if self.key.is_empty() {
            MATCH_ALL
        } else {
            &self.key
        }
    }
}

// raw text of every recognized parameter, before typing
#[derive(Debug, Default)]
struct RawFields {
    addr: String,
    username: String,
    password: String,
    db: String,
    action: Option<String>,
    key: String,
    value: String,
    expiration: String,
}

type Setter = fn(&mut RawFields, String);

/// Recognized parameter names. Later occurrences overwrite earlier ones,
/// except that a blank `action` is ignored.
const FIELDS: &[(&str, Setter)] = &[
    ("addr", |f: &mut RawFields, v: String| f.addr = v),
    ("username", |f: &mut RawFields, v: String| f.username = v),
    ("password", |f: &mut RawFields, v: String| f.password = v),
    ("db", |f: &mut RawFields, v: String| f.db = v),
    ("action", |f: &mut RawFields, v: String| {
        if !v.is_empty() {
            f.action = Some(v.to_lowercase());
        }
    }),
    ("key", |f: &mut RawFields, v: String| f.key = v),
    ("value", |f: &mut RawFields, v: String| f.value = v),
    ("expiration", |f: &mut RawFields, v: String| f.expiration = v),
];

/// Turn a bag of named text parameters into a validated request.
///
/// Names are matched case-insensitively, values are trimmed and unknown
/// names are skipped. Checks run in order and the first failure wins:
/// `addr`, then `key` (optional for `list-keys`), then the action name,
/// then the numeric fields.
///
/// # Examples
///
/// ```rust
/// use kv_bridge::{common::Parameter, request::{normalize, Action}};
///
/// let request = normalize(&[
///     Parameter::new("ADDR", " 127.0.0.1:6379 "),
///     Parameter::new("key", "114"),
/// ])
/// .unwrap();
///
/// assert_eq!(request.action, Action::Get);
/// assert_eq!(request.addr, "127.0.0.1:6379");
/// ```
pub fn normalize(params: &[Parameter]) -> Result<NormalizedRequest> {
    let mut raw = RawFields::default();
    for param in params {
        let name = param.name.to_lowercase();
        if let Some((_, set)) = FIELDS.iter().find(|(field, _)| *field == name) {
            set(&mut raw, param.value.trim().to_owned());
        }
    }

    if raw.addr.is_empty() {
        return Err(Error::MissingAddr);
    }

    let action_name = raw.action.unwrap_or_else(|| Action::Get.as_str().to_owned());
    let action = Action::lookup(&action_name);
    if raw.key.is_empty() && action != Some(Action::ListKeys) {
        return Err(Error::MissingKey);
    }
    let action = action.ok_or(Error::InvalidAction(action_name))?;

    Ok(NormalizedRequest {
        addr: raw.addr,
        username: raw.username,
        password: raw.password,
        db: parse_number("db", &raw.db)?,
        action,
        key: raw.key,
        value: raw.value,
        expiration: parse_number("expiration", &raw.expiration)?,
    })
}

// blank means the zero default
fn parse_number<T: FromStr + Default>(name: &'static str, text: &str) -> Result<T> {
    if text.is_empty() {
        return Ok(T::default());
    }
    text.parse().map_err(|_| Error::InvalidNumber {
        name,
        value: text.to_owned(),
    })
}
