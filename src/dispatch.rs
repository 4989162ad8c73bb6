//! Action Dispatcher: runs a validated request against the store and
//! shapes the envelope.

use crate::{
    common::{Input, Output},
    request::{normalize, Action, NormalizedRequest},
    store::{Connector, KvStore},
    Result,
};
use serde_json::{Deserializer, Value};
use slog::{debug, info, warn};
use std::io::Read;

/// Result of running one action against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text value, from `get` and `set`.
    Scalar(String),
    /// Count of removed keys, from `delete`.
    Integer(i64),
    /// Key presence, from `exists`.
    Boolean(bool),
    /// Matching key names, from `list-keys`.
    List(Vec<String>),
    /// The key does not exist. Not an error, and not an empty value.
    Absent,
}

impl From<Outcome> for Value {
    fn from(outcome: Outcome) -> Value {
        match outcome {
            Outcome::Scalar(s) => Value::String(s),
            Outcome::Integer(n) => Value::from(n),
            Outcome::Boolean(b) => Value::Bool(b),
            Outcome::List(keys) => Value::from(keys),
            Outcome::Absent => Value::Null,
        }
    }
}

/// Run the request's action on an open store.
pub fn execute<S: KvStore>(request: &NormalizedRequest, store: &mut S) -> Result<Outcome> {
    let key = request.key.as_str();
    Ok(match request.action {
        Action::Get => store.get(key)?.map_or(Outcome::Absent, Outcome::Scalar),
        Action::Set => {
            store.set(key, &request.value, request.ttl())?;
            Outcome::Scalar("OK".to_owned())
        }
        Action::Delete => Outcome::Integer(store.delete(key)?),
        // the store answers with a count, callers only get to see presence
        Action::Exists => Outcome::Boolean(store.exists(key)? > 0),
        Action::ListKeys => Outcome::List(store.keys(request.pattern())?),
    })
}

/// Connect, execute and shape the envelope.
///
/// The connection lives for this call only and is dropped on every path.
/// Store failures are not retried.
pub fn dispatch<C: Connector>(
    request: &NormalizedRequest,
    connector: &C,
    logger: &slog::Logger,
) -> Output {
    let target = request.target();
    debug!(logger, "connecting"; "addr" => &target.addr, "db" => target.db);

    let outcome = connector
        .connect(&target)
        .and_then(|mut store| execute(request, &mut store));

    match outcome {
        Ok(outcome) => {
            info!(logger, "{} succeeded", request.action; "key" => &request.key);
            debug!(logger, "outcome {:?}", outcome);
            Output::result(outcome)
        }
        Err(e) => {
            warn!(logger, "{} failed: {e}", request.action; "addr" => &target.addr);
            Output::error(format!("redis error: {e}"))
        }
    }
}

/// Full invocation: decode the input document, normalize, dispatch.
///
/// Always produces exactly one envelope; nothing touches the store unless
/// the request validated.
///
/// # Examples
///
/// ```rust
/// use kv_bridge::{dispatch::handle, store::MemoryConnector};
///
/// let logger = slog::Logger::root(slog::Discard, slog::o!());
/// let connector = MemoryConnector::new();
/// let input = r#"{"params": [{"inputname": "key", "compvalue": "k"}]}"#;
///
/// let output = handle(input.as_bytes(), &connector, &logger);
/// assert_eq!(output.error, "addr is required");
/// assert_eq!(connector.connections(), 0);
/// ```
pub fn handle<R: Read, C: Connector>(input: R, connector: &C, logger: &slog::Logger) -> Output {
    // only the first document counts, trailing input is ignored; `null`
    // reads as a document without parameters
    let input = match Deserializer::from_reader(input).into_iter::<Option<Input>>().next() {
        Some(Ok(input)) => input.unwrap_or_default(),
        Some(Err(e)) => {
            warn!(logger, "malformed input: {e}");
            return Output::error(format!("failed to decode input: {e}"));
        }
        None => {
            warn!(logger, "empty input");
            return Output::error("failed to decode input: EOF");
        }
    };
    debug!(logger, "received {} parameters", input.params.len());

    match normalize(&input.params) {
        Ok(request) => dispatch(&request, connector, logger),
        Err(e) => {
            warn!(logger, "rejected request: {e}");
            Output::error(e)
        }
    }
}
