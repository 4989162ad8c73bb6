//! RESP2 codec
//!
//! Encodes commands as arrays of bulk strings and decodes replies from any
//! blocking [`BufRead`]. Only the five RESP2 types are understood, which is
//! all a server speaks unless the client opts into RESP3.

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, BufRead, Read};

/// Largest bulk string accepted from the wire (512 MB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;
/// Largest array accepted from the wire.
pub const MAX_ARRAY_LEN: usize = 1_000_000;
/// Deepest nesting of arrays accepted from the wire.
pub const MAX_DEPTH: usize = 32;

/// RESP2 value
///
/// - **SimpleString**: `+OK\r\n`
/// - **Error**: `-ERR unknown command\r\n`
/// - **Integer**: `:1000\r\n`
/// - **BulkString**: `$5\r\nhello\r\n` or `$-1\r\n` for null
/// - **Array**: `*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n` or `*-1\r\n` for null
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Status reply such as `OK`.
    SimpleString(Bytes),
    /// Error reply; the first word is the error class.
    Error(Bytes),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Binary-safe string, `None` for null.
    BulkString(Option<Bytes>),
    /// Sequence of values, `None` for null.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Bulk string holding `data`.
    pub fn bulk(data: impl Into<Bytes>) -> RespValue {
        RespValue::BulkString(Some(data.into()))
    }

    /// Whether this is a null bulk string or a null array.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Byte data of string-like values.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RespValue::SimpleString(b) | RespValue::Error(b) => Some(b),
            RespValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Short name of the value type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk string",
            RespValue::Array(_) => "array",
        }
    }
}

/// Encode `value` into `buf`.
///
/// # Examples
///
/// ```rust
/// use bytes::{Bytes, BytesMut};
/// use kv_bridge::store::resp::{encode, RespValue};
///
/// let mut buf = BytesMut::new();
/// encode(&RespValue::SimpleString(Bytes::from("OK")), &mut buf);
/// assert_eq!(&buf[..], b"+OK\r\n");
/// ```
pub fn encode(value: &RespValue, buf: &mut BytesMut) {
    match value {
        RespValue::SimpleString(s) => {
            buf.put_u8(b'+');
            buf.put_slice(s);
            buf.put_slice(b"\r\n");
        }
        RespValue::Error(e) => {
            buf.put_u8(b'-');
            buf.put_slice(e);
            buf.put_slice(b"\r\n");
        }
        RespValue::Integer(i) => {
            buf.put_u8(b':');
            buf.put_slice(i.to_string().as_bytes());
            buf.put_slice(b"\r\n");
        }
        RespValue::BulkString(None) => buf.put_slice(b"$-1\r\n"),
        RespValue::BulkString(Some(s)) => put_bulk(s, buf),
        RespValue::Array(None) => buf.put_slice(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            put_len(b'*', items.len(), buf);
            for item in items {
                encode(item, buf);
            }
        }
    }
}

/// Encode a command as an array of bulk strings, the form servers expect.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], buf: &mut BytesMut) {
    put_len(b'*', args.len(), buf);
    for arg in args {
        put_bulk(arg.as_ref(), buf);
    }
}

fn put_len(marker: u8, len: usize, buf: &mut BytesMut) {
    buf.put_u8(marker);
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(b"\r\n");
}

fn put_bulk(data: &[u8], buf: &mut BytesMut) {
    put_len(b'$', data.len(), buf);
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

/// Read one complete value, blocking until it has fully arrived.
pub fn read_value<R: BufRead>(reader: &mut R) -> Result<RespValue> {
    read_nested(reader, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, depth: usize) -> Result<RespValue> {
    if depth > MAX_DEPTH {
        return Err(Error::Protocol(format!(
            "nesting too deep (max: {MAX_DEPTH} levels)"
        )));
    }

    let line = read_line(reader)?;
    let (marker, body) = match line.split_first() {
        Some((marker, body)) => (*marker, body),
        None => return Err(Error::Protocol("empty reply line".into())),
    };

    match marker {
        b'+' => Ok(RespValue::SimpleString(Bytes::copy_from_slice(body))),
        b'-' => Ok(RespValue::Error(Bytes::copy_from_slice(body))),
        b':' => Ok(RespValue::Integer(parse_int(body)?)),
        b'$' => {
            let Some(len) = parse_len(body, MAX_BULK_SIZE, "bulk string")? else {
                return Ok(RespValue::BulkString(None));
            };
            // the buffer grows with what arrives, not with the declared length
            let mut data = Vec::new();
            reader.by_ref().take(len as u64 + 2).read_to_end(&mut data)?;
            if data.len() < len + 2 {
                return Err(eof("bulk string truncated").into());
            }
            if !data.ends_with(b"\r\n") {
                return Err(Error::Protocol("bulk string not terminated by CRLF".into()));
            }
            data.truncate(len);
            Ok(RespValue::BulkString(Some(Bytes::from(data))))
        }
        b'*' => {
            let Some(len) = parse_len(body, MAX_ARRAY_LEN, "array")? else {
                return Ok(RespValue::Array(None));
            };
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_nested(reader, depth + 1)?);
            }
            Ok(RespValue::Array(Some(items)))
        }
        _ => Err(Error::Protocol(format!("invalid type marker: {marker:#x}"))),
    }
}

// one CRLF-terminated line, without the terminator
fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(eof("connection closed by peer").into());
    }
    if !line.ends_with(b"\r\n") {
        return Err(Error::Protocol("reply line not terminated by CRLF".into()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn eof(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, msg)
}

fn parse_int(body: &[u8]) -> Result<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            let body = String::from_utf8_lossy(body);
            Error::Protocol(format!("invalid integer `{body}`"))
        })
}

// `None` for the null length -1
fn parse_len(body: &[u8], max: usize, what: &str) -> Result<Option<usize>> {
    match parse_int(body)? {
        -1 => Ok(None),
        len if len < 0 => Err(Error::Protocol(format!("invalid {what} length {len}"))),
        len if len as u64 > max as u64 => Err(Error::Protocol(format!(
            "{what} too large: {len} (max: {max})"
        ))),
        len => Ok(Some(len as usize)),
    }
}
