use crate::{
    store::resp::{self, RespValue},
    store::{Connector, KvStore, Target},
    Error, Result,
};
use bytes::BytesMut;
use std::{
    io::{self, BufReader, BufWriter, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

/// Opens [`RedisConnection`]s over TCP.
#[derive(Debug, Clone, Default)]
pub struct RedisConnector {
    timeout: Option<Duration>,
}

impl RedisConnector {
    /// Connector that waits on the network for at most `timeout`
    /// per connect, read or write. `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> RedisConnector {
        RedisConnector { timeout }
    }
}

impl Connector for RedisConnector {
    type Store = RedisConnection;

    fn connect(&self, target: &Target) -> Result<RedisConnection> {
        let stream = dial(&target.addr, self.timeout)
            .map_err(|e| io::Error::new(e.kind(), format!("connect to {}: {e}", target.addr)))?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;

        let mut conn = RedisConnection {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            buf: BytesMut::new(),
        };

        if let Some(password) = &target.password {
            match &target.username {
                Some(username) => conn.expect_ok(&["AUTH", username.as_str(), password.as_str()])?,
                None => conn.expect_ok(&["AUTH", password.as_str()])?,
            }
        }
        if target.db != 0 {
            let db = target.db.to_string();
            conn.expect_ok(&["SELECT", db.as_str()])?;
        }
        Ok(conn)
    }
}

fn dial(addr: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect(addr);
    };

    let mut last_err = None;
    for sock_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")
    }))
}

/// One RESP2 connection. The socket is shut down when this is dropped.
pub struct RedisConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    buf: BytesMut,
}

impl RedisConnection {
    /// Send one command and wait for its reply.
    ///
    /// Error replies from the server come back as [`Error::Store`].
    pub fn command(&mut self, args: &[&str]) -> Result<RespValue> {
        self.buf.clear();
        resp::encode_command(args, &mut self.buf);
        self.writer.write_all(&self.buf)?;
        self.writer.flush()?;

        match resp::read_value(&mut self.reader)? {
            RespValue::Error(msg) => Err(Error::Store(text(&msg))),
            reply => Ok(reply),
        }
    }

    fn expect_ok(&mut self, args: &[&str]) -> Result<()> {
        match self.command(args)? {
            RespValue::SimpleString(s) if &s[..] == b"OK" => Ok(()),
            reply => Err(unexpected(&reply, args[0])),
        }
    }

    fn expect_integer(&mut self, args: &[&str]) -> Result<i64> {
        match self.command(args)? {
            RespValue::Integer(n) => Ok(n),
            reply => Err(unexpected(&reply, args[0])),
        }
    }
}

// stored bytes need not be UTF-8; invalid sequences become U+FFFD
fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn unexpected(reply: &RespValue, command: &str) -> Error {
    Error::Protocol(format!("unexpected {} reply to {command}", reply.kind()))
}

impl KvStore for RedisConnection {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.command(&["GET", key])? {
            reply if reply.is_null() => Ok(None),
            RespValue::BulkString(Some(data)) => Ok(Some(text(&data))),
            reply => Err(unexpected(&reply, "GET")),
        }
    }

    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        match ttl {
            Some(ttl) => {
                let seconds = ttl.as_secs().to_string();
                self.expect_ok(&["SET", key, value, "EX", seconds.as_str()])
            }
            None => self.expect_ok(&["SET", key, value]),
        }
    }

    fn delete(&mut self, key: &str) -> Result<i64> {
        self.expect_integer(&["DEL", key])
    }

    fn exists(&mut self, key: &str) -> Result<i64> {
        self.expect_integer(&["EXISTS", key])
    }

    fn keys(&mut self, pattern: &str) -> Result<Vec<String>> {
        match self.command(&["KEYS", pattern])? {
            reply if reply.is_null() => Ok(Vec::new()),
            RespValue::Array(Some(items)) => items
                .iter()
                .map(|item| match item {
                    RespValue::BulkString(Some(name)) | RespValue::SimpleString(name) => {
                        Ok(text(name))
                    }
                    _ => Err(unexpected(item, "KEYS")),
                })
                .collect(),
            reply => Err(unexpected(&reply, "KEYS")),
        }
    }
}

impl Drop for RedisConnection {
    fn drop(&mut self) {
        // best effort, the peer may already be gone
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}
