//! RESP (Redis Serialization Protocol) wire codec.
//!
//! This module defines the frame type markers, the [`Reply`] value read back
//! from a peer, the [`RespError`] type shared by the codec, and the encoder
//! functions that produce wire frames. The framed reader and writer live in
//! the [`reader`] and [`writer`] submodules.
//!
//! Every frame is a line terminated by `\r\n`. A bulk string is
//! `$<len>\r\n<len bytes>\r\n` with length `-1` encoding nil; an array is
//! `*<n>\r\n` followed by `n` child frames. The RDB payload frame is the one
//! exception: `$<len>\r\n<len bytes>` with no trailing `\r\n`.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

pub mod reader;
pub mod writer;

pub use reader::RespReader;
pub use writer::RespWriter;

/// First byte of each RESP frame kind.
pub const STATUS_BYTE: u8 = b'+';
pub const ERROR_BYTE: u8 = b'-';
pub const BULK_BYTE: u8 = b'$';
pub const INT_BYTE: u8 = b':';
pub const ARRAY_BYTE: u8 = b'*';
pub const NIL_BYTE: u8 = b'_';
pub const FLOAT_BYTE: u8 = b',';
pub const BOOL_BYTE: u8 = b'#';
pub const MAP_BYTE: u8 = b'%';
pub const SET_BYTE: u8 = b'~';
pub const PUSH_BYTE: u8 = b'>';

const CRLF: &[u8] = b"\r\n";

/// Errors produced by the RESP codec.
///
/// I/O failures are carried as strings so the enum stays comparable in
/// table-driven tests.
#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    /// The peer closed the connection at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,
    /// The byte stream does not form a valid RESP frame.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A well-formed reply had an unexpected shape for the caller.
    #[error("invalid reply: {0}")]
    InvalidReply(String),
    /// An underlying socket or timer error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RespError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            RespError::ConnectionClosed
        } else {
            RespError::Io(err.to_string())
        }
    }
}

/// A decoded RESP reply.
///
/// `read_reply` returns this tagged union. Set and push frames decode to
/// [`Reply::Array`]; `$-1`, `*-1` and `_` all decode to [`Reply::Nil`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bulk(Vec<u8>),
    Nil,
    Array(Vec<Reply>),
    Map(Vec<(Reply, Reply)>),
}

/// Encodes a simple status frame, `+<s>\r\n`.
pub fn status(s: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(s.len() + 3);
    buf.put_u8(STATUS_BYTE);
    buf.put_slice(s.as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Encodes an error frame with the `ERR ` prefix, `-ERR <msg>\r\n`.
pub fn error(msg: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(msg.len() + 7);
    buf.put_u8(ERROR_BYTE);
    buf.put_slice(b"ERR ");
    buf.put_slice(msg.as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Encodes a bulk string frame, `$<len>\r\n<bytes>\r\n`.
pub fn bulk(b: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(b.len() + 16);
    put_bulk(&mut buf, b);
    buf.freeze()
}

/// Encodes the nil bulk string, `$-1\r\n`.
pub fn nil_bulk() -> Bytes {
    Bytes::from_static(b"$-1\r\n")
}

/// Encodes an integer frame, `:<v>\r\n`.
pub fn integer(v: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(24);
    buf.put_u8(INT_BYTE);
    buf.put_slice(v.to_string().as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Encodes an array header, `*<n>\r\n`.
///
/// The caller appends the `n` child frames itself; `XRANGE` and `XREAD` use
/// this to build nested replies.
pub fn array_header(n: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u8(ARRAY_BYTE);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

/// Encodes an array of bulk strings. This is the frame every command on the
/// wire uses, both client requests and master-to-replica propagation.
pub fn array<T: AsRef<[u8]>>(items: &[T]) -> Bytes {
    let mut buf = BytesMut::with_capacity(16 + items.len() * 16);
    buf.put_slice(&array_header(items.len()));
    for item in items {
        put_bulk(&mut buf, item.as_ref());
    }
    buf.freeze()
}

/// Encodes the RDB payload frame, `$<len>\r\n<bytes>` with no trailing CRLF.
pub fn rdb_frame(content: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(content.len() + 16);
    buf.put_u8(BULK_BYTE);
    buf.put_slice(content.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(content);
    buf.freeze()
}

fn put_bulk(buf: &mut BytesMut, b: &[u8]) {
    buf.put_u8(BULK_BYTE);
    buf.put_slice(b.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(b);
    buf.put_slice(CRLF);
}
