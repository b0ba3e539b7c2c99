//! Framed RESP reader over a buffered byte stream.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::command::Command;
use crate::resp::{
    Reply, RespError, ARRAY_BYTE, BOOL_BYTE, BULK_BYTE, FLOAT_BYTE, INT_BYTE, MAP_BYTE, NIL_BYTE,
    PUSH_BYTE, SET_BYTE, STATUS_BYTE,
};

/// Reads RESP frames from an underlying byte stream.
///
/// All reads go through an internal buffer. A clean close at a frame
/// boundary surfaces as [`RespError::ConnectionClosed`]; a stream that ends
/// mid-frame or a line missing its `\r\n` terminator is a
/// [`RespError::Protocol`] error.
pub struct RespReader<R> {
    rd: BufReader<R>,
}

impl<R: AsyncRead + Unpin + Send> RespReader<R> {
    pub fn new(inner: R) -> Self {
        RespReader {
            rd: BufReader::new(inner),
        }
    }

    /// Reads one line and returns it without the trailing `\r\n`.
    ///
    /// The returned line always contains at least the frame type byte.
    pub async fn read_line(&mut self) -> Result<Vec<u8>, RespError> {
        let mut line = Vec::new();
        let n = self
            .rd
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| RespError::Io(e.to_string()))?;

        if n == 0 {
            return Err(RespError::ConnectionClosed);
        }

        if line.len() < 3 || line[line.len() - 1] != b'\n' || line[line.len() - 2] != b'\r' {
            return Err(RespError::Protocol(format!(
                "invalid line: {:?}",
                String::from_utf8_lossy(&line)
            )));
        }

        line.truncate(line.len() - 2);
        Ok(line)
    }

    /// Reads one reply of any supported type, dispatching on the first byte.
    ///
    /// Arrays recurse into their children; sets and pushes decode as arrays.
    pub async fn read_reply(&mut self) -> Result<Reply, RespError> {
        self.read_reply_boxed().await
    }

    // Recursive async needs a boxed indirection.
    fn read_reply_boxed(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, RespError>> + Send + '_>> {
        Box::pin(async move {
            let line = self.read_line().await?;

            match line[0] {
                STATUS_BYTE => Ok(Reply::Status(
                    String::from_utf8_lossy(&line[1..]).into_owned(),
                )),
                INT_BYTE => parse_decimal(&line).map(Reply::Int),
                FLOAT_BYTE => parse_float(&line).map(Reply::Float),
                BOOL_BYTE => match &line[1..] {
                    b"t" => Ok(Reply::Bool(true)),
                    b"f" => Ok(Reply::Bool(false)),
                    _ => Err(RespError::Protocol(format!(
                        "can't parse bool reply: {:?}",
                        String::from_utf8_lossy(&line)
                    ))),
                },
                NIL_BYTE => Ok(Reply::Nil),
                BULK_BYTE => match parse_len(&line)? {
                    None => Ok(Reply::Nil),
                    Some(n) => self.read_bulk_content(n).await.map(Reply::Bulk),
                },
                ARRAY_BYTE | SET_BYTE | PUSH_BYTE => match parse_len(&line)? {
                    None => Ok(Reply::Nil),
                    Some(n) => {
                        let mut items = Vec::with_capacity(n);
                        for _ in 0..n {
                            items.push(self.read_reply_boxed().await?);
                        }
                        Ok(Reply::Array(items))
                    }
                },
                MAP_BYTE => match parse_len(&line)? {
                    None => Ok(Reply::Nil),
                    Some(n) => {
                        let mut pairs = Vec::with_capacity(n);
                        for _ in 0..n {
                            let key = self.read_reply_boxed().await?;
                            let value = self.read_reply_boxed().await?;
                            pairs.push((key, value));
                        }
                        Ok(Reply::Map(pairs))
                    }
                },
                _ => Err(RespError::Protocol(format!(
                    "can't parse reply: {:?}",
                    String::from_utf8_lossy(&line)
                ))),
            }
        })
    }

    /// Reads one command: a top-level array of bulk strings.
    ///
    /// An empty array is a protocol error.
    pub async fn read_command(&mut self) -> Result<Command, RespError> {
        let args = self.read_slice().await?;
        if args.is_empty() {
            return Err(RespError::Protocol("empty command array".to_string()));
        }
        Ok(Command::new(args))
    }

    /// Reads an array of bulk strings and returns the raw bytes of each
    /// element.
    pub async fn read_slice(&mut self) -> Result<Vec<Vec<u8>>, RespError> {
        let line = self.read_line().await?;

        if line[0] != ARRAY_BYTE {
            return Err(RespError::Protocol(format!(
                "expected array, got: {:?}",
                String::from_utf8_lossy(&line)
            )));
        }

        let n = parse_len(&line)?
            .ok_or_else(|| RespError::Protocol("unexpected nil array".to_string()))?;

        let mut items = Vec::with_capacity(n);

        for _ in 0..n {
            let child = self.read_line().await?;
            if child[0] != BULK_BYTE {
                return Err(RespError::Protocol(format!(
                    "expected bulk string, got: {:?}",
                    String::from_utf8_lossy(&child)
                )));
            }
            let len = parse_len(&child)?
                .ok_or_else(|| RespError::Protocol("unexpected nil bulk string".to_string()))?;
            items.push(self.read_bulk_content(len).await?);
        }

        Ok(items)
    }

    /// Reads a string reply. Accepts status, integer and float lines as well
    /// as bulk strings; anything else is an invalid reply.
    pub async fn read_string(&mut self) -> Result<String, RespError> {
        let line = self.read_line().await?;

        match line[0] {
            STATUS_BYTE | INT_BYTE | FLOAT_BYTE => {
                Ok(String::from_utf8_lossy(&line[1..]).into_owned())
            }
            BULK_BYTE => {
                let n = parse_len(&line)?
                    .ok_or_else(|| RespError::InvalidReply("nil bulk string".to_string()))?;
                let content = self.read_bulk_content(n).await?;
                String::from_utf8(content)
                    .map_err(|_| RespError::Protocol("invalid UTF-8 in bulk string".to_string()))
            }
            _ => Err(RespError::InvalidReply(format!(
                "can't read string from: {:?}",
                String::from_utf8_lossy(&line)
            ))),
        }
    }

    /// Reads an integer reply. Accepts `:` frames, decimal status lines and
    /// bulk strings holding a decimal.
    pub async fn read_int(&mut self) -> Result<i64, RespError> {
        let line = self.read_line().await?;

        match line[0] {
            INT_BYTE | STATUS_BYTE => parse_decimal(&line),
            BULK_BYTE => {
                let n = parse_len(&line)?
                    .ok_or_else(|| RespError::InvalidReply("nil bulk string".to_string()))?;
                let content = self.read_bulk_content(n).await?;
                std::str::from_utf8(&content)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| RespError::Protocol("can't parse int reply".to_string()))
            }
            _ => Err(RespError::InvalidReply(format!(
                "can't read int from: {:?}",
                String::from_utf8_lossy(&line)
            ))),
        }
    }

    /// Reads the RDB payload frame: `$<len>\r\n<len bytes>` with no trailing
    /// CRLF.
    pub async fn read_rdb(&mut self) -> Result<Vec<u8>, RespError> {
        let line = self.read_line().await?;

        if line[0] != BULK_BYTE {
            return Err(RespError::InvalidReply(format!(
                "expected RDB frame, got: {:?}",
                String::from_utf8_lossy(&line)
            )));
        }

        let n = parse_len(&line)?
            .ok_or_else(|| RespError::Protocol("unexpected nil RDB frame".to_string()))?;

        let mut content = vec![0u8; n];
        self.rd.read_exact(&mut content).await.map_err(map_read_err)?;
        Ok(content)
    }

    // Reads `n` content bytes followed by the trailing CRLF.
    async fn read_bulk_content(&mut self, n: usize) -> Result<Vec<u8>, RespError> {
        let mut buf = vec![0u8; n + 2];
        self.rd.read_exact(&mut buf).await.map_err(map_read_err)?;

        if &buf[n..] != b"\r\n" {
            return Err(RespError::Protocol(
                "bulk string missing CRLF terminator".to_string(),
            ));
        }

        buf.truncate(n);
        Ok(buf)
    }
}

fn map_read_err(err: std::io::Error) -> RespError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RespError::Protocol("stream ended mid-frame".to_string())
    } else {
        RespError::Io(err.to_string())
    }
}

// Parses the length of a `$`, `*`, `%`, `~` or `>` header line. Length `-1`
// encodes nil and returns `None`.
fn parse_len(line: &[u8]) -> Result<Option<usize>, RespError> {
    let n = parse_decimal(line)?;
    if n == -1 {
        return Ok(None);
    }
    if n < 0 {
        return Err(RespError::Protocol(format!(
            "invalid length: {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    Ok(Some(n as usize))
}

fn parse_decimal(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RespError::Protocol(format!(
                "can't parse number: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

fn parse_float(line: &[u8]) -> Result<f64, RespError> {
    match &line[1..] {
        b"inf" => return Ok(f64::INFINITY),
        b"-inf" => return Ok(f64::NEG_INFINITY),
        _ => {}
    }
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            RespError::Protocol(format!(
                "can't parse float: {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}
