//! One TCP socket wrapped in framed RESP I/O.
//!
//! A [`Connection`] owns both halves of a stream behind buffered reader and
//! writer state. Every public write is followed by a flush, and all writes on
//! a connection are totally ordered because exactly one task writes to it at
//! a time: the dispatcher for a client connection, the propagation task (or a
//! WAIT probe holding the replica lock) for an attached replica.

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::command::Command;
use crate::resp::{Reply, RespError, RespReader, RespWriter};

/// A framed connection with an optional absolute read deadline.
pub struct Connection {
    reader: RespReader<OwnedReadHalf>,
    writer: RespWriter<OwnedWriteHalf>,
    read_deadline: Option<Instant>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Connection {
            reader: RespReader::new(read_half),
            writer: RespWriter::new(write_half),
            read_deadline: None,
        }
    }

    pub async fn connect(addr: &str) -> tokio::io::Result<Self> {
        Ok(Connection::new(TcpStream::connect(addr).await?))
    }

    /// Sets an absolute deadline applied to every read until reset.
    ///
    /// WAIT probes use this to bound how long a GETACK reply is awaited.
    pub fn set_read_deadline(&mut self, deadline: Instant) {
        self.read_deadline = Some(deadline);
    }

    pub fn reset_read_deadline(&mut self) {
        self.read_deadline = None;
    }

    /// Reads one command (an array-of-bulk frame).
    pub async fn read_command(&mut self) -> Result<Command, RespError> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.reader.read_command())
                .await
                .map_err(|_| RespError::Io("read deadline exceeded".to_string()))?,
            None => self.reader.read_command().await,
        }
    }

    /// Reads one reply of any type.
    pub async fn read_reply(&mut self) -> Result<Reply, RespError> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.reader.read_reply())
                .await
                .map_err(|_| RespError::Io("read deadline exceeded".to_string()))?,
            None => self.reader.read_reply().await,
        }
    }

    /// Reads a reply and demands a simple status frame.
    pub async fn read_status_reply(&mut self) -> Result<String, RespError> {
        match self.read_reply().await? {
            Reply::Status(s) => Ok(s),
            other => Err(RespError::InvalidReply(format!(
                "expected status, got {:?}",
                other
            ))),
        }
    }

    /// Reads a string reply; accepts status, integer, float and bulk frames.
    pub async fn read_string_reply(&mut self) -> Result<String, RespError> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.reader.read_string())
                .await
                .map_err(|_| RespError::Io("read deadline exceeded".to_string()))?,
            None => self.reader.read_string().await,
        }
    }

    /// Reads an array-of-bulk reply as raw byte strings.
    pub async fn read_slice_reply(&mut self) -> Result<Vec<Vec<u8>>, RespError> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.reader.read_slice())
                .await
                .map_err(|_| RespError::Io("read deadline exceeded".to_string()))?,
            None => self.reader.read_slice().await,
        }
    }

    /// Reads the RDB payload frame.
    pub async fn read_rdb(&mut self) -> Result<Vec<u8>, RespError> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.reader.read_rdb())
                .await
                .map_err(|_| RespError::Io("read deadline exceeded".to_string()))?,
            None => self.reader.read_rdb().await,
        }
    }

    pub async fn write_status(&mut self, s: &str) -> tokio::io::Result<()> {
        self.writer.write_status(s).await?;
        self.writer.flush().await
    }

    pub async fn write_status_ok(&mut self) -> tokio::io::Result<()> {
        self.write_status("OK").await
    }

    /// Writes a bulk string frame.
    pub async fn write_string(&mut self, b: &[u8]) -> tokio::io::Result<()> {
        self.writer.write_bulk(b).await?;
        self.writer.flush().await
    }

    pub async fn write_nil_bulk(&mut self) -> tokio::io::Result<()> {
        self.writer.write_nil_bulk().await?;
        self.writer.flush().await
    }

    pub async fn write_int(&mut self, v: i64) -> tokio::io::Result<()> {
        self.writer.write_int(v).await?;
        self.writer.flush().await
    }

    pub async fn write_slice<T: AsRef<[u8]>>(&mut self, items: &[T]) -> tokio::io::Result<()> {
        self.writer.write_slice(items).await?;
        self.writer.flush().await
    }

    pub async fn write_rdb(&mut self, content: &[u8]) -> tokio::io::Result<()> {
        self.writer.write_rdb(content).await?;
        self.writer.flush().await
    }

    pub async fn write_error(&mut self, msg: &str) -> tokio::io::Result<()> {
        self.writer.write_error(msg).await?;
        self.writer.flush().await
    }

    pub async fn write_error_invalid_cmd(&mut self) -> tokio::io::Result<()> {
        self.write_error("Invalid Command").await
    }

    pub async fn write_raw_bytes(&mut self, b: &[u8]) -> tokio::io::Result<()> {
        self.writer.write_raw_bytes(b).await?;
        self.writer.flush().await
    }

    /// Serializes a command as an array-of-bulk frame.
    ///
    /// Master-to-replica propagation and the replica side of the handshake
    /// both go through this.
    pub async fn write_command(&mut self, cmd: &Command) -> tokio::io::Result<()> {
        self.write_slice(cmd.args()).await
    }

    /// Writes a command and reads back one reply.
    pub async fn send_command(&mut self, cmd: &Command) -> Result<Reply, RespError> {
        self.write_command(cmd)
            .await
            .map_err(|e| RespError::Io(e.to_string()))?;
        self.read_reply().await
    }

    pub async fn flush(&mut self) -> tokio::io::Result<()> {
        self.writer.flush().await
    }

    /// Flushes buffered writes and closes the socket.
    pub async fn close(mut self) -> tokio::io::Result<()> {
        self.writer.shutdown().await
    }
}
