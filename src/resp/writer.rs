//! Framed RESP writer over a buffered byte stream.

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::resp;

/// Writes RESP frames into a user-space buffer.
///
/// Nothing reaches the socket until [`RespWriter::flush`] is called; the
/// connection object flushes after every public write.
pub struct RespWriter<W> {
    w: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> RespWriter<W> {
    pub fn new(inner: W) -> Self {
        RespWriter {
            w: BufWriter::new(inner),
        }
    }

    pub async fn write_status(&mut self, s: &str) -> tokio::io::Result<()> {
        self.w.write_all(&resp::status(s)).await
    }

    pub async fn write_error(&mut self, msg: &str) -> tokio::io::Result<()> {
        self.w.write_all(&resp::error(msg)).await
    }

    pub async fn write_bulk(&mut self, b: &[u8]) -> tokio::io::Result<()> {
        self.w.write_all(&resp::bulk(b)).await
    }

    pub async fn write_nil_bulk(&mut self) -> tokio::io::Result<()> {
        self.w.write_all(&resp::nil_bulk()).await
    }

    pub async fn write_int(&mut self, v: i64) -> tokio::io::Result<()> {
        self.w.write_all(&resp::integer(v)).await
    }

    /// Writes an array-of-bulk frame.
    pub async fn write_slice<T: AsRef<[u8]>>(&mut self, items: &[T]) -> tokio::io::Result<()> {
        self.w.write_all(&resp::array(items)).await
    }

    /// Writes the RDB payload frame. No trailing CRLF.
    pub async fn write_rdb(&mut self, content: &[u8]) -> tokio::io::Result<()> {
        self.w.write_all(&resp::rdb_frame(content)).await
    }

    pub async fn write_raw_bytes(&mut self, b: &[u8]) -> tokio::io::Result<()> {
        self.w.write_all(b).await
    }

    pub async fn flush(&mut self) -> tokio::io::Result<()> {
        self.w.flush().await
    }

    /// Flushes the buffer and shuts the stream down.
    pub async fn shutdown(&mut self) -> tokio::io::Result<()> {
        self.w.flush().await?;
        self.w.shutdown().await
    }
}
