//! Newline-delimited JSON over any async byte stream.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::types::{McpError, McpResult};

use super::framing::{frame_message, unframe_line};
use super::{MessageReader, MessageWriter, Transport};

pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageReader for LineReader<R> {
    async fn receive(&mut self) -> McpResult<Option<Vec<u8>>> {
        loop {
            // Partial reads stay in `buf` if this future is dropped.
            let n = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(McpError::Io)?;

            if n == 0 && self.buf.is_empty() {
                return Ok(None);
            }
            let at_eof = n == 0 || !self.buf.ends_with(b"\n");

            let line = std::mem::take(&mut self.buf);
            let frame = unframe_line(&line);
            if !frame.is_empty() {
                return Ok(Some(frame.to_vec()));
            }
            if at_eof {
                return Ok(None);
            }
        }
    }
}

pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageWriter for LineWriter<W> {
    async fn send(&mut self, frame: &[u8]) -> McpResult<()> {
        self.writer
            .write_all(&frame_message(frame))
            .await
            .map_err(McpError::Io)?;
        self.writer.flush().await.map_err(McpError::Io)?;
        Ok(())
    }
}

/// A reader and writer pair speaking newline-delimited JSON.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Reader = LineReader<R>;
    type Writer = LineWriter<W>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (LineReader::new(self.reader), LineWriter::new(self.writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_lines_and_skips_blanks() {
        let input: &[u8] = b"{\"a\":1}\n\n  \r\n{\"b\":2}\r\n{\"c\":3}";
        let mut reader = LineReader::new(input);
        assert_eq!(reader.receive().await.unwrap().unwrap(), b"{\"a\":1}");
        assert_eq!(reader.receive().await.unwrap().unwrap(), b"{\"b\":2}");
        // Final line without a terminator is still delivered.
        assert_eq!(reader.receive().await.unwrap().unwrap(), b"{\"c\":3}");
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writer_appends_newline() {
        let mut out = Vec::new();
        {
            let mut writer = LineWriter::new(&mut out);
            writer.send(b"{}").await.unwrap();
            writer.send(b"[]").await.unwrap();
        }
        assert_eq!(out, b"{}\n[]\n");
    }
}
