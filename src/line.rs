//! Newline-delimited line reading
//!
//! `LineReader` keeps partially received bytes between calls, so
//! `next_line` can be used as a `select!` branch: a cancelled call loses
//! nothing and the next call picks up where it stopped.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::AppError;

/// Buffered line reader with a length limit
pub struct LineReader<R> {
    reader: BufReader<R>,
    /// Bytes of the line currently being received
    pending: Vec<u8>,
    /// Longest accepted line in bytes, terminator excluded
    max: usize,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, max: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            max,
        }
    }

    /// Read one line without its `\n` or `\r\n` terminator
    ///
    /// Returns `None` on EOF. A final unterminated line is still returned.
    /// Cancel safe.
    pub async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        // Room for the body plus a two-byte terminator
        let limit = (self.max + 2).saturating_sub(self.pending.len()) as u64;
        (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.pending)
            .await?;

        if self.pending.is_empty() {
            return Ok(None);
        }
        if !self.pending.ends_with(b"\n") && self.pending.len() >= self.max + 2 {
            self.pending.clear();
            return Err(AppError::LineTooLong(self.max));
        }

        let mut line = std::mem::take(&mut self.pending);
        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }
        if line.len() > self.max {
            return Err(AppError::LineTooLong(self.max));
        }

        let line = String::from_utf8(line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(line))
    }
}

/// Write one line followed by the terminator
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_strips_terminators() {
        let mut lines = LineReader::new(&b"alice\r\nlobby\nlast"[..], 64);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("alice"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("lobby"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("last"));
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keeps_inner_whitespace() {
        let mut lines = LineReader::new(&b"  alice(10:00):  hi  \n"[..], 64);
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("  alice(10:00):  hi  ")
        );
    }

    #[tokio::test]
    async fn test_limit_excludes_terminator() {
        let mut lf = LineReader::new(&b"abcd\n"[..], 4);
        assert_eq!(lf.next_line().await.unwrap().as_deref(), Some("abcd"));

        let mut crlf = LineReader::new(&b"abcd\r\nefgh\r\n"[..], 4);
        assert_eq!(crlf.next_line().await.unwrap().as_deref(), Some("abcd"));
        assert_eq!(crlf.next_line().await.unwrap().as_deref(), Some("efgh"));

        let mut unterminated = LineReader::new(&b"abcd"[..], 4);
        assert_eq!(unterminated.next_line().await.unwrap().as_deref(), Some("abcd"));
    }

    #[tokio::test]
    async fn test_limit_rejects_long_lines() {
        let mut long = LineReader::new(&b"abcdef\n"[..], 4);
        assert!(matches!(long.next_line().await, Err(AppError::LineTooLong(4))));

        let mut one_over = LineReader::new(&b"abcde\n"[..], 4);
        assert!(matches!(one_over.next_line().await, Err(AppError::LineTooLong(4))));

        let mut one_over_crlf = LineReader::new(&b"abcde\r\n"[..], 4);
        assert!(matches!(
            one_over_crlf.next_line().await,
            Err(AppError::LineTooLong(4))
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_io_error() {
        let mut lines = LineReader::new(&b"\xff\xfe\n"[..], 64);
        assert!(matches!(lines.next_line().await, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_partial_line() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut lines = LineReader::new(client, 64);

        server.write_all(b"hello wor").await.unwrap();
        tokio::select! {
            _ = lines.next_line() => panic!("line is not complete yet"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }

        server.write_all(b"ld\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello world"));
    }
}
