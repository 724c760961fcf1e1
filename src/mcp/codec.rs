//! Line codec for the MCP stdio transport.
//!
//! One JSON-RPC message per line, terminated by `\n` (a trailing `\r` is
//! tolerated). Lines longer than the configured cap are drained and reported
//! as [`Frame::Oversized`] without being buffered.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One line read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw line bytes without the terminator.
    Line(Vec<u8>),
    /// Line exceeded the cap; carries the number of bytes seen.
    Oversized(usize),
}

/// Read one line. Returns `None` on clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_line_bytes: usize,
) -> std::io::Result<Option<Frame>> {
    let mut line = Vec::new();
    let mut seen = 0usize;
    let mut oversized = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            // EOF: a final unterminated line still counts.
            if seen == 0 {
                return Ok(None);
            }
            break;
        }

        let (chunk, done) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (&available[..pos], pos + 1),
            None => (available, available.len()),
        };
        let terminated = done > chunk.len();
        seen += chunk.len();

        if !oversized && seen > max_line_bytes {
            oversized = true;
            line = Vec::new();
        }
        if !oversized {
            line.extend_from_slice(chunk);
        }

        reader.consume(done);
        if terminated {
            break;
        }
    }

    if oversized {
        return Ok(Some(Frame::Oversized(seen)));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(Frame::Line(line)))
}

/// Serialize `message` as one line and flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut payload = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
