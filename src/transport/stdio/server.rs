//! Server-side stdio transport: reads NDJSON frames from a reader, feeds
//! them to a [`RequestProcessor`], and writes responses back (spec.md
//! §4.6.2).

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::protocol::Frame;
use crate::transport::{RequestProcessor, TransportError, TransportResult};

/// Drives the read-decode-dispatch-write loop for one stdio peer. Unlike the
/// client transport this has no `Transport` impl of its own — it is a
/// listen-style driver invoked directly from `main`/a test harness, per
/// spec.md's server-side "listen contract".
pub struct StdioServerTransport;

impl StdioServerTransport {
    /// Reads NDJSON frames from `reader` until EOF or `ctx` is cancelled,
    /// calling `processor.process` for each and writing any response frame
    /// back to `writer` as a single `\n`-terminated line.
    pub async fn listen<R, W, P>(reader: R, mut writer: W, processor: P, ctx: CancellationToken) -> TransportResult<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
        P: RequestProcessor,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = ctx.cancelled() => break,
            };
            let line = match line.map_err(|e| TransportError::ReadFailed(e.to_string()))? {
                Some(line) => line,
                None => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            let frame = match Frame::decode(line.as_bytes()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "dropping unparseable inbound line");
                    continue;
                }
            };
            if let Some(response) = processor.process(None, frame).await {
                let mut encoded = response.encode()?;
                encoded.push('\n');
                writer
                    .write_all(encoded.as_bytes())
                    .await
                    .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
            }
        }
        Ok(())
    }
}
