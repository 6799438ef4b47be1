//! Private duplex channel between a domain creator and its worker.
//!
//! The creator binds a Unix socket at a well-known rendezvous path
//! before the worker is spawned, so the worker can always connect.
//! Once both sides hold the connection the channel is private to the
//! pair and carries length-prefixed, checksummed frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use crate::config::DomainOptions;
use crate::error::{OutpostError, TransportError};
use crate::transport::framing::{encode_frame, FrameHeader, FRAME_HEADER_LEN};
use crate::types::RendezvousName;

/// Filesystem path of the rendezvous socket for a given name.
pub fn socket_path_for(rendezvous: &RendezvousName, runtime_dir: &Path) -> PathBuf {
    runtime_dir.join(format!("{rendezvous}.sock"))
}

// =============================================================================
// Rendezvous Point
// =============================================================================

/// Bound listener waiting for the peer to attach.
///
/// Created by the domain creator before the worker process exists.
/// Dropping the point unlinks the socket path; established channels
/// are unaffected.
pub struct RendezvousPoint {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl RendezvousPoint {
    /// Bind the rendezvous socket, replacing any stale file at the path.
    pub fn create(
        rendezvous: &RendezvousName,
        options: &DomainOptions,
    ) -> Result<Self, TransportError> {
        let socket_path = socket_path_for(rendezvous, &options.runtime_dir);

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransportError::BindFailed {
                path: socket_path.clone(),
                reason: format!("failed to create runtime dir: {e}"),
            })?;
        }

        // Remove old socket if exists
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path).map_err(|e| TransportError::BindFailed {
            path: socket_path.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            rendezvous = %rendezvous,
            path = %socket_path.display(),
            "Bound rendezvous socket"
        );

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Wait for the peer to attach, bounded by the attach timeout.
    pub async fn accept(&self, options: &DomainOptions) -> Result<FramedChannel, TransportError> {
        let attach = tokio::time::timeout(options.attach_timeout, self.listener.accept());
        match attach.await {
            Ok(Ok((stream, _))) => {
                tracing::debug!(path = %self.socket_path.display(), "Peer attached");
                Ok(FramedChannel::new(stream, options.max_frame_bytes))
            }
            Ok(Err(e)) => Err(TransportError::Io {
                context: "accepting peer connection",
                source: e,
            }),
            Err(_) => Err(TransportError::AttachTimeout {
                timeout_ms: options.attach_timeout.as_millis() as u64,
            }),
        }
    }
}

impl Drop for RendezvousPoint {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Attach to a rendezvous point bound by the creating process.
pub async fn connect(
    rendezvous: &RendezvousName,
    options: &DomainOptions,
) -> Result<FramedChannel, TransportError> {
    let socket_path = socket_path_for(rendezvous, &options.runtime_dir);
    let stream = UnixStream::connect(&socket_path)
        .await
        .map_err(|e| TransportError::ConnectFailed {
            path: socket_path.clone(),
            reason: e.to_string(),
        })?;
    tracing::debug!(
        rendezvous = %rendezvous,
        path = %socket_path.display(),
        "Attached to rendezvous socket"
    );
    Ok(FramedChannel::new(stream, options.max_frame_bytes))
}

// =============================================================================
// Framed Channel
// =============================================================================

/// Duplex channel carrying framed payloads in both directions.
pub struct FramedChannel {
    reader: FrameReader,
    writer: Arc<FrameWriter>,
}

impl FramedChannel {
    pub fn new(stream: UnixStream, max_frame_bytes: usize) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FrameReader {
                inner: read_half,
                max_frame_bytes,
            },
            writer: Arc::new(FrameWriter {
                inner: Mutex::new(write_half),
                max_frame_bytes,
            }),
        }
    }

    /// Split into the receive half and a shareable send half.
    pub fn split(self) -> (FrameReader, Arc<FrameWriter>) {
        (self.reader, self.writer)
    }

    pub async fn send(&self, payload: &[u8]) -> Result<(), OutpostError> {
        self.writer.send(payload).await
    }

    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, OutpostError> {
        self.reader.recv().await
    }
}

/// Receiving half of a framed channel. Single reader at a time.
pub struct FrameReader {
    inner: OwnedReadHalf,
    max_frame_bytes: usize,
}

impl FrameReader {
    /// Read the next frame payload.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream at a
    /// frame boundary. A stream that ends inside a frame, or a frame
    /// that fails length or checksum validation, is an error: framing
    /// is lost and the channel cannot be resynchronized.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, OutpostError> {
        // EOF before any header byte is a clean close; EOF with part
        // of a header read means the frame was cut short.
        let mut header_buf = [0u8; FRAME_HEADER_LEN];
        let mut filled = 0;
        while filled < FRAME_HEADER_LEN {
            let n = self
                .inner
                .read(&mut header_buf[filled..])
                .await
                .map_err(|e| TransportError::Io {
                    context: "reading frame header",
                    source: e,
                })?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::Io {
                    context: "reading frame header",
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("stream ended {filled} bytes into the header"),
                    ),
                }
                .into());
            }
            filled += n;
        }

        let header = FrameHeader::decode(&header_buf);
        header.validate_payload_len(self.max_frame_bytes)?;

        let mut payload = vec![0u8; header.payload_len as usize];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(|e| TransportError::Io {
                context: "reading frame payload",
                source: e,
            })?;

        header.verify_checksum(&payload)?;
        Ok(Some(payload))
    }
}

/// Sending half of a framed channel. Cloneable via `Arc`; concurrent
/// senders serialize on the internal lock so frames never interleave.
pub struct FrameWriter {
    inner: Mutex<OwnedWriteHalf>,
    max_frame_bytes: usize,
}

impl FrameWriter {
    pub async fn send(&self, payload: &[u8]) -> Result<(), OutpostError> {
        let frame = encode_frame(payload, self.max_frame_bytes)?;
        let mut writer = self.inner.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| TransportError::Io {
                context: "writing frame",
                source: e,
            })?;
        writer.flush().await.map_err(|e| TransportError::Io {
            context: "flushing frame",
            source: e,
        })?;
        Ok(())
    }

    /// Shut down the write direction. Errors are ignored; the peer
    /// may already be gone.
    pub async fn close(&self) {
        let mut writer = self.inner.lock().await;
        let _ = writer.shutdown().await;
    }
}
