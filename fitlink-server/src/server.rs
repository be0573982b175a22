//! Unix socket IPC server
//!
//! Frames are a 4-byte little endian length prefix followed by a MessagePack
//! `LinkRequest`; every request gets exactly one `LinkResponse` frame back.
//! Undecodable frames get an error response and the connection stays open.

use crate::router;
use crate::state::AppState;
use bytes::Bytes;
use fitlink_core::ipc::{LinkRequest, LinkResponse};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

fn le_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().little_endian().new_codec()
}

/// Decode one frame, or produce the error response to send instead.
pub fn decode_request(frame: &[u8]) -> Result<LinkRequest, LinkResponse> {
    rmp_serde::from_slice(frame)
        .map_err(|e| LinkResponse::err(format!("Deserialization error: {}", e)))
}

/// Serve one connection until the peer hangs up or a frame fails.
pub async fn handle_connection<R, W>(read: R, write: W, state: Arc<AppState>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match decode_request(&bytes_mut) {
            Ok(request) => router::handle_request(request, &state).await,
            Err(resp) => resp,
        };

        let resp_bytes = match rmp_serde::to_vec_named(&response) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        };
        if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
            tracing::error!("Failed to send response: {}", e);
            break;
        }
    }
}

pub async fn run_unix_server(
    socket_path: &str,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(socket_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC Server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let state = state.clone();
                tokio::spawn(async move {
                    let (read, write) = stream.into_split();
                    handle_connection(read, write, state).await;
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}
