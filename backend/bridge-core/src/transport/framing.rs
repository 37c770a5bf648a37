//! Native-messaging framing: a 4-byte length in native byte order followed
//! by that many bytes of UTF-8 JSON.

use crate::error::transport::TransportError;

use models::{InboundMessage, OutboundRequest};

use common::ErrorLocation;

use std::panic::Location;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame the companion may send us.
pub const MAX_INBOUND_FRAME_LEN: usize = 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;

/// Serialize and frame a request.
#[track_caller]
pub fn encode_request(request: &OutboundRequest) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(request).map_err(|e| TransportError::Encode {
        message: format!("Failed to serialize request {}: {e}", request.id),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let length = u32::try_from(body.len()).map_err(|_| TransportError::Encode {
        message: format!(
            "Request {} is too large to frame ({} bytes)",
            request.id,
            body.len()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.extend_from_slice(&length.to_ne_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Read one frame body.
///
/// Returns `Ok(None)` only when the stream ends exactly between frames. An
/// oversized frame, or one cut off in its length or body, is a
/// [`TransportError::Framing`]: the stream cannot be resynchronised.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let read = reader
            .read(&mut prefix[filled..])
            .await
            .map_err(|e| TransportError::Framing {
                message: format!("Failed to read frame length: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        match (read, filled) {
            (0, 0) => return Ok(None),
            (0, _) => {
                return Err(TransportError::Framing {
                    message: format!(
                        "Stream ended after {filled} of {LENGTH_PREFIX_LEN} length bytes"
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            (read, _) => filled += read,
        }
    }

    let length = u32::from_ne_bytes(prefix) as usize;
    if length > MAX_INBOUND_FRAME_LEN {
        return Err(TransportError::Framing {
            message: format!(
                "Frame of {length} bytes exceeds the {MAX_INBOUND_FRAME_LEN} byte limit"
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| TransportError::Framing {
            message: format!("Stream ended inside a {length} byte frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(Some(body))
}

/// Write an already-encoded frame and flush it.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(frame)
        .await
        .map_err(|e| TransportError::SendFailed {
            message: format!("Failed to write frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    writer.flush().await.map_err(|e| TransportError::SendFailed {
        message: format!("Failed to flush frame: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}

pub fn decode_message(body: &[u8]) -> Result<InboundMessage, serde_json::Error> {
    serde_json::from_slice(body)
}
