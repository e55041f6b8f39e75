//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Length-prefixed frames on a byte stream.
//!
//! ```text
//! +----------------------+---------------------+
//! | payload length (u32) | payload             |
//! | big-endian, 4 bytes  | length bytes        |
//! +----------------------+---------------------+
//! ```
//!
//! End-of-stream exactly between two frames is a clean end. End-of-stream
//! anywhere inside a frame is an error.

use crate::serialization::{DeserializationError, SerializationError, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload a frame may carry (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Bytes taken by the length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

fn frame_length(len: usize) -> Option<u32> {
    u32::try_from(len).ok().filter(|len| *len <= MAX_FRAME_SIZE)
}

/// Writes `payload` as one frame and flushes.
///
/// Header and payload go out in a single buffer so a frame is never split
/// across two writes of the caller.
///
/// # Errors
///
/// Payloads over [`MAX_FRAME_SIZE`] are refused before anything is written.
/// Writer failures carry the I/O error as their source.
///
/// # Examples
///
/// ```rust
/// use rxnet::serialization::framing::write_frame;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut wire = Vec::new();
/// write_frame(&mut wire, b"ping").await?;
/// assert_eq!(wire, [0, 0, 0, 4, b'p', b'i', b'n', b'g']);
/// # Ok(())
/// # }
/// ```
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), SerializationError>
where
    W: AsyncWrite + Unpin,
{
    let len = frame_length(payload.len()).ok_or_else(|| {
        SerializationError::new(format!(
            "payload of {} bytes is over the {MAX_FRAME_SIZE} byte frame limit",
            payload.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    writer
        .write_all(&frame)
        .await
        .map_err(|e| SerializationError::with_source("frame write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| SerializationError::with_source("frame flush", e))
}

/// Reads the next frame; `Ok(None)` on a clean end-of-stream.
///
/// # Errors
///
/// Announced lengths over [`MAX_FRAME_SIZE`], reader failures and streams
/// ending inside a frame.
///
/// # Examples
///
/// ```rust
/// use rxnet::serialization::framing::read_frame;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let wire = [0, 0, 0, 2, b'h', b'i'];
/// let mut reader = &wire[..];
/// assert_eq!(read_frame(&mut reader).await?, Some(b"hi".to_vec()));
/// assert_eq!(read_frame(&mut reader).await?, None);
/// # Ok(())
/// # }
/// ```
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, DeserializationError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];

    // The first byte decides between a clean end and a frame.
    let first = reader
        .read(&mut header[..1])
        .await
        .map_err(|e| DeserializationError::with_source("frame header", e))?;
    if first == 0 {
        return Ok(None);
    }
    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(|e| DeserializationError::with_source("frame header", e))?;

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_SIZE {
        return Err(DeserializationError::new(format!(
            "announced frame of {len} bytes is over the {MAX_FRAME_SIZE} byte limit"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| DeserializationError::with_source("frame payload", e))?;
    Ok(Some(payload))
}

/// Encodes `message` with `serializer` and writes it as one frame.
pub async fn write_message<W, S, T>(
    writer: &mut W,
    serializer: &S,
    message: &T,
) -> Result<(), SerializationError>
where
    W: AsyncWrite + Unpin,
    S: Serializer,
    T: serde::Serialize,
{
    write_frame(writer, &serializer.serialize(message)?).await
}

/// Reads one frame and decodes it with `serializer`.
pub async fn read_message<R, S, T>(
    reader: &mut R,
    serializer: &S,
) -> Result<Option<T>, DeserializationError>
where
    R: AsyncRead + Unpin,
    S: Serializer,
    T: serde::de::DeserializeOwned,
{
    read_frame(reader)
        .await?
        .map(|payload| serializer.deserialize(&payload))
        .transpose()
}
