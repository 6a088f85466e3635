//! Frame I/O for the debug server stream
//!
//! Format: [i16 packet id][i32 payload length][payload], little-endian.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::net::codec::PacketWriter;
use crate::net::constants::FRAME_HEADER_SIZE;

/// Errors that can occur while framing. All of them end the connection.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Invalid payload length: {0}")]
    InvalidLength(i32),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn map_eof(e: io::Error) -> FramingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::ConnectionClosed
    } else {
        FramingError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_id: i16,
    pub payload_len: usize,
}

/// Read the next frame header
pub async fn read_header<R: AsyncRead + Unpin>(stream: &mut R) -> Result<FrameHeader, FramingError> {
    let mut buf = [0u8; FRAME_HEADER_SIZE];
    stream.read_exact(&mut buf).await.map_err(map_eof)?;

    let packet_id = i16::from_le_bytes([buf[0], buf[1]]);
    let len = i32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
    let payload_len = usize::try_from(len).map_err(|_| FramingError::InvalidLength(len))?;

    Ok(FrameHeader {
        packet_id,
        payload_len,
    })
}

/// Read exactly `len` payload bytes
pub async fn read_payload<R: AsyncRead + Unpin>(
    stream: &mut R,
    len: usize,
) -> Result<Vec<u8>, FramingError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.map_err(map_eof)?;
    Ok(buf)
}

/// Discard exactly `len` payload bytes without buffering them
pub async fn skip_payload<R: AsyncRead + Unpin>(
    stream: &mut R,
    len: usize,
) -> Result<(), FramingError> {
    let mut limited = (&mut *stream).take(len as u64);
    let skipped = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
    if skipped < len as u64 {
        return Err(FramingError::ConnectionClosed);
    }
    Ok(())
}

/// Build one complete frame
pub fn encode_frame(packet_id: i16, payload: &[u8]) -> Vec<u8> {
    let mut w = PacketWriter::with_capacity(FRAME_HEADER_SIZE + payload.len());
    w.write_i16(packet_id).write_bytes(payload);
    w.build()
}

/// Write one frame and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(
    stream: &mut W,
    packet_id: i16,
    payload: &[u8],
) -> Result<(), FramingError> {
    stream.write_all(&encode_frame(packet_id, payload)).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(5, &[0xAA, 0xBB]);
        assert_eq!(frame, vec![5, 0, 2, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_read_write_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, 4, b"payload").await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let header = read_header(&mut cursor).await.unwrap();
        assert_eq!(
            header,
            FrameHeader {
                packet_id: 4,
                payload_len: 7
            }
        );
        let payload = read_payload(&mut cursor, header.payload_len).await.unwrap();
        assert_eq!(payload, b"payload");
    }

    #[tokio::test]
    async fn test_negative_packet_id() {
        let frame = encode_frame(-2, &[]);
        let header = read_header(&mut Cursor::new(frame)).await.unwrap();
        assert_eq!(header.packet_id, -2);
        assert_eq!(header.payload_len, 0);
    }

    #[tokio::test]
    async fn test_negative_length() {
        let mut data = vec![1, 0];
        data.extend_from_slice(&(-5i32).to_le_bytes());
        let result = read_header(&mut Cursor::new(data)).await;
        assert!(matches!(result, Err(FramingError::InvalidLength(-5))));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let result = read_header(&mut Cursor::new(vec![0u8; 3])).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let result = read_payload(&mut Cursor::new(vec![1u8, 2, 3]), 10).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_skip_payload_consumes_exactly() {
        let mut data = vec![7u8; 37];
        data.extend_from_slice(&encode_frame(2, &[1]));
        let mut cursor = Cursor::new(data);

        skip_payload(&mut cursor, 37).await.unwrap();
        assert_eq!(cursor.position(), 37);

        let header = read_header(&mut cursor).await.unwrap();
        assert_eq!(header.packet_id, 2);
    }

    #[tokio::test]
    async fn test_skip_payload_short_stream() {
        let mut cursor = Cursor::new(vec![0u8; 5]);
        let result = skip_payload(&mut cursor, 6).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_multiple_frames() {
        let frames: Vec<(i16, Vec<u8>)> = vec![(0, vec![1; 8]), (4, vec![]), (5, vec![9; 300])];

        let mut buffer = Vec::new();
        for (id, payload) in &frames {
            write_frame(&mut buffer, *id, payload).await.unwrap();
        }

        let mut cursor = Cursor::new(buffer);
        for (id, payload) in &frames {
            let header = read_header(&mut cursor).await.unwrap();
            assert_eq!(header.packet_id, *id);
            let read = read_payload(&mut cursor, header.payload_len).await.unwrap();
            assert_eq!(&read, payload);
        }
    }
}
