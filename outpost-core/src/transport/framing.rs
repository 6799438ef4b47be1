// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Frame layout and integrity checks for the duplex channel.
//!
//! Each frame is an 8-byte header followed by the payload:
//!
//! ```text
//! [payload_len: u32 LE][checksum: u32 LE][payload bytes]
//! ```
//!
//! The checksum is CRC32 over the payload. A frame that fails length
//! or checksum validation poisons the stream: there is no way to know
//! where the next frame starts, so the channel must be torn down.

use crate::error::WireError;

/// Serialized size of a frame header.
pub const FRAME_HEADER_LEN: usize = 8;

/// Frame header preceding every payload on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u32,
    pub checksum: u32,
}

impl FrameHeader {
    /// Build a header for the given payload.
    ///
    /// The length field is 32 bits; a payload that does not fit is
    /// rejected rather than truncated.
    pub fn for_payload(payload: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            payload_len: payload_len_u32(payload.len())?,
            checksum: crc32fast::hash(payload),
        })
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut buf = [0u8; FRAME_HEADER_LEN];
        buf[..4].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[4..].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; FRAME_HEADER_LEN]) -> Self {
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[..4]);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&buf[4..]);
        Self {
            payload_len: u32::from_le_bytes(len_bytes),
            checksum: u32::from_le_bytes(crc_bytes),
        }
    }

    /// Validate the declared payload length against channel limits.
    pub fn validate_payload_len(&self, max_frame_bytes: usize) -> Result<(), WireError> {
        if self.payload_len == 0 {
            return Err(WireError::EmptyPayload);
        }
        if self.payload_len as usize > max_frame_bytes {
            return Err(WireError::FrameTooLarge {
                size: self.payload_len as usize,
                max: max_frame_bytes,
            });
        }
        Ok(())
    }

    /// Verify the payload against the header checksum.
    pub fn verify_checksum(&self, payload: &[u8]) -> Result<(), WireError> {
        let actual = crc32fast::hash(payload);
        if actual != self.checksum {
            return Err(WireError::ChecksumMismatch {
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }
}

/// Encode a complete frame: header plus payload, ready to write.
pub fn encode_frame(payload: &[u8], max_frame_bytes: usize) -> Result<Vec<u8>, WireError> {
    if payload.is_empty() {
        return Err(WireError::EmptyPayload);
    }
    if payload.len() > max_frame_bytes {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
            max: max_frame_bytes,
        });
    }
    let header = FrameHeader::for_payload(payload)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Frame lengths are carried as u32 on the wire.
fn payload_len_u32(len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::FrameTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAX: usize = 1024;

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader::for_payload(b"hello").unwrap();
        let decoded = FrameHeader::decode(&header.encode());
        assert_eq!(decoded, header);
        assert_eq!(decoded.payload_len, 5);
    }

    #[test]
    fn test_checksum_matches_payload() {
        let header = FrameHeader::for_payload(b"hello").unwrap();
        assert!(header.verify_checksum(b"hello").is_ok());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let header = FrameHeader::for_payload(b"hello").unwrap();
        let err = header.verify_checksum(b"jello").unwrap_err();
        assert!(matches!(err, WireError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_payload_len_must_fit_in_u32() {
        assert_eq!(payload_len_u32(7).unwrap(), 7);
        assert_eq!(payload_len_u32(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            payload_len_u32(u32::MAX as usize + 1),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(b"abc", TEST_MAX).unwrap();
        assert_eq!(frame.len(), FRAME_HEADER_LEN + 3);
        let header = FrameHeader::decode(&frame[..FRAME_HEADER_LEN].try_into().unwrap());
        assert_eq!(header.payload_len, 3);
        assert_eq!(&frame[FRAME_HEADER_LEN..], b"abc");
        assert!(header.verify_checksum(&frame[FRAME_HEADER_LEN..]).is_ok());
    }

    #[test]
    fn test_encode_frame_rejects_empty() {
        assert!(matches!(
            encode_frame(b"", TEST_MAX),
            Err(WireError::EmptyPayload)
        ));
    }

    #[test]
    fn test_encode_frame_rejects_oversized() {
        let payload = vec![0u8; TEST_MAX + 1];
        assert!(matches!(
            encode_frame(&payload, TEST_MAX),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_payload_len_bounds() {
        let ok = FrameHeader {
            payload_len: TEST_MAX as u32,
            checksum: 0,
        };
        assert!(ok.validate_payload_len(TEST_MAX).is_ok());

        let empty = FrameHeader {
            payload_len: 0,
            checksum: 0,
        };
        assert!(matches!(
            empty.validate_payload_len(TEST_MAX),
            Err(WireError::EmptyPayload)
        ));

        let oversized = FrameHeader {
            payload_len: (TEST_MAX + 1) as u32,
            checksum: 0,
        };
        assert!(matches!(
            oversized.validate_payload_len(TEST_MAX),
            Err(WireError::FrameTooLarge { .. })
        ));
    }
}
