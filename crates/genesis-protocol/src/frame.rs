//! Binary world-frame encode/decode.
//!
//! A world frame is a fixed-layout snapshot of the simulated world, handed
//! to the Stream Multiplexer every `stream_interval` ticks. All multi-byte
//! integers and floats are big-endian. Two header/record layouts are
//! supported: the current one (8-byte header, 21-byte entity records,
//! with a `flags` byte) and a legacy pre-flags variant (6-byte header,
//! 20-byte entity records) kept only so old observers are not broken by a
//! field addition.

use std::convert::TryInto;

/// Bit 0 of an entity's `flags` byte.
pub const FLAG_PREDATOR: u8 = 0b0000_0001;
/// Bit 1 of an entity's `flags` byte.
pub const FLAG_INFECTED: u8 = 0b0000_0010;

/// One entity's position, shape, color, and status flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityRecord {
    /// Entity id.
    pub id: u32,
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
    /// Render radius.
    pub radius: f32,
    /// Packed `0x00RRGGBB` color.
    pub color: u32,
    /// Status bitflags; absent (zero) in the legacy layout.
    pub flags: u8,
}

/// One resource's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRecord {
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
}

/// A decoded or about-to-be-encoded world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldFrame {
    /// The simulation tick this frame was captured at.
    pub tick: u32,
    /// Live entities at the time of capture.
    pub entities: Vec<EntityRecord>,
    /// Live resources at the time of capture.
    pub resources: Vec<ResourceRecord>,
}

/// Failure modes for frame decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The buffer ended before a complete header or record could be read.
    #[error("world frame truncated: needed {needed} bytes, had {had}")]
    Truncated {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually available.
        had: usize,
    },
    /// A decoder that only understands the legacy layout was handed a
    /// current-layout frame (or vice versa).
    #[error("unsupported world frame version: entity record size {0}")]
    UnsupportedVersion(usize),
}

const HEADER_SIZE: usize = 8;
const ENTITY_RECORD_SIZE: usize = 21;
const LEGACY_HEADER_SIZE: usize = 6;
const LEGACY_ENTITY_RECORD_SIZE: usize = 20;
const RESOURCE_RECORD_SIZE: usize = 8;

impl WorldFrame {
    /// Encode using the current (21-byte entity record, `flags` included) layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            HEADER_SIZE
                + self.entities.len() * ENTITY_RECORD_SIZE
                + self.resources.len() * RESOURCE_RECORD_SIZE,
        );
        buf.extend_from_slice(&self.tick.to_be_bytes());
        buf.extend_from_slice(&(self.entities.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.resources.len() as u16).to_be_bytes());
        for e in &self.entities {
            buf.extend_from_slice(&e.id.to_be_bytes());
            buf.extend_from_slice(&e.x.to_be_bytes());
            buf.extend_from_slice(&e.y.to_be_bytes());
            buf.extend_from_slice(&e.radius.to_be_bytes());
            buf.extend_from_slice(&e.color.to_be_bytes());
            buf.push(e.flags);
        }
        for r in &self.resources {
            buf.extend_from_slice(&r.x.to_be_bytes());
            buf.extend_from_slice(&r.y.to_be_bytes());
        }
        buf
    }

    /// Encode using the legacy (6-byte header, 20-byte entity record, no
    /// `flags`) layout. Any set flags are silently dropped.
    pub fn encode_legacy(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            LEGACY_HEADER_SIZE
                + self.entities.len() * LEGACY_ENTITY_RECORD_SIZE
                + self.resources.len() * RESOURCE_RECORD_SIZE,
        );
        buf.extend_from_slice(&(self.tick as u16).to_be_bytes());
        buf.extend_from_slice(&(self.entities.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.resources.len() as u16).to_be_bytes());
        for e in &self.entities {
            buf.extend_from_slice(&e.id.to_be_bytes());
            buf.extend_from_slice(&e.x.to_be_bytes());
            buf.extend_from_slice(&e.y.to_be_bytes());
            buf.extend_from_slice(&e.radius.to_be_bytes());
            buf.extend_from_slice(&e.color.to_be_bytes());
        }
        for r in &self.resources {
            buf.extend_from_slice(&r.x.to_be_bytes());
            buf.extend_from_slice(&r.y.to_be_bytes());
        }
        buf
    }

    /// Decode a current-layout (21-byte entity record) frame.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: HEADER_SIZE,
                had: buf.len(),
            });
        }
        let tick = u32::from_be_bytes(buf[0..4].try_into().expect("4 byte slice"));
        let entity_count = u16::from_be_bytes(buf[4..6].try_into().expect("2 byte slice")) as usize;
        let resource_count = u16::from_be_bytes(buf[6..8].try_into().expect("2 byte slice")) as usize;

        let needed = HEADER_SIZE + entity_count * ENTITY_RECORD_SIZE + resource_count * RESOURCE_RECORD_SIZE;
        if buf.len() < needed {
            return Err(FrameError::Truncated {
                needed,
                had: buf.len(),
            });
        }

        let mut offset = HEADER_SIZE;
        let mut entities = Vec::with_capacity(entity_count);
        for _ in 0..entity_count {
            let rec = &buf[offset..offset + ENTITY_RECORD_SIZE];
            entities.push(EntityRecord {
                id: u32::from_be_bytes(rec[0..4].try_into().expect("4 byte slice")),
                x: f32::from_be_bytes(rec[4..8].try_into().expect("4 byte slice")),
                y: f32::from_be_bytes(rec[8..12].try_into().expect("4 byte slice")),
                radius: f32::from_be_bytes(rec[12..16].try_into().expect("4 byte slice")),
                color: u32::from_be_bytes(rec[16..20].try_into().expect("4 byte slice")),
                flags: rec[20],
            });
            offset += ENTITY_RECORD_SIZE;
        }

        let mut resources = Vec::with_capacity(resource_count);
        for _ in 0..resource_count {
            let rec = &buf[offset..offset + RESOURCE_RECORD_SIZE];
            resources.push(ResourceRecord {
                x: f32::from_be_bytes(rec[0..4].try_into().expect("4 byte slice")),
                y: f32::from_be_bytes(rec[4..8].try_into().expect("4 byte slice")),
            });
            offset += RESOURCE_RECORD_SIZE;
        }

        Ok(WorldFrame {
            tick,
            entities,
            resources,
        })
    }

    /// Decode a legacy-layout (20-byte entity record, no `flags`) frame.
    ///
    /// A legacy-encoded buffer is always exactly
    /// `LEGACY_HEADER_SIZE + entity_count * LEGACY_ENTITY_RECORD_SIZE +
    /// resource_count * RESOURCE_RECORD_SIZE` bytes long — `encode_legacy`
    /// never pads. When the buffer doesn't match that signature, check
    /// whether it instead matches the *current* layout's own signature; if
    /// so this isn't truncation, it's a decoder being handed the wrong
    /// version, and callers need to be told that distinctly (spec.md §8
    /// scenario 5).
    pub fn decode_legacy(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < LEGACY_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: LEGACY_HEADER_SIZE,
                had: buf.len(),
            });
        }
        let tick = u16::from_be_bytes(buf[0..2].try_into().expect("2 byte slice")) as u32;
        let entity_count = u16::from_be_bytes(buf[2..4].try_into().expect("2 byte slice")) as usize;
        let resource_count = u16::from_be_bytes(buf[4..6].try_into().expect("2 byte slice")) as usize;

        let needed =
            LEGACY_HEADER_SIZE + entity_count * LEGACY_ENTITY_RECORD_SIZE + resource_count * RESOURCE_RECORD_SIZE;

        if buf.len() != needed {
            if Self::matches_current_layout_signature(buf) {
                return Err(FrameError::UnsupportedVersion(ENTITY_RECORD_SIZE));
            }
            if buf.len() < needed {
                return Err(FrameError::Truncated {
                    needed,
                    had: buf.len(),
                });
            }
        }

        let mut offset = LEGACY_HEADER_SIZE;
        let mut entities = Vec::with_capacity(entity_count);
        for _ in 0..entity_count {
            let rec = &buf[offset..offset + LEGACY_ENTITY_RECORD_SIZE];
            entities.push(EntityRecord {
                id: u32::from_be_bytes(rec[0..4].try_into().expect("4 byte slice")),
                x: f32::from_be_bytes(rec[4..8].try_into().expect("4 byte slice")),
                y: f32::from_be_bytes(rec[8..12].try_into().expect("4 byte slice")),
                radius: f32::from_be_bytes(rec[12..16].try_into().expect("4 byte slice")),
                color: u32::from_be_bytes(rec[16..20].try_into().expect("4 byte slice")),
                flags: 0,
            });
            offset += LEGACY_ENTITY_RECORD_SIZE;
        }

        let mut resources = Vec::with_capacity(resource_count);
        for _ in 0..resource_count {
            let rec = &buf[offset..offset + RESOURCE_RECORD_SIZE];
            resources.push(ResourceRecord {
                x: f32::from_be_bytes(rec[0..4].try_into().expect("4 byte slice")),
                y: f32::from_be_bytes(rec[4..8].try_into().expect("4 byte slice")),
            });
            offset += RESOURCE_RECORD_SIZE;
        }

        Ok(WorldFrame {
            tick,
            entities,
            resources,
        })
    }

    /// Whether `buf`, read under the *current* (8-byte header, 21-byte
    /// entity record) header fields, accounts for every byte in `buf`
    /// exactly. Used only to tell a version mismatch apart from a
    /// genuinely truncated legacy buffer.
    fn matches_current_layout_signature(buf: &[u8]) -> bool {
        if buf.len() < HEADER_SIZE {
            return false;
        }
        let entity_count = u16::from_be_bytes(buf[4..6].try_into().expect("2 byte slice")) as usize;
        let resource_count = u16::from_be_bytes(buf[6..8].try_into().expect("2 byte slice")) as usize;
        let needed_current = HEADER_SIZE + entity_count * ENTITY_RECORD_SIZE + resource_count * RESOURCE_RECORD_SIZE;
        buf.len() == needed_current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> WorldFrame {
        WorldFrame {
            tick: 42,
            entities: vec![
                EntityRecord {
                    id: 1,
                    x: 1.5,
                    y: 2.5,
                    radius: 3.0,
                    color: 0x00ff00aa,
                    flags: FLAG_PREDATOR,
                },
                EntityRecord {
                    id: 2,
                    x: -1.0,
                    y: 0.0,
                    radius: 1.0,
                    color: 0x00112233,
                    flags: FLAG_INFECTED | FLAG_PREDATOR,
                },
            ],
            resources: vec![ResourceRecord { x: 10.0, y: 20.0 }],
        }
    }

    #[test]
    fn round_trips_current_layout() {
        let frame = sample_frame();
        let encoded = frame.encode();
        assert_eq!(
            encoded.len(),
            HEADER_SIZE + frame.entities.len() * ENTITY_RECORD_SIZE + frame.resources.len() * RESOURCE_RECORD_SIZE
        );
        let decoded = WorldFrame::decode(&encoded).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn legacy_decoder_reads_legacy_frame_and_drops_flags() {
        let frame = sample_frame();
        let encoded = frame.encode_legacy();
        let decoded = WorldFrame::decode_legacy(&encoded).expect("decode legacy");
        assert_eq!(decoded.tick, frame.tick);
        assert_eq!(decoded.entities.len(), frame.entities.len());
        assert!(decoded.entities.iter().all(|e| e.flags == 0));
    }

    #[test]
    fn legacy_decoder_rejects_current_layout_frame() {
        let frame = sample_frame();
        let encoded = frame.encode();
        let err = WorldFrame::decode_legacy(&encoded).expect_err("must refuse a current-layout buffer");
        assert_eq!(err, FrameError::UnsupportedVersion(ENTITY_RECORD_SIZE));
    }

    #[test]
    fn legacy_decoder_rejects_empty_current_layout_frame() {
        // No entities/resources at all is the edge case most likely to be
        // coincidentally well-formed under either header's byte layout;
        // the version check must still fire ahead of a truncation check.
        let frame = WorldFrame { tick: 7, entities: vec![], resources: vec![] };
        let encoded = frame.encode();
        let err = WorldFrame::decode_legacy(&encoded).expect_err("must refuse a current-layout buffer");
        assert_eq!(err, FrameError::UnsupportedVersion(ENTITY_RECORD_SIZE));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let frame = sample_frame();
        let encoded = frame.encode();
        let err = WorldFrame::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));
    }
}
