//! Length-prefixed packet frames.
//!
//! ```text
//! ┌──────────────┬────────────────┬──────────────────────┐
//! │ type: u32 BE │ payload: u32 BE│ payload bytes        │
//! └──────────────┴────────────────┴──────────────────────┘
//!   0              4                8 ... 8 + payload
//! ```

use super::wire::{read_u32, write_u32};
use super::CodecError;
use crate::MAX_FRAME_SIZE;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload that still fits in one frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Application-defined packet type tag.
///
/// Zero is reserved for "unknown"; such frames still decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketType(pub u32);

impl PacketType {
    /// The reserved "unknown" type.
    pub const UNKNOWN: Self = Self(0);

    /// Returns true for the reserved type.
    #[inline]
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for PacketType {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Frame header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Type tag.
    pub packet_type: PacketType,
    /// Payload length in bytes, header excluded.
    pub payload_size: u32,
}

impl PacketHeader {
    /// Returns header plus payload size.
    #[inline]
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        HEADER_SIZE.saturating_add(self.payload_size as usize)
    }

    /// Writes the header into the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// # Errors
    ///
    /// [`CodecError::BufferTooSmall`] when `buf` is shorter than a header.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::BufferTooSmall {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }
        write_u32(buf, 0, self.packet_type.0);
        write_u32(buf, 4, self.payload_size);
        Ok(())
    }

    /// Reads a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`CodecError::Truncated`] when `buf` is shorter than a header.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let truncated = CodecError::Truncated {
            needed: HEADER_SIZE,
            available: buf.len(),
        };
        let (packet_type, _) = read_u32(buf, 0).ok_or(truncated)?;
        let (payload_size, _) = read_u32(buf, 4).ok_or(truncated)?;
        Ok(Self {
            packet_type: PacketType(packet_type),
            payload_size,
        })
    }
}

/// A packet: header plus owned payload.
///
/// The header's payload size always equals the payload length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Vec<u8>,
}

impl Packet {
    /// Creates an empty packet of `packet_type`.
    #[must_use]
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            header: PacketHeader {
                packet_type,
                payload_size: 0,
            },
            payload: Vec::new(),
        }
    }

    /// Creates a packet carrying a copy of `payload`.
    #[must_use]
    pub fn with_payload(packet_type: PacketType, payload: &[u8]) -> Self {
        let mut packet = Self::new(packet_type);
        packet.set_payload(payload);
        packet
    }

    /// Returns the header.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// Returns the type tag.
    #[inline]
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    /// Sets the type tag.
    pub fn set_type(&mut self, packet_type: PacketType) {
        self.header.packet_type = packet_type;
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replaces the payload with a copy of `payload`.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(payload);
        self.sync_size();
    }

    /// Appends `bytes` to the payload.
    pub fn append_payload(&mut self, bytes: &[u8]) {
        self.payload.extend_from_slice(bytes);
        self.sync_size();
    }

    /// Drops the payload and resets the type to [`PacketType::UNKNOWN`].
    pub fn reset(&mut self) {
        self.header = PacketHeader::default();
        self.payload = Vec::new();
    }

    /// Returns the encoded size of this packet.
    #[inline]
    #[must_use]
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    fn sync_size(&mut self) {
        // Oversized payloads are rejected at serialize time.
        self.header.payload_size = u32::try_from(self.payload.len()).unwrap_or(u32::MAX);
    }

    /// Encodes the packet into `buf`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// - [`CodecError::FrameTooLarge`] when the frame exceeds [`MAX_FRAME_SIZE`]
    /// - [`CodecError::BufferTooSmall`] when `buf` cannot hold the frame
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let size = self.frame_size();
        if size > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge { size });
        }
        if buf.len() < size {
            return Err(CodecError::BufferTooSmall {
                needed: size,
                available: buf.len(),
            });
        }

        self.header.encode(buf)?;
        buf[HEADER_SIZE..size].copy_from_slice(&self.payload);
        Ok(size)
    }

    /// Encodes the packet into a new vector.
    ///
    /// # Errors
    ///
    /// [`CodecError::FrameTooLarge`] when the frame exceeds [`MAX_FRAME_SIZE`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; self.frame_size()];
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// Replaces this packet with the frame at the start of `buf`.
    ///
    /// Bytes past the frame are ignored. On error the packet is unchanged.
    ///
    /// # Errors
    ///
    /// - [`CodecError::Truncated`] when `buf` holds less than the declared frame
    /// - [`CodecError::FrameTooLarge`] when the declared frame exceeds
    ///   [`MAX_FRAME_SIZE`]
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<(), CodecError> {
        let header = PacketHeader::decode(buf)?;
        let size = header.frame_size();
        if size > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge { size });
        }
        if buf.len() < size {
            return Err(CodecError::Truncated {
                needed: size,
                available: buf.len(),
            });
        }

        if header.packet_type.is_unknown() {
            tracing::warn!("Decoded packet with unknown type ({} byte payload)", header.payload_size);
        }

        self.header = header;
        self.payload = buf[HEADER_SIZE..size].to_vec();
        Ok(())
    }

    /// Decodes the frame at the start of `buf` into a new packet.
    ///
    /// # Errors
    ///
    /// Same as [`Packet::deserialize`].
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut packet = Self::default();
        packet.deserialize(buf)?;
        Ok(packet)
    }
}

/// Splits one complete frame off the front of a receive buffer.
///
/// Returns the packet and the bytes it occupied, or `None` when the frame
/// has not fully arrived yet. Meant to be called from `on_data_received`,
/// returning the summed consumed counts.
///
/// # Errors
///
/// [`CodecError::FrameTooLarge`] as soon as the header declares a frame that
/// can never fit; the stream cannot be resynchronized after that.
pub fn split_frame(buf: &[u8]) -> Result<Option<(Packet, usize)>, CodecError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }
    let header = PacketHeader::decode(buf)?;
    let size = header.frame_size();
    if size > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge { size });
    }
    if buf.len() < size {
        return Ok(None);
    }
    Packet::decode(buf).map(|packet| Some((packet, size)))
}
