//! # Wire Protocol
//!
//! Length-prefixed binary frames over a TCP byte stream.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Type (4, BE) │ Payload Size (4, BE)                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (variable, max 1392 bytes)                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All multi-byte values are big-endian. The core never frames on its own:
//! handlers call [`split_frame`] on the bytes handed to `on_data_received`
//! and report how much they consumed.

mod packet;
pub mod wire;

pub use packet::{split_frame, Packet, PacketHeader, PacketType, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use wire::{WireReader, WireWriter};

use thiserror::Error;

/// Frame encoding and decoding errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Output buffer cannot hold the encoded frame.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Frame would exceed the maximum frame size.
    #[error("Frame of {size} bytes exceeds MAX_FRAME_SIZE")]
    FrameTooLarge {
        /// Declared or computed frame size.
        size: usize,
    },

    /// Input ends before the declared frame does.
    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
}
