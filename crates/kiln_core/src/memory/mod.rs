//! # Memory Management
//!
//! Fixed-capacity storage for the network pump loop.
//!
//! ## Design Philosophy
//!
//! Every buffer is allocated once when a client or peer is created. While
//! bytes are flowing:
//! - No heap allocations
//! - No partial writes (a write either fits or is refused)
//! - Back-pressure is visible to the producer as a refused write

mod byte_buffer;

pub use byte_buffer::ByteBuffer;
