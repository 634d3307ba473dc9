//! # Kiln Core
//!
//! Memory primitives shared by the Kiln network core.
//!
//! ## Architecture Rules
//!
//! 1. **Fixed capacity** - buffers are sized once, at construction
//! 2. **No aborts on allocation failure** - reservation errors are returned
//! 3. **Contiguous views** - producers and consumers always see one slice
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::ByteBuffer;
//!
//! let mut buffer = ByteBuffer::with_capacity(16).unwrap();
//! assert!(buffer.write(b"hello"));
//! assert_eq!(buffer.readable(), b"hello");
//! buffer.consume(5);
//! assert!(buffer.is_empty());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;

pub use error::{CoreError, CoreResult};
pub use memory::ByteBuffer;
