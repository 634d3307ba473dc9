//! # Byte Buffer
//!
//! A linear byte buffer with read/write cursors and compaction.

use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A fixed-capacity byte queue.
///
/// Bytes are appended at the write cursor and consumed from the read cursor.
/// When the tail runs out of room the unread bytes are moved back to the
/// front, so both [`readable`](Self::readable) and
/// [`writable`](Self::writable) are always single contiguous slices covering
/// the whole used and free regions respectively.
///
/// # Thread Safety
///
/// This buffer is NOT thread-safe. Each client and each peer owns its own.
///
/// # Example
///
/// ```rust
/// use kiln_core::ByteBuffer;
///
/// let mut buffer = ByteBuffer::with_capacity(8).unwrap();
/// assert!(buffer.write(&[1, 2, 3]));
/// assert!(!buffer.write(&[0; 6])); // only 5 bytes free
///
/// let region = buffer.writable();
/// region[..2].copy_from_slice(&[4, 5]);
/// buffer.commit(2);
///
/// assert_eq!(buffer.readable(), &[1, 2, 3, 4, 5]);
/// ```
pub struct ByteBuffer {
    /// Backing storage, sized once.
    storage: Box<[u8]>,
    /// Offset of the first unread byte.
    read: usize,
    /// Offset one past the last written byte.
    write: usize,
}

impl ByteBuffer {
    /// Creates a buffer able to hold `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfMemory`] when the backing store cannot be
    /// reserved.
    pub fn with_capacity(capacity: usize) -> CoreResult<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| CoreError::OutOfMemory { requested: capacity })?;
        storage.resize(capacity, 0);

        Ok(Self {
            storage: storage.into_boxed_slice(),
            read: 0,
            write: 0,
        })
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of unread bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.write - self.read
    }

    /// Returns the number of bytes that can still be written.
    #[inline]
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Returns true if there is nothing to read.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Returns true if no more bytes can be written.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Appends `src` in full, or not at all.
    ///
    /// Returns false when fewer than `src.len()` bytes are free.
    pub fn write(&mut self, src: &[u8]) -> bool {
        if src.len() > self.free() {
            return false;
        }
        if src.is_empty() {
            return true;
        }
        if self.capacity() - self.write < src.len() {
            self.compact();
        }

        self.storage[self.write..self.write + src.len()].copy_from_slice(src);
        self.write += src.len();
        true
    }

    /// Returns all unread bytes.
    #[inline]
    #[must_use]
    pub fn readable(&self) -> &[u8] {
        &self.storage[self.read..self.write]
    }

    /// Marks up to `n` bytes as read and returns how many were consumed.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.used());
        self.read += n;
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
        n
    }

    /// Returns the whole free region as one slice.
    ///
    /// Bytes placed here become readable after [`commit`](Self::commit).
    pub fn writable(&mut self) -> &mut [u8] {
        self.compact();
        &mut self.storage[self.write..]
    }

    /// Publishes up to `n` bytes previously placed in [`writable`](Self::writable).
    pub fn commit(&mut self, n: usize) -> usize {
        let n = n.min(self.capacity() - self.write);
        self.write += n;
        n
    }

    /// Drops all unread bytes.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Moves unread bytes to the front of the storage.
    fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.storage.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .finish()
    }
}
