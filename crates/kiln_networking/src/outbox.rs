//! Reply handle passed to data callbacks.

use kiln_core::ByteBuffer;

/// Write access to one connection's outbound buffer.
///
/// Bytes queued here go out on the next pump, in order, after anything
/// already pending. Writes are all-or-nothing: a payload that does not fit
/// in the free space is refused whole.
pub struct Outbox<'a> {
    buffer: &'a mut ByteBuffer,
}

impl<'a> Outbox<'a> {
    pub(crate) fn new(buffer: &'a mut ByteBuffer) -> Self {
        Self { buffer }
    }

    /// Queues `data`; returns false, queueing nothing, if it does not fit.
    pub fn send(&mut self, data: &[u8]) -> bool {
        self.buffer.write(data)
    }

    /// Returns how many more bytes can be queued.
    #[inline]
    #[must_use]
    pub fn free(&self) -> usize {
        self.buffer.free()
    }

    /// Returns how many bytes are waiting to be sent.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.used()
    }
}
