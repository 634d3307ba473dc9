//! # Wire Primitives
//!
//! Big-endian (de)serialization of fixed-width values and length-prefixed
//! strings.
//!
//! ## Design
//!
//! - Offset-based free functions: each write returns the bytes produced,
//!   each read returns the value and the bytes consumed; `None` when the
//!   value does not fit the slice
//! - [`WireWriter`] / [`WireReader`] cursors on top, for composing payloads
//!   field by field without tracking offsets by hand
//! - `f32` is carried as its IEEE-754 bit pattern
//! - Strings are a `u16` length followed by the raw UTF-8 bytes, no terminator

/// Size of the length prefix in front of every string.
pub const STRING_LEN_SIZE: usize = 2;

#[inline]
fn put<const N: usize>(buf: &mut [u8], offset: usize, bytes: [u8; N]) -> Option<usize> {
    let end = offset.checked_add(N)?;
    buf.get_mut(offset..end)?.copy_from_slice(&bytes);
    Some(N)
}

#[inline]
fn take<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

/// Writes a byte at `offset`.
#[inline]
pub fn write_u8(buf: &mut [u8], offset: usize, value: u8) -> Option<usize> {
    put(buf, offset, [value])
}

/// Writes a big-endian `u16` at `offset`.
#[inline]
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) -> Option<usize> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes a big-endian `u32` at `offset`.
#[inline]
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> Option<usize> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes a big-endian `u64` at `offset`.
#[inline]
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) -> Option<usize> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes the big-endian IEEE-754 bits of an `f32` at `offset`.
#[inline]
pub fn write_f32(buf: &mut [u8], offset: usize, value: f32) -> Option<usize> {
    put(buf, offset, value.to_bits().to_be_bytes())
}

/// Reads a byte at `offset`.
#[inline]
#[must_use]
pub fn read_u8(buf: &[u8], offset: usize) -> Option<(u8, usize)> {
    take::<1>(buf, offset).map(|b| (b[0], 1))
}

/// Reads a big-endian `u16` at `offset`.
#[inline]
#[must_use]
pub fn read_u16(buf: &[u8], offset: usize) -> Option<(u16, usize)> {
    take(buf, offset).map(|b| (u16::from_be_bytes(b), 2))
}

/// Reads a big-endian `u32` at `offset`.
#[inline]
#[must_use]
pub fn read_u32(buf: &[u8], offset: usize) -> Option<(u32, usize)> {
    take(buf, offset).map(|b| (u32::from_be_bytes(b), 4))
}

/// Reads a big-endian `u64` at `offset`.
#[inline]
#[must_use]
pub fn read_u64(buf: &[u8], offset: usize) -> Option<(u64, usize)> {
    take(buf, offset).map(|b| (u64::from_be_bytes(b), 8))
}

/// Reads a big-endian IEEE-754 `f32` at `offset`.
#[inline]
#[must_use]
pub fn read_f32(buf: &[u8], offset: usize) -> Option<(f32, usize)> {
    read_u32(buf, offset).map(|(bits, n)| (f32::from_bits(bits), n))
}

/// Writes `value` as a `u16` length followed by its bytes.
///
/// Returns `None` for strings longer than `u16::MAX` bytes or when the
/// field does not fit.
pub fn write_string(buf: &mut [u8], offset: usize, value: &str) -> Option<usize> {
    let len = u16::try_from(value.len()).ok()?;
    let end = offset.checked_add(STRING_LEN_SIZE + value.len())?;
    let field = buf.get_mut(offset..end)?;

    field[..STRING_LEN_SIZE].copy_from_slice(&len.to_be_bytes());
    field[STRING_LEN_SIZE..].copy_from_slice(value.as_bytes());
    Some(STRING_LEN_SIZE + value.len())
}

/// Reads a length-prefixed string of at most `capacity` bytes.
///
/// The whole field is consumed even when the string is truncated to
/// `capacity` (truncation backs off to a character boundary and is logged).
/// Returns `None` when the field is cut short or is not UTF-8.
#[must_use]
pub fn read_string(buf: &[u8], offset: usize, capacity: usize) -> Option<(String, usize)> {
    let (len, _) = read_u16(buf, offset)?;
    let len = usize::from(len);
    let start = offset + STRING_LEN_SIZE;
    let bytes = buf.get(start..start.checked_add(len)?)?;
    let text = std::str::from_utf8(bytes).ok()?;

    let mut cut = len.min(capacity);
    if cut < len {
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        tracing::warn!("Truncating {}-byte string to {} bytes", len, cut);
    }

    Some((text[..cut].to_owned(), STRING_LEN_SIZE + len))
}

/// Cursor that appends fields to a caller-provided buffer.
///
/// Every `write_*` returns false, and writes nothing, when the field does
/// not fit in the remaining space.
pub struct WireWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> WireWriter<'a> {
    /// Creates a writer positioned at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns the bytes still available.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    #[inline]
    fn advance(&mut self, written: Option<usize>) -> bool {
        match written {
            Some(n) => {
                self.position += n;
                true
            }
            None => false,
        }
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) -> bool {
        let n = write_u8(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> bool {
        let n = write_u16(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> bool {
        let n = write_u32(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes a big-endian `u64`.
    pub fn write_u64(&mut self, value: u64) -> bool {
        let n = write_u64(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes an `f32`.
    pub fn write_f32(&mut self, value: f32) -> bool {
        let n = write_f32(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes a length-prefixed string.
    pub fn write_string(&mut self, value: &str) -> bool {
        let n = write_string(self.buffer, self.position, value);
        self.advance(n)
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        let Some(dst) = self.buffer.get_mut(self.position..self.position + bytes.len()) else {
            return false;
        };
        dst.copy_from_slice(bytes);
        self.position += bytes.len();
        true
    }
}

/// Cursor that reads fields from a buffer.
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the current offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    #[inline]
    fn advance<T>(&mut self, read: Option<(T, usize)>) -> Option<T> {
        let (value, n) = read?;
        self.position += n;
        Some(value)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let read = read_u8(self.buffer, self.position);
        self.advance(read)
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Option<u16> {
        let read = read_u16(self.buffer, self.position);
        self.advance(read)
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Option<u32> {
        let read = read_u32(self.buffer, self.position);
        self.advance(read)
    }

    /// Reads a big-endian `u64`.
    pub fn read_u64(&mut self) -> Option<u64> {
        let read = read_u64(self.buffer, self.position);
        self.advance(read)
    }

    /// Reads an `f32`.
    pub fn read_f32(&mut self) -> Option<f32> {
        let read = read_f32(self.buffer, self.position);
        self.advance(read)
    }

    /// Reads a length-prefixed string of at most `capacity` bytes.
    pub fn read_string(&mut self, capacity: usize) -> Option<String> {
        let read = read_string(self.buffer, self.position, capacity);
        self.advance(read)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.buffer.get(self.position..self.position.checked_add(len)?)?;
        self.position += len;
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_u32_is_big_endian() {
        let mut buf = [0u8; 4];
        assert_eq!(write_u32(&mut buf, 0, 0x0102_0304), Some(4));
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_u64_byte_order() {
        let mut buf = [0u8; 8];
        write_u64(&mut buf, 0, 0x0102_0304_0506_0708);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_primitives_at_offset() {
        let mut rng = rand::thread_rng();
        let mut buf = [0u8; 32];

        for _ in 0..200 {
            let offset = rng.gen_range(0..8);
            let a: u8 = rng.gen();
            let b: u16 = rng.gen();
            let c: u32 = rng.gen();
            let d: u64 = rng.gen();
            let e: f32 = rng.gen();

            let mut at = offset;
            at += write_u8(&mut buf, at, a).unwrap();
            at += write_u16(&mut buf, at, b).unwrap();
            at += write_u32(&mut buf, at, c).unwrap();
            at += write_u64(&mut buf, at, d).unwrap();
            write_f32(&mut buf, at, e).unwrap();

            assert_eq!(read_u8(&buf, offset), Some((a, 1)));
            assert_eq!(read_u16(&buf, offset + 1), Some((b, 2)));
            assert_eq!(read_u32(&buf, offset + 3), Some((c, 4)));
            assert_eq!(read_u64(&buf, offset + 7), Some((d, 8)));
            assert_eq!(read_f32(&buf, offset + 15), Some((e, 4)));
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let mut buf = [0u8; 3];
        assert_eq!(write_u32(&mut buf, 0, 1), None);
        assert_eq!(write_u8(&mut buf, 3, 1), None);
        assert_eq!(write_u16(&mut buf, usize::MAX, 1), None);
        assert_eq!(read_u32(&buf, 0), None);
        assert_eq!(read_u16(&buf, 2), None);
        // Failed write leaves the buffer untouched
        assert_eq!(buf, [0, 0, 0]);
    }

    #[test]
    fn test_string_round_trip() {
        let mut buf = [0u8; 64];
        assert_eq!(write_string(&mut buf, 3, "kiln"), Some(6));
        assert_eq!(&buf[3..9], &[0, 4, b'k', b'i', b'l', b'n']);
        assert_eq!(read_string(&buf, 3, 64), Some(("kiln".to_owned(), 6)));
    }

    #[test]
    fn test_empty_string() {
        let mut buf = [0xFFu8; 2];
        assert_eq!(write_string(&mut buf, 0, ""), Some(2));
        assert_eq!(read_string(&buf, 0, 0), Some((String::new(), 2)));
    }

    #[test]
    fn test_string_truncated_to_capacity() {
        let mut buf = [0u8; 16];
        write_string(&mut buf, 0, "abcdef");

        // Truncated value, but the whole field is consumed
        assert_eq!(read_string(&buf, 0, 3), Some(("abc".to_owned(), 8)));
    }

    #[test]
    fn test_string_truncation_respects_char_boundary() {
        let mut buf = [0u8; 16];
        write_string(&mut buf, 0, "aé");
        assert_eq!(read_string(&buf, 0, 2), Some(("a".to_owned(), 5)));
    }

    #[test]
    fn test_string_field_cut_short() {
        let buf = [0u8, 10, b'a', b'b'];
        assert_eq!(read_string(&buf, 0, 64), None);
    }

    #[test]
    fn test_string_too_long_for_prefix() {
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        let mut buf = vec![0u8; long.len() + 2];
        assert_eq!(write_string(&mut buf, 0, &long), None);
    }

    #[test]
    fn test_cursor_round_trip() {
        let mut storage = [0u8; 64];
        let mut writer = WireWriter::new(&mut storage);
        assert!(writer.write_u8(7));
        assert!(writer.write_u16(0xBEEF));
        assert!(writer.write_string("player"));
        assert!(writer.write_f32(1.5));
        assert!(writer.write_bytes(&[9, 9]));
        let written = writer.len();

        let mut reader = WireReader::new(&storage[..written]);
        assert_eq!(reader.read_u8(), Some(7));
        assert_eq!(reader.read_u16(), Some(0xBEEF));
        assert_eq!(reader.read_string(32).as_deref(), Some("player"));
        assert_eq!(reader.read_f32(), Some(1.5));
        assert_eq!(reader.read_bytes(2), Some(&[9u8, 9][..]));
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u8(), None);
    }

    #[test]
    fn test_cursor_refuses_overflow() {
        let mut storage = [0u8; 5];
        let mut writer = WireWriter::new(&mut storage);
        assert!(writer.write_u32(1));
        assert!(!writer.write_u16(2));
        assert_eq!(writer.len(), 4);
        assert_eq!(writer.remaining(), 1);
    }
}
