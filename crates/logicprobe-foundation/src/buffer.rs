use crate::error::ProtocolError;

/// Capacity of the line-oriented command buffer, matching the probe's
/// fixed-length text protocol.
pub const CMD_BUF_CAPACITY: usize = 20;

/// Capacity of the response staging buffer. Slightly wider than the
/// command buffer so the end-of-run sample-count report always fits.
pub const RESPONSE_BUF_CAPACITY: usize = 32;

/// Fixed-capacity byte sequence with a write cursor.
///
/// Backs both the command accumulator and the response staging buffer.
/// Overflow is rejected, never truncated: pushing past capacity yields
/// a `ProtocolError` and leaves the caller to discard the partial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Default for BoundedBuf<N> {
    fn default() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> BoundedBuf<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Result<(), ProtocolError> {
        if self.len == N {
            return Err(ProtocolError::Overflow { capacity: N });
        }
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if self.len + bytes.len() > N {
            return Err(ProtocolError::Overflow { capacity: N });
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Drop the first `count` bytes, shifting the remainder down. Used
    /// when a non-blocking write accepts only a prefix.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len);
        self.buf.copy_within(count..self.len, 0);
        self.len -= count;
    }
}
