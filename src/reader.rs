//! A bounds-checked cursor over an untrusted byte buffer.
//!
//! Every read either yields exactly the requested number of bytes or fails with
//! [WebauthnError::TruncatedInput]. Nothing is padded and nothing is silently truncated.

use serde::Deserialize;

use crate::error::WebauthnError;

/// A forward-only reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, position: 0 }
    }

    /// How many bytes have been consumed.
    pub fn position(&self) -> usize {
        self.position
    }

    /// How many bytes are left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read exactly `n` bytes.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8], WebauthnError> {
        let end = self
            .position
            .checked_add(n)
            .ok_or(WebauthnError::TruncatedInput)?;
        let out = self
            .data
            .get(self.position..end)
            .ok_or(WebauthnError::TruncatedInput)?;
        self.position = end;
        Ok(out)
    }

    /// Read exactly `N` bytes into a fixed size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WebauthnError> {
        let mut out = [0; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, WebauthnError> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Read a big-endian u16.
    pub fn read_u16_be(&mut self) -> Result<u16, WebauthnError> {
        self.read_array::<2>().map(u16::from_be_bytes)
    }

    /// Read a big-endian u32.
    pub fn read_u32_be(&mut self) -> Result<u32, WebauthnError> {
        self.read_array::<4>().map(u32::from_be_bytes)
    }

    /// Consume everything left. This may be empty.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let out = &self.data[self.position..];
        self.position = self.data.len();
        out
    }

    /// Decode exactly one CBOR item from the current position and advance past it.
    /// Trailing bytes are left for the caller.
    pub fn read_cbor(&mut self) -> Result<serde_cbor_2::Value, WebauthnError> {
        let rest = &self.data[self.position..];
        if rest.is_empty() {
            return Err(WebauthnError::TruncatedInput);
        }
        let mut de = serde_cbor_2::Deserializer::from_slice(rest);
        let value = serde_cbor_2::Value::deserialize(&mut de).map_err(|e| {
            trace!(?e, "cbor item decode failed");
            if e.is_eof() {
                WebauthnError::TruncatedInput
            } else {
                WebauthnError::ParseCBORFailure(e)
            }
        })?;
        self.position += de.byte_offset();
        Ok(value)
    }
}
