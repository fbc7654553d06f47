use crate::DecodeError;

/// Forward-only reader over an in-memory byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes not consumed yet, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Drops the last `n` bytes from the readable range.
    ///
    /// Used to cut a trailer off the stream before reading up to it.
    pub(crate) fn truncate_end(&mut self, n: usize) {
        let end = self.data.len().saturating_sub(n).max(self.position);
        self.data = &self.data[..end];
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let slice = self
            .data
            .get(self.position..)
            .and_then(|rest| rest.get(..n))
            .ok_or(DecodeError::UnexpectedEndOfInput {
                offset: self.position,
                wanted: n,
                remaining: self.remaining(),
            })?;
        self.position += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut result = [0u8; N];
        result.copy_from_slice(self.read_bytes(N)?);
        Ok(result)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let [byte] = self.read_array()?;
        Ok(byte)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads `n` bytes as text, replacing anything that is not ASCII.
    pub fn read_ascii(&mut self, n: usize) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(n)?;
        Ok(bytes
            .iter()
            .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
            .collect())
    }
}
