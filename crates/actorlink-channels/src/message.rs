//! Little-endian reader and writer for typed side-channel payloads.
//!
//! Strings are a 4-byte LE `i32` byte count followed by UTF-8 bytes; float
//! lists are a 4-byte LE `i32` element count followed by LE `f32` values.

use actorlink_core::error::ChannelError;

// ---------------------------------------------------------------------------
// OutgoingMessage
// ---------------------------------------------------------------------------

/// Builder for one side-channel payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    buf: Vec<u8>,
}

impl OutgoingMessage {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(u8::from(value));
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// # Errors
    ///
    /// [`ChannelError::Malformed`] if the string is longer than `i32::MAX` bytes.
    pub fn write_string(&mut self, value: &str) -> Result<&mut Self, ChannelError> {
        let len = length_prefix(value.len(), "string")?;
        self.write_i32(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(self)
    }

    /// # Errors
    ///
    /// [`ChannelError::Malformed`] if the list has more than `i32::MAX` elements.
    pub fn write_f32_list(&mut self, values: &[f32]) -> Result<&mut Self, ChannelError> {
        let len = length_prefix(values.len(), "list")?;
        self.write_i32(len);
        for v in values {
            self.write_f32(*v);
        }
        Ok(self)
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn length_prefix(len: usize, what: &str) -> Result<i32, ChannelError> {
    i32::try_from(len)
        .map_err(|_| ChannelError::Malformed(format!("{what} length {len} exceeds i32::MAX")))
}

// ---------------------------------------------------------------------------
// IncomingMessage
// ---------------------------------------------------------------------------

/// Cursor over one inbound side-channel payload.
#[derive(Debug, Clone)]
pub struct IncomingMessage<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> IncomingMessage<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], ChannelError> {
        if self.remaining() < n {
            return Err(ChannelError::Malformed(format!(
                "need {n} bytes for {what} at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], ChannelError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool, ChannelError> {
        Ok(self.take(1, "bool")?[0] != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, ChannelError> {
        Ok(i32::from_le_bytes(self.take_array("i32")?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ChannelError> {
        Ok(f32::from_le_bytes(self.take_array("f32")?))
    }

    fn read_count(&mut self, what: &str) -> Result<usize, ChannelError> {
        let len = self.read_i32()?;
        usize::try_from(len)
            .map_err(|_| ChannelError::Malformed(format!("negative {what} length {len}")))
    }

    pub fn read_string(&mut self) -> Result<String, ChannelError> {
        let len = self.read_count("string")?;
        let bytes = self.take(len, "string")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ChannelError::Malformed(format!("string is not UTF-8: {e}")))
    }

    pub fn read_f32_list(&mut self) -> Result<Vec<f32>, ChannelError> {
        let len = self.read_count("list")?;
        if self.remaining() < len.saturating_mul(4) {
            return Err(ChannelError::Malformed(format!(
                "list of {len} floats exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        (0..len).map(|_| self.read_f32()).collect()
    }

    /// Consume everything that is left.
    pub fn read_raw(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
