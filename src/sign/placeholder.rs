//! Fixed-width placeholder objects for `/ByteRange` and `/Contents`.
//!
//! Both placeholders are serialized before their final values are known:
//! the signature dictionary goes out with a zero `/ByteRange` and an
//! all-zero `/Contents` reservation, and once the update is fully
//! serialized the real values are patched in over the recorded offsets.
//! Width constancy is the invariant that makes this sound: no patch may
//! shift a single subsequent byte.

use crate::error::WriterError;
use crate::writer::Serializer;

/// The largest byte offset an 8-digit zero-padded field can carry. Files
/// larger than this cannot be signed and must fail loudly.
pub const MAX_FILE_SIZE: u64 = 99_999_999;

/// Serialized width of the byte-range token: `[ ` + four 8-digit fields
/// separated by single spaces + ` ]`.
pub const BYTE_RANGE_WIDTH: usize = 39;

/// Default number of ASCII `0` bytes reserved between the angle brackets
/// of `/Contents`.
pub const DEFAULT_BYTES_RESERVED: usize = 8192;

/// The `/ByteRange` array, serialized at fixed width so it can be
/// rewritten in place.
#[derive(Debug, Default)]
pub struct ByteRangePlaceholder {
    first_region_len: u64,
    second_region_offset: u64,
    second_region_len: u64,
    offset: Option<usize>,
    filled: bool,
}

impl ByteRangePlaceholder {
    /// Creates a placeholder with all four values zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self) -> String {
        format!(
            "[ {:08} {:08} {:08} {:08} ]",
            0, self.first_region_len, self.second_region_offset, self.second_region_len,
        )
    }

    /// Serializes the current values and records the byte offset of the
    /// token. Offsets refer to the most recent serialization.
    pub(crate) fn write(&mut self, out: &mut Serializer) {
        self.offset = Some(out.position());
        let token = self.token();
        debug_assert_eq!(token.len(), BYTE_RANGE_WIDTH);
        out.write_str(&token);
    }

    /// One-shot fill: computes `(0, sig_start, sig_end, eof - sig_end)`
    /// and rewrites the token in place in `buffer`.
    pub fn fill(
        &mut self,
        buffer: &mut [u8],
        sig_start: u64,
        sig_end: u64,
        eof: u64,
    ) -> Result<(), WriterError> {
        if self.filled {
            return Err(WriterError::Placeholder(
                "byte range offsets already filled".to_string(),
            ));
        }
        let offset = self.offset.ok_or_else(|| {
            WriterError::Placeholder(
                "could not determine where to write the /ByteRange value".to_string(),
            )
        })?;
        if eof > MAX_FILE_SIZE {
            return Err(WriterError::FileTooLarge(eof, MAX_FILE_SIZE));
        }
        if sig_start > sig_end || sig_end > eof {
            return Err(WriterError::Placeholder(format!(
                "inconsistent signature span {}..{} in a file of {} bytes",
                sig_start, sig_end, eof
            )));
        }

        self.first_region_len = sig_start;
        self.second_region_offset = sig_end;
        self.second_region_len = eof - sig_end;

        let token = self.token();
        debug_assert_eq!(token.len(), BYTE_RANGE_WIDTH);
        let end = offset + BYTE_RANGE_WIDTH;
        if end > buffer.len() {
            return Err(WriterError::Placeholder(
                "recorded /ByteRange offset lies outside the buffer".to_string(),
            ));
        }
        buffer[offset..end].copy_from_slice(token.as_bytes());
        self.filled = true;
        Ok(())
    }

    /// Returns the four values in array order.
    pub fn values(&self) -> [u64; 4] {
        [
            0,
            self.first_region_len,
            self.second_region_offset,
            self.second_region_len,
        ]
    }
}

/// The `/Contents` reservation: `<`, a run of ASCII zeros, `>`.
///
/// After serialization the recorded span covers the full hex literal
/// including both brackets, so `span() = (sig_start, sig_end)` with
/// `sig_start` at the `<` and `sig_end` one past the `>`.
#[derive(Debug)]
pub struct ContentsPlaceholder {
    bytes_reserved: usize,
    span: Option<(usize, usize)>,
}

impl ContentsPlaceholder {
    /// Creates a placeholder reserving the given number of hex characters,
    /// or [`DEFAULT_BYTES_RESERVED`] if none is given.
    pub fn new(bytes_reserved: Option<usize>) -> Self {
        Self {
            bytes_reserved: bytes_reserved.unwrap_or(DEFAULT_BYTES_RESERVED),
            span: None,
        }
    }

    /// Returns the reserved payload size in bytes (hex characters).
    pub fn bytes_reserved(&self) -> usize {
        self.bytes_reserved
    }

    /// Serializes the reservation and records its span. Spans refer to the
    /// most recent serialization.
    pub(crate) fn write(&mut self, out: &mut Serializer) {
        let start = out.position();
        out.write_bytes(b"<");
        out.write_bytes(&vec![b'0'; self.bytes_reserved]);
        out.write_bytes(b">");
        self.span = Some((start, out.position()));
    }

    /// Returns the recorded `(sig_start, sig_end)` span.
    pub fn span(&self) -> Result<(usize, usize), WriterError> {
        self.span.ok_or_else(|| {
            WriterError::Placeholder("no /Contents offsets available".to_string())
        })
    }

    /// Writes the hex-encoded signature into the reserved region of
    /// `buffer`; the rest of the reservation keeps its ASCII zeros.
    pub fn fill(&self, buffer: &mut [u8], hex_signature: &[u8]) -> Result<(), WriterError> {
        let (start, end) = self.span()?;
        if hex_signature.len() > self.bytes_reserved {
            return Err(WriterError::Placeholder(format!(
                "signature of {} bytes exceeds the {} reserved",
                hex_signature.len(),
                self.bytes_reserved
            )));
        }
        if end > buffer.len() {
            return Err(WriterError::Placeholder(
                "recorded /Contents span lies outside the buffer".to_string(),
            ));
        }
        // +1 skips the '<'
        let payload_start = start + 1;
        buffer[payload_start..payload_start + hex_signature.len()]
            .copy_from_slice(hex_signature);
        Ok(())
    }
}

impl Default for ContentsPlaceholder {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_width_invariance() {
        let mut ser = Serializer::new();
        let mut placeholder = ByteRangePlaceholder::new();
        placeholder.write(&mut ser);
        let zeroed = ser.into_bytes();
        assert_eq!(zeroed.len(), BYTE_RANGE_WIDTH);
        assert_eq!(&zeroed, b"[ 00000000 00000000 00000000 00000000 ]");

        // extreme legal values keep the width
        let mut buffer = zeroed.clone();
        placeholder
            .fill(&mut buffer, 1, MAX_FILE_SIZE - 1, MAX_FILE_SIZE)
            .unwrap();
        assert_eq!(buffer.len(), BYTE_RANGE_WIDTH);
        assert_eq!(&buffer, b"[ 00000000 00000001 99999998 00000001 ]");
    }

    #[test]
    fn test_byte_range_double_fill_fails() {
        let mut ser = Serializer::new();
        let mut placeholder = ByteRangePlaceholder::new();
        placeholder.write(&mut ser);
        let mut buffer = ser.into_bytes();
        placeholder.fill(&mut buffer, 10, 20, 30).unwrap();
        assert!(placeholder.fill(&mut buffer, 10, 20, 30).is_err());
    }

    #[test]
    fn test_byte_range_fill_without_offset_fails() {
        let mut placeholder = ByteRangePlaceholder::new();
        let mut buffer = vec![0u8; BYTE_RANGE_WIDTH];
        assert!(placeholder.fill(&mut buffer, 0, 0, 0).is_err());
    }

    #[test]
    fn test_byte_range_rejects_oversized_file() {
        let mut ser = Serializer::new();
        let mut placeholder = ByteRangePlaceholder::new();
        placeholder.write(&mut ser);
        let mut buffer = ser.into_bytes();
        let result = placeholder.fill(&mut buffer, 10, 20, MAX_FILE_SIZE + 1);
        assert!(matches!(result, Err(WriterError::FileTooLarge(_, _))));
    }

    #[test]
    fn test_contents_span_and_fill() {
        let mut ser = Serializer::new();
        ser.write_str("/Contents ");
        let mut placeholder = ContentsPlaceholder::new(Some(16));
        placeholder.write(&mut ser);
        let mut buffer = ser.into_bytes();

        let (start, end) = placeholder.span().unwrap();
        assert_eq!(buffer[start], b'<');
        assert_eq!(buffer[end - 1], b'>');
        assert_eq!(end - start, 16 + 2);

        placeholder.fill(&mut buffer, b"deadbeef").unwrap();
        assert_eq!(&buffer[start..end], b"<deadbeef00000000>");
    }

    #[test]
    fn test_contents_overflow_fails() {
        let mut ser = Serializer::new();
        let mut placeholder = ContentsPlaceholder::new(Some(4));
        placeholder.write(&mut ser);
        let mut buffer = ser.into_bytes();
        assert!(placeholder.fill(&mut buffer, b"deadbeef").is_err());
    }

    #[test]
    fn test_contents_default_reservation() {
        let placeholder = ContentsPlaceholder::default();
        assert_eq!(placeholder.bytes_reserved(), DEFAULT_BYTES_RESERVED);
    }
}
