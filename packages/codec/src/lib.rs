//! The length-prefixed wire format used across the precompile call boundary.
//!
//! Every precompile method receives its arguments through a single `bytes`
//! parameter. Variable-length fields are preceded by their length as an
//! 8-byte big-endian integer; fixed-width numeric fields are emitted as raw
//! 8-byte big-endian integers with no prefix. Fields are concatenated in the
//! operation's declared order with no padding or separators.
#![deny(missing_docs, clippy::nursery, clippy::pedantic, warnings)]

/// Width of a length prefix and of a fixed-width numeric field, in bytes.
pub const WORD: usize = 8;

/// Errors produced while decoding a precompile input buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The buffer ended before the announced field length was satisfied.
    #[error("truncated input: needed {needed} more bytes at offset {offset}")]
    TruncatedInput {
        /// Offset at which the shortfall was detected.
        offset: usize,
        /// Number of missing bytes.
        needed: usize,
    },

    /// The buffer was not fully consumed by the declared field sequence.
    #[error("trailing bytes: {remaining} bytes left after the last field")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// A field declared as a string was not valid UTF-8.
    #[error("invalid utf-8 in string field at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the offending field's value.
        offset: usize,
    },
}

/// Shape of a single field in an operation's input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    /// Variable-length bytes, preceded by an 8-byte big-endian length.
    Bytes,
    /// Fixed-width unsigned integer, raw 8-byte big-endian, no prefix.
    U64,
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Variable-length bytes.
    Bytes(Vec<u8>),
    /// Fixed-width unsigned integer.
    U64(u64),
}

/// A cursor over a precompile input buffer.
///
/// Reads fields in declaration order and enforces the strict consumption
/// policy: announced lengths are bounded by the remaining buffer before any
/// allocation, and [`Decoder::finish`] rejects unconsumed bytes.
#[derive(Debug)]
pub struct Decoder<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.input.len() - self.offset;
        if remaining < n {
            return Err(CodecError::TruncatedInput {
                offset: self.offset,
                needed: n - remaining,
            });
        }
        let out = &self.input[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Reads a length-prefixed byte field.
    ///
    /// # Errors
    /// Returns [`CodecError::TruncatedInput`] if the prefix or the announced
    /// value length exceeds the remaining buffer.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u64()?;
        // The announced length is bounded by the remaining buffer before any
        // slicing, so a hostile prefix cannot trigger an oversized read.
        let len = usize::try_from(len).map_err(|_| CodecError::TruncatedInput {
            offset: self.offset,
            needed: usize::MAX,
        })?;
        self.take(len)
    }

    /// Reads a length-prefixed UTF-8 string field.
    ///
    /// # Errors
    /// Returns [`CodecError::TruncatedInput`] on a short buffer and
    /// [`CodecError::InvalidUtf8`] if the value is not valid UTF-8.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let value_offset = self.offset + WORD;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8 {
            offset: value_offset,
        })
    }

    /// Reads a fixed-width 8-byte big-endian integer.
    ///
    /// # Errors
    /// Returns [`CodecError::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let raw = self.take(WORD)?;
        let mut word = [0u8; WORD];
        word.copy_from_slice(raw);
        Ok(u64::from_be_bytes(word))
    }

    /// Asserts that the buffer has been fully consumed.
    ///
    /// # Errors
    /// Returns [`CodecError::TrailingBytes`] if any bytes remain.
    pub const fn finish(&self) -> Result<(), CodecError> {
        let remaining = self.input.len() - self.offset;
        if remaining > 0 {
            return Err(CodecError::TrailingBytes { remaining });
        }
        Ok(())
    }
}

/// Decodes `input` against a declared field layout.
///
/// # Errors
/// Returns [`CodecError::TruncatedInput`] if the buffer is exhausted before
/// the layout, and [`CodecError::TrailingBytes`] if bytes remain after it.
pub fn decode(input: &[u8], specs: &[FieldSpec]) -> Result<Vec<Field>, CodecError> {
    let mut decoder = Decoder::new(input);
    let mut fields = Vec::with_capacity(specs.len());
    for spec in specs {
        let field = match spec {
            FieldSpec::Bytes => Field::Bytes(decoder.read_bytes()?.to_vec()),
            FieldSpec::U64 => Field::U64(decoder.read_u64()?),
        };
        fields.push(field);
    }
    decoder.finish()?;
    Ok(fields)
}

/// Encodes a sequence of fields into the wire format.
///
/// `decode(encode(fields), specs)` returns `fields` for the matching spec
/// sequence; this is the codec's round-trip law.
#[must_use]
pub fn encode(fields: &[Field]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in fields {
        match field {
            Field::Bytes(bytes) => {
                out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Field::U64(value) => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
    out
}

/// Builder counterpart of [`Decoder`], mainly used by tests and callers
/// assembling precompile inputs.
#[derive(Debug, Default)]
pub struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { out: Vec::new() }
    }

    /// Appends a length-prefixed byte field.
    #[must_use]
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.out.extend_from_slice(&(value.len() as u64).to_be_bytes());
        self.out.extend_from_slice(value);
        self
    }

    /// Appends a length-prefixed UTF-8 string field.
    #[must_use]
    pub fn string(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    /// Appends a fixed-width 8-byte big-endian integer.
    #[must_use]
    pub fn u64(mut self, value: u64) -> Self {
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Returns the assembled buffer.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{decode, encode, CodecError, Decoder, Encoder, Field, FieldSpec};

    fn sample_fields() -> Vec<Field> {
        vec![
            Field::Bytes(b"07-tendermint-0".to_vec()),
            Field::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
            Field::Bytes(Vec::new()),
            Field::U64(3600),
        ]
    }

    const SAMPLE_SPECS: [FieldSpec; 4] = [
        FieldSpec::Bytes,
        FieldSpec::Bytes,
        FieldSpec::Bytes,
        FieldSpec::U64,
    ];

    #[test]
    fn round_trip() {
        let fields = sample_fields();
        let encoded = encode(&fields);
        let decoded = decode(&encoded, &SAMPLE_SPECS).unwrap();
        assert_eq!(fields, decoded);
    }

    #[test]
    fn round_trip_empty() {
        assert_eq!(Vec::<Field>::new(), decode(&encode(&[]), &[]).unwrap());
    }

    #[test]
    fn truncation_always_detected() {
        // Removing any non-empty suffix of a valid buffer must surface as a
        // truncation error, never as a silent wrong-field read.
        let encoded = encode(&sample_fields());
        for cut in 0..encoded.len() {
            let err = decode(&encoded[..cut], &SAMPLE_SPECS).unwrap_err();
            assert!(
                matches!(err, CodecError::TruncatedInput { .. }),
                "cut at {cut} produced {err:?}"
            );
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut encoded = encode(&sample_fields());
        encoded.push(0);
        let err = decode(&encoded, &SAMPLE_SPECS).unwrap_err();
        assert_eq!(CodecError::TrailingBytes { remaining: 1 }, err);
    }

    #[rstest]
    #[case::length_exceeds_buffer(u64::MAX)]
    #[case::length_off_by_one(5)]
    fn hostile_length_prefix_is_bounded(#[case] announced: u64) {
        // 4 value bytes available, more announced: must fail before any
        // allocation sized by the prefix.
        let mut input = announced.to_be_bytes().to_vec();
        input.extend_from_slice(&[1, 2, 3, 4]);
        let err = decode(&input, &[FieldSpec::Bytes]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedInput { .. }));
    }

    #[test]
    fn string_fields() {
        let input = Encoder::new().string("connection-0").build();
        let mut decoder = Decoder::new(&input);
        assert_eq!("connection-0", decoder.read_string().unwrap());
        decoder.finish().unwrap();
    }

    #[test]
    fn invalid_utf8_in_string_field() {
        let input = Encoder::new().bytes(&[0xff, 0xfe]).build();
        let mut decoder = Decoder::new(&input);
        let err = decoder.read_string().unwrap_err();
        assert_eq!(CodecError::InvalidUtf8 { offset: 8 }, err);
    }

    #[test]
    fn fixed_width_field_has_no_prefix() {
        let input = Encoder::new().u64(42).build();
        assert_eq!(8, input.len());
        let mut decoder = Decoder::new(&input);
        assert_eq!(42, decoder.read_u64().unwrap());
        decoder.finish().unwrap();
    }
}
