use std::convert::Infallible;

use crate::error::WireError;

/// Payload bits carried by one LEB128 chunk.
pub const CHUNK_BITS: u32 = 7;

/// Maximum number of bytes a 64-bit LEB128 value can occupy.
/// ceil(64 / 7) = 10 bytes.
pub const MAX_LEB128_BYTES: usize = 10;

const PAYLOAD: u8 = 0x7F;
const CONTINUE: u8 = 0x80;
const SIGN: u8 = 0x40;

/// Number of chunks needed to hold a `bits`-wide word: `ceil(bits / 7)`.
#[must_use]
pub const fn chunks_in_word(bits: u32) -> u32 {
    bits.div_ceil(CHUNK_BITS)
}

/// When the shared emission loop stops.
///
/// All four LEB128 flavours run the same loop: take the low 7 bits, shift,
/// decide whether this was the last chunk. Only the decision differs.
///
/// | Variant          | Last chunk when                                   |
/// |------------------|---------------------------------------------------|
/// | `Unsigned`       | remaining value is 0                              |
/// | `SignedPositive` | remaining value is 0 and chunk bit 6 is clear     |
/// | `SignedNegative` | remaining value is -1 and chunk bit 6 is set      |
/// | `Fixed`          | `chunks` chunks have been emitted                 |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Unsigned,
    SignedPositive,
    SignedNegative,
    Fixed { chunks: u32 },
}

impl Termination {
    /// Signed termination matching the sign of `value`.
    #[must_use]
    pub fn for_signed(value: i64) -> Self {
        if value < 0 {
            Self::SignedNegative
        } else {
            Self::SignedPositive
        }
    }

    /// Padded termination for a `bits`-wide word.
    #[must_use]
    pub fn fixed(bits: u32) -> Self {
        Self::Fixed {
            chunks: chunks_in_word(bits),
        }
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn shift(self, value: u64) -> u64 {
        match self {
            Self::SignedPositive | Self::SignedNegative => ((value as i64) >> CHUNK_BITS) as u64,
            Self::Unsigned | Self::Fixed { .. } => value >> CHUNK_BITS,
        }
    }

    fn is_last(self, remaining: u64, chunk: u8, emitted: u32) -> bool {
        match self {
            Self::Unsigned => remaining == 0,
            Self::SignedPositive => remaining == 0 && chunk & SIGN == 0,
            Self::SignedNegative => remaining == u64::MAX && chunk & SIGN != 0,
            Self::Fixed { chunks } => emitted >= chunks,
        }
    }
}

/// Emit `value` as LEB128, one byte at a time, through `emit`.
///
/// Signed values are passed as their two's-complement bit pattern
/// (`i64 as u64`). Returns the number of bytes emitted. Stops at the first
/// error from `emit`; bytes already emitted stay emitted.
///
/// # Errors
///
/// Whatever `emit` returns.
pub fn emit_leb128<E>(
    mut value: u64,
    termination: Termination,
    mut emit: impl FnMut(u8) -> Result<(), E>,
) -> Result<usize, E> {
    let mut emitted = 0u32;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let chunk = (value as u8) & PAYLOAD;
        value = termination.shift(value);
        emitted += 1;
        if termination.is_last(value, chunk, emitted) {
            emit(chunk)?;
            return Ok(emitted as usize);
        }
        emit(chunk | CONTINUE)?;
    }
}

fn encode_into(value: u64, termination: Termination, buf: &mut [u8]) -> usize {
    let mut i = 0;
    let result: Result<usize, Infallible> = emit_leb128(value, termination, |byte| {
        buf[i] = byte;
        i += 1;
        Ok(())
    });
    match result {
        Ok(n) => n,
        Err(never) => match never {},
    }
}

/// Slice form of [`emit_leb128`] with [`Termination::Unsigned`]: the
/// shortest encoding, ending on the first chunk that leaves no high bits.
/// Returns the length, at most [`MAX_LEB128_BYTES`].
///
/// | Value   | Bytes      |
/// |---------|------------|
/// | 0       | `00`       |
/// | 127     | `7F`       |
/// | 128     | `80 01`    |
/// | 300     | `AC 02`    |
/// | 16384   | `80 80 01` |
///
/// # Panics
///
/// Panics if `buf` is too short for the encoding.
pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    encode_into(value, Termination::Unsigned, buf)
}

/// Encode an `i64` as signed LEB128.
///
/// | Value | Encoded bytes  |
/// |-------|----------------|
/// | 0     | `[0x00]`       |
/// | -1    | `[0x7F]`       |
/// | 63    | `[0x3F]`       |
/// | 64    | `[0xC0, 0x00]` |
/// | -64   | `[0x40]`       |
/// | -65   | `[0xBF, 0x7F]` |
///
/// # Panics
///
/// Panics if `buf` is too short; 10 bytes always suffice.
#[allow(clippy::cast_sign_loss)]
pub fn encode_signed_varint(value: i64, buf: &mut [u8]) -> usize {
    encode_into(value as u64, Termination::for_signed(value), buf)
}

/// Encode `value` padded to exactly `ceil(bits / 7)` bytes.
///
/// Padding uses redundant continuation chunks, so any LEB128 reader decodes
/// the result. This is the placeholder shape used for block sizes that are
/// backpatched later.
///
/// # Panics
///
/// Panics if `buf` is shorter than `ceil(bits / 7)`.
pub fn encode_fixed_varint(value: u64, bits: u32, buf: &mut [u8]) -> usize {
    encode_into(value, Termination::fixed(bits), buf)
}

/// Decode one unsigned 64-bit LEB128 from the front of `buf`, returning
/// the value and how many bytes it took. Bytes after it are left alone.
///
/// # Errors
///
/// - [`WireError::VarintTooLong`] past ten chunks with the continuation
///   bit still set.
/// - [`WireError::VarintOverflow`] when the tenth chunk carries more than
///   the top bit.
/// - [`WireError::UnexpectedEof`] if `buf` ends first.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    decode_with(Leb128Accumulator::unsigned(64), buf)
}

/// Decode a signed LEB128 varint from the provided byte slice.
///
/// # Errors
///
/// As [`decode_varint`].
#[allow(clippy::cast_possible_wrap)]
pub fn decode_signed_varint(buf: &[u8]) -> Result<(i64, usize), WireError> {
    decode_with(Leb128Accumulator::signed(64), buf).map(|(v, n)| (v as i64, n))
}

fn decode_with(mut acc: Leb128Accumulator, buf: &[u8]) -> Result<(u64, usize), WireError> {
    for (i, &byte) in buf.iter().enumerate() {
        if let Some(value) = acc.feed(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(WireError::UnexpectedEof { offset: buf.len() })
}

/// Incremental LEB128 decoder for a `bits`-wide target.
///
/// Bytes are fed one at a time, so a value can straddle any number of
/// input buffers: the partial value lives here between calls. After a
/// value completes or fails the accumulator resets itself and can be
/// reused.
///
/// Signed results come back as a sign-extended two's-complement `u64`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leb128Accumulator {
    bits: u32,
    signed: bool,
    value: u64,
    shift: u32,
    count: u32,
}

impl Leb128Accumulator {
    #[must_use]
    pub fn unsigned(bits: u32) -> Self {
        Self::with_sign(bits, false)
    }

    #[must_use]
    pub fn signed(bits: u32) -> Self {
        Self::with_sign(bits, true)
    }

    fn with_sign(bits: u32, signed: bool) -> Self {
        Self {
            bits: bits.clamp(1, 64),
            signed,
            value: 0,
            shift: 0,
            count: 0,
        }
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Chunk limit for the target width.
    #[must_use]
    pub fn max_chunks(&self) -> u32 {
        chunks_in_word(self.bits)
    }

    /// Bytes consumed toward the value in progress.
    #[must_use]
    pub fn chunks_consumed(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.shift = 0;
        self.count = 0;
    }

    /// Consume one byte. Returns the value once its final chunk arrives.
    ///
    /// # Errors
    ///
    /// - [`WireError::VarintTooLong`] if the `max_chunks`-th byte still has
    ///   its continuation bit set.
    /// - [`WireError::VarintOverflow`] if the final chunk sets bits the
    ///   target width cannot hold (for signed targets: bits that are not a
    ///   copy of the sign bit).
    pub fn feed(&mut self, byte: u8) -> Result<Option<u64>, WireError> {
        let max_chunks = self.max_chunks();
        let chunk = byte & PAYLOAD;
        self.count += 1;

        if byte & CONTINUE != 0 {
            if self.count >= max_chunks {
                self.reset();
                return Err(WireError::VarintTooLong { max_chunks });
            }
            self.value |= u64::from(chunk) << self.shift;
            self.shift += CHUNK_BITS;
            return Ok(None);
        }

        // shift <= 7 * (max_chunks - 1) < bits, so at least one bit is left.
        let allowed = self.bits - self.shift;
        if allowed < CHUNK_BITS {
            let fits = if self.signed {
                let top = chunk >> (allowed - 1);
                top == 0 || top == PAYLOAD >> (allowed - 1)
            } else {
                chunk >> allowed == 0
            };
            if !fits {
                self.reset();
                return Err(WireError::VarintOverflow { bits: self.bits });
            }
        }

        let mut value = self.value | (u64::from(chunk) << self.shift);
        let width = self.shift + CHUNK_BITS;
        if self.signed && width < 64 && chunk & SIGN != 0 {
            value |= u64::MAX << width;
        }
        self.reset();
        Ok(Some(value))
    }
}
