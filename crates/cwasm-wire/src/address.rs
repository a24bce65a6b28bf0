use std::fmt;

/// How a cursor addresses its stream.
///
/// Byte cursors move in whole bytes. Bit cursors can stop between bits and
/// keep the partially consumed (or partially assembled) byte cached until
/// they reach the next byte boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamKind {
    #[default]
    Byte,
    Bit,
}

/// A stream position at bit granularity.
///
/// `byte` is the byte address, `bit` the number of bits (0–7) already
/// consumed from that byte, counted from the most significant end.
/// Ordering is lexicographic, so a `BitAddress` compares the way the
/// positions appear in the stream.
///
/// ```text
///   byte 4          byte 5
///   ┌─┬─┬─┬─┬─┬─┬─┬─┐┌─┬─┬─┬─┬─┬─┬─┬─┐
///   │ │ │ │ │ │ │ │ ││ │ │ │ │ │ │ │ │
///   └─┴─┴─┴─┴─┴─┴─┴─┘└─┴─┴─┴─┴─┴─┴─┴─┘
///    ^                     ^
///    (4, 0)                (5, 3)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitAddress {
    byte: usize,
    bit: u8,
}

impl BitAddress {
    /// The largest representable address. Used as the bound of a stream
    /// whose EOF is not yet known.
    pub const MAX: Self = Self {
        byte: usize::MAX,
        bit: 0,
    };

    /// Build an address, carrying any `bit >= 8` into the byte part.
    #[must_use]
    pub const fn new(byte: usize, bit: u8) -> Self {
        Self {
            byte: byte + (bit / 8) as usize,
            bit: bit % 8,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: usize) -> Self {
        Self { byte, bit: 0 }
    }

    #[must_use]
    pub const fn byte(self) -> usize {
        self.byte
    }

    #[must_use]
    pub const fn bit(self) -> u8 {
        self.bit
    }

    #[must_use]
    pub const fn is_byte_aligned(self) -> bool {
        self.bit == 0
    }

    /// First byte address at or after this position.
    #[must_use]
    pub const fn ceil_byte(self) -> usize {
        if self.bit == 0 { self.byte } else { self.byte + 1 }
    }
}

impl From<usize> for BitAddress {
    fn from(byte: usize) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bit == 0 {
            write!(f, "{}", self.byte)
        } else {
            write!(f, "{}:{}", self.byte, self.bit)
        }
    }
}
