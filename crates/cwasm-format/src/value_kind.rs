use std::fmt;

use cwasm_wire::leb128::chunks_in_word;

/// The integer representations a value node can carry.
///
/// ```text
/// ┌────────┬─────────────────┬───────┬────────┬────────────────────────┐
/// │ Opcode │ Variant         │ Width │ Signed │ Encoding               │
/// ├────────┼─────────────────┼───────┼────────┼────────────────────────┤
/// │ 0x10   │ Uint8           │  8    │ no     │ 1 byte                 │
/// │ 0x11   │ Uint32          │ 32    │ no     │ 4 bytes little-endian  │
/// │ 0x12   │ Uint64          │ 64    │ no     │ 8 bytes little-endian  │
/// │ 0x13   │ Varint32        │ 32    │ yes    │ signed LEB128          │
/// │ 0x14   │ Varint64        │ 64    │ yes    │ signed LEB128          │
/// │ 0x15   │ Varuint32       │ 32    │ no     │ LEB128                 │
/// │ 0x16   │ Varuint64       │ 64    │ no     │ LEB128                 │
/// │ 0x17   │ FixedVaruint32  │ 32    │ no     │ LEB128 padded to 5     │
/// │ 0x18   │ FixedVaruint64  │ 64    │ no     │ LEB128 padded to 10    │
/// └────────┴─────────────────┴───────┴────────┴────────────────────────┘
/// ```
///
/// Values travel as `u64`. Signed kinds use the sign-extended
/// two's-complement pattern, so `-1` as `Varint32` is `u64::MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Uint8,
    Uint32,
    Uint64,
    Varint32,
    Varint64,
    Varuint32,
    Varuint64,
    FixedVaruint32,
    FixedVaruint64,
}

impl ValueKind {
    pub const ALL: [Self; 9] = [
        Self::Uint8,
        Self::Uint32,
        Self::Uint64,
        Self::Varint32,
        Self::Varint64,
        Self::Varuint32,
        Self::Varuint64,
        Self::FixedVaruint32,
        Self::FixedVaruint64,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Varint32 => "varint32",
            Self::Varint64 => "varint64",
            Self::Varuint32 => "varuint32",
            Self::Varuint64 => "varuint64",
            Self::FixedVaruint32 => "fixed_varuint32",
            Self::FixedVaruint64 => "fixed_varuint64",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    #[must_use]
    pub fn bit_width(self) -> u32 {
        match self {
            Self::Uint8 => 8,
            Self::Uint32 | Self::Varint32 | Self::Varuint32 | Self::FixedVaruint32 => 32,
            Self::Uint64 | Self::Varint64 | Self::Varuint64 | Self::FixedVaruint64 => 64,
        }
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Varint32 | Self::Varint64)
    }

    #[must_use]
    pub fn is_leb128(self) -> bool {
        !matches!(self, Self::Uint8 | Self::Uint32 | Self::Uint64)
    }

    /// Longest encoding of any value of this kind, in bytes.
    #[must_use]
    pub fn max_encoded_len(self) -> usize {
        if self.is_leb128() {
            chunks_in_word(self.bit_width()) as usize
        } else {
            self.bit_width() as usize / 8
        }
    }

    /// True when `value` is representable in this kind.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub fn fits(self, value: u64) -> bool {
        let bits = self.bit_width();
        if bits == 64 {
            return true;
        }
        if self.is_signed() {
            let signed = value as i64;
            i64::from(signed as i32) == signed
        } else {
            value >> bits == 0
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ValueKind::from_name("float32"), None);
    }

    #[test]
    fn encoded_lengths() {
        assert_eq!(ValueKind::Uint8.max_encoded_len(), 1);
        assert_eq!(ValueKind::Uint32.max_encoded_len(), 4);
        assert_eq!(ValueKind::Uint64.max_encoded_len(), 8);
        assert_eq!(ValueKind::Varuint32.max_encoded_len(), 5);
        assert_eq!(ValueKind::FixedVaruint64.max_encoded_len(), 10);
    }

    #[test]
    #[allow(clippy::cast_sign_loss)]
    fn range_checks() {
        assert!(ValueKind::Uint8.fits(255));
        assert!(!ValueKind::Uint8.fits(256));
        assert!(ValueKind::Varuint32.fits(u64::from(u32::MAX)));
        assert!(!ValueKind::Varuint32.fits(1 << 32));
        assert!(ValueKind::Varint32.fits(-1i64 as u64));
        assert!(ValueKind::Varint32.fits(i64::from(i32::MIN) as u64));
        assert!(!ValueKind::Varint32.fits(u64::from(u32::MAX)));
        assert!(ValueKind::Varint64.fits(u64::MAX));
    }
}
