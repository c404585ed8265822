//! 24-bit sequence numbers
//!
//! Sequence numbers occupy three header bytes (high, med, low).  The space is
//! `0..=SeqNum::MAX` and does not wrap: a connection can carry at most 2^24
//! packets.

use std::fmt;

/// Packet sequence number (24 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqNum(u32);

impl SeqNum {
    /// Largest representable sequence number (2^24 - 1)
    pub const MAX: SeqNum = SeqNum(0x00ff_ffff);

    /// First sequence number of every connection
    pub const ZERO: SeqNum = SeqNum(0);

    /// Build from an integer; `None` when it does not fit in 24 bits
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX.0).then_some(SeqNum(value))
    }

    /// Integer value
    pub fn get(self) -> u32 {
        self.0
    }

    /// Following sequence number; `None` past `SeqNum::MAX`
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// Split into (high, med, low) bytes, base 256
    pub fn encode(self) -> [u8; 3] {
        let [_, high, med, low] = self.0.to_be_bytes();
        [high, med, low]
    }

    /// Inverse of [`SeqNum::encode`]: `high * 65536 + med * 256 + low`
    pub fn decode(bytes: [u8; 3]) -> Self {
        let [high, med, low] = bytes;
        SeqNum(u32::from(high) * 65536 + u32::from(med) * 256 + u32::from(low))
    }

    /// Decode fields that were stored as signed bytes.
    ///
    /// A negative byte `b` stands for `256 + b`; reinterpreting the bit
    /// pattern as `u8` performs exactly that normalization.
    pub fn from_signed(bytes: [i8; 3]) -> Self {
        Self::decode(bytes.map(|b| b as u8))
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SeqNum> for u32 {
    fn from(seq: SeqNum) -> u32 {
        seq.0
    }
}
