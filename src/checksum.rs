//! 16-bit one's-complement checksum
//!
//! Sum the input as big-endian 16-bit words in a 32-bit accumulator (a
//! trailing odd byte is added as an 8-bit value), fold carries back into the
//! low 16 bits until none remain.  The sender stores the complement of the
//! folded sum; the receiver recomputes the folded sum and requires every bit
//! to differ from the stored value.

/// Folded one's-complement sum of `data`, not complemented.
pub fn sum(data: &[u8]) -> u16 {
    let mut acc: u32 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        acc += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        acc += u32::from(*last);
    }

    while acc >> 16 != 0 {
        acc = (acc & 0xffff) + (acc >> 16);
    }
    acc as u16
}

/// Checksum to embed in a frame.
pub fn compute(data: &[u8]) -> u16 {
    !sum(data)
}

/// `true` when `stored` is the checksum of `data`.
///
/// Both bytes of the recomputed sum XORed against the stored bytes must give
/// `0xff`.
pub fn verify(stored: u16, data: &[u8]) -> bool {
    let [sum_hi, sum_lo] = sum(data).to_be_bytes();
    let [stored_hi, stored_lo] = stored.to_be_bytes();
    (sum_hi ^ stored_hi) == 0xff && (sum_lo ^ stored_lo) == 0xff
}
