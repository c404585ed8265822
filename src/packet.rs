//! Packet framing
//!
//! Every packet is a fixed-size frame of `packet_size` bytes:
//!
//! ```text
//!  0      1      2        3      4      5      6 ..          packet_size
//! +------+------+--------+------+------+------+------------------------+
//! | csum | csum | length | seqH | seqM | seqL | payload (zero-padded)  |
//! |  hi  |  lo  |        |      |      |      |                        |
//! +------+------+--------+------+------+------+------------------------+
//! ```
//!
//! The checksum covers bytes `2..packet_size`.  Alongside the frame a packet
//! carries a distinct `ack` field: the cumulative acknowledgment sent from
//! receiver to sender (`None` means nothing has been accepted yet).
//!
//! ACK frames have a one-byte payload flag saying whether an ack is present and
//! repeat the ack value in the sequence field, so the ack is also covered by
//! the checksum.

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::seq::SeqNum;
use crate::{Error, Result, HEADER_SIZE};

const CHECKSUM_HI: usize = 0;
const CHECKSUM_LO: usize = 1;
const LENGTH: usize = 2;
const SEQ: usize = 3;

/// ACK frame payload flag: an ack value is present
const ACK_PRESENT: u8 = 1;
/// ACK frame payload flag: nothing accepted yet
const ACK_NONE: u8 = 0;

/// Wire value of the "nothing accepted yet" ack in UDP datagrams
pub const NO_ACK: i32 = -1;

/// Byte length of the ack field appended to UDP datagrams
pub const ACK_FIELD_LEN: usize = 4;

/// A framed packet plus its ack field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    frame: Bytes,
    ack: Option<SeqNum>,
}

impl Packet {
    /// Frame a data segment.
    ///
    /// The payload is truncated to `packet_size - HEADER_SIZE`; callers are
    /// expected to segment before framing.
    pub fn data(seq: SeqNum, payload: &[u8], packet_size: usize) -> Self {
        let max_payload = packet_size.saturating_sub(HEADER_SIZE).min(u8::MAX as usize);
        debug_assert!(
            payload.len() <= max_payload,
            "payload of {} bytes exceeds max payload {}",
            payload.len(),
            max_payload
        );
        let payload = &payload[..payload.len().min(max_payload)];

        Self {
            frame: frame(seq, payload, packet_size),
            ack: None,
        }
    }

    /// Frame an acknowledgment.
    pub fn ack(ack: Option<SeqNum>, packet_size: usize) -> Self {
        let (seq, flag) = match ack {
            Some(seq) => (seq, ACK_PRESENT),
            None => (SeqNum::ZERO, ACK_NONE),
        };

        Self {
            frame: frame(seq, &[flag], packet_size),
            ack,
        }
    }

    /// Rebuild a packet from raw frame bytes as delivered by a channel.
    pub fn from_frame(frame: Bytes, ack: Option<SeqNum>) -> Self {
        Self { frame, ack }
    }

    /// Raw frame bytes
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Frame size in bytes
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Cumulative acknowledgment carried with this packet
    pub fn ack_field(&self) -> Option<SeqNum> {
        self.ack
    }

    /// Checksum stored in the frame
    pub fn checksum(&self) -> u16 {
        match (self.frame.get(CHECKSUM_HI), self.frame.get(CHECKSUM_LO)) {
            (Some(&hi), Some(&lo)) => u16::from_be_bytes([hi, lo]),
            _ => 0,
        }
    }

    /// `true` when the frame is truncated or fails checksum verification
    pub fn is_corrupted(&self) -> bool {
        if self.frame.len() <= HEADER_SIZE {
            return true;
        }
        !checksum::verify(self.checksum(), &self.frame[LENGTH..])
    }

    /// Raw payload length field (unchecked)
    pub fn length_field(&self) -> u8 {
        self.frame.get(LENGTH).copied().unwrap_or(0)
    }

    /// Sequence number field
    pub fn seq(&self) -> SeqNum {
        match self.frame.get(SEQ..SEQ + 3) {
            Some(&[high, med, low]) => SeqNum::decode([high, med, low]),
            _ => SeqNum::ZERO,
        }
    }

    /// Payload bytes, with the length field clamped into
    /// `[0, packet_size - HEADER_SIZE]`.
    pub fn payload(&self) -> Bytes {
        let max_payload = self.frame.len().saturating_sub(HEADER_SIZE);
        let len = usize::from(self.length_field()).min(max_payload);
        self.frame.slice(HEADER_SIZE..HEADER_SIZE + len)
    }

    /// Ack value as recorded inside the frame.
    ///
    /// `None` when the frame is not a well-formed ACK frame.
    pub fn framed_ack(&self) -> Option<Option<SeqNum>> {
        if self.length_field() != 1 {
            return None;
        }
        match self.frame.get(HEADER_SIZE) {
            Some(&ACK_PRESENT) => Some(Some(self.seq())),
            Some(&ACK_NONE) if self.seq() == SeqNum::ZERO => Some(None),
            _ => None,
        }
    }

    /// Serialize for a datagram transport: frame followed by the ack field as
    /// a big-endian `i32` ([`NO_ACK`] when absent).
    pub fn to_datagram(&self) -> Vec<u8> {
        let ack = self.ack.map_or(NO_ACK, |seq| seq.get() as i32);

        let mut buf = Vec::with_capacity(self.frame.len() + ACK_FIELD_LEN);
        buf.extend_from_slice(&self.frame);
        buf.extend_from_slice(&ack.to_be_bytes());
        buf
    }

    /// Parse a datagram produced by [`Packet::to_datagram`].
    ///
    /// Only the size is checked here; corruption is detected later by the
    /// state machines.  An ack value outside the sequence space reads as no
    /// ack.
    pub fn from_datagram(bytes: &[u8], packet_size: usize) -> Result<Self> {
        let expected = packet_size + ACK_FIELD_LEN;
        if bytes.len() != expected {
            return Err(Error::InvalidDatagram {
                expected,
                got: bytes.len(),
            });
        }

        let (frame, ack) = bytes.split_at(packet_size);
        let ack = i32::from_be_bytes([ack[0], ack[1], ack[2], ack[3]]);
        let ack = u32::try_from(ack).ok().and_then(SeqNum::new);

        Ok(Self {
            frame: Bytes::copy_from_slice(frame),
            ack,
        })
    }
}

/// Lay out header and payload, zero-pad, and write the checksum last.
fn frame(seq: SeqNum, payload: &[u8], packet_size: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(packet_size);
    buf.put_u16(0); // checksum placeholder
    buf.put_u8(payload.len() as u8);
    buf.put_slice(&seq.encode());
    buf.put_slice(payload);
    buf.resize(packet_size, 0);

    let csum = checksum::compute(&buf[LENGTH..]);
    buf[CHECKSUM_HI..=CHECKSUM_LO].copy_from_slice(&csum.to_be_bytes());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PACKET_SIZE;

    const MAX_PAYLOAD: usize = DEFAULT_PACKET_SIZE - HEADER_SIZE;

    fn seq(n: u32) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    #[test]
    fn test_data_frame_layout() {
        let pkt = Packet::data(seq(0x01_02_03), b"hello", DEFAULT_PACKET_SIZE);
        let frame = pkt.frame();

        assert_eq!(frame.len(), DEFAULT_PACKET_SIZE);
        assert_eq!(frame[LENGTH], 5);
        assert_eq!(&frame[SEQ..SEQ + 3], &[0x01, 0x02, 0x03]);
        assert_eq!(&frame[HEADER_SIZE..HEADER_SIZE + 5], b"hello");
        assert!(frame[HEADER_SIZE + 5..].iter().all(|&b| b == 0));
        assert_eq!(
            u16::from_be_bytes([frame[0], frame[1]]),
            checksum::compute(&frame[LENGTH..])
        );
    }

    #[test]
    fn test_frame_verifies() {
        for len in [0, 1, 17, MAX_PAYLOAD] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let pkt = Packet::data(seq(len as u32), &payload, DEFAULT_PACKET_SIZE);
            assert!(!pkt.is_corrupted(), "payload length {len}");
            assert_eq!(pkt.payload().as_ref(), payload.as_slice());
            assert_eq!(pkt.seq(), seq(len as u32));
        }
    }

    #[test]
    fn test_every_single_bit_flip_detected() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| (i * 13) as u8).collect();
        let pkt = Packet::data(seq(4242), &payload, DEFAULT_PACKET_SIZE);

        for bit in 0..DEFAULT_PACKET_SIZE * 8 {
            let mut bytes = BytesMut::from(&pkt.frame()[..]);
            bytes[bit / 8] ^= 1 << (bit % 8);
            let flipped = Packet::from_frame(bytes.freeze(), None);
            assert!(flipped.is_corrupted(), "bit {bit} flip went undetected");
        }
    }

    #[test]
    fn test_truncated_frame_is_corrupted() {
        let pkt = Packet::from_frame(Bytes::from_static(&[0, 0, 0]), None);
        assert!(pkt.is_corrupted());
        assert_eq!(pkt.seq(), SeqNum::ZERO);
        assert!(pkt.payload().is_empty());
    }

    #[test]
    fn test_payload_length_clamped() {
        // A length field larger than the frame can hold is clamped rather than
        // read past the end.
        let mut bytes = BytesMut::zeroed(DEFAULT_PACKET_SIZE);
        bytes[LENGTH] = 0xff;
        let pkt = Packet::from_frame(bytes.freeze(), None);
        assert_eq!(pkt.payload().len(), MAX_PAYLOAD);
    }

    #[test]
    fn test_ack_frame() {
        let pkt = Packet::ack(Some(seq(77)), DEFAULT_PACKET_SIZE);
        assert!(!pkt.is_corrupted());
        assert_eq!(pkt.ack_field(), Some(seq(77)));
        assert_eq!(pkt.framed_ack(), Some(Some(seq(77))));

        let none = Packet::ack(None, DEFAULT_PACKET_SIZE);
        assert!(!none.is_corrupted());
        assert_eq!(none.ack_field(), None);
        assert_eq!(none.framed_ack(), Some(None));
    }

    #[test]
    fn test_data_frame_is_not_an_ack_frame() {
        let pkt = Packet::data(seq(1), b"ab", DEFAULT_PACKET_SIZE);
        assert_eq!(pkt.framed_ack(), None);
    }

    #[test]
    fn test_datagram_roundtrip() {
        let ack = Packet::ack(Some(seq(0x00_ab_cd)), DEFAULT_PACKET_SIZE);
        let bytes = ack.to_datagram();
        assert_eq!(bytes.len(), DEFAULT_PACKET_SIZE + ACK_FIELD_LEN);
        assert_eq!(Packet::from_datagram(&bytes, DEFAULT_PACKET_SIZE).unwrap(), ack);

        let none = Packet::ack(None, DEFAULT_PACKET_SIZE);
        let bytes = none.to_datagram();
        assert_eq!(&bytes[DEFAULT_PACKET_SIZE..], &NO_ACK.to_be_bytes());
        assert_eq!(Packet::from_datagram(&bytes, DEFAULT_PACKET_SIZE).unwrap(), none);
    }

    #[test]
    fn test_datagram_wrong_size_rejected() {
        let err = Packet::from_datagram(&[0u8; 10], DEFAULT_PACKET_SIZE).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDatagram { expected, got: 10 } if expected == DEFAULT_PACKET_SIZE + ACK_FIELD_LEN
        ));
    }
}
