//! Go-Back-N receiver
//!
//! - Accepts only the next expected sequence number
//! - Delivers accepted payloads upward in order, exactly once
//! - Answers every packet with a cumulative ACK; rejected packets get a
//!   duplicate ACK of the last accepted sequence number (or the "nothing
//!   accepted yet" sentinel)
//!
//! Out-of-order packets are never buffered: the channel does not reorder, so a
//! gap can only come from loss and the sender's go-back-N resend fills it.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::link::{Deliver, Link};
use crate::packet::Packet;
use crate::seq::SeqNum;
use crate::stats::ReceiverStats;
use crate::{Config, Result};

/// Outcome of [`Receiver::on_packet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// In order and intact; payload delivered
    Accepted(SeqNum),
    /// Checksum failed
    Corrupted,
    /// Intact, but not the expected sequence number
    OutOfOrder { got: SeqNum, expected: u32 },
}

/// Receiver state for one connection
pub struct Receiver<L, D> {
    config: Config,

    /// Channel back to the sender
    link: L,

    /// Application
    upper: D,

    /// The only sequence number that will be accepted
    expect_seqnum: u32,

    /// Last cumulative ACK sent
    last_ack: Option<SeqNum>,

    stats: ReceiverStats,
}

impl<L: Link, D: Deliver> Receiver<L, D> {
    /// Create a receiver expecting sequence number 0 first
    pub fn new(config: Config, link: L, upper: D) -> Result<Self> {
        Self::starting_at(config, link, upper, SeqNum::ZERO)
    }

    /// Create a receiver expecting sequence number `first` first
    pub fn starting_at(config: Config, link: L, upper: D, first: SeqNum) -> Result<Self> {
        config.validate()?;
        debug!(
            "receiver initializing: packet_size={}, first_seq={}",
            config.packet_size, first
        );

        Ok(Self {
            config,
            link,
            upper,
            expect_seqnum: first.get(),
            last_ack: first.get().checked_sub(1).and_then(SeqNum::new),
            stats: ReceiverStats::new(),
        })
    }

    /// Process a packet from the channel and answer with an ACK.
    pub fn on_packet(&mut self, packet: &Packet) -> Verdict {
        self.stats.packets_received += 1;

        let corrupted = packet.is_corrupted();
        let seq = packet.seq();

        let verdict = if corrupted {
            self.stats.corrupted += 1;
            Verdict::Corrupted
        } else if seq.get() != self.expect_seqnum {
            self.stats.out_of_order += 1;
            Verdict::OutOfOrder {
                got: seq,
                expected: self.expect_seqnum,
            }
        } else {
            Verdict::Accepted(seq)
        };

        match verdict {
            Verdict::Accepted(seq) => {
                let payload = packet.payload();
                self.stats.delivered += 1;
                self.stats.bytes_delivered += payload.len() as u64;
                trace!("accepted seq {} ({} bytes)", seq, payload.len());

                self.upper.deliver_message(payload);
                self.last_ack = Some(seq);
                self.send_ack();
                self.expect_seqnum += 1;
            }
            Verdict::Corrupted => {
                debug!("corrupted packet, re-ACK {:?}", self.last_ack.map(SeqNum::get));
                self.send_ack();
            }
            Verdict::OutOfOrder { got, expected } => {
                debug!("got seq {} while expecting {}, re-ACK", got, expected);
                self.send_ack();
            }
        }

        verdict
    }

    fn send_ack(&mut self) {
        let ack = Packet::ack(self.last_ack, self.config.packet_size);
        self.link.send_packet(ack);
        self.stats.acks_sent += 1;
    }

    /// Next sequence number that will be accepted
    pub fn expect_seqnum(&self) -> u32 {
        self.expect_seqnum
    }

    /// Last cumulative ACK sent; `None` until a packet has been accepted
    pub fn last_ack(&self) -> Option<SeqNum> {
        self.last_ack
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn upper(&self) -> &D {
        &self.upper
    }

    pub fn upper_mut(&mut self) -> &mut D {
        &mut self.upper
    }

    /// Consume the receiver, returning the application sink
    pub fn into_upper(self) -> D {
        self.upper
    }
}

/// Concatenate delivered payloads.
pub fn reassemble<'a>(messages: impl IntoIterator<Item = &'a Bytes>) -> Vec<u8> {
    messages.into_iter().flat_map(|m| m.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    use crate::HEADER_SIZE;

    type TestReceiver = Receiver<Vec<Packet>, Vec<Bytes>>;

    fn receiver() -> TestReceiver {
        Receiver::new(Config::default(), Vec::new(), Vec::new()).unwrap()
    }

    fn data(n: u32, payload: &[u8]) -> Packet {
        Packet::data(SeqNum::new(n).unwrap(), payload, Config::default().packet_size)
    }

    fn acks(r: &TestReceiver) -> Vec<Option<u32>> {
        r.link()
            .iter()
            .map(|p| p.ack_field().map(SeqNum::get))
            .collect()
    }

    #[test]
    fn test_in_order_delivery() {
        let mut r = receiver();
        let payloads: [&[u8]; 4] = [b"alpha", b"", b"gamma", b"delta!"];

        for (n, payload) in payloads.iter().enumerate() {
            let verdict = r.on_packet(&data(n as u32, payload));
            assert_eq!(verdict, Verdict::Accepted(SeqNum::new(n as u32).unwrap()));
        }

        let delivered: Vec<&[u8]> = r.upper().iter().map(|b| b.as_ref()).collect();
        assert_eq!(delivered, payloads.to_vec());
        assert_eq!(acks(&r), vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(r.expect_seqnum(), 4);
    }

    #[test]
    fn test_acks_are_valid_frames() {
        let mut r = receiver();
        r.on_packet(&data(0, b"x"));
        r.on_packet(&data(5, b"y"));

        for ack in r.link() {
            assert!(!ack.is_corrupted());
            assert_eq!(ack.framed_ack(), Some(ack.ack_field()));
        }
    }

    #[test]
    fn test_duplicate_suppressed() {
        let mut r = receiver();
        r.on_packet(&data(0, b"once"));
        let verdict = r.on_packet(&data(0, b"once"));

        assert!(matches!(verdict, Verdict::OutOfOrder { expected: 1, .. }));
        assert_eq!(r.upper().len(), 1);
        assert_eq!(acks(&r), vec![Some(0), Some(0)]);
        assert_eq!(r.stats().out_of_order, 1);
    }

    #[test]
    fn test_gap_rejected_with_duplicate_ack() {
        let mut r = receiver();
        r.on_packet(&data(0, b"a"));
        r.on_packet(&data(1, b"b"));
        r.on_packet(&data(3, b"d"));
        r.on_packet(&data(4, b"e"));

        assert_eq!(r.upper().len(), 2);
        assert_eq!(acks(&r), vec![Some(0), Some(1), Some(1), Some(1)]);
        assert_eq!(r.expect_seqnum(), 2);

        // Go-back-N resend fills the gap
        r.on_packet(&data(2, b"c"));
        r.on_packet(&data(3, b"d"));
        assert_eq!(reassemble(r.upper()), b"abcd");
    }

    #[test]
    fn test_first_packet_loss_sends_sentinel() {
        let mut r = receiver();
        let verdict = r.on_packet(&data(1, b"second"));

        assert!(matches!(verdict, Verdict::OutOfOrder { expected: 0, .. }));
        assert!(r.upper().is_empty());
        assert_eq!(acks(&r), vec![None]);
        assert_eq!(r.link()[0].framed_ack(), Some(None));
    }

    #[test]
    fn test_corrupted_packet_not_delivered() {
        let mut r = receiver();
        r.on_packet(&data(0, b"good"));

        let mut bytes = BytesMut::from(&data(1, b"evil").frame()[..]);
        bytes[HEADER_SIZE + 1] ^= 0x01;
        let verdict = r.on_packet(&Packet::from_frame(bytes.freeze(), None));

        assert_eq!(verdict, Verdict::Corrupted);
        assert_eq!(r.upper().len(), 1);
        assert_eq!(acks(&r), vec![Some(0), Some(0)]);
        assert_eq!(r.expect_seqnum(), 1);
        assert_eq!(r.stats().corrupted, 1);
    }

    #[test]
    fn test_corrupted_first_packet_sends_sentinel() {
        let mut r = receiver();
        let mut bytes = BytesMut::from(&data(0, b"zero").frame()[..]);
        bytes[0] ^= 0x80;
        r.on_packet(&Packet::from_frame(bytes.freeze(), None));

        assert_eq!(acks(&r), vec![None]);
        assert!(r.upper().is_empty());
    }

    #[test]
    fn test_starting_at_offset() {
        let first = SeqNum::new(1_000).unwrap();
        let mut r: TestReceiver =
            Receiver::starting_at(Config::default(), Vec::new(), Vec::new(), first).unwrap();
        assert_eq!(r.last_ack(), SeqNum::new(999));

        r.on_packet(&data(1_001, b"late"));
        assert_eq!(acks(&r), vec![Some(999)]);
        r.on_packet(&data(1_000, b"ok"));
        assert_eq!(r.expect_seqnum(), 1_001);
    }
}
