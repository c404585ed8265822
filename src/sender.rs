//! Go-Back-N sender
//!
//! - Segments application messages into fixed-capacity payloads
//! - Keeps at most `window_size` packets in flight
//! - One retransmission timer; on expiry the whole unacknowledged window is
//!   resent
//!
//! # Sequence-number layout
//!
//! ```text
//!   base              next_seqnum          base + len(segments)
//!     │                    │                        │
//! ────┼────────────────────┼────────────────────────┼────▶ seq space
//!     │ <── in flight ───▶ │ <── queued, unsent ──▶ │
//! ```
//!
//! `segments[0]` always holds the payload for `base`; acknowledged payloads
//! are dropped as the window slides.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::link::Link;
use crate::packet::Packet;
use crate::seq::SeqNum;
use crate::stats::SenderStats;
use crate::timer::Timer;
use crate::{Config, Error, Result};

/// Sender state for one connection
pub struct Sender<L, T> {
    config: Config,

    /// Downward channel
    link: L,

    /// Retransmission timer
    timer: T,

    /// Oldest unacknowledged sequence number
    base: u32,

    /// Next sequence number to transmit for the first time
    next_seqnum: u32,

    /// Payloads for `base..base + segments.len()`
    segments: VecDeque<Bytes>,

    stats: SenderStats,
}

impl<L: Link, T: Timer> Sender<L, T> {
    /// Create a sender whose first packet carries sequence number 0
    pub fn new(config: Config, link: L, timer: T) -> Result<Self> {
        Self::starting_at(config, link, timer, SeqNum::ZERO)
    }

    /// Create a sender whose first packet carries sequence number `first`
    pub fn starting_at(config: Config, link: L, timer: T, first: SeqNum) -> Result<Self> {
        config.validate()?;
        debug!(
            "sender initializing: window={}, packet_size={}, timeout={}ms, first_seq={}",
            config.window_size, config.packet_size, config.timeout_ms, first
        );

        Ok(Self {
            segments: VecDeque::with_capacity(config.window_size),
            config,
            link,
            timer,
            base: first.get(),
            next_seqnum: first.get(),
            stats: SenderStats::new(),
        })
    }

    /// Accept a message from the application.
    ///
    /// The message is split into `max_payload`-sized segments (an empty
    /// message becomes one empty segment) which are queued as a unit: if any
    /// of them does not fit, none are queued.  Returns the number of segments
    /// queued.
    pub fn on_message(&mut self, msg: &[u8]) -> Result<usize> {
        let max_payload = self.config.max_payload();
        let count = msg.len().div_ceil(max_payload).max(1);

        let buffered = self.segments.len();
        if buffered + count > self.config.buffer_capacity {
            warn!(
                "segment buffer full: {} buffered + {} new > {}",
                buffered, count, self.config.buffer_capacity
            );
            return Err(Error::BufferOverflow {
                max_size: self.config.buffer_capacity,
            });
        }

        let last = u64::from(self.base) + (buffered + count - 1) as u64;
        if last > u64::from(SeqNum::MAX.get()) {
            warn!("sequence space exhausted: message needs sequence number {}", last);
            return Err(Error::SequenceSpaceExhausted { next: last });
        }

        let data = Bytes::copy_from_slice(msg);
        if data.is_empty() {
            self.segments.push_back(data);
        } else {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + max_payload).min(data.len());
                self.segments.push_back(data.slice(offset..end));
                offset = end;
            }
        }

        self.stats.messages += 1;
        self.stats.bytes += msg.len() as u64;
        self.stats.segments += count as u64;
        trace!("message of {} bytes queued as {} segments", msg.len(), count);

        self.fill_window();
        Ok(count)
    }

    /// Transmit queued segments while the window has room.
    ///
    /// Arms the timer when the first packet goes in flight.  Returns the
    /// number of packets sent.
    pub fn fill_window(&mut self) -> usize {
        let limit = u64::from(self.base) + self.config.window_size as u64;
        let mut sent = 0;

        while u64::from(self.next_seqnum) < limit {
            let offset = (self.next_seqnum - self.base) as usize;
            let Some(payload) = self.segments.get(offset) else {
                break;
            };
            let Some(seq) = SeqNum::new(self.next_seqnum) else {
                break;
            };

            let packet = Packet::data(seq, payload, self.config.packet_size);
            self.link.send_packet(packet);
            trace!("sent seq {} ({} bytes) at {:?}", seq, payload.len(), self.timer.now());

            if self.base == self.next_seqnum {
                self.timer.start(self.config.timeout());
            }
            self.next_seqnum += 1;
            self.stats.packets_sent += 1;
            sent += 1;
        }

        sent
    }

    /// Process a packet coming back from the receiver.
    ///
    /// Corrupted ACKs are ignored.  A cumulative ACK for `n` moves `base` to
    /// `n + 1` (the sentinel moves it to 0).  A duplicate ACK (`n + 1 == base`)
    /// leaves the window as is but restarts the timer while packets are in
    /// flight.  ACKs that would move `base` backwards or past `next_seqnum`
    /// change nothing.
    pub fn on_ack(&mut self, packet: &Packet) {
        if packet.is_corrupted() || packet.framed_ack() != Some(packet.ack_field()) {
            self.stats.corrupted_acks += 1;
            debug!("corrupted ACK ignored");
            return;
        }

        let new_base = packet.ack_field().map_or(0, |ack| ack.get() + 1);
        if new_base <= self.base || new_base > self.next_seqnum {
            self.stats.duplicate_acks += 1;
            trace!(
                "non-advancing ACK {:?} (base={}, next={})",
                packet.ack_field().map(SeqNum::get),
                self.base,
                self.next_seqnum
            );
            if new_base == self.base && self.base != self.next_seqnum {
                self.timer.start(self.config.timeout());
            }
            return;
        }

        let acked = (new_base - self.base) as usize;
        self.segments.drain(..acked);
        self.base = new_base;
        self.stats.acks += 1;
        trace!("window advanced to base {} (next {})", self.base, self.next_seqnum);

        if self.base == self.next_seqnum {
            if self.segments.is_empty() {
                self.timer.stop();
                debug!("all {} segments acknowledged, timer stopped", self.stats.segments);
            } else {
                self.fill_window();
            }
        } else {
            // restart for the new oldest in-flight packet
            self.timer.start(self.config.timeout());
            self.fill_window();
        }
    }

    /// Timer expiry: resend every packet in `[base, next_seqnum)` and rearm.
    ///
    /// Returns the number of packets resent.
    pub fn on_timeout(&mut self) -> usize {
        self.stats.timeouts += 1;
        if self.base == self.next_seqnum {
            trace!("timeout with nothing in flight");
            return 0;
        }

        self.timer.start(self.config.timeout());
        debug!(
            "timeout at {:?}: resending {}..{}",
            self.timer.now(),
            self.base,
            self.next_seqnum
        );

        let mut resent = 0;
        for (seq, payload) in (self.base..self.next_seqnum).zip(self.segments.iter()) {
            let Some(seq) = SeqNum::new(seq) else {
                break;
            };
            self.link
                .send_packet(Packet::data(seq, payload, self.config.packet_size));
            resent += 1;
        }

        self.stats.retransmissions += resent as u64;
        resent
    }

    /// Oldest unacknowledged sequence number
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Next sequence number to be sent for the first time
    pub fn next_seqnum(&self) -> u32 {
        self.next_seqnum
    }

    /// Packets sent but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        (self.next_seqnum - self.base) as usize
    }

    /// Segments queued but not yet sent
    pub fn pending(&self) -> usize {
        self.segments.len() - self.in_flight()
    }

    /// `true` once everything queued has been acknowledged
    pub fn is_idle(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
