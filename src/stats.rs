//! Transfer statistics

use std::time::{Duration, Instant};

/// Sender-side counters
#[derive(Debug, Clone)]
pub struct SenderStats {
    /// Creation time
    pub start_time: Instant,

    /// Messages accepted from the application
    pub messages: u64,

    /// Application bytes accepted
    pub bytes: u64,

    /// Segments produced by segmentation
    pub segments: u64,

    /// First transmissions
    pub packets_sent: u64,

    /// Go-back-N resends
    pub retransmissions: u64,

    /// Timer expiries
    pub timeouts: u64,

    /// ACKs that moved the window
    pub acks: u64,

    /// ACKs that did not move the window
    pub duplicate_acks: u64,

    /// ACKs dropped for failing verification
    pub corrupted_acks: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            messages: 0,
            bytes: 0,
            segments: 0,
            packets_sent: 0,
            retransmissions: 0,
            timeouts: 0,
            acks: 0,
            duplicate_acks: 0,
            corrupted_acks: 0,
        }
    }

    /// Elapsed wall time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of transmissions that were resends
    pub fn retransmission_ratio(&self) -> f64 {
        let total = self.packets_sent + self.retransmissions;
        if total == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / total as f64
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "Messages: {} | Bytes: {} | Segments: {} | Sent: {} | Resent: {} ({:.1}%) | Timeouts: {} | ACKs: {} (dup {}, corrupt {})",
            self.messages,
            self.bytes,
            self.segments,
            self.packets_sent,
            self.retransmissions,
            self.retransmission_ratio() * 100.0,
            self.timeouts,
            self.acks,
            self.duplicate_acks,
            self.corrupted_acks,
        )
    }
}

impl Default for SenderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver-side counters
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    /// Creation time
    pub start_time: Instant,

    /// Packets handed up by the channel
    pub packets_received: u64,

    /// Payloads delivered to the application
    pub delivered: u64,

    /// Payload bytes delivered to the application
    pub bytes_delivered: u64,

    /// Packets failing checksum verification
    pub corrupted: u64,

    /// Uncorrupted packets with an unexpected sequence number
    pub out_of_order: u64,

    /// ACKs sent (new and duplicate)
    pub acks_sent: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            packets_received: 0,
            delivered: 0,
            bytes_delivered: 0,
            corrupted: 0,
            out_of_order: 0,
            acks_sent: 0,
        }
    }

    /// Elapsed wall time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Delivered bytes per second of wall time
    pub fn goodput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_delivered as f64 / elapsed
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "Received: {} | Delivered: {} ({} bytes) | Corrupted: {} | Out of order: {} | ACKs: {}",
            self.packets_received,
            self.delivered,
            self.bytes_delivered,
            self.corrupted,
            self.out_of_order,
            self.acks_sent,
        )
    }
}

impl Default for ReceiverStats {
    fn default() -> Self {
        Self::new()
    }
}
