//! Protocol configuration

use std::time::Duration;

use crate::{Error, Result, DEFAULT_PACKET_SIZE, HEADER_SIZE};

/// Largest payload the one-byte length field can describe.
const MAX_LENGTH_FIELD: usize = u8::MAX as usize;

/// GBN endpoint configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed frame size on the channel (bytes), header included
    pub packet_size: usize,

    /// Maximum number of packets in flight
    pub window_size: usize,

    /// Retransmission timeout (milliseconds)
    pub timeout_ms: u64,

    /// Maximum number of segments the sender keeps buffered
    /// (in flight + not yet sent)
    pub buffer_capacity: usize,

    /// UDP driver: give up after this long without any inbound packet
    pub idle_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packet_size: DEFAULT_PACKET_SIZE, // 128 bytes
            window_size: 10,
            timeout_ms: 300,                  // 0.3s
            buffer_capacity: 60_000,
            idle_timeout_ms: 5_000,           // 5s
        }
    }
}

impl Config {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload bytes available in one packet
    pub fn max_payload(&self) -> usize {
        self.packet_size.saturating_sub(HEADER_SIZE)
    }

    /// Retransmission timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Idle timeout as a `Duration`
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Check the configuration for values the wire format or the window
    /// cannot support.
    pub fn validate(&self) -> Result<()> {
        if self.packet_size <= HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "packet_size {} leaves no room for payload (header is {} bytes)",
                self.packet_size, HEADER_SIZE
            )));
        }
        if self.max_payload() > MAX_LENGTH_FIELD {
            return Err(Error::InvalidConfig(format!(
                "packet_size {} exceeds the maximum of {}",
                self.packet_size,
                HEADER_SIZE + MAX_LENGTH_FIELD
            )));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size must be at least 1".into()));
        }
        if self.buffer_capacity < self.window_size {
            return Err(Error::InvalidConfig(format!(
                "buffer_capacity {} is smaller than window_size {}",
                self.buffer_capacity, self.window_size
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Small window, long timeout: for links dropping a large share of packets
    pub fn lossy_link() -> Self {
        Self {
            packet_size: DEFAULT_PACKET_SIZE,
            window_size: 4,
            timeout_ms: 800,
            buffer_capacity: 60_000,
            idle_timeout_ms: 15_000,
        }
    }

    /// Largest frames and a wide window: for clean, fast links
    pub fn bulk() -> Self {
        Self {
            packet_size: HEADER_SIZE + MAX_LENGTH_FIELD,
            window_size: 64,
            timeout_ms: 150,
            buffer_capacity: 250_000,
            idle_timeout_ms: 3_000,
        }
    }
}
