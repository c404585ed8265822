//! # GBN (Go-Back-N reliable transfer)
//!
//! Reliable, in-order message delivery over a channel that may lose or
//! corrupt packets (but never reorders them).
//!
//! ## Features
//! - **Segmentation**: messages split into fixed-size packets with a 24-bit
//!   sequence number and a 16-bit one's-complement checksum
//! - **Sliding window**: up to `window_size` unacknowledged packets in flight
//! - **Cumulative ACKs**: one ACK covers every packet up to its sequence number
//! - **Go-back-N recovery**: a single timer; on expiry the whole window is resent
//! - **Pluggable I/O**: the state machines only see the [`Link`], [`Timer`]
//!   and [`Deliver`] traits
//! - **Simulator**: deterministic lossy channel for experiments ([`sim`])
//! - **UDP driver**: tokio endpoints for real sockets ([`net`])

pub mod checksum;
pub mod config;
pub mod error;
pub mod link;
pub mod net;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod sim;
pub mod stats;
pub mod timer;

pub use config::Config;
pub use error::{Error, Result};
pub use link::{Deliver, Link};
pub use net::{UdpReceiver, UdpSender};
pub use packet::Packet;
pub use receiver::{reassemble, Receiver, Verdict};
pub use sender::Sender;
pub use seq::SeqNum;
pub use sim::{SimConfig, SimReport, Simulation};
pub use stats::{ReceiverStats, SenderStats};
pub use timer::{ManualTimer, Timer};

/// Checksum (2) + length (1) + sequence number (3)
pub const HEADER_SIZE: usize = 6;

/// Default frame size on the wire (bytes)
pub const DEFAULT_PACKET_SIZE: usize = 128;
