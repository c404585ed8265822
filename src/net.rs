//! UDP transport driver
//!
//! Runs a [`Sender`] or [`Receiver`] over a tokio `UdpSocket`.  Each endpoint
//! is a single `select!` loop, so the state machines still see one event at a
//! time.  UDP itself may drop datagrams; send failures are treated the same
//! way (the retransmission timer recovers).
//!
//! Each datagram is one frame followed by the 4-byte ack field
//! (see [`Packet::to_datagram`]).

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::link::Link;
use crate::packet::{Packet, ACK_FIELD_LEN};
use crate::receiver::Receiver;
use crate::sender::Sender;
use crate::stats::{ReceiverStats, SenderStats};
use crate::timer::Timer;
use crate::{Config, Error, Result};

/// [`Link`] writing datagrams to a UDP peer without blocking
pub struct UdpLink {
    socket: Arc<UdpSocket>,
    peer: Option<SocketAddr>,
    send_errors: u64,
}

impl UdpLink {
    pub fn new(socket: Arc<UdpSocket>, peer: Option<SocketAddr>) -> Self {
        Self {
            socket,
            peer,
            send_errors: 0,
        }
    }

    /// Direct subsequent packets to `peer`
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Datagrams the socket refused to take
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }
}

impl Link for UdpLink {
    fn send_packet(&mut self, packet: Packet) {
        let Some(peer) = self.peer else {
            warn!("no peer address yet, packet dropped");
            return;
        };
        if let Err(e) = self.socket.try_send_to(&packet.to_datagram(), peer) {
            self.send_errors += 1;
            debug!("send to {} failed, treated as loss: {}", peer, e);
        }
    }
}

/// [`Timer`] on the tokio clock.  The driver loop sleeps until
/// [`DeadlineTimer::deadline`] and then calls [`DeadlineTimer::expire`].
#[derive(Debug)]
pub struct DeadlineTimer {
    origin: Instant,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            deadline: None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm after the deadline passed; at most one expiry per `start`.
    pub fn expire(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for DeadlineTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for DeadlineTimer {
    fn start(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    fn stop(&mut self) {
        self.deadline = None;
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Resolve at `deadline`, or never when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Sending endpoint
pub struct UdpSender {
    config: Config,
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    progress: Arc<RwLock<SenderStats>>,
}

impl UdpSender {
    /// Bind a local socket and target `peer`
    pub async fn bind(config: Config, bind_addr: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Self::from_socket(config, socket, peer)
    }

    pub fn from_socket(config: Config, socket: UdpSocket, peer: SocketAddr) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            socket: Arc::new(socket),
            peer,
            progress: Arc::new(RwLock::new(SenderStats::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Live copy of the sender counters, refreshed after every event
    pub fn progress(&self) -> Arc<RwLock<SenderStats>> {
        self.progress.clone()
    }

    /// Send every message and wait until all of them are acknowledged.
    ///
    /// Messages are fed to the sender as the window drains, so the segment
    /// buffer stays small regardless of the total size.  Fails with
    /// [`Error::TransferTimeout`] when no ACK arrives for `idle_timeout`.
    pub async fn send_all<I>(&self, messages: I) -> Result<SenderStats>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let link = UdpLink::new(self.socket.clone(), Some(self.peer));
        let mut sender = Sender::new(self.config.clone(), link, DeadlineTimer::new())?;
        info!("sender initializing: peer {}", self.peer);

        let mut messages = messages.into_iter().peekable();
        let mut buf = vec![0u8; self.config.packet_size + ACK_FIELD_LEN + 1];
        let mut last_ack = Instant::now();

        loop {
            while sender.pending() < self.config.window_size {
                let Some(msg) = messages.next() else {
                    break;
                };
                sender.on_message(&msg)?;
            }
            *self.progress.write() = sender.stats().clone();

            if sender.is_idle() && messages.peek().is_none() {
                break;
            }

            let retransmit_at = sender.timer().deadline();
            let give_up_at = last_ack + self.config.idle_timeout();

            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) if from == self.peer => {
                            match Packet::from_datagram(&buf[..len], self.config.packet_size) {
                                Ok(packet) => {
                                    sender.on_ack(&packet);
                                    last_ack = Instant::now();
                                }
                                Err(e) => debug!("datagram from {} dropped: {}", from, e),
                            }
                        }
                        Ok((_, from)) => debug!("ignoring datagram from stranger {}", from),
                        Err(e) => warn!("receive error: {}", e),
                    }
                }
                _ = sleep_until_opt(retransmit_at) => {
                    if sender.timer_mut().expire() {
                        sender.on_timeout();
                    }
                }
                _ = sleep_until(give_up_at) => {
                    warn!("no ACK for {:?}, giving up", self.config.idle_timeout());
                    *self.progress.write() = sender.stats().clone();
                    return Err(Error::TransferTimeout);
                }
            }
        }

        let stats = sender.stats().clone();
        info!("sender finalizing: {}", stats.summary());
        Ok(stats)
    }
}

/// Receiving endpoint
pub struct UdpReceiver {
    config: Config,
    socket: Arc<UdpSocket>,
    progress: Arc<RwLock<ReceiverStats>>,
}

impl UdpReceiver {
    pub async fn bind(config: Config, bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Self::from_socket(config, socket)
    }

    pub fn from_socket(config: Config, socket: UdpSocket) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            socket: Arc::new(socket),
            progress: Arc::new(RwLock::new(ReceiverStats::new())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Live copy of the receiver counters, refreshed after every packet
    pub fn progress(&self) -> Arc<RwLock<ReceiverStats>> {
        self.progress.clone()
    }

    /// Receive until the peer has been silent for `idle_timeout` after the
    /// first packet.  Returns the delivered messages in order.
    ///
    /// ACKs go to the address the latest packet came from.
    pub async fn receive_all(&self) -> Result<Vec<Bytes>> {
        let link = UdpLink::new(self.socket.clone(), None);
        let mut receiver = Receiver::new(self.config.clone(), link, Vec::new())?;
        info!("receiver initializing on {}", self.local_addr()?);

        let mut buf = vec![0u8; self.config.packet_size + ACK_FIELD_LEN + 1];
        let mut last_packet: Option<Instant> = None;

        loop {
            let done_at = last_packet.map(|at| at + self.config.idle_timeout());

            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => {
                            match Packet::from_datagram(&buf[..len], self.config.packet_size) {
                                Ok(packet) => {
                                    receiver.link_mut().set_peer(from);
                                    receiver.on_packet(&packet);
                                    last_packet = Some(Instant::now());
                                    *self.progress.write() = receiver.stats().clone();
                                }
                                Err(e) => debug!("datagram from {} dropped: {}", from, e),
                            }
                        }
                        Err(e) => warn!("receive error: {}", e),
                    }
                }
                _ = sleep_until_opt(done_at) => break,
            }
        }

        info!("receiver finalizing: {}", receiver.stats().summary());
        Ok(receiver.into_upper())
    }
}
