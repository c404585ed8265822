//! Boundary traits towards the channel and the application

use std::collections::VecDeque;

use bytes::Bytes;

use crate::packet::Packet;

/// Downward side: hands framed packets to the unreliable medium.
///
/// The medium may drop a packet or flip bits in it but never reorders or
/// duplicates packets travelling in one direction.
pub trait Link {
    fn send_packet(&mut self, packet: Packet);
}

impl Link for Vec<Packet> {
    fn send_packet(&mut self, packet: Packet) {
        self.push(packet);
    }
}

impl Link for VecDeque<Packet> {
    fn send_packet(&mut self, packet: Packet) {
        self.push_back(packet);
    }
}

/// Upward side: receives every accepted payload, in sequence order, exactly
/// once.
pub trait Deliver {
    fn deliver_message(&mut self, data: Bytes);
}

impl Deliver for Vec<Bytes> {
    fn deliver_message(&mut self, data: Bytes) {
        self.push(data);
    }
}

impl Deliver for VecDeque<Bytes> {
    fn deliver_message(&mut self, data: Bytes) {
        self.push_back(data);
    }
}
