//! Discrete-event channel simulator
//!
//! Runs one [`Sender`] and one [`Receiver`] against a simulated medium that
//! drops or corrupts packets but never reorders or duplicates them.  Time is
//! virtual: events are processed in timestamp order, ties in insertion order,
//! so a run is fully determined by [`SimConfig::seed`].
//!
//! | Fault       | Model                                           |
//! |-------------|-------------------------------------------------|
//! | Loss        | Drop a packet with probability `loss_rate`.     |
//! | Corruption  | Flip one random bit with `corrupt_rate`.        |
//! | Latency     | Constant one-way delay `latency`.               |

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::packet::Packet;
use crate::receiver::{reassemble, Receiver};
use crate::sender::Sender;
use crate::stats::{ReceiverStats, SenderStats};
use crate::timer::ManualTimer;
use crate::{Config, Error, Result};

/// Fault model of the simulated medium.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Probability that any given packet is silently dropped
    pub loss_rate: f64,
    /// Probability that a delivered packet has one bit flipped
    pub corrupt_rate: f64,
    /// One-way delay of every packet
    pub latency: Duration,
    /// RNG seed
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        // No faults by default: the medium is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            latency: Duration::from_millis(100),
            seed: 0x5EED,
        }
    }
}

impl SimConfig {
    fn validate(&self) -> Result<()> {
        for (name, rate) in [("loss_rate", self.loss_rate), ("corrupt_rate", self.corrupt_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::InvalidConfig(format!(
                    "{name} {rate} is outside [0.0, 1.0]"
                )));
            }
        }
        Ok(())
    }
}

/// Counters kept by the medium itself
#[derive(Debug, Clone, Default)]
pub struct MediumStats {
    pub carried: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

#[derive(Debug)]
enum Event {
    /// Packet arriving at the receiver
    ToReceiver(Packet),
    /// ACK arriving at the sender
    ToSender(Packet),
    /// Sender timer expiry for the given timer generation
    Timeout(u64),
}

/// Heap entry ordered by (time, insertion order)
struct Scheduled {
    at: Duration,
    order: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.order) == (other.at, other.order)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.order).cmp(&(other.at, other.order))
    }
}

/// Result of [`Simulation::run`]
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Virtual time when the run stopped
    pub elapsed: Duration,
    /// `true` when every queued segment was acknowledged
    pub completed: bool,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub medium: MediumStats,
}

impl SimReport {
    pub fn summary(&self) -> String {
        format!(
            "At {:.2}s: {} | sender: {} | receiver: {} | medium: carried {}, dropped {}, corrupted {}",
            self.elapsed.as_secs_f64(),
            if self.completed { "complete" } else { "incomplete" },
            self.sender.summary(),
            self.receiver.summary(),
            self.medium.carried,
            self.medium.dropped,
            self.medium.corrupted,
        )
    }
}

/// A sender and a receiver joined by a simulated lossy medium
pub struct Simulation {
    sim: SimConfig,
    rng: StdRng,
    now: Duration,
    order: u64,
    events: BinaryHeap<Reverse<Scheduled>>,
    /// Timer generation an expiry event is already scheduled for
    scheduled_generation: Option<u64>,
    sender: Sender<VecDeque<Packet>, ManualTimer>,
    receiver: Receiver<VecDeque<Packet>, Vec<Bytes>>,
    medium: MediumStats,
}

impl Simulation {
    pub fn new(config: Config, sim: SimConfig) -> Result<Self> {
        sim.validate()?;
        info!(
            "simulation initializing: loss={:.2}, corrupt={:.2}, latency={:?}, seed={}",
            sim.loss_rate, sim.corrupt_rate, sim.latency, sim.seed
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(sim.seed),
            sim,
            now: Duration::ZERO,
            order: 0,
            events: BinaryHeap::new(),
            scheduled_generation: None,
            sender: Sender::new(config.clone(), VecDeque::new(), ManualTimer::new())?,
            receiver: Receiver::new(config, VecDeque::new(), Vec::new())?,
            medium: MediumStats::default(),
        })
    }

    /// Hand a message to the sender at the current virtual time.
    pub fn send_message(&mut self, data: &[u8]) -> Result<usize> {
        let segments = self.sender.on_message(data)?;
        self.flush();
        Ok(segments)
    }

    /// Process events until the transfer is idle or `limit` of virtual time
    /// has passed.
    pub fn run(&mut self, limit: Duration) -> SimReport {
        while let Some(Reverse(next)) = self.events.pop() {
            if next.at > limit {
                self.events.push(Reverse(next));
                break;
            }
            self.now = next.at;
            self.sender.timer_mut().set_now(self.now);

            match next.event {
                Event::ToReceiver(packet) => {
                    let verdict = self.receiver.on_packet(&packet);
                    trace!("{:?}: receiver {:?}", self.now, verdict);
                }
                Event::ToSender(packet) => {
                    self.sender.on_ack(&packet);
                }
                Event::Timeout(generation) => {
                    if self.scheduled_generation == Some(generation) {
                        self.scheduled_generation = None;
                    }
                    if generation == self.sender.timer().generation()
                        && self.sender.timer_mut().advance(self.now)
                    {
                        self.sender.on_timeout();
                    }
                }
            }
            self.flush();

            if self.sender.is_idle() && self.in_transit() == 0 {
                break;
            }
        }

        let report = self.report();
        debug!("{}", report.summary());
        report
    }

    /// Move outbound packets into the medium and schedule the timer.
    fn flush(&mut self) {
        while let Some(packet) = self.sender.link_mut().pop_front() {
            if let Some(packet) = self.carry(packet) {
                self.schedule(self.now + self.sim.latency, Event::ToReceiver(packet));
            }
        }
        while let Some(packet) = self.receiver.link_mut().pop_front() {
            if let Some(packet) = self.carry(packet) {
                self.schedule(self.now + self.sim.latency, Event::ToSender(packet));
            }
        }

        let timer = self.sender.timer();
        if let Some(deadline) = timer.deadline() {
            let generation = timer.generation();
            if self.scheduled_generation != Some(generation) {
                self.scheduled_generation = Some(generation);
                self.schedule(deadline, Event::Timeout(generation));
            }
        }
    }

    /// Apply the fault model; `None` when the packet is lost.
    fn carry(&mut self, packet: Packet) -> Option<Packet> {
        self.medium.carried += 1;
        if self.rng.gen_bool(self.sim.loss_rate) {
            self.medium.dropped += 1;
            trace!("{:?}: packet dropped", self.now);
            return None;
        }
        if self.rng.gen_bool(self.sim.corrupt_rate) && !packet.is_empty() {
            self.medium.corrupted += 1;
            let bit = self.rng.gen_range(0..packet.len() * 8);
            let mut frame = BytesMut::from(&packet.frame()[..]);
            frame[bit / 8] ^= 1 << (bit % 8);
            trace!("{:?}: packet corrupted at bit {}", self.now, bit);
            return Some(Packet::from_frame(frame.freeze(), packet.ack_field()));
        }
        Some(packet)
    }

    fn schedule(&mut self, at: Duration, event: Event) {
        self.order += 1;
        self.events.push(Reverse(Scheduled {
            at,
            order: self.order,
            event,
        }));
    }

    /// Packets currently travelling in either direction
    fn in_transit(&self) -> usize {
        self.events
            .iter()
            .filter(|Reverse(s)| !matches!(s.event, Event::Timeout(_)))
            .count()
    }

    fn report(&self) -> SimReport {
        SimReport {
            elapsed: self.now,
            completed: self.sender.is_idle(),
            sender: self.sender.stats().clone(),
            receiver: self.receiver.stats().clone(),
            medium: self.medium.clone(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Payloads delivered to the application so far, in order
    pub fn delivered(&self) -> &[Bytes] {
        self.receiver.upper()
    }

    /// Delivered payloads concatenated
    pub fn received_bytes(&self) -> Vec<u8> {
        reassemble(self.receiver.upper())
    }

    pub fn sender(&self) -> &Sender<VecDeque<Packet>, ManualTimer> {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver<VecDeque<Packet>, Vec<Bytes>> {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(3_600);

    fn message(len: usize, salt: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(salt)).collect()
    }

    #[test]
    fn test_clean_channel_transfer() {
        let mut sim = Simulation::new(Config::default(), SimConfig::default()).unwrap();
        let data = message(5_000, 1);
        sim.send_message(&data).unwrap();

        let report = sim.run(LIMIT);
        assert!(report.completed);
        assert_eq!(sim.received_bytes(), data);
        assert_eq!(report.sender.retransmissions, 0);
        assert_eq!(report.medium.dropped, 0);
    }

    #[test]
    fn test_lossy_corrupting_channel_transfer() {
        let sim_config = SimConfig {
            loss_rate: 0.15,
            corrupt_rate: 0.15,
            seed: 42,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(Config::default(), sim_config).unwrap();

        let mut expected = Vec::new();
        for i in 0..20u8 {
            let msg = message(37 * usize::from(i) + 11, i);
            sim.send_message(&msg).unwrap();
            expected.extend_from_slice(&msg);
        }

        let report = sim.run(LIMIT);
        assert!(report.completed, "{}", report.summary());
        assert_eq!(sim.received_bytes(), expected);
        assert!(report.medium.dropped > 0);
        assert!(report.medium.corrupted > 0);
        assert!(report.sender.retransmissions > 0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let sim_config = SimConfig {
            loss_rate: 0.3,
            corrupt_rate: 0.1,
            seed: 7,
            ..SimConfig::default()
        };
        let run = || {
            let mut sim = Simulation::new(Config::default(), sim_config.clone()).unwrap();
            sim.send_message(&message(3_000, 9)).unwrap();
            let report = sim.run(LIMIT);
            (report.elapsed, report.sender.retransmissions, report.medium.dropped)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_run_stops_at_limit() {
        let sim_config = SimConfig {
            loss_rate: 1.0,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(Config::default(), sim_config).unwrap();
        sim.send_message(b"into the void").unwrap();

        let report = sim.run(Duration::from_secs(2));
        assert!(!report.completed);
        assert!(report.elapsed <= Duration::from_secs(2));
        assert!(sim.delivered().is_empty());
        // 300ms timeout: expiries at 0.3, 0.6, ... 1.8
        assert_eq!(report.sender.timeouts, 6);
    }

    #[test]
    fn test_window_bound_holds_throughout() {
        let sim_config = SimConfig {
            loss_rate: 0.2,
            seed: 3,
            ..SimConfig::default()
        };
        let config = Config::default();
        let window = config.window_size;
        let mut sim = Simulation::new(config, sim_config).unwrap();
        sim.send_message(&message(10_000, 0)).unwrap();

        let mut limit = Duration::ZERO;
        while !sim.sender().is_idle() && limit < LIMIT {
            limit += Duration::from_millis(50);
            sim.run(limit);
            assert!(sim.sender().in_flight() <= window);
        }
        assert!(sim.sender().is_idle());
    }

    #[test]
    fn test_rejects_bad_rates() {
        let sim_config = SimConfig {
            loss_rate: 1.5,
            ..SimConfig::default()
        };
        assert!(Simulation::new(Config::default(), sim_config).is_err());
    }
}
