//! GBN simulator - Go-Back-N over a lossy virtual channel
//!
//! Pushes a batch of random messages through a sender and receiver joined by
//! a simulated medium, then checks the delivered stream.
//!
//! Usage:
//!   cargo run --release --bin gbn-sim -- [OPTIONS]
//!
//! Example:
//!   cargo run --release --bin gbn-sim -- --loss 0.1 --corrupt 0.05 --messages 50

use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use gbn::{Config, SimConfig, Simulation};

struct SimArgs {
    sim: SimConfig,
    config: Config,
    messages: usize,
    message_size: usize,
    limit: Duration,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            config: Config::default(),
            messages: 20,
            message_size: 1_000,
            limit: Duration::from_secs(600),
        }
    }
}

fn value<T: FromStr>(args: &[String], i: usize) -> T {
    match args.get(i + 1).map(|s| s.parse()) {
        Some(Ok(v)) => v,
        _ => {
            eprintln!("{} needs a valid value", args[i]);
            std::process::exit(2);
        }
    }
}

fn parse_args() -> SimArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = SimArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--loss" | "-l" => {
                opts.sim.loss_rate = value(&args, i);
                i += 1;
            }
            "--corrupt" | "-c" => {
                opts.sim.corrupt_rate = value(&args, i);
                i += 1;
            }
            "--latency" => {
                opts.sim.latency = Duration::from_millis(value(&args, i));
                i += 1;
            }
            "--seed" => {
                opts.sim.seed = value(&args, i);
                i += 1;
            }
            "--messages" | "-n" => {
                opts.messages = value(&args, i);
                i += 1;
            }
            "--size" | "-s" => {
                opts.message_size = value(&args, i);
                i += 1;
            }
            "--window" | "-w" => {
                opts.config.window_size = value(&args, i);
                i += 1;
            }
            "--timeout" | "-t" => {
                opts.config.timeout_ms = value(&args, i);
                i += 1;
            }
            "--limit" => {
                opts.limit = Duration::from_secs(value(&args, i));
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN simulator

Usage: gbn-sim [OPTIONS]

Options:
  -l, --loss <RATE>       Packet loss probability (default: 0.0)
  -c, --corrupt <RATE>    Bit-flip probability (default: 0.0)
      --latency <MS>      One-way delay (default: 100)
      --seed <N>          RNG seed
  -n, --messages <N>      Number of messages (default: 20)
  -s, --size <BYTES>      Bytes per message (default: 1000)
  -w, --window <N>        Window size (default: 10)
  -t, --timeout <MS>      Retransmission timeout (default: 300)
      --limit <SECS>      Virtual time limit (default: 600)
  -h, --help              Print this help
"#
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown option: {}", other);
                std::process::exit(2);
            }
        }
        i += 1;
    }

    opts
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = parse_args();
    let mut rng = StdRng::seed_from_u64(opts.sim.seed.wrapping_add(1));

    let mut sim = Simulation::new(opts.config, opts.sim)?;
    let mut expected = Vec::with_capacity(opts.messages * opts.message_size);
    for _ in 0..opts.messages {
        let mut msg = vec![0u8; opts.message_size];
        rng.fill(&mut msg[..]);
        sim.send_message(&msg)?;
        expected.extend_from_slice(&msg);
    }

    let report = sim.run(opts.limit);
    info!("{}", report.summary());

    if sim.received_bytes() == expected {
        info!("delivered stream matches ({} bytes)", expected.len());
        Ok(())
    } else {
        error!("delivered stream differs from what was sent");
        std::process::exit(1);
    }
}
