//! GBN receiver - reliable file transfer over UDP
//!
//! Usage:
//!   cargo run --release --bin gbn-recv -- [OPTIONS]
//!
//! Example:
//!   cargo run --release --bin gbn-recv -- --bind 0.0.0.0:9000 --output received.bin

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::io::AsyncWriteExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gbn::{reassemble, Config, UdpReceiver};

struct RecvArgs {
    bind_addr: SocketAddr,
    output_path: Option<PathBuf>,
    config: Config,
}

impl Default for RecvArgs {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            output_path: None,
            config: Config::default(),
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

fn parse_args() -> RecvArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = RecvArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                opts.bind_addr = value(&args, i);
                i += 1;
            }
            "--output" | "-o" => {
                opts.output_path = Some(value(&args, i));
                i += 1;
            }
            "--idle" => {
                opts.config.idle_timeout_ms = value(&args, i);
                i += 1;
            }
            "--bulk" => {
                opts.config = Config::bulk();
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN receiver

Usage: gbn-recv [OPTIONS]

Options:
  -b, --bind <ADDR>      Local address (default: 0.0.0.0:9000)
  -o, --output <PATH>    Output file (default: stdout)
      --idle <MS>        Finish after this much silence (default: 5000)
      --bulk             Large frames (must match the sender)
  -h, --help             Print this help
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = parse_args();

    let receiver = UdpReceiver::bind(opts.config, opts.bind_addr).await?;
    info!("listening on {}", receiver.local_addr()?);

    let messages = receiver.receive_all().await?;
    let data = reassemble(&messages);

    match &opts.output_path {
        Some(path) => {
            tokio::fs::write(path, &data).await?;
            info!("wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }

    info!("{}", receiver.progress().read().summary());
    Ok(())
}
