//! GBN sender - reliable file transfer over UDP
//!
//! Usage:
//!   cargo run --release --bin gbn-send -- [OPTIONS]
//!
//! Example:
//!   cargo run --release --bin gbn-send -- --peer 127.0.0.1:9000 --file data.bin

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gbn::{Config, UdpSender};

struct SendArgs {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    file_path: Option<PathBuf>,
    message_size: usize,
    config: Config,
}

impl Default for SendArgs {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            file_path: None,
            message_size: 4096,
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

fn parse_args() -> SendArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = SendArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                opts.bind_addr = value(&args, i);
                i += 1;
            }
            "--peer" | "-p" => {
                opts.peer_addr = value(&args, i);
                i += 1;
            }
            "--file" | "-f" => {
                opts.file_path = Some(value(&args, i));
                i += 1;
            }
            "--message-size" | "-m" => {
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
            "--lossy" => {
                opts.config = Config::lossy_link();
            }
            "--bulk" => {
                opts.config = Config::bulk();
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN sender

Usage: gbn-send [OPTIONS]

Options:
  -b, --bind <ADDR>          Local address (default: 0.0.0.0:0)
  -p, --peer <ADDR>          Receiver address (default: 127.0.0.1:9000)
  -f, --file <PATH>          File to send (default: stdin)
  -m, --message-size <N>     Bytes per message (default: 4096)
  -w, --window <N>           Window size (default: 10)
  -t, --timeout <MS>         Retransmission timeout (default: 300)
      --lossy                Small window, long timeout
      --bulk                 Large frames, large window
  -h, --help                 Print this help
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
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let opts = parse_args();

    let data = match &opts.file_path {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut buf).await?;
            buf
        }
    };
    let data = Bytes::from(data);
    info!("sending {} bytes to {}", data.len(), opts.peer_addr);

    let message_size = opts.message_size.max(1);
    let messages: Vec<Bytes> = (0..data.len())
        .step_by(message_size)
        .map(|start| data.slice(start..(start + message_size).min(data.len())))
        .collect();

    let sender = UdpSender::bind(opts.config, opts.bind_addr, opts.peer_addr).await?;
    info!("bound to {}", sender.local_addr()?);

    let progress = sender.progress();
    let reporter = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.tick().await;
        loop {
            tick.tick().await;
            info!("progress: {}", progress.read().summary());
        }
    });

    let result = sender.send_all(messages).await;
    reporter.abort();

    let stats = result?;
    info!(
        "done in {:.2}s: {}",
        stats.elapsed().as_secs_f64(),
        stats.summary()
    );
    Ok(())
}
