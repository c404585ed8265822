//! Loopback transfers through the tokio UDP driver

use std::time::Duration;

use bytes::Bytes;
use gbn::{reassemble, Config, Error, UdpReceiver, UdpSender};
use tokio::net::UdpSocket;

fn config() -> Config {
    Config {
        timeout_ms: 100,
        idle_timeout_ms: 1_000,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_loopback_transfer() {
    let receiver = UdpReceiver::bind(config(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let peer = receiver.local_addr().unwrap();

    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7) as u8).collect();
    let messages: Vec<Bytes> = data.chunks(1_000).map(Bytes::copy_from_slice).collect();

    let receiving = tokio::spawn(async move { receiver.receive_all().await });

    let sender = UdpSender::bind(config(), "127.0.0.1:0".parse().unwrap(), peer)
        .await
        .unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(30), sender.send_all(messages))
        .await
        .expect("sender finished")
        .unwrap();

    assert_eq!(stats.messages, 20);
    assert_eq!(stats.bytes, data.len() as u64);
    assert_eq!(sender.progress().read().messages, 20);

    let delivered = tokio::time::timeout(Duration::from_secs(30), receiving)
        .await
        .expect("receiver finished")
        .unwrap()
        .unwrap();
    assert_eq!(reassemble(&delivered), data);
}

#[tokio::test]
async fn test_sender_gives_up_without_peer() {
    // bound but never read, so no ACK ever comes back
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer = silent.local_addr().unwrap();

    let config = Config {
        timeout_ms: 50,
        idle_timeout_ms: 300,
        ..Config::default()
    };
    let sender = UdpSender::bind(config, "127.0.0.1:0".parse().unwrap(), peer)
        .await
        .unwrap();

    let result = sender.send_all(vec![Bytes::from_static(b"hello")]).await;
    assert!(matches!(result, Err(Error::TransferTimeout)));

    let progress = sender.progress();
    let stats = progress.read();
    assert!(stats.timeouts >= 1);
    assert!(stats.retransmissions >= 1);
}

#[tokio::test]
async fn test_empty_transfer_finishes_immediately() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sender = UdpSender::bind(
        config(),
        "127.0.0.1:0".parse().unwrap(),
        silent.local_addr().unwrap(),
    )
    .await
    .unwrap();

    let stats = sender.send_all(Vec::new()).await.unwrap();
    assert_eq!(stats.messages, 0);
}
