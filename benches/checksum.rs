use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gbn::{checksum, Config, Packet, SeqNum, Simulation, SimConfig};

fn checksum_benchmark(c: &mut Criterion) {
    let frame: Vec<u8> = (0..gbn::DEFAULT_PACKET_SIZE as u32).map(|i| (i * 31) as u8).collect();

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("compute 128B", |b| b.iter(|| checksum::compute(black_box(&frame))));
    group.bench_function("verify data packet", |b| {
        let packet = Packet::data(SeqNum::ZERO, &frame[..100], gbn::DEFAULT_PACKET_SIZE);
        b.iter(|| black_box(&packet).is_corrupted())
    });
    group.finish();
}

fn simulation_benchmark(c: &mut Criterion) {
    let payload = vec![0x5au8; 64 * 1024];
    let sim = SimConfig {
        loss_rate: 0.05,
        corrupt_rate: 0.02,
        ..SimConfig::default()
    };

    c.bench_function("simulate 64KiB, 5% loss", |b| {
        b.iter(|| {
            let mut s = Simulation::new(Config::default(), sim.clone()).unwrap();
            s.send_message(&payload).unwrap();
            black_box(s.run(std::time::Duration::from_secs(3_600)))
        })
    });
}

criterion_group!(benches, checksum_benchmark, simulation_benchmark);
criterion_main!(benches);
