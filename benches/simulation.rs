use criterion::{black_box, criterion_group, criterion_main, Criterion};

use driftbot::config::ServerSettings;
use driftbot::game::physics;
use driftbot::game::player::Player;
use driftbot::map::Map;
use driftbot::net::codec::{PacketReader, PacketWriter};
use driftbot::net::protocol::{BatchedLargeRecord, BatchedMotion};
use driftbot::util::vec2::Vec2;

fn bench_batched_decode(c: &mut Criterion) {
    // One batched-large packet carrying 16 records.
    let mut w = PacketWriter::new();
    w.write_u8(0x39);
    for i in 0..16u16 {
        let record = BatchedLargeRecord {
            pid: i,
            togglables: 0b000101,
            motion: BatchedMotion {
                direction: (i % 40) as u8,
                timestamp: 100 + i,
                x: 6400 + i * 16,
                y: 4800,
                vel_x: 320,
                vel_y: -240,
            },
        };
        record.encode(&mut w);
    }
    let data = w.into_vec();

    c.bench_function("batched_large_decode_16", |b| {
        b.iter(|| {
            let mut r = PacketReader::new(black_box(&data));
            r.read_u8();
            let mut count = 0;
            while r.remaining() >= BatchedLargeRecord::SIZE {
                if BatchedLargeRecord::decode(&mut r).is_some() {
                    count += 1;
                }
            }
            black_box(count)
        })
    });
}

fn bench_forward_simulation(c: &mut Criterion) {
    let mut map = Map::new();
    for y in 0..1024 {
        map.set_tile(520, y, 1);
    }
    let settings = ServerSettings::default();

    c.bench_function("forward_sim_50_ticks", |b| {
        b.iter(|| {
            let mut player = Player {
                ship: 0,
                timestamp: 1,
                position: Vec2::new(500.0, 500.0),
                velocity: Vec2::new(8.0, 1.5),
                ..Default::default()
            };
            for tick in 0..50 {
                physics::simulate_player(
                    &mut player,
                    0.01,
                    true,
                    black_box(&map),
                    &settings,
                    tick,
                );
            }
            black_box(player.position)
        })
    });
}

criterion_group!(benches, bench_batched_decode, bench_forward_simulation);
criterion_main!(benches);
