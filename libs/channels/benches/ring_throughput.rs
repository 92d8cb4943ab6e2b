//! Send/recv throughput across backends and item sizes
//!
//! Each iteration pushes one item through a started channel and takes it
//! back out on the same thread, so the numbers include both listener
//! round trips.

use channel_types::{BufferDescriptor, ChannelBackend, DataItem, ElementType};
use channels::{Channel, SharedMemoryManager};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn open(allocator: &SharedMemoryManager, backend: ChannelBackend, elements: usize) -> Channel {
    let descriptor = BufferDescriptor::new(vec![elements], ElementType::F64).unwrap();
    let channel = match backend {
        ChannelBackend::Socket => Channel::socket("bench.out", "bench.in", descriptor, 32),
        _ => Channel::shared_memory(allocator, backend, "bench.out", "bench.in", descriptor, 32),
    }
    .unwrap();
    channel.start().unwrap();
    channel
}

fn bench_ping(c: &mut Criterion) {
    let allocator = SharedMemoryManager::new();
    let mut group = c.benchmark_group("send_recv");

    for backend in [
        ChannelBackend::SharedMemory,
        ChannelBackend::NativeSharedMemory,
        ChannelBackend::Socket,
    ] {
        for elements in [1usize, 64, 4096] {
            let channel = open(&allocator, backend, elements);
            let item = DataItem::from_slice(vec![elements], &vec![1.0f64; elements]).unwrap();
            group.throughput(Throughput::Bytes((elements * 8) as u64));

            group.bench_with_input(
                BenchmarkId::new(backend.to_string(), elements),
                &item,
                |b, item| {
                    b.iter(|| {
                        channel.src_port().send(item).unwrap();
                        criterion::black_box(channel.dst_port().recv().unwrap());
                    })
                },
            );
            channel.join();
        }
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let allocator = SharedMemoryManager::new();
    let channel = open(&allocator, ChannelBackend::SharedMemory, 16);
    let item = DataItem::from_slice(vec![16], &[0.5f64; 16]).unwrap();

    c.bench_function("fill_then_drain_32", |b| {
        b.iter(|| {
            for _ in 0..32 {
                channel.src_port().send(&item).unwrap();
            }
            for _ in 0..32 {
                criterion::black_box(channel.dst_port().recv().unwrap());
            }
        })
    });
    channel.join();
}

criterion_group!(benches, bench_ping, bench_batch);
criterion_main!(benches);
