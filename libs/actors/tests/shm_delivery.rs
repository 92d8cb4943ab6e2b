//! Counter round trip: main -> a1 -> a2 -> a1 -> main, each hop adds one

use actors::{ActorContext, ProcessManager};
use channel_types::{
    ChannelBackend, ChannelKind, ChannelSpec, DataItem, ElementType, Participant, PortInitializer,
};
use channels::{Channel, RecvEndpoint, SendEndpoint};
use infra_config::InfrastructureConfig;
use std::time::{Duration, Instant};

const ELEMENTS: usize = 10_000;
const DEPTH: usize = 128;

fn spec(backend: ChannelBackend, from: &str, to: &str) -> ChannelSpec {
    let name = format!("{from}_to_{to}");
    ChannelSpec::Inter {
        kind: ChannelKind::HostToHost,
        backend,
        src: Participant::Actor(from.into()),
        dst: Participant::Actor(to.into()),
        src_port: PortInitializer::new(name.clone(), vec![ELEMENTS], ElementType::I64, DEPTH),
        dst_port: PortInitializer::new(name, vec![ELEMENTS], ElementType::I64, DEPTH),
    }
}

fn bump(item: DataItem) -> anyhow::Result<DataItem> {
    let mut values = item.to_vec::<i64>()?;
    values[0] += 1;
    Ok(DataItem::from_slice(vec![ELEMENTS], &values)?)
}

struct RelayPorts {
    from_main: RecvEndpoint,
    to_main: SendEndpoint,
    to_a2: SendEndpoint,
    from_a2: RecvEndpoint,
}

fn relay_a1(mut ctx: ActorContext, (rounds, ports): (usize, RelayPorts)) -> anyhow::Result<()> {
    ports.from_main.start()?;
    ports.to_main.start()?;
    ports.to_a2.start()?;
    ports.from_a2.start()?;

    for _ in 0..rounds {
        if !ctx.checkpoint() {
            break;
        }
        let item = bump(ports.from_main.recv()?)?;
        ports.to_a2.send(&item)?;
        let item = bump(ports.from_a2.recv()?)?;
        ports.to_main.send(&item)?;
    }

    ports.to_a2.join();
    ports.to_main.join();
    ports.from_main.join();
    ports.from_a2.join();
    Ok(())
}

fn relay_a2(
    mut ctx: ActorContext,
    (rounds, from_a1, to_a1): (usize, RecvEndpoint, SendEndpoint),
) -> anyhow::Result<()> {
    from_a1.start()?;
    to_a1.start()?;

    for _ in 0..rounds {
        if !ctx.checkpoint() {
            break;
        }
        let item = bump(from_a1.recv()?)?;
        to_a1.send(&item)?;
    }

    to_a1.join();
    from_a1.join();
    Ok(())
}

fn run_loop(backend: ChannelBackend, rounds: usize, pause_midway: bool) -> i64 {
    let manager = ProcessManager::new(InfrastructureConfig::default()).unwrap();
    let build = |from: &str, to: &str| -> Channel { manager.channel(spec(backend, from, to)).unwrap() };

    let (to_a1, mp_from_main) = build("mp", "a1").into_endpoints();
    let (a1_to_main, from_a1) = build("a1", "mp").into_endpoints();
    let (a1_to_a2, a2_from_a1) = build("a1", "a2").into_endpoints();
    let (a2_to_a1, a1_from_a2) = build("a2", "a1").into_endpoints();

    manager
        .build_actor(
            "a1",
            relay_a1,
            (
                rounds,
                RelayPorts {
                    from_main: mp_from_main,
                    to_main: a1_to_main,
                    to_a2: a1_to_a2,
                    from_a2: a1_from_a2,
                },
            ),
        )
        .unwrap();
    manager
        .build_actor("a2", relay_a2, (rounds, a2_from_a1, a2_to_a1))
        .unwrap();
    manager.start().unwrap();

    to_a1.start().unwrap();
    from_a1.start().unwrap();

    let mut values = vec![0i64; ELEMENTS];
    values[..10].fill(1);
    let mut item = DataItem::from_slice(vec![ELEMENTS], &values).unwrap();

    let started = Instant::now();
    for round in 0..rounds {
        if pause_midway && round == rounds / 2 {
            manager.pause().unwrap();
            std::thread::sleep(Duration::from_millis(20));
            manager.start().unwrap();
        }
        to_a1.send(&item).unwrap();
        item = from_a1.recv().unwrap();
    }
    tracing::info!(
        backend = %backend,
        rounds,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Counter loop finished"
    );

    to_a1.join();
    from_a1.join();
    manager.stop();
    let report = manager.cleanup(true);
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.joined.len(), 2);

    let values = item.to_vec::<i64>().unwrap();
    assert!(values[1..10].iter().all(|&v| v == 1));
    assert!(values[10..].iter().all(|&v| v == 0));
    values[0]
}

#[test_log::test]
fn shared_memory_loop() {
    let rounds = 200;
    assert_eq!(run_loop(ChannelBackend::SharedMemory, rounds, false), 1 + 3 * rounds as i64);
}

#[test_log::test]
fn native_shared_memory_loop() {
    let rounds = 200;
    assert_eq!(
        run_loop(ChannelBackend::NativeSharedMemory, rounds, false),
        1 + 3 * rounds as i64
    );
}

#[test_log::test]
fn socket_loop() {
    let rounds = 50;
    assert_eq!(run_loop(ChannelBackend::Socket, rounds, false), 1 + 3 * rounds as i64);
}

#[test_log::test]
fn pause_and_resume_keep_channel_state() {
    let rounds = 100;
    assert_eq!(run_loop(ChannelBackend::SharedMemory, rounds, true), 1 + 3 * rounds as i64);
}
