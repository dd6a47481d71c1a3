//! Benchmarks for BLE energy accounting performance

use ble_energy::{
    BasicEnergySource, BasicEnergySourceConfig, LinearTxCurrentModel, PowerState,
    RadioEnergyModel, RadioEnergyModelHelper, Scheduler, Simulator, TxCurrentModel,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::rc::Rc;
use std::time::Duration;

fn setup(initial_energy_j: f64) -> (Rc<Simulator>, Rc<RadioEnergyModel>) {
    let sim = Simulator::new();
    let source = BasicEnergySource::new(
        sim.clone(),
        BasicEnergySourceConfig::with_initial_energy(initial_energy_j),
    )
    .unwrap();
    let model = RadioEnergyModelHelper::new()
        .install(sim.clone(), source)
        .unwrap();
    (sim, model)
}

fn bench_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitions");

    let states = [PowerState::Idle, PowerState::Rx, PowerState::Tx];
    group.throughput(Throughput::Elements(1000));

    group.bench_function("change_state_1000", |b| {
        let (sim, model) = setup(1_000_000.0);
        b.iter(|| {
            for i in 0..1000 {
                model.change_state(states[i % states.len()]).unwrap();
                sim.advance(Duration::from_micros(100)).unwrap();
            }
            black_box(model.current_state());
        })
    });

    group.finish();
}

fn bench_listener(c: &mut Criterion) {
    let mut group = c.benchmark_group("listener");

    group.throughput(Throughput::Elements(1000));

    group.bench_function("tx_bursts_1000", |b| {
        let (sim, model) = setup(1_000_000.0);
        let listener = model.phy_listener();
        b.iter(|| {
            for _ in 0..1000 {
                listener
                    .notify_tx_start(Duration::from_micros(376), 0.0)
                    .unwrap();
                sim.advance(Duration::from_millis(1)).unwrap();
            }
            black_box(model.total_energy_consumption().unwrap());
        })
    });

    group.finish();
}

fn bench_simulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulator");

    group.throughput(Throughput::Elements(1000));

    group.bench_function("schedule_run_1000", |b| {
        b.iter(|| {
            let sim = Simulator::new();
            for i in 0..1000u64 {
                sim.schedule(Duration::from_micros((i * 7919) % 1000), Box::new(|| Ok(())));
            }
            sim.run().unwrap();
            black_box(sim.now());
        })
    });

    group.finish();
}

fn bench_tx_current(c: &mut Criterion) {
    let mut group = c.benchmark_group("tx_current");

    let model = LinearTxCurrentModel::default();
    group.bench_function("linear_-20_to_10_dbm", |b| {
        b.iter(|| {
            for dbm in -20..=10 {
                black_box(model.calc_tx_current(dbm as f64));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_transitions,
    bench_listener,
    bench_simulator,
    bench_tx_current,
);

criterion_main!(benches);
