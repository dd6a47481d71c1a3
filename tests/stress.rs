//! Stress tests for BLE energy accounting
//!
//! Run with: cargo test --release stress -- --ignored

use ble_energy::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_transitions() {
    let sim = Simulator::new();
    let source = BasicEnergySource::new(
        sim.clone(),
        BasicEnergySourceConfig::with_initial_energy(1_000_000.0),
    )
    .unwrap();
    let model = RadioEnergyModelHelper::new()
        .install(sim.clone(), source.clone())
        .unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let iterations = 1_000_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let state = match rng.gen_range(0..3) {
            0 => PowerState::Idle,
            1 => PowerState::Rx,
            _ => PowerState::Tx,
        };
        model.change_state(state).unwrap();
        sim.advance(Duration::from_micros(rng.gen_range(1..500))).unwrap();
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Accounted {} transitions in {:?}", iterations, elapsed);
    println!("Rate: {:.0} transitions/second", rate);

    let total = model.total_energy_consumption().unwrap();
    assert!((source.remaining_energy() + total - 1_000_000.0).abs() < 1e-3);
    assert!(
        rate > 100_000.0,
        "Should account at least 100k transitions/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_advertising_fleet() {
    let sim = Simulator::new();
    let helper = RadioEnergyModelHelper::new();

    let num_nodes = 100;
    let bursts_per_node = 1000;

    let models: Vec<_> = (0..num_nodes)
        .map(|_| {
            let source =
                BasicEnergySource::new(sim.clone(), BasicEnergySourceConfig::default()).unwrap();
            helper.install(sim.clone(), source).unwrap()
        })
        .collect();

    let start = Instant::now();

    for burst in 0..bursts_per_node {
        for (node, model) in models.iter().enumerate() {
            let listener = model.phy_listener();
            let at = Duration::from_millis(100) * burst + Duration::from_micros(node as u64 * 500);
            sim.schedule(
                at,
                Box::new(move || listener.notify_tx_start(Duration::from_micros(376), 0.0)),
            );
        }
    }
    sim.run_until(Duration::from_secs(101)).unwrap();

    let elapsed = start.elapsed();
    let total_bursts = num_nodes * bursts_per_node as usize;
    let rate = total_bursts as f64 / elapsed.as_secs_f64();

    println!("Simulated {} bursts in {:?}", total_bursts, elapsed);
    println!("Rate: {:.0} bursts/second", rate);

    for model in &models {
        assert_eq!(model.current_state(), PowerState::Idle);
    }
    assert!(
        rate > 10_000.0,
        "Should simulate at least 10k bursts/s, got {:.0}",
        rate
    );
}
