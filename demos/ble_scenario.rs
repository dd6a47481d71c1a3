//! Advertiser and scanner energy example
//!
//! This example runs a BLE advertiser on a small battery next to a scanner
//! on a large one, and shows how the advertiser's radio is switched off
//! once its battery runs dry.
//!
//! Run with: `cargo run --example ble_scenario`

use ble_energy::{
    BasicEnergySource, BasicEnergySourceConfig, EnergySource, PowerState, RadioEnergyModel,
    RadioEnergyModelHelper, Result, Scheduler, Simulator,
};
use std::rc::Rc;
use std::time::Duration;

/// Air time of one advertising PDU at 1 Mbit/s
const PACKET_AIR_TIME: Duration = Duration::from_micros(376);

/// Interval between two advertising events
const ADVERTISING_INTERVAL: Duration = Duration::from_millis(1);

const SIMULATION_TIME: Duration = Duration::from_secs(70);

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// One simulated device: a radio and the battery it draws from
struct Node {
    name: &'static str,
    source: Rc<BasicEnergySource>,
    radio: Rc<RadioEnergyModel>,
}

impl Node {
    fn new(sim: &Rc<Simulator>, name: &'static str, initial_energy_j: f64) -> Result<Self> {
        let source = BasicEnergySource::new(
            sim.clone(),
            BasicEnergySourceConfig::with_initial_energy(initial_energy_j),
        )?;
        let radio = RadioEnergyModelHelper::new().install(sim.clone(), source.clone())?;
        Ok(Self {
            name,
            source,
            radio,
        })
    }

    fn report(&self, now: Duration) -> Result<()> {
        let total = self.radio.total_energy_consumption()?;
        println!(
            "{:>6.1}s  {:<12} {:<8} {:>12.6} {:>12.6}",
            now.as_secs_f64(),
            self.name,
            self.radio.current_state().name(),
            self.source.remaining_energy(),
            total
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    println!("=== BLE Energy Scenario ===\n");

    let sim = Simulator::new();
    let advertiser = Rc::new(Node::new(&sim, "advertiser", 1.0)?);
    let scanner = Rc::new(Node::new(&sim, "scanner", 100.0)?);

    // Every advertising event is heard by the scanner
    let events = SIMULATION_TIME.as_micros() / ADVERTISING_INTERVAL.as_micros();
    for i in 0..events as u32 {
        let at = ADVERTISING_INTERVAL * i;

        let tx = advertiser.radio.phy_listener();
        sim.schedule(
            at,
            Box::new(move || tx.notify_tx_start(PACKET_AIR_TIME, 0.0)),
        );

        let rx = scanner.radio.phy_listener();
        sim.schedule(at, Box::new(move || rx.notify_rx_start(PACKET_AIR_TIME)));
        let rx = scanner.radio.phy_listener();
        sim.schedule(at + PACKET_AIR_TIME, Box::new(move || rx.notify_rx_end_ok()));
    }

    println!(
        "{:>7}  {:<12} {:<8} {:>12} {:>12}",
        "Time", "Node", "State", "Remaining J", "Consumed J"
    );
    println!("{}", "-".repeat(56));

    let reports = SIMULATION_TIME.as_secs() / REPORT_INTERVAL.as_secs();
    for i in 1..=reports as u32 {
        let nodes = [Rc::clone(&advertiser), Rc::clone(&scanner)];
        let clock = Rc::clone(&sim);
        sim.schedule(
            REPORT_INTERVAL * i,
            Box::new(move || {
                for node in &nodes {
                    node.report(clock.now())?;
                }
                Ok(())
            }),
        );
    }

    sim.run_until(SIMULATION_TIME)?;
    println!("{}", "-".repeat(56));

    println!("\n=== Summary ===\n");
    for node in [&advertiser, &scanner] {
        let status = if node.radio.current_state() == PowerState::Off {
            "radio switched off"
        } else {
            "radio running"
        };
        println!(
            "{:<12} {:.6} J consumed, {:.1}% left, {}",
            node.name,
            node.radio.total_energy_consumption()?,
            node.source.energy_fraction() * 100.0,
            status
        );
    }

    Ok(())
}
