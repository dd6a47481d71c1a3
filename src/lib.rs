//! # BLE Energy - Radio energy accounting for simulated BLE devices
//!
//! Tracks what a BLE radio draws from a finite energy store while a
//! discrete-event simulation drives its PHY through receive, transmit and
//! idle periods.
//!
//! ## Key Features
//!
//! - **State-based accounting**: energy integrated per power state at the supply voltage
//! - **Forced off**: the radio is switched off the moment its store would run dry
//! - **PHY listener**: PHY activity notifications translated into state changes
//! - **Transmit current models**: current derived from the transmit power
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use ble_energy::{
//!     BasicEnergySource, BasicEnergySourceConfig, RadioEnergyModelHelper, Simulator,
//! };
//!
//! let sim = Simulator::new();
//! let source = BasicEnergySource::new(sim.clone(), BasicEnergySourceConfig::default()).unwrap();
//! let model = RadioEnergyModelHelper::new().install(sim.clone(), source).unwrap();
//!
//! // Transmit for 1 ms, then let the listener revert to idle
//! model
//!     .phy_listener()
//!     .notify_tx_start(Duration::from_millis(1), 0.0)
//!     .unwrap();
//! sim.run_until(Duration::from_secs(1)).unwrap();
//!
//! assert!(model.total_energy_consumption().unwrap() > 0.0);
//! ```
//!
//! ## Modules
//!
//! - [`model`]: Radio energy model and its state machine
//! - [`listener`]: PHY activity listener
//! - [`source`]: Energy source and device model seams
//! - [`tx_current`]: Transmit current models
//! - [`scheduler`]: Simulated time and timers
//! - [`helper`]: Installation of models on sources

// Modules
pub mod config;
pub mod error;
pub mod helper;
pub mod listener;
pub mod model;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod tx_current;

// Re-exports for convenient access
pub use config::{BasicEnergySourceConfig, RadioEnergyConfig, TxCurrentModelConfig};
pub use error::{EnergyError, InvariantError, Result};
pub use helper::RadioEnergyModelHelper;
pub use listener::{ChangeStateCallback, PhyListener, UpdateTxCurrentCallback};
pub use model::{EnergyCallback, RadioEnergyModel};
pub use scheduler::{Event, EventId, Scheduler, Simulator, Timer};
pub use source::{BasicEnergySource, DeviceEnergyModel, EnergySource};
pub use state::{PowerState, PowerStateTable};
pub use tx_current::{dbm_to_w, ConstantTxCurrentModel, LinearTxCurrentModel, TxCurrentModel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
