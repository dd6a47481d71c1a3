// BLE Energy - Radio energy accounting for simulated BLE devices
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Energy stores and the device models drawing from them
//!
//! The store decides when its energy is exhausted or replenished; device
//! models only account for what they draw and react to the store's
//! notifications. Notifications are delivered synchronously from
//! [`EnergySource::update_energy_source`], so a model may be re-entered
//! while one of its own calls is still on the stack.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::config::BasicEnergySourceConfig;
use crate::error::Result;
use crate::scheduler::{Scheduler, Timer};

/// What an energy store sees of a device drawing from it
pub trait DeviceEnergyModel {
    /// Energy consumed so far, in joules
    fn total_energy_consumption(&self) -> Result<f64>;

    /// Current drawn right now, in amperes
    fn current_a(&self) -> f64;

    /// The store crossed its depletion threshold
    fn handle_energy_depletion(&self) -> Result<()>;

    /// The store climbed back above its recharge threshold
    fn handle_energy_recharged(&self) -> Result<()>;

    /// Remaining energy changed without crossing a threshold
    fn handle_energy_changed(&self) -> Result<()>;
}

/// Finite energy store shared by the device models of one node
pub trait EnergySource {
    /// Remaining energy in joules
    fn remaining_energy(&self) -> f64;

    /// Supply voltage in volts
    fn supply_voltage(&self) -> f64;

    /// Energy the store started with, in joules
    fn initial_energy(&self) -> f64;

    /// Recompute remaining energy up to now
    ///
    /// May synchronously call the depletion, recharge or changed handler of
    /// any registered model.
    fn update_energy_source(&self) -> Result<()>;

    /// Add a device model to the set notified by this store
    fn register_device_model(&self, model: Weak<dyn DeviceEnergyModel>);
}

/// Ideal battery with linear drain
///
/// Remaining energy drops by `Σ I × V × Δt` over the registered models.
/// The store is depleted once remaining energy falls to the low threshold
/// and recharged when it rises above the high threshold; both thresholds
/// are fractions of the initial energy. Remaining energy is refreshed on
/// every model notification and periodically on its own.
pub struct BasicEnergySource {
    config: BasicEnergySourceConfig,
    remaining_j: Cell<f64>,
    last_update: Cell<Duration>,
    depleted: Cell<bool>,
    models: RefCell<Vec<Weak<dyn DeviceEnergyModel>>>,
    update_timer: Timer,
    self_ref: Weak<Self>,
}

impl BasicEnergySource {
    /// Create a full store and start its periodic updates
    pub fn new(scheduler: Rc<dyn Scheduler>, config: BasicEnergySourceConfig) -> Result<Rc<Self>> {
        config.validate()?;
        let now = scheduler.now();
        let source = Rc::new_cyclic(|weak| Self {
            remaining_j: Cell::new(config.initial_energy_j),
            last_update: Cell::new(now),
            depleted: Cell::new(false),
            models: RefCell::new(Vec::new()),
            update_timer: Timer::new(scheduler),
            self_ref: weak.clone(),
            config,
        });
        source.arm_periodic_update();
        Ok(source)
    }

    /// Configuration in use
    pub fn config(&self) -> &BasicEnergySourceConfig {
        &self.config
    }

    /// Remaining energy as a fraction of the initial energy
    pub fn energy_fraction(&self) -> f64 {
        if self.config.initial_energy_j == 0.0 {
            return 0.0;
        }
        self.remaining_j.get() / self.config.initial_energy_j
    }

    /// Check whether the store is below its depletion threshold
    pub fn is_depleted(&self) -> bool {
        self.depleted.get()
    }

    /// Sum of the currents drawn by live models
    pub fn total_current_a(&self) -> f64 {
        self.live_models().iter().map(|m| m.current_a()).sum()
    }

    /// Inject harvested energy, capped at the initial energy
    pub fn increase_remaining_energy(&self, energy_j: f64) -> Result<()> {
        self.update_energy_source()?;
        let previous = self.remaining_j.get();
        let refilled = (previous + energy_j.max(0.0)).min(self.config.initial_energy_j);
        log::debug!("harvested {} J, remaining {} J", refilled - previous, refilled);
        self.remaining_j.set(refilled);
        self.notify_models(previous)
    }

    fn arm_periodic_update(&self) {
        let weak = self.self_ref.clone();
        self.update_timer.arm(
            self.config.update_interval,
            Box::new(move || match weak.upgrade() {
                Some(source) => source.update_energy_source(),
                None => Ok(()),
            }),
        );
    }

    fn live_models(&self) -> Vec<Rc<dyn DeviceEnergyModel>> {
        let mut models = self.models.borrow_mut();
        models.retain(|m| m.strong_count() > 0);
        models.iter().filter_map(Weak::upgrade).collect()
    }

    /// Compare against the threshold bands and tell every model what happened
    fn notify_models(&self, previous_j: f64) -> Result<()> {
        let remaining = self.remaining_j.get();
        let initial = self.config.initial_energy_j;

        if !self.depleted.get() && remaining <= self.config.low_battery_threshold * initial {
            self.depleted.set(true);
            log::debug!("energy source depleted, {} J left", remaining);
            for model in self.live_models() {
                model.handle_energy_depletion()?;
            }
        } else if self.depleted.get() && remaining > self.config.high_battery_threshold * initial {
            self.depleted.set(false);
            log::debug!("energy source recharged, {} J available", remaining);
            for model in self.live_models() {
                model.handle_energy_recharged()?;
            }
        } else if remaining != previous_j {
            for model in self.live_models() {
                model.handle_energy_changed()?;
            }
        }
        Ok(())
    }
}

impl EnergySource for BasicEnergySource {
    fn remaining_energy(&self) -> f64 {
        self.remaining_j.get()
    }

    fn supply_voltage(&self) -> f64 {
        self.config.supply_voltage_v
    }

    fn initial_energy(&self) -> f64 {
        self.config.initial_energy_j
    }

    fn update_energy_source(&self) -> Result<()> {
        self.update_timer.cancel();

        let now = self.update_timer.now();
        let elapsed = now.saturating_sub(self.last_update.get());
        let previous = self.remaining_j.get();
        let drained = self.total_current_a() * self.config.supply_voltage_v * elapsed.as_secs_f64();
        self.remaining_j.set((previous - drained).max(0.0));
        self.last_update.set(now);
        log::trace!("energy source at {:?}: {} J remaining", now, self.remaining_j.get());

        let result = self.notify_models(previous);

        // A nested update may already have re-armed the timer
        if !self.update_timer.is_pending() {
            self.arm_periodic_update();
        }
        result
    }

    fn register_device_model(&self, model: Weak<dyn DeviceEnergyModel>) {
        self.models.borrow_mut().push(model);
    }
}

impl fmt::Debug for BasicEnergySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicEnergySource")
            .field("remaining_j", &self.remaining_j.get())
            .field("initial_j", &self.config.initial_energy_j)
            .field("depleted", &self.depleted.get())
            .field("models", &self.models.borrow().len())
            .finish()
    }
}
