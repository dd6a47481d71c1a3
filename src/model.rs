// BLE Energy - Radio energy accounting for simulated BLE devices
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio energy model
//!
//! Tracks the power state of one radio, integrates the energy it draws from
//! its [`EnergySource`] and keeps a single forced-off timer armed for the
//! moment the store would run dry in the current state.
//!
//! ## Re-entrancy
//!
//! Accounting a transition notifies the energy source, which may call the
//! depletion or recharge handler synchronously, which may in turn request
//! another transition before the first one returned. The model counts the
//! transitions on the stack: a nested request for OFF takes effect
//! immediately, and only the outermost call commits its requested state,
//! unless the radio was switched off underneath it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::config::RadioEnergyConfig;
use crate::error::{EnergyError, InvariantError, Result};
use crate::listener::PhyListener;
use crate::scheduler::{Scheduler, Timer};
use crate::source::{DeviceEnergyModel, EnergySource};
use crate::state::{PowerState, PowerStateTable};
use crate::tx_current::TxCurrentModel;

/// Zero-argument hook run on depletion or recharge of the energy source
pub type EnergyCallback = Rc<dyn Fn() -> Result<()>>;

/// Relative slack on the `consumed <= initial` check, absorbs float rounding
const CONSUMPTION_TOLERANCE: f64 = 1e-9;

/// Energy model of a BLE radio
pub struct RadioEnergyModel {
    scheduler: Rc<dyn Scheduler>,
    source: RefCell<Option<Rc<dyn EnergySource>>>,
    currents: Cell<PowerStateTable>,
    tx_current_model: RefCell<Option<Rc<dyn TxCurrentModel>>>,

    state: Cell<PowerState>,
    last_update: Cell<Duration>,
    total_energy_j: Cell<f64>,
    pending_transitions: Cell<u32>,
    switch_to_off: Timer,

    depletion_callback: RefCell<Option<EnergyCallback>>,
    recharged_callback: RefCell<Option<EnergyCallback>>,
    listener: Rc<PhyListener>,
    self_ref: Weak<Self>,
}

impl RadioEnergyModel {
    /// Create a model in IDLE with its PHY listener wired back to it
    pub fn new(scheduler: Rc<dyn Scheduler>, config: RadioEnergyConfig) -> Result<Rc<Self>> {
        config.validate()?;
        let now = scheduler.now();

        Ok(Rc::new_cyclic(|weak: &Weak<Self>| {
            let listener = PhyListener::new(Rc::clone(&scheduler));

            let model = weak.clone();
            listener.set_change_state_callback(Rc::new(move |state: PowerState| -> Result<()> {
                match model.upgrade() {
                    Some(model) => model.change_state(state),
                    None => Ok(()),
                }
            }));
            let model = weak.clone();
            listener.set_update_tx_current_callback(Rc::new(move |tx_power_dbm: f64| {
                if let Some(model) = model.upgrade() {
                    model.set_tx_current_from_model(tx_power_dbm);
                }
            }));

            Self {
                switch_to_off: Timer::new(Rc::clone(&scheduler)),
                scheduler,
                source: RefCell::new(None),
                currents: Cell::new(PowerStateTable::from_config(&config)),
                tx_current_model: RefCell::new(None),
                state: Cell::new(PowerState::Idle),
                last_update: Cell::new(now),
                total_energy_j: Cell::new(0.0),
                pending_transitions: Cell::new(0),
                depletion_callback: RefCell::new(None),
                recharged_callback: RefCell::new(None),
                listener,
                self_ref: weak.clone(),
            }
        }))
    }

    /// Attach the energy source and arm the forced-off timer for the current state
    pub fn set_energy_source(&self, source: Rc<dyn EnergySource>) -> Result<()> {
        log::trace!("attaching energy source");
        *self.source.borrow_mut() = Some(source);
        self.switch_to_off.cancel();
        let state = self.state.get();
        if state != PowerState::Off {
            self.arm_switch_to_off(state)?;
        }
        Ok(())
    }

    /// Request a transition to `new_state`
    ///
    /// Accounts the energy drawn in the current state since the last update,
    /// re-arms the forced-off timer and notifies the source. See the module
    /// docs for how nested requests are resolved.
    pub fn change_state(&self, new_state: PowerState) -> Result<()> {
        log::trace!("change state request: {}", new_state);
        self.pending_transitions.set(self.pending_transitions.get() + 1);
        let result = self.transition(new_state);
        self.pending_transitions.set(self.pending_transitions.get() - 1);
        result
    }

    fn transition(&self, new_state: PowerState) -> Result<()> {
        if self.pending_transitions.get() > 1 && new_state == PowerState::Off {
            // The outer call must not overwrite this
            self.set_radio_state(PowerState::Off);
            return Ok(());
        }

        let source = self.source()?;

        if new_state != PowerState::Off {
            self.switch_to_off.cancel();
            self.arm_switch_to_off(new_state)?;
        }

        let now = self.scheduler.now();
        let elapsed = self.elapsed_since_update(now)?;
        let energy = elapsed.as_secs_f64() * self.current_a() * source.supply_voltage();
        let total = self.total_energy_j.get() + energy;

        let initial = source.initial_energy();
        if total > initial * (1.0 + CONSUMPTION_TOLERANCE) {
            return Err(InvariantError::ConsumptionExceedsInitial {
                consumed: total,
                initial,
            }
            .into());
        }

        self.total_energy_j.set(total);
        self.last_update.set(now);

        source.update_energy_source()?;

        if self.pending_transitions.get() <= 1 && self.state.get() != PowerState::Off {
            self.set_radio_state(new_state);
            log::debug!("total energy consumption is {} J", self.total_energy_j.get());

            // Energy changes reported during the update were not applied to the timer
            self.switch_to_off.cancel();
            self.arm_switch_to_off(new_state)?;
        }
        Ok(())
    }

    /// How long the radio can stay in `state` before the store runs dry
    ///
    /// Zero when no energy is left, [`Duration::MAX`] when the state draws
    /// nothing. Undefined for OFF.
    pub fn maximum_time_in_state(&self, state: PowerState) -> Result<Duration> {
        if state == PowerState::Off {
            return Err(EnergyError::InvalidState {
                state,
                reason: "no maximum remaining time in OFF",
            });
        }
        let source = self.source()?;
        let power_w = self.currents.get().current_a(state) * source.supply_voltage();
        Ok(sustainable_duration(source.remaining_energy(), power_w))
    }

    /// Total energy consumed up to now, in joules
    ///
    /// Includes the interval since the last transition, drawn at the current
    /// state's rate, without committing it.
    pub fn total_energy_consumption(&self) -> Result<f64> {
        let source = self.source()?;
        let elapsed = self.elapsed_since_update(self.scheduler.now())?;
        let pending = elapsed.as_secs_f64() * self.current_a() * source.supply_voltage();
        let total = self.total_energy_j.get() + pending;

        source.update_energy_source()?;
        Ok(total)
    }

    /// Current draw of the current state, in amperes
    pub fn current_a(&self) -> f64 {
        self.currents.get().current_a(self.state.get())
    }

    /// Recompute the transmit current from the attached model, if any
    pub fn set_tx_current_from_model(&self, tx_power_dbm: f64) {
        let model = self.tx_current_model.borrow().clone();
        if let Some(model) = model {
            let current = model.calc_tx_current(tx_power_dbm);
            log::trace!("tx current {} A at {} dBm", current, tx_power_dbm);
            self.update_currents(|table| table.set_tx_a(current));
        }
    }

    pub fn set_tx_current_model(&self, model: Option<Rc<dyn TxCurrentModel>>) {
        *self.tx_current_model.borrow_mut() = model;
    }

    pub fn tx_current_model(&self) -> Option<Rc<dyn TxCurrentModel>> {
        self.tx_current_model.borrow().clone()
    }

    /// Invoke the depletion callback, if set
    pub fn handle_energy_depletion(&self) -> Result<()> {
        log::debug!("energy is depleted");
        let callback = self.depletion_callback.borrow().clone();
        match callback {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }

    /// Invoke the recharged callback, if set
    pub fn handle_energy_recharged(&self) -> Result<()> {
        log::debug!("energy is recharged");
        let callback = self.recharged_callback.borrow().clone();
        match callback {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }

    /// Re-arm the forced-off timer against the new remaining energy
    ///
    /// Deferred while a transition is in progress: the outermost transition
    /// re-arms for the state it commits once the source update returned.
    pub fn handle_energy_changed(&self) -> Result<()> {
        log::debug!("energy is changed");
        let state = self.state.get();
        if self.pending_transitions.get() == 0 && state != PowerState::Off {
            self.switch_to_off.cancel();
            self.arm_switch_to_off(state)?;
        }
        Ok(())
    }

    pub fn set_energy_depletion_callback(&self, callback: Option<EnergyCallback>) {
        if callback.is_none() {
            log::warn!("setting empty energy depletion callback");
        }
        *self.depletion_callback.borrow_mut() = callback;
    }

    pub fn set_energy_recharged_callback(&self, callback: Option<EnergyCallback>) {
        if callback.is_none() {
            log::warn!("setting empty energy recharged callback");
        }
        *self.recharged_callback.borrow_mut() = callback;
    }

    /// Listener to register with the PHY
    pub fn phy_listener(&self) -> Rc<PhyListener> {
        Rc::clone(&self.listener)
    }

    pub fn current_state(&self) -> PowerState {
        self.state.get()
    }

    /// Time of the last committed accounting update
    pub fn last_update_time(&self) -> Duration {
        self.last_update.get()
    }

    /// Check whether the forced-off timer is armed
    pub fn is_switch_to_off_pending(&self) -> bool {
        self.switch_to_off.is_pending()
    }

    pub fn idle_current_a(&self) -> f64 {
        self.currents.get().idle_a()
    }

    pub fn set_idle_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_idle_a(current));
    }

    pub fn cca_busy_current_a(&self) -> f64 {
        self.currents.get().cca_busy_a()
    }

    pub fn set_cca_busy_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_cca_busy_a(current));
    }

    pub fn tx_current_a(&self) -> f64 {
        self.currents.get().tx_a()
    }

    pub fn set_tx_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_tx_a(current));
    }

    pub fn rx_current_a(&self) -> f64 {
        self.currents.get().rx_a()
    }

    pub fn set_rx_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_rx_a(current));
    }

    pub fn switching_current_a(&self) -> f64 {
        self.currents.get().switching_a()
    }

    pub fn set_switching_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_switching_a(current));
    }

    pub fn sleep_current_a(&self) -> f64 {
        self.currents.get().sleep_a()
    }

    pub fn set_sleep_current_a(&self, current: f64) {
        self.update_currents(|table| table.set_sleep_a(current));
    }

    /// Cancel timers and release the source, callbacks and tx current model
    pub fn dispose(&self) {
        log::trace!("disposing radio energy model");
        self.switch_to_off.cancel();
        self.listener.dispose();
        self.source.borrow_mut().take();
        self.depletion_callback.borrow_mut().take();
        self.recharged_callback.borrow_mut().take();
        self.tx_current_model.borrow_mut().take();
    }

    fn source(&self) -> Result<Rc<dyn EnergySource>> {
        self.source
            .borrow()
            .clone()
            .ok_or(EnergyError::NoEnergySource)
    }

    fn elapsed_since_update(&self, now: Duration) -> Result<Duration> {
        let last_update = self.last_update.get();
        now.checked_sub(last_update).ok_or_else(|| {
            InvariantError::NegativeElapsed { last_update, now }.into()
        })
    }

    fn arm_switch_to_off(&self, state: PowerState) -> Result<()> {
        let duration = self.maximum_time_in_state(state)?;
        let model = self.self_ref.clone();
        self.switch_to_off.arm(
            duration,
            Box::new(move || match model.upgrade() {
                Some(model) => model.change_state(PowerState::Off),
                None => Ok(()),
            }),
        );
        Ok(())
    }

    fn set_radio_state(&self, state: PowerState) {
        self.state.set(state);
        log::debug!(
            "switching to state: {} at time = {:?}",
            state,
            self.scheduler.now()
        );
    }

    fn update_currents(&self, update: impl FnOnce(&mut PowerStateTable)) {
        let mut table = self.currents.get();
        update(&mut table);
        self.currents.set(table);
    }
}

/// Seconds of `remaining_j` at `power_w`, saturating at the representable range
fn sustainable_duration(remaining_j: f64, power_w: f64) -> Duration {
    if remaining_j.is_nan() || remaining_j <= 0.0 {
        return Duration::ZERO;
    }
    if power_w.is_nan() || power_w <= 0.0 {
        return Duration::MAX;
    }
    Duration::try_from_secs_f64(remaining_j / power_w).unwrap_or(Duration::MAX)
}

impl DeviceEnergyModel for RadioEnergyModel {
    fn total_energy_consumption(&self) -> Result<f64> {
        RadioEnergyModel::total_energy_consumption(self)
    }

    fn current_a(&self) -> f64 {
        RadioEnergyModel::current_a(self)
    }

    fn handle_energy_depletion(&self) -> Result<()> {
        RadioEnergyModel::handle_energy_depletion(self)
    }

    fn handle_energy_recharged(&self) -> Result<()> {
        RadioEnergyModel::handle_energy_recharged(self)
    }

    fn handle_energy_changed(&self) -> Result<()> {
        RadioEnergyModel::handle_energy_changed(self)
    }
}

impl fmt::Debug for RadioEnergyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioEnergyModel")
            .field("state", &self.state.get())
            .field("last_update", &self.last_update.get())
            .field("total_energy_j", &self.total_energy_j.get())
            .field("currents", &self.currents.get())
            .field("switch_to_off", &self.switch_to_off)
            .finish()
    }
}
