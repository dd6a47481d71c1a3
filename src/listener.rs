//! PHY activity listener
//!
//! Translates radio activity notifications into power state requests on the
//! energy model. Transient activities (transmission, CCA busy, channel
//! switching) have no closing notification, so the listener owns one
//! revert-to-idle timer shared by all of them.
//!
//! CCA busy, switching and sleep are not accounted as states of their own:
//! those notifications only move the revert timer.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::error::{EnergyError, Result};
use crate::scheduler::{Scheduler, Timer};
use crate::state::PowerState;

/// Requests a power state change on the energy model
pub type ChangeStateCallback = Rc<dyn Fn(PowerState) -> Result<()>>;

/// Updates the transmit current from the nominal transmit power (dBm)
pub type UpdateTxCurrentCallback = Rc<dyn Fn(f64)>;

/// Listener registered with the PHY on behalf of a radio energy model
pub struct PhyListener {
    change_state: RefCell<Option<ChangeStateCallback>>,
    update_tx_current: RefCell<Option<UpdateTxCurrentCallback>>,
    switch_to_idle: Timer,
    self_ref: Weak<Self>,
}

impl PhyListener {
    /// Create a listener with no callbacks set
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            change_state: RefCell::new(None),
            update_tx_current: RefCell::new(None),
            switch_to_idle: Timer::new(scheduler),
            self_ref: weak.clone(),
        })
    }

    pub fn set_change_state_callback(&self, callback: ChangeStateCallback) {
        *self.change_state.borrow_mut() = Some(callback);
    }

    pub fn set_update_tx_current_callback(&self, callback: UpdateTxCurrentCallback) {
        *self.update_tx_current.borrow_mut() = Some(callback);
    }

    /// Check whether a revert to IDLE is scheduled
    pub fn is_revert_pending(&self) -> bool {
        self.switch_to_idle.is_pending()
    }

    /// Reception started, expected to last `duration`
    pub fn notify_rx_start(&self, duration: Duration) -> Result<()> {
        log::trace!("rx start, duration {:?}", duration);
        let change_state = self.change_state_callback()?;
        self.switch_to_idle.cancel();
        change_state(PowerState::Rx)
    }

    /// Reception ended with a good frame
    pub fn notify_rx_end_ok(&self) -> Result<()> {
        log::trace!("rx end ok");
        let change_state = self.change_state_callback()?;
        change_state(PowerState::Idle)
    }

    /// Reception ended with a corrupted frame; accounted like a good one
    pub fn notify_rx_end_error(&self) -> Result<()> {
        log::trace!("rx end error");
        let change_state = self.change_state_callback()?;
        change_state(PowerState::Idle)
    }

    /// Transmission started at `tx_power_dbm`, back to IDLE after `duration`
    pub fn notify_tx_start(&self, duration: Duration, tx_power_dbm: f64) -> Result<()> {
        log::trace!("tx start, duration {:?} at {} dBm", duration, tx_power_dbm);
        let update_tx_current = self
            .update_tx_current
            .borrow()
            .clone()
            .ok_or(EnergyError::MissingCallback("update tx current"))?;
        let change_state = self.change_state_callback()?;

        update_tx_current(tx_power_dbm);
        change_state(PowerState::Tx)?;
        self.arm_switch_to_idle(duration);
        Ok(())
    }

    /// Channel possibly busy for `duration`
    pub fn notify_maybe_cca_busy_start(&self, duration: Duration) -> Result<()> {
        log::trace!("maybe cca busy, duration {:?}", duration);
        self.change_state_callback()?;
        self.arm_switch_to_idle(duration);
        Ok(())
    }

    /// Channel switch started, lasting `duration`
    pub fn notify_switching_start(&self, duration: Duration) -> Result<()> {
        log::trace!("switching start, duration {:?}", duration);
        self.change_state_callback()?;
        self.arm_switch_to_idle(duration);
        Ok(())
    }

    pub fn notify_sleep(&self) -> Result<()> {
        log::trace!("sleep");
        self.change_state_callback()?;
        self.switch_to_idle.cancel();
        Ok(())
    }

    pub fn notify_wakeup(&self) -> Result<()> {
        log::trace!("wakeup");
        let change_state = self.change_state_callback()?;
        change_state(PowerState::Idle)
    }

    pub fn notify_off(&self) -> Result<()> {
        log::trace!("off");
        let change_state = self.change_state_callback()?;
        let result = change_state(PowerState::Off);
        self.switch_to_idle.cancel();
        result
    }

    pub fn notify_on(&self) -> Result<()> {
        log::trace!("on");
        let change_state = self.change_state_callback()?;
        change_state(PowerState::Idle)
    }

    /// Cancel the revert timer and drop both callbacks
    pub fn dispose(&self) {
        self.switch_to_idle.cancel();
        self.change_state.borrow_mut().take();
        self.update_tx_current.borrow_mut().take();
    }

    fn change_state_callback(&self) -> Result<ChangeStateCallback> {
        self.change_state
            .borrow()
            .clone()
            .ok_or(EnergyError::MissingCallback("change state"))
    }

    fn switch_to_idle(&self) -> Result<()> {
        let change_state = self.change_state_callback()?;
        change_state(PowerState::Idle)
    }

    fn arm_switch_to_idle(&self, duration: Duration) {
        let weak = self.self_ref.clone();
        self.switch_to_idle.arm(
            duration,
            Box::new(move || match weak.upgrade() {
                Some(listener) => listener.switch_to_idle(),
                None => Ok(()),
            }),
        );
    }
}

impl fmt::Debug for PhyListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhyListener")
            .field("change_state_set", &self.change_state.borrow().is_some())
            .field("update_tx_current_set", &self.update_tx_current.borrow().is_some())
            .field("switch_to_idle", &self.switch_to_idle)
            .finish()
    }
}
