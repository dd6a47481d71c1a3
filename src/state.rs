// BLE Energy - Radio energy accounting for simulated BLE devices
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio power states and their current draw

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RadioEnergyConfig;
use crate::error::EnergyError;

/// Operating mode of the radio as seen by the energy model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PowerState {
    /// Powered and listening for nothing in particular
    #[default]
    Idle,
    /// Receiving a frame
    Rx,
    /// Receiver busy
    RxBusy,
    /// Transmitting a frame
    Tx,
    /// Transmitter busy
    TxBusy,
    /// Powered down, draws nothing; terminal
    Off,
}

impl PowerState {
    /// All states, in PHY code order
    pub const ALL: [PowerState; 6] = [
        Self::Idle,
        Self::Rx,
        Self::RxBusy,
        Self::Tx,
        Self::TxBusy,
        Self::Off,
    ];

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Rx => "RX",
            Self::RxBusy => "RX_BUSY",
            Self::Tx => "TX",
            Self::TxBusy => "TX_BUSY",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for PowerState {
    type Error = EnergyError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(EnergyError::UnknownState(code))
    }
}

/// Current draw per power state, in amperes
///
/// CCA busy, switching and sleep currents are carried for configuration
/// but the PHY never enters those states, so no [`PowerState`] maps to them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerStateTable {
    idle_a: f64,
    cca_busy_a: f64,
    tx_a: f64,
    rx_a: f64,
    switching_a: f64,
    sleep_a: f64,
}

impl PowerStateTable {
    /// Build the table from a radio configuration
    pub fn from_config(config: &RadioEnergyConfig) -> Self {
        Self {
            idle_a: config.idle_current_a,
            cca_busy_a: config.cca_busy_current_a,
            tx_a: config.tx_current_a,
            rx_a: config.rx_current_a,
            switching_a: config.switching_current_a,
            sleep_a: config.sleep_current_a,
        }
    }

    /// Current draw in the given state
    pub fn current_a(&self, state: PowerState) -> f64 {
        match state {
            PowerState::Idle => self.idle_a,
            PowerState::Rx | PowerState::RxBusy => self.rx_a,
            PowerState::Tx | PowerState::TxBusy => self.tx_a,
            PowerState::Off => 0.0,
        }
    }

    pub fn idle_a(&self) -> f64 {
        self.idle_a
    }

    pub fn set_idle_a(&mut self, current: f64) {
        self.idle_a = current;
    }

    pub fn cca_busy_a(&self) -> f64 {
        self.cca_busy_a
    }

    pub fn set_cca_busy_a(&mut self, current: f64) {
        self.cca_busy_a = current;
    }

    pub fn tx_a(&self) -> f64 {
        self.tx_a
    }

    pub fn set_tx_a(&mut self, current: f64) {
        self.tx_a = current;
    }

    pub fn rx_a(&self) -> f64 {
        self.rx_a
    }

    pub fn set_rx_a(&mut self, current: f64) {
        self.rx_a = current;
    }

    pub fn switching_a(&self) -> f64 {
        self.switching_a
    }

    pub fn set_switching_a(&mut self, current: f64) {
        self.switching_a = current;
    }

    pub fn sleep_a(&self) -> f64 {
        self.sleep_a
    }

    pub fn set_sleep_a(&mut self, current: f64) {
        self.sleep_a = current;
    }
}

impl Default for PowerStateTable {
    fn default() -> Self {
        Self::from_config(&RadioEnergyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(PowerState::try_from(0).unwrap(), PowerState::Idle);
        assert_eq!(PowerState::try_from(4).unwrap(), PowerState::TxBusy);
        assert_eq!(PowerState::try_from(5).unwrap(), PowerState::Off);
        assert_eq!(PowerState::try_from(6), Err(EnergyError::UnknownState(6)));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PowerState::RxBusy.to_string(), "RX_BUSY");
        assert_eq!(PowerState::default(), PowerState::Idle);
    }

    #[test]
    fn test_busy_states_share_current() {
        let table = PowerStateTable::default();
        assert_eq!(table.current_a(PowerState::Tx), table.current_a(PowerState::TxBusy));
        assert_eq!(table.current_a(PowerState::Rx), table.current_a(PowerState::RxBusy));
        assert_eq!(table.current_a(PowerState::Off), 0.0);
    }

    #[test]
    fn test_default_currents() {
        let table = PowerStateTable::default();
        assert_eq!(table.idle_a(), 1e-6);
        assert_eq!(table.tx_a(), 0.015);
        assert_eq!(table.rx_a(), 0.015);
        assert_eq!(table.sleep_a(), 1e-6);
    }

    #[test]
    fn test_unmapped_currents_do_not_leak() {
        let mut table = PowerStateTable::default();
        table.set_sleep_a(0.5);
        table.set_switching_a(0.5);
        table.set_cca_busy_a(0.5);
        for state in PowerState::ALL {
            assert!(table.current_a(state) < 0.5);
        }
    }
}
