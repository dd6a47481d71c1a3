//! Transmit current models
//!
//! A transmit current model maps the nominal transmit power chosen by the
//! PHY for a frame to the current the radio draws while sending it.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Convert a power level from dBm to watts
pub fn dbm_to_w(dbm: f64) -> f64 {
    10f64.powf(0.1 * (dbm - 30.0))
}

/// Computes the transmit current for a nominal transmit power
pub trait TxCurrentModel: Debug {
    /// Transmit current in amperes for `tx_power_dbm`
    fn calc_tx_current(&self, tx_power_dbm: f64) -> f64;
}

/// Linear power amplifier model
///
/// `I = P_tx / (V * eta) + I_idle`, with `P_tx` the transmit power in watts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTxCurrentModel {
    /// Efficiency of the power amplifier
    pub eta: f64,
    /// Supply voltage in volts
    pub voltage: f64,
    /// Current in the idle state, in amperes
    pub idle_current: f64,
}

impl LinearTxCurrentModel {
    /// Create a linear model
    pub fn new(eta: f64, voltage: f64, idle_current: f64) -> Self {
        Self {
            eta,
            voltage,
            idle_current,
        }
    }
}

impl Default for LinearTxCurrentModel {
    fn default() -> Self {
        Self {
            eta: 0.10,
            voltage: 3.0,
            idle_current: 1e-6,
        }
    }
}

impl TxCurrentModel for LinearTxCurrentModel {
    fn calc_tx_current(&self, tx_power_dbm: f64) -> f64 {
        log::trace!("linear tx current for {} dBm", tx_power_dbm);
        dbm_to_w(tx_power_dbm) / (self.voltage * self.eta) + self.idle_current
    }
}

/// Same current for every transmit power
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantTxCurrentModel {
    current_a: f64,
}

impl ConstantTxCurrentModel {
    pub fn new(current_a: f64) -> Self {
        Self { current_a }
    }
}

impl TxCurrentModel for ConstantTxCurrentModel {
    fn calc_tx_current(&self, _tx_power_dbm: f64) -> f64 {
        self.current_a
    }
}
