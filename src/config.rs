// BLE Energy - Radio energy accounting for simulated BLE devices
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Energy model configuration.

use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnergyError, Result};
use crate::tx_current::{ConstantTxCurrentModel, LinearTxCurrentModel, TxCurrentModel};

/// Per-state current draw of the radio, in amperes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioEnergyConfig {
    /// Idle current (default: 1 µA).
    pub idle_current_a: f64,
    /// CCA busy current (default: same as idle).
    pub cca_busy_current_a: f64,
    /// Transmit current when no tx current model is attached (default: 15 mA).
    pub tx_current_a: f64,
    /// Receive current (default: 15 mA).
    pub rx_current_a: f64,
    /// Channel switching current (default: same as idle).
    pub switching_current_a: f64,
    /// Sleep current (default: 1 µA).
    pub sleep_current_a: f64,
}

impl Default for RadioEnergyConfig {
    fn default() -> Self {
        Self {
            idle_current_a: 1e-6,
            cca_busy_current_a: 1e-6,
            tx_current_a: 0.015,
            rx_current_a: 0.015,
            switching_current_a: 1e-6,
            sleep_current_a: 1e-6,
        }
    }
}

impl RadioEnergyConfig {
    /// Parse a configuration from JSON, missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EnergyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with custom transmit and receive currents
    pub fn with_tx_rx(tx_current_a: f64, rx_current_a: f64) -> Self {
        Self {
            tx_current_a,
            rx_current_a,
            ..Default::default()
        }
    }

    /// Reject negative or non-finite currents.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("idle_current_a", self.idle_current_a),
            ("cca_busy_current_a", self.cca_busy_current_a),
            ("tx_current_a", self.tx_current_a),
            ("rx_current_a", self.rx_current_a),
            ("switching_current_a", self.switching_current_a),
            ("sleep_current_a", self.sleep_current_a),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EnergyError::InvalidConfig(format!(
                    "{} must be a finite, non-negative current, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of the reference energy store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicEnergySourceConfig {
    /// Initial stored energy in joules (default: 10 J).
    pub initial_energy_j: f64,
    /// Supply voltage in volts (default: 3.0 V).
    pub supply_voltage_v: f64,
    /// Fraction of initial energy at or below which the store is depleted.
    pub low_battery_threshold: f64,
    /// Fraction of initial energy above which a depleted store is recharged.
    pub high_battery_threshold: f64,
    /// Interval between periodic remaining-energy updates.
    pub update_interval: Duration,
}

impl Default for BasicEnergySourceConfig {
    fn default() -> Self {
        Self {
            initial_energy_j: 10.0,
            supply_voltage_v: 3.0,
            low_battery_threshold: 0.10,
            high_battery_threshold: 0.15,
            update_interval: Duration::from_secs(1),
        }
    }
}

impl BasicEnergySourceConfig {
    /// Create a configuration with a given initial energy
    pub fn with_initial_energy(initial_energy_j: f64) -> Self {
        Self {
            initial_energy_j,
            ..Default::default()
        }
    }

    /// Check thresholds, voltage and energy are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.initial_energy_j.is_finite() || self.initial_energy_j < 0.0 {
            return Err(EnergyError::InvalidConfig(format!(
                "initial_energy_j must be finite and non-negative, got {}",
                self.initial_energy_j
            )));
        }
        if !self.supply_voltage_v.is_finite() || self.supply_voltage_v <= 0.0 {
            return Err(EnergyError::InvalidConfig(format!(
                "supply_voltage_v must be positive, got {}",
                self.supply_voltage_v
            )));
        }
        if !(0.0..=1.0).contains(&self.low_battery_threshold)
            || !(0.0..=1.0).contains(&self.high_battery_threshold)
        {
            return Err(EnergyError::InvalidConfig(
                "battery thresholds must be fractions in [0, 1]".to_string(),
            ));
        }
        if self.high_battery_threshold < self.low_battery_threshold {
            return Err(EnergyError::InvalidConfig(format!(
                "high_battery_threshold ({}) below low_battery_threshold ({})",
                self.high_battery_threshold, self.low_battery_threshold
            )));
        }
        if self.update_interval.is_zero() {
            return Err(EnergyError::InvalidConfig(
                "update_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Selection of the transmit current model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxCurrentModelConfig {
    /// Linear power amplifier model.
    Linear {
        /// Power amplifier efficiency.
        eta: f64,
        /// Supply voltage (V).
        voltage: f64,
        /// Idle current (A).
        idle_current: f64,
    },
    /// Fixed current whatever the transmit power.
    Constant {
        /// Transmit current (A).
        current_a: f64,
    },
}

impl Default for TxCurrentModelConfig {
    fn default() -> Self {
        let linear = LinearTxCurrentModel::default();
        Self::Linear {
            eta: linear.eta,
            voltage: linear.voltage,
            idle_current: linear.idle_current,
        }
    }
}

impl TxCurrentModelConfig {
    /// Instantiate the selected model.
    pub fn build(&self) -> Result<Rc<dyn TxCurrentModel>> {
        match *self {
            Self::Linear {
                eta,
                voltage,
                idle_current,
            } => {
                if !(eta.is_finite() && eta > 0.0 && voltage.is_finite() && voltage > 0.0) {
                    return Err(EnergyError::InvalidConfig(format!(
                        "linear tx current model needs finite positive eta and voltage, got {} and {}",
                        eta, voltage
                    )));
                }
                if !idle_current.is_finite() || idle_current < 0.0 {
                    return Err(EnergyError::InvalidConfig(format!(
                        "linear tx current model idle_current must be a finite, non-negative current, got {}",
                        idle_current
                    )));
                }
                Ok(Rc::new(LinearTxCurrentModel {
                    eta,
                    voltage,
                    idle_current,
                }))
            }
            Self::Constant { current_a } => {
                if !current_a.is_finite() || current_a < 0.0 {
                    return Err(EnergyError::InvalidConfig(format!(
                        "constant tx current must be non-negative, got {}",
                        current_a
                    )));
                }
                Ok(Rc::new(ConstantTxCurrentModel::new(current_a)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_config_default() {
        let config = RadioEnergyConfig::default();
        assert_eq!(config.idle_current_a, 1e-6);
        assert_eq!(config.tx_current_a, 0.015);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_radio_config_rejects_negative() {
        let config = RadioEnergyConfig {
            rx_current_a: -1.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rx_current_a"));
    }

    #[test]
    fn test_radio_config_from_json() {
        let config = RadioEnergyConfig::from_json(r#"{"tx_current_a": 0.02}"#).unwrap();
        assert_eq!(config.tx_current_a, 0.02);
        assert_eq!(config.rx_current_a, 0.015);

        assert!(RadioEnergyConfig::from_json(r#"{"idle_current_a": -3}"#).is_err());
        assert!(RadioEnergyConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_source_config_validation() {
        assert!(BasicEnergySourceConfig::default().validate().is_ok());

        let inverted = BasicEnergySourceConfig {
            low_battery_threshold: 0.5,
            high_battery_threshold: 0.2,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let no_voltage = BasicEnergySourceConfig {
            supply_voltage_v: 0.0,
            ..Default::default()
        };
        assert!(no_voltage.validate().is_err());
    }

    #[test]
    fn test_tx_model_config_serde() {
        let config = TxCurrentModelConfig::Constant { current_a: 0.01 };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"kind\":\"constant\""));
        let back: TxCurrentModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_tx_model_config_build() {
        let model = TxCurrentModelConfig::default().build().unwrap();
        assert!(model.calc_tx_current(0.0) > 3e-3);

        let bad = TxCurrentModelConfig::Linear {
            eta: 0.0,
            voltage: 3.0,
            idle_current: 0.0,
        };
        assert!(bad.build().is_err());
    }

    #[test]
    fn test_tx_model_config_rejects_non_finite() {
        let linear = |eta: f64, voltage: f64, idle_current: f64| TxCurrentModelConfig::Linear {
            eta,
            voltage,
            idle_current,
        };
        assert!(linear(f64::NAN, 3.0, 1e-6).build().is_err());
        assert!(linear(0.1, f64::INFINITY, 1e-6).build().is_err());
        assert!(linear(0.1, 3.0, f64::NAN).build().is_err());
        assert!(linear(0.1, 3.0, -1e-6).build().is_err());
        assert!(linear(0.1, 3.0, 0.0).build().is_ok());

        let constant = TxCurrentModelConfig::Constant { current_a: f64::NAN };
        assert!(constant.build().is_err());
    }
}
