//! Installation of radio energy models on energy sources
//!
//! Wires a [`RadioEnergyModel`] to its source the way a node setup needs
//! it: callbacks first, then registration with the source, then the source
//! itself, then the transmit current model.

use std::rc::Rc;

use crate::config::{RadioEnergyConfig, TxCurrentModelConfig};
use crate::error::Result;
use crate::model::{EnergyCallback, RadioEnergyModel};
use crate::scheduler::Scheduler;
use crate::source::{DeviceEnergyModel, EnergySource};

/// Builder for radio energy models sharing one configuration
///
/// Without explicit callbacks, depletion switches the radio off through its
/// PHY listener and recharge switches it back on.
#[derive(Clone, Default)]
pub struct RadioEnergyModelHelper {
    config: RadioEnergyConfig,
    depletion_callback: Option<EnergyCallback>,
    recharged_callback: Option<EnergyCallback>,
    tx_current_model: Option<TxCurrentModelConfig>,
}

impl RadioEnergyModelHelper {
    /// Create a helper with default currents
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a helper with custom currents
    pub fn with_config(config: RadioEnergyConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Use `callback` instead of switching the radio off on depletion
    pub fn with_depletion_callback(mut self, callback: EnergyCallback) -> Self {
        self.depletion_callback = Some(callback);
        self
    }

    /// Use `callback` instead of switching the radio on after recharge
    pub fn with_recharged_callback(mut self, callback: EnergyCallback) -> Self {
        self.recharged_callback = Some(callback);
        self
    }

    /// Attach a transmit current model to every installed radio
    pub fn with_tx_current_model(mut self, model: TxCurrentModelConfig) -> Self {
        self.tx_current_model = Some(model);
        self
    }

    pub fn config(&self) -> &RadioEnergyConfig {
        &self.config
    }

    /// Create a model drawing from `source`
    pub fn install(
        &self,
        scheduler: Rc<dyn Scheduler>,
        source: Rc<dyn EnergySource>,
    ) -> Result<Rc<RadioEnergyModel>> {
        let model = RadioEnergyModel::new(scheduler, self.config.clone())?;
        let listener = model.phy_listener();

        let depletion = match &self.depletion_callback {
            Some(callback) => Rc::clone(callback),
            None => {
                let listener = Rc::downgrade(&listener);
                Rc::new(move || -> Result<()> {
                    match listener.upgrade() {
                        Some(listener) => listener.notify_off(),
                        None => Ok(()),
                    }
                })
            }
        };
        model.set_energy_depletion_callback(Some(depletion));

        let recharged = match &self.recharged_callback {
            Some(callback) => Rc::clone(callback),
            None => {
                let listener = Rc::downgrade(&listener);
                Rc::new(move || -> Result<()> {
                    match listener.upgrade() {
                        Some(listener) => listener.notify_on(),
                        None => Ok(()),
                    }
                })
            }
        };
        model.set_energy_recharged_callback(Some(recharged));

        let device: Rc<dyn DeviceEnergyModel> = model.clone();
        source.register_device_model(Rc::downgrade(&device));
        model.set_energy_source(source)?;

        if let Some(tx_current_model) = &self.tx_current_model {
            model.set_tx_current_model(Some(tx_current_model.build()?));
        }

        log::debug!("installed radio energy model: {:?}", model);
        Ok(model)
    }
}
