use tracing::{info, warn};

use crate::hal::OutputPin;

pub struct RelayControl<P> {
    pin: P,
    enabled: Option<bool>,
}

impl<P: OutputPin> RelayControl<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, enabled: None }
    }

    pub fn change_state(&mut self, enabled: bool) {
        if self.enabled != Some(enabled) {
            info!(heat = enabled, "relay switched");
        }

        let result = if enabled {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.enabled = Some(enabled),
            Err(err) => warn!(heat = enabled, "failed to drive relay: {err:?}"),
        }
    }

    pub fn is_enabled(&self) -> Option<bool> {
        self.enabled
    }
}
