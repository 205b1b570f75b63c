use std::{cell::RefCell, rc::Rc};

use tracing::{debug, info, warn};

use crate::{
    callback::HandlerParam,
    config::ThermostatConfig,
    error::SensorFault,
    hal::TemperatureSensor,
    persistence::PersistedData,
    types::{celsius_to_fahrenheit, fahrenheit_to_celsius, Adjustment, Reading, TempUnit},
};

// Setpoint is kept in °F, the finer scale, so stepping never skips a value.
pub struct Thermostat {
    sensor: Box<dyn TemperatureSensor>,
    storage: Rc<RefCell<PersistedData>>,
    refresh_interval_ms: u32,
    min_trigger_temp_f: i32,
    max_trigger_temp_f: i32,
    current: Reading,
    trigger_temp_f: i32,
    temp_changed: HandlerParam<Reading>,
    relay_changed: HandlerParam<bool>,
}

impl Thermostat {
    pub fn new(
        sensor: Box<dyn TemperatureSensor>,
        storage: Rc<RefCell<PersistedData>>,
        config: &ThermostatConfig,
    ) -> Self {
        let mut config = config.clone();
        config.sanitize();
        let stored = i32::from(storage.borrow().trigger_temp_f());
        let trigger_temp_f = stored.clamp(config.min_trigger_temp_f, config.max_trigger_temp_f);
        if trigger_temp_f != stored {
            warn!(stored, trigger_temp_f, "stored setpoint out of range; clamped");
        }

        Self {
            sensor,
            storage,
            refresh_interval_ms: config.refresh_interval_ms,
            min_trigger_temp_f: config.min_trigger_temp_f,
            max_trigger_temp_f: config.max_trigger_temp_f,
            current: Reading::Fault(SensorFault::NotReady),
            trigger_temp_f,
            temp_changed: HandlerParam::new(),
            relay_changed: HandlerParam::new(),
        }
    }

    pub fn register_temp_handler<T: 'static>(
        &mut self,
        owner: &Rc<RefCell<T>>,
        method: fn(&mut T, Reading),
    ) {
        self.temp_changed.register(owner, method);
        if !self.current.is_fault() {
            self.temp_changed.invoke(self.current);
        }
    }

    pub fn register_relay_handler<T: 'static>(
        &mut self,
        owner: &Rc<RefCell<T>>,
        method: fn(&mut T, bool),
    ) {
        self.relay_changed.register(owner, method);
        self.refresh_relay();
    }

    pub fn refresh_temp(&mut self, delay: &mut u32) {
        let reading = Reading::from(self.sensor.read_celsius());
        if reading != self.current {
            debug!(?reading, previous = ?self.current, "temperature changed");
            self.current = reading;
            self.temp_changed.invoke(reading);
            self.refresh_relay();
        }
        *delay = self.refresh_interval_ms;
    }

    pub fn current_reading(&self) -> Reading {
        self.current
    }

    pub fn current_temp(&self, unit: TempUnit) -> Option<i32> {
        self.current.in_unit(unit)
    }

    pub fn trigger_temp(&self, unit: TempUnit) -> i32 {
        unit.from_fahrenheit(self.trigger_temp_f)
    }

    pub fn increment(&mut self, unit: TempUnit) -> Adjustment {
        self.change_trigger_temp(unit, 1)
    }

    pub fn decrement(&mut self, unit: TempUnit) -> Adjustment {
        self.change_trigger_temp(unit, -1)
    }

    fn change_trigger_temp(&mut self, unit: TempUnit, step: i32) -> Adjustment {
        let requested = match unit {
            TempUnit::Fahrenheit => self.trigger_temp_f + step,
            TempUnit::Celsius => celsius_to_fahrenheit(fahrenheit_to_celsius(self.trigger_temp_f) + step),
        };
        let clamped = requested.clamp(self.min_trigger_temp_f, self.max_trigger_temp_f);

        if clamped == self.trigger_temp_f {
            debug!(trigger_temp_f = clamped, "setpoint limit reached");
            return Adjustment::LimitReached(self.trigger_temp(unit));
        }

        self.trigger_temp_f = clamped;
        // Bounds are sanitised into u8 range.
        let stored = u8::try_from(clamped).unwrap_or(u8::MAX);
        self.storage.borrow_mut().set_trigger_temp_f(stored);
        info!(trigger_temp_f = clamped, "setpoint changed");
        self.refresh_relay();
        Adjustment::Changed(self.trigger_temp(unit))
    }

    fn refresh_relay(&mut self) {
        let Some(celsius) = self.current.celsius() else {
            return;
        };
        let heat = celsius >= fahrenheit_to_celsius(self.trigger_temp_f);
        self.relay_changed.invoke(heat);
    }
}
