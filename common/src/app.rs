use std::{cell::RefCell, rc::Rc};

use tracing::info;

use crate::{
    button::ButtonPress,
    config::RuntimeConfig,
    display::HeatDisplay,
    error::{SchedulerError, StorageError},
    hal::{ByteStore, Clock, DelayNs, InputPin, OutputPin, SegmentDisplay, TemperatureSensor},
    persistence::PersistedData,
    relay::RelayControl,
    scheduler::Scheduler,
    thermostat::Thermostat,
    types::UiMode,
};

pub struct Peripherals<U, D, R> {
    pub sensor: Box<dyn TemperatureSensor>,
    pub button_up: U,
    pub button_down: D,
    pub relay: R,
    pub display: Box<dyn SegmentDisplay>,
    pub delay: Box<dyn DelayNs>,
    pub storage: Box<dyn ByteStore>,
}

pub struct ThermostatApp<U, D, R> {
    scheduler: Scheduler,
    storage: Rc<RefCell<PersistedData>>,
    thermostat: Rc<RefCell<Thermostat>>,
    display: Rc<RefCell<HeatDisplay>>,
    relay: Rc<RefCell<RelayControl<R>>>,
    button_up: Rc<RefCell<ButtonPress<U>>>,
    button_down: Rc<RefCell<ButtonPress<D>>>,
}

impl<U, D, R> ThermostatApp<U, D, R>
where
    U: InputPin + 'static,
    D: InputPin + 'static,
    R: OutputPin + 'static,
{
    // The startup brightness sweep, when configured, blocks in here.
    pub fn new(
        peripherals: Peripherals<U, D, R>,
        clock: Rc<dyn Clock>,
        config: &RuntimeConfig,
    ) -> Result<Self, SchedulerError> {
        let Peripherals {
            sensor,
            button_up,
            button_down,
            relay,
            display,
            delay,
            storage,
        } = peripherals;
        let mut config = config.clone();
        config.sanitize();

        let storage = Rc::new(RefCell::new(PersistedData::load(
            storage,
            Rc::clone(&clock),
            &config.storage,
        )));
        let thermostat = Rc::new(RefCell::new(Thermostat::new(
            sensor,
            Rc::clone(&storage),
            &config.thermostat,
        )));
        let display = Rc::new(RefCell::new(HeatDisplay::new(
            display,
            delay,
            Rc::clone(&clock),
            Rc::clone(&storage),
            Rc::clone(&thermostat),
            &config.display,
        )));
        if let Some(step_ms) = config.display.brightness_test_step_ms {
            display.borrow_mut().run_brightness_test(step_ms);
        }
        let relay = Rc::new(RefCell::new(RelayControl::new(relay)));

        {
            let mut thermostat = thermostat.borrow_mut();
            thermostat.register_temp_handler(&display, HeatDisplay::update_heat);
            thermostat.register_relay_handler(&relay, RelayControl::change_state);
        }

        let long_press_ms = config.button.long_press_ms;
        let mut up = ButtonPress::new("up", button_up, Rc::clone(&clock), &config.button);
        up.register_short_press(&display, HeatDisplay::change_config_up);
        up.register_long_press(&display, HeatDisplay::change_config_mode, long_press_ms);
        let button_up = Rc::new(RefCell::new(up));

        let mut down = ButtonPress::new("down", button_down, Rc::clone(&clock), &config.button);
        down.register_short_press(&display, HeatDisplay::change_config_down);
        down.register_long_press(&display, HeatDisplay::change_measurement, long_press_ms);
        let button_down = Rc::new(RefCell::new(down));

        let mut scheduler = Scheduler::new(clock);
        scheduler.add_worker("thermostat", &thermostat, Thermostat::refresh_temp)?;
        scheduler.add_worker("button-up", &button_up, ButtonPress::check_button)?;
        scheduler.add_worker("button-down", &button_down, ButtonPress::check_button)?;
        scheduler.add_worker("display-blink", &display, HeatDisplay::handle_blink)?;
        scheduler.add_worker("storage", &storage, PersistedData::save_data)?;
        info!(workers = scheduler.len(), "thermostat ready");

        Ok(Self {
            scheduler,
            storage,
            thermostat,
            display,
            relay,
            button_up,
            button_down,
        })
    }

    pub fn run_workers(&mut self) -> u32 {
        self.scheduler.run_workers()
    }

    pub fn flush_storage(&self) -> Result<(), StorageError> {
        self.storage.borrow_mut().flush()
    }

    pub fn mode(&self) -> UiMode {
        self.display.borrow().mode()
    }

    pub fn relay_enabled(&self) -> Option<bool> {
        self.relay.borrow().is_enabled()
    }

    pub fn storage(&self) -> &Rc<RefCell<PersistedData>> {
        &self.storage
    }

    pub fn thermostat(&self) -> &Rc<RefCell<Thermostat>> {
        &self.thermostat
    }

    pub fn display(&self) -> &Rc<RefCell<HeatDisplay>> {
        &self.display
    }

    pub fn button_up(&self) -> &Rc<RefCell<ButtonPress<U>>> {
        &self.button_up
    }

    pub fn button_down(&self) -> &Rc<RefCell<ButtonPress<D>>> {
        &self.button_down
    }
}
