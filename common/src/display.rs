use std::{cell::RefCell, rc::Rc};

use tracing::{debug, warn};

use crate::{
    config::DisplayConfig,
    hal::{Clock, DelayNs, Glyph, SegmentDisplay},
    persistence::PersistedData,
    thermostat::Thermostat,
    types::{Adjustment, Brightness, ConfigSubmode, Reading, TempUnit, UiMode},
};

const UNIT_CELL: usize = 3;

pub struct HeatDisplay {
    display: Box<dyn SegmentDisplay>,
    delay: Box<dyn DelayNs>,
    clock: Rc<dyn Clock>,
    storage: Rc<RefCell<PersistedData>>,
    thermostat: Rc<RefCell<Thermostat>>,
    config_timeout_ms: u32,
    blink_on_ms: u32,
    blink_off_ms: u32,
    limit_flash_ms: u32,
    unit: TempUnit,
    brightness: Brightness,
    display_on: bool,
    config_since_ms: Option<u32>,
    submode: ConfigSubmode,
    blink_off: bool,
    reading: Reading,
}

impl HeatDisplay {
    pub fn new(
        mut display: Box<dyn SegmentDisplay>,
        delay: Box<dyn DelayNs>,
        clock: Rc<dyn Clock>,
        storage: Rc<RefCell<PersistedData>>,
        thermostat: Rc<RefCell<Thermostat>>,
        config: &DisplayConfig,
    ) -> Self {
        let (unit, brightness, display_on) = {
            let storage = storage.borrow();
            (storage.unit(), storage.brightness(), storage.display_on())
        };
        let reading = thermostat.borrow().current_reading();
        display.set_brightness(brightness, true);

        Self {
            display,
            delay,
            clock,
            storage,
            thermostat,
            config_timeout_ms: config.config_timeout_ms,
            blink_on_ms: config.blink_on_ms,
            blink_off_ms: config.blink_off_ms,
            limit_flash_ms: config.limit_flash_ms,
            unit,
            brightness,
            display_on,
            config_since_ms: None,
            submode: ConfigSubmode::Temperature,
            blink_off: false,
            reading,
        }
    }

    pub fn mode(&self) -> UiMode {
        match (self.config_since_ms, self.submode) {
            (None, _) => UiMode::Normal,
            (Some(_), ConfigSubmode::Temperature) => UiMode::ConfigTemperature,
            (Some(_), ConfigSubmode::Brightness) => UiMode::ConfigBrightness,
        }
    }

    pub fn is_blinking(&self) -> bool {
        self.blink_off
    }

    pub fn unit(&self) -> TempUnit {
        self.unit
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn change_config_up(&mut self) {
        if self.config_since_ms.is_some() {
            let changed = match self.submode {
                ConfigSubmode::Brightness => self.brightness_up(),
                ConfigSubmode::Temperature => self.step_trigger_temp(Thermostat::increment),
            };
            if !changed {
                self.config_limit();
            }
        }
        self.touch_config();
    }

    pub fn change_config_down(&mut self) {
        if self.config_since_ms.is_some() {
            let changed = match self.submode {
                ConfigSubmode::Brightness => self.brightness_down(),
                ConfigSubmode::Temperature => self.step_trigger_temp(Thermostat::decrement),
            };
            if !changed {
                self.config_limit();
            }
        }
        self.touch_config();
    }

    pub fn change_config_mode(&mut self) {
        self.submode = match self.submode {
            ConfigSubmode::Temperature => ConfigSubmode::Brightness,
            ConfigSubmode::Brightness => ConfigSubmode::Temperature,
        };
        debug!(mode = self.mode().as_str(), "config screen switched");
        self.touch_config();
    }

    pub fn change_measurement(&mut self) {
        self.unit = self.unit.toggled();
        self.storage.borrow_mut().set_unit(self.unit);
        debug!(unit = self.unit.as_str(), "temperature unit changed");
        self.update_display();
    }

    pub fn update_heat(&mut self, reading: Reading) {
        self.reading = reading;
        if self.config_since_ms.is_none() {
            self.update_display();
        }
    }

    pub fn handle_blink(&mut self, delay: &mut u32) {
        let Some(since) = self.config_since_ms else {
            *delay = self.blink_on_ms;
            return;
        };

        if self.blink_off {
            *delay = self.blink_on_ms;
            self.update_display();
            return;
        }

        // Stay lit for a full on-interval after the last press.
        let elapsed = self.clock.now_ms().wrapping_sub(since);
        if elapsed < self.blink_on_ms {
            *delay = self.blink_on_ms - elapsed;
        } else {
            self.blink_off = true;
            self.display.clear();
            *delay = self.blink_off_ms;
        }
    }

    pub fn config_limit(&mut self) {
        self.display.clear();
        self.delay.delay_ms(self.limit_flash_ms);
    }

    pub fn run_brightness_test(&mut self, step_ms: u32) {
        for level in Brightness::MIN.level()..=Brightness::MAX.level() {
            self.flash_all(Brightness::new(level), step_ms);
        }
        for level in (self.brightness.level() + 1..Brightness::MAX.level()).rev() {
            self.flash_all(Brightness::new(level), step_ms);
        }
        self.flash_all(self.brightness, step_ms);

        if !self.display_on {
            self.show_brightness();
            self.delay.delay_ms(step_ms);
        }
        self.display.clear();
    }

    fn flash_all(&mut self, level: Brightness, step_ms: u32) {
        self.display.set_brightness(level, true);
        self.display.show_number(8888, false, 4, 0);
        self.delay.delay_ms(step_ms);
    }

    fn touch_config(&mut self) {
        if self.config_since_ms.is_none() {
            debug!("entering config mode");
        }
        self.config_since_ms = Some(self.clock.now_ms());
        self.update_display();
    }

    fn brightness_up(&mut self) -> bool {
        if !self.display_on {
            self.display_on = true;
            self.storage.borrow_mut().set_display_on(true);
        } else if let Some(brighter) = self.brightness.brighter() {
            self.brightness = brighter;
            self.storage.borrow_mut().set_brightness(brighter);
        } else {
            return false;
        }
        true
    }

    fn brightness_down(&mut self) -> bool {
        if let Some(dimmer) = self.brightness.dimmer() {
            self.brightness = dimmer;
            self.storage.borrow_mut().set_brightness(dimmer);
        } else if self.display_on {
            self.display_on = false;
            self.storage.borrow_mut().set_display_on(false);
        } else {
            return false;
        }
        true
    }

    fn step_trigger_temp(&mut self, step: fn(&mut Thermostat, TempUnit) -> Adjustment) -> bool {
        match self.thermostat.try_borrow_mut() {
            Ok(mut thermostat) => !step(&mut thermostat, self.unit).is_limit(),
            Err(_) => {
                warn!("thermostat busy; setpoint change dropped");
                true
            }
        }
    }

    fn update_display(&mut self) {
        self.blink_off = false;

        if let Some(since) = self.config_since_ms {
            if self.clock.now_ms().wrapping_sub(since) > self.config_timeout_ms {
                debug!("config mode timed out");
                self.config_since_ms = None;
                self.submode = ConfigSubmode::Temperature;
            }
        }

        if self.config_since_ms.is_none() {
            self.display.set_brightness(self.brightness, self.display_on);
            if self.display_on {
                self.show_temp(self.reading.in_unit(self.unit));
            } else {
                self.display.clear();
            }
            return;
        }

        // Config screens are always lit, even with the display turned off.
        self.display.set_brightness(self.brightness, true);
        match self.submode {
            ConfigSubmode::Brightness => self.show_brightness(),
            ConfigSubmode::Temperature => {
                let unit = self.unit;
                match self.thermostat.try_borrow().map(|t| t.trigger_temp(unit)) {
                    Ok(trigger) => self.show_temp(Some(trigger)),
                    Err(_) => warn!("thermostat busy; setpoint not drawn"),
                }
            }
        }
    }

    fn show_temp(&mut self, temp: Option<i32>) {
        match temp {
            None => {
                self.display.show_text("Err", 0);
                self.display.set_glyph(UNIT_CELL, Glyph::Degree);
            }
            Some(value) if value < 100 => {
                self.display.show_number(value, false, 2, 0);
                self.display.set_glyph(2, Glyph::Degree);
                let unit = match self.unit {
                    TempUnit::Celsius => 'C',
                    TempUnit::Fahrenheit => 'F',
                };
                self.display.set_glyph(UNIT_CELL, Glyph::Char(unit));
            }
            Some(value) => {
                self.display.show_number(value, false, 3, 0);
                self.display.set_glyph(UNIT_CELL, Glyph::Degree);
            }
        }
    }

    fn show_brightness(&mut self) {
        if self.display_on {
            self.display.show_text("led", 0);
            // Levels read 1..=8 on the panel.
            let level = i32::from(self.brightness.level()) + 1;
            self.display.show_number(level, false, 1, UNIT_CELL);
        } else {
            self.display.show_text("off", 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::{StorageConfig, ThermostatConfig},
        error::SensorFault,
        hal::{ManualClock, MemoryStore},
        persistence::PersistedRecord,
        testing::{FakeSensor, RecordingDelay, RecordingDisplay},
    };

    const CELSIUS: u8 = 0x10;
    const ON: u8 = 0x08;

    struct Rig {
        clock: ManualClock,
        panel: RecordingDisplay,
        delay: RecordingDelay,
        storage: Rc<RefCell<PersistedData>>,
        thermostat: Rc<RefCell<Thermostat>>,
        display: HeatDisplay,
    }

    impl Rig {
        fn new(flags: u8, trigger_temp_f: u8) -> Self {
            let clock = ManualClock::new(1_000);
            let record = PersistedRecord {
                flags,
                trigger_temp_f,
                ..PersistedRecord::default()
            };
            let storage = Rc::new(RefCell::new(PersistedData::load(
                Box::new(MemoryStore::from_bytes(record.to_bytes().to_vec())),
                Rc::new(clock.clone()),
                &StorageConfig::default(),
            )));
            let thermostat = Rc::new(RefCell::new(Thermostat::new(
                Box::new(FakeSensor::reading(21)),
                Rc::clone(&storage),
                &ThermostatConfig::default(),
            )));
            let panel = RecordingDisplay::default();
            let delay = RecordingDelay::watching(&panel);
            let display = HeatDisplay::new(
                Box::new(panel.clone()),
                Box::new(delay.clone()),
                Rc::new(clock.clone()),
                Rc::clone(&storage),
                Rc::clone(&thermostat),
                &DisplayConfig::default(),
            );

            Self {
                clock,
                panel,
                delay,
                storage,
                thermostat,
                display,
            }
        }

        fn blink(&mut self) -> u32 {
            let mut delay = 0;
            self.display.handle_blink(&mut delay);
            delay
        }

        fn trigger_f(&self) -> i32 {
            self.thermostat.borrow().trigger_temp(TempUnit::Fahrenheit)
        }
    }

    #[test]
    fn normal_mode_shows_reading_in_selected_unit() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);

        rig.display.update_heat(Reading::Celsius(21));
        assert_eq!(rig.panel.text(), "21°C");

        rig.display.change_measurement();
        assert_eq!(rig.panel.text(), "69°F");
        assert_eq!(rig.storage.borrow().unit(), TempUnit::Fahrenheit);
        assert_eq!(rig.display.mode(), UiMode::Normal);
    }

    #[test]
    fn faults_and_three_digit_values_render() {
        let mut rig = Rig::new(0x07 | ON, 75);

        rig.display.update_heat(Reading::Fault(SensorFault::Checksum));
        assert_eq!(rig.panel.text(), "Err°");

        rig.display.update_heat(Reading::Celsius(50));
        assert_eq!(rig.panel.text(), "122°");
    }

    #[test]
    fn display_off_blanks_normal_mode_but_not_config() {
        let mut rig = Rig::new(0x03 | CELSIUS, 75);

        rig.display.update_heat(Reading::Celsius(21));
        assert!(rig.panel.is_blank());
        assert_eq!(rig.panel.brightness(), (Brightness::new(3), false));

        rig.display.change_config_up();
        assert_eq!(rig.panel.text(), "24°C");
        assert_eq!(rig.panel.brightness(), (Brightness::new(3), true));
    }

    #[test]
    fn first_press_only_enters_config() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);

        rig.display.change_config_down();
        assert_eq!(rig.display.mode(), UiMode::ConfigTemperature);
        assert_eq!(rig.panel.text(), "24°C");
        assert_eq!(rig.trigger_f(), 75);

        rig.display.change_config_up();
        assert_eq!(rig.panel.text(), "25°C");
        assert_eq!(rig.trigger_f(), 77);
        assert!(rig.delay.pauses().is_empty());
    }

    #[test]
    fn setpoint_limit_flashes_blank() {
        let mut rig = Rig::new(0x07 | ON, 122);

        rig.display.change_config_up();
        rig.display.change_config_up();

        assert_eq!(rig.delay.pauses(), vec![(100, "    ".to_string())]);
        assert_eq!(rig.panel.text(), "122°");
        assert_eq!(rig.trigger_f(), 122);
    }

    #[test]
    fn brightness_screen_walks_levels_then_off() {
        let mut rig = Rig::new(0x01 | ON | CELSIUS, 75);

        rig.display.change_config_mode();
        assert_eq!(rig.display.mode(), UiMode::ConfigBrightness);
        assert_eq!(rig.panel.text(), "led2");

        rig.display.change_config_down();
        assert_eq!(rig.panel.text(), "led1");
        rig.display.change_config_down();
        assert_eq!(rig.panel.text(), "off ");
        assert!(!rig.storage.borrow().display_on());
        assert!(rig.delay.pauses().is_empty());

        rig.display.change_config_down();
        assert_eq!(rig.delay.pauses().len(), 1);

        rig.display.change_config_up();
        assert_eq!(rig.panel.text(), "led1");
        rig.display.change_config_up();
        assert_eq!(rig.panel.text(), "led2");
        assert_eq!(rig.storage.borrow().brightness(), Brightness::new(1));
        assert!(rig.storage.borrow().display_on());
    }

    #[test]
    fn brightness_up_stops_at_max() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);

        rig.display.change_config_mode();
        rig.display.change_config_up();

        assert_eq!(rig.delay.pauses().len(), 1);
        assert_eq!(rig.panel.text(), "led8");
    }

    #[test]
    fn config_blinks_then_times_out() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);
        rig.display.update_heat(Reading::Celsius(21));
        rig.display.change_config_up();

        assert_eq!(rig.blink(), 500);
        rig.clock.advance(200);
        assert_eq!(rig.blink(), 300);

        rig.clock.advance(300);
        assert_eq!(rig.blink(), 500);
        assert!(rig.display.is_blinking());
        assert!(rig.panel.is_blank());

        rig.clock.advance(500);
        assert_eq!(rig.blink(), 500);
        assert!(!rig.display.is_blinking());
        assert_eq!(rig.panel.text(), "24°C");

        // A new reading waits until config is over.
        rig.display.update_heat(Reading::Celsius(23));
        assert_eq!(rig.panel.text(), "24°C");

        // Four more blink cycles reach exactly the timeout, which still counts.
        for _ in 0..8 {
            rig.clock.advance(500);
            rig.blink();
        }
        assert_eq!(rig.display.mode(), UiMode::ConfigTemperature);

        rig.clock.advance(500);
        rig.blink();
        rig.clock.advance(500);
        rig.blink();
        assert_eq!(rig.display.mode(), UiMode::Normal);
        assert_eq!(rig.panel.text(), "23°C");
        assert_eq!(rig.blink(), 500);
    }

    #[test]
    fn timeout_resets_to_temperature_screen() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);

        rig.display.change_config_mode();
        rig.clock.advance(6_000);
        rig.display.change_measurement();

        assert_eq!(rig.display.mode(), UiMode::Normal);
        rig.display.change_config_up();
        assert_eq!(rig.display.mode(), UiMode::ConfigTemperature);
    }

    #[test]
    fn brightness_test_sweeps_and_clears() {
        let mut rig = Rig::new(0x07 | ON | CELSIUS, 75);

        rig.display.run_brightness_test(200);

        let pauses = rig.delay.pauses();
        assert_eq!(pauses.len(), 9);
        assert!(pauses.iter().all(|pause| *pause == (200, "8888".to_string())));
        assert!(rig.panel.is_blank());
        assert_eq!(rig.panel.brightness(), (Brightness::MAX, true));
    }

    #[test]
    fn brightness_test_returns_to_stored_level_and_shows_off() {
        let mut rig = Rig::new(0x05 | CELSIUS, 75);

        rig.display.run_brightness_test(10);

        let pauses = rig.delay.pauses();
        // Up 0..=7, down 6, then the stored level, then "off".
        assert_eq!(pauses.len(), 11);
        assert_eq!(pauses.last(), Some(&(10, "off ".to_string())));
        assert_eq!(rig.panel.brightness(), (Brightness::new(5), true));
        assert!(rig.panel.is_blank());
    }
}
