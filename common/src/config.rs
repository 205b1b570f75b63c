use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub min_change_ms: u32,
    pub long_press_ms: u32,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            min_change_ms: 50,
            long_press_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub refresh_interval_ms: u32,
    pub min_trigger_temp_f: i32,
    pub max_trigger_temp_f: i32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        // DHT11 range is 0C..50C.
        Self {
            refresh_interval_ms: 30_000,
            min_trigger_temp_f: 32,
            max_trigger_temp_f: 122,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub config_timeout_ms: u32,
    pub blink_on_ms: u32,
    pub blink_off_ms: u32,
    pub limit_flash_ms: u32,
    pub brightness_test_step_ms: Option<u32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            config_timeout_ms: 5_000,
            blink_on_ms: 500,
            blink_off_ms: 500,
            limit_flash_ms: 100,
            brightness_test_step_ms: Some(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub address: usize,
    pub save_quiet_period_ms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            address: 0,
            save_quiet_period_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub button: ButtonConfig,
    pub thermostat: ThermostatConfig,
    pub display: DisplayConfig,
    pub storage: StorageConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.button.sanitize();
        self.thermostat.sanitize();
        self.display.sanitize();
        self.storage.sanitize();
    }
}

impl ButtonConfig {
    pub fn sanitize(&mut self) {
        self.min_change_ms = self.min_change_ms.clamp(1, 1_000);
        if self.long_press_ms <= self.min_change_ms {
            self.long_press_ms = Self::default().long_press_ms.max(self.min_change_ms * 2);
        }
    }
}

impl ThermostatConfig {
    pub fn sanitize(&mut self) {
        self.refresh_interval_ms = self.refresh_interval_ms.max(1_000);

        // The setpoint is persisted as a single byte.
        self.min_trigger_temp_f = self.min_trigger_temp_f.clamp(0, u8::MAX as i32);
        self.max_trigger_temp_f = self.max_trigger_temp_f.clamp(0, u8::MAX as i32);
        if self.min_trigger_temp_f > self.max_trigger_temp_f {
            std::mem::swap(&mut self.min_trigger_temp_f, &mut self.max_trigger_temp_f);
        }
    }
}

impl DisplayConfig {
    pub fn sanitize(&mut self) {
        self.config_timeout_ms = self.config_timeout_ms.max(1_000);
        self.blink_on_ms = self.blink_on_ms.max(50);
        self.blink_off_ms = self.blink_off_ms.max(50);
        self.limit_flash_ms = self.limit_flash_ms.min(1_000);
        self.brightness_test_step_ms = self
            .brightness_test_step_ms
            .filter(|step| *step > 0)
            .map(|step| step.min(2_000));
    }
}

impl StorageConfig {
    pub fn sanitize(&mut self) {
        self.save_quiet_period_ms = self.save_quiet_period_ms.max(250);
    }
}
