use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::{
    config::StorageConfig,
    error::StorageError,
    hal::{ByteStore, Clock},
    types::{Brightness, TempUnit},
};

pub const RECORD_SIGNATURE: u32 = 0x0428_1976;
pub const RECORD_LEN: usize = 10;

const MASK_BRIGHTNESS: u8 = 0x07;
const FLAG_DISPLAY_ON: u8 = 0x08;
const FLAG_CELSIUS: u8 = 0x10;

const DEFAULT_FLAGS: u8 = MASK_BRIGHTNESS | FLAG_DISPLAY_ON | FLAG_CELSIUS;
const DEFAULT_TRIGGER_TEMP_F: u8 = 86;

/// On-storage layout: signature, record size, flag bits, setpoint in °F.
/// Multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedRecord {
    pub signature: u32,
    pub size: u32,
    pub flags: u8,
    pub trigger_temp_f: u8,
}

impl Default for PersistedRecord {
    fn default() -> Self {
        Self {
            signature: RECORD_SIGNATURE,
            size: RECORD_LEN as u32,
            flags: DEFAULT_FLAGS,
            trigger_temp_f: DEFAULT_TRIGGER_TEMP_F,
        }
    }
}

impl PersistedRecord {
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&self.signature.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
        bytes[8] = self.flags;
        bytes[9] = self.trigger_temp_f;
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let word = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        Self {
            signature: word(0),
            size: word(4),
            flags: bytes[8],
            trigger_temp_f: bytes[9],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.signature == RECORD_SIGNATURE && self.size == RECORD_LEN as u32
    }
}

pub struct PersistedData {
    store: Box<dyn ByteStore>,
    clock: Rc<dyn Clock>,
    address: usize,
    quiet_period_ms: u32,
    record: PersistedRecord,
    dirty_since_ms: Option<u32>,
}

impl PersistedData {
    pub fn load(mut store: Box<dyn ByteStore>, clock: Rc<dyn Clock>, config: &StorageConfig) -> Self {
        let mut raw = [0u8; RECORD_LEN];
        let record = match store.read(config.address, &mut raw) {
            Ok(()) => {
                let record = PersistedRecord::from_bytes(&raw);
                if record.is_valid() {
                    debug!(?record, "loaded persisted settings");
                    record
                } else {
                    info!("no valid settings in storage; using defaults");
                    PersistedRecord::default()
                }
            }
            Err(err) => {
                warn!("failed to read settings: {err}; using defaults");
                PersistedRecord::default()
            }
        };

        Self {
            store,
            clock,
            address: config.address,
            quiet_period_ms: config.save_quiet_period_ms,
            record,
            dirty_since_ms: None,
        }
    }

    pub fn record(&self) -> &PersistedRecord {
        &self.record
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since_ms.is_some()
    }

    pub fn save_data(&mut self, delay: &mut u32) {
        if let Some(since) = self.dirty_since_ms {
            let elapsed = self.clock.now_ms().wrapping_sub(since);
            if elapsed < self.quiet_period_ms {
                *delay = self.quiet_period_ms - elapsed;
                return;
            }

            if let Err(err) = self.flush() {
                warn!("failed to persist settings: {err}");
            }
        }

        *delay = self.quiet_period_ms;
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.dirty_since_ms.is_none() {
            return Ok(());
        }
        self.store.write(self.address, &self.record.to_bytes())?;
        self.dirty_since_ms = None;
        info!(record = ?self.record, "settings saved");
        Ok(())
    }

    pub fn brightness(&self) -> Brightness {
        Brightness::new(self.record.flags & MASK_BRIGHTNESS)
    }

    pub fn set_brightness(&mut self, brightness: Brightness) {
        let flags = (self.record.flags & !MASK_BRIGHTNESS) | (brightness.level() & MASK_BRIGHTNESS);
        self.update(|record| record.flags = flags);
    }

    pub fn display_on(&self) -> bool {
        self.flag(FLAG_DISPLAY_ON)
    }

    pub fn set_display_on(&mut self, on: bool) {
        self.set_flag(FLAG_DISPLAY_ON, on);
    }

    pub fn unit(&self) -> TempUnit {
        if self.flag(FLAG_CELSIUS) {
            TempUnit::Celsius
        } else {
            TempUnit::Fahrenheit
        }
    }

    pub fn set_unit(&mut self, unit: TempUnit) {
        self.set_flag(FLAG_CELSIUS, unit == TempUnit::Celsius);
    }

    pub fn trigger_temp_f(&self) -> u8 {
        self.record.trigger_temp_f
    }

    pub fn set_trigger_temp_f(&mut self, temp_f: u8) {
        self.update(|record| record.trigger_temp_f = temp_f);
    }

    fn flag(&self, flag: u8) -> bool {
        self.record.flags & flag == flag
    }

    fn set_flag(&mut self, flag: u8, enabled: bool) {
        let flags = if enabled {
            self.record.flags | flag
        } else {
            self.record.flags & !flag
        };
        self.update(|record| record.flags = flags);
    }

    fn update(&mut self, change: impl FnOnce(&mut PersistedRecord)) {
        let mut record = self.record;
        change(&mut record);
        if record != self.record {
            self.record = record;
            self.dirty_since_ms = Some(self.clock.now_ms());
        }
    }
}
