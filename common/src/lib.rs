pub mod app;
pub mod button;
pub mod callback;
pub mod config;
pub mod display;
pub mod error;
pub mod hal;
pub mod persistence;
pub mod relay;
pub mod scheduler;
pub mod thermostat;
pub mod types;

#[cfg(test)]
mod testing;

pub use app::{Peripherals, ThermostatApp};
pub use button::{ButtonPhase, ButtonPress};
pub use callback::{Handler, HandlerMut, HandlerParam};
pub use config::{ButtonConfig, DisplayConfig, RuntimeConfig, StorageConfig, ThermostatConfig};
pub use display::HeatDisplay;
pub use error::{SchedulerError, SensorFault, StorageError};
pub use hal::{ByteStore, Clock, Glyph, ManualClock, MemoryStore, SegmentDisplay, TemperatureSensor};
pub use persistence::{PersistedData, PersistedRecord};
pub use relay::RelayControl;
pub use scheduler::{Scheduler, WorkerId, MAX_WAIT};
pub use thermostat::Thermostat;
pub use types::{Adjustment, Brightness, ConfigSubmode, Reading, TempUnit, UiMode};
