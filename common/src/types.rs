use crate::error::SensorFault;

/// Raw sensor values at or above this are error codes, not temperatures.
pub const SENSOR_ERROR_THRESHOLD: i32 = 253;

// Both round to the nearest degree and saturate instead of overflowing.
pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    celsius.saturating_mul(9).saturating_add(160) / 5
}

pub fn fahrenheit_to_celsius(fahrenheit: i32) -> i32 {
    fahrenheit.saturating_sub(32).saturating_mul(5).saturating_add(4) / 9
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnit {
    Celsius,
    Fahrenheit,
}

impl TempUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    pub fn from_celsius(self, celsius: i32) -> i32 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius_to_fahrenheit(celsius),
        }
    }

    pub fn from_fahrenheit(self, fahrenheit: i32) -> i32 {
        match self {
            Self::Celsius => fahrenheit_to_celsius(fahrenheit),
            Self::Fahrenheit => fahrenheit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Brightness(u8);

impl Brightness {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(7);

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX.0))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn brighter(self) -> Option<Self> {
        (self < Self::MAX).then(|| Self(self.0 + 1))
    }

    pub fn dimmer(self) -> Option<Self> {
        (self > Self::MIN).then(|| Self(self.0 - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Celsius(i32),
    Fault(SensorFault),
}

impl Reading {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            value if value < SENSOR_ERROR_THRESHOLD => Self::Celsius(value),
            SENSOR_ERROR_THRESHOLD => Self::Fault(SensorFault::Timeout),
            254 => Self::Fault(SensorFault::Checksum),
            _ => Self::Fault(SensorFault::NotReady),
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::Fault(_))
    }

    pub fn celsius(self) -> Option<i32> {
        match self {
            Self::Celsius(value) => Some(value),
            Self::Fault(_) => None,
        }
    }

    pub fn in_unit(self, unit: TempUnit) -> Option<i32> {
        self.celsius().map(|celsius| unit.from_celsius(celsius))
    }
}

impl From<Result<i32, SensorFault>> for Reading {
    fn from(result: Result<i32, SensorFault>) -> Self {
        match result {
            Ok(raw) => Self::from_raw(raw),
            Err(fault) => Self::Fault(fault),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Changed(i32),
    LimitReached(i32),
}

impl Adjustment {
    pub fn is_limit(self) -> bool {
        matches!(self, Self::LimitReached(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSubmode {
    Temperature,
    Brightness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    ConfigTemperature,
    ConfigBrightness,
}

impl UiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::ConfigTemperature => "CONFIG_TEMPERATURE",
            Self::ConfigBrightness => "CONFIG_BRIGHTNESS",
        }
    }
}
