use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::digital::{self, ErrorKind, ErrorType};

use crate::{
    error::{SensorFault, StorageError},
    hal::{
        ByteStore, DelayNs, Glyph, InputPin, MemoryStore, OutputPin, SegmentDisplay, TemperatureSensor,
        DISPLAY_CELLS,
    },
    persistence::{PersistedRecord, RECORD_LEN},
    types::Brightness,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinReadError;

impl digital::Error for PinReadError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPin {
    pressed: Rc<Cell<bool>>,
    failing: Rc<Cell<bool>>,
}

impl ScriptedPin {
    pub fn released() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.pressed.set(true);
    }

    pub fn release(&self) {
        self.pressed.set(false);
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl ErrorType for ScriptedPin {
    type Error = PinReadError;
}

impl InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        if self.failing.get() {
            return Err(PinReadError);
        }
        Ok(self.pressed.get())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    writes: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    pub fn writes(&self) -> Vec<bool> {
        self.writes.borrow().clone()
    }

    pub fn level(&self) -> Option<bool> {
        self.writes.borrow().last().copied()
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakeSensor {
    next: Rc<Cell<Result<i32, SensorFault>>>,
    reads: Rc<Cell<u32>>,
}

impl FakeSensor {
    pub fn reading(celsius: i32) -> Self {
        Self {
            next: Rc::new(Cell::new(Ok(celsius))),
            reads: Rc::new(Cell::new(0)),
        }
    }

    pub fn set(&self, celsius: i32) {
        self.next.set(Ok(celsius));
    }

    pub fn fail(&self, fault: SensorFault) {
        self.next.set(Err(fault));
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl TemperatureSensor for FakeSensor {
    fn read_celsius(&mut self) -> Result<i32, SensorFault> {
        self.reads.set(self.reads.get() + 1);
        self.next.get()
    }
}

#[derive(Debug)]
struct Panel {
    cells: [Glyph; DISPLAY_CELLS],
    brightness: Brightness,
    on: bool,
}

#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    panel: Rc<RefCell<Panel>>,
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self {
            panel: Rc::new(RefCell::new(Panel {
                cells: [Glyph::Blank; DISPLAY_CELLS],
                brightness: Brightness::MAX,
                on: true,
            })),
        }
    }
}

impl RecordingDisplay {
    pub fn text(&self) -> String {
        self.panel
            .borrow()
            .cells
            .iter()
            .map(|glyph| match glyph {
                Glyph::Blank => ' ',
                Glyph::Degree => '°',
                Glyph::Char(c) => *c,
            })
            .collect()
    }

    pub fn is_blank(&self) -> bool {
        self.panel
            .borrow()
            .cells
            .iter()
            .all(|glyph| *glyph == Glyph::Blank)
    }

    pub fn brightness(&self) -> (Brightness, bool) {
        let panel = self.panel.borrow();
        (panel.brightness, panel.on)
    }
}

impl SegmentDisplay for RecordingDisplay {
    fn set_glyph(&mut self, cell: usize, glyph: Glyph) {
        if let Some(slot) = self.panel.borrow_mut().cells.get_mut(cell) {
            *slot = glyph;
        }
    }

    fn show_number(&mut self, value: i32, leading_zero: bool, width: usize, start: usize) {
        let digits = value.to_string();
        let pad = if leading_zero { '0' } else { ' ' };
        let padded = format!("{digits:>width$}").replace(' ', &pad.to_string());
        let visible: Vec<char> = padded.chars().rev().take(width).collect();
        for (offset, c) in visible.into_iter().rev().enumerate() {
            let glyph = if c == ' ' { Glyph::Blank } else { Glyph::Char(c) };
            self.set_glyph(start + offset, glyph);
        }
    }

    fn set_brightness(&mut self, level: Brightness, on: bool) {
        let mut panel = self.panel.borrow_mut();
        panel.brightness = level;
        panel.on = on;
    }

    fn clear(&mut self) {
        self.panel.borrow_mut().cells = [Glyph::Blank; DISPLAY_CELLS];
    }
}

#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Rc<RefCell<MemoryStore>>,
}

impl SharedStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            inner: Rc::new(RefCell::new(store)),
        }
    }

    pub fn with_record(record: &PersistedRecord) -> Self {
        let mut bytes = vec![0xFF; 32];
        bytes[..RECORD_LEN].copy_from_slice(&record.to_bytes());
        Self::new(MemoryStore::from_bytes(bytes))
    }

    pub fn writes(&self) -> usize {
        self.inner.borrow().write_count()
    }

    pub fn record(&self) -> PersistedRecord {
        let mut raw = [0u8; RECORD_LEN];
        raw.copy_from_slice(&self.inner.borrow().bytes()[..RECORD_LEN]);
        PersistedRecord::from_bytes(&raw)
    }
}

impl ByteStore for SharedStore {
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.inner.borrow_mut().read(address, buf)
    }

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.borrow_mut().write(address, bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    pauses: Rc<RefCell<Vec<(u32, String)>>>,
    display: Option<RecordingDisplay>,
}

impl RecordingDelay {
    pub fn watching(display: &RecordingDisplay) -> Self {
        Self {
            pauses: Rc::default(),
            display: Some(display.clone()),
        }
    }

    pub fn pauses(&self) -> Vec<(u32, String)> {
        self.pauses.borrow().clone()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        let shown = self
            .display
            .as_ref()
            .map(RecordingDisplay::text)
            .unwrap_or_default();
        self.pauses.borrow_mut().push((ms, shown));
    }
}
