use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    io::ErrorKind,
    path::{Path, PathBuf},
    rc::Rc,
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use heat_relay_common::{
    hal::DISPLAY_CELLS, Brightness, ByteStore, Clock, Glyph, Peripherals, RuntimeConfig,
    SegmentDisplay, SensorFault, StorageError, TemperatureSensor, ThermostatApp,
};

const MAX_IDLE_MS: u32 = 1_000;
const STORE_CAPACITY: usize = 64;
const TAP_MS: u64 = 200;
// Sensor range plus the raw error codes 253..=255.
const SIM_TEMP_RANGE: std::ops::RangeInclusive<i32> = -40..=255;
// Held past the long-press threshold by this much.
const HOLD_MARGIN_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonId {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Tap(ButtonId),
    Hold(ButtonId),
    SetTemp(Result<i32, SensorFault>),
    Quit,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("THERMOSTAT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.thermostat"));
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

    let mut config = load_runtime_config(&data_dir.join("config.json"))
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load runtime config: {err:#}");
            RuntimeConfig::default()
        });
    config.sanitize();

    let store = FileStore::open(data_dir.join("eeprom.bin"), STORE_CAPACITY)
        .with_context(|| format!("failed to open settings store in {}", data_dir.display()))?;
    let sensor = SimulatedSensor::new(21);
    let up = SimButton::default();
    let down = SimButton::default();

    let mut app = ThermostatApp::new(
        Peripherals {
            sensor: Box::new(sensor.clone()),
            button_up: up.clone(),
            button_down: down.clone(),
            relay: LogRelayPin,
            display: Box::new(ConsoleDisplay::default()),
            delay: Box::new(StdDelay),
            storage: Box::new(store),
        },
        Rc::new(SystemClock),
        &config,
    )
    .context("failed to start thermostat")?;

    let (tx, mut commands) = mpsc::channel(16);
    spawn_stdin_reader(tx);
    info!(data_dir = %data_dir.display(), "heat relay running; u/d/U/D/t <c>/q");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let long_press = Duration::from_millis(u64::from(config.button.long_press_ms) + HOLD_MARGIN_MS);

    loop {
        let now = Instant::now();
        up.release_if_due(now);
        down.release_if_due(now);

        let next_ms = app.run_workers().min(MAX_IDLE_MS);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(u64::from(next_ms))) => {}
            Some(command) = commands.recv() => match command {
                Command::Tap(id) | Command::Hold(id) => {
                    let hold = if matches!(command, Command::Hold(_)) {
                        long_press
                    } else {
                        Duration::from_millis(TAP_MS)
                    };
                    let button = match id {
                        ButtonId::Up => &up,
                        ButtonId::Down => &down,
                    };
                    button.press_for(hold);
                }
                Command::SetTemp(reading) => sensor.set(reading),
                Command::Quit => break,
            },
            _ = &mut shutdown => {
                info!("ctrl-c received");
                break;
            }
        }
    }

    app.flush_storage().context("failed to save settings on shutdown")?;
    info!("heat relay stopped");
    Ok(())
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid config in {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).await.is_err() {
                            return;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("unknown command {line:?}"),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    return;
                }
                Err(err) => {
                    warn!("stdin read error: {err}");
                    return;
                }
            }
        }
    });
}

// u/d tap a button, U/D hold it, `t <celsius>` or `t err` drives the sensor, q quits.
fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let command = match line {
        "u" => Command::Tap(ButtonId::Up),
        "d" => Command::Tap(ButtonId::Down),
        "U" => Command::Hold(ButtonId::Up),
        "D" => Command::Hold(ButtonId::Down),
        "q" => Command::Quit,
        _ => {
            let value = line.strip_prefix("t ")?.trim();
            if value.eq_ignore_ascii_case("err") {
                Command::SetTemp(Err(SensorFault::Timeout))
            } else {
                let celsius = value.parse::<i32>().ok().filter(|c| SIM_TEMP_RANGE.contains(c))?;
                Command::SetTemp(Ok(celsius))
            }
        }
    };
    Some(command)
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation gives the wrapping millisecond counter.
        monotonic_ms() as u32
    }
}

#[derive(Clone)]
struct SimulatedSensor {
    reading: Rc<Cell<Result<i32, SensorFault>>>,
}

impl SimulatedSensor {
    fn new(celsius: i32) -> Self {
        Self {
            reading: Rc::new(Cell::new(Ok(celsius))),
        }
    }

    fn set(&self, reading: Result<i32, SensorFault>) {
        info!(?reading, "simulated temperature set");
        self.reading.set(reading);
    }
}

impl TemperatureSensor for SimulatedSensor {
    fn read_celsius(&mut self) -> Result<i32, SensorFault> {
        self.reading.get()
    }
}

// Reads low while pressed, like the pull-up wiring on the board.
#[derive(Clone, Default)]
struct SimButton {
    pressed: Rc<Cell<bool>>,
    release_at: Rc<Cell<Option<Instant>>>,
}

impl SimButton {
    fn press_for(&self, hold: Duration) {
        self.pressed.set(true);
        self.release_at.set(Some(Instant::now() + hold));
    }

    fn release_if_due(&self, now: Instant) {
        if self.release_at.get().is_some_and(|at| at <= now) {
            self.release_at.set(None);
            self.pressed.set(false);
        }
    }
}

impl ErrorType for SimButton {
    type Error = Infallible;
}

impl InputPin for SimButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed.get())
    }
}

struct LogRelayPin;

impl ErrorType for LogRelayPin {
    type Error = Infallible;
}

impl OutputPin for LogRelayPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("relay pin low");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("relay pin high");
        Ok(())
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

struct ConsoleDisplay {
    cells: [Glyph; DISPLAY_CELLS],
    brightness: Brightness,
    on: bool,
    last_frame: RefCell<String>,
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self {
            cells: [Glyph::Blank; DISPLAY_CELLS],
            brightness: Brightness::MAX,
            on: true,
            last_frame: RefCell::new(String::new()),
        }
    }
}

impl ConsoleDisplay {
    fn frame(&self) -> String {
        if !self.on {
            return "[    ] off".to_string();
        }
        let text: String = self
            .cells
            .iter()
            .map(|glyph| match glyph {
                Glyph::Blank => ' ',
                Glyph::Degree => '°',
                Glyph::Char(c) => *c,
            })
            .collect();
        format!("[{text}] {}", self.brightness.level())
    }

    fn refresh(&self) {
        let frame = self.frame();
        let mut last = self.last_frame.borrow_mut();
        if *last != frame {
            info!("display {frame}");
            *last = frame;
        }
    }
}

impl SegmentDisplay for ConsoleDisplay {
    fn set_glyph(&mut self, cell: usize, glyph: Glyph) {
        if let Some(slot) = self.cells.get_mut(cell) {
            *slot = glyph;
            self.refresh();
        }
    }

    fn show_number(&mut self, value: i32, leading_zero: bool, width: usize, start: usize) {
        let digits = if leading_zero {
            format!("{value:0width$}")
        } else {
            format!("{value:>width$}")
        };
        // Keep the low-order digits when the number is too wide.
        let skip = digits.chars().count().saturating_sub(width);
        for (offset, c) in digits.chars().skip(skip).enumerate() {
            let glyph = if c == ' ' { Glyph::Blank } else { Glyph::Char(c) };
            if let Some(slot) = self.cells.get_mut(start + offset) {
                *slot = glyph;
            }
        }
        self.refresh();
    }

    fn set_brightness(&mut self, level: Brightness, on: bool) {
        self.brightness = level;
        self.on = on;
        self.refresh();
    }

    fn clear(&mut self) {
        self.cells = [Glyph::Blank; DISPLAY_CELLS];
        self.refresh();
    }
}

struct FileStore {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileStore {
    fn open(path: PathBuf, capacity: usize) -> anyhow::Result<Self> {
        let mut bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
        };
        bytes.resize(capacity, 0xFF);
        Ok(Self { path, bytes })
    }

    fn range(&self, address: usize, len: usize) -> Result<std::ops::Range<usize>, StorageError> {
        let end = address.saturating_add(len);
        if end > self.bytes.len() {
            return Err(StorageError::OutOfRange {
                address,
                end,
                capacity: self.bytes.len(),
            });
        }
        Ok(address..end)
    }
}

impl ByteStore for FileStore {
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let range = self.range(address, bytes.len())?;
        let mut updated = self.bytes.clone();
        updated[range].copy_from_slice(bytes);
        std::fs::write(&self.path, &updated).map_err(|err| StorageError::Device(err.to_string()))?;
        self.bytes = updated;
        Ok(())
    }
}
