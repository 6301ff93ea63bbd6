//! Device communication: transport trait + hidapi backend.

use std::fmt;

use serde::Serialize;

use crate::protocol::*;

// ── Error type ──

/// Device communication errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"hidapi init"`, `"send_feature_report"`)
/// and *details* describes what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    NotFound,
    OpenFailed(String),
    WriteFailed(String),
    ReadFailed(String),
    /// The handle is not (or no longer) registered.
    UnknownHandle,
    Unsupported {
        operation: &'static str,
        revision: HardwareRevision,
    },
    UnexpectedResponse(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "no blink(1) devices found"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::WriteFailed(e) => write!(f, "Write failed: {e}"),
            DeviceError::ReadFailed(e) => write!(f, "Read failed: {e}"),
            DeviceError::UnknownHandle => write!(f, "Unknown device handle"),
            DeviceError::Unsupported {
                operation,
                revision,
            } => write!(f, "{operation} is not supported on {revision} devices"),
            DeviceError::UnexpectedResponse(e) => write!(f, "Unexpected response: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Hardware revisions ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareRevision {
    #[default]
    Unknown,
    #[serde(rename = "mk1")]
    Rev1,
    #[serde(rename = "mk2")]
    Rev2,
    #[serde(rename = "mk3")]
    Rev3,
}

/// Optional firmware features, gated by revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadRgb,
    PlayState,
    LedAddressing,
    Eeprom,
    Notes,
    Bootloader,
    UniqueId,
}

impl HardwareRevision {
    /// Infer the revision from the USB serial, read as a hex number.
    pub fn from_serial(serial: &str) -> Self {
        match u32::from_str_radix(serial.trim(), 16) {
            Ok(n) if n >= SERIAL_MK3_THRESHOLD => HardwareRevision::Rev3,
            Ok(n) if n >= SERIAL_MK2_THRESHOLD => HardwareRevision::Rev2,
            Ok(_) => HardwareRevision::Rev1,
            Err(_) => HardwareRevision::Unknown,
        }
    }

    /// Unknown revisions are given the benefit of the doubt.
    pub fn supports(self, cap: Capability) -> bool {
        use Capability::*;
        use HardwareRevision::*;
        match (self, cap) {
            (Unknown, _) => true,
            (Rev1, Eeprom) => true,
            (Rev1, _) => false,
            (Rev2, ReadRgb | PlayState | LedAddressing) => true,
            (Rev2, _) => false,
            (Rev3, Eeprom) => false,
            (Rev3, _) => true,
        }
    }

    /// Fail with [`DeviceError::Unsupported`] unless `cap` is available.
    pub fn require(self, cap: Capability, operation: &'static str) -> Result<()> {
        if self.supports(cap) {
            Ok(())
        } else {
            Err(DeviceError::Unsupported {
                operation,
                revision: self,
            })
        }
    }

    /// Onboard pattern slots.
    pub fn pattern_capacity(self) -> u8 {
        match self {
            HardwareRevision::Rev3 => PATTERN_SLOTS_MK3,
            _ => PATTERN_SLOTS,
        }
    }

    pub fn is_revision2_or_later(self) -> bool {
        matches!(self, HardwareRevision::Rev2 | HardwareRevision::Rev3)
    }
}

impl fmt::Display for HardwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareRevision::Unknown => write!(f, "unknown"),
            HardwareRevision::Rev1 => write!(f, "mk1"),
            HardwareRevision::Rev2 => write!(f, "mk2"),
            HardwareRevision::Rev3 => write!(f, "mk3"),
        }
    }
}

// ── Device enumeration ──

/// A matching HID interface, not yet opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Platform HID path.
    pub path: String,
    /// USB serial number string; empty if the device reports none.
    pub serial: String,
}

// ── Trait ──

/// Raw feature-report transport. All calls block until the exchange
/// completes or the backend's own timeout fires.
pub trait Transport {
    type Handle;

    /// List devices matching `vid`/`pid`.
    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<DiscoveredDevice>>;

    fn open(&mut self, path: &str) -> Result<Self::Handle>;

    fn close(&mut self, handle: Self::Handle) {
        drop(handle);
    }

    /// Send one feature report; `buf[0]` is the report id.
    fn write(&self, handle: &Self::Handle, buf: &[u8]) -> Result<()>;

    /// Fetch one feature report into `buf`; `buf[0]` selects the report id.
    fn read(&self, handle: &Self::Handle, buf: &mut [u8]) -> Result<usize>;
}

// ── hidapi implementation ──

/// Transport over the system HID stack.
pub struct HidTransport {
    api: hidapi::HidApi,
}

impl HidTransport {
    pub fn new() -> Result<Self> {
        let api = hidapi::HidApi::new()
            .map_err(|e| DeviceError::OpenFailed(format!("hidapi init: {e}")))?;
        Ok(HidTransport { api })
    }
}

impl Transport for HidTransport {
    type Handle = hidapi::HidDevice;

    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<DiscoveredDevice>> {
        self.api
            .refresh_devices()
            .map_err(|e| DeviceError::OpenFailed(format!("hid enumerate: {e}")))?;
        let mut found: Vec<DiscoveredDevice> = Vec::new();
        for info in self.api.device_list() {
            if info.vendor_id() != vid || (pid != 0 && info.product_id() != pid) {
                continue;
            }
            let path = info.path().to_string_lossy().into_owned();
            // hidapi may list one entry per usage page of the same interface.
            if found.iter().any(|d| d.path == path) {
                continue;
            }
            found.push(DiscoveredDevice {
                path,
                serial: info.serial_number().unwrap_or_default().to_string(),
            });
        }
        Ok(found)
    }

    fn open(&mut self, path: &str) -> Result<Self::Handle> {
        let cpath = std::ffi::CString::new(path)
            .map_err(|e| DeviceError::OpenFailed(format!("{path}: {e}")))?;
        self.api
            .open_path(&cpath)
            .map_err(|e| DeviceError::OpenFailed(format!("{path}: {e}")))
    }

    fn write(&self, handle: &Self::Handle, buf: &[u8]) -> Result<()> {
        handle
            .send_feature_report(buf)
            .map_err(|e| DeviceError::WriteFailed(format!("send_feature_report: {e}")))
    }

    fn read(&self, handle: &Self::Handle, buf: &mut [u8]) -> Result<usize> {
        handle
            .get_feature_report(buf)
            .map_err(|e| DeviceError::ReadFailed(format!("get_feature_report: {e}")))
    }
}

// ── Mock transport for testing ──

/// Simulated blink(1) devices for unit and integration tests.
///
/// Always compiled so downstream crates can test against it.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use crate::led::{PatternLine, Rgb};
    use crate::report::{
        BootMode, Command, PlayState, ServerTickle, StartupParams, encode_duration,
    };

    /// Firmware-visible state of one simulated device. Colors are stored
    /// exactly as they arrived on the wire.
    #[derive(Debug, Clone)]
    pub struct MockState {
        /// Index 0 is the last "all LEDs" color; 1 and 2 the addressed LEDs.
        pub leds: [Rgb; 3],
        pub last_fade_millis: u32,
        pub ledn: u8,
        pub pattern: Vec<PatternLine>,
        pub play: PlayState,
        pub startup: StartupParams,
        pub eeprom: [u8; 256],
        pub notes: HashMap<u8, Vec<u8>>,
        pub version: u16,
        pub id: Vec<u8>,
        pub tickle: Option<ServerTickle>,
        pub saves: usize,
        pub bootloader_unlocked: bool,
    }

    impl Default for MockState {
        fn default() -> Self {
            MockState {
                leds: [Rgb::BLACK; 3],
                last_fade_millis: 0,
                ledn: 0,
                pattern: vec![PatternLine::default(); PATTERN_SLOTS_MK3 as usize],
                play: PlayState::default(),
                startup: StartupParams {
                    boot_mode: BootMode::Normal,
                    ..StartupParams::default()
                },
                eeprom: [0; 256],
                notes: HashMap::new(),
                version: 204,
                id: (0..ID_SIZE as u8).collect(),
                tickle: None,
                saves: 0,
                bootloader_unlocked: true,
            }
        }
    }

    struct MockDevice {
        path: String,
        serial: String,
        plugged: bool,
        state: MockState,
        /// Response prepared by the last write, served by the next read.
        pending: Option<Vec<u8>>,
    }

    #[derive(Debug, PartialEq, Eq)]
    pub struct MockHandle {
        pub path: String,
        pub id: usize,
    }

    #[derive(Default)]
    pub struct MockTransport {
        devices: RefCell<Vec<MockDevice>>,
        /// Recorded writes: (path, raw report bytes).
        pub writes: RefCell<Vec<(String, Vec<u8>)>>,
        pub opens: Cell<usize>,
        pub closes: Cell<usize>,
        pub enumerations: Cell<usize>,
        next_handle: Cell<usize>,
        /// If true, `open` fails.
        pub fail_open: Cell<bool>,
        /// Number of upcoming writes that fail.
        pub fail_next_writes: Cell<usize>,
        /// If true, every read fails.
        pub fail_reads: Cell<bool>,
        /// If true, the save-to-flash write reports a timeout even though
        /// the save is applied.
        pub save_times_out: Cell<bool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Transport with one plugged device per serial, paths `mock://N`.
        pub fn with_serials(serials: &[&str]) -> Self {
            let t = Self::new();
            for s in serials {
                t.add_device(s);
            }
            t
        }

        pub fn add_device(&self, serial: &str) -> String {
            let mut devs = self.devices.borrow_mut();
            let path = format!("mock://{}", devs.len());
            devs.push(MockDevice {
                path: path.clone(),
                serial: serial.to_string(),
                plugged: true,
                state: MockState::default(),
                pending: None,
            });
            path
        }

        /// Simulate unplugging; later I/O on its handles fails.
        pub fn unplug(&self, serial: &str) {
            for d in self.devices.borrow_mut().iter_mut() {
                if d.serial == serial {
                    d.plugged = false;
                }
            }
        }

        /// Snapshot of a device's simulated firmware state.
        pub fn state(&self, serial: &str) -> Option<MockState> {
            self.devices
                .borrow()
                .iter()
                .find(|d| d.serial == serial)
                .map(|d| d.state.clone())
        }

        pub fn with_state(&self, serial: &str, f: impl FnOnce(&mut MockState)) {
            if let Some(d) = self
                .devices
                .borrow_mut()
                .iter_mut()
                .find(|d| d.serial == serial)
            {
                f(&mut d.state);
            }
        }

        /// Decoded commands written so far, in order.
        pub fn commands(&self) -> Vec<Command> {
            self.writes
                .borrow()
                .iter()
                .filter_map(|(_, b)| Command::decode(b))
                .collect()
        }

        pub fn write_count(&self) -> usize {
            self.writes.borrow().len()
        }

        pub fn open_count(&self) -> usize {
            self.opens.get() - self.closes.get()
        }
    }

    fn short_response(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; REPORT_BUF_SIZE];
        buf[0] = REPORT_ID;
        buf[1] = code;
        buf[2..2 + payload.len()].copy_from_slice(payload);
        buf
    }

    fn long_response(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; REPORT2_BUF_SIZE];
        buf[0] = REPORT2_ID;
        buf[1] = code;
        let n = payload.len().min(REPORT2_BUF_SIZE - 2);
        buf[2..2 + n].copy_from_slice(&payload[..n]);
        buf
    }

    /// Apply one command to the simulated firmware, returning the report
    /// a subsequent read would produce.
    fn execute(state: &mut MockState, cmd: &Command, raw: &[u8]) -> Vec<u8> {
        match cmd {
            Command::FadeToRgb { color, millis, ledn } => {
                match *ledn {
                    0 => state.leds = [*color; 3],
                    n if (n as usize) < state.leds.len() => state.leds[n as usize] = *color,
                    _ => {}
                }
                state.last_fade_millis = *millis;
            }
            Command::SetRgb { color } => {
                state.leds = [*color; 3];
                state.last_fade_millis = 0;
            }
            Command::ReadRgb { ledn } => {
                let c = state.leds[(*ledn as usize).min(2)];
                let [hi, lo] = encode_duration(state.last_fade_millis);
                return short_response(CMD_READ_RGB, &[c.r, c.g, c.b, hi, lo, *ledn]);
            }
            Command::PlayLoop {
                play,
                start,
                end,
                count,
            } => {
                state.play = PlayState {
                    playing: *play,
                    start: *start,
                    end: *end,
                    count: *count,
                    position: *start,
                };
            }
            Command::ReadPlayState => {
                let p = state.play;
                return short_response(
                    CMD_READ_PLAY_STATE,
                    &[p.playing as u8, p.start, p.end, p.count, p.position],
                );
            }
            Command::WritePatternLine { color, millis, pos } => {
                if let Some(line) = state.pattern.get_mut(*pos as usize) {
                    *line = PatternLine {
                        color: *color,
                        millis: (*millis).min(u16::MAX as u32) as u16,
                        ledn: state.ledn,
                    };
                }
            }
            Command::ReadPatternLine { pos } => {
                let l = state.pattern.get(*pos as usize).copied().unwrap_or_default();
                let [hi, lo] = encode_duration(l.millis as u32);
                return short_response(
                    CMD_READ_PATTERN_LINE,
                    &[l.color.r, l.color.g, l.color.b, hi, lo, l.ledn],
                );
            }
            Command::SavePattern => state.saves += 1,
            Command::SetLedN { ledn } => state.ledn = *ledn,
            Command::GetStartup => {
                let s = state.startup;
                return short_response(
                    CMD_GET_STARTUP,
                    &[s.boot_mode.as_byte(), s.play_start, s.play_end, s.play_count],
                );
            }
            Command::SetStartup(p) => state.startup = *p,
            Command::EepromRead { addr } => {
                return short_response(CMD_EEPROM_READ, &[*addr, state.eeprom[*addr as usize]]);
            }
            Command::EepromWrite { addr, value } => state.eeprom[*addr as usize] = *value,
            Command::ServerTickle(t) => state.tickle = Some(*t),
            Command::Version => {
                let major = b'0' + (state.version / 100) as u8;
                let minor = b'0' + (state.version % 10) as u8;
                return short_response(CMD_VERSION, &[b'v', major, minor]);
            }
            Command::WriteNote { id, data } => {
                state.notes.insert(*id, data.clone());
            }
            Command::ReadNote { id } => {
                let mut payload = vec![*id];
                payload.extend(state.notes.get(id).cloned().unwrap_or_default());
                return long_response(CMD_READ_NOTE, &payload);
            }
            Command::BootloaderGo => {
                let mut buf = vec![0u8; REPORT2_BUF_SIZE];
                buf[0] = REPORT2_ID;
                if state.bootloader_unlocked {
                    buf[1..1 + BOOTLOADER_GO_REPLY.len()].copy_from_slice(BOOTLOADER_GO_REPLY);
                }
                return buf;
            }
            Command::BootloaderLock => {
                state.bootloader_unlocked = false;
                let mut buf = vec![0u8; REPORT2_BUF_SIZE];
                buf[0] = REPORT2_ID;
                buf[1..1 + BOOTLOADER_LOCK_REPLY.len()].copy_from_slice(BOOTLOADER_LOCK_REPLY);
                return buf;
            }
            Command::GetId => return long_response(CMD_GET_ID, &state.id),
        }
        raw.to_vec()
    }

    impl Transport for MockTransport {
        type Handle = MockHandle;

        fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<DiscoveredDevice>> {
            self.enumerations.set(self.enumerations.get() + 1);
            if vid != BLINK1_VID || (pid != 0 && pid != BLINK1_PID) {
                return Ok(Vec::new());
            }
            Ok(self
                .devices
                .borrow()
                .iter()
                .filter(|d| d.plugged)
                .map(|d| DiscoveredDevice {
                    path: d.path.clone(),
                    serial: d.serial.clone(),
                })
                .collect())
        }

        fn open(&mut self, path: &str) -> Result<MockHandle> {
            if self.fail_open.get() {
                return Err(DeviceError::OpenFailed(format!(
                    "{path}: mock open failure injected"
                )));
            }
            if !self
                .devices
                .borrow()
                .iter()
                .any(|d| d.path == path && d.plugged)
            {
                return Err(DeviceError::OpenFailed(format!("{path}: no such device")));
            }
            self.opens.set(self.opens.get() + 1);
            let id = self.next_handle.get();
            self.next_handle.set(id + 1);
            Ok(MockHandle {
                path: path.to_string(),
                id,
            })
        }

        fn close(&mut self, _handle: MockHandle) {
            self.closes.set(self.closes.get() + 1);
        }

        fn write(&self, handle: &MockHandle, buf: &[u8]) -> Result<()> {
            self.writes
                .borrow_mut()
                .push((handle.path.clone(), buf.to_vec()));
            let remaining = self.fail_next_writes.get();
            if remaining > 0 {
                self.fail_next_writes.set(remaining - 1);
                return Err(DeviceError::WriteFailed(
                    "send_feature_report: mock write failure injected".into(),
                ));
            }
            let mut devs = self.devices.borrow_mut();
            let dev = devs
                .iter_mut()
                .find(|d| d.path == handle.path && d.plugged)
                .ok_or_else(|| {
                    DeviceError::WriteFailed("send_feature_report: device unplugged".into())
                })?;
            let Some(cmd) = Command::decode(buf) else {
                dev.pending = Some(buf.to_vec());
                return Ok(());
            };
            dev.pending = Some(execute(&mut dev.state, &cmd, buf));
            if cmd == Command::SavePattern && self.save_times_out.get() {
                return Err(DeviceError::WriteFailed(
                    "send_feature_report: timed out".into(),
                ));
            }
            Ok(())
        }

        fn read(&self, handle: &MockHandle, buf: &mut [u8]) -> Result<usize> {
            if self.fail_reads.get() {
                return Err(DeviceError::ReadFailed(
                    "get_feature_report: mock read failure injected".into(),
                ));
            }
            let devs = self.devices.borrow();
            let dev = devs
                .iter()
                .find(|d| d.path == handle.path && d.plugged)
                .ok_or_else(|| {
                    DeviceError::ReadFailed("get_feature_report: device unplugged".into())
                })?;
            let resp = dev.pending.clone().unwrap_or_default();
            let n = resp.len().min(buf.len());
            buf[..n].copy_from_slice(&resp[..n]);
            Ok(n)
        }
    }
}
