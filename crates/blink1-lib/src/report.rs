//! Report codec: byte layout of every command and response.
//!
//! Layout is `[report id, command code, payload...]`. Durations travel as
//! tenths of a second, big-endian, in two bytes. Colors written by
//! `c`, `n` and `P` are degamma'd at encode time when enabled.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::device::{DeviceError, Result};
use crate::led::{PatternLine, Rgb, degamma_rgb};
use crate::protocol::*;

// ── Report buffers ──

/// One feature report, including the leading report id.
#[derive(Clone, PartialEq, Eq)]
pub enum Report {
    Short([u8; REPORT_BUF_SIZE]),
    Long([u8; REPORT2_BUF_SIZE]),
}

impl Report {
    fn short(code: u8, payload: [u8; REPORT_SIZE - 1]) -> Report {
        let mut buf = [0u8; REPORT_BUF_SIZE];
        buf[0] = REPORT_ID;
        buf[1] = code;
        buf[2..].copy_from_slice(&payload);
        Report::Short(buf)
    }

    fn long(code: u8, payload: &[u8]) -> Report {
        let mut buf = [0u8; REPORT2_BUF_SIZE];
        buf[0] = REPORT2_ID;
        buf[1] = code;
        let n = payload.len().min(REPORT2_BUF_SIZE - 2);
        buf[2..2 + n].copy_from_slice(&payload[..n]);
        Report::Long(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Report::Short(b) => &b[..],
            Report::Long(b) => &b[..],
        }
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        match self {
            Report::Short(b) => &mut b[..],
            Report::Long(b) => &mut b[..],
        }
    }

    pub fn code(&self) -> u8 {
        self.as_bytes()[1]
    }

    /// A request buffer to be filled by a read: same size and report id,
    /// command byte kept so firmware that echoes it can be checked.
    pub fn response_buffer(&self) -> Report {
        let mut r = match self {
            Report::Short(_) => Report::Short([0; REPORT_BUF_SIZE]),
            Report::Long(_) => Report::Long([0; REPORT2_BUF_SIZE]),
        };
        let src = self.as_bytes();
        let dst = r.as_mut_bytes();
        dst[0] = src[0];
        dst[1] = src[1];
        r
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.as_bytes();
        // Trailing zeros of long reports are noise in logs.
        let end = bytes.iter().rposition(|&b| b != 0).map_or(2, |i| (i + 1).max(2));
        write!(f, "[")?;
        for (i, b) in bytes[..end].iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02x}")?;
        }
        if end < bytes.len() {
            write!(f, " ..")?;
        }
        write!(f, "]")
    }
}

// ── Durations ──

/// Tenths of a second, saturated to the 16-bit field.
pub fn encode_duration(millis: u32) -> [u8; 2] {
    ((millis / 10).min(0xFFFF) as u16).to_be_bytes()
}

pub fn decode_duration(hi: u8, lo: u8) -> u32 {
    u16::from_be_bytes([hi, lo]) as u32 * 10
}

// ── Structured payloads ──

/// What the device does at power-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    #[default]
    Normal,
    Play,
    Off,
}

impl BootMode {
    pub fn as_byte(self) -> u8 {
        match self {
            BootMode::Normal => 0,
            BootMode::Play => 1,
            BootMode::Off => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<BootMode> {
        match b {
            0 => Some(BootMode::Normal),
            1 => Some(BootMode::Play),
            2 => Some(BootMode::Off),
            _ => None,
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Normal => write!(f, "normal"),
            BootMode::Play => write!(f, "play"),
            BootMode::Off => write!(f, "off"),
        }
    }
}

impl FromStr for BootMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "0" => Ok(BootMode::Normal),
            "play" | "1" => Ok(BootMode::Play),
            "off" | "2" => Ok(BootMode::Off),
            other => Err(format!("unknown boot mode '{other}' (normal, play, off)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StartupParams {
    pub boot_mode: BootMode,
    pub play_start: u8,
    pub play_end: u8,
    pub play_count: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayState {
    pub playing: bool,
    pub start: u8,
    pub end: u8,
    pub count: u8,
    pub position: u8,
}

/// Dead-man's switch: if not re-armed within `millis`, the device plays
/// its pattern between `start` and `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerTickle {
    pub enabled: bool,
    pub millis: u32,
    /// Keep the current color instead of turning off (mk2 and later).
    pub stay_lit: bool,
    pub start: u8,
    pub end: u8,
}

// ── Commands ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FadeToRgb { color: Rgb, millis: u32, ledn: u8 },
    SetRgb { color: Rgb },
    ReadRgb { ledn: u8 },
    PlayLoop { play: bool, start: u8, end: u8, count: u8 },
    ReadPlayState,
    WritePatternLine { color: Rgb, millis: u32, pos: u8 },
    ReadPatternLine { pos: u8 },
    SavePattern,
    SetLedN { ledn: u8 },
    GetStartup,
    SetStartup(StartupParams),
    EepromRead { addr: u8 },
    EepromWrite { addr: u8, value: u8 },
    ServerTickle(ServerTickle),
    Version,
    WriteNote { id: u8, data: Vec<u8> },
    ReadNote { id: u8 },
    BootloaderGo,
    BootloaderLock,
    GetId,
}

impl Command {
    pub fn encode(&self, degamma: bool) -> Report {
        let wire = |c: Rgb| if degamma { degamma_rgb(c) } else { c };
        match self {
            Command::FadeToRgb { color, millis, ledn } => {
                let c = wire(*color);
                let [hi, lo] = encode_duration(*millis);
                Report::short(CMD_FADE_TO_RGB, [c.r, c.g, c.b, hi, lo, *ledn, 0])
            }
            Command::SetRgb { color } => {
                let c = wire(*color);
                Report::short(CMD_SET_RGB, [c.r, c.g, c.b, 0, 0, 0, 0])
            }
            Command::ReadRgb { ledn } => Report::short(CMD_READ_RGB, [0, 0, 0, 0, 0, *ledn, 0]),
            Command::PlayLoop {
                play,
                start,
                end,
                count,
            } => Report::short(
                CMD_PLAY_LOOP,
                [*play as u8, *start, *end, *count, 0, 0, 0],
            ),
            Command::ReadPlayState => Report::short(CMD_READ_PLAY_STATE, [0; 7]),
            Command::WritePatternLine { color, millis, pos } => {
                let c = wire(*color);
                let [hi, lo] = encode_duration(*millis);
                Report::short(CMD_WRITE_PATTERN_LINE, [c.r, c.g, c.b, hi, lo, *pos, 0])
            }
            Command::ReadPatternLine { pos } => {
                Report::short(CMD_READ_PATTERN_LINE, [0, 0, 0, 0, 0, *pos, 0])
            }
            Command::SavePattern => {
                let [a, b, c, d] = SAVE_PATTERN_MAGIC;
                Report::short(CMD_SAVE_PATTERN, [a, b, c, d, 0, 0, 0])
            }
            Command::SetLedN { ledn } => Report::short(CMD_SET_LEDN, [*ledn, 0, 0, 0, 0, 0, 0]),
            Command::GetStartup => Report::short(CMD_GET_STARTUP, [0; 7]),
            Command::SetStartup(p) => Report::short(
                CMD_SET_STARTUP,
                [
                    p.boot_mode.as_byte(),
                    p.play_start,
                    p.play_end,
                    p.play_count,
                    0,
                    0,
                    0,
                ],
            ),
            Command::EepromRead { addr } => Report::short(CMD_EEPROM_READ, [*addr, 0, 0, 0, 0, 0, 0]),
            Command::EepromWrite { addr, value } => {
                Report::short(CMD_EEPROM_WRITE, [*addr, *value, 0, 0, 0, 0, 0])
            }
            Command::ServerTickle(t) => {
                let [hi, lo] = encode_duration(t.millis);
                Report::short(
                    CMD_SERVER_TICKLE,
                    [t.enabled as u8, hi, lo, t.stay_lit as u8, t.start, t.end, 0],
                )
            }
            Command::Version => Report::short(CMD_VERSION, [0; 7]),
            Command::WriteNote { id, data } => {
                let mut payload = Vec::with_capacity(1 + data.len());
                payload.push(*id);
                payload.extend_from_slice(&data[..data.len().min(NOTE_CAPACITY)]);
                Report::long(CMD_WRITE_NOTE, &payload)
            }
            Command::ReadNote { id } => Report::long(CMD_READ_NOTE, &[*id]),
            Command::BootloaderGo => Report::long(CMD_BOOTLOADER_GO, BOOTLOADER_GO_CHALLENGE),
            Command::BootloaderLock => {
                Report::long(CMD_BOOTLOADER_LOCK, BOOTLOADER_LOCK_CHALLENGE)
            }
            Command::GetId => Report::long(CMD_GET_ID, &[]),
        }
    }

    /// Recover a command from its wire form. Colors come back as sent,
    /// i.e. still degamma'd if they were encoded that way.
    pub fn decode(buf: &[u8]) -> Option<Command> {
        if buf.len() < 2 {
            return None;
        }
        let long = buf[0] == REPORT2_ID;
        if (long && buf.len() < REPORT2_BUF_SIZE) || (!long && buf.len() < REPORT_BUF_SIZE) {
            return None;
        }
        let b = |i: usize| buf[i];
        let rgb = || Rgb::new(b(2), b(3), b(4));
        let cmd = match (buf[0], buf[1]) {
            (REPORT_ID, CMD_FADE_TO_RGB) => Command::FadeToRgb {
                color: rgb(),
                millis: decode_duration(b(5), b(6)),
                ledn: b(7),
            },
            (REPORT_ID, CMD_SET_RGB) => Command::SetRgb { color: rgb() },
            (REPORT_ID, CMD_READ_RGB) => Command::ReadRgb { ledn: b(7) },
            (REPORT_ID, CMD_PLAY_LOOP) => Command::PlayLoop {
                play: b(2) != 0,
                start: b(3),
                end: b(4),
                count: b(5),
            },
            (REPORT_ID, CMD_READ_PLAY_STATE) => Command::ReadPlayState,
            (REPORT_ID, CMD_WRITE_PATTERN_LINE) => Command::WritePatternLine {
                color: rgb(),
                millis: decode_duration(b(5), b(6)),
                pos: b(7),
            },
            (REPORT_ID, CMD_READ_PATTERN_LINE) => Command::ReadPatternLine { pos: b(7) },
            (REPORT_ID, CMD_SAVE_PATTERN) if buf[2..6] == SAVE_PATTERN_MAGIC => {
                Command::SavePattern
            }
            (REPORT_ID, CMD_SET_LEDN) => Command::SetLedN { ledn: b(2) },
            (REPORT_ID, CMD_GET_STARTUP) => Command::GetStartup,
            (REPORT_ID, CMD_SET_STARTUP) => Command::SetStartup(StartupParams {
                boot_mode: BootMode::from_byte(b(2))?,
                play_start: b(3),
                play_end: b(4),
                play_count: b(5),
            }),
            (REPORT_ID, CMD_EEPROM_READ) => Command::EepromRead { addr: b(2) },
            (REPORT_ID, CMD_EEPROM_WRITE) => Command::EepromWrite {
                addr: b(2),
                value: b(3),
            },
            (REPORT_ID, CMD_SERVER_TICKLE) => Command::ServerTickle(ServerTickle {
                enabled: b(2) != 0,
                millis: decode_duration(b(3), b(4)),
                stay_lit: b(5) != 0,
                start: b(6),
                end: b(7),
            }),
            (REPORT_ID, CMD_VERSION) => Command::Version,
            (REPORT2_ID, CMD_WRITE_NOTE) => Command::WriteNote {
                id: b(2),
                data: buf[3..REPORT2_BUF_SIZE].to_vec(),
            },
            (REPORT2_ID, CMD_READ_NOTE) => Command::ReadNote { id: b(2) },
            (REPORT2_ID, CMD_BOOTLOADER_GO) if buf[2..].starts_with(BOOTLOADER_GO_CHALLENGE) => {
                Command::BootloaderGo
            }
            (REPORT2_ID, CMD_BOOTLOADER_LOCK)
                if buf[2..].starts_with(BOOTLOADER_LOCK_CHALLENGE) =>
            {
                Command::BootloaderLock
            }
            (REPORT2_ID, CMD_GET_ID) => Command::GetId,
            _ => return None,
        };
        Some(cmd)
    }

    /// Short name for logs and capability errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::FadeToRgb { .. } => "fade to rgb",
            Command::SetRgb { .. } => "set rgb",
            Command::ReadRgb { .. } => "read rgb",
            Command::PlayLoop { .. } => "play loop",
            Command::ReadPlayState => "read play state",
            Command::WritePatternLine { .. } => "write pattern line",
            Command::ReadPatternLine { .. } => "read pattern line",
            Command::SavePattern => "save pattern",
            Command::SetLedN { .. } => "set ledn",
            Command::GetStartup => "get startup params",
            Command::SetStartup(_) => "set startup params",
            Command::EepromRead { .. } => "eeprom read",
            Command::EepromWrite { .. } => "eeprom write",
            Command::ServerTickle(_) => "server tickle",
            Command::Version => "firmware version",
            Command::WriteNote { .. } => "write note",
            Command::ReadNote { .. } => "read note",
            Command::BootloaderGo => "bootloader go",
            Command::BootloaderLock => "bootloader lock",
            Command::GetId => "get id",
        }
    }
}

// ── Response decoding ──

fn need(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        return Err(DeviceError::UnexpectedResponse(format!(
            "{what}: short response ({} bytes)",
            buf.len()
        )));
    }
    Ok(())
}

/// `r` response: current color and remaining fade time.
pub fn decode_rgb(buf: &[u8]) -> Result<(Rgb, u32)> {
    need(buf, 7, "read rgb")?;
    Ok((
        Rgb::new(buf[2], buf[3], buf[4]),
        decode_duration(buf[5], buf[6]),
    ))
}

/// `S` response.
pub fn decode_play_state(buf: &[u8]) -> Result<PlayState> {
    need(buf, 7, "read play state")?;
    Ok(PlayState {
        playing: buf[2] != 0,
        start: buf[3],
        end: buf[4],
        count: buf[5],
        position: buf[6],
    })
}

/// `R` response.
pub fn decode_pattern_line(buf: &[u8]) -> Result<PatternLine> {
    need(buf, REPORT_BUF_SIZE - 1, "read pattern line")?;
    Ok(PatternLine {
        color: Rgb::new(buf[2], buf[3], buf[4]),
        millis: decode_duration(buf[5], buf[6]).min(u16::MAX as u32) as u16,
        ledn: buf[7],
    })
}

/// `b` response.
pub fn decode_startup(buf: &[u8]) -> Result<StartupParams> {
    need(buf, 6, "get startup params")?;
    let boot_mode = BootMode::from_byte(buf[2]).ok_or_else(|| {
        DeviceError::UnexpectedResponse(format!("unknown boot mode {}", buf[2]))
    })?;
    Ok(StartupParams {
        boot_mode,
        play_start: buf[3],
        play_end: buf[4],
        play_count: buf[5],
    })
}

/// `v` response: ASCII major digit at byte 3, minor at byte 4.
pub fn decode_version(buf: &[u8]) -> Result<u16> {
    need(buf, 5, "firmware version")?;
    let digit = |b: u8| {
        b.is_ascii_digit().then(|| (b - b'0') as u16).ok_or_else(|| {
            DeviceError::UnexpectedResponse(format!("version byte 0x{b:02x} is not a digit"))
        })
    };
    Ok(digit(buf[3])? * 100 + digit(buf[4])?)
}

/// `e` response.
pub fn decode_eeprom(buf: &[u8]) -> Result<u8> {
    need(buf, 4, "eeprom read")?;
    Ok(buf[3])
}

/// `f` response: note bytes follow id, command and note id.
pub fn decode_note(buf: &[u8]) -> Result<Vec<u8>> {
    need(buf, 3, "read note")?;
    Ok(buf[3..].to_vec())
}

/// `U` response: id bytes follow report id and command.
pub fn decode_id(buf: &[u8]) -> Result<Vec<u8>> {
    need(buf, 2, "get id")?;
    Ok(buf[2..].to_vec())
}

/// Bootloader replies carry a literal confirmation right after the report id.
pub fn check_bootloader_reply(buf: &[u8], expected: &[u8]) -> Result<()> {
    let got = buf.get(1..1 + expected.len()).unwrap_or_default();
    if got == expected {
        Ok(())
    } else {
        Err(DeviceError::UnexpectedResponse(format!(
            "bootloader replied '{}', expected '{}'",
            String::from_utf8_lossy(got),
            String::from_utf8_lossy(expected)
        )))
    }
}
