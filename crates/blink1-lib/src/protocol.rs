//! Protocol constants for blink(1) USB notification lights.
//!
//! All commands travel as HID feature reports. The primary report carries
//! an 8-byte payload behind report id 1; the secondary report used by mk3
//! firmware (notes, unique id, bootloader control) carries 60 bytes behind
//! report id 2. Byte 0 of every buffer is the report id, byte 1 is the
//! single-character command code.

// ── USB identity ──

/// ThingM vendor id.
pub const BLINK1_VID: u16 = 0x27B8;

/// blink(1) product id (shared by all hardware revisions).
pub const BLINK1_PID: u16 = 0x01ED;

// ── Report framing ──

pub const REPORT_ID: u8 = 1;
pub const REPORT_SIZE: usize = 8;
/// Report id + payload.
pub const REPORT_BUF_SIZE: usize = REPORT_SIZE + 1;

pub const REPORT2_ID: u8 = 2;
pub const REPORT2_SIZE: usize = 60;
pub const REPORT2_BUF_SIZE: usize = REPORT2_SIZE + 1;

// ── Command codes ──

pub const CMD_FADE_TO_RGB: u8 = b'c';
pub const CMD_SET_RGB: u8 = b'n';
pub const CMD_READ_RGB: u8 = b'r';
pub const CMD_PLAY_LOOP: u8 = b'p';
pub const CMD_READ_PLAY_STATE: u8 = b'S';
pub const CMD_WRITE_PATTERN_LINE: u8 = b'P';
pub const CMD_READ_PATTERN_LINE: u8 = b'R';
pub const CMD_SAVE_PATTERN: u8 = b'W';
pub const CMD_SET_LEDN: u8 = b'l';
pub const CMD_GET_STARTUP: u8 = b'b';
pub const CMD_SET_STARTUP: u8 = b'B';
pub const CMD_EEPROM_READ: u8 = b'e';
pub const CMD_EEPROM_WRITE: u8 = b'E';
pub const CMD_SERVER_TICKLE: u8 = b'D';
pub const CMD_VERSION: u8 = b'v';
pub const CMD_WRITE_NOTE: u8 = b'F';
pub const CMD_READ_NOTE: u8 = b'f';
pub const CMD_BOOTLOADER_GO: u8 = b'G';
pub const CMD_BOOTLOADER_LOCK: u8 = b'L';
pub const CMD_GET_ID: u8 = b'U';

// ── Payload constants ──

/// Magic bytes that authorize a pattern save to flash.
pub const SAVE_PATTERN_MAGIC: [u8; 4] = [0xBE, 0xEF, 0xCA, 0xFE];

/// Challenge sent to enter the bootloader, and the firmware's reply.
pub const BOOTLOADER_GO_CHALLENGE: &[u8] = b"GoBoot";
pub const BOOTLOADER_GO_REPLY: &[u8] = b"GOBOOT";

/// Challenge sent to lock the bootloader, and the firmware's reply.
pub const BOOTLOADER_LOCK_CHALLENGE: &[u8] = b"LockBootload";
pub const BOOTLOADER_LOCK_REPLY: &[u8] = b"LOCKED";

/// Note payload capacity: the secondary report minus id, command, note id.
pub const NOTE_CAPACITY: usize = REPORT2_BUF_SIZE - 3;

/// Number of note slots on mk3 firmware.
pub const NOTE_COUNT: u8 = 10;

/// Unique id length: the secondary report minus id and command.
pub const ID_SIZE: usize = REPORT2_BUF_SIZE - 2;

// ── EEPROM (mk1) ──

/// First EEPROM byte of the 4-byte serial number.
pub const EEPROM_SERIAL_ADDR: u8 = 2;
pub const EEPROM_SERIAL_LEN: usize = 4;

// ── Limits ──

/// Maximum number of devices tracked by one registry.
pub const MAX_DEVICES: usize = 16;

/// Maximum number of lines in a parsed pattern.
pub const MAX_PATTERN_LINES: usize = 32;

/// Onboard pattern slots on mk1/mk2 firmware.
pub const PATTERN_SLOTS: u8 = 16;

/// Onboard pattern slots on mk3 firmware.
pub const PATTERN_SLOTS_MK3: u8 = 32;

/// Largest fade the duration field can express (0xFFFF tenths of a second).
pub const MAX_FADE_MILLIS: u32 = 0xFFFF * 10;

// ── Serial number ranges ──

/// Serials at or above this value (parsed as hex) are mk2 devices.
pub const SERIAL_MK2_THRESHOLD: u32 = 0x2000_0000;

/// Serials at or above this value (parsed as hex) are mk3 devices.
pub const SERIAL_MK3_THRESHOLD: u32 = 0x3000_0000;
