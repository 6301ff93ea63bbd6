//! One open device: typed operations over the report codec.
//!
//! A [`Blink1`] borrows its transport handle from the
//! [`DeviceRegistry`](crate::registry::DeviceRegistry) for the duration of
//! one request. Every exchange is strictly request/response; nothing is
//! pipelined.

use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::device::{Capability, HardwareRevision, Transport};
use crate::error::{Blink1Error, Result};
use crate::led::{PatternLine, Rgb};
use crate::protocol::*;
use crate::report::{self, Command, PlayState, Report, ServerTickle, StartupParams};

/// Firmware needs time to prepare EEPROM reads and to commit EEPROM writes.
const EEPROM_SETTLE: Duration = Duration::from_millis(50);

pub struct Blink1<'a, T: Transport> {
    transport: &'a T,
    handle: &'a T::Handle,
    serial: &'a str,
    revision: HardwareRevision,
    degamma: bool,
}

impl<'a, T: Transport> Blink1<'a, T> {
    pub fn new(
        transport: &'a T,
        handle: &'a T::Handle,
        serial: &'a str,
        revision: HardwareRevision,
        degamma: bool,
    ) -> Self {
        Blink1 {
            transport,
            handle,
            serial,
            revision,
            degamma,
        }
    }

    pub fn serial(&self) -> &str {
        self.serial
    }

    pub fn revision(&self) -> HardwareRevision {
        self.revision
    }

    pub fn supports(&self, cap: Capability) -> bool {
        self.revision.supports(cap)
    }

    // ── Raw exchange ──

    fn send(&self, cmd: &Command) -> crate::device::Result<Report> {
        let report = cmd.encode(self.degamma);
        debug!("{} write {}: {report:?}", self.serial, cmd.name());
        self.transport.write(self.handle, report.as_bytes())?;
        Ok(report)
    }

    /// Write `cmd`, then read back the firmware's response report.
    fn exchange(&self, cmd: &Command) -> crate::device::Result<Report> {
        let sent = self.send(cmd)?;
        self.read_response(cmd, &sent)
    }

    fn read_response(&self, cmd: &Command, sent: &Report) -> crate::device::Result<Report> {
        let mut resp = sent.response_buffer();
        let n = self.transport.read(self.handle, resp.as_mut_bytes())?;
        debug!("{} read {} ({n} bytes): {resp:?}", self.serial, cmd.name());
        Ok(resp)
    }

    // ── Color ──

    /// Fade LED `ledn` (0 = all) to `color` over `millis`.
    pub fn fade_to_rgb(&self, color: Rgb, millis: u32, ledn: u8) -> Result<()> {
        self.send(&Command::FadeToRgb {
            color,
            millis,
            ledn,
        })?;
        Ok(())
    }

    /// Set every LED to `color` immediately.
    pub fn set_rgb(&self, color: Rgb) -> Result<()> {
        self.send(&Command::SetRgb { color })?;
        Ok(())
    }

    /// Current color of LED `ledn` and the fade time remaining.
    /// Colors are reported as the device holds them (after degamma).
    pub fn read_rgb(&self, ledn: u8) -> Result<(Rgb, u32)> {
        self.revision.require(Capability::ReadRgb, "read rgb")?;
        let resp = self.exchange(&Command::ReadRgb { ledn })?;
        Ok(report::decode_rgb(resp.as_bytes())?)
    }

    // ── Playback ──

    pub fn play(&self, play: bool, start: u8) -> Result<()> {
        self.play_loop(play, start, 0, 0)
    }

    /// Start (or stop) onboard playback of lines `start..=end`, `count`
    /// times (0 = forever).
    pub fn play_loop(&self, play: bool, start: u8, end: u8, count: u8) -> Result<()> {
        self.send(&Command::PlayLoop {
            play,
            start,
            end,
            count,
        })?;
        Ok(())
    }

    pub fn read_play_state(&self) -> Result<PlayState> {
        self.revision.require(Capability::PlayState, "read play state")?;
        let resp = self.exchange(&Command::ReadPlayState)?;
        Ok(report::decode_play_state(resp.as_bytes())?)
    }

    // ── Onboard pattern ──

    fn check_position(&self, pos: u8) -> Result<()> {
        let cap = self.revision.pattern_capacity();
        if pos >= cap {
            return Err(Blink1Error::Argument(format!(
                "pattern position {pos} out of range (0-{} on {} devices)",
                cap - 1,
                self.revision
            )));
        }
        Ok(())
    }

    /// Write one line into RAM pattern slot `pos`. The line's LED comes from
    /// the last [`set_ledn`](Self::set_ledn).
    pub fn write_pattern_line(&self, color: Rgb, millis: u32, pos: u8) -> Result<()> {
        self.check_position(pos)?;
        self.send(&Command::WritePatternLine { color, millis, pos })?;
        Ok(())
    }

    pub fn read_pattern_line(&self, pos: u8) -> Result<PatternLine> {
        self.check_position(pos)?;
        let resp = self.exchange(&Command::ReadPatternLine { pos })?;
        Ok(report::decode_pattern_line(resp.as_bytes())?)
    }

    /// Whole onboard pattern, slot by slot.
    pub fn read_pattern(&self) -> Result<Vec<PatternLine>> {
        (0..self.revision.pattern_capacity())
            .map(|pos| self.read_pattern_line(pos))
            .collect()
    }

    /// Commit the RAM pattern to flash.
    ///
    /// Flash programming outlasts the transport timeout, so a failed write
    /// here is expected and not reported.
    pub fn save_pattern(&self) -> Result<()> {
        if let Err(e) = self.send(&Command::SavePattern) {
            warn!("{}: save pattern: {e} (ignored, flash write still completes)", self.serial);
        }
        Ok(())
    }

    /// Select the LED that subsequent pattern line writes address.
    pub fn set_ledn(&self, ledn: u8) -> Result<()> {
        self.revision.require(Capability::LedAddressing, "set ledn")?;
        self.send(&Command::SetLedN { ledn })?;
        Ok(())
    }

    /// Overwrite every pattern slot with black and no duration.
    pub fn clear_pattern(&self) -> Result<()> {
        for pos in 0..self.revision.pattern_capacity() {
            self.send(&Command::WritePatternLine {
                color: Rgb::BLACK,
                millis: 0,
                pos,
            })?;
        }
        Ok(())
    }

    // ── Startup ──

    pub fn startup_params(&self) -> Result<StartupParams> {
        let resp = self.exchange(&Command::GetStartup)?;
        Ok(report::decode_startup(resp.as_bytes())?)
    }

    pub fn set_startup_params(&self, params: StartupParams) -> Result<()> {
        self.send(&Command::SetStartup(params))?;
        Ok(())
    }

    // ── EEPROM (mk1) ──

    pub fn eeprom_read(&self, addr: u8) -> Result<u8> {
        self.revision.require(Capability::Eeprom, "eeprom read")?;
        let cmd = Command::EepromRead { addr };
        let sent = self.send(&cmd)?;
        thread::sleep(EEPROM_SETTLE);
        let resp = self.read_response(&cmd, &sent)?;
        Ok(report::decode_eeprom(resp.as_bytes())?)
    }

    pub fn eeprom_write(&self, addr: u8, value: u8) -> Result<()> {
        self.revision.require(Capability::Eeprom, "eeprom write")?;
        self.send(&Command::EepromWrite { addr, value })?;
        Ok(())
    }

    /// Program a new USB serial number: 8 hex digits stored as 4 bytes.
    /// Each byte write is retried once; a second failure aborts.
    pub fn write_serial(&self, serial: &str) -> Result<()> {
        self.revision.require(Capability::Eeprom, "set serial")?;
        let bytes = parse_serial(serial)?;
        for (i, value) in bytes.into_iter().enumerate() {
            thread::sleep(EEPROM_SETTLE);
            let addr = EEPROM_SERIAL_ADDR + i as u8;
            let cmd = Command::EepromWrite { addr, value };
            if let Err(first) = self.send(&cmd) {
                warn!("{}: serial byte {i}: {first}, retrying", self.serial);
                self.send(&cmd)?;
            }
        }
        Ok(())
    }

    // ── Server tickle ──

    pub fn server_tickle(&self, tickle: ServerTickle) -> Result<()> {
        self.send(&Command::ServerTickle(tickle))?;
        Ok(())
    }

    // ── Identity ──

    /// Firmware version as `major * 100 + minor`, e.g. 204.
    pub fn firmware_version(&self) -> Result<u16> {
        let resp = self.exchange(&Command::Version)?;
        Ok(report::decode_version(resp.as_bytes())?)
    }

    pub fn unique_id(&self) -> Result<Vec<u8>> {
        self.revision.require(Capability::UniqueId, "get id")?;
        let resp = self.exchange(&Command::GetId)?;
        Ok(report::decode_id(resp.as_bytes())?)
    }

    // ── Notes (mk3) ──

    /// Store `data` in note slot `id`. Data beyond the note capacity is dropped.
    pub fn write_note(&self, id: u8, data: &[u8]) -> Result<()> {
        self.revision.require(Capability::Notes, "write note")?;
        check_note_id(id)?;
        if data.len() > NOTE_CAPACITY {
            warn!(
                "note {id}: {} bytes truncated to {NOTE_CAPACITY}",
                data.len()
            );
        }
        self.send(&Command::WriteNote {
            id,
            data: data[..data.len().min(NOTE_CAPACITY)].to_vec(),
        })?;
        Ok(())
    }

    /// Raw note contents, padded with zeros to the slot size.
    pub fn read_note(&self, id: u8) -> Result<Vec<u8>> {
        self.revision.require(Capability::Notes, "read note")?;
        check_note_id(id)?;
        let resp = self.exchange(&Command::ReadNote { id })?;
        Ok(report::decode_note(resp.as_bytes())?)
    }

    // ── Bootloader (mk3) ──

    /// Reboot into the USB bootloader. Fails if the bootloader is locked.
    pub fn bootloader_go(&self) -> Result<()> {
        self.revision.require(Capability::Bootloader, "bootloader go")?;
        let resp = self.exchange(&Command::BootloaderGo)?;
        report::check_bootloader_reply(resp.as_bytes(), BOOTLOADER_GO_REPLY)?;
        Ok(())
    }

    /// Permanently lock the bootloader.
    pub fn bootloader_lock(&self) -> Result<()> {
        self.revision.require(Capability::Bootloader, "bootloader lock")?;
        let resp = self.exchange(&Command::BootloaderLock)?;
        report::check_bootloader_reply(resp.as_bytes(), BOOTLOADER_LOCK_REPLY)?;
        Ok(())
    }
}

fn check_note_id(id: u8) -> Result<()> {
    if id >= NOTE_COUNT {
        return Err(Blink1Error::Argument(format!(
            "note id {id} out of range (0-{})",
            NOTE_COUNT - 1
        )));
    }
    Ok(())
}

/// `"2000ABCD"` → `[0x20, 0x00, 0xAB, 0xCD]`.
pub fn parse_serial(serial: &str) -> Result<[u8; EEPROM_SERIAL_LEN]> {
    let s = serial.trim();
    if s.len() != EEPROM_SERIAL_LEN * 2 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Blink1Error::Argument(format!(
            "serial '{serial}' must be {} hex digits",
            EEPROM_SERIAL_LEN * 2
        )));
    }
    let mut out = [0u8; EEPROM_SERIAL_LEN];
    for (i, b) in out.iter_mut().enumerate() {
        *b = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|e| Blink1Error::Argument(format!("serial '{serial}': {e}")))?;
    }
    Ok(out)
}

/// Trim a raw note to its text: bytes up to the first NUL, lossily decoded.
pub fn note_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use crate::device::mock::{MockHandle, MockTransport};
    use crate::report::BootMode;

    fn open(t: &mut MockTransport, path: &str) -> MockHandle {
        t.open(path).unwrap()
    }

    fn session<'a>(
        t: &'a MockTransport,
        h: &'a MockHandle,
        serial: &'a str,
        degamma: bool,
    ) -> Blink1<'a, MockTransport> {
        Blink1::new(t, h, serial, HardwareRevision::from_serial(serial), degamma)
    }

    // ── color ──

    #[test]
    fn fade_reaches_mock_state() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        b.fade_to_rgb(Rgb::new(10, 20, 30), 500, 0).unwrap();
        let s = t.state("20000001").unwrap();
        assert_eq!(s.leds[0], Rgb::new(10, 20, 30));
        assert_eq!(s.last_fade_millis, 500);
    }

    #[test]
    fn degamma_applied_on_the_wire() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", true);
        b.set_rgb(Rgb::new(128, 128, 128)).unwrap();
        assert_eq!(t.state("20000001").unwrap().leds[0], Rgb::new(55, 55, 55));
    }

    #[test]
    fn read_rgb_round_trip() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        b.fade_to_rgb(Rgb::new(1, 2, 3), 300, 2).unwrap();
        let (c, millis) = b.read_rgb(2).unwrap();
        assert_eq!(c, Rgb::new(1, 2, 3));
        assert_eq!(millis, 300);
    }

    #[test]
    fn read_rgb_unsupported_on_mk1() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "1A001407", false);
        let err = b.read_rgb(0).unwrap_err();
        assert!(matches!(
            err,
            Blink1Error::Device(DeviceError::Unsupported {
                revision: HardwareRevision::Rev1,
                ..
            })
        ));
        assert_eq!(t.write_count(), 0);
    }

    // ── pattern ──

    #[test]
    fn pattern_line_round_trip() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        b.set_ledn(2).unwrap();
        b.write_pattern_line(Rgb::new(255, 0, 0), 1000, 5).unwrap();
        let l = b.read_pattern_line(5).unwrap();
        assert_eq!(l.color, Rgb::new(255, 0, 0));
        assert_eq!(l.millis, 1000);
        assert_eq!(l.ledn, 2);
    }

    #[test]
    fn pattern_position_checked_against_revision() {
        let mut t = MockTransport::with_serials(&["20000001", "30000001"]);
        let h2 = open(&mut t, "mock://0");
        let h3 = open(&mut t, "mock://1");
        let mk2 = session(&t, &h2, "20000001", false);
        let mk3 = session(&t, &h3, "30000001", false);
        assert!(matches!(
            mk2.write_pattern_line(Rgb::WHITE, 100, 16),
            Err(Blink1Error::Argument(_))
        ));
        assert!(mk3.write_pattern_line(Rgb::WHITE, 100, 16).is_ok());
    }

    #[test]
    fn save_pattern_tolerates_flash_timeout() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        t.save_times_out.set(true);
        let b = session(&t, &h, "20000001", false);
        assert!(b.save_pattern().is_ok());
        assert_eq!(t.state("20000001").unwrap().saves, 1);
    }

    #[test]
    fn save_pattern_ignores_write_failure() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        t.fail_next_writes.set(1);
        let b = session(&t, &h, "20000001", false);
        assert!(b.save_pattern().is_ok());
    }

    #[test]
    fn clear_pattern_writes_every_slot() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        t.with_state("30000001", |s| s.pattern[31].millis = 500);
        let b = session(&t, &h, "30000001", false);
        b.clear_pattern().unwrap();
        assert_eq!(t.write_count(), 32);
        assert_eq!(t.state("30000001").unwrap().pattern[31].millis, 0);
    }

    #[test]
    fn play_state_reflects_play_loop() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        b.play_loop(true, 1, 4, 3).unwrap();
        let st = b.read_play_state().unwrap();
        assert!(st.playing);
        assert_eq!((st.start, st.end, st.count), (1, 4, 3));
    }

    // ── startup / version ──

    #[test]
    fn startup_params_round_trip() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        let p = StartupParams {
            boot_mode: BootMode::Play,
            play_start: 2,
            play_end: 6,
            play_count: 0,
        };
        b.set_startup_params(p).unwrap();
        assert_eq!(b.startup_params().unwrap(), p);
    }

    #[test]
    fn firmware_version_decoded() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        assert_eq!(b.firmware_version().unwrap(), 204);
    }

    #[test]
    fn read_failure_surfaces() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        t.fail_reads.set(true);
        let b = session(&t, &h, "20000001", false);
        assert!(matches!(
            b.firmware_version(),
            Err(Blink1Error::Device(DeviceError::ReadFailed(_)))
        ));
    }

    // ── eeprom / serial ──

    #[test]
    fn eeprom_round_trip_on_mk1() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "1A001407", false);
        b.eeprom_write(10, 0x5A).unwrap();
        assert_eq!(b.eeprom_read(10).unwrap(), 0x5A);
    }

    #[test]
    fn eeprom_rejected_on_mk2() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        assert!(b.eeprom_write(10, 1).is_err());
        assert_eq!(t.write_count(), 0);
    }

    #[test]
    fn write_serial_stores_four_bytes() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "1A001407", false);
        b.write_serial("1A00BEEF").unwrap();
        let s = t.state("1A001407").unwrap();
        assert_eq!(&s.eeprom[2..6], &[0x1A, 0x00, 0xBE, 0xEF]);
    }

    #[test]
    fn write_serial_retries_once() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = open(&mut t, "mock://0");
        t.fail_next_writes.set(1);
        let b = session(&t, &h, "1A001407", false);
        b.write_serial("12345678").unwrap();
        assert_eq!(t.write_count(), 5);
        assert_eq!(t.state("1A001407").unwrap().eeprom[2], 0x12);
    }

    #[test]
    fn write_serial_gives_up_after_retry() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = open(&mut t, "mock://0");
        t.fail_next_writes.set(2);
        let b = session(&t, &h, "1A001407", false);
        assert!(b.write_serial("12345678").is_err());
        assert_eq!(t.write_count(), 2);
    }

    #[test]
    fn parse_serial_validates() {
        assert_eq!(parse_serial("2000abcd").unwrap(), [0x20, 0x00, 0xAB, 0xCD]);
        assert!(parse_serial("2000abc").is_err());
        assert!(parse_serial("2000abcg").is_err());
    }

    // ── notes / id / bootloader ──

    #[test]
    fn note_round_trip() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        b.write_note(3, b"hello world").unwrap();
        assert_eq!(note_text(&b.read_note(3).unwrap()), "hello world");
    }

    #[test]
    fn note_truncated_to_capacity() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        b.write_note(0, &[b'x'; 100]).unwrap();
        let note = t.state("30000001").unwrap().notes[&0].clone();
        assert_eq!(note.len(), NOTE_CAPACITY);
    }

    #[test]
    fn note_id_out_of_range() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        assert!(matches!(
            b.write_note(NOTE_COUNT, b"x"),
            Err(Blink1Error::Argument(_))
        ));
    }

    #[test]
    fn notes_unsupported_on_mk2() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "20000001", false);
        assert!(b.read_note(0).is_err());
    }

    #[test]
    fn unique_id_read() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        let id = b.unique_id().unwrap();
        assert_eq!(id.len(), ID_SIZE);
        assert_eq!(id[..3], [0, 1, 2]);
    }

    #[test]
    fn bootloader_go_then_locked() {
        let mut t = MockTransport::with_serials(&["30000001"]);
        let h = open(&mut t, "mock://0");
        let b = session(&t, &h, "30000001", false);
        assert!(b.bootloader_go().is_ok());
        b.bootloader_lock().unwrap();
        assert!(matches!(
            b.bootloader_go(),
            Err(Blink1Error::Device(DeviceError::UnexpectedResponse(_)))
        ));
    }

    #[test]
    fn note_text_stops_at_nul() {
        assert_eq!(note_text(b"abc\0def"), "abc");
        assert_eq!(note_text(b""), "");
    }
}
