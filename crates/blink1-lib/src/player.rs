//! Pattern playback, on the host or on the device.
//!
//! Host playback walks the lines itself, issuing one fade per line and
//! sleeping for its duration; it blocks the caller until the pattern ends or
//! `running` is cleared. Device playback uploads the lines into the pattern
//! RAM and starts the firmware's own loop, returning immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::blink1::Blink1;
use crate::device::{Capability, Transport};
use crate::error::{Blink1Error, Result};
use crate::led::{Pattern, PatternLine, adjust_brightness};

/// Play `pattern` step by step, calling `step` for every line and `sleep`
/// for its duration. Returns the number of lines played.
///
/// Checks `running` before every line, so a cleared flag stops a
/// forever-repeating pattern at the next line boundary.
pub fn play_on_host(
    pattern: &Pattern,
    running: &AtomicBool,
    mut step: impl FnMut(&PatternLine) -> Result<()>,
    mut sleep: impl FnMut(Duration),
) -> Result<usize> {
    if pattern.lines.is_empty() {
        return Ok(0);
    }
    let mut played = 0;
    let mut pass = 0i64;
    while pattern.is_forever() || pass < pattern.repeats as i64 {
        for line in &pattern.lines {
            if !running.load(Ordering::SeqCst) {
                debug!("host playback stopped after {played} line(s)");
                return Ok(played);
            }
            step(line)?;
            played += 1;
            sleep(Duration::from_millis(line.millis as u64));
        }
        pass += 1;
    }
    Ok(played)
}

/// [`play_on_host`] against a single device with real sleeps.
pub fn play_on_host_device<T: Transport>(
    dev: &Blink1<'_, T>,
    pattern: &Pattern,
    brightness: u8,
    running: &AtomicBool,
) -> Result<usize> {
    play_on_host(
        pattern,
        running,
        |line| {
            dev.fade_to_rgb(
                adjust_brightness(brightness, line.color),
                line.millis as u32,
                line.ledn,
            )
        },
        thread::sleep,
    )
}

/// Write `pattern` into the device's pattern RAM at positions `0..n`
/// without starting playback. Returns the number of lines written.
///
/// Per-line LED addressing is only sent to devices that support it.
pub fn upload<T: Transport>(
    dev: &Blink1<'_, T>,
    pattern: &Pattern,
    brightness: u8,
) -> Result<usize> {
    let n = pattern.lines.len();
    if n == 0 {
        return Err(Blink1Error::Pattern("pattern has no lines".into()));
    }
    let capacity = dev.revision().pattern_capacity();
    if n > capacity as usize {
        return Err(Blink1Error::Pattern(format!(
            "pattern has {n} lines; {} devices hold {capacity}",
            dev.revision()
        )));
    }
    let addressable = dev.supports(Capability::LedAddressing);
    for (pos, line) in pattern.lines.iter().enumerate() {
        if addressable {
            dev.set_ledn(line.ledn)?;
        }
        dev.write_pattern_line(
            adjust_brightness(brightness, line.color),
            line.millis as u32,
            pos as u8,
        )?;
    }
    Ok(n)
}

/// [`upload`] then start onboard playback of the uploaded lines.
///
/// Repeat counts above 255 are clamped; forever plays with count 0.
pub fn play_on_device<T: Transport>(
    dev: &Blink1<'_, T>,
    pattern: &Pattern,
    brightness: u8,
) -> Result<()> {
    let n = upload(dev, pattern, brightness)?;
    let count = if pattern.is_forever() {
        0
    } else {
        pattern.repeats.clamp(1, u8::MAX as i32) as u8
    };
    dev.play_loop(true, 0, (n - 1) as u8, count)
}

/// Stop onboard playback.
pub fn stop<T: Transport>(dev: &Blink1<'_, T>) -> Result<()> {
    dev.play(false, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockTransport;
    use crate::led::Rgb;
    use crate::report::Command;

    fn two_line(repeats: i32) -> Pattern {
        Pattern {
            repeats,
            lines: vec![
                PatternLine {
                    color: Rgb::new(255, 0, 0),
                    millis: 500,
                    ledn: 1,
                },
                PatternLine {
                    color: Rgb::BLACK,
                    millis: 250,
                    ledn: 2,
                },
            ],
        }
    }

    // ── host ──

    #[test]
    fn host_plays_every_line_each_repeat() {
        let running = AtomicBool::new(true);
        let mut seen = Vec::new();
        let mut slept = Vec::new();
        let n = play_on_host(
            &two_line(3),
            &running,
            |l| {
                seen.push(l.color);
                Ok(())
            },
            |d| slept.push(d.as_millis()),
        )
        .unwrap();
        assert_eq!(n, 6);
        assert_eq!(seen.len(), 6);
        assert_eq!(slept, [500, 250, 500, 250, 500, 250]);
    }

    #[test]
    fn host_forever_stops_when_flag_cleared() {
        let running = AtomicBool::new(true);
        let mut count = 0;
        let n = play_on_host(
            &two_line(-1),
            &running,
            |_| {
                count += 1;
                if count == 7 {
                    running.store(false, Ordering::SeqCst);
                }
                Ok(())
            },
            |_| {},
        )
        .unwrap();
        assert_eq!(n, 7);
    }

    #[test]
    fn host_step_error_aborts() {
        let running = AtomicBool::new(true);
        let err = play_on_host(
            &two_line(2),
            &running,
            |_| Err(Blink1Error::Pattern("boom".into())),
            |_| {},
        );
        assert!(err.is_err());
    }

    #[test]
    fn host_empty_pattern_plays_nothing() {
        let running = AtomicBool::new(true);
        let n = play_on_host(&Pattern::default(), &running, |_| Ok(()), |_| {}).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn host_device_applies_brightness() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = t.open("mock://0").unwrap();
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        let running = AtomicBool::new(true);
        let p = Pattern {
            repeats: 1,
            lines: vec![PatternLine {
                color: Rgb::WHITE,
                millis: 0,
                ledn: 0,
            }],
        };
        play_on_host_device(&dev, &p, 128, &running).unwrap();
        assert_eq!(
            t.state("20000001").unwrap().leds[0],
            Rgb::new(127, 127, 127)
        );
    }

    // ── device ──

    fn device_session(
        t: &mut MockTransport,
        serial: &str,
    ) -> crate::device::mock::MockHandle {
        let path = t
            .enumerate(crate::protocol::BLINK1_VID, crate::protocol::BLINK1_PID)
            .unwrap()
            .into_iter()
            .find(|d| d.serial == serial)
            .unwrap()
            .path;
        t.open(&path).unwrap()
    }

    #[test]
    fn device_upload_then_loop() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        play_on_device(&dev, &two_line(3), 0).unwrap();

        let cmds = t.commands();
        assert_eq!(cmds.len(), 5);
        assert_eq!(cmds[0], Command::SetLedN { ledn: 1 });
        assert_eq!(
            cmds[4],
            Command::PlayLoop {
                play: true,
                start: 0,
                end: 1,
                count: 3
            }
        );
        let s = t.state("20000001").unwrap();
        assert_eq!(s.pattern[0].ledn, 1);
        assert_eq!(s.pattern[1].millis, 250);
        assert!(s.play.playing);
    }

    #[test]
    fn device_forever_uses_count_zero() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        play_on_device(&dev, &two_line(-1), 0).unwrap();
        assert_eq!(t.state("20000001").unwrap().play.count, 0);
    }

    #[test]
    fn device_mk1_skips_led_addressing() {
        let mut t = MockTransport::with_serials(&["1A001407"]);
        let h = device_session(&mut t, "1A001407");
        let dev = Blink1::new(&t, &h, "1A001407", crate::device::HardwareRevision::Rev1, false);
        play_on_device(&dev, &two_line(1), 0).unwrap();
        assert!(
            !t.commands()
                .iter()
                .any(|c| matches!(c, Command::SetLedN { .. }))
        );
    }

    #[test]
    fn device_rejects_oversized_pattern() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        let p = Pattern {
            repeats: 1,
            lines: vec![PatternLine::default(); 17],
        };
        assert!(matches!(
            play_on_device(&dev, &p, 0),
            Err(Blink1Error::Pattern(_))
        ));
        assert_eq!(t.write_count(), 0);
    }

    #[test]
    fn device_rejects_empty_pattern() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        assert!(play_on_device(&dev, &Pattern::default(), 0).is_err());
    }

    #[test]
    fn upload_does_not_start_playback() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        assert_eq!(upload(&dev, &two_line(3), 0).unwrap(), 2);
        let s = t.state("20000001").unwrap();
        assert!(!s.play.playing);
        assert_eq!(s.pattern[0].color, Rgb::new(255, 0, 0));
    }

    #[test]
    fn stop_sends_play_off() {
        let mut t = MockTransport::with_serials(&["20000001"]);
        let h = device_session(&mut t, "20000001");
        let dev = Blink1::new(&t, &h, "20000001", crate::device::HardwareRevision::Rev2, false);
        stop(&dev).unwrap();
        assert!(!t.state("20000001").unwrap().play.playing);
    }
}
