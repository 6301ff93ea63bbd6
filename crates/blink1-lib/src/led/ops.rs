//! Color operations shared by the CLI and the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::info;

use crate::blink1::Blink1;
use crate::device::Transport;
use crate::error::Result;
use crate::registry::{DeviceRegistry, Selector};

use super::{Rgb, adjust_brightness};

// ── Single color change ──

/// Scale `color` by `brightness` and fade the selected device to it.
/// Returns the color actually sent (before degamma).
pub fn apply_color<T: Transport>(
    registry: &mut DeviceRegistry<T>,
    selector: &Selector,
    color: Rgb,
    millis: u32,
    ledn: u8,
    brightness: u8,
) -> Result<Rgb> {
    let c = adjust_brightness(brightness, color);
    registry.with_device(selector, |dev| dev.fade_to_rgb(c, millis, ledn))?;
    Ok(c)
}

/// [`apply_color`] on every selector. All devices are attempted; the first
/// error is returned.
pub fn apply_color_all<T: Transport>(
    registry: &mut DeviceRegistry<T>,
    selectors: &[Selector],
    color: Rgb,
    millis: u32,
    ledn: u8,
    brightness: u8,
) -> Result<Rgb> {
    let mut first_err = None;
    let mut sent = adjust_brightness(brightness, color);
    for sel in selectors {
        match apply_color(registry, sel, color, millis, ledn, brightness) {
            Ok(c) => sent = c,
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(sent),
    }
}

// ── Effects ──

/// Alternate `color` and black `count` times (`count <= 0` = until
/// `running` clears), pausing `delay` after each change. Black input
/// blinks white. Returns the number of completed on/off cycles.
#[allow(clippy::too_many_arguments)]
pub fn blink<T: Transport>(
    registry: &mut DeviceRegistry<T>,
    selectors: &[Selector],
    color: Rgb,
    millis: u32,
    delay: Duration,
    count: i64,
    ledn: u8,
    brightness: u8,
    running: &AtomicBool,
    mut sleep: impl FnMut(Duration),
) -> Result<usize> {
    let on = if color.is_black() { Rgb::WHITE } else { color };
    info!("blink {} times {on}", count.max(0));
    let mut cycles = 0usize;
    while (count <= 0 || (cycles as i64) < count) && running.load(Ordering::SeqCst) {
        apply_color_all(registry, selectors, on, millis, ledn, brightness)?;
        sleep(delay);
        apply_color_all(registry, selectors, Rgb::BLACK, millis, ledn, 0)?;
        sleep(delay);
        cycles += 1;
    }
    Ok(cycles)
}

/// `count` random colors.
pub fn random_colors(rng: &mut impl rand::Rng, count: usize) -> Vec<Rgb> {
    (0..count).map(|_| Rgb::random(rng)).collect()
}

/// Shimmer between the two LEDs `count` times, then turn both off.
/// Black input glimmers at half white.
pub fn glimmer<T: Transport>(
    dev: &Blink1<'_, T>,
    color: Rgb,
    millis: u32,
    delay: Duration,
    count: u32,
    mut sleep: impl FnMut(Duration),
) -> Result<()> {
    let full = if color.is_black() {
        Rgb::new(127, 127, 127)
    } else {
        color
    };
    let half = Rgb::new(full.r / 2, full.g / 2, full.b / 2);
    let count = if count == 0 { 3 } else { count };
    for _ in 0..count {
        dev.fade_to_rgb(full, millis, 1)?;
        dev.fade_to_rgb(half, millis, 2)?;
        sleep(delay / 2);
        dev.fade_to_rgb(half, millis, 1)?;
        dev.fade_to_rgb(full, millis, 2)?;
        sleep(delay / 2);
    }
    dev.fade_to_rgb(Rgb::BLACK, millis, 1)?;
    dev.fade_to_rgb(Rgb::BLACK, millis, 2)?;
    Ok(())
}
