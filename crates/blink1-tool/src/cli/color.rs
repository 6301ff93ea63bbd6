//! Color subcommands: `rgb`, `hsb`, named colors, `set-rgb`, `read-rgb`,
//! and the `blink` / `random` / `glimmer` effects.

use std::sync::atomic::Ordering;
use std::thread;

use rand::Rng;

use super::{
    Blink1Error, ColorJson, Ctx, RUNNING, Result, Rgb, Selector, Transport, led, print_json,
};

fn selector_list(sels: &[Selector]) -> String {
    sels.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Fade every selected device to `color` over `--millis`.
pub(super) fn cmd_fade<T: Transport>(ctx: &mut Ctx<T>, color: Rgb) -> Result<()> {
    let sels = ctx.selectors()?;
    let sent = led::apply_color_all(
        &mut ctx.registry,
        &sels,
        color,
        ctx.millis,
        ctx.ledn,
        ctx.brightness,
    )?;
    ctx.msg(format_args!(
        "set dev:{} to rgb:{sent} over {} ms",
        selector_list(&sels),
        ctx.millis
    ));
    Ok(())
}

pub(super) fn cmd_named<T: Transport>(ctx: &mut Ctx<T>, name: &str) -> Result<()> {
    let color = led::named_color(name)
        .ok_or_else(|| Blink1Error::Color(format!("unknown color '{name}'")))?;
    cmd_fade(ctx, color)
}

/// `h,s,b` triple, each channel parsed like a color channel.
pub(super) fn cmd_hsb<T: Transport>(ctx: &mut Ctx<T>, hsb: &str) -> Result<()> {
    let c = led::parse_color(hsb);
    cmd_fade(ctx, led::parse_hsb([c.r, c.g, c.b]))
}

pub(super) fn cmd_set_rgb<T: Transport>(ctx: &mut Ctx<T>, color: Rgb) -> Result<()> {
    let c = led::adjust_brightness(ctx.brightness, color);
    ctx.each_device(|dev| dev.set_rgb(c))?;
    ctx.msg(format_args!("set rgb:{c}"));
    Ok(())
}

pub(super) fn cmd_read_rgb<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let ledn = ctx.ledn;
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        let (c, millis) = dev.read_rgb(ledn)?;
        out.push(ColorJson {
            serial: dev.serial().to_string(),
            ledn,
            rgb: c.to_string(),
            millis,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for c in &out {
        println!("reading rgb at led {}: {}", c.ledn, c.rgb);
    }
    Ok(())
}

pub(super) fn cmd_blink<T: Transport>(
    ctx: &mut Ctx<T>,
    count: i64,
    rgb: Option<&str>,
) -> Result<()> {
    let color = rgb.map(led::parse_color).unwrap_or(Rgb::WHITE);
    let sels = ctx.selectors()?;
    ctx.msg(format_args!(
        "blink {} times rgb:{color}",
        if count <= 0 {
            "forever".to_string()
        } else {
            count.to_string()
        }
    ));
    let delay = ctx.delay();
    led::blink(
        &mut ctx.registry,
        &sels,
        color,
        ctx.millis,
        delay,
        count,
        ctx.ledn,
        ctx.brightness,
        &RUNNING,
        thread::sleep,
    )?;
    Ok(())
}

/// Fade through `count` random colors. With `--led N`, each color lands on
/// a random LED in `1..=N`.
pub(super) fn cmd_random<T: Transport>(ctx: &mut Ctx<T>, count: u32) -> Result<()> {
    let sels = ctx.selectors()?;
    let mut rng = rand::rng();
    for color in led::random_colors(&mut rng, count.max(1) as usize) {
        if !RUNNING.load(Ordering::SeqCst) {
            break;
        }
        let ledn = if ctx.ledn == 0 {
            0
        } else {
            rng.random_range(1..=ctx.ledn)
        };
        led::apply_color_all(
            &mut ctx.registry,
            &sels,
            color,
            ctx.millis,
            ledn,
            ctx.brightness,
        )?;
        ctx.msg(format_args!("random color: {color} led {ledn}"));
        thread::sleep(ctx.delay());
    }
    Ok(())
}

pub(super) fn cmd_glimmer<T: Transport>(
    ctx: &mut Ctx<T>,
    count: u32,
    rgb: Option<&str>,
) -> Result<()> {
    let color = rgb.map(led::parse_color).unwrap_or(Rgb::BLACK);
    let color = led::adjust_brightness(ctx.brightness, color);
    let (millis, delay) = (ctx.millis, ctx.delay());
    ctx.msg(format_args!("glimmering {count} times"));
    ctx.each_device(|dev| led::glimmer(dev, color, millis, delay, count, thread::sleep))
}
