//! Pattern subcommands: line read/write, save/clear, onboard play/stop,
//! host playback, and whole-pattern upload/readback.

use std::thread;

use blink1_lib::led::PatternLine;

use super::{
    Blink1Error, Capability, Config, Ctx, Pattern, PatternJson, PatternLineJson, PlayStateJson,
    RUNNING, Result, Rgb, Transport, led, player, print_json,
};

/// A named pattern from the table, or else the text parsed as a pattern.
fn resolve_pattern(config: &Config, text: &str) -> Result<Pattern> {
    let table = config.pattern_table();
    let pattern = Pattern::parse(table.find(text).unwrap_or(text));
    if pattern.lines.is_empty() {
        return Err(Blink1Error::Pattern(format!(
            "'{text}' is neither a pattern name nor a pattern"
        )));
    }
    Ok(pattern)
}

pub(super) fn cmd_set_pattern_line<T: Transport>(
    ctx: &mut Ctx<T>,
    pos: u8,
    color: Rgb,
) -> Result<()> {
    let c = led::adjust_brightness(ctx.brightness, color);
    let (millis, ledn) = (ctx.millis, ctx.ledn);
    ctx.each_device(|dev| {
        if dev.supports(Capability::LedAddressing) {
            dev.set_ledn(ledn)?;
        }
        dev.write_pattern_line(c, millis, pos)
    })?;
    ctx.msg(format_args!("writing pattern line {pos}: {c} {millis} ms led {ledn}"));
    Ok(())
}

pub(super) fn cmd_get_pattern_line<T: Transport>(ctx: &mut Ctx<T>, pos: u8) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        let line = dev.read_pattern_line(pos)?;
        out.push(PatternLineJson {
            serial: dev.serial().to_string(),
            pos,
            rgb: line.color.to_string(),
            millis: line.millis,
            ledn: line.ledn,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for l in &out {
        println!("pattern line {}: {} {} ms led {}", l.pos, l.rgb, l.millis, l.ledn);
    }
    Ok(())
}

pub(super) fn cmd_save_pattern<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    ctx.each_device(|dev| dev.save_pattern())?;
    ctx.msg(format_args!("saved pattern to flash"));
    Ok(())
}

pub(super) fn cmd_clear_pattern<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    ctx.each_device(|dev| dev.clear_pattern())?;
    ctx.msg(format_args!("cleared pattern"));
    Ok(())
}

pub(super) fn cmd_play<T: Transport>(
    ctx: &mut Ctx<T>,
    start: u8,
    end: u8,
    count: u8,
) -> Result<()> {
    ctx.each_device(|dev| dev.play_loop(true, start, end, count))?;
    ctx.msg(format_args!("playing lines {start}-{end}, count {count}"));
    Ok(())
}

pub(super) fn cmd_stop<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    ctx.each_device(player::stop)?;
    ctx.msg(format_args!("stopped playback"));
    Ok(())
}

pub(super) fn cmd_play_state<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        out.push(PlayStateJson {
            serial: dev.serial().to_string(),
            state: dev.read_play_state()?,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for p in &out {
        let s = p.state;
        println!(
            "playstate: playing:{} start:{} end:{} count:{} pos:{}",
            s.playing as u8, s.start, s.end, s.count, s.position
        );
    }
    Ok(())
}

/// Play on the host: one fade per line across every selected device,
/// sleeping the line's duration in between. Blocks until done or Ctrl+C.
pub(super) fn cmd_play_pattern<T: Transport>(ctx: &mut Ctx<T>, text: &str) -> Result<()> {
    let pattern = resolve_pattern(&ctx.config, text)?;
    let sels = ctx.selectors()?;
    ctx.msg(format_args!("playing pattern {pattern}"));

    let (fade, brightness) = (ctx.millis_override, ctx.brightness);
    let registry = &mut ctx.registry;
    let played = player::play_on_host(
        &pattern,
        &RUNNING,
        |line| {
            let millis = fade.unwrap_or(line.millis as u32);
            led::apply_color_all(registry, &sels, line.color, millis, line.ledn, brightness)
                .map(|_| ())
        },
        thread::sleep,
    )?;
    log::info!("played {played} line(s)");
    Ok(())
}

pub(super) fn cmd_write_pattern<T: Transport>(ctx: &mut Ctx<T>, text: &str) -> Result<()> {
    let pattern = resolve_pattern(&ctx.config, text)?;
    let brightness = ctx.brightness;
    ctx.each_device(|dev| player::upload(dev, &pattern, brightness).map(|_| ()))?;
    ctx.msg(format_args!("wrote {} pattern line(s)", pattern.lines.len()));
    Ok(())
}

/// The RAM pattern as a pattern string. Trailing blank lines are dropped.
pub(super) fn cmd_read_pattern<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        let mut lines = dev.read_pattern()?;
        while lines.last().is_some_and(|l| *l == PatternLine::default()) {
            lines.pop();
        }
        out.push(PatternJson {
            serial: dev.serial().to_string(),
            pattern: Pattern { repeats: 0, lines }.to_string(),
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for p in &out {
        println!("{}", p.pattern);
    }
    Ok(())
}
