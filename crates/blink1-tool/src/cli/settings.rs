//! Device settings: server tickle, startup params, EEPROM, serial number,
//! firmware version, unique id.

use blink1_lib::report::{ServerTickle, StartupParams};

use super::{BootMode, Ctx, Result, Transport, ValueJson, print_json};

/// Line the tickle watchdog plays up to when no end is given.
const TICKLE_DEFAULT_END: u8 = 15;

pub(super) fn cmd_server_tickle<T: Transport>(
    ctx: &mut Ctx<T>,
    enabled: bool,
    stay_lit: bool,
    start: u8,
    end: u8,
) -> Result<()> {
    let tickle = ServerTickle {
        enabled,
        millis: ctx.delay_millis,
        stay_lit,
        start,
        end: if end == 0 { TICKLE_DEFAULT_END } else { end },
    };
    ctx.each_device(|dev| dev.server_tickle(tickle))?;
    if enabled {
        ctx.msg(format_args!(
            "server tickle on: {} ms, lines {}-{}",
            tickle.millis, tickle.start, tickle.end
        ));
    } else {
        ctx.msg(format_args!("server tickle off"));
    }
    Ok(())
}

pub(super) fn cmd_fw_version<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        out.push(ValueJson {
            serial: dev.serial().to_string(),
            value: dev.firmware_version()?,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for v in &out {
        println!("firmware version: {}", v.value);
    }
    Ok(())
}

pub(super) fn cmd_set_startup<T: Transport>(
    ctx: &mut Ctx<T>,
    boot_mode: BootMode,
    play_start: u8,
    play_end: u8,
    play_count: u8,
) -> Result<()> {
    let params = StartupParams {
        boot_mode,
        play_start,
        play_end,
        play_count,
    };
    ctx.each_device(|dev| dev.set_startup_params(params))?;
    ctx.msg(format_args!(
        "startup: mode:{boot_mode} start:{play_start} end:{play_end} count:{play_count}"
    ));
    Ok(())
}

pub(super) fn cmd_get_startup<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        out.push(ValueJson {
            serial: dev.serial().to_string(),
            value: dev.startup_params()?,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for v in &out {
        let p = v.value;
        println!(
            "startup: mode:{} start:{} end:{} count:{}",
            p.boot_mode, p.play_start, p.play_end, p.play_count
        );
    }
    Ok(())
}

pub(super) fn cmd_eeread<T: Transport>(ctx: &mut Ctx<T>, addr: u8) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        out.push(ValueJson {
            serial: dev.serial().to_string(),
            value: dev.eeprom_read(addr)?,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for v in &out {
        println!("eeread: addr 0x{addr:02x} = 0x{:02x}", v.value);
    }
    Ok(())
}

pub(super) fn cmd_eewrite<T: Transport>(ctx: &mut Ctx<T>, addr: u8, value: u8) -> Result<()> {
    ctx.each_device(|dev| dev.eeprom_write(addr, value))?;
    ctx.msg(format_args!("eewrite: addr 0x{addr:02x} = 0x{value:02x}"));
    Ok(())
}

pub(super) fn cmd_set_serial<T: Transport>(ctx: &mut Ctx<T>, serial: &str) -> Result<()> {
    ctx.each_device(|dev| dev.write_serial(serial))?;
    ctx.msg(format_args!(
        "serial number set to {}; replug the device to see it",
        serial.to_ascii_uppercase()
    ));
    Ok(())
}

pub(super) fn cmd_get_id<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        out.push(ValueJson {
            serial: dev.serial().to_string(),
            value: dev.unique_id()?,
        });
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for v in &out {
        let bytes: Vec<String> = v.value.iter().map(|b| format!("0x{b:02x}")).collect();
        println!("id: {}", bytes.join(","));
    }
    Ok(())
}
