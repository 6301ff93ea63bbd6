//! `list` subcommand: enumerate devices with revision and firmware version.

use super::{Ctx, DeviceError, DeviceJson, Result, Selector, Transport, print_json};

pub(super) fn cmd_list<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    if ctx.registry.enumerate()? == 0 {
        return Err(DeviceError::NotFound.into());
    }

    let mut devices = Vec::new();
    for entry in ctx.registry.entries() {
        let firmware = match ctx
            .registry
            .with_device(&Selector::Index(entry.index), |dev| dev.firmware_version())
        {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("{}: {e}", entry.serial);
                None
            }
        };
        devices.push(DeviceJson {
            id: entry.index,
            serial: entry.serial,
            revision: entry.revision,
            firmware,
            path: entry.path,
        });
    }

    if ctx.json {
        return print_json(&devices);
    }

    ctx.msg(format_args!("blink(1) list:"));
    for d in &devices {
        let firmware = d
            .firmware
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".into());
        println!(
            "id:{} - serialnum:{} ({}) fw version:{firmware}",
            d.id, d.serial, d.revision
        );
    }
    Ok(())
}
