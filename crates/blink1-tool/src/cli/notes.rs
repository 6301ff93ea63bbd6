//! Note subcommands (mk3): `write-note`, `read-note`, `read-notes`.

use std::ops::RangeInclusive;

use blink1_lib::blink1::note_text;

use super::{Ctx, NoteJson, Result, Transport, print_json};

pub(super) fn cmd_write_note<T: Transport>(ctx: &mut Ctx<T>, id: u8, text: &str) -> Result<()> {
    ctx.each_device(|dev| dev.write_note(id, text.as_bytes()))?;
    ctx.msg(format_args!("wrote note {id}"));
    Ok(())
}

pub(super) fn cmd_read_notes<T: Transport>(
    ctx: &mut Ctx<T>,
    ids: RangeInclusive<u8>,
) -> Result<()> {
    let mut out = Vec::new();
    ctx.each_device(|dev| {
        for id in ids.clone() {
            out.push(NoteJson {
                serial: dev.serial().to_string(),
                id,
                text: note_text(&dev.read_note(id)?),
            });
        }
        Ok(())
    })?;

    if ctx.json {
        return print_json(&out);
    }
    for n in &out {
        println!("note {}: {}", n.id, n.text);
    }
    Ok(())
}
