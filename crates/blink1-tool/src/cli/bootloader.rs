//! Bootloader subcommands (mk3): `gobootload`, `lockbootload`.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use super::{Ctx, RUNNING, Result, Transport};

/// Grace period before locking, to allow Ctrl+C.
const LOCK_GRACE: Duration = Duration::from_secs(3);

pub(super) fn cmd_gobootload<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    ctx.each_device(|dev| dev.bootloader_go())?;
    ctx.msg(format_args!("device is now in bootloader mode"));
    Ok(())
}

pub(super) fn cmd_lockbootload<T: Transport>(ctx: &mut Ctx<T>) -> Result<()> {
    eprintln!(
        "Locking the bootloader is permanent. Press Ctrl+C within {} s to abort.",
        LOCK_GRACE.as_secs()
    );
    let deadline = Instant::now() + LOCK_GRACE;
    while Instant::now() < deadline {
        if !RUNNING.load(Ordering::SeqCst) {
            eprintln!("aborted");
            return Ok(());
        }
        thread::sleep(Duration::from_millis(100));
    }
    ctx.each_device(|dev| dev.bootloader_lock())?;
    ctx.msg(format_args!("bootloader locked"));
    Ok(())
}
