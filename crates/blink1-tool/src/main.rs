//! blink1-tool: command-line control for blink(1) USB notification lights.

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared shutdown flag, cleared by the Ctrl+C handler. Blocking loops
/// (blink, random, play-pattern) check it between steps.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "blink1-tool",
    version,
    about = "Control blink(1) USB notification lights"
)]
struct Args {
    #[command(flatten)]
    globals: cli::Globals,

    #[command(subcommand)]
    command: cli::Command,
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            e.print().ok();
            std::process::exit(code);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(args.globals.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    if let Err(e) = cli::run(args.command, &args.globals) {
        eprintln!("error: {e}");
        if cli::is_fatal(&e) {
            std::process::exit(1);
        }
    }
}
