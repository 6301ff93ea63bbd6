//! blink1-server: HTTP/JSON front end for blink(1) USB notification lights.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use tiny_http::{Header, Response};

use blink1_lib::config::Config;
use blink1_lib::device::HidTransport;
use blink1_lib::error::{Blink1Error, Result};

mod server;

static RUNNING: AtomicBool = AtomicBool::new(true);

/// How long `recv` waits before the loop checks for shutdown and idle
/// handles.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(
    name = "blink1-server",
    version,
    about = "HTTP/JSON server for blink(1) USB notification lights"
)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Don't print the startup banner
    #[arg(short, long)]
    quiet: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    if let Err(e) = serve(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn serve(args: &Args) -> Result<()> {
    let config = Config::load_checked(args.config.as_deref());
    let host = args.host.clone().unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let transport = HidTransport::new()?;
    let mut state = server::Server::new(transport, &config);

    let http = tiny_http::Server::http(&addr)
        .map_err(|e| Blink1Error::Io(std::io::Error::other(format!("bind {addr}: {e}"))))?;
    if !args.quiet {
        println!("blink1-server listening on http://{addr}/");
    }
    info!("serving on {addr}");

    let json = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok();

    while RUNNING.load(Ordering::SeqCst) {
        match http.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                let reply = state.handle(request.url());
                let body = serde_json::to_string_pretty(&reply.body).unwrap_or_default();
                let mut response = Response::from_string(body).with_status_code(reply.code);
                if let Some(h) = json.clone() {
                    response = response.with_header(h);
                }
                if let Err(e) = request.respond(response) {
                    warn!("respond: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("accept: {e}");
                break;
            }
        }
        state.flush_idle();
    }

    info!("shutting down");
    Ok(())
}
