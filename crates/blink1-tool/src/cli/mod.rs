//! CLI subcommands: device listing, color, patterns, device settings.

mod bootloader;
mod color;
mod config_cmd;
mod list;
mod notes;
mod pattern;
mod settings;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use blink1_lib::blink1::Blink1;
pub(super) use blink1_lib::config::Config;
pub(super) use blink1_lib::device::{Capability, DeviceError, HardwareRevision, Transport};
pub(super) use blink1_lib::error::{Blink1Error, Result};
pub(super) use blink1_lib::led::{self, Pattern, Rgb};
pub(super) use blink1_lib::player;
pub(super) use blink1_lib::registry::{DeviceList, DeviceRegistry, Selector};
pub(super) use blink1_lib::report::{BootMode, PlayState};

use blink1_lib::device::HidTransport;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

/// `0x`-prefixed or decimal integer argument.
fn parse_int<N: TryFrom<i64>>(s: &str) -> std::result::Result<N, String> {
    led::parse_number(s)
        .and_then(|n| N::try_from(n).ok())
        .ok_or_else(|| format!("'{s}' is not a valid number"))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DeviceJson {
    pub id: usize,
    pub serial: String,
    pub revision: HardwareRevision,
    pub firmware: Option<u16>,
    pub path: String,
}

#[derive(Serialize)]
pub(super) struct ColorJson {
    pub serial: String,
    pub ledn: u8,
    pub rgb: String,
    pub millis: u32,
}

#[derive(Serialize)]
pub(super) struct PatternLineJson {
    pub serial: String,
    pub pos: u8,
    pub rgb: String,
    pub millis: u16,
    pub ledn: u8,
}

#[derive(Serialize)]
pub(super) struct PatternJson {
    pub serial: String,
    pub pattern: String,
}

#[derive(Serialize)]
pub(super) struct PlayStateJson {
    pub serial: String,
    #[serde(flatten)]
    pub state: PlayState,
}

#[derive(Serialize)]
pub(super) struct ValueJson<V: Serialize> {
    pub serial: String,
    pub value: V,
}

#[derive(Serialize)]
pub(super) struct NoteJson {
    pub serial: String,
    pub id: u8,
    pub text: String,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput<'a> {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: &'a Config,
    pub problems: Vec<String>,
}

// ── Options ──

/// Options shared by every subcommand. Unset values fall back to the
/// config file.
#[derive(Args, Debug, Clone)]
pub struct Globals {
    /// Device(s) to use: index, serial, path, a comma list, or "all"
    #[arg(short = 'd', long = "id", global = true, default_value = "0")]
    pub id: DeviceList,

    /// Fade time in milliseconds
    #[arg(short, long, global = true)]
    pub millis: Option<u32>,

    /// Delay between blink/random steps in milliseconds
    #[arg(short = 't', long, global = true)]
    pub delay: Option<u32>,

    /// LED to address: 0 = all, 1 = top, 2 = bottom
    #[arg(short = 'l', long = "led", global = true, default_value_t = 0)]
    pub led: u8,

    /// Brightness 1-255, 0 = unscaled
    #[arg(short, long, global = true)]
    pub brightness: Option<u8>,

    /// Send colors without perceptual correction
    #[arg(short = 'g', long, global = true)]
    pub nogamma: bool,

    /// USB vendor id (e.g. 0x27B8)
    #[arg(long, global = true, value_parser = parse_int::<u16>)]
    pub vid: Option<u16>,

    /// USB product id, 0 = any
    #[arg(long, global = true, value_parser = parse_int::<u16>)]
    pub pid: Option<u16>,

    /// Only print requested data, no progress messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output as JSON (for list, reads, config)
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List connected blink(1) devices
    List,

    /// Fade to a color: "#rrggbb", "rrggbb", or "r,g,b"
    Rgb { color: String },

    /// Fade to a hue,saturation,brightness triple (0-255 each)
    Hsb { hsb: String },

    /// Fade to full white
    #[command(alias = "white")]
    On,

    /// Fade to black
    Off,

    /// Fade to red
    Red,

    /// Fade to green
    Green,

    /// Fade to blue
    Blue,

    /// Fade to cyan
    Cyan,

    /// Fade to magenta
    Magenta,

    /// Fade to yellow
    Yellow,

    /// Set a color immediately, without fading
    SetRgb { color: String },

    /// Read the current color of the --led LED (mk2 and later)
    ReadRgb,

    /// Blink on and off COUNT times (0 = until Ctrl+C)
    Blink {
        count: i64,
        /// Color to blink (default white)
        #[arg(long)]
        rgb: Option<String>,
    },

    /// Fade through COUNT random colors
    Random {
        #[arg(default_value_t = 1)]
        count: u32,
    },

    /// Shimmer between the two LEDs COUNT times
    Glimmer {
        #[arg(default_value_t = 3)]
        count: u32,
        /// Color to glimmer (default half white)
        #[arg(long)]
        rgb: Option<String>,
    },

    /// Write one pattern line in device RAM (color, --millis, --led)
    SetPatternLine {
        #[arg(value_parser = parse_int::<u8>)]
        pos: u8,
        color: String,
    },

    /// Read one pattern line from device RAM
    GetPatternLine {
        #[arg(value_parser = parse_int::<u8>)]
        pos: u8,
    },

    /// Commit the RAM pattern to flash
    SavePattern,

    /// Blank every pattern line in device RAM
    ClearPattern,

    /// Start onboard pattern playback
    Play {
        /// First line to play
        #[arg(long, default_value_t = 0)]
        start: u8,
        /// Last line to play, 0 = end of pattern
        #[arg(long, default_value_t = 0)]
        end: u8,
        /// Times to play, 0 = forever
        #[arg(long, default_value_t = 0)]
        count: u8,
    },

    /// Stop onboard pattern playback
    Stop,

    /// Show onboard playback state (mk2 and later)
    PlayState,

    /// Play a pattern string or named pattern from the host
    PlayPattern { pattern: String },

    /// Upload a pattern string or named pattern to device RAM
    WritePattern { pattern: String },

    /// Print the device's RAM pattern as a pattern string
    ReadPattern,

    /// Arm or disarm the server-down watchdog (timeout = --delay)
    ServerTickle {
        state: OnOff,
        /// Keep the current color instead of turning off on timeout
        #[arg(long)]
        stay_lit: bool,
        /// First pattern line to play on timeout
        #[arg(long, default_value_t = 0)]
        start: u8,
        /// Last pattern line to play on timeout, 0 = 15
        #[arg(long, default_value_t = 0)]
        end: u8,
    },

    /// Print firmware version
    FwVersion,

    /// Set power-up behaviour (normal, play, off)
    SetStartup {
        mode: BootMode,
        #[arg(long, default_value_t = 0)]
        start: u8,
        #[arg(long, default_value_t = 0)]
        end: u8,
        #[arg(long, default_value_t = 0)]
        count: u8,
    },

    /// Show power-up behaviour
    GetStartup,

    /// Read an EEPROM byte (mk1)
    Eeread {
        #[arg(value_parser = parse_int::<u8>)]
        addr: u8,
    },

    /// Write an EEPROM byte (mk1)
    Eewrite {
        #[arg(value_parser = parse_int::<u8>)]
        addr: u8,
        #[arg(value_parser = parse_int::<u8>)]
        value: u8,
    },

    /// Program a new 8-hex-digit serial number (mk1)
    SetSerial { serial: String },

    /// Store text in a note slot (mk3)
    WriteNote {
        #[arg(id = "note_id", value_name = "ID", value_parser = parse_int::<u8>)]
        id: u8,
        text: String,
    },

    /// Read a note slot (mk3)
    ReadNote {
        #[arg(id = "note_id", value_name = "ID", value_parser = parse_int::<u8>)]
        id: u8,
    },

    /// Read every note slot (mk3)
    ReadNotes,

    /// Reboot into the USB bootloader (mk3)
    Gobootload,

    /// Permanently lock the bootloader (mk3)
    Lockbootload,

    /// Print the chip's unique id (mk3)
    GetId,

    /// Show current configuration and file path
    Config,
}

impl Command {
    fn has_json_output(&self) -> bool {
        matches!(
            self,
            Command::List
                | Command::ReadRgb
                | Command::GetPatternLine { .. }
                | Command::PlayState
                | Command::ReadPattern
                | Command::FwVersion
                | Command::GetStartup
                | Command::Eeread { .. }
                | Command::ReadNote { .. }
                | Command::ReadNotes
                | Command::GetId
                | Command::Config
        )
    }
}

// ── Command context ──

/// Registry plus the effective options for one invocation.
pub(super) struct Ctx<T: Transport> {
    pub registry: DeviceRegistry<T>,
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub devices: DeviceList,
    pub millis: u32,
    /// `--millis` as given; overrides per-line durations in host playback.
    pub millis_override: Option<u32>,
    pub delay_millis: u32,
    pub ledn: u8,
    pub brightness: u8,
    pub quiet: bool,
    pub json: bool,
}

impl<T: Transport> Ctx<T> {
    pub(super) fn new(transport: T, g: &Globals, config: Config) -> Self {
        let vendor_id = g.vid.unwrap_or(config.vendor_id);
        let product_id = g.pid.unwrap_or(config.product_id);
        let mut registry = DeviceRegistry::new(transport).with_ids(vendor_id, product_id);
        registry.set_degamma(config.degamma && !g.nogamma);
        Ctx {
            registry,
            devices: g.id.clone(),
            millis: g.millis.unwrap_or(config.fade_millis),
            millis_override: g.millis,
            delay_millis: g.delay.unwrap_or(config.delay_millis),
            ledn: g.led,
            brightness: g.brightness.unwrap_or(config.brightness),
            quiet: g.quiet,
            json: g.json,
            config_path: g.config.clone(),
            config,
        }
    }

    pub(super) fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_millis as u64)
    }

    /// Progress message; suppressed by `--quiet`.
    pub(super) fn msg(&self, args: fmt::Arguments<'_>) {
        if !self.quiet {
            println!("{args}");
        }
    }

    /// Selected devices, enumerating first when `all` was asked for.
    pub(super) fn selectors(&mut self) -> Result<Vec<Selector>> {
        if self.devices == DeviceList::All {
            self.registry.enumerate()?;
        }
        Ok(self.devices.selectors(self.registry.count()))
    }

    /// Run `f` on every selected device in turn, stopping at the first error.
    pub(super) fn each_device(
        &mut self,
        mut f: impl FnMut(&Blink1<'_, T>) -> Result<()>,
    ) -> Result<()> {
        let selectors = self.selectors()?;
        if selectors.is_empty() {
            return Err(DeviceError::NotFound.into());
        }
        for sel in &selectors {
            self.registry.with_device(sel, &mut f)?;
        }
        Ok(())
    }
}

/// Errors that end the process with a failure status. Everything else is
/// reported and the process still exits 0.
///
/// A device or HID layer that cannot be opened counts as no device.
pub fn is_fatal(e: &Blink1Error) -> bool {
    e.is_no_device()
        || matches!(
            e,
            Blink1Error::Device(DeviceError::OpenFailed(_))
                | Blink1Error::Argument(_)
                | Blink1Error::Color(_)
                | Blink1Error::Pattern(_)
        )
}

pub fn run(cmd: Command, globals: &Globals) -> Result<()> {
    let config = Config::load_checked(globals.config.as_deref());
    if let Command::Config = cmd {
        return config_cmd::cmd_config(&config, globals.config.as_deref(), globals.json);
    }
    let transport = HidTransport::new()?;
    let mut ctx = Ctx::new(transport, globals, config);
    dispatch(&mut ctx, cmd)
}

pub(super) fn dispatch<T: Transport>(ctx: &mut Ctx<T>, cmd: Command) -> Result<()> {
    if ctx.json && !cmd.has_json_output() {
        log::warn!("--json is not supported for this command (ignored)");
    }
    match cmd {
        Command::List => list::cmd_list(ctx),
        Command::Rgb { color } => color::cmd_fade(ctx, led::parse_color(&color)),
        Command::Hsb { hsb } => color::cmd_hsb(ctx, &hsb),
        Command::On => color::cmd_named(ctx, "white"),
        Command::Off => color::cmd_named(ctx, "off"),
        Command::Red => color::cmd_named(ctx, "red"),
        Command::Green => color::cmd_named(ctx, "green"),
        Command::Blue => color::cmd_named(ctx, "blue"),
        Command::Cyan => color::cmd_named(ctx, "cyan"),
        Command::Magenta => color::cmd_named(ctx, "magenta"),
        Command::Yellow => color::cmd_named(ctx, "yellow"),
        Command::SetRgb { color } => color::cmd_set_rgb(ctx, led::parse_color(&color)),
        Command::ReadRgb => color::cmd_read_rgb(ctx),
        Command::Blink { count, rgb } => color::cmd_blink(ctx, count, rgb.as_deref()),
        Command::Random { count } => color::cmd_random(ctx, count),
        Command::Glimmer { count, rgb } => color::cmd_glimmer(ctx, count, rgb.as_deref()),
        Command::SetPatternLine { pos, color } => {
            pattern::cmd_set_pattern_line(ctx, pos, led::parse_color(&color))
        }
        Command::GetPatternLine { pos } => pattern::cmd_get_pattern_line(ctx, pos),
        Command::SavePattern => pattern::cmd_save_pattern(ctx),
        Command::ClearPattern => pattern::cmd_clear_pattern(ctx),
        Command::Play { start, end, count } => pattern::cmd_play(ctx, start, end, count),
        Command::Stop => pattern::cmd_stop(ctx),
        Command::PlayState => pattern::cmd_play_state(ctx),
        Command::PlayPattern { pattern } => pattern::cmd_play_pattern(ctx, &pattern),
        Command::WritePattern { pattern } => pattern::cmd_write_pattern(ctx, &pattern),
        Command::ReadPattern => pattern::cmd_read_pattern(ctx),
        Command::ServerTickle {
            state,
            stay_lit,
            start,
            end,
        } => settings::cmd_server_tickle(ctx, state == OnOff::On, stay_lit, start, end),
        Command::FwVersion => settings::cmd_fw_version(ctx),
        Command::SetStartup {
            mode,
            start,
            end,
            count,
        } => settings::cmd_set_startup(ctx, mode, start, end, count),
        Command::GetStartup => settings::cmd_get_startup(ctx),
        Command::Eeread { addr } => settings::cmd_eeread(ctx, addr),
        Command::Eewrite { addr, value } => settings::cmd_eewrite(ctx, addr, value),
        Command::SetSerial { serial } => settings::cmd_set_serial(ctx, &serial),
        Command::GetId => settings::cmd_get_id(ctx),
        Command::WriteNote { id, text } => notes::cmd_write_note(ctx, id, &text),
        Command::ReadNote { id } => notes::cmd_read_notes(ctx, id..=id),
        Command::ReadNotes => notes::cmd_read_notes(ctx, 0..=blink1_lib::protocol::NOTE_COUNT - 1),
        Command::Gobootload => bootloader::cmd_gobootload(ctx),
        Command::Lockbootload => bootloader::cmd_lockbootload(ctx),
        Command::Config => {
            config_cmd::cmd_config(&ctx.config, ctx.config_path.as_deref(), ctx.json)
        }
    }
}


#[cfg(test)]
mod command_tests {
    use super::*;
    use blink1_lib::device::mock::MockTransport;
    use blink1_lib::report::Command as Report;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        globals: Globals,
        #[command(subcommand)]
        command: Command,
    }

    /// Parse `args` like the real binary (quiet, no degamma) and run them
    /// against mock devices.
    fn run_with(serials: &[&str], args: &[&str]) -> (Ctx<MockTransport>, Result<()>) {
        let argv = ["blink1-tool", "-q", "-g"]
            .into_iter()
            .chain(args.iter().copied());
        let cli = TestCli::parse_from(argv);
        let mut ctx = Ctx::new(
            MockTransport::with_serials(serials),
            &cli.globals,
            Config::default(),
        );
        let result = dispatch(&mut ctx, cli.command);
        (ctx, result)
    }

    fn led0(ctx: &Ctx<MockTransport>, serial: &str) -> Rgb {
        ctx.registry.transport().state(serial).unwrap().leds[0]
    }

    // ── Device selection ──

    #[test]
    fn no_device_is_fatal_and_writes_nothing() {
        let (ctx, r) = run_with(&[], &["red"]);
        let err = r.unwrap_err();
        assert!(is_fatal(&err));
        assert_eq!(ctx.registry.transport().write_count(), 0);
    }

    #[test]
    fn unopenable_device_is_fatal() {
        let cli = TestCli::parse_from(["blink1-tool", "-q", "red"]);
        let mut ctx = Ctx::new(
            MockTransport::with_serials(&["20000001"]),
            &cli.globals,
            Config::default(),
        );
        ctx.registry.transport().fail_open.set(true);
        let err = dispatch(&mut ctx, cli.command).unwrap_err();
        assert!(matches!(
            err,
            Blink1Error::Device(DeviceError::OpenFailed(_))
        ));
        assert!(is_fatal(&err));
        assert_eq!(ctx.registry.transport().write_count(), 0);
    }

    #[test]
    fn all_targets_every_device() {
        let (ctx, r) = run_with(&["20000001", "20000002"], &["-d", "all", "blue"]);
        r.unwrap();
        assert_eq!(led0(&ctx, "20000001"), Rgb::new(0, 0, 255));
        assert_eq!(led0(&ctx, "20000002"), Rgb::new(0, 0, 255));
    }

    #[test]
    fn id_by_serial() {
        let (ctx, r) = run_with(&["20000001", "20000002"], &["-d", "20000002", "on"]);
        r.unwrap();
        assert_eq!(led0(&ctx, "20000001"), Rgb::BLACK);
        assert_eq!(led0(&ctx, "20000002"), Rgb::WHITE);
    }

    // ── Color ──

    #[test]
    fn rgb_uses_millis_led_and_brightness() {
        let (ctx, r) = run_with(
            &["20000001"],
            &["-m", "1000", "-l", "2", "-b", "128", "rgb", "#ffffff"],
        );
        r.unwrap();
        assert_eq!(
            ctx.registry.transport().commands(),
            [Report::FadeToRgb {
                color: Rgb::new(127, 127, 127),
                millis: 1000,
                ledn: 2
            }]
        );
    }

    #[test]
    fn malformed_color_fades_to_black() {
        let (ctx, r) = run_with(&["20000001"], &["rgb", "nonsense"]);
        r.unwrap();
        assert_eq!(led0(&ctx, "20000001"), Rgb::BLACK);
    }

    #[test]
    fn hsb_converts() {
        let (ctx, r) = run_with(&["20000001"], &["hsb", "0,255,255"]);
        r.unwrap();
        assert_eq!(led0(&ctx, "20000001"), Rgb::new(255, 0, 0));
    }

    #[test]
    fn blink_counts_cycles() {
        let (ctx, r) = run_with(&["20000001"], &["-m", "0", "-t", "0", "blink", "2", "--rgb", "#00ff00"]);
        r.unwrap();
        assert_eq!(ctx.registry.transport().commands().len(), 4);
        assert_eq!(led0(&ctx, "20000001"), Rgb::BLACK);
    }

    #[test]
    fn random_sends_count_fades() {
        let (ctx, r) = run_with(&["20000001"], &["-m", "0", "-t", "0", "random", "5"]);
        r.unwrap();
        assert_eq!(ctx.registry.transport().commands().len(), 5);
    }

    #[test]
    fn read_rgb_on_mk1_is_unsupported() {
        let (ctx, r) = run_with(&["1A001407"], &["read-rgb"]);
        assert!(r.unwrap_err().to_string().contains("not supported"));
        assert_eq!(ctx.registry.transport().write_count(), 0);
    }

    // ── Patterns ──

    #[test]
    fn write_pattern_by_name() {
        let (ctx, r) = run_with(&["20000001"], &["write-pattern", "red flash"]);
        r.unwrap();
        let s = ctx.registry.transport().state("20000001").unwrap();
        assert_eq!(s.pattern[0].color, Rgb::new(255, 0, 0));
        assert_eq!(s.pattern[0].millis, 500);
        assert_eq!(s.pattern[1].color, Rgb::BLACK);
        assert!(!s.play.playing);
    }

    #[test]
    fn play_pattern_on_host() {
        let (ctx, r) = run_with(
            &["20000001"],
            &["play-pattern", "2,#ff0000,0.01,0,#0000ff,0.01,0"],
        );
        r.unwrap();
        assert_eq!(ctx.registry.transport().commands().len(), 4);
        assert_eq!(led0(&ctx, "20000001"), Rgb::new(0, 0, 255));
    }

    #[test]
    fn play_pattern_without_lines_is_an_error() {
        let (_, r) = run_with(&["20000001"], &["play-pattern", "nope"]);
        assert!(matches!(r, Err(Blink1Error::Pattern(_))));
    }

    #[test]
    fn set_pattern_line_addresses_led() {
        let (ctx, r) = run_with(
            &["20000001"],
            &["-m", "250", "-l", "2", "set-pattern-line", "3", "#00ff00"],
        );
        r.unwrap();
        let s = ctx.registry.transport().state("20000001").unwrap();
        assert_eq!(s.pattern[3].ledn, 2);
        assert_eq!(s.pattern[3].millis, 250);
    }

    #[test]
    fn play_and_stop() {
        let (ctx, r) = run_with(&["20000001"], &["play", "--start", "1", "--end", "4"]);
        r.unwrap();
        let play = ctx.registry.transport().state("20000001").unwrap().play;
        assert!(play.playing);
        assert_eq!((play.start, play.end), (1, 4));

        let (ctx, r) = run_with(&["20000001"], &["stop"]);
        r.unwrap();
        assert!(!ctx.registry.transport().state("20000001").unwrap().play.playing);
    }

    // ── Settings ──

    #[test]
    fn server_tickle_defaults_end_to_15() {
        let (ctx, r) = run_with(&["20000001"], &["-t", "2000", "server-tickle", "on"]);
        r.unwrap();
        let t = ctx
            .registry
            .transport()
            .state("20000001")
            .unwrap()
            .tickle
            .unwrap();
        assert!(t.enabled);
        assert_eq!(t.millis, 2000);
        assert_eq!((t.start, t.end), (0, 15));
    }

    #[test]
    fn set_startup_stores_params() {
        let (ctx, r) = run_with(&["20000001"], &["set-startup", "play", "--end", "3"]);
        r.unwrap();
        let s = ctx.registry.transport().state("20000001").unwrap().startup;
        assert_eq!(s.boot_mode, BootMode::Play);
        assert_eq!(s.play_end, 3);
    }

    #[test]
    fn eewrite_accepts_hex() {
        let (ctx, r) = run_with(&["1A001407"], &["eewrite", "0x10", "0xAB"]);
        r.unwrap();
        assert_eq!(
            ctx.registry.transport().state("1A001407").unwrap().eeprom[0x10],
            0xAB
        );
    }

    #[test]
    fn notes_round_trip() {
        let (ctx, r) = run_with(&["30000001"], &["write-note", "2", "hello"]);
        r.unwrap();
        let notes = ctx.registry.transport().state("30000001").unwrap().notes;
        assert_eq!(notes[&2], b"hello");
    }

    #[test]
    fn note_id_out_of_range() {
        let (_, r) = run_with(&["30000001"], &["write-note", "10", "x"]);
        assert!(matches!(r, Err(Blink1Error::Argument(_))));
    }

    #[test]
    fn get_id_needs_mk3() {
        let (_, r) = run_with(&["30000001"], &["get-id"]);
        r.unwrap();
        let (_, r) = run_with(&["20000001"], &["get-id"]);
        assert!(r.unwrap_err().to_string().contains("not supported"));
    }

    #[test]
    fn config_command_runs_without_devices() {
        let (ctx, r) = run_with(&[], &["config"]);
        r.unwrap();
        assert_eq!(ctx.registry.transport().enumerations.get(), 0);
    }
}
