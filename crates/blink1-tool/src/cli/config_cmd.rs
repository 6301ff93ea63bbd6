//! `config` subcommand: show the effective configuration and its file.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(config: &Config, custom_path: Option<&Path>, json: bool) -> Result<()> {
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    };

    if json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        });
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "fade_millis:",
            "delay_millis:",
            "degamma:",
            "brightness:",
            "vendor_id:",
            "product_id:",
            "host:",
            "port:",
            "idle_close_millis:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent("fade_millis:", config.fade_millis, w);
    kv_indent("delay_millis:", config.delay_millis, w);
    kv_indent("degamma:", config.degamma, w);
    let brightness = if config.brightness == 0 {
        "0 (unscaled)".to_string()
    } else {
        config.brightness.to_string()
    };
    kv_indent("brightness:", brightness, w);
    kv_indent("vendor_id:", format_args!("0x{:04X}", config.vendor_id), w);
    kv_indent("product_id:", format_args!("0x{:04X}", config.product_id), w);
    println!();

    println!("Server:");
    kv_indent("host:", &config.server.host, w);
    kv_indent("port:", config.server.port, w);
    kv_indent("idle_close_millis:", config.server.idle_close_millis, w);

    if !config.patterns.is_empty() {
        println!();
        println!("Patterns:");
        for (name, pattern) in &config.patterns {
            println!("  {name} = {pattern}");
        }
    }

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
