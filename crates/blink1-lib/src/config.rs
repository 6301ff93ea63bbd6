//! Tool configuration: TOML file in the platform config directory.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::led::{Pattern, PatternTable};
use crate::protocol::{BLINK1_PID, BLINK1_VID, MAX_FADE_MILLIS};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# blink1 configuration. Command-line flags override these values.\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default fade time for color commands. Default: 300.
    #[serde(default = "default_fade_millis")]
    pub fade_millis: u32,

    /// Pause between steps of blink/random effects. Default: 500.
    #[serde(default = "default_delay_millis")]
    pub delay_millis: u32,

    /// Apply perceptual correction to outgoing colors.
    #[serde(default = "default_true")]
    pub degamma: bool,

    /// Brightness scale, 1-255. 0 = unscaled.
    #[serde(default)]
    pub brightness: u8,

    /// USB vendor id to match. Default: 0x27B8.
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    /// USB product id to match. 0 = any product of the vendor.
    #[serde(default = "default_product_id")]
    pub product_id: u16,

    #[serde(default)]
    pub server: ServerConfig,

    /// User patterns, name → pattern string. Added to the server's table.
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Close device handles idle this long between requests.
    #[serde(default = "default_idle_close_millis")]
    pub idle_close_millis: u64,
}

fn default_fade_millis() -> u32 {
    300
}
fn default_delay_millis() -> u32 {
    500
}
fn default_true() -> bool {
    true
}
fn default_vendor_id() -> u16 {
    BLINK1_VID
}
fn default_product_id() -> u16 {
    BLINK1_PID
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_idle_close_millis() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fade_millis: default_fade_millis(),
            delay_millis: default_delay_millis(),
            degamma: true,
            brightness: 0,
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            server: ServerConfig::default(),
            patterns: BTreeMap::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            idle_close_millis: default_idle_close_millis(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A fade or delay is longer than one fade command can express.
    DurationTooLong { field: &'static str, millis: u32 },
    /// The vendor id is zero.
    ZeroVendorId,
    /// The server port is zero.
    ZeroPort,
    /// The server host is empty or whitespace-only.
    EmptyHost,
    /// A `[patterns]` entry is invalid.
    InvalidPattern { name: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DurationTooLong { field, millis } => write!(
                f,
                "Invalid {field}: {millis} ms exceeds the {MAX_FADE_MILLIS} ms limit"
            ),
            ValidationError::ZeroVendorId => write!(f, "vendor_id cannot be 0"),
            ValidationError::ZeroPort => write!(f, "server.port cannot be 0"),
            ValidationError::EmptyHost => write!(f, "server.host cannot be empty"),
            ValidationError::InvalidPattern { name, reason } => {
                write!(f, "Invalid patterns[{name}]: {reason}")
            }
        }
    }
}

impl Config {
    /// `<config dir>/blink1`.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("blink1"))
    }

    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Write to `path` through a sibling `.tmp` file and a rename, so a
    /// reader never sees a half-written file. [`CONFIG_HEADER`] goes first.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let body = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let text = format!("{CONFIG_HEADER}{body}");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = path.with_extension("toml.tmp");
        fs::write(&staging, &text)?;
        if fs::rename(&staging, path).is_ok() {
            return Ok(());
        }
        // rename across filesystems
        let written = fs::write(path, &text);
        fs::remove_file(&staging).ok();
        written
    }

    /// Read `path`. A missing file gives defaults silently; an unparsable
    /// one gives defaults plus a warning for the caller to log.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        let Ok(text) = fs::read_to_string(path) else {
            return (Self::default(), Vec::new());
        };
        toml::from_str::<Self>(&text).map_or_else(
            |e| {
                let msg = format!("{}: unreadable config, using defaults: {e}", path.display());
                (Self::default(), vec![msg])
            },
            |config| (config, Vec::new()),
        )
    }

    /// [`Config::load_from`] on the platform path.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => (Self::default(), Vec::new()),
        }
    }

    /// Config for a front end: `custom_path` if given, else the platform
    /// path. Parse warnings and validation problems are logged, not
    /// returned; the config is used as loaded.
    pub fn load_checked(custom_path: Option<&Path>) -> Self {
        let (config, warnings) = match custom_path {
            Some(p) => Self::load_from(p),
            None => Self::load_with_warnings(),
        };
        for w in &warnings {
            log::warn!("{w}");
        }
        if let Err(errors) = config.validate() {
            for e in &errors {
                log::warn!("config: {e}");
            }
        }
        config
    }

    /// Validate all fields.
    ///
    /// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, millis) in [
            ("fade_millis", self.fade_millis),
            ("delay_millis", self.delay_millis),
        ] {
            if millis > MAX_FADE_MILLIS {
                errors.push(ValidationError::DurationTooLong { field, millis });
            }
        }

        if self.vendor_id == 0 {
            errors.push(ValidationError::ZeroVendorId);
        }
        if self.server.port == 0 {
            errors.push(ValidationError::ZeroPort);
        }
        if self.server.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
        }

        for (name, pattern) in &self.patterns {
            if let Err(e) = Pattern::try_parse(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    name: name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Built-in patterns plus the valid entries of `[patterns]`.
    /// Invalid entries are skipped with a warning.
    pub fn pattern_table(&self) -> PatternTable {
        let mut table = PatternTable::with_builtins();
        for (name, pattern) in &self.patterns {
            if let Err(e) = table.add(name, pattern) {
                log::warn!("skipping pattern '{name}': {e}");
            }
        }
        table
    }
}
