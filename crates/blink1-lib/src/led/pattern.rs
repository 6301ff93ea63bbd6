//! Color pattern language.
//!
//! A pattern string is `repeats,color,seconds,led,color,seconds,led,...`.
//! Whitespace is ignored. A repeat count of 0 (or none at all) means
//! "forever", held in memory as `-1`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::color::{leading_number, parse_color, parse_number, try_parse_color};
use super::Rgb;
use crate::error::{Blink1Error, Result};
use crate::protocol::MAX_PATTERN_LINES;

/// Repeat count meaning "play until stopped".
pub const REPEAT_FOREVER: i32 = -1;

/// One step of a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatternLine {
    pub color: Rgb,
    pub millis: u16,
    /// 0 = all LEDs.
    pub ledn: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub repeats: i32,
    pub lines: Vec<PatternLine>,
}

fn normalize_repeats(n: i64) -> i32 {
    match n {
        0 => REPEAT_FOREVER,
        n => n.clamp(REPEAT_FOREVER as i64, i32::MAX as i64) as i32,
    }
}

/// Millisecond count from a seconds token, saturating at `u16::MAX`.
fn secs_to_millis(secs: f64) -> u16 {
    (secs * 1000.0).round() as u16
}

/// `atof`-style parse: longest decimal prefix, zero when there is none.
fn leading_float(s: &str) -> f64 {
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse().unwrap_or(0.0)
}

fn tokens(text: &str) -> Vec<String> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    stripped
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Pattern {
    /// Parse leniently. An incomplete trailing triple ends the pattern,
    /// keeping the lines parsed so far; lines past capacity are dropped.
    pub fn parse(text: &str) -> Pattern {
        let toks = tokens(text);
        let mut it = toks.iter();
        let repeats = normalize_repeats(it.next().map(|t| leading_number(t)).unwrap_or(0));

        let mut lines = Vec::new();
        while let Some(color) = it.next() {
            let Some(secs) = it.next() else {
                log::warn!("bad pattern: no millis after '{color}'");
                break;
            };
            let Some(led) = it.next() else {
                log::warn!("bad pattern: no led after '{color},{secs}'");
                break;
            };
            if lines.len() == MAX_PATTERN_LINES {
                log::warn!("pattern longer than {MAX_PATTERN_LINES} lines, truncating");
                break;
            }
            lines.push(PatternLine {
                color: parse_color(color),
                millis: secs_to_millis(leading_float(secs)),
                ledn: leading_number(led) as u8,
            });
        }
        Pattern { repeats, lines }
    }

    /// Parse strictly: every token must be well formed, triples complete,
    /// at least one line, no more than [`MAX_PATTERN_LINES`].
    pub fn try_parse(text: &str) -> Result<Pattern> {
        let toks = tokens(text);
        let Some((first, rest)) = toks.split_first() else {
            return Err(Blink1Error::Pattern("empty pattern".into()));
        };
        let repeats = parse_number(first)
            .ok_or_else(|| Blink1Error::Pattern(format!("invalid repeat count '{first}'")))?;
        if rest.is_empty() {
            return Err(Blink1Error::Pattern("pattern has no lines".into()));
        }
        if rest.len() % 3 != 0 {
            return Err(Blink1Error::Pattern(
                "incomplete color,seconds,led triple".into(),
            ));
        }
        if rest.len() / 3 > MAX_PATTERN_LINES {
            return Err(Blink1Error::Pattern(format!(
                "{} lines exceeds the {MAX_PATTERN_LINES}-line maximum",
                rest.len() / 3
            )));
        }
        let mut lines = Vec::with_capacity(rest.len() / 3);
        for triple in rest.chunks(3) {
            let color = try_parse_color(&triple[0])
                .map_err(|e| Blink1Error::Pattern(e.to_string()))?;
            let secs: f64 = triple[1]
                .parse()
                .ok()
                .filter(|s: &f64| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| Blink1Error::Pattern(format!("invalid seconds '{}'", triple[1])))?;
            let ledn = parse_number(&triple[2])
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| Blink1Error::Pattern(format!("invalid led '{}'", triple[2])))?;
            lines.push(PatternLine {
                color,
                millis: secs_to_millis(secs),
                ledn,
            });
        }
        Ok(Pattern {
            repeats: normalize_repeats(repeats),
            lines,
        })
    }

    pub fn is_forever(&self) -> bool {
        self.repeats < 0
    }

    /// Same lines with a different repeat count (0 = forever).
    pub fn with_repeats(mut self, repeats: i64) -> Pattern {
        self.repeats = normalize_repeats(repeats);
        self
    }

    /// Duration of one pass through the lines.
    pub fn cycle_millis(&self) -> u64 {
        self.lines.iter().map(|l| l.millis as u64).sum()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repeats.max(0))?;
        for l in &self.lines {
            write!(f, ",{},{:.2},{}", l.color, l.millis as f64 / 1000.0, l.ledn)?;
        }
        Ok(())
    }
}

// ── Built-in patterns ──

pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("red flash", "9,#ff0000,0.5,0,#000000,0.5,0"),
    ("green flash", "9,#00ff00,0.5,0,#000000,0.5,0"),
    ("blue flash", "9,#0000ff,0.5,0,#000000,0.5,0"),
    ("white flash", "9,#ffffff,0.5,0,#000000,0.5,0"),
    ("yellow flash", "9,#ffff00,0.5,0,#000000,0.5,0"),
    ("purple flash", "9,#ff00ff,0.5,0,#000000,0.5,0"),
    ("groovy", "3,#ff4cff,1.0,0,#630000,0.2,0,#0000ff,0.1,0"),
    ("off", "1,#000000,0.1,0"),
    (
        "policecar",
        "6,#ff0000,0.3,1,#0000ff,0.3,2,#000000,0.1,0,#ff0000,0.3,2,#0000ff,0.3,1,#000000,0.1,0",
    ),
    (
        "fireengine",
        "6,#ff0000,0.3,1,#ff0000,0.3,2,#000000,0.1,0,#ff0000,0.3,2,#ff0000,0.3,1,#000000,0.1,0",
    ),
    (
        "palette colors",
        "3,#e7009a,1,0,#3d00e7,1,0,#00b8e7,1,0,#00e71e,1,0,#d7e700,1,0,#e70000,1,0,#e7e7e7,1,0",
    ),
    (
        "CMYK",
        "3,#00fff2,0.8,0,#000000,0.3,0,#65003c,0.8,0,#000000,0.3,0,#ffd905,0.8,0,#000000,0.1,0,#000000,0.7,0",
    ),
    (
        "RGB",
        "3,#ff0000,0.8,0,#000000,0.3,0,#00ff00,0.8,0,#000000,0.3,0,#0000ff,0.8,0,#000000,0.3,0",
    ),
    (
        "undervolt",
        "1,#821500,1,0,#634100,1,0,#554f00,1,0,#395800,1,0,#00580b,1,0,#005025,1,0,#005844,1,0,#00465a,1,0",
    ),
    (
        "fire shrine",
        "3,#751100,0,1,#ff1d00,0,2,#ff1000,0.4,1,#680300,0.4,2,#000000,0.9,1,#e01200,0,0,#000000,2,0",
    ),
    (
        "molten lava",
        "3,#ff0000,0.2,1,#ff0000,0.2,2,#bd0000,0.1,1,#bd0000,0.1,2,#690000,0.1,1,#690000,0.1,2,#3f0000,0.2,1,#3f0000,0.2,2",
    ),
    (
        "lighting storm",
        "3,#6f756f,0,1,#ffffff,0,2,#ffffff,0.4,1,#686868,0.4,2,#000000,0.9,1,#e0e0e0,0,0,#000000,2,0",
    ),
    (
        "rain",
        "1,#0a01ff,0.1,1,#04004f,0,1,#1701ff,0.4,2,#04004f,0,2,#0019ff,0.3,1,#04004f,0.3,1,#1b01ff,0.3,2,#04004f,0,2",
    ),
    ("nightfall", "1,#001980,1,0,#000000,10,0"),
    ("dawn", "1,#000000,1,0,#ff6800,15,0"),
    (
        "dancefloor",
        "6,#ff0004,0.1,1,#ff0004,0.1,2,#f2ff00,0.1,1,#f2ff00,0.1,2,#00ff37,0.1,1,#00ff2a,0.1,2,#ff00aa,0.1,1,#ff00b6,0.1,2",
    ),
    (
        "rave",
        "6,#8b8800,0,0,#010b9e,0.1,0,#009b00,0.1,0,#a5008c,0.1,0,#01998e,0.1,0,#9b0007,0.1,0,#0114a5,0.1,0,#8c8d85,0.1,0",
    ),
    (
        "sexy",
        "3,#e7009a,0.4,1,#ff007b,0,2,#ff00dc,0.4,1,#680029,0.4,2,#000000,0.9,1,#e0006c,0,0,#53004d,2,0",
    ),
    (
        "calmdown",
        "3,#00ff33,2,1,#ff00e9,2,2,#ff0004,2,1,#003fff,2,2,#faff00,2,1,#ffffff,2,1",
    ),
    ("emergency", "3,#ff7c01,0,2,#732f00,0.1,0,#ff7e00,0,1,#602700,0.3,1"),
    (
        "lowbattery",
        "3,#7a0000,0.1,0,#000000,0,0,#7e0000,0.1,0,#000000,0.1,0,#000000,3,0",
    ),
    (
        "EKG",
        "5,#0c4f00,0,0,#29ff00,0,0,#0c4f00,0.1,0,#29ff00,0.1,0,#0c4f00,2.1,0",
    ),
    ("patternA", "3,#ff4cff,0.7,0,#630000,0.2,0,#00ff00,0.1,0"),
    ("patternB", "3,#ff4cff,0.7,0,#630000,0.2,0,#0000ff,0.1,0"),
];

/// Look up a built-in pattern string by exact name.
pub fn builtin_pattern(name: &str) -> Option<&'static str> {
    BUILTIN_PATTERNS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
}

// ── Named pattern table ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: String,
}

/// In-memory name → pattern string table, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    entries: Vec<NamedPattern>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with [`BUILTIN_PATTERNS`].
    pub fn with_builtins() -> Self {
        PatternTable {
            entries: BUILTIN_PATTERNS
                .iter()
                .map(|(name, pattern)| NamedPattern {
                    name: name.to_string(),
                    pattern: pattern.to_string(),
                })
                .collect(),
        }
    }

    /// Add or replace a pattern. The string must parse strictly.
    pub fn add(&mut self, name: &str, pattern: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Blink1Error::Pattern("pattern name is empty".into()));
        }
        Pattern::try_parse(pattern)?;
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(e) => e.pattern = pattern.to_string(),
            None => self.entries.push(NamedPattern {
                name: name.to_string(),
                pattern: pattern.to_string(),
            }),
        }
        Ok(())
    }

    /// Remove a pattern; returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn find(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.pattern.as_str())
    }

    pub fn entries(&self) -> &[NamedPattern] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
