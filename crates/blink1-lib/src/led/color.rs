//! Color parsing and formatting.
//!
//! Text colors come in two shapes: packed hex (`#RRGGBB` or bare `RRGGBB`)
//! and numeric triples (`255,0,255`, `0xff,0x00,0xff`, `255 0 255`). A
//! comma always selects the triple form.

use std::fmt;

use serde::Serialize;

use crate::error::{Blink1Error, Result};

/// One RGB color triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Rgb::BLACK
    }

    /// Random color; each channel in `0..255`.
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        Rgb::new(
            rng.random_range(0..255),
            rng.random_range(0..255),
            rng.random_range(0..255),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Format a color as `#rrggbb`.
pub fn format_color(c: Rgb) -> String {
    c.to_string()
}

fn is_packed_hex(s: &str) -> bool {
    !s.contains(',') && (s.starts_with('#') || s.len() == 6)
}

fn parse_packed_hex(s: &str) -> Option<Rgb> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let val = u32::from_str_radix(hex, 16).ok()?;
    Some(Rgb::new((val >> 16) as u8, (val >> 8) as u8, val as u8))
}

fn triple_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split([',', ' ']).filter(|t| !t.is_empty())
}

/// Parse a color leniently.
///
/// Malformed hex yields black. In the triple form each missing or
/// unparseable channel is zero and values wrap to a byte.
pub fn parse_color(s: &str) -> Rgb {
    let s = s.trim();
    if is_packed_hex(s) {
        return parse_packed_hex(s).unwrap_or_else(|| {
            log::warn!("malformed color '{s}', using black");
            Rgb::BLACK
        });
    }
    let mut ch = [0u8; 3];
    for (slot, tok) in ch.iter_mut().zip(triple_tokens(s)) {
        *slot = leading_number(tok) as u8;
    }
    Rgb::new(ch[0], ch[1], ch[2])
}

/// Parse a color, rejecting anything [`parse_color`] would zero-fill.
pub fn try_parse_color(s: &str) -> Result<Rgb> {
    let s = s.trim();
    if is_packed_hex(s) {
        return parse_packed_hex(s)
            .ok_or_else(|| Blink1Error::Color(format!("invalid hex color: {s}")));
    }
    let toks: Vec<&str> = triple_tokens(s).collect();
    if toks.len() != 3 {
        return Err(Blink1Error::Color(format!(
            "expected #RRGGBB or three numbers, got '{s}'"
        )));
    }
    let mut ch = [0u8; 3];
    for (slot, tok) in ch.iter_mut().zip(&toks) {
        *slot = parse_number(tok)
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| Blink1Error::Color(format!("invalid channel value '{tok}'")))?;
    }
    Ok(Rgb::new(ch[0], ch[1], ch[2]))
}

/// Named colors understood by the command verbs and server routes.
pub fn named_color(name: &str) -> Option<Rgb> {
    let c = match name.trim().to_ascii_lowercase().as_str() {
        "on" | "white" => Rgb::WHITE,
        "off" | "black" => Rgb::BLACK,
        "red" => Rgb::new(255, 0, 0),
        "green" => Rgb::new(0, 255, 0),
        "blue" => Rgb::new(0, 0, 255),
        "cyan" => Rgb::new(0, 255, 255),
        "magenta" => Rgb::new(255, 0, 255),
        "yellow" => Rgb::new(255, 255, 0),
        "orange" => Rgb::new(255, 128, 0),
        "purple" => Rgb::new(128, 0, 255),
        _ => return None,
    };
    Some(c)
}

/// Integer-only hue/saturation/brightness to RGB, six-region hue wheel.
pub fn parse_hsb(hsb: [u8; 3]) -> Rgb {
    let [h, s, v] = hsb;
    if s == 0 {
        return Rgb::new(v, v, v);
    }
    let (s, v) = (s as u32, v as u32);
    let region = h / 43;
    let fpart = (h as u32 - region as u32 * 43) * 6;

    let p = ((v * (255 - s)) >> 8) as u8;
    let q = ((v * (255 - ((s * fpart) >> 8))) >> 8) as u8;
    let t = ((v * (255 - ((s * (255 - fpart)) >> 8))) >> 8) as u8;
    let v = v as u8;

    match region {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

/// Parse a whole token as a decimal or `0x`-prefixed integer.
pub fn parse_number(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let n = match body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i64>().ok()?,
    };
    Some(if neg { -n } else { n })
}

/// Parse the longest numeric prefix of a token; zero when there is none.
pub fn leading_number(s: &str) -> i64 {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = match body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, body),
    };
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let n = i64::from_str_radix(&digits[..end], radix).unwrap_or(0);
    if neg { -n } else { n }
}
