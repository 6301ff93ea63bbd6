//! LED colors, perceptual correction, and the pattern language.

mod color;
mod gamma;
mod ops;
mod pattern;

pub use color::{
    Rgb, format_color, leading_number, named_color, parse_color, parse_hsb, parse_number,
    try_parse_color,
};
pub use gamma::{DEGAMMA, adjust_brightness, degamma, degamma_rgb};
pub use ops::{apply_color, apply_color_all, blink, glimmer, random_colors};
pub use pattern::{
    BUILTIN_PATTERNS, NamedPattern, Pattern, PatternLine, PatternTable, REPEAT_FOREVER,
    builtin_pattern,
};
