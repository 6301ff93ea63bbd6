//! Perceptual correction and brightness scaling.
//!
//! Brightness is applied by the command layer before a color reaches the
//! report codec; degamma is applied by the codec while serializing.

use super::Rgb;

/// `255 * (x / 255) ^ (1 / 0.45)`, rounded.
pub const DEGAMMA: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, //
    2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, //
    6, 6, 6, 7, 7, 7, 8, 8, 8, 9, 9, 9, 10, 10, 11, 11, //
    11, 12, 12, 13, 13, 13, 14, 14, 15, 15, 16, 16, 17, 17, 18, 18, //
    19, 19, 20, 21, 21, 22, 22, 23, 23, 24, 25, 25, 26, 27, 27, 28, //
    29, 29, 30, 31, 31, 32, 33, 34, 34, 35, 36, 37, 37, 38, 39, 40, //
    40, 41, 42, 43, 44, 45, 46, 46, 47, 48, 49, 50, 51, 52, 53, 54, //
    55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69, 70, //
    71, 72, 73, 74, 76, 77, 78, 79, 80, 81, 83, 84, 85, 86, 88, 89, //
    90, 91, 93, 94, 95, 96, 98, 99, 100, 102, 103, 104, 106, 107, 109, 110, //
    111, 113, 114, 116, 117, 119, 120, 121, 123, 124, 126, 128, 129, 131, 132, 134, //
    135, 137, 138, 140, 142, 143, 145, 146, 148, 150, 151, 153, 155, 157, 158, 160, //
    162, 163, 165, 167, 169, 170, 172, 174, 176, 178, 179, 181, 183, 185, 187, 189, //
    191, 193, 194, 196, 198, 200, 202, 204, 206, 208, 210, 212, 214, 216, 218, 220, //
    222, 224, 227, 229, 231, 233, 235, 237, 239, 241, 244, 246, 248, 250, 252, 255, //
];

pub fn degamma(v: u8) -> u8 {
    DEGAMMA[v as usize]
}

pub fn degamma_rgb(c: Rgb) -> Rgb {
    Rgb::new(degamma(c.r), degamma(c.g), degamma(c.b))
}

/// Scale each channel by `brightness / 256`. Zero means "unscaled".
pub fn adjust_brightness(brightness: u8, c: Rgb) -> Rgb {
    if brightness == 0 {
        return c;
    }
    let scale = |v: u8| ((v as u16 * brightness as u16) >> 8) as u8;
    Rgb::new(scale(c.r), scale(c.g), scale(c.b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degamma_endpoints() {
        assert_eq!(degamma(0), 0);
        assert_eq!(degamma(255), 255);
    }

    #[test]
    fn degamma_monotonic() {
        for w in DEGAMMA.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn degamma_midpoint_is_dimmed() {
        assert_eq!(degamma(128), 55);
        assert_eq!(degamma_rgb(Rgb::new(0, 128, 255)), Rgb::new(0, 55, 255));
    }

    #[test]
    fn brightness_zero_passthrough() {
        let c = Rgb::new(12, 200, 255);
        assert_eq!(adjust_brightness(0, c), c);
    }

    #[test]
    fn brightness_half() {
        assert_eq!(
            adjust_brightness(128, Rgb::WHITE),
            Rgb::new(127, 127, 127)
        );
    }

    #[test]
    fn brightness_full_scale_loses_one_step() {
        assert_eq!(adjust_brightness(255, Rgb::WHITE), Rgb::new(254, 254, 254));
    }

    #[test]
    fn brightness_then_degamma_differs_from_reverse() {
        let c = Rgb::new(200, 200, 200);
        let forward = degamma_rgb(adjust_brightness(128, c));
        let reverse = adjust_brightness(128, degamma_rgb(c));
        assert_ne!(forward, reverse);
    }
}
