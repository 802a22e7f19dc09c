use std::fmt;
use std::str::FromStr;

use crate::styles::{StyleError, StyleResult};

/// An RGB color with channels normalized to `0..=1`.
///
/// Interpolated colors may leave that range when extrapolating. They are clamped only
/// when written out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
}

impl Rgb {
    /// The color at `t` on the line from `self` (`t = 0`) to `other` (`t = 1`).
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Lowercase `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            channel_byte(self.r),
            channel_byte(self.g),
            channel_byte(self.b)
        )
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel_byte(value: f64) -> u8 {
    (value * 255.9999).floor().clamp(0.0, 255.0) as u8
}

impl FromStr for Rgb {
    type Err = StyleError;

    fn from_str(s: &str) -> StyleResult<Self> {
        let invalid = || StyleError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let digits = match hex.len() {
            3 => {
                let short = |i: usize| {
                    u8::from_str_radix(&hex[i..=i], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                [short(0)?, short(1)?, short(2)?]
            }
            6 | 8 => [byte(0)?, byte(2)?, byte(4)?],
            _ => return Err(invalid()),
        };
        Ok(Self {
            r: f64::from(digits[0]) / 255.0,
            g: f64::from(digits[1]) / 255.0,
            b: f64::from(digits[2]) / 255.0,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("#000000", "#000000")]
    #[case("#FFFFFF", "#ffffff")]
    #[case("#3388ff", "#3388ff")]
    #[case("#38f", "#3388ff")]
    #[case("#3388ff80", "#3388ff")]
    #[case(" #ee4433 ", "#ee4433")]
    fn parse_and_print(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(input.parse::<Rgb>().unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("red")]
    #[case("3388ff")]
    #[case("#3388f")]
    #[case("#gg0000")]
    #[case("#3388ffzz")]
    #[case("#ééé")]
    fn reject(#[case] input: &str) {
        assert_eq!(
            input.parse::<Rgb>(),
            Err(StyleError::InvalidColor(input.to_string()))
        );
    }

    #[test]
    fn lerp_truncates_channels() {
        let black: Rgb = "#000000".parse().unwrap();
        let white: Rgb = "#ffffff".parse().unwrap();
        assert_eq!(black.lerp(white, 0.5).to_hex(), "#7f7f7f");
        assert_eq!(black.lerp(white, 1.0).to_hex(), "#ffffff");
        assert_eq!(black.lerp(white, 2.0).to_hex(), "#ffffff");
        assert_eq!(black.lerp(white, -1.0).to_hex(), "#000000");
    }
}
