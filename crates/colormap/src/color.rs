//! Colours and continuous colour ramps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A colour string that is not `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid colour '{0}': expected #rgb or #rrggbb")]
pub struct ColorParseError(pub String);

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or the short `#rgb` form; the `#` is optional.
    pub fn from_hex(s: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Self::new(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(err()),
        }
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Brown -> Yellow -> Green
pub const NDVI_RAMP: &[ColorStop] = &[
    ColorStop::new(0.0, 120, 70, 20),
    ColorStop::new(0.3, 200, 170, 60),
    ColorStop::new(0.5, 240, 230, 100),
    ColorStop::new(0.7, 100, 180, 50),
    ColorStop::new(1.0, 10, 100, 20),
];

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

/// Evaluate a ramp at normalized position `t`; positions outside the stops
/// take the end colors. An empty ramp is black.
pub fn evaluate(stops: &[ColorStop], t: f64) -> Rgb {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Rgb::BLACK;
    };
    if t <= first.t {
        return first.color;
    }
    stops
        .windows(2)
        .find(|w| t <= w[1].t)
        .map(|w| lerp_color(w[0].color, w[1].color, (t - w[0].t) / (w[1].t - w[0].t)))
        .unwrap_or(last.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_long_and_short() {
        assert_eq!(Rgb::from_hex("#d3d3d3").unwrap(), Rgb::new(211, 211, 211));
        assert_eq!(Rgb::from_hex("#2F2F2F").unwrap(), Rgb::new(47, 47, 47));
        assert_eq!(Rgb::from_hex("ff0000").unwrap(), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hex("#f00").unwrap(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_hex_rejects_garbage() {
        for bad in ["", "#", "#12345", "#gggggg", "#ffé", "#1234567", "#+f+f+f"] {
            assert!(Rgb::from_hex(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_hex_formats_lowercase() {
        let c: Rgb = "#2F2F2F".parse().unwrap();
        assert_eq!(c.to_hex(), "#2f2f2f");
        assert_eq!(c.to_string(), "#2f2f2f");
    }

    #[test]
    fn test_serde_as_hex_string() {
        let c: Rgb = serde_json::from_str(r##""#ff0000""##).unwrap();
        assert_eq!(c, Rgb::new(255, 0, 0));
        assert_eq!(serde_json::to_string(&Rgb::new(211, 211, 211)).unwrap(), r##""#d3d3d3""##);
        assert!(serde_json::from_str::<Rgb>(r#""red""#).is_err());
    }

    #[test]
    fn test_ndvi_ramp_endpoints_and_clamping() {
        assert_eq!(evaluate(NDVI_RAMP, 0.0), Rgb::new(120, 70, 20));
        assert_eq!(evaluate(NDVI_RAMP, 1.0), Rgb::new(10, 100, 20));
        assert_eq!(evaluate(NDVI_RAMP, -3.0), Rgb::new(120, 70, 20));
        assert_eq!(evaluate(NDVI_RAMP, 7.0), Rgb::new(10, 100, 20));
        assert_eq!(evaluate(NDVI_RAMP, 0.5), Rgb::new(240, 230, 100));
    }

    #[test]
    fn test_empty_ramp_is_black() {
        assert_eq!(evaluate(&[], 0.5), Rgb::BLACK);
    }
}
