//! Background color argument for background removal.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("expected \"transparent\" or \"r,g,b,a\", got \"{0}\"")]
    InvalidFormat(String),

    #[error("{component} component out of range: {value}")]
    OutOfRange {
        component: &'static str,
        value: String,
    },
}

/// A validated `--bg_color` value.
///
/// Accepts `transparent` or four comma-separated components: red, green and
/// blue as integers in 0..=255, and alpha as a fraction in 0..=1 that is
/// rescaled (rounded) to 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundColor {
    #[default]
    Transparent,
    Rgba {
        r: u8,
        g: u8,
        b: u8,
        a: u8,
    },
}

impl BackgroundColor {
    /// Parses an optional client value, defaulting to transparent.
    pub fn parse_optional(value: Option<&str>) -> Result<Self, ColorError> {
        match value {
            Some(v) => v.parse(),
            None => Ok(BackgroundColor::Transparent),
        }
    }
}

impl FromStr for BackgroundColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized == "transparent" {
            return Ok(BackgroundColor::Transparent);
        }

        let parts: Vec<&str> = normalized.split(',').map(str::trim).collect();
        let [r, g, b, a] = parts.as_slice() else {
            return Err(ColorError::InvalidFormat(s.to_string()));
        };

        Ok(BackgroundColor::Rgba {
            r: channel("red", r)?,
            g: channel("green", g)?,
            b: channel("blue", b)?,
            a: alpha(a)?,
        })
    }
}

fn channel(component: &'static str, value: &str) -> Result<u8, ColorError> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| ColorError::InvalidFormat(value.to_string()))?;
    u8::try_from(parsed).map_err(|_| ColorError::OutOfRange {
        component,
        value: value.to_string(),
    })
}

fn alpha(value: &str) -> Result<u8, ColorError> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| ColorError::InvalidFormat(value.to_string()))?;
    if !parsed.is_finite() || !(0.0..=1.0).contains(&parsed) {
        return Err(ColorError::OutOfRange {
            component: "alpha",
            value: value.to_string(),
        });
    }
    Ok((parsed * 255.0).round() as u8)
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundColor::Transparent => f.write_str("transparent"),
            BackgroundColor::Rgba { r, g, b, a } => write!(f, "{r},{g},{b},{a}"),
        }
    }
}
