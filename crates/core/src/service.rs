//! The closed set of image-processing services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An external image-processing capability.
///
/// Each variant maps to exactly one execution environment and directory root
/// through [`crate::config::ServicesConfig::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceKind {
    /// Face restoration.
    Gfpgan,
    /// Background removal.
    Rembg,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::Gfpgan, ServiceKind::Rembg];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Gfpgan => "GFPGAN",
            ServiceKind::Rembg => "REMBG",
        }
    }

    /// Rough per-job processing time, used for queue wait estimates.
    pub fn estimated_secs(&self) -> u64 {
        match self {
            ServiceKind::Gfpgan => 18,
            ServiceKind::Rembg => 10,
        }
    }

    /// Whether the worker takes a `--bg_color` argument.
    pub fn accepts_background_color(&self) -> bool {
        matches!(self, ServiceKind::Rembg)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service: {0}")]
pub struct UnknownService(pub String);

impl FromStr for ServiceKind {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GFPGAN" => Ok(ServiceKind::Gfpgan),
            "REMBG" => Ok(ServiceKind::Rembg),
            _ => Err(UnknownService(s.to_string())),
        }
    }
}
