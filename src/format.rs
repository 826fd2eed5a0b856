// Output container formats and the whitelist resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of output container formats.
///
/// Everything downstream of the resolver works with this enum, never with
/// raw user text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Mp4,
    Webm,
    Avi,
    Wmv,
    Mov,
}

/// Result of resolving a raw format request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub format: Format,
    /// True when the requested value was missing or unrecognized and the
    /// default was substituted.
    pub redirected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown format '{}'", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Mp4,
        Format::Webm,
        Format::Avi,
        Format::Wmv,
        Format::Mov,
    ];

    pub const DEFAULT: Format = Format::Mp4;

    /// File extension, which is also the container name ffmpeg infers the
    /// muxer from.
    pub fn ext(self) -> &'static str {
        match self {
            Format::Mp4 => "mp4",
            Format::Webm => "webm",
            Format::Avi => "avi",
            Format::Wmv => "wmv",
            Format::Mov => "mov",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Format::Mp4 => "video/mp4",
            Format::Webm => "video/webm",
            Format::Avi => "video/avi",
            Format::Wmv => "video/wmv",
            Format::Mov => "video/mov",
        }
    }

    /// Fixed name the engine produces the artifact under.
    pub fn output_name(self) -> String {
        format!("output.{}", self.ext())
    }

    /// Resolve a raw request against the whitelist, falling back to the
    /// default when the value is missing or unrecognized.
    pub fn resolve(raw: Option<&str>) -> Resolution {
        match raw.map(str::trim) {
            Some(s) if !s.is_empty() => match s.parse::<Format>() {
                Ok(format) => Resolution {
                    format,
                    redirected: false,
                },
                Err(_) => {
                    tracing::warn!(requested = s, fallback = %Format::DEFAULT, "unknown format, using default");
                    Resolution {
                        format: Format::DEFAULT,
                        redirected: true,
                    }
                }
            },
            _ => Resolution {
                format: Format::DEFAULT,
                redirected: true,
            },
        }
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Format::Mp4),
            "webm" => Ok(Format::Webm),
            "avi" => Ok(Format::Avi),
            "wmv" => Ok(Format::Wmv),
            "mov" => Ok(Format::Mov),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}
