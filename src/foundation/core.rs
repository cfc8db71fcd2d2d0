use std::fmt;

use crate::foundation::error::{FramelabError, FramelabResult};

/// Whether a source or transformation deals in still images or frame streams.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> FramelabResult<Self> {
        if den == 0 {
            return Err(FramelabError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(FramelabError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Exact rational form accepted by ffmpeg's `-r`/`-framerate` options.
    pub fn ffmpeg_rate(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}
