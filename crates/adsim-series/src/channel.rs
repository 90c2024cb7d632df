//! Media channels
//!
//! The fixed set of advertising channels a run can simulate. Each channel's
//! lowercase name doubles as its column name in persisted datasets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SeriesError;

/// Advertising channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Television
    Tv,
    /// Radio
    Radio,
    /// Display and social online advertising
    Online,
    /// Print media
    Print,
    /// Paid search
    Search,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Self; 5] = [Self::Tv, Self::Radio, Self::Online, Self::Print, Self::Search];

    /// Stable lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tv => "tv",
            Self::Radio => "radio",
            Self::Online => "online",
            Self::Print => "print",
            Self::Search => "search",
        }
    }

    /// Short human readable description.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Tv => "Television spots, long carryover",
            Self::Radio => "Radio spots, short carryover",
            Self::Online => "Display and social impressions",
            Self::Print => "Newspaper and magazine placements",
            Self::Search => "Paid search clicks, near-immediate effect",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == needle)
            .ok_or_else(|| SeriesError::Config(format!("Unknown channel: {s}")))
    }
}
