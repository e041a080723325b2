use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelInfo;

/// When a whole API namespace became available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityInfo {
    /// Oldest revision at which the API is available.
    pub channel_info: ChannelInfo,
    /// Future stable milestone, set only while the API is not yet stable and
    /// a stable listing is already committed.
    #[serde(default)]
    pub scheduled: Option<u32>,
}

impl AvailabilityInfo {
    /// Availability without a scheduled promotion.
    #[must_use]
    pub const fn new(channel_info: ChannelInfo) -> Self {
        Self {
            channel_info,
            scheduled: None,
        }
    }

    /// Availability with an optional scheduled stable milestone.
    #[must_use]
    pub const fn with_scheduled(channel_info: ChannelInfo, scheduled: Option<u32>) -> Self {
        Self {
            channel_info,
            scheduled,
        }
    }
}

/// Outcome of resolving a path in a schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    /// Whether the full path resolved to a node.
    pub available: bool,
    /// First-seen revision of the node. Never set when `available` is false.
    #[serde(default)]
    pub channel_info: Option<ChannelInfo>,
}

impl LookupResult {
    /// A path that resolved to a node.
    #[must_use]
    pub const fn resolved(channel_info: Option<ChannelInfo>) -> Self {
        Self {
            available: true,
            channel_info,
        }
    }

    /// A path that did not resolve.
    #[must_use]
    pub const fn unresolved() -> Self {
        Self {
            available: false,
            channel_info: None,
        }
    }
}

/// Product surface an API can be exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Packaged apps.
    Apps,
    /// Browser extensions.
    Extensions,
}

impl Platform {
    /// Both platforms.
    pub const ALL: [Self; 2] = [Self::Apps, Self::Extensions];

    /// Lowercase platform name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Extensions => "extensions",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct ParsePlatformError(pub String);

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == value)
            .ok_or_else(|| ParsePlatformError(value.to_owned()))
    }
}
