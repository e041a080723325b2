//! Channel catalog: the two tables the mapper is built from.
//!
//! A catalog can be written by hand (JSON or TOML) or assembled from the
//! release tracker's live and history feeds.

use std::collections::{BTreeMap, HashMap};
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Channel, Error, Result};

/// Desktop platforms whose release reports are trusted.
const DESKTOP_OSES: [&str; 4] = ["win", "linux", "mac", "cros"];

/// Head of a numbered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHead {
    /// Release branch the channel currently ships from.
    pub branch: u32,
    /// Milestone the channel currently ships.
    pub milestone: u32,
}

impl ChannelHead {
    /// Construct a channel head.
    #[must_use]
    pub const fn new(branch: u32, milestone: u32) -> Self {
        Self { branch, milestone }
    }
}

/// Current heads of the numbered channels. Missing beta or dev heads fall
/// back to the next more stable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelHeads {
    /// Stable head.
    pub stable: ChannelHead,
    /// Beta head.
    #[serde(default)]
    pub beta: Option<ChannelHead>,
    /// Dev head.
    #[serde(default)]
    pub dev: Option<ChannelHead>,
}

/// Historical milestone → branch table plus live channel heads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog", into = "RawCatalog")]
pub struct ChannelCatalog {
    /// Branch each past stable milestone shipped from.
    pub history: BTreeMap<u32, u32>,
    /// Live channel heads.
    pub channels: ChannelHeads,
}

// TOML tables only have string keys, so milestones travel as text.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    history: BTreeMap<String, u32>,
    channels: ChannelHeads,
}

impl TryFrom<RawCatalog> for ChannelCatalog {
    type Error = String;

    fn try_from(raw: RawCatalog) -> std::result::Result<Self, Self::Error> {
        let history = raw
            .history
            .into_iter()
            .map(|(milestone, branch)| {
                milestone
                    .parse::<u32>()
                    .map(|milestone| (milestone, branch))
                    .map_err(|_| format!("history key {milestone:?} is not a milestone number"))
            })
            .collect::<std::result::Result<_, _>>()?;
        Ok(Self {
            history,
            channels: raw.channels,
        })
    }
}

impl From<ChannelCatalog> for RawCatalog {
    fn from(catalog: ChannelCatalog) -> Self {
        Self {
            history: catalog
                .history
                .into_iter()
                .map(|(milestone, branch)| (milestone.to_string(), branch))
                .collect(),
            channels: catalog.channels,
        }
    }
}

impl ChannelCatalog {
    /// Build a catalog from explicit tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the tables are inconsistent.
    pub fn new(history: BTreeMap<u32, u32>, channels: ChannelHeads) -> Result<Self> {
        let catalog = Self { history, channels };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a JSON catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] for unparsable or inconsistent documents.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let catalog: Self =
            serde_json::from_str(text).map_err(|err| Error::Catalog(err.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a TOML catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] for unparsable or inconsistent documents.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(text).map_err(|err| Error::Catalog(err.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file; `.toml` files are read as TOML, anything else as
    /// JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the parse
    /// errors of [`ChannelCatalog::from_json_str`] / [`ChannelCatalog::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_string(),
            source,
        })?;
        if path.extension() == Some("toml") {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    /// Assemble a catalog from the release tracker feeds.
    ///
    /// `live` lists, per operating system, the versions each channel ships
    /// (`"M.0.BRANCH.PATCH"`); for every channel the most widely reported
    /// version wins, ties going to the lower one. `history` lists release
    /// events titled `"<Channel> - M.0.BRANCH.PATCH"`; the first event seen for
    /// a milestone wins and events past the stable head are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if either feed is unparsable or no stable
    /// head can be derived.
    pub fn from_release_feeds(live: &str, history: &str) -> Result<Self> {
        let live: Vec<LiveEntry> = serde_json::from_str(live)
            .map_err(|err| Error::Catalog(format!("live feed: {err}")))?;
        let history: HistoryFeed = serde_json::from_str(history)
            .map_err(|err| Error::Catalog(format!("history feed: {err}")))?;

        let mut tallies: HashMap<Channel, HashMap<(u32, u32), usize>> = HashMap::new();
        for entry in live
            .iter()
            .filter(|entry| DESKTOP_OSES.contains(&entry.os.as_str()))
        {
            for version in &entry.versions {
                let Ok(channel) = version.channel.parse::<Channel>() else {
                    continue;
                };
                let Some(parsed) = parse_version(&version.version) else {
                    debug!("ignoring unparsable version {:?}", version.version);
                    continue;
                };
                *tallies
                    .entry(channel)
                    .or_default()
                    .entry(parsed)
                    .or_default() += 1;
            }
        }

        let head = |channel: Channel| {
            tallies.get(&channel).and_then(|counts| {
                counts
                    .iter()
                    .max_by(|(left, left_count), (right, right_count)| {
                        left_count.cmp(right_count).then(right.cmp(left))
                    })
                    .map(|(&(milestone, branch), _)| ChannelHead::new(branch, milestone))
            })
        };

        let stable = head(Channel::Stable)
            .ok_or_else(|| Error::Catalog("live feed reports no stable version".into()))?;
        let channels = ChannelHeads {
            stable,
            beta: head(Channel::Beta),
            dev: head(Channel::Dev),
        };

        let mut milestones = BTreeMap::new();
        for event in &history.events {
            let parsed = event
                .title
                .split_once(" - ")
                .and_then(|(_, version)| parse_version(version));
            match parsed {
                Some((milestone, branch)) if milestone <= stable.milestone => {
                    milestones.entry(milestone).or_insert(branch);
                }
                Some((milestone, _)) => {
                    debug!("ignoring pre-release history event for milestone {}", milestone);
                }
                None => debug!("ignoring history event {:?}", event.title),
            }
        }

        Self::new(milestones, channels)
    }

    /// Check that heads move forward from stable to dev and that history
    /// does not claim milestones past the stable head.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] describing the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        let stable = self.channels.stable;
        let beta = self.channels.beta.unwrap_or(stable);
        let dev = self.channels.dev.unwrap_or(beta);
        if beta.milestone < stable.milestone || dev.milestone < beta.milestone {
            return Err(Error::Catalog(format!(
                "channel heads out of order: stable {}, beta {}, dev {}",
                stable.milestone, beta.milestone, dev.milestone
            )));
        }
        if let Some((&latest, _)) = self.history.last_key_value() {
            if latest > stable.milestone {
                return Err(Error::Catalog(format!(
                    "history records milestone {latest} beyond stable head {}",
                    stable.milestone
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LiveEntry {
    os: String,
    #[serde(default)]
    versions: Vec<LiveVersion>,
}

#[derive(Deserialize)]
struct LiveVersion {
    channel: String,
    version: String,
}

#[derive(Deserialize)]
struct HistoryFeed {
    #[serde(default)]
    events: Vec<HistoryEvent>,
}

#[derive(Deserialize)]
struct HistoryEvent {
    title: String,
}

/// `"28.0.1500.20"` → `(28, 1500)`.
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let milestone = parts.next()?.parse().ok()?;
    let branch = parts.nth(1)?.parse().ok()?;
    Some((milestone, branch))
}
