use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A release track. Ordering runs from the most released (`Stable`) to the
/// least released (`Trunk`), so `Channel::Stable < Channel::Trunk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Fully released builds.
    Stable,
    /// Release candidates.
    Beta,
    /// Developer preview builds.
    Dev,
    /// Unreleased tip of development.
    Trunk,
}

impl Channel {
    /// Every channel, most stable first.
    pub const ALL: [Self; 4] = [Self::Stable, Self::Beta, Self::Dev, Self::Trunk];

    /// Lowercase channel name as it appears in feature and catalog files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Dev => "dev",
            Self::Trunk => "trunk",
        }
    }

    /// The least stable channel in `channels`, if any.
    pub fn newest(channels: impl IntoIterator<Item = Self>) -> Option<Self> {
        channels.into_iter().max()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a channel name is not one of the four known tracks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel name: {0}")]
pub struct ParseChannelError(pub String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == value)
            .ok_or_else(|| ParseChannelError(value.to_owned()))
    }
}

const TRUNK: &str = "trunk";

/// Branch identifier: a numeric release branch or the trunk sentinel, which
/// sorts after every numbered branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    /// Numbered release branch.
    Number(u32),
    /// The trunk sentinel.
    Trunk,
}

impl Branch {
    /// Numeric id, or `None` for trunk.
    #[must_use]
    pub const fn number(self) -> Option<u32> {
        match self {
            Self::Number(number) => Some(number),
            Self::Trunk => None,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Trunk => f.write_str(TRUNK),
        }
    }
}

/// Milestone: a numbered stable release, or the trunk sentinel which sorts
/// after every numbered milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Milestone {
    /// Numbered release.
    Release(u32),
    /// The trunk sentinel.
    Trunk,
}

impl Milestone {
    /// Numeric milestone, or `None` for trunk.
    #[must_use]
    pub const fn number(self) -> Option<u32> {
        match self {
            Self::Release(number) => Some(number),
            Self::Trunk => None,
        }
    }

    /// Whether this milestone is at least `floor`. Trunk always is.
    #[must_use]
    pub const fn at_least(self, floor: u32) -> bool {
        match self {
            Self::Release(number) => number >= floor,
            Self::Trunk => true,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release(number) => write!(f, "{number}"),
            Self::Trunk => f.write_str(TRUNK),
        }
    }
}

/// Wire form shared by [`Branch`] and [`Milestone`]: a number or `"trunk"`.
/// Numeric strings are accepted since release feeds report branches as text.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NumberOrTrunk {
    Number(u32),
    Text(String),
}

impl NumberOrTrunk {
    fn into_option<E: serde::de::Error>(self) -> Result<Option<u32>, E> {
        match self {
            Self::Number(number) => Ok(Some(number)),
            Self::Text(text) if text == TRUNK => Ok(None),
            Self::Text(text) => text
                .parse()
                .map(Some)
                .map_err(|_| E::custom(format!("expected a number or \"trunk\", got {text:?}"))),
        }
    }

    fn from_option(value: Option<u32>) -> Self {
        value.map_or_else(|| Self::Text(TRUNK.to_owned()), Self::Number)
    }
}

impl Serialize for Branch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NumberOrTrunk::from_option(self.number()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Branch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = NumberOrTrunk::deserialize(deserializer)?;
        Ok(raw.into_option()?.map_or(Self::Trunk, Self::Number))
    }
}

impl Serialize for Milestone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NumberOrTrunk::from_option(self.number()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Milestone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = NumberOrTrunk::deserialize(deserializer)?;
        Ok(raw.into_option()?.map_or(Self::Trunk, Self::Release))
    }
}

/// Error raised when a channel/branch/milestone triple mixes trunk and
/// numbered values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("inconsistent channel info: channel {channel}, branch {branch}, milestone {milestone}")]
pub struct InvalidChannelInfo {
    /// Channel of the rejected triple.
    pub channel: Channel,
    /// Branch of the rejected triple.
    pub branch: Branch,
    /// Milestone of the rejected triple.
    pub milestone: Milestone,
}

/// A single revision of the source tree, identified on both version axes.
///
/// `channel` is trunk exactly when `branch` and `milestone` are trunk; the
/// constructors and the deserializer reject anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawChannelInfo", into = "RawChannelInfo")]
pub struct ChannelInfo {
    channel: Channel,
    branch: Branch,
    milestone: Milestone,
}

impl ChannelInfo {
    /// The trunk revision.
    #[must_use]
    pub const fn trunk() -> Self {
        Self {
            channel: Channel::Trunk,
            branch: Branch::Trunk,
            milestone: Milestone::Trunk,
        }
    }

    /// Build a triple, validating the trunk invariant.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidChannelInfo`] when trunk and numbered values are mixed.
    pub fn new(
        channel: Channel,
        branch: Branch,
        milestone: Milestone,
    ) -> Result<Self, InvalidChannelInfo> {
        let trunk_parts = [
            channel == Channel::Trunk,
            branch == Branch::Trunk,
            milestone == Milestone::Trunk,
        ];
        if trunk_parts.iter().all(|part| *part) || trunk_parts.iter().all(|part| !*part) {
            Ok(Self {
                channel,
                branch,
                milestone,
            })
        } else {
            Err(InvalidChannelInfo {
                channel,
                branch,
                milestone,
            })
        }
    }

    /// Build a numbered (non-trunk) revision.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidChannelInfo`] if `channel` is trunk.
    pub fn release(
        channel: Channel,
        branch: u32,
        milestone: u32,
    ) -> Result<Self, InvalidChannelInfo> {
        Self::new(channel, Branch::Number(branch), Milestone::Release(milestone))
    }

    /// The release track.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// The branch identifier.
    #[must_use]
    pub const fn branch(&self) -> Branch {
        self.branch
    }

    /// The milestone.
    #[must_use]
    pub const fn milestone(&self) -> Milestone {
        self.milestone
    }

    /// Whether this is the trunk revision.
    #[must_use]
    pub fn is_trunk(&self) -> bool {
        self.channel == Channel::Trunk
    }
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_trunk() {
            f.write_str(TRUNK)
        } else {
            write!(
                f,
                "{} (milestone {}, branch {})",
                self.channel, self.milestone, self.branch
            )
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawChannelInfo {
    channel: Channel,
    branch: Branch,
    milestone: Milestone,
}

impl TryFrom<RawChannelInfo> for ChannelInfo {
    type Error = InvalidChannelInfo;

    fn try_from(raw: RawChannelInfo) -> Result<Self, Self::Error> {
        Self::new(raw.channel, raw.branch, raw.milestone)
    }
}

impl From<ChannelInfo> for RawChannelInfo {
    fn from(info: ChannelInfo) -> Self {
        Self {
            channel: info.channel,
            branch: info.branch,
            milestone: info.milestone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_order_from_stable_to_trunk() {
        assert!(Channel::Stable < Channel::Beta);
        assert!(Channel::Beta < Channel::Dev);
        assert!(Channel::Dev < Channel::Trunk);
        assert_eq!(
            Channel::newest([Channel::Beta, Channel::Stable, Channel::Dev]),
            Some(Channel::Dev)
        );
        assert_eq!(Channel::newest([]), None);
    }

    #[test]
    fn channel_parses_lowercase_names() {
        assert_eq!("beta".parse::<Channel>(), Ok(Channel::Beta));
        assert_eq!(
            "canary".parse::<Channel>(),
            Err(ParseChannelError("canary".into()))
        );
    }

    #[test]
    fn trunk_milestone_sorts_last() {
        assert!(Milestone::Release(99) < Milestone::Trunk);
        assert!(Milestone::Release(27) < Milestone::Release(28));
        assert!(Milestone::Trunk.at_least(1_000));
        assert!(!Milestone::Release(19).at_least(20));
    }

    #[test]
    fn mixed_trunk_triples_are_rejected() {
        assert!(ChannelInfo::release(Channel::Trunk, 1500, 28).is_err());
        assert!(ChannelInfo::new(Channel::Dev, Branch::Trunk, Milestone::Release(28)).is_err());
        assert!(ChannelInfo::new(Channel::Trunk, Branch::Trunk, Milestone::Trunk).is_ok());
    }

    #[test]
    fn channel_info_wire_format_uses_trunk_sentinel() {
        let json = serde_json::to_string(&ChannelInfo::trunk()).expect("serialize trunk");
        assert_eq!(
            json,
            r#"{"channel":"trunk","branch":"trunk","milestone":"trunk"}"#
        );

        let dev: ChannelInfo =
            serde_json::from_str(r#"{"channel":"dev","branch":"1500","milestone":28}"#)
                .expect("deserialize dev");
        assert_eq!(dev.branch(), Branch::Number(1500));
        assert_eq!(dev.milestone(), Milestone::Release(28));
    }

    #[test]
    fn deserializer_enforces_trunk_invariant() {
        let result = serde_json::from_str::<ChannelInfo>(
            r#"{"channel":"stable","branch":"trunk","milestone":20}"#,
        );
        assert!(result.is_err());
    }
}
