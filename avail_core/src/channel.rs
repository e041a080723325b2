//! Translation between release channels and numeric milestones.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::catalog::{ChannelCatalog, ChannelHead};
use crate::{Channel, ChannelInfo, Error, Milestone, Result};

/// Immutable channel/milestone table built from a [`ChannelCatalog`].
///
/// Shared across queries behind an `Arc`; nothing here mutates after
/// construction.
#[derive(Debug, Clone)]
pub struct ChannelMapper {
    catalog: ChannelCatalog,
    fingerprint: String,
}

impl ChannelMapper {
    /// Build a mapper, validating the catalog first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the catalog is inconsistent.
    pub fn new(catalog: ChannelCatalog) -> Result<Self> {
        catalog.validate()?;
        let encoded =
            serde_json::to_vec(&catalog).map_err(|err| Error::Catalog(err.to_string()))?;
        let fingerprint = hex::encode(Sha256::digest(&encoded));
        Ok(Self {
            catalog,
            fingerprint,
        })
    }

    /// Catalog the mapper was built from.
    #[must_use]
    pub const fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    /// Digest of the catalog contents. Results computed against one catalog
    /// are keyed by it so a catalog refresh invalidates them.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Revision a milestone shipped as on the stable channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the milestone is not in history and is
    /// not the current stable head.
    pub fn channel_info_for_milestone(&self, milestone: u32) -> Result<ChannelInfo> {
        let stable = self.catalog.channels.stable;
        let branch = if milestone == stable.milestone {
            Some(stable.branch)
        } else {
            self.catalog.history.get(&milestone).copied()
        };
        branch
            .map(|branch| release_info(Channel::Stable, ChannelHead::new(branch, milestone)))
            .ok_or_else(|| Error::NotFound {
                what: format!("stable milestone {milestone}"),
            })
    }

    /// Current head of `channel`. A channel without a head of its own falls
    /// back to the next more stable one.
    #[must_use]
    pub fn channel_info_for_channel(&self, channel: Channel) -> ChannelInfo {
        let heads = &self.catalog.channels;
        match channel {
            Channel::Trunk => ChannelInfo::trunk(),
            Channel::Stable => release_info(Channel::Stable, heads.stable),
            Channel::Beta => heads.beta.map_or_else(
                || self.channel_info_for_channel(Channel::Stable),
                |head| release_info(Channel::Beta, head),
            ),
            Channel::Dev => heads.dev.map_or_else(
                || self.channel_info_for_channel(Channel::Beta),
                |head| release_info(Channel::Dev, head),
            ),
        }
    }

    /// Head of every channel, most stable first.
    #[must_use]
    pub fn all_channel_info(&self) -> Vec<ChannelInfo> {
        Channel::ALL
            .into_iter()
            .map(|channel| self.channel_info_for_channel(channel))
            .collect()
    }

    /// Known stable milestones, ascending.
    #[must_use]
    pub fn milestones(&self) -> Vec<u32> {
        let mut known: BTreeSet<u32> = self.catalog.history.keys().copied().collect();
        known.insert(self.catalog.channels.stable.milestone);
        known.into_iter().collect()
    }

    /// Oldest milestone anything is known about.
    #[must_use]
    pub fn oldest_milestone(&self) -> u32 {
        self.catalog
            .history
            .keys()
            .next()
            .copied()
            .unwrap_or(self.catalog.channels.stable.milestone)
            .min(self.catalog.channels.stable.milestone)
    }

    /// Highest numbered milestone any channel carries.
    #[must_use]
    pub fn latest_milestone(&self) -> u32 {
        self.all_channel_info()
            .iter()
            .filter_map(|info| info.milestone().number())
            .max()
            .unwrap_or(self.catalog.channels.stable.milestone)
    }

    /// Revision for `milestone`, attributed to the most stable channel that
    /// carries it. `None` when no table knows the milestone.
    #[must_use]
    pub fn channel_info_at(&self, milestone: u32) -> Option<ChannelInfo> {
        let stable = self.catalog.channels.stable;
        if milestone <= stable.milestone {
            return self.channel_info_for_milestone(milestone).ok();
        }
        [Channel::Beta, Channel::Dev]
            .into_iter()
            .map(|channel| self.channel_info_for_channel(channel))
            .find(|info| info.milestone() == Milestone::Release(milestone))
    }

    /// Channel currently carrying `milestone`, if any.
    #[must_use]
    pub fn channel_for_milestone(&self, milestone: u32) -> Option<Channel> {
        self.channel_info_at(milestone).map(|info| info.channel())
    }

    /// Least stable channel among `channels`.
    pub fn newest_channel(channels: impl IntoIterator<Item = Channel>) -> Option<Channel> {
        Channel::newest(channels)
    }

    /// Next older mapped revision, skipping milestones no table knows.
    /// `None` once the oldest known milestone has been passed.
    #[must_use]
    pub fn older(&self, info: &ChannelInfo) -> Option<ChannelInfo> {
        let oldest = self.oldest_milestone();
        let mut milestone = match info.milestone() {
            Milestone::Trunk => self.latest_milestone(),
            Milestone::Release(current) => current.checked_sub(1)?,
        };
        while milestone >= oldest {
            if let Some(older) = self.channel_info_at(milestone) {
                return Some(older);
            }
            debug!("no branch recorded for milestone {}, skipping", milestone);
            milestone = milestone.checked_sub(1)?;
        }
        None
    }

    /// Next newer mapped revision; trunk follows the latest milestone and
    /// nothing follows trunk.
    #[must_use]
    pub fn newer(&self, info: &ChannelInfo) -> Option<ChannelInfo> {
        let Milestone::Release(current) = info.milestone() else {
            return None;
        };
        let latest = self.latest_milestone();
        let mut milestone = current.saturating_add(1).max(self.oldest_milestone());
        while milestone <= latest {
            if let Some(newer) = self.channel_info_at(milestone) {
                return Some(newer);
            }
            debug!("no branch recorded for milestone {}, skipping", milestone);
            milestone += 1;
        }
        Some(ChannelInfo::trunk())
    }
}

// `ChannelInfo::release` only rejects the trunk channel, which never reaches
// here.
fn release_info(channel: Channel, head: ChannelHead) -> ChannelInfo {
    ChannelInfo::release(channel, head.branch, head.milestone)
        .unwrap_or_else(|_| ChannelInfo::trunk())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::ChannelHeads;
    use crate::Branch;

    fn mapper() -> ChannelMapper {
        let history = BTreeMap::from([(20, 1132), (21, 1180), (23, 1271), (24, 1312)]);
        let heads = ChannelHeads {
            stable: ChannelHead::new(1364, 25),
            beta: Some(ChannelHead::new(1410, 26)),
            dev: Some(ChannelHead::new(1453, 27)),
        };
        ChannelMapper::new(ChannelCatalog::new(history, heads).expect("catalog")).expect("mapper")
    }

    #[test]
    fn milestones_resolve_through_history_and_stable_head() {
        let mapper = mapper();
        let info = mapper.channel_info_for_milestone(21).expect("21 known");
        assert_eq!(info.channel(), Channel::Stable);
        assert_eq!(info.branch(), Branch::Number(1180));

        let head = mapper.channel_info_for_milestone(25).expect("stable head");
        assert_eq!(head.branch(), Branch::Number(1364));

        assert!(matches!(
            mapper.channel_info_for_milestone(19),
            Err(Error::NotFound { .. })
        ));
        assert!(mapper.channel_info_for_milestone(26).is_err());
    }

    #[test]
    fn channel_heads_and_trunk() {
        let mapper = mapper();
        assert_eq!(
            mapper.channel_info_for_channel(Channel::Dev).milestone(),
            Milestone::Release(27)
        );
        assert!(mapper.channel_info_for_channel(Channel::Trunk).is_trunk());
        let channels: Vec<_> = mapper
            .all_channel_info()
            .iter()
            .map(ChannelInfo::channel)
            .collect();
        assert_eq!(channels, Channel::ALL.to_vec());
    }

    #[test]
    fn missing_heads_fall_back_to_more_stable_channels() {
        let heads = ChannelHeads {
            stable: ChannelHead::new(1364, 25),
            beta: None,
            dev: None,
        };
        let catalog = ChannelCatalog::new(BTreeMap::new(), heads).expect("catalog");
        let mapper = ChannelMapper::new(catalog).expect("mapper");
        let dev = mapper.channel_info_for_channel(Channel::Dev);
        assert_eq!(dev.channel(), Channel::Stable);
        assert_eq!(dev.milestone(), Milestone::Release(25));
        assert_eq!(mapper.latest_milestone(), 25);
        assert_eq!(mapper.oldest_milestone(), 25);
    }

    #[test]
    fn milestones_are_attributed_to_most_stable_channel() {
        let mapper = mapper();
        assert_eq!(mapper.channel_for_milestone(24), Some(Channel::Stable));
        assert_eq!(mapper.channel_for_milestone(26), Some(Channel::Beta));
        assert_eq!(mapper.channel_for_milestone(27), Some(Channel::Dev));
        assert_eq!(mapper.channel_for_milestone(22), None);
        assert_eq!(mapper.channel_for_milestone(28), None);
        assert_eq!(mapper.milestones(), vec![20, 21, 23, 24, 25]);
    }

    #[test]
    fn stepping_skips_unmapped_milestones() {
        let mapper = mapper();
        let from_trunk = mapper.older(&ChannelInfo::trunk()).expect("dev head");
        assert_eq!(from_trunk.channel(), Channel::Dev);

        let at_23 = mapper.channel_info_for_milestone(23).expect("23");
        let older = mapper.older(&at_23).expect("older than 23");
        assert_eq!(older.milestone(), Milestone::Release(21));

        let newer = mapper.newer(&older).expect("newer than 21");
        assert_eq!(newer.milestone(), Milestone::Release(23));

        let oldest = mapper.channel_info_for_milestone(20).expect("20");
        assert_eq!(mapper.older(&oldest), None);

        let dev = mapper.channel_info_for_channel(Channel::Dev);
        assert_eq!(mapper.newer(&dev), Some(ChannelInfo::trunk()));
        assert_eq!(mapper.newer(&ChannelInfo::trunk()), None);
    }

    #[test]
    fn fingerprint_tracks_catalog_contents() {
        let first = mapper();
        let second = mapper();
        assert_eq!(first.fingerprint(), second.fingerprint());

        let mut catalog = first.catalog().clone();
        catalog.channels.dev = Some(ChannelHead::new(1500, 28));
        let moved = ChannelMapper::new(catalog).expect("mapper");
        assert_ne!(moved.fingerprint(), first.fingerprint());
        assert_eq!(
            ChannelMapper::newest_channel([Channel::Stable, Channel::Dev]),
            Some(Channel::Dev)
        );
    }
}
