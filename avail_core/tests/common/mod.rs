#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use avail_core::catalog::{ChannelCatalog, ChannelHead, ChannelHeads};
use avail_core::{Branch, Channel, ChannelInfo, ChannelMapper, Milestone};
use avail_providers::{MemorySnapshot, MemorySnapshotProvider};

pub const API_DIR: &str = "chrome/common/extensions/api";

/// Branch number used for a milestone throughout the fixtures.
pub fn branch_of(milestone: u32) -> u32 {
    1000 + milestone
}

pub fn api_path(file: &str) -> String {
    format!("{API_DIR}/{file}")
}

/// Mapper whose history runs from `oldest` up to the stable head, with
/// optional beta and dev heads above it.
pub fn mapper(oldest: u32, stable: u32, beta: Option<u32>, dev: Option<u32>) -> Arc<ChannelMapper> {
    let history: BTreeMap<u32, u32> = (oldest..stable)
        .map(|milestone| (milestone, branch_of(milestone)))
        .collect();
    let head = |milestone: u32| ChannelHead::new(branch_of(milestone), milestone);
    let heads = ChannelHeads {
        stable: head(stable),
        beta: beta.map(head),
        dev: dev.map(head),
    };
    let catalog = ChannelCatalog::new(history, heads).expect("catalog");
    Arc::new(ChannelMapper::new(catalog).expect("mapper"))
}

/// Provider with one snapshot per milestone in `milestones` plus trunk,
/// each filled with the files `files` returns for it.
pub fn provider<F>(milestones: impl IntoIterator<Item = u32>, files: F) -> MemorySnapshotProvider
where
    F: Fn(Milestone) -> Vec<(String, String)>,
{
    let build = |milestone: Milestone| {
        files(milestone)
            .into_iter()
            .fold(MemorySnapshot::new(), |snapshot, (path, contents)| {
                snapshot.with_file(path, contents)
            })
    };
    let mut provider = MemorySnapshotProvider::new();
    for milestone in milestones {
        provider.insert(
            Branch::Number(branch_of(milestone)),
            build(Milestone::Release(milestone)),
        );
    }
    provider.insert(Branch::Trunk, build(Milestone::Trunk));
    provider
}

pub fn info(channel: Channel, milestone: u32) -> ChannelInfo {
    ChannelInfo::release(channel, branch_of(milestone), milestone).expect("channel info")
}

pub fn stable(milestone: u32) -> ChannelInfo {
    info(Channel::Stable, milestone)
}
