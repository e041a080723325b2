//! Resolves when an API namespace, or any node inside its schema, became
//! available.
//!
//! Namespace availability is decided per revision from the metadata each
//! revision carries: features files when they exist, schema files before
//! that. Node availability diffs consecutive schema revisions so every node
//! is attributed to the oldest revision it appears in.

use std::sync::Arc;

use avail_provider_api::{CacheKey, ResultCache, Snapshot, SnapshotProvider, Stat};
use camino::Utf8PathBuf;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::channel::ChannelMapper;
use crate::config::FinderConfig;
use crate::document::{parse_json, MalformedDocument};
use crate::features::FeaturesBundle;
use crate::history::HistoryIterator;
use crate::namespace::{namespace_from_filename, schema_file_stems};
use crate::schema_graph::SchemaGraph;
use crate::{
    AvailabilityInfo, Branch, Channel, ChannelInfo, Error, Milestone, Platform, Result,
};

/// Schema file listing every namespace, used before per-API files existed.
pub const COMBINED_SCHEMA_FILE: &str = "extension_api.json";

/// Where a namespace's schema lives in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    /// Path of the schema file.
    pub path: Utf8PathBuf,
    /// Whether the file is the combined multi-namespace document.
    pub combined: bool,
}

#[derive(Deserialize)]
struct PredeterminedEntry {
    channel: Channel,
    #[serde(default)]
    version: Option<u32>,
}

/// Answers availability queries for one platform.
pub struct AvailabilityFinder {
    mapper: Arc<ChannelMapper>,
    provider: Arc<dyn SnapshotProvider>,
    history: HistoryIterator,
    config: FinderConfig,
    platform: Platform,
    cache: Option<Arc<dyn ResultCache>>,
}

impl AvailabilityFinder {
    /// Create a finder without a result cache.
    #[must_use]
    pub fn new(
        mapper: Arc<ChannelMapper>,
        provider: Arc<dyn SnapshotProvider>,
        config: FinderConfig,
        platform: Platform,
    ) -> Self {
        let history = HistoryIterator::new(Arc::clone(&mapper), Arc::clone(&provider));
        Self {
            mapper,
            provider,
            history,
            config,
            platform,
            cache: None,
        }
    }

    /// Memoize results in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Platform whose feature entries apply.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// The channel mapper.
    #[must_use]
    pub fn mapper(&self) -> &ChannelMapper {
        &self.mapper
    }

    /// The finder configuration.
    #[must_use]
    pub const fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Oldest revision at which `api_name` is available, plus the stable
    /// milestone it is scheduled for when it is not stable yet.
    ///
    /// `api_name` may be a namespace or a schema filename stem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] for unparsable metadata,
    /// [`Error::Provider`] for read failures and [`Error::NotFound`] when a
    /// predetermined entry names an unknown milestone.
    pub fn api_availability(&self, api_name: &str) -> Result<AvailabilityInfo> {
        let namespace = namespace_from_filename(api_name);
        let key = self.cache_key(&namespace);
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.availability(&key)) {
            debug!("availability of {} served from cache", namespace);
            return Ok(hit);
        }

        let info = self.resolve_availability(&namespace)?;
        if let Some(cache) = &self.cache {
            cache.store_availability(key, info);
        }
        Ok(info)
    }

    fn resolve_availability(&self, namespace: &str) -> Result<AvailabilityInfo> {
        if self.config.always_available.contains(namespace) {
            debug!("{} is always available", namespace);
            return Ok(AvailabilityInfo::new(ChannelInfo::trunk()));
        }
        if let Some(info) = self.predetermined(namespace)? {
            debug!("{} has predetermined availability {}", namespace, info);
            return Ok(AvailabilityInfo::new(info));
        }

        let dev = self.mapper.channel_info_for_channel(Channel::Dev);
        let oldest = self.history.descending(dev, |snapshot, info| {
            self.is_available_at(namespace, snapshot, info)
        })?;
        let channel_info = oldest.unwrap_or_else(ChannelInfo::trunk);
        let scheduled = if self.is_stable_at(&channel_info) {
            None
        } else {
            self.find_scheduled(namespace)?
        };
        Ok(AvailabilityInfo::with_scheduled(channel_info, scheduled))
    }

    /// Entry for `namespace` in the predetermined availability document of
    /// the trunk snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] for an unparsable document or entry
    /// and [`Error::NotFound`] for a stable entry naming an unknown
    /// milestone.
    pub fn predetermined(&self, namespace: &str) -> Result<Option<ChannelInfo>> {
        let trunk = match self.provider.snapshot(Branch::Trunk) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("no trunk snapshot for predetermined availability: {}", err);
                return Ok(None);
            }
        };
        let path = &self.config.availability_overrides;
        let Some(bytes) = trunk.read(path)? else {
            return Ok(None);
        };
        let document = parse_json(&bytes).map_err(|err| Error::malformed(path, err))?;
        let Some(entry) = document.get(namespace) else {
            return Ok(None);
        };
        let entry: PredeterminedEntry = serde_json::from_value(entry.clone()).map_err(|err| {
            Error::malformed(path, MalformedDocument::new(format!("{namespace}: {err}")))
        })?;

        match (entry.channel, entry.version) {
            (Channel::Stable, Some(version)) => {
                self.mapper.channel_info_for_milestone(version).map(Some)
            }
            (Channel::Stable, None) => Err(Error::malformed(
                path,
                MalformedDocument::new(format!("{namespace}: stable entry without a version")),
            )),
            (channel, _) => Ok(Some(self.mapper.channel_info_for_channel(channel))),
        }
    }

    /// Whether `namespace` is available on the revision `info`, judged from
    /// `snapshot`.
    ///
    /// # Errors
    ///
    /// Propagates metadata read and parse failures.
    pub fn is_available_at(
        &self,
        namespace: &str,
        snapshot: &dyn Snapshot,
        info: &ChannelInfo,
    ) -> Result<bool> {
        if self.is_stable_at(info) {
            return self.stable_verdict(namespace, snapshot, info.milestone());
        }

        let features = self.load_features(snapshot, info.milestone())?;
        let required = match features.channel_for(namespace, self.platform) {
            Some(channel) => Some(channel),
            None if self.has_schema(namespace, snapshot, info.milestone())? => {
                Some(info.channel())
            }
            None => None,
        };
        Ok(required.is_some_and(|required| info.channel() >= required))
    }

    /// Whether `info` is a stable release.
    #[must_use]
    pub fn is_stable_at(&self, info: &ChannelInfo) -> bool {
        info.channel() == Channel::Stable
    }

    /// Stable milestone `namespace` is committed to, found by walking back
    /// from the dev head while metadata lists it as stable. `None` if the dev
    /// head does not list it as stable.
    ///
    /// # Errors
    ///
    /// Propagates metadata read and parse failures.
    pub fn find_scheduled(&self, namespace: &str) -> Result<Option<u32>> {
        let dev = self.mapper.channel_info_for_channel(Channel::Dev);
        let oldest = self.history.descending(dev, |snapshot, info| {
            self.stable_verdict(namespace, snapshot, info.milestone())
        })?;
        Ok(oldest
            .filter(|info| matches!(info.channel(), Channel::Beta | Channel::Dev))
            .and_then(|info| info.milestone().number()))
    }

    fn stable_verdict(
        &self,
        namespace: &str,
        snapshot: &dyn Snapshot,
        milestone: Milestone,
    ) -> Result<bool> {
        if !milestone.at_least(self.config.epochs.combined_schema) {
            return Ok(false);
        }
        let features = self.load_features(snapshot, milestone)?;
        match features.channel_for(namespace, self.platform) {
            Some(channel) => Ok(channel == Channel::Stable),
            None => self.has_schema(namespace, snapshot, milestone),
        }
    }

    fn load_features(
        &self,
        snapshot: &dyn Snapshot,
        milestone: Milestone,
    ) -> Result<FeaturesBundle> {
        FeaturesBundle::load(
            snapshot,
            &self.config.api_dir,
            milestone,
            &self.config.epochs,
        )
    }

    /// Schema file for `namespace` at `milestone`: its own file if present,
    /// otherwise the combined file for milestones that predate per-API
    /// files. Only existence is checked.
    ///
    /// # Errors
    ///
    /// Propagates snapshot failures.
    pub fn schema_location(
        &self,
        namespace: &str,
        snapshot: &dyn Snapshot,
        milestone: Milestone,
    ) -> Result<Option<SchemaLocation>> {
        let epochs = &self.config.epochs;
        if !milestone.at_least(epochs.combined_schema) {
            return Ok(None);
        }
        for stem in schema_file_stems(namespace) {
            let path = self.config.api_dir.join(format!("{stem}.json"));
            if snapshot.exists(&path)? {
                return Ok(Some(SchemaLocation {
                    path,
                    combined: false,
                }));
            }
        }
        if !milestone.at_least(epochs.per_api_schema) {
            let path = self.config.api_dir.join(COMBINED_SCHEMA_FILE);
            if snapshot.exists(&path)? {
                return Ok(Some(SchemaLocation {
                    path,
                    combined: true,
                }));
            }
        }
        Ok(None)
    }

    /// Whether a schema for `namespace` exists at `milestone`. A combined
    /// file only counts if it lists the namespace.
    ///
    /// # Errors
    ///
    /// Propagates snapshot failures and combined-file parse failures.
    pub fn has_schema(
        &self,
        namespace: &str,
        snapshot: &dyn Snapshot,
        milestone: Milestone,
    ) -> Result<bool> {
        match self.schema_location(namespace, snapshot, milestone)? {
            None => Ok(false),
            Some(location) if location.combined => Ok(!self
                .read_schema_graph(namespace, snapshot, &location)?
                .is_empty()),
            Some(_) => Ok(true),
        }
    }

    /// Parse the schema at `location`, keeping only `namespace` for combined
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] for unparsable files.
    pub fn read_schema_graph(
        &self,
        namespace: &str,
        snapshot: &dyn Snapshot,
        location: &SchemaLocation,
    ) -> Result<SchemaGraph> {
        let Some(bytes) = snapshot.read(&location.path)? else {
            return Ok(SchemaGraph::new());
        };
        debug!("parsing {}", location.path);
        let graph = if location.combined {
            SchemaGraph::parse_namespace(&bytes, namespace)
        } else {
            SchemaGraph::parse(&bytes)
        };
        graph.map_err(|err| Error::malformed(&location.path, err))
    }

    /// Schema graph of `api_name` with every node attributed to the oldest
    /// revision it appears in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSchema`] for unparsable schema files and
    /// [`Error::Provider`] for read failures.
    pub fn api_node_availability(&self, api_name: &str) -> Result<SchemaGraph> {
        let namespace = namespace_from_filename(api_name);
        let key = self.cache_key(&namespace);
        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.node_graph(&key)) {
            match serde_json::from_slice(&bytes) {
                Ok(graph) => {
                    debug!("node availability of {} served from cache", namespace);
                    return Ok(graph);
                }
                Err(err) => warn!("discarding cached node graph for {}: {}", namespace, err),
            }
        }

        let graph = self.build_node_graph(&namespace)?;
        if let Some(cache) = &self.cache {
            match serde_json::to_vec(&graph) {
                Ok(bytes) => cache.store_node_graph(key, bytes),
                Err(err) => warn!("not caching node graph for {}: {}", namespace, err),
            }
        }
        Ok(graph)
    }

    fn build_node_graph(&self, namespace: &str) -> Result<SchemaGraph> {
        struct Seen {
            location: SchemaLocation,
            stat: Stat,
            graph: SchemaGraph,
            oldest: ChannelInfo,
        }

        let mut accumulated = SchemaGraph::new();
        let mut previous: Option<Seen> = None;

        self.history
            .descending(ChannelInfo::trunk(), |snapshot, info| {
                let Some(location) = self.schema_location(namespace, snapshot, info.milestone())?
                else {
                    debug!("no schema for {} at {}", namespace, info);
                    return Ok(false);
                };
                let Some(stat) = snapshot.stat(&location.path)? else {
                    return Ok(false);
                };

                if let Some(seen) = previous.as_mut() {
                    if seen.location == location && seen.stat == stat {
                        seen.oldest = *info;
                        return Ok(true);
                    }
                }

                let graph = self.read_schema_graph(namespace, snapshot, &location)?;
                if graph.is_empty() {
                    debug!("{} not listed in {} at {}", namespace, location.path, info);
                    return Ok(false);
                }
                if let Some(seen) = previous.take() {
                    accumulated.merge(seen.graph.diff(&graph).annotated(seen.oldest));
                }
                previous = Some(Seen {
                    location,
                    stat,
                    graph,
                    oldest: *info,
                });
                Ok(true)
            })?;

        if let Some(seen) = previous {
            accumulated.merge(seen.graph.annotated(seen.oldest));
        }
        Ok(accumulated)
    }

    /// Cache key for `namespace` under the current catalog.
    #[must_use]
    pub fn cache_key(&self, namespace: &str) -> CacheKey {
        CacheKey::new(namespace, self.platform, self.mapper.fingerprint())
    }
}
