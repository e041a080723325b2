//! Features files: per-API channel listings, optionally restricted to a
//! platform.

use std::collections::{BTreeMap, BTreeSet};

use avail_provider_api::Snapshot;
use camino::Utf8Path;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::MetadataEpochs;
use crate::document::{parse_json, MalformedDocument};
use crate::{Channel, Error, Milestone, Platform, Result};

/// A features file, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureSource {
    /// `_api_features.json`, the dedicated listing.
    Api,
    /// `_permission_features.json`.
    Permission,
    /// `_manifest_features.json`.
    Manifest,
}

impl FeatureSource {
    /// Every source, highest precedence first.
    pub const ALL: [Self; 3] = [Self::Api, Self::Permission, Self::Manifest];

    /// Filename inside the API directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Api => "_api_features.json",
            Self::Permission => "_permission_features.json",
            Self::Manifest => "_manifest_features.json",
        }
    }

    /// First milestone the file exists at.
    #[must_use]
    pub const fn epoch(self, epochs: &MetadataEpochs) -> u32 {
        match self {
            Self::Api => epochs.api_features,
            Self::Permission | Self::Manifest => epochs.permission_features,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FeatureEntry {
    channel: Option<Channel>,
    // `None` applies everywhere.
    platforms: Option<BTreeSet<Platform>>,
}

impl FeatureEntry {
    fn parse(object: &Map<String, Value>) -> Self {
        let channel = object
            .get("channel")
            .and_then(Value::as_str)
            .and_then(|name| name.parse().ok());
        let platforms = object
            .get("extension_types")
            .map(platforms_from_extension_types)
            .or_else(|| object.get("platforms").map(platforms_from_names));
        Self { channel, platforms }
    }

    fn applies_to(&self, platform: Platform) -> bool {
        self.platforms
            .as_ref()
            .map_or(true, |platforms| platforms.contains(&platform))
    }
}

fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn platforms_from_extension_types(value: &Value) -> BTreeSet<Platform> {
    let mut platforms = BTreeSet::new();
    for extension_type in string_values(value) {
        match extension_type {
            "all" => platforms.extend(Platform::ALL),
            "platform_app" => {
                platforms.insert(Platform::Apps);
            }
            _ => {
                platforms.insert(Platform::Extensions);
            }
        }
    }
    platforms
}

fn platforms_from_names(value: &Value) -> BTreeSet<Platform> {
    string_values(value)
        .into_iter()
        .filter_map(|name| name.parse().ok())
        .collect()
}

/// One parsed features file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFile {
    features: BTreeMap<String, Vec<FeatureEntry>>,
}

impl FeatureFile {
    /// Parse a features document. Each feature is an object or a list of
    /// objects; anything else is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDocument`] if the document is not a JSON object.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, MalformedDocument> {
        let Value::Object(root) = parse_json(bytes)? else {
            return Err(MalformedDocument::new("expected an object of features"));
        };
        let features = root
            .iter()
            .map(|(name, value)| {
                let entries = match value {
                    Value::Object(object) => vec![FeatureEntry::parse(object)],
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(FeatureEntry::parse)
                        .collect(),
                    _ => Vec::new(),
                };
                (name.clone(), entries)
            })
            .collect();
        Ok(Self { features })
    }

    /// Channel `name` is listed on for `platform`: the most stable channel
    /// among the entries that apply. `None` if no applicable entry exists.
    #[must_use]
    pub fn channel_for(&self, name: &str, platform: Platform) -> Option<Channel> {
        self.features
            .get(name)?
            .iter()
            .filter(|entry| entry.applies_to(platform))
            .filter_map(|entry| entry.channel)
            .min()
    }

    /// Whether the file lists `name` at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }
}

/// The features files present in one snapshot, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct FeaturesBundle {
    files: Vec<(FeatureSource, FeatureFile)>,
}

impl FeaturesBundle {
    /// Read every features file that exists at `milestone`. Files older than
    /// their epoch are not consulted even if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] on read failures and
    /// [`Error::MalformedSchema`] for unparsable files.
    pub fn load(
        snapshot: &dyn Snapshot,
        api_dir: &Utf8Path,
        milestone: Milestone,
        epochs: &MetadataEpochs,
    ) -> Result<Self> {
        let mut files = Vec::new();
        for source in FeatureSource::ALL {
            if !milestone.at_least(source.epoch(epochs)) {
                continue;
            }
            let path = api_dir.join(source.file_name());
            let Some(bytes) = snapshot.read(&path)? else {
                debug!("{} absent at milestone {}", path, milestone);
                continue;
            };
            let file = FeatureFile::parse(&bytes).map_err(|err| Error::malformed(&path, err))?;
            files.push((source, file));
        }
        Ok(Self { files })
    }

    /// Verdict of the highest-precedence source with an applicable entry.
    #[must_use]
    pub fn channel_for(&self, name: &str, platform: Platform) -> Option<Channel> {
        self.files
            .iter()
            .find_map(|(_, file)| file.channel_for(name, platform))
    }

    /// Sources that were loaded.
    pub fn sources(&self) -> impl Iterator<Item = FeatureSource> + '_ {
        self.files.iter().map(|(source, _)| *source)
    }
}

#[cfg(test)]
mod tests {
    use avail_providers::MemorySnapshot;

    use super::*;

    const API_DIR: &str = "chrome/common/extensions/api";

    #[test]
    fn complex_features_use_most_stable_applicable_entry() {
        let file = FeatureFile::parse(
            br#"{
                // Comments are allowed.
                "appsFirst": [
                    {"channel": "stable", "extension_types": ["platform_app"]},
                    {"channel": "dev", "extension_types": ["extension"]}
                ],
                "storage": {"channel": "beta"},
                "everywhere": [{"channel": "dev", "extension_types": "all"}, {"channel": "trunk"}],
                "named": {"channel": "stable", "platforms": ["extensions"]},
                "junk": 7
            }"#,
        )
        .expect("parse");
        assert_eq!(file.channel_for("appsFirst", Platform::Apps), Some(Channel::Stable));
        assert_eq!(file.channel_for("appsFirst", Platform::Extensions), Some(Channel::Dev));
        assert_eq!(file.channel_for("storage", Platform::Apps), Some(Channel::Beta));
        assert_eq!(file.channel_for("everywhere", Platform::Apps), Some(Channel::Dev));
        assert_eq!(file.channel_for("named", Platform::Apps), None);
        assert_eq!(file.channel_for("named", Platform::Extensions), Some(Channel::Stable));
        assert_eq!(file.channel_for("junk", Platform::Apps), None);
        assert!(file.contains("junk"));
        assert_eq!(file.channel_for("missing", Platform::Apps), None);
    }

    #[test]
    fn non_object_documents_are_malformed() {
        assert!(FeatureFile::parse(b"[]").is_err());
    }

    #[test]
    fn bundle_respects_epochs_and_precedence() {
        let snapshot = MemorySnapshot::new()
            .with_file(
                format!("{API_DIR}/_api_features.json"),
                r#"{"cookies": {"channel": "beta"}}"#,
            )
            .with_file(
                format!("{API_DIR}/_permission_features.json"),
                r#"{"cookies": {"channel": "stable"}, "alarms": {"channel": "dev"}}"#,
            )
            .with_file(
                format!("{API_DIR}/_manifest_features.json"),
                r#"{"alarms": {"channel": "stable"}}"#,
            );
        let epochs = MetadataEpochs::default();
        let api_dir = Utf8Path::new(API_DIR);

        let modern = FeaturesBundle::load(&snapshot, api_dir, Milestone::Release(28), &epochs)
            .expect("load");
        assert_eq!(modern.channel_for("cookies", Platform::Extensions), Some(Channel::Beta));
        assert_eq!(modern.channel_for("alarms", Platform::Extensions), Some(Channel::Dev));

        let older = FeaturesBundle::load(&snapshot, api_dir, Milestone::Release(25), &epochs)
            .expect("load");
        assert_eq!(older.channel_for("cookies", Platform::Extensions), Some(Channel::Stable));
        assert_eq!(
            older.sources().collect::<Vec<_>>(),
            vec![FeatureSource::Permission, FeatureSource::Manifest]
        );

        let ancient = FeaturesBundle::load(&snapshot, api_dir, Milestone::Release(19), &epochs)
            .expect("load");
        assert_eq!(ancient.channel_for("cookies", Platform::Extensions), None);
    }

    #[test]
    fn malformed_feature_files_carry_their_path() {
        let snapshot =
            MemorySnapshot::new().with_file(format!("{API_DIR}/_api_features.json"), "{");
        let err = FeaturesBundle::load(
            &snapshot,
            Utf8Path::new(API_DIR),
            Milestone::Trunk,
            &MetadataEpochs::default(),
        )
        .expect_err("malformed");
        match err {
            Error::MalformedSchema { path, .. } => assert!(path.ends_with("_api_features.json")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
