//! Schema documents as trees of named nodes, and the diff/annotate/merge
//! operations that turn a sequence of them into first-seen availability.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{parse_json, MalformedDocument};
use crate::{ChannelInfo, LookupResult};

/// Keys whose values hold nested schema nodes.
const STRUCTURAL_KEYS: [&str; 5] = ["properties", "functions", "events", "types", "parameters"];

/// Keys naming an entry of a structural list, in order of preference.
const NAME_KEYS: [&str; 5] = ["namespace", "name", "id", "$ref", "type"];

/// What is known about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMark {
    /// Kept only to reach changed descendants.
    #[default]
    Structural,
    /// Present in a parsed document, not yet attributed to a revision.
    Present,
    /// Attributed to the oldest revision it was seen at.
    FirstSeen(ChannelInfo),
}

impl NodeMark {
    /// Revision the node was first seen at, if attributed.
    #[must_use]
    pub const fn first_seen(&self) -> Option<ChannelInfo> {
        match self {
            Self::FirstSeen(info) => Some(*info),
            Self::Structural | Self::Present => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Structural => 0,
            Self::Present => 1,
            Self::FirstSeen(_) => 2,
        }
    }
}

/// One node and its named children.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Node mark.
    pub mark: NodeMark,
    /// Children keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, SchemaNode>,
}

impl SchemaNode {
    fn present() -> Self {
        Self {
            mark: NodeMark::Present,
            children: BTreeMap::new(),
        }
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(Self::count).sum::<usize>()
    }
}

/// Tree of schema nodes rooted at namespace names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaGraph {
    roots: BTreeMap<String, SchemaNode>,
}

impl SchemaGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a schema document: a list of namespace objects or a single one.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDocument`] if the bytes are not a JSON object or list.
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedDocument> {
        let value = parse_json(bytes)?;
        let namespaces = match &value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            Value::Object(_) => vec![&value],
            _ => {
                return Err(MalformedDocument::new(
                    "expected a namespace object or a list of them",
                ))
            }
        };

        let mut roots = BTreeMap::new();
        for namespace in namespaces {
            let Value::Object(object) = namespace else {
                continue;
            };
            if let Some(name) = entry_name(object) {
                roots.insert(name, parse_node(object));
            }
        }
        Ok(Self { roots })
    }

    /// Parse a document keeping only `namespace`. Combined files list many
    /// namespaces; the graph is empty if `namespace` is not among them.
    ///
    /// # Errors
    ///
    /// Same as [`SchemaGraph::parse`].
    pub fn parse_namespace(bytes: &[u8], namespace: &str) -> Result<Self, MalformedDocument> {
        let mut graph = Self::parse(bytes)?;
        graph.roots.retain(|name, _| name == namespace);
        Ok(graph)
    }

    /// Nodes of `self` that `older` lacks, with the containers leading to
    /// them. Containers shared by both graphs are kept as structural nodes
    /// only when something below them changed.
    #[must_use]
    pub fn diff(&self, older: &Self) -> Self {
        Self {
            roots: diff_children(&self.roots, &older.roots),
        }
    }

    /// Copy of the graph with every present node attributed to `info`.
    #[must_use]
    pub fn annotated(&self, info: ChannelInfo) -> Self {
        Self {
            roots: annotate_children(&self.roots, info),
        }
    }

    /// Fold `update` into this graph. New paths are added; a mark is only
    /// ever upgraded, so a node's first-seen revision never changes once set.
    pub fn merge(&mut self, update: Self) {
        merge_children(&mut self.roots, update.roots);
    }

    /// Resolve a path of node names, namespace first.
    pub fn lookup<I, S>(&self, path: I) -> LookupResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = path.into_iter();
        let Some(first) = path.next() else {
            return LookupResult::unresolved();
        };
        let Some(mut node) = self.roots.get(first.as_ref()) else {
            return LookupResult::unresolved();
        };
        for segment in path {
            match node.children.get(segment.as_ref()) {
                Some(child) => node = child,
                None => return LookupResult::unresolved(),
            }
        }
        LookupResult::resolved(node.mark.first_seen())
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.roots.values().map(SchemaNode::count).sum()
    }

    /// Root node for a namespace.
    #[must_use]
    pub fn root(&self, namespace: &str) -> Option<&SchemaNode> {
        self.roots.get(namespace)
    }

    /// Every attributed node with its path, depth first.
    #[must_use]
    pub fn paths(&self) -> Vec<(Vec<String>, ChannelInfo)> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(&self.roots, &mut prefix, &mut out);
        out
    }
}

fn entry_name(object: &Map<String, Value>) -> Option<String> {
    NAME_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

fn parse_node(object: &Map<String, Value>) -> SchemaNode {
    let mut node = SchemaNode::present();
    for key in STRUCTURAL_KEYS {
        let Some(value) = object.get(key) else {
            continue;
        };
        let mut container = SchemaNode::present();
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(entry) = item {
                        if let Some(name) = entry_name(entry) {
                            container.children.insert(name, parse_node(entry));
                        }
                    }
                }
            }
            Value::Object(entries) if key == "properties" => {
                for (name, item) in entries {
                    let child = match item {
                        Value::Object(entry) => parse_node(entry),
                        _ => SchemaNode::present(),
                    };
                    container.children.insert(name.clone(), child);
                }
            }
            _ => continue,
        }
        node.children.insert(key.to_owned(), container);
    }
    node
}

fn diff_children(
    newer: &BTreeMap<String, SchemaNode>,
    older: &BTreeMap<String, SchemaNode>,
) -> BTreeMap<String, SchemaNode> {
    let mut out = BTreeMap::new();
    for (name, node) in newer {
        match older.get(name) {
            None => {
                out.insert(name.clone(), node.clone());
            }
            Some(previous) => {
                let children = diff_children(&node.children, &previous.children);
                if !children.is_empty() {
                    out.insert(
                        name.clone(),
                        SchemaNode {
                            mark: NodeMark::Structural,
                            children,
                        },
                    );
                }
            }
        }
    }
    out
}

fn annotate_children(
    nodes: &BTreeMap<String, SchemaNode>,
    info: ChannelInfo,
) -> BTreeMap<String, SchemaNode> {
    nodes
        .iter()
        .map(|(name, node)| {
            let mark = match node.mark {
                NodeMark::Present => NodeMark::FirstSeen(info),
                other => other,
            };
            let annotated = SchemaNode {
                mark,
                children: annotate_children(&node.children, info),
            };
            (name.clone(), annotated)
        })
        .collect()
}

fn merge_children(into: &mut BTreeMap<String, SchemaNode>, from: BTreeMap<String, SchemaNode>) {
    for (name, node) in from {
        match into.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if node.mark.rank() > existing.mark.rank() {
                    existing.mark = node.mark;
                }
                merge_children(&mut existing.children, node.children);
            }
        }
    }
}

fn collect_paths(
    nodes: &BTreeMap<String, SchemaNode>,
    prefix: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, ChannelInfo)>,
) {
    for (name, node) in nodes {
        prefix.push(name.clone());
        if let Some(info) = node.mark.first_seen() {
            out.push((prefix.clone(), info));
        }
        collect_paths(&node.children, prefix, out);
        prefix.pop();
    }
}
