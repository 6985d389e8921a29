use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use log::debug;

use self::osm::{FeatureRecord, OsmId};
use crate::errors::{Error, Result};

pub mod osm;

/// Features decoded from an .osm document. Nodes and ways live in separate id
/// spaces, so a node and a way may share an id. Within one kind, inserting an
/// id that is already present replaces the record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DocumentStore {
    nodes: BTreeMap<OsmId, FeatureRecord>,
    ways: BTreeMap<OsmId, FeatureRecord>,
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore::default()
    }

    /// Files the record under its kind. Last write wins; returns the record
    /// that was replaced, if any.
    pub fn insert(&mut self, id: OsmId, record: FeatureRecord) -> Option<FeatureRecord> {
        let (kind, features) = if record.is_way() {
            ("way", &mut self.ways)
        } else {
            ("node", &mut self.nodes)
        };
        let replaced = features.insert(id, record);
        if replaced.is_some() {
            debug!(id = id, kind = kind; "Duplicate feature id, replacing earlier record");
        }
        replaced
    }

    pub fn get_node(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.nodes.get(&id).ok_or(Error::NotFound(id))
    }

    pub fn get_way(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.ways.get(&id).ok_or(Error::NotFound(id))
    }

    /// Looks `id` up among the nodes first, then among the ways.
    pub fn get_feature(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.get_node(id).or_else(|_| self.get_way(id))
    }

    /// Every distinct tag key used by the stored records.
    pub fn get_fields(&self) -> BTreeSet<String> {
        self.iter()
            .flat_map(|(_, record)| record.tags.keys().cloned())
            .collect()
    }

    /// Merges `other` into this store, `other` winning on duplicate ids.
    pub fn extend(&mut self, other: DocumentStore) {
        for (id, record) in other.nodes.into_iter().chain(other.ways) {
            self.insert(id, record);
        }
    }

    /// Nodes by id, then ways by id.
    pub fn iter(&self) -> impl Iterator<Item = (&OsmId, &FeatureRecord)> {
        self.nodes.iter().chain(self.ways.iter())
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty()
    }

    /// Writes attributes as `k = v` and tags as tab-indented `k = v` lines.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (_, record) in self.iter() {
            for (key, value) in &record.attrs {
                writeln!(out, "{key} = {value}")?;
            }
            for (key, value) in &record.tags {
                writeln!(out, "\t{key} = {}", value.as_deref().unwrap_or_default())?;
            }
        }
        Ok(())
    }
}
