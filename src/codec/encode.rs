use log::trace;

use crate::clock::{format_timestamp, Clock, SystemClock};
use crate::codec::escape::{escape_key, escape_value};
use crate::data::osm::{FeatureRecord, OsmId};
use crate::errors::{Error, Result};

pub const FIXME_WARNING: &str = "Do not upload this without validation!";

/// Identifier sources, highest priority first.
const ID_FIELDS: [&str; 3] = ["osm_way_id", "osm_id", "id"];

/// Tag keys that are never written out.
const SUPPRESSED_TAGS: [&str; 1] = ["track"];

/// Turns feature records into `<node>`/`<way>` elements.
///
/// Records without an identifier get placeholder ids counting down from -1.
/// The counter belongs to this instance, so use one encoder per output
/// document.
#[derive(Debug)]
pub struct Encoder<C = SystemClock> {
    next_id: Option<OsmId>,
    clock: C,
}

impl Encoder<SystemClock> {
    pub fn new() -> Self {
        Encoder::with_clock(SystemClock)
    }
}

impl Default for Encoder<SystemClock> {
    fn default() -> Self {
        Encoder::new()
    }
}

type AttrList = Vec<(&'static str, String)>;

impl<C: Clock> Encoder<C> {
    pub fn with_clock(clock: C) -> Self {
        Encoder {
            next_id: Some(-1),
            clock,
        }
    }

    /// Starts placeholder allocation at `first_id` instead of -1. Placeholders
    /// must stay clear of real ids, so `first_id` has to be negative.
    pub fn starting_at(mut self, first_id: OsmId) -> Result<Self> {
        if first_id >= 0 {
            return Err(Error::InvalidValue {
                field: "first_id",
                value: first_id.to_string(),
            });
        }
        self.next_id = Some(first_id);
        Ok(self)
    }

    /// The id the next record without one will receive.
    pub fn next_id(&self) -> Option<OsmId> {
        self.next_id
    }

    fn allocate_id(&mut self) -> Result<OsmId> {
        let id = self.next_id.ok_or(Error::IdsExhausted)?;
        self.next_id = id.checked_sub(1);
        trace!(id = id; "Allocated placeholder id");
        Ok(id)
    }

    fn resolve_id(&mut self, record: &FeatureRecord) -> Result<OsmId> {
        for field in ID_FIELDS {
            if let Some(value) = record.attr(field) {
                return value.as_int(field);
            }
        }
        self.allocate_id()
    }

    fn resolve_version(record: &FeatureRecord) -> Result<i64> {
        match record.attr("version") {
            Some(value) => {
                let version = value.as_int("version")?;
                version.checked_add(1).ok_or_else(|| Error::InvalidValue {
                    field: "version",
                    value: version.to_string(),
                })
            }
            None => Ok(1),
        }
    }

    /// `coords` is spliced in between version and timestamp.
    fn build_attrs(
        &mut self,
        record: &FeatureRecord,
        modified: bool,
        coords: Option<(String, String)>,
    ) -> Result<AttrList> {
        let mut attrs = AttrList::new();
        if modified {
            attrs.push(("action", "modify".to_string()));
        }
        // Checked before allocating so a rejected record never burns an id.
        let version = Self::resolve_version(record)?;
        attrs.push(("id", self.resolve_id(record)?.to_string()));
        attrs.push(("version", version.to_string()));
        if let Some((lat, lon)) = coords {
            attrs.push(("lat", lat));
            attrs.push(("lon", lon));
        }
        attrs.push(("timestamp", format_timestamp(self.clock.now())));
        // Identifying fields are only passed through, never synthesized.
        for field in ["uid", "user"] {
            if let Some(value) = record.attr(field) {
                attrs.push((field, value.to_string()));
            }
        }
        Ok(attrs)
    }

    pub fn encode_way(&mut self, record: &FeatureRecord, modified: bool) -> Result<String> {
        let attrs = self.build_attrs(record, modified, None)?;
        let mut lines = vec![format!("  <way {}>", render_attrs(&attrs))];
        for node_ref in record.refs() {
            lines.push(format!("    <nd ref=\"{node_ref}\"/>"));
        }
        lines.extend(tag_lines(record, &attrs, modified));
        lines.push("  </way>".to_string());
        Ok(lines.join("\n"))
    }

    pub fn encode_node(&mut self, record: &FeatureRecord, modified: bool) -> Result<String> {
        let coords = (coordinate(record, "lat")?, coordinate(record, "lon")?);
        let attrs = self.build_attrs(record, modified, Some(coords))?;
        let tags = tag_lines(record, &attrs, modified);
        if tags.is_empty() {
            return Ok(format!("  <node {}/>", render_attrs(&attrs)));
        }
        let mut lines = vec![format!("  <node {}>", render_attrs(&attrs))];
        lines.extend(tags);
        lines.push("  </node>".to_string());
        Ok(lines.join("\n"))
    }

    /// Encodes the record as a way or node according to its kind.
    pub fn encode(&mut self, record: &FeatureRecord, modified: bool) -> Result<String> {
        if record.is_way() {
            self.encode_way(record, modified)
        } else {
            self.encode_node(record, modified)
        }
    }
}

fn coordinate(record: &FeatureRecord, field: &'static str) -> Result<String> {
    record
        .attr(field)
        .map(ToString::to_string)
        .ok_or(Error::MissingField {
            element: "node",
            field,
        })
}

fn render_attrs(attrs: &AttrList) -> String {
    attrs
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"", escape_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_lines(record: &FeatureRecord, attrs: &AttrList, modified: bool) -> Vec<String> {
    let mut lines: Vec<String> = record
        .tags
        .iter()
        .filter(|(key, _)| !SUPPRESSED_TAGS.contains(&key.as_str()))
        .filter(|(key, _)| !attrs.iter().any(|(name, _)| *name == key.as_str()))
        .filter(|(key, _)| !(modified && key.as_str() == "fixme"))
        .filter_map(|(key, value)| {
            let value = value.as_deref().filter(|value| !value.is_empty())?;
            Some(format!(
                "    <tag k=\"{}\" v=\"{}\"/>",
                escape_key(key),
                escape_value(value)
            ))
        })
        .collect();
    if modified {
        lines.push(format!("    <tag k=\"fixme\" v=\"{FIXME_WARNING}\"/>"));
    }
    lines
}
