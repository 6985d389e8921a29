use log::{info, warn};

use crate::codec::tree::{self, Element};
use crate::data::osm::{AttrValue, Attrs, FeatureKind, FeatureRecord, OsmId, Tags};
use crate::data::DocumentStore;
use crate::errors::{Error, Result};

/// Coordinates are cut to this many characters on load.
const COORD_PRECISION: usize = 10;

/// Optional attributes carried over when present. Numeric ones are stored as
/// integers so a later encode can bump the version.
const METADATA_FIELDS: [&str; 3] = ["version", "uid", "user"];

type Decoded = (OsmId, FeatureRecord);

/// Decodes an .osm document into a store keyed by feature id.
///
/// A document without an `osm` root yields an empty store. Records missing a
/// required field are logged and skipped; malformed XML fails the whole load.
pub fn load(buffer: &[u8]) -> Result<DocumentStore> {
    let mut store = DocumentStore::new();
    let root = match tree::parse(buffer)? {
        Some(root) if root.name == "osm" => root,
        Some(root) => {
            warn!(root = root.name.as_str(); "No osm data in this document");
            return Ok(store);
        }
        None => {
            warn!("No data in this document");
            return Ok(store);
        }
    };

    let decoders: [(&str, fn(&Element) -> Result<Decoded>); 2] =
        [("node", decode_node), ("way", decode_way)];

    let mut skipped = 0_usize;
    for (kind, decode) in decoders {
        for element in root.children_named(kind) {
            match decode(element) {
                Ok((id, record)) => {
                    store.insert(id, record);
                }
                Err(err) if err.is_record_level() => {
                    let message = err.to_string();
                    warn!(element = kind, err = message.as_str(); "Skipping malformed record");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    info!(features = store.len(), skipped = skipped; "Loaded document");
    Ok(store)
}

fn required<'a>(element: &'a Element, kind: &'static str, field: &'static str) -> Result<&'a str> {
    element
        .attr(field)
        .ok_or(Error::MissingField { element: kind, field })
}

fn parse_id(value: &str, field: &'static str) -> Result<OsmId> {
    value.trim().parse().map_err(|_| Error::InvalidValue {
        field,
        value: value.to_string(),
    })
}

fn truncate(value: &str) -> String {
    value.chars().take(COORD_PRECISION).collect()
}

fn metadata(element: &Element, attrs: &mut Attrs) {
    if let Some(timestamp) = element.attr("timestamp") {
        attrs.insert("timestamp".to_string(), timestamp.into());
    }
    for field in METADATA_FIELDS {
        if let Some(value) = element.attr(field) {
            let value = match value.parse::<i64>() {
                Ok(number) if field != "user" => AttrValue::Int(number),
                _ => AttrValue::from(value),
            };
            attrs.insert(field.to_string(), value);
        }
    }
}

fn decode_tags(element: &Element) -> Result<Tags> {
    let mut tags = Tags::new();
    for tag in element.children_named("tag") {
        let key = required(tag, "tag", "k")?;
        let value = tag.attr("v").map(|value| value.trim().to_string());
        tags.insert(key.to_string(), value);
    }
    Ok(tags)
}

fn decode_node(element: &Element) -> Result<Decoded> {
    let id = parse_id(required(element, "node", "id")?, "id")?;
    let lat = required(element, "node", "lat")?;
    let lon = required(element, "node", "lon")?;

    let mut attrs = Attrs::new();
    attrs.insert("id".to_string(), AttrValue::Int(id));
    attrs.insert("lat".to_string(), truncate(lat).into());
    attrs.insert("lon".to_string(), truncate(lon).into());
    metadata(element, &mut attrs);

    let record = FeatureRecord {
        kind: FeatureKind::Node,
        attrs,
        tags: decode_tags(element)?,
    };
    Ok((id, record))
}

fn decode_way(element: &Element) -> Result<Decoded> {
    let id = parse_id(required(element, "way", "id")?, "id")?;
    let refs = element
        .children_named("nd")
        .iter()
        .map(|nd| parse_id(required(nd, "nd", "ref")?, "ref"))
        .collect::<Result<Vec<_>>>()?;

    let mut attrs = Attrs::new();
    attrs.insert("id".to_string(), AttrValue::Int(id));
    metadata(element, &mut attrs);

    let record = FeatureRecord {
        kind: FeatureKind::Way { refs },
        attrs,
        tags: decode_tags(element)?,
    };
    Ok((id, record))
}
