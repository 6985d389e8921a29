//! Reads and writes the .osm XML produced for field data collection.
//!
//! [`codec::Encoder`] turns [`FeatureRecord`]s into `<node>`/`<way>` elements,
//! [`codec::load`] decodes a document into a [`DocumentStore`], and
//! [`OsmFile`] frames encoded elements inside an `<osm>` document.

pub mod clock;
pub mod codec;
pub mod config;
pub mod data;
pub mod errors;
pub mod osm_file;

pub use crate::data::osm::{AttrValue, FeatureKind, FeatureRecord, OsmId};
pub use crate::data::DocumentStore;
pub use crate::errors::{Error, Result};
pub use crate::osm_file::OsmFile;
