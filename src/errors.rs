use std::{io, str::Utf8Error};

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

use crate::data::osm::OsmId;

#[derive(Debug, Error)]
pub enum Error {
    /// The input is not well-formed XML.
    #[error("parse error: {0}")]
    Parse(String),

    /// A record lacks an attribute its role requires.
    #[error("{element} is missing required field `{field}`")]
    MissingField {
        element: &'static str,
        field: &'static str,
    },

    /// An identifier or version could not be read as an integer.
    #[error("invalid value {value:?} for `{field}`")]
    InvalidValue { field: &'static str, value: String },

    #[error("no feature with id {0}")]
    NotFound(OsmId),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The negative-id allocator ran past `i64::MIN`.
    #[error("no placeholder identifiers left to allocate")]
    IdsExhausted,

    /// Write attempted on a released or absent destination.
    #[error("output destination is closed")]
    Closed,

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::Parse(value.to_string())
    }
}

impl Error {
    /// Errors that only concern one record and must not abort a batch decode.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Error::MissingField { .. } | Error::InvalidValue { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
