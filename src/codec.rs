//! Conversion between feature records and .osm XML text.

pub mod decode;
pub mod encode;
pub mod escape;
pub mod tree;

pub use decode::load;
pub use encode::{Encoder, FIXME_WARNING};
pub use escape::make_tag;
