use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::errors::Result;

#[derive(Debug, Deserialize, PartialEq)]
pub struct Config {
    /// .osm file to load and dump.
    #[serde(default)]
    pub input_path: Option<String>,
    /// When set, every loaded feature is re-encoded into this file.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Marks re-encoded features as pending validation.
    #[serde(default)]
    pub modified: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn from_json(json: &str) -> Result<Config> {
        Ok(serde_json::from_str(json)?)
    }
}
