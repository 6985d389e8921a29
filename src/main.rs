use std::env;
use std::io::{self, Write};

use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_fieldwork::clock::SystemClock;
use osm_fieldwork::codec::Encoder;
use osm_fieldwork::config::Config;
use osm_fieldwork::errors::Result;
use osm_fieldwork::OsmFile;

const DEFAULT_CONFIG_PATH: &str = "osm-fieldwork.json";

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    setup_logging(&config.log_level);
    info!(config = config_path.as_str(); "Loaded configuration");

    let mut osm = OsmFile::detached();
    if let Some(input_path) = &config.input_path {
        osm.load_file(input_path)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        osm.dump(&mut out)?;
        out.flush()?;
    }

    if let Some(output_path) = &config.output_path {
        let written = OsmFile::with_file(output_path, Encoder::with_clock(SystemClock), |file| {
            for (_, record) in osm.data().iter() {
                file.write_feature(record, config.modified)?;
            }
            Ok(osm.data().len())
        })?;
        info!(path = output_path.as_str(), features = written; "Wrote OSM file");
    }

    Ok(())
}
