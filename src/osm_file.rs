use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, Encoder};
use crate::data::osm::{FeatureRecord, OsmId};
use crate::data::DocumentStore;
use crate::errors::{Error, Result};

pub const XML_DECLARATION: &str = "<?xml version='1.0' encoding='UTF-8'?>";
pub const OSM_OPEN: &str = r#"<osm version="0.6" generator="osm-fieldwork 0.3">"#;
pub const OSM_CLOSE: &str = "</osm>";

/// An .osm output document plus the features loaded into it.
///
/// The header is written as soon as a destination is attached. The closing
/// `</osm>` is written exactly once, by [`OsmFile::close`] or, failing that,
/// when the value is dropped. A detached file has no destination and is only
/// good for encoding and decoding in memory.
pub struct OsmFile<W: Write, C: Clock = SystemClock> {
    file: Option<W>,
    encoder: Encoder<C>,
    data: DocumentStore,
}

impl<W: Write> OsmFile<W, SystemClock> {
    pub fn new(dest: W) -> Result<Self> {
        OsmFile::with_encoder(dest, Encoder::new())
    }
}

impl OsmFile<io::Sink, SystemClock> {
    pub fn detached() -> Self {
        OsmFile {
            file: None,
            encoder: Encoder::new(),
            data: DocumentStore::new(),
        }
    }
}

impl OsmFile<BufWriter<File>, SystemClock> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        OsmFile::create_with(path, Encoder::new())
    }
}

impl<C: Clock> OsmFile<BufWriter<File>, C> {
    pub fn create_with(path: impl AsRef<Path>, encoder: Encoder<C>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!(path = path.display().to_string().as_str(); "Opened output file");
        OsmFile::with_encoder(BufWriter::new(file), encoder)
    }

    /// Runs `body` against a fresh file at `path` and closes it afterwards.
    /// See [`OsmFile::scoped`].
    pub fn with_file<T, F>(path: impl AsRef<Path>, encoder: Encoder<C>, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let file = OsmFile::create_with(path, encoder)?;
        file.run_scoped(body)
    }
}

impl<W: Write, C: Clock> OsmFile<W, C> {
    pub fn with_encoder(mut dest: W, encoder: Encoder<C>) -> Result<Self> {
        writeln!(dest, "{XML_DECLARATION}")?;
        writeln!(dest, "{OSM_OPEN}")?;
        dest.flush()?;
        Ok(OsmFile {
            file: Some(dest),
            encoder,
            data: DocumentStore::new(),
        })
    }

    /// Frames `dest`, runs `body` against it and closes it afterwards, whether
    /// or not `body` succeeded. An error from `body` takes precedence over one
    /// from closing, which is only logged.
    pub fn scoped<T, F>(dest: W, encoder: Encoder<C>, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        OsmFile::with_encoder(dest, encoder)?.run_scoped(body)
    }

    fn run_scoped<T, F>(mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let outcome = body(&mut self);
        let closed = self.close();
        match (outcome, closed) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(close_err)) => {
                let message = close_err.to_string();
                error!(err = message.as_str(); "Failed to close output file after an earlier error");
                Err(err)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::Closed)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Writes each entry on its own line.
    pub fn write<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref())?;
        }
        Ok(())
    }

    /// Encodes `record` with this file's encoder and writes it out.
    pub fn write_feature(&mut self, record: &FeatureRecord, modified: bool) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        let element = self.encoder.encode(record, modified)?;
        self.write_line(&element)
    }

    pub fn encoder_mut(&mut self) -> &mut Encoder<C> {
        &mut self.encoder
    }

    /// Writes the footer and hands back the destination.
    pub fn close(mut self) -> Result<Option<W>> {
        self.finish()
    }

    fn finish(&mut self) -> Result<Option<W>> {
        let Some(mut file) = self.file.take() else {
            return Ok(None);
        };
        debug!("Closing output file");
        writeln!(file, "{OSM_CLOSE}")?;
        file.flush()?;
        Ok(Some(file))
    }

    /// Decodes `buffer` and merges its features into this file's store.
    pub fn load(&mut self, buffer: &[u8]) -> Result<&DocumentStore> {
        let loaded = codec::load(buffer)?;
        self.data.extend(loaded);
        Ok(&self.data)
    }

    /// Reads a whole .osm file and merges its features into this file's store.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&DocumentStore> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len();
        let mut buffer = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
        File::open(path)?.read_to_end(&mut buffer)?;
        info!(path = path.display().to_string().as_str(), bytes = size; "Read OSM file");
        self.load(&buffer)
    }

    pub fn data(&self) -> &DocumentStore {
        &self.data
    }

    pub fn get_feature(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.data.get_feature(id)
    }

    pub fn get_node(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.data.get_node(id)
    }

    pub fn get_way(&self, id: OsmId) -> Result<&FeatureRecord> {
        self.data.get_way(id)
    }

    pub fn get_fields(&self) -> BTreeSet<String> {
        self.data.get_fields()
    }

    pub fn dump<O: Write>(&self, out: &mut O) -> Result<()> {
        Ok(self.data.dump(out)?)
    }
}

impl<W: Write, C: Clock> Drop for OsmFile<W, C> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            let message = err.to_string();
            error!(err = message.as_str(); "Failed to write closing element");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    /// Shares its buffer so output can be inspected after the file is dropped.
    #[derive(Clone, Default)]
    struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    /// Fails every write once the shared flag is set.
    struct Breaking(std::rc::Rc<std::cell::Cell<bool>>);

    impl Write for Breaking {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0.get() {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn fixed_encoder() -> Encoder<FixedClock> {
        let time = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .unwrap();
        Encoder::with_clock(FixedClock(time))
    }

    #[test]
    fn header_is_written_on_construction() {
        let buf = SharedBuf::default();
        let file = OsmFile::new(buf.clone()).unwrap();
        assert_eq!(buf.contents(), format!("{XML_DECLARATION}\n{OSM_OPEN}\n"));
        assert!(!file.is_closed());
    }

    #[test]
    fn footer_is_written_once() {
        let buf = SharedBuf::default();
        let mut file = OsmFile::new(buf.clone()).unwrap();
        file.write(["a", "b"]).unwrap();
        file.write_line("c").unwrap();
        file.close().unwrap();

        assert_eq!(
            buf.contents(),
            format!("{XML_DECLARATION}\n{OSM_OPEN}\na\nb\nc\n{OSM_CLOSE}\n")
        );
    }

    #[test]
    fn dropping_closes_the_document() {
        let buf = SharedBuf::default();
        {
            let mut file = OsmFile::new(buf.clone()).unwrap();
            file.write_line("x").unwrap();
        }
        assert!(buf.contents().ends_with("x\n</osm>\n"));
        assert_eq!(buf.contents().matches(OSM_CLOSE).count(), 1);
    }

    #[test]
    fn close_returns_the_destination() {
        let file = OsmFile::new(Vec::new()).unwrap();
        let out = file.close().unwrap().unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("</osm>\n"));
    }

    #[test]
    fn writes_after_a_failure_still_close() {
        let broken = std::rc::Rc::new(std::cell::Cell::new(false));
        let mut file = OsmFile::new(Breaking(broken.clone())).unwrap();
        broken.set(true);
        assert!(matches!(file.write_line("lost"), Err(Error::Io(_))));
        assert!(matches!(file.close(), Err(Error::Io(_))));
    }

    #[test]
    fn body_error_wins_over_failed_footer() {
        let broken = std::rc::Rc::new(std::cell::Cell::new(false));
        let result = OsmFile::scoped(Breaking(broken.clone()), fixed_encoder(), |file| {
            broken.set(true);
            file.write_feature(&FeatureRecord::node(), false)
        });

        assert!(matches!(
            result,
            Err(Error::MissingField { element: "node", field: "lat" })
        ));
    }

    #[test]
    fn failed_footer_surfaces_after_successful_body() {
        let broken = std::rc::Rc::new(std::cell::Cell::new(false));
        let result = OsmFile::scoped(Breaking(broken.clone()), fixed_encoder(), |_| {
            broken.set(true);
            Ok(())
        });

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn scoped_frames_and_closes() {
        let buf = SharedBuf::default();
        let written = OsmFile::scoped(buf.clone(), fixed_encoder(), |file| {
            file.write_line("x")?;
            Ok(1)
        })
        .unwrap();

        assert_eq!(written, 1);
        assert_eq!(
            buf.contents(),
            format!("{XML_DECLARATION}\n{OSM_OPEN}\nx\n{OSM_CLOSE}\n")
        );
    }

    #[test]
    fn detached_file_rejects_writes() {
        let mut file = OsmFile::detached();
        assert!(file.is_closed());
        assert!(matches!(file.write_line("x"), Err(Error::Closed)));
        let way = FeatureRecord::way(vec![1]);
        assert!(matches!(file.write_feature(&way, false), Err(Error::Closed)));
        assert_eq!(file.encoder_mut().next_id(), Some(-1));
    }

    #[test]
    fn written_features_decode_back() {
        let buf = SharedBuf::default();
        let mut file = OsmFile::with_encoder(buf.clone(), fixed_encoder()).unwrap();
        let node = FeatureRecord::node()
            .with_attr("id", 1)
            .with_attr("lat", "12.3456789")
            .with_attr("lon", "-1.234567");
        file.write_feature(&node, false).unwrap();
        file.write_feature(&FeatureRecord::way(vec![1]).with_tag("a", Some("b")), true)
            .unwrap();
        file.close().unwrap();

        let mut reader = OsmFile::detached();
        let store = reader.load(buf.contents().as_bytes()).unwrap();
        assert_eq!(store.len(), 2);

        let way = reader.get_way(-1).unwrap();
        assert_eq!(way.refs(), &[1]);
        assert_eq!(
            way.tags.get("fixme"),
            Some(&Some(codec::FIXME_WARNING.to_string()))
        );
        let fields: Vec<_> = reader.get_fields().into_iter().collect();
        assert_eq!(fields, vec!["a", "fixme"]);
    }

    #[test]
    fn loads_merge_into_one_store() {
        let mut file = OsmFile::detached();
        file.load(br#"<osm><node id="1" lat="1" lon="1"/></osm>"#).unwrap();
        file.load(br#"<osm><node id="2" lat="2" lon="2"/></osm>"#).unwrap();
        assert_eq!(file.data().len(), 2);
        assert!(matches!(file.get_feature(3), Err(Error::NotFound(3))));
    }
}
