//! Snapshot Loader
//!
//! Reads the binary snapshot written by a previous server and yields one
//! [`SnapshotRecord`] per stored string key.
//!
//! ## File Layout
//!
//! ```text
//! "REDIS0011"                        9-byte header
//! 0xFA <string> <string>             metadata entry (skipped), repeatable
//! 0xFE <length>                      database selector
//!   [0xFB <length> <length>]         resize hint (skipped)
//!   [0xFD <u32 LE secs>]             optional expiry, seconds since epoch
//!   [0xFC <u64 LE millis>]           optional expiry, millis since epoch
//!   0x00 <string key> <string value> one string record, repeatable
//! 0xFF                               end of file
//! ```
//!
//! Every `<length>` is a fixed 4-byte little-endian signed integer, and a
//! `<string>` is a `<length>` followed by that many raw bytes. The
//! variable-width length and integer encodings of the full format are not
//! supported.
//!
//! ## States
//!
//! ```text
//! Header ──> TopLevel ──0xFE──> InDatabase(opcode) ──record──> InDatabase(next)
//!              │  ▲                   │
//!              │  └──────0xFE─────────┤
//!              └──0xFF / EOF──> Done <┘ 0xFF
//! ```

use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, trace};

/// Magic bytes at the start of every snapshot
pub const HEADER: &[u8; 9] = b"REDIS0011";

/// The only supported value type
pub const VALUE_TYPE_STRING: u8 = 0x00;

/// Snapshot opcodes
pub mod opcode {
    pub const METADATA: u8 = 0xFA;
    pub const RESIZE_DB: u8 = 0xFB;
    pub const EXPIRE_MS: u8 = 0xFC;
    pub const EXPIRE_SECS: u8 = 0xFD;
    pub const SELECT_DB: u8 = 0xFE;
    pub const EOF: u8 = 0xFF;
}

/// Errors that abort a snapshot load.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid snapshot header: {0:?}")]
    InvalidHeader(String),

    #[error("unsupported opcode: {0:#04x}")]
    UnsupportedOpcode(u8),

    #[error("unsupported value type: {0:#04x}")]
    UnsupportedValueType(u8),

    #[error("invalid length: {0}")]
    InvalidLength(i32),

    /// The file ended in the middle of an item
    #[error("snapshot truncated while reading {0}")]
    Truncated(&'static str),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// One key recovered from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub key: Bytes,
    pub value: Bytes,
    /// Absolute expiry time, if the key had one
    pub expires_at: Option<SystemTime>,
}

/// Loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing read yet
    Header,
    /// Between sections, expecting an opcode
    TopLevel,
    /// Inside a database section; the opcode that starts the next item has
    /// already been read
    InDatabase(u8),
    Done,
}

/// Streams records out of a snapshot.
///
/// The reader yields `Ok(record)` for every record and stops after the end
/// marker. After an error it yields nothing more.
///
/// # Example
///
/// ```
/// use snapkv::snapshot::SnapshotReader;
///
/// let mut data = b"REDIS0011".to_vec();
/// data.push(0xFE);
/// data.extend_from_slice(&0i32.to_le_bytes());
/// data.push(0x00);
/// data.extend_from_slice(&3i32.to_le_bytes());
/// data.extend_from_slice(b"foo");
/// data.extend_from_slice(&3i32.to_le_bytes());
/// data.extend_from_slice(b"bar");
/// data.push(0xFF);
///
/// let records: Vec<_> = SnapshotReader::new(&data[..])
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(records.len(), 1);
/// assert_eq!(&records[0].key[..], b"foo");
/// ```
#[derive(Debug)]
pub struct SnapshotReader<R> {
    reader: R,
    state: State,
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::Header,
        }
    }

    /// Runs state transitions until a record is produced or the end is reached.
    fn advance(&mut self) -> Result<Option<SnapshotRecord>> {
        loop {
            match self.state {
                State::Header => {
                    self.read_header()?;
                    self.state = State::TopLevel;
                }
                State::TopLevel => {
                    self.state = match self.read_opcode_or_eof()? {
                        Some(op) => self.top_level(op)?,
                        None => {
                            trace!("Snapshot ended without end marker");
                            State::Done
                        }
                    };
                }
                State::InDatabase(op) if op == opcode::SELECT_DB || op == opcode::EOF => {
                    self.state = self.top_level(op)?;
                }
                State::InDatabase(op) => {
                    let record = self.read_record(op)?;
                    let next = self.read_byte("opcode after record")?;
                    self.state = State::InDatabase(next);
                    return Ok(Some(record));
                }
                State::Done => return Ok(None),
            }
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let mut header = [0u8; 9];
        self.read_exact(&mut header, "header")?;
        if &header != HEADER {
            return Err(SnapshotError::InvalidHeader(
                String::from_utf8_lossy(&header).into_owned(),
            ));
        }
        Ok(())
    }

    /// Handles an opcode outside of any record and returns the next state.
    fn top_level(&mut self, op: u8) -> Result<State> {
        match op {
            opcode::METADATA => {
                self.skip_string("metadata key")?;
                self.skip_string("metadata value")?;
                Ok(State::TopLevel)
            }
            opcode::SELECT_DB => {
                let index = self.read_length("database index")?;
                debug!(index, "Reading snapshot database");

                let mut next = self.read_byte("opcode after database selector")?;
                if next == opcode::RESIZE_DB {
                    self.read_length("hash table size")?;
                    self.read_length("expiry table size")?;
                    next = self.read_byte("opcode after resize hint")?;
                }
                Ok(State::InDatabase(next))
            }
            opcode::EOF => Ok(State::Done),
            other => Err(SnapshotError::UnsupportedOpcode(other)),
        }
    }

    /// Reads one record whose first byte, `op`, has already been consumed.
    fn read_record(&mut self, op: u8) -> Result<SnapshotRecord> {
        let (expires_at, value_type) = match op {
            opcode::EXPIRE_SECS => {
                let mut buf = [0u8; 4];
                self.read_exact(&mut buf, "expiry seconds")?;
                let secs = u64::from(u32::from_le_bytes(buf));
                let at = UNIX_EPOCH + Duration::from_secs(secs);
                (Some(at), self.read_byte("value type")?)
            }
            opcode::EXPIRE_MS => {
                let mut buf = [0u8; 8];
                self.read_exact(&mut buf, "expiry milliseconds")?;
                let millis = u64::from_le_bytes(buf);
                // Past the platform's representable time: treat as no expiry
                let at = UNIX_EPOCH.checked_add(Duration::from_millis(millis));
                (at, self.read_byte("value type")?)
            }
            other => (None, other),
        };

        if value_type != VALUE_TYPE_STRING {
            return Err(SnapshotError::UnsupportedValueType(value_type));
        }

        let key = self.read_string("key")?;
        let value = self.read_string("value")?;

        Ok(SnapshotRecord {
            key,
            value,
            expires_at,
        })
    }

    /// Reads a 4-byte little-endian length.
    fn read_length(&mut self, what: &'static str) -> Result<usize> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, what)?;
        let length = i32::from_le_bytes(buf);
        usize::try_from(length).map_err(|_| SnapshotError::InvalidLength(length))
    }

    fn read_string(&mut self, what: &'static str) -> Result<Bytes> {
        let length = self.read_length(what)?;
        let mut data = Vec::new();
        // Read through `take` so a bogus length cannot force a huge allocation.
        (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut data)?;
        if data.len() != length {
            return Err(SnapshotError::Truncated(what));
        }
        Ok(Bytes::from(data))
    }

    fn skip_string(&mut self, what: &'static str) -> Result<()> {
        let length = self.read_length(what)?;
        let skipped = io::copy(&mut (&mut self.reader).take(length as u64), &mut io::sink())?;
        if skipped != length as u64 {
            return Err(SnapshotError::Truncated(what));
        }
        Ok(())
    }

    fn read_byte(&mut self, what: &'static str) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf, what)?;
        Ok(buf[0])
    }

    /// Reads one opcode, or `None` if the input ends cleanly here.
    fn read_opcode_or_eof(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &'static str) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => SnapshotError::Truncated(what),
            _ => SnapshotError::Io(e),
        })
    }
}

impl<R: Read> Iterator for SnapshotReader<R> {
    type Item = Result<SnapshotRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

/// Loads every record from `<dir>/<dbfilename>`.
///
/// A missing file, or an empty `dbfilename`, is not an error and yields no
/// records.
pub fn load(dir: impl AsRef<Path>, dbfilename: &str) -> Result<Vec<SnapshotRecord>> {
    if dbfilename.is_empty() {
        return Ok(Vec::new());
    }
    load_file(dir.as_ref().join(dbfilename))
}

/// Loads every record from the snapshot at `path`.
///
/// A missing file yields no records.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<SnapshotRecord>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No snapshot file");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    SnapshotReader::new(BufReader::new(file)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds snapshot bytes for tests.
    pub(crate) struct SnapshotBuilder {
        buf: Vec<u8>,
    }

    impl SnapshotBuilder {
        pub(crate) fn new() -> Self {
            Self {
                buf: HEADER.to_vec(),
            }
        }

        pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
            self.buf.extend_from_slice(bytes);
            self
        }

        pub(crate) fn length(self, n: i32) -> Self {
            self.raw(&n.to_le_bytes())
        }

        pub(crate) fn string(self, s: &str) -> Self {
            self.length(s.len() as i32).raw(s.as_bytes())
        }

        pub(crate) fn metadata(self, key: &str, value: &str) -> Self {
            self.raw(&[opcode::METADATA]).string(key).string(value)
        }

        pub(crate) fn select_db(self, index: i32) -> Self {
            self.raw(&[opcode::SELECT_DB]).length(index)
        }

        pub(crate) fn resize_db(self, size: i32, expires: i32) -> Self {
            self.raw(&[opcode::RESIZE_DB]).length(size).length(expires)
        }

        pub(crate) fn record(self, key: &str, value: &str) -> Self {
            self.raw(&[VALUE_TYPE_STRING]).string(key).string(value)
        }

        pub(crate) fn record_expiring_ms(self, key: &str, value: &str, millis: u64) -> Self {
            self.raw(&[opcode::EXPIRE_MS])
                .raw(&millis.to_le_bytes())
                .record(key, value)
        }

        pub(crate) fn record_expiring_secs(self, key: &str, value: &str, secs: u32) -> Self {
            self.raw(&[opcode::EXPIRE_SECS])
                .raw(&secs.to_le_bytes())
                .record(key, value)
        }

        pub(crate) fn end(self) -> Self {
            self.raw(&[opcode::EOF])
        }

        pub(crate) fn build(self) -> Vec<u8> {
            self.buf
        }
    }

    fn read_all(data: Vec<u8>) -> Result<Vec<SnapshotRecord>> {
        SnapshotReader::new(Cursor::new(data)).collect()
    }

    fn plain(key: &str, value: &str) -> SnapshotRecord {
        SnapshotRecord {
            key: Bytes::from(key.to_string()),
            value: Bytes::from(value.to_string()),
            expires_at: None,
        }
    }

    #[test]
    fn test_single_record() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record("foo", "bar")
            .end()
            .build();

        assert_eq!(read_all(data).unwrap(), vec![plain("foo", "bar")]);
    }

    #[test]
    fn test_metadata_and_resize_hint_are_skipped() {
        let data = SnapshotBuilder::new()
            .metadata("redis-ver", "7.2.0")
            .metadata("redis-bits", "64")
            .select_db(0)
            .resize_db(2, 1)
            .record("a", "1")
            .record("b", "2")
            .end()
            .build();

        assert_eq!(
            read_all(data).unwrap(),
            vec![plain("a", "1"), plain("b", "2")]
        );
    }

    #[test]
    fn test_expiry_markers() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record_expiring_ms("ms", "v", 1_956_528_000_123)
            .record_expiring_secs("secs", "v", 1_956_528_000)
            .end()
            .build();

        let records = read_all(data).unwrap();
        assert_eq!(
            records[0].expires_at,
            Some(UNIX_EPOCH + Duration::from_millis(1_956_528_000_123))
        );
        assert_eq!(
            records[1].expires_at,
            Some(UNIX_EPOCH + Duration::from_secs(1_956_528_000))
        );
    }

    #[test]
    fn test_far_future_ms_expiry_is_accepted() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record_expiring_ms("k", "v", u64::MAX)
            .end()
            .build();

        let records = read_all(data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0].key[..], b"k");
        // Either a far-future instant or, where the clock cannot hold it, none
        assert!(records[0]
            .expires_at
            .map_or(true, |at| at > std::time::SystemTime::now()));
    }

    #[test]
    fn test_second_database_selector_continues() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record("a", "1")
            .select_db(1)
            .record("b", "2")
            .end()
            .build();

        assert_eq!(
            read_all(data).unwrap(),
            vec![plain("a", "1"), plain("b", "2")]
        );
    }

    #[test]
    fn test_empty_database_section() {
        let data = SnapshotBuilder::new().select_db(0).end().build();
        assert!(read_all(data).unwrap().is_empty());
    }

    #[test]
    fn test_trailing_bytes_after_end_marker_ignored() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record("foo", "bar")
            .end()
            .raw(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0])
            .build();

        assert_eq!(read_all(data).unwrap().len(), 1);
    }

    #[test]
    fn test_eof_at_top_level_is_accepted() {
        let data = SnapshotBuilder::new().metadata("k", "v").build();
        assert!(read_all(data).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_header() {
        let mut data = b"REDIS0009".to_vec();
        data.push(opcode::EOF);

        assert!(matches!(
            read_all(data),
            Err(SnapshotError::InvalidHeader(h)) if h == "REDIS0009"
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            read_all(b"REDIS".to_vec()),
            Err(SnapshotError::Truncated("header"))
        ));
    }

    #[test]
    fn test_unsupported_opcode() {
        let data = SnapshotBuilder::new().raw(&[0x42]).build();
        assert!(matches!(
            read_all(data),
            Err(SnapshotError::UnsupportedOpcode(0x42))
        ));
    }

    #[test]
    fn test_unsupported_value_type() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .raw(&[0x01])
            .string("list")
            .build();

        assert!(matches!(
            read_all(data),
            Err(SnapshotError::UnsupportedValueType(0x01))
        ));
    }

    #[test]
    fn test_negative_length() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .raw(&[VALUE_TYPE_STRING])
            .length(-5)
            .build();

        assert!(matches!(
            read_all(data),
            Err(SnapshotError::InvalidLength(-5))
        ));
    }

    #[test]
    fn test_truncated_value() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .raw(&[VALUE_TYPE_STRING])
            .string("foo")
            .length(10)
            .raw(b"bar")
            .build();

        assert!(matches!(
            read_all(data),
            Err(SnapshotError::Truncated("value"))
        ));
    }

    #[test]
    fn test_truncated_inside_database() {
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record("foo", "bar")
            .build();

        assert!(matches!(
            read_all(data),
            Err(SnapshotError::Truncated("opcode after record"))
        ));
    }

    #[test]
    fn test_reader_stops_after_error() {
        let data = SnapshotBuilder::new().raw(&[0x42]).build();
        let mut reader = SnapshotReader::new(Cursor::new(data));

        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "missing.rdb").unwrap().is_empty());
    }

    #[test]
    fn test_load_without_filename() {
        assert!(load("/nonexistent", "").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data = SnapshotBuilder::new()
            .select_db(0)
            .record("foo", "bar")
            .end()
            .build();
        std::fs::write(dir.path().join("dump.rdb"), data).unwrap();

        let records = load(dir.path(), "dump.rdb").unwrap();
        assert_eq!(records, vec![plain("foo", "bar")]);
    }
}
