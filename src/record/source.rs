//! Forward readers producing one record at a time with its byte offset.

use super::decoder::RecordData;
use super::schema::RecordSchema;
use super::text::TextSchema;
use super::Record;
use crate::error::Result;
use bytes::Bytes;
use std::io::{BufRead, ErrorKind, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::warn;

/// Sequential reader of records from a seekable byte source.
pub trait RecordSource {
    /// Read the next record and the byte offset it started at, `None` at end.
    fn read_record(&mut self) -> Result<Option<(u64, Record)>>;

    /// Position the source at a byte offset previously returned by `read_record`.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current byte offset.
    fn position(&self) -> u64;
}

/// Text lines parsed through a [`TextSchema`].
///
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    schema: Arc<TextSchema>,
    pos: u64,
    line: String,
}

impl<R: BufRead + Seek> LineSource<R> {
    /// Create a source positioned at the reader's start.
    pub fn new(reader: R, schema: Arc<TextSchema>) -> Self {
        Self {
            reader,
            schema,
            pos: 0,
            line: String::new(),
        }
    }

    /// Read the next data line without parsing it.
    pub fn read_line(&mut self) -> Result<Option<(u64, &str)>> {
        loop {
            let start = self.pos;
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.pos += n as u64;
            let trimmed = self.line.trim_end_matches(['\n', '\r']);
            if trimmed.starts_with('#') || trimmed.trim().is_empty() {
                continue;
            }
            let len = trimmed.len();
            return Ok(Some((start, &self.line[..len])));
        }
    }
}

impl<R: BufRead + Seek> RecordSource for LineSource<R> {
    fn read_record(&mut self) -> Result<Option<(u64, Record)>> {
        let schema = Arc::clone(&self.schema);
        match self.read_line()? {
            Some((offset, line)) => Ok(Some((offset, Record::Text(schema.parse_line(line)?)))),
            None => Ok(None),
        }
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// Back-to-back fixed-size binary records.
#[derive(Debug)]
pub struct FixedSource<R> {
    reader: R,
    schema: Arc<RecordSchema>,
    pos: u64,
}

impl<R: Read + Seek> FixedSource<R> {
    /// Create a source positioned at the reader's start.
    pub fn new(reader: R, schema: Arc<RecordSchema>) -> Self {
        Self {
            reader,
            schema,
            pos: 0,
        }
    }
}

impl<R: Read + Seek> RecordSource for FixedSource<R> {
    fn read_record(&mut self) -> Result<Option<(u64, Record)>> {
        let mut buf = vec![0u8; self.schema.record_size()];
        let filled = read_full(&mut self.reader, &mut buf)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < buf.len() {
            warn!(
                "Ignoring {} trailing bytes at offset {}, a record needs {}",
                filled,
                self.pos,
                buf.len()
            );
            self.pos += filled as u64;
            return Ok(None);
        }
        let offset = self.pos;
        self.pos += filled as u64;
        let data = RecordData::new(Arc::clone(&self.schema), Bytes::from(buf))?;
        Ok(Some((offset, Record::Binary(data))))
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// Read until `buf` is full or the reader is exhausted; returns bytes read.
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, Value};
    use crate::record::ByteOrder;
    use std::io::Cursor;

    #[test]
    fn test_lines_skip_comments_and_blanks() {
        let text = "# header\nAAA 1\n\n   \r\nBBB 2\r\n";
        let schema = Arc::new(TextSchema::from_format("3,6i", &["key", "n"]).unwrap());
        let mut source = LineSource::new(Cursor::new(text), schema);

        let (offset, rec) = source.read_record().unwrap().unwrap();
        assert_eq!(offset, 9);
        assert_eq!(rec.value("key").unwrap(), Value::Text("AAA".into()));

        let (offset, rec) = source.read_record().unwrap().unwrap();
        assert_eq!(offset, 21);
        assert_eq!(rec.value("n").unwrap(), Value::Int(2));
        assert!(source.read_record().unwrap().is_none());

        source.seek(9).unwrap();
        let (_, rec) = source.read_record().unwrap().unwrap();
        assert_eq!(rec.value("n").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_fixed_records_and_partial_tail() {
        let schema = Arc::new(
            RecordSchema::builder(ByteOrder::BigEndian)
                .field("n", DataType::UShort, 0)
                .build()
                .unwrap(),
        );
        let mut source = FixedSource::new(Cursor::new(vec![0, 1, 0, 2, 9]), schema);
        let (o1, r1) = source.read_record().unwrap().unwrap();
        let (o2, r2) = source.read_record().unwrap().unwrap();
        assert_eq!((o1, o2), (0, 2));
        assert_eq!(r1.value("n").unwrap(), Value::UShort(1));
        assert_eq!(r2.value("n").unwrap(), Value::UShort(2));
        assert!(source.read_record().unwrap().is_none());
    }
}
