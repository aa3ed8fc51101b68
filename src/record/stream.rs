//! Lazy record streams over a [`Resource`].

use super::decoder::RecordDecoder;
use super::resource::Resource;
use super::schema::RecordSchema;
use super::source::{read_full, FixedSource, LineSource, RecordSource};
use super::text::TextSchema;
use super::Record;
use crate::error::{CdmError, Result};
use bytes::Bytes;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lazy, resettable iteration over decoded records.
///
/// `has_next` may block on I/O. `next_record` is only valid right after
/// `has_next` returned true. Once the backing resource is closed every call
/// fails with [`CdmError::ResourceClosed`].
pub trait RecordStream {
    /// Record type produced.
    type Item;

    /// Check if another record is available, reading ahead if needed.
    fn has_next(&mut self) -> Result<bool>;

    /// Take the record found by the last `has_next`.
    fn next_record(&mut self) -> Result<Self::Item>;

    /// Rewind to the first record.
    fn reset(&mut self) -> Result<()>;

    /// Number of records returned since the last reset, which is the 0-based
    /// index the next record will have.
    fn current_index(&self) -> u64;

    /// Read every remaining record.
    fn read_all(&mut self) -> Result<Vec<Self::Item>> {
        let mut out = Vec::new();
        while self.has_next()? {
            out.push(self.next_record()?);
        }
        Ok(out)
    }
}

/// A type-erased record stream.
pub type BoxedStream = Box<dyn RecordStream<Item = Record>>;

/// Predicate used to filter a full scan.
pub type RecordFilter = Box<dyn Fn(&Record) -> bool>;

fn take_pending(pending: &mut Option<Record>) -> Result<Record> {
    pending
        .take()
        .ok_or(CdmError::StreamState("next_record called without a successful has_next"))
}

/// Full forward scan of a [`RecordSource`], optionally filtered.
pub struct SequenceStream<S> {
    resource: Resource,
    source: S,
    filter: Option<RecordFilter>,
    pending: Option<Record>,
    index: u64,
}

impl SequenceStream<LineSource<BufReader<File>>> {
    /// Scan text lines of `resource` with its own file handle.
    pub fn lines(resource: &Resource, schema: Arc<TextSchema>) -> Result<Self> {
        let source = LineSource::new(BufReader::new(resource.open_handle()?), schema);
        Ok(Self::new(resource.clone(), source))
    }
}

impl SequenceStream<FixedSource<BufReader<File>>> {
    /// Scan fixed-size binary records of `resource` with its own file handle.
    pub fn fixed(resource: &Resource, schema: Arc<RecordSchema>) -> Result<Self> {
        let source = FixedSource::new(BufReader::new(resource.open_handle()?), schema);
        Ok(Self::new(resource.clone(), source))
    }
}

impl<S: RecordSource> SequenceStream<S> {
    /// Stream all records of `source`, which reads from `resource`.
    pub fn new(resource: Resource, source: S) -> Self {
        Self {
            resource,
            source,
            filter: None,
            pending: None,
            index: 0,
        }
    }

    /// Only yield records accepted by `filter`.
    pub fn with_filter(mut self, filter: impl Fn(&Record) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }
}

impl<S: RecordSource> RecordStream for SequenceStream<S> {
    type Item = Record;

    fn has_next(&mut self) -> Result<bool> {
        self.resource.check_open()?;
        if self.pending.is_some() {
            return Ok(true);
        }
        while let Some((_, record)) = self.source.read_record()? {
            if self.filter.as_ref().map_or(true, |keep| keep(&record)) {
                self.pending = Some(record);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next_record(&mut self) -> Result<Record> {
        self.resource.check_open()?;
        let record = take_pending(&mut self.pending)?;
        self.index += 1;
        Ok(record)
    }

    fn reset(&mut self) -> Result<()> {
        self.resource.check_open()?;
        self.source.seek(0)?;
        self.pending = None;
        self.index = 0;
        Ok(())
    }

    fn current_index(&self) -> u64 {
        self.index
    }
}

impl<S> fmt::Debug for SequenceStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceStream")
            .field("path", &self.resource.path())
            .field("filtered", &self.filter.is_some())
            .field("index", &self.index)
            .finish()
    }
}

/// Exactly `count` records starting at a byte offset, typically from an
/// index entry. Independent of any other cursor on the same resource.
#[derive(Debug)]
pub struct KeyedStream<S> {
    resource: Resource,
    source: S,
    offset: u64,
    count: u64,
    served: u64,
    pending: Option<Record>,
}

impl KeyedStream<LineSource<BufReader<File>>> {
    /// Keyed access to text lines of `resource` with its own file handle.
    pub fn lines(resource: &Resource, schema: Arc<TextSchema>, offset: u64, count: u64) -> Result<Self> {
        let source = LineSource::new(BufReader::new(resource.open_handle()?), schema);
        Self::new(resource.clone(), source, offset, count)
    }
}

impl KeyedStream<FixedSource<BufReader<File>>> {
    /// Keyed access to binary records of `resource` with its own file handle.
    pub fn fixed(resource: &Resource, schema: Arc<RecordSchema>, offset: u64, count: u64) -> Result<Self> {
        let source = FixedSource::new(BufReader::new(resource.open_handle()?), schema);
        Self::new(resource.clone(), source, offset, count)
    }
}

impl<S: RecordSource> KeyedStream<S> {
    /// Position `source` at `offset` and serve `count` records.
    pub fn new(resource: Resource, mut source: S, offset: u64, count: u64) -> Result<Self> {
        source.seek(offset)?;
        Ok(Self {
            resource,
            source,
            offset,
            count,
            served: 0,
            pending: None,
        })
    }

    /// Number of records this stream serves.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<S: RecordSource> RecordStream for KeyedStream<S> {
    type Item = Record;

    fn has_next(&mut self) -> Result<bool> {
        self.resource.check_open()?;
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.served >= self.count {
            return Ok(false);
        }
        match self.source.read_record()? {
            Some((_, record)) => {
                self.pending = Some(record);
                Ok(true)
            },
            None => Err(CdmError::UnexpectedEof {
                expected: self.count,
                found: self.served,
            }),
        }
    }

    fn next_record(&mut self) -> Result<Record> {
        self.resource.check_open()?;
        let record = take_pending(&mut self.pending)?;
        self.served += 1;
        Ok(record)
    }

    fn reset(&mut self) -> Result<()> {
        self.resource.check_open()?;
        self.source.seek(self.offset)?;
        self.pending = None;
        self.served = 0;
        Ok(())
    }

    fn current_index(&self) -> u64 {
        self.served
    }
}

/// Framing of a block-structured binary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    /// Bytes in each block header.
    pub header_size: usize,
    /// Offset within the header of the big-endian `u32` record count.
    pub count_offset: usize,
    /// Bytes every header must start with, if any.
    pub magic: Option<Vec<u8>>,
}

/// Block-at-a-time reader: header, then `count` records read in one go and
/// served through a [`RecordDecoder`].
pub struct BlockStream {
    resource: Resource,
    reader: BufReader<File>,
    schema: Arc<RecordSchema>,
    layout: BlockLayout,
    block: Option<RecordDecoder>,
    next_in_block: usize,
    pending: Option<Record>,
    finished: bool,
    index: u64,
}

impl BlockStream {
    /// Open a stream over `resource` with its own file handle.
    pub fn open(resource: &Resource, schema: Arc<RecordSchema>, layout: BlockLayout) -> Result<Self> {
        if layout.count_offset + 4 > layout.header_size {
            return Err(CdmError::InvalidSchema(format!(
                "record count at byte {} does not fit a {} byte header",
                layout.count_offset, layout.header_size
            )));
        }
        if let Some(magic) = &layout.magic {
            if magic.len() > layout.header_size {
                return Err(CdmError::InvalidSchema(format!(
                    "{} byte magic does not fit a {} byte header",
                    magic.len(),
                    layout.header_size
                )));
            }
        }
        Ok(Self {
            reader: BufReader::new(resource.open_handle()?),
            resource: resource.clone(),
            schema,
            layout,
            block: None,
            next_in_block: 0,
            pending: None,
            finished: false,
            index: 0,
        })
    }

    // Read the next non-empty block. Returns false at end of data.
    fn read_block(&mut self) -> Result<bool> {
        loop {
            let mut header = vec![0u8; self.layout.header_size];
            let got = read_full(&mut self.reader, &mut header)?;
            if got == 0 {
                return Ok(false);
            }
            if got < header.len() {
                warn!(
                    "Truncated block header in {} ({} of {} bytes)",
                    self.resource.path().display(),
                    got,
                    header.len()
                );
                return Ok(false);
            }
            if let Some(magic) = &self.layout.magic {
                if !header.starts_with(magic) {
                    return Err(CdmError::parse(
                        "block header",
                        String::from_utf8_lossy(&header[..magic.len()]),
                    ));
                }
            }
            let at = self.layout.count_offset;
            let count = u32::from_be_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]]) as usize;
            if count == 0 {
                debug!("Skipping empty block");
                continue;
            }

            // Never trust the header count further than the bytes left in the file.
            let remaining = self.resource.len()?.saturating_sub(self.reader.stream_position()?);
            let wanted = (count as u64).checked_mul(self.schema.record_size() as u64);
            let size = match wanted.filter(|&n| n <= remaining).map(usize::try_from) {
                Some(Ok(size)) => size,
                _ => {
                    warn!(
                        "Truncated block in {}: header declares {} records, only {} bytes left",
                        self.resource.path().display(),
                        count,
                        remaining
                    );
                    return Ok(false);
                },
            };
            let mut data = vec![0u8; size];
            let got = read_full(&mut self.reader, &mut data)?;
            if got < data.len() {
                warn!(
                    "Truncated block in {}: header declares {} records, {} bytes missing",
                    self.resource.path().display(),
                    count,
                    data.len() - got
                );
                return Ok(false);
            }
            debug!("Read block of {} records", count);
            self.block = Some(RecordDecoder::new(Arc::clone(&self.schema), Bytes::from(data)));
            self.next_in_block = 0;
            return Ok(true);
        }
    }
}

impl RecordStream for BlockStream {
    type Item = Record;

    fn has_next(&mut self) -> Result<bool> {
        self.resource.check_open()?;
        if self.pending.is_some() {
            return Ok(true);
        }
        while !self.finished {
            if let Some(block) = &self.block {
                if self.next_in_block < block.len() {
                    self.pending = Some(Record::Binary(block.record(self.next_in_block)?));
                    self.next_in_block += 1;
                    return Ok(true);
                }
            }
            match self.read_block() {
                Ok(true) => {},
                Ok(false) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                },
            }
        }
        Ok(false)
    }

    fn next_record(&mut self) -> Result<Record> {
        self.resource.check_open()?;
        let record = take_pending(&mut self.pending)?;
        self.index += 1;
        Ok(record)
    }

    fn reset(&mut self) -> Result<()> {
        self.resource.check_open()?;
        self.reader.seek(SeekFrom::Start(0))?;
        self.block = None;
        self.next_in_block = 0;
        self.pending = None;
        self.finished = false;
        self.index = 0;
        Ok(())
    }

    fn current_index(&self) -> u64 {
        self.index
    }
}

impl fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStream")
            .field("path", &self.resource.path())
            .field("layout", &self.layout)
            .field("index", &self.index)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, Value};
    use crate::record::ByteOrder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn u16_schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::builder(ByteOrder::BigEndian)
                .field("n", DataType::UShort, 0)
                .build()
                .unwrap(),
        )
    }

    fn layout() -> BlockLayout {
        BlockLayout {
            header_size: 8,
            count_offset: 4,
            magic: Some(b"BLK0".to_vec()),
        }
    }

    fn block(values: &[u16]) -> Vec<u8> {
        let mut out = b"BLK0".to_vec();
        out.extend_from_slice(&(values.len() as u32).to_be_bytes());
        for v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    fn numbers(stream: &mut impl RecordStream<Item = Record>) -> Vec<u16> {
        stream
            .read_all()
            .unwrap()
            .iter()
            .map(|r| r.as_binary().unwrap().get::<u16>("n").unwrap())
            .collect()
    }

    #[test]
    fn test_block_stream_skips_empty_blocks() {
        let mut bytes = block(&[1, 2]);
        bytes.extend(block(&[]));
        bytes.extend(block(&[3]));
        let file = write_temp(&bytes);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = BlockStream::open(&resource, u16_schema(), layout()).unwrap();
        assert_eq!(numbers(&mut stream), vec![1, 2, 3]);
        assert_eq!(stream.current_index(), 3);
        stream.reset().unwrap();
        assert_eq!(stream.current_index(), 0);
        assert_eq!(numbers(&mut stream), vec![1, 2, 3]);
    }

    #[test]
    fn test_block_stream_truncated_tail_ends_stream() {
        let mut bytes = block(&[7]);
        let mut partial = block(&[8, 9]);
        partial.truncate(partial.len() - 1);
        bytes.extend(partial);
        let file = write_temp(&bytes);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = BlockStream::open(&resource, u16_schema(), layout()).unwrap();
        assert_eq!(numbers(&mut stream), vec![7]);
        assert!(!stream.has_next().unwrap());
    }

    #[test]
    fn test_block_count_beyond_file_ends_stream() {
        let mut bytes = block(&[4]);
        let mut corrupt = block(&[5]);
        corrupt[4..8].copy_from_slice(&0x0FFF_FFFFu32.to_be_bytes());
        bytes.extend(corrupt);
        let file = write_temp(&bytes);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = BlockStream::open(&resource, u16_schema(), layout()).unwrap();
        assert_eq!(numbers(&mut stream), vec![4]);
        assert!(!stream.has_next().unwrap());
    }

    #[test]
    fn test_magic_longer_than_header_rejected() {
        let file = write_temp(&block(&[1]));
        let resource = Resource::open(file.path()).unwrap();
        let layout = BlockLayout {
            magic: Some(b"TOO-LONG-MAGIC".to_vec()),
            ..layout()
        };
        assert!(matches!(
            BlockStream::open(&resource, u16_schema(), layout),
            Err(CdmError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_next_without_has_next() {
        let file = write_temp(&block(&[1]));
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = BlockStream::open(&resource, u16_schema(), layout()).unwrap();
        assert!(matches!(stream.next_record(), Err(CdmError::StreamState(_))));
        assert!(stream.has_next().unwrap());
        assert!(stream.has_next().unwrap());
        assert!(stream.next_record().is_ok());
        assert!(matches!(stream.next_record(), Err(CdmError::StreamState(_))));
    }

    #[test]
    fn test_keyed_stream_runs_out_early() {
        let file = write_temp(&[0, 1, 0, 2]);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = KeyedStream::fixed(&resource, u16_schema(), 2, 3).unwrap();
        assert!(stream.has_next().unwrap());
        assert_eq!(
            stream.next_record().unwrap().value("n").unwrap(),
            Value::UShort(2)
        );
        assert!(matches!(
            stream.has_next(),
            Err(CdmError::UnexpectedEof { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_closed_resource_fails_every_call() {
        let file = write_temp(&[0, 1, 0, 2]);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = SequenceStream::fixed(&resource, u16_schema()).unwrap();
        assert!(stream.has_next().unwrap());
        resource.close();
        assert!(matches!(stream.has_next(), Err(CdmError::ResourceClosed { .. })));
        assert!(matches!(stream.next_record(), Err(CdmError::ResourceClosed { .. })));
        assert!(matches!(stream.reset(), Err(CdmError::ResourceClosed { .. })));
    }

    #[test]
    fn test_filtered_scan() {
        let file = write_temp(&[0, 1, 0, 2, 0, 3, 0, 4]);
        let resource = Resource::open(file.path()).unwrap();
        let mut stream = SequenceStream::fixed(&resource, u16_schema())
            .unwrap()
            .with_filter(|r| r.value("n").ok().and_then(|v| v.as_i64()).unwrap_or(0) % 2 == 0);
        assert_eq!(numbers(&mut stream), vec![2, 4]);
    }
}
