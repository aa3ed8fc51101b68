use bytes::Bytes;
use cdmkit::model::{DataType, Value};
use cdmkit::record::{
    ByteOrder, RecordDecoder, RecordSchema, RecordStream, Resource, SequenceStream, TextSchema,
};
use cdmkit::CdmError;
use std::fs;
use std::sync::Arc;

fn pattern_schema(order: ByteOrder) -> Arc<RecordSchema> {
    let schema = RecordSchema::builder(order)
        .field("id", DataType::Int, 0)
        .field("level", DataType::Short, 4)
        .field("flag", DataType::Byte, 6)
        .array("codes", DataType::UByte, 7, 3)
        .record_size(12)
        .build()
        .unwrap();
    Arc::new(schema)
}

#[test]
fn raw_field_is_exact_buffer_slice() {
    let buf: Vec<u8> = (0..60u8).collect();
    let decoder = RecordDecoder::new(pattern_schema(ByteOrder::BigEndian), Bytes::from(buf.clone()));
    assert_eq!(decoder.len(), 5);
    for i in 0..decoder.len() {
        let base = decoder.base(i);
        assert_eq!(base, i * 12);
        for field in decoder.schema().fields() {
            let start = base + field.offset();
            let raw = decoder.raw_field(i, field.name()).unwrap();
            assert_eq!(&raw[..], &buf[start..start + field.size()], "record {} {}", i, field.name());
        }
    }
}

#[test]
fn byte_order_is_honored() {
    let mut buf = vec![0u8; 12];
    buf[0..4].copy_from_slice(&0x0102_0304i32.to_be_bytes());
    buf[4..6].copy_from_slice(&(-2i16).to_le_bytes());
    let be = RecordDecoder::new(pattern_schema(ByteOrder::BigEndian), Bytes::from(buf.clone()));
    let le = RecordDecoder::new(pattern_schema(ByteOrder::LittleEndian), Bytes::from(buf));
    assert_eq!(be.read::<i32>(0, "id").unwrap(), 0x0102_0304);
    assert_eq!(le.read::<i32>(0, "id").unwrap(), 0x0403_0201);
    assert_eq!(le.read::<i16>(0, "level").unwrap(), -2);
    assert!(matches!(
        be.read::<f32>(0, "id"),
        Err(CdmError::TypeMismatch { .. })
    ));
    assert!(matches!(
        be.record(1),
        Err(CdmError::RecordOutOfBounds { index: 1, len: 1 })
    ));
}

#[test]
fn raw_values_are_not_scaled() {
    let mut buf = vec![0u8; 12];
    buf[4..6].copy_from_slice(&(-150i16).to_be_bytes());
    buf[7..10].copy_from_slice(&[1, 2, 3]);
    let decoder = RecordDecoder::new(pattern_schema(ByteOrder::BigEndian), Bytes::from(buf));
    let record = decoder.record(0).unwrap();
    assert_eq!(record.value("level").unwrap(), Value::Short(-150));
    assert_eq!(
        record.value("codes").unwrap(),
        Value::Array(vec![Value::UByte(1), Value::UByte(2), Value::UByte(3)])
    );
}

#[test]
fn text_stream_reads_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obs.txt");
    fs::write(&path, "# header\nAAA  12\n\nBBB  -4\nCCC 100\n").unwrap();
    let schema = TextSchema::from_format("3,7i", &["station", "temp"])
        .unwrap()
        .derived("warm", "temp", |v| Ok(Value::Char(if v.as_i64().unwrap_or(0) > 10 { 'y' } else { 'n' })))
        .unwrap();
    let resource = Resource::open(&path).unwrap();
    let mut stream = SequenceStream::lines(&resource, Arc::new(schema)).unwrap();

    let records = stream.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(stream.current_index(), 3);
    assert_eq!(records[1].value("temp").unwrap(), Value::Int(-4));
    assert_eq!(records[2].value("warm").unwrap(), Value::Char('y'));
    assert!(!stream.has_next().unwrap());

    stream.reset().unwrap();
    assert_eq!(stream.current_index(), 0);
    assert!(stream.has_next().unwrap());
    assert_eq!(stream.next_record().unwrap().value("station").unwrap(), Value::Text("AAA".into()));
}

#[test]
fn next_without_has_next_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.txt");
    fs::write(&path, "A\n").unwrap();
    let schema = Arc::new(TextSchema::from_format("1", &["k"]).unwrap());
    let resource = Resource::open(&path).unwrap();
    let mut stream = SequenceStream::lines(&resource, schema).unwrap();
    assert!(matches!(stream.next_record(), Err(CdmError::StreamState(_))));
}

#[test]
fn closed_resource_fails_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, vec![0u8; 36]).unwrap();
    let resource = Resource::open(&path).unwrap();
    let mut stream = SequenceStream::fixed(&resource, pattern_schema(ByteOrder::BigEndian)).unwrap();
    assert!(stream.has_next().unwrap());
    resource.close();
    resource.close();
    assert!(resource.is_closed());
    assert!(matches!(stream.has_next(), Err(CdmError::ResourceClosed { .. })));
    assert!(matches!(stream.reset(), Err(CdmError::ResourceClosed { .. })));
}
