mod common;

use cdmkit::model::{AttributeContainer, Enhancement, Value};
use cdmkit::{CdmError, Dataset, RecordStream};
use common::Strike;
use std::fs;

#[test]
fn reads_strikes_across_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_lightning(
        dir.path(),
        &[
            vec![Strike::new(1000, 35_500, -97_250), Strike::new(1001, 35_600, -97_300)],
            vec![],
            vec![Strike::new(1002, 36_000, -98_000)],
        ],
    );
    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.format(), "NLDN");
    assert_eq!(dataset.sequences(), vec!["record"]);
    assert!(dataset.index().is_none());

    let mut stream = dataset.stream("record").unwrap();
    let records = stream.read_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(stream.current_index(), 3);
    let tsec: Vec<Value> = records.iter().map(|r| r.value("tsec").unwrap()).collect();
    assert_eq!(tsec, vec![Value::Int(1000), Value::Int(1001), Value::Int(1002)]);

    let first = records[0].as_binary().unwrap();
    assert_eq!(first.get::<i32>("lat").unwrap(), 35_500);
    assert_eq!(first.get::<i16>("sgnl").unwrap(), -150);
    assert_eq!(first.get::<i8>("chisqr").unwrap(), 9);

    stream.reset().unwrap();
    assert_eq!(stream.read_all().unwrap(), records);
}

#[test]
fn scale_comes_from_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_lightning(dir.path(), &[vec![Strike::new(0, 35_500, -97_250)]]);
    let dataset = Dataset::open(&path).unwrap();
    let seq = dataset.tree().root().find_variable("record").unwrap();
    let lat = seq.find_member("lat").unwrap();
    assert_eq!(
        lat.attributes().find_attribute("units").and_then(|a| a.string_value()),
        Some("degrees_north")
    );

    let record = dataset.stream("record").unwrap().read_all().unwrap().remove(0);
    let raw = record.value("lat").unwrap().as_f64().unwrap();
    assert_eq!(raw, 35_500.0);
    let physical = Enhancement::from_attributes(lat.attributes()).apply(raw);
    assert!((physical - 35.5).abs() < 1e-3);
}

#[test]
fn truncated_block_ends_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = common::lightning_bytes(&[
        vec![Strike::new(1, 0, 0)],
        vec![Strike::new(2, 0, 0), Strike::new(3, 0, 0)],
    ]);
    bytes.truncate(bytes.len() - 10);
    let path = dir.path().join("cut.nldn");
    fs::write(&path, bytes).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    let records = dataset.stream("record").unwrap().read_all().unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn bad_block_magic_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = common::lightning_bytes(&[vec![Strike::new(1, 0, 0)], vec![Strike::new(2, 0, 0)]]);
    let second_header = 84 + 28;
    bytes[second_header..second_header + 4].copy_from_slice(b"XXXX");
    let path = dir.path().join("bad.nldn");
    fs::write(&path, bytes).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    let mut stream = dataset.stream("record").unwrap();
    assert!(stream.has_next().unwrap());
    stream.next_record().unwrap();
    assert!(matches!(stream.has_next(), Err(CdmError::Parse { .. })));
}

#[test]
fn not_keyed() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_lightning(dir.path(), &[vec![Strike::new(1, 0, 0)]]);
    let dataset = Dataset::open(&path).unwrap();
    assert!(matches!(
        dataset.keyed_stream("record", "1"),
        Err(CdmError::NotFound { .. })
    ));
}

#[test]
fn oversized_block_count_ends_stream() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = common::lightning_bytes(&[vec![Strike::new(1, 0, 0)], vec![Strike::new(2, 0, 0)]]);
    let count_at = 84 + 28 + 8;
    bytes[count_at..count_at + 4].copy_from_slice(&0x0FFF_FFFFu32.to_be_bytes());
    let path = dir.path().join("huge.nldn");
    fs::write(&path, bytes).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    let mut stream = dataset.stream("record").unwrap();
    let records = stream.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value("tsec").unwrap(), Value::Int(1));
    assert!(!stream.has_next().unwrap());
}
