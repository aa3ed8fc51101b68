//! Lightning strike files (NLDN layout).
//!
//! The file is a series of blocks. Each block has an 84 byte header starting
//! with `NLDN` and holding a big-endian record count at byte 8, followed by
//! that many 28 byte big-endian strike records.

use super::FormatDecoder;
use crate::config::OpenOptions;
use crate::dataset::{Dataset, RecordAccess};
use crate::error::{CdmError, Result};
use crate::model::{
    Attribute, AxisType, DataType, DatasetContext, ScopeBuilder, VariableBuilder,
};
use crate::record::{
    BlockLayout, BlockStream, BoxedStream, ByteOrder, RecordSchema, Resource,
};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Leading bytes of every block header.
pub const MAGIC: &[u8] = b"NLDN";
/// Bytes per block header.
pub const HEADER_SIZE: usize = 84;
/// Offset of the record count within a header.
pub const COUNT_OFFSET: usize = 8;
/// Bytes per strike record.
pub const RECORD_SIZE: usize = 28;
/// Name of the strike sequence.
pub const SEQUENCE: &str = "record";

/// Decoder for NLDN strike files.
#[derive(Debug, Clone, Copy)]
pub struct LightningDecoder;

/// Byte layout of one strike record.
pub fn record_schema() -> Result<RecordSchema> {
    RecordSchema::builder(ByteOrder::BigEndian)
        .field("tsec", DataType::Int, 0)
        .field("nsec", DataType::Int, 4)
        .field("lat", DataType::Int, 8)
        .field("lon", DataType::Int, 12)
        .field("sgnl", DataType::Short, 18)
        .field("mult", DataType::Byte, 22)
        .field("fill", DataType::Byte, 23)
        .field("majorAxis", DataType::Byte, 24)
        .field("eccent", DataType::Byte, 25)
        .field("ellipseAngle", DataType::Byte, 26)
        .field("chisqr", DataType::Byte, 27)
        .record_size(RECORD_SIZE)
        .build()
}

/// Block framing of strike files.
pub fn block_layout() -> BlockLayout {
    BlockLayout {
        header_size: HEADER_SIZE,
        count_offset: COUNT_OFFSET,
        magic: Some(MAGIC.to_vec()),
    }
}

fn member(name: &str, data_type: DataType, long_name: &str, units: &str) -> VariableBuilder {
    let vb = VariableBuilder::new(name, data_type).with_attribute("long_name", long_name);
    if units.is_empty() {
        vb
    } else {
        vb.with_attribute("units", units)
    }
}

/// Namespace of a strike file.
pub fn build_namespace(context: DatasetContext) -> Result<ScopeBuilder> {
    let mut root = ScopeBuilder::root().with_context(context);
    root.add_attribute(Attribute::new("title", "NLDN Lightning Data"))?;
    root.add_attribute(Attribute::new("Conventions", "NLDN-CDM"))?;
    root.add_attribute(Attribute::new("CF:featureType", "point"))?;

    let strikes = VariableBuilder::sequence(SEQUENCE)
        .with_member(
            member("tsec", DataType::Int, "time of stroke", "seconds since 1970-01-01 00:00:00")
                .with_axis(AxisType::Time),
        )?
        .with_member(member("nsec", DataType::Int, "nanoseconds since tsec", "1.0e-9 s"))?
        .with_member(
            member("lat", DataType::Int, "latitude", "degrees_north")
                .with_attribute("scale_factor", 1.0e-3f32)
                .with_axis(AxisType::Lat),
        )?
        .with_member(
            member("lon", DataType::Int, "longitude", "degrees_east")
                .with_attribute("scale_factor", 1.0e-3f32)
                .with_axis(AxisType::Lon),
        )?
        .with_member(
            member(
                "sgnl",
                DataType::Short,
                "signal strength/polarity [150 NLDN measures ~= 30 kAmps]",
                "",
            )
            .with_attribute("scale_factor", 1.0e-1f32),
        )?
        .with_member(member("mult", DataType::Byte, "multiplicity [#strokes per flash]", ""))?
        .with_member(VariableBuilder::new("fill", DataType::Byte))?
        .with_member(member("majorAxis", DataType::Byte, "error ellipse semi-major axis", ""))?
        .with_member(member("eccent", DataType::Byte, "error ellipse eccentricity", ""))?
        .with_member(member(
            "ellipseAngle",
            DataType::Byte,
            "error ellipse axis angle of orientation",
            "degrees",
        ))?
        .with_member(member("chisqr", DataType::Byte, "chi-squared", ""))?;
    root.add_variable(strikes)?;
    Ok(root)
}

#[derive(Debug)]
struct LightningAccess {
    resource: Resource,
    schema: Arc<RecordSchema>,
}

impl RecordAccess for LightningAccess {
    fn sequences(&self) -> Vec<String> {
        vec![SEQUENCE.to_string()]
    }

    fn stream(&self, sequence: &str) -> Result<BoxedStream> {
        if sequence != SEQUENCE {
            return Err(CdmError::not_found(sequence));
        }
        let stream = BlockStream::open(&self.resource, Arc::clone(&self.schema), block_layout())?;
        Ok(Box::new(stream))
    }
}

impl FormatDecoder for LightningDecoder {
    fn id(&self) -> &'static str {
        "NLDN"
    }

    fn description(&self) -> &'static str {
        "National Lightning Detection Network"
    }

    fn is_valid_file(&self, path: &Path) -> bool {
        let mut head = [0u8; 4];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut head))
            .map(|_| head == MAGIC)
            .unwrap_or(false)
    }

    fn open(&self, path: &Path, _options: &OpenOptions) -> Result<Dataset> {
        let resource = Resource::open(path)?;
        let context = DatasetContext::new(path.display().to_string(), self.id());
        let tree = build_namespace(context)?.build()?;
        let access = LightningAccess {
            resource: resource.clone(),
            schema: Arc::new(record_schema()?),
        };
        Ok(Dataset::new(path, self.id(), tree, Box::new(access), vec![resource]))
    }
}
