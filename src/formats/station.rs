//! Monthly station archives (GHCN-M v3 layout).
//!
//! A dataset is a pair of column-text files sharing a base name:
//! `<base>.dat` holds one line per station-year with twelve monthly values,
//! `<base>.inv` holds one line per station. Data lines are grouped by
//! station, so a [`SecondaryIndex`] keyed by station id gives direct access
//! to one station's years.

use super::FormatDecoder;
use crate::config::OpenOptions;
use crate::dataset::{Dataset, RecordAccess};
use crate::error::{CdmError, Result};
use crate::index::{IndexBuilder, SecondaryIndex};
use crate::model::{
    Attribute, AxisType, DataType, DatasetContext, Dimension, ScopeBuilder, Value,
    VariableBuilder,
};
use crate::record::{
    BoxedStream, KeyedStream, LineSource, Record, Resource, SequenceStream, TextSchema,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Extension of the data file.
pub const DATA_EXT: &str = "dat";
/// Extension of the station catalog.
pub const CATALOG_EXT: &str = "inv";

/// Sequence of every data line.
pub const ALL_DATA: &str = "all_data";
/// Sequence of every station.
pub const STATIONS: &str = "station";
/// Per-station data nested in [`STATIONS`].
pub const STATION_DATA: &str = "stn_data";

const MONTHS: usize = 12;
const MONTH_STRIDE: usize = 8;
const MISSING: i32 = -9999;

/// Decoder for GHCN-M style archives.
#[derive(Debug, Clone, Copy)]
pub struct StationDecoder;

fn year_to_time(year: &Value) -> Result<Value> {
    match year.as_i64() {
        Some(y) => Ok(Value::Text(format!("{}-01-01T00:00:00Z", y))),
        None => Err(CdmError::parse("time", year.to_string())),
    }
}

// Digits 4-8 of the id are the WMO id when digits 9-11 are "000".
fn wmo_id(stnid: &Value) -> Result<Value> {
    let id = stnid
        .as_i64()
        .ok_or_else(|| CdmError::parse("wmoId", stnid.to_string()))?;
    let wmo = if id % 1000 == 0 {
        ((id / 1000) % 100_000) as i32
    } else {
        MISSING
    };
    Ok(Value::Int(wmo))
}

/// Column layout of data lines.
pub fn data_schema() -> Result<TextSchema> {
    let mut schema = TextSchema::from_format(
        "11L,15i,19,24i,25c,26c,27c",
        &["stnid", "year", "element", "value", "dm", "qc", "ds"],
    )?;
    for field in ["value", "dm", "qc", "ds"] {
        schema = schema.repeat(field, MONTHS, MONTH_STRIDE)?;
    }
    schema.derived("time", "year", year_to_time)
}

/// Column layout of catalog lines.
pub fn catalog_schema() -> Result<TextSchema> {
    TextSchema::from_format(
        "11L,20d,30d,37d,68,73i,74c,79i,81,83,85,87i,88c,90i,106,107c",
        &[
            "stnid",
            "lat",
            "lon",
            "elevation",
            "name",
            "grelev",
            "popClass",
            "popSize",
            "topoType",
            "vegType",
            "ocean",
            "oceanDist",
            "airportId",
            "townDist",
            "gridVegType",
            "popClassFromLights",
        ],
    )?
    .derived("wmoId", "stnid", wmo_id)
}

fn member(name: &str, data_type: DataType, dims: &str, long_name: &str) -> Result<VariableBuilder> {
    VariableBuilder::new(name, data_type)
        .with_dimensions(dims)
        .map(|v| v.with_attribute("long_name", long_name))
}

// Members shared by the flat data sequence and the nested per-station one.
fn monthly_members(seq: VariableBuilder) -> Result<VariableBuilder> {
    seq.with_member(
        member("year", DataType::Int, "", "year of the station record")?
            .with_attribute("units", "years since 0000-01-01T00:00"),
    )?
    .with_member(
        member("value", DataType::Int, "month", "monthly mean temperature")?
            .with_attribute("units", "Celsius")
            .with_attribute("scale_factor", 0.01f32)
            .with_attribute("missing_value", MISSING),
    )?
    .with_member(member("dm", DataType::Char, "month", "data management flag")?)?
    .with_member(member("qc", DataType::Char, "month", "quality control flag")?)?
    .with_member(member("ds", DataType::Char, "month", "data source flag")?)?
    .with_member(
        member("time", DataType::String, "", "starting time of the record")?
            .with_axis(AxisType::Time)
            .with_attribute("missing_value", "missing"),
    )
}

/// Namespace of a station archive.
pub fn build_namespace(context: DatasetContext) -> Result<ScopeBuilder> {
    let mut root = ScopeBuilder::root().with_context(context);
    root.add_dimension(Dimension::shared("month", MONTHS))?;
    root.add_attribute(Attribute::new(
        "title",
        "Version 3 of the GHCN-Monthly dataset of land surface mean temperatures",
    ))?;
    root.add_attribute(Attribute::new("Conventions", "CDM"))?;
    root.add_attribute(Attribute::new("CF:featureType", "timeSeries"))?;

    let all_data = VariableBuilder::sequence(ALL_DATA)
        .with_member(member("stnid", DataType::Long, "", "station id")?)?;
    root.add_variable(monthly_members(all_data)?)?;

    let missing = |name: &str, dt, long_name: &str, units: &str| -> Result<VariableBuilder> {
        Ok(member(name, dt, "", long_name)?
            .with_attribute("units", units)
            .with_attribute("missing_value", -9i32))
    };
    let stations = VariableBuilder::sequence(STATIONS)
        .with_member(member("stnid", DataType::Long, "", "station id")?)?
        .with_member(
            member("lat", DataType::Double, "", "latitude")?
                .with_attribute("units", "degrees_north")
                .with_axis(AxisType::Lat),
        )?
        .with_member(
            member("lon", DataType::Double, "", "longitude")?
                .with_attribute("units", "degrees_east")
                .with_axis(AxisType::Lon),
        )?
        .with_member(
            member("elevation", DataType::Double, "", "elevation")?
                .with_attribute("units", "m")
                .with_axis(AxisType::Height),
        )?
        .with_member(member("name", DataType::String, "", "station name")?)?
        .with_member(
            member("grelev", DataType::Int, "", "elevation from gridded terrain data")?
                .with_attribute("units", "m"),
        )?
        .with_member(member("popClass", DataType::Char, "", "population class")?)?
        .with_member(missing("popSize", DataType::Int, "population of the nearby town", "thousands of persons")?)?
        .with_member(member("topoType", DataType::String, "", "surrounding topography")?)?
        .with_member(member("vegType", DataType::String, "", "surrounding vegetation")?)?
        .with_member(member("ocean", DataType::String, "", "station is near lake or ocean")?)?
        .with_member(missing("oceanDist", DataType::Int, "distance to nearest ocean/lake", "km")?)?
        .with_member(member("airportId", DataType::Char, "", "airport station indicator")?)?
        .with_member(missing("townDist", DataType::Int, "distance from airport to town center", "km")?)?
        .with_member(member("gridVegType", DataType::String, "", "vegetation at nearest grid point")?)?
        .with_member(member("popClassFromLights", DataType::Char, "", "population class from night lights")?)?
        .with_member(
            member("wmoId", DataType::Int, "", "WMO station id")?.with_attribute("missing_value", MISSING),
        )?
        .with_member(monthly_members(VariableBuilder::sequence(STATION_DATA))?)?;
    root.add_variable(stations)?;
    Ok(root)
}

/// Data and catalog paths for any path of the pair.
pub fn companion_paths(path: &Path) -> (PathBuf, PathBuf) {
    (
        path.with_extension(DATA_EXT),
        path.with_extension(CATALOG_EXT),
    )
}

fn station_key(record: &Record) -> Result<String> {
    Ok(record.value("stnid")?.to_string())
}

/// Scan the data file (and catalog, for catalog offsets) into an index.
pub fn build_index(data: &Path, catalog: &Path) -> Result<SecondaryIndex> {
    let mut builder = IndexBuilder::new();
    let open = |path: &Path| File::open(path).map_err(|e| CdmError::file_open(path, e));

    let mut source = LineSource::new(BufReader::new(open(data)?), Arc::new(data_schema()?));
    builder.scan(&mut source, station_key)?;

    let schema = catalog_schema()?;
    let mut catalog_lines = LineSource::new(BufReader::new(open(catalog)?), Arc::new(schema.clone()));
    while let Some((offset, line)) = catalog_lines.read_line()? {
        let key = schema.parse_field(line, "stnid")?.to_string();
        if !builder.annotate_catalog(&key, offset) {
            warn!("Station {} has no data", key);
        }
    }
    Ok(builder.finish())
}

#[derive(Debug)]
struct StationAccess {
    data: Resource,
    catalog: Resource,
    data_schema: Arc<TextSchema>,
    catalog_schema: Arc<TextSchema>,
    index: Option<SecondaryIndex>,
}

impl StationAccess {
    fn scan_for(&self, resource: &Resource, schema: &Arc<TextSchema>, key: &str) -> Result<BoxedStream> {
        let key = key.to_string();
        let stream = SequenceStream::lines(resource, Arc::clone(schema))?
            .with_filter(move |r| station_key(r).map(|k| k == key).unwrap_or(false));
        Ok(Box::new(stream))
    }
}

impl RecordAccess for StationAccess {
    fn sequences(&self) -> Vec<String> {
        vec![
            ALL_DATA.to_string(),
            STATIONS.to_string(),
            format!("{}/{}", STATIONS, STATION_DATA),
        ]
    }

    fn stream(&self, sequence: &str) -> Result<BoxedStream> {
        match sequence {
            ALL_DATA => Ok(Box::new(SequenceStream::lines(&self.data, Arc::clone(&self.data_schema))?)),
            STATIONS => Ok(Box::new(SequenceStream::lines(
                &self.catalog,
                Arc::clone(&self.catalog_schema),
            )?)),
            other => Err(CdmError::not_found(other)),
        }
    }

    fn keyed_stream(&self, sequence: &str, key: &str) -> Result<BoxedStream> {
        let nested = format!("{}/{}", STATIONS, STATION_DATA);
        let (resource, schema, catalog) = match sequence {
            s if s == STATION_DATA || s == nested || s == ALL_DATA => (&self.data, &self.data_schema, false),
            STATIONS => (&self.catalog, &self.catalog_schema, true),
            other => return Err(CdmError::not_found(other)),
        };
        let Some(index) = &self.index else {
            return self.scan_for(resource, schema, key);
        };
        let entry = index.get(key);
        if catalog {
            // Stations without data lines never get an entry.
            return match entry.and_then(|e| e.catalog_offset) {
                Some(offset) => Ok(Box::new(KeyedStream::lines(resource, Arc::clone(schema), offset, 1)?)),
                None => self.scan_for(resource, schema, key),
            };
        }
        match entry {
            Some(entry) if entry.contiguous => Ok(Box::new(KeyedStream::lines(
                resource,
                Arc::clone(schema),
                entry.offset,
                entry.count,
            )?)),
            Some(_) => self.scan_for(resource, schema, key),
            // Every data key is indexed: a missing key has no records.
            None => Ok(Box::new(KeyedStream::lines(resource, Arc::clone(schema), 0, 0)?)),
        }
    }

    fn index(&self) -> Option<&SecondaryIndex> {
        self.index.as_ref()
    }
}

impl FormatDecoder for StationDecoder {
    fn id(&self) -> &'static str {
        "GHCNM"
    }

    fn description(&self) -> &'static str {
        "Global Historical Climatology Network Monthly"
    }

    fn is_valid_file(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some(DATA_EXT) | Some(CATALOG_EXT)) {
            return false;
        }
        let (data, catalog) = companion_paths(path);
        if !catalog.exists() {
            return false;
        }
        let Ok(file) = File::open(&data) else {
            return false;
        };
        let first = BufReader::new(file)
            .lines()
            .map_while(|l| l.ok())
            .find(|l| !l.starts_with('#') && !l.trim().is_empty());
        match first {
            Some(line) => line.len() >= 19 && line.chars().take(15).all(|c| c.is_ascii_digit()),
            None => false,
        }
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Dataset> {
        let (data_path, catalog_path) = companion_paths(path);
        let data = Resource::open(&data_path)?;
        let catalog = Resource::open(&catalog_path)?;
        let context = DatasetContext::new(data_path.display().to_string(), self.id());
        let tree = build_namespace(context)?.build()?;
        let index = SecondaryIndex::open_or_build(&data_path, &[&catalog_path], &options.index, || {
            build_index(&data_path, &catalog_path)
        })?;
        let access = StationAccess {
            data: data.clone(),
            catalog: catalog.clone(),
            data_schema: Arc::new(data_schema()?),
            catalog_schema: Arc::new(catalog_schema()?),
            index,
        };
        Ok(Dataset::new(data_path, self.id(), tree, Box::new(access), vec![data, catalog]))
    }
}
