//! NetCDF-3 and NetCDF-4/HDF5 files read through the C library.
//!
//! Only the namespace is mapped: groups become scopes, and dimensions,
//! variables and attributes are copied over with their types. Array data
//! stays in the file; there are no streamable sequences.

use super::FormatDecoder;
use crate::config::OpenOptions;
use crate::dataset::{Dataset, RecordAccess};
use crate::error::{CdmError, Result};
use crate::model::{
    Attribute, AxisType, DataType, DatasetContext, DimSpec, Dimension, ScopeBuilder, Value,
    VariableBuilder, AXIS_TYPE_ATTRIBUTE,
};
use crate::record::{BoxedStream, Resource};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const SIGNATURES: [&[u8]; 4] = [b"CDF\x01", b"CDF\x02", b"CDF\x05", b"\x89HDF"];

/// Decoder for netCDF files.
#[derive(Debug, Clone, Copy)]
pub struct NetcdfDecoder;

fn data_type(vartype: &NcVariableType) -> Option<DataType> {
    Some(match vartype {
        NcVariableType::Int(IntType::I8) => DataType::Byte,
        NcVariableType::Int(IntType::U8) => DataType::UByte,
        NcVariableType::Int(IntType::I16) => DataType::Short,
        NcVariableType::Int(IntType::U16) => DataType::UShort,
        NcVariableType::Int(IntType::I32) => DataType::Int,
        NcVariableType::Int(IntType::U32) => DataType::UInt,
        NcVariableType::Int(IntType::I64) => DataType::Long,
        NcVariableType::Int(IntType::U64) => DataType::ULong,
        NcVariableType::Float(FloatType::F32) => DataType::Float,
        NcVariableType::Float(FloatType::F64) => DataType::Double,
        NcVariableType::Char => DataType::Char,
        NcVariableType::String => DataType::String,
        NcVariableType::Compound(_) => DataType::Structure,
        _ => return None,
    })
}

fn attribute_value(value: AttributeValue) -> Value {
    match value {
        AttributeValue::Uchar(v) => Value::UByte(v),
        AttributeValue::Schar(v) => Value::Byte(v),
        AttributeValue::Ushort(v) => Value::UShort(v),
        AttributeValue::Short(v) => Value::Short(v),
        AttributeValue::Uint(v) => Value::UInt(v),
        AttributeValue::Int(v) => Value::Int(v),
        AttributeValue::Ulonglong(v) => Value::ULong(v),
        AttributeValue::Longlong(v) => Value::Long(v),
        AttributeValue::Float(v) => Value::Float(v),
        AttributeValue::Double(v) => Value::Double(v),
        AttributeValue::Str(v) => Value::Text(v),
        AttributeValue::Uchars(v) => v.into(),
        AttributeValue::Schars(v) => v.into(),
        AttributeValue::Ushorts(v) => v.into(),
        AttributeValue::Shorts(v) => v.into(),
        AttributeValue::Uints(v) => v.into(),
        AttributeValue::Ints(v) => v.into(),
        AttributeValue::Ulonglongs(v) => v.into(),
        AttributeValue::Longlongs(v) => v.into(),
        AttributeValue::Floats(v) => v.into(),
        AttributeValue::Doubles(v) => v.into(),
        AttributeValue::Strs(v) => v.into(),
    }
}

fn convert_attributes<'f>(attrs: impl Iterator<Item = netcdf::Attribute<'f>>) -> Vec<Attribute> {
    attrs
        .filter_map(|attr| match attr.value() {
            Ok(value) => Some(Attribute::new(attr.name(), attribute_value(value))),
            Err(e) => {
                warn!("Skipping attribute {}: {}", attr.name(), e);
                None
            },
        })
        .collect()
}

// Explicit `_CoordinateAxisType` wins over the CF `axis` letter.
fn axis_of(attrs: &[Attribute]) -> Option<AxisType> {
    let find = |name: &str| attrs.iter().find(|a| a.name() == name).and_then(|a| a.string_value());
    if let Some(axis) = find(AXIS_TYPE_ATTRIBUTE).and_then(AxisType::from_name) {
        return Some(axis);
    }
    match find("axis")? {
        "T" | "t" => Some(AxisType::Time),
        "X" | "x" => Some(AxisType::GeoX),
        "Y" | "y" => Some(AxisType::GeoY),
        "Z" | "z" => Some(AxisType::GeoZ),
        _ => None,
    }
}

fn convert_variable(var: &netcdf::Variable<'_>) -> Option<VariableBuilder> {
    let vartype = var.vartype();
    let Some(dt) = data_type(&vartype) else {
        warn!("Skipping variable {} of unsupported type {:?}", var.name(), vartype);
        return None;
    };
    let dims = var
        .dimensions()
        .iter()
        .map(|d| DimSpec::Shared(d.name()))
        .collect();
    let attrs = convert_attributes(var.attributes());
    let mut builder = VariableBuilder::new(var.name(), dt).with_dim_specs(dims);
    if let Some(axis) = axis_of(&attrs) {
        builder = builder.with_axis(axis);
    }
    for att in attrs {
        builder.add_attribute(att);
    }
    Some(builder)
}

fn fill_scope<'f>(
    scope: &mut ScopeBuilder,
    attrs: impl Iterator<Item = netcdf::Attribute<'f>>,
    dims: impl Iterator<Item = netcdf::Dimension<'f>>,
    vars: impl Iterator<Item = netcdf::Variable<'f>>,
) -> Result<()> {
    for att in convert_attributes(attrs) {
        scope.add_attribute(att)?;
    }
    for dim in dims {
        let is_unlimited = dim.is_unlimited();
        scope.add_dimension(Dimension::shared(dim.name(), dim.len()).with_unlimited(is_unlimited))?;
    }
    for var in vars {
        if let Some(builder) = convert_variable(&var) {
            scope.add_variable(builder)?;
        }
    }
    Ok(())
}

fn read_group(group: &netcdf::Group<'_>) -> Result<ScopeBuilder> {
    let mut scope = ScopeBuilder::new(group.name());
    fill_scope(&mut scope, group.attributes(), group.dimensions(), group.variables())?;
    for child in group.groups() {
        scope.add_scope(read_group(&child)?)?;
    }
    Ok(scope)
}

/// Map the structure of an open netCDF file onto a scope builder.
pub fn build_namespace(file: &netcdf::File, context: DatasetContext) -> Result<ScopeBuilder> {
    let mut root = ScopeBuilder::root().with_context(context);
    fill_scope(&mut root, file.attributes(), file.dimensions(), file.variables())?;
    // NetCDF-3 files have no groups and report an error here.
    if let Ok(groups) = file.groups() {
        for group in groups {
            root.add_scope(read_group(&group)?)?;
        }
    }
    Ok(root)
}

#[derive(Debug)]
struct NetcdfAccess;

impl RecordAccess for NetcdfAccess {
    fn sequences(&self) -> Vec<String> {
        Vec::new()
    }

    fn stream(&self, sequence: &str) -> Result<BoxedStream> {
        Err(CdmError::not_found(sequence))
    }
}

impl FormatDecoder for NetcdfDecoder {
    fn id(&self) -> &'static str {
        "netCDF"
    }

    fn description(&self) -> &'static str {
        "NetCDF classic and NetCDF-4/HDF5"
    }

    fn is_valid_file(&self, path: &Path) -> bool {
        let mut head = [0u8; 4];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut head))
            .map(|_| SIGNATURES.iter().any(|sig| head.starts_with(sig)))
            .unwrap_or(false)
    }

    fn open(&self, path: &Path, _options: &OpenOptions) -> Result<Dataset> {
        let resource = Resource::open(path)?;
        let file = netcdf::open(path)?;
        let context = DatasetContext::new(path.display().to_string(), self.id());
        let tree = build_namespace(&file, context)?.build()?;
        debug!("Mapped {} scopes from {}", tree.scope_count(), path.display());
        Ok(Dataset::new(path, self.id(), tree, Box::new(NetcdfAccess), vec![resource]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeContainer;

    #[test]
    fn test_groups_resolve_parent_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("time", 3).unwrap();
            file.add_attribute("title", "sample").unwrap();
            let mut t = file.add_variable::<f64>("time", &["time"]).unwrap();
            t.put_attribute("axis", "T").unwrap();
            let mut group = file.add_group("surface").unwrap();
            group.add_variable::<i32>("temp", &["time"]).unwrap();
        }

        assert!(NetcdfDecoder.is_valid_file(&path));
        let dataset = NetcdfDecoder.open(&path, &OpenOptions::default()).unwrap();
        let tree = dataset.tree();
        assert_eq!(
            tree.root().attributes().find_attribute("title").and_then(|a| a.string_value()),
            Some("sample")
        );
        let time = tree.root().find_variable("time").unwrap();
        assert_eq!(time.axis_type(), Some(AxisType::Time));
        let temp = tree.find_variable_by_path("surface/temp").unwrap();
        assert_eq!(temp.data_type(), DataType::Int);
        assert_eq!(temp.element_count(), Some(3));
        assert!(dataset.sequences().is_empty());
    }

    #[test]
    fn test_attribute_arrays() {
        assert_eq!(
            attribute_value(AttributeValue::Shorts(vec![1, 2])),
            Value::Array(vec![Value::Short(1), Value::Short(2)])
        );
    }
}
