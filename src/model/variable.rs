//! Variables, coordinate axes and enumeration typedefs.

use super::attribute::{Attribute, AttributeSet, AttributeSnapshot};
use super::dimension::{parse_dimension_string, DimLength, DimSpec, Dimension};
use super::scope::{DatasetContext, NamespaceTree, ScopeId};
use super::value::DataType;
use crate::error::{CdmError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Reserved attribute recording the axis role of a coordinate variable.
pub const AXIS_TYPE_ATTRIBUTE: &str = "_CoordinateAxisType";

/// Georeferencing role of a coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisType {
    /// Time.
    Time,
    /// Model run time.
    RunTime,
    /// Ensemble member.
    Ensemble,
    /// Latitude.
    Lat,
    /// Longitude.
    Lon,
    /// Projection x.
    GeoX,
    /// Projection y.
    GeoY,
    /// Generic vertical.
    GeoZ,
    /// Height above a surface.
    Height,
    /// Pressure level.
    Pressure,
}

impl AxisType {
    /// Canonical axis name.
    pub fn name(self) -> &'static str {
        match self {
            AxisType::Time => "Time",
            AxisType::RunTime => "RunTime",
            AxisType::Ensemble => "Ensemble",
            AxisType::Lat => "Lat",
            AxisType::Lon => "Lon",
            AxisType::GeoX => "GeoX",
            AxisType::GeoY => "GeoY",
            AxisType::GeoZ => "GeoZ",
            AxisType::Height => "Height",
            AxisType::Pressure => "Pressure",
        }
    }

    /// Parse a canonical axis name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [AxisType; 10] = [
            AxisType::Time,
            AxisType::RunTime,
            AxisType::Ensemble,
            AxisType::Lat,
            AxisType::Lon,
            AxisType::GeoX,
            AxisType::GeoY,
            AxisType::GeoZ,
            AxisType::Height,
            AxisType::Pressure,
        ];
        ALL.into_iter().find(|a| a.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for AxisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named mapping from integer codes to labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTypedef {
    name: String,
    values: BTreeMap<i32, String>,
}

impl EnumTypedef {
    /// Create an enumeration typedef.
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = (i32, String)>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Typedef name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label for a code.
    pub fn lookup(&self, code: i32) -> Option<&str> {
        self.values.get(&code).map(String::as_str)
    }

    /// All code/label pairs in code order.
    pub fn values(&self) -> impl Iterator<Item = (i32, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// A typed multidimensional variable in a built tree.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    data_type: DataType,
    dimensions: Vec<Dimension>,
    attributes: AttributeSnapshot,
    axis: Option<AxisType>,
    members: Vec<Variable>,
    scope: ScopeId,
    context: Arc<DatasetContext>,
}

impl Variable {
    /// Short name, unique within the owning scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Ordered dimensions of this variable's shape.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Lengths of each dimension.
    pub fn shape(&self) -> Vec<DimLength> {
        self.dimensions.iter().map(Dimension::length).collect()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Total element count, `None` if any dimension has variable length or
    /// the product overflows `usize`.
    pub fn element_count(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d.length().fixed()?))
    }

    /// Dimension string that rebuilds this shape (`"time x 12 *"`).
    pub fn dimensions_string(&self) -> String {
        self.dimensions
            .iter()
            .map(|d| match (d.is_shared(), d.name()) {
                (true, Some(name)) => name.to_string(),
                _ => d.length().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Attributes of this variable.
    pub fn attributes(&self) -> &AttributeSnapshot {
        &self.attributes
    }

    /// Axis role, if this is a coordinate axis.
    pub fn axis_type(&self) -> Option<AxisType> {
        self.axis
    }

    /// Check if this variable is a coordinate axis.
    pub fn is_axis(&self) -> bool {
        self.axis.is_some()
    }

    /// Member variables of a structure or sequence.
    pub fn members(&self) -> &[Variable] {
        &self.members
    }

    /// Find a member variable by name.
    pub fn find_member(&self, name: &str) -> Option<&Variable> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Check if this variable is a sequence (instance count found by iteration).
    pub fn is_sequence(&self) -> bool {
        self.data_type == DataType::Sequence
    }

    /// Scope that owns this variable.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Dataset this variable reads from.
    pub fn context(&self) -> &Arc<DatasetContext> {
        &self.context
    }

    /// Mutable builder reproducing this variable, keeping its context.
    pub fn to_builder(&self) -> VariableBuilder {
        VariableBuilder {
            name: self.name.clone(),
            data_type: self.data_type,
            dims: self.dimensions.iter().map(DimSpec::from_dimension).collect(),
            attributes: self.attributes.to_mutable(),
            axis: self.axis,
            members: self.members.iter().map(Variable::to_builder).collect(),
            context: Some(Arc::clone(&self.context)),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.axis == other.axis
            && self.attributes == other.attributes
            && self.members == other.members
            && self.dimensions.len() == other.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(&other.dimensions)
                .all(|(a, b)| a.detached() == b.detached())
    }
}

/// Mutable builder for a [`Variable`].
#[derive(Debug, Clone)]
pub struct VariableBuilder {
    name: String,
    data_type: DataType,
    dims: Vec<DimSpec>,
    attributes: AttributeSet,
    axis: Option<AxisType>,
    members: Vec<VariableBuilder>,
    context: Option<Arc<DatasetContext>>,
}

impl VariableBuilder {
    /// Create a scalar variable builder.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            attributes: AttributeSet::new(name.clone()),
            name,
            data_type,
            dims: Vec::new(),
            axis: None,
            members: Vec::new(),
            context: None,
        }
    }

    /// Create a sequence builder (instance count discovered by iteration).
    pub fn sequence(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Sequence)
    }

    /// Create a coordinate axis builder.
    pub fn axis(name: impl Into<String>, data_type: DataType, axis: AxisType) -> Self {
        Self::new(name, data_type).with_axis(axis)
    }

    /// Set the shape from a dimension string.
    pub fn with_dimensions(mut self, spec: &str) -> Result<Self> {
        self.dims = parse_dimension_string(spec)?;
        Ok(self)
    }

    /// Set the shape from already parsed specs.
    pub fn with_dim_specs(mut self, dims: Vec<DimSpec>) -> Self {
        self.dims = dims;
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<super::Value>) -> Self {
        self.attributes.add(Attribute::new(name, value));
        self
    }

    /// Mark as a coordinate axis.
    pub fn with_axis(mut self, axis: AxisType) -> Self {
        self.axis = Some(axis);
        self.attributes
            .add(Attribute::new(AXIS_TYPE_ATTRIBUTE, axis.name()));
        self
    }

    /// Add a member variable to a structure or sequence.
    pub fn with_member(mut self, member: VariableBuilder) -> Result<Self> {
        self.add_member(member)?;
        Ok(self)
    }

    /// Bind the variable to a specific dataset context.
    pub fn with_context(mut self, context: Arc<DatasetContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Add a member variable, failing on duplicate names.
    pub fn add_member(&mut self, member: VariableBuilder) -> Result<()> {
        if self.find_member(&member.name).is_some() {
            return Err(CdmError::duplicate("Member", member.name, self.name.clone()));
        }
        self.members.push(member);
        Ok(())
    }

    /// Find a member builder by name.
    pub fn find_member(&self, name: &str) -> Option<&VariableBuilder> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Add or replace an attribute.
    pub fn add_attribute(&mut self, att: Attribute) -> Option<Attribute> {
        self.attributes.add(att)
    }

    /// Mutable access to the attribute set.
    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the variable.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.attributes.set_container_name(self.name.clone());
    }

    /// Element type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Unresolved shape.
    pub fn dim_specs(&self) -> &[DimSpec] {
        &self.dims
    }

    /// Context this builder is bound to, if any.
    pub fn context(&self) -> Option<&Arc<DatasetContext>> {
        self.context.as_ref()
    }

    /// Name of the first variable (self or member) referencing shared dimension `dim`.
    pub(crate) fn referencing(&self, dim: &str) -> Option<&str> {
        if self
            .dims
            .iter()
            .any(|d| matches!(d, DimSpec::Shared(n) if n == dim))
        {
            return Some(&self.name);
        }
        self.members.iter().find_map(|m| m.referencing(dim))
    }

    /// Resolve dimensions against the tree and freeze.
    ///
    /// The context is only filled in when the builder has none, so variables
    /// prepared against another dataset keep pointing at it.
    pub(crate) fn materialize(
        self,
        tree: &NamespaceTree,
        scope: ScopeId,
        context: &Arc<DatasetContext>,
    ) -> Result<Variable> {
        let context = self.context.unwrap_or_else(|| Arc::clone(context));
        let dimensions = self
            .dims
            .iter()
            .map(|spec| match spec {
                DimSpec::Shared(name) => tree
                    .resolve_dimension(scope, name)
                    .cloned()
                    .ok_or_else(|| CdmError::UnknownDimension {
                        name: name.clone(),
                        scope: tree.scope(scope).full_name(),
                    }),
                DimSpec::Anonymous(n) => Ok(Dimension::anonymous(*n)),
                DimSpec::VariableLength => Ok(Dimension::variable_length()),
            })
            .collect::<Result<Vec<_>>>()?;
        let members = self
            .members
            .into_iter()
            .map(|m| m.materialize(tree, scope, &context))
            .collect::<Result<Vec<_>>>()?;
        Ok(Variable {
            attributes: self.attributes.to_immutable(),
            name: self.name,
            data_type: self.data_type,
            dimensions,
            axis: self.axis,
            members,
            scope,
            context,
        })
    }
}
