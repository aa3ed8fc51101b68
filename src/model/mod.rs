//! Hierarchical data model: scopes, dimensions, variables and attributes.
//!
//! Trees are assembled with [`ScopeBuilder`] / [`VariableBuilder`] and then
//! frozen into a [`NamespaceTree`], which has no mutating operations.

mod attribute;
mod builder;
mod dimension;
pub mod enhance;
mod scope;
mod value;
mod variable;

pub use attribute::{
    Attribute, AttributeContainer, AttributeSet, AttributeSnapshot, RESERVED_PREFIXES,
};
pub use builder::ScopeBuilder;
pub use dimension::{parse_dimension_string, DimLength, DimSpec, Dimension};
pub use enhance::Enhancement;
pub use scope::{DatasetContext, NamespaceTree, Scope, ScopeId};
pub use value::{DataType, Value};
pub use variable::{AxisType, EnumTypedef, Variable, VariableBuilder, AXIS_TYPE_ATTRIBUTE};
