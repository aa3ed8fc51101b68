//! Shared and anonymous dimensions.

use super::scope::ScopeId;
use crate::error::{CdmError, Result};
use std::fmt;

/// Length of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimLength {
    /// Known number of elements.
    Fixed(usize),
    /// Length varies per instance (sequences, ragged arrays).
    Variable,
}

impl DimLength {
    /// Fixed length, or `None` for variable length.
    pub fn fixed(self) -> Option<usize> {
        match self {
            DimLength::Fixed(n) => Some(n),
            DimLength::Variable => None,
        }
    }
}

impl fmt::Display for DimLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimLength::Fixed(n) => write!(f, "{}", n),
            DimLength::Variable => f.write_str("*"),
        }
    }
}

/// A dimension: a shared named length owned by one scope, or an anonymous
/// length private to one variable's shape.
///
/// Two shared dimensions are the same dimension when their names and owning
/// scopes match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimension {
    name: Option<String>,
    length: DimLength,
    shared: bool,
    unlimited: bool,
    owner: Option<ScopeId>,
}

impl Dimension {
    /// Create a shared dimension of fixed length.
    pub fn shared(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: Some(name.into()),
            length: DimLength::Fixed(length),
            shared: true,
            unlimited: false,
            owner: None,
        }
    }

    /// Create an anonymous dimension of fixed length.
    pub fn anonymous(length: usize) -> Self {
        Self {
            name: None,
            length: DimLength::Fixed(length),
            shared: false,
            unlimited: false,
            owner: None,
        }
    }

    /// Create an anonymous variable-length dimension.
    pub fn variable_length() -> Self {
        Self {
            name: None,
            length: DimLength::Variable,
            shared: false,
            unlimited: false,
            owner: None,
        }
    }

    /// Mark this dimension as the unlimited (record) dimension.
    pub fn with_unlimited(mut self, unlimited: bool) -> Self {
        self.unlimited = unlimited;
        self
    }

    /// Dimension name, `None` when anonymous.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Dimension length.
    pub fn length(&self) -> DimLength {
        self.length
    }

    /// Fixed length, treating variable length as zero.
    pub fn len(&self) -> usize {
        self.length.fixed().unwrap_or(0)
    }

    /// Check if the fixed length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if this is a shared dimension.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Check if this is the unlimited dimension.
    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Check if this dimension has variable length.
    pub fn is_variable_length(&self) -> bool {
        self.length == DimLength::Variable
    }

    /// Scope that declares this dimension, once the tree is built.
    pub fn owner(&self) -> Option<ScopeId> {
        self.owner
    }

    pub(crate) fn with_owner(mut self, owner: ScopeId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub(crate) fn detached(&self) -> Self {
        Self {
            owner: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if self.unlimited => write!(f, "{} = UNLIMITED // ({})", name, self.length),
            Some(name) => write!(f, "{} = {}", name, self.length),
            None => write!(f, "{}", self.length),
        }
    }
}

/// One token of a dimension string, before shared names are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimSpec {
    /// Reference to a shared dimension, resolved upward from the owning scope.
    Shared(String),
    /// Anonymous fixed length.
    Anonymous(usize),
    /// Anonymous variable length (`*`).
    VariableLength,
}

impl DimSpec {
    /// Spec that reproduces an existing dimension.
    pub fn from_dimension(dim: &Dimension) -> Self {
        match (dim.name(), dim.length()) {
            (Some(name), _) if dim.is_shared() => DimSpec::Shared(name.to_string()),
            (_, DimLength::Fixed(n)) => DimSpec::Anonymous(n),
            (_, DimLength::Variable) => DimSpec::VariableLength,
        }
    }
}

/// Parse a whitespace separated dimension string.
///
/// Each token is `*`, a decimal length, or a shared dimension name. Names
/// must not start with a digit or sign and must not contain `/`. An empty
/// string is a scalar.
pub fn parse_dimension_string(spec: &str) -> Result<Vec<DimSpec>> {
    spec.split_whitespace()
        .map(|token| {
            if token == "*" {
                return Ok(DimSpec::VariableLength);
            }
            let first = token.chars().next().unwrap_or(' ');
            if first.is_ascii_digit() || first == '-' || first == '+' {
                return token
                    .parse::<usize>()
                    .map(DimSpec::Anonymous)
                    .map_err(|_| malformed(token, spec));
            }
            if token.contains('/') || token.contains('*') {
                return Err(malformed(token, spec));
            }
            Ok(DimSpec::Shared(token.to_string()))
        })
        .collect()
}

fn malformed(token: &str, spec: &str) -> CdmError {
    CdmError::MalformedDimension {
        token: token.to_string(),
        spec: spec.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_tokens() {
        let specs = parse_dimension_string("time  * 12 lat").unwrap();
        assert_eq!(
            specs,
            vec![
                DimSpec::Shared("time".into()),
                DimSpec::VariableLength,
                DimSpec::Anonymous(12),
                DimSpec::Shared("lat".into()),
            ]
        );
    }

    #[test]
    fn test_parse_scalar() {
        assert!(parse_dimension_string("").unwrap().is_empty());
        assert!(parse_dimension_string("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["-3", "1.5", "12abc", "a/b", "x*"] {
            let err = parse_dimension_string(bad).unwrap_err();
            assert!(err.is_configuration(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_spec_round_trip_from_dimension() {
        assert_eq!(
            DimSpec::from_dimension(&Dimension::shared("x", 10)),
            DimSpec::Shared("x".into())
        );
        assert_eq!(DimSpec::from_dimension(&Dimension::anonymous(3)), DimSpec::Anonymous(3));
        assert_eq!(
            DimSpec::from_dimension(&Dimension::variable_length()),
            DimSpec::VariableLength
        );
    }
}
