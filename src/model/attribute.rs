//! Named attributes and the ordered containers that hold them.
//!
//! [`AttributeSet`] is the mutable container used while a tree is being built;
//! [`AttributeSnapshot`] is its frozen counterpart stored on the built tree.
//! Both implement [`AttributeContainer`], so readers can be written once.

use super::value::Value;
use std::fmt;
use std::sync::Arc;

/// Attribute name prefixes reserved for format-internal bookkeeping.
pub const RESERVED_PREFIXES: &[&str] = &["_Coordinate", "_Netcdf4", "_Chunk"];

/// A named value attached to a scope or variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    value: Value,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Text value, if this is a string attribute.
    pub fn string_value(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Numeric value of the first element.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.elements().first().and_then(Value::as_f64)
    }

    /// Check if the name starts with a reserved prefix.
    pub fn is_reserved(&self) -> bool {
        RESERVED_PREFIXES.iter().any(|p| self.name.starts_with(p))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_text() {
            write!(f, "{} = \"{}\"", self.name, self.value)
        } else {
            write!(f, "{} = {}", self.name, self.value)
        }
    }
}

/// Read contract shared by mutable and frozen attribute containers.
pub trait AttributeContainer {
    /// Name of the owning entity.
    fn container_name(&self) -> &str;

    /// All attributes in insertion order.
    fn attributes(&self) -> &[Attribute];

    /// Find an attribute by exact name.
    fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().iter().find(|a| a.name == name)
    }

    /// Find an attribute by name, ignoring ASCII case.
    fn find_attribute_ignore_case(&self, name: &str) -> Option<&Attribute> {
        self.attributes()
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// String value of an attribute found ignoring case, else the default.
    fn find_string_ignore_case<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.find_attribute_ignore_case(name)
            .and_then(Attribute::string_value)
            .unwrap_or(default)
    }

    /// Number of attributes.
    fn len(&self) -> usize {
        self.attributes().len()
    }

    /// Check if there are no attributes.
    fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }

    /// Copy of the attributes whose names do not start with any of `prefixes`.
    fn filtered(&self, prefixes: &[&str]) -> AttributeSet {
        let kept = self
            .attributes()
            .iter()
            .filter(|a| !prefixes.iter().any(|p| a.name.starts_with(p)))
            .cloned()
            .collect();
        AttributeSet {
            name: self.container_name().to_string(),
            atts: kept,
        }
    }

    /// Attributes meant for users, hiding reserved bookkeeping entries.
    fn user_attributes(&self) -> AttributeSet {
        self.filtered(RESERVED_PREFIXES)
    }
}

/// Mutable, ordered, name-unique attribute container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    name: String,
    atts: Vec<Attribute>,
}

impl AttributeSet {
    /// Create an empty set owned by `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            atts: Vec::new(),
        }
    }

    /// Rename the owning entity.
    pub fn set_container_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Add an attribute, replacing one of the same name in place.
    ///
    /// Returns the replaced attribute, if any. The position of an existing
    /// name is preserved.
    pub fn add(&mut self, att: Attribute) -> Option<Attribute> {
        match self.atts.iter_mut().find(|a| a.name == att.name) {
            Some(slot) => Some(std::mem::replace(slot, att)),
            None => {
                self.atts.push(att);
                None
            },
        }
    }

    /// Add all attributes, replacing existing names.
    pub fn add_all(&mut self, atts: impl IntoIterator<Item = Attribute>) {
        for att in atts {
            self.add(att);
        }
    }

    /// Remove the first attribute equal to `att`.
    pub fn remove(&mut self, att: &Attribute) -> bool {
        match self.atts.iter().position(|a| a == att) {
            Some(i) => {
                self.atts.remove(i);
                true
            },
            None => false,
        }
    }

    /// Remove an attribute by exact name.
    pub fn remove_by_name(&mut self, name: &str) -> Option<Attribute> {
        let i = self.atts.iter().position(|a| a.name == name)?;
        Some(self.atts.remove(i))
    }

    /// Remove an attribute by name, ignoring ASCII case.
    pub fn remove_ignore_case(&mut self, name: &str) -> Option<Attribute> {
        let i = self
            .atts
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.atts.remove(i))
    }

    /// Remove every attribute.
    pub fn clear(&mut self) {
        self.atts.clear();
    }

    /// Freeze into a read-only snapshot.
    pub fn to_immutable(&self) -> AttributeSnapshot {
        AttributeSnapshot {
            name: Arc::from(self.name.as_str()),
            atts: Arc::from(self.atts.as_slice()),
        }
    }
}

impl AttributeContainer for AttributeSet {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[Attribute] {
        &self.atts
    }
}

impl Extend<Attribute> for AttributeSet {
    fn extend<I: IntoIterator<Item = Attribute>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

/// Frozen attribute container; cheap to clone and has no mutators.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    name: Arc<str>,
    atts: Arc<[Attribute]>,
}

impl AttributeSnapshot {
    /// Copy back into a mutable set.
    pub fn to_mutable(&self) -> AttributeSet {
        AttributeSet {
            name: self.name.to_string(),
            atts: self.atts.to_vec(),
        }
    }
}

impl Default for AttributeSnapshot {
    fn default() -> Self {
        AttributeSet::default().to_immutable()
    }
}

impl AttributeContainer for AttributeSnapshot {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[Attribute] {
        &self.atts
    }
}
