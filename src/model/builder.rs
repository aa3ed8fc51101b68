//! Two-phase construction of a [`NamespaceTree`].
//!
//! A [`ScopeBuilder`] is populated freely, then [`ScopeBuilder::build`]
//! materializes the whole subtree once. Name clashes are reported when an
//! entity is added; dimension references are resolved at build time.

use super::attribute::{Attribute, AttributeSet};
use super::dimension::Dimension;
use super::scope::{DatasetContext, NamespaceTree, ScopeId, ScopeNode};
use super::variable::{EnumTypedef, Variable, VariableBuilder};
use crate::error::{CdmError, Result};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Mutable builder for a scope and everything below it.
#[derive(Debug, Clone, Default)]
pub struct ScopeBuilder {
    name: String,
    attributes: AttributeSet,
    dimensions: Vec<Dimension>,
    enum_typedefs: Vec<EnumTypedef>,
    scopes: Vec<ScopeBuilder>,
    variables: Vec<VariableBuilder>,
    context: Option<Arc<DatasetContext>>,
    built: bool,
}

impl ScopeBuilder {
    /// Create a builder for a scope named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attributes: AttributeSet::new(name.clone()),
            name,
            ..Self::default()
        }
    }

    /// Create a builder for a root scope.
    pub fn root() -> Self {
        Self::new("")
    }

    /// Scope name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if `build()` has already succeeded.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Dataset context given to variables that do not carry their own.
    pub fn set_context(&mut self, context: Arc<DatasetContext>) {
        self.context = Some(context);
    }

    /// Builder-style [`set_context`](Self::set_context).
    pub fn with_context(mut self, context: DatasetContext) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    fn check_mutable(&self) -> Result<()> {
        if self.built {
            return Err(CdmError::AlreadyBuilt {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    // Attributes

    /// Add or replace an attribute, returning the replaced one.
    pub fn add_attribute(&mut self, att: Attribute) -> Result<Option<Attribute>> {
        self.check_mutable()?;
        Ok(self.attributes.add(att))
    }

    /// Attributes added so far.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Mutable access to the attribute set.
    pub fn attributes_mut(&mut self) -> Result<&mut AttributeSet> {
        self.check_mutable()?;
        Ok(&mut self.attributes)
    }

    // Dimensions

    /// Declare a shared dimension in this scope.
    pub fn add_dimension(&mut self, dim: Dimension) -> Result<()> {
        self.check_mutable()?;
        let name = self.shared_name(&dim)?;
        if self.find_dimension_local(&name).is_some() {
            return Err(CdmError::duplicate("Dimension", name, self.name.clone()));
        }
        self.dimensions.push(dim);
        Ok(())
    }

    /// Declare a shared dimension unless one of that name exists. Returns
    /// whether it was added.
    pub fn add_dimension_if_absent(&mut self, dim: Dimension) -> Result<bool> {
        self.check_mutable()?;
        let name = self.shared_name(&dim)?;
        if self.find_dimension_local(&name).is_some() {
            return Ok(false);
        }
        self.dimensions.push(dim);
        Ok(true)
    }

    /// Replace a shared dimension of the same name, or add it. Returns whether
    /// one was replaced.
    ///
    /// Variables refer to shared dimensions by name until build, so existing
    /// references pick up the replacement.
    pub fn replace_dimension(&mut self, dim: Dimension) -> Result<bool> {
        self.check_mutable()?;
        let name = self.shared_name(&dim)?;
        match self
            .dimensions
            .iter_mut()
            .find(|d| d.name() == Some(name.as_str()))
        {
            Some(slot) => {
                *slot = dim;
                Ok(true)
            },
            None => {
                self.dimensions.push(dim);
                Ok(false)
            },
        }
    }

    /// Remove a shared dimension. Fails if a variable that would resolve to
    /// it still references it.
    pub fn remove_dimension(&mut self, name: &str) -> Result<bool> {
        self.check_mutable()?;
        let Some(i) = self
            .dimensions
            .iter()
            .position(|d| d.name() == Some(name))
        else {
            return Ok(false);
        };
        if let Some(variable) = self.variable_referencing(name) {
            return Err(CdmError::DimensionInUse {
                name: name.to_string(),
                variable,
            });
        }
        self.dimensions.remove(i);
        Ok(true)
    }

    /// Find a shared dimension declared directly in this scope.
    pub fn find_dimension_local(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == Some(name))
    }

    /// Shared dimensions declared so far.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn shared_name(&self, dim: &Dimension) -> Result<String> {
        match dim.name() {
            Some(name) if dim.is_shared() => Ok(name.to_string()),
            _ => Err(CdmError::NotShared {
                scope: self.name.clone(),
            }),
        }
    }

    // Full path of a variable in this subtree that resolves `name` to this
    // scope's declaration. Child scopes that redeclare `name` shadow it.
    fn variable_referencing(&self, name: &str) -> Option<String> {
        if let Some(v) = self.variables.iter().find_map(|v| v.referencing(name)) {
            return Some(v.to_string());
        }
        self.scopes
            .iter()
            .filter(|s| s.find_dimension_local(name).is_none())
            .find_map(|s| {
                s.variable_referencing(name)
                    .map(|v| format!("{}/{}", s.name, v))
            })
    }

    // Scopes

    /// Add a child scope.
    pub fn add_scope(&mut self, scope: ScopeBuilder) -> Result<()> {
        self.check_mutable()?;
        if self.find_scope(&scope.name).is_some() {
            return Err(CdmError::duplicate("Scope", scope.name, self.name.clone()));
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// Remove a child scope by name. Returns whether it existed.
    pub fn remove_scope(&mut self, name: &str) -> Result<bool> {
        self.check_mutable()?;
        let before = self.scopes.len();
        self.scopes.retain(|s| s.name != name);
        Ok(self.scopes.len() != before)
    }

    /// Find a child scope builder.
    pub fn find_scope(&self, name: &str) -> Option<&ScopeBuilder> {
        self.scopes.iter().find(|s| s.name == name)
    }

    /// Mutable access to a child scope builder.
    pub fn scope_mut(&mut self, name: &str) -> Result<&mut ScopeBuilder> {
        self.check_mutable()?;
        let parent = self.name.clone();
        self.scopes
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| CdmError::not_found(format!("{}/{}", parent, name)))
    }

    /// Child scope builders in insertion order.
    pub fn scopes(&self) -> &[ScopeBuilder] {
        &self.scopes
    }

    // Variables

    /// Add a variable.
    pub fn add_variable(&mut self, variable: VariableBuilder) -> Result<()> {
        self.check_mutable()?;
        if self.find_variable(variable.name()).is_some() {
            return Err(CdmError::duplicate(
                "Variable",
                variable.name(),
                self.name.clone(),
            ));
        }
        self.variables.push(variable);
        Ok(())
    }

    /// Replace a variable of the same name, or add it. Returns whether one was
    /// replaced. Position is preserved.
    pub fn replace_variable(&mut self, variable: VariableBuilder) -> Result<bool> {
        self.check_mutable()?;
        match self
            .variables
            .iter_mut()
            .find(|v| v.name() == variable.name())
        {
            Some(slot) => {
                *slot = variable;
                Ok(true)
            },
            None => {
                self.variables.push(variable);
                Ok(false)
            },
        }
    }

    /// Remove a variable by name. Returns whether it existed.
    pub fn remove_variable(&mut self, name: &str) -> Result<bool> {
        self.check_mutable()?;
        let before = self.variables.len();
        self.variables.retain(|v| v.name() != name);
        Ok(self.variables.len() != before)
    }

    /// Find a variable builder.
    pub fn find_variable(&self, name: &str) -> Option<&VariableBuilder> {
        self.variables.iter().find(|v| v.name() == name)
    }

    /// Mutable access to a variable builder.
    pub fn variable_mut(&mut self, name: &str) -> Result<&mut VariableBuilder> {
        self.check_mutable()?;
        let scope = self.name.clone();
        self.variables
            .iter_mut()
            .find(|v| v.name() == name)
            .ok_or_else(|| CdmError::not_found(format!("{}/{}", scope, name)))
    }

    /// Variable builders in insertion order.
    pub fn variables(&self) -> &[VariableBuilder] {
        &self.variables
    }

    // Enumerations

    /// Add an enumeration typedef.
    pub fn add_enum_typedef(&mut self, typedef: EnumTypedef) -> Result<()> {
        self.check_mutable()?;
        if self.find_enum_typedef(typedef.name()).is_some() {
            return Err(CdmError::duplicate(
                "Enum typedef",
                typedef.name(),
                self.name.clone(),
            ));
        }
        self.enum_typedefs.push(typedef);
        Ok(())
    }

    /// Find an enumeration typedef declared in this scope.
    pub fn find_enum_typedef(&self, name: &str) -> Option<&EnumTypedef> {
        self.enum_typedefs.iter().find(|e| e.name() == name)
    }

    // Unchecked pushes used when copying an already valid tree back into builders.

    pub(crate) fn set_attributes(&mut self, attributes: AttributeSet) {
        self.attributes = attributes;
    }

    pub(crate) fn push_dimension(&mut self, dim: Dimension) {
        self.dimensions.push(dim);
    }

    pub(crate) fn push_enum_typedef(&mut self, typedef: EnumTypedef) {
        self.enum_typedefs.push(typedef);
    }

    pub(crate) fn push_scope(&mut self, scope: ScopeBuilder) {
        self.scopes.push(scope);
    }

    pub(crate) fn push_variable(&mut self, variable: VariableBuilder) {
        self.variables.push(variable);
    }

    /// Materialize the immutable tree rooted at this scope.
    ///
    /// Legal once. On success this builder and all child builders become
    /// read-only; later mutations and a second build fail with
    /// [`CdmError::AlreadyBuilt`]. On failure the builder is left untouched.
    pub fn build(&mut self) -> Result<NamespaceTree> {
        self.check_mutable()?;
        let context = self.context.clone().unwrap_or_default();
        let mut tree = NamespaceTree {
            context: Arc::clone(&context),
            scopes: Vec::new(),
        };

        let mut pending = Vec::new();
        allocate(&mut tree, self, None, &mut pending);

        let mut resolved = Vec::with_capacity(pending.len());
        for (id, builders) in pending {
            let variables = builders
                .into_iter()
                .map(|vb| vb.materialize(&tree, id, &context))
                .collect::<Result<Vec<Variable>>>()?;
            resolved.push((id, variables));
        }
        for (id, variables) in resolved {
            tree.scopes[id.index()].variables = variables;
        }

        debug!(
            "Built namespace tree '{}' with {} scopes",
            context.location,
            tree.scopes.len()
        );
        self.mark_built();
        Ok(tree)
    }

    fn mark_built(&mut self) {
        self.built = true;
        for child in &mut self.scopes {
            child.mark_built();
        }
    }
}

// Create the node for `builder` and its descendants depth-first, wiring
// parent links and dimension owners. Variables are queued for resolution
// once every dimension is in place.
fn allocate(
    tree: &mut NamespaceTree,
    builder: &ScopeBuilder,
    parent: Option<ScopeId>,
    pending: &mut Vec<(ScopeId, Vec<VariableBuilder>)>,
) -> ScopeId {
    let id = ScopeId(tree.scopes.len());
    tree.scopes.push(ScopeNode {
        name: builder.name.clone(),
        parent,
        children: Vec::with_capacity(builder.scopes.len()),
        variables: Vec::new(),
        dimensions: builder
            .dimensions
            .iter()
            .map(|d| d.clone().with_owner(id))
            .collect(),
        enum_typedefs: builder.enum_typedefs.clone(),
        attributes: builder.attributes.to_immutable(),
        hash: OnceLock::new(),
    });
    pending.push((id, builder.variables.clone()));
    for child in &builder.scopes {
        let child_id = allocate(tree, child, Some(id), pending);
        tree.scopes[id.index()].children.push(child_id);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeContainer, DataType};

    fn sample() -> ScopeBuilder {
        let mut root = ScopeBuilder::root();
        root.add_dimension(Dimension::shared("x", 10)).unwrap();
        root.add_attribute(Attribute::new("title", "sample")).unwrap();
        let mut g = ScopeBuilder::new("g");
        g.add_variable(
            VariableBuilder::new("v", DataType::Float)
                .with_dimensions("x 3")
                .unwrap(),
        )
        .unwrap();
        root.add_scope(g).unwrap();
        root
    }

    #[test]
    fn test_second_build_fails() {
        let mut root = sample();
        root.build().unwrap();
        assert!(matches!(root.build(), Err(CdmError::AlreadyBuilt { .. })));
        assert!(root.add_dimension(Dimension::shared("y", 1)).is_err());
        assert!(root.scope_mut("g").is_err());
    }

    #[test]
    fn test_failed_build_leaves_builder_usable() {
        let mut root = ScopeBuilder::root();
        root.add_variable(
            VariableBuilder::new("v", DataType::Int)
                .with_dimensions("missing")
                .unwrap(),
        )
        .unwrap();
        let err = root.build().unwrap_err();
        assert!(matches!(err, CdmError::UnknownDimension { .. }));
        root.add_dimension(Dimension::shared("missing", 4)).unwrap();
        let tree = root.build().unwrap();
        assert_eq!(tree.root().variables()[0].element_count(), Some(4));
    }

    #[test]
    fn test_duplicates_rejected_on_add() {
        let mut root = sample();
        assert!(root.add_dimension(Dimension::shared("x", 2)).is_err());
        assert!(root.add_scope(ScopeBuilder::new("g")).is_err());
        assert!(!root.add_dimension_if_absent(Dimension::shared("x", 2)).unwrap());
        let g = root.scope_mut("g").unwrap();
        assert!(g.add_variable(VariableBuilder::new("v", DataType::Int)).is_err());
        assert!(g.replace_variable(VariableBuilder::new("v", DataType::Int)).unwrap());
    }

    #[test]
    fn test_anonymous_dimension_not_shared() {
        let mut root = ScopeBuilder::root();
        let err = root.add_dimension(Dimension::anonymous(3)).unwrap_err();
        assert!(matches!(err, CdmError::NotShared { .. }));
    }

    #[test]
    fn test_remove_referenced_dimension_rejected() {
        let mut root = sample();
        let err = root.remove_dimension("x").unwrap_err();
        match err {
            CdmError::DimensionInUse { name, variable } => {
                assert_eq!(name, "x");
                assert_eq!(variable, "g/v");
            },
            other => panic!("unexpected error: {}", other),
        }
        // A child redeclaring x shadows the root declaration.
        root.scope_mut("g")
            .unwrap()
            .add_dimension(Dimension::shared("x", 5))
            .unwrap();
        assert!(root.remove_dimension("x").unwrap());
        assert!(!root.remove_dimension("x").unwrap());
    }

    #[test]
    fn test_replace_dimension_migrates_references() {
        let mut root = sample();
        assert!(root.replace_dimension(Dimension::shared("x", 7)).unwrap());
        let tree = root.build().unwrap();
        let v = tree.find_variable_by_path("/g/v").unwrap();
        assert_eq!(v.element_count(), Some(21));
        assert_eq!(v.dimensions()[0].owner(), Some(ScopeId::ROOT));
    }

    #[test]
    fn test_context_only_when_absent() {
        let own = Arc::new(DatasetContext::new("other.dat", "station"));
        let mut root = ScopeBuilder::root().with_context(DatasetContext::new("main.dat", "lightning"));
        root.add_variable(VariableBuilder::new("a", DataType::Int))
            .unwrap();
        root.add_variable(VariableBuilder::new("b", DataType::Int).with_context(Arc::clone(&own)))
            .unwrap();
        let tree = root.build().unwrap();
        assert_eq!(tree.root().find_variable("a").unwrap().context().location, "main.dat");
        assert_eq!(tree.root().find_variable("b").unwrap().context().location, "other.dat");
    }

    #[test]
    fn test_round_trip_structurally_equal() {
        let mut root = sample();
        root.add_enum_typedef(EnumTypedef::new("flag", [(0, "ok".to_string())]))
            .unwrap();
        let tree = root.build().unwrap();
        let again = tree.to_builder().build().unwrap();
        assert_eq!(tree, again);
        assert_eq!(again.root().attributes().find_string_ignore_case("TITLE", ""), "sample");
        assert!(again.root().find_enum_typedef("flag").is_some());
    }
}
