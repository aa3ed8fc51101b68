//! The immutable namespace tree and navigation over its scopes.
//!
//! Scopes live in an arena owned by [`NamespaceTree`]. Child links own
//! downward; parent links are plain [`ScopeId`] indices, so the tree has no
//! reference cycles. [`Scope`] is a cheap, copyable handle used for all
//! navigation.

use super::attribute::AttributeSnapshot;
use super::builder::ScopeBuilder;
use super::dimension::{parse_dimension_string, DimSpec, Dimension};
use super::variable::{EnumTypedef, Variable};
use crate::error::{CdmError, Result};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Index of a scope within its tree. The root is always `ScopeId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    /// The root scope.
    pub const ROOT: ScopeId = ScopeId(0);

    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a tree's data comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetContext {
    /// Location of the primary resource.
    pub location: String,
    /// Identifier of the decoder that produced the tree.
    pub file_type: Option<String>,
}

impl DatasetContext {
    /// Create a context for a location read by a decoder.
    pub fn new(location: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            file_type: Some(file_type.into()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScopeNode {
    pub(crate) name: String,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) enum_typedefs: Vec<EnumTypedef>,
    pub(crate) attributes: AttributeSnapshot,
    pub(crate) hash: OnceLock<u64>,
}

/// An immutable tree of scopes holding variables, dimensions and attributes.
///
/// Created only by [`ScopeBuilder::build`]. Safe to share between threads.
#[derive(Debug)]
pub struct NamespaceTree {
    pub(crate) context: Arc<DatasetContext>,
    pub(crate) scopes: Vec<ScopeNode>,
}

impl NamespaceTree {
    /// The root scope.
    pub fn root(&self) -> Scope<'_> {
        self.scope(ScopeId::ROOT)
    }

    /// Handle for a scope id.
    ///
    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn scope(&self, id: ScopeId) -> Scope<'_> {
        assert!(id.0 < self.scopes.len(), "scope id out of range");
        Scope { tree: self, id }
    }

    /// Dataset context shared by the tree's variables.
    pub fn context(&self) -> &Arc<DatasetContext> {
        &self.context
    }

    /// Number of scopes, root included.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// All scopes in depth-first order, root first.
    pub fn walk(&self) -> Vec<Scope<'_>> {
        let mut out = Vec::with_capacity(self.scopes.len());
        let mut stack = vec![ScopeId::ROOT];
        while let Some(id) = stack.pop() {
            out.push(self.scope(id));
            stack.extend(self.scopes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Find a scope by its full path (`"/a/b"`; `"/"` or `""` is the root).
    pub fn find_scope_by_path(&self, path: &str) -> Option<Scope<'_>> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(self.root(), |scope, name| scope.find_scope(name))
    }

    /// Find a variable by full path (`"/a/b/v"`).
    pub fn find_variable_by_path(&self, path: &str) -> Option<&Variable> {
        let trimmed = path.trim_end_matches('/');
        let (scope_path, name) = match trimmed.rfind('/') {
            Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
            None => ("", trimmed),
        };
        self.find_scope_by_path(scope_path)?.find_variable(name)
    }

    /// Mutable builder reproducing this tree.
    pub fn to_builder(&self) -> ScopeBuilder {
        let mut builder = self.root().to_builder();
        builder.set_context(Arc::clone(&self.context));
        builder
    }

    /// Nearest declaration of shared dimension `name`, searching upward from `from`.
    pub(crate) fn resolve_dimension(&self, from: ScopeId, name: &str) -> Option<&Dimension> {
        let mut current = Some(from);
        while let Some(id) = current {
            let node = &self.scopes[id.0];
            if let Some(d) = node.dimensions.iter().find(|d| d.name() == Some(name)) {
                return Some(d);
            }
            current = node.parent;
        }
        None
    }
}

impl PartialEq for NamespaceTree {
    /// Structural equality: same scope paths, attributes, dimensions and variables.
    fn eq(&self, other: &Self) -> bool {
        scopes_equal(self.root(), other.root())
    }
}

fn scopes_equal(a: Scope<'_>, b: Scope<'_>) -> bool {
    a.name() == b.name()
        && a.attributes() == b.attributes()
        && a.enum_typedefs() == b.enum_typedefs()
        && a.variables() == b.variables()
        && a.dimensions().len() == b.dimensions().len()
        && a.dimensions()
            .iter()
            .zip(b.dimensions())
            .all(|(x, y)| x.detached() == y.detached())
        && a.children().len() == b.children().len()
        && a.children()
            .into_iter()
            .zip(b.children())
            .all(|(x, y)| scopes_equal(x, y))
}

/// Handle to one scope of a [`NamespaceTree`].
#[derive(Clone, Copy)]
pub struct Scope<'t> {
    tree: &'t NamespaceTree,
    id: ScopeId,
}

impl<'t> Scope<'t> {
    fn node(&self) -> &'t ScopeNode {
        &self.tree.scopes[self.id.0]
    }

    /// Id of this scope within its tree.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Tree this scope belongs to.
    pub fn tree(&self) -> &'t NamespaceTree {
        self.tree
    }

    /// Short name, unique among siblings. Empty for the root.
    pub fn name(&self) -> &'t str {
        &self.node().name
    }

    /// Check if this is the root scope.
    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// Parent scope, `None` at the root.
    pub fn parent(&self) -> Option<Scope<'t>> {
        self.node().parent.map(|id| self.tree.scope(id))
    }

    /// Child scopes in insertion order.
    pub fn children(&self) -> Vec<Scope<'t>> {
        self.node()
            .children
            .iter()
            .map(|id| self.tree.scope(*id))
            .collect()
    }

    /// Variables declared directly in this scope.
    pub fn variables(&self) -> &'t [Variable] {
        &self.node().variables
    }

    /// Shared dimensions declared directly in this scope.
    pub fn dimensions(&self) -> &'t [Dimension] {
        &self.node().dimensions
    }

    /// Enumeration typedefs declared directly in this scope.
    pub fn enum_typedefs(&self) -> &'t [EnumTypedef] {
        &self.node().enum_typedefs
    }

    /// Attributes of this scope.
    pub fn attributes(&self) -> &'t AttributeSnapshot {
        &self.node().attributes
    }

    /// Names from the root down to this scope, root excluded.
    pub fn path(&self) -> Vec<&'t str> {
        let mut names = Vec::new();
        let mut current = Some(*self);
        while let Some(scope) = current {
            if !scope.is_root() {
                names.push(scope.name());
            }
            current = scope.parent();
        }
        names.reverse();
        names
    }

    /// Full path such as `/a/b`; the root is `/`.
    pub fn full_name(&self) -> String {
        format!("/{}", self.path().join("/"))
    }

    /// Find a direct child scope.
    pub fn find_scope(&self, name: &str) -> Option<Scope<'t>> {
        self.children().into_iter().find(|s| s.name() == name)
    }

    /// Find a variable declared in this scope.
    pub fn find_variable(&self, name: &str) -> Option<&'t Variable> {
        self.variables().iter().find(|v| v.name() == name)
    }

    /// Find a variable here or in the nearest ancestor that has one.
    pub fn find_variable_or_ancestor(&self, name: &str) -> Option<&'t Variable> {
        self.find_variable(name)
            .or_else(|| self.parent()?.find_variable_or_ancestor(name))
    }

    /// Find a shared dimension declared in this scope.
    pub fn find_dimension_local(&self, name: &str) -> Option<&'t Dimension> {
        self.dimensions().iter().find(|d| d.name() == Some(name))
    }

    /// Find a shared dimension here or in the nearest ancestor declaring it.
    pub fn find_dimension(&self, name: &str) -> Option<&'t Dimension> {
        self.tree.resolve_dimension(self.id, name)
    }

    /// Find an enumeration typedef here or in an ancestor.
    pub fn find_enum_typedef(&self, name: &str) -> Option<&'t EnumTypedef> {
        self.enum_typedefs()
            .iter()
            .find(|e| e.name() == name)
            .or_else(|| self.parent()?.find_enum_typedef(name))
    }

    /// Check if this scope is `other` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, other: &Scope<'_>) -> bool {
        if !std::ptr::eq(self.tree, other.tree) {
            return false;
        }
        let mut current = Some(other.id);
        while let Some(id) = current {
            if id == self.id {
                return true;
            }
            current = self.tree.scopes[id.0].parent;
        }
        false
    }

    /// Deepest scope that is an ancestor-or-self of both scopes.
    ///
    /// Always succeeds for scopes of the same tree since the root is an
    /// ancestor of every scope. Returns `None` for scopes of different trees.
    pub fn common_ancestor(&self, other: &Scope<'t>) -> Option<Scope<'t>> {
        if !std::ptr::eq(self.tree, other.tree) {
            return None;
        }
        if self.is_ancestor_or_self(other) {
            return Some(*self);
        }
        if other.is_ancestor_or_self(self) {
            return Some(*other);
        }
        let mut candidate = *other;
        while !candidate.is_ancestor_or_self(self) {
            candidate = candidate.parent()?;
        }
        Some(candidate)
    }

    /// Parse a dimension string, resolving shared names upward from here.
    pub fn make_dimensions(&self, spec: &str) -> Result<Vec<Dimension>> {
        parse_dimension_string(spec)?
            .into_iter()
            .map(|d| match d {
                DimSpec::Shared(name) => {
                    self.find_dimension(&name)
                        .cloned()
                        .ok_or_else(|| CdmError::UnknownDimension {
                            name,
                            scope: self.full_name(),
                        })
                },
                DimSpec::Anonymous(n) => Ok(Dimension::anonymous(n)),
                DimSpec::VariableLength => Ok(Dimension::variable_length()),
            })
            .collect()
    }

    /// Mutable builder reproducing this scope and everything below it.
    pub fn to_builder(&self) -> ScopeBuilder {
        let mut builder = ScopeBuilder::new(self.name());
        builder.set_attributes(self.attributes().to_mutable());
        for dim in self.dimensions() {
            builder.push_dimension(dim.detached());
        }
        for e in self.enum_typedefs() {
            builder.push_enum_typedef(e.clone());
        }
        for child in self.children() {
            builder.push_scope(child.to_builder());
        }
        for v in self.variables() {
            builder.push_variable(v.to_builder());
        }
        builder
    }
}

impl PartialEq for Scope<'_> {
    /// Same short name and structurally equal parents (or both roots).
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self.tree, other.tree) && self.id == other.id {
            return true;
        }
        if self.name() != other.name() {
            return false;
        }
        match (self.parent(), other.parent()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scope<'_> {}

impl Hash for Scope<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let cached = *self.node().hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.name().hash(&mut hasher);
            if let Some(parent) = self.parent() {
                parent.hash(&mut hasher);
            }
            hasher.finish()
        });
        state.write_u64(cached);
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("path", &self.full_name())
            .finish()
    }
}
