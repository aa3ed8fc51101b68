//! Plain-text outlines of namespace trees and records.

use crate::model::{AttributeContainer, Dimension, NamespaceTree, Scope, Variable};
use crate::record::Record;

enum Entry<'t> {
    Scope(Scope<'t>),
    Dimension(&'t Dimension),
    Variable(&'t Variable),
}

impl Entry<'_> {
    fn label(&self) -> String {
        match self {
            Entry::Scope(scope) if scope.is_root() => "/".to_string(),
            Entry::Scope(scope) => format!("{}/", scope.name()),
            Entry::Dimension(dim) => format!("dim {}", dim),
            Entry::Variable(var) => variable_label(var),
        }
    }

    fn children(&self) -> Vec<Entry<'_>> {
        match self {
            Entry::Scope(scope) => scope
                .dimensions()
                .iter()
                .map(Entry::Dimension)
                .chain(scope.variables().iter().map(Entry::Variable))
                .chain(scope.children().into_iter().map(Entry::Scope))
                .collect(),
            Entry::Dimension(_) => Vec::new(),
            Entry::Variable(var) => var.members().iter().map(Entry::Variable).collect(),
        }
    }
}

/// One-line summary of a variable: `name(dim=len, ...): type [axis]`.
pub fn variable_label(var: &Variable) -> String {
    let mut label = var.name().to_string();
    if var.rank() > 0 {
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| match d.name() {
                Some(name) => format!("{}={}", name, d.length()),
                None => d.length().to_string(),
            })
            .collect();
        label.push_str(&format!("({})", dims.join(", ")));
    }
    label.push_str(&format!(": {}", var.data_type()));
    if let Some(axis) = var.axis_type() {
        label.push_str(&format!(" [{}]", axis));
    }
    label
}

fn format_tree_recursive(entry: &Entry<'_>, prefix: &str, is_last: bool, out: &mut String) {
    let connector = if is_last { "└── " } else { "├── " };
    out.push_str(&format!("{}{}{}\n", prefix, connector, entry.label()));

    let new_prefix = format!("{}{}   ", prefix, if is_last { " " } else { "│" });
    let children = entry.children();
    for (i, child) in children.iter().enumerate() {
        format_tree_recursive(child, &new_prefix, i == children.len() - 1, out);
    }
}

/// Box-drawing outline of a whole tree, under a title banner.
pub fn render_tree(tree: &NamespaceTree, title: Option<&str>) -> String {
    let mut text = match title {
        Some(name) => format!("Tree Structure: {}\n", name),
        None => "Tree Structure\n".to_string(),
    };
    text.push_str(&"=".repeat(80));
    text.push_str("\n\n");
    format_tree_recursive(&Entry::Scope(tree.root()), "", true, &mut text);
    text
}

/// Multi-line description of one variable and its user attributes.
pub fn describe_variable(var: &Variable) -> String {
    let mut text = format!("Variable: {}\n", var.name());
    text.push_str(&format!("Type: {}\n", var.data_type()));
    if var.rank() > 0 {
        text.push_str(&format!("Dimensions: {}\n", var.dimensions_string()));
    }
    let attrs = var.attributes().user_attributes();
    if !attrs.is_empty() {
        text.push_str("\nAttributes:\n");
        for att in attrs.attributes() {
            text.push_str(&format!("  {}\n", att));
        }
    }
    text
}

/// `name=value` pairs of a record on one line.
pub fn render_record(record: &Record) -> String {
    record
        .field_names()
        .into_iter()
        .map(|name| match record.value(name) {
            Ok(value) => format!("{}={}", name, value),
            Err(_) => format!("{}=?", name),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, ScopeBuilder, VariableBuilder};

    fn tree() -> NamespaceTree {
        let mut root = ScopeBuilder::root();
        root.add_dimension(Dimension::shared("time", 4)).unwrap();
        root.add_variable(
            VariableBuilder::new("temp", DataType::Float)
                .with_dimensions("time")
                .unwrap()
                .with_attribute("units", "K"),
        )
        .unwrap();
        let mut group = ScopeBuilder::new("obs");
        group
            .add_variable(
                VariableBuilder::sequence("record")
                    .with_member(VariableBuilder::new("lat", DataType::Int))
                    .unwrap(),
            )
            .unwrap();
        root.add_scope(group).unwrap();
        root.build().unwrap()
    }

    #[test]
    fn test_render_tree_outline() {
        let text = render_tree(&tree(), Some("sample"));
        assert!(text.starts_with("Tree Structure: sample\n"));
        assert!(text.contains("└── /\n"));
        assert!(text.contains("├── temp(time=4): float\n"));
        assert!(text.contains("└── obs/\n"));
        assert!(text.contains("lat: int"));
    }

    #[test]
    fn test_describe_variable() {
        let tree = tree();
        let text = describe_variable(tree.root().find_variable("temp").unwrap());
        assert!(text.contains("Dimensions: time"));
        assert!(text.contains("units"));
    }
}
