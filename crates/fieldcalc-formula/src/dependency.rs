//! Dependency tracking between formula fields

use ahash::{AHashMap, AHashSet};

use crate::ast::FormulaExpr;

/// Case-insensitive key for a field name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey(String);

impl FieldKey {
    /// Create a key from a field name
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Normalized name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Dependency graph for formula fields
///
/// Tracks which fields read which other fields so formula fields can be
/// calculated after the formula fields they reference.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Field → fields that depend on it (dependents)
    dependents: AHashMap<FieldKey, AHashSet<FieldKey>>,
    /// Field → fields it depends on (precedents)
    precedents: AHashMap<FieldKey, AHashSet<FieldKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from formula field names and their parsed formulas
    pub fn from_formulas<'a>(formulas: impl IntoIterator<Item = (&'a str, &'a FormulaExpr)>) -> Self {
        let mut graph = Self::new();
        for (name, expr) in formulas {
            let dependent = FieldKey::new(name);
            for reference in expr.field_references() {
                graph.add_dependency(FieldKey::new(&reference), dependent.clone());
            }
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: FieldKey, dependent: FieldKey) {
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(dependent.clone());
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get fields that depend on the given field
    pub fn get_dependents(&self, field: &FieldKey) -> impl Iterator<Item = &FieldKey> + '_ {
        self.dependents.get(field).into_iter().flatten()
    }

    /// Get fields that the given field depends on
    pub fn get_precedents(&self, field: &FieldKey) -> impl Iterator<Item = &FieldKey> + '_ {
        self.precedents.get(field).into_iter().flatten()
    }

    /// Order `fields` so every field comes after the fields it reads
    ///
    /// Ties keep the order of `fields`. Fields on a cycle are still placed
    /// in the result; callers check [`has_circular_reference`](Self::has_circular_reference).
    pub fn calculation_order(&self, fields: &[FieldKey]) -> Vec<FieldKey> {
        let rank: AHashMap<&FieldKey, usize> =
            fields.iter().enumerate().map(|(i, f)| (f, i)).collect();

        let mut result = Vec::with_capacity(fields.len());
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for field in fields {
            self.topological_sort(field, &rank, &mut result, &mut visited, &mut in_stack);
        }

        result
    }

    /// Topological sort helper (DFS over precedents, post-order)
    fn topological_sort(
        &self,
        field: &FieldKey,
        rank: &AHashMap<&FieldKey, usize>,
        result: &mut Vec<FieldKey>,
        visited: &mut AHashSet<FieldKey>,
        in_stack: &mut AHashSet<FieldKey>,
    ) {
        if visited.contains(field) || in_stack.contains(field) {
            return;
        }

        in_stack.insert(field.clone());

        // Visit precedents first, in declaration order
        let mut precedents: Vec<(usize, &FieldKey)> = self
            .get_precedents(field)
            .filter_map(|p| rank.get(p).map(|&r| (r, p)))
            .collect();
        precedents.sort_unstable_by_key(|&(r, _)| r);

        for (_, precedent) in precedents {
            self.topological_sort(precedent, rank, result, visited, in_stack);
        }

        in_stack.remove(field);
        visited.insert(field.clone());
        result.push(field.clone());
    }

    /// Check whether a field lies on a reference cycle (including reading itself)
    pub fn has_circular_reference(&self, field: &FieldKey) -> bool {
        let mut visited = AHashSet::new();
        self.reaches(field, field, &mut visited)
    }

    fn reaches(&self, from: &FieldKey, target: &FieldKey, visited: &mut AHashSet<FieldKey>) -> bool {
        for precedent in self.get_precedents(from) {
            if precedent == target {
                return true;
            }
            if visited.insert(precedent.clone()) && self.reaches(precedent, target, visited) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> FieldKey {
        FieldKey::new(name)
    }

    fn keys(names: &[&str]) -> Vec<FieldKey> {
        names.iter().map(|n| key(n)).collect()
    }

    fn graph(formulas: &[(&str, &str)]) -> DependencyGraph {
        let parsed: Vec<(&str, FormulaExpr)> = formulas
            .iter()
            .map(|(name, text)| (*name, parse_formula(text).unwrap()))
            .collect();
        DependencyGraph::from_formulas(parsed.iter().map(|(n, e)| (*n, e)))
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(key("Price"), key("Total"));

        assert!(graph.get_dependents(&key("price")).any(|f| *f == key("Total")));
        assert!(graph.get_precedents(&key("TOTAL")).any(|f| *f == key("Price")));
    }

    #[test]
    fn test_calculation_order_puts_precedents_first() {
        let graph = graph(&[
            ("Total", "{Subtotal} + {Tax}"),
            ("Tax", "{Subtotal} * 0.2"),
            ("Subtotal", "{Price} * {Qty}"),
        ]);
        let order = graph.calculation_order(&keys(&["Total", "Tax", "Subtotal"]));
        assert_eq!(order, keys(&["Subtotal", "Tax", "Total"]));
    }

    #[test]
    fn test_calculation_order_keeps_independent_fields_in_place() {
        let graph = graph(&[("B", "{Price}"), ("A", "{Qty}")]);
        let order = graph.calculation_order(&keys(&["B", "A"]));
        assert_eq!(order, keys(&["B", "A"]));
    }

    #[test]
    fn test_circular_reference() {
        let graph = graph(&[
            ("A", "{B} + 1"),
            ("B", "{A} + 1"),
            ("C", "{A} * 2"),
            ("D", "{D}"),
        ]);

        assert!(graph.has_circular_reference(&key("A")));
        assert!(graph.has_circular_reference(&key("B")));
        assert!(graph.has_circular_reference(&key("D")));
        // Reads a cyclic field but is not on the cycle
        assert!(!graph.has_circular_reference(&key("C")));

        let order = graph.calculation_order(&keys(&["C", "A", "B", "D"]));
        assert_eq!(order.len(), 4);
        let position = |name: &str| order.iter().position(|f| *f == key(name));
        assert!(position("C") > position("A"));
    }
}
