//! Scope rows: the per-response row registry and the row-level change set.
//!
//! Rows of a scope are not folded into the scope's checksum. They are
//! diffed by identity instead: each response keeps a `name → row` map per
//! scope, and the rows of the current scope are looked up in the previous
//! response's map for the scope of the same name.

use super::buffer::{BufferId, BufferKind, BufferName};
use super::tree::BufferTree;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Rows of every scope in one response, keyed by scope name.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    scopes: HashMap<BufferName, HashMap<BufferName, BufferId>>,
}

impl ScopeRegistry {
    /// Make `scope` known, even before it has rows.
    pub fn bind(&mut self, scope: &BufferName) {
        self.scopes.entry(scope.clone()).or_default();
    }

    /// Register `row` under `scope`. A repeated row name replaces the earlier one.
    pub fn register(&mut self, scope: &BufferName, row: &BufferName, id: BufferId) {
        let rows = self.scopes.entry(scope.clone()).or_default();
        if let Some(earlier) = rows.insert(row.clone(), id) {
            debug!(%scope, %row, ?earlier, ?id, "row name registered twice; keeping the later row");
        }
    }

    /// The row map of `scope`.
    pub fn rows(&self, scope: &str) -> Option<&HashMap<BufferName, BufferId>> {
        self.scopes.get(scope)
    }

    /// Look up one row.
    pub fn row(&self, scope: &str, row: &str) -> Option<BufferId> {
        self.rows(scope)?.get(row).copied()
    }

    /// Number of scopes known.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether no scope has been bound.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// A row that is new at its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    /// Closest preceding row, `None` when the row comes first.
    pub predecessor: Option<BufferName>,
    /// Name of the inserted row.
    pub name: BufferName,
    /// The row in the current response.
    pub id: BufferId,
}

/// Row-level differences between a scope and its previous counterpart.
#[derive(Debug, Clone, Default)]
pub struct ScopeChanges {
    /// Rows that are new, or that moved relative to their siblings.
    pub inserted: Vec<Insertion>,
    /// Rows present in both responses whose content changed.
    pub updated: Vec<BufferId>,
    /// Names of previous rows that are gone.
    pub deleted: Vec<BufferName>,
    rerendered: HashSet<BufferId>,
}

impl ScopeChanges {
    /// Compare the rows of `scope` in `current` with `previous_scope` in `previous`.
    ///
    /// A row missing from the previous map is an insertion. A row found but
    /// unequal (or always rendered) is an update. A previous row missing from
    /// the current map is a deletion. Rows present in both whose relative
    /// order changed are reported as insertions at their new position, so the
    /// client repositions them.
    pub fn compute(
        current: &BufferTree,
        scope: BufferId,
        previous: &BufferTree,
        previous_scope: BufferId,
    ) -> Self {
        let node = current.buffer(scope);
        let name = node.name().as_str();
        let previous_rows = previous.scopes().rows(name);
        let current_rows = current.scopes().rows(name);

        let previous_positions: HashMap<&BufferName, usize> = previous
            .buffer(previous_scope)
            .children()
            .iter()
            .map(|&id| previous.buffer(id))
            .filter(|row| row.kind() == BufferKind::ScopeChild)
            .enumerate()
            .map(|(position, row)| (row.name(), position))
            .collect();

        let rows: Vec<(BufferId, Option<BufferId>)> = node
            .children()
            .iter()
            .copied()
            .filter(|&id| current.buffer(id).kind() == BufferKind::ScopeChild)
            .map(|id| {
                let before = previous_rows
                    .and_then(|rows| rows.get(current.buffer(id).name()).copied());
                (id, before)
            })
            .collect();

        let retained: Vec<usize> = rows
            .iter()
            .filter(|(_, before)| before.is_some())
            .map(|(id, _)| {
                previous_positions
                    .get(current.buffer(*id).name())
                    .copied()
                    .unwrap_or(usize::MAX)
            })
            .collect();
        let in_order = longest_increasing(&retained);

        let mut changes = Self::default();
        let mut predecessor: Option<&BufferName> = None;
        let mut retained_index = 0;
        for (id, before) in rows {
            let row = current.buffer(id);
            let moved = before.is_some() && {
                let stays = in_order[retained_index];
                retained_index += 1;
                !stays
            };
            match before {
                Some(before) if !moved => {
                    if row.always_render() || !row.is_equal(previous.buffer(before)) {
                        changes.updated.push(id);
                        changes.rerendered.insert(id);
                    }
                }
                _ => {
                    changes.inserted.push(Insertion {
                        predecessor: predecessor.cloned(),
                        name: row.name().clone(),
                        id,
                    });
                    changes.rerendered.insert(id);
                }
            }
            predecessor = Some(row.name());
        }

        for &id in previous.buffer(previous_scope).children() {
            let row = previous.buffer(id);
            let kept = current_rows.is_some_and(|rows| rows.contains_key(row.name()));
            if row.kind() == BufferKind::ScopeChild && !kept {
                changes.deleted.push(row.name().clone());
            }
        }

        changes
    }

    /// Inserted + updated + deleted rows.
    pub fn total(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Whether nothing changed at row level.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Whether any row is re-sent in full.
    pub fn has_rerenders(&self) -> bool {
        !self.inserted.is_empty() || !self.updated.is_empty()
    }

    /// Whether the client has to restructure the scope.
    pub fn has_structural_changes(&self) -> bool {
        !self.inserted.is_empty() || !self.deleted.is_empty()
    }

    /// Whether `row` is re-sent in full.
    pub fn rerenders(&self, row: BufferId) -> bool {
        self.rerendered.contains(&row)
    }
}

/// Mark the members of one longest strictly increasing subsequence.
fn longest_increasing(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; values.len()];
    for (i, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            parent[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }
    let mut keep = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = parent[i];
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentUnit, Encoding};

    /// Build a tree with one scope `tbl` holding `(name, text)` rows.
    fn table(rows: &[(&str, &str)]) -> (BufferTree, BufferId) {
        let mut tree = BufferTree::new();
        let root = tree.open_root("document".into());
        let scope = tree.open_child(root, "tbl".into(), BufferKind::Scope, false).unwrap();
        tree.append_unit(scope, ContentUnit::text("<table>"), Encoding::Utf8).unwrap();
        for (name, text) in rows {
            let row = tree
                .open_child(scope, (*name).into(), BufferKind::ScopeChild, false)
                .unwrap();
            tree.append_unit(row, ContentUnit::text(*text), Encoding::Utf8).unwrap();
            tree.close(row).unwrap();
        }
        tree.append_unit(scope, ContentUnit::text("</table>"), Encoding::Utf8).unwrap();
        tree.close(scope).unwrap();
        tree.close(root).unwrap();
        (tree, scope)
    }

    fn names(changes: &ScopeChanges) -> Vec<(Option<&str>, &str)> {
        changes
            .inserted
            .iter()
            .map(|i| (i.predecessor.as_ref().map(BufferName::as_str), i.name.as_str()))
            .collect()
    }

    #[test]
    fn test_registry_lookup() {
        let (tree, _) = table(&[("r1", "a"), ("r2", "b")]);
        assert_eq!(tree.scopes().rows("tbl").map(HashMap::len), Some(2));
        assert!(tree.scopes().row("tbl", "r2").is_some());
        assert!(tree.scopes().row("tbl", "r3").is_none());
        assert!(tree.scopes().row("other", "r1").is_none());
    }

    #[test]
    fn test_registry_later_row_wins() {
        let mut registry = ScopeRegistry::default();
        let scope = BufferName::from("tbl");
        registry.register(&scope, &"r".into(), BufferId::new(1));
        registry.register(&scope, &"r".into(), BufferId::new(2));
        assert_eq!(registry.row("tbl", "r"), Some(BufferId::new(2)));
    }

    #[test]
    fn test_insertion_detected() {
        let (before, before_scope) = table(&[("A", "a"), ("B", "b"), ("C", "c")]);
        let (after, after_scope) = table(&[("A", "a"), ("X", "x"), ("B", "b"), ("C", "c")]);
        let changes = ScopeChanges::compute(&after, after_scope, &before, before_scope);
        assert_eq!(names(&changes), vec![(Some("A"), "X")]);
        assert!(changes.updated.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn test_first_row_insertion_has_no_predecessor() {
        let (before, before_scope) = table(&[("A", "a")]);
        let (after, after_scope) = table(&[("Z", "z"), ("A", "a")]);
        let changes = ScopeChanges::compute(&after, after_scope, &before, before_scope);
        assert_eq!(names(&changes), vec![(None, "Z")]);
    }

    #[test]
    fn test_deletion_detected() {
        let (before, before_scope) = table(&[("A", "a"), ("B", "b"), ("C", "c")]);
        let (after, after_scope) = table(&[("A", "a"), ("C", "c")]);
        let changes = ScopeChanges::compute(&after, after_scope, &before, before_scope);
        assert!(changes.inserted.is_empty());
        assert!(changes.updated.is_empty());
        assert_eq!(changes.deleted, vec![BufferName::from("B")]);
        assert!(changes.has_structural_changes());
        assert!(!changes.has_rerenders());
    }

    #[test]
    fn test_update_detected() {
        let (before, before_scope) = table(&[("A", "a"), ("B", "b")]);
        let (after, after_scope) = table(&[("A", "a"), ("B", "B!")]);
        let changes = ScopeChanges::compute(&after, after_scope, &before, before_scope);
        assert_eq!(changes.updated.len(), 1);
        assert!(changes.rerenders(changes.updated[0]));
        assert!(!changes.has_structural_changes());
        assert_eq!(changes.total(), 1);
    }

    #[test]
    fn test_move_reported_as_insertion() {
        let (before, before_scope) = table(&[("A", "a"), ("B", "b"), ("C", "c")]);
        let (after, after_scope) = table(&[("C", "c"), ("A", "a"), ("B", "b")]);
        let changes = ScopeChanges::compute(&after, after_scope, &before, before_scope);
        assert_eq!(names(&changes), vec![(None, "C")]);
        assert!(changes.deleted.is_empty());
        assert!(changes.updated.is_empty());
    }

    #[test]
    fn test_identical_scope_is_empty() {
        let (tree, scope) = table(&[("A", "a"), ("B", "b")]);
        let changes = ScopeChanges::compute(&tree, scope, &tree, scope);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_longest_increasing() {
        assert_eq!(longest_increasing(&[0, 1, 2]), vec![true, true, true]);
        assert_eq!(longest_increasing(&[2, 0, 1]), vec![false, true, true]);
        assert_eq!(longest_increasing(&[1, 0]).iter().filter(|&&k| k).count(), 1);
        assert!(longest_increasing(&[]).is_empty());
    }
}
