//! Unique-index reconciliation.
//!
//! The reconciler diffs the target set of unique-index values, computed
//! from traversal output, against the rows already stored for the entity
//! and issues the minimal add/update/remove operations. Each half of the
//! input is optional: `None` means "leave that half as stored", while an
//! empty map means "clear it". Conflicting adds are localized value by
//! value and reported back instead of failing the whole operation.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use vellum_adapter::{
    AdapterQueries, NewUniqueValueRow, RepoResult, UniqueConstraint, UniqueValueRow,
};

use crate::entity::UniqueValueConflict;

/// Values per index name, as produced by the unique-index collector.
pub type UniqueValueSet = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Default, PartialEq)]
struct ReconcilePlan {
    adds: Vec<(String, String, bool, bool)>,
    updates: Vec<(i64, bool, bool)>,
    removes: Vec<i64>,
}

fn plan(
    existing: &[UniqueValueRow],
    latest: Option<&UniqueValueSet>,
    published: Option<&UniqueValueSet>,
) -> ReconcilePlan {
    let mut target: BTreeMap<(&str, &str), (bool, bool)> = BTreeMap::new();

    match latest {
        Some(values) => {
            for (index, set) in values {
                for value in set {
                    target.insert((index, value), (true, false));
                }
            }
        }
        None => {
            for row in existing.iter().filter(|row| row.latest) {
                target.insert((&row.index_name, &row.value), (true, false));
            }
        }
    }
    match published {
        Some(values) => {
            for (index, set) in values {
                for value in set {
                    target.entry((index, value)).or_insert((false, false)).1 = true;
                }
            }
        }
        None => {
            for row in existing.iter().filter(|row| row.published) {
                target
                    .entry((&row.index_name, &row.value))
                    .or_insert((false, false))
                    .1 = true;
            }
        }
    }

    let mut result = ReconcilePlan::default();
    for row in existing {
        match target.remove(&(row.index_name.as_str(), row.value.as_str())) {
            Some((latest, published)) => {
                if latest != row.latest || published != row.published {
                    result.updates.push((row.id, latest, published));
                }
            }
            None => result.removes.push(row.id),
        }
    }
    for ((index, value), (latest, published)) in target {
        result
            .adds
            .push((index.to_owned(), value.to_owned(), latest, published));
    }
    result
}

/// Reconciles the stored unique-index values of one entity.
///
/// Returns the values that could not be claimed because another entity
/// owns them; the caller decides whether that invalidates the entity.
pub fn reconcile_unique_values<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    entity_internal_id: i64,
    latest: Option<&UniqueValueSet>,
    published: Option<&UniqueValueSet>,
) -> RepoResult<Vec<UniqueValueConflict>> {
    let existing = txn.unique_values_for_entity(entity_internal_id)?;
    let plan = plan(&existing, latest, published);

    if !plan.removes.is_empty() {
        txn.unique_values_delete(&plan.removes)?;
    }
    for (id, latest, published) in &plan.updates {
        txn.unique_value_update_flags(*id, *latest, *published)?;
    }

    let rows: Vec<NewUniqueValueRow> = plan
        .adds
        .iter()
        .map(|(index_name, value, latest, published)| NewUniqueValueRow {
            index_name: index_name.clone(),
            value: value.clone(),
            entity_internal_id,
            latest: *latest,
            published: *published,
        })
        .collect();
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    // One batch insert first; only on conflict fall back to inserting
    // value by value to localize the conflicting subset.
    if rows.len() > 1 {
        match txn.unique_values_insert(&rows) {
            Ok(()) => return Ok(Vec::new()),
            Err(err) if err == UniqueConstraint::UniqueIndexValue.into_error() => {
                debug!(
                    entity_internal_id,
                    values = rows.len(),
                    "unique value batch conflicted, retrying individually"
                );
            }
            Err(err) => return Err(err),
        }
    }

    let mut conflicts = Vec::new();
    for row in rows {
        match txn.unique_values_insert(std::slice::from_ref(&row)) {
            Ok(()) => {}
            Err(err) if err == UniqueConstraint::UniqueIndexValue.into_error() => {
                conflicts.push(UniqueValueConflict {
                    index_name: row.index_name,
                    value: row.value,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, index: &str, value: &str, latest: bool, published: bool) -> UniqueValueRow {
        UniqueValueRow {
            id,
            index_name: index.into(),
            value: value.into(),
            entity_internal_id: 1,
            latest,
            published,
        }
    }

    fn set(pairs: &[(&str, &[&str])]) -> UniqueValueSet {
        pairs
            .iter()
            .map(|(index, values)| {
                (
                    (*index).to_owned(),
                    values.iter().map(|v| (*v).to_owned()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn new_values_are_added() {
        let plan = plan(&[], Some(&set(&[("slugs", &["a", "b"])])), None);
        assert_eq!(
            plan.adds,
            vec![
                ("slugs".into(), "a".into(), true, false),
                ("slugs".into(), "b".into(), true, false),
            ]
        );
        assert!(plan.updates.is_empty());
        assert!(plan.removes.is_empty());
    }

    #[test]
    fn stale_values_are_removed() {
        let existing = [row(10, "slugs", "old", true, false)];
        let plan = plan(&existing, Some(&set(&[("slugs", &["new"])])), None);
        assert_eq!(plan.removes, vec![10]);
        assert_eq!(plan.adds.len(), 1);
    }

    #[test]
    fn none_half_is_left_untouched() {
        let existing = [
            row(1, "slugs", "draft-only", true, false),
            row(2, "slugs", "live", true, true),
        ];
        // Publishing the draft set without touching latest.
        let plan = plan(&existing, None, Some(&set(&[("slugs", &["live"])])));
        assert!(plan.adds.is_empty());
        assert!(plan.removes.is_empty());
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn empty_half_clears_it() {
        let existing = [
            row(1, "slugs", "draft-only", true, false),
            row(2, "slugs", "live", true, true),
        ];
        // Unpublish: published half becomes empty, latest untouched.
        let plan = plan(&existing, None, Some(&UniqueValueSet::new()));
        assert!(plan.adds.is_empty());
        assert!(plan.removes.is_empty());
        assert_eq!(plan.updates, vec![(2, true, false)]);
    }

    #[test]
    fn value_kept_published_after_draft_edit_removes_it() {
        let existing = [row(1, "slugs", "launch", true, true)];
        // Draft edit drops the value; it stays live in the published view.
        let plan = plan(&existing, Some(&UniqueValueSet::new()), None);
        assert!(plan.removes.is_empty());
        assert_eq!(plan.updates, vec![(1, false, true)]);
    }

    #[test]
    fn value_absent_from_both_halves_is_removed() {
        let existing = [row(1, "slugs", "gone", true, true)];
        let plan = plan(
            &existing,
            Some(&UniqueValueSet::new()),
            Some(&UniqueValueSet::new()),
        );
        assert_eq!(plan.removes, vec![1]);
    }

    #[test]
    fn published_overlay_ors_with_latest() {
        let plan = plan(
            &[],
            Some(&set(&[("slugs", &["a"])])),
            Some(&set(&[("slugs", &["a", "b"])])),
        );
        assert_eq!(
            plan.adds,
            vec![
                ("slugs".into(), "a".into(), true, true),
                ("slugs".into(), "b".into(), false, true),
            ]
        );
    }
}
