// Order arithmetic over sequence entries
// Shared by Workflow -> Rule entries and Rule -> Action entries

//! # Sequencing Module
//!
//! A Workflow orders its Rules with [`SequenceEntry`] values and a Rule orders
//! its Actions with [`CollectionEntry`] values. Both are lists of
//! `(reference, order)` pairs with the same rules:
//!
//! - orders need not be contiguous, gaps are allowed
//! - inserting at an explicit order shifts every entry at or above it up by one
//! - inserting without an order appends after the highest order (0 when empty)
//! - removing never renumbers the remaining entries
//! - re-ordering one entry never shifts the others
//!
//! ## Rust Learning Notes:
//!
//! ### Trait-Based Generic Functions
//! The functions here are generic over [`OrderedEntry`], so the same insert and
//! remove logic serves both entry types without duplicating it.

use super::remote::{CollectionEntry, RemoteWorkflow, SequenceEntry};

/// An entry that references something by id and carries an order
pub trait OrderedEntry: Clone {
    /// New entry for `id` at `order`
    fn for_reference(id: i64, order: i64) -> Self;

    /// Whether this entry references `id`
    fn references(&self, id: i64) -> bool;

    fn order(&self) -> Option<i64>;

    fn set_order(&mut self, order: i64);
}

impl OrderedEntry for SequenceEntry {
    fn for_reference(id: i64, order: i64) -> Self {
        SequenceEntry {
            collection_sequence_id: id,
            sequence_workflow_id: None,
            order: Some(order),
        }
    }

    fn references(&self, id: i64) -> bool {
        self.collection_sequence_id == id
    }

    fn order(&self) -> Option<i64> {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = Some(order);
    }
}

impl OrderedEntry for CollectionEntry {
    fn for_reference(id: i64, order: i64) -> Self {
        CollectionEntry::for_collection(id, Some(order))
    }

    fn references(&self, id: i64) -> bool {
        self.collection_ids.contains(&id)
    }

    fn order(&self) -> Option<i64> {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = Some(order);
    }
}

/// Order after the highest existing one, or 0 for an empty list
pub fn next_order<E: OrderedEntry>(entries: &[E]) -> i64 {
    entries
        .iter()
        .filter_map(OrderedEntry::order)
        .max()
        .map(|highest| highest + 1)
        .unwrap_or(0)
}

/// Add an entry for `id`, shifting entries at or above an explicit `order`
pub fn insert<E: OrderedEntry>(entries: &mut Vec<E>, id: i64, order: Option<i64>) -> E {
    let order = match order {
        Some(order) => {
            for entry in entries.iter_mut() {
                if let Some(existing) = entry.order() {
                    if existing >= order {
                        entry.set_order(existing + 1);
                    }
                }
            }
            order
        }
        None => next_order(entries),
    };
    let entry = E::for_reference(id, order);
    entries.push(entry.clone());
    entry
}

/// Remove the first entry referencing `id`
pub fn remove<E: OrderedEntry>(entries: &mut Vec<E>, id: i64) -> Option<E> {
    let index = entries.iter().position(|entry| entry.references(id))?;
    Some(entries.remove(index))
}

/// Set the order of the entry referencing `id`; other entries are untouched
pub fn update_order<E: OrderedEntry>(entries: &mut [E], id: i64, new_order: i64) -> Option<&E> {
    let entry = entries.iter_mut().find(|entry| entry.references(id))?;
    entry.set_order(new_order);
    Some(&*entry)
}

/// Drop `collection_id` from every entry, removing entries left with no collections
///
/// Returns true when anything was removed.
pub fn remove_collection(entries: &mut Vec<CollectionEntry>, collection_id: i64) -> bool {
    let before: usize = entries.iter().map(|entry| entry.collection_ids.len()).sum();
    for entry in entries.iter_mut() {
        entry.collection_ids.retain(|id| *id != collection_id);
    }
    entries.retain(|entry| !entry.collection_ids.is_empty());
    let after: usize = entries.iter().map(|entry| entry.collection_ids.len()).sum();
    after < before
}

impl RemoteWorkflow {
    /// Attach a Rule at `priority`, or after the last Rule when absent
    pub fn insert_rule(&mut self, rule_id: i64, priority: Option<i64>) -> SequenceEntry {
        insert(&mut self.additional.sequence_entries, rule_id, priority)
    }

    pub fn remove_rule(&mut self, rule_id: i64) -> Option<SequenceEntry> {
        remove(&mut self.additional.sequence_entries, rule_id)
    }

    pub fn update_rule_order(&mut self, rule_id: i64, priority: i64) -> Option<&SequenceEntry> {
        update_order(&mut self.additional.sequence_entries, rule_id, priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(orders: &[(i64, i64)]) -> Vec<SequenceEntry> {
        orders
            .iter()
            .map(|(id, order)| SequenceEntry::for_reference(*id, *order))
            .collect()
    }

    fn order_of(entries: &[SequenceEntry], id: i64) -> Option<i64> {
        entries.iter().find(|e| e.references(id)).and_then(|e| e.order)
    }

    #[test]
    fn test_insert_without_order_appends() {
        let mut empty: Vec<SequenceEntry> = Vec::new();
        assert_eq!(insert(&mut empty, 1, None).order, Some(0));
        assert_eq!(insert(&mut empty, 2, None).order, Some(1));

        let mut gapped = entries(&[(1, 3), (2, 10)]);
        assert_eq!(insert(&mut gapped, 3, None).order, Some(11));
    }

    #[test]
    fn test_insert_with_order_shifts_at_or_above() {
        let original = entries(&[(10, 0), (11, 1), (12, 3)]);
        for k in 0..=4 {
            let mut shifted = original.clone();
            let inserted = insert(&mut shifted, 99, Some(k));
            assert_eq!(inserted.order, Some(k));
            assert_eq!(shifted.iter().filter(|e| e.order == Some(k)).count(), 1);
            for entry in &original {
                let before = entry.order.unwrap();
                let after = order_of(&shifted, entry.collection_sequence_id).unwrap();
                if before >= k {
                    assert_eq!(after, before + 1);
                } else {
                    assert_eq!(after, before);
                }
            }
        }
    }

    #[test]
    fn test_remove_then_reinsert_restores_sequence() {
        let original = entries(&[(10, 0), (11, 1), (12, 2)]);
        let mut working = original.clone();
        let removed = remove(&mut working, 11).unwrap();
        // gaps are left in place
        assert_eq!(order_of(&working, 12), Some(2));
        assert!(remove(&mut working, 11).is_none());

        insert(&mut working, 11, removed.order);
        assert_eq!(working.len(), original.len());
        assert_eq!(order_of(&working, 11), Some(1));

        let by_order = |list: &[SequenceEntry]| {
            let mut sorted = list.to_vec();
            sorted.sort_by_key(|e| e.order);
            sorted.iter().map(|e| e.collection_sequence_id).collect::<Vec<_>>()
        };
        assert_eq!(by_order(&working), by_order(&original));
    }

    #[test]
    fn test_update_order_does_not_shift_others() {
        let mut working = entries(&[(10, 0), (11, 1)]);
        update_order(&mut working, 10, 1).unwrap();
        assert_eq!(order_of(&working, 10), Some(1));
        assert_eq!(order_of(&working, 11), Some(1));
        assert!(update_order(&mut working, 42, 5).is_none());
    }

    #[test]
    fn test_remove_collection_drops_empty_entries() {
        let mut working = vec![
            CollectionEntry::for_collection(1, Some(0)),
            CollectionEntry {
                collection_ids: vec![2, 3],
                order: Some(1),
                stop_on_match: false,
            },
        ];
        assert!(remove_collection(&mut working, 1));
        assert_eq!(working.len(), 1);
        assert!(remove_collection(&mut working, 2));
        assert_eq!(working[0].collection_ids, vec![3]);
        assert!(!remove_collection(&mut working, 7));
    }
}
