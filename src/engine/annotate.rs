use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::*;
use crate::source::RecordSource;

use super::EngineError;

/// A request-owned tree with availability marked on every item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTree {
    pub range: DateRange,
    pub categories: Vec<CategoryNode>,
    pub available_count: usize,
    pub unavailable_count: usize,
}

impl AnnotatedTree {
    /// Drop unavailable items and any node left empty. Counts are
    /// recomputed so the per-node invariant still holds.
    pub fn retain_available(&mut self) {
        retain_available(&mut self.categories);
        self.unavailable_count = 0;
        self.available_count = total_items(&self.categories);
    }
}

pub fn item_ids(tree: &[CategoryNode]) -> HashSet<ItemId> {
    tree.iter()
        .flat_map(|c| c.iter_items())
        .map(|i| i.id.clone())
        .collect()
}

/// Mark every item from a precomputed item → reservation map. Items not in
/// the map are available. Returns `(available, unavailable)`.
pub fn apply_conflicts(
    tree: &mut [CategoryNode],
    conflicts: &HashMap<ItemId, ReservationId>,
) -> (usize, usize) {
    let mut available = 0usize;
    let mut unavailable = 0usize;
    for category in tree.iter_mut() {
        category.for_each_item_mut(|item| match conflicts.get(&item.id) {
            Some(rid) => {
                item.available = Some(false);
                item.conflicting_reservation_id = Some(*rid);
                unavailable += 1;
            }
            None => {
                item.available = Some(true);
                item.conflicting_reservation_id = None;
                available += 1;
            }
        });
    }
    (available, unavailable)
}

/// One batch conflict query for every item in `tree`, then a single walk.
///
/// Conflicts are fetched before anything is written, so on error the tree
/// is returned to the caller exactly as it came in.
pub async fn annotate<S: RecordSource + ?Sized>(
    source: &S,
    tree: &mut [CategoryNode],
    range: DateRange,
    exclude: Option<ReservationId>,
) -> Result<(usize, usize), EngineError> {
    let ids = item_ids(tree);
    let mut conflicts: HashMap<ItemId, ReservationId> = HashMap::new();
    if !ids.is_empty() {
        for (item_id, rid) in source
            .list_reservations_overlapping(&ids, range, exclude)
            .await?
        {
            conflicts.entry(item_id).or_insert(rid);
        }
    }
    Ok(apply_conflicts(tree, &conflicts))
}

pub fn retain_available(tree: &mut Vec<CategoryNode>) {
    let free = |i: &TreeItem| i.available != Some(false);
    for category in tree.iter_mut() {
        category.items.retain(free);
        for sub in &mut category.subcategories {
            sub.items.retain(free);
            for ss in &mut sub.subsubcategories {
                ss.items.retain(free);
            }
            sub.subsubcategories.retain(|ss| !ss.items.is_empty());
        }
        category
            .subcategories
            .retain(|s| !s.items.is_empty() || !s.subsubcategories.is_empty());
        category.recount();
    }
    tree.retain(|c| c.item_count > 0);
}
