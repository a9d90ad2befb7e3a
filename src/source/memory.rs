use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::*;

use super::{RecordSource, SourceError};

/// In-process record source. Backs the tests and the `--demo` CLI mode,
/// and doubles as a reference for what the SQL adapter must return.
pub struct MemorySource {
    categories: DashMap<i64, Category>,
    subcategories: DashMap<i64, Subcategory>,
    subsubcategories: DashMap<i64, SubSubcategory>,
    products: DashMap<i64, Product>,
    items: DashMap<ItemId, Item>,
    /// item id → reservations on that item
    reservations: DashMap<ItemId, Vec<Reservation>>,
    unavailable: AtomicBool,
    hierarchy_queries: AtomicUsize,
    item_queries: AtomicUsize,
    batch_queries: AtomicUsize,
    single_queries: AtomicUsize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            categories: DashMap::new(),
            subcategories: DashMap::new(),
            subsubcategories: DashMap::new(),
            products: DashMap::new(),
            items: DashMap::new(),
            reservations: DashMap::new(),
            unavailable: AtomicBool::new(false),
            hierarchy_queries: AtomicUsize::new(0),
            item_queries: AtomicUsize::new(0),
            batch_queries: AtomicUsize::new(0),
            single_queries: AtomicUsize::new(0),
        }
    }

    // ── Writes ───────────────────────────────────────────────────

    pub fn insert_category(&self, category: Category) {
        self.categories.insert(category.id, category);
    }

    pub fn insert_subcategory(&self, subcategory: Subcategory) {
        self.subcategories.insert(subcategory.id, subcategory);
    }

    pub fn insert_subsubcategory(&self, subsubcategory: SubSubcategory) {
        self.subsubcategories.insert(subsubcategory.id, subsubcategory);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn insert_item(&self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn remove_item(&self, item_id: &str) -> Option<Item> {
        self.reservations.remove(item_id);
        self.items.remove(item_id).map(|(_, item)| item)
    }

    pub fn set_item_status(&self, item_id: &str, status: ItemStatus) -> bool {
        match self.items.get_mut(item_id) {
            Some(mut item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }

    pub fn insert_reservation(&self, reservation: Reservation) {
        self.reservations
            .entry(reservation.item_id.clone())
            .or_default()
            .push(reservation);
    }

    /// Simulate an outage: every query fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // ── Query counters ───────────────────────────────────────────

    pub fn hierarchy_queries(&self) -> usize {
        self.hierarchy_queries.load(Ordering::SeqCst)
    }

    pub fn item_queries(&self) -> usize {
        self.item_queries.load(Ordering::SeqCst)
    }

    pub fn batch_queries(&self) -> usize {
        self.batch_queries.load(Ordering::SeqCst)
    }

    pub fn single_queries(&self) -> usize {
        self.single_queries.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Connection("memory source marked unavailable".into()));
        }
        Ok(())
    }

    fn resolve_path(&self, item: &Item) -> ItemWithProductPath {
        let product = item
            .product_id
            .and_then(|id| self.products.get(&id).map(|p| p.value().clone()));
        let link = |f: fn(&Product) -> Option<i64>| product.as_ref().and_then(f);
        let category = link(|p| p.category_id)
            .and_then(|id| self.categories.get(&id).map(|c| c.value().clone()));
        let subcategory = link(|p| p.subcategory_id)
            .and_then(|id| self.subcategories.get(&id).map(|s| s.value().clone()));
        let subsubcategory = link(|p| p.subsubcategory_id)
            .and_then(|id| self.subsubcategories.get(&id).map(|s| s.value().clone()));
        ItemWithProductPath {
            item: item.clone(),
            product,
            category,
            subcategory,
            subsubcategory,
        }
    }
}

/// Ascending with missing values last, matching the SQL adapter's
/// `ORDER BY ... NULLS LAST`.
fn nulls_last(name: Option<&str>) -> (bool, String) {
    (name.is_none(), name.unwrap_or_default().to_string())
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn list_items_with_hierarchy(&self) -> Result<Vec<ItemWithProductPath>, SourceError> {
        self.hierarchy_queries.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut rows: Vec<ItemWithProductPath> = self
            .items
            .iter()
            .map(|entry| self.resolve_path(entry.value()))
            .collect();
        rows.sort_by_cached_key(|row| {
            (
                nulls_last(row.category.as_ref().map(|c| c.name.as_str())),
                nulls_last(row.subcategory.as_ref().map(|s| s.name.as_str())),
                nulls_last(row.subsubcategory.as_ref().map(|s| s.name.as_str())),
                nulls_last(row.item.serial.as_deref()),
                row.item.id.clone(),
            )
        });
        Ok(rows)
    }

    async fn list_items(&self) -> Result<Vec<Item>, SourceError> {
        self.item_queries.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut items: Vec<Item> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn list_reservations_overlapping(
        &self,
        item_ids: &HashSet<ItemId>,
        range: DateRange,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(ItemId, ReservationId)>, SourceError> {
        self.batch_queries.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut pairs: Vec<(ItemId, ReservationId)> = item_ids
            .iter()
            .filter_map(|id| self.reservations.get(id))
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| Some(r.reservation_id) != exclude)
                    .filter(|r| r.range().overlaps(&range))
                    .map(|r| (r.item_id.clone(), r.reservation_id))
                    .collect::<Vec<_>>()
            })
            .collect();
        pairs.sort();
        Ok(pairs)
    }

    async fn list_reservations_for_item(
        &self,
        item_id: &str,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<Reservation>, SourceError> {
        self.single_queries.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        let mut found: Vec<Reservation> = self
            .reservations
            .get(item_id)
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| Some(r.reservation_id) != exclude)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|r| (r.start, r.reservation_id));
        Ok(found)
    }
}
