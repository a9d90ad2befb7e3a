//! Read-only access to the durable inventory store.
//!
//! The engine never writes through these interfaces. Everything it derives
//! from them (caches, trees, annotations) can be thrown away and rebuilt.

mod memory;
mod postgres;

pub use memory::MemorySource;
pub use postgres::PgSource;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::model::*;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every item joined with product and category path, ordered by
    /// category name, subcategory name, sub-subcategory name, item serial.
    async fn list_items_with_hierarchy(&self) -> Result<Vec<ItemWithProductPath>, SourceError>;

    /// Flat item list ordered by id, for paginated listings.
    async fn list_items(&self) -> Result<Vec<Item>, SourceError>;

    /// `(item_id, reservation_id)` for every reservation on one of
    /// `item_ids` that overlaps `range`, skipping `exclude`.
    async fn list_reservations_overlapping(
        &self,
        item_ids: &HashSet<ItemId>,
        range: DateRange,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(ItemId, ReservationId)>, SourceError>;

    /// All reservations of one item, skipping `exclude`.
    async fn list_reservations_for_item(
        &self,
        item_id: &str,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<Reservation>, SourceError>;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for std::sync::Arc<S> {
    async fn list_items_with_hierarchy(&self) -> Result<Vec<ItemWithProductPath>, SourceError> {
        (**self).list_items_with_hierarchy().await
    }

    async fn list_items(&self) -> Result<Vec<Item>, SourceError> {
        (**self).list_items().await
    }

    async fn list_reservations_overlapping(
        &self,
        item_ids: &HashSet<ItemId>,
        range: DateRange,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(ItemId, ReservationId)>, SourceError> {
        (**self)
            .list_reservations_overlapping(item_ids, range, exclude)
            .await
    }

    async fn list_reservations_for_item(
        &self,
        item_id: &str,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<Reservation>, SourceError> {
        (**self).list_reservations_for_item(item_id, exclude).await
    }
}
