mod annotate;
mod conflict;
mod error;
mod hierarchy;

pub use annotate::{AnnotatedTree, annotate, apply_conflicts, item_ids, retain_available};
pub use conflict::{first_conflict, overlaps};
pub use error::EngineError;
pub use hierarchy::{BuildReport, SkipReason, build_tree, build_tree_with_report};

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::Config;
use crate::model::*;
use crate::observability::*;
use crate::source::RecordSource;

use conflict::validate_range;

pub type Tree = Vec<CategoryNode>;

pub const ITEMS_CACHE: &str = "items";
pub const TREE_CACHE: &str = "tree";

/// Cached inventory tree and availability queries over a record source.
///
/// The two caches are independent: each has its own lock and window, and
/// they may be stale relative to each other.
pub struct Inventory<S> {
    source: S,
    items: TtlCache<Vec<Item>>,
    tree: TtlCache<Tree>,
}

impl<S: RecordSource> Inventory<S> {
    pub fn new(source: S, config: &Config) -> Self {
        Self::with_caches(
            source,
            TtlCache::new(ITEMS_CACHE, config.items_ttl),
            TtlCache::new(TREE_CACHE, config.tree_ttl),
        )
    }

    pub fn with_caches(source: S, items: TtlCache<Vec<Item>>, tree: TtlCache<Tree>) -> Self {
        Self {
            source,
            items,
            tree,
        }
    }

    pub fn tree_cache(&self) -> &TtlCache<Tree> {
        &self.tree
    }

    fn source_failed(&self, op: &'static str, e: crate::source::SourceError) -> EngineError {
        warn!(op, "record source query failed: {e}");
        metrics::counter!(SOURCE_ERRORS_TOTAL, "op" => op).increment(1);
        EngineError::SourceUnavailable(e)
    }

    async fn rebuild_tree(&self) -> Result<BuildReport, EngineError> {
        let started = Instant::now();
        let rows = self
            .source
            .list_items_with_hierarchy()
            .await
            .map_err(|e| self.source_failed("list_items_with_hierarchy", e))?;
        let row_count = rows.len();
        let report = build_tree_with_report(rows);
        metrics::histogram!(TREE_BUILD_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            rows = row_count,
            categories = report.tree.len(),
            dropped = report.dropped,
            "inventory tree rebuilt"
        );
        Ok(report)
    }

    /// Cached tree, rebuilt from the source on a miss. Failures are not
    /// cached, and a build overtaken by [`invalidate`](Self::invalidate) is
    /// returned to its caller without being cached.
    pub async fn get_tree(&self) -> Result<Arc<Tree>, EngineError> {
        let read = self.tree.get().await;
        if read.hit
            && let Some(tree) = read.value
        {
            return Ok(tree);
        }
        let report = self.rebuild_tree().await?;
        Ok(self.tree.fill(read.generation, report.tree).await)
    }

    /// Like [`get_tree`](Self::get_tree) but never fails: on a build error
    /// the stale cached tree is returned, or an empty one.
    pub async fn get_tree_or_fallback(&self) -> Arc<Tree> {
        let read = self.tree.get().await;
        if read.hit
            && let Some(tree) = &read.value
        {
            return tree.clone();
        }
        match self.rebuild_tree().await {
            Ok(report) => self.tree.fill(read.generation, report.tree).await,
            Err(e) => {
                metrics::counter!(TREE_FALLBACKS_TOTAL).increment(1);
                match read.value {
                    Some(stale) => {
                        warn!("serving stale inventory tree: {e}");
                        stale
                    }
                    None => {
                        warn!("serving empty inventory tree: {e}");
                        Arc::new(Vec::new())
                    }
                }
            }
        }
    }

    /// Tree annotated for `[start, end]`. The annotation runs on a private
    /// copy and is never cached.
    pub async fn get_tree_with_availability(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<ReservationId>,
    ) -> Result<AnnotatedTree, EngineError> {
        let range = validate_range(start, end)?;
        let shared = self.get_tree().await?;
        let mut categories: Tree = (*shared).clone();

        let started = Instant::now();
        let (available_count, unavailable_count) =
            annotate(&self.source, &mut categories, range, exclude)
                .await
                .map_err(|e| match e {
                    EngineError::SourceUnavailable(e) => {
                        self.source_failed("list_reservations_overlapping", e)
                    }
                    other => other,
                })?;
        metrics::histogram!(ANNOTATE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(%range, available_count, unavailable_count, "tree annotated");

        Ok(AnnotatedTree {
            range,
            categories,
            available_count,
            unavailable_count,
        })
    }

    /// Whether one item is free for `[start, end]`. Bypasses both caches.
    /// An error means "unknown" and must block any assignment.
    pub async fn check_item_availability(
        &self,
        item_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<ReservationId>,
    ) -> Result<Availability, EngineError> {
        let range = validate_range(start, end)?;
        let reservations = match self.source.list_reservations_for_item(item_id, exclude).await {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!(AVAILABILITY_CHECKS_TOTAL, "outcome" => "error").increment(1);
                return Err(self.source_failed("list_reservations_for_item", e));
            }
        };
        let result = match first_conflict(&reservations, &range) {
            Some(conflict) => {
                debug!(
                    item_id,
                    %range,
                    reservation_id = conflict.reservation_id,
                    "item unavailable"
                );
                Availability::blocked_by(conflict.clone())
            }
            None => Availability::free(),
        };
        let outcome = if result.available { "available" } else { "conflict" };
        metrics::counter!(AVAILABILITY_CHECKS_TOTAL, "outcome" => outcome).increment(1);
        Ok(result)
    }

    async fn get_items(&self) -> Result<Arc<Vec<Item>>, EngineError> {
        let read = self.items.get().await;
        if read.hit
            && let Some(items) = read.value
        {
            return Ok(items);
        }
        let items = self
            .source
            .list_items()
            .await
            .map_err(|e| self.source_failed("list_items", e))?;
        Ok(self.items.fill(read.generation, items).await)
    }

    /// One page of the flat item list. `page` is 1-based; page 0 is treated
    /// as page 1 and `per_page` is at least 1.
    pub async fn list_items(&self, page: usize, per_page: usize) -> Result<ItemPage, EngineError> {
        let all = self.get_items().await?;
        let page = page.max(1);
        let per_page = per_page.max(1);
        let items = all
            .iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();
        Ok(ItemPage {
            items,
            page,
            per_page,
            total: all.len(),
        })
    }

    /// Force both caches to miss on their next read. The previous tree stays
    /// available to [`get_tree_or_fallback`](Self::get_tree_or_fallback).
    pub async fn invalidate(&self) {
        self.items.invalidate().await;
        self.tree.invalidate().await;
        info!("inventory caches invalidated");
    }
}
