use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_postgres::{Client, NoTls, Row};

use crate::model::*;

use super::{RecordSource, SourceError};

const ITEMS_WITH_HIERARCHY: &str = "\
SELECT i.id, i.status, i.serial,
       p.id, p.name, p.daily_price::float8, p.category_id, p.subcategory_id, p.subsubcategory_id,
       c.id, c.name,
       s.id, s.name, s.category_id,
       ss.id, ss.name, ss.subcategory_id
FROM items i
LEFT JOIN products p ON p.id = i.product_id
LEFT JOIN categories c ON c.id = p.category_id
LEFT JOIN subcategories s ON s.id = p.subcategory_id
LEFT JOIN subsubcategories ss ON ss.id = p.subsubcategory_id
ORDER BY c.name NULLS LAST, s.name NULLS LAST, ss.name NULLS LAST, i.serial NULLS LAST, i.id";

const ITEMS: &str = "SELECT id, status, serial, product_id FROM items ORDER BY id";

// A NULL bound on either side is unbounded, so the overlap test
// `NOT (e1 < s2 OR s1 > e2)` only fires when both dates are present.
const RESERVATIONS_OVERLAPPING: &str = "\
SELECT ji.item_id, j.id
FROM job_items ji
JOIN jobs j ON j.id = ji.job_id
WHERE ji.item_id = ANY($1)
  AND NOT (j.end_date IS NOT NULL AND $2::date IS NOT NULL AND j.end_date < $2::date)
  AND NOT (j.start_date IS NOT NULL AND $3::date IS NOT NULL AND j.start_date > $3::date)
  AND ($4::bigint IS NULL OR j.id <> $4::bigint)
ORDER BY ji.item_id, j.id";

const RESERVATIONS_FOR_ITEM: &str = "\
SELECT ji.item_id, j.id, j.name, j.start_date, j.end_date
FROM job_items ji
JOIN jobs j ON j.id = ji.job_id
WHERE ji.item_id = $1
  AND ($2::bigint IS NULL OR j.id <> $2::bigint)
ORDER BY j.start_date NULLS FIRST, j.id";

impl From<tokio_postgres::Error> for SourceError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.is_closed() {
            SourceError::Connection(e.to_string())
        } else {
            SourceError::Query(e.to_string())
        }
    }
}

/// PostgreSQL-backed record source.
///
/// Expects tables `items`, `products`, `categories`, `subcategories`,
/// `subsubcategories`, `jobs` and the `job_items` link table.
pub struct PgSource {
    client: Client,
}

impl PgSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect and spawn the connection driver on the current runtime.
    pub async fn connect(database_url: &str) -> Result<Self, SourceError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("postgres connection error: {e}");
            }
        });
        Ok(Self::new(client))
    }
}

fn item_from_row(row: &Row) -> Result<Item, tokio_postgres::Error> {
    let status: String = row.try_get(1)?;
    Ok(Item {
        id: row.try_get(0)?,
        status: ItemStatus::parse(&status),
        serial: row.try_get(2)?,
        product_id: None,
    })
}

fn path_from_row(row: &Row) -> Result<ItemWithProductPath, tokio_postgres::Error> {
    let mut item = item_from_row(row)?;
    let product_id: Option<i64> = row.try_get(3)?;
    item.product_id = product_id;

    let product = match product_id {
        Some(id) => Some(Product {
            id,
            name: row.try_get(4)?,
            daily_price: row.try_get::<_, Option<f64>>(5)?.unwrap_or_default(),
            category_id: row.try_get(6)?,
            subcategory_id: row.try_get(7)?,
            subsubcategory_id: row.try_get(8)?,
        }),
        None => None,
    };
    let category = match row.try_get::<_, Option<i64>>(9)? {
        Some(id) => Some(Category {
            id,
            name: row.try_get(10)?,
        }),
        None => None,
    };
    let subcategory = match row.try_get::<_, Option<i64>>(11)? {
        Some(id) => Some(Subcategory {
            id,
            name: row.try_get(12)?,
            category_id: row.try_get(13)?,
        }),
        None => None,
    };
    let subsubcategory = match row.try_get::<_, Option<i64>>(14)? {
        Some(id) => Some(SubSubcategory {
            id,
            name: row.try_get(15)?,
            subcategory_id: row.try_get(16)?,
        }),
        None => None,
    };

    Ok(ItemWithProductPath {
        item,
        product,
        category,
        subcategory,
        subsubcategory,
    })
}

#[async_trait]
impl RecordSource for PgSource {
    async fn list_items_with_hierarchy(&self) -> Result<Vec<ItemWithProductPath>, SourceError> {
        let rows = self.client.query(ITEMS_WITH_HIERARCHY, &[]).await?;
        rows.iter()
            .map(|row| path_from_row(row).map_err(SourceError::from))
            .collect()
    }

    async fn list_items(&self) -> Result<Vec<Item>, SourceError> {
        let rows = self.client.query(ITEMS, &[]).await?;
        rows.iter()
            .map(|row| -> Result<Item, SourceError> {
                let mut item = item_from_row(row)?;
                item.product_id = row.try_get(3)?;
                Ok(item)
            })
            .collect()
    }

    async fn list_reservations_overlapping(
        &self,
        item_ids: &HashSet<ItemId>,
        range: DateRange,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<(ItemId, ReservationId)>, SourceError> {
        let ids: Vec<&str> = item_ids.iter().map(String::as_str).collect();
        let rows = self
            .client
            .query(
                RESERVATIONS_OVERLAPPING,
                &[&ids, &range.start, &range.end, &exclude],
            )
            .await?;
        rows.iter()
            .map(|row| -> Result<(ItemId, ReservationId), SourceError> {
                Ok((row.try_get(0)?, row.try_get(1)?))
            })
            .collect()
    }

    async fn list_reservations_for_item(
        &self,
        item_id: &str,
        exclude: Option<ReservationId>,
    ) -> Result<Vec<Reservation>, SourceError> {
        let rows = self
            .client
            .query(RESERVATIONS_FOR_ITEM, &[&item_id, &exclude])
            .await?;
        rows.iter()
            .map(|row| -> Result<Reservation, SourceError> {
                Ok(Reservation {
                    item_id: row.try_get(0)?,
                    reservation_id: row.try_get(1)?,
                    job_name: row.try_get(2)?,
                    start: row.try_get::<_, Option<NaiveDate>>(3)?,
                    end: row.try_get::<_, Option<NaiveDate>>(4)?,
                })
            })
            .collect()
    }
}
