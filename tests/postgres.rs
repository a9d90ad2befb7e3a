use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use tokio_postgres::NoTls;

use gearlist::model::*;
use gearlist::source::{PgSource, RecordSource};

// Runs only when GEARLIST_TEST_DATABASE_URL points at a scratch database.
// Every test works in its own schema and drops it afterwards.

// ── Test infrastructure ──────────────────────────────────────

static SCHEMA_SEQ: AtomicUsize = AtomicUsize::new(0);

const SCHEMA: &str = "
CREATE TABLE categories (id bigint PRIMARY KEY, name text NOT NULL);
CREATE TABLE subcategories (id bigint PRIMARY KEY, name text NOT NULL, category_id bigint);
CREATE TABLE subsubcategories (id bigint PRIMARY KEY, name text NOT NULL, subcategory_id bigint);
CREATE TABLE products (
    id bigint PRIMARY KEY,
    name text NOT NULL,
    daily_price numeric(10, 2),
    category_id bigint,
    subcategory_id bigint,
    subsubcategory_id bigint
);
CREATE TABLE items (id text PRIMARY KEY, status text NOT NULL, serial text, product_id bigint);
CREATE TABLE jobs (id bigint PRIMARY KEY, name text, start_date date, end_date date);
CREATE TABLE job_items (job_id bigint NOT NULL, item_id text NOT NULL);

INSERT INTO categories VALUES (1, 'Audio'), (2, 'Video');
INSERT INTO subcategories VALUES (10, 'Mixers', 1);
INSERT INTO products VALUES
    (100, 'Desk', 120.00, 1, 10, NULL),
    (200, 'Cinema camera', 250.00, 2, NULL, NULL);
INSERT INTO items VALUES
    ('MIX-001', 'free', 'M1', 100),
    ('CAM-001', 'free', 'C1', 200),
    ('CAM-002', 'maintenance', 'C2', 200);
INSERT INTO jobs VALUES
    (42, 'Festival', '2024-06-01', '2024-06-10'),
    (43, 'Long hire', '2024-07-01', NULL),
    (44, 'Studio', '2024-06-05', '2024-06-06');
INSERT INTO job_items VALUES (42, 'CAM-001'), (43, 'CAM-002'), (44, 'MIX-001');
";

struct Scratch {
    source: PgSource,
    admin: tokio_postgres::Client,
    schema: String,
}

impl Scratch {
    async fn drop_schema(self) {
        self.admin
            .batch_execute(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .await
            .unwrap();
    }
}

async fn client(url: &str) -> tokio_postgres::Client {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

async fn scratch() -> Option<Scratch> {
    let Ok(url) = std::env::var("GEARLIST_TEST_DATABASE_URL") else {
        eprintln!("GEARLIST_TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let schema = format!(
        "gearlist_test_{}_{}",
        std::process::id(),
        SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
    );

    let admin = client(&url).await;
    admin
        .batch_execute(&format!("CREATE SCHEMA {schema}; SET search_path TO {schema};{SCHEMA}"))
        .await
        .unwrap();

    let session = client(&url).await;
    session
        .batch_execute(&format!("SET search_path TO {schema}"))
        .await
        .unwrap();

    Some(Scratch {
        source: PgSource::new(session),
        admin,
        schema,
    })
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn ids(list: &[&str]) -> HashSet<ItemId> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn hierarchy_rows_carry_product_path() {
    let Some(db) = scratch().await else { return };
    let rows = db.source.list_items_with_hierarchy().await.unwrap();

    assert_eq!(rows.len(), 3);
    // Ordered by category name first: Audio before Video.
    assert_eq!(rows[0].item.id, "MIX-001");
    assert_eq!(rows[0].subcategory.as_ref().unwrap().name, "Mixers");
    assert_eq!(rows[0].product.as_ref().unwrap().daily_price, 120.0);
    let cam2 = rows.iter().find(|r| r.item.id == "CAM-002").unwrap();
    assert_eq!(cam2.item.status, ItemStatus::InMaintenance);
    assert!(cam2.subcategory.is_none());

    let items = db.source.list_items().await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].id, "CAM-001");
    assert_eq!(items[0].product_id, Some(200));
    db.drop_schema().await;
}

#[tokio::test]
async fn camera_reservation_blocks_overlapping_range() {
    let Some(db) = scratch().await else { return };
    let src = &db.source;

    let hit = src
        .list_reservations_overlapping(
            &ids(&["CAM-001"]),
            DateRange::new(d("2024-06-05"), d("2024-06-07")),
            None,
        )
        .await
        .unwrap();
    assert_eq!(hit, vec![("CAM-001".to_string(), 42)]);

    // Bounds are inclusive: a range starting on the last day still overlaps.
    let edge = src
        .list_reservations_overlapping(&ids(&["CAM-001"]), DateRange::single_day(d("2024-06-10")), None)
        .await
        .unwrap();
    assert_eq!(edge.len(), 1);

    let after = src
        .list_reservations_overlapping(
            &ids(&["CAM-001"]),
            DateRange::new(d("2024-06-11"), d("2024-06-15")),
            None,
        )
        .await
        .unwrap();
    assert!(after.is_empty());
    db.drop_schema().await;
}

#[tokio::test]
async fn excluded_reservation_is_skipped() {
    let Some(db) = scratch().await else { return };
    let src = &db.source;

    let own = src
        .list_reservations_for_item("CAM-001", Some(42))
        .await
        .unwrap();
    assert!(own.is_empty());

    let all = src.list_reservations_for_item("CAM-001", None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].reservation_id, 42);
    assert_eq!(all[0].job_name.as_deref(), Some("Festival"));
    assert_eq!(all[0].range(), DateRange::new(d("2024-06-01"), d("2024-06-10")));

    let overlapping = src
        .list_reservations_overlapping(
            &ids(&["CAM-001"]),
            DateRange::new(d("2024-06-01"), d("2024-06-10")),
            Some(42),
        )
        .await
        .unwrap();
    assert!(overlapping.is_empty());
    db.drop_schema().await;
}

#[tokio::test]
async fn open_ended_reservation_blocks_every_later_range() {
    let Some(db) = scratch().await else { return };
    let src = &db.source;

    let later = src
        .list_reservations_overlapping(
            &ids(&["CAM-002"]),
            DateRange::new(d("2030-01-01"), d("2030-01-02")),
            None,
        )
        .await
        .unwrap();
    assert_eq!(later, vec![("CAM-002".to_string(), 43)]);

    let before = src
        .list_reservations_overlapping(
            &ids(&["CAM-002"]),
            DateRange::new(d("2024-06-01"), d("2024-06-30")),
            None,
        )
        .await
        .unwrap();
    assert!(before.is_empty());

    let row = src.list_reservations_for_item("CAM-002", None).await.unwrap();
    assert_eq!(row[0].end, None);
    db.drop_schema().await;
}

#[tokio::test]
async fn batch_query_covers_many_items_minus_excluded() {
    let Some(db) = scratch().await else { return };
    let src = &db.source;
    let all = ids(&["MIX-001", "CAM-001", "CAM-002"]);
    let june = DateRange::new(d("2024-06-01"), d("2024-07-15"));

    let mut hits = src
        .list_reservations_overlapping(&all, june, None)
        .await
        .unwrap();
    hits.sort();
    assert_eq!(
        hits,
        vec![
            ("CAM-001".to_string(), 42),
            ("CAM-002".to_string(), 43),
            ("MIX-001".to_string(), 44),
        ]
    );

    let without = src
        .list_reservations_overlapping(&all, june, Some(44))
        .await
        .unwrap();
    assert_eq!(without.len(), 2);
    assert!(without.iter().all(|(id, _)| id != "MIX-001"));

    let none = src
        .list_reservations_overlapping(&HashSet::new(), june, None)
        .await
        .unwrap();
    assert!(none.is_empty());
    db.drop_schema().await;
}
