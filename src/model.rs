use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ItemId = String;
pub type ReservationId = i64;

/// Lifecycle state of a physical item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Free,
    CheckedOut,
    InMaintenance,
    Retired,
    /// Status string not known to this crate, kept verbatim.
    #[serde(untagged)]
    Other(String),
}

impl ItemStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "free" | "in-storage" => ItemStatus::Free,
            "checked-out" | "rented" => ItemStatus::CheckedOut,
            "in-maintenance" | "maintenance" | "repair" => ItemStatus::InMaintenance,
            "retired" => ItemStatus::Retired,
            _ => ItemStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemStatus::Free => "free",
            ItemStatus::CheckedOut => "checked-out",
            ItemStatus::InMaintenance => "in-maintenance",
            ItemStatus::Retired => "retired",
            ItemStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ── Source records ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub status: ItemStatus,
    pub serial: Option<String>,
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub daily_price: f64,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub subsubcategory_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSubcategory {
    pub id: i64,
    pub name: String,
    pub subcategory_id: Option<i64>,
}

/// One item joined with everything needed to place it in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemWithProductPath {
    pub item: Item,
    pub product: Option<Product>,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub subsubcategory: Option<SubSubcategory>,
}

/// A booking of one item for a job. Read-only from this crate's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub item_id: ItemId,
    pub reservation_id: ReservationId,
    pub job_name: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Reservation {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

// ── Date ranges ──────────────────────────────────────────────────

/// Inclusive date range `[start, end]`. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn open_ended(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        let ends_before = matches!((self.end, other.start), (Some(e), Some(s)) if e < s);
        let starts_after = matches!((self.start, other.end), (Some(s), Some(e)) if s > e);
        !(ends_before || starts_after)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|s| s <= day) && self.end.is_none_or(|e| day <= e)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(s) => write!(f, "[{s}, ")?,
            None => f.write_str("[-inf, ")?,
        }
        match self.end {
            Some(e) => write!(f, "{e}]"),
            None => f.write_str("+inf]"),
        }
    }
}

// ── Tree ─────────────────────────────────────────────────────────

/// An item as placed in the tree. The availability fields stay `None`
/// until an annotation pass runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: ItemId,
    pub serial: Option<String>,
    pub status: ItemStatus,
    pub product_id: i64,
    pub product_name: String,
    pub daily_price: f64,
    pub available: Option<bool>,
    pub conflicting_reservation_id: Option<ReservationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSubcategoryNode {
    pub id: i64,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<TreeItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcategoryNode {
    pub id: i64,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<TreeItem>,
    pub subsubcategories: Vec<SubSubcategoryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<TreeItem>,
    pub subcategories: Vec<SubcategoryNode>,
}

impl SubSubcategoryNode {
    pub fn recount(&mut self) -> usize {
        self.item_count = self.items.len();
        self.item_count
    }
}

impl SubcategoryNode {
    pub fn recount(&mut self) -> usize {
        let nested: usize = self.subsubcategories.iter_mut().map(|s| s.recount()).sum();
        self.item_count = self.items.len() + nested;
        self.item_count
    }
}

impl CategoryNode {
    /// Recompute `item_count` for this node and every descendant.
    pub fn recount(&mut self) -> usize {
        let nested: usize = self.subcategories.iter_mut().map(|s| s.recount()).sum();
        self.item_count = self.items.len() + nested;
        self.item_count
    }

    /// Every item under this category, direct items first, then depth-first.
    pub fn iter_items(&self) -> impl Iterator<Item = &TreeItem> {
        self.items.iter().chain(self.subcategories.iter().flat_map(|sub| {
            sub.items
                .iter()
                .chain(sub.subsubcategories.iter().flat_map(|ss| ss.items.iter()))
        }))
    }

    pub fn for_each_item_mut(&mut self, mut f: impl FnMut(&mut TreeItem)) {
        self.items.iter_mut().for_each(&mut f);
        for sub in &mut self.subcategories {
            sub.items.iter_mut().for_each(&mut f);
            for ss in &mut sub.subsubcategories {
                ss.items.iter_mut().for_each(&mut f);
            }
        }
    }
}

/// Sum of category counts, i.e. the number of placed items.
pub fn total_items(tree: &[CategoryNode]) -> usize {
    tree.iter().map(|c| c.item_count).sum()
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub conflict: Option<Reservation>,
}

impl Availability {
    pub fn free() -> Self {
        Self {
            available: true,
            conflict: None,
        }
    }

    pub fn blocked_by(reservation: Reservation) -> Self {
        Self {
            available: false,
            conflict: Some(reservation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn status_parse_is_lenient() {
        assert_eq!(ItemStatus::parse("checked_out"), ItemStatus::CheckedOut);
        assert_eq!(ItemStatus::parse("In-Maintenance"), ItemStatus::InMaintenance);
        assert_eq!(ItemStatus::parse("lost"), ItemStatus::Other("lost".into()));
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ItemStatus::CheckedOut).unwrap();
        assert_eq!(json, "\"checked-out\"");
        let other: ItemStatus = serde_json::from_str("\"lost\"").unwrap();
        assert_eq!(other, ItemStatus::Other("lost".into()));
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = DateRange::new(d("2024-06-01"), d("2024-06-10"));
        let b = DateRange::new(d("2024-06-10"), d("2024-06-12"));
        assert!(a.overlaps(&b));
        let c = DateRange::new(d("2024-06-11"), d("2024-06-12"));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn overlap_open_end_extends_forever() {
        let open = DateRange::open_ended(d("2024-01-01"));
        let later = DateRange::new(d("2030-05-01"), d("2030-05-02"));
        assert!(open.overlaps(&later));
        assert!(later.overlaps(&open));
        let earlier = DateRange::new(d("2023-12-01"), d("2023-12-31"));
        assert!(!open.overlaps(&earlier));
    }

    #[test]
    fn overlap_symmetric_over_grid() {
        let days = ["2024-06-01", "2024-06-03", "2024-06-05", "2024-06-07"];
        let mut ranges = vec![DateRange { start: None, end: None }];
        for (i, s) in days.iter().enumerate() {
            ranges.push(DateRange::open_ended(d(s)));
            for e in &days[i..] {
                ranges.push(DateRange::new(d(s), d(e)));
            }
        }
        for a in &ranges {
            for b in &ranges {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn zero_length_range_overlaps_containing_range() {
        let day = DateRange::single_day(d("2024-06-05"));
        let around = DateRange::new(d("2024-06-01"), d("2024-06-10"));
        assert!(around.contains(d("2024-06-05")));
        assert!(day.overlaps(&around));
        assert!(!day.overlaps(&DateRange::new(d("2024-06-06"), d("2024-06-10"))));
    }

    #[test]
    fn recount_sums_descendants() {
        let item = |id: &str| TreeItem {
            id: id.into(),
            serial: None,
            status: ItemStatus::Free,
            product_id: 1,
            product_name: "Mixer".into(),
            daily_price: 10.0,
            available: None,
            conflicting_reservation_id: None,
        };
        let mut cat = CategoryNode {
            id: 1,
            name: "Audio".into(),
            item_count: 0,
            items: vec![item("a")],
            subcategories: vec![SubcategoryNode {
                id: 2,
                name: "Mixers".into(),
                item_count: 0,
                items: vec![item("b")],
                subsubcategories: vec![SubSubcategoryNode {
                    id: 3,
                    name: "Digital".into(),
                    item_count: 0,
                    items: vec![item("c"), item("d")],
                }],
            }],
        };
        assert_eq!(cat.recount(), 4);
        assert_eq!(cat.subcategories[0].item_count, 3);
        assert_eq!(cat.subcategories[0].subsubcategories[0].item_count, 2);
        let ids: Vec<_> = cat.iter_items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
    }
}
