use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::model::*;
use crate::observability::TREE_ITEMS_DROPPED_TOTAL;

/// Why a record could not be placed in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingProduct,
    MissingCategory,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::MissingProduct => "missing_product",
            SkipReason::MissingCategory => "missing_category",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub tree: Vec<CategoryNode>,
    /// Records skipped because they could not be placed.
    pub dropped: usize,
}

/// Where one item lands in the three-level tree.
enum Placement {
    Direct,
    Sub(Subcategory),
    SubSub(Subcategory, SubSubcategory),
}

struct Classified {
    item: TreeItem,
    category: Category,
    placement: Placement,
}

fn classify(row: ItemWithProductPath) -> Result<Classified, (ItemId, SkipReason)> {
    let ItemWithProductPath {
        item,
        product,
        category,
        subcategory,
        subsubcategory,
    } = row;
    let Some(product) = product else {
        return Err((item.id, SkipReason::MissingProduct));
    };
    let Some(category) = category else {
        return Err((item.id, SkipReason::MissingCategory));
    };
    // A sub-subcategory cannot be placed without its subcategory level.
    let placement = match (subcategory, subsubcategory) {
        (Some(sub), Some(subsub)) => Placement::SubSub(sub, subsub),
        (Some(sub), None) => Placement::Sub(sub),
        (None, _) => Placement::Direct,
    };
    Ok(Classified {
        item: TreeItem {
            id: item.id,
            serial: item.serial,
            status: item.status,
            product_id: product.id,
            product_name: product.name,
            daily_price: product.daily_price,
            available: None,
            conflicting_reservation_id: None,
        },
        category,
        placement,
    })
}

/// Category node under construction plus the key → position indexes for
/// its children. Positions follow first-seen order, so later stable sorts
/// break name ties by source order.
struct CategoryBuilder {
    node: CategoryNode,
    subs: HashMap<i64, usize>,
    subsubs: HashMap<(i64, i64), usize>,
}

impl CategoryBuilder {
    fn new(category: Category) -> Self {
        Self {
            node: CategoryNode {
                id: category.id,
                name: category.name,
                item_count: 0,
                items: Vec::new(),
                subcategories: Vec::new(),
            },
            subs: HashMap::new(),
            subsubs: HashMap::new(),
        }
    }

    fn sub_slot(&mut self, sub: Subcategory) -> usize {
        let subs = &mut self.node.subcategories;
        *self.subs.entry(sub.id).or_insert_with(|| {
            subs.push(SubcategoryNode {
                id: sub.id,
                name: sub.name,
                item_count: 0,
                items: Vec::new(),
                subsubcategories: Vec::new(),
            });
            subs.len() - 1
        })
    }

    fn place(&mut self, item: TreeItem, placement: Placement) {
        match placement {
            Placement::Direct => self.node.items.push(item),
            Placement::Sub(sub) => {
                let s = self.sub_slot(sub);
                self.node.subcategories[s].items.push(item);
            }
            Placement::SubSub(sub, subsub) => {
                let sub_id = sub.id;
                let s = self.sub_slot(sub);
                let children = &mut self.node.subcategories[s].subsubcategories;
                let ss = *self.subsubs.entry((sub_id, subsub.id)).or_insert_with(|| {
                    children.push(SubSubcategoryNode {
                        id: subsub.id,
                        name: subsub.name,
                        item_count: 0,
                        items: Vec::new(),
                    });
                    children.len() - 1
                });
                children[ss].items.push(item);
            }
        }
    }

    fn finish(mut self) -> CategoryNode {
        self.node.subcategories.sort_by(|a, b| a.name.cmp(&b.name));
        for sub in &mut self.node.subcategories {
            sub.subsubcategories.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.node.recount();
        self.node
    }
}

/// Group flat item rows into the category tree. Rows that cannot be placed
/// are skipped and logged, not treated as errors.
pub fn build_tree(rows: Vec<ItemWithProductPath>) -> Vec<CategoryNode> {
    build_tree_with_report(rows).tree
}

pub fn build_tree_with_report(rows: Vec<ItemWithProductPath>) -> BuildReport {
    let mut builders: Vec<CategoryBuilder> = Vec::new();
    let mut by_category: HashMap<i64, usize> = HashMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let Classified {
            item,
            category,
            placement,
        } = match classify(row) {
            Ok(c) => c,
            Err((item_id, reason)) => {
                debug!(%item_id, %reason, "item skipped from tree");
                metrics::counter!(TREE_ITEMS_DROPPED_TOTAL, "reason" => reason.label()).increment(1);
                dropped += 1;
                continue;
            }
        };
        let idx = *by_category.entry(category.id).or_insert_with(|| {
            builders.push(CategoryBuilder::new(category));
            builders.len() - 1
        });
        builders[idx].place(item, placement);
    }

    if dropped > 0 {
        warn!(dropped, "items without product or category left out of tree");
    }

    let mut tree: Vec<CategoryNode> = builders.into_iter().map(CategoryBuilder::finish).collect();
    tree.sort_by(|a, b| a.name.cmp(&b.name));
    BuildReport { tree, dropped }
}
