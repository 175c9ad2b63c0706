use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::inventory::Id;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Id,
    pub name: String,
    pub category: Option<String>,
    pub purchase_price: Option<i64>,
    pub sale_price: Option<i64>,
    pub stock: u32,
    pub supplier: Option<String>,
}

impl From<db::InventoryItem> for InventoryItem {
    fn from(item: db::InventoryItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            category: item.category,
            purchase_price: item.purchase_price,
            sale_price: item.sale_price,
            stock: item.stock,
            supplier: item.supplier,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub items: Vec<InventoryItem>,
}

/// Result of applying a confirmed invoice scan to the stock.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockOutcome {
    pub inserted: usize,
    pub updated: usize,
}
