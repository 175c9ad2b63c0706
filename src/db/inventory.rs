use std::error::Error as StdError;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};
use uuid::Uuid;

use super::Client;

/// A stocked part or consumable. Shares the database with the queue but has
/// no interaction with the ticket state machine.
#[derive(Clone, Debug)]
pub struct InventoryItem {
    pub id: Id,
    pub name: String,
    pub category: Option<String>,

    /// Prices in whole rupiah.
    pub purchase_price: Option<i64>,
    pub sale_price: Option<i64>,

    pub stock: u32,
    pub supplier: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

fn from_row(row: &Row) -> InventoryItem {
    InventoryItem {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        purchase_price: row.get("purchase_price"),
        sale_price: row.get("sale_price"),
        stock: u32::try_from(row.get::<_, i32>("stock")).unwrap(),
        supplier: row.get("supplier"),
    }
}

impl Client {
    pub async fn list_inventory(&self) -> Result<Vec<InventoryItem>, Error> {
        const SQL: &str = "\
            SELECT id, name, category, purchase_price, sale_price, stock, \
                   supplier \
            FROM inventory \
            ORDER BY name ASC";
        Ok(self
            .inner
            .query(SQL, &[])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    /// Case-insensitive lookup by exact name, used to merge restocked items
    /// into existing rows.
    pub async fn find_item_by_name(
        &self,
        name: &str,
    ) -> Result<Option<InventoryItem>, Error> {
        const SQL: &str = "\
            SELECT id, name, category, purchase_price, sale_price, stock, \
                   supplier \
            FROM inventory \
            WHERE lower(name) = lower($1) \
            LIMIT 1";
        Ok(self
            .inner
            .query_opt(SQL, &[&name])
            .await?
            .as_ref()
            .map(from_row))
    }

    pub async fn insert_item(
        &self,
        item: &InventoryItem,
    ) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO inventory (id, name, category, purchase_price, \
                                   sale_price, stock, supplier) \
            VALUES ($1, $2, $3, $4, $5, $6, $7)";
        self.inner
            .execute(
                SQL,
                &[
                    &item.id,
                    &item.name,
                    &item.category,
                    &item.purchase_price,
                    &item.sale_price,
                    &i32::try_from(item.stock).unwrap(),
                    &item.supplier,
                ],
            )
            .await
            .map(drop)
    }

    pub async fn update_item(
        &self,
        item: &InventoryItem,
    ) -> Result<u64, Error> {
        const SQL: &str = "\
            UPDATE inventory \
            SET name = $2, \
                category = $3, \
                purchase_price = $4, \
                sale_price = $5, \
                stock = $6, \
                supplier = $7 \
            WHERE id = $1";
        self.inner
            .execute(
                SQL,
                &[
                    &item.id,
                    &item.name,
                    &item.category,
                    &item.purchase_price,
                    &item.sale_price,
                    &i32::try_from(item.stock).unwrap(),
                    &item.supplier,
                ],
            )
            .await
    }

    /// Restock merge: increments stock in place and refreshes the purchase
    /// price and supplier when the scan provided them.
    pub async fn add_stock(
        &self,
        id: Id,
        quantity: u32,
        purchase_price: Option<i64>,
        supplier: Option<&str>,
    ) -> Result<u64, Error> {
        const SQL: &str = "\
            UPDATE inventory \
            SET stock = stock + $2, \
                purchase_price = COALESCE($3, purchase_price), \
                supplier = COALESCE($4, supplier) \
            WHERE id = $1";
        self.inner
            .execute(
                SQL,
                &[
                    &id,
                    &i32::try_from(quantity).unwrap(),
                    &purchase_price,
                    &supplier,
                ],
            )
            .await
    }

    pub async fn delete_item(&self, id: Id) -> Result<u64, Error> {
        const SQL: &str = "DELETE FROM inventory WHERE id = $1";
        self.inner.execute(SQL, &[&id]).await
    }
}
