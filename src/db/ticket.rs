use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};
use uuid::Uuid;

use super::{Change, Client, Store, StoreError};

/// One customer's queue entry. Only `status` changes after creation.
#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub customer_name: String,
    pub issue: String,

    /// Display number, sequential per calendar day in arrival order.
    /// Best-effort unique (see `queue::number`).
    pub queue_number: u32,

    pub status: Status,

    /// Short diagnosis from the triage gate, or its manual-fallback label.
    pub ai_summary: String,

    /// Advisory service time estimate.
    pub estimated_mins: u32,

    /// Set once at insert; fixes the ticket's calendar-day membership.
    pub created_at: OffsetDateTime,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Id(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
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

#[derive(
    Clone, Copy, Debug, Deserialize, TryFromRepr, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    /// Queued, eligible for automatic promotion into a free slot.
    Waiting = 1,

    /// In service. Never set by a staff action, only by the reconciler.
    Processing = 2,

    /// Put on hold by staff; re-enters the queue via resume.
    Pending = 3,

    /// Service finished.
    Done = 4,
}

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let status = Self::try_from(repr).map_err(|_| "invalid status")?;
        Ok(status)
    }
}

impl ToSql for Status {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        customer_name: row.get("customer_name"),
        issue: row.get("issue"),
        queue_number: u32::try_from(row.get::<_, i32>("queue_number"))
            .unwrap(),
        status: row.get("status"),
        ai_summary: row.get("ai_summary"),
        estimated_mins: u32::try_from(row.get::<_, i32>("estimated_mins"))
            .unwrap(),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for Client {
    async fn tickets_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError> {
        const SQL: &str = "\
            SELECT id, customer_name, issue, queue_number, status, \
                   ai_summary, estimated_mins, created_at \
            FROM tickets \
            WHERE created_at >= $1 \
            ORDER BY created_at ASC, \
                     id ASC";
        Ok(self
            .inner
            .query(SQL, &[&start])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    async fn tickets_before(
        &self,
        end: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError> {
        const SQL: &str = "\
            SELECT id, customer_name, issue, queue_number, status, \
                   ai_summary, estimated_mins, created_at \
            FROM tickets \
            WHERE created_at < $1 \
            ORDER BY created_at DESC, \
                     id DESC";
        Ok(self
            .inner
            .query(SQL, &[&end])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    async fn count_created_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM tickets \
            WHERE created_at >= $1";
        Ok(self
            .inner
            .query_one(SQL, &[&start])
            .await?
            .get::<_, i64>(0)
            .try_into()
            .unwrap())
    }

    async fn count_processing_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM tickets \
            WHERE status = $1 AND created_at >= $2";
        Ok(self
            .inner
            .query_one(SQL, &[&Status::Processing, &start])
            .await?
            .get::<_, i64>(0)
            .try_into()
            .unwrap())
    }

    async fn waiting_since(
        &self,
        start: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<Ticket>, StoreError> {
        const SQL: &str = "\
            SELECT id, customer_name, issue, queue_number, status, \
                   ai_summary, estimated_mins, created_at \
            FROM tickets \
            WHERE status = $1 AND created_at >= $2 \
            ORDER BY created_at ASC, \
                     id ASC \
            LIMIT $3";
        let limit = i64::try_from(limit).unwrap();
        Ok(self
            .inner
            .query(SQL, &[&Status::Waiting, &start, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    async fn ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, StoreError> {
        const SQL: &str = "\
            SELECT id, customer_name, issue, queue_number, status, \
                   ai_summary, estimated_mins, created_at \
            FROM tickets \
            WHERE id = $1";
        Ok(self
            .inner
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(from_row))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        const SQL: &str = "\
            INSERT INTO tickets (id, customer_name, issue, queue_number, \
                                 status, ai_summary, estimated_mins, \
                                 created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";
        self.inner
            .execute(
                SQL,
                &[
                    &ticket.id,
                    &ticket.customer_name,
                    &ticket.issue,
                    &i32::try_from(ticket.queue_number).unwrap(),
                    &ticket.status,
                    &ticket.ai_summary,
                    &i32::try_from(ticket.estimated_mins).unwrap(),
                    &ticket.created_at,
                ],
            )
            .await
            .map(drop)
            .map_err(Into::into)
    }

    async fn update_ticket_status(
        &self,
        id: Id,
        status: Status,
    ) -> Result<(), StoreError> {
        const SQL: &str = "UPDATE tickets SET status = $2 WHERE id = $1";
        let updated = self.inner.execute(SQL, &[&id, &status]).await?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_ticket(&self, id: Id) -> Result<(), StoreError> {
        const SQL: &str = "DELETE FROM tickets WHERE id = $1";
        let deleted = self.inner.execute(SQL, &[&id]).await?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        Client::subscribe(self)
    }
}
