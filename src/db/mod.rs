pub mod inventory;
pub mod ticket;
pub mod user;

use std::future::Future;

use async_trait::async_trait;
use derive_more::{Display, From};
use futures::StreamExt as _;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio_postgres::{AsyncMessage, NoTls};

use crate::config;

pub use tokio_postgres::Error;

pub use self::{inventory::InventoryItem, ticket::Ticket, user::User};

/// Postgres NOTIFY channel fed by the `tickets` row trigger
/// (see `schema.sql`).
const CHANGE_CHANNEL: &str = "ticket_changes";

const CHANGE_BUFFER: usize = 64;

/// Fired on every insert/update/delete in the ticket collection, from this
/// process or any other connected to the same database. Carries no payload:
/// delivery is at-least-once and unordered, so subscribers refetch and
/// reconcile instead of interpreting individual events.
#[derive(Clone, Copy, Debug)]
pub struct Change;

#[derive(Debug, Display, From)]
pub enum StoreError {
    #[display("store backend error: {_0}")]
    #[from]
    Backend(Error),

    #[display("record not found")]
    NotFound,
}

/// Ticket collection operations required by the queue core.
///
/// `Client` is the production implementation over Postgres; tests substitute
/// an in-memory store. Components receive an explicit `Arc<dyn Store>`
/// handle instead of sharing a process-wide connection object.
#[async_trait]
pub trait Store: Send + Sync {
    /// Tickets created at or after `start`, FIFO (`created_at` ascending,
    /// `id` as the stable tie-break).
    async fn tickets_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError>;

    /// Tickets created before `end`, newest first.
    async fn tickets_before(
        &self,
        end: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError>;

    async fn count_created_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError>;

    async fn count_processing_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError>;

    /// Up to `limit` `waiting` tickets created at or after `start`, oldest
    /// first.
    async fn waiting_since(
        &self,
        start: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<Ticket>, StoreError>;

    async fn ticket_by_id(
        &self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, StoreError>;

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    async fn update_ticket_status(
        &self,
        id: ticket::Id,
        status: ticket::Status,
    ) -> Result<(), StoreError>;

    async fn delete_ticket(&self, id: ticket::Id) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<Change>;
}

/// Connects to the database and returns the client together with the
/// connection-driver future. The driver must be spawned before the client is
/// used; it also forwards `NOTIFY` messages into the change feed.
pub async fn connect(
    config: config::Db,
) -> Result<(Client, impl Future<Output = Result<(), Error>>), Error> {
    let (client, mut connection) =
        tokio_postgres::connect(&config.url, NoTls).await?;

    let (changes, _) = broadcast::channel(CHANGE_BUFFER);

    let sender = changes.clone();
    let driver = async move {
        let mut messages =
            futures::stream::poll_fn(move |cx| connection.poll_message(cx));
        while let Some(message) = messages.next().await {
            match message? {
                AsyncMessage::Notification(n)
                    if n.channel() == CHANGE_CHANNEL =>
                {
                    // No receivers is fine.
                    let _ = sender.send(Change);
                }
                _ => {}
            }
        }
        Ok(())
    };

    Ok((
        Client {
            inner: client,
            changes,
        },
        driver,
    ))
}

pub struct Client {
    inner: tokio_postgres::Client,
    changes: broadcast::Sender<Change>,
}

impl Client {
    /// Subscribes the session to ticket change notifications. Must be called
    /// after the connection driver has been spawned.
    pub async fn listen_for_changes(&self) -> Result<(), Error> {
        self.inner
            .batch_execute(&format!("LISTEN {CHANGE_CHANNEL}"))
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
