use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bengkel_queue::{
    ai::Gate,
    db::{
        ticket::{Id, Status},
        Change, Store, StoreError, Ticket,
    },
    queue::Controller,
};
use time::{OffsetDateTime, Time};
use tokio::sync::broadcast;

/// In-memory stand-in for the Postgres-backed store. Mutations publish on
/// the same change feed the real client exposes; FIFO ties on `created_at`
/// break by insertion order, as documented for the trait.
pub struct MemStore {
    tickets: Mutex<Vec<Ticket>>,
    changes: broadcast::Sender<Change>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        Arc::new(Self {
            tickets: Mutex::new(Vec::new()),
            changes,
        })
    }

    /// Inserts directly, bypassing check-in; used to seed fixtures.
    pub fn seed(&self, ticket: Ticket) {
        self.tickets.lock().unwrap().push(ticket);
    }

    pub fn snapshot(&self) -> Vec<Ticket> {
        self.tickets.lock().unwrap().clone()
    }

    pub fn status_of(&self, id: Id) -> Option<Status> {
        self.tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status)
    }
}

#[async_trait]
impl Store for MemStore {
    async fn tickets_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<_> = self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.created_at >= start)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn tickets_before(
        &self,
        end: OffsetDateTime,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<_> = self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.created_at < end)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(tickets)
    }

    async fn count_created_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.created_at >= start)
            .count())
    }

    async fn count_processing_since(
        &self,
        start: OffsetDateTime,
    ) -> Result<usize, StoreError> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| {
                t.status == Status::Processing && t.created_at >= start
            })
            .count())
    }

    async fn waiting_since(
        &self,
        start: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<Ticket>, StoreError> {
        let mut waiting: Vec<_> = self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.status == Status::Waiting && t.created_at >= start)
            .cloned()
            .collect();
        waiting.sort_by_key(|t| t.created_at);
        waiting.truncate(limit);
        Ok(waiting)
    }

    async fn ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, StoreError> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        self.tickets.lock().unwrap().push(ticket.clone());
        let _ = self.changes.send(Change);
        Ok(())
    }

    async fn update_ticket_status(
        &self,
        id: Id,
        status: Status,
    ) -> Result<(), StoreError> {
        let mut tickets = self.tickets.lock().unwrap();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound)?;
        ticket.status = status;
        let _ = self.changes.send(Change);
        Ok(())
    }

    async fn delete_ticket(&self, id: Id) -> Result<(), StoreError> {
        let mut tickets = self.tickets.lock().unwrap();
        let before = tickets.len();
        tickets.retain(|t| t.id != id);
        if tickets.len() == before {
            return Err(StoreError::NotFound);
        }
        let _ = self.changes.send(Change);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}

/// Controller over the given store with an unconfigured triage gate, i.e.
/// classification always takes the keyword fallback path.
pub fn controller(store: &Arc<MemStore>) -> Controller {
    let store: Arc<dyn Store> = store.clone();
    Controller::new(store, Gate::new(None))
}

/// Start of the current UTC day, the scope all queue operations use.
pub fn today() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT)
}

pub fn ticket(
    number: u32,
    status: Status,
    created_at: OffsetDateTime,
) -> Ticket {
    Ticket {
        id: Id::new(),
        customer_name: format!("Customer {number}"),
        issue: "Ganti oli mesin".to_string(),
        queue_number: number,
        status,
        ai_summary: "Servis rutin".to_string(),
        estimated_mins: 30,
        created_at,
    }
}
