//! Queue lifecycle: check-in, staff transitions, deletion, and the
//! capacity-controlled promotion of waiting tickets into service slots.

pub mod number;
pub mod reconcile;

use std::sync::Arc;

use derive_more::{Display, From};
use serde::Deserialize;
use time::{OffsetDateTime, Time};

use crate::{
    ai,
    db::{
        ticket::{Id, Status},
        Store, StoreError, Ticket,
    },
};

pub use self::reconcile::{fill_slots, MAX_CONCURRENT_SERVICE};

/// Start of the current UTC calendar day. Tickets are numbered, promoted and
/// displayed within this scope; membership is fixed by `created_at`.
pub fn today_start() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT)
}

/// A staff-requested transition. Promotion into `processing` is deliberately
/// absent: only the reconciler admits tickets into service.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// `processing` -> `done`; vacates a slot.
    Finish,

    /// `processing` -> `pending`.
    Hold,

    /// `pending` -> `waiting`: the ticket re-enters the promotion pool
    /// rather than jumping back into service.
    Resume,
}

#[derive(Debug)]
pub struct CheckIn {
    pub queue_number: u32,
    pub ticket: Ticket,
}

#[derive(Debug, Display, From)]
pub enum CheckInError {
    #[display("customer name must not be empty")]
    EmptyName,

    #[display("issue description must not be empty")]
    EmptyIssue,

    /// Complaint deemed inadmissible by the triage gate; no ticket was
    /// created. Carries the gate's reason.
    #[display("complaint rejected: {_0}")]
    Rejected(String),

    #[display("{_0}")]
    #[from]
    Store(StoreError),
}

#[derive(Debug, Display, From)]
pub enum ActionError {
    #[display("ticket not found")]
    NotFound,

    /// Requested transition is outside the legal edges. Rejected before any
    /// store call, distinct from a store failure.
    #[display("cannot {action:?} a {from:?} ticket")]
    Illegal { from: Status, action: Action },

    #[display("{_0}")]
    #[from]
    Store(StoreError),
}

#[derive(Debug, Display, From)]
pub enum RemoveError {
    #[display("ticket not found")]
    NotFound,

    /// Deletion is only legal from `waiting` or `done`; in-progress work is
    /// never dropped silently.
    #[display("cannot delete a {_0:?} ticket")]
    InService(Status),

    #[display("{_0}")]
    #[from]
    Store(StoreError),
}

/// Orchestrates ticket creation and staff-driven transitions against an
/// injected store handle, triggering reconciliation after every mutation
/// that can free or fill a slot.
pub struct Controller {
    store: Arc<dyn Store>,
    gate: ai::Gate,
}

impl Controller {
    pub fn new(store: Arc<dyn Store>, gate: ai::Gate) -> Self {
        Self { store, gate }
    }

    /// Customer check-in: validates inputs, assigns the daily number, runs
    /// triage and inserts a `waiting` ticket. Reconciliation is kicked off
    /// fire-and-forget; the caller only sees the created ticket.
    pub async fn check_in(
        &self,
        customer_name: &str,
        issue: &str,
    ) -> Result<CheckIn, CheckInError> {
        let customer_name = customer_name.trim();
        let issue = issue.trim();
        if customer_name.is_empty() {
            return Err(CheckInError::EmptyName);
        }
        if issue.is_empty() {
            return Err(CheckInError::EmptyIssue);
        }

        let queue_number =
            number::next_number(self.store.as_ref(), today_start()).await?;

        let verdict = self.gate.classify(issue).await;
        if !verdict.admissible {
            return Err(CheckInError::Rejected(verdict.summary));
        }

        let ticket = Ticket {
            id: Id::new(),
            customer_name: customer_name.to_string(),
            issue: issue.to_string(),
            queue_number,
            status: Status::Waiting,
            ai_summary: verdict.summary,
            estimated_mins: verdict.estimated_mins,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.insert_ticket(&ticket).await?;

        reconcile::spawn_fill(Arc::clone(&self.store));

        Ok(CheckIn {
            queue_number,
            ticket,
        })
    }

    /// Applies a staff action, enforcing the legal transition edges. A
    /// `finish` vacates a slot, so it re-triggers reconciliation.
    pub async fn apply(
        &self,
        id: Id,
        action: Action,
    ) -> Result<Status, ActionError> {
        let ticket = self
            .store
            .ticket_by_id(id)
            .await?
            .ok_or(ActionError::NotFound)?;

        let target = match (ticket.status, action) {
            (Status::Processing, Action::Finish) => Status::Done,
            (Status::Processing, Action::Hold) => Status::Pending,
            (Status::Pending, Action::Resume) => Status::Waiting,
            (from, action) => {
                return Err(ActionError::Illegal { from, action })
            }
        };
        self.store.update_ticket_status(id, target).await?;

        if target == Status::Done {
            reconcile::spawn_fill(Arc::clone(&self.store));
        }

        Ok(target)
    }

    /// Deletes a ticket, refused while it is `processing` or `pending`.
    pub async fn remove(&self, id: Id) -> Result<(), RemoveError> {
        let ticket = self
            .store
            .ticket_by_id(id)
            .await?
            .ok_or(RemoveError::NotFound)?;

        match ticket.status {
            Status::Waiting | Status::Done => {
                self.store.delete_ticket(id).await?;
                Ok(())
            }
            status => Err(RemoveError::InService(status)),
        }
    }
}
