use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db;

pub use crate::db::ticket::{Id, Status};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub customer_name: String,
    pub issue: String,
    pub queue_number: u32,
    pub status: Status,
    pub ai_summary: String,
    pub estimated_mins: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<db::Ticket> for Ticket {
    fn from(ticket: db::Ticket) -> Self {
        Self {
            id: ticket.id,
            customer_name: ticket.customer_name,
            issue: ticket.issue,
            queue_number: ticket.queue_number,
            status: ticket.status,
            ai_summary: ticket.ai_summary,
            estimated_mins: ticket.estimated_mins,
            created_at: ticket.created_at,
        }
    }
}

/// Today's queue as shown on the customer board and the admin dashboard.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub tickets: Vec<Ticket>,
    pub busy_slots: usize,
    pub max_slots: usize,
}

/// Successful check-in response.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedIn {
    pub queue_number: u32,
    pub ticket: Ticket,
}

/// Pre-today history for the recap screen, newest first.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recap {
    pub finished: Vec<Ticket>,
    pub unfinished: Vec<Ticket>,
}
