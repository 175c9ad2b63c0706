use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task;

use crate::db::{ticket::Status, Store, StoreError};

/// Fixed concurrent service capacity (mechanics on the floor).
pub const MAX_CONCURRENT_SERVICE: usize = 2;

/// Promotes waiting tickets into free service slots, oldest first, among
/// tickets created since `day_start`. Returns how many were promoted.
///
/// Every peer re-runs this pass on each change event, so overlapping runs
/// are expected: each promotion is an independent status write, and setting
/// `processing` on an already-`processing` ticket changes nothing, which
/// keeps the pass idempotent without any cross-record transaction.
pub async fn fill_slots(
    store: &dyn Store,
    day_start: OffsetDateTime,
) -> Result<usize, StoreError> {
    let processing = store.count_processing_since(day_start).await?;
    if processing >= MAX_CONCURRENT_SERVICE {
        return Ok(0);
    }

    let slots_available = MAX_CONCURRENT_SERVICE - processing;
    let next_in_line = store.waiting_since(day_start, slots_available).await?;

    let mut promoted = 0;
    for ticket in next_in_line {
        store.update_ticket_status(ticket.id, Status::Processing).await?;
        promoted += 1;
    }
    Ok(promoted)
}

/// Fire-and-forget reconciliation pass. Failures are logged and otherwise
/// dropped; the next change event re-triggers the pass.
pub fn spawn_fill(store: Arc<dyn Store>) {
    task::spawn(async move {
        if let Err(e) = fill_slots(store.as_ref(), super::today_start()).await
        {
            tracing::warn!("slot fill failed: {e}");
        }
    });
}
