use time::OffsetDateTime;

use crate::db::{Store, StoreError};

/// Next display number for the given day: tickets created since `day_start`
/// plus one.
///
/// The count and the subsequent insert are not atomic, so two concurrent
/// check-ins can be handed the same number. The store exposes no
/// compare-and-swap, and numbers are display labels rather than keys, so
/// this stays best-effort sequential.
pub async fn next_number(
    store: &dyn Store,
    day_start: OffsetDateTime,
) -> Result<u32, StoreError> {
    let created_today = store.count_created_since(day_start).await?;
    Ok(u32::try_from(created_today).unwrap() + 1)
}
