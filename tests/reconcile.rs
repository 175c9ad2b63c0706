pub mod common;

use bengkel_queue::{
    db::ticket::Status,
    queue::{fill_slots, MAX_CONCURRENT_SERVICE},
};
use time::Duration;

#[tokio::test]
async fn promotes_waiting_up_to_capacity() {
    let store = common::MemStore::new();
    let day = common::today();
    for n in 1..=4u32 {
        store.seed(common::ticket(
            n,
            Status::Waiting,
            day + Duration::minutes(i64::from(n)),
        ));
    }

    let promoted = fill_slots(store.as_ref(), day).await.unwrap();
    assert_eq!(promoted, MAX_CONCURRENT_SERVICE);

    let statuses: Vec<_> =
        store.snapshot().iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        [
            Status::Processing,
            Status::Processing,
            Status::Waiting,
            Status::Waiting,
        ],
    );
}

#[tokio::test]
async fn promotes_oldest_first() {
    let store = common::MemStore::new();
    let day = common::today();

    // Seeded out of arrival order on purpose.
    let late = common::ticket(3, Status::Waiting, day + Duration::hours(3));
    let early = common::ticket(1, Status::Waiting, day + Duration::hours(1));
    let middle = common::ticket(2, Status::Waiting, day + Duration::hours(2));
    store.seed(late.clone());
    store.seed(early.clone());
    store.seed(middle.clone());

    fill_slots(store.as_ref(), day).await.unwrap();

    assert_eq!(store.status_of(early.id), Some(Status::Processing));
    assert_eq!(store.status_of(middle.id), Some(Status::Processing));
    assert_eq!(store.status_of(late.id), Some(Status::Waiting));
}

#[tokio::test]
async fn respects_occupied_slots() {
    let store = common::MemStore::new();
    let day = common::today();
    store.seed(common::ticket(1, Status::Processing, day));
    store.seed(common::ticket(2, Status::Waiting, day + Duration::minutes(1)));
    store.seed(common::ticket(3, Status::Waiting, day + Duration::minutes(2)));

    let promoted = fill_slots(store.as_ref(), day).await.unwrap();
    assert_eq!(promoted, 1);

    let processing = store
        .snapshot()
        .iter()
        .filter(|t| t.status == Status::Processing)
        .count();
    assert_eq!(processing, MAX_CONCURRENT_SERVICE);
}

#[tokio::test]
async fn does_nothing_at_capacity() {
    let store = common::MemStore::new();
    let day = common::today();
    store.seed(common::ticket(1, Status::Processing, day));
    store.seed(common::ticket(2, Status::Processing, day));
    store.seed(common::ticket(3, Status::Waiting, day + Duration::minutes(1)));

    let promoted = fill_slots(store.as_ref(), day).await.unwrap();
    assert_eq!(promoted, 0);
    assert_eq!(store.status_of(store.snapshot()[2].id), Some(Status::Waiting));
}

#[tokio::test]
async fn second_pass_is_a_noop() {
    let store = common::MemStore::new();
    let day = common::today();
    for n in 1..=3u32 {
        store.seed(common::ticket(
            n,
            Status::Waiting,
            day + Duration::minutes(i64::from(n)),
        ));
    }

    fill_slots(store.as_ref(), day).await.unwrap();
    let after_first: Vec<_> =
        store.snapshot().iter().map(|t| t.status).collect();

    let promoted = fill_slots(store.as_ref(), day).await.unwrap();
    assert_eq!(promoted, 0);

    let after_second: Vec<_> =
        store.snapshot().iter().map(|t| t.status).collect();
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn ignores_tickets_from_previous_days() {
    let store = common::MemStore::new();
    let day = common::today();

    // Yesterday's leftovers occupy no slot and get no promotion.
    store.seed(common::ticket(5, Status::Processing, day - Duration::hours(20)));
    let stale = common::ticket(6, Status::Waiting, day - Duration::hours(19));
    store.seed(stale.clone());
    let fresh = common::ticket(1, Status::Waiting, day + Duration::minutes(1));
    store.seed(fresh.clone());

    let promoted = fill_slots(store.as_ref(), day).await.unwrap();
    assert_eq!(promoted, 1);
    assert_eq!(store.status_of(fresh.id), Some(Status::Processing));
    assert_eq!(store.status_of(stale.id), Some(Status::Waiting));
}
