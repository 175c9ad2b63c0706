pub mod common;

use bengkel_queue::{
    db::ticket::Status,
    queue::{fill_slots, CheckInError},
};
use time::Duration;

#[tokio::test]
async fn assigns_sequential_numbers() {
    let store = common::MemStore::new();
    let controller = common::controller(&store);

    let a = controller.check_in("Andi", "Rem blong").await.unwrap();
    let b = controller.check_in("Budi", "Ganti oli").await.unwrap();
    let c = controller.check_in("Citra", "Mesin brebet").await.unwrap();

    assert_eq!(a.queue_number, 1);
    assert_eq!(b.queue_number, 2);
    assert_eq!(c.queue_number, 3);
}

#[tokio::test]
async fn numbering_restarts_each_day() {
    let store = common::MemStore::new();
    store.seed(common::ticket(
        7,
        Status::Done,
        common::today() - Duration::hours(5),
    ));

    let checked_in = common::controller(&store)
        .check_in("Andi", "Ban bocor")
        .await
        .unwrap();
    assert_eq!(checked_in.queue_number, 1);
}

#[tokio::test]
async fn new_ticket_enters_as_waiting() {
    let store = common::MemStore::new();

    let checked_in = common::controller(&store)
        .check_in("Andi", "Kampas rem habis")
        .await
        .unwrap();

    assert_eq!(checked_in.ticket.status, Status::Waiting);
    assert_eq!(checked_in.ticket.customer_name, "Andi");
    assert_eq!(checked_in.ticket.estimated_mins, 30);
}

#[tokio::test]
async fn rejects_small_talk() {
    let store = common::MemStore::new();

    let err = common::controller(&store)
        .check_in("Andi", "apa kabar")
        .await
        .unwrap_err();

    assert!(matches!(err, CheckInError::Rejected(_)));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn rejects_empty_inputs() {
    let store = common::MemStore::new();
    let controller = common::controller(&store);

    let err = controller.check_in("  ", "Rem blong").await.unwrap_err();
    assert!(matches!(err, CheckInError::EmptyName));

    let err = controller.check_in("Andi", "").await.unwrap_err();
    assert!(matches!(err, CheckInError::EmptyIssue));

    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn first_two_arrivals_go_into_service() {
    let store = common::MemStore::new();
    let controller = common::controller(&store);

    let a = controller.check_in("Andi", "Rem blong").await.unwrap();
    let b = controller.check_in("Budi", "Ganti oli").await.unwrap();
    let c = controller.check_in("Citra", "Mesin brebet").await.unwrap();

    fill_slots(store.as_ref(), common::today()).await.unwrap();

    assert_eq!(store.status_of(a.ticket.id), Some(Status::Processing));
    assert_eq!(store.status_of(b.ticket.id), Some(Status::Processing));
    assert_eq!(store.status_of(c.ticket.id), Some(Status::Waiting));
}
