// Tests for the in-memory record store, in particular the
// compare-and-set semantics that back duplicate detection.

use std::sync::Arc;

use callsheet::{MemoryStore, Record, RecordStore, RowRef, StoreError, PENDING_MARKER};

#[tokio::test]
async fn first_unprocessed_follows_queue_order() {
    let store = MemoryStore::seeded(&[("u1", "Ada"), ("u2", "George")]);

    let first = store.first_unprocessed().await.unwrap().unwrap();
    assert_eq!(first.row, RowRef::new("2"));
    assert_eq!(first.url, "u1");
    assert_eq!(first.first_name, "Ada");
    assert!(!first.is_processed());
}

#[tokio::test]
async fn next_unprocessed_scans_strictly_after_current() {
    let store = MemoryStore::seeded(&[("u1", "Ada"), ("u2", "George"), ("u3", "Grace")]);

    let next = store
        .next_unprocessed(&RowRef::new("2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.row, RowRef::new("3"));

    // A processed row in the middle is skipped over.
    store
        .claim(&RowRef::new("3"), PENDING_MARKER)
        .await
        .unwrap();
    let next = store
        .next_unprocessed(&RowRef::new("2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.row, RowRef::new("4"));
}

#[tokio::test]
async fn next_unprocessed_returns_none_at_end_of_queue() {
    let store = MemoryStore::seeded(&[("u1", "Ada")]);
    let next = store.next_unprocessed(&RowRef::new("2")).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn claim_is_rejected_for_processed_row() {
    let store = MemoryStore::seeded(&[("u1", "Ada")]);
    let row = RowRef::new("2");

    store.claim(&row, PENDING_MARKER).await.unwrap();

    let err = store.claim(&row, PENDING_MARKER).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyProcessed(_)));

    // The rejected claim left the original marker in place.
    let record = store.get(&row).await.unwrap();
    assert_eq!(record.recording, PENDING_MARKER);
}

#[tokio::test]
async fn claim_unknown_row_is_row_not_found() {
    let store = MemoryStore::seeded(&[("u1", "Ada")]);
    let err = store
        .claim(&RowRef::new("99"), PENDING_MARKER)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RowNotFound(_)));
}

#[tokio::test]
async fn write_transcription_replaces_pending_marker() {
    let store = MemoryStore::seeded(&[("u1", "Ada")]);
    let row = RowRef::new("2");

    store.claim(&row, PENDING_MARKER).await.unwrap();
    store
        .write_transcription(&row, "Spoke about the analytical engine.")
        .await
        .unwrap();

    let record = store.get(&row).await.unwrap();
    assert_eq!(record.recording, "Spoke about the analytical engine.");
    assert!(record.is_processed());
}

#[test]
fn non_numeric_row_in_fixture_is_an_error() {
    let record = Record {
        row: RowRef::new("row-A"),
        url: "u1".to_string(),
        company: String::new(),
        connected_on: String::new(),
        first_name: "Ada".to_string(),
        last_name: String::new(),
        recording: String::new(),
    };

    let err = MemoryStore::new(vec![record]).unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
    assert!(err.to_string().contains("row-A"));
}

#[tokio::test]
async fn concurrent_claims_admit_exactly_one_winner() {
    let store = Arc::new(MemoryStore::seeded(&[("u1", "Ada")]));
    let row = RowRef::new("2");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let row = row.clone();
        handles.push(tokio::spawn(async move {
            store.claim(&row, PENDING_MARKER).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1, "exactly one concurrent claim may succeed");
}
