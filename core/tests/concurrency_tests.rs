// tests/concurrency_tests.rs
mod common;

use backoffice::{ProductError, ProductPatch, ProductStore};
use common::*;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_conditional_updates_have_exactly_one_winner() {
  setup_tracing();
  for _ in 0..25 {
    let row = product_row(10, 4, 3);
    let (service, _store) = service_with(vec![row.clone()]);
    let id = row.id;

    let (a, b) = {
      let (s1, s2) = (service.clone(), service.clone());
      let first = ProductPatch {
        name: Some("First".to_string()),
        ..Default::default()
      };
      let second = ProductPatch {
        stock_total: Some(8),
        ..Default::default()
      };
      let h1 = tokio::spawn(async move { s1.apply_update(id, first, Some(v(3))).await });
      let h2 = tokio::spawn(async move { s2.apply_update(id, second, Some(v(3))).await });
      (h1.await.unwrap(), h2.await.unwrap())
    };

    let outcomes = [&a, &b];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
      .iter()
      .filter(|r| matches!(r, Err(ProductError::VersionConflict { actual, .. }) if *actual == v(4)))
      .count();
    assert_eq!((winners, conflicts), (1, 1), "a = {:?}, b = {:?}", a, b);

    let stored = service.get(row.id, false).await.unwrap();
    assert_eq!(stored.version, v(4));
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unconditional_updates_serialize_and_each_bumps_the_version() {
  setup_tracing();
  let row = product_row(10, 4, 1);
  let (service, _store) = service_with(vec![row.clone()]);
  let id = row.id;

  let handles: Vec<_> = (0..32)
    .map(|i| {
      let service = service.clone();
      tokio::spawn(async move {
        let patch = ProductPatch {
          stock_total: Some(6 + (i % 5)),
          ..Default::default()
        };
        service.apply_update(id, patch, None).await
      })
    })
    .collect();

  let mut versions = Vec::new();
  for handle in handles {
    let updated = handle.await.unwrap().unwrap();
    assert!(0 <= updated.stock_available && updated.stock_available <= updated.stock_total);
    versions.push(updated.version.get());
  }
  versions.sort_unstable();
  assert_eq!(versions, (2..=33).collect::<Vec<_>>());

  let stored = service.get(row.id, false).await.unwrap();
  assert_eq!(stored.version, v(33));
  assert_eq!(stored.rented_now(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
  setup_tracing();
  let row = product_row(10, 10, 1);
  let (service, _store) = service_with(vec![row.clone()]);
  let id = row.id;

  let handles: Vec<_> = (0..20)
    .map(|_| {
      let service = service.clone();
      tokio::spawn(async move { service.reserve(id, 1, None).await })
    })
    .collect();

  let mut reserved = 0;
  let mut refused = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => reserved += 1,
      Err(ProductError::InsufficientStock { available: 0, .. }) => refused += 1,
      Err(other) => panic!("Unexpected failure: {:?}", other),
    }
  }
  assert_eq!((reserved, refused), (10, 10));

  let stored = service.get(row.id, false).await.unwrap();
  assert_eq!(stored.stock_available, 0);
  assert_eq!(stored.version, v(11));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn updates_to_different_rows_do_not_wait_on_each_other() {
  setup_tracing();
  let busy = product_row(10, 4, 1);
  let idle = product_row(3, 3, 1);
  let (service, store) = service_with(vec![busy.clone(), idle.clone()]);

  let mut holder = store.begin().await.unwrap();
  holder.lock_for_update(busy.id).await.unwrap().unwrap();

  let patch = ProductPatch {
    stock_total: Some(5),
    ..Default::default()
  };
  let updated = tokio::time::timeout(Duration::from_secs(2), service.apply_update(idle.id, patch, None))
    .await
    .expect("an unrelated row lock must not block this update")
    .unwrap();
  assert_eq!(updated.stock_available, 5);
  drop(holder);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_update_leaves_no_trace() {
  setup_tracing();
  let row = product_row(10, 4, 3);
  let (service, store) = service_with(vec![row.clone()]);

  let mut holder = store.begin().await.unwrap();
  holder.lock_for_update(row.id).await.unwrap().unwrap();

  // The caller gives up while the update is parked on the row lock.
  let patch = ProductPatch {
    stock_total: Some(8),
    ..Default::default()
  };
  let abandoned = tokio::time::timeout(
    Duration::from_millis(50),
    service.apply_update(row.id, patch.clone(), Some(v(3))),
  )
  .await;
  assert!(abandoned.is_err(), "update should still be waiting on the lock");

  // An aborted task behaves the same way.
  let task = {
    let service = service.clone();
    let patch = patch.clone();
    let id = row.id;
    tokio::spawn(async move { service.apply_update(id, patch, Some(v(3))).await })
  };
  tokio::time::sleep(Duration::from_millis(20)).await;
  task.abort();
  assert!(task.await.unwrap_err().is_cancelled());

  holder.rollback().await.unwrap();
  assert_eq!(service.get(row.id, false).await.unwrap(), row);

  // No orphaned lock and no lost version: the same expectation still applies.
  let updated = service.apply_update(row.id, patch, Some(v(3))).await.unwrap();
  assert_eq!(updated.version, v(4));
  assert_eq!(updated.stock_available, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiting_update_sees_the_committed_state_of_the_lock_holder() {
  setup_tracing();
  let row = product_row(10, 4, 3);
  let (service, _store) = service_with(vec![row.clone()]);

  // Reserve everything first, then a queued shrink must be judged against the new figures.
  service.reserve(row.id, 4, Some(v(3))).await.unwrap();
  let patch = ProductPatch {
    stock_total: Some(8),
    ..Default::default()
  };
  let err = service.apply_update(row.id, patch, None).await.unwrap_err();
  assert!(matches!(
    err,
    ProductError::StockBelowCommitted {
      requested_total: 8,
      committed: 10,
      ..
    }
  ));
}
