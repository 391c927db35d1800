//! Tests for [`SingleFlight`] — one running call per key.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use skald::singleflight::{Flight, SingleFlight};

#[tokio::test]
async fn concurrent_callers_share_one_run() {
    let flights: Arc<SingleFlight<&'static str, u32>> = Arc::new(SingleFlight::new());
    let runs = Arc::new(AtomicUsize::new(0));

    let calls = (0..10).map(|_| {
        let flights = Arc::clone(&flights);
        let runs = Arc::clone(&runs);
        async move {
            let work = async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                42
            };
            flights.run("key", || None, work).await
        }
    });
    let outcomes = futures_util::future::join_all(calls).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let leaders = outcomes
        .iter()
        .filter(|f| matches!(f, Flight::Leader(_)))
        .count();
    assert_eq!(leaders, 1);
    for outcome in outcomes {
        assert_eq!(outcome.into_inner(), Some(42));
    }
}

#[tokio::test]
async fn different_keys_run_separately() {
    let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
    let runs = Arc::new(AtomicUsize::new(0));

    let calls = (0..4).map(|k| {
        let flights = Arc::clone(&flights);
        let runs = Arc::clone(&runs);
        async move {
            let work = async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                k * 10
            };
            flights.run(k, || None, work).await.into_inner()
        }
    });
    let outcomes = futures_util::future::join_all(calls).await;

    assert_eq!(runs.load(Ordering::SeqCst), 4);
    assert_eq!(outcomes, vec![Some(0), Some(10), Some(20), Some(30)]);
}

#[tokio::test]
async fn sequential_calls_run_again() {
    let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
    let first = flights.run(1, || None, async { 1 }).await;
    tokio::task::yield_now().await;
    let second = flights.run(1, || None, async { 2 }).await;

    assert_eq!(first, Flight::Leader(Some(1)));
    assert_eq!(second, Flight::Leader(Some(2)));
}

#[tokio::test]
async fn work_survives_cancelled_leader() {
    let flights: Arc<SingleFlight<u32, u32>> = Arc::new(SingleFlight::new());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let leader = {
        let flights = Arc::clone(&flights);
        tokio::spawn(async move {
            flights
                .run(
                    7,
                    || None,
                    async move {
                        let _ = rx.await;
                        99
                    },
                )
                .await
        })
    };
    // Let the leader register its call
    while flights.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    leader.abort();
    let _ = leader.await;

    let follower = {
        let flights = Arc::clone(&flights);
        tokio::spawn(async move { flights.run(7, || None, async { 0 }).await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    tx.send(()).unwrap();

    assert_eq!(follower.await.unwrap(), Flight::Follower(Some(99)));
}
