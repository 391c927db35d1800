//! Tests for [`RateGovernor`] — fixed-window quotas per client and operation.

use std::time::Duration;

use skald::{Operation, RateGovernor, RateLimit, RateLimitConfig, SkaldError};

fn governor(limit: u32, window_secs: u64) -> RateGovernor {
    let quota = RateLimit::new(limit, Duration::from_secs(window_secs));
    RateGovernor::new(
        RateLimitConfig::new()
            .health(quota)
            .extract(quota)
            .batch_extract(quota),
    )
}

#[tokio::test(start_paused = true)]
async fn admits_up_to_limit_then_rejects() {
    let governor = governor(5, 60);
    for _ in 0..5 {
        assert!(governor.allow("c1", Operation::Extract));
    }
    assert!(!governor.allow("c1", Operation::Extract));
    assert!(!governor.allow("c1", Operation::Extract));
    assert_eq!(governor.count("c1", Operation::Extract), 5);
}

#[tokio::test(start_paused = true)]
async fn window_resets_after_elapsing() {
    let governor = governor(5, 60);
    for _ in 0..5 {
        assert!(governor.allow("c1", Operation::Extract));
    }
    assert!(!governor.allow("c1", Operation::Extract));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(!governor.allow("c1", Operation::Extract));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(governor.allow("c1", Operation::Extract));
    assert_eq!(governor.count("c1", Operation::Extract), 1);
}

#[tokio::test(start_paused = true)]
async fn window_does_not_slide() {
    let governor = governor(2, 60);
    assert!(governor.allow("c1", Operation::Extract));
    tokio::time::advance(Duration::from_secs(50)).await;
    assert!(governor.allow("c1", Operation::Extract));
    assert!(!governor.allow("c1", Operation::Extract));

    // Fixed window: the first request's window ends at t=60 regardless of
    // when the second request arrived.
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(governor.allow("c1", Operation::Extract));
}

#[tokio::test(start_paused = true)]
async fn clients_are_independent() {
    let governor = governor(1, 60);
    assert!(governor.allow("c1", Operation::Extract));
    assert!(!governor.allow("c1", Operation::Extract));
    assert!(governor.allow("c2", Operation::Extract));
}

#[tokio::test(start_paused = true)]
async fn operations_are_independent() {
    let governor = governor(1, 60);
    assert!(governor.allow("c1", Operation::Extract));
    assert!(!governor.allow("c1", Operation::Extract));
    assert!(governor.allow("c1", Operation::BatchExtract));
    assert!(governor.allow("c1", Operation::Health));
}

#[tokio::test(start_paused = true)]
async fn rejection_is_not_counted() {
    let governor = governor(2, 60);
    for _ in 0..10 {
        governor.allow("c1", Operation::Health);
    }
    assert_eq!(governor.count("c1", Operation::Health), 2);
}

#[tokio::test(start_paused = true)]
async fn check_reports_time_left_in_window() {
    let governor = governor(1, 60);
    governor.check("c1", Operation::Extract).unwrap();

    tokio::time::advance(Duration::from_secs(20)).await;
    let err = governor.check("c1", Operation::Extract).unwrap_err();
    match err {
        SkaldError::RateLimited {
            operation,
            retry_after,
        } => {
            assert_eq!(operation, Operation::Extract);
            assert_eq!(retry_after, Some(Duration::from_secs(40)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn default_quotas() {
    let governor = RateGovernor::new(RateLimitConfig::default());
    let admitted = (0..20)
        .filter(|_| governor.allow("c1", Operation::Health))
        .count();
    assert_eq!(admitted, 10);
    let admitted = (0..20)
        .filter(|_| governor.allow("c1", Operation::Extract))
        .count();
    assert_eq!(admitted, 5);
    let admitted = (0..20)
        .filter(|_| governor.allow("c1", Operation::BatchExtract))
        .count();
    assert_eq!(admitted, 5);
}

#[test]
fn concurrent_callers_never_exceed_limit() {
    use std::sync::Arc;
    use std::thread;

    let governor = Arc::new(governor(50, 3600));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let governor = Arc::clone(&governor);
            thread::spawn(move || {
                (0..100)
                    .filter(|_| governor.allow("shared", Operation::Extract))
                    .count()
            })
        })
        .collect();
    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 50);
}

#[tokio::test(start_paused = true)]
async fn five_per_minute_timeline() {
    let governor = governor(5, 60);

    // t = 0, 2, 4, 6, 8 (all within the first 10s)
    for i in 0..5 {
        if i > 0 {
            tokio::time::advance(Duration::from_secs(2)).await;
        }
        assert!(governor.allow("c1", Operation::Extract));
    }
    assert_eq!(governor.count("c1", Operation::Extract), 5);

    // t = 15
    tokio::time::advance(Duration::from_secs(7)).await;
    assert!(!governor.allow("c1", Operation::Extract));
    assert_eq!(governor.count("c1", Operation::Extract), 5);

    // t = 61
    tokio::time::advance(Duration::from_secs(46)).await;
    assert!(governor.allow("c1", Operation::Extract));
    assert_eq!(governor.count("c1", Operation::Extract), 1);
}

#[test]
fn retained_windows_bounded_by_max_clients() {
    let governor = RateGovernor::new(RateLimitConfig::new().max_clients(10));
    for i in 0..5_000 {
        assert!(governor.allow(&format!("client-{i}"), Operation::Extract));
    }
    assert!(governor.tracked_windows() <= 10);

    // The most recent client keeps its window
    assert_eq!(governor.count("client-4999", Operation::Extract), 1);
}

#[test]
fn idle_window_is_dropped_and_restarts() {
    let quota = RateLimit::new(2, Duration::from_millis(200));
    let governor = RateGovernor::new(
        RateLimitConfig::new()
            .health(quota)
            .extract(quota)
            .batch_extract(quota),
    );

    assert!(governor.allow("c1", Operation::Extract));
    assert!(governor.allow("c1", Operation::Extract));
    assert!(!governor.allow("c1", Operation::Extract));
    assert_eq!(governor.tracked_windows(), 1);

    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(governor.tracked_windows(), 0);

    assert!(governor.allow("c1", Operation::Extract));
    assert_eq!(governor.count("c1", Operation::Extract), 1);
    assert_eq!(governor.tracked_windows(), 1);
}
