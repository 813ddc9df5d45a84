//! Audit queue behavior against the SQLite store.

mod common;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bridge_audit::adapters::sqlite::SqliteAuditQueue;
use bridge_audit::domain::models::{OutcomeChannel, QueueStats, WorkerId};
use bridge_audit::domain::ports::AuditQueue;

use common::{audit, fast_queue_config, file_backed_pool, setup_queue};

fn worker(id: &str) -> WorkerId {
    WorkerId::new(id).unwrap()
}

fn everything() -> (DateTime<Utc>, DateTime<Utc>) {
    (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
}

#[tokio::test]
async fn test_promote_moves_only_due_audits() {
    let (_pool, queue, _bus) = setup_queue().await;
    let now = Utc::now();

    queue
        .enqueue(&[
            audit("past", now - ChronoDuration::seconds(10)),
            audit("future", now + ChronoDuration::seconds(10)),
        ])
        .await
        .unwrap();

    let (moved, committed) = queue.promote(DateTime::<Utc>::MIN_UTC, now).await.unwrap();
    assert_eq!((moved, committed), (1, true));

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.ready, 1);
    assert_eq!(stats.backlog, 1);

    let claimed = queue.claim(&worker("w")).await.unwrap().unwrap();
    assert_eq!(claimed.payload.challenge, "past");
}

#[tokio::test]
async fn test_verified_commit_lands_in_passed_and_publishes_once() {
    let (_pool, queue, bus) = setup_queue().await;
    let mut outcomes = bus.subscribe();
    let w = worker("w");

    queue
        .enqueue(&[audit("c1", Utc::now() - ChronoDuration::seconds(1))])
        .await
        .unwrap();
    queue.promote(DateTime::<Utc>::MIN_UTC, Utc::now()).await.unwrap();
    let claimed = queue.claim(&w).await.unwrap().unwrap();

    assert!(queue.commit(&w, &claimed, true).await.unwrap());

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.pending, 0);
    assert!(queue.list_pending(&w).await.unwrap().is_empty());

    let outcome = outcomes.recv().await.unwrap();
    assert_eq!(outcome.channel, OutcomeChannel::Pass);
    assert_eq!(outcome.audit, claimed);
    assert_eq!(outcome.worker_id, w);
    assert!(outcomes.try_recv().is_err(), "exactly one notification");
    assert_eq!(bus.published(OutcomeChannel::Pass), 1);
}

#[tokio::test]
async fn test_failed_commit_does_not_touch_passed() {
    let (_pool, queue, bus) = setup_queue().await;
    let w = worker("w");
    let now = Utc::now() - ChronoDuration::seconds(1);

    queue.enqueue(&[audit("ok", now), audit("bad", now)]).await.unwrap();
    queue.promote(DateTime::<Utc>::MIN_UTC, Utc::now()).await.unwrap();

    let first = queue.claim(&w).await.unwrap().unwrap();
    let second = queue.claim(&w).await.unwrap().unwrap();
    assert!(queue.commit(&w, &first, true).await.unwrap());
    assert!(queue.commit(&w, &second, false).await.unwrap());

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(bus.published(OutcomeChannel::Fail), 1);

    let failed = queue.list_outcomes(false, 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payload.challenge, "bad");
}

#[tokio::test]
async fn test_recommit_of_terminal_audit_is_noop() {
    let (_pool, queue, bus) = setup_queue().await;
    let w = worker("w");

    queue.enqueue(&[audit("c1", Utc::now())]).await.unwrap();
    queue.promote(everything().0, everything().1).await.unwrap();
    let claimed = queue.claim(&w).await.unwrap().unwrap();

    assert!(queue.commit(&w, &claimed, true).await.unwrap());
    assert!(!queue.commit(&w, &claimed, true).await.unwrap());
    assert!(!queue.commit(&w, &claimed, false).await.unwrap());

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(bus.published(OutcomeChannel::Pass), 1);
    assert_eq!(bus.published(OutcomeChannel::Fail), 0);
}

#[tokio::test]
async fn test_ready_is_fifo_across_promotions() {
    let (_pool, queue, _bus) = setup_queue().await;
    let base = Utc::now() - ChronoDuration::hours(1);
    let w = worker("w");

    queue
        .enqueue(&[
            audit("b", base + ChronoDuration::seconds(2)),
            audit("a", base + ChronoDuration::seconds(1)),
        ])
        .await
        .unwrap();
    queue.promote(everything().0, base + ChronoDuration::seconds(5)).await.unwrap();

    // Promoted later, so queued behind a and b even though scheduled earlier
    queue.enqueue(&[audit("z", base)]).await.unwrap();
    queue.promote(everything().0, Utc::now()).await.unwrap();

    let mut order = Vec::new();
    while let Some(claimed) = queue.claim(&w).await.unwrap() {
        order.push(claimed.payload.challenge);
    }
    assert_eq!(order, vec!["a", "b", "z"]);

    let pending: Vec<_> = queue
        .list_pending(&w)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.payload.challenge)
        .collect();
    assert_eq!(pending, order, "pending partition keeps claim order");
}

#[tokio::test]
async fn test_every_audit_is_in_exactly_one_state() {
    let (_pool, queue, _bus) = setup_queue().await;
    let now = Utc::now();
    let audits: Vec<_> = (0..12)
        .map(|i| audit(&format!("c{i}"), now + ChronoDuration::seconds(i - 6)))
        .collect();
    queue.enqueue(&audits).await.unwrap();

    queue.promote(everything().0, now).await.unwrap();
    let w1 = worker("w1");
    let w2 = worker("w2");
    let a = queue.claim(&w1).await.unwrap().unwrap();
    let b = queue.claim(&w2).await.unwrap().unwrap();
    queue.claim(&w2).await.unwrap().unwrap();
    queue.commit(&w1, &a, true).await.unwrap();
    queue.commit(&w2, &b, false).await.unwrap();

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.total(), 12);
    assert_eq!(
        stats,
        QueueStats {
            backlog: 5,
            ready: 4,
            pending: 1,
            passed: 1,
            failed: 1,
        }
    );
}

#[tokio::test]
async fn test_claim_blocking_wakes_on_promotion() {
    let (_pool, queue, _bus) = setup_queue().await;
    queue.enqueue(&[audit("late", Utc::now())]).await.unwrap();

    let waiter = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.claim_blocking(&worker("w"), Duration::from_secs(5)).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.promote(everything().0, everything().1).await.unwrap();

    let claimed = waiter.await.unwrap().unwrap();
    assert_eq!(claimed.unwrap().payload.challenge, "late");
}

#[tokio::test]
async fn test_concurrent_promotes_never_double_promote() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audits.db");
    let now = Utc::now();

    let seed = SqliteAuditQueue::new(file_backed_pool(&path).await, fast_queue_config());
    let audits: Vec<_> = (0..50)
        .map(|i| audit(&format!("c{i}"), now - ChronoDuration::seconds(i)))
        .collect();
    seed.enqueue(&audits).await.unwrap();

    let mut promoters = Vec::new();
    for _ in 0..4 {
        let queue = SqliteAuditQueue::new(file_backed_pool(&path).await, fast_queue_config());
        promoters.push(tokio::spawn(async move {
            queue.promote(DateTime::<Utc>::MIN_UTC, now).await.unwrap()
        }));
    }

    let mut moved = 0;
    let mut committed = 0;
    for promoter in promoters {
        let (count, did_commit) = promoter.await.unwrap();
        moved += count;
        committed += u64::from(did_commit);
    }

    assert_eq!(moved, 50);
    assert!(committed >= 1);
    let stats = seed.stats().await.unwrap();
    assert_eq!(stats.ready, 50);
    assert_eq!(stats.backlog, 0);
}

#[tokio::test]
async fn test_concurrent_workers_never_double_claim() {
    const WORKERS: usize = 3;
    const LIMIT: usize = 4;
    const AUDITS: usize = 60;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audits.db");

    let seed = SqliteAuditQueue::new(file_backed_pool(&path).await, fast_queue_config());
    let audits: Vec<_> = (0..AUDITS)
        .map(|i| audit(&format!("c{i}"), Utc::now() - ChronoDuration::seconds(1)))
        .collect();
    seed.enqueue(&audits).await.unwrap();
    seed.promote(everything().0, everything().1).await.unwrap();

    let mut slots = Vec::new();
    for w in 0..WORKERS {
        // One pool per worker, as separate processes would have
        let queue = Arc::new(SqliteAuditQueue::new(
            file_backed_pool(&path).await,
            fast_queue_config(),
        ));
        let id = worker(&format!("w{w}"));
        for _ in 0..LIMIT {
            let queue = Arc::clone(&queue);
            let id = id.clone();
            slots.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(audit) = queue.claim(&id).await.unwrap() {
                    let pending = queue.list_pending(&id).await.unwrap().len();
                    assert!(pending <= LIMIT, "{id} holds {pending} audits");
                    claimed.push(audit.payload.challenge.clone());
                    queue.commit(&id, &audit, true).await.unwrap();
                }
                claimed
            }));
        }
    }

    let mut seen = HashSet::new();
    for slot in slots {
        for challenge in slot.await.unwrap() {
            assert!(seen.insert(challenge.clone()), "{challenge} claimed twice");
        }
    }

    assert_eq!(seen.len(), AUDITS);
    let stats = seed.stats().await.unwrap();
    assert_eq!(stats.passed, AUDITS as u64);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.ready, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_of_duplicates_settle_every_occurrence() {
    const DUPLICATES: usize = 12;
    const POOLS: usize = 4;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audits.db");
    let w = worker("w");

    let seed = SqliteAuditQueue::new(file_backed_pool(&path).await, fast_queue_config());
    let dup = audit("dup", Utc::now() - ChronoDuration::seconds(1));
    seed.enqueue(&vec![dup.clone(); DUPLICATES]).await.unwrap();
    seed.promote(everything().0, everything().1).await.unwrap();
    for _ in 0..DUPLICATES {
        seed.claim(&w).await.unwrap().unwrap();
    }

    // Every pool races to commit the same payload; each commit must land on
    // a distinct pending occurrence.
    let mut queues = Vec::new();
    for _ in 0..POOLS {
        queues.push(Arc::new(SqliteAuditQueue::new(
            file_backed_pool(&path).await,
            fast_queue_config(),
        )));
    }
    let mut committers = Vec::new();
    for i in 0..DUPLICATES {
        let queue = Arc::clone(&queues[i % POOLS]);
        let (w, dup) = (w.clone(), dup.clone());
        committers.push(tokio::spawn(async move {
            queue.commit(&w, &dup, i % 2 == 0).await.unwrap()
        }));
    }
    for committer in committers {
        assert!(committer.await.unwrap());
    }

    let stats = seed.stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.passed, (DUPLICATES / 2) as u64);
    assert_eq!(stats.failed, (DUPLICATES / 2) as u64);
    assert!(!seed.commit(&w, &dup, true).await.unwrap());
}
