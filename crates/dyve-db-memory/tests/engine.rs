//! Reconciler and scheduler driven against the in-memory store.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{Org, SPACE, SPACES, ScriptedUpstream, Space, child_ids, plan, seed_org};
use dyve_core::{
    Cascade, Entity, HierarchyStore, Job, LeasePlan, ManualClock, ReconcileHandler, Reconciler,
    RunOutcome, Scheduler, ScopeTag, handler_fn,
};
use dyve_db_memory::InMemoryStore;
use time::macros::datetime;

fn without_stamps(entities: Vec<Entity>) -> Vec<Entity> {
    entities
        .into_iter()
        .map(|mut e| {
            e.last_reconciled = None;
            e
        })
        .collect()
}

#[tokio::test]
async fn test_unknown_scope_is_skipped_without_touching_entities() {
    let store = Arc::new(InMemoryStore::new(
        LeasePlan::new().then(common::ORG, ScopeTag::from_static("mystery")),
    ));
    let org = seed_org(&store, "o1").await;
    store
        .upsert_children(
            &org,
            &SPACE,
            vec![dyve_core::ChildRecord {
                id: "s1".into(),
                info: serde_json::json!({ "guid": "s1" }),
            }],
        )
        .await
        .unwrap();
    let before = store.snapshot().await;

    let upstream = Arc::new(ScriptedUpstream::<Org, Space>::new());
    let reconciler = Reconciler::builder(store.clone(), Duration::from_secs(60))
        .handler(SPACES, Cascade::new(SPACES, upstream.clone(), store.clone()))
        .build();

    let outcome = reconciler.run().await;

    assert!(matches!(outcome, RunOutcome::Skipped(ref job) if job.entity_id == "o1"));
    assert!(outcome.worked());
    assert!(outcome.error().is_none());
    assert_eq!(upstream.fetches(), 0);
    assert_eq!(without_stamps(store.snapshot().await), without_stamps(before));
}

#[tokio::test]
async fn test_reconciler_walks_the_hierarchy_level_by_level() {
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 0:00 UTC)));
    let store = Arc::new(InMemoryStore::with_clock(plan(), clock));
    let org = seed_org(&store, "o1").await;

    let spaces_upstream = Arc::new(ScriptedUpstream::<Org, Space>::new());
    spaces_upstream.set("o1", Ok(vec![Space::new("s1"), Space::new("s2")]));
    let apps_upstream = Arc::new(ScriptedUpstream::<Space, common::App>::new());
    apps_upstream.set("s1", Ok(vec![common::App::new("a1")]));
    apps_upstream.set("s2", Ok(Vec::new()));

    let reconciler = Reconciler::builder(store.clone(), Duration::from_secs(60))
        .handler(SPACES, Cascade::new(SPACES, spaces_upstream.clone(), store.clone()))
        .handler(
            common::APPS,
            Cascade::new(common::APPS, apps_upstream.clone(), store.clone()),
        )
        .build();

    let mut completed = Vec::new();
    loop {
        match reconciler.run().await {
            RunOutcome::Idle => break,
            RunOutcome::Completed(job) => completed.push(format!("{}:{}", job.scope, job.entity_id)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(completed, vec!["spaces:o1", "apps:s1", "apps:s2"]);
    assert_eq!(child_ids(&store, &org, &SPACE).await, vec!["s1", "s2"]);
    assert_eq!(store.len().await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_org_is_reconciled_exactly_once_by_concurrent_workers() {
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 0:00 UTC)));
    let store = Arc::new(InMemoryStore::with_clock(
        LeasePlan::new().then(common::ORG, SPACES),
        clock,
    ));
    seed_org(&store, "o1").await;

    let upstream = Arc::new(ScriptedUpstream::<Org, Space>::new());
    upstream.set("o1", Ok(vec![Space::new("s1")]));
    let cascade = Arc::new(Cascade::new(SPACES, upstream.clone(), store.clone()));

    let reconciles = Arc::new(AtomicUsize::new(0));
    let counting = {
        let reconciles = reconciles.clone();
        handler_fn(move |job: Job| {
            let cascade = cascade.clone();
            let reconciles = reconciles.clone();
            async move {
                reconciles.fetch_add(1, Ordering::SeqCst);
                cascade.reconcile(&job).await
            }
        })
    };

    let reconciler = Reconciler::builder(store.clone(), Duration::from_secs(60))
        .handler(SPACES, counting)
        .build();
    let handle = Scheduler::new(Arc::new(reconciler)).start(4, Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown().await;

    assert_eq!(reconciles.load(Ordering::SeqCst), 1);
    assert_eq!(upstream.fetches(), 1);
}
