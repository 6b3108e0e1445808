/// Integration tests for the concurrent ratio store
use pricing_engine::{
    rule::{SegmentRule, SegmentedRatioConfig},
    store::RatioStore,
};
use std::collections::HashMap;
use std::sync::Arc;

fn rule(priority: i32, model_ratio: f64) -> SegmentRule {
    SegmentRule {
        priority,
        model_ratio,
        completion_ratio: 1.0,
        ..Default::default()
    }
}

fn config(model_name: &str, rules: Vec<SegmentRule>) -> SegmentedRatioConfig {
    SegmentedRatioConfig {
        model_name: model_name.to_string(),
        rules,
        enabled: true,
    }
}

#[tokio::test]
async fn test_rules_are_stored_in_priority_order_regardless_of_input_order() {
    let store = RatioStore::new();

    store
        .set(
            "gpt-x",
            config("gpt-x", vec![rule(1, 1.0), rule(7, 2.0), rule(3, 3.0), rule(9, 4.0)]),
        )
        .await;

    let stored = store.get("gpt-x").await.unwrap();
    let priorities: Vec<i32> = stored.rules.iter().map(|r| r.priority).collect();
    assert_eq!(priorities, vec![9, 7, 3, 1]);
}

#[tokio::test]
async fn test_equal_priorities_keep_relative_order() {
    let store = RatioStore::new();

    store
        .set(
            "gpt-x",
            config("gpt-x", vec![rule(5, 1.0), rule(5, 2.0), rule(5, 3.0)]),
        )
        .await;

    let stored = store.get("gpt-x").await.unwrap();
    let ratios: Vec<f64> = stored.rules.iter().map(|r| r.model_ratio).collect();
    assert_eq!(ratios, vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_upsert_replaces_whole_configuration() {
    let store = RatioStore::new();

    store
        .set("gpt-x", config("gpt-x", vec![rule(0, 1.0), rule(1, 2.0)]))
        .await;
    store.set("gpt-x", config("gpt-x", vec![rule(0, 9.0)])).await;

    let stored = store.get("gpt-x").await.unwrap();
    assert_eq!(stored.rules.len(), 1);
    assert_eq!(stored.rules[0].model_ratio, 9.0);
}

#[tokio::test]
async fn test_delete_missing_model_is_silent() {
    let store = RatioStore::new();
    store.set("keep", config("keep", vec![rule(0, 1.0)])).await;

    store.delete("never-existed").await;

    assert_eq!(store.model_count().await, 1);
    assert!(store.get("keep").await.is_some());
}

#[tokio::test]
async fn test_snapshot_is_independent_of_later_mutations() {
    let store = RatioStore::new();
    store.set("gpt-x", config("gpt-x", vec![rule(0, 1.0)])).await;

    let snapshot = store.snapshot().await;

    store.delete("gpt-x").await;
    store.set("other", config("other", vec![rule(0, 2.0)])).await;

    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key("gpt-x"));
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    let store = RatioStore::new();
    store.set("gpt-x", config("gpt-x", vec![rule(0, 1.0)])).await;

    store.reset().await;
    store.reset().await;

    assert_eq!(store.model_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_a_partial_import() {
    let store = Arc::new(RatioStore::new());

    // Two complete states; readers must only ever see one or the other
    let mut state_a = HashMap::new();
    state_a.insert("alpha".to_string(), config("alpha", vec![rule(0, 1.0)]));
    state_a.insert(
        "shared".to_string(),
        config("shared", vec![rule(0, 1.0)]),
    );

    let mut state_b = HashMap::new();
    state_b.insert("beta".to_string(), config("beta", vec![rule(0, 2.0)]));
    state_b.insert(
        "shared".to_string(),
        config("shared", vec![rule(2, 2.0), rule(1, 2.0), rule(0, 2.0)]),
    );

    store.replace_all(state_a.clone()).await;

    // What a consistent snapshot must look like (rules sorted by the store)
    let canonical_a = store.snapshot().await;
    store.replace_all(state_b.clone()).await;
    let canonical_b = store.snapshot().await;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                if i % 2 == 0 {
                    store.replace_all(state_a.clone()).await;
                } else {
                    store.replace_all(state_b.clone()).await;
                }
            }
        })
    };

    let reader = {
        let store = store.clone();
        let canonical_a = canonical_a.clone();
        let canonical_b = canonical_b.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let snapshot = store.snapshot().await;
                assert!(
                    snapshot == canonical_a || snapshot == canonical_b,
                    "reader observed a state that is neither the old nor the new mapping"
                );
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn test_invalidation_fires_once_per_import() {
    let store = RatioStore::new();
    let mut invalidations = store.subscribe_invalidations();

    let mut incoming = HashMap::new();
    incoming.insert("a".to_string(), config("a", vec![rule(0, 1.0)]));
    incoming.insert("b".to_string(), config("b", vec![rule(0, 1.0)]));
    store.replace_all(incoming).await;

    invalidations.try_recv().expect("expected one invalidation");
    assert!(invalidations.try_recv().is_err());
}
