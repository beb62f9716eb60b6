//! Durable-store behaviour of the result cache: persistence across reopen,
//! fallback to memory, and the startup eviction sweep.

use std::time::Duration;

use dataflow_cache::{compute_signature, horizon_millis, CacheBackendKind, CacheEntry, ResultCache};
use dataflow_core::{
    CalcResult, CalculationRequest, ModuleDefinition, ModuleInstance, ModuleRegistry, Template,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn registry() -> ModuleRegistry {
    vec![ModuleDefinition::new("load", "1")].into_iter().collect()
}

fn request(terminal: &str) -> CalculationRequest {
    let mut template = Template::new();
    let node = template.add_module(ModuleInstance::new("load"));
    CalculationRequest::new(template, node, terminal)
}

fn result(label: &str) -> CalcResult {
    CalcResult::new("refl.data", vec![serde_json::json!({"label": label, "y": [1.0, 2.0]})])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let path = path.to_str().unwrap();
    let sig = compute_signature(&request("output"), &registry()).unwrap();

    {
        let cache = ResultCache::open(path);
        assert_eq!(cache.backend(), CacheBackendKind::Durable);
        cache.set(sig.clone(), result("first")).await.unwrap();
    }

    let reopened = ResultCache::open(path);
    assert!(reopened.is_persistent());
    assert_eq!(reopened.get(&sig).await.unwrap(), result("first"));
}

#[tokio::test]
async fn test_unopenable_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("dir").join("cache.db");
    let path = path.to_str().unwrap();

    assert!(ResultCache::open_durable(path).is_err());

    let cache = ResultCache::open(path);
    assert_eq!(cache.backend(), CacheBackendKind::Memory);
    assert!(cache.fallback_reason().is_some());

    // Same contract, just not durable.
    let sig = compute_signature(&request("output"), &registry()).unwrap();
    assert!(cache.get(&sig).await.unwrap_err().is_not_found());
    cache.set(sig.clone(), result("mem")).await.unwrap();
    assert_eq!(cache.get(&sig).await.unwrap(), result("mem"));
    assert_eq!(cache.remove_older_than(i64::MAX).await.unwrap(), 1);
    cache.clear().await.unwrap();
    assert!(cache.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_initialize_sweeps_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let path = path.to_str().unwrap();
    let day = Duration::from_secs(86_400);

    let old = compute_signature(&request("old"), &registry()).unwrap();
    let fresh = compute_signature(&request("fresh"), &registry()).unwrap();
    {
        let cache = ResultCache::open(path);
        cache
            .insert_entry(CacheEntry {
                signature: old.clone(),
                created_at: horizon_millis(day * 120),
                value: result("old"),
            })
            .await
            .unwrap();
        cache.set(fresh.clone(), result("fresh")).await.unwrap();
    }

    let cache = ResultCache::initialize(path, day * 90).await;
    assert!(cache.get(&old).await.is_err());
    assert_eq!(cache.get(&fresh).await.unwrap(), result("fresh"));
    assert_eq!(cache.entries().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_sets_last_write_wins() {
    let cache = ResultCache::in_memory();
    let sig = compute_signature(&request("output"), &registry()).unwrap();

    let a = {
        let cache = cache.clone();
        let sig = sig.clone();
        tokio::spawn(async move { cache.set(sig, result("a")).await })
    };
    a.await.unwrap().unwrap();
    let b = {
        let cache = cache.clone();
        let sig = sig.clone();
        tokio::spawn(async move { cache.set(sig, result("b")).await })
    };
    b.await.unwrap().unwrap();

    assert_eq!(cache.get(&sig).await.unwrap(), result("b"));
    assert_eq!(cache.len().await.unwrap(), 1);
}
