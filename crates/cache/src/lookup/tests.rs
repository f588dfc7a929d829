use super::*;
use crate::fingerprint::fingerprint;
use async_trait::async_trait;
use hoard_core::{MethodId, Value};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Entries as the fake provider holds them; the state is fixed when seeded
#[derive(Clone)]
enum Slot {
    Fresh(Json),
    Stale(Json),
    Error(Json),
}

/// A cache provider that records every read and write
#[derive(Default)]
struct RecordingProvider {
    entries: Mutex<HashMap<String, Slot>>,
    stores: Mutex<Vec<Json>>,
    error_stores: Mutex<Vec<Json>>,
    reads: AtomicUsize,
}

impl RecordingProvider {
    fn seed(&self, call: &Invocation, slot: Slot) {
        self.entries.lock().insert(fingerprint(call, None), slot);
    }

    fn seed_stale<R: Serialize>(&self, call: &Invocation, value: R) {
        self.seed(call, Slot::Stale(serde_json::to_value(value).unwrap()));
    }

    fn seed_error<E: Serialize>(&self, call: &Invocation, error: E) {
        self.seed(call, Slot::Error(serde_json::to_value(error).unwrap()));
    }

    fn stored<R: DeserializeOwned>(&self) -> Vec<R> {
        self.stores
            .lock()
            .iter()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    fn stored_errors<E: DeserializeOwned>(&self) -> Vec<E> {
        self.error_stores
            .lock()
            .iter()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect()
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheProvider for RecordingProvider {
    async fn get<R: Cacheable, E: Cacheable>(
        &self,
        call: &Invocation,
        _policy: &CachePolicy,
    ) -> CachedObject<R, E> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let slot = self.entries.lock().get(&fingerprint(call, None)).cloned();
        match slot {
            None => CachedObject::None,
            Some(Slot::Fresh(v)) => {
                serde_json::from_value(v).map_or(CachedObject::None, CachedObject::Fresh)
            }
            Some(Slot::Stale(v)) => {
                serde_json::from_value(v).map_or(CachedObject::None, CachedObject::Stale)
            }
            Some(Slot::Error(v)) => {
                serde_json::from_value(v).map_or(CachedObject::None, CachedObject::Error)
            }
        }
    }

    async fn store<R: Cacheable>(&self, call: &Invocation, _policy: &CachePolicy, value: &R) {
        let json = serde_json::to_value(value).unwrap();
        self.seed(call, Slot::Fresh(json.clone()));
        self.stores.lock().push(json);
    }

    async fn store_error<E: Cacheable>(&self, call: &Invocation, _policy: &CachePolicy, error: &E) {
        let json = serde_json::to_value(error).unwrap();
        self.seed(call, Slot::Error(json.clone()));
        self.error_stores.lock().push(json);
    }

    async fn delete(&self, call: &Invocation) -> bool {
        self.entries.lock().remove(&fingerprint(call, None)).is_some()
    }
}

/// Hands every call the same policy
struct FixedPolicy(Option<CachePolicy>);

impl PolicyProvider for FixedPolicy {
    fn policy_for(&self, _method: &MethodId, _args: &[Value]) -> Option<CachePolicy> {
        self.0
    }
}

type Handler = LookupHandler<FixedPolicy, Arc<RecordingProvider>>;

fn policy() -> CachePolicy {
    CachePolicy::builder()
        .cache_for(Duration::from_secs(20))
        .expire_after(Duration::from_secs(120))
        .cache_errors_for(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn handler_with(policy: Option<CachePolicy>) -> (Handler, Arc<RecordingProvider>) {
    let provider = Arc::new(RecordingProvider::default());
    let handler = LookupHandler::new(FixedPolicy(policy), Arc::clone(&provider));
    (handler, provider)
}

fn call(n: i64) -> Invocation {
    let method = MethodId::new("Calculator", "square").param("i64");
    Invocation::new(method, vec![Value::from(n)])
}

/// A real call that counts its executions
fn counted(
    runs: &Arc<AtomicUsize>,
    outcome: Result<i64, String>,
) -> impl FnOnce() -> futures::future::Ready<Result<i64, String>> + Send + 'static {
    let runs = Arc::clone(runs);
    move || {
        runs.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(outcome)
    }
}

#[tokio::test]
async fn test_no_policy_always_calls_through() {
    let (handler, provider) = handler_with(None);
    let runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        assert_eq!(handler.lookup(&call(4), counted(&runs, Ok(16))).await, Ok(16));
    }

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(provider.reads(), 0);
    assert!(provider.stored::<i64>().is_empty());
    assert_eq!(handler.stats().bypasses, 3);
}

#[tokio::test]
async fn test_disabled_policy_always_calls_through() {
    let (handler, provider) = handler_with(Some(CachePolicy::disabled()));
    let runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        assert_eq!(handler.lookup(&call(4), counted(&runs, Ok(16))).await, Ok(16));
    }

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(provider.reads(), 0);
}

#[tokio::test]
async fn test_miss_stores_then_fresh_hit_skips_call() {
    let (handler, provider) = handler_with(Some(policy()));
    let runs = Arc::new(AtomicUsize::new(0));

    assert_eq!(handler.lookup(&call(4), counted(&runs, Ok(16))).await, Ok(16));
    assert_eq!(handler.lookup(&call(4), counted(&runs, Ok(99))).await, Ok(16));

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stored::<i64>(), vec![16]);
    let stats = handler.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.fresh_hits, 1);
    assert_eq!(handler.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_call() {
    let (handler, provider) = handler_with(Some(policy()));
    let runs = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let handler = handler.clone();
        let runs = Arc::clone(&runs);
        tasks.push(tokio::spawn(async move {
            handler
                .lookup(&call(9), move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<i64, String>(81)
                })
                .await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), Ok(81));
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stored::<i64>(), vec![81]);
    assert_eq!(handler.in_flight(), 0);
}

#[tokio::test]
async fn test_miss_failure_is_cached_and_propagated() {
    let (handler, provider) = handler_with(Some(policy()));
    let runs = Arc::new(AtomicUsize::new(0));

    let first = handler.lookup(&call(4), counted(&runs, Err("overflow".into()))).await;
    assert_eq!(first, Err("overflow".to_string()));
    assert_eq!(provider.stored_errors::<String>(), vec!["overflow".to_string()]);

    let replayed = handler.lookup(&call(4), counted(&runs, Ok(16))).await;
    assert_eq!(replayed, Err("overflow".to_string()));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_error_replays_without_calling() {
    let (handler, provider) = handler_with(Some(policy()));
    provider.seed_error(&call(4), "overflow");
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = handler.lookup(&call(4), counted(&runs, Ok(16))).await;

    assert_eq!(outcome, Err("overflow".to_string()));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(handler.stats().error_replays, 1);
}

#[tokio::test]
async fn test_stale_served_then_refreshed() {
    let (handler, provider) = handler_with(Some(policy()));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = handler.lookup(&call(4), counted(&runs, Ok(3))).await;
    assert_eq!(outcome, Ok(7));

    handler.settle_refreshes().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stored::<i64>(), vec![3]);
    assert_eq!(handler.pending_refreshes(), 0);

    let stats = handler.stats();
    assert_eq!(stats.stale_hits, 1);
    assert_eq!(stats.refreshes, 1);
    assert_eq!(stats.failed_refreshes, 0);
}

#[tokio::test]
async fn test_failed_refresh_keeps_stale_value() {
    let (handler, provider) = handler_with(Some(policy()));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = handler.lookup(&call(4), counted(&runs, Err("down".into()))).await;
    assert_eq!(outcome, Ok(7));

    handler.settle_refreshes().await;
    assert_eq!(provider.stored::<i64>(), vec![7]);
    assert!(provider.stored_errors::<String>().is_empty());
    assert_eq!(handler.stats().failed_refreshes, 1);
}

#[tokio::test]
async fn test_failed_refresh_bubbles_when_configured() {
    let bubbling = CachePolicy {
        bubble_exceptions: true,
        ..policy()
    };
    let (handler, provider) = handler_with(Some(bubbling));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = handler.lookup(&call(4), counted(&runs, Err("down".into()))).await;
    assert_eq!(outcome, Ok(7));

    handler.settle_refreshes().await;
    assert!(provider.stored::<i64>().is_empty());
    assert_eq!(provider.stored_errors::<String>(), vec!["down".to_string()]);
}

#[tokio::test]
async fn test_stale_with_refresh_running_does_not_start_another() {
    let (handler, provider) = handler_with(Some(policy()));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let slow = {
        let runs = Arc::clone(&runs);
        move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<i64, String>(3)
        }
    };
    assert_eq!(handler.lookup(&call(4), slow).await, Ok(7));
    assert_eq!(handler.lookup(&call(4), counted(&runs, Ok(5))).await, Ok(7));

    handler.settle_refreshes().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stored::<i64>(), vec![3]);
}

#[tokio::test]
async fn test_discard_stale_waits_for_real_call() {
    let discarding = CachePolicy {
        discard_stale: true,
        ..policy()
    };
    let (handler, provider) = handler_with(Some(discarding));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = handler.lookup(&call(4), counted(&runs, Ok(3))).await;

    assert_eq!(outcome, Ok(3));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stored::<i64>(), vec![3]);
    assert_eq!(handler.pending_refreshes(), 0);
}

#[tokio::test]
async fn test_joiner_calls_through_when_leader_is_cancelled() {
    let (handler, _provider) = handler_with(Some(policy()));

    let leader = {
        let handler = handler.clone();
        tokio::spawn(async move {
            handler
                .lookup(&call(4), || async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<i64, String>(16)
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(handler.in_flight(), 1);

    let joiner = {
        let handler = handler.clone();
        tokio::spawn(async move {
            handler
                .lookup(&call(4), || async { Ok::<i64, String>(17) })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(handler.stats().coalesced, 1);

    leader.abort();
    assert_eq!(joiner.await.unwrap(), Ok(17));
    assert_eq!(handler.in_flight(), 0);
}

#[test]
fn test_stale_hit_outside_tokio_serves_without_refresh() {
    let (handler, provider) = handler_with(Some(policy()));
    provider.seed_stale(&call(4), 7i64);
    let runs = Arc::new(AtomicUsize::new(0));

    let outcome = futures::executor::block_on(handler.lookup(&call(4), counted(&runs, Ok(3))));

    assert_eq!(outcome, Ok(7));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(handler.pending_refreshes(), 0);
    assert_eq!(handler.in_flight(), 0);
    assert!(provider.stored::<i64>().is_empty());
    assert_eq!(handler.stats().stale_hits, 1);
}

#[tokio::test]
async fn test_invalidate_forces_a_new_call() {
    let (handler, _provider) = handler_with(Some(policy()));
    let runs = Arc::new(AtomicUsize::new(0));

    handler.lookup(&call(4), counted(&runs, Ok(16))).await.unwrap();
    assert!(handler.invalidate(&call(4)).await);
    assert!(!handler.invalidate(&call(4)).await);
    handler.lookup(&call(4), counted(&runs, Ok(16))).await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

mod sync_lookup {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn sync_handler(
        policy: Option<CachePolicy>,
    ) -> (
        tokio::runtime::Runtime,
        SyncLookupHandler<FixedPolicy, Arc<RecordingProvider>>,
        Arc<RecordingProvider>,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (handler, provider) = handler_with(policy);
        let sync = SyncLookupHandler::new(handler, runtime.handle().clone());
        (runtime, sync, provider)
    }

    #[test]
    fn test_blocking_miss_then_hit() {
        let (_runtime, handler, provider) = sync_handler(Some(policy()));
        let runs = Arc::new(AtomicUsize::new(0));

        let first = {
            let runs = Arc::clone(&runs);
            handler.lookup(&call(4), move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, String>(16)
            })
        };
        let second = handler.lookup(&call(4), || Ok::<i64, String>(99));

        assert_eq!(first, Ok(16));
        assert_eq!(second, Ok(16));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(provider.stored::<i64>(), vec![16]);
    }

    #[test]
    fn test_blocking_threads_share_one_call() {
        let (_runtime, handler, provider) = sync_handler(Some(policy()));
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handler = handler.clone();
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    handler.lookup(&call(9), move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        Ok::<i64, String>(81)
                    })
                })
            })
            .collect();
        for worker in threads {
            assert_eq!(worker.join().unwrap(), Ok(81));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(provider.stored::<i64>(), vec![81]);
    }

    #[test]
    fn test_blocking_stale_refreshes_in_background() {
        let (runtime, handler, provider) = sync_handler(Some(policy()));
        provider.seed_stale(&call(4), 7i64);

        let outcome = handler.lookup(&call(4), || Ok::<i64, String>(3));
        assert_eq!(outcome, Ok(7));

        runtime.block_on(handler.handler().settle_refreshes());
        assert_eq!(provider.stored::<i64>(), vec![3]);
    }

    #[test]
    fn test_blocking_bypass_never_reads() {
        let (_runtime, handler, provider) = sync_handler(None);
        assert_eq!(handler.lookup(&call(4), || Ok::<i64, String>(16)), Ok(16));
        assert_eq!(provider.reads(), 0);
    }
}
