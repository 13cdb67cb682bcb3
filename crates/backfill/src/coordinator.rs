use std::sync::Arc;

use shardline_api::{ChainLog, ChunkSource, LocalChunkStore, Replicator, ShardResult};
use shardline_primitives::{ChunkKey, ChunkRecord};
use shardline_tasks::TaskExecutor;
use tracing::{debug, info, trace, warn};

use crate::BackfillConfig;

/// Stores chunks announced by the chain together with any missing history.
pub struct BackfillCoordinator<C, S, G, P> {
    chain: Arc<C>,
    store: Arc<S>,
    source: Arc<G>,
    replicator: Arc<P>,
    executor: TaskExecutor,
    config: BackfillConfig,
}

impl<C, S, G, P> std::fmt::Debug for BackfillCoordinator<C, S, G, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackfillCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C, S, G, P> BackfillCoordinator<C, S, G, P>
where
    C: ChainLog,
    S: LocalChunkStore,
    G: ChunkSource,
    P: Replicator + 'static,
{
    /// Create a coordinator. Replication tasks are spawned on `executor`.
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        source: Arc<G>,
        replicator: Arc<P>,
        executor: TaskExecutor,
        config: BackfillConfig,
    ) -> Self {
        Self {
            chain,
            store,
            source,
            replicator,
            executor,
            config,
        }
    }

    /// Predecessors of `key` that could not be found, newest first.
    ///
    /// Walks backward from the chunk just before `key`, probing each with a
    /// single-block request, and stops at the first one found. Fails open:
    /// if the chain log cannot list the predecessors, none are reported.
    pub async fn check_history(&self, key: &ChunkKey, query_remote: bool) -> Vec<ChunkKey> {
        let Some(range) = key.predecessors(self.config.depth) else {
            return Vec::new();
        };
        let records = match self.chain.get_chunk_records(range).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    chunk = %key,
                    start = range.start,
                    end = range.end,
                    %err,
                    "failed to read preceding chunk records"
                );
                return Vec::new();
            }
        };

        let mut absent = Vec::new();
        let depth = usize::try_from(self.config.depth).unwrap_or(usize::MAX);
        for record in records.iter().rev().take(depth) {
            let probe = record.key().probe();
            match self.source.get_chunk(&probe, query_remote).await {
                Ok(bodies) if !bodies.is_empty() => {
                    trace!(chunk = %key, present = %probe, "history present");
                    break;
                }
                Ok(_) => debug!(chunk = %probe, "predecessor returned no bodies"),
                Err(err) => debug!(chunk = %probe, %err, "predecessor not found"),
            }
            absent.push(record.key());
        }
        absent
    }

    /// Store `key` locally.
    ///
    /// A chunk already stored only has its retention refreshed. Otherwise
    /// the bodies come from the chain log, whose errors are returned as is.
    pub async fn store_chunk(&self, key: &ChunkKey) -> ShardResult<()> {
        if self.store.exists(key)? {
            self.store.refresh_retention(key)?;
            trace!(chunk = %key, "retention refreshed");
            return Ok(());
        }
        let bodies = self.chain.get_chunk_block_body(key).await?;
        self.store.put(key, bodies)?;
        metrics::counter!("shardline_backfill_stores_total").increment(1);
        debug!(chunk = %key, "chunk stored");
        Ok(())
    }

    /// Store `key` and every predecessor found missing, oldest first.
    ///
    /// Every chunk is attempted even after a failure; the first error is
    /// returned. With `replicate_out`, predecessors are probed on the
    /// network and a successfully stored `key` is pushed to peers in the
    /// background.
    pub async fn ensure_chunk_and_history(
        &self,
        key: &ChunkKey,
        replicate_out: bool,
    ) -> ShardResult<()> {
        key.validate()?;

        let absent = self.check_history(key, replicate_out).await;
        if !absent.is_empty() {
            info!(chunk = %key, missing = absent.len(), "backfilling history");
        }

        let mut first_err = None;
        for chunk in absent.iter().rev() {
            if let Err(err) = self.store_chunk(chunk).await {
                metrics::counter!("shardline_backfill_failures_total").increment(1);
                warn!(chunk = %chunk, %err, "failed to store chunk");
                first_err.get_or_insert(err);
            }
        }

        match self.store_chunk(key).await {
            Ok(()) => {
                if replicate_out {
                    self.spawn_replication(ChunkRecord::from(key));
                }
            }
            Err(err) => {
                metrics::counter!("shardline_backfill_failures_total").increment(1);
                warn!(chunk = %key, %err, "failed to store chunk");
                first_err.get_or_insert(err);
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    fn spawn_replication(&self, record: ChunkRecord) {
        let replicator = Arc::clone(&self.replicator);
        self.executor.spawn(async move {
            if let Err(err) = replicator.replicate(&record).await {
                warn!(chunk = %record.key(), %err, "replication failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shardline_api::ShardError;
    use shardline_primitives::BlockBodies;
    use shardline_storage::MemoryChunkStore;
    use shardline_tasks::TaskManager;
    use shardline_test_utils::{
        MockChainLog, RecordingReplicator, bodies_for, chunk_key, chunk_record,
    };

    use super::*;

    /// Network view holding a fixed set of chunk hashes.
    #[derive(Default)]
    struct NetworkView {
        present: HashSet<Vec<u8>>,
        probes: Mutex<Vec<ChunkKey>>,
    }

    impl NetworkView {
        fn with_present(indices: impl IntoIterator<Item = u64>) -> Self {
            Self {
                present: indices
                    .into_iter()
                    .map(|i| chunk_key(i).hash().to_vec())
                    .collect(),
                probes: Mutex::new(Vec::new()),
            }
        }

        fn probed_indices(&self) -> Vec<u64> {
            self.probes.lock().iter().map(|k| k.start() / 10).collect()
        }
    }

    #[async_trait]
    impl ChunkSource for NetworkView {
        async fn get_chunk(&self, key: &ChunkKey, _query_remote: bool) -> ShardResult<BlockBodies> {
            self.probes.lock().push(key.clone());
            if self.present.contains(key.hash()) {
                Ok(bodies_for(key))
            } else {
                Err(ShardError::NotFound { key: key.clone() })
            }
        }
    }

    /// Memory store rejecting writes for selected hashes.
    struct RejectingStore {
        inner: MemoryChunkStore,
        reject: HashSet<Vec<u8>>,
    }

    impl LocalChunkStore for RejectingStore {
        fn exists(&self, key: &ChunkKey) -> ShardResult<bool> {
            self.inner.exists(key)
        }

        fn get(&self, key: &ChunkKey) -> ShardResult<Option<BlockBodies>> {
            self.inner.get(key)
        }

        fn put(&self, key: &ChunkKey, bodies: BlockBodies) -> ShardResult<()> {
            if self.reject.contains(key.hash()) {
                return Err(ShardError::storage(format!("rejected {}", key.start())));
            }
            self.inner.put(key, bodies)
        }

        fn refresh_retention(&self, key: &ChunkKey) -> ShardResult<()> {
            self.inner.refresh_retention(key)
        }
    }

    struct Harness<S> {
        chain: Arc<MockChainLog>,
        store: Arc<S>,
        network: Arc<NetworkView>,
        replicator: Arc<RecordingReplicator>,
        coordinator: BackfillCoordinator<MockChainLog, S, NetworkView, RecordingReplicator>,
        _manager: TaskManager,
    }

    fn harness_with<S: LocalChunkStore>(
        store: S,
        network: NetworkView,
        replicator: RecordingReplicator,
    ) -> Harness<S> {
        let manager = TaskManager::current();
        let chain = Arc::new(MockChainLog::new().with_chunks(0..=20));
        let store = Arc::new(store);
        let network = Arc::new(network);
        let replicator = Arc::new(replicator);
        let coordinator = BackfillCoordinator::new(
            chain.clone(),
            store.clone(),
            network.clone(),
            replicator.clone(),
            manager.executor(),
            BackfillConfig::default(),
        );
        Harness {
            chain,
            store,
            network,
            replicator,
            coordinator,
            _manager: manager,
        }
    }

    fn harness(network: NetworkView) -> Harness<MemoryChunkStore> {
        harness_with(MemoryChunkStore::new(), network, RecordingReplicator::new())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_history_walk_stops_at_first_present() {
        let h = harness(NetworkView::with_present([12]));
        let absent = h.coordinator.check_history(&chunk_key(15), true).await;
        assert_eq!(absent, vec![chunk_key(14), chunk_key(13)]);
        assert_eq!(h.network.probed_indices(), vec![14, 13, 12]);
    }

    #[tokio::test]
    async fn test_history_walk_bounded_by_depth() {
        let h = harness(NetworkView::default());
        let absent = h.coordinator.check_history(&chunk_key(15), true).await;
        assert_eq!(absent.len(), 10);
        assert_eq!(h.network.probed_indices(), (5..=14).rev().collect::<Vec<_>>());
        assert!(h.network.probes.lock().iter().all(|probe| probe.start() == probe.end()));
    }

    #[tokio::test]
    async fn test_first_chunk_has_no_history() {
        let h = harness(NetworkView::default());
        assert!(h.coordinator.check_history(&chunk_key(0), true).await.is_empty());
        assert!(h.network.probed_indices().is_empty());
    }

    #[tokio::test]
    async fn test_records_failure_skips_history() {
        let h = harness(NetworkView::default());
        h.chain.fail_records(true);
        h.coordinator
            .ensure_chunk_and_history(&chunk_key(15), false)
            .await
            .unwrap();
        assert!(h.network.probed_indices().is_empty());
        assert_eq!(h.store.records(), vec![chunk_record(15)]);
    }

    #[tokio::test]
    async fn test_ensure_stores_missing_history() {
        let h = harness(NetworkView::with_present([12]));
        h.coordinator
            .ensure_chunk_and_history(&chunk_key(15), false)
            .await
            .unwrap();

        for index in [13, 14, 15] {
            assert!(h.store.exists(&chunk_key(index)).unwrap());
        }
        assert!(!h.store.exists(&chunk_key(12)).unwrap());
        assert_eq!(h.chain.body_fetches(), 3);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let h = harness(NetworkView::with_present([12]));
        let key = chunk_key(15);
        h.coordinator.ensure_chunk_and_history(&key, false).await.unwrap();
        let fetches = h.chain.body_fetches();
        let writes = h.store.writes();

        h.coordinator.ensure_chunk_and_history(&key, false).await.unwrap();
        assert_eq!(h.chain.body_fetches(), fetches);
        assert_eq!(h.store.writes(), writes);
    }

    #[tokio::test]
    async fn test_store_twice_only_refreshes_retention() {
        let h = harness(NetworkView::default());
        let key = chunk_key(3);
        h.coordinator.store_chunk(&key).await.unwrap();
        h.coordinator.store_chunk(&key).await.unwrap();
        assert_eq!(h.store.writes(), 1);
        assert_eq!(h.store.retention_touches(), 1);
        assert_eq!(h.chain.body_fetches(), 1);
    }

    #[tokio::test]
    async fn test_store_surfaces_chain_error() {
        let h = harness(NetworkView::default());
        h.chain.fail_bodies(true);
        assert_matches!(
            h.coordinator.store_chunk(&chunk_key(3)).await,
            Err(ShardError::Chain { .. })
        );
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_continues_and_returns_first_error() {
        let store = RejectingStore {
            inner: MemoryChunkStore::new(),
            reject: [chunk_key(12), chunk_key(15)]
                .iter()
                .map(|k| k.hash().to_vec())
                .collect(),
        };
        let h = harness_with(store, NetworkView::with_present([10]), RecordingReplicator::new());

        let err = h
            .coordinator
            .ensure_chunk_and_history(&chunk_key(15), true)
            .await
            .unwrap_err();
        assert_matches!(err, ShardError::Storage { message } if message == "rejected 120");

        for index in [11, 13, 14] {
            assert!(h.store.inner.exists(&chunk_key(index)).unwrap());
        }
        settle().await;
        assert!(h.replicator.replicated().is_empty());
    }

    #[tokio::test]
    async fn test_replicates_only_the_target() {
        let h = harness(NetworkView::with_present([13]));
        let key = chunk_key(15);
        h.coordinator.ensure_chunk_and_history(&key, true).await.unwrap();
        settle().await;
        assert_eq!(h.replicator.replicated(), vec![ChunkRecord::from(&key)]);
        assert!(h.store.exists(&chunk_key(14)).unwrap());
    }

    #[tokio::test]
    async fn test_replication_failure_is_not_propagated() {
        let h = harness_with(
            MemoryChunkStore::new(),
            NetworkView::with_present([14]),
            RecordingReplicator::failing(),
        );
        h.coordinator
            .ensure_chunk_and_history(&chunk_key(15), true)
            .await
            .unwrap();
        settle().await;
        assert_eq!(h.replicator.replicated().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let h = harness(NetworkView::default());
        let key = ChunkKey::new(Vec::new(), 0, 9);
        assert_matches!(
            h.coordinator.ensure_chunk_and_history(&key, false).await,
            Err(ShardError::InvalidParam { .. })
        );
        assert_eq!(h.chain.body_fetches(), 0);
    }
}
