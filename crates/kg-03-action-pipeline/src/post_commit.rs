//! # Post-Commit Worker
//!
//! Work deferred until after the response is produced. `dispatch` enqueues
//! one task per committed request; a background worker drains the queue.
//!
//! ```text
//! dispatch ──enqueue──→ [ mpsc queue ] ──→ PostCommitWorker::run
//!                                           1. tenant notification
//!                                           2. env_updated per envkey
//!                                           3. clear user / envkey sockets
//!                                           4. replication
//!                                           5. background statements (fresh txn)
//!                                           6. post-update hooks
//!                                           7. tenant stats
//! ```
//!
//! Every step is best-effort. Failures are logged and counted, never
//! surfaced, and never undo the committed transaction.

use crate::domain::PostUpdateHook;
use crate::metrics::PipelineMetrics;
use crate::ports::outbound::ReplicationSink;
use kg_01_graph_store::{GraphStorage, StorageResult, TransactionItems};
use parking_lot::Mutex;
use shared_bus::{EnvkeySocketEvent, NotificationChannel, OrgSocketUpdate};
use shared_types::{ObjectId, OrgId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Deferred effects of one committed request.
pub struct PostCommitTask {
    pub org_id: OrgId,
    pub transaction_id: Uuid,
    pub action_types: Vec<String>,
    pub actor_id: Option<ObjectId>,
    /// The caller's own session already has the response.
    pub exclude_device_id: Option<ObjectId>,
    pub updated_envkey_ids: BTreeSet<ObjectId>,
    pub clear_user_sockets: BTreeSet<ObjectId>,
    pub clear_envkey_sockets: BTreeSet<ObjectId>,
    pub committed_items: TransactionItems,
    pub background_items: TransactionItems,
    pub hooks: Vec<PostUpdateHook>,
}

impl PostCommitTask {
    pub fn new(org_id: OrgId, transaction_id: Uuid, action_types: Vec<String>) -> Self {
        Self {
            org_id,
            transaction_id,
            action_types,
            actor_id: None,
            exclude_device_id: None,
            updated_envkey_ids: BTreeSet::new(),
            clear_user_sockets: BTreeSet::new(),
            clear_envkey_sockets: BTreeSet::new(),
            committed_items: TransactionItems::default(),
            background_items: TransactionItems::default(),
            hooks: Vec::new(),
        }
    }
}

impl fmt::Debug for PostCommitTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostCommitTask")
            .field("org_id", &self.org_id)
            .field("transaction_id", &self.transaction_id)
            .field("action_types", &self.action_types)
            .field("updated_envkey_ids", &self.updated_envkey_ids)
            .field("committed_items", &self.committed_items.len())
            .field("background_items", &self.background_items.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Per-tenant counters kept by the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantStat {
    pub transactions: u64,
    pub items_committed: u64,
    pub last_transaction_id: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct TenantStats {
    tenants: Mutex<HashMap<OrgId, TenantStat>>,
    processed: AtomicU64,
    progress: Notify,
}

impl TenantStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, org_id: &OrgId, transaction_id: Uuid, items: usize) {
        {
            let mut tenants = self.tenants.lock();
            let stat = tenants.entry(org_id.clone()).or_default();
            stat.transactions += 1;
            stat.items_committed += items as u64;
            stat.last_transaction_id = Some(transaction_id);
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.progress.notify_waiters();
    }

    pub fn get(&self, org_id: &OrgId) -> Option<TenantStat> {
        self.tenants.lock().get(org_id).cloned()
    }

    /// Tasks fully processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` tasks have been processed.
    pub async fn wait_for(&self, count: u64) {
        loop {
            let notified = self.progress.notified();
            if self.processed() >= count {
                return;
            }
            notified.await;
        }
    }
}

/// Producer half held by the pipeline.
#[derive(Debug, Clone)]
pub struct PostCommitQueue {
    sender: mpsc::Sender<PostCommitTask>,
}

impl PostCommitQueue {
    pub async fn enqueue(&self, task: PostCommitTask) {
        let transaction_id = task.transaction_id;
        if self.sender.send(task).await.is_err() {
            warn!(
                transaction_id = %transaction_id,
                "[kg-03] Post-commit worker stopped, dropping task"
            );
        }
    }
}

/// Create a bounded queue and its receiving half.
pub fn post_commit_channel(capacity: usize) -> (PostCommitQueue, mpsc::Receiver<PostCommitTask>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (PostCommitQueue { sender }, receiver)
}

pub struct PostCommitWorker {
    receiver: mpsc::Receiver<PostCommitTask>,
    notifications: Arc<dyn NotificationChannel>,
    storage: Arc<dyn GraphStorage>,
    replication: Option<Arc<dyn ReplicationSink>>,
    stats: Arc<TenantStats>,
    metrics: PipelineMetrics,
}

impl PostCommitWorker {
    pub fn new(
        receiver: mpsc::Receiver<PostCommitTask>,
        notifications: Arc<dyn NotificationChannel>,
        storage: Arc<dyn GraphStorage>,
        replication: Option<Arc<dyn ReplicationSink>>,
        stats: Arc<TenantStats>,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            receiver,
            notifications,
            storage,
            replication,
            stats,
            metrics,
        }
    }

    pub fn stats(&self) -> Arc<TenantStats> {
        Arc::clone(&self.stats)
    }

    /// Drain the queue until every producer is dropped.
    pub async fn run(mut self) {
        info!("[kg-03] Post-commit worker started");
        while let Some(task) = self.receiver.recv().await {
            self.process(task).await;
        }
        info!("[kg-03] Post-commit queue closed, worker stopping");
    }

    pub async fn process(&self, task: PostCommitTask) {
        let PostCommitTask {
            org_id,
            transaction_id,
            action_types,
            actor_id,
            exclude_device_id,
            updated_envkey_ids,
            clear_user_sockets,
            clear_envkey_sockets,
            committed_items,
            background_items,
            hooks,
        } = task;

        let delivered = self
            .notifications
            .notify_org(
                &org_id,
                OrgSocketUpdate {
                    action_types,
                    actor_id,
                },
                exclude_device_id,
                None,
            )
            .await;
        debug!(org_id = %org_id, delivered, "[kg-03] Tenant notified");

        for envkey_id in &updated_envkey_ids {
            self.notifications
                .notify_envkey(&org_id, envkey_id, EnvkeySocketEvent::EnvUpdated)
                .await;
        }
        for user_id in &clear_user_sockets {
            self.notifications.clear_user_sockets(&org_id, user_id).await;
        }
        for envkey_id in &clear_envkey_sockets {
            self.notifications.clear_envkey_socket(&org_id, envkey_id).await;
        }

        if let Some(replication) = &self.replication {
            if let Err(e) = replication
                .replicate(&org_id, transaction_id, &committed_items)
                .await
            {
                self.metrics.record_post_commit_failure("replication");
                warn!(
                    org_id = %org_id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "[kg-03] Replication failed"
                );
            }
        }

        if !background_items.is_empty() {
            if let Err(e) = self.run_background(&org_id, &background_items).await {
                self.metrics.record_post_commit_failure("background");
                error!(
                    org_id = %org_id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "[kg-03] Background statements failed"
                );
            }
        }

        for hook in hooks {
            if let Err(e) = hook.await {
                self.metrics.record_post_commit_failure("hook");
                warn!(
                    org_id = %org_id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "[kg-03] Post-update hook failed"
                );
            }
        }

        self.stats
            .record(&org_id, transaction_id, committed_items.len());
    }

    async fn run_background(&self, org_id: &OrgId, items: &TransactionItems) -> StorageResult<()> {
        let txn = self.storage.open_transaction(org_id).await?;
        let result = async {
            self.storage
                .execute_statements(items.to_statements(org_id), &txn)
                .await?;
            self.storage.commit(&txn).await
        }
        .await;
        if result.is_err() {
            if let Err(e) = self.storage.rollback(&txn).await {
                warn!(org_id = %org_id, error = %e, "[kg-03] Background rollback failed");
            }
        }
        self.storage.release(&txn).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kg_01_graph_store::{DbKey, InMemoryGraphStorage, StoredRecord};
    use shared_bus::{InMemoryNotificationBus, SocketEvent, SocketEventFilter};
    use shared_types::{GraphObject, ObjectBody, Org};

    struct FailingReplication;

    #[async_trait]
    impl ReplicationSink for FailingReplication {
        async fn replicate(&self, _: &OrgId, _: Uuid, _: &TransactionItems) -> anyhow::Result<()> {
            anyhow::bail!("region unavailable")
        }
    }

    fn storage() -> Arc<InMemoryGraphStorage> {
        let storage = InMemoryGraphStorage::new();
        let org_id: OrgId = "org".into();
        storage.seed(
            &org_id,
            [StoredRecord::Graph(GraphObject::new(
                org_id.clone(),
                ObjectBody::Org(Org {
                    name: "acme".into(),
                    graph_updated_at: 1,
                    rbac_updated_at: None,
                    device_like_count: 0,
                }),
                1,
            ))],
        );
        Arc::new(storage)
    }

    fn worker(
        bus: Arc<InMemoryNotificationBus>,
        storage: Arc<InMemoryGraphStorage>,
        replication: Option<Arc<dyn ReplicationSink>>,
    ) -> (PostCommitQueue, PostCommitWorker) {
        let (queue, receiver) = post_commit_channel(8);
        let worker = PostCommitWorker::new(
            receiver,
            bus,
            storage,
            replication,
            Arc::new(TenantStats::new()),
            PipelineMetrics::unregistered().unwrap(),
        );
        (queue, worker)
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let bus = Arc::new(InMemoryNotificationBus::new());
        let mut subscription = bus.subscribe(SocketEventFilter::all());
        let (_queue, worker) = worker(Arc::clone(&bus), storage(), None);

        let mut task = PostCommitTask::new("org".into(), Uuid::new_v4(), vec!["RevokeAppAccess".into()]);
        task.updated_envkey_ids.insert("gk".into());
        task.clear_user_sockets.insert("u1".into());
        worker.process(task).await;

        let events = subscription.drain();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SocketEvent::OrgUpdate { .. }));
        assert!(matches!(events[1], SocketEvent::EnvkeyUpdate { .. }));
        assert!(matches!(events[2], SocketEvent::ClearUserSockets { .. }));
        assert_eq!(worker.stats().processed(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let bus = Arc::new(InMemoryNotificationBus::new());
        let storage = storage();
        let (_queue, worker) = worker(bus, Arc::clone(&storage), Some(Arc::new(FailingReplication)));

        let mut task = PostCommitTask::new("org".into(), Uuid::new_v4(), vec!["A".into()]);
        task.hooks
            .push(Box::pin(async { Err::<(), _>(anyhow::anyhow!("hook failed")) }));
        task.background_items = TransactionItems {
            // Updating a missing row fails the background transaction.
            updates: vec![(
                DbKey::new("org", "g|app|missing"),
                StoredRecord::Graph(GraphObject::new(
                    "missing".into(),
                    ObjectBody::App(Default::default()),
                    1,
                )),
            )],
            ..TransactionItems::default()
        };
        worker.process(task).await;

        assert_eq!(worker.stats().processed(), 1);
        assert_eq!(storage.open_transaction_count(), 0);
        assert_eq!(
            worker
                .metrics
                .post_commit_failures
                .with_label_values(&["hook"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let bus = Arc::new(InMemoryNotificationBus::new());
        let (queue, worker) = worker(bus, storage(), None);
        let stats = worker.stats();
        let handle = tokio::spawn(worker.run());

        for _ in 0..3 {
            queue
                .enqueue(PostCommitTask::new("org".into(), Uuid::new_v4(), vec!["A".into()]))
                .await;
        }
        stats.wait_for(3).await;
        assert_eq!(stats.get(&"org".into()).unwrap().transactions, 3);

        drop(queue);
        handle.await.unwrap();
    }
}
