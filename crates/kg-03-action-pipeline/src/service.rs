//! # Action Pipeline Service
//!
//! Runs one request to completion inside one storage transaction.
//!
//! ```text
//! dispatch(ctx, request)
//!   │
//!   ├── resolve descriptors (registry)        unknown type → NotFound
//!   ├── authenticate (if any descriptor needs it)
//!   │
//!   ├── graph actions ─────────────────────────────────────────────────────
//!   │     open txn
//!   │     resolve scopes (every sub-action's predicates, one snapshot)
//!   │     stamp check #1 (every sub-action)
//!   │     per sub-action, on the accumulated graph:
//!   │         user graph → pending trust check → authorize → apply
//!   │         GC (full load only) → reconcile (declared scope, graph changed)
//!   │         envkey blobs_updated_at bump → response diff
//!   │     build bundle ── empty? → release, previous stamp
//!   │     locking read + stamp check #2 → execute → commit → release
//!   │     enqueue post-commit task
//!   │
//!   └── non-graph action ──────────────────────────────────────────────────
//!         authorize → open txn → handle → (items? lock, execute, commit)
//! ```
//!
//! Any failure after the transaction is opened rolls it back before the
//! error is returned. Rollback failures are logged and never replace the
//! original error.

use crate::config::PipelineConfig;
use crate::domain::{
    build_bundle, check_stamp, collect_garbage, ensure_no_pending_replacement, graph_patch,
    reconcile, verify_locked_stamp, Action, ActionRequest, ApiResponse, BundleInput, EnvParams,
    GraphActionSettings, GraphTransition, PostUpdateHook, RequestContext, ResponseBody,
    ResponseKind, TransitionOutcome, UserGraphSnapshot,
};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::ports::inbound::ActionApi;
use crate::ports::outbound::{Authenticator, ReplicationSink};
use crate::ports::plugin::{GraphAction, NonGraphAction, NonGraphContext};
use crate::post_commit::{post_commit_channel, PostCommitQueue, PostCommitTask, PostCommitWorker, TenantStats};
use crate::registry::{ActionKind, ActionRegistry};
use async_trait::async_trait;
use kg_01_graph_store::{org_key, Graph, GraphStorage, StorageQuery, TransactionHandle, TransactionItems};
use kg_02_access_control::{resolve_scopes, RbacUserGraphEvaluator, UserGraphEvaluator};
use prometheus::Registry;
use shared_bus::NotificationChannel;
use shared_types::{ApiError, ApiResult, AuthContext, Clock, ObjectId, SystemClock, Timestamp};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Assembles an [`ActionPipeline`] and its post-commit worker.
pub struct PipelineBuilder {
    storage: Option<Arc<dyn GraphStorage>>,
    notifications: Option<Arc<dyn NotificationChannel>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    user_graphs: Arc<dyn UserGraphEvaluator>,
    clock: Arc<dyn Clock>,
    replication: Option<Arc<dyn ReplicationSink>>,
    registry: ActionRegistry,
    config: PipelineConfig,
    metrics_registry: Option<Registry>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            notifications: None,
            authenticator: None,
            user_graphs: Arc::new(RbacUserGraphEvaluator::new()),
            clock: Arc::new(SystemClock),
            replication: None,
            registry: ActionRegistry::new(),
            config: PipelineConfig::default(),
            metrics_registry: None,
        }
    }

    pub fn storage(mut self, storage: Arc<dyn GraphStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationChannel>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn user_graphs(mut self, evaluator: Arc<dyn UserGraphEvaluator>) -> Self {
        self.user_graphs = evaluator;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn replication(mut self, sink: Arc<dyn ReplicationSink>) -> Self {
        self.replication = Some(sink);
        self
    }

    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Export pipeline metrics on `registry`.
    pub fn metrics_registry(mut self, registry: Registry) -> Self {
        self.metrics_registry = Some(registry);
        self
    }

    /// Validate the wiring. A missing notification channel is fatal here,
    /// never a per-request failure.
    pub fn build(self) -> PipelineResult<(ActionPipeline, PostCommitWorker)> {
        let storage = self.storage.ok_or(PipelineError::MissingStorage)?;
        let notifications = self
            .notifications
            .ok_or(PipelineError::MissingNotificationChannel)?;
        if self.authenticator.is_none() && self.registry.requires_authentication() {
            return Err(PipelineError::MissingAuthenticator);
        }

        let metrics = match &self.metrics_registry {
            Some(registry) => PipelineMetrics::register(registry)?,
            None => PipelineMetrics::unregistered()?,
        };

        let (queue, receiver) = post_commit_channel(self.config.post_commit_queue_capacity);
        let stats = Arc::new(TenantStats::new());
        let worker = PostCommitWorker::new(
            receiver,
            notifications,
            Arc::clone(&storage),
            self.replication,
            Arc::clone(&stats),
            metrics.clone(),
        );

        info!(
            actions = self.registry.len(),
            verify_graph_timestamps = self.config.verify_graph_timestamps,
            "[kg-03] Action pipeline assembled"
        );

        let pipeline = ActionPipeline {
            storage,
            authenticator: self.authenticator,
            user_graphs: self.user_graphs,
            clock: self.clock,
            registry: Arc::new(self.registry),
            config: self.config,
            metrics,
            queue,
            stats,
        };
        Ok((pipeline, worker))
    }

    /// Build and spawn the post-commit worker on the current runtime.
    pub fn start(self) -> PipelineResult<(ActionPipeline, JoinHandle<()>)> {
        let (pipeline, worker) = self.build()?;
        let handle = tokio::spawn(worker.run());
        Ok((pipeline, handle))
    }
}

/// The request dispatcher. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct ActionPipeline {
    storage: Arc<dyn GraphStorage>,
    authenticator: Option<Arc<dyn Authenticator>>,
    user_graphs: Arc<dyn UserGraphEvaluator>,
    clock: Arc<dyn Clock>,
    registry: Arc<ActionRegistry>,
    config: PipelineConfig,
    metrics: PipelineMetrics,
    queue: PostCommitQueue,
    stats: Arc<TenantStats>,
}

enum Plan {
    Graph(Vec<Arc<dyn GraphAction>>),
    NonGraph(Arc<dyn NonGraphAction>),
}

/// What a transaction produced: the response plus deferred work, if any.
struct Completed {
    response: ApiResponse,
    task: Option<PostCommitTask>,
}

/// Side effects accumulated across the sub-actions of one request.
#[derive(Default)]
struct Accumulated {
    plugin_items: TransactionItems,
    reconciler_items: TransactionItems,
    env_items: TransactionItems,
    background_items: TransactionItems,
    clear_user_sockets: BTreeSet<ObjectId>,
    clear_envkey_sockets: BTreeSet<ObjectId>,
    updated_envkey_ids: BTreeSet<ObjectId>,
    hooks: Vec<PostUpdateHook>,
    log_target_ids: BTreeSet<ObjectId>,
    rbac_update: bool,
    diffs: Vec<crate::domain::PatchOp>,
}

/// One settled sub-action: its final graph and what it adds to the bundle.
struct Settled {
    graph: Graph,
    plugin_items: TransactionItems,
    reconciler_items: TransactionItems,
    updated_envkey_ids: BTreeSet<ObjectId>,
}

impl ActionPipeline {
    pub fn stats(&self) -> Arc<TenantStats> {
        Arc::clone(&self.stats)
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    fn plan(&self, request: &ActionRequest) -> ApiResult<(Plan, bool)> {
        let lookup = |action: &Action| {
            self.registry
                .get(&action.action_type)
                .ok_or_else(|| ApiError::NotFound(format!("action type {}", action.action_type)))
        };

        match request {
            ActionRequest::Single(action) => {
                let descriptor = lookup(action)?;
                let plan = match &descriptor.kind {
                    ActionKind::Graph(graph_action) => Plan::Graph(vec![Arc::clone(graph_action)]),
                    ActionKind::NonGraph(handler) => Plan::NonGraph(Arc::clone(handler)),
                };
                Ok((plan, descriptor.authenticated))
            }
            ActionRequest::Bulk(actions) => {
                if actions.is_empty() {
                    return Err(ApiError::Validation("bulk request has no actions".into()));
                }
                let mut graph_actions = Vec::with_capacity(actions.len());
                for action in actions {
                    match &lookup(action)?.kind {
                        ActionKind::Graph(graph_action) => graph_actions.push(Arc::clone(graph_action)),
                        ActionKind::NonGraph(_) => {
                            return Err(ApiError::Validation(format!(
                                "{} cannot be part of a bulk request",
                                action.action_type
                            )))
                        }
                    }
                }
                Ok((Plan::Graph(graph_actions), true))
            }
        }
    }

    async fn authenticate(&self, ctx: &RequestContext) -> ApiResult<AuthContext> {
        let credentials = ctx
            .credentials
            .as_ref()
            .ok_or(ApiError::AuthenticationRequired)?;
        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or_else(|| ApiError::Configuration("no authenticator configured".into()))?;

        let auth = authenticator.authenticate(&ctx.org_id, credentials).await?;
        if auth.org_id != ctx.org_id {
            return Err(ApiError::AuthenticationFailed(
                "credentials belong to another org".into(),
            ));
        }
        Ok(auth)
    }

    async fn run(
        &self,
        transaction_id: Uuid,
        ctx: RequestContext,
        request: ActionRequest,
    ) -> ApiResult<ApiResponse> {
        let (plan, authenticated) = self.plan(&request)?;
        let auth = if authenticated {
            Some(self.authenticate(&ctx).await?)
        } else {
            None
        };

        let txn = self.storage.open_transaction(&ctx.org_id).await?;
        let result = match (&plan, &auth) {
            (Plan::Graph(graph_actions), Some(auth)) => {
                self.graph_transaction(transaction_id, &txn, request.actions(), graph_actions, auth, request.is_bulk())
                    .await
            }
            (Plan::Graph(_), None) => Err(ApiError::AuthenticationRequired),
            (Plan::NonGraph(handler), auth) => match request.actions().first() {
                Some(action) => {
                    self.non_graph_transaction(transaction_id, &txn, action, handler.as_ref(), auth.as_ref())
                        .await
                }
                None => Err(ApiError::Validation("request has no action".into())),
            },
        };

        match result {
            Ok(Completed { response, task }) => {
                self.storage.release(&txn).await;
                if let Some(task) = task {
                    self.queue.enqueue(task).await;
                }
                Ok(response)
            }
            Err(err) => {
                self.abort(&txn, &err).await;
                Err(err)
            }
        }
    }

    async fn abort(&self, txn: &TransactionHandle, err: &ApiError) {
        if let Err(rollback_err) = self.storage.rollback(txn).await {
            error!(
                org_id = %txn.org_id,
                error = %rollback_err,
                original = %err,
                "[kg-03] Rollback failed"
            );
        }
        self.storage.release(txn).await;
    }

    async fn graph_transaction(
        &self,
        transaction_id: Uuid,
        txn: &TransactionHandle,
        actions: &[Action],
        graph_actions: &[Arc<dyn GraphAction>],
        auth: &AuthContext,
        is_bulk: bool,
    ) -> ApiResult<Completed> {
        let org_id = &txn.org_id;

        // Stale requests are turned away on a single-row read, before any scoped load.
        if self.config.verify_graph_timestamps {
            let current = self.current_stamp(txn).await?;
            for action in actions {
                if let Err(err) = check_stamp(action, current) {
                    self.metrics.stale_rejections.inc();
                    warn!(
                        org_id = %org_id,
                        action_type = %action.action_type,
                        presented = ?action.graph_updated_at,
                        current,
                        "[kg-03] Stale graph stamp"
                    );
                    return Err(err);
                }
            }
        }

        let predicate_sets: Vec<_> = actions
            .iter()
            .zip(graph_actions)
            .map(|(action, graph_action)| graph_action.scope_predicates(auth, action))
            .collect();
        let resolved = resolve_scopes(self.storage.as_ref(), txn, &predicate_sets).await?;
        let full_graph_loaded = resolved.is_full();
        let initial = resolved.graph;
        let current = initial.org_body()?.graph_updated_at;

        let now = self.clock.now();
        let mut graph = initial.clone();
        let mut acc = Accumulated::default();
        let mut body = None;

        for (action, graph_action) in actions.iter().zip(graph_actions) {
            let settings = graph_action.settings();
            let user_graph = self.user_graphs.user_graph(&graph, auth, now);
            ensure_no_pending_replacement(&user_graph, auth)?;

            if !graph_action.authorize(action, &graph, &user_graph, auth) {
                return Err(ApiError::Unauthorized {
                    action_type: action.action_type.clone(),
                });
            }

            let transition = match graph_action.apply(action, &graph, auth, now)? {
                TransitionOutcome::Graph(transition) => transition,
                TransitionOutcome::Response(response) if !is_bulk => {
                    return Ok(Completed {
                        response: ApiResponse {
                            graph_updated_at: current,
                            transaction_id,
                            body: response,
                        },
                        task: None,
                    });
                }
                TransitionOutcome::Response(_) => {
                    return Err(ApiError::ContractViolation(format!(
                        "{} returned a terminal response inside a bulk request",
                        action.action_type
                    )));
                }
            };

            acc.log_target_ids
                .extend(graph_action.log_target_ids(action, &transition.graph));
            let settled = self.settle(action, &settings, &graph, transition, &mut acc, full_graph_loaded, now).await?;

            let next_user_graph = self.user_graphs.user_graph(&settled.graph, auth, now);
            match settings.response_kind {
                ResponseKind::Diffs => acc.diffs.extend(graph_patch(&user_graph, &next_user_graph)?),
                kind if is_bulk => {
                    return Err(ApiError::ContractViolation(format!(
                        "{} responds with {kind:?} inside a bulk request",
                        action.action_type
                    )));
                }
                ResponseKind::Graph => {
                    body = Some(ResponseBody::Graph(UserGraphSnapshot::from(&next_user_graph)));
                }
                ResponseKind::Ok => body = Some(ResponseBody::Success),
            }

            acc.plugin_items.merge(settled.plugin_items);
            acc.reconciler_items.merge(settled.reconciler_items);
            acc.updated_envkey_ids.extend(settled.updated_envkey_ids);
            acc.rbac_update |= settings.rbac_update;
            if let Some(env_params) = &action.env_params {
                acc.env_items.merge(env_params.to_items());
            }
            graph = settled.graph;
        }

        let Accumulated {
            plugin_items,
            reconciler_items,
            env_items,
            background_items,
            clear_user_sockets,
            clear_envkey_sockets,
            updated_envkey_ids,
            hooks,
            log_target_ids,
            rbac_update,
            diffs,
        } = acc;
        let body = body.unwrap_or(ResponseBody::Diffs(diffs));

        let bundle = build_bundle(BundleInput {
            org_id,
            initial: &initial,
            final_graph: &graph,
            plugin_items,
            reconciler_items,
            env_items,
            rbac_update,
            full_graph_loaded,
            now,
        })?;

        if bundle.is_empty() {
            debug!(org_id = %org_id, "[kg-03] Transition changed nothing, skipping commit");
            return Ok(Completed {
                response: ApiResponse {
                    graph_updated_at: current,
                    transaction_id,
                    body,
                },
                task: None,
            });
        }

        let timer = self.metrics.commit_duration.start_timer();
        self.lock_and_verify(txn, actions).await?;
        self.storage
            .execute_statements(bundle.items.to_statements(org_id), txn)
            .await?;
        self.storage.commit(txn).await?;
        timer.observe_duration();

        let graph_updated_at = bundle.graph_updated_at().unwrap_or(current);
        self.metrics
            .transaction_items_committed
            .inc_by(bundle.items.len() as u64);
        info!(
            org_id = %org_id,
            items = bundle.items.len(),
            graph_updated_at,
            log_targets = ?log_target_ids,
            "[kg-03] Graph transaction committed"
        );

        let mut task = PostCommitTask::new(
            org_id.clone(),
            transaction_id,
            actions.iter().map(|a| a.action_type.clone()).collect(),
        );
        task.actor_id = Some(auth.user_id.clone());
        task.exclude_device_id = auth.device_id.clone();
        task.updated_envkey_ids = updated_envkey_ids;
        task.clear_user_sockets = clear_user_sockets;
        task.clear_envkey_sockets = clear_envkey_sockets;
        task.committed_items = bundle.items;
        task.background_items = background_items;
        task.hooks = hooks;

        Ok(Completed {
            response: ApiResponse {
                graph_updated_at,
                transaction_id,
                body,
            },
            task: Some(task),
        })
    }

    /// GC, reconciliation and envkey refresh for one applied transition.
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        action: &Action,
        settings: &GraphActionSettings,
        before: &Graph,
        transition: GraphTransition,
        acc: &mut Accumulated,
        full_graph_loaded: bool,
        now: Timestamp,
    ) -> ApiResult<Settled> {
        let GraphTransition {
            graph: mut next,
            transaction_items: mut plugin_items,
            background_items,
            encrypted_keys_scope,
            clear_user_sockets,
            clear_envkey_sockets,
            updated_generated_envkey_ids,
            post_update_actions,
            log_target_ids,
        } = transition;

        acc.background_items.merge(background_items);
        acc.clear_user_sockets.extend(clear_user_sockets);
        acc.clear_envkey_sockets.extend(clear_envkey_sockets);
        acc.hooks.extend(post_update_actions);
        acc.log_target_ids.extend(log_target_ids);

        if full_graph_loaded {
            let gc = collect_garbage(
                &next,
                now,
                settings.org_action && settings.should_clear_orphaned_locals,
            )?;
            if !gc.deleted_ids.is_empty() {
                debug!(deleted = gc.deleted_ids.len(), "[kg-03] Garbage collected");
            }
            next = gc.graph;
            plugin_items.merge(gc.transaction_items);
        }

        let mut reconciler_items = TransactionItems::default();
        let mut inferred_envkey_ids = action
            .env_params
            .as_ref()
            .map(EnvParams::generated_envkey_ids)
            .unwrap_or_default();
        let mut queued_envkey_ids = BTreeSet::new();

        if let Some(scope) = &encrypted_keys_scope {
            if !before.same_contents(&next) {
                let reconciliation = reconcile(before, &next, scope, now).await?;
                reconciler_items = reconciliation.transaction_items();
                inferred_envkey_ids.extend(reconciliation.delete_keys.generated_envkey_ids());
                queued_envkey_ids = reconciliation.queued_envkey_ids;
                next = reconciliation.graph;
            }
        }

        let mut envkey_ids = updated_generated_envkey_ids.unwrap_or(inferred_envkey_ids);
        envkey_ids.extend(queued_envkey_ids);
        envkey_ids.retain(|id| {
            next.get_active(id)
                .is_some_and(|object| object.as_generated_envkey().is_some())
        });

        for envkey_id in &envkey_ids {
            next = next.with_updated(envkey_id, |object| {
                object.updated_at = now;
                if let Some(envkey) = object.as_generated_envkey_mut() {
                    envkey.blobs_updated_at = Some(now);
                }
            })?;
        }

        Ok(Settled {
            graph: next,
            plugin_items,
            reconciler_items,
            updated_envkey_ids: envkey_ids,
        })
    }

    /// Second stamp checkpoint: lock the tenant root, then compare.
    async fn lock_and_verify(&self, txn: &TransactionHandle, actions: &[Action]) -> ApiResult<Timestamp> {
        let locked = async {
            if self.config.verify_graph_timestamps {
                verify_locked_stamp(self.storage.as_ref(), txn, actions).await
            } else {
                let root = self.storage.locking_read(txn).await?;
                root.as_org()
                    .map(|org| org.graph_updated_at)
                    .ok_or_else(|| ApiError::Internal(format!("tenant root {} is not an org", root.id)))
            }
        };

        match tokio::time::timeout(self.config.lock_timeout(), locked).await {
            Ok(Err(err @ ApiError::StaleGraph { .. })) => {
                self.metrics.stale_rejections.inc();
                Err(err)
            }
            Ok(result) => result,
            Err(_) => Err(ApiError::Storage(format!(
                "timed out after {}ms waiting for tenant lock",
                self.config.lock_timeout_ms
            ))),
        }
    }

    async fn non_graph_transaction(
        &self,
        transaction_id: Uuid,
        txn: &TransactionHandle,
        action: &Action,
        handler: &dyn NonGraphAction,
        auth: Option<&AuthContext>,
    ) -> ApiResult<Completed> {
        if !handler.authorize(action, auth) {
            return Err(ApiError::Unauthorized {
                action_type: action.action_type.clone(),
            });
        }

        let org_id = &txn.org_id;
        let outcome = handler
            .handle(
                action,
                NonGraphContext {
                    storage: self.storage.as_ref(),
                    txn,
                    auth,
                    now: self.clock.now(),
                },
            )
            .await?;

        if outcome.transaction_items.is_empty() {
            let graph_updated_at = self.current_stamp(txn).await?;
            return Ok(Completed {
                response: ApiResponse {
                    graph_updated_at,
                    transaction_id,
                    body: outcome.body,
                },
                task: None,
            });
        }

        let root = self.storage.locking_read(txn).await?;
        let graph_updated_at = root
            .as_org()
            .map(|org| org.graph_updated_at)
            .ok_or_else(|| ApiError::Internal(format!("tenant root {} is not an org", root.id)))?;
        self.storage
            .execute_statements(outcome.transaction_items.to_statements(org_id), txn)
            .await?;
        self.storage.commit(txn).await?;
        self.metrics
            .transaction_items_committed
            .inc_by(outcome.transaction_items.len() as u64);
        info!(
            org_id = %org_id,
            action_type = %action.action_type,
            items = outcome.transaction_items.len(),
            "[kg-03] Non-graph transaction committed"
        );

        let mut task = PostCommitTask::new(org_id.clone(), transaction_id, vec![action.action_type.clone()]);
        task.actor_id = auth.map(|auth| auth.user_id.clone());
        task.exclude_device_id = auth.and_then(|auth| auth.device_id.clone());
        task.committed_items = outcome.transaction_items;

        Ok(Completed {
            response: ApiResponse {
                graph_updated_at,
                transaction_id,
                body: outcome.body,
            },
            task: Some(task),
        })
    }

    async fn current_stamp(&self, txn: &TransactionHandle) -> ApiResult<Timestamp> {
        let records = self
            .storage
            .query(&StorageQuery::keys(vec![org_key(&txn.org_id)]), txn)
            .await?;
        records
            .iter()
            .find_map(|record| record.as_graph().and_then(|object| object.as_org()))
            .map(|org| org.graph_updated_at)
            .ok_or_else(|| ApiError::NotFound(format!("org {}", txn.org_id)))
    }
}

fn outcome_label(result: &ApiResult<ApiResponse>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ApiError::AuthenticationRequired | ApiError::AuthenticationFailed(_)) => "unauthenticated",
        Err(ApiError::Unauthorized { .. }) => "forbidden",
        Err(ApiError::Validation(_) | ApiError::NotFound(_)) => "invalid",
        Err(ApiError::StaleGraph { .. }) => "stale",
        Err(ApiError::TrustReplacementPending) => "trust_pending",
        Err(ApiError::Storage(_)) => "storage_error",
        Err(_) => "internal_error",
    }
}

#[async_trait]
impl ActionApi for ActionPipeline {
    async fn dispatch(&self, ctx: RequestContext, request: ActionRequest) -> ApiResult<ApiResponse> {
        let transaction_id = Uuid::new_v4();
        let action_types = request.action_types();
        let span = info_span!(
            "action",
            transaction_id = %transaction_id,
            org_id = %ctx.org_id,
            bulk = request.is_bulk(),
        );

        let result = self.run(transaction_id, ctx, request).instrument(span).await;

        let outcome = outcome_label(&result);
        for action_type in &action_types {
            self.metrics.record_outcome(action_type, outcome);
        }
        if let Err(err) = &result {
            debug!(
                transaction_id = %transaction_id,
                error = %err,
                retryable = err.is_retryable(),
                "[kg-03] Request failed"
            );
        }
        result
    }
}
