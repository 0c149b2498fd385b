//! # Optimistic Concurrency
//!
//! ```text
//! client A ──(stamp 1000)──┐
//!                          ├──→ first to lock commits, stamp → 2000
//! client B ──(stamp 1000)──┘    second re-checks under lock → StaleGraph
//! ```
//!
//! A stale stamp is rejected before any transition runs, and a transition
//! that changes nothing commits nothing.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use api_runtime::handlers::CREATE_APP;
    use kg_01_graph_store::Graph;
    use kg_03_action_pipeline::{
        Action, ActionApi, ActionRequest, GraphAction, GraphTransition, RequestContext, TransitionOutcome,
    };
    use serde_json::json;
    use shared_types::{ApiError, ApiResult, AuthContext, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TOUCH: &str = "Touch";

    /// Leaves the graph unchanged and counts how often it ran.
    #[derive(Default)]
    struct Touch {
        applied: AtomicUsize,
    }

    impl GraphAction for Touch {
        fn authorize(&self, _: &Action, _: &Graph, _: &Graph, _: &AuthContext) -> bool {
            true
        }

        fn apply(
            &self,
            _action: &Action,
            org_graph: &Graph,
            _auth: &AuthContext,
            _now: Timestamp,
        ) -> ApiResult<TransitionOutcome> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(TransitionOutcome::Graph(GraphTransition::new(org_graph.clone())))
        }
    }

    fn harness_with_touch() -> (Harness, Arc<Touch>) {
        let touch = Arc::new(Touch::default());
        let h = Harness::with_actions(vec![(TOUCH, Arc::clone(&touch) as Arc<dyn GraphAction>)]);
        (h, touch)
    }

    #[tokio::test]
    async fn test_stale_stamp_rejected_before_transition() {
        let (h, touch) = harness_with_touch();

        let err = h
            .pipeline
            .dispatch(
                h.owner(),
                Action::new(TOUCH, json!({})).with_graph_updated_at(SEEDED_AT - 1).into(),
            )
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        match err {
            ApiError::StaleGraph { presented, current } => {
                assert_eq!(presented, Some(SEEDED_AT - 1));
                assert_eq!(current, SEEDED_AT);
            }
            other => panic!("expected StaleGraph, got {other:?}"),
        }
        assert_eq!(touch.applied.load(Ordering::SeqCst), 0);
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_stamp_rejected() {
        let (h, touch) = harness_with_touch();

        let err = h
            .pipeline
            .dispatch(h.owner(), Action::new(TOUCH, json!({})).into())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::StaleGraph { presented: None, current: SEEDED_AT }
        ));
        assert_eq!(touch.applied.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unchanged_graph_skips_commit() {
        let (h, touch) = harness_with_touch();

        let response = h
            .pipeline
            .dispatch(
                h.owner(),
                Action::new(TOUCH, json!({})).with_graph_updated_at(SEEDED_AT).into(),
            )
            .await
            .unwrap();

        assert_eq!(touch.applied.load(Ordering::SeqCst), 1);
        assert_eq!(response.graph_updated_at, SEEDED_AT);
        assert!(response.diffs().unwrap().is_empty());
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.stamp(), SEEDED_AT);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_with_same_stamp() {
        let h = Harness::new();
        let create = |name: &str| -> ActionRequest {
            Action::new(CREATE_APP, json!({ "name": name }))
                .with_graph_updated_at(SEEDED_AT)
                .into()
        };

        let (a, b) = tokio::join!(
            h.pipeline.dispatch(h.owner(), create("web")),
            h.pipeline.dispatch(h.owner(), create("worker")),
        );

        let results = [a, b];
        let committed = results.iter().filter(|result| result.is_ok()).count();
        let stale = results
            .iter()
            .filter(|result| matches!(result, Err(ApiError::StaleGraph { .. })))
            .count();
        assert_eq!(committed, 1);
        assert_eq!(stale, 1);
        assert_eq!(h.storage.commit_count(), 1);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_with_fresh_stamp_succeeds() {
        let h = Harness::new();
        let first = Action::new(CREATE_APP, json!({ "name": "web" })).with_graph_updated_at(SEEDED_AT);
        let committed = h.pipeline.dispatch(h.owner(), first.into()).await.unwrap();

        let retry = Action::new(CREATE_APP, json!({ "name": "worker" }))
            .with_graph_updated_at(committed.graph_updated_at);
        let response = h.pipeline.dispatch(h.owner(), retry.into()).await.unwrap();

        // Frozen clock: the stamp still strictly increases.
        assert_eq!(response.graph_updated_at, committed.graph_updated_at + 1);
        assert_eq!(h.storage.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(
                RequestContext::new(ORG.into()),
                Action::new(CREATE_APP, json!({ "name": "web" }))
                    .with_graph_updated_at(SEEDED_AT)
                    .into(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthenticationRequired));
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_action_type_not_found() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(
                h.owner(),
                Action::new("DoesNotExist", json!({})).with_graph_updated_at(SEEDED_AT).into(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
