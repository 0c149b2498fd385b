//! # Bulk Composition
//!
//! Several graph actions folded into one transaction:
//!
//! ```text
//! Bulk[CreateApp(a), CreateApp(b)] ──→ apply a → apply b ──→ 1 commit, 1 stamp tick
//! Bulk[CreateApp, RevokeAppGrant(missing)] ──→ Unauthorized ──→ rollback, nothing written
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use api_runtime::handlers::{CREATE_APP, REVOKE_APP_GRANT};
    use kg_03_action_pipeline::{Action, ActionApi, ActionRequest, PatchOp, UPDATE_TRUSTED_ROOT};
    use serde_json::json;
    use shared_types::{ApiError, Clock, ObjectType};

    fn create(name: &str) -> Action {
        Action::new(CREATE_APP, json!({ "name": name })).with_graph_updated_at(SEEDED_AT)
    }

    fn app_names(h: &Harness) -> Vec<String> {
        h.live_graph()
            .by_type(ObjectType::App)
            .filter_map(|object| object.as_env_parent().map(|parent| parent.name.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_bulk_commits_all_actions_together() {
        let h = Harness::new();
        let now = h.clock.now();

        let response = h
            .pipeline
            .dispatch(h.owner(), ActionRequest::Bulk(vec![create("web"), create("worker")]))
            .await
            .unwrap();

        assert_eq!(h.storage.commit_count(), 1);
        assert_eq!(response.graph_updated_at, now);
        assert_eq!(h.stamp(), now);

        let names = app_names(&h);
        assert!(names.contains(&"web".to_string()));
        assert!(names.contains(&"worker".to_string()));

        // Two apps, two default environments each.
        let added = response
            .diffs()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, PatchOp::Add { .. }))
            .count();
        assert_eq!(added, 6);
    }

    #[tokio::test]
    async fn test_bulk_failure_rolls_back_every_action() {
        let h = Harness::new();
        let revoke_missing =
            Action::new(REVOKE_APP_GRANT, json!({ "id": "missing" })).with_graph_updated_at(SEEDED_AT);

        let err = h
            .pipeline
            .dispatch(h.owner(), ActionRequest::Bulk(vec![create("web"), revoke_missing]))
            .await
            .unwrap_err();

        // The first action already applied in memory; the missing grant fails authorization.
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.storage.open_transaction_count(), 0);
        assert_eq!(h.stamp(), SEEDED_AT);
        assert!(!app_names(&h).contains(&"web".to_string()));
    }

    #[tokio::test]
    async fn test_empty_bulk_rejected() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(h.owner(), ActionRequest::Bulk(Vec::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_with_non_graph_action_rejected() {
        let h = Harness::new();
        let acknowledge = Action::new(
            UPDATE_TRUSTED_ROOT,
            json!({ "replacementIds": [], "signedTrustedRoot": "root" }),
        );

        let err = h
            .pipeline
            .dispatch(h.owner(), ActionRequest::Bulk(vec![create("web"), acknowledge]))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(h.storage.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_stale_sub_action_rejected() {
        let h = Harness::new();
        let stale = Action::new(CREATE_APP, json!({ "name": "late" })).with_graph_updated_at(SEEDED_AT - 1);

        let err = h
            .pipeline
            .dispatch(h.owner(), ActionRequest::Bulk(vec![create("web"), stale]))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::StaleGraph { .. }));
        assert_eq!(h.storage.commit_count(), 0);
    }
}
