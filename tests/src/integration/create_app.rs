//! # CreateApp Flow
//!
//! One graph action creating several objects:
//!
//! ```text
//! owner ──CreateApp──→ pipeline ──→ 1 commit: app + 2 environments + org stamp
//!                          │
//!                          └──→ post-commit: OrgUpdate (actor excluded)
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use api_runtime::handlers::CREATE_APP;
    use kg_03_action_pipeline::{Action, ActionApi, PatchOp};
    use serde_json::json;
    use shared_bus::SocketEvent;
    use shared_types::{ApiError, Clock, GraphObject, ObjectType};

    fn create(name: &str) -> Action {
        Action::new(CREATE_APP, json!({ "name": name })).with_graph_updated_at(SEEDED_AT)
    }

    #[tokio::test]
    async fn test_create_app_commits_app_and_default_environments() {
        let h = Harness::new();
        let now = h.clock.now();

        let response = h.pipeline.dispatch(h.owner(), create("web").into()).await.unwrap();

        // One commit, one stamp tick.
        assert_eq!(h.storage.commit_count(), 1);
        assert_eq!(response.graph_updated_at, now);
        assert_eq!(h.stamp(), now);

        let graph = h.live_graph();
        let app = graph
            .by_type(ObjectType::App)
            .find(|object| object.as_env_parent().map(|p| p.name.as_str()) == Some("web"))
            .unwrap();
        let environments = graph
            .by_type(ObjectType::Environment)
            .filter_map(GraphObject::as_environment)
            .filter(|environment| environment.env_parent_id == app.id)
            .count();
        assert_eq!(environments, 2);
        assert_eq!(h.storage.open_transaction_count(), 0);

        // The owner reads all apps, so the new objects come back as additions.
        let diffs = response.diffs().unwrap();
        let added = diffs
            .iter()
            .filter(|op| matches!(op, PatchOp::Add { .. }))
            .count();
        assert_eq!(added, 3);
        assert!(diffs.iter().any(|op| op.path() == format!("/{}", app.id)));
    }

    #[tokio::test]
    async fn test_create_app_notifies_tenant_once() {
        let h = Harness::new();
        let mut subscription = h.subscribe();

        h.pipeline.dispatch(h.owner(), create("web").into()).await.unwrap();
        h.pipeline.stats().wait_for(1).await;

        let events = subscription.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            SocketEvent::OrgUpdate {
                update,
                exclude_device_id,
                ..
            } => {
                assert_eq!(update.action_types, vec![CREATE_APP.to_string()]);
                assert_eq!(update.actor_id, Some(OWNER.into()));
                assert_eq!(exclude_device_id.as_ref(), Some(&OWNER_DEVICE.into()));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let stat = h.pipeline.stats().get(&ORG.into()).unwrap();
        assert_eq!(stat.transactions, 1);
    }

    #[tokio::test]
    async fn test_member_without_permission_is_forbidden() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(h.member(), create("web").into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.stamp(), SEEDED_AT);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_rolls_back() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(h.owner(), create(" ").into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }
}
