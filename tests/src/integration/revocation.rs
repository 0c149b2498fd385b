//! # Access Revocation Flow
//!
//! Revoking the member's app grant cascades in one transaction:
//!
//! ```text
//! RevokeAppGrant(grant)
//!   ├── soft delete: grant, member local key, its envkey
//!   ├── GC: member locals on the app are orphaned → blob deletes
//!   ├── reconcile(app + block): member device keys, envkey keys → hard deletes
//!   │       └── development still live → re-encryption required
//!   └── post-commit: OrgUpdate, ClearEnvkeySocket(local envkey)
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use api_runtime::handlers::REVOKE_APP_GRANT;
    use kg_01_graph_store::{diff, EncryptedKeyPath, StoredRecord};
    use kg_02_access_control::{KeySet, OrgAccessScope};
    use kg_03_action_pipeline::{Action, ActionApi};
    use shared_bus::SocketEvent;
    use shared_types::{ApiError, Clock, ObjectId};
    use serde_json::json;

    fn revoke() -> Action {
        Action::new(REVOKE_APP_GRANT, json!({ "id": GRANT })).with_graph_updated_at(SEEDED_AT)
    }

    fn stored_key_paths(h: &Harness) -> Vec<EncryptedKeyPath> {
        h.storage
            .snapshot("encryptedKeys|")
            .into_iter()
            .filter_map(|(_, record)| match record {
                StoredRecord::EncryptedKey(key) => Some(key.path),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_revoke_removes_grant_local_key_and_envkey_in_one_commit() {
        let h = Harness::new();
        let now = h.clock.now();

        h.pipeline.dispatch(h.owner(), revoke().into()).await.unwrap();

        assert_eq!(h.storage.commit_count(), 1);
        for id in [GRANT, LOCAL_KEY, LOCAL_ENVKEY] {
            assert_eq!(h.object(id).unwrap().deleted_at, Some(now), "{id}");
        }
        assert!(h.object(SERVER_ENVKEY).unwrap().deleted_at.is_none());
        assert_eq!(h.stamp(), now);
    }

    #[tokio::test]
    async fn test_revoke_emits_single_envkey_invalidation() {
        let h = Harness::new();
        let mut subscription = h.subscribe();

        h.pipeline.dispatch(h.owner(), revoke().into()).await.unwrap();
        h.pipeline.stats().wait_for(1).await;

        let events = subscription.drain();
        let envkey_events: Vec<&SocketEvent> = events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    SocketEvent::EnvkeyUpdate { .. } | SocketEvent::ClearEnvkeySocket { .. }
                )
            })
            .collect();
        assert_eq!(envkey_events.len(), 1);
        assert!(matches!(
            envkey_events[0],
            SocketEvent::ClearEnvkeySocket { generated_envkey_id, .. }
                if generated_envkey_id == &ObjectId::from(LOCAL_ENVKEY)
        ));
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, SocketEvent::OrgUpdate { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_revoke_reconciles_encrypted_keys() {
        let h = Harness::new();
        let before = org_graph();
        let scope = OrgAccessScope::for_env_parents([APP.into(), BLOCK.into()]);
        let before_keys = KeySet::compute(&before, &scope);

        h.pipeline.dispatch(h.owner(), revoke().into()).await.unwrap();

        let after = h.live_graph();
        let after_keys = KeySet::compute(&after, &scope);
        let delete_set = before_keys.difference(&after_keys);
        assert!(!delete_set.is_empty());

        // Every key in the delete-set is gone from storage, nothing else in scope is.
        let stored = stored_key_paths(&h);
        for path in delete_set.iter() {
            assert!(!stored.contains(path), "{path:?} still stored");
        }
        for path in after_keys.iter() {
            assert!(stored.contains(path), "{path:?} was removed");
        }

        // Nothing the member's device held on the app survives.
        assert!(!stored.iter().any(|path| matches!(
            path,
            EncryptedKeyPath::User { user_id, env_parent_id, .. }
                if user_id.as_str() == MEMBER && env_parent_id.as_str() == APP
        )));
        assert!(!stored
            .iter()
            .any(|path| path.generated_envkey_id() == Some(&ObjectId::from(LOCAL_ENVKEY))));
    }

    #[tokio::test]
    async fn test_revoke_queues_reencryption_for_surviving_secrets() {
        let h = Harness::new();
        let now = h.clock.now();

        h.pipeline.dispatch(h.owner(), revoke().into()).await.unwrap();

        // The member could read development; the owner still can.
        let dev = h.object(DEV_ENV).unwrap();
        assert_eq!(dev.as_environment().unwrap().reencryption_required_at, Some(now));
        let prod = h.object(PROD_ENV).unwrap();
        assert_eq!(prod.as_environment().unwrap().reencryption_required_at, None);

        // Orphaned locals were cleared from the app.
        let app = h.object(APP).unwrap();
        let parent = app.as_env_parent().unwrap();
        assert!(!parent.locals_updated_at_by_user_id.contains_key(&ObjectId::from(MEMBER)));
    }

    #[tokio::test]
    async fn test_member_cannot_revoke_own_grant() {
        let h = Harness::new();

        let err = h
            .pipeline
            .dispatch(h.member(), revoke().into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert!(h.object(GRANT).unwrap().deleted_at.is_none());
    }

    #[test]
    fn test_diff_of_identical_graphs_is_empty() {
        let graph = org_graph();
        assert!(diff(&graph, &graph, &ORG.into()).is_empty());
    }
}
