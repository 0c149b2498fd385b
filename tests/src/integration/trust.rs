//! # Trust-Anchor Replacement Flow
//!
//! ```text
//! replacement pending for {owner device, member device}
//!   ├── owner graph action           → TrustReplacementPending
//!   ├── owner UpdateTrustedRoot      → entry acknowledged, record kept
//!   ├── owner graph action           → allowed again
//!   └── member UpdateTrustedRoot     → last entry, record soft deleted
//! ```
//!
//! Graph actions that load the whole tenant also prune entries whose
//! principal is gone, deleting the record once nothing is left pending.
//!
//! Acknowledgements are non-graph actions: they commit without a stamp
//! check and leave the version stamp alone.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use api_runtime::handlers::CREATE_APP;
    use kg_01_graph_store::StoredRecord;
    use kg_03_action_pipeline::{Action, ActionApi, RequestContext, UPDATE_TRUSTED_ROOT};
    use serde_json::json;
    use shared_types::{
        ApiError, Clock, GraphObject, ObjectBody, ObjectId, Pubkey, RootPubkeyReplacement,
        SignedData, Timestamp,
    };
    use std::collections::BTreeMap;

    const REPLACEMENT: &str = "replacement";

    fn harness_with_replacement(expires_at: Option<Timestamp>) -> Harness {
        harness_with_entries(&[(OWNER_DEVICE, None), (MEMBER_DEVICE, None)], expires_at)
    }

    fn harness_with_entries(
        entries: &[(&str, Option<Timestamp>)],
        expires_at: Option<Timestamp>,
    ) -> Harness {
        let h = Harness::new();
        let replacement = GraphObject::new(
            REPLACEMENT.into(),
            ObjectBody::RootPubkeyReplacement(RootPubkeyReplacement {
                requesting_device_id: OWNER_DEVICE.into(),
                replacing_pubkey_id: "retired-root".into(),
                replacing_pubkey: Pubkey("next-root-pk".into()),
                signed_replacing_trusted_pubkeys: SignedData("signed-pubkeys".into()),
                processed_at_by_id: entries
                    .iter()
                    .map(|(id, at)| (ObjectId::from(*id), *at))
                    .collect::<BTreeMap<_, _>>(),
                expires_at,
            }),
            SEEDED_AT,
        );
        h.storage.seed(&ORG.into(), [StoredRecord::Graph(replacement)]);
        h
    }

    fn create_app(stamp: Timestamp) -> Action {
        Action::new(CREATE_APP, json!({ "name": "web" })).with_graph_updated_at(stamp)
    }

    fn acknowledge() -> Action {
        Action::new(
            UPDATE_TRUSTED_ROOT,
            json!({ "replacementIds": [REPLACEMENT], "signedTrustedRoot": "re-signed-root" }),
        )
    }

    fn pending_for(h: &Harness, device_id: &str) -> bool {
        h.object(REPLACEMENT)
            .and_then(|object| object.as_root_pubkey_replacement().cloned())
            .map_or(false, |replacement| {
                replacement.is_pending_for(&ObjectId::from(device_id))
            })
    }

    #[tokio::test]
    async fn test_pending_replacement_blocks_graph_actions() {
        let h = harness_with_replacement(None);

        let err = h
            .pipeline
            .dispatch(h.owner(), create_app(SEEDED_AT).into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::TrustReplacementPending));
        assert_eq!(h.storage.commit_count(), 0);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_acknowledgement_keeps_record_until_last_principal() {
        let h = harness_with_replacement(None);
        let now = h.clock.now();

        h.pipeline.dispatch(h.owner(), acknowledge().into()).await.unwrap();

        // Owner done, member still pending.
        let record = h.object(REPLACEMENT).unwrap();
        assert!(record.deleted_at.is_none());
        assert!(!pending_for(&h, OWNER_DEVICE));
        assert!(pending_for(&h, MEMBER_DEVICE));

        let device = h.object(OWNER_DEVICE).unwrap();
        let device = device.as_device().unwrap();
        assert_eq!(
            device.signed_trusted_root,
            Some(SignedData("re-signed-root".into()))
        );
        assert_eq!(device.trusted_root_updated_at, Some(now));

        // Acknowledging does not move the version stamp.
        assert_eq!(h.stamp(), SEEDED_AT);
        assert_eq!(h.storage.commit_count(), 1);

        // The owner may mutate the graph again.
        h.pipeline
            .dispatch(h.owner(), create_app(SEEDED_AT).into())
            .await
            .unwrap();
        assert_eq!(h.stamp(), now);
    }

    #[tokio::test]
    async fn test_last_acknowledgement_deletes_record() {
        let h = harness_with_replacement(None);
        let now = h.clock.now();

        h.pipeline.dispatch(h.owner(), acknowledge().into()).await.unwrap();
        h.pipeline.dispatch(h.member(), acknowledge().into()).await.unwrap();

        let record = h.object(REPLACEMENT).unwrap();
        assert_eq!(record.deleted_at, Some(now));
        assert!(record
            .as_root_pubkey_replacement()
            .unwrap()
            .is_fully_processed());
    }

    #[tokio::test]
    async fn test_second_acknowledgement_rejected() {
        let h = harness_with_replacement(None);

        h.pipeline.dispatch(h.owner(), acknowledge().into()).await.unwrap();
        let err = h
            .pipeline
            .dispatch(h.owner(), acknowledge().into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(h.storage.commit_count(), 1);
        assert_eq!(h.storage.open_transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_acknowledgement_after_deletion_rejected() {
        let h = harness_with_replacement(None);
        let now = h.clock.now();

        h.pipeline.dispatch(h.owner(), acknowledge().into()).await.unwrap();
        h.pipeline.dispatch(h.member(), acknowledge().into()).await.unwrap();
        let err = h
            .pipeline
            .dispatch(h.member(), acknowledge().into())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(h.storage.commit_count(), 2);
        assert_eq!(h.storage.open_transaction_count(), 0);

        let record = h.object(REPLACEMENT).unwrap();
        assert_eq!(record.deleted_at, Some(now));
        let body = record.as_root_pubkey_replacement().unwrap();
        assert_eq!(body.processed_at_by_id.len(), 2);
        assert!(body.is_fully_processed());
    }

    #[tokio::test]
    async fn test_graph_action_prunes_vanished_principals() {
        let h = harness_with_entries(
            &[(OWNER_DEVICE, Some(SEEDED_AT)), ("removed-device", None)],
            None,
        );
        let now = h.clock.now();

        h.pipeline
            .dispatch(h.owner(), create_app(SEEDED_AT).into())
            .await
            .unwrap();

        // The only pending entry named a vanished device, so the record is done.
        let record = h.object(REPLACEMENT).unwrap();
        assert_eq!(record.deleted_at, Some(now));
        assert_eq!(record.updated_at, now);
        let body = record.as_root_pubkey_replacement().unwrap();
        assert_eq!(
            body.processed_at_by_id.keys().collect::<Vec<_>>(),
            vec![&ObjectId::from(OWNER_DEVICE)]
        );
        assert!(body.is_fully_processed());
    }

    #[tokio::test]
    async fn test_expired_replacement_does_not_block() {
        let h = harness_with_replacement(Some(SEEDED_AT + 1));

        h.pipeline
            .dispatch(h.owner(), create_app(SEEDED_AT).into())
            .await
            .unwrap();

        assert_eq!(h.storage.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_acknowledgement_requires_credentials() {
        let h = harness_with_replacement(None);

        let err = h
            .pipeline
            .dispatch(
                RequestContext::new(ORG.into()),
                acknowledge().into(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthenticationRequired));
        assert!(pending_for(&h, OWNER_DEVICE));
    }
}
