//! Outbound ports the pipeline depends on besides storage and notifications.

use async_trait::async_trait;
use kg_01_graph_store::TransactionItems;
use shared_types::{ApiResult, AuthContext, Credentials, OrgId};
use uuid::Uuid;

/// Resolves presented credentials to a caller identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, org_id: &OrgId, credentials: &Credentials) -> ApiResult<AuthContext>;
}

/// Fire-and-forget replication of committed bundles.
#[async_trait]
pub trait ReplicationSink: Send + Sync {
    async fn replicate(
        &self,
        org_id: &OrgId,
        transaction_id: Uuid,
        items: &TransactionItems,
    ) -> anyhow::Result<()>;
}

/// Replication disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReplication;

#[async_trait]
impl ReplicationSink for NoopReplication {
    async fn replicate(
        &self,
        _org_id: &OrgId,
        _transaction_id: Uuid,
        _items: &TransactionItems,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
