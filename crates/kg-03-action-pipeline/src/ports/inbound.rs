//! Inbound port: what transports call.

use crate::domain::{ActionRequest, ApiResponse, RequestContext};
use async_trait::async_trait;
use shared_types::ApiResult;

/// Entry point for every action request.
#[async_trait]
pub trait ActionApi: Send + Sync {
    /// Run one request to completion: one transaction, one response.
    async fn dispatch(&self, ctx: RequestContext, request: ActionRequest) -> ApiResult<ApiResponse>;
}
