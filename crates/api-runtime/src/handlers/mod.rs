//! # Action Handlers
//!
//! Business actions served by this runtime, registered next to the
//! pipeline's built-ins.
//!
//! | Action | Kind | Effect |
//! |--------|------|--------|
//! | `CreateApp` | graph | app plus one environment per default role |
//! | `RevokeAppGrant` | graph | grant, unreadable local keys and their envkeys |
//! | `UpdateTrustedRoot` | non-graph | built into the pipeline |

pub mod create_app;
pub mod revoke_app_grant;

#[cfg(test)]
pub(crate) mod fixtures;

pub use create_app::{CreateApp, CreateAppPayload, CREATE_APP};
pub use revoke_app_grant::{RevokeAppGrant, RevokeAppGrantPayload, REVOKE_APP_GRANT};

use kg_03_action_pipeline::{ActionDescriptor, ActionRegistry, RegistryResult};

/// Built-in actions plus every handler in this module.
pub fn action_registry() -> RegistryResult<ActionRegistry> {
    let mut registry = ActionRegistry::with_builtin()?;
    registry.register(ActionDescriptor::graph(CREATE_APP, CreateApp))?;
    registry.register(ActionDescriptor::graph(REVOKE_APP_GRANT, RevokeAppGrant))?;
    Ok(registry)
}
