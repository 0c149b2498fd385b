//! # Action Registry
//!
//! Explicit table from action type to descriptor, built once at startup and
//! handed to the pipeline. There is no global registration.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ActionRegistry                │
//! │                                              │
//! │  "CreateApp"          → Graph(Arc<dyn ..>)   │
//! │  "RevokeAppAccess"    → Graph(Arc<dyn ..>)   │
//! │  "UpdateTrustedRoot"  → NonGraph(Arc<dyn ..>)│
//! └──────────────────────────────────────────────┘
//! ```

use crate::error::{RegistryError, RegistryResult};
use crate::ports::plugin::{GraphAction, NonGraphAction};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub enum ActionKind {
    Graph(Arc<dyn GraphAction>),
    NonGraph(Arc<dyn NonGraphAction>),
}

#[derive(Clone)]
pub struct ActionDescriptor {
    pub action_type: String,
    pub authenticated: bool,
    pub kind: ActionKind,
}

impl ActionDescriptor {
    /// Graph actions always require authentication.
    pub fn graph(action_type: impl Into<String>, action: impl GraphAction + 'static) -> Self {
        Self {
            action_type: action_type.into(),
            authenticated: true,
            kind: ActionKind::Graph(Arc::new(action)),
        }
    }

    pub fn non_graph(
        action_type: impl Into<String>,
        authenticated: bool,
        action: impl NonGraphAction + 'static,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            authenticated,
            kind: ActionKind::NonGraph(Arc::new(action)),
        }
    }

    pub fn is_graph_action(&self) -> bool {
        matches!(self.kind, ActionKind::Graph(_))
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("action_type", &self.action_type)
            .field("authenticated", &self.authenticated)
            .field("graph_action", &self.is_graph_action())
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct ActionRegistry {
    descriptors: HashMap<String, ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in actions.
    pub fn with_builtin() -> RegistryResult<Self> {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "trusted-root")]
        registry.register(ActionDescriptor::non_graph(
            crate::adapters::UPDATE_TRUSTED_ROOT,
            true,
            crate::adapters::UpdateTrustedRoot,
        ))?;
        Ok(registry)
    }

    /// Add a descriptor. Duplicate action types are rejected.
    pub fn register(&mut self, descriptor: ActionDescriptor) -> RegistryResult<()> {
        if self.descriptors.contains_key(&descriptor.action_type) {
            return Err(RegistryError::DuplicateActionType(descriptor.action_type));
        }
        if descriptor.is_graph_action() && !descriptor.authenticated {
            return Err(RegistryError::UnauthenticatedGraphAction(descriptor.action_type));
        }
        info!(
            action_type = %descriptor.action_type,
            graph_action = descriptor.is_graph_action(),
            "[Registry] Registered action"
        );
        self.descriptors
            .insert(descriptor.action_type.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, action_type: &str) -> Option<&ActionDescriptor> {
        self.descriptors.get(action_type)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether any registered action needs an authenticator.
    pub fn requires_authentication(&self) -> bool {
        self.descriptors.values().any(|d| d.authenticated)
    }

    /// Registered action types, sorted.
    pub fn action_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}
