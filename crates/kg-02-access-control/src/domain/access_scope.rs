//! Restriction applied to the encrypted key set projection.

use serde::{Deserialize, Serialize};
use shared_types::ObjectId;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "ids")]
pub enum ScopeFilter {
    #[default]
    All,
    Only(BTreeSet<ObjectId>),
}

impl ScopeFilter {
    pub fn only(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        ScopeFilter::Only(ids.into_iter().collect())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::Only(ids) => ids.contains(id),
        }
    }

    #[must_use]
    pub fn union(&self, other: &ScopeFilter) -> ScopeFilter {
        match (self, other) {
            (ScopeFilter::Only(a), ScopeFilter::Only(b)) => {
                ScopeFilter::Only(a.union(b).cloned().collect())
            }
            _ => ScopeFilter::All,
        }
    }
}

/// Which principals and secrets a transition may have affected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgAccessScope {
    #[serde(default)]
    pub users: ScopeFilter,
    #[serde(default)]
    pub devices: ScopeFilter,
    #[serde(default)]
    pub env_parents: ScopeFilter,
    /// Environment ids, plus `"{envParentId}|{userId}"` for locals.
    #[serde(default)]
    pub environments: ScopeFilter,
    #[serde(default)]
    pub keyable_parents: ScopeFilter,
}

impl OrgAccessScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_env_parents(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            env_parents: ScopeFilter::only(ids),
            ..Self::default()
        }
    }

    pub fn for_users(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            users: ScopeFilter::only(ids),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn union(&self, other: &OrgAccessScope) -> OrgAccessScope {
        OrgAccessScope {
            users: self.users.union(&other.users),
            devices: self.devices.union(&other.devices),
            env_parents: self.env_parents.union(&other.env_parents),
            environments: self.environments.union(&other.environments),
            keyable_parents: self.keyable_parents.union(&other.keyable_parents),
        }
    }
}
