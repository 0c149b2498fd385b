//! # Storage Keys
//!
//! Every stored row is addressed by a partition key (`pkey`) and a sort key
//! (`skey`). Graph objects live in the tenant partition with
//! `skey = "g|<type>|<ids...>"`; children are keyed under their parent so a
//! prefix selects a subtree.
//!
//! Scope keys are skey prefixes. A trailing `$` pins an exact match.

use serde::{Deserialize, Serialize};
use shared_types::{GraphObject, ObjectId, ObjectType, OrgId};
use std::fmt;

/// Graph-object skey namespace.
pub const GRAPH_KEY_PREFIX: &str = "g";

/// Exact-match marker on a scope key.
pub const EXACT_MATCH_SUFFIX: char = '$';

/// Primary key of a stored row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DbKey {
    pub pkey: String,
    pub skey: String,
}

impl DbKey {
    pub fn new(pkey: impl Into<String>, skey: impl Into<String>) -> Self {
        Self {
            pkey: pkey.into(),
            skey: skey.into(),
        }
    }
}

impl fmt::Display for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pkey, self.skey)
    }
}

/// Storage key of a graph object.
pub fn graph_key(org_id: &OrgId, object: &GraphObject) -> DbKey {
    let mut skey = format!("{GRAPH_KEY_PREFIX}|{}", object.object_type());
    for id in object.key_ids() {
        skey.push('|');
        skey.push_str(id.as_str());
    }
    DbKey::new(org_id.as_str(), skey)
}

/// Storage key of the tenant root row.
pub fn org_key(org_id: &OrgId) -> DbKey {
    DbKey::new(org_id.as_str(), org_skey())
}

fn org_skey() -> String {
    format!("{GRAPH_KEY_PREFIX}|{}", ObjectType::Org)
}

/// A partition selector for range deletes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbScope {
    pub pkey: String,
    /// Treat `pkey` as a prefix rather than an exact partition.
    #[serde(default)]
    pub pkey_prefix: bool,
    /// Optional skey prefix within the partition(s).
    #[serde(default)]
    pub scope: Option<String>,
}

impl DbScope {
    pub fn partition(pkey: impl Into<String>) -> Self {
        Self {
            pkey: pkey.into(),
            pkey_prefix: false,
            scope: None,
        }
    }

    pub fn within(pkey: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            pkey: pkey.into(),
            pkey_prefix: false,
            scope: Some(scope.into()),
        }
    }

    pub fn matches(&self, key: &DbKey) -> bool {
        let pkey_match = if self.pkey_prefix {
            key.pkey.starts_with(&self.pkey)
        } else {
            key.pkey == self.pkey
        };
        pkey_match
            && self
                .scope
                .as_deref()
                .map_or(true, |scope| key.skey.starts_with(scope))
    }
}

/// Graph partition selector used by scope predicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Matches exactly one skey.
    pub fn exact(skey: impl AsRef<str>) -> Self {
        Self(format!("{}{EXACT_MATCH_SUFFIX}", skey.as_ref()))
    }

    /// Every object of one type.
    pub fn for_type(object_type: ObjectType) -> Self {
        Self(format!("{GRAPH_KEY_PREFIX}|{object_type}|"))
    }

    /// Every object of `object_type` keyed under `parent_id`.
    pub fn for_children(object_type: ObjectType, parent_id: &ObjectId) -> Self {
        Self(format!("{GRAPH_KEY_PREFIX}|{object_type}|{parent_id}|"))
    }

    /// Exactly the given object.
    pub fn for_object(org_id: &OrgId, object: &GraphObject) -> Self {
        Self::exact(graph_key(org_id, object).skey)
    }

    /// The tenant root row.
    pub fn org() -> Self {
        Self::exact(org_skey())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_exact(&self) -> bool {
        self.0.ends_with(EXACT_MATCH_SUFFIX)
    }

    pub fn matches(&self, skey: &str) -> bool {
        match self.0.strip_suffix(EXACT_MATCH_SUFFIX) {
            Some(exact) => skey == exact,
            None => skey.starts_with(&self.0),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
