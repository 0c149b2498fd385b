//! # Graph
//!
//! Immutable-per-request mapping from id to [`GraphObject`].
//!
//! Objects are held behind `Arc`, so cloning a graph copies only the map
//! spine. Every mutator returns a new `Graph` in which untouched entries
//! share their allocation with the source; only the patched entry is
//! re-allocated. Nothing is ever mutated in place.

use crate::domain::errors::{GraphError, GraphResult};
use shared_types::{GraphObject, ObjectId, ObjectType, Org, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Graph {
    objects: BTreeMap<ObjectId, Arc<GraphObject>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_objects(objects: impl IntoIterator<Item = GraphObject>) -> Self {
        Self {
            objects: objects
                .into_iter()
                .map(|object| (object.id.clone(), Arc::new(object)))
                .collect(),
        }
    }

    pub fn get(&self, id: &ObjectId) -> Option<&GraphObject> {
        self.objects.get(id).map(Arc::as_ref)
    }

    /// Live (not soft-deleted) object by id.
    pub fn get_active(&self, id: &ObjectId) -> Option<&GraphObject> {
        self.get(id).filter(|object| !object.is_deleted())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphObject> {
        self.objects.values().map(Arc::as_ref)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    /// Live objects of one type, in id order.
    pub fn by_type(&self, object_type: ObjectType) -> impl Iterator<Item = &GraphObject> {
        self.iter()
            .filter(move |object| object.object_type() == object_type && !object.is_deleted())
    }

    /// The tenant root object.
    pub fn org(&self) -> GraphResult<&GraphObject> {
        self.by_type(ObjectType::Org).next().ok_or(GraphError::MissingOrg)
    }

    pub fn org_body(&self) -> GraphResult<&Org> {
        let org = self.org()?;
        org.as_org().ok_or_else(|| GraphError::TypeMismatch {
            id: org.id.clone(),
            expected: ObjectType::Org,
        })
    }

    /// Copy of this graph with `patch` applied to a clone of `id`.
    pub fn with_updated<F>(&self, id: &ObjectId, patch: F) -> GraphResult<Graph>
    where
        F: FnOnce(&mut GraphObject),
    {
        let current = self
            .objects
            .get(id)
            .ok_or_else(|| GraphError::ObjectNotFound(id.clone()))?;
        let mut next = GraphObject::clone(current);
        patch(&mut next);

        let mut objects = self.objects.clone();
        objects.insert(id.clone(), Arc::new(next));
        Ok(Graph { objects })
    }

    /// Copy of this graph with `object` inserted or replaced.
    pub fn with_object(&self, object: GraphObject) -> Graph {
        let mut objects = self.objects.clone();
        objects.insert(object.id.clone(), Arc::new(object));
        Graph { objects }
    }

    /// Copy of this graph with every listed object soft-deleted at `now`.
    /// Missing or already deleted ids are skipped.
    pub fn with_soft_deleted<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ObjectId>,
        now: Timestamp,
    ) -> Graph {
        let mut objects = self.objects.clone();
        for id in ids {
            let Some(current) = objects.get(id) else {
                continue;
            };
            if current.is_deleted() {
                continue;
            }
            let mut next = GraphObject::clone(current);
            next.deleted_at = Some(now);
            next.updated_at = now;
            objects.insert(id.clone(), Arc::new(next));
        }
        Graph { objects }
    }

    /// Copy of this graph without `id`.
    pub fn without(&self, id: &ObjectId) -> Graph {
        let mut objects = self.objects.clone();
        objects.remove(id);
        Graph { objects }
    }

    /// Union of two graphs; entries from `other` win.
    pub fn merged(&self, other: &Graph) -> Graph {
        let mut objects = self.objects.clone();
        for (id, object) in &other.objects {
            objects.insert(id.clone(), Arc::clone(object));
        }
        Graph { objects }
    }

    /// View with soft-deleted objects removed.
    pub fn active(&self) -> Graph {
        Graph {
            objects: self
                .objects
                .iter()
                .filter(|(_, object)| !object.is_deleted())
                .map(|(id, object)| (id.clone(), Arc::clone(object)))
                .collect(),
        }
    }

    /// Both graphs hold the very same allocation for `id`.
    pub fn shares_object(&self, other: &Graph, id: &ObjectId) -> bool {
        match (self.objects.get(id), other.objects.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Object-level equality with a pointer fast path.
    pub fn same_contents(&self, other: &Graph) -> bool {
        self.objects.len() == other.objects.len()
            && self.objects.iter().all(|(id, a)| {
                other
                    .objects
                    .get(id)
                    .map_or(false, |b| Arc::ptr_eq(a, b) || a == b)
            })
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&ObjectId, &Arc<GraphObject>)> {
        self.objects.iter()
    }

    pub(crate) fn entry(&self, id: &ObjectId) -> Option<&Arc<GraphObject>> {
        self.objects.get(id)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.same_contents(other)
    }
}

impl Eq for Graph {}

impl FromIterator<GraphObject> for Graph {
    fn from_iter<T: IntoIterator<Item = GraphObject>>(iter: T) -> Self {
        Graph::from_objects(iter)
    }
}
