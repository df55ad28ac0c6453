//! Object type hierarchy of a schema.
//!
//! Insight returns the object types of a schema as a flat list where each
//! type may name a parent. [`ObjectTypeGraph`] rebuilds the tree so that a
//! schema can be recreated elsewhere with parents created before children.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ObjectType;

/// The object type tree of one schema.
#[derive(Debug, Clone)]
pub struct ObjectTypeGraph {
    types: HashMap<i64, ObjectType>,
    /// Child IDs per parent, sorted by position. `None` holds the roots.
    children: HashMap<Option<i64>, Vec<i64>>,
}

/// One entry of a creation plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationStep<'a> {
    pub id: i64,
    pub name: &'a str,
    /// The parent's name, if the parent is part of the schema.
    pub parent_name: Option<&'a str>,
    /// 0 for roots.
    pub depth: usize,
}

impl ObjectTypeGraph {
    /// Build the tree from a flat object type list.
    ///
    /// Types whose parent is not in the list are treated as roots. Duplicate
    /// IDs keep the first occurrence.
    pub fn new(object_types: Vec<ObjectType>) -> Self {
        let mut types = HashMap::with_capacity(object_types.len());
        let mut order = Vec::with_capacity(object_types.len());
        for object_type in object_types {
            if types.contains_key(&object_type.id) {
                warn!(id = object_type.id, "Duplicate object type ignored");
                continue;
            }
            order.push(object_type.id);
            types.insert(object_type.id, object_type);
        }

        let mut children: HashMap<Option<i64>, Vec<i64>> = HashMap::new();
        for id in order {
            let parent = types[&id]
                .parent_object_type_id
                .filter(|parent| *parent != id && types.contains_key(parent));
            if parent.is_none() && types[&id].parent_object_type_id.is_some() {
                debug!(id, "Parent not in schema, treating object type as root");
            }
            children.entry(parent).or_default().push(id);
        }

        for ids in children.values_mut() {
            // Stable, so equal positions keep the API's order.
            ids.sort_by_key(|id| types[id].position);
        }

        Self { types, children }
    }

    /// Number of object types in the graph.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&ObjectType> {
        self.types.get(&id)
    }

    /// Root object types, ordered by position.
    pub fn roots(&self) -> Vec<&ObjectType> {
        self.child_ids(None)
            .iter()
            .map(|id| &self.types[id])
            .collect()
    }

    /// Direct children of an object type, ordered by position.
    pub fn children(&self, id: i64) -> Vec<&ObjectType> {
        self.child_ids(Some(id))
            .iter()
            .map(|id| &self.types[id])
            .collect()
    }

    fn child_ids(&self, parent: Option<i64>) -> &[i64] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Object types in creation order.
    ///
    /// Depth-first from the roots: every type comes after its parent, and
    /// siblings keep their position order. Each type appears exactly once.
    /// Types caught in a parent cycle are not reachable from any root; they
    /// are appended last, each cycle starting at its lowest position.
    pub fn creation_order(&self) -> Vec<CreationStep<'_>> {
        let mut ordered = Vec::with_capacity(self.types.len());
        let mut visited = HashSet::with_capacity(self.types.len());

        for &root in self.child_ids(None) {
            self.visit(root, 0, &mut visited, &mut ordered);
        }

        if ordered.len() < self.types.len() {
            let mut stranded: Vec<&ObjectType> = self
                .types
                .values()
                .filter(|t| !visited.contains(&t.id))
                .collect();
            stranded.sort_by_key(|t| (t.position, t.id));
            warn!(
                count = stranded.len(),
                "Object types with cyclic parents appended to creation order"
            );
            for object_type in stranded {
                self.visit(object_type.id, 0, &mut visited, &mut ordered);
            }
        }

        info!("Created ordered structure with {} object types", ordered.len());
        ordered
    }

    fn visit<'a>(
        &'a self,
        start: i64,
        depth: usize,
        visited: &mut HashSet<i64>,
        ordered: &mut Vec<CreationStep<'a>>,
    ) {
        let mut stack = vec![(start, depth)];
        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let object_type = &self.types[&id];
            let parent_name = object_type
                .parent_object_type_id
                .filter(|_| depth > 0)
                .and_then(|parent| self.types.get(&parent))
                .map(|parent| parent.name.as_str());

            debug!("Adding to order: {}", object_type.name);
            ordered.push(CreationStep {
                id,
                name: &object_type.name,
                parent_name,
                depth,
            });

            // Reversed so the lowest position is popped first.
            for &child in self.child_ids(Some(id)).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }
}
