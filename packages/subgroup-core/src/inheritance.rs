use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::{EdgeId, RecordId, RoleId};
use crate::leaf::LeafView;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Audience a role can be granted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoleAudience {
    Members,
    Outsiders,
    Anonymous,
}

/// A role scoped to exactly one group type.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Role {
    id: RoleId,
    group_type: RecordId,
    audience: RoleAudience,
    admin: bool,
}

impl Role {
    pub fn new(id: RoleId, group_type: RecordId, audience: RoleAudience) -> Self {
        Self {
            id,
            group_type,
            audience,
            admin: false,
        }
    }

    pub fn as_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn group_type(&self) -> RecordId {
        self.group_type
    }

    /// Whether the role can be granted to individual members. Administrative
    /// and non-member roles cannot take part in inheritance.
    pub fn member_assignable(&self) -> bool {
        self.audience == RoleAudience::Members && !self.admin
    }
}

/// Role lookup injected into the edge store.
pub trait RoleProvider {
    fn role(&self, id: RoleId) -> Result<Option<Role>>;
}

impl<T: RoleProvider + ?Sized> RoleProvider for &T {
    fn role(&self, id: RoleId) -> Result<Option<Role>> {
        (**self).role(id)
    }
}

/// In-memory role lookup for tests and prototyping.
#[derive(Clone, Debug, Default)]
pub struct MemoryRoles {
    roles: BTreeMap<u64, Role>,
}

impl MemoryRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: Role) {
        self.roles.insert(role.id.0, role);
    }
}

impl RoleProvider for MemoryRoles {
    fn role(&self, id: RoleId) -> Result<Option<Role>> {
        Ok(self.roles.get(&id.0).cloned())
    }
}

/// Read access to the group-type tree, as much of it as edge validation
/// needs.
pub trait TypeTreeView {
    /// Current leaf view of a group type, `None` when it is not in a tree.
    fn type_leaf(&self, group_type: RecordId) -> Result<Option<LeafView>>;

    /// Strict ancestor/descendant relation between two group types.
    fn vertically_related(&self, a: RecordId, b: RecordId) -> Result<bool>;
}

impl<T: TypeTreeView + ?Sized> TypeTreeView for &T {
    fn type_leaf(&self, group_type: RecordId) -> Result<Option<LeafView>> {
        (**self).type_leaf(group_type)
    }

    fn vertically_related(&self, a: RecordId, b: RecordId) -> Result<bool> {
        (**self).vertically_related(a, b)
    }
}

/// A directed link between two roles on vertically related tree nodes.
///
/// `tree` is stamped from the source leaf at creation and never recomputed:
/// restructuring the tree afterwards does not change which tree an edge is
/// considered to belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InheritanceEdge {
    id: EdgeId,
    source: RoleId,
    target: RoleId,
    tree: RecordId,
}

impl InheritanceEdge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn source(&self) -> RoleId {
        self.source
    }

    pub fn target(&self) -> RoleId {
        self.target
    }

    pub fn tree(&self) -> RecordId {
        self.tree
    }
}

/// Validating store for inheritance edges.
///
/// Edges are immutable once created; the only supported mutation is
/// deletion, individually or in bulk when a type leaves its tree.
pub struct InheritanceEdgeStore<V, R> {
    tree_view: V,
    roles: R,
    edges: BTreeMap<u64, InheritanceEdge>,
    next_id: u64,
}

impl<V: TypeTreeView, R: RoleProvider> InheritanceEdgeStore<V, R> {
    pub fn new(tree_view: V, roles: R) -> Self {
        Self {
            tree_view,
            roles,
            edges: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Validate and persist a new edge from `source` to `target`.
    pub fn create(&mut self, source: RoleId, target: RoleId) -> Result<&InheritanceEdge> {
        let source_role = self.roles.role(source)?.ok_or_else(|| {
            Error::InvalidInheritance(format!("unknown source role {}", source.0))
        })?;
        let target_role = self.roles.role(target)?.ok_or_else(|| {
            Error::InvalidInheritance(format!("unknown target role {}", target.0))
        })?;
        for (label, role) in [("source", &source_role), ("target", &target_role)] {
            if !role.member_assignable() {
                return Err(Error::InvalidInheritance(format!(
                    "{label} role {} is not member-assignable",
                    role.id().0
                )));
            }
        }

        let source_leaf = self
            .tree_view
            .type_leaf(source_role.group_type())?
            .ok_or_else(|| {
                Error::InvalidInheritance(format!(
                    "group type {} is not part of a tree",
                    source_role.group_type().0
                ))
            })?;
        let target_leaf = self
            .tree_view
            .type_leaf(target_role.group_type())?
            .ok_or_else(|| {
                Error::InvalidInheritance(format!(
                    "group type {} is not part of a tree",
                    target_role.group_type().0
                ))
            })?;
        if source_leaf.tree() != target_leaf.tree() {
            return Err(Error::InvalidInheritance(
                "source and target roles belong to different trees".into(),
            ));
        }
        if !self
            .tree_view
            .vertically_related(source_role.group_type(), target_role.group_type())?
        {
            return Err(Error::InvalidInheritance(
                "role group types are not vertically related".into(),
            ));
        }
        if self
            .edges
            .values()
            .any(|e| e.source == source && e.target == target)
        {
            return Err(Error::InvalidInheritance(format!(
                "an edge from role {} to role {} already exists",
                source.0, target.0
            )));
        }

        self.next_id += 1;
        let edge = InheritanceEdge {
            id: EdgeId(self.next_id),
            source,
            target,
            tree: source_leaf.tree(),
        };
        debug!(
            edge = edge.id.0,
            source = source.0,
            target = target.0,
            tree = edge.tree.0,
            "created inheritance edge"
        );
        Ok(self.edges.entry(self.next_id).or_insert(edge))
    }

    pub fn get(&self, id: EdgeId) -> Option<&InheritanceEdge> {
        self.edges.get(&id.0)
    }

    /// Edges are immutable once created.
    pub fn update(&mut self, _id: EdgeId) -> Result<()> {
        Err(Error::InvalidInheritance(
            "inheritance edges are immutable once created".into(),
        ))
    }

    pub fn delete(&mut self, id: EdgeId) -> Result<InheritanceEdge> {
        self.edges
            .remove(&id.0)
            .ok_or_else(|| Error::Storage(format!("no inheritance edge with id {}", id.0)))
    }

    /// Remove every edge stranded by `group_type` leaving `tree`: edges bound
    /// to that tree whose source or target role belongs to the departed type.
    pub fn purge_for_departed_type(
        &mut self,
        tree: RecordId,
        group_type: RecordId,
    ) -> Result<Vec<InheritanceEdge>> {
        let mut doomed = Vec::new();
        for edge in self.edges.values() {
            if edge.tree != tree {
                continue;
            }
            let source = self.roles.role(edge.source)?.ok_or_else(|| {
                Error::InconsistentState(format!("edge {} references unknown role", edge.id.0))
            })?;
            let target = self.roles.role(edge.target)?.ok_or_else(|| {
                Error::InconsistentState(format!("edge {} references unknown role", edge.id.0))
            })?;
            if source.group_type() == group_type || target.group_type() == group_type {
                doomed.push(edge.id);
            }
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(edge) = self.edges.remove(&id.0) {
                removed.push(edge);
            }
        }
        debug!(
            tree = tree.0,
            group_type = group_type.0,
            purged = removed.len(),
            "purged inheritance edges for departed type"
        );
        Ok(removed)
    }

    pub fn edges_in_tree(&self, tree: RecordId) -> Vec<&InheritanceEdge> {
        self.edges.values().filter(|e| e.tree == tree).collect()
    }

    pub fn edges_for_role(&self, role: RoleId) -> Vec<&InheritanceEdge> {
        self.edges
            .values()
            .filter(|e| e.source == role || e.target == role)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
