use crate::error::{Error, Result};
use crate::ids::{RecordId, Timestamp};
use crate::leaf::{LeafView, RawLeaf};
use crate::store::{Clock, LeafStorage, Record, RecordStore};
use crate::tree::{TreeEngine, TreePolicy};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Record type id for membership groups.
pub const GROUP_RECORD_TYPE: &str = "group";

/// How long after creation a group may still become a subgroup, in seconds.
///
/// Converting an established group into a subgroup would silently change its
/// semantics for anything that loaded it earlier, so attachment is only
/// allowed within roughly one request lifetime of creation.
pub const DEFAULT_FRESHNESS_WINDOW: Timestamp = 30;

/// A membership group carrying its nested-set fields as first-class columns.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Group {
    id: Option<RecordId>,
    group_type: RecordId,
    created: Timestamp,
    depth: Option<u32>,
    left: Option<u64>,
    right: Option<u64>,
    tree: Option<RecordId>,
}

impl Group {
    pub fn new(id: RecordId, group_type: RecordId, created: Timestamp) -> Self {
        Self {
            id: Some(id),
            group_type,
            created,
            depth: None,
            left: None,
            right: None,
            tree: None,
        }
    }

    /// A group that has not been persisted yet and so has no identity.
    pub fn unsaved(group_type: RecordId, created: Timestamp) -> Self {
        Self {
            id: None,
            group_type,
            created,
            depth: None,
            left: None,
            right: None,
            tree: None,
        }
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }
}

impl Record for Group {
    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn type_id(&self) -> &str {
        GROUP_RECORD_TYPE
    }

    fn group_type(&self) -> Option<RecordId> {
        Some(self.group_type)
    }
}

impl LeafStorage for Group {
    fn leaf_data(&self) -> RawLeaf {
        RawLeaf {
            depth: self.depth,
            left: self.left,
            right: self.right,
            tree: self.tree,
        }
    }

    fn write_leaf_data(&mut self, leaf: &LeafView) {
        self.depth = Some(leaf.depth());
        self.left = Some(leaf.left());
        self.right = Some(leaf.right());
        self.tree = Some(leaf.tree());
    }

    fn clear_leaf_data(&mut self) {
        self.depth = None;
        self.left = None;
        self.right = None;
        self.tree = None;
    }
}

/// Answers type-level questions about the group-type tree.
pub trait TypeHierarchy {
    /// Whether groups of this type may start a new tree.
    fn root_capable(&self, group_type: RecordId) -> Result<bool>;

    /// Whether `child` is the declared child type of `parent`.
    fn allows_child(&self, parent: RecordId, child: RecordId) -> Result<bool>;
}

impl<T: TypeHierarchy + ?Sized> TypeHierarchy for &T {
    fn root_capable(&self, group_type: RecordId) -> Result<bool> {
        (**self).root_capable(group_type)
    }

    fn allows_child(&self, parent: RecordId, child: RecordId) -> Result<bool> {
        (**self).allows_child(parent, child)
    }
}

/// Preconditions for group trees: parent/child type compatibility and a
/// freshness window on the record joining the tree.
pub struct GroupTreePolicy<H, C> {
    hierarchy: H,
    clock: C,
    freshness_window: Timestamp,
}

impl<H: TypeHierarchy, C: Clock> GroupTreePolicy<H, C> {
    pub fn new(hierarchy: H, clock: C) -> Self {
        Self {
            hierarchy,
            clock,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    pub fn with_freshness_window(mut self, seconds: Timestamp) -> Self {
        self.freshness_window = seconds;
        self
    }
}

impl<S, H, C> TreePolicy<S> for GroupTreePolicy<H, C>
where
    S: RecordStore<Rec = Group>,
    H: TypeHierarchy,
    C: Clock,
{
    fn check_init(&self, _store: &S, record: &Group) -> Result<()> {
        if !self.hierarchy.root_capable(record.group_type)? {
            return Err(Error::InvalidRoot(format!(
                "group type {} cannot root a tree",
                record.group_type.0
            )));
        }
        Ok(())
    }

    fn check_add(&self, _store: &S, parent: &Group, child: &Group) -> Result<()> {
        if !self.hierarchy.allows_child(parent.group_type, child.group_type)? {
            return Err(Error::InvalidParent(format!(
                "group type {} does not declare {} as a child type",
                parent.group_type.0, child.group_type.0
            )));
        }
        let age = self.clock.now().saturating_sub(child.created);
        if age > self.freshness_window {
            return Err(Error::InvalidLeaf(
                "only freshly created groups may become subgroups".into(),
            ));
        }
        Ok(())
    }
}

/// Tree engine over membership groups.
pub type GroupTreeEngine<S, H, C> = TreeEngine<S, GroupTreePolicy<H, C>>;

impl<S, H, C> GroupTreeEngine<S, H, C>
where
    S: RecordStore<Rec = Group>,
    H: TypeHierarchy,
    C: Clock,
{
    pub fn for_groups(store: S, policy: GroupTreePolicy<H, C>) -> Self {
        TreeEngine::new(GROUP_RECORD_TYPE, store, policy)
    }
}
