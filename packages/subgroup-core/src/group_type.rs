use crate::error::{Error, Result};
use crate::group::{Group, TypeHierarchy};
use crate::ids::RecordId;
use crate::inheritance::TypeTreeView;
use crate::leaf::{LeafView, RawLeaf};
use crate::settings::{Key, SettingsBag};
use crate::store::{Filter, LeafStorage, MemoryStore, Record, RecordStore};
use crate::tree::{TreeEngine, TreePolicy};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Record type id for group types.
pub const GROUP_TYPE_RECORD_TYPE: &str = "group_type";

/// Settings keys the group-type layout stores its tree fields under.
mod keys {
    use crate::ids::RecordId;
    use crate::settings::Key;

    pub const DEPTH: Key<u32> = Key::new("subgroup_depth");
    pub const LEFT: Key<u64> = Key::new("subgroup_left");
    pub const RIGHT: Key<u64> = Key::new("subgroup_right");
    pub const TREE: Key<RecordId> = Key::new("subgroup_tree");
}

/// A group type (bundle-level record) keeping its tree fields in a settings
/// bag rather than first-class columns.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupType {
    id: Option<RecordId>,
    settings: SettingsBag,
}

impl GroupType {
    pub fn new(id: RecordId) -> Self {
        Self {
            id: Some(id),
            settings: SettingsBag::new(),
        }
    }

    /// A group type that has not been persisted yet.
    pub fn unsaved() -> Self {
        Self {
            id: None,
            settings: SettingsBag::new(),
        }
    }

    pub fn settings(&self) -> &SettingsBag {
        &self.settings
    }
}

impl Record for GroupType {
    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn type_id(&self) -> &str {
        GROUP_TYPE_RECORD_TYPE
    }
}

impl LeafStorage for GroupType {
    fn leaf_data(&self) -> RawLeaf {
        RawLeaf {
            depth: self.settings.get(keys::DEPTH),
            left: self.settings.get(keys::LEFT),
            right: self.settings.get(keys::RIGHT),
            tree: self.settings.get(keys::TREE),
        }
    }

    fn write_leaf_data(&mut self, leaf: &LeafView) {
        self.settings.set(keys::DEPTH, leaf.depth());
        self.settings.set(keys::LEFT, leaf.left());
        self.settings.set(keys::RIGHT, leaf.right());
        self.settings.set(keys::TREE, leaf.tree());
    }

    fn clear_leaf_data(&mut self) {
        self.settings.unset(keys::DEPTH);
        self.settings.unset(keys::LEFT);
        self.settings.unset(keys::RIGHT);
        self.settings.unset(keys::TREE);
    }
}

/// Live-instance lookup for a group type, injected into the type-level
/// policy.
pub trait InstanceCounter {
    fn live_instances(&self, group_type: RecordId) -> Result<u64>;
}

impl<T: InstanceCounter + ?Sized> InstanceCounter for &T {
    fn live_instances(&self, group_type: RecordId) -> Result<u64> {
        (**self).live_instances(group_type)
    }
}

impl InstanceCounter for MemoryStore<Group> {
    fn live_instances(&self, group_type: RecordId) -> Result<u64> {
        self.count(&[Filter::GroupType(group_type)])
    }
}

/// Preconditions for the type-level tree: a type may join or leave only
/// while no live groups of that type exist, since existing instances cannot
/// retroactively honor the changed semantics.
pub struct GroupTypePolicy<C> {
    instances: C,
}

impl<C: InstanceCounter> GroupTypePolicy<C> {
    pub fn new(instances: C) -> Self {
        Self { instances }
    }

    fn require_no_instances(&self, record: &GroupType) -> Result<()> {
        let Some(id) = record.id() else {
            return Ok(());
        };
        let live = self.instances.live_instances(id)?;
        if live > 0 {
            return Err(Error::InvalidLeaf(format!(
                "group type {} still has {live} live groups",
                id.0
            )));
        }
        Ok(())
    }
}

impl<S, C> TreePolicy<S> for GroupTypePolicy<C>
where
    S: RecordStore<Rec = GroupType>,
    C: InstanceCounter,
{
    fn check_add(&self, _store: &S, _parent: &GroupType, child: &GroupType) -> Result<()> {
        self.require_no_instances(child)
    }

    fn check_remove(&self, _store: &S, record: &GroupType) -> Result<()> {
        self.require_no_instances(record)
    }

    // The host storage cannot sort over the settings-bag layout reliably, so
    // read queries order client-side.
    fn native_sort(&self) -> bool {
        false
    }
}

/// Tree engine over group types.
pub type GroupTypeTreeEngine<S, C> = TreeEngine<S, GroupTypePolicy<C>>;

impl<S, C> GroupTypeTreeEngine<S, C>
where
    S: RecordStore<Rec = GroupType>,
    C: InstanceCounter,
{
    pub fn for_group_types(store: S, instances: C) -> Self {
        TreeEngine::new(GROUP_TYPE_RECORD_TYPE, store, GroupTypePolicy::new(instances))
    }
}

impl<S, C> TypeHierarchy for GroupTypeTreeEngine<S, C>
where
    S: RecordStore<Rec = GroupType>,
    C: InstanceCounter,
{
    fn root_capable(&self, group_type: RecordId) -> Result<bool> {
        let record = self.store().load(group_type)?;
        self.is_root(&record)
    }

    fn allows_child(&self, parent: RecordId, child: RecordId) -> Result<bool> {
        let parent_record = self.store().load(parent)?;
        let child_record = self.store().load(child)?;
        let (Some(p), Some(c)) = (self.leaf_of(&parent_record)?, self.leaf_of(&child_record)?)
        else {
            return Ok(false);
        };
        Ok(p.contains(&c) && c.depth() == p.depth() + 1)
    }
}

impl<S, C> TypeTreeView for GroupTypeTreeEngine<S, C>
where
    S: RecordStore<Rec = GroupType>,
    C: InstanceCounter,
{
    fn type_leaf(&self, group_type: RecordId) -> Result<Option<LeafView>> {
        let record = self.store().load(group_type)?;
        self.leaf_of(&record)
    }

    fn vertically_related(&self, a: RecordId, b: RecordId) -> Result<bool> {
        let ra = self.store().load(a)?;
        let rb = self.store().load(b)?;
        self.are_vertically_related(&ra, &rb)
    }
}
