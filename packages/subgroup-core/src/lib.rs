#![forbid(unsafe_code)]
//! Nested-set hierarchy engine for subgroup trees, with pluggable record
//! storage. The tree algebra stays independent of concrete persistence so it
//! can run against any host that satisfies the store traits defined here;
//! the group and group-type engines layer entity-specific preconditions on
//! top of the same algebra.

pub mod error;
pub mod group;
pub mod group_type;
pub mod ids;
pub mod inheritance;
pub mod leaf;
pub mod settings;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use group::{
    Group, GroupTreeEngine, GroupTreePolicy, TypeHierarchy, DEFAULT_FRESHNESS_WINDOW,
    GROUP_RECORD_TYPE,
};
pub use group_type::{
    GroupType, GroupTypePolicy, GroupTypeTreeEngine, InstanceCounter, GROUP_TYPE_RECORD_TYPE,
};
pub use ids::{EdgeId, RecordId, RoleId, Timestamp};
pub use inheritance::{
    InheritanceEdge, InheritanceEdgeStore, MemoryRoles, Role, RoleAudience, RoleProvider,
    TypeTreeView,
};
pub use leaf::{LeafView, RawLeaf};
pub use settings::{Key, SettingsBag, SettingsValue};
pub use store::{Clock, Cmp, Filter, LeafStorage, MemoryStore, Record, RecordStore, Sort, SystemClock};
pub use tree::{NoPolicy, TreeEngine, TreePolicy};
