#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds, used for record creation times.
pub type Timestamp = u64;

/// Durable identity of a persisted record, unique within its record type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordId(pub u64);

/// Identity of a role record scoped to one group type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoleId(pub u64);

/// Identity of an inheritance edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeId(pub u64);
