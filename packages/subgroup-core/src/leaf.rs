use crate::error::{Error, Result};
use crate::ids::RecordId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw leaf fields exactly as read off a record, before validation.
///
/// An all-unset value means the record is not a member of any tree; a
/// partially set value is a malformed member and always an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawLeaf {
    pub depth: Option<u32>,
    pub left: Option<u64>,
    pub right: Option<u64>,
    pub tree: Option<RecordId>,
}

impl RawLeaf {
    /// True when none of the four fields carry a value.
    pub fn is_unset(&self) -> bool {
        self.depth.is_none() && self.left.is_none() && self.right.is_none() && self.tree.is_none()
    }
}

/// Validated projection of the four nested-set fields of a tree member.
///
/// Invariants: `left >= 1` and `right > left`. `tree` is the id of the record
/// that roots the tree; a root's own `tree` equals its own id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LeafView {
    depth: u32,
    left: u64,
    right: u64,
    tree: RecordId,
}

impl LeafView {
    pub fn new(depth: u32, left: u64, right: u64, tree: RecordId) -> Result<Self> {
        if left < 1 {
            return Err(Error::MalformedLeaf(format!(
                "left bound must be at least 1, got {left}"
            )));
        }
        if right <= left {
            return Err(Error::MalformedLeaf(format!(
                "right bound {right} does not exceed left bound {left}"
            )));
        }
        Ok(Self {
            depth,
            left,
            right,
            tree,
        })
    }

    /// Validate raw fields into a view.
    ///
    /// `Ok(None)` means the record is cleanly outside any tree. A partially
    /// set or incoherent field set fails with [`Error::MalformedLeaf`].
    pub fn from_raw(raw: RawLeaf) -> Result<Option<Self>> {
        if raw.is_unset() {
            return Ok(None);
        }
        let (Some(depth), Some(left), Some(right), Some(tree)) =
            (raw.depth, raw.left, raw.right, raw.tree)
        else {
            return Err(Error::MalformedLeaf(
                "leaf fields are only partially set".into(),
            ));
        };
        Self::new(depth, left, right, tree).map(Some)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn left(&self) -> u64 {
        self.left
    }

    pub fn right(&self) -> u64 {
        self.right
    }

    pub fn tree(&self) -> RecordId {
        self.tree
    }

    /// Roots sit at depth zero.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Strict interval containment within the same tree.
    pub fn contains(&self, other: &LeafView) -> bool {
        self.tree == other.tree && self.left < other.left && other.right < self.right
    }
}
