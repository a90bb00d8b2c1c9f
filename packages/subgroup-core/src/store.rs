use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::ids::{RecordId, Timestamp};
use crate::leaf::{LeafView, RawLeaf};

/// A persisted entity capable of carrying the four leaf fields.
pub trait Record {
    /// Durable identity, `None` until first saved.
    fn id(&self) -> Option<RecordId>;

    /// Identifier of the record type this entity belongs to.
    fn type_id(&self) -> &str;

    /// The owning group type, for record types scoped to one.
    fn group_type(&self) -> Option<RecordId> {
        None
    }
}

/// Per-record-type hooks for reading and writing the physical leaf fields.
///
/// Each implementation maps the four logical fields onto its own storage
/// layout; the tree algebra never touches anything else on a record.
pub trait LeafStorage {
    fn leaf_data(&self) -> RawLeaf;
    fn write_leaf_data(&mut self, leaf: &LeafView);
    fn clear_leaf_data(&mut self);
}

/// Comparison operator for leaf-field predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Gt,
    Ge,
    Le,
}

impl Cmp {
    /// Evaluate the operator against a concrete pair of values.
    pub fn matches<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Cmp::Eq => lhs == rhs,
            Cmp::Lt => lhs < rhs,
            Cmp::Gt => lhs > rhs,
            Cmp::Ge => lhs >= rhs,
            Cmp::Le => lhs <= rhs,
        }
    }
}

/// Field predicate understood by [`RecordStore::query`].
///
/// Records with the relevant field unset never match a leaf-field predicate.
#[derive(Clone, Copy, Debug)]
pub enum Filter {
    Depth(Cmp, u32),
    Left(Cmp, u64),
    Right(Cmp, u64),
    /// Equality on the tree id.
    Tree(RecordId),
    /// Equality on the owning group type.
    GroupType(RecordId),
}

/// Sort order for query results.
#[derive(Clone, Copy, Debug)]
pub enum Sort {
    /// Ascending left bound.
    LeftAsc,
}

/// Abstract persistence the tree engine reads from and writes to.
pub trait RecordStore {
    type Rec: Record + LeafStorage;

    fn load(&self, id: RecordId) -> Result<Self::Rec>;
    fn load_many(&self, ids: &[RecordId]) -> Result<Vec<Self::Rec>>;
    fn query(&self, filters: &[Filter], sort: Option<Sort>) -> Result<Vec<RecordId>>;
    fn save(&mut self, record: &Self::Rec) -> Result<()>;
    fn count(&self, filters: &[Filter]) -> Result<u64>;
}

/// Pluggable wall clock so time-dependent policies stay testable.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// In-memory map-backed store for tests and prototyping.
#[derive(Clone, Debug)]
pub struct MemoryStore<R> {
    records: BTreeMap<u64, R>,
    next_id: u64,
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<R: Record + LeafStorage + Clone> MemoryStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused identity; callers stamp it onto a record before `insert`.
    pub fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    /// Store a record that already carries its identity.
    pub fn insert(&mut self, record: R) -> Result<RecordId> {
        let id = record
            .id()
            .ok_or_else(|| Error::Storage("cannot insert a record without identity".into()))?;
        self.next_id = self.next_id.max(id.0);
        self.records.insert(id.0, record);
        Ok(id)
    }

    /// Drop a record entirely, returning it if it existed.
    pub fn remove(&mut self, id: RecordId) -> Option<R> {
        self.records.remove(&id.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matches(record: &R, filter: &Filter) -> bool {
        let leaf = record.leaf_data();
        match *filter {
            Filter::Depth(cmp, v) => leaf.depth.is_some_and(|d| cmp.matches(d, v)),
            Filter::Left(cmp, v) => leaf.left.is_some_and(|l| cmp.matches(l, v)),
            Filter::Right(cmp, v) => leaf.right.is_some_and(|r| cmp.matches(r, v)),
            Filter::Tree(t) => leaf.tree == Some(t),
            Filter::GroupType(t) => record.group_type() == Some(t),
        }
    }
}

impl<R: Record + LeafStorage + Clone> RecordStore for MemoryStore<R> {
    type Rec = R;

    fn load(&self, id: RecordId) -> Result<R> {
        self.records
            .get(&id.0)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no record with id {}", id.0)))
    }

    fn load_many(&self, ids: &[RecordId]) -> Result<Vec<R>> {
        ids.iter().map(|id| self.load(*id)).collect()
    }

    fn query(&self, filters: &[Filter], sort: Option<Sort>) -> Result<Vec<RecordId>> {
        let mut hits: Vec<(u64, RecordId)> = self
            .records
            .values()
            .filter(|r| filters.iter().all(|f| Self::matches(r, f)))
            .filter_map(|r| r.id().map(|id| (r.leaf_data().left.unwrap_or(0), id)))
            .collect();
        if let Some(Sort::LeftAsc) = sort {
            hits.sort_by_key(|(left, _)| *left);
        }
        Ok(hits.into_iter().map(|(_, id)| id).collect())
    }

    fn save(&mut self, record: &R) -> Result<()> {
        let id = record
            .id()
            .ok_or_else(|| Error::Storage("cannot save a record without identity".into()))?;
        self.records.insert(id.0, record.clone());
        Ok(())
    }

    fn count(&self, filters: &[Filter]) -> Result<u64> {
        Ok(self
            .records
            .values()
            .filter(|r| filters.iter().all(|f| Self::matches(r, f)))
            .count() as u64)
    }
}
