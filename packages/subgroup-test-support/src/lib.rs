#![forbid(unsafe_code)]
//! Shared fixtures for the subgroup engine test suites: a neutral record
//! type over an in-memory store, deterministic collaborators, and an oracle
//! asserting the full nested-set invariant set.

use std::collections::BTreeSet;

use subgroup_core::{
    Clock, LeafStorage, LeafView, MemoryStore, NoPolicy, RawLeaf, Record, RecordId, RecordStore,
    Timestamp, TreeEngine, TreePolicy, TypeHierarchy,
};

pub const TEST_RECORD_TYPE: &str = "test_record";

/// Neutral record with first-class leaf fields, for exercising the bare
/// algebra without any policy layer.
#[derive(Clone, Debug)]
pub struct TestRecord {
    id: Option<RecordId>,
    raw: RawLeaf,
}

impl TestRecord {
    pub fn new(id: RecordId) -> Self {
        Self {
            id: Some(id),
            raw: RawLeaf::default(),
        }
    }

    pub fn unsaved() -> Self {
        Self {
            id: None,
            raw: RawLeaf::default(),
        }
    }

    pub fn record_id(&self) -> RecordId {
        self.id.expect("test record has an id")
    }
}

impl Record for TestRecord {
    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn type_id(&self) -> &str {
        TEST_RECORD_TYPE
    }
}

impl LeafStorage for TestRecord {
    fn leaf_data(&self) -> RawLeaf {
        self.raw
    }

    fn write_leaf_data(&mut self, leaf: &LeafView) {
        self.raw = RawLeaf {
            depth: Some(leaf.depth()),
            left: Some(leaf.left()),
            right: Some(leaf.right()),
            tree: Some(leaf.tree()),
        };
    }

    fn clear_leaf_data(&mut self) {
        self.raw = RawLeaf::default();
    }
}

pub type BareEngine = TreeEngine<MemoryStore<TestRecord>, NoPolicy>;

/// Engine over an in-memory store with no policy constraints.
pub fn bare_engine() -> BareEngine {
    TreeEngine::new(TEST_RECORD_TYPE, MemoryStore::new(), NoPolicy)
}

/// Insert a fresh record into the engine's store and return it.
pub fn spawn(engine: &mut BareEngine) -> TestRecord {
    let id = engine.store_mut().allocate_id();
    let record = TestRecord::new(id);
    engine
        .store_mut()
        .insert(record.clone())
        .expect("insert test record");
    record
}

/// The persisted leaf view of a record, reloaded from the store.
pub fn stored_leaf<S, P>(engine: &TreeEngine<S, P>, id: RecordId) -> LeafView
where
    S: RecordStore,
    P: TreePolicy<S>,
{
    let record = engine.store().load(id).expect("load record");
    engine
        .leaf_of(&record)
        .expect("read leaf data")
        .expect("record is a tree member")
}

/// Reload a record from the store so the next mutation sees current bounds.
pub fn reload<S, P>(engine: &TreeEngine<S, P>, id: RecordId) -> S::Rec
where
    S: RecordStore,
    P: TreePolicy<S>,
{
    engine.store().load(id).expect("load record")
}

/// Assert the full nested-set invariant set over `tree`.
pub fn assert_tree_invariants<S, P>(engine: &TreeEngine<S, P>, tree: RecordId)
where
    S: RecordStore,
    P: TreePolicy<S>,
{
    engine
        .validate_invariants(tree)
        .expect("nested-set invariants violated");
}

/// Build the four-node reference tree: A roots, B and C are children of A,
/// D is a child of B. Returns the record ids in that order.
pub fn reference_tree(engine: &mut BareEngine) -> [RecordId; 4] {
    let mut a = spawn(engine);
    let mut b = spawn(engine);
    let mut c = spawn(engine);
    let mut d = spawn(engine);

    engine.init_tree(&mut a).expect("init tree");
    engine.add_leaf(&mut a, &mut b).expect("add b");
    let mut a = reload(engine, a.record_id());
    engine.add_leaf(&mut a, &mut c).expect("add c");
    let mut b = reload(engine, b.record_id());
    engine.add_leaf(&mut b, &mut d).expect("add d");

    [
        a.record_id(),
        b.record_id(),
        c.record_id(),
        d.record_id(),
    ]
}

/// Deterministic clock for freshness-policy tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Canned type-hierarchy answers for group-policy tests.
#[derive(Clone, Debug, Default)]
pub struct StaticHierarchy {
    roots: BTreeSet<u64>,
    child_pairs: BTreeSet<(u64, u64)>,
}

impl StaticHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_root(mut self, group_type: RecordId) -> Self {
        self.roots.insert(group_type.0);
        self
    }

    pub fn allow_child(mut self, parent: RecordId, child: RecordId) -> Self {
        self.child_pairs.insert((parent.0, child.0));
        self
    }
}

impl TypeHierarchy for StaticHierarchy {
    fn root_capable(&self, group_type: RecordId) -> subgroup_core::Result<bool> {
        Ok(self.roots.contains(&group_type.0))
    }

    fn allows_child(&self, parent: RecordId, child: RecordId) -> subgroup_core::Result<bool> {
        Ok(self.child_pairs.contains(&(parent.0, child.0)))
    }
}
