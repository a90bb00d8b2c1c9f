use subgroup_core::{
    Error, Group, GroupTreeEngine, GroupTreePolicy, GroupType, GroupTypeTreeEngine, MemoryStore,
    RecordId,
};
use subgroup_test_support::{FixedClock, StaticHierarchy};

const NOW: u64 = 1_000_000;

const TYPE_X: RecordId = RecordId(101);
const TYPE_Y: RecordId = RecordId(102);

fn engine_with(
    hierarchy: StaticHierarchy,
) -> GroupTreeEngine<MemoryStore<Group>, StaticHierarchy, FixedClock> {
    GroupTreeEngine::for_groups(
        MemoryStore::new(),
        GroupTreePolicy::new(hierarchy, FixedClock(NOW)),
    )
}

fn saved_group(
    engine: &mut GroupTreeEngine<MemoryStore<Group>, StaticHierarchy, FixedClock>,
    group_type: RecordId,
    created: u64,
) -> Group {
    let id = engine.store_mut().allocate_id();
    let group = Group::new(id, group_type, created);
    engine.store_mut().insert(group.clone()).unwrap();
    group
}

#[test]
fn init_requires_a_root_capable_type() {
    let mut engine = engine_with(StaticHierarchy::new().allow_root(TYPE_X));

    let mut rooted = saved_group(&mut engine, TYPE_X, NOW);
    engine.init_tree(&mut rooted).unwrap();

    let mut denied = saved_group(&mut engine, TYPE_Y, NOW);
    assert!(matches!(
        engine.init_tree(&mut denied),
        Err(Error::InvalidRoot(_))
    ));
}

#[test]
fn add_requires_the_declared_child_type() {
    let hierarchy = StaticHierarchy::new()
        .allow_root(TYPE_X)
        .allow_child(TYPE_X, TYPE_Y);
    let mut engine = engine_with(hierarchy);

    let mut parent = saved_group(&mut engine, TYPE_X, NOW);
    engine.init_tree(&mut parent).unwrap();

    let mut fits = saved_group(&mut engine, TYPE_Y, NOW);
    engine.add_leaf(&mut parent, &mut fits).unwrap();

    // TYPE_X does not declare itself as a child type.
    let mut mismatched = saved_group(&mut engine, TYPE_X, NOW);
    assert!(matches!(
        engine.add_leaf(&mut parent, &mut mismatched),
        Err(Error::InvalidParent(_))
    ));
}

#[test]
fn only_fresh_groups_may_join() {
    let hierarchy = StaticHierarchy::new()
        .allow_root(TYPE_X)
        .allow_child(TYPE_X, TYPE_Y);
    let mut engine = engine_with(hierarchy);

    let mut parent = saved_group(&mut engine, TYPE_X, NOW - 5_000);
    engine.init_tree(&mut parent).unwrap();

    let mut stale = saved_group(&mut engine, TYPE_Y, NOW - 120);
    assert!(matches!(
        engine.add_leaf(&mut parent, &mut stale),
        Err(Error::InvalidLeaf(_))
    ));

    let mut fresh = saved_group(&mut engine, TYPE_Y, NOW - 10);
    engine.add_leaf(&mut parent, &mut fresh).unwrap();
}

#[test]
fn freshness_window_is_tunable() {
    let hierarchy = StaticHierarchy::new()
        .allow_root(TYPE_X)
        .allow_child(TYPE_X, TYPE_Y);
    let policy = GroupTreePolicy::new(hierarchy, FixedClock(NOW)).with_freshness_window(600);
    let mut engine = GroupTreeEngine::for_groups(MemoryStore::new(), policy);

    let id = engine.store_mut().allocate_id();
    let mut parent = Group::new(id, TYPE_X, NOW);
    engine.store_mut().insert(parent.clone()).unwrap();
    engine.init_tree(&mut parent).unwrap();

    let id = engine.store_mut().allocate_id();
    let mut child = Group::new(id, TYPE_Y, NOW - 120);
    engine.store_mut().insert(child.clone()).unwrap();
    engine.add_leaf(&mut parent, &mut child).unwrap();
}

#[test]
fn a_real_type_tree_backs_the_hierarchy() {
    // Type level: X roots a tree and Y is its child.
    let mut types = MemoryStore::new();
    let mut x = GroupType::new(TYPE_X);
    let mut y = GroupType::new(TYPE_Y);
    types.insert(x.clone()).unwrap();
    types.insert(y.clone()).unwrap();
    let mut type_engine = GroupTypeTreeEngine::for_group_types(types, MemoryStore::<Group>::new());
    type_engine.init_tree(&mut x).unwrap();
    type_engine.add_leaf(&mut x, &mut y).unwrap();

    // Group level borrows the type engine for compatibility checks.
    let policy = GroupTreePolicy::new(&type_engine, FixedClock(NOW));
    let mut engine = GroupTreeEngine::for_groups(MemoryStore::new(), policy);

    let parent_id = engine.store_mut().allocate_id();
    let mut parent = Group::new(parent_id, TYPE_X, NOW);
    engine.store_mut().insert(parent.clone()).unwrap();
    engine.init_tree(&mut parent).unwrap();

    let child_id = engine.store_mut().allocate_id();
    let mut child = Group::new(child_id, TYPE_Y, NOW);
    engine.store_mut().insert(child.clone()).unwrap();
    engine.add_leaf(&mut parent, &mut child).unwrap();

    // The child type cannot root a tree of its own.
    let other_id = engine.store_mut().allocate_id();
    let mut other = Group::new(other_id, TYPE_Y, NOW);
    engine.store_mut().insert(other.clone()).unwrap();
    assert!(matches!(
        engine.init_tree(&mut other),
        Err(Error::InvalidRoot(_))
    ));
}
