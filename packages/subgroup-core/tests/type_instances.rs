use subgroup_core::{
    Error, Group, GroupType, GroupTypeTreeEngine, MemoryStore, Record, RecordId, RecordStore,
};
use subgroup_test_support::assert_tree_invariants;

const NOW: u64 = 1_000_000;

fn type_store(ids: &[u64]) -> MemoryStore<GroupType> {
    let mut store = MemoryStore::new();
    for id in ids {
        store.insert(GroupType::new(RecordId(*id))).unwrap();
    }
    store
}

#[test]
fn types_with_live_groups_cannot_join_or_leave() {
    let types = type_store(&[1, 2]);
    let mut groups = MemoryStore::<Group>::new();
    let group_id = groups.allocate_id();
    groups
        .insert(Group::new(group_id, RecordId(2), NOW))
        .unwrap();

    let mut engine = GroupTypeTreeEngine::for_group_types(types, groups.clone());
    let mut root = engine.store().load(RecordId(1)).unwrap();
    engine.init_tree(&mut root).unwrap();

    // Type 2 still has a live group, so it cannot join.
    let mut blocked = engine.store().load(RecordId(2)).unwrap();
    assert!(matches!(
        engine.add_leaf(&mut root, &mut blocked),
        Err(Error::InvalidLeaf(_))
    ));

    // Once the group is gone, the same call goes through.
    let mut emptied = groups;
    emptied.remove(group_id);
    let mut engine = GroupTypeTreeEngine::for_group_types(engine.store().clone(), emptied.clone());
    let mut root = engine.store().load(RecordId(1)).unwrap();
    let mut joined = engine.store().load(RecordId(2)).unwrap();
    engine.add_leaf(&mut root, &mut joined).unwrap();
    assert_tree_invariants(&engine, RecordId(1));

    // Leaving is gated the same way.
    let mut repopulated = emptied;
    let id = repopulated.allocate_id();
    repopulated.insert(Group::new(id, RecordId(2), NOW)).unwrap();
    let mut engine = GroupTypeTreeEngine::for_group_types(engine.store().clone(), repopulated);
    let mut leaving = engine.store().load(RecordId(2)).unwrap();
    assert!(matches!(
        engine.remove_leaf(&mut leaving, true),
        Err(Error::InvalidLeaf(_))
    ));
}

#[test]
fn read_queries_order_by_left_despite_unsorted_storage() {
    let types = type_store(&[1, 2, 3, 4]);
    let mut engine = GroupTypeTreeEngine::for_group_types(types, MemoryStore::<Group>::new());

    let mut a = engine.store().load(RecordId(1)).unwrap();
    let mut b = engine.store().load(RecordId(2)).unwrap();
    let mut c = engine.store().load(RecordId(3)).unwrap();
    engine.init_tree(&mut a).unwrap();
    engine.add_leaf(&mut a, &mut b).unwrap();
    let mut a = engine.store().load(RecordId(1)).unwrap();
    engine.add_leaf(&mut a, &mut c).unwrap();
    let mut b = engine.store().load(RecordId(2)).unwrap();
    let mut d = engine.store().load(RecordId(4)).unwrap();
    engine.add_leaf(&mut b, &mut d).unwrap();

    // Id order would be [2, 3, 4]; left order interleaves the subtree.
    let root = engine.store().load(RecordId(1)).unwrap();
    let descendants: Vec<_> = engine
        .get_descendants(&root)
        .unwrap()
        .iter()
        .filter_map(|r| r.id())
        .collect();
    assert_eq!(
        descendants,
        vec![RecordId(2), RecordId(4), RecordId(3)]
    );

    let leaf = engine.store().load(RecordId(4)).unwrap();
    let ancestors: Vec<_> = engine
        .get_ancestors(&leaf)
        .unwrap()
        .iter()
        .filter_map(|r| r.id())
        .collect();
    assert_eq!(ancestors, vec![RecordId(1), RecordId(2)]);

    assert_tree_invariants(&engine, RecordId(1));
}

#[test]
fn settings_bag_round_trips_through_the_store() {
    let types = type_store(&[1, 2]);
    let mut engine = GroupTypeTreeEngine::for_group_types(types, MemoryStore::<Group>::new());

    let mut root = engine.store().load(RecordId(1)).unwrap();
    let mut child = engine.store().load(RecordId(2)).unwrap();
    engine.init_tree(&mut root).unwrap();
    engine.add_leaf(&mut root, &mut child).unwrap();

    let stored = engine.store().load(RecordId(2)).unwrap();
    let view = engine.leaf_of(&stored).unwrap().unwrap();
    assert_eq!((view.depth(), view.left(), view.right()), (1, 2, 3));
    assert_eq!(view.tree(), RecordId(1));

    let mut gone = engine.store().load(RecordId(2)).unwrap();
    engine.remove_leaf(&mut gone, true).unwrap();
    let cleared = engine.store().load(RecordId(2)).unwrap();
    assert!(!engine.is_leaf(&cleared).unwrap());
}
