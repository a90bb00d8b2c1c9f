use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::RecordId;
use crate::leaf::LeafView;
use crate::store::{Cmp, Filter, LeafStorage, Record, RecordStore, Sort};

/// Precondition hooks layered on the generic tree algebra by the concrete
/// engines. Every hook runs after the structural preconditions and before any
/// write; the defaults allow everything.
pub trait TreePolicy<S: RecordStore> {
    fn check_init(&self, store: &S, record: &S::Rec) -> Result<()> {
        let _ = (store, record);
        Ok(())
    }

    fn check_add(&self, store: &S, parent: &S::Rec, child: &S::Rec) -> Result<()> {
        let _ = (store, parent, child);
        Ok(())
    }

    fn check_remove(&self, store: &S, record: &S::Rec) -> Result<()> {
        let _ = (store, record);
        Ok(())
    }

    /// Whether the backing store can be trusted to sort query results
    /// natively. When false, read queries fetch unsorted and the engine
    /// orders by ascending left bound itself.
    fn native_sort(&self) -> bool {
        true
    }
}

/// Policy that imposes no extra preconditions.
pub struct NoPolicy;

impl<S: RecordStore> TreePolicy<S> for NoPolicy {}

/// Nested-set tree engine over an abstract record store.
///
/// Containment is encoded as paired (left, right) interval bounds: ancestor
/// intervals strictly contain descendant intervals, so vertical-relation and
/// subtree queries never recurse. Structural mutations renumber every record
/// at or beyond the touched interval, which makes them O(tree size) writes.
///
/// The engine performs no locking: callers must ensure at most one structural
/// mutation is in flight per tree at a time, and must pass records reflecting
/// the current persisted state.
pub struct TreeEngine<S, P> {
    record_type: &'static str,
    store: S,
    policy: P,
}

impl<S, P> TreeEngine<S, P>
where
    S: RecordStore,
    P: TreePolicy<S>,
{
    pub fn new(record_type: &'static str, store: S, policy: P) -> Self {
        Self {
            record_type,
            store,
            policy,
        }
    }

    pub fn record_type(&self) -> &'static str {
        self.record_type
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn ensure_managed(&self, record: &S::Rec) -> Result<()> {
        if record.type_id() != self.record_type {
            return Err(Error::UnsupportedType {
                expected: self.record_type.to_string(),
                actual: record.type_id().to_string(),
            });
        }
        Ok(())
    }

    /// Validated leaf view of a record, or `None` when it is cleanly outside
    /// any tree. Partially set leaf fields fail with `MalformedLeaf`.
    pub fn leaf_of(&self, record: &S::Rec) -> Result<Option<LeafView>> {
        self.ensure_managed(record)?;
        LeafView::from_raw(record.leaf_data())
    }

    fn require_leaf(&self, record: &S::Rec) -> Result<LeafView> {
        self.leaf_of(record)?.ok_or_else(|| {
            Error::MalformedLeaf(format!(
                "{} record carries no leaf data",
                self.record_type
            ))
        })
    }

    /// True iff a coherent leaf view can be constructed for the record.
    pub fn is_leaf(&self, record: &S::Rec) -> Result<bool> {
        self.ensure_managed(record)?;
        Ok(matches!(
            LeafView::from_raw(record.leaf_data()),
            Ok(Some(_))
        ))
    }

    /// True iff the record is a leaf at depth zero.
    pub fn is_root(&self, record: &S::Rec) -> Result<bool> {
        self.ensure_managed(record)?;
        Ok(matches!(
            LeafView::from_raw(record.leaf_data()),
            Ok(Some(view)) if view.is_root()
        ))
    }

    /// Strict ancestor/descendant relation between two records, determined
    /// purely from interval containment within one tree. Non-members are
    /// never vertically related to anything.
    pub fn are_vertically_related(&self, a: &S::Rec, b: &S::Rec) -> Result<bool> {
        let (Some(va), Some(vb)) = (self.leaf_of(a)?, self.leaf_of(b)?) else {
            return Ok(false);
        };
        Ok(va.contains(&vb) || vb.contains(&va))
    }

    /// Promote a record to the root of a new tree.
    pub fn init_tree(&mut self, record: &mut S::Rec) -> Result<()> {
        self.ensure_managed(record)?;
        let id = record.id().ok_or_else(|| {
            Error::InvalidRoot("cannot root a record without a durable identity".into())
        })?;
        if self.leaf_of(record)?.is_some() {
            return Err(Error::InvalidRoot(format!(
                "record {} is already a tree member",
                id.0
            )));
        }
        self.policy.check_init(&self.store, record)?;

        let view = LeafView::new(0, 1, 2, id)?;
        record.write_leaf_data(&view);
        self.store.save(record)?;
        debug!(record = id.0, record_type = self.record_type, "initialized tree");
        Ok(())
    }

    /// Insert `child` as the rightmost child of `parent`, renumbering every
    /// record at or beyond the insertion point.
    ///
    /// Ancestors of the parent widen by two to enclose the new interval;
    /// records lying entirely to the right shift by two. Validation runs in
    /// full before the first write.
    pub fn add_leaf(&mut self, parent: &mut S::Rec, child: &mut S::Rec) -> Result<()> {
        self.ensure_managed(parent)?;
        self.ensure_managed(child)?;
        let parent_id = parent.id().ok_or_else(|| {
            Error::InvalidParent("parent record has no durable identity".into())
        })?;
        let parent_view = self.leaf_of(parent)?.ok_or_else(|| {
            Error::InvalidParent(format!("record {} is not a tree member", parent_id.0))
        })?;
        let child_id = child.id().ok_or_else(|| {
            Error::InvalidLeaf("cannot attach a record without a durable identity".into())
        })?;
        if self.leaf_of(child)?.is_some() {
            return Err(Error::InvalidLeaf(format!(
                "record {} is already a tree member",
                child_id.0
            )));
        }
        self.policy.check_add(&self.store, parent, child)?;

        let insert_at = parent_view.right();
        let ids = self.store.query(
            &[
                Filter::Tree(parent_view.tree()),
                Filter::Right(Cmp::Ge, insert_at),
            ],
            None,
        )?;
        let mut affected = self.store.load_many(&ids)?;
        for record in &mut affected {
            if record.id() == Some(parent_id) {
                continue;
            }
            let view = self.member_view(record)?;
            let shifted = if view.left() > insert_at {
                // Entirely right of the insertion point: shift away.
                LeafView::new(view.depth(), view.left() + 2, view.right() + 2, view.tree())?
            } else {
                // Ancestor on the path to the parent: widen to enclose.
                LeafView::new(view.depth(), view.left(), view.right() + 2, view.tree())?
            };
            record.write_leaf_data(&shifted);
        }
        for record in &affected {
            if record.id() == Some(parent_id) {
                continue;
            }
            self.store.save(record)?;
        }

        let widened = LeafView::new(
            parent_view.depth(),
            parent_view.left(),
            insert_at + 2,
            parent_view.tree(),
        )?;
        parent.write_leaf_data(&widened);
        self.store.save(parent)?;

        let leaf = LeafView::new(
            parent_view.depth() + 1,
            insert_at,
            insert_at + 1,
            parent_view.tree(),
        )?;
        child.write_leaf_data(&leaf);
        self.store.save(child)?;
        debug!(
            parent = parent_id.0,
            child = child_id.0,
            tree = parent_view.tree().0,
            "added leaf"
        );
        Ok(())
    }

    /// Detach a childless leaf from its tree, renumbering the records beyond
    /// it. Removing the sole remaining child of a root dissolves the tree
    /// entirely.
    ///
    /// With `save` false the cleared leaf fields of the removed record are
    /// not persisted, so a caller can fold this into an entity delete.
    pub fn remove_leaf(&mut self, record: &mut S::Rec, save: bool) -> Result<()> {
        self.ensure_managed(record)?;
        let view = self.leaf_of(record)?.ok_or_else(|| {
            Error::InvalidLeaf("record is not a tree member".into())
        })?;
        if self.count_descendants(&view)? > 0 {
            return Err(Error::InvalidLeaf(
                "cannot remove a leaf that still has descendants".into(),
            ));
        }
        self.policy.check_remove(&self.store, record)?;

        // A first child at {2,3} may be the root's last member, in which case
        // the whole tree dissolves instead of renumbering.
        if view.left() == 2 && view.right() == 3 {
            let mut root = self.store.load(view.tree())?;
            let root_view = self.member_view(&root)?;
            if root_view.right() == 4 {
                root.clear_leaf_data();
                self.store.save(&root)?;
                record.clear_leaf_data();
                if save {
                    self.store.save(record)?;
                }
                debug!(tree = view.tree().0, "dissolved tree");
                return Ok(());
            }
        }

        let ids = self.store.query(
            &[
                Filter::Tree(view.tree()),
                Filter::Right(Cmp::Gt, view.right()),
            ],
            None,
        )?;
        let mut affected = self.store.load_many(&ids)?;
        for other in &mut affected {
            let v = self.member_view(other)?;
            let shifted = if v.left() > view.right() {
                LeafView::new(v.depth(), v.left() - 2, v.right() - 2, v.tree())?
            } else {
                LeafView::new(v.depth(), v.left(), v.right() - 2, v.tree())?
            };
            other.write_leaf_data(&shifted);
        }
        for other in &affected {
            self.store.save(other)?;
        }

        record.clear_leaf_data();
        if save {
            self.store.save(record)?;
        }
        debug!(tree = view.tree().0, "removed leaf");
        Ok(())
    }

    /// The unique node one level up whose interval contains the record's.
    /// Roots have no parent.
    pub fn get_parent(&self, record: &S::Rec) -> Result<S::Rec> {
        let view = self.require_leaf(record)?;
        if view.is_root() {
            return Err(Error::InvalidRoot(
                "tree roots have no parent".into(),
            ));
        }
        let mut hits = self.query_records(&[
            Filter::Tree(view.tree()),
            Filter::Depth(Cmp::Eq, view.depth() - 1),
            Filter::Left(Cmp::Lt, view.left()),
            Filter::Right(Cmp::Gt, view.right()),
        ])?;
        if hits.len() != 1 {
            return Err(Error::InconsistentState(format!(
                "expected exactly one parent, found {}",
                hits.len()
            )));
        }
        Ok(hits.remove(0))
    }

    /// All ancestors, ordered root first down to the immediate parent.
    pub fn get_ancestors(&self, record: &S::Rec) -> Result<Vec<S::Rec>> {
        let view = self.require_leaf(record)?;
        self.query_records(&[
            Filter::Tree(view.tree()),
            Filter::Left(Cmp::Lt, view.left()),
            Filter::Right(Cmp::Gt, view.right()),
        ])
    }

    /// Direct children, ordered by ascending left bound.
    pub fn get_children(&self, record: &S::Rec) -> Result<Vec<S::Rec>> {
        let view = self.require_leaf(record)?;
        self.query_records(&[
            Filter::Tree(view.tree()),
            Filter::Depth(Cmp::Eq, view.depth() + 1),
            Filter::Left(Cmp::Gt, view.left()),
            Filter::Right(Cmp::Lt, view.right()),
        ])
    }

    /// The full subtree below the record, any depth, ordered by ascending
    /// left bound.
    pub fn get_descendants(&self, record: &S::Rec) -> Result<Vec<S::Rec>> {
        let view = self.require_leaf(record)?;
        self.query_records(&[
            Filter::Tree(view.tree()),
            Filter::Left(Cmp::Gt, view.left()),
            Filter::Right(Cmp::Lt, view.right()),
        ])
    }

    pub fn has_descendants(&self, record: &S::Rec) -> Result<bool> {
        let view = self.require_leaf(record)?;
        Ok(self.count_descendants(&view)? > 0)
    }

    /// Stable identifier for invalidating cached reads of the whole tree
    /// after a structural mutation.
    pub fn tree_cache_key(&self, record: &S::Rec) -> Result<String> {
        let view = self.require_leaf(record)?;
        Ok(format!(
            "subgroup:tree:{}:{}",
            self.record_type,
            view.tree().0
        ))
    }

    /// Walk every record of `tree` and check the full nested-set invariant
    /// set. Intended for tests and debugging.
    pub fn validate_invariants(&self, tree: RecordId) -> Result<()> {
        let records = self.query_records(&[Filter::Tree(tree)])?;
        if records.is_empty() {
            // A dissolved tree has no members left.
            return Ok(());
        }

        let mut views = Vec::with_capacity(records.len());
        for record in &records {
            views.push((record.id(), self.member_view(record)?));
        }

        let root = views
            .iter()
            .find(|(id, _)| *id == Some(tree))
            .ok_or_else(|| Error::InconsistentState("tree has no root record".into()))?;
        if !root.1.is_root() || root.1.left() != 1 {
            return Err(Error::InconsistentState(
                "root must sit at depth 0 with left bound 1".into(),
            ));
        }

        for (i, (_, a)) in views.iter().enumerate() {
            if (a.right() - a.left()) % 2 == 0 {
                return Err(Error::InconsistentState(format!(
                    "interval [{}, {}] has even width",
                    a.left(),
                    a.right()
                )));
            }
            for (_, b) in views.iter().skip(i + 1) {
                let disjoint = a.right() < b.left() || b.right() < a.left();
                if !(disjoint || a.contains(b) || b.contains(a)) {
                    return Err(Error::InconsistentState(format!(
                        "intervals [{}, {}] and [{}, {}] overlap without nesting",
                        a.left(),
                        a.right(),
                        b.left(),
                        b.right()
                    )));
                }
            }
            if !a.is_root() {
                let parents = views
                    .iter()
                    .filter(|(_, p)| p.contains(a) && p.depth() + 1 == a.depth())
                    .count();
                if parents != 1 {
                    return Err(Error::InconsistentState(format!(
                        "leaf [{}, {}] has {} parents",
                        a.left(),
                        a.right(),
                        parents
                    )));
                }
            }
        }
        Ok(())
    }

    fn count_descendants(&self, view: &LeafView) -> Result<u64> {
        self.store.count(&[
            Filter::Tree(view.tree()),
            Filter::Left(Cmp::Gt, view.left()),
            Filter::Right(Cmp::Lt, view.right()),
        ])
    }

    /// A record produced by a tree query must carry coherent leaf data.
    fn member_view(&self, record: &S::Rec) -> Result<LeafView> {
        LeafView::from_raw(record.leaf_data())?.ok_or_else(|| {
            Error::InconsistentState("tree query returned a record without leaf data".into())
        })
    }

    fn query_records(&self, filters: &[Filter]) -> Result<Vec<S::Rec>> {
        if self.policy.native_sort() {
            let ids = self.store.query(filters, Some(Sort::LeftAsc))?;
            self.store.load_many(&ids)
        } else {
            // Store-side ordering is unreliable for this layout; fetch
            // unsorted and order by ascending left bound here.
            let ids = self.store.query(filters, None)?;
            let mut records = self.store.load_many(&ids)?;
            records.sort_by_key(|r| r.leaf_data().left.unwrap_or(0));
            Ok(records)
        }
    }
}
