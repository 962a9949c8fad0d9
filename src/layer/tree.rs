//! Per-tree storage and the root lock.
//!
//! Every layer tree owns one [`LayerArena`] behind a `parking_lot` mutex; that
//! mutex is the tree's root lock. Client handles point at their tree through
//! a [`TreeRef`] that is repointed whenever a subtree moves between arenas, so
//! locking retries until the handle's tree is stable.

use crate::layer::node::{LayerId, LayerNode};
use crate::layer::stage::StageState;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

pub(crate) type TreeCell = Mutex<LayerArena>;
pub(crate) type TreeGuard = ArcMutexGuard<RawMutex, LayerArena>;

/// Mutable pointer from a handle (or surface) to the tree it currently lives in.
#[derive(Debug)]
pub(crate) struct TreeRef(Mutex<Arc<TreeCell>>);

impl TreeRef {
    pub(crate) fn new(tree: Arc<TreeCell>) -> Self {
        Self(Mutex::new(tree))
    }

    pub(crate) fn current(&self) -> Arc<TreeCell> {
        Arc::clone(&self.0.lock())
    }

    pub(crate) fn set(&self, tree: Arc<TreeCell>) {
        *self.0.lock() = tree;
    }

    fn points_at(&self, tree: &Arc<TreeCell>) -> bool {
        Arc::ptr_eq(&self.0.lock(), tree)
    }

    /// Acquire the root lock of the tree this reference points at.
    pub(crate) fn lock(&self) -> TreeGuard {
        loop {
            let tree = self.current();
            let guard = tree.lock_arc();
            if self.points_at(&tree) {
                return guard;
            }
        }
    }
}

/// Client-side anchor of a runtime layer.
#[derive(Debug)]
pub(crate) struct LayerSlot {
    pub(crate) id: LayerId,
    pub(crate) tree: TreeRef,
}

/// Root locks of two trees, or one lock when both sides share a tree.
pub(crate) enum PairGuard {
    Same(TreeGuard),
    Split { first: TreeGuard, second: TreeGuard },
}

impl PairGuard {
    /// Arena of the first reference and, when different, the second one's.
    pub(crate) fn split(&mut self) -> (&mut LayerArena, Option<&mut LayerArena>) {
        match self {
            Self::Same(g) => (&mut **g, None),
            Self::Split { first, second } => (&mut **first, Some(&mut **second)),
        }
    }
}

/// Lock the trees behind `a` and `b`, in address order.
pub(crate) fn lock_pair(a: &TreeRef, b: &TreeRef) -> PairGuard {
    loop {
        let ta = a.current();
        let tb = b.current();
        if Arc::ptr_eq(&ta, &tb) {
            let guard = ta.lock_arc();
            if a.points_at(&ta) && b.points_at(&ta) {
                return PairGuard::Same(guard);
            }
            continue;
        }
        let (ga, gb) = if Arc::as_ptr(&ta) < Arc::as_ptr(&tb) {
            let ga = ta.lock_arc();
            (ga, tb.lock_arc())
        } else {
            let gb = tb.lock_arc();
            (ta.lock_arc(), gb)
        };
        if a.points_at(&ta) && b.points_at(&tb) {
            return PairGuard::Split {
                first: ga,
                second: gb,
            };
        }
    }
}

/// Proof that the current thread holds a tree's root lock.
///
/// GPU-submitting functions take one, so the device context lock can only be
/// acquired after the root lock.
pub(crate) struct RootToken<'a> {
    _arena: PhantomData<&'a LayerArena>,
}

/// Storage of one layer tree.
#[derive(Debug)]
pub(crate) struct LayerArena {
    nodes: HashMap<LayerId, LayerNode>,
    this: Weak<TreeCell>,
    stage: Option<LayerId>,
}

impl LayerArena {
    pub(crate) fn new_tree() -> Arc<TreeCell> {
        Arc::new_cyclic(|this| {
            Mutex::new(Self {
                nodes: HashMap::new(),
                this: this.clone(),
                stage: None,
            })
        })
    }

    /// Build a new tree with `build` and return a handle to the layer it yields.
    pub(crate) fn plant_with(build: impl FnOnce(&mut LayerArena) -> LayerId) -> Arc<LayerSlot> {
        let tree = Self::new_tree();
        let mut arena = tree.lock();
        let id = build(&mut arena);
        let slot = Arc::new(LayerSlot {
            id,
            tree: TreeRef::new(Arc::clone(&tree)),
        });
        arena.node_mut(id).handle = Arc::downgrade(&slot);
        drop(arena);
        slot
    }

    pub(crate) fn token(&self) -> RootToken<'_> {
        RootToken {
            _arena: PhantomData,
        }
    }

    pub(crate) fn contains_node(&self, id: LayerId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn node(&self, id: LayerId) -> &LayerNode {
        &self.nodes[&id]
    }

    pub(crate) fn node_mut(&mut self, id: LayerId) -> &mut LayerNode {
        self.nodes.get_mut(&id).unwrap_or_else(|| unreachable!("layer {id:?} not in tree"))
    }

    pub(crate) fn insert(&mut self, node: LayerNode) {
        if node.is_stage() {
            self.stage = Some(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn stage_id(&self) -> Option<LayerId> {
        self.stage
    }

    pub(crate) fn stage(&self) -> Option<&StageState> {
        let id = self.stage?;
        self.node(id).composition()?.stage.as_deref()
    }

    pub(crate) fn stage_mut(&mut self) -> Option<&mut StageState> {
        let id = self.stage?;
        self.node_mut(id).composition_mut()?.stage.as_deref_mut()
    }

    /// Client handle for `id`, reusing a live one when possible.
    pub(crate) fn handle(&mut self, id: LayerId) -> Option<Arc<LayerSlot>> {
        let node = self.nodes.get_mut(&id)?;
        if let Some(slot) = node.handle.upgrade() {
            return Some(slot);
        }
        let slot = Arc::new(LayerSlot {
            id,
            tree: TreeRef::new(self.this.upgrade()?),
        });
        node.handle = Arc::downgrade(&slot);
        Some(slot)
    }

    /// `id` followed by its matte and every descendant.
    pub(crate) fn subtree(&self, id: LayerId) -> Vec<LayerId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            let node = self.node(next);
            if let Some(matte) = node.track_matte {
                stack.push(matte);
            }
            stack.extend(node.children().iter().copied());
        }
        out
    }

    /// Remove the detached subtree rooted at `id` from this arena.
    pub(crate) fn extract(&mut self, id: LayerId) -> Vec<LayerNode> {
        let ids = self.subtree(id);
        let mut out = Vec::with_capacity(ids.len());
        for i in ids {
            if let Some(node) = self.nodes.remove(&i) {
                out.push(node);
            }
        }
        out
    }

    /// Take ownership of nodes extracted from another arena.
    pub(crate) fn adopt(&mut self, nodes: Vec<LayerNode>) {
        let tree = self.this.upgrade();
        for node in nodes {
            if let (Some(slot), Some(tree)) = (node.handle.upgrade(), tree.as_ref()) {
                slot.tree.set(Arc::clone(tree));
            }
            self.insert(node);
        }
    }

    /// Move the detached subtree rooted at `id` into a tree of its own.
    pub(crate) fn detach_to_fresh(&mut self, id: LayerId) -> Arc<TreeCell> {
        let nodes = self.extract(id);
        let tree = Self::new_tree();
        tree.lock().adopt(nodes);
        tree
    }
}
