//! Disposal properties over random scope trees.
//!
//! - Disposing a node disposes exactly its subtree
//! - Ancestors and unrelated branches stay live
//! - Registered items in the subtree are released exactly once

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nebula_guard::prelude::*;
use proptest::prelude::*;

struct Counted(AtomicUsize);

impl Dispose for Counted {
    fn dispose(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

// ---------------------------------------------------------------------------
// Strategy: a tree as a list of parent indices
// ---------------------------------------------------------------------------

/// `parents[i]` is the parent of node `i + 1`; node 0 is the tree's top.
fn arb_tree() -> impl Strategy<Value = Vec<usize>> {
    (1usize..24).prop_flat_map(|len| {
        (0..len)
            .map(|i| 0..=i)
            .collect::<Vec<_>>()
    })
}

struct Tree {
    scopes: Vec<Scope>,
    items: Vec<Arc<Counted>>,
    parents: Vec<Option<usize>>,
}

impl Tree {
    fn build(parents: &[usize]) -> Self {
        let top = nebula_guard::begin_scope(None).unwrap();
        let mut scopes = vec![top];
        let mut links = vec![None];
        for &parent in parents {
            let child = scopes[parent].begin_scope(None).unwrap();
            scopes.push(child);
            links.push(Some(parent));
        }

        let items: Vec<_> = scopes
            .iter()
            .map(|scope| {
                let item = Arc::new(Counted(AtomicUsize::new(0)));
                scope.register(item.clone()).unwrap();
                item
            })
            .collect();

        Self {
            scopes,
            items,
            parents: links,
        }
    }

    fn is_descendant(&self, mut node: usize, ancestor: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parents[node] {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

proptest! {
    #[test]
    fn dispose_covers_exactly_the_subtree(
        parents in arb_tree(),
        pick in any::<prop::sample::Index>(),
    ) {
        let tree = Tree::build(&parents);
        let target = pick.index(tree.scopes.len());

        tree.scopes[target].dispose();
        tree.scopes[target].dispose();

        for (node, scope) in tree.scopes.iter().enumerate() {
            let inside = tree.is_descendant(node, target);
            prop_assert_eq!(scope.is_disposed(), inside, "node {} target {}", node, target);
            let released = tree.items[node].0.load(Ordering::SeqCst);
            prop_assert_eq!(released, usize::from(inside), "node {} released {} times", node, released);
        }

        tree.scopes[0].dispose();
    }

    #[test]
    fn observers_never_leak_between_nodes(
        parents in arb_tree(),
        pick in any::<prop::sample::Index>(),
    ) {
        let top = nebula_guard::begin_scope(None).unwrap();
        let mut scopes = vec![top];
        let mut counters = vec![Arc::new(AtomicUsize::new(0))];
        for &parent in &parents {
            let counter = Arc::new(AtomicUsize::new(0));
            let sink = Arc::clone(&counter);
            let child = scopes[parent]
                .begin_scope(Some(observer(move |_| {
                    sink.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })))
                .unwrap();
            scopes.push(child);
            counters.push(counter);
        }

        let target = pick.index(scopes.len());
        let _ = scopes[target].argument(0).unwrap().min(1);

        for (node, counter) in counters.iter().enumerate() {
            let expected = usize::from(node == target && node != 0);
            prop_assert_eq!(counter.load(Ordering::SeqCst), expected);
        }

        scopes[0].dispose();
    }
}
