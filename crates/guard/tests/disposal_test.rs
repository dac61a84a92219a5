//! Scope tree disposal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use nebula_guard::prelude::*;
use nebula_guard::{GuardConfig, begin_scope};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

struct Resource {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    released: AtomicBool,
}

impl Resource {
    fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            released: AtomicBool::new(false),
        })
    }
}

impl Dispose for Resource {
    fn dispose(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.log.lock().push(self.name);
        }
    }

    fn is_disposed(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

#[test]
fn test_dispose_is_idempotent() {
    let scope = begin_scope(None).unwrap();
    scope.dispose();
    scope.dispose();
    assert!(scope.is_disposed());
}

#[test]
fn test_children_released_last_created_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let scope = begin_scope(None).unwrap();

    let first = scope.begin_scope(None).unwrap();
    first.register(Resource::new("first", &log)).unwrap();
    let second = scope.begin_scope(None).unwrap();
    second.register(Resource::new("second", &log)).unwrap();
    scope.register(Resource::new("own", &log)).unwrap();

    scope.dispose();
    assert_eq!(*log.lock(), vec!["own", "second", "first"]);
}

#[test]
fn test_dispose_reaches_every_depth() {
    let top = begin_scope(None).unwrap();
    let mut chain = vec![top.clone()];
    for _ in 0..10 {
        let next = chain.last().unwrap().begin_scope(None).unwrap();
        chain.push(next);
    }

    top.dispose();
    assert!(chain.iter().all(Scope::is_disposed));
}

#[test]
fn test_disposing_child_leaves_parent_usable() {
    let parent = begin_scope(None).unwrap();
    let child = parent.begin_scope(None).unwrap();
    child.dispose();

    assert!(!parent.is_disposed());
    assert!(parent.begin_scope(None).is_ok());
    assert!(parent.argument(1).unwrap().min(0).is_ok());
}

#[test]
fn test_every_operation_fails_after_dispose() {
    let scope = begin_scope(None).unwrap();
    let arg = scope.argument("x").unwrap();
    scope.dispose();

    assert_eq!(scope.begin_scope(None).unwrap_err().scope_id(), scope.id());
    assert!(scope.argument(1).is_err());
    assert!(scope.observer().is_err());
    assert!(arg.scope().is_err());
    assert!(arg.not_empty().unwrap_err().is_disposed());
    assert!(arg.ensure_live().unwrap_err().is_disposed());
}

#[test]
fn test_guard_disposes_on_every_exit_path() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let scope = begin_scope(None).unwrap();
    let handle = scope.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let guard = scope.into_guard();
        guard.register(Resource::new("held", &log)).unwrap();
        panic!("unwinding");
    }));

    assert!(result.is_err());
    assert!(handle.is_disposed());
    assert_eq!(*log.lock(), vec!["held"]);
}

#[test]
fn test_concurrent_begin_and_dispose() {
    let parent = begin_scope(None).unwrap();
    let spawned = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let parent = parent.clone();
            let spawned = Arc::clone(&spawned);
            thread::spawn(move || {
                for _ in 0..50 {
                    match parent.begin_scope(None) {
                        Ok(child) => spawned.lock().push(child),
                        Err(err) => assert_eq!(err.scope_id(), parent.id()),
                    }
                }
            })
        })
        .collect();

    parent.dispose();
    for handle in handles {
        handle.join().unwrap();
    }

    // Whatever was created before or during teardown is gone too.
    assert!(spawned.lock().iter().all(Scope::is_disposed));
}

/// Holds the teardown open until the test thread has arrived.
struct Slow {
    arrived: Arc<Barrier>,
    released: AtomicBool,
}

impl Dispose for Slow {
    fn dispose(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.arrived.wait();
            thread::sleep(Duration::from_millis(100));
        }
    }

    fn is_disposed(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

#[test]
fn test_second_dispose_waits_for_teardown() {
    let scope = begin_scope(None).unwrap();
    let child = scope.begin_scope(None).unwrap();
    let arg = child.argument(1).unwrap();
    let arrived = Arc::new(Barrier::new(2));
    scope
        .register(Arc::new(Slow {
            arrived: Arc::clone(&arrived),
            released: AtomicBool::new(false),
        }))
        .unwrap();

    let first = {
        let scope = scope.clone();
        thread::spawn(move || scope.dispose())
    };
    arrived.wait();
    scope.dispose();

    assert!(scope.is_disposed());
    assert!(child.is_disposed());
    assert!(arg.min(0).unwrap_err().is_disposed());
    first.join().unwrap();
}

#[test]
fn test_disposed_children_are_compacted() {
    GuardConfig::default().with_compaction_threshold(8).install();

    let parent = begin_scope(None).unwrap();
    for _ in 0..100 {
        parent.begin_scope(None).unwrap().dispose();
    }
    assert!(parent.child_count() <= 8);

    GuardConfig::default().install();
}
