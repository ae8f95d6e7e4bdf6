use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::binding::Scope;
use crate::error::Error;
use crate::helpers::Instance;
use crate::key::Key;

/// Owns the singleton instance cache.
///
/// The map lock is only held to fetch a key's cell, never while a producer runs.
/// A failed producer leaves the cell empty.
#[derive(Debug, Default)]
pub struct ScopeManager {
    slots: Mutex<HashMap<Key, Arc<OnceCell<Instance>>>>,
    constructing: Mutex<HashMap<ThreadId, Vec<Key>>>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance for `key`, running `producer` if the scope requires a new one.
    ///
    /// Re-entering a key whose producer is still running on the same thread is a
    /// [`Error::Cycle`].
    pub fn get_or_create<F>(&self, key: &Key, scope: Scope, producer: F) -> Result<Instance, Error>
    where
        F: FnOnce() -> Result<Instance, Error>,
    {
        match scope {
            Scope::Prototype => {
                let _construction = self.enter(key)?;
                producer()
            }
            Scope::Singleton => {
                let slot = self.slot(key);
                if let Some(instance) = slot.get() {
                    trace!(key = %key, "singleton cache hit");
                    return Ok(instance.clone());
                }
                let _construction = self.enter(key)?;
                slot.get_or_try_init(|| {
                    debug!(key = %key, "constructing singleton");
                    producer()
                })
                .map(Arc::clone)
            }
        }
    }

    pub fn cached(&self, key: &Key) -> Option<Instance> {
        self.slots
            .lock()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of constructed singletons.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached instance. Constructions in flight are not cached.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        debug!(slots = slots.len(), "clearing instance cache");
        slots.clear();
    }

    fn slot(&self, key: &Key) -> Arc<OnceCell<Instance>> {
        self.slots.lock().entry(key.clone()).or_default().clone()
    }

    fn enter(&self, key: &Key) -> Result<Construction<'_>, Error> {
        let thread = thread::current().id();
        let mut constructing = self.constructing.lock();
        let stack = constructing.entry(thread).or_default();
        if let Some(start) = stack.iter().position(|k| k == key) {
            debug!(key = %key, "re-entered a key under construction");
            return Err(Error::Cycle {
                cycle: stack[start..].to_vec().into(),
            });
        }
        stack.push(key.clone());
        Ok(Construction {
            scopes: self,
            thread,
        })
    }
}

struct Construction<'a> {
    scopes: &'a ScopeManager,
    thread: ThreadId,
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        let mut constructing = self.scopes.constructing.lock();
        if let Some(stack) = constructing.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                constructing.remove(&self.thread);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn produce(calls: &AtomicUsize) -> Result<Instance, Error> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(calls.load(Ordering::SeqCst)))
    }

    #[test]
    fn singleton_created_once() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);

        let a = scopes.get_or_create(&key, Scope::Singleton, || produce(&calls)).unwrap();
        let b = scopes.get_or_create(&key, Scope::Singleton, || produce(&calls)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scopes.len(), 1);
    }

    #[test]
    fn prototype_never_cached() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);

        let a = scopes.get_or_create(&key, Scope::Prototype, || produce(&calls)).unwrap();
        let b = scopes.get_or_create(&key, Scope::Prototype, || produce(&calls)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(scopes.cached(&key).is_none());
    }

    #[test]
    fn failure_leaves_no_entry() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);

        let failed = scopes.get_or_create(&key, Scope::Singleton, || {
            Err(Error::provider(&key, anyhow::anyhow!("boom")))
        });
        assert!(matches!(failed, Err(Error::Provider { .. })));
        assert!(scopes.cached(&key).is_none());

        scopes.get_or_create(&key, Scope::Singleton, || produce(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scopes.cached(&key).is_some());
    }

    #[test]
    fn concurrent_first_calls_share_one_instance() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let instances: Vec<Instance> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        scopes
                            .get_or_create(&key, Scope::Singleton, || {
                                thread::sleep(Duration::from_millis(20));
                                produce(&calls)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn reentrant_construction_is_a_cycle() {
        let scopes = ScopeManager::new();
        let a = Key::named::<usize>("a");
        let b = Key::named::<usize>("b");

        let result = scopes.get_or_create(&a, Scope::Singleton, || {
            scopes.get_or_create(&b, Scope::Prototype, || {
                scopes.get_or_create(&a, Scope::Singleton, || Ok(Arc::new(0usize) as Instance))
            })
        });
        match result {
            Err(Error::Cycle { cycle }) => assert_eq!(cycle, vec![a.clone(), b.clone()]),
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(scopes.cached(&a).is_none());

        let calls = AtomicUsize::new(0);
        scopes.get_or_create(&a, Scope::Singleton, || produce(&calls)).unwrap();
        scopes.get_or_create(&b, Scope::Prototype, || produce(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_key_on_other_threads_is_not_a_cycle() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);

        let outer = scopes
            .get_or_create(&key, Scope::Prototype, || {
                thread::scope(|s| {
                    s.spawn(|| scopes.get_or_create(&key, Scope::Prototype, || produce(&calls)))
                        .join()
                        .unwrap()
                })
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outer.downcast_ref::<usize>(), Some(&1));
    }

    #[test]
    fn clear_drops_cache() {
        let scopes = ScopeManager::new();
        let key = Key::of::<usize>();
        let calls = AtomicUsize::new(0);

        scopes.get_or_create(&key, Scope::Singleton, || produce(&calls)).unwrap();
        scopes.clear();
        assert!(scopes.is_empty());
        scopes.get_or_create(&key, Scope::Singleton, || produce(&calls)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
