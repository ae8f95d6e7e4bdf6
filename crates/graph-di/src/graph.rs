//! Turns a sealed [`Registry`] and a set of root keys into an ordered construction plan.
//!
//! Keys are emitted depth-first, post-order: every key in a [`Plan`] comes after
//! everything it depends on, and only the closure of the roots is visited.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::binding::Binding;
use crate::error::Error;
use crate::injector::{Inherited, Injector};
use crate::key::Key;
use crate::registry::Registry;

/// Keys paired with their bindings, safe to construct left to right.
#[derive(Debug, Clone)]
pub struct Plan {
    roots: Vec<Key>,
    steps: Vec<(Key, Binding)>,
    slots: HashMap<Key, Key>,
}

impl Plan {
    pub fn roots(&self) -> &[Key] {
        &self.roots
    }

    pub fn steps(&self) -> &[(Key, Binding)] {
        &self.steps
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.steps.iter().map(|(key, _)| key)
    }

    pub fn position(&self, key: &Key) -> Option<usize> {
        self.steps.iter().position(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The key `key`'s instance is cached and memoized under.
    pub(crate) fn slot<'a>(&'a self, key: &'a Key) -> &'a Key {
        self.slots.get(key).unwrap_or(key)
    }
}

enum Mark {
    InProgress,
    Done,
}

struct Frame {
    key: Key,
    slot: Key,
    binding: Binding,
    next: usize,
}

pub struct GraphBuilder<'r> {
    registry: &'r Registry,
    parent: Option<&'r Injector>,
    marks: HashMap<Key, Mark>,
    steps: Vec<(Key, Binding)>,
    slots: HashMap<Key, Key>,
}

impl<'r> GraphBuilder<'r> {
    pub fn build(registry: &'r Registry, roots: &[Key]) -> Result<Plan, Error> {
        Self::build_with_parent(registry, None, roots)
    }

    pub(crate) fn build_with_parent(
        registry: &'r Registry,
        parent: Option<&'r Injector>,
        roots: &[Key],
    ) -> Result<Plan, Error> {
        let mut builder = GraphBuilder {
            registry,
            parent,
            marks: HashMap::new(),
            steps: Vec::new(),
            slots: HashMap::new(),
        };

        let mut unique: Vec<Key> = Vec::with_capacity(roots.len());
        for root in roots {
            if unique.contains(root) {
                continue;
            }
            unique.push(root.clone());
            builder.visit(root)?;
        }

        Ok(Plan {
            roots: unique,
            steps: builder.steps,
            slots: builder.slots,
        })
    }

    fn visit(&mut self, root: &Key) -> Result<(), Error> {
        if self.marks.contains_key(root) {
            return Ok(());
        }

        // the stack is also the requesting chain from `root`
        let mut stack: Vec<Frame> = Vec::new();
        self.enter(root.clone(), &mut stack)?;

        while let Some(frame) = stack.last_mut() {
            let dep = frame.binding.dependencies().get(frame.next).cloned();
            frame.next += 1;

            match dep {
                Some(dep) => match self.marks.get(&dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::InProgress) => return Err(cycle(&stack, &dep)),
                    None => self.enter(dep, &mut stack)?,
                },
                None => {
                    if let Some(Frame { key, slot, binding, .. }) = stack.pop() {
                        trace!(key = %key, position = self.steps.len(), "planned");
                        self.marks.insert(key.clone(), Mark::Done);
                        if slot != key {
                            self.slots.insert(key.clone(), slot);
                        }
                        self.steps.push((key, binding));
                    }
                }
            }
        }
        Ok(())
    }

    fn enter(&mut self, key: Key, stack: &mut Vec<Frame>) -> Result<(), Error> {
        let (slot, binding) = match self.locate(&key)? {
            Some(found) => found,
            None => {
                let mut chain: Vec<Key> = stack.iter().map(|f| f.key.clone()).collect();
                chain.push(key.clone());
                return Err(Error::UnresolvedDependency {
                    key,
                    chain: chain.into(),
                });
            }
        };

        self.marks.insert(key.clone(), Mark::InProgress);
        stack.push(Frame {
            key,
            slot,
            binding,
            next: 0,
        });
        Ok(())
    }

    fn locate(&self, key: &Key) -> Result<Option<(Key, Binding)>, Error> {
        if let Some(parent) = self.parent {
            if !self.registry.provides(key) && parent.contains(key) {
                trace!(key = %key, "delegating to parent injector");
                let inherited = Inherited::new(parent.clone(), key.clone());
                let binding = Binding::from_object(Arc::new(inherited), Vec::new()).prototype();
                return Ok(Some((key.clone(), binding)));
            }
        }
        self.registry.select(key)
    }
}

fn cycle(stack: &[Frame], reentered: &Key) -> Error {
    let start = stack
        .iter()
        .position(|f| &f.key == reentered)
        .unwrap_or(0);
    Error::Cycle {
        cycle: stack[start..]
            .iter()
            .map(|f| f.key.clone())
            .collect::<Vec<_>>()
            .into(),
    }
}
