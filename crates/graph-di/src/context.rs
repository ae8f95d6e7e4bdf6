use std::collections::HashMap;

use crate::error::Error;
use crate::helpers::Instance;
use crate::key::Key;

enum State {
    Resolving,
    Resolved(Instance),
    Failed,
}

/// Per-call bookkeeping for one top-level resolution.
///
/// Memoizes every instance produced during the call, so a key reached through several
/// paths is produced at most once even when it is prototype-scoped.
#[derive(Default)]
pub(crate) struct ResolutionContext {
    states: HashMap<Key, State>,
}

impl ResolutionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn instance(&self, key: &Key) -> Option<&Instance> {
        match self.states.get(key) {
            Some(State::Resolved(instance)) => Some(instance),
            _ => None,
        }
    }

    pub(crate) fn is_resolved(&self, key: &Key) -> bool {
        self.instance(key).is_some()
    }

    /// Moves `key` to resolving. Re-entering a key that is still resolving means the
    /// plan was built wrong; it is reported as a one-key cycle.
    pub(crate) fn begin(&mut self, key: &Key) -> Result<(), Error> {
        match self.states.get(key) {
            Some(State::Resolving) => Err(Error::Cycle {
                cycle: vec![key.clone()].into(),
            }),
            _ => {
                self.states.insert(key.clone(), State::Resolving);
                Ok(())
            }
        }
    }

    pub(crate) fn complete(&mut self, key: &Key, instance: Instance) {
        self.states.insert(key.clone(), State::Resolved(instance));
    }

    pub(crate) fn fail(&mut self, key: &Key) {
        self.states.insert(key.clone(), State::Failed);
    }
}
