use std::collections::HashMap;

use tracing::debug;

use crate::binding::Binding;
use crate::error::Error;
use crate::key::Key;

/// Contributes bindings to a [`Registry`]; the seam for discovery front-ends.
pub trait Module {
    fn configure(&self, registry: &mut Registry) -> Result<(), Error>;
}

impl<F> Module for F
where
    F: Fn(&mut Registry) -> Result<(), Error>,
{
    fn configure(&self, registry: &mut Registry) -> Result<(), Error> {
        self(registry)
    }
}

/// Append-only collection of bindings, frozen by [`seal`](Registry::seal).
#[derive(Debug, Default)]
pub struct Registry {
    bindings: HashMap<Key, Vec<Binding>>,
    order: Vec<Key>,
    sealed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: Key, binding: Binding) -> Result<&mut Self, Error> {
        self.ensure_open(&key)?;
        if binding.is_override() {
            return self.override_binding(key, binding);
        }

        debug!(
            key = %key,
            scope = %binding.scope(),
            primary = binding.is_primary(),
            multi = binding.is_multi(),
            "registered binding"
        );
        match self.bindings.get_mut(&key) {
            Some(existing) => existing.push(binding),
            None => {
                self.order.push(key.clone());
                self.bindings.insert(key, vec![binding]);
            }
        }
        Ok(self)
    }

    /// Replaces every binding registered so far for `key` with `binding`.
    pub fn override_binding(&mut self, key: Key, binding: Binding) -> Result<&mut Self, Error> {
        self.ensure_open(&key)?;

        debug!(key = %key, scope = %binding.scope(), "overriding binding");
        match self.bindings.get_mut(&key) {
            Some(existing) => {
                debug!(key = %key, replaced = existing.len(), "replaced earlier bindings");
                *existing = vec![binding];
            }
            None => {
                self.order.push(key.clone());
                self.bindings.insert(key, vec![binding]);
            }
        }
        Ok(self)
    }

    pub fn install<M>(&mut self, module: &M) -> Result<&mut Self, Error>
    where
        M: Module + ?Sized,
    {
        module.configure(self)?;
        Ok(self)
    }

    /// Freezes the registry after checking every key for ambiguity. A failed seal
    /// leaves the registry open.
    pub fn seal(&mut self) -> Result<(), Error> {
        if self.sealed {
            return Ok(());
        }
        for key in &self.order {
            let candidates = self.bindings(key);
            if candidates.iter().all(Binding::is_multi) {
                continue;
            }
            self.choose(key)?;
        }
        self.sealed = true;
        debug!(keys = self.order.len(), "registry sealed");
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns the binding that resolution would use for `key`.
    pub fn lookup(&self, key: &Key) -> Result<Binding, Error> {
        self.select(key)?
            .map(|(_, binding)| binding)
            .ok_or_else(|| Error::UnresolvedDependency {
                key: key.clone(),
                chain: vec![key.clone()].into(),
            })
    }

    pub fn bindings(&self, key: &Key) -> &[Binding] {
        self.bindings.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn provides(&self, key: &Key) -> bool {
        let count = self.bindings(&key.element()).len();
        match key.index() {
            Some(index) => index < count,
            None => count > 0,
        }
    }

    /// The binding for `key` together with the key its instance is cached under.
    ///
    /// Collection keys always select, with one element per binding. An element key
    /// shares its cache slot with the plain key when both pick the same binding.
    pub(crate) fn select(&self, key: &Key) -> Result<Option<(Key, Binding)>, Error> {
        if key.is_collection() {
            let element = key.element();
            let elements = (0..self.bindings(&element).len())
                .map(|index| element.clone().at(index))
                .collect();
            return Ok(Some((key.clone(), Binding::collection(elements))));
        }

        match key.index() {
            Some(index) => {
                let element = key.element();
                let binding = match self.bindings(&element).get(index) {
                    Some(binding) => binding.clone(),
                    None => return Ok(None),
                };
                let slot = match self.choose(&element) {
                    Ok(Some(chosen)) if chosen == index => element,
                    _ => key.clone(),
                };
                Ok(Some((slot, binding)))
            }
            None => Ok(self
                .choose(key)?
                .map(|index| (key.clone(), self.bindings(key)[index].clone()))),
        }
    }

    // the only binding, or the only primary one
    fn choose(&self, key: &Key) -> Result<Option<usize>, Error> {
        let candidates = self.bindings(key);
        match candidates {
            [] => return Ok(None),
            [_] => return Ok(Some(0)),
            _ => {}
        }

        let mut primaries = candidates
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_primary())
            .map(|(index, _)| index);
        match (primaries.next(), primaries.next()) {
            (Some(primary), None) => Ok(Some(primary)),
            _ => Err(Error::DuplicateBinding {
                key: key.clone(),
                candidates: candidates.len(),
                primaries: candidates.iter().filter(|b| b.is_primary()).count(),
            }),
        }
    }

    fn ensure_open(&self, key: &Key) -> Result<(), Error> {
        if self.sealed {
            return Err(Error::RegistrySealed { key: key.clone() });
        }
        Ok(())
    }
}
