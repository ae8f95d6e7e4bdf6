use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::key::Key;
use crate::provider::Resolvable;

/// A constructed, type-erased instance as stored in caches and handed to providers.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) fn downcast<T>(key: &Key, instance: &Instance) -> Result<T, Error>
  where T: Resolvable
{
  instance
    .downcast_ref::<T>()
    .cloned()
    .ok_or_else(|| Error::TypeMismatch {
      key: key.clone(),
      expected: type_name::<T>(),
    })
}

pub(crate) fn downcast_all<T>(key: &Key, instance: &Instance) -> Result<Vec<T>, Error>
  where T: Resolvable
{
  let items = instance
    .downcast_ref::<Vec<Instance>>()
    .ok_or_else(|| Error::TypeMismatch {
      key: key.clone(),
      expected: type_name::<Vec<T>>(),
    })?;
  let element = key.element();
  items
    .iter()
    .enumerate()
    .map(|(index, item)| downcast(&element.clone().at(index), item))
    .collect()
}

/// An ordered list of keys, rendered as `A -> B -> C`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Chain(Vec<Key>);

impl Chain {
  pub fn keys(&self) -> &[Key] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn last(&self) -> Option<&Key> {
    self.0.last()
  }

  /// Renders the chain as a closed loop, repeating the first key at the end.
  pub fn display_cycle(&self) -> String {
    match self.0.first() {
      Some(first) => format!("{} -> {}", self, first),
      None => String::new(),
    }
  }
}

impl From<Vec<Key>> for Chain {
  fn from(keys: Vec<Key>) -> Self {
    Chain(keys)
  }
}

impl PartialEq<Vec<Key>> for Chain {
  fn eq(&self, other: &Vec<Key>) -> bool {
    &self.0 == other
  }
}

impl fmt::Display for Chain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, key) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(" -> ")?;
      }
      write!(f, "{}", key)?;
    }
    Ok(())
  }
}

impl fmt::Debug for Chain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.0.iter()).finish()
  }
}
