//! Dependency identity: a type descriptor plus an optional qualifier.

use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Selector {
  One,
  All,
  At(usize),
}

/// Names a dependency.
///
/// Two keys are equal iff their types and qualifiers match exactly. The type name is
/// carried for diagnostics only and takes no part in equality or hashing.
///
/// A key may also stand for every binding of a type ([`Key::all`]) or for one
/// binding among several ([`Key::at`]).
#[derive(Clone)]
pub struct Key {
  type_id: TypeId,
  type_name: &'static str,
  qualifier: Option<Cow<'static, str>>,
  selector: Selector,
}

impl Key {
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self::from_raw(TypeId::of::<T>(), type_name::<T>())
  }

  pub fn named<T: ?Sized + 'static>(qualifier: impl Into<Cow<'static, str>>) -> Self {
    Self::of::<T>().with_qualifier(qualifier)
  }

  /// Every binding registered for `T`, resolved as a list.
  pub fn all<T: ?Sized + 'static>() -> Self {
    Self::of::<T>().collection()
  }

  /// Builds a key from an already-known type id, for front-ends that carry raw
  /// type descriptors instead of generic parameters.
  pub fn from_raw(type_id: TypeId, type_name: &'static str) -> Self {
    Self {
      type_id,
      type_name,
      qualifier: None,
      selector: Selector::One,
    }
  }

  pub fn with_qualifier(mut self, qualifier: impl Into<Cow<'static, str>>) -> Self {
    self.qualifier = Some(qualifier.into());
    self
  }

  pub fn collection(mut self) -> Self {
    self.selector = Selector::All;
    self
  }

  /// The `index`-th binding registered for this key, in registration order.
  pub fn at(mut self, index: usize) -> Self {
    self.selector = Selector::At(index);
    self
  }

  /// This key without any collection or index selector.
  pub fn element(&self) -> Key {
    Key {
      selector: Selector::One,
      ..self.clone()
    }
  }

  pub fn is_collection(&self) -> bool {
    self.selector == Selector::All
  }

  pub fn index(&self) -> Option<usize> {
    match self.selector {
      Selector::At(index) => Some(index),
      _ => None,
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn qualifier(&self) -> Option<&str> {
    self.qualifier.as_deref()
  }

  pub fn is_type<T: ?Sized + 'static>(&self) -> bool {
    self.type_id == TypeId::of::<T>()
  }
}

impl PartialEq for Key {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id
      && self.qualifier == other.qualifier
      && self.selector == other.selector
  }
}

impl Eq for Key {}

impl Hash for Key {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
    self.qualifier.hash(state);
    self.selector.hash(state);
  }
}

impl PartialOrd for Key {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Key {
  fn cmp(&self, other: &Self) -> Ordering {
    self.type_id
      .cmp(&other.type_id)
      .then_with(|| self.qualifier.cmp(&other.qualifier))
      .then_with(|| self.selector.cmp(&other.selector))
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name)?;
    if let Some(ref qualifier) = self.qualifier {
      write!(f, "@{}", qualifier)?;
    }
    match self.selector {
      Selector::One => Ok(()),
      Selector::All => f.write_str("[*]"),
      Selector::At(index) => write!(f, "[{}]", index),
    }
  }
}

impl fmt::Debug for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key({})", self)
  }
}
