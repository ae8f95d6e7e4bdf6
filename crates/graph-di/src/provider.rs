use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;
use crate::error::Error;
use crate::helpers::{downcast, downcast_all, Instance};
use crate::key::Key;

pub type ProvideResult<T> = anyhow::Result<T>;

/// Produces one instance from its declared, already-resolved dependencies.
///
/// The keys returned by [`dependencies`](Provider::dependencies) are resolved before
/// `provide` runs and are handed over in the same order through [`Dependencies`].
pub trait Provider: Send + Sync + 'static {
  type Ref: Resolvable;

  fn dependencies(&self) -> Vec<Key> {
    Vec::new()
  }

  fn provide(&self, deps: &mut Dependencies<'_>) -> ProvideResult<Self::Ref>;
}

pub(crate) trait ProviderObject: Send + Sync + 'static {
  fn type_name(&self) -> &'static str;
  fn provide(&self, deps: &mut Dependencies<'_>) -> anyhow::Result<Instance>;
}

impl<T> ProviderObject for T
  where T: Provider
{
  fn type_name(&self) -> &'static str {
    type_name::<T::Ref>()
  }

  fn provide(&self, deps: &mut Dependencies<'_>) -> anyhow::Result<Instance> {
    Provider::provide(self, deps).map(|v| Arc::new(v) as Instance)
  }
}

pub struct StaticProvider<T>(T);

impl<T> StaticProvider<T> {
  pub fn new(value: T) -> Self {
    StaticProvider(value)
  }
}

impl<T> Provider for StaticProvider<T>
where T: Resolvable
{
  type Ref = T;

  fn provide(&self, _: &mut Dependencies<'_>) -> ProvideResult<Self::Ref> {
    Ok(self.0.clone())
  }
}

/// A provider built from a closure and the keys it consumes.
pub struct FnProvider<T, F> {
  dependencies: Vec<Key>,
  f: F,
  _p: PhantomData<fn() -> T>,
}

impl<T, F> FnProvider<T, F> {
  pub fn new<I>(dependencies: I, f: F) -> Self
    where I: IntoIterator<Item = Key>
  {
    FnProvider {
      dependencies: dependencies.into_iter().collect(),
      f,
      _p: PhantomData,
    }
  }
}

impl<T, F> Provider for FnProvider<T, F>
where
  T: Resolvable,
  F: Fn(&mut Dependencies<'_>) -> ProvideResult<T> + Send + Sync + 'static,
{
  type Ref = T;

  fn dependencies(&self) -> Vec<Key> {
    self.dependencies.clone()
  }

  fn provide(&self, deps: &mut Dependencies<'_>) -> ProvideResult<Self::Ref> {
    (self.f)(deps)
  }
}

/// The resolved arguments of one provider call, in declaration order.
pub struct Dependencies<'a> {
  keys: &'a [Key],
  values: &'a [Instance],
  cursor: usize,
}

impl<'a> Dependencies<'a> {
  pub(crate) fn new(keys: &'a [Key], values: &'a [Instance]) -> Self {
    Dependencies {
      keys,
      values,
      cursor: 0,
    }
  }

  /// Takes the next argument, advancing past it.
  pub fn next<T>(&mut self) -> Result<T, Error>
    where T: Resolvable
  {
    let index = self.cursor;
    self.cursor += 1;
    self.get(index)
  }

  pub fn get<T>(&self, index: usize) -> Result<T, Error>
    where T: Resolvable
  {
    let instance = self.instance(index)?;
    downcast(&self.keys[index], instance)
  }

  /// Takes the next argument as a list, for dependencies declared with [`Key::all`].
  pub fn next_all<T>(&mut self) -> Result<Vec<T>, Error>
    where T: Resolvable
  {
    let index = self.cursor;
    self.cursor += 1;
    self.get_all(index)
  }

  pub fn get_all<T>(&self, index: usize) -> Result<Vec<T>, Error>
    where T: Resolvable
  {
    let instance = self.instance(index)?;
    downcast_all(&self.keys[index], instance)
  }

  pub fn instance(&self, index: usize) -> Result<&'a Instance, Error> {
    match (self.keys.get(index), self.values.get(index)) {
      (Some(_), Some(instance)) => Ok(instance),
      _ => Err(Error::MissingArgument {
        index,
        declared: self.keys.len(),
      }),
    }
  }

  pub fn keys(&self) -> &'a [Key] {
    self.keys
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

pub trait Resolvable: Clone + Send + Sync + 'static {}

impl<T> Resolvable for T
  where T: Clone + Send + Sync + ?Sized + 'static
{}
