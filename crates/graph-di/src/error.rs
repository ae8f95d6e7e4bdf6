use thiserror::Error;
use std::sync::Arc;
use crate::helpers::Chain;
use crate::key::Key;

#[derive(Error, Debug, Clone)]
pub enum Error {
  #[error("ambiguous bindings for {key}: {candidates} registered, {primaries} marked primary")]
  DuplicateBinding {
    key: Key,
    candidates: usize,
    primaries: usize,
  },
  #[error("registry is sealed, cannot bind {key}")]
  RegistrySealed { key: Key },
  #[error("no binding for {key} (required by {chain})")]
  UnresolvedDependency { key: Key, chain: Chain },
  #[error("dependency cycle detected: {}", .cycle.display_cycle())]
  Cycle { cycle: Chain },
  #[error("provider for {key} failed: {cause}")]
  Provider { key: Key, cause: Arc<anyhow::Error> },
  #[error("instance bound to {key} is not a `{expected}`")]
  TypeMismatch { key: Key, expected: &'static str },
  #[error("provider argument {index} requested but only {declared} declared")]
  MissingArgument { index: usize, declared: usize },
}

impl Error {
  /// Wraps a provider failure. A cycle surfacing from inside a provider is
  /// passed through unchanged.
  pub(crate) fn provider(key: &Key, cause: anyhow::Error) -> Self {
    match cause.downcast::<Error>() {
      Ok(err @ Error::Cycle { .. }) => err,
      Ok(err) => Error::Provider {
        key: key.clone(),
        cause: Arc::new(err.into()),
      },
      Err(cause) => Error::Provider {
        key: key.clone(),
        cause: Arc::new(cause),
      },
    }
  }

  /// The key the error is about, if it names one.
  pub fn key(&self) -> Option<&Key> {
    match self {
      Error::DuplicateBinding { key, .. }
      | Error::RegistrySealed { key }
      | Error::UnresolvedDependency { key, .. }
      | Error::Provider { key, .. }
      | Error::TypeMismatch { key, .. } => Some(key),
      Error::Cycle { cycle } => cycle.keys().first(),
      Error::MissingArgument { .. } => None,
    }
  }
}
