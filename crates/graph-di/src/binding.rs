use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::helpers::Instance;
use crate::key::Key;
use crate::provider::{
    Dependencies, FnProvider, ProvideResult, Provider, ProviderObject, Resolvable, StaticProvider,
};

/// How long a produced instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Produced once, then cached for the lifetime of the injector.
    #[default]
    Singleton,
    /// Produced on every top-level resolution; shared only within that call.
    Prototype,
}

impl Scope {
    pub fn is_cached(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Prototype => "prototype",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown scope: {0:?}")]
pub struct ParseScopeError(String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singleton" => Ok(Scope::Singleton),
            "prototype" | "transient" => Ok(Scope::Prototype),
            _ => Err(ParseScopeError(s.to_string())),
        }
    }
}

/// A provider together with its declared dependencies and scope.
///
/// Bindings are immutable once built; the modifiers consume and return `self`.
#[derive(Clone)]
pub struct Binding {
    provider: Arc<dyn ProviderObject>,
    dependencies: Arc<[Key]>,
    scope: Scope,
    primary: bool,
    overriding: bool,
    multi: bool,
}

impl Binding {
    pub fn provider<P>(provider: P) -> Self
    where
        P: Provider,
    {
        let dependencies = provider.dependencies();
        Self::from_object(Arc::new(provider), dependencies)
    }

    pub(crate) fn from_object(provider: Arc<dyn ProviderObject>, dependencies: Vec<Key>) -> Self {
        Binding {
            provider,
            dependencies: dependencies.into(),
            scope: Scope::default(),
            primary: false,
            overriding: false,
            multi: false,
        }
    }

    /// Gathers the instances behind `elements` into one `Vec<Instance>`.
    pub(crate) fn collection(elements: Vec<Key>) -> Self {
        Self::factory(elements, |deps| {
            let mut items: Vec<Instance> = Vec::with_capacity(deps.len());
            for index in 0..deps.len() {
                items.push(deps.instance(index)?.clone());
            }
            Ok(items)
        })
        .prototype()
    }

    /// Binds a closure that receives the resolved `dependencies` in order.
    pub fn factory<T, I, F>(dependencies: I, f: F) -> Self
    where
        T: Resolvable,
        I: IntoIterator<Item = Key>,
        F: Fn(&mut Dependencies<'_>) -> ProvideResult<T> + Send + Sync + 'static,
    {
        Self::provider(FnProvider::new(dependencies, f))
    }

    /// Binds an already constructed value.
    pub fn instance<T>(value: T) -> Self
    where
        T: Resolvable,
    {
        Self::provider(StaticProvider::new(value))
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.in_scope(Scope::Prototype)
    }

    pub fn singleton(self) -> Self {
        self.in_scope(Scope::Singleton)
    }

    /// Marks this binding as the canonical one when a key has several.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Registering this binding replaces every earlier binding for its key.
    pub fn overriding(mut self) -> Self {
        self.overriding = true;
        self
    }

    /// Declares this binding as one of several contributions to its key. A key whose
    /// bindings are all contributions may hold more than one without a primary; it is
    /// then meant to be resolved with [`Key::all`].
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_override(&self) -> bool {
        self.overriding
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn dependencies(&self) -> &[Key] {
        &self.dependencies
    }

    /// Name of the type the provider produces.
    pub fn type_name(&self) -> &'static str {
        self.provider.type_name()
    }

    pub(crate) fn invoke(&self, deps: &mut Dependencies<'_>) -> anyhow::Result<Instance> {
        self.provider.provide(deps)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("produces", &self.type_name())
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .field("primary", &self.primary)
            .field("overriding", &self.overriding)
            .field("multi", &self.multi)
            .finish()
    }
}
