use crate::context::ResolutionContext;
use crate::error::Error;
use crate::graph::{GraphBuilder, Plan};
use crate::helpers::{downcast, downcast_all, Instance};
use crate::key::Key;
use crate::provider::{Dependencies, ProviderObject, Resolvable};
use crate::registry::Registry;
use crate::scope::ScopeManager;
use parking_lot::RwLock;
use std::any::type_name;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves keys against a sealed registry, falling back to a parent injector for
/// keys the registry does not bind.
///
/// Cloning is cheap; clones share the registry, the plan cache and the singleton cache.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    parent: Option<Injector>,
    plans: RwLock<HashMap<Vec<Key>, Arc<Plan>>>,
    scopes: ScopeManager,
}

impl Injector {
    /// Seals `registry` and moves its bindings into a new injector. If sealing fails,
    /// `registry` is left as it was and stays open.
    pub fn new(registry: &mut Registry) -> Result<Self, Error> {
        Self::assemble(registry, None)
    }

    pub fn with_parent(registry: &mut Registry, parent: &Injector) -> Result<Self, Error> {
        Self::assemble(registry, Some(parent.clone()))
    }

    pub fn build<F>(config: F) -> Result<Self, Error>
    where
        F: FnOnce(&mut Registry) -> Result<(), Error>,
    {
        let mut registry = Registry::new();
        config(&mut registry)?;
        Self::new(&mut registry)
    }

    /// Builds an injector whose unbound keys resolve through `self`.
    pub fn child<F>(&self, config: F) -> Result<Self, Error>
    where
        F: FnOnce(&mut Registry) -> Result<(), Error>,
    {
        let mut registry = Registry::new();
        config(&mut registry)?;
        Self::with_parent(&mut registry, self)
    }

    fn assemble(registry: &mut Registry, parent: Option<Injector>) -> Result<Self, Error> {
        registry.seal()?;
        let registry = std::mem::take(registry);
        debug!(keys = registry.len(), child = parent.is_some(), "injector ready");
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                parent,
                plans: RwLock::new(HashMap::new()),
                scopes: ScopeManager::new(),
            }),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn parent(&self) -> Option<&Injector> {
        self.inner.parent.as_ref()
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.inner.scopes
    }

    /// Whether `key` is bound here or in an ancestor.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.registry.provides(key)
            || self.inner.parent.as_ref().map_or(false, |parent| parent.contains(key))
    }

    /// Returns the construction plan for `roots`, building it on first request.
    ///
    /// Plans are cached per set of roots, so the order and repetition of `roots`
    /// do not matter.
    pub fn plan(&self, roots: &[Key]) -> Result<Arc<Plan>, Error> {
        let mut roots = roots.to_vec();
        roots.sort();
        roots.dedup();

        if let Some(plan) = self.inner.plans.read().get(&roots) {
            return Ok(plan.clone());
        }

        let plan = GraphBuilder::build_with_parent(
            &self.inner.registry,
            self.inner.parent.as_ref(),
            &roots,
        )?;
        let plan = Arc::new(plan);
        debug!(roots = roots.len(), steps = plan.len(), "built resolution plan");
        Ok(self.inner.plans.write().entry(roots).or_insert(plan).clone())
    }

    pub fn resolve<S>(&self) -> Result<S, Error>
    where
        S: Resolvable,
    {
        self.resolve_key(&Key::of::<S>())
    }

    pub fn resolve_named<S>(&self, qualifier: impl Into<Cow<'static, str>>) -> Result<S, Error>
    where
        S: Resolvable,
    {
        self.resolve_key(&Key::named::<S>(qualifier))
    }

    pub fn resolve_key<S>(&self, key: &Key) -> Result<S, Error>
    where
        S: Resolvable,
    {
        let instance = self.resolve_instance(key)?;
        downcast(key, &instance)
    }

    /// Like [`resolve`](Injector::resolve), but a type with no binding yields `None`.
    ///
    /// Anything else that goes wrong, including a missing transitive dependency,
    /// is still an error.
    pub fn resolve_optional<S>(&self) -> Result<Option<S>, Error>
    where
        S: Resolvable,
    {
        let key = Key::of::<S>();
        if !self.contains(&key) {
            return Ok(None);
        }
        self.resolve_key(&key).map(Some)
    }

    /// Every binding registered for `S`, in registration order. An empty list is not
    /// an error.
    pub fn resolve_many<S>(&self) -> Result<Vec<S>, Error>
    where
        S: Resolvable,
    {
        self.resolve_many_key(&Key::of::<S>())
    }

    pub fn resolve_many_key<S>(&self, key: &Key) -> Result<Vec<S>, Error>
    where
        S: Resolvable,
    {
        let collection = key.clone().collection();
        let instance = self.resolve_instance(&collection)?;
        downcast_all(&collection, &instance)
    }

    pub fn resolve_instance(&self, key: &Key) -> Result<Instance, Error> {
        let (plan, context) = self.execute(std::slice::from_ref(key))?;
        take(&plan, &context, key)
    }

    /// Resolves every key within one resolution call, returning instances in the
    /// order requested.
    pub fn resolve_all(&self, keys: &[Key]) -> Result<Vec<Instance>, Error> {
        let (plan, context) = self.execute(keys)?;
        keys.iter().map(|key| take(&plan, &context, key)).collect()
    }

    pub fn deferred<S>(&self) -> Deferred<S>
    where
        S: Resolvable,
    {
        self.deferred_key(Key::of::<S>())
    }

    pub fn deferred_key<S>(&self, key: Key) -> Deferred<S> {
        Deferred::new(self.clone(), key)
    }

    pub fn clear_cache(&self) {
        self.inner.scopes.clear();
    }

    fn execute(&self, roots: &[Key]) -> Result<(Arc<Plan>, ResolutionContext), Error> {
        let plan = self.plan(roots)?;
        let mut context = ResolutionContext::new();

        for (key, binding) in plan.steps() {
            let slot = plan.slot(key);
            if context.is_resolved(slot) {
                continue;
            }
            context.begin(slot)?;

            let values = binding
                .dependencies()
                .iter()
                .map(|dep| {
                    context.instance(plan.slot(dep)).cloned().ok_or_else(|| {
                        Error::UnresolvedDependency {
                            key: dep.clone(),
                            chain: vec![key.clone(), dep.clone()].into(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let produced = self.inner.scopes.get_or_create(slot, binding.scope(), || {
                let mut deps = Dependencies::new(binding.dependencies(), &values);
                binding
                    .invoke(&mut deps)
                    .map_err(|err| Error::provider(key, err))
            });

            match produced {
                Ok(instance) => context.complete(slot, instance),
                Err(err) => {
                    context.fail(slot);
                    warn!(key = %key, error = %err, "resolution failed");
                    return Err(err);
                }
            }
        }

        Ok((plan, context))
    }
}

fn take(plan: &Plan, context: &ResolutionContext, key: &Key) -> Result<Instance, Error> {
    context
        .instance(plan.slot(key))
        .cloned()
        .ok_or_else(|| Error::UnresolvedDependency {
            key: key.clone(),
            chain: vec![key.clone()].into(),
        })
}

/// Resolves one key through a parent injector.
pub(crate) struct Inherited {
    parent: Injector,
    key: Key,
}

impl Inherited {
    pub(crate) fn new(parent: Injector, key: Key) -> Self {
        Self { parent, key }
    }
}

impl ProviderObject for Inherited {
    fn type_name(&self) -> &'static str {
        type_name::<Instance>()
    }

    fn provide(&self, _: &mut Dependencies<'_>) -> anyhow::Result<Instance> {
        Ok(self.parent.resolve_instance(&self.key)?)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("registry", &self.inner.registry)
            .field("parent", &self.inner.parent.is_some())
            .field("plans", &self.inner.plans.read().len())
            .field("singletons", &self.inner.scopes.len())
            .finish()
    }
}

/// A handle that resolves its key on demand, each call being a full resolution.
pub struct Deferred<S> {
    injector: Injector,
    key: Key,
    _p: PhantomData<fn() -> S>,
}

impl<S> Deferred<S> {
    fn new(injector: Injector, key: Key) -> Self {
        Self {
            injector,
            key,
            _p: PhantomData,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn resolve(&self) -> Result<S, Error>
    where
        S: Resolvable,
    {
        self.injector.resolve_key(&self.key)
    }
}

impl<S> Clone for Deferred<S> {
    fn clone(&self) -> Self {
        Self::new(self.injector.clone(), self.key.clone())
    }
}

impl<S> fmt::Debug for Deferred<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("key", &self.key).finish()
    }
}
