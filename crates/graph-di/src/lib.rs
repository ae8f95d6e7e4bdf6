//! A dependency injection container built around a validated resolution graph.
//!
//! Bindings are collected in a [`Registry`], which is sealed when an [`Injector`] is
//! created. Every resolution first builds (or reuses) a [`Plan`]: the dependency
//! closure of the requested keys in construction order, rejecting cycles and missing
//! bindings with the full key chain. The plan is then executed left to right, with
//! singleton instances cached per key and created at most once.
//!
//! [`Key::all`] selects every binding of a type, and an injector built with
//! [`Injector::with_parent`] resolves the keys it does not bind through its parent.
//!
//! ```
//! use graph_di::{Binding, Injector, Key, Ref};
//!
//! struct Config {
//!     port: u16,
//! }
//!
//! struct Server {
//!     config: Ref<Config>,
//! }
//!
//! let injector = Injector::build(|registry| {
//!     registry
//!         .register(Key::of::<Ref<Config>>(), Binding::instance(Ref::new(Config { port: 8080 })))?
//!         .register(
//!             Key::of::<Ref<Server>>(),
//!             Binding::factory([Key::of::<Ref<Config>>()], |deps| {
//!                 Ok(Ref::new(Server { config: deps.next()? }))
//!             }),
//!         )?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let server: Ref<Server> = injector.resolve().unwrap();
//! assert_eq!(server.config.port, 8080);
//! ```

mod binding;
pub use binding::{Binding, ParseScopeError, Scope};
mod context;
mod error;
pub use error::Error;
mod graph;
pub use graph::{GraphBuilder, Plan};
mod helpers;
pub use helpers::{Chain, Instance};
mod injector;
pub use injector::{Deferred, Injector};
mod key;
pub use key::Key;
mod provider;
pub use provider::{Dependencies, FnProvider, ProvideResult, Provider, Resolvable, StaticProvider};
mod registry;
pub use registry::{Module, Registry};
mod scope;
pub use scope::ScopeManager;

pub type Ref<T> = std::sync::Arc<T>;
