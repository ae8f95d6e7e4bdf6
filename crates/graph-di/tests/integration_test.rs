use graph_di::*;
use std::sync::Arc;

pub trait ConfigService: Send + Sync {
    fn value(&self) -> i32;
}

pub struct ConfigServiceProvider;

mod impl_config {
    use super::{ConfigService, ConfigServiceProvider};
    use graph_di::*;
    use std::sync::Arc;

    struct ConfigServiceImpl {
        value: i32,
    }

    impl ConfigService for ConfigServiceImpl {
        fn value(&self) -> i32 {
            self.value
        }
    }

    impl Provider for ConfigServiceProvider {
        type Ref = Arc<dyn ConfigService>;

        fn provide(&self, _: &mut Dependencies<'_>) -> ProvideResult<Self::Ref> {
            Ok(Arc::new(ConfigServiceImpl { value: 42 }))
        }
    }
}

pub trait TestService: Send + Sync {
    fn check_config(&self, value: i32) -> bool;
}

struct TestServiceImpl(Arc<dyn ConfigService>);

impl TestService for TestServiceImpl {
    fn check_config(&self, value: i32) -> bool {
        self.0.value() == value
    }
}

struct TestServiceProvider;

impl Provider for TestServiceProvider {
    type Ref = Arc<dyn TestService>;

    fn dependencies(&self) -> Vec<Key> {
        vec![Key::of::<Arc<dyn ConfigService>>()]
    }

    fn provide(&self, deps: &mut Dependencies<'_>) -> ProvideResult<Self::Ref> {
        Ok(Arc::new(TestServiceImpl(deps.next()?)))
    }
}

fn register_services(registry: &mut Registry) -> Result<(), Error> {
    registry
        .register(
            Key::of::<Arc<dyn ConfigService>>(),
            Binding::provider(ConfigServiceProvider),
        )?
        .register(
            Key::of::<Arc<dyn TestService>>(),
            Binding::provider(TestServiceProvider),
        )?;
    Ok(())
}

#[test]
fn test_basic() {
    let injector = Injector::build(|registry| {
        registry.register(
            Key::of::<Arc<dyn ConfigService>>(),
            Binding::provider(ConfigServiceProvider),
        )?;
        Ok(())
    })
    .unwrap();
    let config: Arc<dyn ConfigService> = injector.resolve().unwrap();
    assert_eq!(config.value(), 42)
}

#[test]
fn test_dep() {
    let injector = Injector::build(register_services).unwrap();
    let test_service: Arc<dyn TestService> = injector.resolve().unwrap();

    assert!(test_service.check_config(42))
}

#[test]
fn test_deferred() {
    struct LazyService {
        config: Deferred<Arc<dyn ConfigService>>,
    }

    impl LazyService {
        fn check_config(&self, value: i32) -> bool {
            let config = self.config.resolve().unwrap();
            config.value() == value
        }
    }

    let injector = Injector::build(register_services).unwrap();
    let lazy = LazyService {
        config: injector.deferred(),
    };

    assert_eq!(lazy.config.key(), &Key::of::<Arc<dyn ConfigService>>());
    assert!(lazy.check_config(42))
}

#[test]
fn test_qualified_keys() {
    let injector = Injector::build(|registry| {
        registry
            .register(Key::named::<String>("host"), Binding::instance(String::from("localhost")))?
            .register(Key::named::<u16>("port"), Binding::instance(8080u16))?
            .register(
                Key::named::<String>("address"),
                Binding::factory(
                    [Key::named::<String>("host"), Key::named::<u16>("port")],
                    |deps| {
                        let host: String = deps.next()?;
                        let port: u16 = deps.next()?;
                        Ok(format!("{}:{}", host, port))
                    },
                ),
            )?;
        Ok(())
    })
    .unwrap();

    let address: String = injector.resolve_named("address").unwrap();
    assert_eq!(address, "localhost:8080");
    assert!(injector.resolve::<String>().is_err());
}

#[test]
fn test_resolve_all_in_request_order() {
    let injector = Injector::build(register_services).unwrap();
    let keys = [
        Key::of::<Arc<dyn TestService>>(),
        Key::of::<Arc<dyn ConfigService>>(),
    ];

    let instances = injector.resolve_all(&keys).unwrap();
    assert_eq!(instances.len(), 2);
    assert!(instances[0].downcast_ref::<Arc<dyn TestService>>().is_some());
    assert!(instances[1].downcast_ref::<Arc<dyn ConfigService>>().is_some());
}

#[test]
fn test_resolve_optional() {
    struct Unbound;

    let injector = Injector::build(register_services).unwrap();
    let missing: Option<Arc<Unbound>> = injector.resolve_optional().unwrap();
    assert!(missing.is_none());

    let present: Option<Arc<dyn ConfigService>> = injector.resolve_optional().unwrap();
    assert_eq!(present.map(|c| c.value()), Some(42));
}

#[test]
fn test_optional_still_reports_broken_graph() {
    struct Root;
    struct Missing;

    let injector = Injector::build(|registry| {
        registry.register(
            Key::of::<Arc<Root>>(),
            Binding::factory([Key::of::<Arc<Missing>>()], |_| Ok(Arc::new(Root))),
        )?;
        Ok(())
    })
    .unwrap();

    assert!(matches!(
        injector.resolve_optional::<Arc<Root>>(),
        Err(Error::UnresolvedDependency { .. })
    ));
}

#[test]
fn test_type_mismatch() {
    let injector = Injector::build(|registry| {
        registry.register(Key::of::<u32>(), Binding::instance(String::from("not a number")))?;
        Ok(())
    })
    .unwrap();

    match injector.resolve::<u32>() {
        Err(Error::TypeMismatch { key, expected }) => {
            assert_eq!(key, Key::of::<u32>());
            assert_eq!(expected, "u32");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_providers_run_in_dependency_order() {
    use std::sync::Mutex;

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let step = |name: &'static str, deps: Vec<Key>, log: &Arc<Mutex<Vec<&'static str>>>| {
        let log = log.clone();
        Binding::factory(deps, move |_| {
            log.lock().unwrap().push(name);
            Ok(name)
        })
    };

    let injector = Injector::build(|registry| {
        registry
            .register(
                Key::named::<&'static str>("app"),
                step(
                    "app",
                    vec![Key::named::<&'static str>("db"), Key::named::<&'static str>("cache")],
                    &log,
                ),
            )?
            .register(
                Key::named::<&'static str>("cache"),
                step("cache", vec![Key::named::<&'static str>("metrics")], &log),
            )?
            .register(
                Key::named::<&'static str>("db"),
                step("db", vec![Key::named::<&'static str>("metrics")], &log),
            )?
            .register(Key::named::<&'static str>("metrics"), step("metrics", vec![], &log))?;
        Ok(())
    })
    .unwrap();

    let app: &'static str = injector.resolve_named("app").unwrap();
    assert_eq!(app, "app");
    assert_eq!(*log.lock().unwrap(), vec!["metrics", "db", "cache", "app"]);
}

#[test]
fn test_plans_are_cached() {
    let injector = Injector::build(register_services).unwrap();
    let roots = [Key::of::<Arc<dyn TestService>>()];

    let first = injector.plan(&roots).unwrap();
    let second = injector.plan(&roots).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 2);
    assert_eq!(first.position(&Key::of::<Arc<dyn ConfigService>>()), Some(0));
}

#[test]
fn test_plan_cache_ignores_root_order_and_repeats() {
    let injector = Injector::build(register_services).unwrap();
    let test = Key::of::<Arc<dyn TestService>>();
    let config = Key::of::<Arc<dyn ConfigService>>();

    let forward = injector.plan(&[test.clone(), config.clone()]).unwrap();
    let backward = injector
        .plan(&[config.clone(), test.clone(), config.clone()])
        .unwrap();
    assert!(Arc::ptr_eq(&forward, &backward));
    assert_eq!(forward.len(), 2);

    let instances = injector.resolve_all(&[config.clone(), test, config]).unwrap();
    assert!(instances[0].downcast_ref::<Arc<dyn ConfigService>>().is_some());
    assert!(instances[1].downcast_ref::<Arc<dyn TestService>>().is_some());
    assert!(Arc::ptr_eq(&instances[0], &instances[2]));
}
