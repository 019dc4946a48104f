//! Service locator.
//!
//! 依存関係は登録時に明示する。ファクトリは [`Resolver`] を受け取り、
//! 必要な型をそこから引き出す。

use std::{
    any::{type_name, Any, TypeId},
    cell::RefCell,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ahash::AHashMap as Map;

use crate::error::ServiceError;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance, ServiceError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ServiceKey {
    Type(TypeId),
    Named(Box<str>),
}

#[derive(Clone)]
enum Definition {
    /// 登録済みの値をそのまま返す
    Instance(Instance),
    /// スコープ内で一度だけ生成する
    Shared(Factory),
    /// 呼ばれるたびに生成する
    Transient(Factory),
}

#[derive(Clone)]
struct Entry {
    name: String,
    definition: Definition,
}

/// A collaborator type an endpoint requires, declared as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
}

impl Dependency {
    #[inline]
    pub fn of<T: Any + Send + Sync>() -> Dependency {
        Dependency {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Registry of services with per-scope instantiation.
///
/// Definitions are registered during setup. [`ServiceLocator::scoped`]
/// produces a request-scoped copy that shares the definitions but starts
/// with no instantiated services.
#[derive(Default)]
pub struct ServiceLocator {
    definitions: Arc<Map<ServiceKey, Entry>>,
    instances: Mutex<Map<ServiceKey, Instance>>,
}

impl ServiceLocator {
    #[inline]
    pub fn new() -> ServiceLocator {
        ServiceLocator::default()
    }

    fn define(&mut self, key: ServiceKey, name: String, definition: Definition) -> &mut Self {
        self.instances().remove(&key);
        Arc::make_mut(&mut self.definitions).insert(key, Entry { name, definition });
        self
    }

    /// 型をキーに値を登録する
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.set_shared(Arc::new(value))
    }

    pub fn set_shared<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.define(
            ServiceKey::Type(TypeId::of::<T>()),
            type_name::<T>().to_string(),
            Definition::Instance(value),
        )
    }

    /// 名前をキーに値を登録する
    pub fn set_named<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> &mut Self {
        self.define(
            ServiceKey::Named(name.into()),
            name.to_string(),
            Definition::Instance(Arc::new(value)),
        )
    }

    /// Registers a factory whose result is cached for the lifetime of the scope.
    pub fn factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&Resolver<'_>) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.define(
            ServiceKey::Type(TypeId::of::<T>()),
            type_name::<T>().to_string(),
            Definition::Shared(erase(factory)),
        )
    }

    pub fn factory_named<T, F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&Resolver<'_>) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.define(
            ServiceKey::Named(name.into()),
            name.to_string(),
            Definition::Shared(erase(factory)),
        )
    }

    /// Registers a factory invoked on every lookup.
    pub fn transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&Resolver<'_>) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.define(
            ServiceKey::Type(TypeId::of::<T>()),
            type_name::<T>().to_string(),
            Definition::Transient(erase(factory)),
        )
    }

    #[inline]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    #[inline]
    pub fn get_named<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.resolve_named::<T>(name).ok()
    }

    #[inline]
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ServiceError> {
        Resolver::new(self).resolve::<T>()
    }

    #[inline]
    pub fn resolve_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ServiceError> {
        Resolver::new(self).resolve_named::<T>(name)
    }

    #[inline]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.definitions.contains_key(&ServiceKey::Type(TypeId::of::<T>()))
    }

    #[inline]
    pub fn contains_named(&self, name: &str) -> bool {
        self.definitions.contains_key(&ServiceKey::Named(name.into()))
    }

    #[inline]
    pub fn provides(&self, dependency: &Dependency) -> bool {
        self.definitions.contains_key(&ServiceKey::Type(dependency.type_id))
    }

    /// New locator sharing the definitions but none of the instances.
    pub fn scoped(&self) -> ServiceLocator {
        ServiceLocator {
            definitions: Arc::clone(&self.definitions),
            instances: Mutex::new(Map::default()),
        }
    }

    /// 生成済みのサービスを破棄する
    pub fn destroy(&self) {
        self.instances().clear();
    }

    /// 生成済みのサービス数
    pub fn instantiated(&self) -> usize {
        self.instances().len()
    }

    #[inline]
    fn instances(&self) -> MutexGuard<'_, Map<ServiceKey, Instance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &ServiceKey, resolver: &Resolver<'_>) -> Result<Option<Instance>, ServiceError> {
        let Some(entry) = self.definitions.get(key) else {
            return Ok(None);
        };
        match &entry.definition {
            Definition::Instance(instance) => Ok(Some(Arc::clone(instance))),
            Definition::Transient(factory) => resolver.enter(key, &entry.name, factory).map(Some),
            Definition::Shared(factory) => {
                if let Some(instance) = self.instances().get(key) {
                    return Ok(Some(Arc::clone(instance)));
                }
                // ファクトリ実行中はロックを持たない
                let created = resolver.enter(key, &entry.name, factory)?;
                let mut instances = self.instances();
                Ok(Some(Arc::clone(instances.entry(key.clone()).or_insert(created))))
            }
        }
    }
}

impl Clone for ServiceLocator {
    /// 定義のみ共有する。生成済みのサービスは引き継がない
    fn clone(&self) -> Self {
        self.scoped()
    }
}

impl std::fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("services", &self.definitions.values().map(|e| e.name.as_str()).collect::<Vec<_>>())
            .field("instantiated", &self.instantiated())
            .finish()
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Any + Send + Sync,
    F: Fn(&Resolver<'_>) -> Result<T, ServiceError> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &Resolver<'_>| factory(resolver).map(|v| Arc::new(v) as Instance))
}

/// Resolution context handed to factories.
///
/// 解決中のサービスを記録して循環依存を検出する。
pub struct Resolver<'a> {
    locator: &'a ServiceLocator,
    stack: RefCell<Vec<ServiceKey>>,
}

impl<'a> Resolver<'a> {
    fn new(locator: &'a ServiceLocator) -> Resolver<'a> {
        Resolver {
            locator,
            stack: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub fn locator(&self) -> &ServiceLocator {
        self.locator
    }

    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ServiceError> {
        let name = type_name::<T>();
        self.fetch(&ServiceKey::Type(TypeId::of::<T>()), name)
    }

    pub fn resolve_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ServiceError> {
        self.fetch(&ServiceKey::Named(name.into()), name)
    }

    #[inline]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    fn fetch<T: Any + Send + Sync>(&self, key: &ServiceKey, name: &str) -> Result<Arc<T>, ServiceError> {
        let instance = self
            .locator
            .lookup(key, self)?
            .ok_or_else(|| ServiceError::Unresolved(name.to_string()))?;
        instance.downcast::<T>().map_err(|_| ServiceError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
    }

    fn enter(&self, key: &ServiceKey, name: &str, factory: &Factory) -> Result<Instance, ServiceError> {
        if self.stack.borrow().contains(key) {
            return Err(ServiceError::Cycle(name.to_string()));
        }
        self.stack.borrow_mut().push(key.clone());
        let result = factory(self);
        self.stack.borrow_mut().pop();
        if let Err(e) = &result {
            log::debug!("failed to build service {}: {}", name, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    struct TestService {
        value: u32,
    }

    struct DependedService {
        dependency: Arc<TestService>,
    }

    fn test_service_factory(_: &Resolver<'_>) -> Result<TestService, ServiceError> {
        Ok(TestService { value: 69 })
    }

    #[test]
    fn set_and_get_by_type() {
        let mut sl = ServiceLocator::new();
        sl.set(TestService { value: 1 });
        assert!(sl.contains::<TestService>());
        assert_eq!(sl.get::<TestService>().unwrap().value, 1);
        assert!(sl.get::<DependedService>().is_none());
    }

    #[test]
    fn factory_strategy() {
        let mut sl = ServiceLocator::new();
        sl.factory(test_service_factory);
        let first = sl.get::<TestService>().unwrap();
        let second = sl.get::<TestService>().unwrap();
        assert_eq!(first.value, 69);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sl.instantiated(), 1);
    }

    #[test]
    fn assigned_name() {
        let mut sl = ServiceLocator::new();
        sl.factory_named("CustomName", test_service_factory);
        assert!(sl.contains_named("CustomName"));
        assert_eq!(sl.get_named::<TestService>("CustomName").unwrap().value, 69);
        assert_eq!(
            sl.resolve_named::<u32>("CustomName").unwrap_err(),
            ServiceError::TypeMismatch { name: "CustomName".to_string(), expected: "u32" }
        );
    }

    #[test]
    fn dependencies_are_resolved() {
        let mut sl = ServiceLocator::new();
        sl.factory(test_service_factory).factory(|r| {
            Ok(DependedService {
                dependency: r.resolve::<TestService>()?,
            })
        });

        let depended = sl.get::<DependedService>().unwrap();
        let test_service = sl.get::<TestService>().unwrap();
        assert!(Arc::ptr_eq(&depended.dependency, &test_service));
    }

    #[test]
    fn missing_dependency() {
        let mut sl = ServiceLocator::new();
        sl.factory(|r| {
            Ok(DependedService {
                dependency: r.resolve::<TestService>()?,
            })
        });
        assert!(matches!(
            sl.resolve::<DependedService>(),
            Err(ServiceError::Unresolved(name)) if name.ends_with("TestService")
        ));
    }

    #[test]
    fn cycle_is_detected() {
        struct A;
        struct B;

        let mut sl = ServiceLocator::new();
        sl.factory(|r| r.resolve::<B>().map(|_| A)).factory(|r| r.resolve::<A>().map(|_| B));
        assert!(matches!(sl.resolve::<A>(), Err(ServiceError::Cycle(_))));
        assert_eq!(sl.instantiated(), 0);
    }

    #[test]
    fn failed_factory_is_not_cached() {
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

        let mut sl = ServiceLocator::new();
        sl.factory(|_| {
            if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ServiceError::Factory {
                    name: "TestService".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(TestService { value: 7 })
        });

        assert_eq!(
            sl.resolve::<TestService>().unwrap_err(),
            ServiceError::Factory {
                name: "TestService".to_string(),
                message: "connection refused".to_string(),
            }
        );
        assert_eq!(sl.instantiated(), 0);
        assert_eq!(sl.get::<TestService>().unwrap().value, 7);
        assert_eq!(sl.instantiated(), 1);
    }

    #[test]
    fn transient_builds_every_time() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let mut sl = ServiceLocator::new();
        sl.transient(|_| {
            Ok(TestService {
                value: BUILT.fetch_add(1, Ordering::SeqCst) as u32,
            })
        });
        assert_eq!(sl.get::<TestService>().unwrap().value, 0);
        assert_eq!(sl.get::<TestService>().unwrap().value, 1);
        assert_eq!(sl.instantiated(), 0);
    }

    #[test]
    fn scoped_starts_empty() {
        let mut sl = ServiceLocator::new();
        sl.factory(test_service_factory);
        let root = sl.get::<TestService>().unwrap();

        let scope = sl.scoped();
        assert_eq!(scope.instantiated(), 0);
        let scoped = scope.get::<TestService>().unwrap();
        assert!(!Arc::ptr_eq(&root, &scoped));

        sl.destroy();
        assert_eq!(sl.instantiated(), 0);
        assert_eq!(scope.instantiated(), 1);
    }

    #[test]
    fn dependency_descriptor() {
        let mut sl = ServiceLocator::new();
        sl.set(TestService { value: 3 });
        assert!(sl.provides(&Dependency::of::<TestService>()));
        assert!(!sl.provides(&Dependency::of::<DependedService>()));
        assert!(Dependency::of::<TestService>().type_name().ends_with("TestService"));
    }
}
