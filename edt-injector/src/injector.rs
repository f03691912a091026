//! The container itself.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use edt_core::{EdtError, Token};

type AnyArc = Arc<dyn Any + Send + Sync>;
type LazyFactory = Arc<dyn Fn(&Injector) -> Result<AnyArc, EdtError> + Send + Sync>;
type InterfaceFactory = Box<dyn Any + Send + Sync>;

enum Registration {
    /// Built and cached; every `get` hands back the same instance.
    Value(AnyArc),
    /// Built once, on first `get`, then cached in place.
    LazySingleton(LazyFactory),
    /// Built fresh on every `get`, never cached.
    Factory(LazyFactory),
}

/// A type-keyed dependency injection container.
///
/// Concrete types are registered and resolved by `TypeId`, the same way
/// [`edt_hub::Hub`] keys its subscriber lists — a `HashMap<TypeId, _>`
/// behind a `Mutex`, values erased to `Arc<dyn Any + Send + Sync>` and
/// downcast back at the call site. Interfaces (trait objects) get their
/// own multimap, keyed by `TypeId::of::<dyn Trait>()`, so more than one
/// implementation can be bound and later disambiguated.
///
/// Every `Injector` carries a governing [`Token`]: `get::<Token>()`
/// transparently returns it without requiring it to be registered, so a
/// factory that asks its injector for a `Token` gets the one the
/// container itself was built with.
pub struct Injector {
    token: Token,
    registrations: Mutex<HashMap<TypeId, Registration>>,
    interfaces: Mutex<HashMap<TypeId, Vec<InterfaceFactory>>>,
}

impl Injector {
    /// A new, empty container governed by `token`.
    #[must_use]
    pub fn new(token: Token) -> Injector {
        Injector {
            token,
            registrations: Mutex::new(HashMap::new()),
            interfaces: Mutex::new(HashMap::new()),
        }
    }

    /// The token this container was built with.
    #[must_use]
    pub fn token(&self) -> Token {
        self.token.clone()
    }

    /// Register an already-built value as `T`'s singleton.
    pub fn set_singleton<T: Send + Sync + 'static>(&self, value: T) {
        self.registrations
            .lock()
            .expect("injector mutex poisoned")
            .insert(TypeId::of::<T>(), Registration::Value(Arc::new(value)));
    }

    /// Register a factory that builds `T` lazily, the first time it's
    /// asked for, then caches the result for every later `get`.
    pub fn set_singleton_fn<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T, EdtError> + Send + Sync + 'static,
    {
        let wrapped: LazyFactory = Arc::new(move |injector| {
            factory(injector).map(|value| Arc::new(value) as AnyArc)
        });
        self.registrations
            .lock()
            .expect("injector mutex poisoned")
            .insert(TypeId::of::<T>(), Registration::LazySingleton(wrapped));
    }

    /// Register a factory that builds a fresh `T` on every `get`, with
    /// no caching.
    pub fn set_factory<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T, EdtError> + Send + Sync + 'static,
    {
        let wrapped: LazyFactory = Arc::new(move |injector| {
            factory(injector).map(|value| Arc::new(value) as AnyArc)
        });
        self.registrations
            .lock()
            .expect("injector mutex poisoned")
            .insert(TypeId::of::<T>(), Registration::Factory(wrapped));
    }

    /// Bind an implementation factory for interface `I`. Binding more
    /// than one implementation is allowed — [`Injector::get_interface`]
    /// errors if the caller doesn't disambiguate, [`Injector::resolve_all`]
    /// returns every one of them.
    pub fn bind_interface<I, F>(&self, factory: F)
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&Injector) -> Result<Arc<I>, EdtError> + Send + Sync + 'static,
    {
        let boxed: Arc<dyn Fn(&Injector) -> Result<Arc<I>, EdtError> + Send + Sync> =
            Arc::new(factory);
        let erased: InterfaceFactory = Box::new(boxed);
        self.interfaces
            .lock()
            .expect("injector mutex poisoned")
            .entry(TypeId::of::<I>())
            .or_default()
            .push(erased);
    }

    /// Resolve `T`, running whatever factory is registered for it (or
    /// returning the container's own token, for `T = Token`).
    ///
    /// # Errors
    ///
    /// `EdtError::NotFound` if nothing is registered for `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, EdtError> {
        if TypeId::of::<T>() == TypeId::of::<Token>() {
            let token_any: AnyArc = Arc::new(self.token.clone());
            return downcast(token_any);
        }

        let cached_or_factory = {
            let guard = self.registrations.lock().expect("injector mutex poisoned");
            match guard.get(&TypeId::of::<T>()) {
                Some(Registration::Value(value)) => return downcast(Arc::clone(value)),
                Some(Registration::LazySingleton(factory)) => {
                    Some((Arc::clone(factory), true))
                }
                Some(Registration::Factory(factory)) => Some((Arc::clone(factory), false)),
                None => None,
            }
        };

        let (factory, cache) = cached_or_factory.ok_or_else(|| {
            EdtError::NotFound(format!(
                "no registration for {}",
                std::any::type_name::<T>()
            ))
        })?;

        let built = factory(self)?;
        if cache {
            self.registrations
                .lock()
                .expect("injector mutex poisoned")
                .insert(TypeId::of::<T>(), Registration::Value(Arc::clone(&built)));
        }
        downcast(built)
    }

    /// Like [`Injector::get`], but consults `token`'s own context chain
    /// first — letting a request-scoped value (set via
    /// [`edt_core::Token::with_value`]) shadow the container's
    /// registration.
    ///
    /// # Errors
    ///
    /// Same as [`Injector::get`].
    pub fn get_from_token<T: Clone + Send + Sync + 'static>(
        &self,
        token: &Token,
    ) -> Result<T, EdtError> {
        if let Some(value) = token.get::<T>() {
            return Ok(value);
        }
        self.get::<T>().map(|arc| (*arc).clone())
    }

    /// Enumerate the implementations bound for interface `I` and resolve
    /// the one of them, erroring unless exactly one is bound.
    ///
    /// # Errors
    ///
    /// `EdtError::NotFound` if nothing is bound, `EdtError::Duplicate` if
    /// more than one implementation is bound (use
    /// [`Injector::resolve_all`] instead).
    pub fn get_interface<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>, EdtError> {
        let candidate = {
            let guard = self.interfaces.lock().expect("injector mutex poisoned");
            match guard.get(&TypeId::of::<I>()).map(Vec::as_slice) {
                None | Some([]) => None,
                Some([one]) => Some(downcast_factory::<I>(one)),
                Some(_) => {
                    return Err(EdtError::Duplicate(format!(
                        "multiple implementations bound for {}; use resolve_all",
                        std::any::type_name::<I>()
                    )));
                }
            }
        };
        let factory = candidate.ok_or_else(|| {
            EdtError::NotFound(format!(
                "no implementation bound for {}",
                std::any::type_name::<I>()
            ))
        })?;
        factory(self)
    }

    /// Resolve every implementation bound for interface `I`, in binding
    /// order.
    pub fn resolve_all<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<I>>, EdtError> {
        let factories: Vec<_> = {
            let guard = self.interfaces.lock().expect("injector mutex poisoned");
            guard
                .get(&TypeId::of::<I>())
                .into_iter()
                .flatten()
                .map(|boxed| downcast_factory::<I>(boxed))
                .collect()
        };
        factories.into_iter().map(|factory| factory(self)).collect()
    }

    /// Like [`Injector::get_interface`], but consults `token`'s context
    /// chain first for an already-resolved `Arc<I>`.
    ///
    /// # Errors
    ///
    /// Same as [`Injector::get_interface`].
    pub fn get_interface_from_token<I: ?Sized + Send + Sync + 'static>(
        &self,
        token: &Token,
    ) -> Result<Arc<I>, EdtError> {
        if let Some(value) = token.get::<Arc<I>>() {
            return Ok(value);
        }
        self.get_interface::<I>()
    }

    /// Call `f` directly with this container, rather than resolving `T`
    /// by key.
    ///
    /// Where `get`/`get_interface` locate a registration by `TypeId`,
    /// `resolve` is for a caller that already has a closure pulling
    /// together several resolutions (or doing other work with the
    /// container) and just wants it invoked uniformly alongside the
    /// other lookup methods.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn resolve<T>(&self, f: impl Fn(&Injector) -> Result<T, EdtError>) -> Result<T, EdtError> {
        f(self)
    }

    /// [`Injector::get`], panicking instead of returning an error.
    ///
    /// Meant for composition-root wiring, where a missing registration
    /// is a programming mistake to be caught immediately rather than
    /// threaded through `Result` at every call site.
    ///
    /// # Panics
    ///
    /// If nothing is registered for `T`, or the registered value isn't
    /// `T` (shouldn't happen — registration and lookup share a single
    /// `TypeId` key).
    #[must_use]
    pub fn must_get<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|err| panic!("must_get::<{}>: {err}", std::any::type_name::<T>()))
    }

    /// [`Injector::get_interface`], panicking instead of returning an
    /// error. See [`Injector::must_get`] for when this is appropriate.
    ///
    /// # Panics
    ///
    /// If no implementation is bound for `I`, or more than one is.
    #[must_use]
    pub fn must_resolve<I: ?Sized + Send + Sync + 'static>(&self) -> Arc<I> {
        self.get_interface::<I>()
            .unwrap_or_else(|err| panic!("must_resolve::<{}>: {err}", std::any::type_name::<I>()))
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> Result<Arc<T>, EdtError> {
    value.downcast::<T>().map_err(|_| EdtError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: "a different type registered under the same key",
    })
}

fn downcast_factory<I: ?Sized + Send + Sync + 'static>(
    boxed: &InterfaceFactory,
) -> Arc<dyn Fn(&Injector) -> Result<Arc<I>, EdtError> + Send + Sync> {
    Arc::clone(
        boxed
            .downcast_ref::<Arc<dyn Fn(&Injector) -> Result<Arc<I>, EdtError> + Send + Sync>>()
            .expect("interface factory type mismatch for its own TypeId key"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn set_singleton_returns_the_same_instance_every_time() {
        let injector = Injector::new(Token::background());
        injector.set_singleton(42i32);
        let a = injector.get::<i32>().unwrap();
        let b = injector.get::<i32>().unwrap();
        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn set_singleton_fn_builds_once_and_caches() {
        let injector = Injector::new(Token::background());
        let calls = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&calls);
        injector.set_singleton_fn::<String, _>(move |_| {
            *counted.lock().unwrap() += 1;
            Ok("built".to_string())
        });

        injector.get::<String>().unwrap();
        injector.get::<String>().unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn set_factory_builds_fresh_every_call() {
        let injector = Injector::new(Token::background());
        let calls = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&calls);
        injector.set_factory::<u64, _>(move |_| {
            let mut guard = counted.lock().unwrap();
            *guard += 1;
            Ok(*guard)
        });

        let a = injector.get::<u64>().unwrap();
        let b = injector.get::<u64>().unwrap();
        assert_eq!(*a, 1);
        assert_eq!(*b, 2);
    }

    #[test]
    fn get_without_a_registration_is_not_found() {
        let injector = Injector::new(Token::background());
        let err = injector.get::<i32>().unwrap_err();
        assert!(matches!(err, EdtError::NotFound(_)));
    }

    #[test]
    fn get_returns_the_governing_token_without_registration() {
        let token = Token::background();
        let injector = Injector::new(token.clone());
        let resolved = injector.get::<Token>().unwrap();
        assert!(!resolved.is_cancelled());
    }

    #[test]
    fn get_interface_finds_the_single_bound_implementation() {
        let injector = Injector::new(Token::background());
        injector.bind_interface::<dyn Greeter, _>(|_| Ok(Arc::new(English) as Arc<dyn Greeter>));
        let greeter = injector.get_interface::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn get_interface_with_two_bindings_is_a_duplicate_error() {
        let injector = Injector::new(Token::background());
        injector.bind_interface::<dyn Greeter, _>(|_| Ok(Arc::new(English) as Arc<dyn Greeter>));
        injector.bind_interface::<dyn Greeter, _>(|_| Ok(Arc::new(French) as Arc<dyn Greeter>));
        let err = injector.get_interface::<dyn Greeter>().unwrap_err();
        assert!(matches!(err, EdtError::Duplicate(_)));
    }

    #[test]
    fn resolve_invokes_the_supplied_closure_with_the_container() {
        let injector = Injector::new(Token::background());
        injector.set_singleton(42i32);
        let doubled = injector.resolve(|i| i.get::<i32>().map(|v| *v * 2)).unwrap();
        assert_eq!(doubled, 84);
    }

    #[test]
    fn resolve_all_returns_every_binding_in_order() {
        let injector = Injector::new(Token::background());
        injector.bind_interface::<dyn Greeter, _>(|_| Ok(Arc::new(English) as Arc<dyn Greeter>));
        injector.bind_interface::<dyn Greeter, _>(|_| Ok(Arc::new(French) as Arc<dyn Greeter>));
        let greeters = injector.resolve_all::<dyn Greeter>().unwrap();
        let greetings: Vec<_> = greeters.iter().map(|g| g.greet()).collect();
        assert_eq!(greetings, vec!["hello", "bonjour"]);
    }

    #[test]
    fn get_interface_without_a_binding_is_not_found() {
        let injector = Injector::new(Token::background());
        let err = injector.get_interface::<dyn Greeter>().unwrap_err();
        assert!(matches!(err, EdtError::NotFound(_)));
    }

    #[test]
    fn get_from_token_prefers_a_request_scoped_value() {
        let injector = Injector::new(Token::background());
        injector.set_singleton(1u32);
        let scoped = Token::background().with_value(9u32);
        assert_eq!(injector.get_from_token::<u32>(&scoped).unwrap(), 9);
    }

    #[test]
    fn get_from_token_falls_back_to_the_container() {
        let injector = Injector::new(Token::background());
        injector.set_singleton(7u32);
        let plain = Token::background();
        assert_eq!(injector.get_from_token::<u32>(&plain).unwrap(), 7);
    }

    #[test]
    fn must_get_panics_when_nothing_is_registered() {
        let injector = Injector::new(Token::background());
        let result = std::panic::catch_unwind(|| injector.must_get::<i32>());
        assert!(result.is_err());
    }
}
