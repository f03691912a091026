//! # edt-injector — a type-keyed dependency injection container
//!
//! [`Injector`] resolves concrete types and bound interfaces by
//! `TypeId` rather than by name. Registrations come in three flavors —
//! [`Injector::set_singleton`] (already built), [`Injector::set_singleton_fn`]
//! (built lazily, then cached) and [`Injector::set_factory`] (built
//! fresh every time) — plus [`Injector::bind_interface`] for resolving a
//! trait object by the trait rather than the concrete type behind it.

#![deny(missing_docs)]

mod injector;

pub use injector::Injector;
