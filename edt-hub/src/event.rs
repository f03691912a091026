//! The marker trait every published payload implements.

/// A payload that can travel through a [`Hub`](crate::Hub).
///
/// Subscriptions are keyed by `E`'s `TypeId`, not by any runtime identity
/// of a particular value — two events of the same Rust type always reach
/// the same subscribers, which is the Rust-native replacement for a
/// reflective runtime collapsing "same pointer" and "same value" identity
/// into one dispatch key.
///
/// Implement it directly rather than relying on a blanket impl so a type
/// used purely as plain data doesn't silently become publishable.
pub trait Event: Clone + Send + Sync + 'static {
    /// A short, stable name for this event type, used in subscriber-error
    /// log lines. Defaults to the Rust type name.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}
