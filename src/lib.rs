//! # Slotstate
//!
//! A keyed reactive store for Rust.
//!
//! Slotstate keeps application state as flat key/value slots and offers three
//! ways to work with it:
//!
//! ## Slots (Low-level primitives)
//!
//! - [`Store`] - Shared slot table with per-key [`Subscriber`]s
//! - [`WriteGuard`] - Read-only facade that turns writes into errors
//!
//! ## Actions (State transitions)
//!
//! - [`Action`] - Pure function from a guarded store to a diff object
//! - [`ActionHandle`] - Registered action, callable on its own
//! - `Store::dispatch` - Resolves, runs and merges an action atomically
//!
//! ## Tracking (Derived state)
//!
//! - [`runtime::Tracker`] - Re-runs a read function only when a key it read
//!   changes, and reports only changed results
//! - [`props::parse_props`] - Turns binding declarations into selection and
//!   action-binding functions
//!
//! Everything is single-threaded and synchronous: notifications run inline on
//! the caller's stack.

pub mod action;
pub mod error;
pub mod key;
pub mod props;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use action::{prepare_write_actions, Action, ActionHandle, ActionRef};
pub use error::{Result, StoreError};
pub use key::{AsKey, Key, Symbol};
pub use props::{parse_props, Arg, PropBindings, Props};
pub use runtime::Tracker;
pub use serde_json::Value;
pub use store::{
    create_store, guard, is_store, Entry, Store, StoreBuilder, StoreConfig, StoreView,
    Subscriber, WriteGuard,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = Store::builder().value("counter", json!(0)).build().unwrap();
        assert_eq!(store.value("counter"), Some(json!(0)));
        store.set("counter".into(), json!(42)).unwrap();
        assert_eq!(store.value("counter"), Some(json!(42)));
    }
}
