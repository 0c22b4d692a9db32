//! The slot table and the store handle built on it.
//!
//! Each key owns one slot holding its current value and an ordered list of
//! subscribers. Writes notify subscribers synchronously, in subscription
//! order.

mod guard;
mod slot;
mod store;

pub use guard::{guard, StoreView, WriteGuard};
pub use slot::{Entry, Subscriber};
pub use store::{create_store, is_store, Store, StoreBuilder, StoreConfig};

pub(crate) use store::{LockKind, WeakStore};
