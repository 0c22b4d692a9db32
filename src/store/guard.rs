use serde_json::Value;

use crate::action::ActionRef;
use crate::error::{Result, StoreError};
use crate::key::Key;

/// Read/write access to a store's slots.
///
/// Implemented by [`Store`](crate::Store) itself and by the facades layered
/// over it: [`WriteGuard`] and [`TrackingView`](crate::runtime::TrackingView).
pub trait StoreView {
    /// Current value of `key`, or `None` if it has none.
    fn get(&self, key: &Key) -> Option<Value>;

    fn set(&self, key: Key, value: Value) -> Result<()>;

    fn keys(&self) -> Vec<Key>;

    fn dispatch(&self, action: ActionRef, args: &[Value]) -> Result<bool>;

    /// Shorthand for `get` with a string key.
    fn value(&self, name: &str) -> Option<Value> {
        self.get(&Key::from(name))
    }
}

impl<T: StoreView + ?Sized> StoreView for &T {
    fn get(&self, key: &Key) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: Key, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn keys(&self) -> Vec<Key> {
        (**self).keys()
    }

    fn dispatch(&self, action: ActionRef, args: &[Value]) -> Result<bool> {
        (**self).dispatch(action, args)
    }
}

/// Read-only facade: reads pass through, writes and dispatches fail with
/// [`StoreError::IllegalMutation`].
pub struct WriteGuard<V> {
    view: V,
    message: String,
}

impl<V: StoreView> WriteGuard<V> {
    pub fn new(view: V, message: impl Into<String>) -> Self {
        Self {
            view,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_inner(self) -> V {
        self.view
    }
}

impl<V: StoreView> StoreView for WriteGuard<V> {
    fn get(&self, key: &Key) -> Option<Value> {
        self.view.get(key)
    }

    fn set(&self, _key: Key, _value: Value) -> Result<()> {
        Err(StoreError::IllegalMutation(self.message.clone()))
    }

    fn keys(&self) -> Vec<Key> {
        self.view.keys()
    }

    fn dispatch(&self, _action: ActionRef, _args: &[Value]) -> Result<bool> {
        Err(StoreError::IllegalMutation(self.message.clone()))
    }
}

/// Wrap `view` so that any write through it fails with `message`.
pub fn guard<V: StoreView>(view: V, message: impl Into<String>) -> WriteGuard<V> {
    WriteGuard::new(view, message)
}
