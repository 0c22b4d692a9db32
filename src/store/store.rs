use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use super::guard::StoreView;
use super::slot::{Entry, SlotTable, Subscriber};
use crate::action::{Action, ActionRef};
use crate::error::{Result, StoreError};
use crate::key::{AsKey, Key};

/// Store-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Name attached to every log record of this store.
    pub name: String,
    /// Message of the `IllegalMutation` raised by writes inside an action.
    pub action_guard_message: String,
    /// Message of the `IllegalMutation` raised by writes inside a selection.
    pub selection_guard_message: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            action_guard_message: "Refusing to write to the store inside of an action. \
                                   Return a diff object instead."
                .to_string(),
            selection_guard_message: "Refusing to write to the store inside of a selection."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockKind {
    Action,
    Selection,
}

pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) slots: RefCell<SlotTable>,
    pub(crate) actions: RefCell<IndexMap<String, Action>>,
    locks: RefCell<Vec<LockKind>>,
}

/// A keyed reactive store.
///
/// `Store` is a handle: clones share the same slots, subscribers and named
/// actions. All notification happens synchronously on the calling thread.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use slotstate::{Action, Store, StoreView};
///
/// let store = Store::builder().value("counter", json!(42)).build().unwrap();
/// let increment = Action::new(|store, _| {
///     let counter = store.value("counter").and_then(|v| v.as_i64()).unwrap_or(0);
///     Ok(json!({ "counter": counter + 1 }))
/// });
///
/// store.dispatch(increment.into(), &[]).unwrap();
/// assert_eq!(store.value("counter"), Some(json!(43)));
/// ```
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Rc<StoreInner>,
}

impl Store {
    /// Create a store seeded with `initial`, in the map's order.
    pub fn new(initial: Map<String, Value>) -> Self {
        let mut slots = SlotTable::default();
        for (name, value) in initial {
            slots.assign(Key::Name(name), value);
        }
        Self::from_parts(StoreConfig::default(), slots)
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    fn from_parts(config: StoreConfig, slots: SlotTable) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                config,
                slots: RefCell::new(slots),
                actions: RefCell::new(IndexMap::new()),
                locks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Establish a slot for `key`.
    ///
    /// An existing value is preserved, and so are existing subscribers. Fails
    /// with [`StoreError::ConflictingInitialization`] if `initial` differs
    /// from a value the key already has.
    pub fn create<K: AsKey + ?Sized>(&self, key: &K, initial: Option<Value>) -> Result<()> {
        let key = key.to_key()?;
        trace!(store = %self.name(), %key, "create slot");
        self.inner.slots.borrow_mut().create(key, initial)
    }

    /// Register `subscriber` for changes of `key`, creating the slot if needed.
    ///
    /// Subscribing the same subscriber twice is a no-op.
    pub fn subscribe<K: AsKey + ?Sized>(&self, key: &K, subscriber: &Subscriber) -> Result<()> {
        let key = key.to_key()?;
        self.subscribe_key(key, subscriber);
        Ok(())
    }

    pub fn unsubscribe<K: AsKey + ?Sized>(&self, key: &K, subscriber: &Subscriber) -> Result<()> {
        let key = key.to_key()?;
        self.unsubscribe_key(&key, subscriber);
        Ok(())
    }

    pub(crate) fn subscribe_key(&self, key: Key, subscriber: &Subscriber) -> bool {
        let added = self.inner.slots.borrow_mut().subscribe(key, subscriber);
        if added {
            trace!(store = %self.name(), subscriber = subscriber.id(), "subscribed");
        }
        added
    }

    pub(crate) fn unsubscribe_key(&self, key: &Key, subscriber: &Subscriber) -> bool {
        self.inner.slots.borrow_mut().unsubscribe(key, subscriber)
    }

    pub fn contains<K: AsKey + ?Sized>(&self, key: &K) -> bool {
        key.to_key()
            .map(|key| self.inner.slots.borrow().contains(&key))
            .unwrap_or(false)
    }

    pub fn subscriber_count<K: AsKey + ?Sized>(&self, key: &K) -> usize {
        key.to_key()
            .map(|key| self.inner.slots.borrow().subscriber_count(&key))
            .unwrap_or(0)
    }

    /// Named keys with a value, as a JSON object in key creation order.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner
            .slots
            .borrow()
            .named_values()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Whether a dispatched action body is currently running on this store.
    pub fn is_dispatching(&self) -> bool {
        self.inner.locks.borrow().contains(&LockKind::Action)
    }

    pub fn ptr_eq(a: &Store, b: &Store) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Forbid writes to this store until the returned lock is dropped.
    pub(crate) fn lock(&self, kind: LockKind) -> MutationLock<'_> {
        self.inner.locks.borrow_mut().push(kind);
        MutationLock { store: self }
    }

    pub(crate) fn lock_error(&self) -> Option<StoreError> {
        let kind = self.inner.locks.borrow().last().copied()?;
        let message = match kind {
            LockKind::Action => &self.inner.config.action_guard_message,
            LockKind::Selection => &self.inner.config.selection_guard_message,
        };
        Some(StoreError::IllegalMutation(message.clone()))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl StoreView for Store {
    fn get(&self, key: &Key) -> Option<Value> {
        self.inner.slots.borrow().get(key)
    }

    /// Assign `value` and notify every subscriber of `key` in subscription
    /// order with `({key: value}, {key: previous})`.
    ///
    /// Subscribers may call `set` again; those writes apply immediately. The
    /// first subscriber error stops the notification pass and is returned.
    fn set(&self, key: Key, value: Value) -> Result<()> {
        if let Some(err) = self.lock_error() {
            return Err(err);
        }

        let (old, subscribers) = self
            .inner
            .slots
            .borrow_mut()
            .assign(key.clone(), value.clone());
        trace!(
            store = %self.name(),
            %key,
            subscribers = subscribers.len(),
            "set"
        );

        if subscribers.is_empty() {
            return Ok(());
        }
        let new = Entry {
            key: key.clone(),
            value: Some(value),
        };
        let old = Entry { key, value: old };
        for subscriber in &subscribers {
            subscriber.notify(&new, &old)?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<Key> {
        self.inner.slots.borrow().keys()
    }

    fn dispatch(&self, action: ActionRef, args: &[Value]) -> Result<bool> {
        self.dispatch_ref(action, args)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name())
            .field("keys", &self.keys())
            .field("actions", &self.inner.actions.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// RAII guard for a write lock taken on a store.
pub(crate) struct MutationLock<'a> {
    store: &'a Store,
}

impl Drop for MutationLock<'_> {
    fn drop(&mut self) {
        self.store.inner.locks.borrow_mut().pop();
    }
}

/// Non-owning reference held by handles, so handles stored inside the store's
/// own subscribers do not keep it alive.
#[derive(Clone)]
pub(crate) struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Result<Store> {
        self.inner
            .upgrade()
            .map(|inner| Store { inner })
            .ok_or(StoreError::StoreDropped)
    }

    pub(crate) fn ptr_eq(&self, other: &WeakStore) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder for a [`Store`] with a non-default [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    values: Vec<(Key, Value)>,
}

impl StoreBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn action_guard_message(mut self, message: impl Into<String>) -> Self {
        self.config.action_guard_message = message.into();
        self
    }

    pub fn selection_guard_message(mut self, message: impl Into<String>) -> Self {
        self.config.selection_guard_message = message.into();
        self
    }

    /// Seed `key` with `value`.
    pub fn value(mut self, key: impl Into<Key>, value: Value) -> Self {
        self.values.push((key.into(), value));
        self
    }

    pub fn values(mut self, values: Map<String, Value>) -> Self {
        self.values
            .extend(values.into_iter().map(|(name, value)| (Key::Name(name), value)));
        self
    }

    /// Fails with [`StoreError::ConflictingInitialization`] if a key was
    /// seeded twice with different values.
    pub fn build(self) -> Result<Store> {
        let mut slots = SlotTable::default();
        for (key, value) in self.values {
            slots.create(key, Some(value))?;
        }
        Ok(Store::from_parts(self.config, slots))
    }
}

/// Create a store seeded with `initial`.
pub fn create_store(initial: Map<String, Value>) -> Store {
    Store::new(initial)
}

/// Whether `value` is a [`Store`] handle.
///
/// Binding layers use this to decide between using a value directly and
/// wrapping plain initial values with [`create_store`].
pub fn is_store(value: &dyn Any) -> bool {
    value.is::<Store>()
}
