use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::key::Key;

static NEXT_SUBSCRIBER: AtomicUsize = AtomicUsize::new(0);

/// One side of a change notification: a single-key `{key: value}` mapping.
///
/// `value` is `None` when the key had no value yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Value>,
}

type Callback = dyn Fn(&Entry, &Entry) -> Result<()>;

/// A change callback with a stable identity.
///
/// Clones share the identity, so subscribing a clone of an already subscribed
/// callback is a no-op and unsubscribing a clone removes the original.
#[derive(Clone)]
pub struct Subscriber {
    id: usize,
    callback: Rc<Callback>,
}

impl Subscriber {
    /// Wrap a callback invoked with `(new, old)` entries on every assignment.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Entry, &Entry) -> Result<()> + 'static,
    {
        Self {
            id: NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed),
            callback: Rc::new(callback),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn notify(&self, new: &Entry, old: &Entry) -> Result<()> {
        (self.callback)(new, old)
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

#[derive(Debug, Default)]
struct Slot {
    value: Option<Value>,
    subscribers: Vec<Subscriber>,
}

/// Current value and subscriber list per key, in key creation order.
///
/// The table never invokes callbacks itself: assignment hands the current
/// subscriber list back so the caller can notify after releasing its borrow.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    slots: IndexMap<Key, Slot>,
}

impl SlotTable {
    pub(crate) fn create(&mut self, key: Key, initial: Option<Value>) -> Result<()> {
        match self.slots.get_mut(&key) {
            Some(slot) => match (&slot.value, initial) {
                (Some(existing), Some(initial)) if *existing != initial => {
                    Err(StoreError::ConflictingInitialization { key })
                }
                (None, Some(initial)) => {
                    slot.value = Some(initial);
                    Ok(())
                }
                _ => Ok(()),
            },
            None => {
                self.slots.insert(
                    key,
                    Slot {
                        value: initial,
                        subscribers: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn get(&self, key: &Key) -> Option<Value> {
        self.slots.get(key).and_then(|slot| slot.value.clone())
    }

    /// Store `value`, returning the previous value and the subscribers to notify.
    pub(crate) fn assign(&mut self, key: Key, value: Value) -> (Option<Value>, Vec<Subscriber>) {
        let slot = self.slots.entry(key).or_default();
        let old = slot.value.replace(value);
        (old, slot.subscribers.clone())
    }

    /// Returns `false` if the subscriber was already registered for `key`.
    pub(crate) fn subscribe(&mut self, key: Key, subscriber: &Subscriber) -> bool {
        let slot = self.slots.entry(key).or_default();
        if slot.subscribers.contains(subscriber) {
            return false;
        }
        slot.subscribers.push(subscriber.clone());
        true
    }

    pub(crate) fn unsubscribe(&mut self, key: &Key, subscriber: &Subscriber) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        let before = slot.subscribers.len();
        slot.subscribers.retain(|s| s != subscriber);
        slot.subscribers.len() != before
    }

    pub(crate) fn subscriber_count(&self, key: &Key) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.subscribers.len())
    }

    pub(crate) fn keys(&self) -> Vec<Key> {
        self.slots.keys().cloned().collect()
    }

    pub(crate) fn named_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| Some((key.as_name()?, slot.value.as_ref()?)))
    }
}
