use std::cell::RefCell;

use indexmap::IndexMap;
use serde_json::Value;

use crate::action::ActionRef;
use crate::error::Result;
use crate::key::Key;
use crate::store::{Store, StoreView, Subscriber};

/// The keys read during one tracked pass, each with the value it had when
/// it was first read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSet {
    reads: IndexMap<Key, Option<Value>>,
}

impl ReadSet {
    pub(crate) fn record(&mut self, key: Key, value: Option<Value>) {
        self.reads.entry(key).or_insert(value);
    }

    /// Value `key` had when it was read, `None` if it was not read.
    pub fn value_at_read(&self, key: &Key) -> Option<&Option<Value>> {
        self.reads.get(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.reads.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.reads.keys()
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ReadSet) {
        for (key, value) in other.reads {
            self.record(key, value);
        }
    }
}

/// A view that records every key read through it and subscribes its
/// subscriber to that key.
///
/// Writes and dispatches pass through to the store unchanged; wrap the view in
/// a [`WriteGuard`](crate::WriteGuard) to forbid them.
pub struct TrackingView<'a> {
    store: &'a Store,
    subscriber: &'a Subscriber,
    reads: RefCell<ReadSet>,
}

impl<'a> TrackingView<'a> {
    pub fn new(store: &'a Store, subscriber: &'a Subscriber) -> Self {
        Self {
            store,
            subscriber,
            reads: RefCell::new(ReadSet::default()),
        }
    }

    pub fn reads(&self) -> ReadSet {
        self.reads.borrow().clone()
    }

    pub fn into_reads(self) -> ReadSet {
        self.reads.into_inner()
    }
}

impl StoreView for TrackingView<'_> {
    fn get(&self, key: &Key) -> Option<Value> {
        let value = self.store.get(key);
        self.reads.borrow_mut().record(key.clone(), value.clone());
        self.store.subscribe_key(key.clone(), self.subscriber);
        value
    }

    fn set(&self, key: Key, value: Value) -> Result<()> {
        self.store.set(key, value)
    }

    fn keys(&self) -> Vec<Key> {
        self.store.keys()
    }

    fn dispatch(&self, action: ActionRef, args: &[Value]) -> Result<bool> {
        self.store.dispatch(action, args)
    }
}
