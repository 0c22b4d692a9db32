use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use super::view::{ReadSet, TrackingView};
use crate::error::Result;
use crate::key::Key;
use crate::store::{guard, Entry, LockKind, Store, StoreView, Subscriber};

type ReadFn<R> = dyn Fn(&dyn StoreView) -> Result<R>;
type ChangeFn<R> = dyn Fn(&R);
type TeardownFn = dyn FnOnce(&[Key]);

struct TrackerInner<R> {
    store: Store,
    subscriber: Subscriber,
    read: Box<ReadFn<R>>,
    guarded: bool,
    reads: RefCell<ReadSet>,
    memo: RefCell<Option<R>>,
    on_change: RefCell<Option<Rc<ChangeFn<R>>>>,
    on_teardown: RefCell<Option<Box<TeardownFn>>>,
    recomputes: Cell<usize>,
    generation: Cell<u64>,
    active: Cell<bool>,
}

/// A read function whose store dependencies are tracked per pass.
///
/// Every key read during a pass subscribes the tracker to that key. A change
/// to a read key re-runs the function; `on_change` fires only if the new
/// result differs from the memoized one. Changes to keys outside the current
/// read-set never re-run it.
///
/// Dropping the tracker unsubscribes it from every key it read.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use slotstate::runtime::Tracker;
/// use slotstate::{Store, StoreView};
///
/// let store = Store::builder()
///     .value("foo", json!(1))
///     .value("bar", json!(1))
///     .build()
///     .unwrap();
///
/// let tracker = Tracker::selector(&store, |view| Ok(view.value("foo")));
/// tracker.run().unwrap();
///
/// store.set("bar".into(), json!(2)).unwrap();
/// assert_eq!(tracker.recompute_count(), 1);
///
/// store.set("foo".into(), json!(2)).unwrap();
/// assert_eq!(tracker.recompute_count(), 2);
/// assert_eq!(tracker.current(), Some(Some(json!(2))));
/// ```
pub struct Tracker<R: 'static> {
    inner: Rc<TrackerInner<R>>,
}

impl<R: Clone + PartialEq + 'static> Tracker<R> {
    /// Track `read` with writes passing through to the store.
    pub fn new<F>(store: &Store, read: F) -> Self
    where
        F: Fn(&dyn StoreView) -> Result<R> + 'static,
    {
        Self::build(store, Box::new(read), false)
    }

    /// Track a pure selection: `read` runs against a write guard and the store
    /// refuses writes and dispatches for the duration of each pass.
    pub fn selector<F>(store: &Store, read: F) -> Self
    where
        F: Fn(&dyn StoreView) -> Result<R> + 'static,
    {
        Self::build(store, Box::new(read), true)
    }

    fn build(store: &Store, read: Box<ReadFn<R>>, guarded: bool) -> Self {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<TrackerInner<R>>| {
            let weak = weak.clone();
            let subscriber = Subscriber::new(move |new, _old| match weak.upgrade() {
                Some(inner) => inner.notified(new),
                None => Ok(()),
            });
            TrackerInner {
                store: store.clone(),
                subscriber,
                read,
                guarded,
                reads: RefCell::new(ReadSet::default()),
                memo: RefCell::new(None),
                on_change: RefCell::new(None),
                on_teardown: RefCell::new(None),
                recomputes: Cell::new(0),
                generation: Cell::new(0),
                active: Cell::new(false),
            }
        });
        Self { inner }
    }

    /// Called with the new result whenever a recomputation changes it.
    pub fn on_change<F>(self, callback: F) -> Self
    where
        F: Fn(&R) + 'static,
    {
        *self.inner.on_change.borrow_mut() = Some(Rc::new(callback));
        self
    }

    /// Called once on teardown with the keys that were released.
    pub fn on_teardown<F>(self, hook: F) -> Self
    where
        F: FnOnce(&[Key]) + 'static,
    {
        *self.inner.on_teardown.borrow_mut() = Some(Box::new(hook));
        self
    }

    /// Run one tracked pass, memoize and return its result.
    pub fn run(&self) -> Result<R> {
        self.inner.active.set(true);
        let result = self.inner.pass()?;
        *self.inner.memo.borrow_mut() = Some(result.clone());
        Ok(result)
    }

    /// Recompute and report whether the result differs from the memoized one.
    pub fn refresh(&self) -> Result<bool> {
        self.inner.refresh()
    }

    /// The memoized result of the latest pass.
    pub fn current(&self) -> Option<R> {
        self.inner.memo.borrow().clone()
    }

    pub fn reads(&self) -> ReadSet {
        self.inner.reads.borrow().clone()
    }

    pub fn read_keys(&self) -> Vec<Key> {
        self.inner.reads.borrow().keys().cloned().collect()
    }

    /// Number of passes run so far.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputes.get()
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.inner.subscriber
    }

    /// Unsubscribe from every read key. Idempotent; later notifications are
    /// ignored until the next [`run`](Self::run).
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl<R: 'static> Drop for Tracker<R> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<R: Clone + PartialEq + 'static> TrackerInner<R> {
    fn notified(&self, new: &Entry) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        let stale = match self.reads.borrow().value_at_read(&new.key) {
            Some(seen) => *seen != new.value,
            None => false,
        };
        if !stale {
            trace!(
                store = %self.store.name(),
                subscriber = self.subscriber.id(),
                key = %new.key,
                "skipping recompute"
            );
            return Ok(());
        }
        self.refresh().map(|_| ())
    }

    fn refresh(&self) -> Result<bool> {
        let next = self.pass()?;
        let changed = {
            let mut memo = self.memo.borrow_mut();
            if memo.as_ref() == Some(&next) {
                false
            } else {
                *memo = Some(next.clone());
                true
            }
        };
        if changed {
            debug!(
                store = %self.store.name(),
                subscriber = self.subscriber.id(),
                "tracked result changed"
            );
            let callback = self.on_change.borrow().clone();
            if let Some(callback) = callback {
                callback(&next);
            }
        }
        Ok(changed)
    }

    /// Run the read function until a pass completes without a nested pass
    /// starting inside it. A nested pass is triggered when the read function
    /// writes a key it read; its result supersedes the outer one.
    fn pass(&self) -> Result<R> {
        loop {
            let generation = self.generation.get() + 1;
            self.generation.set(generation);
            self.recomputes.set(self.recomputes.get() + 1);

            let view = TrackingView::new(&self.store, &self.subscriber);
            let result = if self.guarded {
                let _lock = self.store.lock(LockKind::Selection);
                let guarded = guard(&view, self.store.config().selection_guard_message.clone());
                (self.read)(&guarded)
            } else {
                (self.read)(&view)
            };
            let fresh = view.into_reads();

            if result.is_ok() && self.generation.get() != generation {
                trace!(
                    store = %self.store.name(),
                    subscriber = self.subscriber.id(),
                    "nested pass superseded result, re-running"
                );
                self.reads.borrow_mut().merge(fresh);
                continue;
            }

            trace!(
                store = %self.store.name(),
                subscriber = self.subscriber.id(),
                keys = fresh.len(),
                ok = result.is_ok(),
                "tracked pass"
            );
            self.resubscribe(fresh, result.is_ok());
            return result;
        }
    }

    /// Replace the read-set after a pass. A failed pass keeps the union so
    /// that teardown still releases every subscription it made.
    fn resubscribe(&self, fresh: ReadSet, complete: bool) {
        let mut reads = self.reads.borrow_mut();
        if !complete {
            reads.merge(fresh);
            return;
        }
        for key in reads.keys().filter(|key| !fresh.contains(key)) {
            self.store.unsubscribe_key(key, &self.subscriber);
        }
        *reads = fresh;
    }
}

impl<R> TrackerInner<R> {
    fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        let released: Vec<Key> = std::mem::take(&mut *self.reads.borrow_mut())
            .keys()
            .cloned()
            .collect();
        for key in &released {
            self.store.unsubscribe_key(key, &self.subscriber);
        }
        trace!(
            store = %self.store.name(),
            subscriber = self.subscriber.id(),
            keys = released.len(),
            "tracker torn down"
        );
        let hook = self.on_teardown.borrow_mut().take();
        if let Some(hook) = hook {
            hook(&released);
        }
    }
}
