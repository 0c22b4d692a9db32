use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::error::{value_type_name, Result};
use crate::store::{StoreView, WeakStore};

static NEXT_ACTION: AtomicUsize = AtomicUsize::new(0);

type ActionFn = dyn Fn(&dyn StoreView, &[Value]) -> Result<Value>;

/// A state transition: `(guarded store, args) -> diff`.
///
/// The returned value must be a JSON object mapping changed keys to their new
/// values. Clones share identity.
#[derive(Clone)]
pub struct Action {
    id: usize,
    run: Rc<ActionFn>,
}

impl Action {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&dyn StoreView, &[Value]) -> Result<Value> + 'static,
    {
        Self {
            id: NEXT_ACTION.fetch_add(1, Ordering::Relaxed),
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn invoke(&self, store: &dyn StoreView, args: &[Value]) -> Result<Value> {
        (self.run)(store, args)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("id", &self.id).finish()
    }
}

/// An [`Action`] registered on a store, callable without naming the store.
///
/// Dispatching a handle on any store always runs it against the store that
/// created it.
#[derive(Clone)]
pub struct ActionHandle {
    pub(crate) action: Action,
    pub(crate) name: Option<String>,
    pub(crate) store: WeakStore,
}

impl ActionHandle {
    /// Dispatch the wrapped action with `args` against the owning store.
    pub fn call(&self, args: &[Value]) -> Result<bool> {
        let store = self.store.upgrade()?;
        store.dispatch(ActionRef::Action(self.action.clone()), args)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl PartialEq for ActionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action && self.store.ptr_eq(&other.store)
    }
}

impl fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandle")
            .field("name", &self.name)
            .field("action", &self.action.id)
            .finish()
    }
}

/// Target of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRef {
    Handle(ActionHandle),
    Name(String),
    Action(Action),
    /// A dynamic value that names no action; dispatching it fails with
    /// `InvalidActionReference`.
    Unresolvable(&'static str),
}

impl From<ActionHandle> for ActionRef {
    fn from(handle: ActionHandle) -> Self {
        ActionRef::Handle(handle)
    }
}

impl From<&ActionHandle> for ActionRef {
    fn from(handle: &ActionHandle) -> Self {
        ActionRef::Handle(handle.clone())
    }
}

impl From<Action> for ActionRef {
    fn from(action: Action) -> Self {
        ActionRef::Action(action)
    }
}

impl From<&Action> for ActionRef {
    fn from(action: &Action) -> Self {
        ActionRef::Action(action.clone())
    }
}

impl From<&str> for ActionRef {
    fn from(name: &str) -> Self {
        ActionRef::Name(name.to_string())
    }
}

impl From<String> for ActionRef {
    fn from(name: String) -> Self {
        ActionRef::Name(name)
    }
}

impl From<&Value> for ActionRef {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(name) => ActionRef::Name(name.clone()),
            other => ActionRef::Unresolvable(value_type_name(other)),
        }
    }
}
