use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::action::{Action, ActionRef};
use crate::error::Result;
use crate::store::{Store, StoreView, WeakStore};

/// Writes one key of a store by dispatching an anonymous action.
#[derive(Clone)]
pub struct Setter {
    store: WeakStore,
    key: String,
}

impl Setter {
    pub fn new(store: &Store, key: impl Into<String>) -> Self {
        Self {
            store: store.downgrade(),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the key's value.
    pub fn set(&self, value: Value) -> Result<bool> {
        let key = self.key.clone();
        let action = Action::new(move |_, _| Ok(single_key_diff(&key, value.clone())));
        self.store.upgrade()?.dispatch(action.into(), &[])
    }

    /// Replace the key's value with `update(current)`.
    pub fn update<F>(&self, update: F) -> Result<bool>
    where
        F: Fn(Option<Value>) -> Value + 'static,
    {
        let key = self.key.clone();
        let action = Action::new(move |store, _| {
            Ok(single_key_diff(&key, update(store.value(&key))))
        });
        self.store.upgrade()?.dispatch(action.into(), &[])
    }
}

fn single_key_diff(key: &str, value: Value) -> Value {
    let mut diff = Map::new();
    diff.insert(key.to_string(), value);
    Value::Object(diff)
}

impl PartialEq for Setter {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.store.ptr_eq(&other.store)
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("key", &self.key).finish()
    }
}

/// An action target bound to a store, callable with arguments only.
#[derive(Clone)]
pub struct BoundAction {
    store: WeakStore,
    target: ActionRef,
}

impl BoundAction {
    pub fn new(store: &Store, target: impl Into<ActionRef>) -> Self {
        Self {
            store: store.downgrade(),
            target: target.into(),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<bool> {
        self.store.upgrade()?.dispatch(self.target.clone(), args)
    }

    pub fn target(&self) -> &ActionRef {
        &self.target
    }
}

impl PartialEq for BoundAction {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.store.ptr_eq(&other.store)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("target", &self.target)
            .finish()
    }
}

/// The dispatch capability handed to binder functions.
pub struct Dispatcher {
    store: Store,
}

impl Dispatcher {
    pub(crate) fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
        }
    }

    pub fn dispatch(&self, action: impl Into<ActionRef>, args: &[Value]) -> Result<bool> {
        self.store.dispatch(action.into(), args)
    }

    pub fn bind(&self, action: impl Into<ActionRef>) -> BoundAction {
        BoundAction::new(&self.store, action)
    }
}

/// A single injected or incoming prop.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Value(Value),
    Setter(Setter),
    Action(BoundAction),
}

impl From<Value> for Prop {
    fn from(value: Value) -> Self {
        Prop::Value(value)
    }
}

impl From<Setter> for Prop {
    fn from(setter: Setter) -> Self {
        Prop::Setter(setter)
    }
}

impl From<BoundAction> for Prop {
    fn from(action: BoundAction) -> Self {
        Prop::Action(action)
    }
}

/// Props by name, in insertion order. Compared structurally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    props: IndexMap<String, Prop>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, prop: impl Into<Prop>) -> Self {
        self.insert(name, prop);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, prop: impl Into<Prop>) -> Option<Prop> {
        self.props.insert(name.into(), prop.into())
    }

    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.props.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.props.get(name)? {
            Prop::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn setter(&self, name: &str) -> Option<&Setter> {
        match self.props.get(name)? {
            Prop::Setter(setter) => Some(setter),
            _ => None,
        }
    }

    pub fn action(&self, name: &str) -> Option<&BoundAction> {
        match self.props.get(name)? {
            Prop::Action(action) => Some(action),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> {
        self.props.iter().map(|(name, prop)| (name.as_str(), prop))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn extend(&mut self, other: Props) {
        self.props.extend(other.props);
    }
}

impl FromIterator<(String, Prop)> for Props {
    fn from_iter<I: IntoIterator<Item = (String, Prop)>>(iter: I) -> Self {
        Self {
            props: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Props {
    type Item = (String, Prop);
    type IntoIter = indexmap::map::IntoIter<String, Prop>;

    fn into_iter(self) -> Self::IntoIter {
        self.props.into_iter()
    }
}
