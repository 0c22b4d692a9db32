use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::action::{Action, ActionHandle, ActionRef};
use crate::error::{value_type_name, Result, StoreError};
use crate::key::Key;
use crate::store::{guard, LockKind, Store, StoreView};

impl Store {
    /// Register `prototype`, under `name` if given, and return a handle that
    /// dispatches it against this store.
    ///
    /// Registering a name twice replaces the earlier action.
    pub fn create_action(&self, name: Option<&str>, prototype: Action) -> ActionHandle {
        if let Some(name) = name {
            let replaced = self
                .inner
                .actions
                .borrow_mut()
                .insert(name.to_string(), prototype.clone());
            debug!(
                store = %self.name(),
                action = name,
                replaced = replaced.is_some(),
                "registered named action"
            );
        }
        ActionHandle {
            action: prototype,
            name: name.map(str::to_string),
            store: self.downgrade(),
        }
    }

    pub fn named_action(&self, name: &str) -> Option<ActionHandle> {
        let action = self.inner.actions.borrow().get(name).cloned()?;
        Some(ActionHandle {
            action,
            name: Some(name.to_string()),
            store: self.downgrade(),
        })
    }

    /// Every named action, in registration order.
    pub fn named_actions(&self) -> IndexMap<String, ActionHandle> {
        self.inner
            .actions
            .borrow()
            .iter()
            .map(|(name, action)| {
                let handle = ActionHandle {
                    action: action.clone(),
                    name: Some(name.clone()),
                    store: self.downgrade(),
                };
                (name.clone(), handle)
            })
            .collect()
    }

    /// Resolve `action`, run it against a write-guarded view of this store and
    /// apply the returned diff key by key.
    ///
    /// Resolution, evaluation and validation happen before any mutation, so a
    /// failed dispatch leaves the store untouched. Diff application is not
    /// transactional: a subscriber error aborts the remaining keys.
    pub(crate) fn dispatch_ref(&self, action: ActionRef, args: &[Value]) -> Result<bool> {
        // Handles of other stores run on, and are checked by, their own store.
        if let ActionRef::Handle(handle) = &action {
            if !handle.store.ptr_eq(&self.downgrade()) {
                return handle.call(args);
            }
        }
        if self.is_dispatching() {
            return Err(StoreError::ReentrantDispatch);
        }
        if let Some(err) = self.lock_error() {
            return Err(err);
        }

        let action = match action {
            ActionRef::Handle(handle) => handle.action,
            ActionRef::Name(name) => {
                let resolved = self.inner.actions.borrow().get(&name).cloned();
                match resolved {
                    Some(action) => action,
                    None => return Err(StoreError::UnknownActionName(name)),
                }
            }
            ActionRef::Action(action) => action,
            ActionRef::Unresolvable(found) => {
                return Err(StoreError::InvalidActionReference { found })
            }
        };

        let diff = {
            let _lock = self.lock(LockKind::Action);
            let snapshot = guard(self, self.config().action_guard_message.clone());
            into_diff(action.invoke(&snapshot, args)?)?
        };

        debug!(
            store = %self.name(),
            action = action.id(),
            keys = diff.len(),
            "applying diff"
        );
        for (key, value) in diff {
            self.set(key, value)?;
        }
        Ok(true)
    }
}

fn into_diff(result: Value) -> Result<Vec<(Key, Value)>> {
    match result {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| (Key::Name(name), value))
            .collect()),
        other => Err(StoreError::InvalidActionResult {
            found: value_type_name(&other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subscriber;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counter(store: &dyn StoreView) -> i64 {
        store.value("counter").and_then(|v| v.as_i64()).unwrap_or(0)
    }

    fn increment() -> Action {
        Action::new(|store, _| Ok(json!({ "counter": counter(store) + 1 })))
    }

    fn add() -> Action {
        Action::new(|store, args| {
            let n = args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok(json!({ "counter": counter(store) + n }))
        })
    }

    fn store_with_counter(value: i64) -> Store {
        Store::builder()
            .value("counter", json!(value))
            .build()
            .unwrap()
    }

    #[test]
    fn dispatch_plain_action() {
        let store = store_with_counter(42);
        assert_eq!(store.dispatch(increment().into(), &[]), Ok(true));
        assert_eq!(store.value("counter"), Some(json!(43)));
    }

    #[test]
    fn dispatch_named_action_with_args() {
        let store = store_with_counter(0);
        store.create_action(Some("increment"), add());
        store.dispatch("increment".into(), &[json!(5)]).unwrap();
        assert_eq!(store.value("counter"), Some(json!(5)));
    }

    #[test]
    fn dispatch_handle() {
        let store = store_with_counter(1);
        let handle = store.create_action(None, add());
        handle.call(&[json!(2)]).unwrap();
        store.dispatch(handle.into(), &[json!(3)]).unwrap();
        assert_eq!(store.value("counter"), Some(json!(6)));
        assert!(store.named_actions().is_empty());
    }

    #[test]
    fn dispatch_handle_runs_against_owning_store() {
        let owner = store_with_counter(0);
        let other = store_with_counter(100);
        let handle = owner.create_action(None, increment());

        other.dispatch((&handle).into(), &[]).unwrap();
        assert_eq!(owner.value("counter"), Some(json!(1)));
        assert_eq!(other.value("counter"), Some(json!(100)));
    }

    #[test]
    fn dispatch_foreign_handle_inside_action() {
        let a = store_with_counter(0);
        let b = Store::builder().value("y", json!(0)).build().unwrap();
        let bump_b = b.create_action(None, Action::new(|_, _| Ok(json!({ "y": 1 }))));

        let inner = a.clone();
        let forward = Action::new(move |_, _| {
            inner.dispatch((&bump_b).into(), &[])?;
            Ok(json!({ "counter": 1 }))
        });
        assert_eq!(a.dispatch(forward.into(), &[]), Ok(true));
        assert_eq!(b.value("y"), Some(json!(1)));
        assert_eq!(a.value("counter"), Some(json!(1)));
    }

    #[test]
    fn dispatch_own_handle_inside_action_is_reentrant() {
        let store = store_with_counter(0);
        let handle = store.create_action(None, increment());
        let inner = store.clone();
        let nested = Action::new(move |_, _| {
            inner.dispatch((&handle).into(), &[])?;
            Ok(json!({}))
        });
        assert_eq!(
            store.dispatch(nested.into(), &[]),
            Err(StoreError::ReentrantDispatch)
        );
        assert_eq!(store.value("counter"), Some(json!(0)));
    }

    #[test]
    fn dispatch_unknown_name() {
        let store = Store::default();
        assert_eq!(
            store.dispatch("nope".into(), &[]),
            Err(StoreError::UnknownActionName("nope".into()))
        );
    }

    #[test]
    fn dispatch_invalid_reference() {
        let store = Store::default();
        assert_eq!(
            store.dispatch((&json!(42)).into(), &[]),
            Err(StoreError::InvalidActionReference { found: "number" })
        );
        store.create_action(Some("reset"), Action::new(|_, _| Ok(json!({ "counter": 0 }))));
        store.dispatch((&json!("reset")).into(), &[]).unwrap();
        assert_eq!(store.value("counter"), Some(json!(0)));
    }

    #[test]
    fn dispatch_rejects_non_object_result() {
        let store = store_with_counter(7);
        let boolean = Action::new(|_, _| Ok(json!(true)));
        assert_eq!(
            store.dispatch(boolean.into(), &[]),
            Err(StoreError::InvalidActionResult { found: "boolean" })
        );
        assert_eq!(store.value("counter"), Some(json!(7)));
    }

    #[test]
    fn dispatch_rejects_nested_dispatch() {
        let store = store_with_counter(7);
        let inner = store.clone();
        let nested = Action::new(move |_, _| {
            let result = inner.dispatch(increment().into(), &[])?;
            Ok(json!(result))
        });
        assert_eq!(
            store.dispatch(nested.into(), &[]),
            Err(StoreError::ReentrantDispatch)
        );
        assert!(!store.is_dispatching());
        assert_eq!(store.value("counter"), Some(json!(7)));
    }

    #[test]
    fn dispatch_rejects_dispatch_through_snapshot() {
        let store = store_with_counter(7);
        let nested = Action::new(|snapshot, _| {
            let result = snapshot.dispatch(increment().into(), &[])?;
            Ok(json!(result))
        });
        assert!(matches!(
            store.dispatch(nested.into(), &[]),
            Err(StoreError::IllegalMutation(_))
        ));
    }

    #[test]
    fn dispatch_rejects_writes_inside_action() {
        let store = store_with_counter(7);
        let direct = store.clone();
        let dirty = Action::new(move |snapshot, _| {
            let attempt = snapshot.set("counter".into(), json!(0));
            assert!(attempt.is_err());
            direct.set("counter".into(), json!(0))?;
            Ok(json!({}))
        });
        assert_eq!(
            store.dispatch(dirty.into(), &[]),
            Err(StoreError::IllegalMutation(
                store.config().action_guard_message.clone()
            ))
        );
        assert_eq!(store.value("counter"), Some(json!(7)));
    }

    #[test]
    fn dispatch_applies_diff_in_order() {
        let store = Store::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for key in ["b", "a"] {
            let seen = seen.clone();
            let sub = Subscriber::new(move |new, _| {
                seen.borrow_mut().push(new.key.to_string());
                Ok(())
            });
            store.subscribe(key, &sub).unwrap();
        }
        let both = Action::new(|_, _| Ok(json!({ "b": 1, "a": 2 })));
        store.dispatch(both.into(), &[]).unwrap();
        assert_eq!(*seen.borrow(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn subscribers_may_dispatch_during_diff_application() {
        let store = store_with_counter(0);
        store.create_action(Some("increment"), increment());
        let chained = store.clone();
        let sub = Subscriber::new(move |new, _| {
            if new.value == Some(json!(1)) {
                chained.dispatch("increment".into(), &[])?;
            }
            Ok(())
        });
        store.subscribe("counter", &sub).unwrap();

        store.dispatch("increment".into(), &[]).unwrap();
        assert_eq!(store.value("counter"), Some(json!(2)));
    }

    #[test]
    fn subscriber_error_aborts_remaining_keys() {
        let store = Store::default();
        let failing = Subscriber::new(|_, _| Err(StoreError::IllegalMutation("boom".into())));
        store.subscribe("a", &failing).unwrap();
        let both = Action::new(|_, _| Ok(json!({ "a": 1, "b": 2 })));

        assert_eq!(
            store.dispatch(both.into(), &[]),
            Err(StoreError::IllegalMutation("boom".into()))
        );
        assert_eq!(store.value("a"), Some(json!(1)));
        assert_eq!(store.value("b"), None);
    }

    #[test]
    fn named_actions_replace_and_list() {
        let store = store_with_counter(0);
        store.create_action(Some("step"), increment());
        store.create_action(Some("step"), add());
        store.create_action(Some("reset"), Action::new(|_, _| Ok(json!({ "counter": 0 }))));

        let actions = store.named_actions();
        assert_eq!(actions.keys().collect::<Vec<_>>(), vec!["step", "reset"]);
        actions["step"].call(&[json!(4)]).unwrap();
        assert_eq!(store.value("counter"), Some(json!(4)));
    }

    #[test]
    fn handle_outliving_store() {
        let handle = Store::default().create_action(None, increment());
        assert_eq!(handle.call(&[]), Err(StoreError::StoreDropped));
    }
}
