//! Property tests for the slot table and the dispatcher.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use slotstate::{Action, Store, StoreView, Subscriber};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn create_then_get_round_trips(key in "[a-zA-Z_]{1,12}", value in json_value()) {
        let store = Store::default();
        store.create(key.as_str(), Some(value.clone())).unwrap();
        prop_assert_eq!(store.value(&key), Some(value.clone()));
        // Re-creating with the same value is a no-op.
        store.create(key.as_str(), Some(value.clone())).unwrap();
        prop_assert_eq!(store.value(&key), Some(value));
    }

    #[test]
    fn every_set_notifies_once_with_previous_value(values in prop::collection::vec(json_value(), 1..8)) {
        let store = Store::default();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = calls.clone();
        let sub = Subscriber::new(move |new, old| {
            calls_clone.borrow_mut().push((new.value.clone(), old.value.clone()));
            Ok(())
        });
        store.subscribe("key", &sub).unwrap();

        let mut previous = None;
        for value in &values {
            store.set("key".into(), value.clone()).unwrap();
            let last = calls.borrow().last().cloned();
            prop_assert_eq!(last, Some((Some(value.clone()), previous.clone())));
            previous = Some(value.clone());
        }
        prop_assert_eq!(calls.borrow().len(), values.len());
    }

    #[test]
    fn dispatch_applies_whole_diff(diff in prop::collection::btree_map("[a-z]{1,6}", json_leaf(), 0..6)) {
        let store = Store::default();
        let expected: Map<String, Value> = diff.into_iter().collect();
        let returned = Value::Object(expected.clone());
        let action = Action::new(move |_, _| Ok(returned.clone()));

        prop_assert_eq!(store.dispatch(action.into(), &[]), Ok(true));
        prop_assert_eq!(store.snapshot(), expected);
    }

    #[test]
    fn non_object_results_never_mutate(result in json_leaf(), seed in any::<i64>()) {
        let store = Store::builder().value("seed", json!(seed)).build().unwrap();
        let before = store.snapshot();
        let action = Action::new(move |_, _| Ok(result.clone()));

        prop_assert!(store.dispatch(action.into(), &[]).is_err());
        prop_assert_eq!(store.snapshot(), before);
    }
}
