use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::prop::{BoundAction, Dispatcher, Prop, Props, Setter};
use crate::action::{setter_name, ActionRef};
use crate::error::{value_type_name, Result, StoreError};
use crate::store::{guard, LockKind, Store, StoreView};

/// Computes state props from a (guarded) store view and the consumer's own props.
pub type SelectState = Rc<dyn Fn(&dyn StoreView, &Props) -> Result<Props>>;

/// Computes setter and action props for a store and the consumer's own props.
pub type BindActions = Rc<dyn Fn(&Store, &Props) -> Result<Props>>;

/// User-supplied action binder: `(dispatch, own props) -> props`.
pub type BindFn = Rc<dyn Fn(&Dispatcher, &Props) -> Result<Props>>;

/// One argument of a binding declaration.
///
/// Build arguments directly, or detect them from JSON with
/// [`Arg::from_value`].
#[derive(Clone)]
pub enum Arg {
    Null,
    /// A key that is both readable and writable.
    Key(String),
    /// Readable keys in the first position, writable keys in the second.
    Keys(Vec<String>),
    /// Prop name to store key.
    KeyMap(IndexMap<String, String>),
    Selector(SelectState),
    /// Named actions to bind, looked up at call time.
    ActionNames(Vec<String>),
    ActionMap(IndexMap<String, ActionRef>),
    Binder(BindFn),
    /// A value with no meaning in the grammar, kept for error reporting.
    Unsupported(&'static str),
}

impl Arg {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::Keys(keys.into_iter().map(Into::into).collect())
    }

    pub fn key_map<I, P, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, K)>,
        P: Into<String>,
        K: Into<String>,
    {
        Arg::KeyMap(
            pairs
                .into_iter()
                .map(|(prop, key)| (prop.into(), key.into()))
                .collect(),
        )
    }

    pub fn selector<F>(select: F) -> Self
    where
        F: Fn(&dyn StoreView, &Props) -> Result<Props> + 'static,
    {
        Arg::Selector(Rc::new(select))
    }

    pub fn action_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::ActionNames(names.into_iter().map(Into::into).collect())
    }

    pub fn action_map<I, S, A>(actions: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<ActionRef>,
    {
        Arg::ActionMap(
            actions
                .into_iter()
                .map(|(name, action)| (name.into(), action.into()))
                .collect(),
        )
    }

    pub fn binder<F>(bind: F) -> Self
    where
        F: Fn(&Dispatcher, &Props) -> Result<Props> + 'static,
    {
        Arg::Binder(Rc::new(bind))
    }

    /// Detect the shape of a dynamic argument.
    ///
    /// Rules, in order: `null`; a string; an array of strings; an object whose
    /// values are all strings. Anything else is `Unsupported`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            Value::String(key) => Arg::Key(key.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map_or(Arg::Unsupported("array"), Arg::Keys),
            Value::Object(map) => map
                .iter()
                .map(|(prop, key)| Some((prop.clone(), key.as_str()?.to_string())))
                .collect::<Option<IndexMap<_, _>>>()
                .map_or(Arg::Unsupported("object"), Arg::KeyMap),
            other => Arg::Unsupported(value_type_name(other)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Key(_) => "string",
            Arg::Keys(_) | Arg::ActionNames(_) => "array",
            Arg::KeyMap(_) | Arg::ActionMap(_) => "object",
            Arg::Selector(_) | Arg::Binder(_) => "function",
            Arg::Unsupported(found) => found,
        }
    }
}

impl From<&str> for Arg {
    fn from(key: &str) -> Self {
        Arg::Key(key.to_string())
    }
}

impl From<&Value> for Arg {
    fn from(value: &Value) -> Self {
        Arg::from_value(value)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("Null"),
            Arg::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Arg::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            Arg::KeyMap(map) => f.debug_tuple("KeyMap").field(map).finish(),
            Arg::Selector(_) => f.write_str("Selector(..)"),
            Arg::ActionNames(names) => f.debug_tuple("ActionNames").field(names).finish(),
            Arg::ActionMap(map) => f.debug_tuple("ActionMap").field(map).finish(),
            Arg::Binder(_) => f.write_str("Binder(..)"),
            Arg::Unsupported(found) => f.debug_tuple("Unsupported").field(found).finish(),
        }
    }
}

/// Canonical form of the state argument.
enum StateShape {
    Empty,
    Keys {
        read: Vec<(String, String)>,
        write: Vec<(String, String)>,
    },
    Selector(SelectState),
}

/// Canonical form of the action argument.
enum ActionShape {
    Empty,
    Names(Vec<String>),
    Map(IndexMap<String, ActionRef>),
    Binder(BindFn),
}

/// The two canonical functions a binding declaration reduces to.
#[derive(Clone)]
pub struct PropBindings {
    pub select_state: SelectState,
    pub bind_actions: BindActions,
}

impl PropBindings {
    pub fn select(&self, view: &dyn StoreView, own: &Props) -> Result<Props> {
        (self.select_state)(view, own)
    }

    pub fn bind(&self, store: &Store, own: &Props) -> Result<Props> {
        (self.bind_actions)(store, own)
    }

    /// Selected state followed by bound actions, with the selection run
    /// against a write-guarded view of `store` while the store refuses writes.
    pub fn resolve(&self, store: &Store, own: &Props) -> Result<Props> {
        let actions = self.bind(store, own)?;
        let mut props = {
            let _lock = store.lock(LockKind::Selection);
            let guarded = guard(store, store.config().selection_guard_message.clone());
            self.select(&guarded, own)?
        };
        props.extend(actions);
        Ok(props)
    }
}

impl fmt::Debug for PropBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropBindings").finish_non_exhaustive()
    }
}

/// Normalize a binding declaration into [`PropBindings`].
///
/// Accepted shapes:
///
/// | arguments                     | state                        | actions            |
/// |-------------------------------|------------------------------|--------------------|
/// | `Key, Key, ..`                | read + write each key        | none               |
/// | `Keys`                        | read only                    | none               |
/// | `Keys, Keys`                  | read first, write second     | none               |
/// | `Null, Keys`                  | write only                   | none               |
/// | `KeyMap`                      | read + write, aliased        | none               |
/// | `Selector`                    | selector output              | none               |
/// | any state slot, action slot   | as above                     | names, map, binder |
///
/// Everything else fails with [`StoreError::UnparseableArguments`].
pub fn parse_props(args: &[Arg]) -> Result<PropBindings> {
    let unparseable = || StoreError::UnparseableArguments(args.iter().map(Arg::type_name).collect());

    let (state, actions) = match args {
        [] => (StateShape::Empty, ActionShape::Empty),
        _ if args.iter().all(|arg| matches!(arg, Arg::Key(_))) => {
            let keys: Vec<(String, String)> = args
                .iter()
                .filter_map(|arg| match arg {
                    Arg::Key(key) => Some((key.clone(), key.clone())),
                    _ => None,
                })
                .collect();
            let state = StateShape::Keys {
                read: keys.clone(),
                write: keys,
            };
            (state, ActionShape::Empty)
        }
        [first] => (state_slot(first).ok_or_else(unparseable)?, ActionShape::Empty),
        [first, Arg::Keys(write)] => {
            let read = match first {
                Arg::Null => Vec::new(),
                Arg::Keys(read) => identity_pairs(read),
                _ => return Err(unparseable()),
            };
            let state = StateShape::Keys {
                read,
                write: identity_pairs(write),
            };
            (state, ActionShape::Empty)
        }
        [first, second] => (
            state_slot(first).ok_or_else(unparseable)?,
            action_slot(second).ok_or_else(unparseable)?,
        ),
        _ => return Err(unparseable()),
    };

    debug!(
        state = state.describe(),
        actions = actions.describe(),
        "parsed binding arguments"
    );
    Ok(PropBindings {
        select_state: select_state(state.read_part()),
        bind_actions: bind_actions(state.write_part(), actions),
    })
}

fn identity_pairs(keys: &[String]) -> Vec<(String, String)> {
    keys.iter().map(|key| (key.clone(), key.clone())).collect()
}

fn state_slot(arg: &Arg) -> Option<StateShape> {
    match arg {
        Arg::Null => Some(StateShape::Empty),
        Arg::Keys(keys) => Some(StateShape::Keys {
            read: identity_pairs(keys),
            write: Vec::new(),
        }),
        Arg::KeyMap(map) => {
            let pairs: Vec<(String, String)> =
                map.iter().map(|(prop, key)| (prop.clone(), key.clone())).collect();
            Some(StateShape::Keys {
                read: pairs.clone(),
                write: pairs,
            })
        }
        Arg::Selector(select) => Some(StateShape::Selector(select.clone())),
        _ => None,
    }
}

fn action_slot(arg: &Arg) -> Option<ActionShape> {
    match arg {
        Arg::Null => Some(ActionShape::Empty),
        Arg::ActionNames(names) => Some(ActionShape::Names(names.clone())),
        Arg::ActionMap(map) => Some(ActionShape::Map(map.clone())),
        Arg::Binder(bind) => Some(ActionShape::Binder(bind.clone())),
        _ => None,
    }
}

enum ReadPart {
    Empty,
    Keys(Vec<(String, String)>),
    Selector(SelectState),
}

impl StateShape {
    fn read_part(&self) -> ReadPart {
        match self {
            StateShape::Empty => ReadPart::Empty,
            StateShape::Keys { read, .. } => ReadPart::Keys(read.clone()),
            StateShape::Selector(select) => ReadPart::Selector(select.clone()),
        }
    }

    fn write_part(&self) -> Vec<(String, String)> {
        match self {
            StateShape::Keys { write, .. } => write.clone(),
            StateShape::Empty | StateShape::Selector(_) => Vec::new(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            StateShape::Empty => "empty",
            StateShape::Keys { .. } => "keys",
            StateShape::Selector(_) => "selector",
        }
    }
}

impl ActionShape {
    fn describe(&self) -> &'static str {
        match self {
            ActionShape::Empty => "empty",
            ActionShape::Names(_) => "names",
            ActionShape::Map(_) => "map",
            ActionShape::Binder(_) => "binder",
        }
    }
}

fn ensure_no_conflicts<'a>(names: impl Iterator<Item = &'a str>, own: &Props) -> Result<()> {
    let conflicts: Vec<String> = names
        .filter(|name| own.contains(name))
        .map(str::to_string)
        .collect();
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(StoreError::NamingConflict(conflicts))
    }
}

fn select_state(read: ReadPart) -> SelectState {
    match read {
        ReadPart::Empty => {
            Rc::new(|_: &dyn StoreView, _: &Props| -> Result<Props> { Ok(Props::new()) })
        }
        ReadPart::Keys(pairs) => Rc::new(move |store: &dyn StoreView, own: &Props| -> Result<Props> {
            ensure_no_conflicts(pairs.iter().map(|(prop, _)| prop.as_str()), own)?;
            Ok(pairs
                .iter()
                .map(|(prop, key)| {
                    let value = store.value(key).unwrap_or(Value::Null);
                    (prop.clone(), Prop::Value(value))
                })
                .collect())
        }),
        ReadPart::Selector(select) => Rc::new(move |store: &dyn StoreView, own: &Props| -> Result<Props> {
            let props = select(store, own)?;
            ensure_no_conflicts(props.names(), own)?;
            Ok(props)
        }),
    }
}

fn bind_actions(write: Vec<(String, String)>, actions: ActionShape) -> BindActions {
    Rc::new(move |store: &Store, own: &Props| -> Result<Props> {
        let mut props = Props::new();
        for (prop, key) in &write {
            props.insert(setter_name(prop), Setter::new(store, key.clone()));
        }
        match &actions {
            ActionShape::Empty => {}
            ActionShape::Names(names) => {
                for name in names {
                    props.insert(name.clone(), BoundAction::new(store, name.as_str()));
                }
            }
            ActionShape::Map(map) => {
                for (name, target) in map {
                    props.insert(name.clone(), BoundAction::new(store, target.clone()));
                }
            }
            ActionShape::Binder(bind) => props.extend(bind(&Dispatcher::new(store), own)?),
        }
        ensure_no_conflicts(props.names(), own)?;
        Ok(props)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;
    use serde_json::json;

    fn store() -> Store {
        Store::builder()
            .value("foo", json!("foo value"))
            .value("bar", json!("bar value"))
            .build()
            .unwrap()
    }

    #[test]
    fn parse_strings_read_and_write() {
        let store = store();
        let bindings = parse_props(&["foo".into(), "bar".into()]).unwrap();
        let props = bindings.resolve(&store, &Props::new()).unwrap();

        assert_eq!(
            props.names().collect::<Vec<_>>(),
            vec!["foo", "bar", "setFoo", "setBar"]
        );
        props.setter("setBar").unwrap().set(json!(1)).unwrap();
        assert_eq!(store.value("bar"), Some(json!(1)));
    }

    #[test]
    fn parse_single_array_reads_only() {
        let store = store();
        let bindings = parse_props(&[Arg::keys(["foo"])]).unwrap();
        let props = bindings.resolve(&store, &Props::new()).unwrap();
        assert_eq!(props, Props::new().with("foo", json!("foo value")));
    }

    #[test]
    fn parse_null_then_array_writes_only() {
        let store = store();
        let bindings = parse_props(&[Arg::Null, Arg::keys(["foo"])]).unwrap();
        let props = bindings.resolve(&store, &Props::new()).unwrap();
        assert_eq!(props.names().collect::<Vec<_>>(), vec!["setFoo"]);
        assert!(!props.contains("foo"));
    }

    #[test]
    fn parse_two_arrays() {
        let bindings = parse_props(&[Arg::keys(["foo"]), Arg::keys(["bar"])]).unwrap();
        let props = bindings.resolve(&store(), &Props::new()).unwrap();
        assert_eq!(props.names().collect::<Vec<_>>(), vec!["foo", "setBar"]);
    }

    #[test]
    fn parse_key_map_aliases() {
        let bindings = parse_props(&[Arg::key_map([("title", "foo")])]).unwrap();
        let props = bindings.resolve(&store(), &Props::new()).unwrap();
        assert_eq!(props.value("title"), Some(&json!("foo value")));
        assert_eq!(props.setter("setTitle").map(Setter::key), Some("foo"));
    }

    #[test]
    fn parse_selector_receives_own_props() {
        let select = Arg::selector(|store, own| {
            let suffix = own.value("suffix").cloned().unwrap_or(Value::Null);
            Ok(Props::new().with("pair", json!([store.value("foo"), suffix])))
        });
        let bindings = parse_props(&[select]).unwrap();
        let own = Props::new().with("suffix", json!("!"));
        let props = bindings.resolve(&store(), &own).unwrap();
        assert_eq!(props.value("pair"), Some(&json!(["foo value", "!"])));
    }

    #[test]
    fn parse_selector_runs_guarded() {
        let store = store();
        let select = Arg::selector(|store, _| {
            store.set("foo".into(), json!("mutated"))?;
            Ok(Props::new())
        });
        let bindings = parse_props(&[select]).unwrap();
        assert!(matches!(
            bindings.resolve(&store, &Props::new()),
            Err(StoreError::IllegalMutation(_))
        ));
        assert_eq!(store.value("foo"), Some(json!("foo value")));
    }

    #[test]
    fn parse_selector_cannot_dispatch_through_captured_store() {
        let store = store();
        store.create_action(Some("bump"), Action::new(|_, _| Ok(json!({ "foo": 99 }))));
        let captured = store.clone();
        let select = Arg::selector(move |view, _| {
            captured.dispatch("bump".into(), &[])?;
            Ok(Props::new().with("foo", view.value("foo").unwrap_or_default()))
        });
        let bindings = parse_props(&[select]).unwrap();
        assert_eq!(
            bindings.resolve(&store, &Props::new()),
            Err(StoreError::IllegalMutation(
                store.config().selection_guard_message.clone()
            ))
        );
        assert_eq!(store.value("foo"), Some(json!("foo value")));

        store.set("bar".into(), json!("writable again")).unwrap();
        assert_eq!(store.value("bar"), Some(json!("writable again")));
    }

    #[test]
    fn parse_action_names() {
        let store = store();
        store.create_action(
            Some("shout"),
            Action::new(|_, args| Ok(json!({ "foo": args.first().cloned() }))),
        );
        let bindings = parse_props(&[Arg::Null, Arg::action_names(["shout"])]).unwrap();
        let props = bindings.bind(&store, &Props::new()).unwrap();
        props.action("shout").unwrap().call(&[json!("HEY")]).unwrap();
        assert_eq!(store.value("foo"), Some(json!("HEY")));
    }

    #[test]
    fn parse_action_map_with_handles_and_actions() {
        let store = store();
        let handle = store.create_action(None, Action::new(|_, _| Ok(json!({ "foo": 1 }))));
        let plain = Action::new(|_, _| Ok(json!({ "bar": 2 })));
        let bindings = parse_props(&[
            Arg::Null,
            Arg::action_map([("first", ActionRef::from(handle)), ("second", plain.into())]),
        ])
        .unwrap();
        let props = bindings.bind(&store, &Props::new()).unwrap();
        props.action("first").unwrap().call(&[]).unwrap();
        props.action("second").unwrap().call(&[]).unwrap();
        assert_eq!(store.value("foo"), Some(json!(1)));
        assert_eq!(store.value("bar"), Some(json!(2)));
    }

    #[test]
    fn parse_binder() {
        let store = store();
        let bindings = parse_props(&[
            Arg::keys(["foo"]),
            Arg::binder(|dispatch, _| {
                let clear = Action::new(|_, _| Ok(json!({ "foo": "" })));
                Ok(Props::new().with("clear", dispatch.bind(clear)))
            }),
        ])
        .unwrap();
        let props = bindings.resolve(&store, &Props::new()).unwrap();
        props.action("clear").unwrap().call(&[]).unwrap();
        assert_eq!(store.value("foo"), Some(json!("")));
    }

    #[test]
    fn parse_rejects_mixed_strings_and_arrays() {
        assert_eq!(
            parse_props(&["foo".into(), Arg::keys(["bar"])]).err(),
            Some(StoreError::UnparseableArguments(vec!["string", "array"]))
        );
    }

    #[test]
    fn parse_rejects_unsupported_shapes() {
        assert_eq!(
            parse_props(&[(&json!(42)).into()]).err(),
            Some(StoreError::UnparseableArguments(vec!["number"]))
        );
        assert!(parse_props(&[Arg::Null, Arg::Null, Arg::Null]).is_err());
        let selector = Arg::selector(|_, _| Ok(Props::new()));
        assert!(parse_props(&[selector, Arg::keys(["foo"])]).is_err());
        assert!(parse_props(&[Arg::keys(["foo"]), "bar".into()]).is_err());
    }

    #[test]
    fn parse_no_arguments_binds_nothing() {
        let bindings = parse_props(&[]).unwrap();
        assert!(bindings.resolve(&store(), &Props::new()).unwrap().is_empty());
    }

    #[test]
    fn from_value_shapes() {
        assert!(matches!(Arg::from_value(&json!(null)), Arg::Null));
        assert!(matches!(Arg::from_value(&json!("foo")), Arg::Key(_)));
        assert!(matches!(Arg::from_value(&json!(["a", "b"])), Arg::Keys(_)));
        assert!(matches!(Arg::from_value(&json!(["a", 1])), Arg::Unsupported("array")));
        assert!(matches!(Arg::from_value(&json!({ "p": "k" })), Arg::KeyMap(_)));
        assert!(matches!(Arg::from_value(&json!({ "p": 1 })), Arg::Unsupported("object")));
        assert!(matches!(Arg::from_value(&json!(true)), Arg::Unsupported("boolean")));
    }

    #[test]
    fn naming_conflict_on_readable_prop() {
        let bindings = parse_props(&["foo".into()]).unwrap();
        let own = Props::new().with("foo", json!("from parent"));
        assert_eq!(
            bindings.resolve(&store(), &own),
            Err(StoreError::NamingConflict(vec!["foo".into()]))
        );
    }

    #[test]
    fn naming_conflict_on_setter() {
        let bindings = parse_props(&["foo".into()]).unwrap();
        let own = Props::new().with("setFoo", json!("from parent"));
        assert_eq!(
            bindings.resolve(&store(), &own),
            Err(StoreError::NamingConflict(vec!["setFoo".into()]))
        );
    }

    #[test]
    fn naming_conflict_on_selector_output() {
        let select = Arg::selector(|store, _| {
            Ok(Props::new().with("foo", store.value("foo").unwrap_or_default()))
        });
        let bindings = parse_props(&[select]).unwrap();
        let own = Props::new().with("foo", json!(0));
        assert!(matches!(
            bindings.resolve(&store(), &own),
            Err(StoreError::NamingConflict(_))
        ));
    }
}
