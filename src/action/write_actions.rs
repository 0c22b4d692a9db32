use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::action::Action;

/// Name of the generated setter for `key`: `counter` becomes `setCounter`.
pub fn setter_name(key: &str) -> String {
    format!("set{}", key.to_upper_camel_case())
}

/// Build one `set<Key>` action per key.
///
/// Each action writes its first argument to its key, or `null` when called
/// without arguments. The updater form, which derives the new value from the
/// current one, is only available through [`Setter::update`](crate::props::Setter::update).
pub fn prepare_write_actions<I, S>(keys: I) -> IndexMap<String, Action>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|key| {
            let key = key.as_ref().to_string();
            let name = setter_name(&key);
            let action = Action::new(move |_, args| {
                let value = args.first().cloned().unwrap_or(Value::Null);
                let mut diff = Map::new();
                diff.insert(key.clone(), value);
                Ok(Value::Object(diff))
            });
            (name, action)
        })
        .collect()
}
