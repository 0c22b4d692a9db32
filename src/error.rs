//! Error kinds raised by the store, the dispatcher, the tracker and the
//! argument parser.
//!
//! Every error is raised synchronously at the point of violation. Apart from
//! [`StoreError::UnknownActionName`] and [`StoreError::InvalidActionReference`]
//! they all indicate programming errors.

use serde_json::Value;

use crate::key::Key;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A key was given as a value that is neither a string nor a symbol.
    #[error("Cannot use a key of type '{found}'. Expecting 'string' or 'symbol'.")]
    InvalidKeyType { found: &'static str },

    /// `create` was given an initial value that contradicts the existing one.
    #[error(
        "Refusing to override existing value with initialization data for key {key}. \
         Create the key without an initialization value."
    )]
    ConflictingInitialization { key: Key },

    #[error("Cannot dispatch a value of type '{found}'. Expecting an action, a handle or an action name.")]
    InvalidActionReference { found: &'static str },

    #[error("No action is registered under the name '{0}'.")]
    UnknownActionName(String),

    /// An action returned something other than a diff object.
    #[error("Actions must return an object of changed keys, got '{found}'.")]
    InvalidActionResult { found: &'static str },

    #[error("{0}")]
    IllegalMutation(String),

    /// `dispatch` was called on a store while one of its actions was running.
    #[error("Refusing to dispatch while another action of the same store is running.")]
    ReentrantDispatch,

    #[error(
        "Refusing to overwrite store props with parent-injected props. \
         The name(s) {} are passed down by the parent, resulting in a naming conflict.",
        .0.join(", ")
    )]
    NamingConflict(Vec<String>),

    #[error("Cannot parse arguments of type(s) [{}].", .0.join(", "))]
    UnparseableArguments(Vec<&'static str>),

    /// A handle outlived every `Store` referencing its slot table.
    #[error("The store this handle belongs to has been dropped.")]
    StoreDropped,
}

/// JSON type name used in error messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
