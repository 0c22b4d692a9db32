//! Actions and the dispatcher.
//!
//! An action is a pure function from a write-guarded view of the store (plus
//! arguments) to a diff object. `Store::dispatch` resolves the target, runs the
//! action and merges the diff into the store.

mod action;
mod dispatch;
mod write_actions;

pub use action::{Action, ActionHandle, ActionRef};
pub use write_actions::{prepare_write_actions, setter_name};
