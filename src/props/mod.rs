//! Normalization of binding declarations.
//!
//! A consumer declares which keys it reads, which it writes and which actions
//! it wants bound using one of several argument shapes. [`parse_props`]
//! reduces every accepted shape to a [`PropBindings`] pair of functions.

mod parse;
mod prop;

pub use parse::{parse_props, Arg, BindActions, BindFn, PropBindings, SelectState};
pub use prop::{BoundAction, Dispatcher, Prop, Props, Setter};
