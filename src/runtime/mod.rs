//! Dependency tracking for read functions.
//!
//! A [`TrackingView`] records every key read through it into an explicit
//! [`ReadSet`] and subscribes its owner to those keys. A [`Tracker`] drives
//! one view per pass, keeps the subscriptions in sync with the latest
//! read-set and memoizes the result so that downstream consumers only hear
//! about changed output.

mod tracker;
mod view;

pub use tracker::Tracker;
pub use view::{ReadSet, TrackingView};
