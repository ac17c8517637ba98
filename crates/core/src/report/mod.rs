//! Outcome collection.
//!
//! Device tasks push [`Outcome`]s through cloned [`OutcomeHandle`]s; a single
//! [`ResultAggregator`] drains the channel into the [`Report`] and, when
//! configured, mirrors each outcome into per-category files.

mod aggregator;
mod handle;
mod sink;
mod types;

pub use aggregator::*;
pub use handle::*;
pub use sink::*;
pub use types::*;
