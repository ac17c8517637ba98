//! Payload shapes of the dispatch API.
//!
//! A [`Manifest`] is what a tablet receives when it asks for its ride. The tree
//! is fixed: manifest -> batches (`fact_rides`) -> items (`ride_points`) ->
//! order -> service object. Only `id`, `status` and the nesting keys are read
//! by the simulator. Every node keeps the object it was built from, so a
//! payload reserializes with its key order, nulls and unexpected value types
//! intact.

mod types;

pub use types::*;
