//! Simulated device identities.
//!
//! Identities come from a JSON file holding either ready-made auth tokens or
//! logins that still need to be exchanged for tokens through a
//! [`TokenIssuer`]. They are resolved once, before any request is made.

mod loader;
mod types;

pub use loader::{load_device_codes, load_identities, resolve_identities};
pub use types::*;
