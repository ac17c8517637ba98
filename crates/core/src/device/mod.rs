//! Simulated tablet devices.
//!
//! A [`Device`] holds the identity and last observed state of one tablet;
//! [`DeviceClient`] performs its calls through a [`Transport`].

mod client;
mod transport;
mod types;

pub use client::DeviceClient;
pub use transport::{DeviceRequest, HttpTransport, RawResponse, Transport, TransportError};
pub use types::Device;
