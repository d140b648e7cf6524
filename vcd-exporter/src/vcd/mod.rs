//! vCloud Director REST client (JSON representation, API version 31.0).

pub mod client;
pub mod wire;

pub use client::{VcdConnector, VcdSession};
