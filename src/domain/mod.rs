//! Domain payload types carried by service-layer events.

pub mod entities;
pub mod error;
pub mod types;
