//! Keeps a distributed cache consistent with content-management changes by
//! turning service-layer events into targeted invalidations.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod infra;
pub mod refresher;
pub mod replay;

mod util;
