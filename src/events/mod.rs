//! Service-layer events: who raises what, with which payload, and how to
//! subscribe to it.

mod definition;
mod signature;
mod source;

pub use definition::{EventArgs, EventDefinition};
pub use signature::{EventName, HandlerSignature, PayloadShape, Producer};
pub use source::{
    EventHandler, EventSource, EventSources, InMemoryServices, ServiceEvents, SubscriptionHandle,
};
