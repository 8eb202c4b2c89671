use thiserror::Error;

use crate::events::{HandlerSignature, PayloadShape, Producer};

/// Failure raised while translating an event into cache calls.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("`{signature}` carried a {actual:?} payload, its routine expects {expected:?}")]
    UnexpectedPayload {
        signature: HandlerSignature,
        expected: PayloadShape,
        actual: PayloadShape,
    },
    #[error("`{signature}` is not an event its producer raises")]
    UndeclaredEvent { signature: HandlerSignature },
}

impl RefreshError {
    pub fn unexpected_payload(
        signature: HandlerSignature,
        expected: PayloadShape,
        actual: PayloadShape,
    ) -> Self {
        Self::UnexpectedPayload {
            signature,
            expected,
            actual,
        }
    }
}

/// Failure while attaching to or detaching from event producers.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("producer `{producer}` is not wired; wire every producer before initializing")]
    MissingProducer { producer: Producer },
    #[error("`{signature}` is not an event its producer raises")]
    UndeclaredEvent { signature: HandlerSignature },
    #[error("binder is already initialized")]
    AlreadyInitialized,
    #[error("binder was not built with unbinding support")]
    UnbindNotSupported,
    #[error("binder is not bound")]
    NotBound,
}
