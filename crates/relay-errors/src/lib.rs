//! relay-errors
//!
//! The typed error taxonomy shared by every Relay crate.
//!
//! Handlers fail in one of two shapes: an untyped [`ErrorPayload`] (whatever
//! the business logic raised), or an already-typed [`Fault`] that the wrapper
//! passes through the cascade unchanged. The cascade's job is to convert the
//! former into the latter.

mod fault;
mod payload;

pub use fault::{ERROR_NAMESPACE, Fault, FaultKind};
pub use payload::{ErrorPayload, HandlerError};
