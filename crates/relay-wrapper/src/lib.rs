//! relay-wrapper
//!
//! The orchestration runtime embedded in every handler: on entry it unboxes
//! the inbound event and assembles a per-invocation [`HandlerContext`]; on
//! exit it continues the sequence, starts any newly-registered sequence,
//! notifies the tracker, and marshals the response — or routes a failure
//! through the error cascade.
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_wrapper::{HandlerError, MockInvoker, PlatformContext, Runtime};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), relay_wrapper::Fault> {
//! let runtime = Runtime::new(Arc::new(MockInvoker::new()));
//! let out = runtime
//!     .handle(json!({"n": 2}), PlatformContext::default(), |req, _ctx| async move {
//!         Ok::<_, HandlerError>(json!({"n": req["n"].as_i64().unwrap_or(0) + 1}))
//!     })
//!     .await?;
//! # let _ = out;
//! # Ok(())
//! # }
//! ```

mod cascade;
mod context;
mod matcher;
mod options;
mod pipeline;
mod secrets;
mod store;

pub use context::HandlerContext;
pub use matcher::{DefaultPolicy, Disposition, ErrorCallback, ErrorMatcher, Expectation, Predicate};
pub use options::WrapperOptions;
pub use pipeline::{PlatformContext, Progress, Runtime};
pub use secrets::{MemorySecrets, SecretError, SecretStore, SharedSecrets};
pub use store::{KeyValueStore, MemoryStore, SharedStore, StoreError};

// The types a handler works with day to day, re-exported so most handlers
// only need this crate.
pub use relay_errors::{ErrorPayload, Fault, FaultKind, HandlerError};
pub use relay_sequence::{
    Condition, Invoker, MockInvoker, Sequence, SequenceStatus, SharedInvoker, StepErrorHandler,
};
