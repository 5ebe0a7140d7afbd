//! relay-sequence
//!
//! The sequence model: a serializable plan describing a chain of function
//! invocations, the progression state machine that advances it, and the
//! dynamic-parameter resolution that feeds one step's output into the next.
//!
//! A *conductor* handler builds a [`Sequence`] with [`Sequence::add`] /
//! [`Sequence::on_condition`] / [`Sequence::on_error`] and starts it; every
//! downstream handler reconstructs the sequence from the inbound envelope
//! via [`unbox`], and the wrapper advances it with [`Sequence::next`].

mod arn;
mod condition;
mod envelope;
mod error;
mod invoker;
mod params;
mod sequence;
mod status;
mod step;

pub use arn::{AwsEnv, expand_arn, expand_function_arn};
pub use condition::Condition;
pub use envelope::{Unboxed, box_envelope, unbox};
pub use error::{Result, SequenceError};
pub use invoker::{FailingInvoker, InvokeError, Invoker, MockInvoker, SharedInvoker};
pub use params::{dynamic_path, dynamic_ref, lookup_path, resolve_params, short_fn_name};
pub use sequence::{NextInvocation, Sequence};
pub use status::{SequenceState, SequenceStatus};
pub use step::{FnType, SequenceStep, StepErrorHandler, StepStatus};
