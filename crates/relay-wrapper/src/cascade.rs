//! The error cascade.
//!
//! Entered on any failure from the user function or later pipeline stages.
//! Layers, in order: serverless passthrough, the user-registered matcher,
//! the default policy, and finally the active step's conductor-level
//! policy, which gets the final say. Only a `ServerlessError` bypasses the
//! chain; every other failure — typed or not — gets the matcher and step
//! policies, with an already-typed fault re-emitted as a rethrow rather
//! than wrapped a second time.
//!
//! A failure *inside* the cascade never escapes raw: it becomes an
//! `ErrorWithinError`.

use std::collections::HashMap;

use serde_json::json;

use relay_errors::{ErrorPayload, Fault, FaultKind, HandlerError};
use relay_sequence::{AwsEnv, Invoker, StepErrorHandler, expand_arn, expand_function_arn};

use crate::matcher::{DefaultPolicy, Disposition, ErrorCallback, ErrorMatcher};

/// What the cascade decided.
pub(crate) enum CascadeOutcome {
    /// The error was fully resolved; the handler's pre-error result stands.
    Resolved,
    /// The error surfaces as this fault.
    Surfaced(Fault),
}

/// Everything the cascade needs from the invocation.
pub(crate) struct CascadeEnv<'a> {
    pub matcher: ErrorMatcher,
    pub step_policy: Option<StepErrorHandler>,
    pub named_handlers: &'a HashMap<String, ErrorCallback>,
    pub invoker: &'a dyn Invoker,
    pub aws_env: Option<&'a AwsEnv>,
    pub function_name: &'a str,
    pub correlation_id: &'a str,
    pub request_id: &'a str,
}

pub(crate) async fn run(env: CascadeEnv<'_>, err: HandlerError) -> CascadeOutcome {
    let payload = err.payload();
    let typed = match err {
        HandlerError::Fault(mut fault) => {
            // Caller-typed serverless errors pass through unchanged, only
            // enriched with the invocation identity.
            if fault.kind == FaultKind::ServerlessError {
                fault.enrich(env.function_name, env.correlation_id, env.request_id);
                return CascadeOutcome::Surfaced(fault);
            }
            // Any other typed fault runs the same chain as an untyped
            // failure. The original is kept so a wrap further down re-emits
            // it as a rethrow instead of nesting another fault around it.
            Some(fault)
        }
        HandlerError::Raw(_) => None,
    };

    let primary = match env.matcher.first_match(&payload) {
        Some(expectation) => {
            tracing::debug!(
                code = payload.code.as_deref().unwrap_or(""),
                status = expectation.status(),
                "matched a registered error expectation"
            );
            match expectation.disposition() {
                None => CascadeOutcome::Surfaced(wrap_or_rethrow(typed.as_ref(), || {
                    Fault::handled(expectation.status(), &payload)
                })),
                Some(Disposition::Callback(callback)) => {
                    if callback(&payload) {
                        CascadeOutcome::Resolved
                    } else {
                        CascadeOutcome::Surfaced(wrap_or_rethrow(typed.as_ref(), || {
                            Fault::handled(expectation.status(), &payload)
                        }))
                    }
                }
                Some(Disposition::ForwardTo(arn)) => {
                    match forward(&env, arn, &payload, json!(payload)).await {
                        Ok(()) => CascadeOutcome::Resolved,
                        Err(fault) => CascadeOutcome::Surfaced(fault),
                    }
                }
            }
        }
        None => apply_default_policy(&env, &payload, typed.as_ref()).await,
    };

    // Conductor-level policy on the active step has the final say over
    // anything still surfacing.
    let surfaced = matches!(primary, CascadeOutcome::Surfaced(_));
    if surfaced && let Some(policy) = env.step_policy.clone() {
        apply_step_policy(&env, policy, &payload, primary).await
    } else {
        primary
    }
}

/// Wrap an untyped failure, or re-emit an already-typed one as a rethrow
/// instead of nesting another fault around it.
fn wrap_or_rethrow(typed: Option<&Fault>, wrap: impl FnOnce() -> Fault) -> Fault {
    match typed {
        Some(original) => Fault::rethrow(original),
        None => wrap(),
    }
}

async fn apply_default_policy(
    env: &CascadeEnv<'_>,
    payload: &ErrorPayload,
    typed: Option<&Fault>,
) -> CascadeOutcome {
    match env.matcher.default_policy() {
        DefaultPolicy::Default { status } => {
            CascadeOutcome::Surfaced(wrap_or_rethrow(typed, || Fault::unhandled(*status, payload)))
        }
        DefaultPolicy::HandlerFn { handler, status } => {
            if handler(payload) {
                CascadeOutcome::Resolved
            } else {
                CascadeOutcome::Surfaced(wrap_or_rethrow(typed, || {
                    Fault::unhandled(*status, payload)
                }))
            }
        }
        DefaultPolicy::Forwarding { arn } => {
            match forward(env, arn, payload, json!(payload)).await {
                Ok(()) => CascadeOutcome::Resolved,
                Err(fault) => CascadeOutcome::Surfaced(fault),
            }
        }
        DefaultPolicy::DefaultError { fault } => {
            // An explicit substitute wins over rethrow preservation.
            CascadeOutcome::Surfaced(Fault::default_error(fault, payload))
        }
    }
}

async fn apply_step_policy(
    env: &CascadeEnv<'_>,
    policy: StepErrorHandler,
    payload: &ErrorPayload,
    primary: CascadeOutcome,
) -> CascadeOutcome {
    match policy {
        StepErrorHandler::Named { name } => match env.named_handlers.get(&name) {
            Some(handler) if handler(payload) => CascadeOutcome::Resolved,
            Some(_) => primary,
            None => {
                tracing::warn!(name = %name, "step error handler is not registered");
                primary
            }
        },
        StepErrorHandler::Forward { arn, params } => {
            let body = json!({ "error": payload, "params": params });
            match forward(env, &arn, payload, body).await {
                Ok(()) => CascadeOutcome::Resolved,
                Err(fault) => CascadeOutcome::Surfaced(fault),
            }
        }
    }
}

/// Invoke an error-forwarding target. Failures here are cascade failures
/// and wrap as `ErrorWithinError`.
async fn forward(
    env: &CascadeEnv<'_>,
    arn: &str,
    payload: &ErrorPayload,
    body: serde_json::Value,
) -> Result<(), Fault> {
    let target = match env.aws_env {
        Some(aws) => expand_arn(arn, aws),
        None => expand_function_arn(arn).map_err(|e| {
            Fault::error_within_error(format!("cannot expand forward target {arn}: {e}"), payload)
        })?,
    };
    env.invoker.invoke(&target, body).await.map_err(|e| {
        Fault::error_within_error(format!("forwarding to {target} failed: {e}"), payload)
    })?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
