//! The wrapper pipeline: the entry/exit state machine around a user handler.
//!
//! Every wrapped invocation runs the same ordered stages — unbox, prep, run
//! the user function, continue the sequence, start any newly-registered
//! sequence, notify the tracker, marshal the response — with failures from
//! the user function routed through the error cascade. The current stage is
//! tracked in a [`Progress`] value so failures can name where they happened.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use serde_json::{Value, json};

use relay_envelope::{
    CALL_DEPTH_HEADER, CONTENT_TYPE_JSON, CORRELATION_ID_HEADER, GatewayResponse, call_depth,
    correlation_id_from, cors_headers, mint_correlation_id,
};
use relay_errors::{Fault, HandlerError};
use relay_sequence::{
    Sequence, SequenceError, SequenceStatus, SharedInvoker, Unboxed, box_envelope, expand_arn,
    expand_function_arn, short_fn_name, unbox,
};

use crate::cascade::{self, CascadeEnv, CascadeOutcome};
use crate::context::HandlerContext;
use crate::matcher::ErrorCallback;
use crate::options::WrapperOptions;
use crate::secrets::{MemorySecrets, SharedSecrets};
use crate::store::{MemoryStore, SharedStore};

// ─────────────────────────────────────────────────────────────────────────────
// Progress
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline stage, tracked so log lines and faults can name where an
/// invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Initializing,
    Unboxing,
    Prep,
    RunningFn,
    FnComplete,
    InvokeNext,
    SequenceStarting,
    TrackerStarting,
    ReturningValues,
}

impl Progress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::Initializing => "initializing",
            Progress::Unboxing => "unboxing",
            Progress::Prep => "prep",
            Progress::RunningFn => "running-fn",
            Progress::FnComplete => "fn-complete",
            Progress::InvokeNext => "invoke-next",
            Progress::SequenceStarting => "sequence-starting",
            Progress::TrackerStarting => "sequence-tracker-starting",
            Progress::ReturningValues => "returning-values",
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Platform context
// ─────────────────────────────────────────────────────────────────────────────

/// The platform-supplied fields of the current invocation.
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    pub function_name: String,
    pub aws_request_id: String,
    pub invoked_function_arn: Option<String>,
    pub remaining_time_ms: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

/// The orchestration runtime a handler is wrapped with.
pub struct Runtime {
    invoker: SharedInvoker,
    secrets: SharedSecrets,
    store: SharedStore,
    options: WrapperOptions,
    error_handlers: HashMap<String, ErrorCallback>,
}

impl Runtime {
    pub fn new(invoker: SharedInvoker) -> Self {
        Self {
            invoker,
            secrets: Arc::new(MemorySecrets::new()),
            store: Arc::new(MemoryStore::new()),
            options: WrapperOptions::default(),
            error_handlers: HashMap::new(),
        }
    }

    pub fn with_secrets(mut self, secrets: SharedSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_options(mut self, options: WrapperOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a named error callback resolvable from a step's
    /// conductor-level error policy.
    pub fn register_error_handler<C>(mut self, name: impl Into<String>, handler: C) -> Self
    where
        C: Fn(&relay_errors::ErrorPayload) -> bool + Send + Sync + 'static,
    {
        self.error_handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Expand a function name, preferring the configured deployment
    /// identity over the process environment.
    fn expand(&self, name: &str) -> Result<String, SequenceError> {
        match &self.options.aws_env {
            Some(aws) => Ok(expand_arn(name, aws)),
            None => expand_function_arn(name),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // The wrapped handler
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one invocation through the full pipeline.
    ///
    /// For gateway-proxy requests the return value is a marshalled gateway
    /// response (including error responses); for any other event shape, the
    /// handler's own return value, with failures returned as `Err`.
    pub async fn handle<F, Fut>(
        &self,
        event: Value,
        platform: PlatformContext,
        handler: F,
    ) -> Result<Value, Fault>
    where
        F: FnOnce(Value, Arc<HandlerContext>) -> Fut,
        Fut: Future<Output = Result<Value, HandlerError>>,
    {
        let mut progress = Progress::Initializing;
        tracing::trace!(stage = %progress, "pipeline stage");

        // Unboxing. Malformed envelopes degrade to a bare request with an
        // empty sequence rather than failing the invocation.
        progress = Progress::Unboxing;
        let unboxed = match unbox(&event) {
            Ok(unboxed) => unboxed,
            Err(e) => {
                tracing::warn!(stage = %progress, error = %e, "malformed envelope; continuing with a bare request");
                Unboxed::bare(event)
            }
        };
        let Unboxed {
            request,
            mut sequence,
            headers,
            gateway,
        } = unboxed;
        let is_gateway = gateway.is_some();

        // Prep: correlation identity, claims, the handler context.
        progress = Progress::Prep;
        let correlation_id = correlation_id_from(&headers).unwrap_or_else(mint_correlation_id);
        tracing::debug!(
            correlation_id = %correlation_id,
            function = %platform.function_name,
            stage = %progress,
            in_sequence = sequence.is_sequence(),
            "invocation unboxed"
        );

        let ctx = Arc::new(HandlerContext::new(
            correlation_id.clone(),
            platform.function_name.clone(),
            platform.aws_request_id.clone(),
            platform.remaining_time_ms,
            sequence.clone(),
            gateway,
            headers.clone(),
            self.secrets.clone(),
            self.store.clone(),
            self.invoker.clone(),
        ));

        if let Some(limit) = self.options.call_depth_limit {
            let depth = call_depth(&headers);
            if depth > limit {
                let mut fault = Fault::call_depth_exceeded(depth, limit);
                fault.enrich(
                    &platform.function_name,
                    &correlation_id,
                    &platform.aws_request_id,
                );
                return self.surface(fault, is_gateway, &correlation_id, &platform);
            }
        }

        // Run the user function.
        progress = Progress::RunningFn;
        tracing::trace!(stage = %progress, "pipeline stage");
        let outcome = match handler(request, Arc::clone(&ctx)).await {
            Ok(value) => value,
            Err(err) => {
                return self
                    .fail(
                        err,
                        ctx.as_ref(),
                        &sequence,
                        is_gateway,
                        &correlation_id,
                        &platform,
                    )
                    .await;
            }
        };
        progress = Progress::FnComplete;
        tracing::trace!(stage = %progress, "pipeline stage");

        // Continue the current chain.
        progress = Progress::InvokeNext;
        if sequence.is_sequence() && !sequence.is_done() {
            self.invoke_next(
                &mut sequence,
                &outcome,
                &headers,
                &correlation_id,
                &platform.function_name,
                progress,
            )
            .await;
        } else if sequence.is_sequence() {
            // Final step: finalize so observers see the full plan completed.
            sequence.finish_step(outcome.clone());
        }

        // Start a newly-registered chain, seeded with the handler's result.
        progress = Progress::SequenceStarting;
        if let Some(mut new_sequence) = ctx.take_registered_sequence() {
            self.start_registered(&mut new_sequence, &outcome, &correlation_id, progress)
                .await;
        }

        // Tracker notification; never fails the primary handler.
        progress = Progress::TrackerStarting;
        if let Some(tracker) = &self.options.sequence_tracker
            && sequence.is_sequence()
        {
            self.notify_tracker(
                tracker,
                &sequence,
                &outcome,
                &correlation_id,
                &platform,
                progress,
            )
            .await;
        }

        // Marshal the response.
        progress = Progress::ReturningValues;
        tracing::trace!(stage = %progress, "pipeline stage");
        if is_gateway {
            Ok(marshal_success(&outcome, ctx.as_ref()))
        } else {
            Ok(outcome)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline stages
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance the sequence and fire the next step. Failures are logged and
    /// swallowed so the primary result still reaches the caller.
    async fn invoke_next(
        &self,
        sequence: &mut Sequence,
        outcome: &Value,
        headers: &BTreeMap<String, String>,
        correlation_id: &str,
        current_fn: &str,
        stage: Progress,
    ) {
        let target = match sequence.next(outcome.clone()) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "failed to advance the sequence");
                return;
            }
        };
        let next_headers = next_headers(headers, correlation_id, &target.arn, current_fn);
        let envelope = match box_envelope(&target.body, sequence, &next_headers) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "failed to box the continuation envelope");
                return;
            }
        };
        let arn = match self.expand(&target.arn) {
            Ok(arn) => arn,
            Err(e) => {
                tracing::warn!(stage = %stage, target = %target.arn, error = %e, "cannot expand continuation target");
                return;
            }
        };
        tracing::debug!(stage = %stage, arn = %arn, "continuing sequence");
        if let Err(e) = self.invoker.invoke(&arn, envelope).await {
            tracing::warn!(stage = %stage, arn = %arn, error = %e, "continuation invoke failed");
        }
    }

    /// Fire the first step of a sequence the handler registered during this
    /// invocation. Failures are logged and swallowed.
    async fn start_registered(
        &self,
        sequence: &mut Sequence,
        seed: &Value,
        correlation_id: &str,
        stage: Progress,
    ) {
        let target = match sequence.next(seed.clone()) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "failed to start the registered sequence");
                return;
            }
        };
        let headers = BTreeMap::from([(
            CORRELATION_ID_HEADER.to_string(),
            correlation_id.to_string(),
        )]);
        let envelope = match box_envelope(&target.body, sequence, &headers) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "failed to box the new-sequence envelope");
                return;
            }
        };
        match self.expand(&target.arn) {
            Ok(arn) => {
                tracing::debug!(stage = %stage, arn = %arn, "starting registered sequence");
                if let Err(e) = self.invoker.invoke(&arn, envelope).await {
                    tracing::warn!(stage = %stage, arn = %arn, error = %e, "new-sequence invoke failed");
                }
            }
            Err(e) => {
                tracing::warn!(stage = %stage, target = %target.arn, error = %e, "cannot expand new-sequence target");
            }
        }
    }

    /// Publish a progression report to the configured tracker.
    async fn notify_tracker(
        &self,
        tracker: &str,
        sequence: &Sequence,
        outcome: &Value,
        correlation_id: &str,
        platform: &PlatformContext,
        stage: Progress,
    ) {
        // Success only once nothing is active or assigned; an in-flight
        // continuation still reports as running.
        let status = if sequence.is_done() && sequence.active().is_none() {
            SequenceStatus::success(
                sequence,
                correlation_id,
                &platform.function_name,
                outcome.clone(),
            )
        } else {
            SequenceStatus::running(sequence, correlation_id, &platform.function_name)
        };
        let payload = json!({ "status": status });
        match self.expand(tracker) {
            Ok(arn) => {
                if let Err(e) = self.invoker.invoke(&arn, payload).await {
                    tracing::warn!(stage = %stage, arn = %arn, error = %e, "tracker invoke failed");
                }
            }
            Err(e) => {
                tracing::warn!(stage = %stage, target = %tracker, error = %e, "cannot expand tracker target");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error paths
    // ─────────────────────────────────────────────────────────────────────────

    /// Route a handler failure through the cascade and surface the result.
    async fn fail(
        &self,
        err: HandlerError,
        ctx: &HandlerContext,
        sequence: &Sequence,
        is_gateway: bool,
        correlation_id: &str,
        platform: &PlatformContext,
    ) -> Result<Value, Fault> {
        let step_policy = sequence.active().and_then(|s| s.on_error.clone());
        let cascade_env = CascadeEnv {
            matcher: ctx.take_matcher(),
            step_policy,
            named_handlers: &self.error_handlers,
            invoker: self.invoker.as_ref(),
            aws_env: self.options.aws_env.as_ref(),
            function_name: &platform.function_name,
            correlation_id,
            request_id: &platform.aws_request_id,
        };
        match cascade::run(cascade_env, err).await {
            CascadeOutcome::Resolved => {
                if is_gateway {
                    Ok(resolved_gateway_response())
                } else {
                    Ok(Value::Null)
                }
            }
            CascadeOutcome::Surfaced(fault) => {
                self.surface(fault, is_gateway, correlation_id, platform)
            }
        }
    }

    /// Surface a fault: a gateway error response for proxy requests, an
    /// `Err` for everything else so the platform's retry policy applies.
    fn surface(
        &self,
        mut fault: Fault,
        is_gateway: bool,
        correlation_id: &str,
        platform: &PlatformContext,
    ) -> Result<Value, Fault> {
        if fault.correlation_id.is_none() {
            fault.correlation_id = Some(correlation_id.to_string());
        }
        if fault.request_id.is_none() {
            fault.request_id = Some(platform.aws_request_id.clone());
        }
        tracing::warn!(
            correlation_id = %correlation_id,
            code = %fault.code,
            kind = fault.kind.as_str(),
            "invocation surfaced a fault"
        );
        if is_gateway {
            Ok(marshal_fault(&fault))
        } else {
            Err(fault)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Continuation headers
// ─────────────────────────────────────────────────────────────────────────────

/// Headers for the continuation envelope: propagate the inbound set, pin
/// the correlation id, and carry the self-call counter only when the next
/// target is the current function again.
fn next_headers(
    headers: &BTreeMap<String, String>,
    correlation_id: &str,
    target_arn: &str,
    current_fn: &str,
) -> BTreeMap<String, String> {
    let mut next = headers.clone();
    next.retain(|k, _| !k.eq_ignore_ascii_case(CALL_DEPTH_HEADER));
    next.insert(
        CORRELATION_ID_HEADER.to_string(),
        correlation_id.to_string(),
    );

    let target_name = short_fn_name(target_arn);
    let self_call = !current_fn.is_empty()
        && (target_name == current_fn
            || target_name
                .strip_prefix(current_fn)
                .is_some_and(|rest| rest.starts_with('-')));
    if self_call {
        next.insert(
            CALL_DEPTH_HEADER.to_string(),
            (call_depth(headers) + 1).to_string(),
        );
    }
    next
}

// ─────────────────────────────────────────────────────────────────────────────
// Marshalling
// ─────────────────────────────────────────────────────────────────────────────

/// Marshal a successful handler result as a gateway response.
fn marshal_success(outcome: &Value, ctx: &HandlerContext) -> Value {
    let body = marshal_body(outcome);
    let status = ctx
        .status_code()
        .unwrap_or(if body.is_empty() { 204 } else { 200 });

    let mut headers = cors_headers();
    headers.insert(
        "Content-Type".to_string(),
        ctx.content_type()
            .unwrap_or_else(|| CONTENT_TYPE_JSON.to_string()),
    );
    headers.extend(ctx.extra_headers());

    response_value(GatewayResponse::new(status, headers, body))
}

/// Marshal a surfaced fault as a gateway error response.
fn marshal_fault(fault: &Fault) -> Value {
    let mut headers = cors_headers();
    headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
    let body = serde_json::to_string(&fault.gateway_body()).unwrap_or_default();
    response_value(GatewayResponse::new(fault.http_status, headers, body))
}

/// The empty 204 returned when the cascade fully resolved an error.
fn resolved_gateway_response() -> Value {
    response_value(GatewayResponse::new(204, cors_headers(), String::new()))
}

fn marshal_body(outcome: &Value) -> String {
    match outcome {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn response_value(response: GatewayResponse) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|_| json!({"statusCode": 500}))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
