//! End-to-end pipeline scenarios against the mock ports.

use std::sync::Arc;

use serde_json::{Value, json};

use relay_errors::{ErrorPayload, Fault, FaultKind, HandlerError};
use relay_sequence::{AwsEnv, MockInvoker, Sequence, box_envelope, unbox};
use relay_wrapper::{PlatformContext, Runtime, WrapperOptions};

fn aws() -> AwsEnv {
    AwsEnv {
        stage: "dev".into(),
        account_id: "123456789012".into(),
        region: "us-east-1".into(),
    }
}

fn platform(function_name: &str) -> PlatformContext {
    PlatformContext {
        function_name: function_name.into(),
        aws_request_id: "1234".into(),
        invoked_function_arn: None,
        remaining_time_ms: None,
    }
}

fn runtime(invoker: Arc<MockInvoker>) -> Runtime {
    Runtime::new(invoker).with_options(WrapperOptions::default().with_aws_env(aws()))
}

fn headers(pairs: &[(&str, &str)]) -> std::collections::BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Success paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bare_passthrough_performs_no_invocations() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let out = runtime
        .handle(json!({"n": 2}), platform("myFn"), |req, _ctx| async move {
            let n = req["n"].as_i64().unwrap_or(0);
            Ok::<Value, HandlerError>(json!({"n": n + 1}))
        })
        .await
        .unwrap();

    assert_eq!(out, json!({"n": 3}));
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn gateway_success_is_marshalled() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let event = json!({
        "headers": {"X-Correlation-Id": "c-1"},
        "body": "{\"n\":2}",
        "httpMethod": "POST",
        "requestContext": {}
    });
    let out = runtime
        .handle(event, platform("myFn"), |req, _ctx| async move {
            assert_eq!(req, json!({"n": 2}));
            Ok::<Value, HandlerError>(json!({"ok": true}))
        })
        .await
        .unwrap();

    assert_eq!(out["statusCode"], 200);
    assert_eq!(out["body"], "{\"ok\":true}");
    assert_eq!(out["headers"]["Content-Type"], "application/json");
    assert_eq!(out["headers"]["Access-Control-Allow-Origin"], "*");
    assert_eq!(out["headers"]["Access-Control-Allow-Credentials"], "true");
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn gateway_null_result_returns_204() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker);

    let event = json!({"headers": {}, "httpMethod": "GET", "body": null});
    let out = runtime
        .handle(event, platform("myFn"), |_req, _ctx| async move {
            Ok::<Value, HandlerError>(Value::Null)
        })
        .await
        .unwrap();

    assert_eq!(out["statusCode"], 204);
    assert_eq!(out["body"], "");
}

#[tokio::test]
async fn gateway_response_shaping_knobs_apply() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker);

    let event = json!({"headers": {}, "httpMethod": "POST", "body": "{}"});
    let out = runtime
        .handle(event, platform("myFn"), |_req, ctx| async move {
            ctx.set_status_code(201);
            ctx.set_content_type("text/plain");
            ctx.append_header("X-Resource-Id", "res-9");
            Ok::<Value, HandlerError>(json!("created"))
        })
        .await
        .unwrap();

    assert_eq!(out["statusCode"], 201);
    assert_eq!(out["body"], "created");
    assert_eq!(out["headers"]["Content-Type"], "text/plain");
    assert_eq!(out["headers"]["X-Resource-Id"], "res-9");
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequence progression
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sequence_continuation_invokes_next_step() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "a", "params": {}, "status": "completed"},
            {"arn": "b", "params": {}, "status": "active"},
            {"arn": "c", "params": {"fromA": {"lookup": "a.v"}}, "status": "assigned"}
        ],
        "responses": {"a": {"v": 1}}
    }))
    .unwrap();
    let event = box_envelope(
        &json!({}),
        &inbound,
        &headers(&[("X-Correlation-Id", "c-1")]),
    )
    .unwrap();

    let out = runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Ok::<Value, HandlerError>(json!({"v": 2}))
        })
        .await
        .unwrap();
    assert_eq!(out, json!({"v": 2}));

    // Exactly one downstream invocation, of C, with B finalized.
    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "arn:aws:lambda:us-east-1:123456789012:function:c-dev"
    );

    let forwarded = unbox(&calls[0].1).unwrap();
    assert_eq!(forwarded.headers["X-Correlation-Id"], "c-1");
    assert_eq!(forwarded.request["fromA"], json!(1));

    let steps = forwarded.sequence.steps();
    assert!(steps[1].is_completed());
    assert!(steps[2].is_active());
    assert_eq!(forwarded.sequence.responses()["b"], json!({"v": 2}));
}

#[tokio::test]
async fn registered_sequence_starts_with_seed_input() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let out = runtime
        .handle(json!({"n": 2}), platform("conductor"), |_req, ctx| async move {
            let mut seq = Sequence::empty();
            let mut params = serde_json::Map::new();
            params.insert("mode".into(), json!("fast"));
            seq.add("x", params);
            seq.add("y", serde_json::Map::new());
            ctx.register_sequence(seq);
            Ok::<Value, HandlerError>(json!({"seed": true}))
        })
        .await
        .unwrap();
    assert_eq!(out, json!({"seed": true}));

    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "arn:aws:lambda:us-east-1:123456789012:function:x-dev"
    );
    let forwarded = unbox(&calls[0].1).unwrap();
    // Conductor params plus the handler's return value as seed.
    assert_eq!(forwarded.request["mode"], "fast");
    assert_eq!(forwarded.request["seed"], true);
    assert!(forwarded.sequence.steps()[0].is_active());
}

#[tokio::test]
async fn final_step_notifies_tracker_with_success() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = Runtime::new(invoker.clone()).with_options(
        WrapperOptions::default()
            .with_aws_env(aws())
            .with_tracker("tracker"),
    );

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "a", "params": {}, "status": "completed"},
            {"arn": "b", "params": {}, "status": "active"}
        ],
        "responses": {"a": {"v": 1}}
    }))
    .unwrap();
    let event = box_envelope(
        &json!({}),
        &inbound,
        &headers(&[("X-Correlation-Id", "c-7")]),
    )
    .unwrap();

    runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Ok::<Value, HandlerError>(json!({"v": 2}))
        })
        .await
        .unwrap();

    // No assigned step remains, so the only call is the tracker's.
    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "arn:aws:lambda:us-east-1:123456789012:function:tracker-dev"
    );
    let status = &calls[0].1["status"];
    assert_eq!(status["status"], "success");
    assert_eq!(status["data"], json!({"v": 2}));
    assert_eq!(status["correlationId"], "c-7");
    assert_eq!(status["currentFn"], "b");
    assert_eq!(status["total"], 2);
    assert_eq!(status["current"], 2);
}

#[tokio::test]
async fn mid_sequence_tracker_reports_running() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = Runtime::new(invoker.clone()).with_options(
        WrapperOptions::default()
            .with_aws_env(aws())
            .with_tracker("tracker"),
    );

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "b", "params": {}, "status": "active"},
            {"arn": "c", "params": {}, "status": "assigned"}
        ],
        "responses": {}
    }))
    .unwrap();
    let event = box_envelope(&json!({}), &inbound, &headers(&[("X-Correlation-Id", "c-8")]))
        .unwrap();

    runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Ok::<Value, HandlerError>(json!({"v": 2}))
        })
        .await
        .unwrap();

    // Continuation first, tracker strictly after.
    let calls = invoker.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].0.contains("function:c-dev"));
    assert!(calls[1].0.contains("function:tracker-dev"));
    assert_eq!(calls[1].1["status"]["status"], "running");
}

// ─────────────────────────────────────────────────────────────────────────────
// Error paths
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn serverless_fault_passes_through_enriched() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let event = box_envelope(
        &json!({"n": 2}),
        &Sequence::empty(),
        &headers(&[("X-Correlation-Id", "c-123")]),
    )
    .unwrap();

    let err = runtime
        .handle(event, platform("myHandlerFunction"), |_req, _ctx| async move {
            Err::<Value, HandlerError>(Fault::serverless(403, "nope", "auth").into())
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, FaultKind::ServerlessError);
    assert_eq!(err.http_status, 403);
    assert_eq!(err.correlation_id.as_deref(), Some("c-123"));
    assert_eq!(err.request_id.as_deref(), Some("1234"));
    assert_eq!(err.function_name.as_deref(), Some("myHandlerFunction"));
    assert_eq!(err.classification.as_deref(), Some("myHandlerFunction/auth"));
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn matched_error_forwards_and_resolves() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    let event = json!({"headers": {"X-Correlation-Id": "c-1"}, "httpMethod": "POST", "body": "{}"});
    let out = runtime
        .handle(event, platform("myFn"), |_req, ctx| async move {
            ctx.errors(|m| {
                m.add_forward(|e| e.code.as_deref() == Some("X"), 500, "reporter");
            });
            Err::<Value, HandlerError>(ErrorPayload::with_code("boom", "X").into())
        })
        .await
        .unwrap();

    // Resolved by forwarding: empty 204 to the gateway, one reporter call.
    assert_eq!(out["statusCode"], 204);
    assert_eq!(out["body"], "");
    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "arn:aws:lambda:us-east-1:123456789012:function:reporter-dev"
    );
    assert_eq!(calls[0].1["message"], "boom");
    assert_eq!(calls[0].1["code"], "X");
}

#[tokio::test]
async fn unmatched_error_with_resolving_default_handler_returns_204() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker);

    let event = json!({"headers": {}, "httpMethod": "POST", "body": "{}"});
    let out = runtime
        .handle(event, platform("myFn"), |_req, ctx| async move {
            ctx.errors(|m| {
                m.default_handler(|_| true, 500);
            });
            Err::<Value, HandlerError>(HandlerError::raw("boom"))
        })
        .await
        .unwrap();

    assert_eq!(out["statusCode"], 204);
    assert_eq!(out["body"], "");
    assert_eq!(out["headers"]["Access-Control-Allow-Origin"], "*");
}

#[tokio::test]
async fn unmatched_error_surfaces_as_gateway_error_response() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker);

    let event = json!({"headers": {"X-Correlation-Id": "c-1"}, "httpMethod": "POST", "body": "{}"});
    let out = runtime
        .handle(event, platform("myFn"), |_req, _ctx| async move {
            Err::<Value, HandlerError>(HandlerError::raw("boom"))
        })
        .await
        .unwrap();

    assert_eq!(out["statusCode"], 500);
    let body: Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["errorType"], "unhandled-error");
    assert_eq!(body["errorMessage"], "boom");
    assert_eq!(body["correlationId"], "c-1");
    assert_eq!(body["requestId"], "1234");
}

#[tokio::test]
async fn non_gateway_error_is_thrown_with_correlation_id() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker);

    // Bare event: no inbound correlation id, so one is minted; the surfaced
    // fault must carry it either way.
    let err = runtime
        .handle(json!({"n": 1}), platform("myFn"), |_req, _ctx| async move {
            Err::<Value, HandlerError>(HandlerError::raw("boom"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, FaultKind::UnhandledError);
    assert!(err.correlation_id.is_some());
    assert_eq!(err.request_id.as_deref(), Some("1234"));
}

#[tokio::test]
async fn step_error_policy_gets_the_final_say() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = Runtime::new(invoker.clone())
        .with_options(WrapperOptions::default().with_aws_env(aws()))
        .register_error_handler("cleanup", |e| e.message == "recoverable");

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "b", "params": {}, "status": "active", "onError": {"handler": "named", "name": "cleanup"}},
            {"arn": "c", "params": {}, "status": "assigned"}
        ],
        "responses": {}
    }))
    .unwrap();
    let event = box_envelope(&json!({}), &inbound, &headers(&[("X-Correlation-Id", "c-1")]))
        .unwrap();

    let out = runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Err::<Value, HandlerError>(HandlerError::raw("recoverable"))
        })
        .await
        .unwrap();

    // Resolved by the conductor-level handler; nothing was invoked.
    assert_eq!(out, Value::Null);
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn typed_fault_still_runs_the_matcher_and_step_policy() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = Runtime::new(invoker.clone())
        .with_options(WrapperOptions::default().with_aws_env(aws()))
        .register_error_handler("cleanup", |e| e.code.as_deref() == Some("db-down"));

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "b", "params": {}, "status": "active", "onError": {"handler": "named", "name": "cleanup"}},
            {"arn": "c", "params": {}, "status": "assigned"}
        ],
        "responses": {}
    }))
    .unwrap();
    let event = box_envelope(&json!({}), &inbound, &headers(&[("X-Correlation-Id", "c-1")]))
        .unwrap();

    // A handler-typed (non-serverless) fault is not rethrown blindly: the
    // step's conductor-level policy still gets its say and resolves it.
    let out = runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Err::<Value, HandlerError>(
                Fault::new(FaultKind::UnhandledError, "db-down", 503, "db offline").into(),
            )
        })
        .await
        .unwrap();

    assert_eq!(out, Value::Null);
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn call_depth_limit_is_enforced() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = Runtime::new(invoker).with_options(
        WrapperOptions::default()
            .with_aws_env(aws())
            .with_call_depth_limit(2),
    );

    let event = box_envelope(
        &json!({}),
        &Sequence::empty(),
        &headers(&[("X-Correlation-Id", "c-1"), ("X-Call-Depth", "3")]),
    )
    .unwrap();

    let err = runtime
        .handle(event, platform("loopy"), |_req, _ctx| async move {
            if true {
                panic!("the handler must not run past the depth check");
            }
            Ok::<Value, HandlerError>(Value::Null)
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, FaultKind::CallDepthExceeded);
    assert_eq!(err.correlation_id.as_deref(), Some("c-1"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Degradation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_envelope_degrades_to_bare_request() {
    let invoker = Arc::new(MockInvoker::new());
    let runtime = runtime(invoker.clone());

    // Claims the orchestrated shape but the fields are wrong.
    let event = json!({"type": "orchestrated-message-body", "body": 42});
    let out = runtime
        .handle(event.clone(), platform("myFn"), |req, ctx| async move {
            assert!(!ctx.sequence().is_sequence());
            Ok::<Value, HandlerError>(req)
        })
        .await
        .unwrap();

    assert_eq!(out, event);
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn continuation_failure_does_not_fail_the_handler() {
    // The invoker refuses every call; the primary result must still return.
    let runtime = Runtime::new(Arc::new(relay_sequence::FailingInvoker))
        .with_options(WrapperOptions::default().with_aws_env(aws()));

    let inbound = Sequence::from_wire(&json!({
        "isSequence": true,
        "steps": [
            {"arn": "b", "params": {}, "status": "active"},
            {"arn": "c", "params": {}, "status": "assigned"}
        ],
        "responses": {}
    }))
    .unwrap();
    let event = box_envelope(&json!({}), &inbound, &headers(&[("X-Correlation-Id", "c-1")]))
        .unwrap();

    let out = runtime
        .handle(event, platform("b"), |_req, _ctx| async move {
            Ok::<Value, HandlerError>(json!({"v": 2}))
        })
        .await
        .unwrap();
    assert_eq!(out, json!({"v": 2}));
}
