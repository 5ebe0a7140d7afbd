//! User-registered error expectations and the default policy.
//!
//! Handlers register expectations against the failures they anticipate;
//! the cascade consults them in registration order and applies the first
//! match's disposition. Anything unmatched falls to the default policy.

use std::sync::Arc;

use relay_errors::{ErrorPayload, Fault};

/// A predicate over the raised error payload.
pub type Predicate = Arc<dyn Fn(&ErrorPayload) -> bool + Send + Sync>;

/// A callback that attempts to resolve an error; `true` means resolved.
pub type ErrorCallback = Arc<dyn Fn(&ErrorPayload) -> bool + Send + Sync>;

/// What to do when an expectation matches.
#[derive(Clone)]
pub enum Disposition {
    /// Run a callback; a `true` return resolves the error.
    Callback(ErrorCallback),
    /// Invoke the named function with the error payload; always resolves.
    ForwardTo(String),
}

/// One registered expectation.
#[derive(Clone)]
pub struct Expectation {
    pub(crate) predicate: Predicate,
    /// HTTP status used when the match surfaces as a `HandledError`.
    pub(crate) status: u16,
    pub(crate) disposition: Option<Disposition>,
}

impl Expectation {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn disposition(&self) -> Option<&Disposition> {
        self.disposition.as_ref()
    }
}

/// Policy applied when no expectation matches.
#[derive(Clone)]
pub enum DefaultPolicy {
    /// Surface as an `UnhandledError` with this status.
    Default { status: u16 },
    /// Run a callback; `true` resolves, otherwise surface as unhandled.
    HandlerFn { handler: ErrorCallback, status: u16 },
    /// Invoke the named function with the error payload and swallow locally.
    Forwarding { arn: String },
    /// Surface this user-provided fault instead.
    DefaultError { fault: Fault },
}

/// HTTP status used when nothing more specific was configured.
const DEFAULT_ERROR_STATUS: u16 = 500;

/// The ordered collection of expectations plus the default policy.
#[derive(Clone)]
pub struct ErrorMatcher {
    expectations: Vec<Expectation>,
    default_policy: DefaultPolicy,
}

impl Default for ErrorMatcher {
    fn default() -> Self {
        Self {
            expectations: Vec::new(),
            default_policy: DefaultPolicy::Default {
                status: DEFAULT_ERROR_STATUS,
            },
        }
    }
}

impl ErrorMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Expect errors matching `predicate`; on match, wrap and re-surface
    /// with `status`.
    pub fn add<P>(&mut self, predicate: P, status: u16) -> &mut Self
    where
        P: Fn(&ErrorPayload) -> bool + Send + Sync + 'static,
    {
        self.expectations.push(Expectation {
            predicate: Arc::new(predicate),
            status,
            disposition: None,
        });
        self
    }

    /// Expect errors matching `predicate` and try to resolve them locally.
    pub fn add_callback<P, C>(&mut self, predicate: P, status: u16, callback: C) -> &mut Self
    where
        P: Fn(&ErrorPayload) -> bool + Send + Sync + 'static,
        C: Fn(&ErrorPayload) -> bool + Send + Sync + 'static,
    {
        self.expectations.push(Expectation {
            predicate: Arc::new(predicate),
            status,
            disposition: Some(Disposition::Callback(Arc::new(callback))),
        });
        self
    }

    /// Expect errors matching `predicate` and forward them to `arn`.
    pub fn add_forward<P>(&mut self, predicate: P, status: u16, arn: impl Into<String>) -> &mut Self
    where
        P: Fn(&ErrorPayload) -> bool + Send + Sync + 'static,
    {
        self.expectations.push(Expectation {
            predicate: Arc::new(predicate),
            status,
            disposition: Some(Disposition::ForwardTo(arn.into())),
        });
        self
    }

    /// Surface unmatched errors with this status.
    pub fn default_status(&mut self, status: u16) -> &mut Self {
        self.default_policy = DefaultPolicy::Default { status };
        self
    }

    /// Run a callback for unmatched errors; `true` resolves.
    pub fn default_handler<C>(&mut self, handler: C, status: u16) -> &mut Self
    where
        C: Fn(&ErrorPayload) -> bool + Send + Sync + 'static,
    {
        self.default_policy = DefaultPolicy::HandlerFn {
            handler: Arc::new(handler),
            status,
        };
        self
    }

    /// Forward unmatched errors to `arn` and swallow locally.
    pub fn forward_unmatched(&mut self, arn: impl Into<String>) -> &mut Self {
        self.default_policy = DefaultPolicy::Forwarding { arn: arn.into() };
        self
    }

    /// Surface this fault for unmatched errors.
    pub fn default_error(&mut self, fault: Fault) -> &mut Self {
        self.default_policy = DefaultPolicy::DefaultError { fault };
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// The first expectation whose predicate matches, in registration order.
    pub fn first_match(&self, payload: &ErrorPayload) -> Option<&Expectation> {
        self.expectations.iter().find(|e| (e.predicate)(payload))
    }

    pub fn default_policy(&self) -> &DefaultPolicy {
        &self.default_policy
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
