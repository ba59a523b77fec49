//! The `metrics` module defines the hook invoked around every chain call. The agent owns no
//! metrics storage; a [RpcRecorder] implementation decides what to do with each observation.

use serde::Serialize;
use std::time::Duration;

/// The closed taxonomy chain call failures are bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorClass {
    /// The call succeeded.
    None,
    /// The chain understood the call and rejected it (a revert or an illegal move).
    Protocol,
    /// The call never got a well-formed answer: connection failures and timeouts.
    Transport,
    /// The requested game or data does not exist.
    NotFound,
    /// Anything else.
    Unclassified,
}

impl ErrorClass {
    /// Returns a label suitable for a metrics dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::None => "<nil>",
            ErrorClass::Protocol => "protocol",
            ErrorClass::Transport => "transport",
            ErrorClass::NotFound => "<not found>",
            ErrorClass::Unclassified => "<unknown>",
        }
    }
}

/// The [RpcRecorder] trait receives one observation per chain call.
pub trait RpcRecorder: Send + Sync {
    /// Records a call to `method` that took `elapsed` and ended with `class`.
    fn record_request(&self, method: &'static str, elapsed: Duration, class: ErrorClass);
}

/// A [RpcRecorder] that discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl RpcRecorder for NoopRecorder {
    fn record_request(&self, _: &'static str, _: Duration, _: ErrorClass) {}
}

/// A [RpcRecorder] that emits every observation as a trace event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl RpcRecorder for TracingRecorder {
    fn record_request(&self, method: &'static str, elapsed: Duration, class: ErrorClass) {
        tracing::trace!(
            target: "rpc-metrics",
            method,
            elapsed_ms = elapsed.as_millis() as u64,
            error = class.as_str(),
            "chain call"
        );
    }
}
