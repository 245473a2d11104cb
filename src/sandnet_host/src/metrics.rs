use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use sandnet_common::SocketCallId;

use crate::net::policy::SyscallPolicy;
use crate::Result;

/// Counts every socket call by name and policy
pub const SOCKET_CALLS_TOTAL: &str = "sandnet_socket_calls_total";
/// Counts socket calls with an id outside the known set
pub const UNKNOWN_SOCKET_CALLS_TOTAL: &str = "sandnet_unknown_socket_calls_total";
/// Counts pass-through calls whose host call failed
pub const HOST_CALL_FAILURES_TOTAL: &str = "sandnet_host_call_failures_total";

/// The counters of one dispatcher, in a registry of their own so that
/// several dispatchers can coexist in one process.
#[derive(Debug, Clone)]
pub struct SocketCallMetrics {
    registry: Registry,
    calls: IntCounterVec,
    unknown_calls: IntCounter,
    host_failures: IntCounterVec,
}

impl SocketCallMetrics {
    /// Create the counters and register them
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let calls = register_int_counter_vec_with_registry!(
            Opts::new(SOCKET_CALLS_TOTAL, "Number of socket calls made by guests"),
            &["call", "policy"],
            registry
        )?;
        let unknown_calls = register_int_counter_with_registry!(
            Opts::new(
                UNKNOWN_SOCKET_CALLS_TOTAL,
                "Number of socket calls with an unrecognised call id"
            ),
            registry
        )?;
        let host_failures = register_int_counter_vec_with_registry!(
            Opts::new(
                HOST_CALL_FAILURES_TOTAL,
                "Number of socket calls whose host call returned an error"
            ),
            &["call"],
            registry
        )?;
        Ok(Self {
            registry,
            calls,
            unknown_calls,
            host_failures,
        })
    }

    pub(crate) fn record_call(&self, call: SocketCallId, policy: SyscallPolicy) {
        self.calls
            .with_label_values(&[call.name(), policy.name()])
            .inc();
    }

    pub(crate) fn record_unknown_call(&self) {
        self.unknown_calls.inc();
    }

    pub(crate) fn record_host_failure(&self, call: SocketCallId) {
        self.host_failures.with_label_values(&[call.name()]).inc();
    }

    /// How many times `call` was dispatched under `policy`
    pub fn calls(&self, call: SocketCallId, policy: SyscallPolicy) -> u64 {
        self.calls
            .with_label_values(&[call.name(), policy.name()])
            .get()
    }

    /// How many calls had an unrecognised id
    pub fn unknown_calls(&self) -> u64 {
        self.unknown_calls.get()
    }

    /// How many host calls for `call` failed
    pub fn host_failures(&self, call: SocketCallId) -> u64 {
        self.host_failures.with_label_values(&[call.name()]).get()
    }

    /// The registry holding these counters, for an exporter to gather
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the counters in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
