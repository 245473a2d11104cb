use std::sync::Arc;

use sandnet_common::SocketCallId;
use tracing::{debug, instrument, warn, Span};

use super::args::ArgumentBlock;
use super::host::HostNet;
use super::policy::{lookup, Route};
use crate::error::SandnetError::UnsupportedOperation;
use crate::log_then_return;
use crate::mem::guest_addr::GuestAddress;
use crate::mem::guest_mem::GuestMemory;
use crate::metrics::SocketCallMetrics;
use crate::Result;

/// The single entry point for a guest's `socketcall` syscall.
///
/// A dispatcher holds no per-instance state: the guest memory of the
/// calling instance is passed to every `dispatch`. One dispatcher can
/// therefore be shared by any number of module instances on any number
/// of threads.
#[derive(Debug)]
pub struct SocketCallDispatcher {
    host: Arc<dyn HostNet>,
    metrics: SocketCallMetrics,
}

impl SocketCallDispatcher {
    /// Create a dispatcher whose pass-through calls go to `host`
    pub fn new(host: Arc<dyn HostNet>) -> Result<Self> {
        Ok(Self {
            host,
            metrics: SocketCallMetrics::new()?,
        })
    }

    /// The counters of this dispatcher
    pub fn metrics(&self) -> &SocketCallMetrics {
        &self.metrics
    }

    /// Handle socket call number `call` whose argument block is at
    /// `args_ptr` in `mem`, and return the value the guest sees.
    ///
    /// Unknown call numbers are logged and answered with `0`. A failed
    /// host call is answered with its negated `errno`. `Err` means the
    /// guest must be trapped: either it passed something that is not
    /// inside its memory, or it asked for an operation that is never
    /// permitted.
    #[instrument(err(Debug), skip(self, mem), parent = Span::current(), level = "Trace")]
    pub fn dispatch(&self, mem: &mut GuestMemory, call: i32, args_ptr: i32) -> Result<i32> {
        let Some(id) = SocketCallId::from_raw(call) else {
            self.metrics.record_unknown_call();
            warn!("Unrecognised socketcall {} ({})", call, args_ptr);
            return Ok(0);
        };

        let entry = lookup(id);
        let name = entry.call.name();
        self.metrics.record_call(entry.call, entry.route.policy());

        match entry.route {
            Route::Forbidden => {
                log_then_return!(UnsupportedOperation(name.to_string()));
            }
            Route::Stub => {
                debug!("S - {} - {} {}", name, call, args_ptr);
                Ok(0)
            }
            Route::PassThrough(handler) => {
                let args =
                    ArgumentBlock::read(mem, entry.call, GuestAddress::from_guest_i32(args_ptr))?;
                debug!("S - {} - {}", name, args);
                match handler(self.host.as_ref(), mem, &args)? {
                    Ok(ret) => Ok(i32::try_from(ret)?),
                    Err(errno) => {
                        self.metrics.record_host_failure(entry.call);
                        debug!("S - {} - host error {}", name, errno);
                        Ok(errno.as_guest_return())
                    }
                }
            }
        }
    }
}
