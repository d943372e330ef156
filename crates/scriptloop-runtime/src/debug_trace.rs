#![forbid(unsafe_code)]

//! Opt-in stderr tracing for the run loop, controlled by environment variable.
//!
//! Set `SCRIPTLOOP_DEBUG_TRACE=1` to print timestamped lines for every
//! request, checkpoint, and lifecycle transition. This is independent of any
//! `tracing` subscriber and is meant for chasing ordering bugs between the
//! caller thread and the runner thread.
//!
//! ```bash
//! SCRIPTLOOP_DEBUG_TRACE=1 cargo test -p scriptloop-runtime
//! ```

use std::sync::LazyLock;
use std::time::Instant;

static DEBUG_TRACE_ENABLED: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("SCRIPTLOOP_DEBUG_TRACE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
});

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Whether `SCRIPTLOOP_DEBUG_TRACE` was set when first checked.
#[inline]
pub fn is_enabled() -> bool {
    *DEBUG_TRACE_ENABLED
}

/// Milliseconds since the first trace call in this process.
#[inline]
pub fn elapsed_ms() -> u64 {
    START_TIME.elapsed().as_millis() as u64
}

/// Print a timestamped line to stderr when `SCRIPTLOOP_DEBUG_TRACE=1`.
///
/// ```ignore
/// debug_trace!("dequeued {} (pending={})", request.name(), pending);
/// ```
#[macro_export]
macro_rules! debug_trace {
    ($($arg:tt)*) => {
        if $crate::debug_trace::is_enabled() {
            eprintln!(
                "[scriptloop {:>8}ms {}] {}",
                $crate::debug_trace::elapsed_ms(),
                ::std::thread::current().name().unwrap_or("?"),
                format_args!($($arg)*)
            );
        }
    };
}
