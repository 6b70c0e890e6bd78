// std
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;
// crates
// internal

/// Report panics through `tracing` so they reach the configured log sink.
pub fn panic_hook(info: &PanicHookInfo) {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));
    let location = info.location().map(ToString::to_string);
    let backtrace = Backtrace::capture();
    let note = (backtrace.status() == BacktraceStatus::Disabled)
        .then_some("set RUST_BACKTRACE=1 to capture a backtrace");

    tracing::error!(
        panic.payload = message,
        panic.location = location,
        panic.backtrace = %backtrace,
        panic.note = note,
        "panicked",
    );
}
