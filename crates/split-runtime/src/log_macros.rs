/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need to
/// remember the string literal. The domain value is one of the four used by
/// this runtime: `sync`, `eval`, `store`, `sys`.
///
/// # Usage
///
/// ```ignore
/// use crate::log_macros::*;
///
/// sync_info!(sync, till = till, "split sync complete");
/// sync_warn!(store, error = %e, "segment apply failed");
/// sync_debug!(sys, interval_sec = period, "periodic task started");
/// ```
///
/// The macros accept any tracing-compatible field syntax after the domain
/// identifier. The domain identifier is **not** a string — it is a bare
/// identifier that the macro converts to a `&str` literal.

// ---------------------------------------------------------------------------
// Core macro — dispatches to the matching tracing level macro.
// ---------------------------------------------------------------------------

/// Internal helper. Do not call directly; use `sync_error!` … `sync_trace!`.
#[doc(hidden)]
macro_rules! sync_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

// ---------------------------------------------------------------------------
// Public per-level macros
// ---------------------------------------------------------------------------

/// Log at ERROR level with an automatic `domain` field.
macro_rules! sync_error {
    ($domain:ident, $($rest:tt)*) => {
        sync_log!(error, $domain, $($rest)*)
    };
}

/// Log at WARN level with an automatic `domain` field.
macro_rules! sync_warn {
    ($domain:ident, $($rest:tt)*) => {
        sync_log!(warn, $domain, $($rest)*)
    };
}

/// Log at INFO level with an automatic `domain` field.
macro_rules! sync_info {
    ($domain:ident, $($rest:tt)*) => {
        sync_log!(info, $domain, $($rest)*)
    };
}

/// Log at DEBUG level with an automatic `domain` field.
macro_rules! sync_debug {
    ($domain:ident, $($rest:tt)*) => {
        sync_log!(debug, $domain, $($rest)*)
    };
}

/// Log at TRACE level with an automatic `domain` field.
#[allow(unused_macros)]
macro_rules! sync_trace {
    ($domain:ident, $($rest:tt)*) => {
        sync_log!(trace, $domain, $($rest)*)
    };
}
