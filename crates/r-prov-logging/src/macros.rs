//! ---
//! prov_section: "03-persistence-logging"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Structured logging adapters and sinks."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
/// Shared expansion for the leveled macros below.
#[doc(hidden)]
#[macro_export]
macro_rules! __prov_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            tracking_id = ctx.tracking_id.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            host = ctx.host.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with request context.
#[macro_export]
macro_rules! prov_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with request context.
#[macro_export]
macro_rules! prov_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with request context.
#[macro_export]
macro_rules! prov_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with request context.
#[macro_export]
macro_rules! prov_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__prov_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
