//! Crate-internal logging macros.
//!
//! With the `tracing` feature on, every macro forwards to the matching `tracing` macro with the
//! target pinned to `event_feed`. With it off they only borrow their field expressions, so call
//! sites compile unchanged and cost nothing.

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { tracing::error!(target: "event_feed", $($arg)*) };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { tracing::warn!(target: "event_feed", $($arg)*) };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { tracing::info!(target: "event_feed", $($arg)*) };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { tracing::debug!(target: "event_feed", $($arg)*) };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { tracing::trace!(target: "event_feed", $($arg)*) };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__discard_fields!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__discard_fields!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__discard_fields!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__discard_fields!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__discard_fields!($($arg)*) };
}

/// Walks a `tracing`-style argument list and borrows every field value so that variables used
/// only for logging don't trigger unused warnings.
#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __discard_fields {
    ($field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__discard_fields!($($rest)*); }
    };
    ($field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__discard_fields!($($rest)*); }
    };
    ($field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__discard_fields!($($rest)*); }
    };
    ($lit:literal $($rest:tt)*) => {
        $crate::__discard_fields!($($rest)*)
    };
    () => {};
}
