//! Log macros that forward to defmt or tracing, whichever is enabled.
//!
//! Arguments must format with `{}` under both backends: integers, `&str`,
//! and the `as_str()` labels of error types.

macro_rules! log_event {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::$level!($fmt $(, $arg)*);
        #[cfg(feature = "tracing")]
        tracing::$level!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        {
            let _ = ($(&$arg,)*);
        }
    }};
}

macro_rules! error {
    ($($t:tt)*) => { log_event!(error, $($t)*) };
}

macro_rules! warn {
    ($($t:tt)*) => { log_event!(warn, $($t)*) };
}

macro_rules! info {
    ($($t:tt)*) => { log_event!(info, $($t)*) };
}

macro_rules! debug {
    ($($t:tt)*) => { log_event!(debug, $($t)*) };
}
