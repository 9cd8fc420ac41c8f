//! Usage checks for synchronization misuse.
//!
//! A failed check is always logged through `tracing`. Debug builds also
//! assert, which aborts the process under the workspace `panic = "abort"`
//! profiles. Release builds log and keep going.

macro_rules! usage_check {
    ($cond:expr, $($arg:tt)+) => {{
        let ok: bool = $cond;
        if !ok {
            ::tracing::error!($($arg)+);
            debug_assert!(ok, $($arg)+);
        }
    }};
}

pub(crate) use usage_check;
