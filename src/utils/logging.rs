//! Switchable logging macros for modules that log on every tick or poll.
//!
//! Usage:
//! ```ignore
//! // In the module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // The macros are exported at the crate root:
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_debug!("tick {}", generation);
//! ```
//!
//! Flipping `ENABLE_LOGS` to `false` silences a chatty module without touching
//! the global `RUST_LOG` filter.

/// Debug-level log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info-level log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level log gated by the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
