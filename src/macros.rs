/// Logs a debug message under the crate's log target.
macro_rules! stats_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "runstats", $($arg)*)
    };
}

/// Logs an error under the crate's log target.
macro_rules! stats_error {
    ($($arg:tt)*) => {
        ::log::error!(target: "runstats", $($arg)*)
    };
}
