//! Environment variable names and fallback values.
//!
//! # Design
//! - Keep every variable name in one place so both binaries agree.
//! - The helper defaults to quiet logging; its stderr carries the report line.

/// Log level override for either side.
pub const ENV_LOG_LEVEL: &str = "FSGATE_LOG_LEVEL";
/// Log format override (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "FSGATE_LOG_FORMAT";
/// Path of the privileged helper executable launched by the front end.
pub const ENV_HELPER_PATH: &str = "FSGATE_HELPER_PATH";
/// Directory receiving per-invocation transport files.
pub const ENV_TRANSPORT_DIR: &str = "FSGATE_TRANSPORT_DIR";

/// Helper log level when none is configured.
pub const HELPER_LOG_LEVEL: &str = "warn";
/// Front-end log level when none is configured.
pub const DISPATCH_LOG_LEVEL: &str = "info";
/// Installed location of the helper executable.
pub const HELPER_PATH: &str = "/usr/libexec/fsgate/fsgate-helper";
/// Sub-directory of the system temp dir used for transport files.
pub const TRANSPORT_SUBDIR: &str = "fsgate";
/// Build identifier captured from `FSGATE_BUILD_SHA` at compile time.
pub const BUILD_SHA: &str = match option_env!("FSGATE_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};
