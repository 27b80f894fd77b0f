//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults,
//! plus the names of every variable hostlink reads.
//!
//! # Usage
//!
//! ```ignore
//! use hostlink_core::env::{env_get, env_get_bool, keys};
//!
//! let retain: usize = env_get(keys::SCRATCH_RETAIN, 0);
//! let isolate = env_get_bool(keys::FAILURE_ISOLATION, false);
//! ```

use std::str::FromStr;

/// Environment variable names.
pub mod keys {
    /// Log level: off/error/warn/info/debug/trace or 0-5
    pub const LOG_LEVEL: &str = "HLK_LOG_LEVEL";
    /// Flush stderr after every record
    pub const FLUSH_EPRINT: &str = "HLK_FLUSH_EPRINT";
    /// Contain sink faults instead of aborting the pump cycle
    pub const FAILURE_ISOLATION: &str = "HLK_FAILURE_ISOLATION";
    /// Reject nested/concurrent pumps on the same pipe
    pub const REENTRANCY_GUARD: &str = "HLK_REENTRANCY_GUARD";
    /// App id the service already launched us with
    pub const APP_ID: &str = "HLK_APP_ID";
    /// Path of the app-id marker file
    pub const APP_ID_FILE: &str = "HLK_APP_ID_FILE";
    /// Bytes of per-thread scratch kept after release
    pub const SCRATCH_RETAIN: &str = "HLK_SCRATCH_RETAIN";
    /// Contained dispatch faults kept before the oldest are evicted
    pub const FAULT_CAPACITY: &str = "HLK_FAULT_CAPACITY";
    /// Pid file consulted by the service discovery probe
    pub const SERVICE_PID_FILE: &str = "HLK_SERVICE_PID_FILE";
}

/// Get environment variable parsed as type T, or return default
///
/// Works with any type that implements `FromStr`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other set value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val),
        Err(_) => default,
    }
}

/// The truthy spellings shared by every boolean switch.
#[inline]
pub fn parse_bool(val: &str) -> bool {
    matches!(
        val.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Get environment variable as optional value
///
/// `Some(T)` if the variable is set and parses, `None` otherwise.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__HLK_TEST_UNSET_VAR__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_opt_none() {
        let val: Option<u32> = env_get_opt("__HLK_TEST_UNSET_VAR__");
        assert!(val.is_none());
        assert!(!env_is_set("__HLK_TEST_UNSET_VAR__"));
    }

    #[test]
    fn test_env_get_str_default() {
        assert_eq!(env_get_str("__HLK_TEST_UNSET_VAR__", "marker.txt"), "marker.txt");
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__HLK_TEST_NUM__", " 480 ");
        let val: u32 = env_get("__HLK_TEST_NUM__", 0);
        assert_eq!(val, 480);
        assert_eq!(env_get_opt::<u32>("__HLK_TEST_NUM__"), Some(480));
        std::env::remove_var("__HLK_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__HLK_TEST_INVALID__", "not_a_number");
        let val: usize = env_get("__HLK_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__HLK_TEST_INVALID__");
    }

    #[test]
    fn test_parse_bool() {
        for t in ["1", "true", "TRUE", "yes", "on", " on "] {
            assert!(parse_bool(t), "{t}");
        }
        for f in ["0", "false", "off", "garbage", ""] {
            assert!(!parse_bool(f), "{f}");
        }
    }

    #[test]
    fn test_env_get_bool() {
        assert!(env_get_bool("__HLK_TEST_UNSET_BOOL__", true));
        std::env::set_var("__HLK_TEST_BOOL__", "0");
        assert!(!env_get_bool("__HLK_TEST_BOOL__", true));
        std::env::set_var("__HLK_TEST_BOOL__", "yes");
        assert!(env_get_bool("__HLK_TEST_BOOL__", false));
        std::env::remove_var("__HLK_TEST_BOOL__");
    }
}
