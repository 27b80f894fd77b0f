//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use hostlink_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env()
//!     .failure_isolation(true)
//!     .app_id(480);
//! ```

pub mod defaults;

use hostlink_core::env::{env_get, env_get_bool, env_get_opt, env_get_str, keys};
use hostlink_core::error::ApiError;
use std::path::PathBuf;

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Contain sink faults and keep draining instead of aborting the cycle
    pub failure_isolation: bool,
    /// Reject a second pump on a pipe that is already pumping
    pub reentrancy_guard: bool,
    /// App id the process was launched with, if any
    pub app_id: Option<u32>,
    /// Marker consulted by `restart_app_if_necessary`
    pub app_id_file: PathBuf,
    /// Scratch bytes kept per thread after release
    pub scratch_retain_bytes: usize,
    /// Contained faults kept for `take_faults`
    pub fault_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Defaults with environment overrides.
    ///
    /// - `HLK_FAILURE_ISOLATION` - 0/1
    /// - `HLK_REENTRANCY_GUARD` - 0/1
    /// - `HLK_APP_ID` - numeric app id
    /// - `HLK_APP_ID_FILE` - marker file path
    /// - `HLK_SCRATCH_RETAIN` - bytes
    /// - `HLK_FAULT_CAPACITY` - faults kept for `take_faults`
    pub fn from_env() -> Self {
        Self {
            failure_isolation: env_get_bool(keys::FAILURE_ISOLATION, defaults::FAILURE_ISOLATION),
            reentrancy_guard: env_get_bool(keys::REENTRANCY_GUARD, defaults::REENTRANCY_GUARD),
            app_id: env_get_opt(keys::APP_ID),
            app_id_file: PathBuf::from(env_get_str(keys::APP_ID_FILE, defaults::APP_ID_FILE)),
            scratch_retain_bytes: env_get(keys::SCRATCH_RETAIN, defaults::SCRATCH_RETAIN_BYTES),
            fault_capacity: env_get(keys::FAULT_CAPACITY, defaults::FAULT_CAPACITY),
        }
    }

    /// Explicit defaults, no environment.
    pub fn new() -> Self {
        Self {
            failure_isolation: defaults::FAILURE_ISOLATION,
            reentrancy_guard: defaults::REENTRANCY_GUARD,
            app_id: None,
            app_id_file: PathBuf::from(defaults::APP_ID_FILE),
            scratch_retain_bytes: defaults::SCRATCH_RETAIN_BYTES,
            fault_capacity: defaults::FAULT_CAPACITY,
        }
    }

    // Builder methods

    pub fn failure_isolation(mut self, enable: bool) -> Self {
        self.failure_isolation = enable;
        self
    }

    pub fn reentrancy_guard(mut self, enable: bool) -> Self {
        self.reentrancy_guard = enable;
        self
    }

    pub fn app_id(mut self, app_id: u32) -> Self {
        self.app_id = Some(app_id);
        self
    }

    pub fn app_id_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_id_file = path.into();
        self
    }

    pub fn scratch_retain_bytes(mut self, bytes: usize) -> Self {
        self.scratch_retain_bytes = bytes;
        self
    }

    pub fn fault_capacity(mut self, capacity: usize) -> Self {
        self.fault_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.app_id == Some(0) {
            return Err(ApiError::InvalidConfig("app_id must be non-zero"));
        }
        if self.app_id_file.as_os_str().is_empty() {
            return Err(ApiError::InvalidConfig("app_id_file must not be empty"));
        }
        if self.scratch_retain_bytes > defaults::MAX_SCRATCH_RETAIN_BYTES {
            return Err(ApiError::InvalidConfig("scratch_retain_bytes must be <= 16MB"));
        }
        if self.fault_capacity == 0 {
            return Err(ApiError::InvalidConfig("fault_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("hostlink configuration:");
        eprintln!("  failure_isolation:     {}", self.failure_isolation);
        eprintln!("  reentrancy_guard:      {}", self.reentrancy_guard);
        match self.app_id {
            Some(id) => eprintln!("  app_id:                {}", id),
            None => eprintln!("  app_id:                (unset)"),
        }
        eprintln!("  app_id_file:           {}", self.app_id_file.display());
        eprintln!("  scratch_retain_bytes:  {}", self.scratch_retain_bytes);
        eprintln!("  fault_capacity:        {}", self.fault_capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = RuntimeConfig::new();
        assert!(!config.failure_isolation);
        assert!(config.reentrancy_guard);
        assert_eq!(config.app_id, None);
        assert_eq!(config.app_id_file, PathBuf::from("hostlink_appid.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .failure_isolation(true)
            .app_id(480)
            .scratch_retain_bytes(4096);
        assert!(config.failure_isolation);
        assert_eq!(config.app_id, Some(480));
        assert_eq!(config.scratch_retain_bytes, 4096);
    }

    #[test]
    fn test_validation() {
        assert!(RuntimeConfig::new().app_id(0).validate().is_err());
        assert!(RuntimeConfig::new().app_id_file("").validate().is_err());
        assert!(RuntimeConfig::new()
            .scratch_retain_bytes(64 * 1024 * 1024)
            .validate()
            .is_err());
        assert!(RuntimeConfig::new().fault_capacity(0).validate().is_err());
    }
}
