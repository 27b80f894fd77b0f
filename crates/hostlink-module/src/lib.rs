//! # hostlink-module - Default collaborators
//!
//! Implementations of the `hostlink-core` seams that need no external
//! service process. Useful for tests, demos, and as a template for a
//! real service binding.
//!
//! ## Default stack
//!
//! | Trait / concern  | Default Impl       |
//! |------------------|--------------------|
//! | BackingService   | LocalService       |
//! | Service liveness | ProcessProbe       |
//! | CrashReporter    | LogCrashReporter   |

pub mod local_service;
pub mod discovery;
pub mod crash_log;

pub use local_service::{CallRecord, LocalService, LocalServiceBuilder};
pub use discovery::ProcessProbe;
pub use crash_log::LogCrashReporter;
