//! # hostlink - versioned interfaces over an out-of-process service
//!
//! An application asks for an interface by name and version string; the
//! runtime hands back a pointer whose methods are the frozen shape of
//! that version, forwarding to whatever the running service currently
//! implements. Notifications the service produces are queued per pipe
//! and delivered when the application pumps.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hostlink::{sink_fn, LocalService, Runtime, RuntimeConfig};
//!
//! let rt = Runtime::with_module(RuntimeConfig::from_env(), LocalService::builder().build());
//! if !rt.init() {
//!     return;
//! }
//!
//! let pipe = rt.current_pipe();
//! rt.register_callback(pipe, 304u32, sink_fn(|n| {
//!     println!("persona changed for user {}", n.user);
//!     Ok(())
//! }))?;
//!
//! let friends = rt.resolve_as::<FriendsV017>("Friends", "017").unwrap();
//! friends.set_persona_name("renamed");
//!
//! rt.run_callbacks(pipe, false)?;
//! rt.shutdown();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Application                            │
//! │        resolve(name, version), run_callbacks(pipe)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Runtime                              │
//! │   session tables, negotiated registry, queues, callbacks    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ UserV0xx  │      │FriendsV0xx│      │  Remote   │
//!    │ adapters  │      │ adapters  │      │ adapters  │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                   BackingService                        │
//!    │   current implementation; posts notifications back      │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use hostlink_core::{
    downcast_interface, friend_flags, sink_fn, split_version_string, ApiError, ApiResult,
    AuthTicket, BackingService, BootstrapFailure, CallHandle, CallRequest, CallbackSink,
    CrashHandlerConfig, CrashReporter, DispatchFault, FaultCause, FriendsService, Interface,
    InterfaceDescriptor, KindRange, Notification, NotificationOutlet, PipeHandle,
    PreDumpCallback, QueueClass, RegistrationId, ResolutionFailure, ServerEndpoint, SinkFault,
    Subsystem, TicketHandle, UserHandle, UserService, UtilsService, VersionTag, AGGREGATED,
    KIND_BLOCK,
};

// Re-export kprint macros for debug logging
pub use hostlink_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};
pub use hostlink_core::kprint::{
    clear_log_hook, init as init_logging, set_flush_enabled, set_log_hook, set_log_level,
    LogHook, LogLevel,
};

// Re-export env utilities
pub use hostlink_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types
pub use hostlink_runtime::{
    ApiContext, FaultHook, Negotiated, NotificationPoster, PumpStats, RemoteInterface, Runtime,
    RuntimeConfig,
};

/// Versioned adapter types and their method groups.
pub mod adapters {
    pub use hostlink_runtime::adapters::friends::*;
    pub use hostlink_runtime::adapters::user::*;
    pub use hostlink_runtime::adapters::utils::*;
    pub use hostlink_runtime::adapters::{catalog, Adapter, InterfaceContext};
}

// Re-export default collaborators
pub use hostlink_module::{LocalService, LocalServiceBuilder, LogCrashReporter, ProcessProbe};

use std::sync::{Arc, RwLock};

static INSTALLED: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// Make `rt` the process-wide runtime. Returns the one it replaced.
pub fn install(rt: Arc<Runtime>) -> Option<Arc<Runtime>> {
    INSTALLED.write().unwrap_or_else(|e| e.into_inner()).replace(rt)
}

/// Remove the process-wide runtime.
pub fn uninstall() -> Option<Arc<Runtime>> {
    INSTALLED.write().unwrap_or_else(|e| e.into_inner()).take()
}

/// The process-wide runtime, if one is installed.
pub fn installed() -> Option<Arc<Runtime>> {
    INSTALLED.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Handle accessors kept for code written against global handles.
pub mod compat {
    use super::installed;
    use hostlink_core::{PipeHandle, UserHandle};

    /// Current pipe of the installed runtime; `PipeHandle::NONE` if none.
    #[deprecated(note = "use Runtime::current_pipe")]
    pub fn get_pipe() -> PipeHandle {
        installed().map_or(PipeHandle::NONE, |rt| rt.current_pipe())
    }

    /// Current user of the installed runtime; `UserHandle::NONE` if none.
    #[deprecated(note = "use Runtime::current_user")]
    pub fn get_user() -> UserHandle {
        installed().map_or(UserHandle::NONE, |rt| rt.current_user())
    }
}
