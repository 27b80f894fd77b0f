//! # hostlink-core
//!
//! Core types and traits for hostlink, a client runtime that resolves
//! versioned interfaces backed by an out-of-process service and pumps the
//! service's notifications into application callbacks.
//!
//! This crate holds no runtime state. The registry, pump and session
//! tables live in `hostlink-runtime`; default collaborators live in
//! `hostlink-module`.
//!
//! ## Modules
//!
//! - `handle` - Pipe and user handles
//! - `descriptor` - Version tags and interface descriptors
//! - `subsystem` - Subsystem catalog: names, published tags, kind blocks
//! - `notification` - Pending notifications and kind ranges
//! - `error` - Error types
//! - `service` - Backing service seam and per-subsystem service traits
//! - `traits` - Interface, callback sink and crash reporter traits
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod handle;
pub mod descriptor;
pub mod subsystem;
pub mod notification;
pub mod error;
pub mod service;
pub mod traits;
pub mod kprint;
pub mod env;

pub use handle::{PipeHandle, UserHandle};
pub use descriptor::{split_version_string, InterfaceDescriptor, VersionTag};
pub use subsystem::{Subsystem, AGGREGATED, KIND_BLOCK};
pub use notification::{KindRange, Notification, QueueClass};
pub use error::{
    ApiError, ApiResult, BootstrapFailure, DispatchFault, FaultCause, RegistrationId,
    ResolutionFailure, SinkFault,
};
pub use service::{
    friend_flags, AuthTicket, BackingService, CallHandle, CallRequest, FriendsService,
    NotificationOutlet, ServerEndpoint, TicketHandle, UserService, UtilsService,
};
pub use traits::{
    downcast_interface, sink_fn, CallbackSink, CrashHandlerConfig, CrashReporter, Interface,
    PreDumpCallback,
};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
