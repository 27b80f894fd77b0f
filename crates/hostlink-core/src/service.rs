//! The backing service seam
//!
//! `BackingService` is everything the runtime needs from the loaded
//! service module: reachability, pipe/user lifecycle, the served version
//! table, and the *current* implementation of each modeled subsystem.
//! Versioned adapters translate historical method shapes onto the
//! `*Service` traits below; nothing else in the runtime calls them.

use crate::descriptor::{InterfaceDescriptor, VersionTag};
use crate::error::ApiResult;
use crate::handle::{PipeHandle, UserHandle};
use crate::notification::QueueClass;
use std::sync::Arc;

/// Game server address used by connection handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    pub server_id: u64,
    pub ip: u32,
    pub port: u16,
}

/// Handle of an issued auth ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TicketHandle(pub u32);

impl TicketHandle {
    pub const INVALID: TicketHandle = TicketHandle(0);
}

/// An issued auth ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTicket {
    pub handle: TicketHandle,
    pub bytes: Vec<u8>,
}

/// Handle of an asynchronous service call; its result arrives as a
/// notification carrying the same value in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallHandle(pub u64);

impl CallHandle {
    pub const INVALID: CallHandle = CallHandle(0);
}

/// Friend list filter bits.
pub mod friend_flags {
    pub const NONE: u32 = 0;
    pub const BLOCKED: u32 = 1 << 0;
    pub const REQUESTED: u32 = 1 << 1;
    pub const IMMEDIATE: u32 = 1 << 2;
    pub const ALL: u32 = 0xFFFF;
}

/// Current implementation of the User subsystem.
pub trait UserService: Send + Sync {
    fn account_id(&self, user: UserHandle) -> u64;

    fn logged_on(&self, user: UserHandle) -> bool;

    fn user_data_folder(&self, user: UserHandle) -> Option<String>;

    /// Produce the connection blob sent to a game server.
    fn initiate_connection(&self, user: UserHandle, server: ServerEndpoint, secure: bool) -> Vec<u8>;

    fn terminate_connection(&self, user: UserHandle, server: ServerEndpoint);

    fn create_auth_ticket(&self, user: UserHandle) -> AuthTicket;

    fn cancel_auth_ticket(&self, user: UserHandle, ticket: TicketHandle);

    fn behind_nat(&self, user: UserHandle) -> bool;

    fn player_level(&self, user: UserHandle) -> i32;
}

/// Current implementation of the Friends subsystem.
pub trait FriendsService: Send + Sync {
    fn persona_name(&self, user: UserHandle) -> String;

    /// Starts an asynchronous rename; completion is posted as a notification.
    fn set_persona_name(&self, pipe: PipeHandle, user: UserHandle, name: &str) -> CallHandle;

    fn friend_count(&self, user: UserHandle, flags: u32) -> usize;

    fn friend_by_index(&self, user: UserHandle, index: usize, flags: u32) -> Option<u64>;

    fn friend_persona_name(&self, user: UserHandle, friend: u64) -> Option<String>;

    fn set_rich_presence(&self, user: UserHandle, key: &str, value: &str) -> bool;
}

/// Current implementation of the Utils subsystem. Pipe-scoped.
pub trait UtilsService: Send + Sync {
    fn app_id(&self, pipe: PipeHandle) -> u32;

    fn server_real_time(&self, pipe: PipeHandle) -> u32;

    fn ip_country(&self, pipe: PipeHandle) -> String;

    fn seconds_since_app_active(&self, pipe: PipeHandle) -> u32;

    /// 0-100, or 255 when on AC power.
    fn battery_power(&self, pipe: PipeHandle) -> u8;

    fn overlay_enabled(&self, pipe: PipeHandle) -> bool;

    fn running_in_vr(&self, pipe: PipeHandle) -> bool;
}

/// A pass-through call on an opaque subsystem.
#[derive(Debug, Clone, Copy)]
pub struct CallRequest<'a> {
    pub interface: InterfaceDescriptor,
    pub pipe: PipeHandle,
    pub user: UserHandle,
    pub method: &'a str,
    pub payload: &'a [u8],
}

/// Where the service delivers notifications it produces.
///
/// Implemented by the runtime's queue poster. Callable from any thread.
pub trait NotificationOutlet: Send + Sync {
    /// Queue a notification. Returns false if the pipe is not open.
    fn post(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kind: u32,
        payload: Vec<u8>,
        class: QueueClass,
    ) -> bool;
}

/// The loaded service module.
pub trait BackingService: Send + Sync {
    /// Module name for diagnostics
    fn module_name(&self) -> &str;

    /// Is the service process up?
    fn is_running(&self) -> bool;

    /// Was this process started by the service (no relaunch needed)?
    fn launched_by_service(&self) -> bool;

    /// Ask the service to relaunch the app under its control.
    fn request_relaunch(&self, app_id: u32) -> ApiResult<()>;

    /// Tags the running service serves for `name`; empty if none.
    fn served_versions(&self, name: &str) -> Vec<VersionTag>;

    /// Hand the service the outlet for its notifications.
    fn attach_outlet(&self, outlet: Arc<dyn NotificationOutlet>);

    /// Drop the outlet (module unload).
    fn detach_outlet(&self);

    fn open_pipe(&self) -> ApiResult<PipeHandle>;

    fn close_pipe(&self, pipe: PipeHandle);

    fn connect_user(&self, pipe: PipeHandle) -> ApiResult<UserHandle>;

    fn release_user(&self, pipe: PipeHandle, user: UserHandle);

    fn users(&self) -> &dyn UserService;

    fn friends(&self) -> &dyn FriendsService;

    fn utils(&self) -> &dyn UtilsService;

    /// Execute an opaque call, writing the reply into `out`.
    fn call(&self, request: &CallRequest<'_>, out: &mut Vec<u8>) -> ApiResult<()>;
}
