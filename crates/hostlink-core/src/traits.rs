//! Application-facing traits
//!
//! These define the boundary between the runtime and the code it hands
//! pointers to or calls back into.

use crate::descriptor::InterfaceDescriptor;
use crate::error::SinkFault;
use crate::notification::Notification;
use std::any::Any;
use std::sync::Arc;

/// A resolved interface pointer.
///
/// Implemented by every versioned adapter. The concrete type is the
/// frozen method shape; use `downcast_interface` to get at it.
pub trait Interface: Send + Sync + 'static {
    /// The `(name, version)` this adapter was resolved as.
    fn descriptor(&self) -> InterfaceDescriptor;

    /// False once the owning pipe has been closed.
    fn is_live(&self) -> bool;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Downcast a resolved pointer to its concrete adapter type.
pub fn downcast_interface<T: Interface>(iface: Arc<dyn Interface>) -> Option<Arc<T>> {
    iface.into_any().downcast::<T>().ok()
}

/// Application code invoked once per matching notification.
pub trait CallbackSink: Send + Sync {
    /// Handle one notification. `Err` is a dispatch fault.
    fn on_notification(&self, notification: &Notification) -> Result<(), SinkFault>;
}

impl<F> CallbackSink for F
where
    F: Fn(&Notification) -> Result<(), SinkFault> + Send + Sync,
{
    fn on_notification(&self, notification: &Notification) -> Result<(), SinkFault> {
        self(notification)
    }
}

/// Box a closure as a sink.
pub fn sink_fn<F>(f: F) -> Arc<dyn CallbackSink>
where
    F: Fn(&Notification) -> Result<(), SinkFault> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Callback run just before a crash artifact is written.
pub type PreDumpCallback = Arc<dyn Fn(Option<&(dyn Any + Send + Sync)>) + Send + Sync>;

/// Crash handler settings passed through to the reporter.
#[derive(Clone, Default)]
pub struct CrashHandlerConfig {
    pub version: String,
    /// `"Mmm dd yyyy"`
    pub build_date: String,
    /// `"hh:mm:ss"`
    pub build_time: String,
    pub full_memory_dumps: bool,
    pub context: Option<Arc<dyn Any + Send + Sync>>,
    pub pre_dump: Option<PreDumpCallback>,
}

impl std::fmt::Debug for CrashHandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashHandlerConfig")
            .field("version", &self.version)
            .field("build_date", &self.build_date)
            .field("build_time", &self.build_time)
            .field("full_memory_dumps", &self.full_memory_dumps)
            .field("has_context", &self.context.is_some())
            .field("has_pre_dump", &self.pre_dump.is_some())
            .finish()
    }
}

/// Crash-dump collaborator. The runtime only forwards to it.
pub trait CrashReporter: Send + Sync {
    fn install(&self, config: CrashHandlerConfig);

    fn set_app_id(&self, app_id: u32);

    fn set_comment(&self, comment: &str);

    fn write_dump(&self, exception_code: u32, build_id: u32);
}
