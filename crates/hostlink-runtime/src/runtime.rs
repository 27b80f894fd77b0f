//! The runtime object
//!
//! Owns everything with process lifetime: the loaded service module, the
//! session tables, the negotiated interface table, queues, registrations
//! and diagnostics. Nothing here spawns threads; all work happens on the
//! caller's thread.

use crate::bootstrap;
use crate::callbacks::CallbackTable;
use crate::config::RuntimeConfig;
use crate::diagnostics::{CrashHooks, FaultChannel, FaultHook};
use crate::pump::{self, PumpPolicy, PumpStats};
use crate::queue::{CallbackQueue, NotificationPoster};
use crate::registry::{Negotiated, Registry, ResolveRequest};
use crate::session::SessionManager;
use crate::tls;
use hostlink_core::descriptor::VersionTag;
use hostlink_core::error::{
    ApiError, ApiResult, BootstrapFailure, DispatchFault, RegistrationId,
};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::notification::{KindRange, QueueClass};
use hostlink_core::service::BackingService;
use hostlink_core::traits::{
    downcast_interface, CallbackSink, CrashHandlerConfig, CrashReporter, Interface,
};
use hostlink_core::{kdebug, kerror, kinfo, kwarn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub struct Runtime {
    config: RuntimeConfig,
    failure_isolation: AtomicBool,
    module: RwLock<Option<Arc<dyn BackingService>>>,
    session: SessionManager,
    registry: Registry,
    queue: Arc<CallbackQueue>,
    callbacks: CallbackTable,
    faults: FaultChannel,
    crash: CrashHooks,
    initialized: AtomicBool,
    lifecycle: Mutex<()>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::from_env())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            faults: FaultChannel::with_capacity(config.fault_capacity),
            failure_isolation: AtomicBool::new(config.failure_isolation),
            config,
            module: RwLock::new(None),
            session: SessionManager::new(),
            registry: Registry::new(),
            queue: Arc::new(CallbackQueue::new()),
            callbacks: CallbackTable::new(),
            crash: CrashHooks::new(),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// A runtime with `service` already loaded.
    pub fn with_module(config: RuntimeConfig, service: Arc<dyn BackingService>) -> Self {
        let rt = Self::new(config);
        rt.load_module(service);
        rt
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn service(&self) -> Option<Arc<dyn BackingService>> {
        self.module.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ------------------------------------------------------------------
    // Module lifecycle
    // ------------------------------------------------------------------

    /// Load the backing service module, replacing (and shutting down
    /// against) any previous one.
    pub fn load_module(&self, service: Arc<dyn BackingService>) {
        if self.service().is_some() {
            self.unload_module();
        }
        service.attach_outlet(Arc::new(self.poster()));
        kinfo!("module {} loaded", service.module_name());
        *self.module.write().unwrap_or_else(|e| e.into_inner()) = Some(service);
    }

    /// Shut down and drop the module.
    pub fn unload_module(&self) {
        self.shutdown();
        let old = self.module.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(service) = old {
            service.detach_outlet();
            kinfo!("module {} unloaded", service.module_name());
        }
    }

    pub fn is_module_loaded(&self) -> bool {
        self.service().is_some()
    }

    // ------------------------------------------------------------------
    // Bootstrap
    // ------------------------------------------------------------------

    /// Connect to the service. Returns false on failure and logs why.
    pub fn init(&self) -> bool {
        match self.try_init() {
            Ok(()) => true,
            Err(e) => {
                kerror!("init failed: {}", e);
                false
            }
        }
    }

    /// Connect to the service: open the default pipe, connect the
    /// default user, negotiate interface versions. A no-op when already
    /// initialized.
    pub fn try_init(&self) -> ApiResult<()> {
        let _g = self.lock_lifecycle();
        if self.is_initialized() {
            return Ok(());
        }
        self.config.validate()?;

        let service = self.service().ok_or(BootstrapFailure::ModuleNotLoaded)?;
        if !service.is_running() {
            return Err(BootstrapFailure::ServiceNotRunning.into());
        }

        let pipe = self.open_pipe_with(&service)?;
        if let Err(e) = self.session.add_user(&*service, pipe) {
            self.close_pipe_with(Some(&*service), pipe);
            return Err(e);
        }

        if self.registry.negotiate(&*service) == 0 {
            self.close_pipe_with(Some(&*service), pipe);
            self.registry.clear();
            return Err(BootstrapFailure::NoCommonInterfaces.into());
        }

        self.initialized.store(true, Ordering::Release);
        kinfo!(
            "initialized against {}: pipe {} user {}",
            service.module_name(),
            pipe,
            self.session.default_user()
        );
        Ok(())
    }

    /// Close every pipe, drop the negotiated table, and invalidate every
    /// resolved pointer. The module stays loaded.
    pub fn shutdown(&self) {
        let _g = self.lock_lifecycle();
        let service = self.service();
        let pipes = self.session.pipes();
        for pipe in &pipes {
            self.close_pipe_with(service.as_deref(), *pipe);
        }
        self.registry.clear();
        if self.initialized.swap(false, Ordering::AcqRel) {
            kinfo!("shut down ({} pipes closed)", pipes.len());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_service_running(&self) -> bool {
        self.service().is_some_and(|s| s.is_running())
    }

    /// See `bootstrap::restart_app_if_necessary`.
    pub fn restart_app_if_necessary(&self, app_id: u32) -> bool {
        let service = self.service();
        bootstrap::restart_app_if_necessary(&self.config, service.as_deref(), app_id)
    }

    // ------------------------------------------------------------------
    // Pipes and users
    // ------------------------------------------------------------------

    fn open_pipe_with(&self, service: &Arc<dyn BackingService>) -> ApiResult<PipeHandle> {
        let pipe = self.session.open_pipe(&**service)?;
        self.queue.open(pipe);
        Ok(pipe)
    }

    fn close_pipe_with(&self, service: Option<&dyn BackingService>, pipe: PipeHandle) -> bool {
        let Some(users) = self.session.close_pipe(service, pipe) else {
            return false;
        };
        let dropped = self.queue.close(pipe);
        let regs = self.callbacks.purge_pipe(pipe);
        let ptrs = self.registry.purge_pipe(pipe);
        kdebug!(
            "pipe {} closed: {} users, {} pending dropped, {} registrations, {} pointers",
            pipe,
            users.len(),
            dropped,
            regs,
            ptrs
        );
        true
    }

    /// Open an additional pipe.
    pub fn open_pipe(&self) -> ApiResult<PipeHandle> {
        let service = self.service().ok_or(BootstrapFailure::ModuleNotLoaded)?;
        self.open_pipe_with(&service)
    }

    /// Close a pipe. Everything resolved or registered against it dies
    /// with it. Returns false if it was not open.
    pub fn close_pipe(&self, pipe: PipeHandle) -> bool {
        let service = self.service();
        self.close_pipe_with(service.as_deref(), pipe)
    }

    pub fn add_user(&self, pipe: PipeHandle) -> ApiResult<UserHandle> {
        let service = self.service().ok_or(BootstrapFailure::ModuleNotLoaded)?;
        self.session.add_user(&*service, pipe)
    }

    pub fn release_user(&self, pipe: PipeHandle, user: UserHandle) -> bool {
        let Some(service) = self.service() else {
            return false;
        };
        let released = self.session.release_user(&*service, pipe, user);
        if released {
            self.registry.purge_user(pipe, user);
        }
        released
    }

    pub fn users(&self, pipe: PipeHandle) -> Vec<UserHandle> {
        self.session.users(pipe)
    }

    pub fn is_pipe_open(&self, pipe: PipeHandle) -> bool {
        self.session.is_open(pipe)
    }

    /// Pipe of the notification being dispatched on this thread, else
    /// the default pipe.
    pub fn current_pipe(&self) -> PipeHandle {
        self.session.current_pipe()
    }

    /// User of the notification being dispatched on this thread, else
    /// the default user.
    pub fn current_user(&self) -> UserHandle {
        self.session.current_user()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    pub fn try_resolve_for(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        name: &str,
        version: &str,
    ) -> ApiResult<Arc<dyn Interface>> {
        let service = self.service();
        self.registry.resolve(
            service.as_ref(),
            &self.session,
            ResolveRequest {
                pipe,
                user,
                name,
                version,
            },
        )
    }

    /// Resolve against the current pipe and user, with the reason on failure.
    pub fn try_resolve(&self, name: &str, version: &str) -> ApiResult<Arc<dyn Interface>> {
        self.try_resolve_for(self.current_pipe(), self.current_user(), name, version)
    }

    /// Resolve `(name, version)` against the current pipe and user.
    pub fn resolve(&self, name: &str, version: &str) -> Option<Arc<dyn Interface>> {
        self.try_resolve(name, version).ok()
    }

    pub fn resolve_for(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        name: &str,
        version: &str,
    ) -> Option<Arc<dyn Interface>> {
        self.try_resolve_for(pipe, user, name, version).ok()
    }

    /// Resolve and downcast to the concrete adapter type.
    pub fn resolve_as<T: Interface>(&self, name: &str, version: &str) -> Option<Arc<T>> {
        self.resolve(name, version).and_then(downcast_interface::<T>)
    }

    /// Resolve a full version string such as `"Friends015"`.
    pub fn resolve_version_string(&self, version_string: &str) -> Option<Arc<dyn Interface>> {
        let service = self.service();
        self.registry
            .resolve_version_string(
                service.as_ref(),
                &self.session,
                self.current_pipe(),
                self.current_user(),
                version_string,
            )
            .ok()
    }

    /// Highest negotiated version of `name`.
    pub fn current_version(&self, name: &str) -> Option<VersionTag> {
        self.registry.current_version(name)
    }

    pub fn negotiated(&self) -> Vec<Negotiated> {
        self.registry.negotiated()
    }

    // ------------------------------------------------------------------
    // Callbacks
    // ------------------------------------------------------------------

    /// Handle the service uses to queue notifications.
    pub fn poster(&self) -> NotificationPoster {
        NotificationPoster::new(self.queue.clone())
    }

    /// Queue a notification directly. False if the pipe is not open.
    pub fn enqueue(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kind: u32,
        payload: Vec<u8>,
        class: QueueClass,
    ) -> bool {
        self.queue.enqueue(pipe, user, kind, payload, class)
    }

    /// `(foreground, background)` notifications waiting on `pipe`.
    pub fn pending(&self, pipe: PipeHandle) -> (usize, usize) {
        self.queue.pending(pipe)
    }

    pub fn register_callback(
        &self,
        pipe: PipeHandle,
        kinds: impl Into<KindRange>,
        sink: Arc<dyn CallbackSink>,
    ) -> ApiResult<RegistrationId> {
        self.register(pipe, kinds.into(), None, sink)
    }

    /// Register for notifications addressed to one user only.
    pub fn register_user_callback(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kinds: impl Into<KindRange>,
        sink: Arc<dyn CallbackSink>,
    ) -> ApiResult<RegistrationId> {
        if !self.session.has_user(pipe, user) {
            return Err(ApiError::UnknownUser(pipe, user));
        }
        self.register(pipe, kinds.into(), Some(user), sink)
    }

    fn register(
        &self,
        pipe: PipeHandle,
        range: KindRange,
        user: Option<UserHandle>,
        sink: Arc<dyn CallbackSink>,
    ) -> ApiResult<RegistrationId> {
        if !self.session.is_open(pipe) {
            return Err(ApiError::UnknownPipe(pipe));
        }
        let id = self.callbacks.register(pipe, range, user, sink);
        // Closing removes the session entry before purging registrations.
        if !self.session.is_open(pipe) {
            self.callbacks.unregister(id);
            return Err(ApiError::UnknownPipe(pipe));
        }
        kdebug!("{} registered on pipe {} for kinds {}..={}", id, pipe, range.first(), range.last());
        Ok(id)
    }

    pub fn unregister_callback(&self, id: RegistrationId) -> bool {
        self.callbacks.unregister(id)
    }

    /// Drain `pipe`'s queue and dispatch to matching registrations.
    pub fn run_callbacks(
        &self,
        pipe: PipeHandle,
        include_background_queues: bool,
    ) -> ApiResult<PumpStats> {
        let policy = PumpPolicy {
            failure_isolation: self.failure_isolation.load(Ordering::Acquire),
            reentrancy_guard: self.config.reentrancy_guard,
            scratch_retain_bytes: self.config.scratch_retain_bytes,
        };
        pump::pump(
            &self.queue,
            &self.callbacks,
            &self.faults,
            pipe,
            include_background_queues,
            policy,
        )
    }

    /// Contain sink faults (true) or abort the cycle on the first one.
    pub fn set_failure_isolation(&self, enabled: bool) {
        let was = self.failure_isolation.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            kdebug!("failure isolation {}", if enabled { "on" } else { "off" });
        }
    }

    pub fn failure_isolation(&self) -> bool {
        self.failure_isolation.load(Ordering::Acquire)
    }

    /// Drain faults contained in isolation mode.
    pub fn take_faults(&self) -> Vec<DispatchFault> {
        self.faults.take()
    }

    /// Contained faults evicted because the fault channel was full.
    pub fn dropped_faults(&self) -> u64 {
        self.faults.dropped()
    }

    pub fn set_fault_hook(&self, hook: Option<FaultHook>) {
        self.faults.set_hook(hook);
    }

    /// Release this thread's scratch memory.
    pub fn release_current_thread_memory(&self) {
        tls::release_thread_memory(self.config.scratch_retain_bytes);
    }

    // ------------------------------------------------------------------
    // Crash hooks
    // ------------------------------------------------------------------

    pub fn set_crash_reporter(&self, reporter: Option<Arc<dyn CrashReporter>>) {
        self.crash.set_reporter(reporter);
    }

    pub fn use_crash_handler(&self, config: CrashHandlerConfig) {
        self.crash.use_crash_handler(config);
    }

    pub fn set_crash_app_id(&self, app_id: u32) {
        self.crash.set_app_id(app_id);
    }

    pub fn set_mini_dump_comment(&self, comment: &str) {
        self.crash.set_comment(comment);
    }

    pub fn write_mini_dump(&self, exception_code: u32, build_id: u32) {
        self.crash.write_dump(exception_code, build_id);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.is_initialized() {
            kwarn!("runtime dropped while initialized; shutting down");
            self.shutdown();
        }
        if let Some(service) = self.service() {
            service.detach_outlet();
        }
    }
}
