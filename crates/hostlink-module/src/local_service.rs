//! `LocalService` - in-process `BackingService`
//!
//! Serves every subsystem from memory. Pipes and users are plain
//! counters, the User/Friends/Utils subsystems keep just enough state to
//! behave consistently, and opaque calls are answered with a
//! deterministic reply:
//!
//! - `"echo"` returns the payload
//! - `"fail"` is rejected with `ApiError::CallFailed`
//! - anything else returns `"<Name><tag>:<method>"`
//!
//! The served version table, reachability, relaunch behavior and the
//! optional bounded call log are set through `LocalServiceBuilder`.

use crate::discovery::ProcessProbe;
use crossbeam_queue::ArrayQueue;
use hostlink_core::descriptor::{InterfaceDescriptor, VersionTag};
use hostlink_core::error::{ApiError, ApiResult, BootstrapFailure};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::notification::QueueClass;
use hostlink_core::service::{
    friend_flags, AuthTicket, BackingService, CallHandle, CallRequest, FriendsService,
    NotificationOutlet, ServerEndpoint, TicketHandle, UserService, UtilsService,
};
use hostlink_core::subsystem::Subsystem;
use hostlink_core::{kdebug, ktrace, kwarn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Notification kinds this service emits.
pub mod kinds {
    /// A user's persona changed. Payload: account id, little-endian u64.
    pub const PERSONA_STATE_CHANGE: u32 = 304;
    /// A `set_persona_name` call completed. Payload: the call handle,
    /// little-endian u64.
    pub const SET_PERSONA_NAME_RESPONSE: u32 = 347;
}

const ACCOUNT_BASE: u64 = 76_561_197_960_265_728;
const DEFAULT_APP_ID: u32 = 480;
const MAX_RICH_PRESENCE_KEY: usize = 64;

/// One opaque call, as the service saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub interface: InterfaceDescriptor,
    pub pipe: PipeHandle,
    pub user: UserHandle,
    pub method: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Served {
    Tags(Vec<VersionTag>),
    Withheld,
}

pub struct LocalServiceBuilder {
    name: String,
    running: bool,
    discovery_marker: bool,
    relaunch_required: bool,
    launched_by_service: bool,
    app_id: u32,
    friends: Vec<(u64, String)>,
    served: HashMap<String, Served>,
    probe: Option<ProcessProbe>,
    call_log: usize,
}

impl Default for LocalServiceBuilder {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            running: true,
            discovery_marker: true,
            relaunch_required: false,
            launched_by_service: false,
            app_id: DEFAULT_APP_ID,
            friends: Vec::new(),
            served: HashMap::new(),
            probe: None,
            call_log: 0,
        }
    }
}

impl LocalServiceBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    /// Without the marker, `open_pipe` fails with `NoDiscoveryMarker`.
    pub fn discovery_marker(mut self, present: bool) -> Self {
        self.discovery_marker = present;
        self
    }

    /// With this set, `open_pipe` fails with `RelaunchRequired`.
    pub fn relaunch_required(mut self, required: bool) -> Self {
        self.relaunch_required = required;
        self
    }

    pub fn launched_by_service(mut self, launched: bool) -> Self {
        self.launched_by_service = launched;
        self
    }

    pub fn app_id(mut self, app_id: u32) -> Self {
        self.app_id = app_id;
        self
    }

    /// Add an immediate friend shared by every user.
    pub fn friend(mut self, account: u64, name: impl Into<String>) -> Self {
        self.friends.push((account, name.into()));
        self
    }

    /// Serve exactly these tags of `name`, published or not.
    pub fn serve_only(mut self, name: &str, tags: &[u16]) -> Self {
        let tags = tags.iter().filter_map(|n| VersionTag::from_number(*n)).collect();
        self.served.insert(name.to_string(), Served::Tags(tags));
        self
    }

    /// Serve the published tags of `name` up to and including `newest`.
    pub fn serve_up_to(mut self, name: &str, newest: u16) -> Self {
        let tags = Subsystem::from_name(name)
            .map(|s| {
                s.versions()
                    .iter()
                    .copied()
                    .filter(|t| t.number() <= newest)
                    .collect()
            })
            .unwrap_or_default();
        self.served.insert(name.to_string(), Served::Tags(tags));
        self
    }

    /// Serve nothing for `name`.
    pub fn withhold(mut self, name: &str) -> Self {
        self.served.insert(name.to_string(), Served::Withheld);
        self
    }

    /// Report liveness from a pid file instead of the `running` flag.
    pub fn probe(mut self, probe: ProcessProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Keep the last `capacity` opaque calls for `take_calls`. Off (0)
    /// by default.
    pub fn record_calls(mut self, capacity: usize) -> Self {
        self.call_log = capacity;
        self
    }

    pub fn build(self) -> Arc<LocalService> {
        Arc::new(LocalService {
            name: self.name,
            running: AtomicBool::new(self.running),
            discovery_marker: self.discovery_marker,
            relaunch_required: self.relaunch_required,
            launched_by_service: self.launched_by_service,
            app_id: self.app_id,
            served: self.served,
            probe: self.probe,
            state: Mutex::new(State {
                friends: self.friends,
                ..State::default()
            }),
            outlet: RwLock::new(None),
            calls: (self.call_log > 0).then(|| ArrayQueue::new(self.call_log)),
            relaunches: AtomicUsize::new(0),
            next_call: AtomicU64::new(1),
            started: Instant::now(),
        })
    }
}

#[derive(Default)]
struct State {
    next_pipe: u32,
    next_user: u32,
    next_ticket: u32,
    pipes: HashMap<PipeHandle, Vec<UserHandle>>,
    personas: HashMap<UserHandle, String>,
    tickets: HashMap<TicketHandle, UserHandle>,
    rich_presence: HashMap<(UserHandle, String), String>,
    friends: Vec<(u64, String)>,
}

impl State {
    fn drop_user(&mut self, user: UserHandle) {
        self.tickets.retain(|_, owner| *owner != user);
        self.rich_presence.retain(|(owner, _), _| *owner != user);
        self.personas.remove(&user);
    }
}

pub struct LocalService {
    name: String,
    running: AtomicBool,
    discovery_marker: bool,
    relaunch_required: bool,
    launched_by_service: bool,
    app_id: u32,
    served: HashMap<String, Served>,
    probe: Option<ProcessProbe>,
    state: Mutex<State>,
    outlet: RwLock<Option<Arc<dyn NotificationOutlet>>>,
    calls: Option<ArrayQueue<CallRecord>>,
    relaunches: AtomicUsize,
    next_call: AtomicU64,
    started: Instant,
}

impl LocalService {
    pub fn builder() -> LocalServiceBuilder {
        LocalServiceBuilder::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flip reachability at runtime. Ignored when a probe is installed.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Post a notification through the attached outlet. False if there
    /// is no outlet or the pipe is not open on the runtime side.
    pub fn emit(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kind: u32,
        payload: Vec<u8>,
        class: QueueClass,
    ) -> bool {
        let outlet = self.outlet.read().unwrap_or_else(|e| e.into_inner()).clone();
        match outlet {
            Some(o) => o.post(pipe, user, kind, payload, class),
            None => {
                ktrace!("{}: kind {} dropped, no outlet", self.name, kind);
                false
            }
        }
    }

    pub fn has_outlet(&self) -> bool {
        self.outlet.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn open_pipes(&self) -> usize {
        self.lock().pipes.len()
    }

    pub fn connected_users(&self, pipe: PipeHandle) -> usize {
        self.lock().pipes.get(&pipe).map_or(0, Vec::len)
    }

    pub fn relaunch_requests(&self) -> usize {
        self.relaunches.load(Ordering::Acquire)
    }

    /// Drain the opaque call log, oldest first. Empty unless built with
    /// `record_calls`.
    pub fn take_calls(&self) -> Vec<CallRecord> {
        match &self.calls {
            Some(log) => std::iter::from_fn(|| log.pop()).collect(),
            None => Vec::new(),
        }
    }

    pub fn active_tickets(&self) -> usize {
        self.lock().tickets.len()
    }

    pub fn account_id_of(&self, user: UserHandle) -> u64 {
        ACCOUNT_BASE + u64::from(user.as_u32())
    }

    pub fn player_level_of(&self, user: UserHandle) -> i32 {
        10 + (user.as_u32() % 90) as i32
    }

    /// The blob `initiate_connection` produces: account id (u64 LE),
    /// port (u16 LE), secure flag byte.
    pub fn connection_blob(&self, user: UserHandle, port: u16, secure: bool) -> Vec<u8> {
        let mut blob = Vec::with_capacity(11);
        blob.extend_from_slice(&self.account_id_of(user).to_le_bytes());
        blob.extend_from_slice(&port.to_le_bytes());
        blob.push(u8::from(secure));
        blob
    }

    fn owner_of(&self, user: UserHandle) -> Option<PipeHandle> {
        self.lock()
            .pipes
            .iter()
            .find(|(_, users)| users.contains(&user))
            .map(|(pipe, _)| *pipe)
    }
}

impl BackingService for LocalService {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        match &self.probe {
            Some(probe) => probe.is_alive(),
            None => self.running.load(Ordering::Acquire),
        }
    }

    fn launched_by_service(&self) -> bool {
        self.launched_by_service
    }

    fn request_relaunch(&self, app_id: u32) -> ApiResult<()> {
        if !self.is_running() {
            return Err(BootstrapFailure::ServiceNotRunning.into());
        }
        self.relaunches.fetch_add(1, Ordering::AcqRel);
        kdebug!("{}: relaunch of app {} requested", self.name, app_id);
        Ok(())
    }

    fn served_versions(&self, name: &str) -> Vec<VersionTag> {
        match self.served.get(name) {
            Some(Served::Tags(tags)) => tags.clone(),
            Some(Served::Withheld) => Vec::new(),
            None => Subsystem::from_name(name)
                .map(|s| s.versions().to_vec())
                .unwrap_or_default(),
        }
    }

    fn attach_outlet(&self, outlet: Arc<dyn NotificationOutlet>) {
        *self.outlet.write().unwrap_or_else(|e| e.into_inner()) = Some(outlet);
    }

    fn detach_outlet(&self) {
        *self.outlet.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn open_pipe(&self) -> ApiResult<PipeHandle> {
        if !self.is_running() {
            return Err(BootstrapFailure::ServiceNotRunning.into());
        }
        if !self.discovery_marker {
            return Err(BootstrapFailure::NoDiscoveryMarker.into());
        }
        if self.relaunch_required {
            return Err(BootstrapFailure::RelaunchRequired.into());
        }
        let mut st = self.lock();
        st.next_pipe += 1;
        let pipe = PipeHandle::new(st.next_pipe);
        st.pipes.insert(pipe, Vec::new());
        Ok(pipe)
    }

    fn close_pipe(&self, pipe: PipeHandle) {
        let mut st = self.lock();
        let Some(users) = st.pipes.remove(&pipe) else {
            kwarn!("{}: close of unknown pipe {}", self.name, pipe);
            return;
        };
        for user in users {
            st.drop_user(user);
        }
    }

    fn connect_user(&self, pipe: PipeHandle) -> ApiResult<UserHandle> {
        let mut st = self.lock();
        if !st.pipes.contains_key(&pipe) {
            return Err(ApiError::UnknownPipe(pipe));
        }
        st.next_user += 1;
        let user = UserHandle::new(st.next_user);
        st.pipes.entry(pipe).or_default().push(user);
        Ok(user)
    }

    fn release_user(&self, pipe: PipeHandle, user: UserHandle) {
        let mut st = self.lock();
        if let Some(users) = st.pipes.get_mut(&pipe) {
            users.retain(|u| *u != user);
        }
        st.drop_user(user);
    }

    fn users(&self) -> &dyn UserService {
        self
    }

    fn friends(&self) -> &dyn FriendsService {
        self
    }

    fn utils(&self) -> &dyn UtilsService {
        self
    }

    fn call(&self, request: &CallRequest<'_>, out: &mut Vec<u8>) -> ApiResult<()> {
        if let Some(log) = &self.calls {
            log.force_push(CallRecord {
                interface: request.interface,
                pipe: request.pipe,
                user: request.user,
                method: request.method.to_string(),
                payload: request.payload.to_vec(),
            });
        }
        if !self.lock().pipes.contains_key(&request.pipe) {
            return Err(ApiError::UnknownPipe(request.pipe));
        }
        match request.method {
            "echo" => out.extend_from_slice(request.payload),
            "fail" => {
                return Err(ApiError::CallFailed(format!(
                    "{} rejected {}",
                    request.interface, request.method
                )))
            }
            method => {
                out.extend_from_slice(request.interface.version_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(method.as_bytes());
            }
        }
        Ok(())
    }
}

impl UserService for LocalService {
    fn account_id(&self, user: UserHandle) -> u64 {
        self.account_id_of(user)
    }

    fn logged_on(&self, user: UserHandle) -> bool {
        self.owner_of(user).is_some()
    }

    fn user_data_folder(&self, user: UserHandle) -> Option<String> {
        self.owner_of(user)?;
        let account = self.account_id_of(user) - ACCOUNT_BASE;
        Some(format!("userdata/{}/{}/local", account, self.app_id))
    }

    fn initiate_connection(&self, user: UserHandle, server: ServerEndpoint, secure: bool) -> Vec<u8> {
        ktrace!(
            "{}: user {} connecting to server {} at {:#x}:{}",
            self.name,
            user,
            server.server_id,
            server.ip,
            server.port
        );
        self.connection_blob(user, server.port, secure)
    }

    fn terminate_connection(&self, user: UserHandle, server: ServerEndpoint) {
        ktrace!("{}: user {} left {:#x}:{}", self.name, user, server.ip, server.port);
    }

    fn create_auth_ticket(&self, user: UserHandle) -> AuthTicket {
        let mut st = self.lock();
        st.next_ticket += 1;
        let handle = TicketHandle(st.next_ticket);
        st.tickets.insert(handle, user);

        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&self.account_id_of(user).to_le_bytes());
        bytes.extend_from_slice(&handle.0.to_le_bytes());
        bytes.extend_from_slice(&self.app_id.to_le_bytes());
        AuthTicket { handle, bytes }
    }

    fn cancel_auth_ticket(&self, user: UserHandle, ticket: TicketHandle) {
        let mut st = self.lock();
        if st.tickets.get(&ticket) == Some(&user) {
            st.tickets.remove(&ticket);
        }
    }

    fn behind_nat(&self, _user: UserHandle) -> bool {
        false
    }

    fn player_level(&self, user: UserHandle) -> i32 {
        self.player_level_of(user)
    }
}

impl FriendsService for LocalService {
    fn persona_name(&self, user: UserHandle) -> String {
        self.lock()
            .personas
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("player{}", user))
    }

    fn set_persona_name(&self, pipe: PipeHandle, user: UserHandle, name: &str) -> CallHandle {
        self.lock().personas.insert(user, name.to_string());
        let call = CallHandle(self.next_call.fetch_add(1, Ordering::Relaxed));

        let account = self.account_id_of(user).to_le_bytes().to_vec();
        self.emit(pipe, user, kinds::PERSONA_STATE_CHANGE, account, QueueClass::Foreground);
        self.emit(
            pipe,
            user,
            kinds::SET_PERSONA_NAME_RESPONSE,
            call.0.to_le_bytes().to_vec(),
            QueueClass::Foreground,
        );
        call
    }

    fn friend_count(&self, _user: UserHandle, flags: u32) -> usize {
        if flags & friend_flags::IMMEDIATE == 0 {
            return 0;
        }
        self.lock().friends.len()
    }

    fn friend_by_index(&self, _user: UserHandle, index: usize, flags: u32) -> Option<u64> {
        if flags & friend_flags::IMMEDIATE == 0 {
            return None;
        }
        self.lock().friends.get(index).map(|(id, _)| *id)
    }

    fn friend_persona_name(&self, _user: UserHandle, friend: u64) -> Option<String> {
        self.lock()
            .friends
            .iter()
            .find(|(id, _)| *id == friend)
            .map(|(_, name)| name.clone())
    }

    fn set_rich_presence(&self, user: UserHandle, key: &str, value: &str) -> bool {
        if key.is_empty() || key.len() > MAX_RICH_PRESENCE_KEY {
            return false;
        }
        let mut st = self.lock();
        if value.is_empty() {
            st.rich_presence.remove(&(user, key.to_string()));
        } else {
            st.rich_presence.insert((user, key.to_string()), value.to_string());
        }
        true
    }
}

impl UtilsService for LocalService {
    fn app_id(&self, _pipe: PipeHandle) -> u32 {
        self.app_id
    }

    fn server_real_time(&self, _pipe: PipeHandle) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    fn ip_country(&self, _pipe: PipeHandle) -> String {
        "US".to_string()
    }

    fn seconds_since_app_active(&self, _pipe: PipeHandle) -> u32 {
        u32::try_from(self.started.elapsed().as_secs()).unwrap_or(u32::MAX)
    }

    fn battery_power(&self, _pipe: PipeHandle) -> u8 {
        255
    }

    fn overlay_enabled(&self, _pipe: PipeHandle) -> bool {
        false
    }

    fn running_in_vr(&self, _pipe: PipeHandle) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(PipeHandle, u32, Vec<u8>)>>);

    impl NotificationOutlet for Capture {
        fn post(
            &self,
            pipe: PipeHandle,
            _user: UserHandle,
            kind: u32,
            payload: Vec<u8>,
            _class: QueueClass,
        ) -> bool {
            self.0.lock().unwrap().push((pipe, kind, payload));
            true
        }
    }

    fn connected(svc: &LocalService) -> (PipeHandle, UserHandle) {
        let pipe = svc.open_pipe().unwrap();
        let user = svc.connect_user(pipe).unwrap();
        (pipe, user)
    }

    #[test]
    fn test_open_pipe_failures() {
        let svc = LocalService::builder().running(false).build();
        assert_eq!(
            svc.open_pipe(),
            Err(ApiError::Bootstrap(BootstrapFailure::ServiceNotRunning))
        );
        let svc = LocalService::builder().relaunch_required(true).build();
        assert_eq!(
            svc.open_pipe(),
            Err(ApiError::Bootstrap(BootstrapFailure::RelaunchRequired))
        );
    }

    #[test]
    fn test_set_running() {
        let svc = LocalService::builder().build();
        assert!(svc.is_running());
        svc.set_running(false);
        assert!(!svc.is_running());
        assert!(svc.request_relaunch(480).is_err());
        assert_eq!(svc.relaunch_requests(), 0);
    }

    #[test]
    fn test_probe_overrides_flag() {
        let path = std::env::temp_dir().join(format!("hostlink-ls-{}.pid", std::process::id()));
        let svc = LocalService::builder().probe(ProcessProbe::new(&path)).build();
        assert!(!svc.is_running());
    }

    #[test]
    fn test_pipe_and_user_lifecycle() {
        let svc = LocalService::builder().build();
        let (pipe, user) = connected(&svc);
        assert_eq!(svc.open_pipes(), 1);
        assert_eq!(svc.connected_users(pipe), 1);
        assert!(svc.logged_on(user));

        let ticket = svc.create_auth_ticket(user);
        assert_eq!(svc.active_tickets(), 1);
        svc.close_pipe(pipe);
        assert_eq!(svc.open_pipes(), 0);
        assert_eq!(svc.active_tickets(), 0);
        assert!(!svc.logged_on(user));
        assert_eq!(svc.connect_user(pipe), Err(ApiError::UnknownPipe(pipe)));
        svc.cancel_auth_ticket(user, ticket.handle);
    }

    #[test]
    fn test_served_versions() {
        let svc = LocalService::builder()
            .serve_up_to("Friends", 9)
            .serve_only("Utils", &[5])
            .withhold("Video")
            .build();
        assert_eq!(svc.served_versions("Friends").len(), 6);
        assert_eq!(svc.served_versions("Utils"), vec![VersionTag::from_number(5).unwrap()]);
        assert!(svc.served_versions("Video").is_empty());
        assert!(svc.served_versions("Nope").is_empty());
        assert_eq!(svc.served_versions("User").len(), Subsystem::User.versions().len());
    }

    #[test]
    fn test_rename_emits_notifications() {
        let svc = LocalService::builder().build();
        let capture = Arc::new(Capture::default());
        svc.attach_outlet(capture.clone());
        let (pipe, user) = connected(&svc);

        let call = svc.set_persona_name(pipe, user, "zed");
        assert_eq!(svc.persona_name(user), "zed");
        let posted = capture.0.lock().unwrap().clone();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].1, kinds::PERSONA_STATE_CHANGE);
        assert_eq!(posted[1].1, kinds::SET_PERSONA_NAME_RESPONSE);
        assert_eq!(posted[1].2, call.0.to_le_bytes().to_vec());

        svc.detach_outlet();
        assert!(!svc.has_outlet());
        assert!(!svc.emit(pipe, user, 1, vec![], QueueClass::Foreground));
    }

    #[test]
    fn test_call_on_closed_pipe() {
        let svc = LocalService::builder().record_calls(4).build();
        let (pipe, user) = connected(&svc);
        svc.close_pipe(pipe);
        let req = CallRequest {
            interface: Subsystem::Http.latest_descriptor(),
            pipe,
            user,
            method: "Get",
            payload: &[],
        };
        let mut out = Vec::new();
        assert_eq!(svc.call(&req, &mut out), Err(ApiError::UnknownPipe(pipe)));
        assert_eq!(svc.take_calls().len(), 1);
    }

    #[test]
    fn test_call_log_off_by_default_and_bounded() {
        let quiet = LocalService::builder().build();
        let (pipe, user) = connected(&quiet);
        let req = CallRequest {
            interface: Subsystem::Http.latest_descriptor(),
            pipe,
            user,
            method: "echo",
            payload: &[0u8; 1024],
        };
        let mut out = Vec::new();
        for _ in 0..1000 {
            out.clear();
            assert!(quiet.call(&req, &mut out).is_ok());
        }
        assert!(quiet.take_calls().is_empty());

        let logged = LocalService::builder().record_calls(3).build();
        let (pipe, user) = connected(&logged);
        for method in ["a", "b", "c", "d", "e"] {
            let req = CallRequest { method, pipe, user, ..req };
            out.clear();
            assert!(logged.call(&req, &mut out).is_ok());
        }
        let methods: Vec<_> = logged.take_calls().into_iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["c", "d", "e"]);
        assert!(logged.take_calls().is_empty());
    }

    #[test]
    fn test_rich_presence_key_limits() {
        let svc = LocalService::builder().build();
        let (_pipe, user) = connected(&svc);
        assert!(svc.set_rich_presence(user, "status", "menu"));
        assert!(!svc.set_rich_presence(user, "", "menu"));
        assert!(!svc.set_rich_presence(user, &"k".repeat(65), "menu"));
    }
}
