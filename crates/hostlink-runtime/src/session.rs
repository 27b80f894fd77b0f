//! Session and handle manager
//!
//! Tracks open pipes, the users connected on each, and which pair is the
//! default. Every adapter resolved against a pipe holds that pipe's
//! `PipeLink`; closing the pipe flips the link so stale pointers can be
//! detected in debug builds.

use crate::tls;
use hostlink_core::error::{ApiError, ApiResult, BootstrapFailure};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::service::BackingService;
use hostlink_core::{kdebug, kwarn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Liveness flag shared by everything resolved against one pipe.
#[derive(Debug)]
pub struct PipeLink {
    pipe: PipeHandle,
    alive: AtomicBool,
}

impl PipeLink {
    pub(crate) fn new(pipe: PipeHandle) -> Self {
        Self {
            pipe,
            alive: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn close_for_test(&self) {
        self.close();
    }
}

struct PipeEntry {
    link: Arc<PipeLink>,
    users: Vec<UserHandle>,
}

#[derive(Default)]
struct Tables {
    pipes: HashMap<PipeHandle, PipeEntry>,
    default_pipe: PipeHandle,
    default_user: UserHandle,
}

/// Pipe and user tables.
#[derive(Default)]
pub struct SessionManager {
    tables: RwLock<Tables>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a pipe to the service. The first pipe becomes the default.
    pub fn open_pipe(&self, service: &dyn BackingService) -> ApiResult<PipeHandle> {
        if !service.is_running() {
            return Err(BootstrapFailure::ServiceNotRunning.into());
        }
        let pipe = service.open_pipe()?;
        if pipe.is_none() {
            return Err(BootstrapFailure::ConnectFailed(format!(
                "{} returned the null pipe handle",
                service.module_name()
            ))
            .into());
        }

        let mut t = self.write();
        t.pipes.insert(
            pipe,
            PipeEntry {
                link: Arc::new(PipeLink::new(pipe)),
                users: Vec::new(),
            },
        );
        if t.default_pipe.is_none() {
            t.default_pipe = pipe;
        }
        kdebug!("pipe {} opened", pipe);
        Ok(pipe)
    }

    /// Connect a new user on `pipe`. The first user on the default pipe
    /// becomes the default user.
    pub fn add_user(&self, service: &dyn BackingService, pipe: PipeHandle) -> ApiResult<UserHandle> {
        if !self.is_open(pipe) {
            return Err(ApiError::UnknownPipe(pipe));
        }
        let user = service.connect_user(pipe)?;
        if user.is_none() {
            return Err(BootstrapFailure::ConnectFailed(format!(
                "{} returned the null user handle",
                service.module_name()
            ))
            .into());
        }

        let mut t = self.write();
        let Some(entry) = t.pipes.get_mut(&pipe) else {
            // Closed while the service was connecting.
            drop(t);
            service.release_user(pipe, user);
            return Err(ApiError::UnknownPipe(pipe));
        };
        entry.users.push(user);
        if t.default_pipe == pipe && t.default_user.is_none() {
            t.default_user = user;
        }
        kdebug!("user {} connected on pipe {}", user, pipe);
        Ok(user)
    }

    /// Release one user. Returns false if it was not connected.
    pub fn release_user(
        &self,
        service: &dyn BackingService,
        pipe: PipeHandle,
        user: UserHandle,
    ) -> bool {
        let removed = {
            let mut t = self.write();
            let removed = match t.pipes.get_mut(&pipe) {
                Some(entry) => {
                    let before = entry.users.len();
                    entry.users.retain(|u| *u != user);
                    entry.users.len() != before
                }
                None => false,
            };
            if removed && t.default_pipe == pipe && t.default_user == user {
                t.default_user = UserHandle::NONE;
            }
            removed
        };
        if removed {
            service.release_user(pipe, user);
        }
        removed
    }

    /// Close a pipe: invalidate its link, release its users, tell the
    /// service. Returns the users that were released, or `None` if the
    /// pipe was not open.
    pub fn close_pipe(
        &self,
        service: Option<&dyn BackingService>,
        pipe: PipeHandle,
    ) -> Option<Vec<UserHandle>> {
        let entry = {
            let mut t = self.write();
            let entry = t.pipes.remove(&pipe)?;
            if t.default_pipe == pipe {
                t.default_pipe = PipeHandle::NONE;
                t.default_user = UserHandle::NONE;
            }
            entry
        };
        entry.link.close();

        match service {
            Some(service) => {
                for user in &entry.users {
                    service.release_user(pipe, *user);
                }
                service.close_pipe(pipe);
            }
            None => kwarn!("pipe {} closed with no service module loaded", pipe),
        }
        kdebug!("pipe {} closed ({} users released)", pipe, entry.users.len());
        Some(entry.users)
    }

    pub fn link(&self, pipe: PipeHandle) -> Option<Arc<PipeLink>> {
        self.read().pipes.get(&pipe).map(|e| e.link.clone())
    }

    pub fn is_open(&self, pipe: PipeHandle) -> bool {
        self.read().pipes.contains_key(&pipe)
    }

    pub fn has_user(&self, pipe: PipeHandle, user: UserHandle) -> bool {
        self.read()
            .pipes
            .get(&pipe)
            .is_some_and(|e| e.users.contains(&user))
    }

    pub fn users(&self, pipe: PipeHandle) -> Vec<UserHandle> {
        self.read()
            .pipes
            .get(&pipe)
            .map(|e| e.users.clone())
            .unwrap_or_default()
    }

    /// Every open pipe, ascending.
    pub fn pipes(&self) -> Vec<PipeHandle> {
        let mut pipes: Vec<_> = self.read().pipes.keys().copied().collect();
        pipes.sort();
        pipes
    }

    pub fn default_pipe(&self) -> PipeHandle {
        self.read().default_pipe
    }

    pub fn default_user(&self) -> UserHandle {
        self.read().default_user
    }

    /// The pipe of the notification being dispatched on this thread, or
    /// the default pipe.
    pub fn current_pipe(&self) -> PipeHandle {
        tls::dispatch_pipe().unwrap_or_else(|| self.default_pipe())
    }

    /// The user of the notification being dispatched on this thread, or
    /// the default user.
    pub fn current_user(&self) -> UserHandle {
        tls::dispatch_user().unwrap_or_else(|| self.default_user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_module::LocalService;

    #[test]
    fn test_open_sets_default() {
        let svc = LocalService::builder().build();
        let sm = SessionManager::new();
        let p1 = sm.open_pipe(&*svc).unwrap();
        let p2 = sm.open_pipe(&*svc).unwrap();
        assert_ne!(p1, p2);
        assert_eq!(sm.default_pipe(), p1);
        assert_eq!(sm.pipes(), vec![p1, p2]);

        let u = sm.add_user(&*svc, p1).unwrap();
        assert_eq!(sm.default_user(), u);
        assert_eq!(sm.current_user(), u);
        assert!(sm.has_user(p1, u));
        assert!(!sm.has_user(p2, u));
    }

    #[test]
    fn test_open_fails_when_not_running() {
        let svc = LocalService::builder().running(false).build();
        let sm = SessionManager::new();
        let err = sm.open_pipe(&*svc).unwrap_err();
        assert_eq!(err, ApiError::Bootstrap(BootstrapFailure::ServiceNotRunning));
    }

    #[test]
    fn test_open_fails_without_marker() {
        let svc = LocalService::builder().discovery_marker(false).build();
        let sm = SessionManager::new();
        let err = sm.open_pipe(&*svc).unwrap_err();
        assert_eq!(err, ApiError::Bootstrap(BootstrapFailure::NoDiscoveryMarker));
    }

    #[test]
    fn test_close_invalidates_link() {
        let svc = LocalService::builder().build();
        let sm = SessionManager::new();
        let pipe = sm.open_pipe(&*svc).unwrap();
        let user = sm.add_user(&*svc, pipe).unwrap();
        let link = sm.link(pipe).unwrap();
        assert!(link.is_alive());

        let released = sm.close_pipe(Some(&*svc), pipe).unwrap();
        assert_eq!(released, vec![user]);
        assert!(!link.is_alive());
        assert!(!sm.is_open(pipe));
        assert_eq!(sm.default_pipe(), PipeHandle::NONE);
        assert_eq!(sm.current_user(), UserHandle::NONE);
        assert!(sm.close_pipe(Some(&*svc), pipe).is_none());
    }

    #[test]
    fn test_add_user_unknown_pipe() {
        let svc = LocalService::builder().build();
        let sm = SessionManager::new();
        let err = sm.add_user(&*svc, PipeHandle::new(77)).unwrap_err();
        assert_eq!(err, ApiError::UnknownPipe(PipeHandle::new(77)));
    }

    #[test]
    fn test_release_user() {
        let svc = LocalService::builder().build();
        let sm = SessionManager::new();
        let pipe = sm.open_pipe(&*svc).unwrap();
        let u1 = sm.add_user(&*svc, pipe).unwrap();
        let u2 = sm.add_user(&*svc, pipe).unwrap();
        assert!(sm.release_user(&*svc, pipe, u1));
        assert!(!sm.release_user(&*svc, pipe, u1));
        assert_eq!(sm.users(pipe), vec![u2]);
        assert_eq!(sm.default_user(), UserHandle::NONE);
    }

    #[test]
    fn test_current_user_during_dispatch() {
        let svc = LocalService::builder().build();
        let sm = SessionManager::new();
        let pipe = sm.open_pipe(&*svc).unwrap();
        let u1 = sm.add_user(&*svc, pipe).unwrap();
        let u2 = sm.add_user(&*svc, pipe).unwrap();
        {
            let _g = tls::DispatchUserGuard::enter(pipe, u2);
            assert_eq!(sm.current_user(), u2);
        }
        assert_eq!(sm.current_user(), u1);
    }
}
