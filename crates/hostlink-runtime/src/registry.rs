//! Interface registry
//!
//! Maps `(name, version)` requests to adapters. The table of what can be
//! resolved is fixed at `init` by negotiation: the tags the running
//! service serves, intersected with the tags this build has adapters for.
//!
//! Resolved pointers are cached per `(pipe, user, name, tag)` so the same
//! request returns the same `Arc` for as long as the pipe stays open.
//! Pipe-scoped subsystems drop the user from the key: every user on a
//! pipe shares one Client and one Utils pointer.

use crate::adapters::{self, InterfaceContext};
use crate::session::SessionManager;
use hostlink_core::descriptor::{split_version_string, InterfaceDescriptor, VersionTag};
use hostlink_core::error::{ApiError, ApiResult, ResolutionFailure};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::service::BackingService;
use hostlink_core::subsystem::Subsystem;
use hostlink_core::traits::Interface;
use hostlink_core::{kdebug, kinfo, ktrace};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// One resolution request.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub pipe: PipeHandle,
    pub user: UserHandle,
    pub name: &'a str,
    /// Three-digit tag, e.g. `"019"`.
    pub version: &'a str,
}

/// Outcome of negotiation for one subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub subsystem: Subsystem,
    /// Ascending; last entry is the current version.
    pub tags: Vec<VersionTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    pipe: PipeHandle,
    user: UserHandle,
    subsystem: Subsystem,
    tag: VersionTag,
}

/// The negotiated table plus the pointer cache.
#[derive(Default)]
pub struct Registry {
    table: RwLock<Option<HashMap<Subsystem, Vec<VersionTag>>>>,
    cache: Mutex<HashMap<CacheKey, Arc<dyn Interface>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the negotiated table from what `service` serves. Returns the
    /// number of `(name, tag)` pairs both sides support.
    pub fn negotiate(&self, service: &dyn BackingService) -> usize {
        let mut table = HashMap::new();
        let mut total = 0;

        for subsystem in Subsystem::ALL {
            let mut tags: Vec<VersionTag> = Vec::new();
            for tag in service.served_versions(subsystem.name()) {
                if adapters::factory(subsystem, tag).is_some() {
                    tags.push(tag);
                } else {
                    kdebug!(
                        "registry: {} serves {}{} but this build has no adapter",
                        service.module_name(),
                        subsystem.name(),
                        tag
                    );
                }
            }
            tags.sort_unstable();
            tags.dedup();
            if tags.is_empty() {
                continue;
            }
            total += tags.len();
            table.insert(subsystem, tags);
        }

        kinfo!(
            "registry: negotiated {} interface versions across {} subsystems with {}",
            total,
            table.len(),
            service.module_name()
        );
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = Some(table);
        total
    }

    pub fn is_negotiated(&self) -> bool {
        self.table.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Highest negotiated tag for `name`.
    pub fn current_version(&self, name: &str) -> Option<VersionTag> {
        let subsystem = Subsystem::from_name(name)?;
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.as_ref()?.get(&subsystem)?.last().copied()
    }

    /// Every negotiated subsystem, in catalog order.
    pub fn negotiated(&self) -> Vec<Negotiated> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        let Some(table) = table.as_ref() else {
            return Vec::new();
        };
        Subsystem::ALL
            .iter()
            .filter_map(|s| {
                table.get(s).map(|tags| Negotiated {
                    subsystem: *s,
                    tags: tags.clone(),
                })
            })
            .collect()
    }

    /// Resolve `req`, checking in order: module, negotiation, pipe, user,
    /// name, tag known to this build, tag served.
    pub fn resolve(
        &self,
        service: Option<&Arc<dyn BackingService>>,
        session: &SessionManager,
        req: ResolveRequest<'_>,
    ) -> ApiResult<Arc<dyn Interface>> {
        let fail = |reason| Err(ApiError::resolution(req.name, req.version, reason));

        let Some(service) = service else {
            return fail(ResolutionFailure::ModuleNotLoaded);
        };
        if !self.is_negotiated() {
            return fail(ResolutionFailure::NotNegotiated);
        }
        let Some(link) = session.link(req.pipe) else {
            return fail(ResolutionFailure::PipeClosed);
        };
        if req.user.is_some() && !session.has_user(req.pipe, req.user) {
            return fail(ResolutionFailure::UnknownUser);
        }
        let Some(subsystem) = Subsystem::from_name(req.name) else {
            return fail(ResolutionFailure::UnknownInterface);
        };
        if req.user.is_none() && !subsystem.pipe_scoped() {
            return fail(ResolutionFailure::UnknownUser);
        }
        let Some(tag) = VersionTag::parse(req.version) else {
            return fail(ResolutionFailure::UnknownVersion);
        };
        let Some(factory) = adapters::factory(subsystem, tag) else {
            return fail(ResolutionFailure::UnknownVersion);
        };
        if !self.serves(subsystem, tag) {
            return fail(ResolutionFailure::NotServed);
        }

        let key = CacheKey {
            pipe: req.pipe,
            user: if subsystem.pipe_scoped() { UserHandle::NONE } else { req.user },
            subsystem,
            tag,
        };
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        // Closing flips the link before purging under this lock.
        if !link.is_alive() {
            return fail(ResolutionFailure::PipeClosed);
        }
        let iface = cache.entry(key).or_insert_with(|| {
            ktrace!("registry: building {}{} for pipe {} user {}", req.name, tag, key.pipe, key.user);
            let descriptor = InterfaceDescriptor::new(subsystem.name(), tag);
            factory(InterfaceContext::new(descriptor, key.user, link, service.clone()))
        });
        Ok(iface.clone())
    }

    /// Resolve a full version string such as `"User019"`.
    pub fn resolve_version_string(
        &self,
        service: Option<&Arc<dyn BackingService>>,
        session: &SessionManager,
        pipe: PipeHandle,
        user: UserHandle,
        version_string: &str,
    ) -> ApiResult<Arc<dyn Interface>> {
        let Some((name, tag)) = split_version_string(version_string) else {
            let reason = if Subsystem::ALL.iter().any(|s| version_string.starts_with(s.name())) {
                ResolutionFailure::UnknownVersion
            } else {
                ResolutionFailure::UnknownInterface
            };
            return Err(ApiError::resolution(version_string, "", reason));
        };
        let tag = tag.to_string();
        self.resolve(
            service,
            session,
            ResolveRequest {
                pipe,
                user,
                name,
                version: &tag,
            },
        )
    }

    fn serves(&self, subsystem: Subsystem, tag: VersionTag) -> bool {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table
            .as_ref()
            .and_then(|t| t.get(&subsystem))
            .is_some_and(|tags| tags.binary_search(&tag).is_ok())
    }

    /// Drop cached pointers for a closed pipe. Returns how many.
    pub fn purge_pipe(&self, pipe: PipeHandle) -> usize {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let before = cache.len();
        cache.retain(|k, _| k.pipe != pipe);
        before - cache.len()
    }

    /// Drop cached pointers for one released user.
    pub fn purge_user(&self, pipe: PipeHandle, user: UserHandle) -> usize {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let before = cache.len();
        cache.retain(|k, _| !(k.pipe == pipe && k.user == user));
        before - cache.len()
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Forget the negotiated table and every cached pointer.
    pub fn clear(&self) {
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
