//! Versioned interface adapters
//!
//! One Rust type per published `(name, version)`. Each type's methods are
//! the frozen shape of that version; all of them forward to the single
//! current implementation behind `BackingService` and translate argument
//! and return shapes on the way.
//!
//! Method groups are traits with default bodies. A version type opts into
//! exactly the groups its era had, so a method that did not exist in a
//! version is a compile error on that type rather than a runtime failure.

pub mod friends;
pub mod remote;
pub mod user;
pub mod utils;

use crate::session::PipeLink;
use hostlink_core::descriptor::{InterfaceDescriptor, VersionTag};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::service::BackingService;
use hostlink_core::subsystem::Subsystem;
use hostlink_core::traits::Interface;
use std::sync::Arc;

/// Builds the adapter for one `(name, version)` bound to a pipe/user.
pub type AdapterFactory = fn(InterfaceContext) -> Arc<dyn Interface>;

/// What every adapter carries: who it was resolved for and how to reach
/// the service.
#[derive(Clone)]
pub struct InterfaceContext {
    descriptor: InterfaceDescriptor,
    pipe: PipeHandle,
    user: UserHandle,
    link: Arc<PipeLink>,
    service: Arc<dyn BackingService>,
}

impl InterfaceContext {
    pub(crate) fn new(
        descriptor: InterfaceDescriptor,
        user: UserHandle,
        link: Arc<PipeLink>,
        service: Arc<dyn BackingService>,
    ) -> Self {
        Self {
            descriptor,
            pipe: link.pipe(),
            user,
            link,
            service,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> InterfaceDescriptor {
        self.descriptor
    }

    #[inline]
    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }

    #[inline]
    pub fn user(&self) -> UserHandle {
        self.user
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.link.is_alive()
    }

    /// The service, for forwarding a call.
    ///
    /// Calling through an adapter whose pipe has closed is a contract
    /// violation; debug builds assert on it.
    #[inline]
    pub fn service(&self) -> &dyn BackingService {
        debug_assert!(
            self.is_live(),
            "{} used after pipe {} was closed",
            self.descriptor,
            self.pipe
        );
        &*self.service
    }
}

impl std::fmt::Debug for InterfaceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceContext")
            .field("descriptor", &self.descriptor)
            .field("pipe", &self.pipe)
            .field("user", &self.user)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Access to the context, implemented by every adapter type. Method
/// group traits build on it.
pub trait Adapter: Interface {
    fn ctx(&self) -> &InterfaceContext;
}

/// Declare one adapter type per version.
macro_rules! versioned_adapter {
    ($($(#[$meta:meta])* $ty:ident;)*) => {$(
        $(#[$meta])*
        pub struct $ty {
            ctx: $crate::adapters::InterfaceContext,
        }

        impl $ty {
            pub(crate) fn create(
                ctx: $crate::adapters::InterfaceContext,
            ) -> ::std::sync::Arc<dyn ::hostlink_core::traits::Interface> {
                ::std::sync::Arc::new($ty { ctx })
            }
        }

        impl ::hostlink_core::traits::Interface for $ty {
            fn descriptor(&self) -> ::hostlink_core::descriptor::InterfaceDescriptor {
                self.ctx.descriptor()
            }

            fn is_live(&self) -> bool {
                self.ctx.is_live()
            }

            fn into_any(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::std::any::Any + Send + Sync> {
                self
            }
        }

        impl $crate::adapters::Adapter for $ty {
            #[inline]
            fn ctx(&self) -> &$crate::adapters::InterfaceContext {
                &self.ctx
            }
        }

        impl ::std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&self.ctx).finish()
            }
        }
    )*};
}

/// Opt a list of version types into a method group.
macro_rules! method_group {
    ($group:path => $($ty:ident),+ $(,)?) => {
        $(impl $group for $ty {})+
    };
}

pub(crate) use method_group;
pub(crate) use versioned_adapter;

/// The adapter factory for `(subsystem, tag)`, if this build has one.
pub fn factory(subsystem: Subsystem, tag: VersionTag) -> Option<AdapterFactory> {
    match subsystem {
        Subsystem::User => user::factory(tag),
        Subsystem::Friends => friends::factory(tag),
        Subsystem::Utils => utils::factory(tag),
        other if other.publishes(tag) => Some(remote::RemoteInterface::create as AdapterFactory),
        _ => None,
    }
}

/// Every `(name, tag)` this build can adapt.
pub fn catalog() -> impl Iterator<Item = InterfaceDescriptor> {
    Subsystem::ALL.into_iter().flat_map(|s| {
        s.versions()
            .iter()
            .filter(move |tag| factory(s, **tag).is_some())
            .map(move |tag| InterfaceDescriptor::new(s.name(), *tag))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_published_tag_has_adapter() {
        for s in Subsystem::ALL {
            for tag in s.versions() {
                assert!(factory(s, *tag).is_some(), "{}{} has no adapter", s.name(), tag);
            }
        }
    }

    #[test]
    fn test_unpublished_tag_has_no_adapter() {
        let tag = VersionTag::from_number(21).unwrap();
        assert!(factory(Subsystem::User, tag).is_none());
        let tag = VersionTag::from_number(2).unwrap();
        assert!(factory(Subsystem::Controller, tag).is_none());
    }

    #[test]
    fn test_catalog_size() {
        let expected: usize = Subsystem::ALL.iter().map(|s| s.versions().len()).sum();
        assert_eq!(catalog().count(), expected);
    }
}
