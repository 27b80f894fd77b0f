//! Pass-through adapter for subsystems without a modeled method table
//!
//! The frozen shape is a single `call(method, payload)`; the service sees
//! the exact `(name, version)` the pointer was resolved as, so it can
//! apply that version's semantics.

use super::InterfaceContext;
use crate::tls;
use hostlink_core::descriptor::InterfaceDescriptor;
use hostlink_core::error::{ApiError, ApiResult};
use hostlink_core::service::CallRequest;
use hostlink_core::traits::Interface;
use std::any::Any;
use std::sync::Arc;

pub struct RemoteInterface {
    ctx: InterfaceContext,
}

impl RemoteInterface {
    pub(crate) fn create(ctx: InterfaceContext) -> Arc<dyn Interface> {
        Arc::new(RemoteInterface { ctx })
    }

    pub fn context(&self) -> &InterfaceContext {
        &self.ctx
    }

    /// Call `method`, returning an owned copy of the reply.
    pub fn call(&self, method: &str, payload: &[u8]) -> ApiResult<Vec<u8>> {
        self.call_with(method, payload, <[u8]>::to_vec)
    }

    /// Call `method` and hand the reply to `f` without copying it out of
    /// the thread's scratch buffer.
    pub fn call_with<R>(
        &self,
        method: &str,
        payload: &[u8],
        f: impl FnOnce(&[u8]) -> R,
    ) -> ApiResult<R> {
        if !self.ctx.is_live() {
            debug_assert!(
                false,
                "{} used after pipe {} was closed",
                self.ctx.descriptor(),
                self.ctx.pipe()
            );
            return Err(ApiError::UseAfterShutdown);
        }
        let request = CallRequest {
            interface: self.ctx.descriptor(),
            pipe: self.ctx.pipe(),
            user: self.ctx.user(),
            method,
            payload,
        };
        tls::with_scratch(|buf| -> ApiResult<R> {
            self.ctx.service().call(&request, buf)?;
            Ok(f(buf))
        })
    }
}

impl Interface for RemoteInterface {
    fn descriptor(&self) -> InterfaceDescriptor {
        self.ctx.descriptor()
    }

    fn is_live(&self) -> bool {
        self.ctx.is_live()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for RemoteInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteInterface").field(&self.ctx).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::context;
    use hostlink_core::subsystem::Subsystem;
    use hostlink_core::traits::downcast_interface;
    use hostlink_module::LocalService;

    #[test]
    fn test_call_carries_version() {
        let svc = LocalService::builder().record_calls(8).build();
        let (ctx, _link) = context(&svc, Subsystem::RemoteStorage, 13);
        let r = downcast_interface::<RemoteInterface>(RemoteInterface::create(ctx)).unwrap();

        let reply = r.call("FileExists", b"save.dat").unwrap();
        assert_eq!(reply, b"RemoteStorage013:FileExists".to_vec());

        let log = svc.take_calls();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].interface.version_string(), "RemoteStorage013");
        assert_eq!(log[0].payload, b"save.dat".to_vec());
    }

    #[test]
    fn test_call_with_borrows_reply() {
        let svc = LocalService::builder().build();
        let (ctx, _link) = context(&svc, Subsystem::Http, 3);
        let r = downcast_interface::<RemoteInterface>(RemoteInterface::create(ctx)).unwrap();
        let len = r.call_with("echo", &[1, 2, 3, 4], |reply| reply.len()).unwrap();
        assert_eq!(len, 4);
    }

    #[test]
    fn test_call_failure() {
        let svc = LocalService::builder().build();
        let (ctx, _link) = context(&svc, Subsystem::Ugc, 14);
        let r = downcast_interface::<RemoteInterface>(RemoteInterface::create(ctx)).unwrap();
        assert!(matches!(r.call("fail", &[]), Err(ApiError::CallFailed(_))));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_call_after_close() {
        let svc = LocalService::builder().build();
        let (ctx, link) = context(&svc, Subsystem::Ugc, 14);
        let r = downcast_interface::<RemoteInterface>(RemoteInterface::create(ctx)).unwrap();
        link.close_for_test();
        assert_eq!(r.call("anything", &[]), Err(ApiError::UseAfterShutdown));
    }
}
