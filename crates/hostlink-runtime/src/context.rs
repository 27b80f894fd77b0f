//! Aggregated interface context
//!
//! Resolves one pointer per subsystem, at the newest version this build
//! ships, against the current pipe and user. Any missing one fails the
//! whole context.

use crate::adapters::friends::FriendsV017;
use crate::adapters::remote::RemoteInterface;
use crate::adapters::user::UserV020;
use crate::adapters::utils::UtilsV009;
use crate::runtime::Runtime;
use hostlink_core::error::{ApiError, ApiResult, ResolutionFailure};
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::subsystem::Subsystem;
use hostlink_core::traits::{downcast_interface, Interface};
use hostlink_core::kdebug;
use std::sync::Arc;

/// One resolved pointer per subsystem.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pipe: PipeHandle,
    user: UserHandle,
    pub client: Arc<RemoteInterface>,
    pub user_api: Arc<UserV020>,
    pub friends: Arc<FriendsV017>,
    pub utils: Arc<UtilsV009>,
    pub matchmaking: Arc<RemoteInterface>,
    pub game_search: Arc<RemoteInterface>,
    pub matchmaking_servers: Arc<RemoteInterface>,
    pub user_stats: Arc<RemoteInterface>,
    pub apps: Arc<RemoteInterface>,
    pub networking: Arc<RemoteInterface>,
    pub remote_storage: Arc<RemoteInterface>,
    pub screenshots: Arc<RemoteInterface>,
    pub http: Arc<RemoteInterface>,
    pub controller: Arc<RemoteInterface>,
    pub ugc: Arc<RemoteInterface>,
    pub app_list: Arc<RemoteInterface>,
    pub music: Arc<RemoteInterface>,
    pub music_remote: Arc<RemoteInterface>,
    /// Not served on Android.
    pub html_surface: Option<Arc<RemoteInterface>>,
    pub inventory: Arc<RemoteInterface>,
    pub video: Arc<RemoteInterface>,
    pub parental_settings: Arc<RemoteInterface>,
    pub input: Arc<RemoteInterface>,
}

struct Resolver<'a> {
    rt: &'a Runtime,
    pipe: PipeHandle,
    user: UserHandle,
}

impl Resolver<'_> {
    fn get<T: Interface>(&self, subsystem: Subsystem) -> ApiResult<Arc<T>> {
        let tag = subsystem.latest().to_string();
        let iface = self.rt.try_resolve_for(self.pipe, self.user, subsystem.name(), &tag)?;
        downcast_interface::<T>(iface).ok_or_else(|| {
            ApiError::resolution(subsystem.name(), &tag, ResolutionFailure::UnknownVersion)
        })
    }

    fn remote(&self, subsystem: Subsystem) -> ApiResult<Arc<RemoteInterface>> {
        self.get(subsystem)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        fn html_surface(_r: &Resolver<'_>) -> ApiResult<Option<Arc<RemoteInterface>>> {
            Ok(None)
        }
    } else {
        fn html_surface(r: &Resolver<'_>) -> ApiResult<Option<Arc<RemoteInterface>>> {
            r.remote(Subsystem::HtmlSurface).map(Some)
        }
    }
}

impl ApiContext {
    /// Resolve every subsystem in catalog order. The first failure is
    /// returned and nothing is kept.
    pub fn init(rt: &Runtime) -> ApiResult<ApiContext> {
        if !rt.is_initialized() {
            return Err(ApiError::NotInitialized);
        }
        let r = Resolver {
            rt,
            pipe: rt.current_pipe(),
            user: rt.current_user(),
        };

        let ctx = ApiContext {
            pipe: r.pipe,
            user: r.user,
            client: r.remote(Subsystem::Client)?,
            user_api: r.get(Subsystem::User)?,
            friends: r.get(Subsystem::Friends)?,
            utils: r.get(Subsystem::Utils)?,
            matchmaking: r.remote(Subsystem::Matchmaking)?,
            game_search: r.remote(Subsystem::GameSearch)?,
            matchmaking_servers: r.remote(Subsystem::MatchmakingServers)?,
            user_stats: r.remote(Subsystem::UserStats)?,
            apps: r.remote(Subsystem::Apps)?,
            networking: r.remote(Subsystem::Networking)?,
            remote_storage: r.remote(Subsystem::RemoteStorage)?,
            screenshots: r.remote(Subsystem::Screenshots)?,
            http: r.remote(Subsystem::Http)?,
            controller: r.remote(Subsystem::Controller)?,
            ugc: r.remote(Subsystem::Ugc)?,
            app_list: r.remote(Subsystem::AppList)?,
            music: r.remote(Subsystem::Music)?,
            music_remote: r.remote(Subsystem::MusicRemote)?,
            html_surface: html_surface(&r)?,
            inventory: r.remote(Subsystem::Inventory)?,
            video: r.remote(Subsystem::Video)?,
            parental_settings: r.remote(Subsystem::ParentalSettings)?,
            input: r.remote(Subsystem::Input)?,
        };
        kdebug!("context: resolved for pipe {} user {}", ctx.pipe, ctx.user);
        Ok(ctx)
    }

    /// Fill `slot`. On failure `slot` is left empty and false returned.
    pub fn init_into(slot: &mut Option<ApiContext>, rt: &Runtime) -> bool {
        *slot = None;
        match ApiContext::init(rt) {
            Ok(ctx) => {
                *slot = Some(ctx);
                true
            }
            Err(e) => {
                kdebug!("context: {}", e);
                false
            }
        }
    }

    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }

    pub fn user(&self) -> UserHandle {
        self.user
    }

    /// Every resolved pointer, in resolution order (`AGGREGATED`).
    pub fn interfaces(&self) -> Vec<Arc<dyn Interface>> {
        fn erase<T: Interface>(iface: &Arc<T>) -> Arc<dyn Interface> {
            iface.clone()
        }
        let mut all = vec![
            erase(&self.client),
            erase(&self.user_api),
            erase(&self.friends),
            erase(&self.utils),
            erase(&self.matchmaking),
            erase(&self.game_search),
            erase(&self.matchmaking_servers),
            erase(&self.user_stats),
            erase(&self.apps),
            erase(&self.networking),
            erase(&self.remote_storage),
            erase(&self.screenshots),
            erase(&self.http),
            erase(&self.controller),
            erase(&self.ugc),
            erase(&self.app_list),
            erase(&self.music),
            erase(&self.music_remote),
        ];
        all.extend(self.html_surface.as_ref().map(erase));
        all.extend([
            erase(&self.inventory),
            erase(&self.video),
            erase(&self.parental_settings),
            erase(&self.input),
        ]);
        all
    }

    /// False once the pipe the context was resolved on has closed.
    pub fn is_live(&self) -> bool {
        self.client.is_live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::friends::FriendsPersona;
    use crate::adapters::utils::UtilsCore;
    use crate::config::RuntimeConfig;
    use hostlink_core::subsystem::AGGREGATED;
    use hostlink_module::LocalService;

    fn runtime(svc: Arc<LocalService>) -> Runtime {
        let rt = Runtime::with_module(RuntimeConfig::new(), svc);
        assert!(rt.init());
        rt
    }

    #[test]
    fn test_context_resolves_everything() {
        let svc = LocalService::builder().app_id(570).friend(7, "gabe").build();
        let rt = runtime(svc);
        let ctx = ApiContext::init(&rt).unwrap();
        assert!(ctx.is_live());
        assert_eq!(ctx.pipe(), rt.current_pipe());
        assert_eq!(ctx.user(), rt.current_user());
        assert_eq!(ctx.utils.app_id(), 570);
        assert_eq!(ctx.friends.friend_persona_name(7), "gabe");
        assert_eq!(ctx.input.descriptor().version_string(), "Input001");
        #[cfg(not(target_os = "android"))]
        assert!(ctx.html_surface.is_some());
    }

    #[test]
    fn test_context_order_matches_aggregated() {
        let rt = runtime(LocalService::builder().build());
        let ctx = ApiContext::init(&rt).unwrap();
        let resolved: Vec<_> = ctx
            .interfaces()
            .iter()
            .map(|i| i.descriptor())
            .collect();
        let expected: Vec<_> = AGGREGATED.iter().map(|s| s.latest_descriptor()).collect();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_context_same_pointers() {
        let rt = runtime(LocalService::builder().build());
        let a = ApiContext::init(&rt).unwrap();
        let b = ApiContext::init(&rt).unwrap();
        assert!(Arc::ptr_eq(&a.friends, &b.friends));
        assert!(Arc::ptr_eq(&a.video, &b.video));
    }

    #[test]
    fn test_context_fails_on_missing_subsystem() {
        let rt = runtime(LocalService::builder().withhold("Video").build());
        let mut slot = None;
        assert!(!ApiContext::init_into(&mut slot, &rt));
        assert!(slot.is_none());
        let err = ApiContext::init(&rt).unwrap_err();
        assert_eq!(err.resolution_reason(), Some(ResolutionFailure::NotServed));
    }

    #[test]
    fn test_context_fails_on_old_service() {
        let rt = runtime(LocalService::builder().serve_up_to("User", 19).build());
        assert!(ApiContext::init(&rt).is_err());
    }

    #[test]
    fn test_context_before_init() {
        let rt = Runtime::with_module(RuntimeConfig::new(), LocalService::builder().build());
        assert_eq!(ApiContext::init(&rt).unwrap_err(), ApiError::NotInitialized);
    }

    #[test]
    fn test_context_dies_with_pipe() {
        let rt = runtime(LocalService::builder().build());
        let mut slot = None;
        assert!(ApiContext::init_into(&mut slot, &rt));
        let ctx = slot.unwrap();
        rt.shutdown();
        assert!(!ctx.is_live());
        assert!(!ctx.user_api.is_live());
    }
}
