//! Utils adapters, `Utils002` through `Utils009`. Pipe-scoped.

use super::{method_group, versioned_adapter, Adapter, AdapterFactory};
use hostlink_core::descriptor::VersionTag;

versioned_adapter! {
    UtilsV002;
    UtilsV003;
    UtilsV004;
    UtilsV005;
    UtilsV006;
    UtilsV007;
    UtilsV008;
    UtilsV009;
}

pub(crate) fn factory(tag: VersionTag) -> Option<AdapterFactory> {
    let f: AdapterFactory = match tag.number() {
        2 => UtilsV002::create,
        3 => UtilsV003::create,
        4 => UtilsV004::create,
        5 => UtilsV005::create,
        6 => UtilsV006::create,
        7 => UtilsV007::create,
        8 => UtilsV008::create,
        9 => UtilsV009::create,
        _ => return None,
    };
    Some(f)
}

pub trait UtilsCore: Adapter {
    fn app_id(&self) -> u32 {
        let c = self.ctx();
        c.service().utils().app_id(c.pipe())
    }

    fn server_real_time(&self) -> u32 {
        let c = self.ctx();
        c.service().utils().server_real_time(c.pipe())
    }

    fn ip_country(&self) -> String {
        let c = self.ctx();
        c.service().utils().ip_country(c.pipe())
    }

    fn seconds_since_app_active(&self) -> u32 {
        let c = self.ctx();
        c.service().utils().seconds_since_app_active(c.pipe())
    }

    /// 255 on AC power
    fn current_battery_power(&self) -> u8 {
        let c = self.ctx();
        c.service().utils().battery_power(c.pipe())
    }
}

/// 005 onward.
pub trait UtilsOverlay: Adapter {
    fn is_overlay_enabled(&self) -> bool {
        let c = self.ctx();
        c.service().utils().overlay_enabled(c.pipe())
    }
}

/// 007 onward.
pub trait UtilsVr: Adapter {
    fn is_running_in_vr(&self) -> bool {
        let c = self.ctx();
        c.service().utils().running_in_vr(c.pipe())
    }
}

method_group!(UtilsCore =>
    UtilsV002, UtilsV003, UtilsV004, UtilsV005, UtilsV006, UtilsV007, UtilsV008, UtilsV009);
method_group!(UtilsOverlay => UtilsV005, UtilsV006, UtilsV007, UtilsV008, UtilsV009);
method_group!(UtilsVr => UtilsV007, UtilsV008, UtilsV009);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::context;
    use hostlink_core::subsystem::Subsystem;
    use hostlink_core::traits::downcast_interface;
    use hostlink_module::LocalService;

    #[test]
    fn test_utils_forward() {
        let svc = LocalService::builder().app_id(570).build();
        let (ctx, _link) = context(&svc, Subsystem::Utils, 9);
        let u = downcast_interface::<UtilsV009>(UtilsV009::create(ctx)).unwrap();
        assert_eq!(u.app_id(), 570);
        assert_eq!(u.ip_country(), "US");
        assert_eq!(u.current_battery_power(), 255);
        assert!(!u.is_overlay_enabled());
        assert!(!u.is_running_in_vr());
        assert!(u.server_real_time() > 0);
    }

    #[test]
    fn test_old_utils_shape() {
        let svc = LocalService::builder().build();
        let (ctx, _link) = context(&svc, Subsystem::Utils, 2);
        let u = downcast_interface::<UtilsV002>(UtilsV002::create(ctx)).unwrap();
        assert_eq!(u.app_id(), 480);
    }
}
