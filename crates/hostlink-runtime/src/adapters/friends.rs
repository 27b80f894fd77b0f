//! Friends adapters, `Friends004` through `Friends017`
//!
//! Up to 008 `set_persona_name` is fire-and-forget. From 009 it returns a
//! `CallHandle` whose completion arrives as a notification. 012 added
//! rich presence.

use super::{method_group, versioned_adapter, Adapter, AdapterFactory};
use hostlink_core::descriptor::VersionTag;
use hostlink_core::service::CallHandle;

versioned_adapter! {
    FriendsV004;
    FriendsV005;
    FriendsV006;
    FriendsV007;
    FriendsV008;
    FriendsV009;
    FriendsV010;
    FriendsV011;
    FriendsV012;
    FriendsV013;
    FriendsV014;
    FriendsV015;
    FriendsV016;
    FriendsV017;
}

pub(crate) fn factory(tag: VersionTag) -> Option<AdapterFactory> {
    let f: AdapterFactory = match tag.number() {
        4 => FriendsV004::create,
        5 => FriendsV005::create,
        6 => FriendsV006::create,
        7 => FriendsV007::create,
        8 => FriendsV008::create,
        9 => FriendsV009::create,
        10 => FriendsV010::create,
        11 => FriendsV011::create,
        12 => FriendsV012::create,
        13 => FriendsV013::create,
        14 => FriendsV014::create,
        15 => FriendsV015::create,
        16 => FriendsV016::create,
        17 => FriendsV017::create,
        _ => return None,
    };
    Some(f)
}

/// Present in every version. Counts and indices are `i32`; a missing
/// friend is account 0 and an unknown name is empty.
pub trait FriendsPersona: Adapter {
    fn persona_name(&self) -> String {
        let c = self.ctx();
        c.service().friends().persona_name(c.user())
    }

    fn friend_count(&self, flags: u32) -> i32 {
        let c = self.ctx();
        let n = c.service().friends().friend_count(c.user(), flags);
        i32::try_from(n).unwrap_or(i32::MAX)
    }

    fn friend_by_index(&self, index: i32, flags: u32) -> u64 {
        let Ok(index) = usize::try_from(index) else {
            return 0;
        };
        let c = self.ctx();
        c.service()
            .friends()
            .friend_by_index(c.user(), index, flags)
            .unwrap_or(0)
    }

    fn friend_persona_name(&self, friend: u64) -> String {
        let c = self.ctx();
        c.service()
            .friends()
            .friend_persona_name(c.user(), friend)
            .unwrap_or_default()
    }
}

/// 004-008.
pub trait FriendsSetNameSync: Adapter {
    fn set_persona_name(&self, name: &str) {
        let c = self.ctx();
        let _ = c.service().friends().set_persona_name(c.pipe(), c.user(), name);
    }
}

/// 009 onward.
pub trait FriendsSetNameAsync: Adapter {
    fn set_persona_name(&self, name: &str) -> CallHandle {
        let c = self.ctx();
        c.service().friends().set_persona_name(c.pipe(), c.user(), name)
    }
}

/// 012 onward.
pub trait FriendsRichPresence: Adapter {
    fn set_rich_presence(&self, key: &str, value: &str) -> bool {
        let c = self.ctx();
        c.service().friends().set_rich_presence(c.user(), key, value)
    }
}

method_group!(FriendsPersona =>
    FriendsV004, FriendsV005, FriendsV006, FriendsV007, FriendsV008, FriendsV009, FriendsV010,
    FriendsV011, FriendsV012, FriendsV013, FriendsV014, FriendsV015, FriendsV016, FriendsV017);
method_group!(FriendsSetNameSync => FriendsV004, FriendsV005, FriendsV006, FriendsV007, FriendsV008);
method_group!(FriendsSetNameAsync =>
    FriendsV009, FriendsV010, FriendsV011, FriendsV012, FriendsV013,
    FriendsV014, FriendsV015, FriendsV016, FriendsV017);
method_group!(FriendsRichPresence =>
    FriendsV012, FriendsV013, FriendsV014, FriendsV015, FriendsV016, FriendsV017);
