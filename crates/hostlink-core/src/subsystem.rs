//! Subsystem catalog
//!
//! Every logical interface the service publishes, the version tags that
//! were ever shipped for it, and the block of notification kinds it owns.
//! Tags are listed oldest first; the last entry is the newest shape this
//! build knows how to adapt.

use crate::descriptor::{InterfaceDescriptor, VersionTag};

macro_rules! published {
    ($($name:ident = [$($n:literal),* $(,)?];)*) => {
        mod published {
            use crate::descriptor::VersionTag;
            $(pub const $name: &[VersionTag] = &[$(VersionTag::raw($n)),*];)*
        }
    };
}

published! {
    CLIENT = [7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 20];
    USER = [9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20];
    FRIENDS = [4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17];
    UTILS = [2, 3, 4, 5, 6, 7, 8, 9];
    MATCHMAKING = [6, 7, 8, 9];
    GAME_SEARCH = [1];
    MATCHMAKING_SERVERS = [2];
    USER_STATS = [3, 4, 5, 6, 7, 8, 9, 10, 11];
    APPS = [8];
    NETWORKING = [1, 2, 3, 4, 5, 6];
    REMOTE_STORAGE = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];
    SCREENSHOTS = [3];
    HTTP = [3];
    CONTROLLER = [1, 3, 4, 5, 6, 7];
    UGC = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];
    APP_LIST = [1];
    MUSIC = [1];
    MUSIC_REMOTE = [1];
    HTML_SURFACE = [1, 2, 3, 4, 5];
    INVENTORY = [1, 2, 3];
    VIDEO = [2];
    PARENTAL_SETTINGS = [1];
    INPUT = [1];
}

/// A logical subsystem reachable through the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subsystem {
    Client,
    User,
    Friends,
    Utils,
    Matchmaking,
    GameSearch,
    MatchmakingServers,
    UserStats,
    Apps,
    Networking,
    RemoteStorage,
    Screenshots,
    Http,
    Controller,
    Ugc,
    AppList,
    Music,
    MusicRemote,
    HtmlSurface,
    Inventory,
    Video,
    ParentalSettings,
    Input,
}

impl Subsystem {
    /// Every subsystem, in the order the context aggregator resolves them.
    pub const ALL: [Subsystem; 23] = [
        Subsystem::Client,
        Subsystem::User,
        Subsystem::Friends,
        Subsystem::Utils,
        Subsystem::Matchmaking,
        Subsystem::GameSearch,
        Subsystem::MatchmakingServers,
        Subsystem::UserStats,
        Subsystem::Apps,
        Subsystem::Networking,
        Subsystem::RemoteStorage,
        Subsystem::Screenshots,
        Subsystem::Http,
        Subsystem::Controller,
        Subsystem::Ugc,
        Subsystem::AppList,
        Subsystem::Music,
        Subsystem::MusicRemote,
        Subsystem::HtmlSurface,
        Subsystem::Inventory,
        Subsystem::Video,
        Subsystem::ParentalSettings,
        Subsystem::Input,
    ];

    /// Logical name used in resolution requests and version strings.
    pub const fn name(self) -> &'static str {
        match self {
            Subsystem::Client => "Client",
            Subsystem::User => "User",
            Subsystem::Friends => "Friends",
            Subsystem::Utils => "Utils",
            Subsystem::Matchmaking => "Matchmaking",
            Subsystem::GameSearch => "GameSearch",
            Subsystem::MatchmakingServers => "MatchmakingServers",
            Subsystem::UserStats => "UserStats",
            Subsystem::Apps => "Apps",
            Subsystem::Networking => "Networking",
            Subsystem::RemoteStorage => "RemoteStorage",
            Subsystem::Screenshots => "Screenshots",
            Subsystem::Http => "HTTP",
            Subsystem::Controller => "Controller",
            Subsystem::Ugc => "UGC",
            Subsystem::AppList => "AppList",
            Subsystem::Music => "Music",
            Subsystem::MusicRemote => "MusicRemote",
            Subsystem::HtmlSurface => "HTMLSurface",
            Subsystem::Inventory => "Inventory",
            Subsystem::Video => "Video",
            Subsystem::ParentalSettings => "ParentalSettings",
            Subsystem::Input => "Input",
        }
    }

    /// Look a subsystem up by its logical name (exact match).
    pub fn from_name(name: &str) -> Option<Subsystem> {
        Subsystem::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// All published tags, oldest first.
    pub const fn versions(self) -> &'static [VersionTag] {
        match self {
            Subsystem::Client => published::CLIENT,
            Subsystem::User => published::USER,
            Subsystem::Friends => published::FRIENDS,
            Subsystem::Utils => published::UTILS,
            Subsystem::Matchmaking => published::MATCHMAKING,
            Subsystem::GameSearch => published::GAME_SEARCH,
            Subsystem::MatchmakingServers => published::MATCHMAKING_SERVERS,
            Subsystem::UserStats => published::USER_STATS,
            Subsystem::Apps => published::APPS,
            Subsystem::Networking => published::NETWORKING,
            Subsystem::RemoteStorage => published::REMOTE_STORAGE,
            Subsystem::Screenshots => published::SCREENSHOTS,
            Subsystem::Http => published::HTTP,
            Subsystem::Controller => published::CONTROLLER,
            Subsystem::Ugc => published::UGC,
            Subsystem::AppList => published::APP_LIST,
            Subsystem::Music => published::MUSIC,
            Subsystem::MusicRemote => published::MUSIC_REMOTE,
            Subsystem::HtmlSurface => published::HTML_SURFACE,
            Subsystem::Inventory => published::INVENTORY,
            Subsystem::Video => published::VIDEO,
            Subsystem::ParentalSettings => published::PARENTAL_SETTINGS,
            Subsystem::Input => published::INPUT,
        }
    }

    /// The newest tag this build ships an adapter for.
    pub fn latest(self) -> VersionTag {
        let versions = self.versions();
        versions[versions.len() - 1]
    }

    pub fn latest_descriptor(self) -> InterfaceDescriptor {
        InterfaceDescriptor::new(self.name(), self.latest())
    }

    /// Is `tag` one of the published tags for this subsystem?
    pub fn publishes(self, tag: VersionTag) -> bool {
        self.versions().binary_search(&tag).is_ok()
    }

    /// Resolved per pipe rather than per user.
    pub const fn pipe_scoped(self) -> bool {
        matches!(self, Subsystem::Client | Subsystem::Utils)
    }

    /// First notification kind id owned by this subsystem.
    ///
    /// Each subsystem owns `[base, base + KIND_BLOCK)`.
    pub const fn callback_base(self) -> u32 {
        match self {
            Subsystem::User => 100,
            Subsystem::Friends => 300,
            Subsystem::Matchmaking => 500,
            Subsystem::Utils => 700,
            Subsystem::Apps => 1000,
            Subsystem::UserStats => 1100,
            Subsystem::Networking => 1200,
            Subsystem::RemoteStorage => 1300,
            Subsystem::Http => 2100,
            Subsystem::Screenshots => 2300,
            Subsystem::Controller => 2800,
            Subsystem::Ugc => 3400,
            Subsystem::AppList => 3900,
            Subsystem::Music => 4000,
            Subsystem::MusicRemote => 4100,
            Subsystem::HtmlSurface => 4500,
            Subsystem::Video => 4600,
            Subsystem::Inventory => 4700,
            Subsystem::ParentalSettings => 5000,
            Subsystem::GameSearch => 5200,
            Subsystem::MatchmakingServers => 5300,
            Subsystem::Input => 5400,
            Subsystem::Client => 5500,
        }
    }

    /// Which subsystem owns a notification kind, if any.
    pub fn owning(kind: u32) -> Option<Subsystem> {
        Subsystem::ALL.iter().copied().find(|s| {
            let base = s.callback_base();
            kind >= base && kind < base + KIND_BLOCK
        })
    }
}

/// Number of kind ids reserved per subsystem.
pub const KIND_BLOCK: u32 = 100;

// HTMLSurface is not served on Android, so the aggregator skips it there.
cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        pub const AGGREGATED: &[Subsystem] = &[
            Subsystem::Client,
            Subsystem::User,
            Subsystem::Friends,
            Subsystem::Utils,
            Subsystem::Matchmaking,
            Subsystem::GameSearch,
            Subsystem::MatchmakingServers,
            Subsystem::UserStats,
            Subsystem::Apps,
            Subsystem::Networking,
            Subsystem::RemoteStorage,
            Subsystem::Screenshots,
            Subsystem::Http,
            Subsystem::Controller,
            Subsystem::Ugc,
            Subsystem::AppList,
            Subsystem::Music,
            Subsystem::MusicRemote,
            Subsystem::Inventory,
            Subsystem::Video,
            Subsystem::ParentalSettings,
            Subsystem::Input,
        ];
    } else {
        pub const AGGREGATED: &[Subsystem] = &Subsystem::ALL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_sorted_and_unique() {
        for s in Subsystem::ALL {
            let v = s.versions();
            assert!(!v.is_empty(), "{:?} has no versions", s);
            assert!(v.windows(2).all(|w| w[0] < w[1]), "{:?} not sorted", s);
        }
    }

    #[test]
    fn test_name_round_trip() {
        for s in Subsystem::ALL {
            assert_eq!(Subsystem::from_name(s.name()), Some(s));
        }
        assert_eq!(Subsystem::from_name("Nope"), None);
        assert_eq!(Subsystem::from_name("user"), None);
    }

    #[test]
    fn test_latest() {
        assert_eq!(Subsystem::User.latest().to_string(), "020");
        assert_eq!(Subsystem::Friends.latest().to_string(), "017");
        assert_eq!(Subsystem::Controller.latest_descriptor().version_string(), "Controller007");
    }

    #[test]
    fn test_publishes_gaps() {
        // Controller skipped 002.
        assert!(Subsystem::Controller.publishes(VersionTag::raw(1)));
        assert!(!Subsystem::Controller.publishes(VersionTag::raw(2)));
        assert!(!Subsystem::Client.publishes(VersionTag::raw(18)));
    }

    #[test]
    fn test_callback_blocks_disjoint() {
        for a in Subsystem::ALL {
            assert_eq!(Subsystem::owning(a.callback_base()), Some(a));
            assert_eq!(Subsystem::owning(a.callback_base() + KIND_BLOCK - 1), Some(a));
        }
        assert_eq!(Subsystem::owning(5), None);
    }
}
