//! User adapters, `User009` through `User020`
//!
//! Shape history:
//!
//! - 009-016 `initiate_game_connection` takes a `secure` flag; 017 dropped it
//! - 011 added `user_data_folder`
//! - 012-019 write auth tickets into a caller buffer; 020 returns `AuthTicket`
//! - 016 added `is_behind_nat`, 018 added `player_level`

use super::{method_group, versioned_adapter, Adapter, AdapterFactory};
use hostlink_core::descriptor::VersionTag;
use hostlink_core::handle::UserHandle;
use hostlink_core::service::{AuthTicket, ServerEndpoint, TicketHandle};

versioned_adapter! {
    UserV009;
    UserV010;
    UserV011;
    UserV012;
    UserV013;
    UserV014;
    UserV015;
    UserV016;
    UserV017;
    UserV018;
    UserV019;
    UserV020;
}

pub(crate) fn factory(tag: VersionTag) -> Option<AdapterFactory> {
    let f: AdapterFactory = match tag.number() {
        9 => UserV009::create,
        10 => UserV010::create,
        11 => UserV011::create,
        12 => UserV012::create,
        13 => UserV013::create,
        14 => UserV014::create,
        15 => UserV015::create,
        16 => UserV016::create,
        17 => UserV017::create,
        18 => UserV018::create,
        19 => UserV019::create,
        20 => UserV020::create,
        _ => return None,
    };
    Some(f)
}

/// Copy `src` into the front of `dst`. Returns the bytes needed; nothing
/// is written if `dst` is too small.
fn fill(dst: &mut [u8], src: &[u8]) -> usize {
    if let Some(head) = dst.get_mut(..src.len()) {
        head.copy_from_slice(src);
    }
    src.len()
}

/// Present in every version.
pub trait UserIdentity: Adapter {
    fn user_handle(&self) -> UserHandle {
        self.ctx().user()
    }

    fn logged_on(&self) -> bool {
        let c = self.ctx();
        c.service().users().logged_on(c.user())
    }

    fn account_id(&self) -> u64 {
        let c = self.ctx();
        c.service().users().account_id(c.user())
    }
}

/// 009-016.
pub trait UserConnectSecureFlag: Adapter {
    /// Writes the auth blob into `blob`. Returns its length; 0 if `blob`
    /// is too small.
    fn initiate_game_connection(
        &self,
        blob: &mut [u8],
        server_id: u64,
        ip: u32,
        port: u16,
        secure: bool,
    ) -> usize {
        let c = self.ctx();
        let server = ServerEndpoint { server_id, ip, port };
        let bytes = c.service().users().initiate_connection(c.user(), server, secure);
        if bytes.len() > blob.len() {
            return 0;
        }
        fill(blob, &bytes)
    }

    fn terminate_game_connection(&self, ip: u32, port: u16) {
        let c = self.ctx();
        let server = ServerEndpoint { server_id: 0, ip, port };
        c.service().users().terminate_connection(c.user(), server);
    }
}

/// 017 onward: the secure flag is gone.
pub trait UserConnect: Adapter {
    fn initiate_game_connection(&self, blob: &mut [u8], server_id: u64, ip: u32, port: u16) -> usize {
        let c = self.ctx();
        let server = ServerEndpoint { server_id, ip, port };
        let bytes = c.service().users().initiate_connection(c.user(), server, false);
        if bytes.len() > blob.len() {
            return 0;
        }
        fill(blob, &bytes)
    }

    fn terminate_game_connection(&self, ip: u32, port: u16) {
        let c = self.ctx();
        let server = ServerEndpoint { server_id: 0, ip, port };
        c.service().users().terminate_connection(c.user(), server);
    }
}

/// 011 onward.
pub trait UserDataFolder: Adapter {
    fn user_data_folder(&self) -> Option<String> {
        let c = self.ctx();
        c.service().users().user_data_folder(c.user())
    }
}

/// 012-019: the ticket lands in a caller buffer.
pub trait UserTicketsLegacy: Adapter {
    /// Returns the ticket handle and its length. A buffer too small for
    /// the ticket yields `(TicketHandle::INVALID, needed)` and the ticket
    /// is cancelled.
    fn get_auth_session_ticket(&self, buf: &mut [u8]) -> (TicketHandle, usize) {
        let c = self.ctx();
        let users = c.service().users();
        let ticket = users.create_auth_ticket(c.user());
        if ticket.bytes.len() > buf.len() {
            users.cancel_auth_ticket(c.user(), ticket.handle);
            return (TicketHandle::INVALID, ticket.bytes.len());
        }
        (ticket.handle, fill(buf, &ticket.bytes))
    }

    fn cancel_auth_ticket(&self, ticket: TicketHandle) {
        let c = self.ctx();
        c.service().users().cancel_auth_ticket(c.user(), ticket);
    }
}

/// 020: owned tickets.
pub trait UserTickets: Adapter {
    fn get_auth_session_ticket(&self) -> AuthTicket {
        let c = self.ctx();
        c.service().users().create_auth_ticket(c.user())
    }

    fn cancel_auth_ticket(&self, ticket: TicketHandle) {
        let c = self.ctx();
        c.service().users().cancel_auth_ticket(c.user(), ticket);
    }
}

/// 016 onward.
pub trait UserNetwork: Adapter {
    fn is_behind_nat(&self) -> bool {
        let c = self.ctx();
        c.service().users().behind_nat(c.user())
    }
}

/// 018 onward.
pub trait UserLevel: Adapter {
    fn player_level(&self) -> i32 {
        let c = self.ctx();
        c.service().users().player_level(c.user())
    }
}

method_group!(UserIdentity =>
    UserV009, UserV010, UserV011, UserV012, UserV013, UserV014,
    UserV015, UserV016, UserV017, UserV018, UserV019, UserV020);
method_group!(UserConnectSecureFlag =>
    UserV009, UserV010, UserV011, UserV012, UserV013, UserV014, UserV015, UserV016);
method_group!(UserConnect => UserV017, UserV018, UserV019, UserV020);
method_group!(UserDataFolder =>
    UserV011, UserV012, UserV013, UserV014, UserV015,
    UserV016, UserV017, UserV018, UserV019, UserV020);
method_group!(UserTicketsLegacy =>
    UserV012, UserV013, UserV014, UserV015, UserV016, UserV017, UserV018, UserV019);
method_group!(UserTickets => UserV020);
method_group!(UserNetwork => UserV016, UserV017, UserV018, UserV019, UserV020);
method_group!(UserLevel => UserV018, UserV019, UserV020);
