//! Basic hostlink example
//!
//! Loads the in-process service, initializes, resolves a few interfaces
//! at old and new versions, renames the persona and pumps the resulting
//! notifications.
//!
//! # Environment Variables
//!
//! - `HLK_FLUSH_EPRINT=1` - Flush log output immediately
//! - `HLK_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `HLK_FAILURE_ISOLATION=1` - Contain sink faults instead of aborting the cycle

use hostlink::adapters::{
    FriendsPersona, FriendsSetNameAsync, FriendsV017, UserIdentity, UserV012, UserV020,
    UtilsCore, UtilsV009,
};
use hostlink::{kinfo, sink_fn, KindRange, LocalService, Runtime, RuntimeConfig, Subsystem};
use hostlink::{ApiContext, Notification};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// HLK_LOG_LEVEL=debug HLK_FLUSH_EPRINT=1 cargo run -p hostlink-basic
fn main() {
    println!("=== hostlink Basic Example ===\n");

    let config = RuntimeConfig::from_env();
    config.print();

    let service = LocalService::builder()
        .name("basic-local")
        .app_id(480)
        .friend(76_561_197_960_287_930, "gabe")
        .friend(76_561_197_960_265_731, "robin")
        .build();
    let rt = Runtime::with_module(config, service);

    if !rt.init() {
        println!("init failed (see log)");
        return;
    }
    let pipe = rt.current_pipe();
    println!("pipe {} user {}", pipe, rt.current_user());

    for n in rt.negotiated().iter().take(4) {
        let newest = n.tags.last().map(|t| t.to_string()).unwrap_or_default();
        println!("  {:<12} {} tags, current {}", n.subsystem.name(), n.tags.len(), newest);
    }

    // Old and new shapes side by side
    if let (Some(old), Some(new)) = (
        rt.resolve_as::<UserV012>("User", "012"),
        rt.resolve_as::<UserV020>("User", "020"),
    ) {
        println!("\nUser012 account {}", old.account_id());
        println!("User020 account {}", new.account_id());
    }

    if let Some(utils) = rt.resolve_as::<UtilsV009>("Utils", "009") {
        println!("app id {} country {}", utils.app_id(), utils.ip_country());
    }

    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let registered = rt.register_callback(
        pipe,
        KindRange::subsystem(Subsystem::Friends),
        sink_fn(move |n: &Notification| {
            kinfo!("friends notification kind {} ({} bytes)", n.kind, n.payload.len());
            s.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    if let Err(e) = registered {
        println!("register failed: {}", e);
        return;
    }

    if let Some(friends) = rt.resolve_as::<FriendsV017>("Friends", "017") {
        println!("\n{} has {} friends", friends.persona_name(), friends.friend_count(hostlink::friend_flags::IMMEDIATE));
        let call = friends.set_persona_name("hostlink-demo");
        println!("rename issued as call {}", call.0);
    }

    match rt.run_callbacks(pipe, false) {
        Ok(stats) => println!(
            "pump: drained {} dispatched {} faults {}",
            stats.drained, stats.dispatched, stats.faults
        ),
        Err(e) => println!("pump failed: {}", e),
    }
    println!("sink saw {} notifications", seen.load(Ordering::SeqCst));

    match ApiContext::init(&rt) {
        Ok(ctx) => println!("\ncontext ready; input is {}", ctx.input.context().descriptor()),
        Err(e) => println!("\ncontext failed: {}", e),
    }

    rt.shutdown();
    println!("\n=== Example Complete ===");
}
