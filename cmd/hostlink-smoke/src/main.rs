//! hostlink End-to-End Smoke Test
//!
//! Drives the full stack against the in-process service:
//!   Part A - Bootstrap: init failures, init, relaunch check
//!   Part B - Resolution: every published tag, failures, negotiation
//!   Part C - Pump: ordering, unregister, isolation, abort carry-over
//!   Part D - Context and shutdown
//!
//! Run: cargo run -p hostlink-smoke
//! Exit status is non-zero if any check fails.

use hostlink::adapters::{FriendsSetNameAsync, FriendsV017, UserIdentity, UserV009, UserV019};
use hostlink::{
    sink_fn, ApiContext, ApiError, BootstrapFailure, KindRange, LocalService, Notification,
    QueueClass, ResolutionFailure, Runtime, RuntimeConfig, SinkFault, Subsystem,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0, failed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed, self.failed
        );
        println!("{}", LINE);
    }
}

fn runtime(service: Arc<LocalService>) -> Runtime {
    Runtime::with_module(RuntimeConfig::new(), service)
}

// ════════════════════════════════════════════════════════════
// Part A: Bootstrap
// ════════════════════════════════════════════════════════════

fn test_bootstrap(t: &mut TestRunner) {
    t.section("Part A: Bootstrap");

    let rt = Runtime::new(RuntimeConfig::new());
    t.check(
        "init without module fails",
        rt.try_init() == Err(ApiError::Bootstrap(BootstrapFailure::ModuleNotLoaded)),
        "expected ModuleNotLoaded",
    );

    let rt = runtime(LocalService::builder().running(false).build());
    t.check("init with service down fails", !rt.init(), "init returned true");
    t.check("service reported down", !rt.is_service_running(), "reported running");

    let rt = runtime(LocalService::builder().discovery_marker(false).build());
    t.check(
        "init without discovery marker fails",
        rt.try_init() == Err(ApiError::Bootstrap(BootstrapFailure::NoDiscoveryMarker)),
        "expected NoDiscoveryMarker",
    );

    let svc = LocalService::builder().launched_by_service(true).build();
    let rt = runtime(svc);
    t.check(
        "no relaunch when launched by service",
        !rt.restart_app_if_necessary(480),
        "relaunch requested",
    );

    t.check("init succeeds", rt.init(), "init returned false");
    t.check("init is idempotent", rt.init() && rt.is_initialized(), "second init failed");
    t.check("default pipe open", rt.current_pipe().is_some(), "no pipe");
    t.check("default user connected", rt.current_user().is_some(), "no user");
}

// ════════════════════════════════════════════════════════════
// Part B: Resolution
// ════════════════════════════════════════════════════════════

fn test_resolution(t: &mut TestRunner) {
    t.section("Part B: Resolution");

    let rt = runtime(LocalService::builder().build());
    if !rt.init() {
        t.fail("init", "init returned false");
        return;
    }

    let mut missing = Vec::new();
    for s in Subsystem::ALL {
        for tag in s.versions() {
            let ok = rt
                .resolve(s.name(), &tag.to_string())
                .is_some_and(|i| i.descriptor().version == *tag);
            if !ok {
                missing.push(format!("{}{}", s.name(), tag));
            }
        }
    }
    t.check(
        "every published tag resolves",
        missing.is_empty(),
        &format!("missing {:?}", missing),
    );

    let new = rt.resolve_as::<UserV019>("User", "019");
    let old = rt.resolve_as::<UserV009>("User", "009");
    let same = match (&new, &old) {
        (Some(n), Some(o)) => n.account_id() == o.account_id(),
        _ => false,
    };
    t.check("User019 and User009 coexist", same, "adapters disagree or missing");

    let before = rt.resolve("Friends", "015");
    let unknown = rt.try_resolve("Friends", "099");
    let after = rt.resolve("Friends", "015");
    let unchanged = match (before, after) {
        (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
        _ => false,
    };
    t.check(
        "unknown tag fails with UnknownVersion",
        unknown.err().and_then(|e| e.resolution_reason()) == Some(ResolutionFailure::UnknownVersion),
        "wrong reason",
    );
    t.check("failed resolve leaves cache intact", unchanged, "pointer changed");
    t.check("unknown name fails", rt.resolve("Steam", "001").is_none(), "resolved");

    let old_svc = runtime(LocalService::builder().serve_up_to("User", 19).build());
    let negotiated = old_svc.init()
        && old_svc.current_version("User").map(|v| v.to_string()).as_deref() == Some("019")
        && old_svc.try_resolve("User", "020").err().and_then(|e| e.resolution_reason())
            == Some(ResolutionFailure::NotServed);
    t.check("newer tag than service serves is NotServed", negotiated, "negotiation mismatch");
}

// ════════════════════════════════════════════════════════════
// Part C: Pump
// ════════════════════════════════════════════════════════════

fn test_pump(t: &mut TestRunner) {
    t.section("Part C: Pump");

    let rt = runtime(LocalService::builder().build());
    if !rt.init() {
        t.fail("init", "init returned false");
        return;
    }
    let pipe = rt.current_pipe();
    let user = rt.current_user();

    // C1: arrival order
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();
    let id = rt.register_callback(
        pipe,
        KindRange::new(100, 199),
        sink_fn(move |n: &Notification| {
            if let Ok(mut v) = o.lock() {
                v.push(n.kind);
            }
            Ok(())
        }),
    );
    for kind in [105, 101, 150, 101] {
        rt.enqueue(pipe, user, kind, vec![], QueueClass::Foreground);
    }
    let _ = rt.run_callbacks(pipe, false);
    let got = order.lock().map(|v| v.clone()).unwrap_or_default();
    t.check("dispatch in arrival order", got == vec![105, 101, 150, 101], &format!("{:?}", got));

    // C2: unregister before the cycle
    if let Ok(id) = id {
        rt.unregister_callback(id);
    }
    rt.enqueue(pipe, user, 101, vec![], QueueClass::Foreground);
    let _ = rt.run_callbacks(pipe, false);
    let got = order.lock().map(|v| v.len()).unwrap_or(0);
    t.check("unregistered sink gets nothing", got == 4, &format!("{} dispatches", got));

    // C3: service notifications
    let persona = Arc::new(AtomicUsize::new(0));
    let p = persona.clone();
    let _ = rt.register_callback(
        pipe,
        KindRange::subsystem(Subsystem::Friends),
        sink_fn(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    if let Some(friends) = rt.resolve_as::<FriendsV017>("Friends", "017") {
        friends.set_persona_name("smoke");
    }
    let _ = rt.run_callbacks(pipe, false);
    t.check(
        "service notifications delivered",
        persona.load(Ordering::SeqCst) == 2,
        &format!("{} delivered", persona.load(Ordering::SeqCst)),
    );

    // C4: isolation keeps going
    rt.set_failure_isolation(true);
    let second = Arc::new(AtomicUsize::new(0));
    let s = second.clone();
    let _ = rt.register_callback(pipe, 710u32, sink_fn(|_| Err(SinkFault::new("smoke fault"))));
    let _ = rt.register_callback(
        pipe,
        710u32,
        sink_fn(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    rt.enqueue(pipe, user, 710, vec![], QueueClass::Foreground);
    let ok = rt.run_callbacks(pipe, false).is_ok();
    t.check(
        "isolation: second sink still runs",
        ok && second.load(Ordering::SeqCst) == 1,
        "second sink skipped or cycle failed",
    );
    t.check("isolation: fault reported", rt.take_faults().len() == 1, "no fault on channel");

    // C5: abort carries the rest over
    rt.set_failure_isolation(false);
    rt.enqueue(pipe, user, 710, vec![], QueueClass::Foreground);
    rt.enqueue(pipe, user, 710, vec![], QueueClass::Foreground);
    let aborted = matches!(rt.run_callbacks(pipe, false), Err(ApiError::Dispatch(_)));
    t.check("abort: fault returned to caller", aborted, "cycle did not abort");
    t.check(
        "abort: remainder carried over",
        rt.pending(pipe).0 == 1,
        &format!("{:?} pending", rt.pending(pipe)),
    );
    rt.set_failure_isolation(true);
    let _ = rt.run_callbacks(pipe, false);
    let _ = rt.take_faults();

    // C6: background queue only on request
    rt.poster().post_background(pipe, user, 720, vec![]);
    let fg = rt.run_callbacks(pipe, false).map(|s| s.drained).unwrap_or(usize::MAX);
    let bg = rt.run_callbacks(pipe, true).map(|s| s.drained).unwrap_or(0);
    t.check("background drained only on request", fg == 0 && bg == 1, "wrong drain counts");
}

// ════════════════════════════════════════════════════════════
// Part D: Context and shutdown
// ════════════════════════════════════════════════════════════

fn test_context_shutdown(t: &mut TestRunner) {
    t.section("Part D: Context and shutdown");

    let rt = runtime(LocalService::builder().build());
    if !rt.init() {
        t.fail("init", "init returned false");
        return;
    }

    let mut slot = None;
    t.check("context resolves", ApiContext::init_into(&mut slot, &rt), "init_into failed");

    let extra = rt.open_pipe();
    let closed = match extra {
        Ok(pipe) => {
            let user = rt.add_user(pipe).unwrap_or_default();
            let iface = rt.resolve_for(pipe, user, "Friends", "017");
            rt.close_pipe(pipe);
            iface.is_some_and(|i| !i.is_live())
                && rt.resolve_for(pipe, user, "Friends", "017").is_none()
                && rt.run_callbacks(pipe, true).map(|s| s.drained) == Ok(0)
        }
        Err(_) => false,
    };
    t.check("closing a pipe invalidates its pointers", closed, "pointer still live");

    rt.shutdown();
    t.check(
        "shutdown invalidates context",
        slot.as_ref().is_some_and(|c| !c.is_live()),
        "context still live",
    );
    t.check("resolve fails after shutdown", rt.resolve("User", "019").is_none(), "resolved");
}

fn main() {
    println!("hostlink smoke test");
    let mut t = TestRunner::new();

    test_bootstrap(&mut t);
    test_resolution(&mut t);
    test_pump(&mut t);
    test_context_shutdown(&mut t);

    t.summary();
    if t.failed > 0 {
        std::process::exit(1);
    }
}
