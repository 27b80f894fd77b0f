//! # hostlink-runtime
//!
//! The runtime half of hostlink: everything with state.
//!
//! ## Modules
//!
//! - `config` - Runtime configuration (defaults, env overrides, builder)
//! - `tls` - Per-thread dispatch user and scratch memory
//! - `session` - Pipe and user tables
//! - `adapters` - One type per published interface version
//! - `registry` - Version negotiation and `(name, version)` resolution
//! - `queue` - Per-pipe notification queues
//! - `callbacks` - Callback registrations
//! - `pump` - The run-callbacks loop
//! - `diagnostics` - Fault channel and crash hook pass-through
//! - `bootstrap` - Relaunch checks
//! - `context` - The aggregated per-subsystem pointer set
//! - `runtime` - The `Runtime` object tying it together
//!
//! ## Usage
//!
//! ```ignore
//! use hostlink_runtime::{Runtime, RuntimeConfig};
//!
//! let rt = Runtime::with_module(RuntimeConfig::from_env(), service);
//! if !rt.init() {
//!     return;
//! }
//! let friends = rt.resolve("Friends", "017");
//! loop {
//!     rt.run_callbacks(rt.current_pipe(), false)?;
//! }
//! ```

pub mod config;
pub mod tls;
pub mod session;
pub mod adapters;
pub mod registry;
pub mod queue;
pub mod callbacks;
pub mod pump;
pub mod diagnostics;
pub mod bootstrap;
pub mod context;
pub mod runtime;

pub use config::RuntimeConfig;
pub use session::{PipeLink, SessionManager};
pub use adapters::remote::RemoteInterface;
pub use adapters::{Adapter, InterfaceContext};
pub use registry::{Negotiated, Registry, ResolveRequest};
pub use queue::{CallbackQueue, NotificationPoster};
pub use callbacks::{CallbackTable, Registration};
pub use pump::{PumpPolicy, PumpStats};
pub use diagnostics::{CrashHooks, FaultChannel, FaultHook};
pub use context::ApiContext;
pub use runtime::Runtime;
