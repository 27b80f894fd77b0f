//! `LogCrashReporter` - default `CrashReporter`
//!
//! Writes no dump file. Each "dump" is an error-level log record carrying
//! the exception code, build id, app id and comment, after the installed
//! pre-dump callback has run.

use hostlink_core::traits::{CrashHandlerConfig, CrashReporter};
use hostlink_core::{kdebug, kerror};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    config: Option<CrashHandlerConfig>,
    app_id: Option<u32>,
    comment: Option<String>,
}

#[derive(Default)]
pub struct LogCrashReporter {
    inner: Mutex<Inner>,
    dumps: AtomicUsize,
}

impl LogCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn installed(&self) -> bool {
        self.lock().config.is_some()
    }

    pub fn dumps_written(&self) -> usize {
        self.dumps.load(Ordering::Acquire)
    }

    pub fn app_id(&self) -> Option<u32> {
        self.lock().app_id
    }

    pub fn comment(&self) -> Option<String> {
        self.lock().comment.clone()
    }
}

impl CrashReporter for LogCrashReporter {
    fn install(&self, config: CrashHandlerConfig) {
        kdebug!("crash: handler installed ({:?})", config);
        self.lock().config = Some(config);
    }

    fn set_app_id(&self, app_id: u32) {
        self.lock().app_id = Some(app_id);
    }

    fn set_comment(&self, comment: &str) {
        self.lock().comment = Some(comment.to_string());
    }

    fn write_dump(&self, exception_code: u32, build_id: u32) {
        // The callback may call back into the reporter; run it unlocked.
        let (pre_dump, context, version) = {
            let inner = self.lock();
            match &inner.config {
                Some(c) => (c.pre_dump.clone(), c.context.clone(), c.version.clone()),
                None => (None, None, String::new()),
            }
        };
        if let Some(cb) = pre_dump {
            cb(context.as_deref());
        }

        let (app_id, comment) = {
            let inner = self.lock();
            (inner.app_id, inner.comment.clone())
        };
        kerror!(
            "crash: exception {:#010x} build {} version {:?} app {:?} comment {:?}",
            exception_code,
            build_id,
            version,
            app_id,
            comment
        );
        self.dumps.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    #[test]
    fn test_records_settings() {
        let r = LogCrashReporter::new();
        assert!(!r.installed());
        assert_eq!(r.app_id(), None);
        r.set_app_id(570);
        r.set_comment("boss fight");
        assert_eq!(r.app_id(), Some(570));
        assert_eq!(r.comment().as_deref(), Some("boss fight"));
    }

    #[test]
    fn test_pre_dump_sees_context() {
        let r = LogCrashReporter::new();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let context: Arc<dyn Any + Send + Sync> = Arc::new(77u32);
        r.install(CrashHandlerConfig {
            version: "1.2.3".into(),
            context: Some(context),
            pre_dump: Some(Arc::new(move |ctx: Option<&(dyn Any + Send + Sync)>| {
                *s.lock().unwrap() = ctx.and_then(|c| c.downcast_ref::<u32>()).copied();
            })),
            ..Default::default()
        });
        assert!(r.installed());
        r.write_dump(0xC000_0005, 9);
        assert_eq!(*seen.lock().unwrap(), Some(77));
        assert_eq!(r.dumps_written(), 1);
    }

    #[test]
    fn test_dump_without_install() {
        let r = LogCrashReporter::new();
        r.write_dump(1, 1);
        assert_eq!(r.dumps_written(), 1);
    }
}
