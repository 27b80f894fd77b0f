//! Process bootstrap checks
//!
//! Decides whether the process has to be relaunched under the service
//! before it can use it.

use crate::config::RuntimeConfig;
use hostlink_core::service::BackingService;
use hostlink_core::{kdebug, kerror, kinfo};
use std::path::Path;

/// Does the app-id marker file exist?
pub fn marker_present(path: &Path) -> bool {
    path.is_file()
}

/// Returns true if the caller should exit because the service is
/// relaunching it; false if it may keep running (or could not be
/// relaunched).
pub fn restart_app_if_necessary(
    config: &RuntimeConfig,
    service: Option<&dyn BackingService>,
    app_id: u32,
) -> bool {
    if marker_present(&config.app_id_file) {
        kdebug!(
            "bootstrap: {} present, no relaunch",
            config.app_id_file.display()
        );
        return false;
    }
    if let Some(id) = config.app_id {
        kdebug!("bootstrap: app id {} configured, no relaunch", id);
        return false;
    }

    let Some(service) = service else {
        kerror!("bootstrap: cannot relaunch app {}: no service module loaded", app_id);
        return false;
    };
    if service.launched_by_service() {
        return false;
    }

    match service.request_relaunch(app_id) {
        Ok(()) => {
            kinfo!("bootstrap: {} is relaunching app {}", service.module_name(), app_id);
            true
        }
        Err(e) => {
            kerror!("bootstrap: relaunch of app {} failed: {}", app_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_module::LocalService;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hostlink-{}-{}.txt", tag, std::process::id()))
    }

    fn config(tag: &str) -> RuntimeConfig {
        RuntimeConfig::new().app_id_file(temp_path(tag))
    }

    #[test]
    fn test_marker_suppresses_relaunch() {
        let cfg = config("marker");
        std::fs::write(&cfg.app_id_file, "480").unwrap();
        let svc = LocalService::builder().build();
        assert!(!restart_app_if_necessary(&cfg, Some(&*svc), 480));
        assert_eq!(svc.relaunch_requests(), 0);
        std::fs::remove_file(&cfg.app_id_file).unwrap();
    }

    #[test]
    fn test_configured_app_id_suppresses_relaunch() {
        let cfg = config("configured").app_id(480);
        let svc = LocalService::builder().build();
        assert!(!restart_app_if_necessary(&cfg, Some(&*svc), 480));
    }

    #[test]
    fn test_app_id_read_from_config_only() {
        std::env::set_var("HLK_APP_ID", "480");
        let explicit = config("explicit");
        let from_env = RuntimeConfig::from_env().app_id_file(temp_path("fromenv"));
        std::env::remove_var("HLK_APP_ID");

        assert_eq!(explicit.app_id, None);
        let svc = LocalService::builder().build();
        assert!(restart_app_if_necessary(&explicit, Some(&*svc), 480));
        assert_eq!(svc.relaunch_requests(), 1);

        assert_eq!(from_env.app_id, Some(480));
        assert!(!restart_app_if_necessary(&from_env, Some(&*svc), 480));
        assert_eq!(svc.relaunch_requests(), 1);
    }

    #[test]
    fn test_launched_by_service() {
        let cfg = config("launched");
        let svc = LocalService::builder().launched_by_service(true).build();
        assert!(!restart_app_if_necessary(&cfg, Some(&*svc), 480));
        assert_eq!(svc.relaunch_requests(), 0);
    }

    #[test]
    fn test_relaunch_requested() {
        let cfg = config("relaunch");
        let svc = LocalService::builder().build();
        assert!(restart_app_if_necessary(&cfg, Some(&*svc), 480));
        assert_eq!(svc.relaunch_requests(), 1);
    }

    #[test]
    fn test_relaunch_fails() {
        let cfg = config("fails");
        let svc = LocalService::builder().running(false).build();
        assert!(!restart_app_if_necessary(&cfg, Some(&*svc), 480));
    }

    #[test]
    fn test_no_module() {
        let cfg = config("nomodule");
        assert!(!restart_app_if_necessary(&cfg, None, 480));
    }
}
