use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::audit::AuditConfig;
use crate::services::classify_service::ClassifyClient;
use crate::services::template_service::TemplateRegistry;
use crate::services::tree_service::TreeViewModel;

pub struct AppState {
    pub db: Mutex<Connection>,
    pub config: AppConfig,
    pub view_model: Mutex<TreeViewModel>,
    pub templates: RwLock<TemplateRegistry>,
    pub audit_config: RwLock<AuditConfig>,
    pub classifier: ClassifyClient,
    pub classify_busy: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Connection) -> Self {
        let classifier = ClassifyClient::new(&config);
        Self {
            db: Mutex::new(db),
            config,
            view_model: Mutex::new(TreeViewModel::new()),
            templates: RwLock::new(TemplateRegistry::default()),
            audit_config: RwLock::new(AuditConfig::default()),
            classifier,
            classify_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view_model(&self) -> MutexGuard<'_, TreeViewModel> {
        self.view_model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn templates(&self) -> std::sync::RwLockReadGuard<'_, TemplateRegistry> {
        self.templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn templates_mut(&self) -> std::sync::RwLockWriteGuard<'_, TemplateRegistry> {
        self.templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn audit_config(&self) -> AuditConfig {
        self.audit_config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_audit_config(&self, config: AuditConfig) {
        *self
            .audit_config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }

    /// Claims the batch classification slot; fails while another batch runs.
    pub fn try_begin_classify(&self) -> Result<BusyGuard, AppError> {
        BusyGuard::acquire(&self.classify_busy)
    }
}

/// Holds a busy flag for its lifetime and clears it on drop.
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, AppError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy("classification already running".to_string()))?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let conn = Connection::open_in_memory().unwrap();
    crate::data::migrations::run_migrations(&conn).unwrap();
    let config = AppConfig::from_lookup(|key| {
        (key == "FOLDERTREE_DATA_DIR").then(|| "/tmp/foldertree-test".to_string())
    })
    .unwrap();
    AppState::new(config, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_guard_is_exclusive_and_released_on_drop() {
        let state = test_state();
        let guard = state.try_begin_classify().unwrap();
        assert!(matches!(state.try_begin_classify(), Err(AppError::Busy(_))));
        drop(guard);
        assert!(state.try_begin_classify().is_ok());
    }

    #[test]
    fn audit_config_can_be_replaced() {
        let state = test_state();
        assert_eq!(state.audit_config().deep_nesting_threshold, 6);
        state.set_audit_config(AuditConfig {
            deep_nesting_threshold: 3,
            artifact_patterns: vec!["target".to_string()],
        });
        assert_eq!(state.audit_config().artifact_patterns, vec!["target"]);
    }

    #[test]
    fn poisoned_view_model_lock_recovers() {
        let state = Arc::new(test_state());
        let clone = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.view_model();
            panic!("poison the lock");
        })
        .join();
        assert!(state.view_model().tree().is_empty());
    }
}
