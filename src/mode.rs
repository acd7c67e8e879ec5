use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::RecordStore;

/// Which source the most recent remote attempt left us on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Demo,
    Live,
}

impl Mode {
    pub fn from_demo_flag(demo: bool) -> Self {
        if demo {
            Mode::Demo
        } else {
            Mode::Live
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Mode::Demo)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Demo => write!(f, "demo"),
            Mode::Live => write!(f, "live"),
        }
    }
}

/// Demo/live gate shared by every fetch operation
///
/// The state is global across entity types and only moves when a remote
/// attempt settles. It is persisted through the record store so the last
/// known mode survives a restart.
pub struct ModeController<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> Clone for ModeController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> ModeController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Last persisted mode; an unreadable flag counts as demo
    pub fn current(&self) -> Mode {
        match self.store.demo_mode() {
            Ok(demo) => Mode::from_demo_flag(demo),
            Err(e) => {
                warn!(error = %e, "Failed to read demo-mode flag");
                Mode::Demo
            }
        }
    }

    pub fn record_success(&self) {
        self.set(Mode::Live);
    }

    pub fn record_failure(&self) {
        self.set(Mode::Demo);
    }

    fn set(&self, mode: Mode) {
        let previous = self.current();
        if let Err(e) = self.store.set_demo_mode(mode.is_demo()) {
            warn!(error = %e, %mode, "Failed to persist demo-mode flag");
            return;
        }
        if previous != mode {
            info!(from = %previous, to = %mode, "Data source mode changed");
        }
    }
}
