//! Per-instance layer state.
//!
//! A `LayerSession` exists for every instance created through this layer and
//! not yet destroyed. It owns the next link and the real functions for that
//! instance; interceptors look it up by handle on every call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use once_cell::sync::Lazy;
use xrsplice_config::{log_registry_debug, log_registry_warn, SessionMode};

use crate::abi::XrInstance;
use crate::chain::NextLayer;
use crate::resolve::RealFunctions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Destroyed,
}

pub struct LayerSession {
    instance: XrInstance,
    next: NextLayer,
    reals: RealFunctions,
    lifecycle: Mutex<Lifecycle>,
}

impl LayerSession {
    pub fn new(instance: XrInstance, next: NextLayer, reals: RealFunctions) -> Self {
        Self {
            instance,
            next,
            reals,
            lifecycle: Mutex::new(Lifecycle::Active),
        }
    }

    pub fn instance(&self) -> XrInstance {
        self.instance
    }

    pub fn next(&self) -> &NextLayer {
        &self.next
    }

    pub fn reals(&self) -> &RealFunctions {
        &self.reals
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Run `destroy` while holding the lifecycle lock, marking the session
    /// destroyed only if it reports success.
    ///
    /// Returns `None` when the session was already destroyed; `destroy` is
    /// not called in that case. Concurrent callers serialize here, so the
    /// downstream destroy runs at most once per successful teardown.
    pub fn teardown<F>(&self, destroy: F) -> Option<bool>
    where
        F: FnOnce() -> bool,
    {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if *lifecycle == Lifecycle::Destroyed {
            return None;
        }
        let destroyed = destroy();
        if destroyed {
            *lifecycle = Lifecycle::Destroyed;
        }
        Some(destroyed)
    }
}

/// All live sessions in the process.
pub struct SessionRegistry {
    mode: SessionMode,
    sessions: RwLock<HashMap<XrInstance, Arc<LayerSession>>>,
}

impl SessionRegistry {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly created session.
    ///
    /// In single mode this replaces whatever session was registered before.
    pub fn insert(&self, session: LayerSession) -> Arc<LayerSession> {
        let session = Arc::new(session);
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if self.mode == SessionMode::Single && !sessions.is_empty() {
            log_registry_warn!(
                "Replacing existing session in single-session mode",
                replaced = sessions.len(),
                instance = session.instance().0
            );
            sessions.clear();
        }
        sessions.insert(session.instance(), Arc::clone(&session));
        log_registry_debug!(
            "Session registered",
            instance = session.instance().0,
            live = sessions.len()
        );
        session
    }

    /// Session for `instance`. Single mode ignores the handle.
    pub fn get(&self, instance: XrInstance) -> Option<Arc<LayerSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match self.mode {
            SessionMode::Multi => sessions.get(&instance).cloned(),
            SessionMode::Single => sessions.values().next().cloned(),
        }
    }

    /// Drop `session` from the registry if it is still the one registered
    /// under its handle.
    pub fn remove_session(&self, session: &Arc<LayerSession>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&session.instance()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&session.instance());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn instances(&self) -> Vec<XrInstance> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

// `sessions.mode` is read once here; `xrsplice_config::reload()` does not
// change it for a registry that already exists.
static SESSIONS: Lazy<SessionRegistry> = Lazy::new(|| {
    crate::bootstrap();
    let mode = xrsplice_config::config().sessions.mode;
    log_registry_debug!("Session registry ready", single = mode == SessionMode::Single);
    SessionRegistry::new(mode)
});

/// The process-wide registry.
///
/// Its session mode is fixed for the life of the process by the
/// configuration in effect at first use.
pub fn sessions() -> &'static SessionRegistry {
    &SESSIONS
}
