use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

type ExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Process-local session state: the current access token plus the
/// application-provided expiry hook.
///
/// The refresh credential itself is an HTTP-only cookie held by the server
/// and the client's cookie store; this type never sees it. Nothing here is
/// persisted — the session starts empty on every process launch.
pub(crate) struct Session {
    token: RwLock<Option<String>>,
    on_expired: Mutex<Option<ExpiredHook>>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            token: RwLock::new(None),
            on_expired: Mutex::new(None),
        }
    }

    /// Current access token, if any.
    pub(crate) fn token(&self) -> Option<String> {
        self.token.read().expect("session lock poisoned").clone()
    }

    pub(crate) fn set_token(&self, token: impl Into<String>) {
        *self.token.write().expect("session lock poisoned") = Some(token.into());
    }

    pub(crate) fn clear_token(&self) {
        *self.token.write().expect("session lock poisoned") = None;
    }

    pub(crate) fn set_expired_hook(&self, hook: ExpiredHook) {
        *self.on_expired.lock().expect("session lock poisoned") = Some(hook);
    }

    /// Clear the token and notify the application, once per call.
    ///
    /// The hook runs outside the lock so it may freely call back into the
    /// session (e.g. to register a new hook).
    pub(crate) fn expire(&self) {
        self.clear_token();
        let hook = self
            .on_expired
            .lock()
            .expect("session lock poisoned")
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

// The token is a credential; keep it out of logs and panics.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match &*self.token.read().expect("session lock poisoned") {
            Some(_) => "<present>",
            None => "<none>",
        };
        f.debug_struct("Session").field("token", &token).finish()
    }
}
