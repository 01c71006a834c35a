//! Concurrent session tracking.
//!
//! The compiler creates (or adopts) a single [`SessionRegistry`] when concurrent session
//! control is enabled and hands the same instance to every stage that needs it. All
//! mutation happens at request-serving time, so the registry is backed by a [`DashMap`]
//! and safe for concurrent access from any number of request-handling threads.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// Tracks live sessions per principal.
///
/// Session identifiers for a principal are kept in registration order; the oldest
/// session is the first element.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    pub fn register_session(&self, principal: &str, session_id: &str) {
        self.sessions
            .entry(principal.to_string())
            .or_default()
            .push(session_id.to_string());
    }

    pub fn remove_session(&self, principal: &str, session_id: &str) {
        if let Some(mut ids) = self.sessions.get_mut(principal) {
            ids.retain(|id| id != session_id);
        }
    }

    pub fn session_count(&self, principal: &str) -> usize {
        self.sessions.get(principal).map_or(0, |ids| ids.len())
    }

    /// Expire the principal's oldest session, returning its id.
    pub fn expire_oldest(&self, principal: &str) -> Option<String> {
        let mut ids = self.sessions.get_mut(principal)?;
        if ids.is_empty() {
            return None;
        }
        Some(ids.remove(0))
    }
}

/// What to do when a login would exceed the session bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceededPolicy {
    /// Admit the login and expire the principal's oldest session.
    #[default]
    ExpireOldest,
    /// Refuse the new login.
    RejectLogin,
}

/// Admission check consulted on every login when concurrent session control is enabled.
#[derive(Debug)]
pub struct SessionController {
    registry: Arc<SessionRegistry>,
    max_sessions: usize,
    policy: ExceededPolicy,
}

impl SessionController {
    pub fn new(registry: Arc<SessionRegistry>, max_sessions: usize, policy: ExceededPolicy) -> Self {
        SessionController {
            registry,
            max_sessions,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn policy(&self) -> ExceededPolicy {
        self.policy
    }

    /// Check whether a new login for the principal is admissible.
    ///
    /// Under [`ExceededPolicy::ExpireOldest`] this always succeeds; the eviction happens
    /// in [`register_login`](Self::register_login).
    pub fn check_login_allowed(&self, principal: &str) -> Result<(), ConcurrentLoginError> {
        if self.registry.session_count(principal) < self.max_sessions {
            return Ok(());
        }
        match self.policy {
            ExceededPolicy::ExpireOldest => Ok(()),
            ExceededPolicy::RejectLogin => Err(ConcurrentLoginError {
                principal: principal.to_string(),
                max_sessions: self.max_sessions,
            }),
        }
    }

    /// Record a successful login, evicting the oldest session if the bound was reached.
    pub fn register_login(&self, principal: &str, session_id: &str) {
        if self.registry.session_count(principal) >= self.max_sessions
            && self.policy == ExceededPolicy::ExpireOldest
        {
            self.registry.expire_oldest(principal);
        }
        self.registry.register_session(principal, session_id);
    }
}

/// Request-time refusal of a login that would exceed the concurrent session bound.
///
/// This is a runtime rejection propagated to the request layer; it is never produced
/// during chain compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrentLoginError {
    pub principal: String,
    pub max_sessions: usize,
}

impl fmt::Display for ConcurrentLoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "maximum of {} concurrent session(s) exceeded for '{}'",
            self.max_sessions, self.principal
        )
    }
}

impl std::error::Error for ConcurrentLoginError {}
