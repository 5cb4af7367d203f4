use serde::{Deserialize, Serialize};

/// An authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

/// Authentication collaborator. The guest entry flow needs this to be
/// answerable at link-open time, so the query is synchronous.
pub trait AuthProvider {
    fn current_actor(&self) -> Option<Identity>;
}

/// Resolves the actor from the `RALLYTAG_USER` environment variable.
/// Good enough for single-user tooling; anything multi-user supplies
/// its own provider.
pub struct EnvAuth;

impl AuthProvider for EnvAuth {
    fn current_actor(&self) -> Option<Identity> {
        std::env::var("RALLYTAG_USER")
            .ok()
            .filter(|v| !v.is_empty())
            .map(Identity::new)
    }
}

/// Fixed-answer provider for tests and for CLI `--user` overrides.
pub struct StaticAuth(pub Option<Identity>);

impl StaticAuth {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self(Some(Identity::new(user_id)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl AuthProvider for StaticAuth {
    fn current_actor(&self) -> Option<Identity> {
        self.0.clone()
    }
}
