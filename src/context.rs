//! Per-request context threaded through the dynamic chain.

use std::collections::HashMap;

/// Whether the client behind a request is logged in.
///
/// Within one session the only transition is `Anonymous -> Authenticated`.
/// Logging out does not flip a session back: it replaces it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated { user_id: i64 },
}

/// Values resolved by the pipeline before the terminal handler runs.
///
/// The dispatcher fills in path parameters, the CSRF middleware the token,
/// and the authentication middleware the [`AuthState`]. Handlers only read.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub(crate) params: HashMap<String, String>,
    pub(crate) csrf_token: Option<String>,
    pub(crate) auth: AuthState,
}

impl RequestContext {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The token to embed in forms. Empty outside the dynamic chain.
    pub fn csrf_token(&self) -> &str {
        self.csrf_token.as_deref().unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.auth {
            AuthState::Authenticated { user_id } => Some(user_id),
            AuthState::Anonymous => None,
        }
    }
}
