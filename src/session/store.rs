//! The storage seam for server-side session state.

use std::fmt;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// The opaque identifier a client presents in its session cookie.
///
/// Always 32 lowercase hex characters drawn from a v4 UUID, i.e. 122 bits of
/// operating-system randomness. Anything else a client sends is treated as
/// "no session" and never reaches the store.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accepts only values this type could have produced.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == 32
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The state kept server-side for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub user_id: Option<i64>,
    pub flash: Option<String>,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn new(expires_at: OffsetDateTime) -> Self {
        Self { user_id: None, flash: None, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("something went wrong when talking to the session store")]
    Backend(#[source] anyhow::Error),
}

/// Token-keyed storage for session records.
///
/// Each call is a single, self-contained operation: a `save` either replaces
/// the whole record or leaves the previous one untouched. Concurrent saves
/// for the same token are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `Ok(None)` if the token is unknown or its record has expired.
    async fn load(&self, token: &SessionToken) -> Result<Option<SessionRecord>, SessionError>;

    /// Insert or overwrite the record for `token`.
    async fn save(&self, token: &SessionToken, record: SessionRecord) -> Result<(), SessionError>;

    /// Remove the record for `token`. Unknown tokens are not an error.
    async fn destroy(&self, token: &SessionToken) -> Result<(), SessionError>;

    /// Drop every expired record, returning how many were removed.
    async fn delete_expired(&self) -> Result<usize, SessionError>;
}
