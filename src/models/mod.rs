//! The persistence seam.
//!
//! Handlers talk to storage only through [`SnippetStore`] and [`UserStore`].
//! A SQL-backed implementation lives outside this crate; the in-memory ones
//! in [`memory`] back the development binary and the tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub use memory::{MemorySnippets, MemoryUsers};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no matching record found")]
    NoRecord,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("something went wrong in the persistence layer")]
    Backend(#[source] anyhow::Error),
}

/// A stored piece of text. Timestamps serialise as RFC 3339 so templates
/// can format them with `human_date`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(serialize_with = "rfc3339")]
    pub created: OffsetDateTime,
    #[serde(serialize_with = "rfc3339")]
    pub expires: OffsetDateTime,
}

fn rfc3339<S: Serializer>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    let formatted = at.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Store a snippet that expires `expires_days` from now; returns its id.
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<i64, ModelError>;

    /// An unexpired snippet, or [`ModelError::NoRecord`].
    async fn get(&self, id: i64) -> Result<Snippet, ModelError>;

    /// Up to `limit` unexpired snippets, newest first.
    async fn latest(&self, limit: usize) -> Result<Vec<Snippet>, ModelError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`ModelError::DuplicateEmail`] if the email is taken.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError>;

    /// The id of the user with these credentials, or
    /// [`ModelError::InvalidCredentials`].
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError>;

    async fn exists(&self, id: i64) -> Result<bool, ModelError>;
}
