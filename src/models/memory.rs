//! In-memory stand-ins for the SQL models.
//!
//! Both stores are process-local and lose everything on restart. Passwords
//! are kept as given: hashing belongs to the real persistence layer.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::{ModelError, Snippet, SnippetStore, UserStore};

#[derive(Debug, Default)]
pub struct MemorySnippets {
    rows: RwLock<Vec<Snippet>>,
}

impl MemorySnippets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snippets, expired ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnippetStore for MemorySnippets {
    async fn insert(&self, title: &str, content: &str, expires_days: i64) -> Result<i64, ModelError> {
        let created = OffsetDateTime::now_utc();
        let mut rows = self.rows.write();
        let id = rows.last().map_or(1, |last| last.id + 1);
        rows.push(Snippet {
            id,
            title: title.to_owned(),
            content: content.to_owned(),
            created,
            expires: created + Duration::days(expires_days),
        });
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Snippet, ModelError> {
        let now = OffsetDateTime::now_utc();
        self.rows
            .read()
            .iter()
            .find(|s| s.id == id && s.expires > now)
            .cloned()
            .ok_or(ModelError::NoRecord)
    }

    async fn latest(&self, limit: usize) -> Result<Vec<Snippet>, ModelError> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .rows
            .read()
            .iter()
            .rev()
            .filter(|s| s.expires > now)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
struct User {
    email: String,
    password: String,
}

#[derive(Debug, Default)]
pub struct MemoryUsers {
    rows: RwLock<HashMap<i64, User>>,
}

impl MemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), ModelError> {
        let mut rows = self.rows.write();
        if rows.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(ModelError::DuplicateEmail);
        }
        let id = rows.keys().max().map_or(1, |max| max + 1);
        rows.insert(id, User { email: email.to_owned(), password: password.to_owned() });
        debug!(id, name, "user created");
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, ModelError> {
        let rows = self.rows.read();
        let Some((id, user)) = rows.iter().find(|(_, u)| u.email.eq_ignore_ascii_case(email)) else {
            return Err(ModelError::InvalidCredentials);
        };
        if bool::from(user.password.as_bytes().ct_eq(password.as_bytes())) {
            Ok(*id)
        } else {
            Err(ModelError::InvalidCredentials)
        }
    }

    async fn exists(&self, id: i64) -> Result<bool, ModelError> {
        Ok(self.rows.read().contains_key(&id))
    }
}
