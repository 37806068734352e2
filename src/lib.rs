//! # snippetbox
//!
//! A server-rendered snippet-sharing application: users sign up, log in,
//! and create short text snippets that expire after a day, a week or a year.
//!
//! ## Shape of a request
//!
//! ```text
//! hyper ─▶ RecoverPanic ─▶ LogRequest ─▶ SecureHeaders ─▶ Router
//!                                                          │
//!            ┌─────────────────────────────────────────────┘
//!            ▼
//!   LoadAndSave ─▶ VerifyCsrf ─▶ Authenticate ─▶ [RequireAuthentication] ─▶ handler
//! ```
//!
//! The outer three layers (the *standard* chain) wrap everything, the 404
//! fallback and static files included. Application pages additionally run
//! through the *dynamic* chain; pages that need a logged-in user through the
//! *protected* chain, which is the dynamic chain plus an authentication gate.
//!
//! Pages are rendered from templates compiled once at startup
//! ([`templates::Templates`]), with per-request data: the flash message, the
//! CSRF token, whether the user is logged in.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use snippetbox::app::{App, routes};
//! use snippetbox::config::Config;
//! use snippetbox::models::{MemorySnippets, MemoryUsers};
//! use snippetbox::session::{MemoryStore, SessionManager};
//! use snippetbox::templates::Templates;
//! use snippetbox::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), snippetbox::Error> {
//!     let config = Config::load()?;
//!     let app = Arc::new(App {
//!         templates: Templates::build(config.templates_dir())?,
//!         snippets: Arc::new(MemorySnippets::new()),
//!         users: Arc::new(MemoryUsers::new()),
//!         sessions: SessionManager::new(Arc::new(MemoryStore::new()), config.session_lifetime()),
//!         static_dir: config.static_dir(),
//!     });
//!
//!     Server::bind(&config.addr)?.serve(routes(app)).await
//! }
//! ```

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod app;
pub mod config;
pub mod context;
pub mod health;
pub mod middleware;
pub mod models;
pub mod session;
pub mod templates;
pub mod validator;

pub use error::{Error, server_error};
pub use handler::Handler;
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
