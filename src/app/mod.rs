//! The snippetbox web application: handlers, forms and the route table.
//!
//! Everything a handler needs is held by [`App`] and passed in explicitly;
//! nothing here reads global state.

mod assets;
mod forms;
mod handlers;
mod routes;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::server_error;
use crate::handler::Handler;
use crate::models::{Snippet, SnippetStore, UserStore};
use crate::request::Request;
use crate::response::Response;
use crate::session::{Session, SessionManager};
use crate::status::Status;
use crate::templates::Templates;

pub use routes::routes;

/// Application-wide dependencies, shared by every handler.
pub struct App {
    pub templates: Templates,
    pub snippets: Arc<dyn SnippetStore>,
    pub users: Arc<dyn UserStore>,
    pub sessions: SessionManager,
    /// Directory served under `/static/`.
    pub static_dir: PathBuf,
}

/// A handler was mounted on a chain without [`LoadAndSave`](crate::middleware::LoadAndSave).
#[derive(Debug, thiserror::Error)]
#[error("no session on the request; is the route on the dynamic chain?")]
pub(crate) struct MissingSession;

/// Data available to every page.
#[derive(Debug, Default, Serialize)]
pub(crate) struct TemplateData {
    pub current_year: i32,
    pub snippet: Option<Snippet>,
    pub snippets: Vec<Snippet>,
    pub form: Option<minijinja::Value>,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
    /// Where `flash` came from, so a page that fails to render can hand it back.
    #[serde(skip)]
    pub session: Option<Session>,
}

impl App {
    /// Per-request defaults. Takes the pending flash message, if any.
    pub(crate) fn template_data(&self, req: &Request) -> TemplateData {
        TemplateData {
            session: req.session().cloned(),
            current_year: OffsetDateTime::now_utc().year(),
            flash: req.session().and_then(Session::pop_flash),
            is_authenticated: req.context().is_authenticated(),
            csrf_token: req.context().csrf_token().to_owned(),
            ..TemplateData::default()
        }
    }

    /// Render `page`, turning any failure into a generic `500`.
    ///
    /// A flash message the failed page would have shown stays queued for the
    /// next one.
    pub(crate) fn render(&self, page: &str, status: Status, data: &TemplateData) -> Response {
        match self.templates.render(page, status, data) {
            Ok(res) => res,
            Err(e) => {
                if let (Some(session), Some(flash)) = (&data.session, &data.flash) {
                    session.restore_flash(flash.clone());
                }
                server_error(&e)
            }
        }
    }
}

/// The session [`LoadAndSave`](crate::middleware::LoadAndSave) put on the
/// request.
pub(crate) fn session(req: &Request) -> Result<&Session, Response> {
    req.session().ok_or_else(|| server_error(&MissingSession))
}

/// Adapt `f(app, req)` into a route handler bound to `app`.
pub(crate) fn with_app<F, Fut>(app: Arc<App>, f: F) -> impl Handler
where
    F: Fn(Arc<App>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    move |req: Request| f(Arc::clone(&app), req)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::method::Method;
    use crate::models::{MemorySnippets, MemoryUsers};
    use crate::session::MemoryStore;

    fn app(templates: &std::path::Path) -> App {
        App {
            templates: Templates::build(templates).unwrap(),
            snippets: Arc::new(MemorySnippets::new()),
            users: Arc::new(MemoryUsers::new()),
            sessions: SessionManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(60)),
            static_dir: templates.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn a_page_that_fails_to_render_keeps_the_flash() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.html"), "{% block main %}{% endblock %}").unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::create_dir(dir.path().join("pages")).unwrap();
        fs::write(
            dir.path().join("pages/home.html"),
            r#"{% extends "base.html" %}{% block main %}{{ flash }} {{ no_such_value.field }}{% endblock %}"#,
        )
        .unwrap();
        let app = app(dir.path());

        let session = app.sessions.load(None).await.unwrap();
        session.put_flash("Snippet successfully created!");
        let mut req = Request::builder(Method::Get, "/").build();
        req.session = Some(session.clone());

        let data = app.template_data(&req);
        assert_eq!(data.flash.as_deref(), Some("Snippet successfully created!"));
        assert_eq!(session.pop_flash(), None);

        let res = app.render("home.html", Status::Ok, &data);
        assert_eq!(res.status_code(), 500);
        assert_eq!(session.pop_flash().as_deref(), Some("Snippet successfully created!"));
    }
}
