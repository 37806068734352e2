//! The page template cache.
//!
//! Every page under `<dir>/pages/` is compiled once, at startup, together with
//! the shared layout `<dir>/base.html` and every fragment in
//! `<dir>/partials/`. Each page ends up as its own independent unit, so a
//! broken page fails [`Templates::build`] instead of a request.
//!
//! ```text
//! ui/html/
//! ├── base.html            {% block main %}{% endblock %}, includes partials
//! ├── partials/nav.html
//! └── pages/
//!     ├── home.html         {% extends "base.html" %}
//!     └── view.html
//! ```
//!
//! Rendering goes to a buffer first. Nothing reaches the client unless the
//! whole page rendered, so a template failing halfway can never produce a
//! truncated page behind a `200`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::debug;

use crate::response::Response;
use crate::status::Status;

const BASE: &str = "base.html";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile template `{name}`")]
    Compile {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Nothing is registered under that page name. Always a routing bug.
    #[error("the template `{0}` does not exist")]
    MissingTemplate(String),
    /// The page exists but failed while executing.
    #[error("failed to render template `{name}`")]
    Execution {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Compiled page templates, keyed by page file name (e.g. `home.html`).
///
/// Read-only once built; share it behind an `Arc`.
pub struct Templates {
    pages: HashMap<String, Environment<'static>>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates")
            .field("pages", &self.pages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Templates {
    /// Compile every page found in `<dir>/pages`.
    pub fn build(dir: impl AsRef<Path>) -> Result<Self, BuildError> {
        let dir = dir.as_ref();
        let base = read(&dir.join(BASE))?;
        let partials = html_files(&dir.join("partials"))?
            .into_iter()
            .map(|(name, path)| Ok((format!("partials/{name}"), read(&path)?)))
            .collect::<Result<Vec<_>, BuildError>>()?;

        let mut pages = HashMap::new();
        for (name, path) in html_files(&dir.join("pages"))? {
            let page = read(&path)?;
            let mut env = environment();
            add(&mut env, BASE, &base)?;
            for (partial, source) in &partials {
                add(&mut env, partial, source)?;
            }
            add(&mut env, &name, &page)?;
            debug!(page = %name, "compiled template");
            pages.insert(name, env);
        }

        Ok(Self { pages })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// Render `name` with `data` into a complete `text/html` response.
    pub fn render<S: Serialize>(
        &self,
        name: &str,
        status: Status,
        data: &S,
    ) -> Result<Response, RenderError> {
        let env = self.pages
            .get(name)
            .ok_or_else(|| RenderError::MissingTemplate(name.to_owned()))?;
        let execution = |source| RenderError::Execution { name: name.to_owned(), source };

        let body = env.get_template(name)
            .and_then(|template| template.render(data))
            .map_err(execution)?;

        Ok(Response::builder().status(status).html(body))
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_filter("human_date", human_date);
    env
}

fn add(env: &mut Environment<'static>, name: &str, source: &str) -> Result<(), BuildError> {
    env.add_template_owned(name.to_owned(), source.to_owned())
        .map_err(|source| BuildError::Compile { name: name.to_owned(), source })
}

fn read(path: &Path) -> Result<String, BuildError> {
    fs::read_to_string(path).map_err(|source| BuildError::Read { path: path.to_owned(), source })
}

/// `*.html` files directly inside `dir`, sorted by file name.
fn html_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, BuildError> {
    let read_err = |source| BuildError::Read { path: dir.to_owned(), source };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.extension().is_some_and(|ext| ext == "html") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push((name.to_owned(), path.clone()));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// `{{ snippet.created | human_date }}` → `22 Aug 2024 at 22:05`.
///
/// Takes an RFC 3339 timestamp and keeps its offset. A missing or empty
/// value renders as nothing.
pub fn human_date(value: Option<String>) -> Result<String, minijinja::Error> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(String::new());
    };
    let invalid = |e: &dyn std::fmt::Display| {
        minijinja::Error::new(ErrorKind::InvalidOperation, format!("human_date: {e}"))
    };
    let at = OffsetDateTime::parse(&value, &Rfc3339).map_err(|e| invalid(&e))?;
    at.format(format_description!("[day] [month repr:short] [year] at [hour]:[minute]"))
        .map_err(|e| invalid(&e))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Serialize;
    use tempfile::TempDir;

    use super::*;

    #[derive(Serialize)]
    struct Data {
        title: &'static str,
    }

    fn ui(pages: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.html"),
            "<title>{% block title %}{% endblock %}</title>{% include \"partials/nav.html\" %}<main>{% block main %}{% endblock %}</main>",
        ).unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/nav.html"), "<nav>Home</nav>").unwrap();
        fs::create_dir(dir.path().join("pages")).unwrap();
        for (name, source) in pages {
            fs::write(dir.path().join("pages").join(name), source).unwrap();
        }
        dir
    }

    #[test]
    fn every_page_is_compiled_with_layout_and_partials() {
        let dir = ui(&[
            ("home.html", r#"{% extends "base.html" %}{% block main %}{{ title }}{% endblock %}"#),
            ("view.html", r#"{% extends "base.html" %}{% block main %}view{% endblock %}"#),
            ("notes.txt", "ignored"),
        ]);
        let templates = Templates::build(dir.path()).unwrap();

        let mut names: Vec<_> = templates.names().collect();
        names.sort();
        assert_eq!(names, ["home.html", "view.html"]);

        let res = templates.render("home.html", Status::Ok, &Data { title: "<b>hi</b>" }).unwrap();
        assert_eq!(res.status_code(), 200);
        let body = std::str::from_utf8(res.body()).unwrap();
        assert!(body.starts_with("<title></title><nav>Home</nav><main>&lt;b&gt;hi"));
        assert!(!body.contains("<b>"));
    }

    #[test]
    fn status_is_carried_through() {
        let dir = ui(&[("home.html", r#"{% extends "base.html" %}"#)]);
        let templates = Templates::build(dir.path()).unwrap();
        let res = templates.render("home.html", Status::UnprocessableContent, &minijinja::context! {}).unwrap();
        assert_eq!(res.status_code(), 422);
    }

    #[test]
    fn syntax_errors_fail_the_build() {
        let dir = ui(&[("broken.html", "{% block main %}never closed")]);
        let err = Templates::build(dir.path()).unwrap_err();
        assert!(matches!(err, BuildError::Compile { ref name, .. } if name == "broken.html"));
    }

    #[test]
    fn missing_layout_fails_the_build() {
        let dir = ui(&[]);
        fs::remove_file(dir.path().join("base.html")).unwrap();
        assert!(matches!(Templates::build(dir.path()), Err(BuildError::Read { .. })));
    }

    #[test]
    fn unknown_page_is_a_distinct_error() {
        let dir = ui(&[("home.html", r#"{% extends "base.html" %}"#)]);
        let templates = Templates::build(dir.path()).unwrap();
        let err = templates.render("nope.html", Status::Ok, &minijinja::context! {}).unwrap_err();
        assert!(matches!(err, RenderError::MissingTemplate(ref name) if name == "nope.html"));
    }

    #[test]
    fn failing_halfway_yields_no_response() {
        let dir = ui(&[(
            "home.html",
            r#"{% extends "base.html" %}{% block main %}before {{ not_provided }} after{% endblock %}"#,
        )]);
        let templates = Templates::build(dir.path()).unwrap();
        let err = templates.render("home.html", Status::Ok, &Data { title: "x" }).unwrap_err();
        assert!(matches!(err, RenderError::Execution { .. }));
    }

    #[test]
    fn human_dates() {
        assert_eq!(human_date(Some("2024-08-22T22:05:00Z".into())).unwrap(), "22 Aug 2024 at 22:05");
        assert_eq!(human_date(Some("2024-08-22T22:05:00+01:00".into())).unwrap(), "22 Aug 2024 at 22:05");
        assert_eq!(human_date(Some(String::new())).unwrap(), "");
        assert_eq!(human_date(None).unwrap(), "");
        assert!(human_date(Some("yesterday".into())).is_err());
    }
}
