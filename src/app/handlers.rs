use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::forms::{SnippetCreateForm, UserLoginForm, UserSignupForm};
use super::{App, TemplateData, session};
use crate::error::server_error;
use crate::models::ModelError;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

fn form_value<T: serde::Serialize>(form: &T) -> Option<minijinja::Value> {
    Some(minijinja::Value::from_serialize(form))
}

/// Malformed bodies are the client's problem: `400`, never a crash.
fn decode<T: DeserializeOwned>(req: &Request) -> Result<T, Response> {
    req.form().map_err(|e| {
        debug!(path = %req.path(), "undecodable form: {e}");
        Response::status(Status::BadRequest)
    })
}

pub(crate) async fn home(app: Arc<App>, req: Request) -> Response {
    let snippets = match app.snippets.latest(10).await {
        Ok(snippets) => snippets,
        Err(e) => return server_error(&e),
    };
    let data = TemplateData { snippets, ..app.template_data(&req) };
    app.render("home.html", Status::Ok, &data)
}

pub(crate) async fn snippet_view(app: Arc<App>, req: Request) -> Response {
    let id = match req.param("id").and_then(|id| id.parse::<i64>().ok()) {
        Some(id) if id >= 1 => id,
        _ => return Response::status(Status::NotFound),
    };
    let snippet = match app.snippets.get(id).await {
        Ok(snippet) => snippet,
        Err(ModelError::NoRecord) => return Response::status(Status::NotFound),
        Err(e) => return server_error(&e),
    };
    let data = TemplateData { snippet: Some(snippet), ..app.template_data(&req) };
    app.render("view.html", Status::Ok, &data)
}

pub(crate) async fn snippet_create(app: Arc<App>, req: Request) -> Response {
    let data = TemplateData {
        form: form_value(&SnippetCreateForm::default()),
        ..app.template_data(&req)
    };
    app.render("create.html", Status::Ok, &data)
}

pub(crate) async fn snippet_create_post(app: Arc<App>, req: Request) -> Response {
    let session = match session(&req) {
        Ok(session) => session,
        Err(res) => return res,
    };
    let mut form: SnippetCreateForm = match decode(&req) {
        Ok(form) => form,
        Err(res) => return res,
    };

    if !form.validate() {
        let data = TemplateData { form: form_value(&form), ..app.template_data(&req) };
        return app.render("create.html", Status::UnprocessableContent, &data);
    }

    let id = match app.snippets.insert(&form.title, &form.content, form.expires).await {
        Ok(id) => id,
        Err(e) => return server_error(&e),
    };
    info!(id, "snippet created");
    session.put_flash("Snippet successfully created!");
    Response::redirect(&format!("/snippet/view/{id}"))
}

pub(crate) async fn user_signup(app: Arc<App>, req: Request) -> Response {
    let data = TemplateData {
        form: form_value(&UserSignupForm::default()),
        ..app.template_data(&req)
    };
    app.render("signup.html", Status::Ok, &data)
}

pub(crate) async fn user_signup_post(app: Arc<App>, req: Request) -> Response {
    let session = match session(&req) {
        Ok(session) => session,
        Err(res) => return res,
    };
    let mut form: UserSignupForm = match decode(&req) {
        Ok(form) => form,
        Err(res) => return res,
    };

    if form.validate() {
        match app.users.insert(&form.name, &form.email, &form.password).await {
            Ok(()) => {
                session.put_flash("Your signup was successful. Please log in.");
                return Response::redirect("/user/login");
            }
            Err(ModelError::DuplicateEmail) => {
                form.validator.add_non_field_error("Email address is already in use");
            }
            Err(e) => return server_error(&e),
        }
    }

    let data = TemplateData { form: form_value(&form), ..app.template_data(&req) };
    app.render("signup.html", Status::UnprocessableContent, &data)
}

pub(crate) async fn user_login(app: Arc<App>, req: Request) -> Response {
    let data = TemplateData {
        form: form_value(&UserLoginForm::default()),
        ..app.template_data(&req)
    };
    app.render("login.html", Status::Ok, &data)
}

pub(crate) async fn user_login_post(app: Arc<App>, req: Request) -> Response {
    let session = match session(&req) {
        Ok(session) => session,
        Err(res) => return res,
    };
    let mut form: UserLoginForm = match decode(&req) {
        Ok(form) => form,
        Err(res) => return res,
    };

    if form.validate() {
        match app.users.authenticate(&form.email, &form.password).await {
            Ok(user_id) => {
                session.renew_token();
                session.set_user_id(user_id);
                session.put_flash("You've been logged in successfully!");
                return Response::redirect("/snippet/create");
            }
            Err(ModelError::InvalidCredentials) => {
                form.validator.add_non_field_error("Email or password is incorrect");
            }
            Err(e) => return server_error(&e),
        }
    }

    let data = TemplateData { form: form_value(&form), ..app.template_data(&req) };
    app.render("login.html", Status::UnprocessableContent, &data)
}

pub(crate) async fn user_logout_post(_app: Arc<App>, req: Request) -> Response {
    let session = match session(&req) {
        Ok(session) => session,
        Err(res) => return res,
    };
    session.renew_token();
    session.remove_user_id();
    session.put_flash("You've been logged out successfully!");
    Response::redirect("/")
}
