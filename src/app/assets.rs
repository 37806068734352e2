//! `GET /static/{*path}`: files below the configured static directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::App;
use crate::error::server_error;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::status::Status;

pub(crate) async fn serve(app: Arc<App>, req: Request) -> Response {
    let Some(path) = req.param("path").and_then(|raw| resolve(&app.static_dir, raw)) else {
        debug!(path = %req.path(), "rejected static path");
        return Response::status(Status::NotFound);
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(ContentType::OctetStream, ContentType::from_extension);
            Response::builder().bytes(content_type, bytes)
        }
        // Reading a directory fails with one of these, depending on the platform.
        Err(e) if matches!(
            e.kind(),
            ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::PermissionDenied
        ) => Response::status(Status::NotFound),
        Err(e) => server_error(&e),
    }
}

/// `root` joined with `raw`, or `None` if `raw` could step outside `root`.
fn resolve(root: &Path, raw: &str) -> Option<PathBuf> {
    let relative = Path::new(raw);
    let clean = relative.components().all(|c| matches!(c, Component::Normal(_)));
    (clean && !raw.is_empty()).then(|| root.join(relative))
}
