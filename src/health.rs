//! Liveness probe.
//!
//! `GET /ping` answers `200 OK` with body `OK` as long as the process can
//! serve HTTP at all. It runs on the standard chain only: no session is
//! loaded and no store is touched, so a probe never creates state.

use crate::{Request, Response};

pub async fn ping(_req: Request) -> Response {
    Response::text("OK")
}
