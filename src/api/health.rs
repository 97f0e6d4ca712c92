use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct Status {
    status: &'static str,
}

pub(crate) async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "Throne of Thorns API",
        version: "1.0.0",
        status: "running",
    })
}

/// Liveness and readiness both report `ok` once the server is accepting.
pub(crate) async fn status_ok() -> Json<Status> {
    Json(Status { status: "ok" })
}
