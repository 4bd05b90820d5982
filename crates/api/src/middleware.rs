use std::time::Instant;

use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

/// Logs one line per request. Liveness probes are logged at debug since every
/// agent connect attempt hits them.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let task_id = task_id_from_path(&path);
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        warn!(%method, %path, status, elapsed_ms, task_id, "Request failed");
    } else if path == "/health" {
        debug!(%method, %path, status, elapsed_ms, "Liveness probe");
    } else {
        info!(%method, %path, status, elapsed_ms, task_id, "Request handled");
    }

    response
}

/// `/api/tasks/{id}` carries the task id in the path.
fn task_id_from_path(path: &str) -> Option<i64> {
    path.strip_prefix("/api/tasks/")?.parse().ok()
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_from_path() {
        assert_eq!(task_id_from_path("/api/tasks/42"), Some(42));
        assert_eq!(task_id_from_path("/api/tasks"), None);
        assert_eq!(task_id_from_path("/api/tasks/abc"), None);
        assert_eq!(task_id_from_path("/api/agents/heartbeat"), None);
    }
}
