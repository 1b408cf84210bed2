//! HTTP front-end.
//!
//! Runs actions from the control file loaded at startup, or single
//! primitives, and returns the captured output as plain text.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use ctlrun_core::{ControlFile, Interpreter, Variables};

use crate::error::{AppError, AppResult};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub interp: Interpreter,
    /// Control file loaded at startup, if any.
    pub control: Option<Arc<ControlFile>>,
}

impl HttpState {
    pub fn new(interp: Interpreter, control: Option<Arc<ControlFile>>) -> Self {
        Self { interp, control }
    }
}

/// Build the router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/actions/{action}", get(run_action).post(run_action))
        .route("/commands/{name}", get(run_command).post(run_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /health`
async fn health() -> &'static str {
    "ok"
}

/// `GET|POST /actions/{action}?name=value...`
///
/// Query pairs become variables of the run. Responds 200 when the action
/// succeeds and 500 when it fails; the body is the action output either way.
async fn run_action(
    State(state): State<HttpState>,
    Path(action): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<(StatusCode, String)> {
    let control = state
        .control
        .clone()
        .ok_or_else(|| AppError::NotFound("no control file loaded".to_string()))?;

    let mut variables = Variables::new();
    for (name, value) in params {
        variables.set(name, value);
    }

    tracing::info!(action = %action, variables = variables.len(), "HTTP action request");

    let mut out: Vec<u8> = Vec::new();
    let success = state
        .interp
        .run_control_file(control, &action, &mut variables, &mut out)
        .await?;

    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, String::from_utf8_lossy(&out).into_owned()))
}

/// `GET|POST /commands/{name}?arg=...`
///
/// Query values are passed as arguments in order; their keys are ignored.
/// A command that rejects its arguments answers 400 with its usage text.
async fn run_command(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<(StatusCode, String)> {
    if !state.interp.registry().has(&name) {
        return Err(AppError::NotFound(format!("Unknown command: {}", name)));
    }

    let args: Vec<String> = params.into_iter().map(|(_, value)| value).collect();
    tracing::debug!(command = %name, args = ?args, "HTTP command request");

    let mut out: Vec<u8> = Vec::new();
    let success = state.interp.run_command(&name, &mut out, &args).await?;
    let text = String::from_utf8_lossy(&out).into_owned();

    if !success {
        return Err(AppError::BadRequest(text.trim_end().to_string()));
    }
    Ok((StatusCode::OK, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ctlrun_core::create_default_registry;
    use tower::ServiceExt;

    const CONTROL: &str = "\
greet = echo
greet.param.1 = hello <who:world>
broken = fail
broken.param.1 = IllegalState
broken.param.2 = boom
";

    fn app(control: Option<&str>) -> Router {
        let interp = Interpreter::new(create_default_registry());
        let control = control.map(|text| Arc::new(ControlFile::parse(text)));
        router(HttpState::new(interp, control))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(app(None), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_action_with_query_variables() {
        let (status, body) = call(app(Some(CONTROL)), "GET", "/actions/greet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello world\n");

        let (status, body) = call(app(Some(CONTROL)), "POST", "/actions/greet?who=there").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello there\n");
    }

    #[tokio::test]
    async fn test_failed_action_returns_output() {
        let (status, body) = call(app(Some(CONTROL)), "GET", "/actions/broken").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("Error in action 'broken'"));

        let (status, body) = call(app(Some(CONTROL)), "GET", "/actions/missing").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Action 'missing' not found in the control file\n");
    }

    #[tokio::test]
    async fn test_action_without_control_file() {
        let (status, body) = call(app(None), "GET", "/actions/greet").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("no control file loaded"));
    }

    #[tokio::test]
    async fn test_commands() {
        let (status, body) = call(app(None), "POST", "/commands/echo?a=one&b=two").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "one two\n");

        let (status, _) = call(app(None), "GET", "/commands/frobnicate").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(app(None), "GET", "/commands/sleep").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Wrong number of arguments for 'sleep'"));
        assert!(body.contains("\"status\":400"));

        let (status, body) = call(app(None), "GET", "/commands/namedInstanceEcho?name=nope").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("\"status\":422"));
    }
}
