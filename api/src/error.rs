use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;

use crate::{identity::AuthenticationError, store::StoreError};

/// Failures of the comment and vote operations. Every kind maps to its own
/// caller-facing status in [`AppError`].
#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You do not have permission to modify this {0}")]
    Forbidden(&'static str),

    #[error("Thread is locked")]
    Locked,

    #[error("Parent comment belongs to a different thread")]
    CrossThread,

    #[error("The request conflicted with a concurrent update, please try again")]
    Conflict,

    #[error("{0}")]
    Invalid(String),

    #[error("storage failure: {0:#}")]
    Store(eyre::Report),
}

impl From<StoreError> for BoardError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => BoardError::Conflict,
            StoreError::Missing(what) => BoardError::NotFound(what),
            StoreError::Backend(report) => BoardError::Store(report),
        }
    }
}

impl From<&'static str> for BoardError {
    fn from(e: &'static str) -> Self {
        BoardError::Invalid(e.into())
    }
}

impl BoardError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            BoardError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BoardError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            BoardError::Locked => (StatusCode::LOCKED, "THREAD_LOCKED"),
            BoardError::CrossThread => (StatusCode::BAD_REQUEST, "CROSS_THREAD"),
            BoardError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            BoardError::Invalid(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BoardError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERR"),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Board(BoardError),
    Unauthorized(AuthenticationError),
    ServerError {
        error: eyre::Report,

        #[cfg(debug_assertions)]
        backtrace: backtrace::Backtrace,
    },
    Unhandled {
        msg: String,
        status: StatusCode,
    },
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

impl ErrorResponse {
    fn new(code: &str, msg: String) -> Self {
        ErrorResponse {
            code: code.into(),
            msg: Some(msg),
            #[cfg(debug_assertions)]
            debug_info: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, error_response) = match self {
            AppError::Board(BoardError::Store(error)) => {
                return AppError::from(error).into_response();
            }
            AppError::Board(e) => {
                let (status, code) = e.status_and_code();
                (status, ErrorResponse::new(code, e.to_string()))
            }
            AppError::Unauthorized(e) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("AUTH_REQUIRED", e.to_string()),
            ),
            AppError::ServerError {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                #[allow(unused_mut)]
                let (status, mut response) = server_error(error);
                #[cfg(debug_assertions)]
                if let Some(info) = response.debug_info.as_mut() {
                    info.insert(
                        "backtrace",
                        serde_json::to_value(filter_backtrace(&backtrace)).unwrap_or_default(),
                    );
                }
                (status, response)
            }
            AppError::Unhandled { msg, status } => (status, ErrorResponse::new("ERR", msg)),
        };

        (status_code, Json(error_response)).into_response()
    }
}

fn server_error(error: eyre::Report) -> (StatusCode, ErrorResponse) {
    tracing::error!(?error, "request failed");

    #[cfg(debug_assertions)]
    let response = ErrorResponse {
        code: "SERVER_ERR".into(),
        msg: Some("Internal server error".into()),
        debug_info: Some(HashMap::from([(
            "error",
            Value::String(format!("{error:#}")),
        )])),
    };

    #[cfg(not(debug_assertions))]
    let response = ErrorResponse {
        code: "SERVER_ERR".into(),
        msg: Some("Internal server error".into()),
    };

    (StatusCode::INTERNAL_SERVER_ERROR, response)
}

impl From<BoardError> for AppError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Store(report) => report.into(),
            e => AppError::Board(e),
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        AppError::Unauthorized(e)
    }
}

impl From<eyre::Report> for AppError {
    fn from(error: eyre::Report) -> Self {
        AppError::ServerError {
            error,

            #[cfg(debug_assertions)]
            backtrace: backtrace::Backtrace::new(),
        }
    }
}

impl<T: Into<String>> From<(T, StatusCode)> for AppError {
    fn from((msg, status): (T, StatusCode)) -> Self {
        AppError::Unhandled {
            msg: msg.into(),
            status,
        }
    }
}

#[cfg(debug_assertions)]
#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_PKG_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) && name.contains(MODULE_PREFIX)
            {
                frames_info.push(FrameInfo {
                    name,
                    loc: format!("{}:{}", filename.display(), lineno),
                });
            }
        }
    }

    frames_info
}

#[cfg(test)]
mod test {
    use super::*;

    fn status_of(e: impl Into<AppError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn test_board_errors_map_to_distinct_statuses() {
        assert_eq!(status_of(BoardError::NotFound("thread")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BoardError::Forbidden("comment")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(BoardError::Locked), StatusCode::LOCKED);
        assert_eq!(status_of(BoardError::CrossThread), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(BoardError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_of(BoardError::Store(eyre::eyre!("db down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_are_classified() {
        assert!(matches!(
            BoardError::from(StoreError::Conflict),
            BoardError::Conflict
        ));
        assert!(matches!(
            BoardError::from(StoreError::Missing("comment")),
            BoardError::NotFound("comment")
        ));
        assert!(matches!(
            BoardError::from(StoreError::Backend(eyre::eyre!("boom"))),
            BoardError::Store(_)
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_a_server_error() {
        let app_error = AppError::from(BoardError::Store(eyre::eyre!("db down")));
        assert!(matches!(app_error, AppError::ServerError { .. }));

        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "SERVER_ERR");

        #[cfg(debug_assertions)]
        {
            assert_eq!(body["debug_info"]["error"], "db down");
            assert!(body["debug_info"]["backtrace"].is_array());
        }
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            status_of(AuthenticationError::NoIdentity),
            StatusCode::UNAUTHORIZED
        );
    }
}
