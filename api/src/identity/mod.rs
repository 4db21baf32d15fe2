use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Set by the upstream authentication layer once it has verified the
/// caller's session.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("Authentication required, but no `{USER_ID_HEADER}` header found in request.")]
    NoIdentity,

    #[error("Unauthorized, the `{USER_ID_HEADER}` header is not a valid user ID.")]
    Malformed,
}

fn viewer_from_parts(parts: &Parts) -> Result<Uuid, AuthenticationError> {
    let header = parts
        .headers
        .get(USER_ID_HEADER)
        .ok_or(AuthenticationError::NoIdentity)?;

    header
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(AuthenticationError::Malformed)
}

/// The requesting user, when there is one. Guests can still read comment
/// trees and post anonymously.
pub struct MaybeViewer(pub Result<Uuid, AuthenticationError>);

impl MaybeViewer {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().ok().copied()
    }
}

impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let viewer = viewer_from_parts(parts);

        if let Err(AuthenticationError::Malformed) = viewer {
            tracing::warn!("rejecting request with malformed `{USER_ID_HEADER}` header");
            return Err(AuthenticationError::Malformed.into());
        }

        Ok(MaybeViewer(viewer))
    }
}

pub struct Viewer(pub Uuid);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeViewer(viewer) = MaybeViewer::from_request_parts(parts, state).await?;

        Ok(Viewer(viewer?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_maybe_viewer_without_header() {
        let mut parts = parts_with(None);
        let viewer = MaybeViewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(viewer.id().is_none());
    }

    #[tokio::test]
    async fn test_viewer_parses_uuid() {
        let id = Uuid::new_v4();
        let mut parts = parts_with(Some(&id.to_string()));
        let Viewer(viewer) = Viewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(viewer, id);
    }

    #[tokio::test]
    async fn test_viewer_requires_header() {
        let mut parts = parts_with(None);
        assert!(Viewer::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let mut parts = parts_with(Some("not-a-uuid"));
        assert!(
            MaybeViewer::from_request_parts(&mut parts, &())
                .await
                .is_err()
        );
    }
}
