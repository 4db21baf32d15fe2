use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use store::BoardStore;

pub mod comment;
pub mod config;
pub mod error;
pub mod identity;
pub mod json;
pub mod models;
pub mod schema;
pub mod store;
pub mod vote;

#[derive(Clone)]
pub struct App {
    pub store: Arc<dyn BoardStore>,
    pub config: Arc<ServerConfig>,
}

pub fn router(app: App) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(comment::routes::route())
        .merge(vote::routes::route())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[cfg(test)]
mod test {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{comment::fixtures::thread, identity::USER_ID_HEADER, store::MemoryStore};

    async fn app_with_thread() -> (Router, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let t = thread(None);
        store.insert_thread(t.clone()).await;

        let app = App {
            store,
            config: Arc::new(ServerConfig::default()),
        };
        (router(app), t.id)
    }

    fn json_request(method: &str, uri: &str, user: Option<Uuid>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with_thread().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_vote_requires_viewer() {
        let (app, thread_id) = app_with_thread().await;
        let body = json!({ "votable_id": thread_id, "votable_type": "THREAD", "vote_value": 1 });

        let response = app
            .oneshot(json_request("POST", "/votes", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_vote_returns_new_score() {
        let (app, thread_id) = app_with_thread().await;
        let user = Some(Uuid::new_v4());

        let up = json!({ "votable_id": thread_id, "votable_type": "THREAD", "vote_value": 1 });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/votes", user, up))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["new_score"], 1);

        let bad = json!({ "votable_id": thread_id, "votable_type": "THREAD", "vote_value": 0 });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/votes", user, bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let retract = json!({ "votable_id": thread_id, "votable_type": "THREAD" });
        let response = app
            .oneshot(json_request("DELETE", "/votes", user, retract))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_comment_flow() {
        let (app, thread_id) = app_with_thread().await;
        let user = Some(Uuid::new_v4());

        let body = json!({ "thread_id": thread_id, "content": "first!" });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/comments", user, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["content"], "first!");
        assert_eq!(created["depth"], 0);

        let uri = format!("/threads/{thread_id}/comments?sort=new&depth=1");
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tree = body_json(response).await;
        assert_eq!(tree[0]["id"], created["id"]);
        assert_eq!(tree[0]["user_vote"], 0);
    }

    #[tokio::test]
    async fn test_named_comment_without_viewer_is_unauthorized() {
        let (app, thread_id) = app_with_thread().await;
        let body = json!({ "thread_id": thread_id, "content": "who am I" });

        let response = app
            .oneshot(json_request("POST", "/comments", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_thread_and_bad_body() {
        let (app, _) = app_with_thread().await;

        let uri = format!("/threads/{}/comments", Uuid::new_v4());
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");

        let response = app
            .oneshot(json_request(
                "POST",
                "/comments",
                Some(Uuid::new_v4()),
                json!({ "content": "no thread id" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
