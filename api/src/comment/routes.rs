use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::App;

use super::{
    create::create_comment, delete::delete_comment, get::get_comments, patch::patch_comment,
};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/threads/{thread_id}/comments", get(get_comments))
        .route("/comments", post(create_comment))
        .route("/comments/{id}", patch(patch_comment).delete(delete_comment))
}
