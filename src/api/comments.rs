use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use validator::Validate;

use super::{ApiResponse, JsonBody, PathParam, QueryParams};
use crate::{
    auth::Claims,
    error::{Error, Result},
    listing::{ListParams, Page},
    state::AppState,
    storage::{
        Comment, CommentResponse, Db, SavedPostStore,
        comments::{self, NewComment},
    },
};

/// 评论路由
///
/// - `GET /posts/{post}/comments`：文章评论，`parent_id` 指定时返回其回复
/// - `POST /comments`
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/posts/{post}/comments", get(list))
        .route("/comments", post(create))
}

async fn list(
    State(db): State<Db>,
    PathParam(post_id): PathParam<i64>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Page<CommentResponse>>> {
    let page = comments::list_comments(&db, &params.comment_filter(post_id)).await?;
    Ok(ApiResponse::ok(page))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateComment {
    #[validate(range(min = 1, message = "postId is required"))]
    post_id: i64,
    parent_id: Option<i64>,
    #[validate(length(min = 1, message = "content is required"))]
    content: String,
}

async fn create(
    claims: Claims,
    State(db): State<Db>,
    JsonBody(req): JsonBody<CreateComment>,
) -> Result<ApiResponse<Comment>> {
    req.validate()?;

    if !db.post_exists(req.post_id).await? {
        return Err(Error::not_found("post not found"));
    }

    if let Some(parent_id) = req.parent_id {
        let parent = comments::find_comment(&db, parent_id).await?;
        if parent.is_none_or(|p| p.post_id != req.post_id) {
            return Err(Error::bad_request(
                "parent comment does not belong to this post",
            ));
        }
    }

    let comment = comments::insert_comment(
        &db,
        NewComment {
            post_id: req.post_id,
            user_id: claims.user_id,
            parent_id: req.parent_id,
            content: req.content,
        },
    )
    .await?;
    Ok(ApiResponse::created(comment).with_message("comment created"))
}
