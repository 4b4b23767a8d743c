use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, JsonBody, PathParam, QueryParams};
use crate::{
    auth::Claims,
    error::Result,
    reading::{
        CreateReadingList, CreateSavedPost, ReadingLists, SavedPosts, UpdateReadingList,
        UpdateSavedPost,
    },
    state::AppState,
    storage::{Db, ReadingList, ReadingListSummary, SavedPost, SavedPostEntry},
};

/// 阅读列表与保存文章路由，均需要身份
///
/// - `POST|GET /reading-lists`
/// - `GET|PUT|DELETE /reading-lists/{id}`
/// - `GET /reading-lists/{id}/saved-posts`
/// - `POST /reading-lists/{id}/mark-all-read`
/// - `POST|DELETE /reading-lists/saved-posts`
/// - `PUT|DELETE /reading-lists/saved-posts/{id}`
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/reading-lists", post(create_list).get(lists))
        .route(
            "/reading-lists/saved-posts",
            post(save_post).delete(unsave_post),
        )
        .route(
            "/reading-lists/saved-posts/{id}",
            put(update_saved).delete(delete_saved),
        )
        .route(
            "/reading-lists/{id}",
            get(list_by_id).put(update_list).delete(delete_list),
        )
        .route("/reading-lists/{id}/saved-posts", get(saved_posts))
        .route("/reading-lists/{id}/mark-all-read", post(mark_all_read))
}

async fn create_list(
    claims: Claims,
    State(db): State<Db>,
    JsonBody(req): JsonBody<CreateReadingList>,
) -> Result<ApiResponse<ReadingList>> {
    let list = ReadingLists::new(db).create(claims.user_id, req).await?;
    Ok(ApiResponse::created(list).with_message("reading list created"))
}

async fn lists(claims: Claims, State(db): State<Db>) -> Result<ApiResponse<Vec<ReadingListSummary>>> {
    let lists = ReadingLists::new(db).list(claims.user_id).await?;
    Ok(ApiResponse::ok(lists))
}

async fn list_by_id(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<ReadingListSummary>> {
    let list = ReadingLists::new(db).get(claims.user_id, id).await?;
    Ok(ApiResponse::ok(list))
}

async fn update_list(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateReadingList>,
) -> Result<ApiResponse<ReadingList>> {
    let list = ReadingLists::new(db)
        .update(claims.user_id, id, req)
        .await?;
    Ok(ApiResponse::ok(list).with_message("reading list updated"))
}

async fn delete_list(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<()>> {
    ReadingLists::new(db).delete(claims.user_id, id).await?;
    Ok(ApiResponse::done("reading list deleted"))
}

async fn saved_posts(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<Vec<SavedPostEntry>>> {
    let entries = SavedPosts::new(db).list(claims.user_id, id).await?;
    Ok(ApiResponse::ok(entries))
}

async fn save_post(
    claims: Claims,
    State(db): State<Db>,
    JsonBody(req): JsonBody<CreateSavedPost>,
) -> Result<ApiResponse<SavedPost>> {
    let saved = SavedPosts::new(db).create(claims.user_id, req).await?;
    Ok(ApiResponse::created(saved).with_message("post saved"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsaveParams {
    post_id: i64,
    reading_list_id: i64,
}

async fn unsave_post(
    claims: Claims,
    State(db): State<Db>,
    QueryParams(params): QueryParams<UnsaveParams>,
) -> Result<ApiResponse<()>> {
    SavedPosts::new(db)
        .delete_in_list(claims.user_id, params.post_id, params.reading_list_id)
        .await?;
    Ok(ApiResponse::done("saved post removed"))
}

async fn update_saved(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateSavedPost>,
) -> Result<ApiResponse<SavedPost>> {
    let saved = SavedPosts::new(db).update(claims.user_id, id, req).await?;
    Ok(ApiResponse::ok(saved).with_message("saved post updated"))
}

async fn delete_saved(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<()>> {
    SavedPosts::new(db).delete(claims.user_id, id).await?;
    Ok(ApiResponse::done("saved post removed"))
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    marked: u64,
}

async fn mark_all_read(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<MarkedRead>> {
    let marked = SavedPosts::new(db)
        .mark_all_as_read(claims.user_id, id)
        .await?;
    Ok(ApiResponse::ok(MarkedRead { marked }).with_message("all posts marked as read"))
}
