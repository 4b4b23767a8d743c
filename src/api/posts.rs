use axum::{
    Router,
    extract::State,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use super::{ApiResponse, JsonBody, PathParam, QueryParams};
use crate::{
    auth::Claims,
    error::{Error, Result},
    listing::{ListParams, Page},
    state::AppState,
    storage::{
        Db, PostResponse, PostStatus,
        categories::find_category,
        posts::{self, MONTHLY_POST_LIMIT, NewPost, PostPatch},
    },
};

const POST_NOT_FOUND: &str = "post not found";

/// 文章路由
///
/// - `GET /posts`：分页列表，支持 `includes`
/// - `POST /posts`：创建文章
/// - `GET|PUT|DELETE /posts/{post}`，`post` 为 slug
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list).post(create))
        .route("/posts/{post}", get(by_slug).put(update).delete(delete))
}

async fn list(
    State(db): State<Db>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Page<PostResponse>>> {
    let page = posts::list_posts(&db, &params.post_filter()).await?;
    Ok(ApiResponse::ok(page))
}

async fn by_slug(
    State(db): State<Db>,
    PathParam(slug): PathParam<String>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<PostResponse>> {
    let post = posts::find_post_by_slug(&db, &slug, params.includes())
        .await?
        .ok_or_else(|| Error::not_found(POST_NOT_FOUND))?;
    Ok(ApiResponse::ok(post))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreatePost {
    #[validate(length(min = 1, max = 255, message = "title is required"))]
    title: String,
    #[validate(length(min = 1, message = "content is required"))]
    content: String,
    #[validate(range(min = 1, message = "categoryId is required"))]
    category_id: i64,
    img_url: Option<String>,
}

async fn create(
    claims: Claims,
    State(db): State<Db>,
    JsonBody(req): JsonBody<CreatePost>,
) -> Result<ApiResponse<PostResponse>> {
    req.validate()?;

    if find_category(&db, req.category_id).await?.is_none() {
        return Err(Error::not_found("category not found"));
    }

    if posts::count_posts_this_month(&db, claims.user_id).await? >= MONTHLY_POST_LIMIT {
        return Err(Error::bad_request("monthly post limit reached"));
    }

    let slug = posts::post_slug(&req.title, Utc::now());
    let post = posts::insert_post(
        &db,
        NewPost {
            title: req.title,
            slug,
            content: req.content,
            main_image_uri: req.img_url.filter(|u| !u.is_empty()),
            author_id: claims.user_id,
            category_id: req.category_id,
            status: PostStatus::Inactive as i16,
        },
    )
    .await?;

    tracing::info!(post_id = post.id, slug = %post.slug, "post created");
    Ok(ApiResponse::created(post).with_message("post created"))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdatePost {
    #[validate(length(min = 1, max = 255))]
    title: Option<String>,
    #[validate(length(min = 1))]
    content: Option<String>,
    status: i16,
}

/// 只有作者本人可以修改
async fn update(
    claims: Claims,
    State(db): State<Db>,
    PathParam(slug): PathParam<String>,
    JsonBody(req): JsonBody<UpdatePost>,
) -> Result<ApiResponse<PostResponse>> {
    req.validate()?;
    PostStatus::try_from(req.status).map_err(|_| Error::bad_request("invalid post status"))?;

    let owner = posts::find_post_owner(&db, &slug)
        .await?
        .ok_or_else(|| Error::not_found(POST_NOT_FOUND))?;
    if owner.author_id != claims.user_id {
        return Err(Error::forbidden("only the author can modify this post"));
    }

    let patch = PostPatch {
        title: req.title,
        content: req.content,
        status: Some(req.status),
    };
    let post = posts::update_post(&db, owner.id, &patch).await?;
    Ok(ApiResponse::ok(post).with_message("post updated"))
}

async fn delete(
    claims: Claims,
    State(db): State<Db>,
    PathParam(slug): PathParam<String>,
) -> Result<ApiResponse<()>> {
    let owner = posts::find_post_owner(&db, &slug)
        .await?
        .ok_or_else(|| Error::not_found(POST_NOT_FOUND))?;
    if owner.author_id != claims.user_id {
        return Err(Error::forbidden("only the author can delete this post"));
    }

    posts::delete_post(&db, owner.id).await?;
    tracing::info!(post_id = owner.id, "post deleted");
    Ok(ApiResponse::done("post deleted"))
}
