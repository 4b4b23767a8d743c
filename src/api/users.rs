use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

use super::{ApiResponse, PathParam, QueryParams};
use crate::{
    auth::Claims,
    error::{Error, Result},
    listing::{ListParams, Page},
    state::AppState,
    storage::{Db, FollowEntry, UserProfile, UserSummary, users},
};

const USER_NOT_FOUND: &str = "user not found";

/// 用户与关注关系路由
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/{id}", get(by_id))
        .route("/users/{id}/follow", post(follow).delete(unfollow))
        .route("/users/{id}/followers", get(followers))
        .route("/users/{id}/following", get(following))
}

async fn list(
    State(db): State<Db>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Page<UserSummary>>> {
    let page = users::list_users(&db, &params.user_filter()).await?;
    Ok(ApiResponse::ok(page))
}

async fn by_id(
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = users::find_user_profile(&db, id)
        .await?
        .ok_or_else(|| Error::not_found(USER_NOT_FOUND))?;
    Ok(ApiResponse::ok(profile))
}

async fn follow(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<()>> {
    if claims.user_id == id {
        return Err(Error::bad_request("cannot follow yourself"));
    }
    if !users::user_exists(&db, id).await? {
        return Err(Error::not_found(USER_NOT_FOUND));
    }
    if users::is_following(&db, claims.user_id, id).await? {
        return Err(Error::conflict(users::ALREADY_FOLLOWING));
    }

    users::follow(&db, claims.user_id, id).await?;
    Ok(ApiResponse::done("user followed"))
}

async fn unfollow(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<()>> {
    if claims.user_id == id {
        return Err(Error::bad_request("cannot unfollow yourself"));
    }
    if !users::unfollow(&db, claims.user_id, id).await? {
        return Err(Error::not_found("not following this user"));
    }
    Ok(ApiResponse::done("user unfollowed"))
}

async fn followers(
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<Vec<FollowEntry>>> {
    if !users::user_exists(&db, id).await? {
        return Err(Error::not_found(USER_NOT_FOUND));
    }
    Ok(ApiResponse::ok(users::followers(&db, id).await?))
}

async fn following(
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<Vec<FollowEntry>>> {
    if !users::user_exists(&db, id).await? {
        return Err(Error::not_found(USER_NOT_FOUND));
    }
    Ok(ApiResponse::ok(users::following(&db, id).await?))
}
