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
        Category, Db,
        categories::{self, CategoryInput},
    },
};

const CATEGORY_NOT_FOUND: &str = "category not found";
const DUPLICATE_CATEGORY: &str = "category with this name already exists";

/// 分类路由，修改操作需要编辑或管理员角色
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{id}", get(by_id).put(update).delete(delete))
}

fn require_manager(claims: &Claims) -> Result<()> {
    if claims.can_manage_categories() {
        Ok(())
    } else {
        Err(Error::forbidden("only editors and admins can manage categories"))
    }
}

async fn list(
    State(db): State<Db>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<ApiResponse<Page<Category>>> {
    let page = categories::list_categories(&db, &params.category_filter()).await?;
    Ok(ApiResponse::ok(page))
}

async fn by_id(
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<Category>> {
    let category = categories::find_category(&db, id)
        .await?
        .ok_or_else(|| Error::not_found(CATEGORY_NOT_FOUND))?;
    Ok(ApiResponse::ok(category))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CategoryRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: String,
    description: Option<String>,
    parent_id: Option<i64>,
}

impl CategoryRequest {
    fn into_input(self) -> CategoryInput {
        CategoryInput {
            slug: categories::category_slug(&self.name, Utc::now()),
            name: self.name,
            description: self.description,
            parent_id: self.parent_id,
        }
    }
}

async fn create(
    claims: Claims,
    State(db): State<Db>,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<ApiResponse<Category>> {
    require_manager(&claims)?;
    req.validate()?;

    if categories::category_name_taken(&db, &req.name, None).await? {
        return Err(Error::conflict(DUPLICATE_CATEGORY));
    }

    let category = categories::insert_category(&db, req.into_input()).await?;
    Ok(ApiResponse::created(category).with_message("category created"))
}

/// 名称变化时重新生成 slug
async fn update(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> Result<ApiResponse<Category>> {
    require_manager(&claims)?;
    req.validate()?;

    let existing = categories::find_category(&db, id)
        .await?
        .ok_or_else(|| Error::not_found(CATEGORY_NOT_FOUND))?;
    if categories::category_name_taken(&db, &req.name, Some(id)).await? {
        return Err(Error::conflict(DUPLICATE_CATEGORY));
    }

    let mut input = req.into_input();
    if input.name == existing.name {
        input.slug = existing.slug;
    }

    let category = categories::update_category(&db, id, input)
        .await?
        .ok_or_else(|| Error::not_found(CATEGORY_NOT_FOUND))?;
    Ok(ApiResponse::ok(category).with_message("category updated"))
}

async fn delete(
    claims: Claims,
    State(db): State<Db>,
    PathParam(id): PathParam<i64>,
) -> Result<ApiResponse<()>> {
    require_manager(&claims)?;

    if !categories::delete_category(&db, id).await? {
        return Err(Error::not_found(CATEGORY_NOT_FOUND));
    }
    Ok(ApiResponse::done("category deleted"))
}
