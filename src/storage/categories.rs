use chrono::{DateTime, Utc};

use super::{Category, Db};
use crate::{
    error::Result,
    listing::{CategoryFilter, ListSpec, Page, fetch_page},
};

pub fn category_list_spec(filter: &CategoryFilter) -> ListSpec {
    ListSpec::new("categories", "c")
        .columns(&["id", "name", "slug", "description", "parent_id"])
        .contains("name", filter.name.as_deref())
        .paginate(&filter.pagination)
}

pub async fn list_categories(db: &Db, filter: &CategoryFilter) -> Result<Page<Category>> {
    fetch_page(db, &category_list_spec(filter), "categories").await
}

/// `小写名称（空格替换为下划线）_<毫秒时间戳>`
pub fn category_slug(name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        name.trim().to_lowercase().replace(' ', "_"),
        now.timestamp_millis()
    )
}

pub async fn find_category(db: &Db, id: i64) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, parent_id FROM categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(category)
}

/// 名称是否已被其它分类占用，`exclude` 为自身 id
pub async fn category_name_taken(db: &Db, name: &str, exclude: Option<i64>) -> Result<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM categories
            WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2)
        )
        "#,
    )
    .bind(name)
    .bind(exclude)
    .fetch_one(db)
    .await?;
    Ok(taken)
}

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

pub async fn insert_category(db: &Db, input: CategoryInput) -> Result<Category> {
    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, description, parent_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, slug, description, parent_id
        "#,
    )
    .bind(input.name)
    .bind(input.slug)
    .bind(input.description)
    .bind(input.parent_id)
    .fetch_one(db)
    .await?;
    Ok(category)
}

pub async fn update_category(db: &Db, id: i64, input: CategoryInput) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET name = $1, slug = $2, description = $3, parent_id = $4
        WHERE id = $5
        RETURNING id, name, slug, description, parent_id
        "#,
    )
    .bind(input.name)
    .bind(input.slug)
    .bind(input.description)
    .bind(input.parent_id)
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(category)
}

pub async fn delete_category(db: &Db, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
