use std::future::Future;

use sqlx::{Postgres, QueryBuilder};

use super::{Db, NewSavedPost, ReadState, SavedPost, SavedPostChange, SavedPostEntry};
use crate::error::{Error, Result};

pub const ALREADY_SAVED: &str = "post already saved in this reading list";

/// 保存文章的持久化接口
pub trait SavedPostStore: Send + Sync {
    fn post_exists(&self, post_id: i64) -> impl Future<Output = Result<bool>> + Send;

    fn find_saved(
        &self,
        user_id: i64,
        saved_id: i64,
    ) -> impl Future<Output = Result<Option<SavedPost>>> + Send;

    /// 按 `(user_id, post_id, reading_list_id)` 查询
    fn find_saved_in_list(
        &self,
        user_id: i64,
        post_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<Option<SavedPost>>> + Send;

    /// 插入保存记录，三元组冲突返回 [`Error::Conflict`]
    fn insert_saved(&self, saved: NewSavedPost) -> impl Future<Output = Result<SavedPost>> + Send;

    /// 列表中的全部保存记录，附带文章快照
    fn list_entries(
        &self,
        user_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<Vec<SavedPostEntry>>> + Send;

    /// 列表中的全部保存记录，不含文章信息
    fn list_saved(
        &self,
        user_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<Vec<SavedPost>>> + Send;

    fn update_saved(
        &self,
        user_id: i64,
        saved_id: i64,
        change: &SavedPostChange,
    ) -> impl Future<Output = Result<Option<SavedPost>>> + Send;

    fn delete_saved(&self, user_id: i64, saved_id: i64)
    -> impl Future<Output = Result<bool>> + Send;

    fn delete_saved_in_list(
        &self,
        user_id: i64,
        post_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// 生成稀疏更新语句
///
/// 已读时同时写入 `read_at`，未读时将其置空，两者总是一起变化。
pub fn update_saved_query(
    user_id: i64,
    saved_id: i64,
    change: &SavedPostChange,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE saved_posts SET ");

    let mut set = builder.separated(", ");
    if let Some(notes) = &change.notes {
        set.push("notes = ").push_bind_unseparated(notes.clone());
    }
    match change.read_state {
        Some(ReadState::Read(at)) => {
            set.push("is_read = TRUE");
            set.push("read_at = ").push_bind_unseparated(at);
        }
        Some(ReadState::Unread) => {
            set.push("is_read = FALSE");
            set.push("read_at = NULL");
        }
        None => {}
    }
    set.push("updated_at = NOW()");

    builder
        .push(" WHERE id = ")
        .push_bind(saved_id)
        .push(" AND user_id = ")
        .push_bind(user_id)
        .push(" RETURNING *");
    builder
}

impl SavedPostStore for Db {
    async fn post_exists(&self, post_id: i64) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
                .bind(post_id)
                .fetch_one(self)
                .await?;
        Ok(exists)
    }

    async fn find_saved(&self, user_id: i64, saved_id: i64) -> Result<Option<SavedPost>> {
        let saved = sqlx::query_as::<_, SavedPost>(
            "SELECT * FROM saved_posts WHERE id = $1 AND user_id = $2",
        )
        .bind(saved_id)
        .bind(user_id)
        .fetch_optional(self)
        .await?;
        Ok(saved)
    }

    async fn find_saved_in_list(
        &self,
        user_id: i64,
        post_id: i64,
        list_id: i64,
    ) -> Result<Option<SavedPost>> {
        let saved = sqlx::query_as::<_, SavedPost>(
            r#"
            SELECT * FROM saved_posts
            WHERE user_id = $1 AND post_id = $2 AND reading_list_id = $3
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(list_id)
        .fetch_optional(self)
        .await?;
        Ok(saved)
    }

    async fn insert_saved(&self, saved: NewSavedPost) -> Result<SavedPost> {
        sqlx::query_as::<_, SavedPost>(
            r#"
            INSERT INTO saved_posts (user_id, post_id, reading_list_id, notes, is_read)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(saved.user_id)
        .bind(saved.post_id)
        .bind(saved.reading_list_id)
        .bind(saved.notes)
        .fetch_one(self)
        .await
        .map_err(Error::conflict_on_unique(ALREADY_SAVED))
    }

    async fn list_entries(&self, user_id: i64, list_id: i64) -> Result<Vec<SavedPostEntry>> {
        let entries = sqlx::query_as::<_, SavedPostEntry>(
            r#"
            SELECT sp.id, sp.user_id, sp.post_id, sp.reading_list_id, sp.notes,
                   sp.is_read, sp.read_at, sp.created_at, sp.updated_at,
                   p.title AS post_title,
                   p.slug AS post_slug,
                   p.main_image_uri AS post_main_image_uri,
                   u.name AS post_author_name,
                   c.name AS post_category_name
            FROM saved_posts sp
            JOIN posts p ON p.id = sp.post_id
            JOIN users u ON u.id = p.author_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE sp.user_id = $1 AND sp.reading_list_id = $2
            ORDER BY sp.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(list_id)
        .fetch_all(self)
        .await?;
        Ok(entries)
    }

    async fn list_saved(&self, user_id: i64, list_id: i64) -> Result<Vec<SavedPost>> {
        let saved = sqlx::query_as::<_, SavedPost>(
            r#"
            SELECT * FROM saved_posts
            WHERE user_id = $1 AND reading_list_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(list_id)
        .fetch_all(self)
        .await?;
        Ok(saved)
    }

    async fn update_saved(
        &self,
        user_id: i64,
        saved_id: i64,
        change: &SavedPostChange,
    ) -> Result<Option<SavedPost>> {
        let mut query = update_saved_query(user_id, saved_id, change);
        let saved = query
            .build_query_as::<SavedPost>()
            .fetch_optional(self)
            .await?;
        Ok(saved)
    }

    async fn delete_saved(&self, user_id: i64, saved_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_posts WHERE id = $1 AND user_id = $2")
            .bind(saved_id)
            .bind(user_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_saved_in_list(&self, user_id: i64, post_id: i64, list_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM saved_posts WHERE user_id = $1 AND post_id = $2 AND reading_list_id = $3",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(list_id)
        .execute(self)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
