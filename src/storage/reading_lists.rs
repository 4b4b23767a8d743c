use std::future::Future;

use sqlx::{Postgres, QueryBuilder};

use super::{Db, NewReadingList, ReadingList, ReadingListPatch, ReadingListSummary};
use crate::error::{Error, Result};

pub const DUPLICATE_LIST_NAME: &str = "reading list with this name already exists";

/// 阅读列表的持久化接口
///
/// 所有查询都以 `user_id` 限定归属，不属于调用者的列表视为不存在。
pub trait ReadingListStore: Send + Sync {
    fn find_list(
        &self,
        user_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<Option<ReadingList>>> + Send;

    /// 按统计信息查询单个列表
    fn find_summary(
        &self,
        user_id: i64,
        list_id: i64,
    ) -> impl Future<Output = Result<Option<ReadingListSummary>>> + Send;

    /// 名称是否已被该用户的其它列表占用，`exclude` 为自身 id
    fn name_taken(
        &self,
        user_id: i64,
        name: &str,
        exclude: Option<i64>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// 按 `order_index` 升序、创建时间倒序返回所有列表
    fn list_summaries(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ReadingListSummary>>> + Send;

    fn find_default(&self, user_id: i64)
    -> impl Future<Output = Result<Option<ReadingList>>> + Send;

    /// 插入列表，名称冲突返回 [`Error::Conflict`]
    fn insert_list(&self, list: NewReadingList) -> impl Future<Output = Result<ReadingList>> + Send;

    /// 插入默认列表；已存在冲突行时不插入并返回 `None`
    fn insert_default(
        &self,
        user_id: i64,
        name: &str,
    ) -> impl Future<Output = Result<Option<ReadingList>>> + Send;

    fn update_list(
        &self,
        user_id: i64,
        list_id: i64,
        patch: &ReadingListPatch,
    ) -> impl Future<Output = Result<Option<ReadingList>>> + Send;

    fn delete_list(&self, user_id: i64, list_id: i64) -> impl Future<Output = Result<bool>> + Send;
}

const SUMMARY_SELECT: &str = r#"
    SELECT rl.id, rl.user_id, rl.name, rl.description, rl.is_default, rl.color, rl.icon,
           rl.order_index, rl.created_at, rl.updated_at,
           COUNT(sp.id) AS total_posts,
           COUNT(sp.id) FILTER (WHERE NOT sp.is_read) AS unread_count
    FROM reading_lists rl
    LEFT JOIN saved_posts sp ON sp.reading_list_id = rl.id
    "#;

/// 生成稀疏更新语句，只包含 `patch` 中出现的字段
pub fn update_list_query(
    user_id: i64,
    list_id: i64,
    patch: &ReadingListPatch,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE reading_lists SET ");

    let mut set = builder.separated(", ");
    if let Some(name) = &patch.name {
        set.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(description) = &patch.description {
        set.push("description = ")
            .push_bind_unseparated(description.clone());
    }
    if let Some(color) = &patch.color {
        set.push("color = ").push_bind_unseparated(color.clone());
    }
    if let Some(icon) = &patch.icon {
        set.push("icon = ").push_bind_unseparated(icon.clone());
    }
    if let Some(order_index) = patch.order_index {
        set.push("order_index = ").push_bind_unseparated(order_index);
    }
    set.push("updated_at = NOW()");

    builder
        .push(" WHERE id = ")
        .push_bind(list_id)
        .push(" AND user_id = ")
        .push_bind(user_id)
        .push(" RETURNING *");
    builder
}

impl ReadingListStore for Db {
    async fn find_list(&self, user_id: i64, list_id: i64) -> Result<Option<ReadingList>> {
        let list = sqlx::query_as::<_, ReadingList>(
            "SELECT * FROM reading_lists WHERE id = $1 AND user_id = $2",
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(self)
        .await?;
        Ok(list)
    }

    async fn find_summary(&self, user_id: i64, list_id: i64) -> Result<Option<ReadingListSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE rl.user_id = $1 AND rl.id = $2 GROUP BY rl.id");
        let summary = sqlx::query_as::<_, ReadingListSummary>(&sql)
            .bind(user_id)
            .bind(list_id)
            .fetch_optional(self)
            .await?;
        Ok(summary)
    }

    async fn name_taken(&self, user_id: i64, name: &str, exclude: Option<i64>) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reading_lists
                WHERE user_id = $1 AND name = $2
                AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(self)
        .await?;
        Ok(taken)
    }

    async fn list_summaries(&self, user_id: i64) -> Result<Vec<ReadingListSummary>> {
        let sql = format!(
            "{SUMMARY_SELECT} WHERE rl.user_id = $1 GROUP BY rl.id \
             ORDER BY rl.order_index ASC, rl.created_at DESC"
        );
        let lists = sqlx::query_as::<_, ReadingListSummary>(&sql)
            .bind(user_id)
            .fetch_all(self)
            .await?;
        Ok(lists)
    }

    async fn find_default(&self, user_id: i64) -> Result<Option<ReadingList>> {
        let list = sqlx::query_as::<_, ReadingList>(
            "SELECT * FROM reading_lists WHERE user_id = $1 AND is_default LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self)
        .await?;
        Ok(list)
    }

    async fn insert_list(&self, list: NewReadingList) -> Result<ReadingList> {
        sqlx::query_as::<_, ReadingList>(
            r#"
            INSERT INTO reading_lists
                (user_id, name, description, is_default, color, icon, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(list.user_id)
        .bind(list.name)
        .bind(list.description)
        .bind(list.is_default)
        .bind(list.color)
        .bind(list.icon)
        .bind(list.order_index)
        .fetch_one(self)
        .await
        .map_err(Error::conflict_on_unique(DUPLICATE_LIST_NAME))
    }

    async fn insert_default(&self, user_id: i64, name: &str) -> Result<Option<ReadingList>> {
        let list = sqlx::query_as::<_, ReadingList>(
            r#"
            INSERT INTO reading_lists (user_id, name, is_default, order_index)
            VALUES ($1, $2, TRUE, 0)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_optional(self)
        .await?;
        Ok(list)
    }

    async fn update_list(
        &self,
        user_id: i64,
        list_id: i64,
        patch: &ReadingListPatch,
    ) -> Result<Option<ReadingList>> {
        let mut query = update_list_query(user_id, list_id, patch);
        query
            .build_query_as::<ReadingList>()
            .fetch_optional(self)
            .await
            .map_err(Error::conflict_on_unique(DUPLICATE_LIST_NAME))
    }

    async fn delete_list(&self, user_id: i64, list_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reading_lists WHERE id = $1 AND user_id = $2")
            .bind(list_id)
            .bind(user_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_only_touches_supplied_fields() {
        let patch = ReadingListPatch {
            name: Some("Later".into()),
            icon: Some(None),
            ..Default::default()
        };

        assert_eq!(
            update_list_query(7, 3, &patch).sql(),
            "UPDATE reading_lists SET name = $1, icon = $2, updated_at = NOW() \
             WHERE id = $3 AND user_id = $4 RETURNING *"
        );
    }

    #[test]
    fn test_update_order_index_only() {
        let patch = ReadingListPatch {
            order_index: Some(2),
            ..Default::default()
        };
        let sql = update_list_query(1, 1, &patch).sql().to_string();

        assert!(sql.starts_with("UPDATE reading_lists SET order_index = $1, updated_at = NOW()"));
        assert!(!sql.contains("name ="));
    }
}
