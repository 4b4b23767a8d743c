use super::{Comment, CommentResponse, CommentRow, Db};
use crate::{
    error::Result,
    listing::{CommentFilter, Join, ListSpec, Page, fetch_page},
};

/// 评论默认状态：可见
pub const COMMENT_ACTIVE: i16 = 1;

/// 评论列表查询
///
/// 指定 `parent_id` 时只返回其回复，否则只返回顶层评论。
pub fn comment_list_spec(filter: &CommentFilter) -> ListSpec {
    let spec = ListSpec::new("comments", "cm")
        .columns(&[
            "id",
            "post_id",
            "user_id",
            "parent_id",
            "content",
            "status",
            "created_at",
        ])
        .left_join(
            Join {
                table: "users",
                alias: "u",
                on: "u.id = cm.user_id",
            },
            "UserDetail",
            &["id", "name", "username", "profile_image_uri"],
        )
        .eq("post_id", Some(filter.post_id))
        .paginate(&filter.pagination);

    match filter.parent_id {
        Some(parent_id) => spec.eq("parent_id", Some(parent_id)),
        None => spec.is_null("parent_id"),
    }
}

pub async fn list_comments(db: &Db, filter: &CommentFilter) -> Result<Page<CommentResponse>> {
    let page = fetch_page::<CommentRow>(db, &comment_list_spec(filter), "comments").await?;
    Ok(page.map(CommentResponse::from))
}

pub async fn find_comment(db: &Db, id: i64) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, user_id, parent_id, content, status, created_at
        FROM comments WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(comment)
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

pub async fn insert_comment(db: &Db, comment: NewComment) -> Result<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, parent_id, content, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, post_id, user_id, parent_id, content, status, created_at
        "#,
    )
    .bind(comment.post_id)
    .bind(comment.user_id)
    .bind(comment.parent_id)
    .bind(comment.content)
    .bind(COMMENT_ACTIVE)
    .fetch_one(db)
    .await?;
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Pagination;

    fn filter(parent_id: Option<i64>) -> CommentFilter {
        CommentFilter {
            post_id: 12,
            parent_id,
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn test_top_level_comments_by_default() {
        let spec = comment_list_spec(&filter(None));
        assert_eq!(
            spec.count_query().sql(),
            "SELECT COUNT(*) FROM comments cm WHERE cm.post_id = $1 AND cm.parent_id IS NULL"
        );
    }

    #[test]
    fn test_replies_of_parent() {
        let spec = comment_list_spec(&filter(Some(4)));
        let sql = spec.page_query().unwrap().sql().to_string();

        assert!(sql.contains("WHERE cm.post_id = $1 AND cm.parent_id = $2"));
        assert!(sql.contains(r#"u.username AS "UserDetail_username""#));
        assert!(sql.contains("ORDER BY cm.created_at DESC"));
    }
}
