use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use super::{Db, PostResponse, PostRow, like_target};
use crate::{
    error::Result,
    listing::{Includes, Join, ListSpec, Page, PostFilter, fetch_one, fetch_page},
};

/// 每位作者每个自然月最多发布的文章数
pub const MONTHLY_POST_LIMIT: i64 = 100;

const POST_COLUMNS: &[&str] = &[
    "id",
    "title",
    "slug",
    "content",
    "main_image_uri",
    "author_id",
    "category_id",
    "status",
    "created_at",
    "updated_at",
];

const AUTHOR_JOIN: Join = Join {
    table: "users",
    alias: "u",
    on: "u.id = p.author_id",
};

const CATEGORY_JOIN: Join = Join {
    table: "categories",
    alias: "c",
    on: "c.id = p.category_id",
};

const COMMENTS_JSON: &str = r#"(SELECT COALESCE(jsonb_agg(jsonb_build_object(
        'id', cm.id, 'userId', cm.user_id, 'content', cm.content, 'createdAt', cm.created_at
    ) ORDER BY cm.created_at DESC), '[]'::jsonb)
    FROM comments cm WHERE cm.post_id = p.id AND cm.parent_id IS NULL AND cm.status = 1)"#;

/// 文章列表查询
pub fn post_list_spec(filter: &PostFilter) -> ListSpec {
    let spec = ListSpec::new("posts", "p")
        .columns(POST_COLUMNS)
        .contains("title", filter.title.as_deref())
        .eq("category_id", filter.category_id)
        .eq("author_id", filter.author_id)
        .eq("status", filter.status)
        .paginate(&filter.pagination);

    with_includes(spec, filter.includes)
}

/// 按 slug 查询单篇文章，作者与点赞数总是包含
pub fn post_by_slug_spec(slug: &str, includes: Includes) -> ListSpec {
    let includes = Includes {
        author: true,
        likes: true,
        ..includes
    };
    let spec = ListSpec::new("posts", "p")
        .columns(POST_COLUMNS)
        .eq("slug", Some(slug))
        .limit(1);

    with_includes(spec, includes)
}

fn with_includes(mut spec: ListSpec, includes: Includes) -> ListSpec {
    if includes.author {
        spec = spec.left_join(AUTHOR_JOIN, "AuthorDetail", &["id", "name", "email"]);
    }
    if includes.category {
        spec = spec.left_join(
            CATEGORY_JOIN,
            "CategoryDetail",
            &["id", "name", "slug", "description", "parent_id"],
        );
    }
    if includes.likes {
        let like_count = format!(
            "(SELECT COUNT(*) FROM likes l WHERE l.target_type = {} AND l.target_id = p.id)",
            like_target::POST
        );
        spec = spec.project(like_count, "like_count");
    }
    if includes.comments {
        spec = spec.project(COMMENTS_JSON, "comments");
    }
    spec
}

pub async fn list_posts(db: &Db, filter: &PostFilter) -> Result<Page<PostResponse>> {
    let page = fetch_page::<PostRow>(db, &post_list_spec(filter), "posts").await?;
    Ok(page.map(PostResponse::from))
}

pub async fn find_post_by_slug(
    db: &Db,
    slug: &str,
    includes: Includes,
) -> Result<Option<PostResponse>> {
    let row = fetch_one::<PostRow>(db, &post_by_slug_spec(slug, includes)).await?;
    Ok(row.map(PostResponse::from))
}

/// 文章 id 与作者 id，用于归属校验
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct PostOwner {
    pub id: i64,
    pub author_id: i64,
}

pub async fn find_post_owner(db: &Db, slug: &str) -> Result<Option<PostOwner>> {
    let owner =
        sqlx::query_as::<_, PostOwner>("SELECT id, author_id FROM posts WHERE slug = $1 LIMIT 1")
            .bind(slug)
            .fetch_optional(db)
            .await?;
    Ok(owner)
}

/// 当前自然月内作者已发布的文章数
pub async fn count_posts_this_month(db: &Db, author_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM posts
        WHERE author_id = $1 AND created_at >= date_trunc('month', NOW())
        "#,
    )
    .bind(author_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// `小写标题（空格替换为下划线）-<毫秒时间戳>`
pub fn post_slug(title: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        title.trim().to_lowercase().replace(' ', "_"),
        now.timestamp_millis()
    )
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub main_image_uri: Option<String>,
    pub author_id: i64,
    pub category_id: i64,
    pub status: i16,
}

pub async fn insert_post(db: &Db, post: NewPost) -> Result<PostResponse> {
    let row = sqlx::query_as::<_, PostRow>(
        r#"
        INSERT INTO posts (title, slug, content, main_image_uri, author_id, category_id, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(post.title)
    .bind(post.slug)
    .bind(post.content)
    .bind(post.main_image_uri)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.status)
    .fetch_one(db)
    .await?;
    Ok(row.into())
}

#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<i16>,
}

pub fn update_post_query(id: i64, patch: &PostPatch) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE posts SET ");

    let mut set = builder.separated(", ");
    if let Some(title) = &patch.title {
        set.push("title = ").push_bind_unseparated(title.clone());
    }
    if let Some(content) = &patch.content {
        set.push("content = ").push_bind_unseparated(content.clone());
    }
    if let Some(status) = patch.status {
        set.push("status = ").push_bind_unseparated(status);
    }
    set.push("updated_at = NOW()");

    builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");
    builder
}

pub async fn update_post(db: &Db, id: i64, patch: &PostPatch) -> Result<PostResponse> {
    let mut query = update_post_query(id, patch);
    let row = query.build_query_as::<PostRow>().fetch_one(db).await?;
    Ok(row.into())
}

pub async fn delete_post(db: &Db, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
