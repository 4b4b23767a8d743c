use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// 文章状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum PostStatus {
    Inactive = 0,
    Draft = 1,
    Review = 2,
    Published = 3,
    Archived = 4,
}

impl TryFrom<i16> for PostStatus {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Inactive,
            1 => Self::Draft,
            2 => Self::Review,
            3 => Self::Published,
            4 => Self::Archived,
            other => return Err(other),
        })
    }
}

/// 点赞目标类型
pub mod like_target {
    pub const POST: i16 = 1;
    pub const COMMENT: i16 = 2;
}

/// 文章列表行
///
/// 关联数据按前缀平铺：`AuthorDetail_*`、`CategoryDetail_*`，
/// 未请求的列通过 `#[sqlx(default)]` 置空，再由 [`PostResponse`] 还原为嵌套对象。
#[derive(Debug, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub main_image_uri: Option<String>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[sqlx(rename = "AuthorDetail_id", default)]
    pub author_detail_id: Option<i64>,
    #[sqlx(rename = "AuthorDetail_name", default)]
    pub author_detail_name: Option<String>,
    #[sqlx(rename = "AuthorDetail_email", default)]
    pub author_detail_email: Option<String>,

    #[sqlx(rename = "CategoryDetail_id", default)]
    pub category_detail_id: Option<i64>,
    #[sqlx(rename = "CategoryDetail_name", default)]
    pub category_detail_name: Option<String>,
    #[sqlx(rename = "CategoryDetail_slug", default)]
    pub category_detail_slug: Option<String>,
    #[sqlx(rename = "CategoryDetail_description", default)]
    pub category_detail_description: Option<String>,
    #[sqlx(rename = "CategoryDetail_parent_id", default)]
    pub category_detail_parent_id: Option<i64>,

    #[sqlx(default)]
    pub like_count: Option<i64>,
    #[sqlx(default)]
    pub comments: Option<Json<Vec<CommentBrief>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetail {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBrief {
    pub id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub main_image_uri: Option<String>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub status: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_detail: Option<AuthorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_detail: Option<CategoryDetail>,
    pub like_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentBrief>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        let author_detail = match (row.author_detail_id, row.author_detail_name) {
            (Some(id), Some(name)) => Some(AuthorDetail {
                id,
                name,
                email: row.author_detail_email.unwrap_or_default(),
            }),
            _ => None,
        };

        let category_detail = match (
            row.category_detail_id,
            row.category_detail_name,
            row.category_detail_slug,
        ) {
            (Some(id), Some(name), Some(slug)) => Some(CategoryDetail {
                id,
                name,
                slug,
                description: row.category_detail_description,
                parent_id: row.category_detail_parent_id,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            main_image_uri: row.main_image_uri,
            author_id: row.author_id,
            category_id: row.category_id,
            status: row.status,
            author_detail,
            category_detail,
            like_count: row.like_count.unwrap_or_default(),
            comments: row.comments.map(|c| c.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// 用户公开信息，不含密码
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub profile_image_uri: Option<String>,
    pub role: i16,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserSummary,
    pub follower_count: i64,
    pub following_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FollowEntry {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub profile_image_uri: Option<String>,
    pub bio: Option<String>,
    pub followed_at: DateTime<Utc>,
}

/// 评论列表行，作者信息以 `UserDetail_*` 平铺
#[derive(Debug, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,

    #[sqlx(rename = "UserDetail_id", default)]
    pub user_detail_id: Option<i64>,
    #[sqlx(rename = "UserDetail_name", default)]
    pub user_detail_name: Option<String>,
    #[sqlx(rename = "UserDetail_username", default)]
    pub user_detail_username: Option<String>,
    #[sqlx(rename = "UserDetail_profile_image_uri", default)]
    pub user_detail_profile_image_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    pub profile_image_uri: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserBrief>,
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        let user = match (row.user_detail_id, row.user_detail_name) {
            (Some(id), Some(name)) => Some(UserBrief {
                id,
                name,
                username: row.user_detail_username,
                profile_image_uri: row.user_detail_profile_image_uri,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            parent_id: row.parent_id,
            content: row.content,
            status: row.status,
            created_at: row.created_at,
            user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

/// 阅读列表
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReadingList {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 带统计信息的阅读列表
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReadingListSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub list: ReadingList,
    pub total_posts: i64,
    pub unread_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReadingList {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub order_index: i32,
    pub is_default: bool,
}

/// 阅读列表的稀疏更新，`None` 表示不修改该字段
///
/// 可空字段使用 `Option<Option<T>>`：`Some(None)` 表示置空。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingListPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub order_index: Option<i32>,
}

impl ReadingListPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.color.is_none()
            && self.icon.is_none()
            && self.order_index.is_none()
    }
}

/// 保存的文章
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedPost {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub reading_list_id: i64,
    pub notes: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 被保存文章的快照，读取时实时计算
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedPostInfo {
    #[sqlx(rename = "post_id")]
    pub id: i64,
    #[sqlx(rename = "post_title")]
    pub title: String,
    #[sqlx(rename = "post_slug")]
    pub slug: String,
    #[sqlx(rename = "post_main_image_uri")]
    pub main_image_uri: Option<String>,
    #[sqlx(rename = "post_author_name")]
    pub author_name: String,
    #[sqlx(rename = "post_category_name")]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SavedPostEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub saved: SavedPost,
    #[sqlx(flatten)]
    pub post: SavedPostInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSavedPost {
    pub user_id: i64,
    pub post_id: i64,
    pub reading_list_id: i64,
    pub notes: Option<String>,
}

/// 已读状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// 标记已读，并记录阅读时间
    Read(DateTime<Utc>),
    /// 标记未读，清空阅读时间
    Unread,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedPostChange {
    pub notes: Option<Option<String>>,
    pub read_state: Option<ReadState>,
}

impl SavedPostChange {
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.read_state.is_none()
    }

    pub fn mark_read(at: DateTime<Utc>) -> Self {
        Self {
            notes: None,
            read_state: Some(ReadState::Read(at)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_row() -> PostRow {
        PostRow {
            id: 1,
            title: "Hello".into(),
            slug: "hello-1".into(),
            content: "body".into(),
            main_image_uri: None,
            author_id: 9,
            category_id: Some(5),
            status: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            author_detail_id: None,
            author_detail_name: None,
            author_detail_email: None,
            category_detail_id: None,
            category_detail_name: None,
            category_detail_slug: None,
            category_detail_description: None,
            category_detail_parent_id: None,
            like_count: None,
            comments: None,
        }
    }

    #[test]
    fn test_post_without_includes_has_no_nested_objects() {
        let resp = PostResponse::from(post_row());
        assert!(resp.author_detail.is_none());
        assert!(resp.category_detail.is_none());
        assert_eq!(resp.like_count, 0);

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("authorDetail").is_none());
        assert!(json.get("comments").is_none());
        assert_eq!(json["likeCount"], 0);
    }

    #[test]
    fn test_prefixed_columns_rebuild_nested_objects() {
        let mut row = post_row();
        row.author_detail_id = Some(9);
        row.author_detail_name = Some("Ayu".into());
        row.author_detail_email = Some("ayu@example.com".into());
        row.category_detail_id = Some(5);
        row.category_detail_name = Some("Tech".into());
        row.category_detail_slug = Some("tech_1".into());
        row.like_count = Some(4);

        let resp = PostResponse::from(row);
        assert_eq!(resp.author_detail.unwrap().name, "Ayu");
        assert_eq!(resp.category_detail.unwrap().slug, "tech_1");
        assert_eq!(resp.like_count, 4);
    }

    #[test]
    fn test_post_status_range() {
        assert_eq!(PostStatus::try_from(3), Ok(PostStatus::Published));
        assert_eq!(PostStatus::try_from(5), Err(5));
    }

    #[test]
    fn test_empty_patches() {
        assert!(ReadingListPatch::default().is_empty());
        assert!(SavedPostChange::default().is_empty());

        let patch = ReadingListPatch {
            description: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
