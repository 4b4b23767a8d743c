use super::{Db, FollowEntry, UserProfile, UserSummary};
use crate::{
    error::{Error, Result},
    listing::{ListSpec, Page, UserFilter, fetch_page},
};

pub const ALREADY_FOLLOWING: &str = "already following this user";

/// 用户公开列，不包含密码
const USER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "username",
    "email",
    "bio",
    "profile_image_uri",
    "role",
    "status",
    "created_at",
];

pub fn user_list_spec(filter: &UserFilter) -> ListSpec {
    ListSpec::new("users", "u")
        .columns(USER_COLUMNS)
        .contains("email", filter.email.as_deref())
        .contains("username", filter.username.as_deref())
        .eq("role", filter.role)
        .paginate(&filter.pagination)
}

pub async fn list_users(db: &Db, filter: &UserFilter) -> Result<Page<UserSummary>> {
    fetch_page(db, &user_list_spec(filter), "users").await
}

pub async fn user_exists(db: &Db, id: i64) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(exists)
}

pub async fn find_user_profile(db: &Db, id: i64) -> Result<Option<UserProfile>> {
    let user = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, name, username, email, bio, profile_image_uri, role, status, created_at
        FROM users WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let (follower_count, following_count) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM followers WHERE following_id = $1),
            (SELECT COUNT(*) FROM followers WHERE follower_id = $1)
        "#,
    )
    .bind(id)
    .fetch_one(db)
    .await?;

    Ok(Some(UserProfile {
        user,
        follower_count,
        following_count,
    }))
}

pub async fn is_following(db: &Db, follower_id: i64, following_id: i64) -> Result<bool> {
    let following = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM followers WHERE follower_id = $1 AND following_id = $2)",
    )
    .bind(follower_id)
    .bind(following_id)
    .fetch_one(db)
    .await?;
    Ok(following)
}

pub async fn follow(db: &Db, follower_id: i64, following_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO followers (follower_id, following_id) VALUES ($1, $2)")
        .bind(follower_id)
        .bind(following_id)
        .execute(db)
        .await
        .map_err(Error::conflict_on_unique(ALREADY_FOLLOWING))?;
    Ok(())
}

pub async fn unfollow(db: &Db, follower_id: i64, following_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM followers WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 关注 `user_id` 的用户
pub async fn followers(db: &Db, user_id: i64) -> Result<Vec<FollowEntry>> {
    let entries = sqlx::query_as::<_, FollowEntry>(
        r#"
        SELECT u.id, u.name, u.username, u.email, u.profile_image_uri, u.bio,
               f.created_at AS followed_at
        FROM followers f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(entries)
}

/// `user_id` 关注的用户
pub async fn following(db: &Db, user_id: i64) -> Result<Vec<FollowEntry>> {
    let entries = sqlx::query_as::<_, FollowEntry>(
        r#"
        SELECT u.id, u.name, u.username, u.email, u.profile_image_uri, u.bio,
               f.created_at AS followed_at
        FROM followers f
        JOIN users u ON u.id = f.following_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(entries)
}
