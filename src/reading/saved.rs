use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use super::{LIST_NOT_FOUND, NO_CHANGES, double_option};
use crate::{
    error::{Error, Result},
    storage::{
        ALREADY_SAVED, NewSavedPost, ReadState, ReadingListStore, SavedPost, SavedPostChange,
        SavedPostEntry, SavedPostStore,
    },
};

const SAVED_NOT_FOUND: &str = "saved post not found";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSavedPost {
    #[validate(range(min = 1, message = "postId is required"))]
    pub post_id: i64,
    #[validate(range(min = 1, message = "readingListId is required"))]
    pub reading_list_id: i64,
    pub notes: Option<String>,
}

/// 保存记录的稀疏更新
///
/// `readAt` 只能和 `isRead: true` 一起出现，未给出时使用当前时间。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSavedPost {
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub is_read: Option<bool>,
    pub read_at: Option<DateTime<Utc>>,
}

impl UpdateSavedPost {
    fn into_change(self, now: DateTime<Utc>) -> Result<SavedPostChange> {
        let read_state = match (self.is_read, self.read_at) {
            (Some(true), read_at) => Some(ReadState::Read(read_at.unwrap_or(now))),
            (Some(false), None) => Some(ReadState::Unread),
            (_, Some(_)) => {
                return Err(Error::bad_request(
                    "readAt can only be set together with isRead=true",
                ));
            }
            (None, None) => None,
        };

        Ok(SavedPostChange {
            notes: self.notes,
            read_state,
        })
    }
}

/// 保存文章管理
pub struct SavedPosts<S> {
    store: S,
}

impl<S: ReadingListStore + SavedPostStore> SavedPosts<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn ensure_list(&self, user_id: i64, list_id: i64) -> Result<()> {
        match self.store.find_list(user_id, list_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(LIST_NOT_FOUND)),
        }
    }

    /// 保存文章到列表
    ///
    /// 预检查只用于给出明确的错误，重复保存最终由存储层的唯一约束拦截。
    #[instrument(name = "save post", skip(self, req), fields(post_id = req.post_id, list_id = req.reading_list_id))]
    pub async fn create(&self, user_id: i64, req: CreateSavedPost) -> Result<SavedPost> {
        req.validate()?;

        if !self.store.post_exists(req.post_id).await? {
            return Err(Error::not_found("post not found"));
        }
        self.ensure_list(user_id, req.reading_list_id).await?;

        if self
            .store
            .find_saved_in_list(user_id, req.post_id, req.reading_list_id)
            .await?
            .is_some()
        {
            return Err(Error::conflict(ALREADY_SAVED));
        }

        let saved = self
            .store
            .insert_saved(NewSavedPost {
                user_id,
                post_id: req.post_id,
                reading_list_id: req.reading_list_id,
                notes: req.notes,
            })
            .await?;

        tracing::info!(saved_id = saved.id, "post saved");
        Ok(saved)
    }

    /// 列表中的保存记录，文章信息在读取时实时关联
    #[instrument(name = "list saved posts", skip(self))]
    pub async fn list(&self, user_id: i64, list_id: i64) -> Result<Vec<SavedPostEntry>> {
        self.ensure_list(user_id, list_id).await?;
        self.store.list_entries(user_id, list_id).await
    }

    #[instrument(name = "update saved post", skip(self, req))]
    pub async fn update(
        &self,
        user_id: i64,
        saved_id: i64,
        req: UpdateSavedPost,
    ) -> Result<SavedPost> {
        if self.store.find_saved(user_id, saved_id).await?.is_none() {
            return Err(Error::not_found(SAVED_NOT_FOUND));
        }

        let change = req.into_change(Utc::now())?;
        if change.is_empty() {
            return Err(Error::bad_request(NO_CHANGES));
        }

        self.store
            .update_saved(user_id, saved_id, &change)
            .await?
            .ok_or_else(|| Error::not_found(SAVED_NOT_FOUND))
    }

    #[instrument(name = "delete saved post", skip(self))]
    pub async fn delete(&self, user_id: i64, saved_id: i64) -> Result<()> {
        if !self.store.delete_saved(user_id, saved_id).await? {
            return Err(Error::not_found(SAVED_NOT_FOUND));
        }
        Ok(())
    }

    #[instrument(name = "unsave post", skip(self))]
    pub async fn delete_in_list(&self, user_id: i64, post_id: i64, list_id: i64) -> Result<()> {
        if !self
            .store
            .delete_saved_in_list(user_id, post_id, list_id)
            .await?
        {
            return Err(Error::not_found(SAVED_NOT_FOUND));
        }
        Ok(())
    }

    /// 将列表中所有未读记录标记为已读，返回实际迁移的条数
    ///
    /// 逐条更新，遇到第一个失败立即返回；之前已完成的更新不会回滚。
    /// 已读记录不会被再次写入，重复调用返回 0。
    #[instrument(name = "mark all read", skip(self))]
    pub async fn mark_all_as_read(&self, user_id: i64, list_id: i64) -> Result<u64> {
        self.ensure_list(user_id, list_id).await?;

        let saved = self.store.list_saved(user_id, list_id).await?;
        let change = SavedPostChange::mark_read(Utc::now());

        let mut marked = 0;
        for entry in saved.iter().filter(|s| !s.is_read) {
            if self
                .store
                .update_saved(user_id, entry.id, &change)
                .await?
                .is_some()
            {
                marked += 1;
            }
        }

        tracing::info!(marked, "saved posts marked as read");
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::reading::{CreateReadingList, ReadingLists, memory::MemoryStore};

    struct Fixture {
        store: MemoryStore,
        saved: SavedPosts<MemoryStore>,
        list_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::default();
        store.add_post(10, "First");
        store.add_post(11, "Second");
        store.add_post(12, "Third");

        let list = ReadingLists::new(store.clone())
            .create(
                1,
                CreateReadingList {
                    name: "Tech".into(),
                    description: None,
                    color: None,
                    icon: None,
                    order_index: 0,
                },
            )
            .await
            .unwrap();

        Fixture {
            saved: SavedPosts::new(store.clone()),
            store,
            list_id: list.id,
        }
    }

    fn save(post_id: i64, list_id: i64) -> CreateSavedPost {
        CreateSavedPost {
            post_id,
            reading_list_id: list_id,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_new_saved_post_is_unread() {
        let f = fixture().await;
        let saved = f.saved.create(1, save(10, f.list_id)).await.unwrap();

        assert!(!saved.is_read);
        assert_eq!(saved.read_at, None);
    }

    #[tokio::test]
    async fn test_duplicate_triple_is_rejected() {
        let f = fixture().await;
        let first = f.saved.create(1, save(10, f.list_id)).await.unwrap();

        let err = f.saved.create(1, save(10, f.list_id)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(f.store.saved(first.id), Some(first));
    }

    #[tokio::test]
    async fn test_store_constraint_catches_race() {
        let f = fixture().await;
        f.saved.create(1, save(10, f.list_id)).await.unwrap();

        // 预检查看不到已有记录，模拟两个请求同时通过检查
        f.store.hide_saved_lookups(true);
        let err = f.saved.create(1, save(10, f.list_id)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(f.store.saved_count(), 1);
    }

    #[tokio::test]
    async fn test_same_post_in_different_lists() {
        let f = fixture().await;
        let default = ReadingLists::new(f.store.clone())
            .get_or_create_default(1)
            .await
            .unwrap();

        f.saved.create(1, save(10, f.list_id)).await.unwrap();
        f.saved.create(1, save(10, default.id)).await.unwrap();
        assert_eq!(f.store.saved_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_post_or_foreign_list() {
        let f = fixture().await;

        let err = f.saved.create(1, save(99, f.list_id)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // 列表属于用户 1
        let err = f.saved.create(2, save(10, f.list_id)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(
            f.saved.list(2, f.list_id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_carries_post_snapshot() {
        let f = fixture().await;
        f.saved.create(1, save(11, f.list_id)).await.unwrap();

        let entries = f.saved.list(1, f.list_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].post.title, "Second");

        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["postId"], 11);
        assert_eq!(json["post"]["title"], "Second");
    }

    #[tokio::test]
    async fn test_read_transitions() {
        let f = fixture().await;
        let saved = f.saved.create(1, save(10, f.list_id)).await.unwrap();

        let read = UpdateSavedPost {
            is_read: Some(true),
            ..Default::default()
        };
        let updated = f.saved.update(1, saved.id, read).await.unwrap();
        assert!(updated.is_read);
        assert!(updated.read_at.is_some());

        let unread = UpdateSavedPost {
            is_read: Some(false),
            ..Default::default()
        };
        let updated = f.saved.update(1, saved.id, unread).await.unwrap();
        assert!(!updated.is_read);
        assert_eq!(updated.read_at, None);
    }

    #[tokio::test]
    async fn test_explicit_read_at_is_kept() {
        let f = fixture().await;
        let saved = f.saved.create(1, save(10, f.list_id)).await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        let req: UpdateSavedPost = serde_json::from_value(serde_json::json!({
            "isRead": true,
            "readAt": "2024-05-01T08:30:00Z",
        }))
        .unwrap();
        let updated = f.saved.update(1, saved.id, req).await.unwrap();
        assert_eq!(updated.read_at, Some(at));

        let orphan = UpdateSavedPost {
            read_at: Some(at),
            ..Default::default()
        };
        assert!(matches!(
            f.saved.update(1, saved.id, orphan).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_notes_only_update_keeps_read_state() {
        let f = fixture().await;
        let saved = f.saved.create(1, save(10, f.list_id)).await.unwrap();

        let req: UpdateSavedPost = serde_json::from_str(r#"{"notes": "chapter 3"}"#).unwrap();
        let updated = f.saved.update(1, saved.id, req).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("chapter 3"));
        assert!(!updated.is_read);

        let req: UpdateSavedPost = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        let updated = f.saved.update(1, saved.id, req).await.unwrap();
        assert_eq!(updated.notes, None);
    }

    #[tokio::test]
    async fn test_empty_update_and_missing_row() {
        let f = fixture().await;
        let saved = f.saved.create(1, save(10, f.list_id)).await.unwrap();

        assert!(matches!(
            f.saved.update(1, saved.id, UpdateSavedPost::default()).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            f.saved.update(2, saved.id, UpdateSavedPost::default()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deletes_report_missing_rows() {
        let f = fixture().await;
        let a = f.saved.create(1, save(10, f.list_id)).await.unwrap();
        f.saved.create(1, save(11, f.list_id)).await.unwrap();

        assert!(matches!(
            f.saved.delete(2, a.id).await,
            Err(Error::NotFound(_))
        ));
        f.saved.delete(1, a.id).await.unwrap();
        assert!(matches!(
            f.saved.delete(1, a.id).await,
            Err(Error::NotFound(_))
        ));

        f.saved.delete_in_list(1, 11, f.list_id).await.unwrap();
        assert!(matches!(
            f.saved.delete_in_list(1, 11, f.list_id).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(f.store.saved_count(), 0);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_is_idempotent() {
        let f = fixture().await;
        for post_id in [10, 11, 12] {
            f.saved.create(1, save(post_id, f.list_id)).await.unwrap();
        }
        let already = f.saved.list(1, f.list_id).await.unwrap()[0].saved.id;
        f.saved
            .update(
                1,
                already,
                UpdateSavedPost {
                    is_read: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let writes_before = f.store.saved_updates();
        assert_eq!(f.saved.mark_all_as_read(1, f.list_id).await.unwrap(), 2);
        assert_eq!(f.store.saved_updates() - writes_before, 2);

        let entries = f.saved.list(1, f.list_id).await.unwrap();
        assert!(entries.iter().all(|e| e.saved.is_read && e.saved.read_at.is_some()));

        // 再次调用不产生任何写入
        assert_eq!(f.saved.mark_all_as_read(1, f.list_id).await.unwrap(), 0);
        assert_eq!(f.store.saved_updates() - writes_before, 2);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_stops_at_first_failure() {
        let f = fixture().await;
        for post_id in [10, 11, 12] {
            f.saved.create(1, save(post_id, f.list_id)).await.unwrap();
        }

        f.store.fail_saved_updates_after(1);
        let err = f.saved.mark_all_as_read(1, f.list_id).await.unwrap_err();
        assert!(matches!(err, Error::Sqlx(_)));

        // 第一条已写入且不会回滚
        let read = f
            .saved
            .list(1, f.list_id)
            .await
            .unwrap()
            .iter()
            .filter(|e| e.saved.is_read)
            .count();
        assert_eq!(read, 1);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_on_foreign_list() {
        let f = fixture().await;
        assert!(matches!(
            f.saved.mark_all_as_read(2, f.list_id).await,
            Err(Error::NotFound(_))
        ));
    }
}
