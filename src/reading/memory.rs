//! 内存存储，仅用于测试
//!
//! 与数据库表结构保持相同的唯一约束，并支持注入写入失败。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;

use crate::{
    error::{Error, Result},
    storage::{
        ALREADY_SAVED, DUPLICATE_LIST_NAME, NewReadingList, NewSavedPost, ReadState, ReadingList,
        ReadingListPatch, ReadingListStore, ReadingListSummary, SavedPost, SavedPostChange,
        SavedPostEntry, SavedPostInfo, SavedPostStore,
    },
};

#[derive(Default)]
struct State {
    next_id: i64,
    posts: HashMap<i64, SavedPostInfo>,
    lists: Vec<ReadingList>,
    saved: Vec<SavedPost>,
    hide_saved_lookups: bool,
    fail_updates_after: Option<usize>,
    saved_updates: usize,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn summary(&self, list: &ReadingList) -> ReadingListSummary {
        let in_list = self.saved.iter().filter(|s| s.reading_list_id == list.id);
        ReadingListSummary {
            list: list.clone(),
            total_posts: in_list.clone().count() as i64,
            unread_count: in_list.filter(|s| !s.is_read).count() as i64,
        }
    }

    fn name_conflict(&self, user_id: i64, name: &str, exclude: Option<i64>) -> bool {
        self.lists
            .iter()
            .any(|l| l.user_id == user_id && l.name == name && Some(l.id) != exclude)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_post(&self, id: i64, title: &str) {
        self.state().posts.insert(
            id,
            SavedPostInfo {
                id,
                title: title.to_string(),
                slug: title.to_lowercase(),
                main_image_uri: None,
                author_name: "author".to_string(),
                category_name: None,
            },
        );
    }

    /// 让 `find_saved_in_list` 总是返回 `None`
    pub fn hide_saved_lookups(&self, hide: bool) {
        self.state().hide_saved_lookups = hide;
    }

    /// 前 `n` 次保存记录更新成功，之后全部失败
    pub fn fail_saved_updates_after(&self, n: usize) {
        let mut state = self.state();
        state.fail_updates_after = Some(state.saved_updates + n);
    }

    /// 成功写入的保存记录更新次数
    pub fn saved_updates(&self) -> usize {
        self.state().saved_updates
    }

    pub fn list_count(&self, user_id: i64) -> usize {
        self.state()
            .lists
            .iter()
            .filter(|l| l.user_id == user_id)
            .count()
    }

    pub fn saved_count(&self) -> usize {
        self.state().saved.len()
    }

    pub fn saved(&self, id: i64) -> Option<SavedPost> {
        self.state().saved.iter().find(|s| s.id == id).cloned()
    }
}

impl ReadingListStore for MemoryStore {
    async fn find_list(&self, user_id: i64, list_id: i64) -> Result<Option<ReadingList>> {
        Ok(self
            .state()
            .lists
            .iter()
            .find(|l| l.id == list_id && l.user_id == user_id)
            .cloned())
    }

    async fn find_summary(&self, user_id: i64, list_id: i64) -> Result<Option<ReadingListSummary>> {
        let state = self.state();
        Ok(state
            .lists
            .iter()
            .find(|l| l.id == list_id && l.user_id == user_id)
            .map(|l| state.summary(l)))
    }

    async fn name_taken(&self, user_id: i64, name: &str, exclude: Option<i64>) -> Result<bool> {
        Ok(self.state().name_conflict(user_id, name, exclude))
    }

    async fn list_summaries(&self, user_id: i64) -> Result<Vec<ReadingListSummary>> {
        let state = self.state();
        let mut lists: Vec<_> = state
            .lists
            .iter()
            .filter(|l| l.user_id == user_id)
            .collect();
        lists.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(lists.into_iter().map(|l| state.summary(l)).collect())
    }

    async fn find_default(&self, user_id: i64) -> Result<Option<ReadingList>> {
        Ok(self
            .state()
            .lists
            .iter()
            .find(|l| l.user_id == user_id && l.is_default)
            .cloned())
    }

    async fn insert_list(&self, list: NewReadingList) -> Result<ReadingList> {
        let mut state = self.state();
        if state.name_conflict(list.user_id, &list.name, None) {
            return Err(Error::conflict(DUPLICATE_LIST_NAME));
        }

        let now = Utc::now();
        let list = ReadingList {
            id: state.next_id(),
            user_id: list.user_id,
            name: list.name,
            description: list.description,
            is_default: list.is_default,
            color: list.color,
            icon: list.icon,
            order_index: list.order_index,
            created_at: now,
            updated_at: now,
        };
        state.lists.push(list.clone());
        Ok(list)
    }

    async fn insert_default(&self, user_id: i64, name: &str) -> Result<Option<ReadingList>> {
        let conflict = {
            let state = self.state();
            state.name_conflict(user_id, name, None)
                || state
                    .lists
                    .iter()
                    .any(|l| l.user_id == user_id && l.is_default)
        };
        if conflict {
            return Ok(None);
        }

        self.insert_list(NewReadingList {
            user_id,
            name: name.to_string(),
            description: None,
            color: None,
            icon: None,
            order_index: 0,
            is_default: true,
        })
        .await
        .map(Some)
    }

    async fn update_list(
        &self,
        user_id: i64,
        list_id: i64,
        patch: &ReadingListPatch,
    ) -> Result<Option<ReadingList>> {
        let mut state = self.state();
        if let Some(name) = &patch.name {
            if state.name_conflict(user_id, name, Some(list_id)) {
                return Err(Error::conflict(DUPLICATE_LIST_NAME));
            }
        }

        let Some(list) = state
            .lists
            .iter_mut()
            .find(|l| l.id == list_id && l.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            list.name = name.clone();
        }
        if let Some(description) = &patch.description {
            list.description = description.clone();
        }
        if let Some(color) = &patch.color {
            list.color = color.clone();
        }
        if let Some(icon) = &patch.icon {
            list.icon = icon.clone();
        }
        if let Some(order_index) = patch.order_index {
            list.order_index = order_index;
        }
        list.updated_at = Utc::now();
        Ok(Some(list.clone()))
    }

    async fn delete_list(&self, user_id: i64, list_id: i64) -> Result<bool> {
        let mut state = self.state();
        let before = state.lists.len();
        state
            .lists
            .retain(|l| !(l.id == list_id && l.user_id == user_id));
        let deleted = state.lists.len() < before;
        if deleted {
            state.saved.retain(|s| s.reading_list_id != list_id);
        }
        Ok(deleted)
    }
}

impl SavedPostStore for MemoryStore {
    async fn post_exists(&self, post_id: i64) -> Result<bool> {
        Ok(self.state().posts.contains_key(&post_id))
    }

    async fn find_saved(&self, user_id: i64, saved_id: i64) -> Result<Option<SavedPost>> {
        Ok(self
            .state()
            .saved
            .iter()
            .find(|s| s.id == saved_id && s.user_id == user_id)
            .cloned())
    }

    async fn find_saved_in_list(
        &self,
        user_id: i64,
        post_id: i64,
        list_id: i64,
    ) -> Result<Option<SavedPost>> {
        let state = self.state();
        if state.hide_saved_lookups {
            return Ok(None);
        }
        Ok(state
            .saved
            .iter()
            .find(|s| s.user_id == user_id && s.post_id == post_id && s.reading_list_id == list_id)
            .cloned())
    }

    async fn insert_saved(&self, saved: NewSavedPost) -> Result<SavedPost> {
        let mut state = self.state();
        let duplicate = state.saved.iter().any(|s| {
            s.user_id == saved.user_id
                && s.post_id == saved.post_id
                && s.reading_list_id == saved.reading_list_id
        });
        if duplicate {
            return Err(Error::conflict(ALREADY_SAVED));
        }

        let now = Utc::now();
        let saved = SavedPost {
            id: state.next_id(),
            user_id: saved.user_id,
            post_id: saved.post_id,
            reading_list_id: saved.reading_list_id,
            notes: saved.notes,
            is_read: false,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        state.saved.push(saved.clone());
        Ok(saved)
    }

    async fn list_entries(&self, user_id: i64, list_id: i64) -> Result<Vec<SavedPostEntry>> {
        let state = self.state();
        Ok(state
            .saved
            .iter()
            .filter(|s| s.user_id == user_id && s.reading_list_id == list_id)
            .filter_map(|s| {
                state.posts.get(&s.post_id).map(|post| SavedPostEntry {
                    saved: s.clone(),
                    post: post.clone(),
                })
            })
            .collect())
    }

    async fn list_saved(&self, user_id: i64, list_id: i64) -> Result<Vec<SavedPost>> {
        Ok(self
            .state()
            .saved
            .iter()
            .filter(|s| s.user_id == user_id && s.reading_list_id == list_id)
            .cloned()
            .collect())
    }

    async fn update_saved(
        &self,
        user_id: i64,
        saved_id: i64,
        change: &SavedPostChange,
    ) -> Result<Option<SavedPost>> {
        let mut state = self.state();
        if state
            .fail_updates_after
            .is_some_and(|limit| state.saved_updates >= limit)
        {
            return Err(Error::Sqlx(sqlx::Error::PoolTimedOut));
        }

        let Some(saved) = state
            .saved
            .iter_mut()
            .find(|s| s.id == saved_id && s.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(notes) = &change.notes {
            saved.notes = notes.clone();
        }
        match change.read_state {
            Some(ReadState::Read(at)) => {
                saved.is_read = true;
                saved.read_at = Some(at);
            }
            Some(ReadState::Unread) => {
                saved.is_read = false;
                saved.read_at = None;
            }
            None => {}
        }
        saved.updated_at = Utc::now();

        let saved = saved.clone();
        state.saved_updates += 1;
        Ok(Some(saved))
    }

    async fn delete_saved(&self, user_id: i64, saved_id: i64) -> Result<bool> {
        let mut state = self.state();
        let before = state.saved.len();
        state
            .saved
            .retain(|s| !(s.id == saved_id && s.user_id == user_id));
        Ok(state.saved.len() < before)
    }

    async fn delete_saved_in_list(&self, user_id: i64, post_id: i64, list_id: i64) -> Result<bool> {
        let mut state = self.state();
        let before = state.saved.len();
        state.saved.retain(|s| {
            !(s.user_id == user_id && s.post_id == post_id && s.reading_list_id == list_id)
        });
        Ok(state.saved.len() < before)
    }
}
