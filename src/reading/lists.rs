use serde::Deserialize;
use tracing::instrument;
use validator::Validate;

use super::{LIST_NOT_FOUND, NO_CHANGES, double_option};
use crate::{
    error::{Error, Result},
    storage::{
        DUPLICATE_LIST_NAME, NewReadingList, ReadingList, ReadingListPatch, ReadingListStore,
        ReadingListSummary,
    },
};

/// 默认列表名称
pub const DEFAULT_LIST_NAME: &str = "Baca Nanti";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReadingList {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    #[serde(default)]
    pub order_index: i32,
}

/// 稀疏更新请求，只应用出现的字段
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReadingList {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 20))]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 50))]
    pub icon: Option<Option<String>>,
    pub order_index: Option<i32>,
}

impl From<UpdateReadingList> for ReadingListPatch {
    fn from(req: UpdateReadingList) -> Self {
        Self {
            name: req.name,
            description: req.description,
            color: req.color,
            icon: req.icon,
            order_index: req.order_index,
        }
    }
}

/// 阅读列表管理
pub struct ReadingLists<S> {
    store: S,
}

impl<S: ReadingListStore> ReadingLists<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 创建非默认列表，同名列表已存在时返回 [`Error::Conflict`]
    #[instrument(name = "create reading list", skip(self, req))]
    pub async fn create(&self, user_id: i64, req: CreateReadingList) -> Result<ReadingList> {
        req.validate()?;

        if self.store.name_taken(user_id, &req.name, None).await? {
            return Err(Error::conflict(DUPLICATE_LIST_NAME));
        }

        let list = self
            .store
            .insert_list(NewReadingList {
                user_id,
                name: req.name,
                description: req.description,
                color: req.color,
                icon: req.icon,
                order_index: req.order_index,
                is_default: false,
            })
            .await?;

        tracing::info!(list_id = list.id, "reading list created");
        Ok(list)
    }

    /// 返回用户的所有列表
    ///
    /// 用户还没有任何列表时，先创建默认列表再重新查询。
    #[instrument(name = "list reading lists", skip(self))]
    pub async fn list(&self, user_id: i64) -> Result<Vec<ReadingListSummary>> {
        let lists = self.store.list_summaries(user_id).await?;
        if !lists.is_empty() {
            return Ok(lists);
        }

        self.get_or_create_default(user_id).await?;
        self.store.list_summaries(user_id).await
    }

    /// 获取默认列表，不存在则创建
    ///
    /// 并发调用时依赖存储层的唯一约束，只会有一个默认列表被创建。
    #[instrument(name = "default reading list", skip(self))]
    pub async fn get_or_create_default(&self, user_id: i64) -> Result<ReadingList> {
        if let Some(list) = self.store.find_default(user_id).await? {
            return Ok(list);
        }

        if let Some(list) = self.store.insert_default(user_id, DEFAULT_LIST_NAME).await? {
            tracing::info!(list_id = list.id, "default reading list created");
            return Ok(list);
        }

        // 插入冲突：默认列表已被并发创建，或者同名的普通列表已存在
        self.store
            .find_default(user_id)
            .await?
            .ok_or_else(|| Error::conflict(DUPLICATE_LIST_NAME))
    }

    #[instrument(name = "get reading list", skip(self))]
    pub async fn get(&self, user_id: i64, list_id: i64) -> Result<ReadingListSummary> {
        self.store
            .find_summary(user_id, list_id)
            .await?
            .ok_or_else(|| Error::not_found(LIST_NOT_FOUND))
    }

    #[instrument(name = "update reading list", skip(self, req))]
    pub async fn update(
        &self,
        user_id: i64,
        list_id: i64,
        req: UpdateReadingList,
    ) -> Result<ReadingList> {
        req.validate()?;

        let existing = self
            .store
            .find_list(user_id, list_id)
            .await?
            .ok_or_else(|| Error::not_found(LIST_NOT_FOUND))?;

        let patch = ReadingListPatch::from(req);
        if patch.is_empty() {
            return Err(Error::bad_request(NO_CHANGES));
        }

        if let Some(name) = patch.name.as_deref() {
            if name != existing.name && self.store.name_taken(user_id, name, Some(list_id)).await? {
                return Err(Error::conflict(DUPLICATE_LIST_NAME));
            }
        }

        self.store
            .update_list(user_id, list_id, &patch)
            .await?
            .ok_or_else(|| Error::not_found(LIST_NOT_FOUND))
    }

    /// 删除列表，默认列表不可删除
    #[instrument(name = "delete reading list", skip(self))]
    pub async fn delete(&self, user_id: i64, list_id: i64) -> Result<()> {
        let existing = self
            .store
            .find_list(user_id, list_id)
            .await?
            .ok_or_else(|| Error::not_found(LIST_NOT_FOUND))?;

        if existing.is_default {
            return Err(Error::bad_request("cannot delete default list"));
        }

        if !self.store.delete_list(user_id, list_id).await? {
            return Err(Error::not_found(LIST_NOT_FOUND));
        }
        tracing::info!("reading list deleted");
        Ok(())
    }
}
